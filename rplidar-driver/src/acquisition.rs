use crate::codec::{decode_sample, validate_scan_header};
use crate::constants::{
    HEADER_SIZE, IDLE_YIELD_US, LIDAR_CMD_SCAN, LIDAR_CMD_STOP, SAMPLE_BLOCK_SIZE, SAMPLE_SIZE,
    SETTLE_INTERVAL_MS,
};
use crate::error::{RPLidarError, Result};
use crate::scan_buffer::ScanWriter;
use crate::time::{sleep_ms, sleep_us};
use crate::transport::{send_command, Transport};
use crossbeam_channel::Receiver;

/// Alignment of the acquisition loop with the device's sample stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AcquisitionState {
    Searching,
    Synced,
}

/// What the acquisition thread does when the transport itself fails.
/// Stream-level desynchronization is always handled internally and never
/// reaches this policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FaultPolicy {
    /// End the thread and surface the error through `join`.
    #[default]
    Halt,
    /// Log the fault, redo the scan handshake and keep acquiring.
    Restart,
}

pub(crate) fn run_acquisition(
    mut transport: Box<dyn Transport>,
    mut writer: ScanWriter,
    terminator_rx: Receiver<bool>,
    fault_policy: FaultPolicy,
) -> Result<()> {
    let mut state = AcquisitionState::Searching;
    loop {
        if do_terminate(&terminator_rx) {
            shutdown(transport.as_mut());
            return Ok(());
        }

        let step = match state {
            AcquisitionState::Searching => synchronize(transport.as_mut()),
            AcquisitionState::Synced => consume_block(transport.as_mut(), &mut writer),
        };

        state = match step {
            Ok(next) => next,
            Err(e) => match fault_policy {
                FaultPolicy::Halt => {
                    log::error!("Acquisition stopped on transport fault: {}", e);
                    if let Err(e) = transport.set_motor_power(false) {
                        log::warn!("{}", e);
                    }
                    return Err(e);
                }
                FaultPolicy::Restart => {
                    log::warn!("Transport fault, restarting scan: {}", e);
                    sleep_ms(SETTLE_INTERVAL_MS);
                    AcquisitionState::Searching
                }
            },
        };
    }
}

/// One search attempt. A missing or partial answer is normal while the
/// device spins up, so only real transport faults escape as errors.
fn synchronize(transport: &mut dyn Transport) -> Result<AcquisitionState> {
    match request_scan_stream(transport) {
        Ok(state) => Ok(state),
        Err(RPLidarError::Timeout | RPLidarError::ShortWrite { .. }) => {
            log::debug!("Scan stream not answered yet, still searching");
            Ok(AcquisitionState::Searching)
        }
        Err(e) => Err(e),
    }
}

fn request_scan_stream(transport: &mut dyn Transport) -> Result<AcquisitionState> {
    send_command(transport, LIDAR_CMD_STOP)?;
    sleep_ms(SETTLE_INTERVAL_MS);
    send_command(transport, LIDAR_CMD_SCAN)?;
    let header = transport.read_exact(HEADER_SIZE)?;
    match validate_scan_header(&header) {
        Ok(()) => Ok(AcquisitionState::Synced),
        Err(e) => {
            log::debug!("Rejected scan header: {}", e);
            Ok(AcquisitionState::Searching)
        }
    }
}

/// Reads and decodes one two-sample block. A desynchronized sample aborts
/// the block and sends the loop back to searching.
fn consume_block(
    transport: &mut dyn Transport,
    writer: &mut ScanWriter,
) -> Result<AcquisitionState> {
    if transport.bytes_to_read()? < SAMPLE_BLOCK_SIZE {
        sleep_us(IDLE_YIELD_US);
        return Ok(AcquisitionState::Synced);
    }

    let block = transport.read_exact(SAMPLE_BLOCK_SIZE)?;
    for data in block.chunks_exact(SAMPLE_SIZE) {
        let sample = decode_sample(data);
        if sample.is_desynced() {
            log::warn!("Desynchronized sample stream, restarting scan");
            restart_scan(transport)?;
            return Ok(AcquisitionState::Searching);
        }
        if sample.quality > 0 {
            writer.write(sample.angle_degrees, sample.distance_mm, sample.quality);
        }
    }
    Ok(AcquisitionState::Synced)
}

/// Scan-stop and scan-start with settle pauses, then a clean input
/// buffer. The answer header is left for the searching state to check.
fn restart_scan(transport: &mut dyn Transport) -> Result<()> {
    send_command(transport, LIDAR_CMD_STOP)?;
    sleep_ms(SETTLE_INTERVAL_MS);
    send_command(transport, LIDAR_CMD_SCAN)?;
    sleep_ms(SETTLE_INTERVAL_MS);
    transport.flush_input()
}

fn shutdown(transport: &mut dyn Transport) {
    if let Err(e) = stop_sequence(transport) {
        log::warn!("Shutdown sequence incomplete: {}", e);
    }
    if let Err(e) = transport.set_motor_power(false) {
        log::warn!("{}", e);
    }
}

fn stop_sequence(transport: &mut dyn Transport) -> Result<()> {
    send_command(transport, LIDAR_CMD_STOP)?;
    sleep_ms(SETTLE_INTERVAL_MS);
    send_command(transport, LIDAR_CMD_SCAN)?;
    send_command(transport, LIDAR_CMD_STOP)?;
    transport.flush_input()
}

fn do_terminate(terminator_rx: &Receiver<bool>) -> bool {
    terminator_rx.try_recv().unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_buffer::scan_buffer;
    use crossbeam_channel::bounded;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;

    #[derive(Default)]
    struct MockInner {
        incoming: Vec<u8>,
        written: Vec<u8>,
        flushes: usize,
        motor: Vec<bool>,
        fail_reads: bool,
        short_writes: bool,
    }

    #[derive(Clone, Default)]
    struct MockTransport {
        inner: Arc<Mutex<MockInner>>,
    }

    impl MockTransport {
        fn stage(&self, data: &[u8]) {
            self.inner.lock().incoming.extend_from_slice(data);
        }
    }

    impl Transport for MockTransport {
        fn read_exact(&mut self, data_size: usize) -> Result<Vec<u8>> {
            let mut inner = self.inner.lock();
            if inner.fail_reads {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone").into());
            }
            if inner.incoming.len() < data_size {
                return Err(RPLidarError::Timeout);
            }
            Ok(inner.incoming.drain(..data_size).collect())
        }

        fn write_all(&mut self, data: &[u8]) -> Result<()> {
            let mut inner = self.inner.lock();
            if inner.short_writes {
                return Err(RPLidarError::ShortWrite {
                    expected: data.len(),
                    written: 1,
                });
            }
            inner.written.extend_from_slice(data);
            Ok(())
        }

        fn bytes_to_read(&mut self) -> Result<usize> {
            Ok(self.inner.lock().incoming.len())
        }

        fn flush_input(&mut self) -> Result<()> {
            let mut inner = self.inner.lock();
            inner.flushes += 1;
            inner.incoming.clear();
            Ok(())
        }

        fn set_motor_power(&mut self, enabled: bool) -> Result<()> {
            self.inner.lock().motor.push(enabled);
            Ok(())
        }
    }

    fn sample_bytes(angle_degrees: u16, distance_mm: u16, quality: u8, start: bool) -> [u8; 5] {
        let angle_q6 = angle_degrees * 64;
        let rotation_bits = if start { 0x01 } else { 0x02 };
        let distance_q2 = distance_mm * 4;
        [
            (quality & 0xFC) | rotation_bits,
            (((angle_q6 & 0x7F) as u8) << 1) | 0x01,
            (angle_q6 >> 7) as u8,
            (distance_q2 & 0xFF) as u8,
            (distance_q2 >> 8) as u8,
        ]
    }

    #[test]
    fn test_synchronize_enters_synced_on_valid_header() {
        let mut mock = MockTransport::default();
        mock.stage(&[0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x81]);

        let state = synchronize(&mut mock).unwrap();
        assert_eq!(state, AcquisitionState::Synced);
        assert_eq!(mock.inner.lock().written, vec![0xA5, 0x25, 0xA5, 0x20]);
    }

    #[test]
    fn test_synchronize_keeps_searching_on_bad_header() {
        let mut mock = MockTransport::default();
        mock.stage(&[0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x82]);

        let state = synchronize(&mut mock).unwrap();
        assert_eq!(state, AcquisitionState::Searching);
    }

    #[test]
    fn test_synchronize_keeps_searching_without_answer() {
        let mut mock = MockTransport::default();

        let state = synchronize(&mut mock).unwrap();
        assert_eq!(state, AcquisitionState::Searching);
        assert_eq!(mock.inner.lock().written, vec![0xA5, 0x25, 0xA5, 0x20]);
    }

    #[test]
    fn test_synchronize_keeps_searching_on_short_write() {
        let mut mock = MockTransport::default();
        mock.inner.lock().short_writes = true;

        let state = synchronize(&mut mock).unwrap();
        assert_eq!(state, AcquisitionState::Searching);
        // The very first command write failed.
        assert!(mock.inner.lock().written.is_empty());
    }

    #[test]
    fn test_consume_block_writes_both_samples() {
        let mut mock = MockTransport::default();
        mock.stage(&sample_bytes(90, 1000, 12, true));
        mock.stage(&sample_bytes(91, 1200, 8, false));
        let (mut writer, reader) = scan_buffer();

        let state = consume_block(&mut mock, &mut writer).unwrap();
        assert_eq!(state, AcquisitionState::Synced);

        let scan = reader.get_scan();
        assert_eq!(scan.distances_mm[0], 1000);
        assert_eq!(scan.qualities[0], 12);
        assert_eq!(scan.distances_mm[1], 1200);
        assert_eq!(scan.qualities[1], 8);
    }

    #[test]
    fn test_consume_block_waits_for_a_full_block() {
        let mut mock = MockTransport::default();
        mock.stage(&sample_bytes(90, 1000, 12, true));
        let (mut writer, reader) = scan_buffer();

        let state = consume_block(&mut mock, &mut writer).unwrap();
        assert_eq!(state, AcquisitionState::Synced);
        // Nothing consumed, nothing written.
        assert_eq!(mock.inner.lock().incoming.len(), 5);
        assert_eq!(reader.get_scan().qualities, vec![0u8; 360]);
    }

    #[test]
    fn test_consume_block_desync_restarts_and_discards_block() {
        let mut mock = MockTransport::default();
        // Both rotation bits clear in the first sample.
        let mut bad = sample_bytes(200, 700, 12, true);
        bad[0] = 12;
        mock.stage(&bad);
        mock.stage(&sample_bytes(210, 800, 12, false));
        let (mut writer, reader) = scan_buffer();

        let state = consume_block(&mut mock, &mut writer).unwrap();
        assert_eq!(state, AcquisitionState::Searching);

        let inner = mock.inner.lock();
        assert_eq!(inner.written, vec![0xA5, 0x25, 0xA5, 0x20]);
        assert_eq!(inner.flushes, 1);
        drop(inner);

        // The second sample of the block was never decoded.
        assert_eq!(reader.get_scan().qualities, vec![0u8; 360]);
    }

    #[test]
    fn test_consume_block_check_flag_desync() {
        let mut mock = MockTransport::default();
        let mut bad = sample_bytes(200, 700, 12, true);
        bad[1] &= 0xFE;
        mock.stage(&bad);
        mock.stage(&sample_bytes(210, 800, 12, false));
        let (mut writer, _reader) = scan_buffer();

        let state = consume_block(&mut mock, &mut writer).unwrap();
        assert_eq!(state, AcquisitionState::Searching);
        assert_eq!(mock.inner.lock().flushes, 1);
    }

    #[test]
    fn test_consume_block_quality_zero_does_not_overwrite() {
        let mut mock = MockTransport::default();
        mock.stage(&sample_bytes(90, 1000, 12, true));
        mock.stage(&sample_bytes(90, 2000, 0, false));
        let (mut writer, reader) = scan_buffer();

        let state = consume_block(&mut mock, &mut writer).unwrap();
        assert_eq!(state, AcquisitionState::Synced);

        let scan = reader.get_scan();
        assert_eq!(scan.distances_mm[0], 1000);
        assert_eq!(scan.qualities[0], 12);
    }

    #[test]
    fn test_run_acquisition_shutdown_sequence() {
        let mock = MockTransport::default();
        let (writer, _reader) = scan_buffer();
        let (terminator_tx, terminator_rx) = bounded(10);
        terminator_tx.send(true).unwrap();

        run_acquisition(
            Box::new(mock.clone()),
            writer,
            terminator_rx,
            FaultPolicy::Halt,
        )
        .unwrap();

        let inner = mock.inner.lock();
        assert_eq!(inner.written, vec![0xA5, 0x25, 0xA5, 0x20, 0xA5, 0x25]);
        assert_eq!(inner.flushes, 1);
        assert_eq!(inner.motor, vec![false]);
    }

    #[test]
    fn test_halt_policy_surfaces_transport_fault() {
        let mock = MockTransport::default();
        mock.inner.lock().fail_reads = true;
        let (writer, _reader) = scan_buffer();
        let (_terminator_tx, terminator_rx) = bounded(10);

        let result = run_acquisition(
            Box::new(mock.clone()),
            writer,
            terminator_rx,
            FaultPolicy::Halt,
        );
        assert!(matches!(result, Err(RPLidarError::Io(_))));
        assert_eq!(mock.inner.lock().motor, vec![false]);
    }

    #[test]
    fn test_restart_policy_survives_transport_fault() {
        let mock = MockTransport::default();
        mock.inner.lock().fail_reads = true;
        let (writer, _reader) = scan_buffer();
        let (terminator_tx, terminator_rx) = bounded(10);

        let thread = std::thread::spawn({
            let mock = mock.clone();
            move || run_acquisition(Box::new(mock), writer, terminator_rx, FaultPolicy::Restart)
        });

        // Let it run through at least one fault-and-restart round.
        sleep_ms(250);
        terminator_tx.send(true).unwrap();
        thread.join().unwrap().unwrap();

        let inner = mock.inner.lock();
        assert_eq!(inner.motor, vec![false]);
        let n = inner.written.len();
        assert!(n >= 10);
        assert_eq!(inner.written[n - 6..], [0xA5, 0x25, 0xA5, 0x20, 0xA5, 0x25]);
    }
}
