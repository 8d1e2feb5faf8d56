use crate::constants::{LIDAR_CMD_SYNC_BYTE, N_READ_TRIALS};
use crate::error::{RPLidarError, Result};
use crate::time::sleep_ms;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

/// Byte-level duplex channel to the device.
///
/// The acquisition loop owns its transport exclusively and drives the
/// scan session through this interface, so anything that can move bytes
/// and toggle the motor line can stand in for a serial port.
pub trait Transport: Send {
    /// Reads exactly `data_size` bytes, or fails with
    /// [`RPLidarError::Timeout`] when they do not arrive in time.
    fn read_exact(&mut self, data_size: usize) -> Result<Vec<u8>>;

    /// Writes the whole buffer, reporting a short write as an error.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Number of bytes already buffered for reading.
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Discards whatever is currently buffered for reading.
    fn flush_input(&mut self) -> Result<()>;

    /// Turns the rotation motor on or off.
    fn set_motor_power(&mut self, enabled: bool) -> Result<()>;
}

pub(crate) fn send_command(transport: &mut dyn Transport, command: u8) -> Result<()> {
    let data: [u8; 2] = [LIDAR_CMD_SYNC_BYTE, command];
    transport.write_all(&data)
}

/// [`Transport`] over a serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens `port_name` at `baud_rate`, 8N1 with a 10 ms read timeout.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(10))
            .open()?;
        log::info!("Opened {} at {} baud", port_name, baud_rate);
        Ok(SerialTransport { port })
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        SerialTransport { port }
    }
}

impl Transport for SerialTransport {
    fn read_exact(&mut self, data_size: usize) -> Result<Vec<u8>> {
        assert!(data_size > 0);
        for _ in 0..N_READ_TRIALS {
            let n_read = self.bytes_to_read()?;
            if n_read < data_size {
                sleep_ms(10);
                continue;
            }
            let mut data: Vec<u8> = vec![0; data_size];
            self.port.read_exact(data.as_mut_slice())?;
            return Ok(data);
        }
        Err(RPLidarError::Timeout)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let n_written = self.port.write(data)?;
        if n_written != data.len() {
            return Err(RPLidarError::ShortWrite {
                expected: data.len(),
                written: n_written,
            });
        }
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let n_u32: u32 = self.port.bytes_to_read()?;
        Ok(n_u32.try_into().unwrap_or(0))
    }

    fn flush_input(&mut self) -> Result<()> {
        let n_read = self.bytes_to_read()?;
        if n_read == 0 {
            return Ok(());
        }
        let mut data: Vec<u8> = vec![0; n_read];
        self.port.read_exact(data.as_mut_slice())?;
        Ok(())
    }

    fn set_motor_power(&mut self, enabled: bool) -> Result<()> {
        // The motor enable line is DTR, active low. Some links (pseudo
        // terminals among them) have no such line; keep going without it.
        if let Err(e) = self.port.write_data_terminal_ready(!enabled) {
            log::warn!("Motor control line unavailable: {}", e);
        }
        Ok(())
    }
}
