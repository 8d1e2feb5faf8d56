mod acquisition;
mod codec;
mod constants;
mod error;
mod numeric;
mod scan_buffer;
mod time;
mod transport;

use std::thread::JoinHandle;

use crate::acquisition::run_acquisition;
use crate::codec::validate_response_header;
use crate::constants::{
    DEFAULT_BAUD_RATE, HEADER_SIZE, LIDAR_ANS_LENGTH_DEVHEALTH, LIDAR_ANS_LENGTH_DEVINFO,
    LIDAR_ANS_TYPE_DEVHEALTH, LIDAR_ANS_TYPE_DEVINFO, LIDAR_CMD_GET_DEVICE_HEALTH,
    LIDAR_CMD_GET_DEVICE_INFO, LIDAR_CMD_SCAN, LIDAR_CMD_STOP,
};
use crate::numeric::to_u16;
use crate::scan_buffer::scan_buffer;
use crate::transport::send_command;
use crossbeam_channel::{bounded, Sender};
use rplidar_data::{DeviceInfo, Scan};

pub use crate::acquisition::FaultPolicy;
pub use crate::error::{RPLidarError, Result};
pub use crate::scan_buffer::ScanReader;
pub use crate::transport::{SerialTransport, Transport};

/// Scan session settings.
#[derive(Clone, Copy, Debug)]
pub struct DriverConfig {
    /// Serial link speed. The protocol revision handled here runs at
    /// 115200 baud.
    pub baud_rate: u32,
    /// Response to transport faults in the acquisition thread.
    pub fault_policy: FaultPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            baud_rate: DEFAULT_BAUD_RATE,
            fault_policy: FaultPolicy::default(),
        }
    }
}

pub fn check_device_health(transport: &mut dyn Transport) -> Result<()> {
    send_command(transport, LIDAR_CMD_GET_DEVICE_HEALTH)?;
    let header = transport.read_exact(HEADER_SIZE)?;
    validate_response_header(
        &header,
        Some(LIDAR_ANS_LENGTH_DEVHEALTH),
        LIDAR_ANS_TYPE_DEVHEALTH,
    )?;
    let health = transport.read_exact(LIDAR_ANS_LENGTH_DEVHEALTH.into())?;

    match health[0] {
        0 => Ok(()),
        status => Err(RPLidarError::DeviceHealth {
            status,
            error_code: to_u16(health[2], health[1]),
        }),
    }
}

pub fn get_device_info(transport: &mut dyn Transport) -> Result<DeviceInfo> {
    send_command(transport, LIDAR_CMD_GET_DEVICE_INFO)?;
    let header = transport.read_exact(HEADER_SIZE)?;
    validate_response_header(
        &header,
        Some(LIDAR_ANS_LENGTH_DEVINFO),
        LIDAR_ANS_TYPE_DEVINFO,
    )?;
    let info = transport.read_exact(LIDAR_ANS_LENGTH_DEVINFO.into())?;
    Ok(DeviceInfo {
        model_number: info[0],
        firmware_major_version: info[2],
        firmware_minor_version: info[1],
        hardware_version: info[3],
        serial_number: info[4..20].try_into().unwrap(),
    })
}

/// Handle to a running scan session.
///
/// Dropping the handle requests a stop and joins the acquisition thread.
pub struct RPLidar {
    acquisition_thread: Option<JoinHandle<Result<()>>>,
    terminator_tx: Sender<bool>,
    reader: ScanReader,
}

impl RPLidar {
    /// Latest readings for all 360 angular slots; `(0, 0)` where no
    /// measurement has arrived yet.
    pub fn get_scan(&self) -> Scan {
        self.reader.get_scan()
    }

    /// Last known rotation speed in revolutions per minute. Stays at 0.0
    /// as long as no handled response type carries it.
    pub fn get_rpm(&self) -> f64 {
        self.reader.rpm()
    }

    /// Clonable read handle for consumers on other threads.
    pub fn scan_reader(&self) -> ScanReader {
        self.reader.clone()
    }

    /// Asks the acquisition thread to stop. Returns immediately; the
    /// thread still finishes its current read before it shuts down.
    pub fn request_stop(&self) {
        let _ = self.terminator_tx.try_send(true);
    }

    pub fn is_running(&self) -> bool {
        self.acquisition_thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Waits for the acquisition thread to end and surfaces its terminal
    /// fault, if any.
    pub fn join(&mut self) -> Result<()> {
        match self.acquisition_thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| RPLidarError::AcquisitionPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for RPLidar {
    fn drop(&mut self) {
        self.request_stop();
        if let Err(e) = self.join() {
            log::error!("Acquisition thread ended with: {}", e);
        }
    }
}

/// Function to launch the driver on a serial device.
/// # Arguments
///
/// * `port_name` - Serial port name such as `/dev/ttyUSB0`.
/// * `config` - Scan session settings.
pub fn run_driver(port_name: &str, config: DriverConfig) -> Result<RPLidar> {
    let transport = SerialTransport::open(port_name, config.baud_rate)?;
    run_driver_with_transport(Box::new(transport), config)
}

/// As [`run_driver`], over an already opened transport. Callers can probe
/// the device on the same transport first, or supply their own channel.
pub fn run_driver_with_transport(
    mut transport: Box<dyn Transport>,
    config: DriverConfig,
) -> Result<RPLidar> {
    transport.set_motor_power(true)?;

    if !cfg!(test) {
        // In testing, disable flushing to receive dummy signals
        transport.flush_input()?;
    }
    send_command(transport.as_mut(), LIDAR_CMD_STOP)?;
    send_command(transport.as_mut(), LIDAR_CMD_SCAN)?;

    let (terminator_tx, terminator_rx) = bounded(10);
    let (writer, reader) = scan_buffer();

    let fault_policy = config.fault_policy;
    let acquisition_thread = Some(std::thread::spawn(move || {
        run_acquisition(transport, writer, terminator_rx, fault_policy)
    }));

    Ok(RPLidar {
        acquisition_thread,
        terminator_tx,
        reader,
    })
}
