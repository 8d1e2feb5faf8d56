use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RPLidarError>;

#[derive(Error, Debug)]
pub enum RPLidarError {
    #[error("Response header must be always seven bytes. Actually {0} bytes.")]
    InvalidHeaderLength(usize),
    #[error("Header sign must start with 0xA5 0x5A. Observed = {0}.")]
    InvalidMagicNumber(String),
    #[error("Expected response length of {0} bytes but found {1} bytes.")]
    InvalidResponseLength(usize, usize),
    #[error("Expected send mode 1 but obtained {0:#04X}.")]
    InvalidSendMode(u8),
    #[error("Expected type code {0} but obtained {1}.")]
    InvalidTypeCode(usize, usize),
    #[error("Wrote {written} of {expected} command bytes.")]
    ShortWrite { expected: usize, written: usize },
    #[error("Device health error. Status = {status}, error code = {error_code:#06X}.")]
    DeviceHealth { status: u8, error_code: u16 },
    #[error("Operation timed out")]
    Timeout,
    #[error("Acquisition thread panicked")]
    AcquisitionPanicked,
    #[error(transparent)]
    Serial(#[from] serialport::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
