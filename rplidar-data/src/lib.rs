pub mod device_info;
pub mod scan;

pub use device_info::DeviceInfo;
pub use scan::{Scan, SCAN_SLOTS};
