pub(crate) const HEADER_SIZE: usize = 7;
pub(crate) const SAMPLE_SIZE: usize = 5;
// Samples are consumed two at a time.
pub(crate) const SAMPLE_BLOCK_SIZE: usize = 10;
pub(crate) const LIDAR_CMD_SYNC_BYTE: u8 = 0xA5;
pub(crate) const LIDAR_CMD_STOP: u8 = 0x25;
pub(crate) const LIDAR_CMD_SCAN: u8 = 0x20;
pub(crate) const LIDAR_CMD_GET_DEVICE_INFO: u8 = 0x50;
pub(crate) const LIDAR_CMD_GET_DEVICE_HEALTH: u8 = 0x52;
pub(crate) const LIDAR_ANS_TYPE_MEASUREMENT: u8 = 0x81;
pub(crate) const LIDAR_ANS_TYPE_DEVINFO: u8 = 0x04;
pub(crate) const LIDAR_ANS_LENGTH_DEVINFO: u8 = 20;
pub(crate) const LIDAR_ANS_TYPE_DEVHEALTH: u8 = 0x06;
pub(crate) const LIDAR_ANS_LENGTH_DEVHEALTH: u8 = 3;
pub(crate) const N_READ_TRIALS: usize = 3;
// The device needs a moment to react to scan commands.
pub(crate) const SETTLE_INTERVAL_MS: u64 = 100;
pub(crate) const IDLE_YIELD_US: u64 = 100;
pub(crate) const DEFAULT_BAUD_RATE: u32 = 115200;
