#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of angular slots in one full rotation.
pub const SCAN_SLOTS: usize = 360;

/// Struct to hold the latest full rotation of lidar readings.
///
/// Both vectors always hold [`SCAN_SLOTS`] entries and share their index.
/// A slot without a measurement reads as distance 0 and quality 0.
#[derive(Clone, Debug, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scan {
    /// Distance to an object (in mm, rounded down).
    pub distances_mm: Vec<u16>,
    /// Return strength of the laser pulse.
    pub qualities: Vec<u8>,
}
