use crate::constants::{HEADER_SIZE, LIDAR_ANS_TYPE_MEASUREMENT, LIDAR_CMD_SYNC_BYTE, SAMPLE_SIZE};
use crate::error::{RPLidarError, Result};
use crate::numeric::{to_string, to_u16};

/// One decoded 5-byte measurement.
///
/// The rotation and check flags are kept raw; whether they signal a
/// desynchronization is for the acquisition loop to act on.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Sample {
    pub(crate) quality: u8,
    pub(crate) angle_degrees: f64,
    pub(crate) distance_mm: u16,
    pub(crate) start_flag: u8,
    pub(crate) start_flag_inverse: u8,
    pub(crate) check_flag: u8,
}

impl Sample {
    /// True when the stream can no longer be trusted to be aligned on
    /// sample boundaries. The flags carry their bit positions, so the
    /// first comparison only fires when both bits are clear.
    pub(crate) fn is_desynced(&self) -> bool {
        self.start_flag == self.start_flag_inverse || self.check_flag != 1
    }
}

/// Checks the 7-byte answer to the scan command.
pub(crate) fn validate_scan_header(header: &[u8]) -> Result<()> {
    if header.len() != HEADER_SIZE {
        return Err(RPLidarError::InvalidHeaderLength(header.len()));
    }
    if header[0..2] != [LIDAR_CMD_SYNC_BYTE, 0x5A] {
        return Err(RPLidarError::InvalidMagicNumber(to_string(&header[0..2])));
    }
    // 0xCFFF is wider than a byte, so the mask degenerates to 0xFF.
    // Kept verbatim for wire compatibility.
    if (header[2] as u16) & 0xCFFF != 5 {
        return Err(RPLidarError::InvalidResponseLength(5, header[2].into()));
    }
    if (header[5] & 0xC0) >> 6 != 1 {
        return Err(RPLidarError::InvalidSendMode(header[5]));
    }
    if header[6] != LIDAR_ANS_TYPE_MEASUREMENT {
        return Err(RPLidarError::InvalidTypeCode(
            LIDAR_ANS_TYPE_MEASUREMENT.into(),
            header[6].into(),
        ));
    }
    Ok(())
}

/// Checks the 7-byte answer to an info or health request, which carries
/// its payload length in byte 2 and the request's type code in byte 6.
pub(crate) fn validate_response_header(
    header: &[u8],
    maybe_response_length: Option<u8>,
    type_code: u8,
) -> Result<()> {
    if header.len() != HEADER_SIZE {
        return Err(RPLidarError::InvalidHeaderLength(header.len()));
    }
    if header[0..2] != [LIDAR_CMD_SYNC_BYTE, 0x5A] {
        return Err(RPLidarError::InvalidMagicNumber(to_string(&header[0..2])));
    }
    match maybe_response_length {
        None => (),
        Some(len) => {
            if header[2] != len {
                return Err(RPLidarError::InvalidResponseLength(
                    len.into(),
                    header[2].into(),
                ));
            }
        }
    }
    if header[6] != type_code {
        return Err(RPLidarError::InvalidTypeCode(
            type_code.into(),
            header[6].into(),
        ));
    }
    Ok(())
}

pub(crate) fn decode_sample(data: &[u8]) -> Sample {
    debug_assert_eq!(data.len(), SAMPLE_SIZE);
    let angle_q6 = (data[2] as u16) * 128 + ((data[1] >> 1) as u16);
    Sample {
        quality: data[0] & 0xFC,
        start_flag: data[0] & 0x01,
        start_flag_inverse: data[0] & 0x02,
        angle_degrees: (angle_q6 as f64) / 64.0,
        distance_mm: to_u16(data[4], data[3]) / 4,
        check_flag: data[1] & 0x01,
    }
}
