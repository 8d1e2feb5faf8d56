use parking_lot::Mutex;
use rplidar_data::{Scan, SCAN_SLOTS};
use std::sync::Arc;

struct BufferInner {
    slots: [Option<(u16, u8)>; SCAN_SLOTS],
    // Plain scan responses carry no rotation speed, so this stays at its
    // initial value until a response type that does is handled.
    rpm: f64,
}

/// Write half of the scan buffer. Not clonable, the acquisition thread
/// is the only writer.
pub(crate) struct ScanWriter {
    inner: Arc<Mutex<BufferInner>>,
}

/// Read half of the scan buffer. Clonable; every read copies all slots
/// out under a single lock acquisition.
#[derive(Clone)]
pub struct ScanReader {
    inner: Arc<Mutex<BufferInner>>,
}

pub(crate) fn scan_buffer() -> (ScanWriter, ScanReader) {
    let inner = Arc::new(Mutex::new(BufferInner {
        slots: [None; SCAN_SLOTS],
        rpm: 0.0,
    }));
    let writer = ScanWriter {
        inner: inner.clone(),
    };
    let reader = ScanReader { inner };
    (writer, reader)
}

/// Maps a measurement angle to its buffer slot, 90 degrees behind the
/// reported angle. Raw angles can exceed a full turn.
pub(crate) fn slot_index(angle_degrees: f64) -> usize {
    ((angle_degrees.round() as i32) - 90).rem_euclid(360) as usize
}

impl ScanWriter {
    pub(crate) fn write(&mut self, angle_degrees: f64, distance_mm: u16, quality: u8) {
        let index = slot_index(angle_degrees);
        self.inner.lock().slots[index] = Some((distance_mm, quality));
    }
}

impl ScanReader {
    /// Snapshot of all 360 slots; slots without a measurement read as
    /// `(0, 0)`.
    pub fn get_scan(&self) -> Scan {
        let inner = self.inner.lock();
        let mut distances_mm = Vec::with_capacity(SCAN_SLOTS);
        let mut qualities = Vec::with_capacity(SCAN_SLOTS);
        for slot in inner.slots.iter() {
            let (distance_mm, quality) = slot.unwrap_or((0, 0));
            distances_mm.push(distance_mm);
            qualities.push(quality);
        }
        Scan {
            distances_mm,
            qualities,
        }
    }

    /// Last known rotation speed in revolutions per minute.
    pub fn rpm(&self) -> f64 {
        self.inner.lock().rpm
    }
}
