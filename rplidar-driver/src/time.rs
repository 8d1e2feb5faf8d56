use std::thread;
use std::time::Duration;

pub(crate) fn sleep_ms(duration_ms: u64) {
    thread::sleep(Duration::from_millis(duration_ms));
}

pub(crate) fn sleep_us(duration_us: u64) {
    thread::sleep(Duration::from_micros(duration_us));
}
