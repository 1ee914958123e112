//! A demo [`DevicePlugin`] and the [`NullRadio`] wiring, enough to exercise
//! the whole pipeline without any real hardware.

use ook_core::device::DevicePlugin;
use ook_core::meaning::Meaning;
use ook_core::pulsetrain::Pulsetrain;
use ook_core::raw_timings::RawTimings;

/// Prints every packet it sees and "transmits" by just echoing its payload,
/// standing in for a real device profile (garage door, doorbell, weather
/// station) that would decode or build a specific payload layout.
pub struct LoggingDevice {
    pub seen: u32,
}

impl LoggingDevice {
    pub fn new() -> Self {
        LoggingDevice { seen: 0 }
    }
}

impl DevicePlugin for LoggingDevice {
    fn receive(&mut self, _raw: &RawTimings, train: &Pulsetrain, meaning: &Meaning) -> bool {
        self.seen += 1;
        println!(
            "[logger] packet #{}: {} elements, {} repeats",
            self.seen,
            meaning.elements.len(),
            train.repeats
        );
        true
    }

    fn transmit(&mut self, payload: &str) -> bool {
        println!("[logger] would transmit: {}", payload);
        true
    }
}
