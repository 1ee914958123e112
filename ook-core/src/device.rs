//! Device plugin sink and registry.
//!
//! The original auto-registers plugins through a static-constructor macro
//! (`DEVICE_PLUGIN_START`/`AutoRegister`), which is why its device store
//! can't be a `std::vector`. Here plugins are registered explicitly at
//! setup time into a [`DeviceRegistry`], trading the macro trick for an
//! ordinary collection built once and not mutated by surprise at static-init
//! time.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::Error;
use crate::meaning::Meaning;
use crate::pulsetrain::Pulsetrain;
use crate::raw_timings::RawTimings;

/// A sink that receives every successfully processed packet, and/or can be
/// asked to transmit a plugin-specific payload.
pub trait DevicePlugin {
    /// Called once per packet for every registered plugin, in registration
    /// order. Returning `false` means the plugin declined to act on this
    /// packet (not an error); it never stops other plugins from running.
    fn receive(&mut self, raw: &RawTimings, train: &Pulsetrain, meaning: &Meaning) -> bool {
        let _ = (raw, train, meaning);
        false
    }

    /// Ask this plugin to transmit `payload` in whatever encoding it knows.
    fn transmit(&mut self, payload: &str) -> bool {
        let _ = payload;
        false
    }
}

struct Entry {
    name: String,
    plugin: Box<dyn DevicePlugin>,
}

#[derive(Default)]
pub struct DeviceRegistry {
    entries: Vec<Entry>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, plugin: Box<dyn DevicePlugin>) {
        self.entries.push(Entry {
            name: name.into(),
            plugin,
        });
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Fan a processed packet out to every registered plugin.
    pub fn new_packet(&mut self, raw: &RawTimings, train: &Pulsetrain, meaning: &Meaning) {
        for entry in self.entries.iter_mut() {
            entry.plugin.receive(raw, train, meaning);
        }
    }

    /// Ask the named plugin to transmit `payload`.
    pub fn transmit(&mut self, plugin_name: &str, payload: &str) -> Result<bool, Error> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == plugin_name)
            .ok_or(Error::UnknownDevice)?;
        Ok(entry.plugin.transmit(payload))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct CountingPlugin {
        received: u32,
    }

    impl DevicePlugin for CountingPlugin {
        fn receive(&mut self, _raw: &RawTimings, _train: &Pulsetrain, _meaning: &Meaning) -> bool {
            self.received += 1;
            true
        }
    }

    #[test]
    fn new_packet_reaches_every_registered_plugin() {
        let mut registry = DeviceRegistry::new();
        registry.register("counter", Box::new(CountingPlugin { received: 0 }));
        let raw = RawTimings::new();
        let train = Pulsetrain::new();
        let meaning = Meaning::new();
        registry.new_packet(&raw, &train, &meaning);
        assert_eq!(registry.names().count(), 1);
    }

    #[test]
    fn transmit_on_unknown_plugin_errors() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.transmit("nope", "hello").is_err());
    }
}
