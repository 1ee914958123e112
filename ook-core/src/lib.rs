#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

/// Largest number of raw intervals a single capture or pulsetrain can hold.
///
/// Bounds `RawTimings::intervals` and `Pulsetrain::transitions`. Pre-reserved
/// so the edge-capture ISR never allocates.
pub const MAX_RAW_INTERVALS: usize = 512;

/// Largest number of distinct duration bins a [`Pulsetrain`] can hold.
pub const MAX_BINS: usize = 10;

/// Largest number of packed data bytes a single [`MeaningElement`] can carry.
pub const MAX_MEANING_DATA: usize = 50;

/// Largest number of elements a single [`Meaning`] can hold.
pub const MAX_MEANING_ELEMENTS: usize = 64;

pub mod error;
pub use error::Error;

pub mod clock;
pub use clock::Clock;

mod bits;

pub mod raw_timings;
pub use raw_timings::RawTimings;

pub mod pulsetrain;
pub use pulsetrain::{PulseBin, Pulsetrain};

#[cfg(feature = "alloc")]
pub mod meaning;
#[cfg(feature = "alloc")]
pub use meaning::{Meaning, MeaningElement, MeaningKind};

pub mod visualizer;

pub mod capture;
pub use capture::EdgeCapture;

pub mod coalescer;
pub use coalescer::RepeatCoalescer;

#[cfg(feature = "alloc")]
pub mod settings;
#[cfg(feature = "alloc")]
pub use settings::SettingsStore;

pub mod radio;
pub use radio::RadioDriver;

#[cfg(feature = "alloc")]
pub mod device;
#[cfg(feature = "alloc")]
pub use device::{DevicePlugin, DeviceRegistry};

#[cfg(feature = "alloc")]
pub mod pipeline;
#[cfg(feature = "alloc")]
pub use pipeline::{PipelineConfig, PipelineController};
