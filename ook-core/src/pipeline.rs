//! Ties edge capture, repeat coalescing, classification and the device
//! registry together into one main-loop-shaped controller, minus the parts
//! that are host/hardware concerns (serial console, settings file storage,
//! hardware timers) — those live in `ook-cli` and behind [`crate::radio::RadioDriver`].

use crate::capture::{CaptureConfig, EdgeCapture, RxState};
use crate::clock::Clock;
use crate::coalescer::{CapturedTrain, RepeatCoalescer};
use crate::device::DeviceRegistry;
use crate::error::Error;
use crate::meaning::Meaning;
use crate::pulsetrain::Pulsetrain;
use crate::raw_timings::RawTimings;
use crate::settings::SettingsStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub capture: CaptureConfig,
    /// Bin-building tolerance in µs, `fromRawTimings`'s `bin_width`.
    pub bin_width: u16,
    /// Visualizer quantum in µs.
    pub visualizer_pixel: u16,
    /// Gap length, in µs, after which an in-progress capture with no further
    /// edge is finalized instead of waiting indefinitely for the next one.
    pub pulse_gap_len_new_packet: u16,
    /// How long, in µs, a pending train waits for another repeat before being
    /// promoted to the ready slot.
    pub repeat_timeout: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            capture: CaptureConfig::default(),
            bin_width: 150,
            visualizer_pixel: 200,
            pulse_gap_len_new_packet: 20000,
            repeat_timeout: 200000,
        }
    }
}

impl PipelineConfig {
    /// Re-read every tunable from the settings store, the way a once-a-second
    /// main-loop refresh would.
    pub fn refresh_from_settings(&mut self, settings: &impl SettingsStore) {
        self.capture.first_pulse_min_len =
            settings.get_int("first_pulse_min_len", self.capture.first_pulse_min_len as i64) as u16;
        self.capture.pulse_gap_min_len =
            settings.get_int("pulse_gap_min_len", self.capture.pulse_gap_min_len as i64) as u16;
        self.capture.min_nr_pulses =
            settings.get_int("min_nr_pulses", self.capture.min_nr_pulses as i64) as u16;
        self.capture.max_nr_pulses =
            settings.get_int("max_nr_pulses", self.capture.max_nr_pulses as i64) as u16;
        self.capture.noise_penalty =
            settings.get_int("noise_penalty", self.capture.noise_penalty as i64) as i32;
        self.capture.noise_threshold =
            settings.get_int("noise_threshold", self.capture.noise_threshold as i64) as i32;
        self.capture.no_noise_fix = settings.is_set("no_noise_fix");
        self.bin_width = settings.get_int("bin_width", self.bin_width as i64) as u16;
        self.visualizer_pixel = settings.get_int("visualizer_pixel", self.visualizer_pixel as i64) as u16;
        self.pulse_gap_len_new_packet = settings
            .get_int("pulse_gap_len_new_packet", self.pulse_gap_len_new_packet as i64)
            as u16;
        self.repeat_timeout = settings.get_int("repeat_timeout", self.repeat_timeout as i64) as u32;
    }
}

/// Everything known about one fully processed packet, handed to the device
/// registry and to whatever prints it.
pub struct ReceivedPacket {
    pub raw: RawTimings,
    pub train: Pulsetrain,
    pub meaning: Result<Meaning, Error>,
}

pub struct PipelineController<C: Clock> {
    config: PipelineConfig,
    capture: EdgeCapture,
    coalescer: RepeatCoalescer,
    pub devices: DeviceRegistry,
    rx_on: bool,
    clock: C,
    last_edge_us: u64,
    last_submit_us: u64,
}

impl<C: Clock> PipelineController<C> {
    pub fn new(config: PipelineConfig, clock: C) -> Self {
        let now = clock.now_micros();
        PipelineController {
            capture: EdgeCapture::new(config.capture),
            coalescer: RepeatCoalescer::new(),
            devices: DeviceRegistry::new(),
            config,
            rx_on: false,
            clock,
            last_edge_us: now,
            last_submit_us: now,
        }
    }

    /// Access to the injected clock, mainly so tests can advance a
    /// [`crate::clock::FakeClock`] instead of waiting on real time.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PipelineConfig) {
        self.config = config;
    }

    pub fn receive(&mut self) {
        self.rx_on = true;
        self.capture.reset();
    }

    pub fn standby(&mut self) {
        if self.rx_on {
            self.try_to_be_nice(500);
            self.capture.reset();
            self.rx_on = false;
        }
    }

    fn submit_raw(&mut self, raw: RawTimings) -> Result<(), Error> {
        let train = Pulsetrain::from_raw_timings(&raw, self.config.bin_width)?;
        let now = self.clock.now_micros();
        self.last_submit_us = now;
        self.coalescer.submit(
            now,
            CapturedTrain {
                raw,
                train,
            },
        );
        Ok(())
    }

    /// Handle one resolved edge: `is_start_of_mark` already accounts for the
    /// radio's active-high/active-low polarity.
    pub fn on_edge(&mut self, is_start_of_mark: bool) -> Result<(), Error> {
        let now = self.clock.now_micros();
        self.last_edge_us = now;
        if let Some(raw) = self.capture.on_transition(now, is_start_of_mark) {
            self.submit_raw(raw)?;
        }
        Ok(())
    }

    /// Force the transition-timeout path: whatever is mid-capture is
    /// finalized now, regardless of elapsed time. Prefer [`Self::poll_timeouts`]
    /// for normal operation; this is for tests and explicit forced flushes.
    pub fn on_transition_timeout(&mut self) -> Result<(), Error> {
        if let Some(raw) = self.capture.on_timeout() {
            self.submit_raw(raw)?;
        }
        Ok(())
    }

    /// Force the repeat-timeout path: whatever is pending is promoted now,
    /// regardless of elapsed time. Prefer [`Self::poll_timeouts`] for normal
    /// operation; this is for tests and explicit forced flushes.
    pub fn on_repeat_timeout(&mut self) {
        self.coalescer.on_repeat_timeout();
    }

    /// Check elapsed time against `pulse_gap_len_new_packet` and
    /// `repeat_timeout` and fire whichever deadlines are actually due,
    /// instead of a hardware timer ISR restarting on every edge. Callers (the
    /// console loop between commands, a radio driver's idle tick) should call
    /// this regularly rather than firing the timeouts unconditionally.
    pub fn poll_timeouts(&mut self) -> Result<(), Error> {
        let now = self.clock.now_micros();
        if self.capture.state() == RxState::ReceivingData
            && now.saturating_sub(self.last_edge_us) >= self.config.pulse_gap_len_new_packet as u64
        {
            self.on_transition_timeout()?;
        }
        if now.saturating_sub(self.last_submit_us) >= self.config.repeat_timeout as u64 {
            self.coalescer.on_repeat_timeout();
            self.last_submit_us = now;
        }
        Ok(())
    }

    /// Drain a finished, coalesced packet if one is ready, classifying it.
    pub fn poll(&mut self) -> Option<ReceivedPacket> {
        let captured = self.coalescer.take_ready()?;
        let meaning = Meaning::from_pulsetrain(&captured.train);
        Some(ReceivedPacket {
            raw: captured.raw,
            train: captured.train,
            meaning,
        })
    }

    /// Wait up to `max_wait_micros` for an in-progress reception to finish,
    /// polling the injected clock. Returns `true` if it settled in time.
    pub fn try_to_be_nice(&mut self, max_wait_micros: u64) -> bool {
        if self.capture.state() == RxState::WaitPreamble {
            return true;
        }
        let start = self.clock.now_micros();
        while self.clock.now_micros().saturating_sub(start) < max_wait_micros {
            if self.capture.state() == RxState::WaitPreamble {
                return true;
            }
        }
        false
    }

    /// Feed a train as if it had actually been received, the way `sim`
    /// plays a pasted `RawTimings`/`Pulsetrain`/`Meaning` string back
    /// through the same coalescing and classification path real captures
    /// take.
    pub fn simulate_text(&mut self, text: &str) -> Result<(), Error> {
        self.try_to_be_nice(500);
        if RawTimings::maybe(text) {
            let raw: RawTimings = text.parse()?;
            self.submit_raw(raw)
        } else if Pulsetrain::maybe(text) {
            let train: Pulsetrain = text.parse()?;
            let now = self.clock.now_micros();
            self.last_submit_us = now;
            self.coalescer.submit(
                now,
                CapturedTrain {
                    raw: RawTimings::new(),
                    train,
                },
            );
            Ok(())
        } else if Meaning::maybe(text) {
            let meaning: Meaning = text.parse()?;
            let train = Pulsetrain::from_meaning(&meaning)?;
            let now = self.clock.now_micros();
            self.last_submit_us = now;
            self.coalescer.submit(
                now,
                CapturedTrain {
                    raw: RawTimings::new(),
                    train,
                },
            );
            Ok(())
        } else {
            Err(Error::Syntax)
        }
    }

    /// Resolve any of the three textual forms into a flat interval list
    /// ready for bit-banged transmission; the actual pin timing loop is a
    /// host/hardware concern left to the caller and a [`crate::radio::RadioDriver`].
    pub fn resolve_for_transmit(&self, text: &str) -> Result<RawTimings, Error> {
        if RawTimings::maybe(text) {
            text.parse()
        } else if Pulsetrain::maybe(text) {
            let train: Pulsetrain = text.parse()?;
            RawTimings::from_pulsetrain(&train)
        } else if Meaning::maybe(text) {
            let meaning: Meaning = text.parse()?;
            let train = Pulsetrain::from_meaning(&meaning)?;
            RawTimings::from_pulsetrain(&train)
        } else {
            Err(Error::Syntax)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::FakeClock;

    #[test]
    fn simulating_a_raw_string_produces_a_ready_packet() {
        let mut pipeline = PipelineController::new(PipelineConfig::default(), FakeClock::new());
        pipeline
            .simulate_text("190,575,190,575,575,190,190,575,575,190,190,575,575,190,190,190,190,190,575,575,190,575,190,190,575,5906")
            .unwrap();
        pipeline.on_repeat_timeout();
        let packet = pipeline.poll().expect("packet ready");
        assert!(packet.train.is_present());
    }

    #[test]
    fn try_to_be_nice_returns_immediately_when_idle() {
        let mut pipeline = PipelineController::new(PipelineConfig::default(), FakeClock::new());
        assert!(pipeline.try_to_be_nice(500));
    }

    #[test]
    fn resolve_for_transmit_accepts_a_raw_timings_string() {
        let pipeline = PipelineController::new(PipelineConfig::default(), FakeClock::new());
        let text = "190,575,190,575,575,190,190,575,575,190,190,575,575,190,190,190,190,190,575,575,190,575,190,190,575,5906";
        assert!(pipeline.resolve_for_transmit(text).is_ok());
    }

    #[test]
    fn resolve_for_transmit_accepts_a_meaning_string() {
        let pipeline = PipelineController::new(PipelineConfig::default(), FakeClock::new());
        assert!(pipeline.resolve_for_transmit("pulse(500) + gap(1500)").is_ok());
    }

    #[test]
    fn poll_timeouts_waits_for_repeat_timeout_before_promoting() {
        let mut pipeline = PipelineController::new(PipelineConfig::default(), FakeClock::new());
        pipeline
            .simulate_text("190,575,190,575,575,190,190,575,575,190,190,575,575,190,190,190,190,190,575,575,190,575,190,190,575,5906")
            .unwrap();
        pipeline.poll_timeouts().unwrap();
        assert!(pipeline.poll().is_none(), "must not promote before repeat_timeout elapses");

        pipeline.clock_mut().advance(200_000);
        pipeline.poll_timeouts().unwrap();
        assert!(pipeline.poll().is_some(), "must promote once repeat_timeout has elapsed");
    }
}
