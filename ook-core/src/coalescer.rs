//! Three-slot repeat coalescer, modeling the `isr_in`/`isr_compare`/`isr_out`
//! hand-off between the edge-capture side and the consumer loop.
//!
//! `submit` plays the role of `process_train`'s comparison logic, `
//! on_repeat_timeout` the role of the repeat timer's ISR, and `take_ready`
//! the role of the main loop draining `isr_out`. Keeping these as three
//! small methods instead of one interrupt routine is what makes the hand-off
//! testable without real timers.

use crate::pulsetrain::Pulsetrain;
use crate::raw_timings::RawTimings;

/// A captured train paired with the raw intervals it came from, the unit
/// that moves through the coalescer's slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedTrain {
    pub raw: RawTimings,
    pub train: Pulsetrain,
}

#[derive(Debug, Default)]
pub struct RepeatCoalescer {
    compare: Option<CapturedTrain>,
    out: Option<CapturedTrain>,
}

impl RepeatCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a freshly captured train in. Always restarts the caller's
    /// repeat-timeout deadline afterward, whether the train was new,
    /// merged into the pending one as a repeat, or bumped a stale pending
    /// train out to the ready slot.
    pub fn submit(&mut self, now_us: u64, incoming: CapturedTrain) {
        match self.compare.take() {
            None => {
                self.compare = Some(incoming);
            }
            Some(mut pending) => {
                if pending.train.same_as(&incoming.train) {
                    pending.train.repeats += 1;
                    let elapsed = now_us.saturating_sub(pending.train.last_at);
                    let observed_gap = elapsed.saturating_sub(pending.train.duration as u64);
                    let observed_gap = observed_gap.min(u16::MAX as u64) as u16;
                    if pending.train.gap == 0 || observed_gap < pending.train.gap {
                        pending.train.gap = observed_gap;
                    }
                    pending.train.last_at = now_us;
                    self.compare = Some(pending);
                } else {
                    if self.out.is_none() {
                        self.out = Some(pending);
                    }
                    self.compare = Some(incoming);
                }
            }
        }
    }

    /// Repeat-timeout deadline elapsed: hand the pending train to the ready
    /// slot, unless a previous train is still waiting there to be drained.
    pub fn on_repeat_timeout(&mut self) {
        if self.compare.is_some() && self.out.is_none() {
            self.out = self.compare.take();
        }
    }

    /// Drain the ready slot, if anything has landed there.
    pub fn take_ready(&mut self) -> Option<CapturedTrain> {
        self.out.take()
    }

    pub fn reset(&mut self) {
        self.compare = None;
        self.out = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pulsetrain::PulseBin;

    fn train_with_bins(averages: &[u16]) -> Pulsetrain {
        let mut t = Pulsetrain::new();
        for &avg in averages {
            t.bins
                .push(PulseBin {
                    min: avg,
                    max: avg,
                    average: avg,
                    count: 1,
                })
                .unwrap();
            t.transitions.push(t.bins.len() as u8 - 1).unwrap();
        }
        t
    }

    #[test]
    fn first_submission_waits_in_compare() {
        let mut coalescer = RepeatCoalescer::new();
        coalescer.submit(0, CapturedTrain { raw: RawTimings::new(), train: train_with_bins(&[190, 575]) });
        assert!(coalescer.take_ready().is_none());
    }

    #[test]
    fn repeat_timeout_promotes_pending_to_ready() {
        let mut coalescer = RepeatCoalescer::new();
        coalescer.submit(0, CapturedTrain { raw: RawTimings::new(), train: train_with_bins(&[190, 575]) });
        coalescer.on_repeat_timeout();
        assert!(coalescer.take_ready().is_some());
        assert!(coalescer.take_ready().is_none());
    }

    #[test]
    fn matching_repeat_increments_count_instead_of_overwriting() {
        let mut coalescer = RepeatCoalescer::new();
        let train = train_with_bins(&[190, 575]);
        coalescer.submit(0, CapturedTrain { raw: RawTimings::new(), train: train.clone() });
        coalescer.submit(1000, CapturedTrain { raw: RawTimings::new(), train });
        coalescer.on_repeat_timeout();
        let ready = coalescer.take_ready().unwrap();
        assert_eq!(ready.train.repeats, 1);
    }

    #[test]
    fn distinct_train_while_out_occupied_overwrites_compare_without_reaching_out() {
        let mut coalescer = RepeatCoalescer::new();
        coalescer.submit(0, CapturedTrain { raw: RawTimings::new(), train: train_with_bins(&[190, 575]) });
        coalescer.on_repeat_timeout();
        // out is now occupied; submit two more distinct trains before it's drained
        coalescer.submit(1, CapturedTrain { raw: RawTimings::new(), train: train_with_bins(&[300, 800]) });
        coalescer.submit(2, CapturedTrain { raw: RawTimings::new(), train: train_with_bins(&[900, 100]) });
        let first = coalescer.take_ready().unwrap();
        assert_eq!(first.train.bins[0].average, 190);
        assert!(coalescer.take_ready().is_none());
    }
}
