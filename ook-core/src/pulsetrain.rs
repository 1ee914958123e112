//! Intervals normalized into a small number of duration bins, with each
//! transition recorded as which bin it fell into. This is the shape the
//! classifier, the repeat coalescer and both textual codecs operate on.

use core::fmt;
use core::str::FromStr;

use heapless::Vec;

use crate::error::Error;
#[cfg(feature = "alloc")]
use crate::meaning::{element_bits, Meaning, MeaningKind};
use crate::raw_timings::RawTimings;
use crate::{MAX_BINS, MAX_RAW_INTERVALS};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseBin {
    pub min: u16,
    pub max: u16,
    pub average: u16,
    pub count: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pulsetrain {
    pub bins: Vec<PulseBin, MAX_BINS>,
    pub transitions: Vec<u8, MAX_RAW_INTERVALS>,
    pub duration: u32,
    pub first_at: u64,
    pub last_at: u64,
    pub repeats: u16,
    pub gap: u16,
}

impl Pulsetrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sniff test: at least 10 characters, all of which are digits (a
    /// pulsetrain string's transitions come before its first comma and are
    /// single digits, so a short prefix of pure digits is a strong signal).
    pub fn maybe(s: &str) -> bool {
        if s.len() < 10 {
            return false;
        }
        s.chars().take(10).all(|c| c.is_ascii_digit())
    }

    pub fn is_present(&self) -> bool {
        !self.transitions.is_empty()
    }

    pub fn zap(&mut self) {
        self.transitions.clear();
        self.bins.clear();
        self.gap = 0;
        self.repeats = 0;
        self.last_at = 0;
    }

    /// Whether `other` looks like a repeat of this train: same transition
    /// sequence, same number of bins, and every bin's average within 300 µs.
    pub fn same_as(&self, other: &Pulsetrain) -> bool {
        if self.transitions.len() != other.transitions.len() {
            return false;
        }
        if self.bins.len() != other.bins.len() {
            return false;
        }
        if self.transitions != other.transitions {
            return false;
        }
        for (a, b) in self.bins.iter().zip(other.bins.iter()) {
            let diff = (a.average as i32 - b.average as i32).abs();
            if diff > 300 {
                return false;
            }
        }
        true
    }

    /// Sort the raw intervals, bucket them into bins no wider than
    /// `bin_width` µs, then walk the original (unsorted) sequence recording
    /// which bin each transition landed in.
    pub fn from_raw_timings(raw: &RawTimings, bin_width: u16) -> Result<Self, Error> {
        let mut train = Pulsetrain::new();
        let mut sorted: Vec<u16, MAX_RAW_INTERVALS> = raw.intervals.clone();
        sorted.sort_unstable();

        for &interval in sorted.iter() {
            let needs_new_bin = match train.bins.last() {
                None => true,
                Some(last) => interval > last.min + bin_width,
            };
            if needs_new_bin {
                train
                    .bins
                    .push(PulseBin {
                        min: interval,
                        max: interval,
                        average: 0,
                        count: 0,
                    })
                    .map_err(|_| Error::Capacity)?;
            }
            if let Some(last) = train.bins.last_mut() {
                last.max = interval;
            }
        }

        train.duration = 0;
        for &interval in raw.intervals.iter() {
            train.duration += interval as u32;
            let bin_index = train
                .bins
                .iter()
                .position(|bin| interval >= bin.min && interval <= bin.max)
                .ok_or(Error::OutOfRange)?;
            train
                .transitions
                .push(bin_index as u8)
                .map_err(|_| Error::Capacity)?;
            let bin = &mut train.bins[bin_index];
            bin.average += interval;
            bin.count += 1;
        }
        for bin in train.bins.iter_mut() {
            if bin.count > 0 {
                bin.average /= bin.count;
            }
        }
        train.repeats = 1;
        Ok(train)
    }

    /// Human summary: `"<n> pulses over <duration> µs[, repeated <r> times
    /// with gaps of <g> µs]"`.
    pub fn write_summary<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        write!(
            w,
            "{} pulses over {} \u{b5}s",
            (self.transitions.len() + 1) / 2,
            self.duration
        )?;
        if self.repeats > 1 {
            write!(
                w,
                ", repeated {} times with gaps of {} \u{b5}s",
                self.repeats, self.gap
            )?;
        }
        Ok(())
    }

    /// Tabular listing of each bin's `min`/`avg`/`max`/`count`.
    pub fn write_bin_list<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        write!(w, " bin     min     avg     max  count")?;
        for (n, bin) in self.bins.iter().enumerate() {
            write!(
                w,
                "\n{:4} {:7} {:7} {:7} {:6}",
                n, bin.min, bin.average, bin.max, bin.count
            )?;
        }
        Ok(())
    }

    pub fn visualizer(&self, pixel_micros: u16) -> Result<crate::visualizer::Visualizer, Error> {
        crate::visualizer::Visualizer::from_pulsetrain(self, pixel_micros)
    }

    fn add_to_bins(&mut self, time: u16) -> Result<(), Error> {
        if self.bins.iter().any(|bin| bin.average == time) {
            return Ok(());
        }
        if self.bins.len() == MAX_BINS {
            return Ok(());
        }
        self.bins
            .push(PulseBin {
                min: time,
                max: time,
                average: time,
                count: 0,
            })
            .map_err(|_| Error::Capacity)
    }

    fn bin_from_time(&self, time: u16) -> Option<u8> {
        self.bins
            .iter()
            .position(|bin| bin.average == time)
            .map(|n| n as u8)
    }

    /// Re-synthesize a train from a decoded [`Meaning`], the inverse of the
    /// classifier. Bins are built fresh from the timings named by each
    /// element, sorted by average duration, then every element is re-expanded
    /// into mark/space transitions.
    #[cfg(feature = "alloc")]
    pub fn from_meaning(meaning: &Meaning) -> Result<Self, Error> {
        let mut train = Pulsetrain::new();
        for element in meaning.elements.iter() {
            match element.kind {
                MeaningKind::Pulse | MeaningKind::Gap => train.add_to_bins(element.time1)?,
                MeaningKind::Pwm => {
                    train.add_to_bins(element.time1)?;
                    train.add_to_bins(element.time2)?;
                }
                MeaningKind::Ppm => {
                    train.add_to_bins(element.time1)?;
                    train.add_to_bins(element.time2)?;
                    train.add_to_bins(element.time3)?;
                }
            }
        }
        train.bins.sort_by_key(|bin| bin.average);

        for (n, element) in meaning.elements.iter().enumerate() {
            match element.kind {
                MeaningKind::Pulse => {
                    if train.transitions.len() % 2 == 1 {
                        let filler_time = match n.checked_sub(1).map(|p| &meaning.elements[p]) {
                            Some(prev) if prev.kind == MeaningKind::Ppm => prev.time3,
                            Some(prev) if prev.kind == MeaningKind::Pwm => prev.time1,
                            _ => return Err(Error::Syntax),
                        };
                        let bin = train.bin_from_time(filler_time).ok_or(Error::OutOfRange)?;
                        train.transitions.push(bin).map_err(|_| Error::Capacity)?;
                    }
                    let bin = train.bin_from_time(element.time1).ok_or(Error::OutOfRange)?;
                    train.transitions.push(bin).map_err(|_| Error::Capacity)?;
                }
                MeaningKind::Gap => {
                    if train.transitions.len() % 2 == 0 {
                        return Err(Error::Syntax);
                    }
                    let bin = train.bin_from_time(element.time1).ok_or(Error::OutOfRange)?;
                    train.transitions.push(bin).map_err(|_| Error::Capacity)?;
                }
                MeaningKind::Pwm => {
                    let bits = element_bits(element)?;
                    for bit in bits {
                        let (first, second) = if bit {
                            (element.time2, element.time1)
                        } else {
                            (element.time1, element.time2)
                        };
                        let a = train.bin_from_time(first).ok_or(Error::OutOfRange)?;
                        let b = train.bin_from_time(second).ok_or(Error::OutOfRange)?;
                        train.transitions.push(a).map_err(|_| Error::Capacity)?;
                        train.transitions.push(b).map_err(|_| Error::Capacity)?;
                    }
                }
                MeaningKind::Ppm => {
                    if train.transitions.len() % 2 == 1 {
                        let filler = train.bin_from_time(element.time3).ok_or(Error::OutOfRange)?;
                        train.transitions.push(filler).map_err(|_| Error::Capacity)?;
                    }
                    let bits = element_bits(element)?;
                    for bit in bits {
                        let mark_or_space = if bit { element.time2 } else { element.time1 };
                        let a = train.bin_from_time(mark_or_space).ok_or(Error::OutOfRange)?;
                        let filler = train.bin_from_time(element.time3).ok_or(Error::OutOfRange)?;
                        train.transitions.push(a).map_err(|_| Error::Capacity)?;
                        train.transitions.push(filler).map_err(|_| Error::Capacity)?;
                    }
                    train.transitions.pop();
                }
            }
        }

        for &bin_index in train.transitions.iter() {
            let bin = &mut train.bins[bin_index as usize];
            bin.count += 1;
            train.duration += bin.average as u32;
        }
        train.repeats = meaning.repeats;
        train.gap = meaning.gap;
        Ok(train)
    }
}

impl fmt::Display for Pulsetrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.transitions.is_empty() {
            return f.write_str("<empty Pulsetrain>");
        }
        for &bin_index in self.transitions.iter() {
            write!(f, "{}", bin_index)?;
        }
        for bin in self.bins.iter() {
            write!(f, ",{}", bin.average)?;
        }
        if self.repeats > 1 {
            write!(f, "*{}@{}", self.repeats, self.gap)?;
        }
        Ok(())
    }
}

impl FromStr for Pulsetrain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut train = Pulsetrain::new();
        let first_comma = s.find(',').ok_or(Error::Syntax)?;

        let mut num_bins = 0u8;
        for c in s[..first_comma].chars() {
            let digit = c.to_digit(10).ok_or(Error::Syntax)? as u8;
            train.transitions.push(digit).map_err(|_| Error::Capacity)?;
            if digit > num_bins {
                num_bins = digit;
            }
        }
        num_bins += 1;

        let (bin_list_end, repeats, gap) = match s.find('*') {
            None => (s.len(), 1u16, 0u16),
            Some(star) => {
                let at = s.find('@').ok_or(Error::Syntax)?;
                let repeats: u16 = s[star + 1..at].parse()?;
                let gap: u16 = s[at + 1..].parse()?;
                if repeats == 0 || gap == 0 {
                    return Err(Error::Syntax);
                }
                (star, repeats, gap)
            }
        };
        train.repeats = repeats;
        train.gap = gap;

        let mut bin_start = first_comma + 1;
        for _ in 0..num_bins {
            let next_comma = s[bin_start..bin_list_end]
                .find(',')
                .map(|n| bin_start + n)
                .unwrap_or(bin_list_end);
            let average: u16 = s[bin_start..next_comma].parse()?;
            if average == 0 {
                return Err(Error::Syntax);
            }
            train
                .bins
                .push(PulseBin {
                    min: average,
                    max: average,
                    average,
                    count: 0,
                })
                .map_err(|_| Error::Capacity)?;
            bin_start = next_comma + 1;
        }

        for &bin_index in train.transitions.iter() {
            let bin = train
                .bins
                .get_mut(bin_index as usize)
                .ok_or(Error::OutOfRange)?;
            bin.count += 1;
            train.duration += bin.average as u32;
        }
        Ok(train)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_raw() -> RawTimings {
        "190,575,190,575,575,190,190,575,575,190,190,575,575,190,190,190,190,190,575,575,190,575,190,190,575,5906"
            .parse()
            .unwrap()
    }

    #[test]
    fn from_raw_timings_builds_bins_and_transitions() {
        let raw = sample_raw();
        let train = Pulsetrain::from_raw_timings(&raw, 150).unwrap();
        assert!(train.bins.len() >= 2);
        assert_eq!(train.transitions.len(), raw.intervals.len());
    }

    #[test]
    fn display_then_parse_round_trips() {
        let raw = sample_raw();
        let train = Pulsetrain::from_raw_timings(&raw, 150).unwrap();
        let text = alloc::format!("{}", train);
        let parsed: Pulsetrain = text.parse().unwrap();
        assert_eq!(parsed.transitions, train.transitions);
        assert_eq!(parsed.bins.len(), train.bins.len());
    }

    #[test]
    fn same_as_tolerates_small_jitter() {
        let raw_a: RawTimings = "190,575,190,5906".parse().unwrap();
        let raw_b: RawTimings = "210,560,205,5906".parse().unwrap();
        let a = Pulsetrain::from_raw_timings(&raw_a, 150).unwrap();
        let b = Pulsetrain::from_raw_timings(&raw_b, 150).unwrap();
        assert!(a.same_as(&b));
    }

    #[test]
    fn maybe_rejects_short_strings() {
        assert!(!Pulsetrain::maybe("12345"));
    }
}

#[cfg(test)]
mod quickcheck_test {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[derive(Clone, Debug)]
    struct Intervals(alloc::vec::Vec<u16>);

    impl Arbitrary for Intervals {
        fn arbitrary(g: &mut Gen) -> Self {
            let len = (usize::arbitrary(g) % 32) + 2;
            let values = (0..len).map(|_| (u16::arbitrary(g) % 2000) + 1).collect();
            Intervals(values)
        }
    }

    #[quickcheck]
    fn display_then_parse_round_trips(intervals: Intervals) -> bool {
        let mut raw = RawTimings::new();
        for value in intervals.0 {
            if raw.push(value).is_err() {
                return true;
            }
        }
        let train = match Pulsetrain::from_raw_timings(&raw, 150) {
            Ok(t) => t,
            Err(_) => return true,
        };
        let text = alloc::format!("{}", train);
        let parsed: Pulsetrain = match text.parse() {
            Ok(p) => p,
            Err(_) => return false,
        };
        parsed.transitions == train.transitions
            && parsed.bins.iter().map(|b| b.average).eq(train.bins.iter().map(|b| b.average))
    }
}
