//! Microsecond intervals straight off the edge-capture ISR: alternating
//! mark/space durations, starting with a mark, with no notion of bins yet.

use core::fmt;
use core::str::FromStr;

use heapless::Vec;

use crate::error::Error;
use crate::pulsetrain::Pulsetrain;
use crate::MAX_RAW_INTERVALS;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawTimings {
    pub intervals: Vec<u16, MAX_RAW_INTERVALS>,
}

impl RawTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heuristic sniff test used by the textual decoder to decide which
    /// representation a pasted string is meant to be: digits and commas only,
    /// with more than 15 commas (a short train would also match `Pulsetrain`,
    /// whose transitions are a run of single digits with no separators).
    pub fn maybe(s: &str) -> bool {
        let mut commas = 0u32;
        for c in s.chars() {
            if !c.is_ascii_digit() && c != ',' {
                return false;
            }
            if c == ',' {
                commas += 1;
            }
        }
        commas > 15
    }

    pub fn is_present(&self) -> bool {
        !self.intervals.is_empty()
    }

    pub fn zap(&mut self) {
        self.intervals.clear();
    }

    pub fn push(&mut self, interval: u16) -> Result<(), Error> {
        self.intervals.push(interval).map_err(|_| Error::Capacity)
    }

    /// Rebuild a raw interval stream from a [`Pulsetrain`], substituting each
    /// bin's average duration for every transition. Loses the original jitter
    /// within each bin; used to feed a decoded/simulated train back through
    /// the visualizer or a transmitter that wants a flat interval list.
    pub fn from_pulsetrain(train: &Pulsetrain) -> Result<Self, Error> {
        let mut raw = RawTimings::new();
        for &bin_index in train.transitions.iter() {
            let bin = train
                .bins
                .get(bin_index as usize)
                .ok_or(Error::OutOfRange)?;
            raw.push(bin.average)?;
        }
        Ok(raw)
    }

    pub fn visualizer(&self, pixel_micros: u16) -> Result<crate::visualizer::Visualizer, Error> {
        crate::visualizer::Visualizer::from_intervals(&self.intervals, pixel_micros)
    }
}

impl fmt::Display for RawTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, interval) in self.intervals.iter().enumerate() {
            if n != 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", interval)?;
        }
        Ok(())
    }
}

/// One interval, with an optional leading comma so [`many1`] can walk the
/// whole comma-separated list without a separate `separated_list1` shape
/// (which would reject a lone leading value).
fn interval(input: &str) -> nom::IResult<&str, u16> {
    use nom::character::complete::{char, digit1};
    use nom::combinator::{map_res, opt};

    let (input, _) = opt(char(','))(input)?;
    map_res(digit1, str::parse::<u16>)(input)
}

impl FromStr for RawTimings {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        use nom::multi::many1;

        let (rest, values) = many1(interval)(s).map_err(|_: nom::Err<nom::error::Error<&str>>| Error::Syntax)?;
        if !rest.is_empty() {
            return Err(Error::Syntax);
        }
        let mut raw = RawTimings::new();
        for value in values {
            if value == 0 {
                return Err(Error::Syntax);
            }
            raw.push(value)?;
        }
        if raw.intervals.is_empty() {
            return Err(Error::Syntax);
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn maybe_requires_many_commas() {
        assert!(!RawTimings::maybe("123,456"));
        let long = "1,".repeat(16) + "1";
        assert!(RawTimings::maybe(&long));
    }

    #[test]
    fn maybe_rejects_non_digits() {
        assert!(!RawTimings::maybe("12a,34"));
    }

    #[test]
    fn round_trips_through_display_and_parse() {
        let raw: RawTimings = "190,575,5906".parse().unwrap();
        assert_eq!(raw.to_display_string(), "190,575,5906");
    }

    #[test]
    fn rejects_zero_interval() {
        assert!("190,0,5906".parse::<RawTimings>().is_err());
    }

    impl RawTimings {
        fn to_display_string(&self) -> alloc::string::String {
            alloc::format!("{}", self)
        }
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
            let len = (usize::arbitrary(g) % 32) + 1;
            let values = (0..len).map(|_| (u16::arbitrary(g) % (u16::MAX - 1)) + 1).collect();
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
        let text = alloc::format!("{}", raw);
        let parsed: RawTimings = match text.parse() {
            Ok(p) => p,
            Err(_) => return false,
        };
        parsed == raw
    }
}
