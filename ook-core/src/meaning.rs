//! The decoded, human-meaningful view of a [`Pulsetrain`]: a sequence of
//! plain pulses/gaps and PWM/PPM data elements once a modulation scheme has
//! been guessed and applied.

use core::fmt;
use core::str::FromStr;

use heapless::Vec;

use crate::bits::{shift_in_bit, shift_out_bit};
use crate::error::Error;
use crate::pulsetrain::Pulsetrain;
use crate::{MAX_MEANING_DATA, MAX_MEANING_ELEMENTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeaningKind {
    Pulse,
    Gap,
    Pwm,
    Ppm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeaningElement {
    pub kind: MeaningKind,
    pub data: Vec<u8, MAX_MEANING_DATA>,
    pub data_len_bits: u16,
    pub time1: u16,
    pub time2: u16,
    pub time3: u16,
}

impl MeaningElement {
    fn pulse(time: u16) -> Self {
        MeaningElement {
            kind: MeaningKind::Pulse,
            data: Vec::new(),
            data_len_bits: 0,
            time1: time,
            time2: 0,
            time3: 0,
        }
    }

    fn gap(time: u16) -> Self {
        MeaningElement {
            kind: MeaningKind::Gap,
            data: Vec::new(),
            data_len_bits: 0,
            time1: time,
            time2: 0,
            time3: 0,
        }
    }

    fn data_len_bytes(&self) -> usize {
        (self.data_len_bits as usize + 7) / 8
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Meaning {
    pub elements: Vec<MeaningElement, MAX_MEANING_ELEMENTS>,
    pub suspected_incomplete: bool,
    pub repeats: u16,
    pub gap: u16,
}

impl Meaning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sniff test: the textual grammar is the only one of the three that
    /// uses parentheses.
    pub fn maybe(s: &str) -> bool {
        s.contains('(')
    }

    pub fn is_present(&self) -> bool {
        !self.elements.is_empty()
    }

    pub fn zap(&mut self) {
        self.elements.clear();
        self.suspected_incomplete = false;
    }

    pub fn add_pulse(&mut self, time: u16) -> Result<(), Error> {
        self.elements
            .push(MeaningElement::pulse(time))
            .map_err(|_| Error::Capacity)
    }

    pub fn add_gap(&mut self, time: u16) -> Result<(), Error> {
        self.elements
            .push(MeaningElement::gap(time))
            .map_err(|_| Error::Capacity)
    }

    pub fn add_pwm(&mut self, space: u16, mark: u16, bits: u16, data: &[u8]) -> Result<(), Error> {
        let mut element = MeaningElement {
            kind: MeaningKind::Pwm,
            data: Vec::new(),
            data_len_bits: bits,
            time1: space,
            time2: mark,
            time3: 0,
        };
        for &byte in data.iter().take(element.data_len_bytes()) {
            element.data.push(byte).map_err(|_| Error::Capacity)?;
        }
        self.elements.push(element).map_err(|_| Error::Capacity)
    }

    pub fn add_ppm(
        &mut self,
        space: u16,
        mark: u16,
        filler: u16,
        bits: u16,
        data: &[u8],
    ) -> Result<(), Error> {
        let mut element = MeaningElement {
            kind: MeaningKind::Ppm,
            data: Vec::new(),
            data_len_bits: bits,
            time1: space,
            time2: mark,
            time3: filler,
        };
        for &byte in data.iter().take(element.data_len_bytes()) {
            element.data.push(byte).map_err(|_| Error::Capacity)?;
        }
        self.elements.push(element).map_err(|_| Error::Capacity)
    }

    /// Guess a modulation scheme for `train` and decode it.
    ///
    /// Bins are ranked by how often they occur among the train's
    /// transitions. Two prevalent bins that account for most of the train
    /// suggest PWM (space/mark pulse-width encoding); three prevalent bins
    /// where the two smaller counts roughly sum to the largest suggest PPM
    /// (pulse-position encoding against a repeating filler pulse). Neither
    /// heuristic firing means the train can't be classified.
    pub fn from_pulsetrain(train: &Pulsetrain) -> Result<Self, Error> {
        let mut meaning = Meaning {
            repeats: train.repeats,
            gap: train.gap,
            ..Meaning::default()
        };

        let mut prevalence: Vec<(usize, u16), { crate::MAX_BINS }> = Vec::new();
        for (n, bin) in train.bins.iter().enumerate() {
            prevalence.push((n, bin.count)).ok();
        }
        prevalence.sort_by(|a, b| b.1.cmp(&a.1));

        let likely_pwm = prevalence.len() >= 2
            && (prevalence[0].1 as i32 - prevalence[1].1 as i32).abs() <= 2;
        let likely_ppm = prevalence.len() >= 3 && {
            let diff = prevalence[0].1 as i32 - (prevalence[1].1 as i32 + prevalence[2].1 as i32);
            (-2..=4).contains(&diff)
        };

        if !likely_pwm && !likely_ppm {
            return Err(Error::Unclassifiable);
        }

        let last = train.transitions.len().saturating_sub(1);
        let mut n = 0usize;
        while n < train.transitions.len() {
            let parsed = if likely_pwm {
                parse_pwm(
                    train,
                    n,
                    last,
                    prevalence[0].0,
                    prevalence[1].0,
                    &mut meaning,
                )?
            } else {
                parse_ppm(
                    train,
                    n,
                    last,
                    prevalence[1].0,
                    prevalence[2].0,
                    prevalence[0].0,
                    &mut meaning,
                )?
            };
            if let Some(consumed) = parsed {
                n += consumed;
                continue;
            }
            let bin_index = train.transitions[n] as usize;
            let average = train.bins[bin_index].average;
            if n % 2 == 0 {
                meaning.add_pulse(average)?;
            } else {
                meaning.add_gap(average)?;
            }
            n += 1;
        }

        if train.repeats > 1 {
            meaning.suspected_incomplete = false;
        }

        if meaning.elements.is_empty() {
            return Err(Error::Unclassifiable);
        }
        Ok(meaning)
    }
}

/// Returns `Ok(None)` when fewer than 8 bits were recognized (the run is left
/// to be emitted as plain pulses/gaps instead), `Ok(Some(transitions_consumed))`
/// once a data element was appended.
fn parse_pwm(
    train: &Pulsetrain,
    from: usize,
    to: usize,
    space: usize,
    mark: usize,
    meaning: &mut Meaning,
) -> Result<Option<usize>, Error> {
    let mut tmp = [0u8; MAX_MEANING_DATA];
    let mut consumed = 0usize;
    let mut num_bits = 0u16;
    let mut n = from;
    while n + 1 <= to {
        let current = train.transitions[n] as usize;
        let next = train.transitions[n + 1] as usize;
        if current == space && next == mark {
            num_bits += 1;
            shift_in_bit(&mut tmp, num_bits as usize, false);
            consumed += 2;
        } else if current == mark && next == space {
            num_bits += 1;
            shift_in_bit(&mut tmp, num_bits as usize, true);
            consumed += 2;
        } else {
            break;
        }
        n += 2;
    }
    if num_bits % 4 != 0 {
        meaning.suspected_incomplete = true;
    }
    if num_bits < 8 {
        return Ok(None);
    }
    let len_bytes = (num_bits as usize + 7) / 8;
    tmp[..len_bytes].reverse();
    meaning.add_pwm(
        train.bins[space].average,
        train.bins[mark].average,
        num_bits,
        &tmp[..len_bytes],
    )?;
    Ok(Some(consumed))
}

fn parse_ppm(
    train: &Pulsetrain,
    from: usize,
    to: usize,
    space: usize,
    mark: usize,
    filler: usize,
    meaning: &mut Meaning,
) -> Result<Option<usize>, Error> {
    let mut tmp = [0u8; MAX_MEANING_DATA];
    let mut consumed = 0usize;
    let mut num_bits = 0u16;
    let mut previous: Option<usize> = None;
    let mut n = from;
    while n <= to {
        let current = train.transitions[n] as usize;
        if current == space && previous == Some(filler) {
            num_bits += 1;
            shift_in_bit(&mut tmp, num_bits as usize, false);
            consumed += 1;
        } else if current == mark && previous == Some(filler) {
            num_bits += 1;
            shift_in_bit(&mut tmp, num_bits as usize, true);
            consumed += 1;
        } else if current == filler {
            if previous == Some(filler) {
                break;
            }
            consumed += 1;
        } else {
            break;
        }
        previous = Some(current);
        n += 1;
    }
    if num_bits % 4 != 0 {
        meaning.suspected_incomplete = true;
    }
    if num_bits < 8 {
        return Ok(None);
    }
    let len_bytes = (num_bits as usize + 7) / 8;
    tmp[..len_bytes].reverse();
    meaning.add_ppm(
        train.bins[space].average,
        train.bins[mark].average,
        train.bins[filler].average,
        num_bits,
        &tmp[..len_bytes],
    )?;
    Ok(Some(consumed))
}

/// Re-pack `element`'s data so the first bit decoded sits at the MSB of the
/// first byte, then shift bits out one at a time for the encoder.
pub(crate) fn element_bits(element: &MeaningElement) -> Result<Vec<bool, { crate::MAX_RAW_INTERVALS }>, Error> {
    let mut tmp = [0u8; MAX_MEANING_DATA];
    let len_bytes = element.data_len_bytes();
    tmp[..len_bytes].copy_from_slice(&element.data[..len_bytes]);
    let shift_left_by = (8 - (element.data_len_bits % 8) % 8) % 8;
    for _ in 0..shift_left_by {
        shift_out_bit(&mut tmp[..len_bytes], element.data_len_bits as usize);
    }
    let mut out = Vec::new();
    for _ in 0..element.data_len_bits {
        out.push(shift_out_bit(&mut tmp[..len_bytes], element.data_len_bits as usize))
            .map_err(|_| Error::Capacity)?;
    }
    Ok(out)
}

impl fmt::Display for Meaning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, element) in self.elements.iter().enumerate() {
            if n != 0 {
                f.write_str(" + ")?;
            }
            match element.kind {
                MeaningKind::Pulse => write!(f, "pulse({})", element.time1)?,
                MeaningKind::Gap => write!(f, "gap({})", element.time1)?,
                MeaningKind::Pwm => {
                    write!(
                        f,
                        "pwm(timing {}/{}, {} bits 0x",
                        element.time1, element.time2, element.data_len_bits
                    )?;
                    for byte in element.data.iter().take(element.data_len_bytes()) {
                        write!(f, "{:02X}", byte)?;
                    }
                    f.write_str(")")?;
                }
                MeaningKind::Ppm => {
                    write!(
                        f,
                        "ppm(timing {}/{}/{}, {} bits 0x",
                        element.time1, element.time2, element.time3, element.data_len_bits
                    )?;
                    for byte in element.data.iter().take(element.data_len_bytes()) {
                        write!(f, "{:02X}", byte)?;
                    }
                    f.write_str(")")?;
                }
            }
        }
        if self.repeats > 1 {
            write!(f, "  Repeated {} times with {} \u{b5}s gap.", self.repeats, self.gap)?;
        }
        Ok(())
    }
}

fn nth_number_from(s: &str, num: usize) -> Option<i64> {
    let mut count = 0usize;
    let mut chars = s.char_indices().peekable();
    while let Some(&(idx, c)) = chars.peek() {
        if c.is_ascii_digit() {
            if count == num {
                let rest = &s[idx..];
                let digits: alloc::string::String =
                    rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                return digits.parse().ok();
            }
            while chars.peek().map(|&(_, c)| c.is_ascii_digit()) == Some(true) {
                chars.next();
            }
            count += 1;
        } else {
            chars.next();
        }
    }
    None
}

impl FromStr for Meaning {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Error> {
        let lower = {
            let mut buf = alloc::string::String::with_capacity(input.len());
            for c in input.chars() {
                buf.extend(c.to_lowercase());
            }
            buf
        };
        let mut meaning = Meaning::new();
        meaning.repeats = 1;

        let (body, rptd) = match lower.find("repeated") {
            Some(idx) => {
                let tail = &lower[idx..];
                let repeats = nth_number_from(tail, 0).ok_or(Error::Syntax)?;
                let gap = nth_number_from(tail, 1).ok_or(Error::Syntax)?;
                if repeats == 0 || gap == 0 {
                    return Err(Error::Syntax);
                }
                meaning.repeats = repeats as u16;
                meaning.gap = gap as u16;
                (&lower[..idx], true)
            }
            None => (lower.as_str(), false),
        };
        let _ = rptd;

        for raw_chunk in body.split('+') {
            let work = raw_chunk.trim();
            if work.is_empty() {
                continue;
            }
            let open = work.find('(').ok_or(Error::Syntax)?;
            let close = work.find(')').ok_or(Error::Syntax)?;
            if close < open {
                return Err(Error::Syntax);
            }
            if let Some(rest) = work.strip_prefix("pulse") {
                let num = nth_number_from(rest, 0).ok_or(Error::Syntax)?;
                meaning.add_pulse(num as u16)?;
            } else if let Some(rest) = work.strip_prefix("gap") {
                let num = nth_number_from(rest, 0).ok_or(Error::Syntax)?;
                meaning.add_gap(num as u16)?;
            } else if let Some(rest) = work.strip_prefix("ppm") {
                let time1 = nth_number_from(rest, 0).ok_or(Error::Syntax)?;
                let time2 = nth_number_from(rest, 1).ok_or(Error::Syntax)?;
                let time3 = nth_number_from(rest, 2).ok_or(Error::Syntax)?;
                let bits = nth_number_from(rest, 3).ok_or(Error::Syntax)?;
                let check_zero = nth_number_from(rest, 4).ok_or(Error::Syntax)?;
                if time1 < 1 || time2 < 1 || time3 < 1 || check_zero != 0 {
                    return Err(Error::Syntax);
                }
                let hex = extract_hex(work)?;
                let bytes_expected = (bits as usize + 7) / 8;
                if hex.len() != bytes_expected * 2 {
                    return Err(Error::Syntax);
                }
                let mut data = [0u8; MAX_MEANING_DATA];
                for i in 0..bytes_expected {
                    data[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                        .map_err(|_| Error::Syntax)?;
                }
                meaning.add_ppm(time1 as u16, time2 as u16, time3 as u16, bits as u16, &data[..bytes_expected])?;
            } else if let Some(rest) = work.strip_prefix("pwm") {
                let time1 = nth_number_from(rest, 0).ok_or(Error::Syntax)?;
                let time2 = nth_number_from(rest, 1).ok_or(Error::Syntax)?;
                let bits = nth_number_from(rest, 2).ok_or(Error::Syntax)?;
                let check_zero = nth_number_from(rest, 3).ok_or(Error::Syntax)?;
                if time1 < 1 || time2 < 1 || check_zero != 0 {
                    return Err(Error::Syntax);
                }
                let hex = extract_hex(work)?;
                let bytes_expected = (bits as usize + 7) / 8;
                if hex.len() != bytes_expected * 2 {
                    return Err(Error::Syntax);
                }
                let mut data = [0u8; MAX_MEANING_DATA];
                for i in 0..bytes_expected {
                    data[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                        .map_err(|_| Error::Syntax)?;
                }
                meaning.add_pwm(time1 as u16, time2 as u16, bits as u16, &data[..bytes_expected])?;
            } else {
                return Err(Error::Syntax);
            }
        }
        Ok(meaning)
    }
}

fn extract_hex(work: &str) -> Result<&str, Error> {
    let start = work.find("0x").ok_or(Error::Syntax)?;
    let end = work.find(')').ok_or(Error::Syntax)?;
    if end < start + 2 {
        return Err(Error::Syntax);
    }
    Ok(work[start + 2..end].trim())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn maybe_detects_parentheses() {
        assert!(Meaning::maybe("pulse(100)"));
        assert!(!Meaning::maybe("100,200,300"));
    }

    #[test]
    fn display_then_parse_round_trips_plain_pulse() {
        let mut m = Meaning::new();
        m.add_pulse(500).unwrap();
        m.add_gap(1500).unwrap();
        let text = alloc::format!("{}", m);
        let parsed: Meaning = text.parse().unwrap();
        assert_eq!(parsed.elements.len(), 2);
        assert_eq!(parsed.elements[0].time1, 500);
        assert_eq!(parsed.elements[1].time1, 1500);
    }

    #[test]
    fn display_then_parse_round_trips_pwm() {
        let mut m = Meaning::new();
        m.add_pwm(500, 1500, 8, &[0xA5]).unwrap();
        let text = alloc::format!("{}", m);
        let parsed: Meaning = text.parse().unwrap();
        assert_eq!(parsed.elements[0].data.as_slice(), &[0xA5]);
        assert_eq!(parsed.elements[0].time1, 500);
        assert_eq!(parsed.elements[0].time2, 1500);
    }

    #[test]
    fn rejects_mismatched_hex_length() {
        assert!("pwm(timing 500/1500, 16 bits 0xA5)".parse::<Meaning>().is_err());
    }
}

#[cfg(test)]
mod quickcheck_test {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// An asymmetric multi-byte PWM payload: `space`/`mark` are kept apart so
    /// `Pulsetrain::from_meaning` never collapses them into one bin.
    #[derive(Clone, Debug)]
    struct PwmBytes {
        space: u16,
        mark: u16,
        data: alloc::vec::Vec<u8>,
    }

    impl Arbitrary for PwmBytes {
        fn arbitrary(g: &mut Gen) -> Self {
            let len = (usize::arbitrary(g) % 4) + 1;
            let data = (0..len).map(|_| u8::arbitrary(g)).collect();
            let space = (u16::arbitrary(g) % 2000) + 100;
            let mark = space + (u16::arbitrary(g) % 2000) + 400;
            PwmBytes { space, mark, data }
        }
    }

    #[quickcheck]
    fn pwm_bytes_survive_a_pulsetrain_round_trip(input: PwmBytes) -> bool {
        let bits = (input.data.len() * 8) as u16;
        let mut meaning = Meaning::new();
        if meaning.add_pwm(input.space, input.mark, bits, &input.data).is_err() {
            return true;
        }
        let train = match crate::pulsetrain::Pulsetrain::from_meaning(&meaning) {
            Ok(t) => t,
            Err(_) => return false,
        };
        let decoded = match Meaning::from_pulsetrain(&train) {
            Ok(m) => m,
            Err(_) => return false,
        };
        decoded
            .elements
            .iter()
            .any(|e| e.kind == MeaningKind::Pwm && e.data.as_slice() == input.data.as_slice())
    }
}
