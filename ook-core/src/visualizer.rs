//! Renders a train of alternating high/low intervals as a row of block
//! characters, two binary "pixels" per character (`▀`, ` `, `▝`, `▘`).
//!
//! Each interval contributes at least one pixel so that even the shortest
//! pulse stays visible, then intervals are quantized to `pixel_micros`-sized
//! steps and packed two at a time into a block glyph.

use heapless::Vec;

use crate::error::Error;
use crate::pulsetrain::Pulsetrain;
use crate::MAX_RAW_INTERVALS;

const MAX_PIXELS: usize = MAX_RAW_INTERVALS * 8;

pub struct Visualizer {
    pixels: Vec<bool, MAX_PIXELS>,
}

impl Visualizer {
    fn pixels_for(interval: u16, pixel_micros: u16) -> usize {
        if pixel_micros == 0 {
            return 0;
        }
        let quantized = (interval as u32 + (pixel_micros as u32 / 2)) / pixel_micros as u32;
        quantized.max(1) as usize
    }

    pub fn from_intervals(intervals: &[u16], pixel_micros: u16) -> Result<Self, Error> {
        if pixel_micros == 0 {
            return Ok(Visualizer { pixels: Vec::new() });
        }
        let mut pixels = Vec::new();
        for (n, &interval) in intervals.iter().enumerate() {
            let bit = n % 2 == 0;
            for _ in 0..Self::pixels_for(interval, pixel_micros) {
                pixels.push(bit).map_err(|_| Error::Capacity)?;
            }
        }
        pixels.push(false).map_err(|_| Error::Capacity)?;
        Ok(Visualizer { pixels })
    }

    pub fn from_pulsetrain(train: &Pulsetrain, pixel_micros: u16) -> Result<Self, Error> {
        if pixel_micros == 0 {
            return Ok(Visualizer { pixels: Vec::new() });
        }
        let mut multiples: Vec<usize, { crate::MAX_BINS }> = Vec::new();
        for bin in train.bins.iter() {
            multiples
                .push(Self::pixels_for(bin.average, pixel_micros))
                .map_err(|_| Error::Capacity)?;
        }
        let mut pixels = Vec::new();
        for (n, &bin_index) in train.transitions.iter().enumerate() {
            let bit = n % 2 == 0;
            let count = multiples.get(bin_index as usize).copied().unwrap_or(1);
            for _ in 0..count {
                pixels.push(bit).map_err(|_| Error::Capacity)?;
            }
        }
        pixels.push(false).map_err(|_| Error::Capacity)?;
        Ok(Visualizer { pixels })
    }

    pub fn write<W: core::fmt::Write>(&self, w: &mut W) -> core::fmt::Result {
        for chunk in self.pixels.chunks(2) {
            let glyph = match chunk {
                [true, true] => '\u{2580}',
                [false, false] => ' ',
                [false, true] => '\u{259d}',
                [true, false] => '\u{2598}',
                [only] => {
                    if *only {
                        '\u{2598}'
                    } else {
                        ' '
                    }
                }
                [] => continue,
                _ => unreachable!(),
            };
            w.write_char(glyph)?;
        }
        Ok(())
    }
}

impl core::fmt::Display for Visualizer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.write(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_pulse_still_gets_one_pixel() {
        let v = Visualizer::from_intervals(&[10, 10], 200).unwrap();
        let text = alloc::format!("{}", v);
        assert!(!text.is_empty());
    }

    #[test]
    fn zero_base_yields_empty_output() {
        let v = Visualizer::from_intervals(&[500, 500], 0).unwrap();
        assert_eq!(alloc::format!("{}", v), "");
    }
}
