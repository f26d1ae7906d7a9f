//! Threshold color scale: evenly spaced breakpoints over a value range.

use crate::error::{MapError, MapResult};
use crate::types::Color;

/// 9-class sequential "Greens" scheme, light to dark.
pub const GREENS: [Color; 9] = [
    Color::rgb(0xf7, 0xfc, 0xf5),
    Color::rgb(0xe5, 0xf5, 0xe0),
    Color::rgb(0xc7, 0xe9, 0xc0),
    Color::rgb(0xa1, 0xd9, 0x9b),
    Color::rgb(0x74, 0xc4, 0x76),
    Color::rgb(0x41, 0xab, 0x5d),
    Color::rgb(0x23, 0x8b, 0x45),
    Color::rgb(0x00, 0x6d, 0x2c),
    Color::rgb(0x00, 0x44, 0x1b),
];

/// Step function from values to palette colors.
///
/// `value < breakpoints[0]` maps to `palette[0]`, `breakpoints[i-1] <= value < breakpoints[i]`
/// maps to `palette[i]` and anything at or above the last breakpoint maps to the last color.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdScale {
    breakpoints: Vec<f64>,
    palette: Vec<Color>,
}

impl ThresholdScale {
    /// Builds `palette.len() - 1` breakpoints starting at `min`, one step apart.
    pub fn build(min: f64, max: f64, palette: &[Color]) -> MapResult<Self> {
        if !min.is_finite() || !max.is_finite() || max <= min {
            return Err(MapError::InvalidScaleRange { min, max });
        }
        if palette.len() < 2 {
            return Err(MapError::PaletteTooSmall(palette.len()));
        }

        let buckets = palette.len() - 1;
        let step = (max - min) / buckets as f64;
        let breakpoints = (0..buckets).map(|i| min + i as f64 * step).collect();

        Ok(Self {
            breakpoints,
            palette: palette.to_vec(),
        })
    }

    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    /// Palette index for `value`. NaN lands in the first bucket.
    pub fn bucket(&self, value: f64) -> usize {
        // number of breakpoints <= value
        self.breakpoints.partition_point(|b| *b <= value)
    }

    pub fn classify(&self, value: f64) -> Color {
        self.palette[self.bucket(value)]
    }
}

/// Smallest and largest non-NaN value, or `None` when there is none.
pub fn extent<I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
