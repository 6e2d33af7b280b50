//! # Grid Lengths
//!
//! The user-facing size specification of a track: fixed pixels, size to
//! content, or a weighted share of the remaining space.
//!
//! ## Text format
//!
//! | Text | Meaning |
//! |---|---|
//! | `auto` | size to content |
//! | `*`, `2.5*` | star with weight 1 / 2.5 |
//! | `100`, `100px` | fixed pixels |
//! | `1in`, `2.54cm`, `72pt` | fixed, converted to pixels at 96 per inch |
//!
//! Numbers are parsed culture-invariant. [`LengthParseOptions`] adds a fallback
//! decimal separator for input written with a comma.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{GridError, GridResult};

const PIXELS_PER_INCH: f64 = 96.0;
const PIXELS_PER_CM: f64 = 96.0 / 2.54;
const PIXELS_PER_POINT: f64 = 96.0 / 72.0;

/// Sizing mode of a [`GridLength`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GridUnit {
    #[default]
    Auto,
    Pixel,
    Star,
}

/// Track size specification. Immutable; the magnitude is always finite and
/// non-negative.
///
/// Serializes in the text format, so `"2*"` in a config file is a valid value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct GridLength {
    value: f64,
    unit: GridUnit,
}

impl GridLength {
    /// Size to content.
    pub const AUTO: GridLength = GridLength {
        value: 1.0,
        unit: GridUnit::Auto,
    };

    /// A single share of the remaining space.
    pub const ONE_STAR: GridLength = GridLength {
        value: 1.0,
        unit: GridUnit::Star,
    };

    /// Fixed size in pixels.
    pub fn fixed(pixels: f64) -> GridResult<Self> {
        Self::validated(pixels, GridUnit::Pixel)
    }

    /// Weighted share of the remaining space.
    pub fn star(weight: f64) -> GridResult<Self> {
        Self::validated(weight, GridUnit::Star)
    }

    fn validated(value: f64, unit: GridUnit) -> GridResult<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(GridError::InvalidLength { value });
        }
        Ok(Self { value, unit })
    }

    /// Star length bypassing validation. Used by resolver tests that exercise
    /// the infinite-weight path.
    #[cfg(test)]
    pub(crate) fn star_unchecked(weight: f64) -> Self {
        Self {
            value: weight,
            unit: GridUnit::Star,
        }
    }

    /// Pixel size for fixed lengths, weight for star lengths, 1.0 for auto.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> GridUnit {
        self.unit
    }

    pub fn is_auto(&self) -> bool {
        self.unit == GridUnit::Auto
    }

    pub fn is_star(&self) -> bool {
        self.unit == GridUnit::Star
    }

    pub fn is_absolute(&self) -> bool {
        self.unit == GridUnit::Pixel
    }

    /// Parse with an explicit decimal-separator fallback.
    pub fn parse_with(text: &str, options: &LengthParseOptions) -> GridResult<Self> {
        let lower = text.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return Err(GridError::Parse(text.to_string()));
        }

        if lower == "auto" {
            return Ok(Self::AUTO);
        }

        if let Some(weight) = lower.strip_suffix('*') {
            let weight = weight.trim_end();
            if weight.is_empty() {
                return Ok(Self::ONE_STAR);
            }
            let weight = parse_number(weight, options)
                .ok_or_else(|| GridError::Parse(text.to_string()))?;
            return Self::star(weight);
        }

        let (number, factor) = if let Some(n) = lower.strip_suffix("px") {
            (n, 1.0)
        } else if let Some(n) = lower.strip_suffix("in") {
            (n, PIXELS_PER_INCH)
        } else if let Some(n) = lower.strip_suffix("cm") {
            (n, PIXELS_PER_CM)
        } else if let Some(n) = lower.strip_suffix("pt") {
            (n, PIXELS_PER_POINT)
        } else {
            (lower.as_str(), 1.0)
        };

        let number = parse_number(number.trim_end(), options)
            .ok_or_else(|| GridError::Parse(text.to_string()))?;
        Self::fixed(number * factor)
    }
}

impl Default for GridLength {
    fn default() -> Self {
        Self::AUTO
    }
}

/// Options for [`GridLength::parse_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthParseOptions {
    /// Decimal separator tried when invariant parsing fails.
    pub decimal_separator: char,
}

impl Default for LengthParseOptions {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
        }
    }
}

fn parse_number(text: &str, options: &LengthParseOptions) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    // Reject spellings like "inf" or "nan" that f64 parsing accepts.
    let allowed =
        |c: char| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e') || c == options.decimal_separator;
    if !text.chars().all(allowed) {
        return None;
    }
    if let Ok(value) = text.parse::<f64>() {
        return Some(value);
    }
    if options.decimal_separator != '.' && text.contains(options.decimal_separator) {
        let swapped = text.replace(options.decimal_separator, ".");
        return swapped.parse::<f64>().ok();
    }
    None
}

impl FromStr for GridLength {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with(s, &LengthParseOptions::default())
    }
}

impl fmt::Display for GridLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            GridUnit::Auto => f.write_str("auto"),
            GridUnit::Star if self.value == 1.0 => f.write_str("*"),
            GridUnit::Star => write!(f, "{}*", self.value),
            GridUnit::Pixel => write!(f, "{}", self.value),
        }
    }
}

impl From<GridLength> for String {
    fn from(length: GridLength) -> Self {
        length.to_string()
    }
}

impl TryFrom<String> for GridLength {
    type Error = GridError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}
