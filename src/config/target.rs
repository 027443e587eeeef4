use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The display mode that should be reported as preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverrideTarget {
    pub width: u32,
    pub height: u32,
    pub refresh: u32,
}

impl OverrideTarget {
    pub fn new(width: u32, height: u32, refresh: u32) -> Self {
        Self {
            width,
            height,
            refresh,
        }
    }

    /// Exact comparison against a mode's resolution and integer refresh rate.
    pub fn matches(&self, width: u32, height: u32, refresh: u32) -> bool {
        self.width == width && self.height == height && self.refresh == refresh
    }
}

impl fmt::Display for OverrideTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{}", self.width, self.height, self.refresh)
    }
}

/// Parses `<width>x<height>@<refresh>`.
///
/// Anything after the refresh digits is ignored, so `1920x1080@60Hz` reads as
/// `1920x1080@60`.
impl FromStr for OverrideTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (width, rest) = take_number(s, "width")?;
        let rest = rest
            .strip_prefix('x')
            .ok_or_else(|| malformed(s, "expected 'x' after the width"))?;
        let (height, rest) = take_number(rest, "height")?;
        let rest = rest
            .strip_prefix('@')
            .ok_or_else(|| malformed(s, "expected '@' after the height"))?;
        let (refresh, _trailing) = take_number(rest, "refresh rate")?;

        Ok(Self::new(width, height, refresh))
    }
}

/// Splits a leading run of ASCII digits off `input` and parses it.
fn take_number<'a>(input: &'a str, field: &str) -> Result<(u32, &'a str)> {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if end == 0 {
        return Err(Error::MalformedOverride(format!(
            "missing {} in '{}'",
            field, input
        )));
    }

    let value = input[..end].parse::<u32>().map_err(|e| {
        Error::MalformedOverride(format!("{} '{}' out of range: {}", field, &input[..end], e))
    })?;
    Ok((value, &input[end..]))
}

fn malformed(input: &str, reason: &str) -> Error {
    Error::MalformedOverride(format!("{} in '{}'", reason, input))
}
