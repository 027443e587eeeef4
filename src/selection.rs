//! Preferred-mode selection.
//!
//! Rewrites which entry of a connector's mode list carries the PREFERRED bit so
//! that the configured override wins, and moves that entry to the front.

use crate::config::OverrideTarget;
use crate::drm::{ModeInfo, ModeType};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// A display mode whose preference flag can be rewritten in place.
pub trait DisplayMode {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn refresh(&self) -> u32;
    fn is_preferred(&self) -> bool;
    fn set_preferred(&mut self, preferred: bool);

    /// Human-readable name used in diagnostics.
    fn label(&self) -> Cow<'_, str>;
}

impl DisplayMode for ModeInfo {
    fn width(&self) -> u32 {
        u32::from(self.hdisplay)
    }

    fn height(&self) -> u32 {
        u32::from(self.vdisplay)
    }

    fn refresh(&self) -> u32 {
        self.vrefresh
    }

    fn is_preferred(&self) -> bool {
        self.mode_type().contains(ModeType::PREFERRED)
    }

    fn set_preferred(&mut self, preferred: bool) {
        let mut bits = self.mode_type();
        bits.set(ModeType::PREFERRED, preferred);
        self.set_mode_type(bits);
    }

    fn label(&self) -> Cow<'_, str> {
        self.name()
    }
}

/// What happens to the PREFERRED bit of modes that do not match the override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferencePolicy {
    /// The override replaces the platform's preference: non-matching modes lose the bit.
    #[default]
    Authoritative,
    /// Non-matching modes keep whatever the platform assigned.
    Additive,
}

impl FromStr for PreferencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "authoritative" => Ok(Self::Authoritative),
            "additive" => Ok(Self::Additive),
            other => Err(format!("unknown preference policy '{}'", other)),
        }
    }
}

impl fmt::Display for PreferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authoritative => f.write_str("authoritative"),
            Self::Additive => f.write_str("additive"),
        }
    }
}

/// Outcome of a selection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The first matching mode, found at `from_index`, is now preferred and at index 0.
    Promoted { from_index: usize },
    /// No mode matched; ordering is untouched.
    NotFound,
}

/// Marks the first mode matching `target` as preferred and moves it to the front.
///
/// Later duplicates of the same triple lose the PREFERRED bit. Non-matching
/// modes lose it too under [`PreferencePolicy::Authoritative`]. The entries
/// ahead of the match shift back by one, keeping their relative order, so a
/// match at index 2 or later leaves a different order than a plain swap with
/// index 0 would. The slice is never resized.
pub fn select_preferred<M: DisplayMode>(
    modes: &mut [M],
    target: &OverrideTarget,
    policy: PreferencePolicy,
) -> Selection {
    let mut first_match = None;

    for (index, mode) in modes.iter_mut().enumerate() {
        if target.matches(mode.width(), mode.height(), mode.refresh()) {
            if first_match.is_none() {
                first_match = Some(index);
                mode.set_preferred(true);
            } else {
                mode.set_preferred(false);
            }
        } else if policy == PreferencePolicy::Authoritative {
            mode.set_preferred(false);
        }
    }

    match first_match {
        Some(index) => {
            if index > 0 {
                modes[..=index].rotate_right(1);
            }
            Selection::Promoted { from_index: index }
        }
        None => Selection::NotFound,
    }
}
