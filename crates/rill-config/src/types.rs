use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// HumanDuration — "250ms" / "15s" / "5m" / "1h" / "2d"
// ---------------------------------------------------------------------------

/// A duration parsed from a human-readable string such as `"15s"` or `"1h"`.
///
/// Accepted suffixes: `ms`, `s`, `m`, `h`, `d`. A bare `"0"` is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(Duration);

impl HumanDuration {
    pub fn new(d: Duration) -> Self {
        Self(d)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for HumanDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (digits, suffix) = s.split_at(split);
        let num: u64 = digits
            .parse()
            .map_err(|_| format!("invalid duration {s:?}: expected digits"))?;

        let duration = match suffix {
            "ms" => Duration::from_millis(num),
            "s" => Duration::from_secs(num),
            "m" => Duration::from_secs(num * 60),
            "h" => Duration::from_secs(num * 3600),
            "d" => Duration::from_secs(num * 86400),
            "" if num == 0 => Duration::ZERO,
            "" => return Err(format!("duration {s:?} is missing a unit (ms|s|m|h|d)")),
            other => return Err(format!("unknown duration unit {other:?} in {s:?}")),
        };
        Ok(Self(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let millis = self.0.subsec_millis();
        if secs == 0 && millis > 0 {
            return write!(f, "{millis}ms");
        }
        if secs % 86400 == 0 && secs > 0 {
            write!(f, "{}d", secs / 86400)
        } else if secs % 3600 == 0 && secs > 0 {
            write!(f, "{}h", secs / 3600)
        } else if secs % 60 == 0 && secs > 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{secs}s")
        }
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
