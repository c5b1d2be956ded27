//! Candle sampling intervals.
//!
//! A `Frequency` is stored as whole minutes and written in the short form used
//! by exchanges and config files: `15m`, `1h`, `6h`, `1d`, `1w`. The same
//! grammar doubles as the duration syntax for strategy timeouts.

use chrono::Duration;
use std::fmt;
use std::str::FromStr;

const MINUTES_PER_HOUR: u32 = 60;
const MINUTES_PER_DAY: u32 = 24 * MINUTES_PER_HOUR;
const MINUTES_PER_WEEK: u32 = 7 * MINUTES_PER_DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frequency {
    minutes: u32,
}

impl Frequency {
    pub const FIFTEEN_MINUTES: Frequency = Frequency { minutes: 15 };
    pub const ONE_HOUR: Frequency = Frequency {
        minutes: MINUTES_PER_HOUR,
    };
    pub const SIX_HOURS: Frequency = Frequency {
        minutes: 6 * MINUTES_PER_HOUR,
    };
    pub const ONE_DAY: Frequency = Frequency {
        minutes: MINUTES_PER_DAY,
    };

    /// Returns `None` for a zero-length interval.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes > 0).then_some(Frequency { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes as i64)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.minutes;
        if m % MINUTES_PER_WEEK == 0 {
            write!(f, "{}w", m / MINUTES_PER_WEEK)
        } else if m % MINUTES_PER_DAY == 0 {
            write!(f, "{}d", m / MINUTES_PER_DAY)
        } else if m % MINUTES_PER_HOUR == 0 {
            write!(f, "{}h", m / MINUTES_PER_HOUR)
        } else {
            write!(f, "{}m", m)
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in '{}'", s))?;
        let (count, unit) = s.split_at(split);
        let count: u32 = count
            .parse()
            .map_err(|_| format!("invalid count in '{}'", s))?;
        let scale = match unit {
            "m" | "min" => 1,
            "h" | "hr" => MINUTES_PER_HOUR,
            "d" | "day" => MINUTES_PER_DAY,
            "w" => MINUTES_PER_WEEK,
            other => return Err(format!("unknown unit '{}'", other)),
        };
        let minutes = count
            .checked_mul(scale)
            .ok_or_else(|| format!("'{}' is too large", s))?;
        Frequency::from_minutes(minutes).ok_or_else(|| format!("'{}' must be positive", s))
    }
}

/// Parses a duration written in the frequency grammar (`6h`, `30m`, `2d`).
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    s.parse::<Frequency>().map(|f| f.duration())
}
