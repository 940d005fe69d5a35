//! Timing values used by animations

use std::fmt;

/// Ticks per second (one tick is 100ns)
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Signed time interval in 100ns ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeSpan(i64);

impl TimeSpan {
    /// Zero-length interval
    pub const ZERO: TimeSpan = TimeSpan(0);

    /// From raw ticks
    pub const fn from_ticks(ticks: i64) -> Self {
        TimeSpan(ticks)
    }

    /// From fractional seconds
    pub fn from_seconds(seconds: f64) -> Self {
        TimeSpan((seconds * TICKS_PER_SECOND as f64).round() as i64)
    }

    /// Raw ticks
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Fractional seconds
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / TICKS_PER_SECOND as f64
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let total = self.0.unsigned_abs();
        let ticks_per_second = TICKS_PER_SECOND as u64;
        let fraction = total % ticks_per_second;
        let seconds = total / ticks_per_second;
        let (days, rem) = (seconds / 86_400, seconds % 86_400);
        let (hours, rem) = (rem / 3600, rem % 3600);
        let (minutes, secs) = (rem / 60, rem % 60);
        write!(f, "{}", sign)?;
        if days > 0 {
            write!(f, "{}.", days)?;
        }
        write!(f, "{:02}:{:02}:{:02}", hours, minutes, secs)?;
        if fraction > 0 {
            write!(f, ".{:07}", fraction)?;
        }
        Ok(())
    }
}

/// Length of an animation timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Duration {
    /// Determined by the timeline's children
    #[default]
    Automatic,
    /// Never ends
    Forever,
    /// Fixed length
    TimeSpan(TimeSpan),
}

/// Position of a key frame within its animation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum KeyTime {
    /// Evenly spaced among the key frames
    #[default]
    Uniform,
    /// Spaced so the animation has constant pace
    Paced,
    /// Fraction of the animation's duration, `0.0..=1.0`
    Percent(f64),
    /// Fixed offset from the start
    TimeSpan(TimeSpan),
}

/// How often a timeline repeats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepeatBehavior {
    /// Number of iterations
    Count(f64),
    /// Total active time
    Duration(TimeSpan),
    /// Repeat indefinitely
    Forever,
}

impl Default for RepeatBehavior {
    fn default() -> Self {
        RepeatBehavior::Count(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timespan_seconds() {
        let ts = TimeSpan::from_seconds(1.5);
        assert_eq!(ts.ticks(), 15_000_000);
        assert_eq!(ts.as_seconds(), 1.5);
    }

    #[test]
    fn test_timespan_display() {
        assert_eq!(TimeSpan::from_seconds(90.0).to_string(), "00:01:30");
        assert_eq!(TimeSpan::from_seconds(-0.5).to_string(), "-00:00:00.5000000");
        assert_eq!(
            TimeSpan::from_seconds(86_400.0 + 3600.0).to_string(),
            "1.01:00:00"
        );
    }
}
