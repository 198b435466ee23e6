//! Countdown recomputation for hold deadlines and showtimes.
//!
//! Callers re-derive the breakdown from a fixed target on every tick instead
//! of decrementing state, so a late or skipped tick never drifts.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct RemainingTime {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub expired: bool,
}

/// Whole units left until `target`, each floored. Zero once `now >= target`.
pub fn remaining_time(now: DateTime<Utc>, target: DateTime<Utc>) -> RemainingTime {
    let total = (target - now).num_seconds();
    if total <= 0 {
        return RemainingTime { expired: true, ..RemainingTime::default() };
    }

    RemainingTime {
        days: total / 86_400,
        hours: (total % 86_400) / 3_600,
        minutes: (total % 3_600) / 60,
        seconds: total % 60,
        expired: false,
    }
}

impl RemainingTime {
    pub fn total_seconds(&self) -> i64 {
        self.days * 86_400 + self.hours * 3_600 + self.minutes * 60 + self.seconds
    }

    /// Largest unit first, at most two units. The second unit is always two
    /// digits.
    pub fn display(&self) -> String {
        if self.days > 0 {
            format!("{}d {:02}h", self.days, self.hours)
        } else if self.hours > 0 {
            format!("{}h {:02}m", self.hours, self.minutes)
        } else if self.minutes > 0 {
            format!("{}m {:02}s", self.minutes, self.seconds)
        } else {
            format!("{}s", self.seconds)
        }
    }
}
