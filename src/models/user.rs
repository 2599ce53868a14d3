use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";
pub const DEFAULT_EVENING: (i32, i32) = (22, 0);
pub const DEFAULT_MORNING: (i32, i32) = (8, 30);

/// A chat user and their per-day schedule preferences.
///
/// `skipped_tonight` tracks whether the new-plan prompt has already been
/// answered with "skip" today. Only the interaction layer sets it true;
/// the evening routine resets it to false at the start of every run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub chat_id: i64,
    pub tz: String,
    pub evening_hour: i32,
    pub evening_min: i32,
    pub morning_hour: Option<i32>,
    pub morning_min: Option<i32>,
    pub awaiting_plans: bool,
    pub skipped_tonight: bool,
    pub created_at: String,
}

impl User {
    /// Parsed IANA timezone. Stored names are validated on write, so a
    /// parse failure here only happens for rows edited out-of-band.
    pub fn timezone(&self) -> Tz {
        self.tz.parse().unwrap_or(chrono_tz::Asia::Shanghai)
    }

    pub fn evening_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.evening_hour as u32, self.evening_min as u32, 0)
            .unwrap_or_default()
    }

    /// `None` when the morning digest is disabled.
    pub fn morning_time(&self) -> Option<NaiveTime> {
        match (self.morning_hour, self.morning_min) {
            (Some(h), Some(m)) => NaiveTime::from_hms_opt(h as u32, m as u32, 0),
            _ => None,
        }
    }
}
