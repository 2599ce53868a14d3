use serde::{Deserialize, Serialize};

/// The two daily notification cycles. Each (user, kind) pair owns a
/// schedule cursor row: the last calendar date (user timezone) on which
/// that routine completed, NULL if it never ran. Cursors are advanced
/// only by the scheduling engine, via compare-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RoutineKind {
    Evening,
    Morning,
}

impl RoutineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RoutineKind::Evening => "evening",
            RoutineKind::Morning => "morning",
        }
    }
}
