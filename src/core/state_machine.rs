//! Pure task lifecycle transitions.
//!
//! `pending` is the only entry point; `done` and `canceled` are
//! terminal. Postponement is not a state of its own: it keeps the task
//! pending and shifts the due date forward.

use chrono::{Days, NaiveDate};
use thiserror::Error;

use crate::models::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Complete,
    Cancel,
    Postpone { days: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task is already {current:?}")]
pub struct InvalidTransition {
    pub current: TaskStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub status: TaskStatus,
    pub due_date: NaiveDate,
}

/// Compute the state a transition would produce, without touching
/// storage. Any transition on a non-pending task is rejected, so a
/// duplicate button click surfaces as a conflict instead of silently
/// succeeding.
pub fn apply(
    status: TaskStatus,
    due_date: NaiveDate,
    transition: Transition,
) -> Result<TransitionOutcome, InvalidTransition> {
    if status != TaskStatus::Pending {
        return Err(InvalidTransition { current: status });
    }

    match transition {
        Transition::Complete => Ok(TransitionOutcome {
            status: TaskStatus::Done,
            due_date,
        }),
        Transition::Cancel => Ok(TransitionOutcome {
            status: TaskStatus::Canceled,
            due_date,
        }),
        Transition::Postpone { days } => {
            if days == 0 {
                return Err(InvalidTransition { current: status });
            }
            let due_date = due_date
                .checked_add_days(Days::new(days as u64))
                .ok_or(InvalidTransition { current: status })?;
            Ok(TransitionOutcome {
                status: TaskStatus::Pending,
                due_date,
            })
        }
    }
}
