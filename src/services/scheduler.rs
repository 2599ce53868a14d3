//! Per-user daily routine scheduling and crash recovery.
//!
//! One tick loop serves all users. A routine fires when the user's
//! local time has reached its configured time-of-day and that routine's
//! cursor is still behind today. The cursor compare-and-set is the
//! commit point: whichever run advances it owns that day, and a lost
//! race means another run already handled it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::core::date_parser::today_in_tz;
use crate::db::repository;
use crate::error::AppError;
use crate::messages;
use crate::models::{RoutineKind, User};
use crate::transport::{
    Notification, NotificationKind, Notifier, TASK_ITEM_ACTIONS,
};

/// A stalled per-user run is abandoned past this budget; its cursor is
/// left untouched so the next tick retries it.
const ROUTINE_BUDGET: Duration = Duration::from_secs(30);

pub struct PlanScheduler {
    db: SqlitePool,
    notifier: Arc<dyn Notifier>,
    tick: Duration,
}

impl PlanScheduler {
    pub fn new(db: SqlitePool, notifier: Arc<dyn Notifier>, tick_secs: u64) -> Self {
        Self {
            db,
            notifier,
            tick: Duration::from_secs(tick_secs),
        }
    }

    /// Recovery pass first, then the endless tick loop.
    pub async fn start(self) {
        info!("starting plan scheduler (tick: {:?})", self.tick);

        if let Err(e) = self.run_recovery(Utc::now()).await {
            error!("startup recovery failed: {}", e);
        }

        loop {
            tokio::time::sleep(self.tick).await;
            self.tick_all(Utc::now()).await;
        }
    }

    pub async fn tick_all(&self, now: DateTime<Utc>) {
        let users = match repository::fetch_all_users(&self.db).await {
            Ok(users) => users,
            Err(e) => {
                warn!("user listing failed, skipping tick: {}", e);
                return;
            }
        };

        for user in users {
            match tokio::time::timeout(ROUTINE_BUDGET, self.tick_user(&user, now)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(user_id = user.id, "routine failed, retrying next tick: {}", e);
                }
                Err(_) => {
                    error!(user_id = user.id, "routine exceeded budget, abandoned");
                }
            }
        }
    }

    pub async fn tick_user(&self, user: &User, now: DateTime<Utc>) -> Result<(), AppError> {
        let local = now.with_timezone(&user.timezone());
        let today = local.date_naive();
        let time = local.time();

        if time >= user.evening_time()
            && self.routine_due(user.id, RoutineKind::Evening, today).await?
        {
            self.run_evening(user, today).await?;
        }

        if let Some(morning) = user.morning_time() {
            if time >= morning
                && self.routine_due(user.id, RoutineKind::Morning, today).await?
            {
                self.run_morning(user, today).await?;
            }
        }

        Ok(())
    }

    async fn routine_due(
        &self,
        user_id: i64,
        kind: RoutineKind,
        today: NaiveDate,
    ) -> Result<bool, AppError> {
        let cursor = repository::get_cursor(&self.db, user_id, kind).await?;
        Ok(cursor.is_none_or(|last| last < today))
    }

    /// Evening review: the header, then one task-item notification per
    /// due task, then the new-plan prompt unless tonight was already
    /// skipped. Header and items are skipped when nothing is due.
    pub async fn run_evening(&self, user: &User, today: NaiveDate) -> Result<(), AppError> {
        let expected = repository::get_cursor(&self.db, user.id, RoutineKind::Evening).await?;
        if expected.is_some_and(|last| last >= today) {
            return Ok(());
        }

        info!(user_id = user.id, %today, "evening routine starting");

        // Reset at the start of the run, never at the end, so the
        // prompt is asked at most once per evening even if this run
        // races a skip button or is re-entered.
        repository::set_skipped_tonight(&self.db, user.id, false).await?;

        let tasks = repository::fetch_tasks_due_on(&self.db, user.id, today).await?;
        if !tasks.is_empty() {
            let header = Notification {
                chat_id: user.chat_id,
                kind: NotificationKind::ReviewHeader,
                text: messages::daily_review_header(false).to_string(),
                task_id: None,
                actions: Vec::new(),
            };
            if let Err(e) = self.notifier.send(&header).await {
                warn!(user_id = user.id, "review header failed: {}", e);
            }
        }
        for task in &tasks {
            let notification = Notification {
                chat_id: user.chat_id,
                kind: NotificationKind::TaskItem,
                text: messages::format_task_item(task),
                task_id: Some(task.id),
                actions: TASK_ITEM_ACTIONS.to_vec(),
            };
            if let Err(e) = self.notifier.send(&notification).await {
                warn!(task_id = task.id, "task notification failed, skipping: {}", e);
            }
        }

        // A skip click may have landed while the items were going out.
        let fresh = repository::find_user_by_id(&self.db, user.id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !fresh.skipped_tonight {
            let prompt = Notification {
                chat_id: user.chat_id,
                kind: NotificationKind::Prompt,
                text: messages::new_plan_prompt().to_string(),
                task_id: None,
                actions: Vec::new(),
            };
            if let Err(e) = self.notifier.send(&prompt).await {
                warn!(user_id = user.id, "new-plan prompt failed: {}", e);
            }
        }

        let won =
            repository::advance_cursor(&self.db, user.id, RoutineKind::Evening, expected, today)
                .await?;
        if !won {
            info!(user_id = user.id, "evening cursor already advanced by another run");
        }

        info!(user_id = user.id, tasks = tasks.len(), "evening routine completed");
        Ok(())
    }

    /// Morning digest: a single message listing today's pending tasks,
    /// or nothing at all when there are none.
    pub async fn run_morning(&self, user: &User, today: NaiveDate) -> Result<(), AppError> {
        let expected = repository::get_cursor(&self.db, user.id, RoutineKind::Morning).await?;
        if expected.is_some_and(|last| last >= today) {
            return Ok(());
        }

        let tasks = repository::fetch_tasks_due_on(&self.db, user.id, today).await?;
        if tasks.is_empty() {
            info!(user_id = user.id, "no tasks for morning digest, staying silent");
        } else {
            let digest = Notification {
                chat_id: user.chat_id,
                kind: NotificationKind::Digest,
                text: messages::digest_text(&tasks),
                task_id: None,
                actions: Vec::new(),
            };
            if let Err(e) = self.notifier.send(&digest).await {
                warn!(user_id = user.id, "morning digest failed: {}", e);
            }
        }

        // Silence still counts as a completed run.
        let won =
            repository::advance_cursor(&self.db, user.id, RoutineKind::Morning, expected, today)
                .await?;
        if !won {
            info!(user_id = user.id, "morning cursor already advanced by another run");
        }

        Ok(())
    }

    /// Startup reconciliation: for every user whose routines missed at
    /// least one whole day, send a single consolidated make-up covering
    /// the most recently missed date, then park the cursor at yesterday
    /// so today's regular routine still fires at its normal time.
    pub async fn run_recovery(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        info!("checking for missed routines");

        let users = repository::fetch_all_users(&self.db).await?;
        for user in &users {
            if let Err(e) = self.recover_user(user, now).await {
                error!(user_id = user.id, "recovery failed, continuing: {}", e);
            }
        }

        info!("recovery check completed for {} users", users.len());
        Ok(())
    }

    pub async fn recover_user(&self, user: &User, now: DateTime<Utc>) -> Result<(), AppError> {
        let today = today_in_tz(user.timezone(), now);
        let yesterday = today - Days::new(1);

        for kind in [RoutineKind::Evening, RoutineKind::Morning] {
            if kind == RoutineKind::Morning && user.morning_time().is_none() {
                continue;
            }

            let cursor = repository::get_cursor(&self.db, user.id, kind).await?;
            // Never-fired cursors get no make-up: a brand new user has
            // nothing missed, and today's tick will fire normally.
            let Some(last) = cursor else { continue };
            if last >= yesterday {
                continue;
            }

            // One consolidated make-up, not one per missed day; only
            // the evening review is worth re-sending after downtime.
            if kind == RoutineKind::Evening {
                let tasks = repository::fetch_tasks_due_on(&self.db, user.id, yesterday).await?;
                if !tasks.is_empty() {
                    let makeup = Notification {
                        chat_id: user.chat_id,
                        kind: NotificationKind::Makeup,
                        text: messages::makeup_text(&tasks),
                        task_id: None,
                        actions: Vec::new(),
                    };
                    if let Err(e) = self.notifier.send(&makeup).await {
                        warn!(user_id = user.id, "make-up notification failed: {}", e);
                    }
                }
            }

            let won =
                repository::advance_cursor(&self.db, user.id, kind, Some(last), yesterday).await?;
            if won {
                info!(
                    user_id = user.id,
                    kind = kind.as_str(),
                    %yesterday,
                    "cursor caught up after downtime"
                );
            }
        }

        Ok(())
    }
}
