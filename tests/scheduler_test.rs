use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Days, Utc};
use planbot::core::date_parser::today_in_tz;
use planbot::db::repository;
use planbot::error::AppError;
use planbot::models::{RoutineKind, User};
use planbot::services::PlanScheduler;
use planbot::transport::{Notification, NotificationKind, Notifier};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Simulates a user pressing the skip button while the evening items
/// are still being delivered.
struct SkipDuringDelivery {
    db: SqlitePool,
    user_id: i64,
    recorder: Arc<RecordingNotifier>,
}

#[async_trait]
impl Notifier for SkipDuringDelivery {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        self.recorder.send(notification).await?;
        if notification.kind == NotificationKind::TaskItem {
            repository::set_skipped_tonight(&self.db, self.user_id, true).await?;
        }
        Ok(())
    }
}

async fn setup_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// A user whose evening routine is always due (00:00) and whose
/// morning digest is disabled.
async fn evening_user(db: &SqlitePool, chat_id: i64) -> User {
    let user = repository::create_user(db, chat_id, "Asia/Shanghai")
        .await
        .unwrap();
    repository::update_user_evening_time(db, user.id, 0, 0)
        .await
        .unwrap();
    repository::update_user_morning_time(db, user.id, None)
        .await
        .unwrap();
    repository::find_user_by_id(db, user.id)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_evening_routine_sends_items_then_prompt() {
    let db = setup_db().await;
    let user = evening_user(&db, 2001).await;
    let today = today_in_tz(user.timezone(), Utc::now());

    let first = repository::insert_task(&db, user.id, "备份 NAS 配置", today)
        .await
        .unwrap();
    let second = repository::insert_task(&db, user.id, "清理下载目录", today)
        .await
        .unwrap();

    let recorder = Arc::new(RecordingNotifier::default());
    let scheduler = PlanScheduler::new(db.clone(), recorder.clone(), 60);
    scheduler.tick_user(&user, Utc::now()).await.unwrap();

    let sent = recorder.sent();
    assert_eq!(sent.len(), 4);
    // The review opens with its header, before any task item.
    assert_eq!(sent[0].kind, NotificationKind::ReviewHeader);
    assert!(sent[0].text.contains("日终核对"));
    assert_eq!(sent[1].kind, NotificationKind::TaskItem);
    assert_eq!(sent[1].task_id, Some(first.id));
    assert_eq!(sent[1].actions.len(), 3);
    assert_eq!(sent[2].kind, NotificationKind::TaskItem);
    assert_eq!(sent[2].task_id, Some(second.id));
    // The new-plan prompt always comes after the day's review.
    assert_eq!(sent[3].kind, NotificationKind::Prompt);

    let cursor = repository::get_cursor(&db, user.id, RoutineKind::Evening)
        .await
        .unwrap();
    assert_eq!(cursor, Some(today));
}

#[tokio::test]
async fn test_evening_routine_runs_once_per_day() {
    let db = setup_db().await;
    let user = evening_user(&db, 2002).await;
    let today = today_in_tz(user.timezone(), Utc::now());
    repository::insert_task(&db, user.id, "写周报", today)
        .await
        .unwrap();

    let recorder = Arc::new(RecordingNotifier::default());
    let scheduler = PlanScheduler::new(db.clone(), recorder.clone(), 60);

    scheduler.tick_user(&user, Utc::now()).await.unwrap();
    let after_first = recorder.sent().len();
    assert_eq!(after_first, 3);

    // Cursor already at today: the second invocation is a no-op.
    scheduler.tick_user(&user, Utc::now()).await.unwrap();
    assert_eq!(recorder.sent().len(), after_first);
}

#[tokio::test]
async fn test_skip_during_delivery_suppresses_prompt() {
    let db = setup_db().await;
    let user = evening_user(&db, 2003).await;
    let today = today_in_tz(user.timezone(), Utc::now());
    repository::insert_task(&db, user.id, "整理发票", today)
        .await
        .unwrap();

    let recorder = Arc::new(RecordingNotifier::default());
    let notifier = Arc::new(SkipDuringDelivery {
        db: db.clone(),
        user_id: user.id,
        recorder: recorder.clone(),
    });
    let scheduler = PlanScheduler::new(db.clone(), notifier, 60);
    scheduler.tick_user(&user, Utc::now()).await.unwrap();

    let sent = recorder.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].kind, NotificationKind::ReviewHeader);
    assert_eq!(sent[1].kind, NotificationKind::TaskItem);

    // The cursor still advanced: skipping the prompt is not a failure.
    let cursor = repository::get_cursor(&db, user.id, RoutineKind::Evening)
        .await
        .unwrap();
    assert_eq!(cursor, Some(today));
}

#[tokio::test]
async fn test_morning_digest_silent_when_empty() {
    let db = setup_db().await;
    let user = repository::create_user(&db, 2004, "Asia/Shanghai")
        .await
        .unwrap();
    let today = today_in_tz(user.timezone(), Utc::now());

    let recorder = Arc::new(RecordingNotifier::default());
    let scheduler = PlanScheduler::new(db.clone(), recorder.clone(), 60);
    scheduler.run_morning(&user, today).await.unwrap();

    assert!(recorder.sent().is_empty());

    // Silence still counts as a completed run.
    let cursor = repository::get_cursor(&db, user.id, RoutineKind::Morning)
        .await
        .unwrap();
    assert_eq!(cursor, Some(today));
}

#[tokio::test]
async fn test_morning_digest_lists_all_due_tasks() {
    let db = setup_db().await;
    let user = repository::create_user(&db, 2005, "Asia/Shanghai")
        .await
        .unwrap();
    let today = today_in_tz(user.timezone(), Utc::now());
    repository::insert_task(&db, user.id, "晨跑", today)
        .await
        .unwrap();
    repository::insert_task(&db, user.id, "交周报", today)
        .await
        .unwrap();

    let recorder = Arc::new(RecordingNotifier::default());
    let scheduler = PlanScheduler::new(db.clone(), recorder.clone(), 60);
    scheduler.run_morning(&user, today).await.unwrap();

    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Digest);
    assert!(sent[0].text.contains("晨跑"));
    assert!(sent[0].text.contains("交周报"));
}

#[tokio::test]
async fn test_recovery_after_outage_sends_single_makeup() {
    let db = setup_db().await;
    let user = evening_user(&db, 2006).await;
    let today = today_in_tz(user.timezone(), Utc::now());
    let yesterday = today - Days::new(1);

    // Process was down for three days.
    let stale = today - Days::new(4);
    assert!(
        repository::advance_cursor(&db, user.id, RoutineKind::Evening, None, stale)
            .await
            .unwrap()
    );
    repository::insert_task(&db, user.id, "给服务器打补丁", yesterday)
        .await
        .unwrap();

    let recorder = Arc::new(RecordingNotifier::default());
    let scheduler = PlanScheduler::new(db.clone(), recorder.clone(), 60);
    scheduler.recover_user(&user, Utc::now()).await.unwrap();

    // One consolidated make-up, not one per missed day.
    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Makeup);
    assert!(sent[0].text.contains("给服务器打补丁"));

    // Cursor parked at yesterday so today's routine still fires.
    let cursor = repository::get_cursor(&db, user.id, RoutineKind::Evening)
        .await
        .unwrap();
    assert_eq!(cursor, Some(yesterday));

    scheduler.tick_user(&user, Utc::now()).await.unwrap();
    let cursor = repository::get_cursor(&db, user.id, RoutineKind::Evening)
        .await
        .unwrap();
    assert_eq!(cursor, Some(today));
}

#[tokio::test]
async fn test_recovery_ignores_never_fired_cursor() {
    let db = setup_db().await;
    let user = evening_user(&db, 2007).await;

    let recorder = Arc::new(RecordingNotifier::default());
    let scheduler = PlanScheduler::new(db.clone(), recorder.clone(), 60);
    scheduler.recover_user(&user, Utc::now()).await.unwrap();

    assert!(recorder.sent().is_empty());
    let cursor = repository::get_cursor(&db, user.id, RoutineKind::Evening)
        .await
        .unwrap();
    assert_eq!(cursor, None);
}

#[tokio::test]
async fn test_recovery_noop_when_cursor_is_current() {
    let db = setup_db().await;
    let user = evening_user(&db, 2008).await;
    let today = today_in_tz(user.timezone(), Utc::now());
    let yesterday = today - Days::new(1);
    repository::advance_cursor(&db, user.id, RoutineKind::Evening, None, yesterday)
        .await
        .unwrap();

    let recorder = Arc::new(RecordingNotifier::default());
    let scheduler = PlanScheduler::new(db.clone(), recorder.clone(), 60);
    scheduler.recover_user(&user, Utc::now()).await.unwrap();

    assert!(recorder.sent().is_empty());
    let cursor = repository::get_cursor(&db, user.id, RoutineKind::Evening)
        .await
        .unwrap();
    assert_eq!(cursor, Some(yesterday));
}

#[tokio::test]
async fn test_lost_cursor_race_is_not_an_error() {
    let db = setup_db().await;
    let user = evening_user(&db, 2009).await;
    let today = today_in_tz(user.timezone(), Utc::now());

    // Another worker already advanced the cursor.
    assert!(
        repository::advance_cursor(&db, user.id, RoutineKind::Evening, None, today)
            .await
            .unwrap()
    );
    assert!(
        !repository::advance_cursor(&db, user.id, RoutineKind::Evening, None, today)
            .await
            .unwrap()
    );
}
