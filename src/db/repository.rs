use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::models::{
    DEFAULT_EVENING, DEFAULT_MORNING, RoutineKind, Task, TaskStatus, User,
};

pub async fn find_user_by_id(db: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, chat_id, tz, evening_hour, evening_min, morning_hour, morning_min, awaiting_plans, skipped_tonight, created_at FROM users WHERE id = ?"
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn find_user_by_chat_id(
    db: &SqlitePool,
    chat_id: i64,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, chat_id, tz, evening_hour, evening_min, morning_hour, morning_min, awaiting_plans, skipped_tonight, created_at FROM users WHERE chat_id = ?"
    )
    .bind(chat_id)
    .fetch_optional(db)
    .await
}

pub async fn fetch_all_users(db: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, chat_id, tz, evening_hour, evening_min, morning_hour, morning_min, awaiting_plans, skipped_tonight, created_at FROM users ORDER BY id"
    )
    .fetch_all(db)
    .await
}

/// Register a chat. Existing users are returned as-is, so repeated
/// /start-style calls are harmless.
pub async fn create_user(db: &SqlitePool, chat_id: i64, tz: &str) -> Result<User, sqlx::Error> {
    if let Some(existing) = find_user_by_chat_id(db, chat_id).await? {
        return Ok(existing);
    }

    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO users (chat_id, tz, evening_hour, evening_min, morning_hour, morning_min, awaiting_plans, skipped_tonight, created_at) VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?)"
    )
    .bind(chat_id)
    .bind(tz)
    .bind(DEFAULT_EVENING.0)
    .bind(DEFAULT_EVENING.1)
    .bind(DEFAULT_MORNING.0)
    .bind(DEFAULT_MORNING.1)
    .bind(&now)
    .execute(db)
    .await?;
    let id = result.last_insert_rowid();

    ensure_cursor(db, id, RoutineKind::Evening).await?;
    ensure_cursor(db, id, RoutineKind::Morning).await?;

    Ok(User {
        id,
        chat_id,
        tz: tz.to_string(),
        evening_hour: DEFAULT_EVENING.0,
        evening_min: DEFAULT_EVENING.1,
        morning_hour: Some(DEFAULT_MORNING.0),
        morning_min: Some(DEFAULT_MORNING.1),
        awaiting_plans: false,
        skipped_tonight: false,
        created_at: now,
    })
}

pub async fn update_user_timezone(
    db: &SqlitePool,
    user_id: i64,
    tz: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET tz = ? WHERE id = ?")
        .bind(tz)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_user_evening_time(
    db: &SqlitePool,
    user_id: i64,
    hour: i32,
    minute: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET evening_hour = ?, evening_min = ? WHERE id = ?")
        .bind(hour)
        .bind(minute)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// `None` disables the morning digest.
pub async fn update_user_morning_time(
    db: &SqlitePool,
    user_id: i64,
    time: Option<(i32, i32)>,
) -> Result<bool, sqlx::Error> {
    let (hour, minute) = match time {
        Some((h, m)) => (Some(h), Some(m)),
        None => (None, None),
    };
    let result = sqlx::query("UPDATE users SET morning_hour = ?, morning_min = ? WHERE id = ?")
        .bind(hour)
        .bind(minute)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_awaiting_plans(
    db: &SqlitePool,
    user_id: i64,
    awaiting: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET awaiting_plans = ? WHERE id = ?")
        .bind(awaiting)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_skipped_tonight(
    db: &SqlitePool,
    user_id: i64,
    skipped: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET skipped_tonight = ? WHERE id = ?")
        .bind(skipped)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Generic over the executor so multi-line submissions can insert all
/// their tasks inside one transaction (no partial receipts).
pub async fn insert_task<'e, E>(
    db: E,
    user_id: i64,
    content: &str,
    due_date: NaiveDate,
) -> Result<Task, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO tasks (user_id, content, due_date, status, created_at, updated_at) VALUES (?, ?, ?, 'pending', ?, ?)"
    )
    .bind(user_id)
    .bind(content)
    .bind(due_date)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(Task {
        id: result.last_insert_rowid(),
        user_id,
        content: content.to_string(),
        due_date,
        status: TaskStatus::Pending,
        created_at: now.clone(),
        updated_at: now,
        completed_at: None,
        canceled_at: None,
    })
}

pub async fn find_task_by_id(db: &SqlitePool, id: i64) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "SELECT id, user_id, content, due_date, status, created_at, updated_at, completed_at, canceled_at FROM tasks WHERE id = ?"
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Pending tasks due on one date, in insertion order so display
/// numbering stays stable.
pub async fn fetch_tasks_due_on(
    db: &SqlitePool,
    user_id: i64,
    date: NaiveDate,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "SELECT id, user_id, content, due_date, status, created_at, updated_at, completed_at, canceled_at FROM tasks WHERE user_id = ? AND due_date = ? AND status = 'pending' ORDER BY id"
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(db)
    .await
}

pub async fn fetch_pending_in_range(
    db: &SqlitePool,
    user_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "SELECT id, user_id, content, due_date, status, created_at, updated_at, completed_at, canceled_at FROM tasks WHERE user_id = ? AND due_date >= ? AND due_date <= ? AND status = 'pending' ORDER BY due_date, id"
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await
}

/// Persist a computed transition, guarded on the task still being
/// pending. Returns false when another click got there first.
pub async fn apply_task_transition(
    db: &SqlitePool,
    task_id: i64,
    new_status: TaskStatus,
    new_due_date: NaiveDate,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let (completed_at, canceled_at) = match new_status {
        TaskStatus::Done => (Some(now.clone()), None),
        TaskStatus::Canceled => (None, Some(now.clone())),
        TaskStatus::Pending => (None, None),
    };

    let result = sqlx::query(
        "UPDATE tasks SET status = ?, due_date = ?, updated_at = ?, completed_at = ?, canceled_at = ? WHERE id = ? AND status = 'pending'"
    )
    .bind(new_status)
    .bind(new_due_date)
    .bind(&now)
    .bind(completed_at)
    .bind(canceled_at)
    .bind(task_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn ensure_cursor(
    db: &SqlitePool,
    user_id: i64,
    kind: RoutineKind,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT OR IGNORE INTO schedule_cursors (user_id, kind, last_fired_date) VALUES (?, ?, NULL)"
    )
    .bind(user_id)
    .bind(kind)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn get_cursor(
    db: &SqlitePool,
    user_id: i64,
    kind: RoutineKind,
) -> Result<Option<NaiveDate>, sqlx::Error> {
    let row: Option<(Option<NaiveDate>,)> = sqlx::query_as(
        "SELECT last_fired_date FROM schedule_cursors WHERE user_id = ? AND kind = ?",
    )
    .bind(user_id)
    .bind(kind)
    .fetch_optional(db)
    .await?;
    Ok(row.and_then(|(date,)| date))
}

/// Compare-and-set on a routine cursor; the commit point for one day's
/// routine. Returns false when the expected value no longer matches,
/// meaning another run already advanced it.
pub async fn advance_cursor(
    db: &SqlitePool,
    user_id: i64,
    kind: RoutineKind,
    expected: Option<NaiveDate>,
    new_date: NaiveDate,
) -> Result<bool, sqlx::Error> {
    ensure_cursor(db, user_id, kind).await?;

    let result = sqlx::query(
        "UPDATE schedule_cursors SET last_fired_date = ? WHERE user_id = ? AND kind = ? AND last_fired_date IS ?"
    )
    .bind(new_date)
    .bind(user_id)
    .bind(kind)
    .bind(expected)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}
