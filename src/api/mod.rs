use std::collections::BTreeMap;

use axum::Json;
use axum::extract::Path;
use axum::routing::{get, patch, post};
use axum::{Router, extract::State, http::StatusCode};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::date_parser::{self, MAX_INPUT_LINES};
use crate::core::state_machine::{self, Transition};
use crate::db::repository;
use crate::error::AppError;
use crate::messages;
use crate::models::{MAX_CONTENT_LENGTH, Task, TaskStatus, User};
use crate::state::AppState;
use crate::validators;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", post(register_user))
        .route("/users/{chat_id}/plans", post(submit_plans))
        .route(
            "/users/{chat_id}/await-plans",
            post(arm_input_mode).delete(disarm_input_mode),
        )
        .route("/users/{chat_id}/tasks/today", get(today_tasks))
        .route("/users/{chat_id}/tasks/week", get(week_tasks))
        .route("/users/{chat_id}/schedule", patch(update_schedule))
        .route("/users/{chat_id}/skip-tonight", post(skip_tonight))
        .route("/tasks/{id}/transition", post(transition_task))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct RegisterRequest {
    chat_id: i64,
    tz: Option<String>,
}

async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<User>, AppError> {
    let tz = match req.tz.as_deref() {
        Some(name) => {
            validators::validate_timezone(name)
                .ok_or_else(|| AppError::BadRequest(format!("unknown timezone: {}", name)))?;
            name
        }
        None => crate::models::DEFAULT_TIMEZONE,
    };

    let user = repository::create_user(&state.db, req.chat_id, tz).await?;
    Ok(Json(user))
}

#[derive(Deserialize)]
struct PlanSubmission {
    text: String,
}

#[derive(Serialize)]
struct PlanLineResult {
    line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct PlanReceipt {
    created: usize,
    results: Vec<PlanLineResult>,
    receipt: String,
}

/// Multi-line task submission: every line parses independently, bad
/// lines come back in the receipt instead of blocking good ones, and
/// all inserts commit together.
async fn submit_plans(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Json(req): Json<PlanSubmission>,
) -> Result<Json<PlanReceipt>, AppError> {
    let user = repository::find_user_by_chat_id(&state.db, chat_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let today = date_parser::today_in_tz(user.timezone(), Utc::now());
    let outcomes = date_parser::parse_lines(&req.text, today);
    if outcomes.len() >= MAX_INPUT_LINES {
        tracing::warn!(chat_id, "submission truncated to {} lines", MAX_INPUT_LINES);
    }

    let mut tx = state.db.begin().await?;
    let mut results = Vec::with_capacity(outcomes.len());
    let mut created = 0;

    for outcome in &outcomes {
        match &outcome.result {
            Ok(parsed) => {
                let (content, truncated) =
                    validators::truncate_text(&parsed.content, MAX_CONTENT_LENGTH);
                if truncated {
                    tracing::warn!(
                        chat_id,
                        line = outcome.line_no,
                        "task content truncated to {} chars",
                        MAX_CONTENT_LENGTH
                    );
                }
                let task =
                    repository::insert_task(&mut *tx, user.id, content, parsed.due_date).await?;
                created += 1;
                results.push(PlanLineResult {
                    line: outcome.line_no,
                    task_id: Some(task.id),
                    content: Some(task.content),
                    due_date: Some(task.due_date),
                    error: None,
                });
            }
            Err(failure) => {
                results.push(PlanLineResult {
                    line: outcome.line_no,
                    task_id: None,
                    content: None,
                    due_date: None,
                    error: Some(failure.to_string()),
                });
            }
        }
    }

    tx.commit().await?;

    if user.awaiting_plans {
        repository::set_awaiting_plans(&state.db, user.id, false).await?;
    }

    Ok(Json(PlanReceipt {
        created,
        receipt: messages::creation_receipt(&outcomes),
        results,
    }))
}

#[derive(Serialize)]
struct InputModeResponse {
    instructions: String,
}

async fn arm_input_mode(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> Result<Json<InputModeResponse>, AppError> {
    let user = repository::find_user_by_chat_id(&state.db, chat_id)
        .await?
        .ok_or(AppError::NotFound)?;
    repository::set_awaiting_plans(&state.db, user.id, true).await?;
    Ok(Json(InputModeResponse {
        instructions: messages::input_mode_instructions().to_string(),
    }))
}

async fn disarm_input_mode(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let user = repository::find_user_by_chat_id(&state.db, chat_id)
        .await?
        .ok_or(AppError::NotFound)?;
    repository::set_awaiting_plans(&state.db, user.id, false).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct DayTasks {
    date: NaiveDate,
    tasks: Vec<Task>,
}

async fn today_tasks(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> Result<Json<DayTasks>, AppError> {
    let user = repository::find_user_by_chat_id(&state.db, chat_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let today = date_parser::today_in_tz(user.timezone(), Utc::now());
    let tasks = repository::fetch_tasks_due_on(&state.db, user.id, today).await?;
    Ok(Json(DayTasks { date: today, tasks }))
}

async fn week_tasks(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> Result<Json<Vec<DayTasks>>, AppError> {
    let user = repository::find_user_by_chat_id(&state.db, chat_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let today = date_parser::today_in_tz(user.timezone(), Utc::now());
    let tasks =
        repository::fetch_pending_in_range(&state.db, user.id, today, today + Days::new(6)).await?;

    let mut by_date: BTreeMap<NaiveDate, Vec<Task>> = BTreeMap::new();
    for task in tasks {
        by_date.entry(task.due_date).or_default().push(task);
    }

    Ok(Json(
        by_date
            .into_iter()
            .map(|(date, tasks)| DayTasks { date, tasks })
            .collect(),
    ))
}

#[derive(Deserialize)]
struct SchedulePatch {
    tz: Option<String>,
    /// "HH:MM"
    evening: Option<String>,
    /// "HH:MM", or "off" to disable the morning digest
    morning: Option<String>,
}

async fn update_schedule(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Json(patch): Json<SchedulePatch>,
) -> Result<Json<User>, AppError> {
    let user = repository::find_user_by_chat_id(&state.db, chat_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(tz) = &patch.tz {
        validators::validate_timezone(tz)
            .ok_or_else(|| AppError::BadRequest(format!("unknown timezone: {}", tz)))?;
        repository::update_user_timezone(&state.db, user.id, tz).await?;
    }

    if let Some(evening) = &patch.evening {
        let (hour, minute) = validators::parse_hhmm(evening)
            .ok_or_else(|| AppError::BadRequest(format!("invalid time: {}", evening)))?;
        repository::update_user_evening_time(&state.db, user.id, hour, minute).await?;
    }

    if let Some(morning) = &patch.morning {
        let time = if morning.eq_ignore_ascii_case("off") {
            None
        } else {
            Some(
                validators::parse_hhmm(morning)
                    .ok_or_else(|| AppError::BadRequest(format!("invalid time: {}", morning)))?,
            )
        };
        repository::update_user_morning_time(&state.db, user.id, time).await?;
    }

    let updated = repository::find_user_by_id(&state.db, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// The interaction layer reporting the "skip tonight" button. Only this
/// path ever sets the flag true; the evening routine only resets it.
async fn skip_tonight(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let user = repository::find_user_by_chat_id(&state.db, chat_id)
        .await?
        .ok_or(AppError::NotFound)?;
    repository::set_skipped_tonight(&state.db, user.id, true).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ActionKind {
    Complete,
    Cancel,
    Postpone,
}

#[derive(Deserialize)]
struct TransitionRequest {
    action: ActionKind,
    days: Option<u32>,
}

#[derive(Serialize)]
struct TransitionResponse {
    id: i64,
    status: TaskStatus,
    due_date: NaiveDate,
}

async fn transition_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let task = repository::find_task_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let transition = match req.action {
        ActionKind::Complete => Transition::Complete,
        ActionKind::Cancel => Transition::Cancel,
        ActionKind::Postpone => {
            let days = req.days.unwrap_or(1);
            if days == 0 {
                return Err(AppError::BadRequest(
                    "postpone requires a positive day count".to_string(),
                ));
            }
            Transition::Postpone { days }
        }
    };

    let outcome = state_machine::apply(task.status, task.due_date, transition)
        .map_err(|e| AppError::Conflict(format!("already handled: {}", e)))?;

    let updated =
        repository::apply_task_transition(&state.db, task.id, outcome.status, outcome.due_date)
            .await?;
    if !updated {
        // Someone else's click won between our read and write.
        return Err(AppError::Conflict("already handled".to_string()));
    }

    Ok(Json(TransitionResponse {
        id: task.id,
        status: outcome.status,
        due_date: outcome.due_date,
    }))
}
