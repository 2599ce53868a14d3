//! Outbound notification requests handed to the chat-transport layer.
//!
//! The core never talks to the chat platform directly; it emits
//! `Notification` values through the `Notifier` trait. The default
//! implementation posts them as JSON to a relay webhook.

use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    ReviewHeader,
    TaskItem,
    Digest,
    Prompt,
    Makeup,
}

/// Buttons the interaction layer may render on a task item. NotDone
/// leads to a postpone-by-1/postpone-by-2 follow-up on the client side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskAction {
    Complete,
    NotDone,
    Cancel,
}

pub const TASK_ITEM_ACTIONS: [TaskAction; 3] =
    [TaskAction::Complete, TaskAction::NotDone, TaskAction::Cancel];

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub chat_id: i64,
    pub kind: NotificationKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<TaskAction>,
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub webhook_url: String,
    pub auth_token: Option<String>,
}

impl TransportConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let webhook_url = env::var("WEBHOOK_URL")
            .map_err(|_| AppError::BadRequest("WEBHOOK_URL is not set".to_string()))?;
        let auth_token = env::var("WEBHOOK_TOKEN").ok();

        Ok(Self {
            webhook_url,
            auth_token,
        })
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), AppError>;
}

pub struct HttpNotifier {
    client: Client,
    config: TransportConfig,
}

impl HttpNotifier {
    pub fn new(config: TransportConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Transport(format!("failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        let mut request = self.client.post(&self.config.webhook_url).json(notification);
        if let Some(token) = &self.config.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transport(format!(
                "webhook error {}: {}",
                status, body
            )));
        }

        debug!(
            chat_id = notification.chat_id,
            kind = ?notification.kind,
            "notification delivered"
        );
        Ok(())
    }
}

/// Discards everything; used when no webhook is configured and in tests.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), AppError> {
        Ok(())
    }
}
