use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Added on top of the long-polling timeout so the HTTP request outlives it.
const POLL_MARGIN: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Request failed: {0}")]
    RequestError(String),
    #[error("API request failed: {0}")]
    ApiError(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Minimal Telegram Bot API client: long polling and plain text replies.
#[derive(Debug, Clone)]
pub struct BotClient {
    http: reqwest::Client,
    endpoint: String,
}

impl BotClient {
    pub fn new(token: &str) -> Result<Self, TelegramError> {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    pub fn with_api_url(api_url: &str, token: &str) -> Result<Self, TelegramError> {
        if token.trim().is_empty() {
            return Err(TelegramError::ConfigError("bot token is empty".into()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    /// Fetch pending updates, waiting up to `timeout_secs` for new ones.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });

        self.call(
            "getUpdates",
            &body,
            Duration::from_secs(timeout_secs) + POLL_MARGIN,
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let _: serde_json::Value = self.call("sendMessage", &body, REQUEST_TIMEOUT).await?;
        debug!("Sent message to chat {}", chat_id);
        Ok(())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, TelegramError> {
        let response = self
            .http
            .post(format!("{}/{}", self.endpoint, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| TelegramError::RequestError(e.without_url().to_string()))?;

        let status = response.status();
        let reply: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TelegramError::ApiError(format!("{} ({}): {}", method, status, e)))?;

        match reply {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(TelegramError::ApiError(format!(
                "{} ({}): {}",
                method,
                status,
                description.unwrap_or_else(|| "Unknown error".into())
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub timestamp: DateTime<Utc>,
    pub plate_number: String,
    pub confidence: f32,
    pub access_status: AccessStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessStatus {
    Allowed,
    Denied,
}

/// Sends access alerts to an operator chat. Does nothing when unconfigured.
pub struct NotificationService {
    target: Option<(BotClient, i64)>,
}

impl NotificationService {
    pub fn new(client: Option<BotClient>, chat_id: Option<i64>) -> Self {
        let target = match (client, chat_id) {
            (Some(client), Some(chat_id)) => Some((client, chat_id)),
            _ => None,
        };
        Self { target }
    }

    pub fn disabled() -> Self {
        Self { target: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    pub async fn send_alert(&self, event: &DetectionEvent) -> Result<(), TelegramError> {
        let Some((client, chat_id)) = &self.target else {
            return Ok(());
        };

        info!("Sending alert for plate: {}", event.plate_number);
        let message = format_message(event);
        match client.send_message(*chat_id, &message).await {
            Ok(()) => {
                debug!("Successfully sent Telegram alert");
                Ok(())
            }
            Err(e) => {
                error!("Failed to send Telegram alert: {}", e);
                Err(e)
            }
        }
    }
}

fn format_message(event: &DetectionEvent) -> String {
    let status = match event.access_status {
        AccessStatus::Allowed => "✅ Allowed",
        AccessStatus::Denied => "❌ Denied",
    };

    format!(
        "🚗 License Plate Detection\n\n\
         Plate: {}\n\
         Status: {}\n\
         Confidence: {:.1}%\n\
         Time: {}",
        event.plate_number,
        status,
        event.confidence,
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
    )
}
