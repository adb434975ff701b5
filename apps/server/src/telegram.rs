//! Telegram transport
//!
//! Long-polls the Bot API with `getUpdates`. Advancing the offset past every
//! received update acknowledges it, so each update is delivered at most once
//! and no dedup is needed here.

use async_trait::async_trait;
use reqwest::Client;
use rtdl_core::{Gateway, InboundMessage, ReplySink, RtdlError};
use rtdl_types::TransportKind;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const API_BASE: &str = "https://api.telegram.org";
/// Seconds the server holds a `getUpdates` request open
const LONG_POLL_SECS: u64 = 30;
/// Telegram rejects messages longer than this many characters
const MAX_MESSAGE_CHARS: usize = 4096;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: Option<String>,
}

/// Minimal Bot API client
#[derive(Clone)]
pub struct TelegramApi {
    client: Client,
    base: String,
}

impl TelegramApi {
    pub fn new(token: &str) -> Result<Self, RtdlError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(LONG_POLL_SECS + 15))
            .build()
            .map_err(|e| RtdlError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base: format!("{}/bot{}", API_BASE, token),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, RtdlError> {
        let response: ApiResponse<T> = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(&body)
            .send()
            .await
            .map_err(|e| RtdlError::Network(e.without_url().to_string()))?
            .json()
            .await
            .map_err(|e| RtdlError::Network(e.without_url().to_string()))?;

        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(RtdlError::Network(format!(
                "{} failed: {}",
                method,
                response.description.unwrap_or_else(|| "no result".to_string())
            ))),
        }
    }

    pub async fn get_me(&self) -> Result<User, RtdlError> {
        self.call("getMe", json!({})).await
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, RtdlError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": LONG_POLL_SECS,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), RtdlError> {
        let _: Value = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": truncate_message(text),
                }),
            )
            .await?;
        Ok(())
    }
}

fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    out.push('…');
    out
}

/// Replies into the chat a message came from
struct ChatReply {
    api: TelegramApi,
    chat_id: i64,
}

#[async_trait]
impl ReplySink for ChatReply {
    async fn reply(&self, text: &str) -> Result<(), RtdlError> {
        self.api.send_message(self.chat_id, text).await
    }
}

/// Feeds Telegram messages into the gateway
pub struct TelegramAdapter {
    api: TelegramApi,
    gateway: Arc<Gateway>,
}

impl TelegramAdapter {
    pub fn new(token: &str, gateway: Arc<Gateway>) -> Result<Self, RtdlError> {
        Ok(Self {
            api: TelegramApi::new(token)?,
            gateway,
        })
    }

    /// Bot username for display; `None` if the lookup fails
    pub async fn fetch_username(&self) -> Option<String> {
        match self.api.get_me().await {
            Ok(user) => {
                if let Some(name) = &user.username {
                    info!("Telegram bot username: @{}", name);
                }
                user.username
            }
            Err(e) => {
                error!("Failed to fetch bot info: {}", e);
                None
            }
        }
    }

    /// Poll for updates until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        info!("Telegram bot started");
        let mut offset = 0i64;

        loop {
            let updates = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.api.get_updates(offset) => result,
            };

            match updates {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.dispatch(update);
                    }
                }
                Err(e) => {
                    warn!("Telegram polling error: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("Telegram bot stopped");
    }

    fn dispatch(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text else {
            return;
        };

        let username = message
            .from
            .and_then(|u| u.username)
            .unwrap_or_else(|| "unknown".to_string());
        debug!("Telegram @{} ({}): update {}", username, message.chat.id, update.update_id);

        let inbound = InboundMessage::new(TransportKind::Telegram, message.chat.id.to_string(), text);
        let sink = Arc::new(ChatReply {
            api: self.api.clone(),
            chat_id: message.chat.id,
        });
        tokio::spawn(self.gateway.clone().serve(inbound, sink));
    }
}
