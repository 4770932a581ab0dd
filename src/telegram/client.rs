// =============================================================================
// Telegram Bot API client — long polling, text replies, photo uploads
// =============================================================================
//
// SECURITY: the bot token is part of every request URL; it is never logged
// and the Debug impl redacts it.
// =============================================================================

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

const API_BASE: &str = "https://api.telegram.org";

/// Seconds Telegram holds a `getUpdates` call open when idle.
pub const LONG_POLL_TIMEOUT_SECS: u64 = 30;

// -----------------------------------------------------------------------------
// Wire types (only the fields the bot reads)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
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
    #[serde(default)]
    description: Option<String>,
}

/// Unwrap the `{ ok, result, description }` envelope.
fn unwrap_envelope<T: DeserializeOwned>(body: serde_json::Value, method: &str) -> Result<T> {
    let resp: ApiResponse<T> = serde_json::from_value(body)
        .with_context(|| format!("failed to parse Telegram {method} response"))?;
    if !resp.ok {
        anyhow::bail!(
            "Telegram {method} failed: {}",
            resp.description.unwrap_or_else(|| "no description".into())
        );
    }
    resp.result
        .with_context(|| format!("Telegram {method} response has no result"))
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

#[derive(Clone)]
pub struct TelegramClient {
    bot_url: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            anyhow::bail!("Telegram bot token is empty");
        }
        // Long polls stay open for LONG_POLL_TIMEOUT_SECS; leave headroom.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(LONG_POLL_TIMEOUT_SECS + 15))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            bot_url: format!("{API_BASE}/bot{}", token.trim()),
            client,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: serde_json::Value) -> Result<T> {
        let url = format!("{}/{method}", self.bot_url);
        let body: serde_json::Value = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Telegram {method} request failed"))?
            .json()
            .await
            .with_context(|| format!("Telegram {method} returned non-JSON body"))?;
        unwrap_envelope(body, method)
    }

    /// Long-poll for updates newer than `offset`.
    #[instrument(skip(self), name = "telegram::get_updates")]
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": LONG_POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "updates received");
        }
        Ok(updates)
    }

    #[instrument(skip(self, text), name = "telegram::send_message")]
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: Message = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    /// Upload `png` as a photo via multipart form.
    #[instrument(skip(self, png), fields(bytes = png.len()), name = "telegram::send_photo")]
    pub async fn send_photo(&self, chat_id: i64, file_name: &str, png: Vec<u8>) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(png)
            .file_name(file_name.to_string())
            .mime_str("image/png")
            .context("invalid photo mime type")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);

        let url = format!("{}/sendPhoto", self.bot_url);
        let body: serde_json::Value = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Telegram sendPhoto request failed")?
            .json()
            .await
            .context("Telegram sendPhoto returned non-JSON body")?;
        let _: Message = unwrap_envelope(body, "sendPhoto")?;
        debug!(chat_id, file_name, "photo delivered");
        Ok(())
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("bot_url", &"<redacted>")
            .finish()
    }
}
