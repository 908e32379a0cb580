//! Minimal Telegram Bot API client: long-poll getUpdates plus sendMessage.
//!
//! Deliberately dumb transport glue: it reduces updates to [`Inbound`] and
//! delivers [`Outbound`] replies, nothing else. Delivery is best-effort:
//! failures are logged and dropped (no exactly-once guarantee).

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

use crate::protocol::{Inbound, Outbound, Recipient};
use crate::util::trunc_for_log;

/// Seconds the server holds an empty getUpdates poll open.
const POLL_TIMEOUT_SECS: u64 = 25;

#[derive(Clone)]
pub struct TelegramClient {
  client: reqwest::Client,
  base_url: String,
}

impl TelegramClient {
  /// Build the client for a bot token. Returns None if the HTTP client
  /// cannot be built. The token is embedded in the URL and never logged.
  pub fn new(token: &str) -> Option<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
      .build()
      .ok()?;
    Some(Self {
      client,
      base_url: format!("https://api.telegram.org/bot{}", token),
    })
  }

  /// Long-poll for the next batch of updates after `offset`.
  #[instrument(level = "debug", skip(self))]
  pub async fn get_updates(&self, offset: i64) -> Result<Vec<TgUpdate>, String> {
    let url = format!("{}/getUpdates", self.base_url);
    let body = json!({
      "offset": offset,
      "timeout": POLL_TIMEOUT_SECS,
      "allowed_updates": ["message"],
    });
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "coursebot/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&body)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      return Err(format!("Telegram HTTP {}: {}", status, trunc_for_log(&body, 200)));
    }

    let envelope: ApiEnvelope<Vec<TgUpdate>> = res.json().await.map_err(|e| e.to_string())?;
    if !envelope.ok {
      return Err(envelope.description.unwrap_or_else(|| "getUpdates not ok".into()));
    }
    Ok(envelope.result.unwrap_or_default())
  }

  #[instrument(level = "debug", skip(self, text), fields(chat_id, text_len = text.len()))]
  pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String> {
    let url = format!("{}/sendMessage", self.base_url);
    let body = json!({ "chat_id": chat_id, "text": text });
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "coursebot/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&body)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      return Err(format!("Telegram HTTP {}: {}", status, trunc_for_log(&body, 200)));
    }
    Ok(())
  }

  /// Deliver one reply, expanding the admin broadcast to the allow-list.
  /// Best-effort: failures are logged, never bubbled into the core.
  pub async fn deliver(&self, admins: &[i64], out: &Outbound) {
    let chats: Vec<i64> = match out.recipient {
      Recipient::Chat(id) => vec![id],
      Recipient::AdminBroadcast => admins.to_vec(),
    };
    for chat_id in chats {
      if let Err(e) = self.send_message(chat_id, &out.text).await {
        warn!(target: "coursebot", chat_id, error = %e, "Outbound message dropped");
      }
    }
  }
}

// --- Wire DTOs (only the fields the core needs) ---

#[derive(Deserialize)]
struct ApiEnvelope<T> {
  ok: bool,
  #[serde(default)]
  description: Option<String>,
  result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct TgUpdate {
  pub update_id: i64,
  #[serde(default)]
  pub message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TgMessage {
  #[serde(default)]
  pub from: Option<TgUser>,
  pub chat: TgChat,
  #[serde(default)]
  pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TgUser {
  pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TgChat {
  pub id: i64,
  #[serde(rename = "type")]
  pub kind: String,
}

impl TgUpdate {
  /// Reduce an update to the tuple the core consumes. Non-text updates and
  /// messages without a sender are dropped.
  pub fn to_inbound(&self) -> Option<Inbound> {
    let msg = self.message.as_ref()?;
    let from = msg.from.as_ref()?;
    let text = msg.text.clone()?;
    Some(Inbound {
      user_id: from.id,
      chat_id: msg.chat.id,
      text,
      is_private: msg.chat.kind == "private",
    })
  }
}
