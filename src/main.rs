//! coursebot · Course-assistant quiz bot
//!
//! - Telegram long-poll transport, strictly sequential message handling
//! - LLM-judged free-text quiz answers with bounded retries
//! - Durable quiz/progress documents with atomic replace-on-save
//! - Weekly state backups on an independent task
//!
//! Important env variables:
//!   TELEGRAM_BOT_TOKEN : bot token for the chat transport
//!   OPENAI_API_KEY     : key for the judge endpoint
//!   COURSEBOT_CONFIG   : path to TOML config (default "coursebot.toml")
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod backup;
mod config;
mod dispatch;
mod domain;
mod error;
mod judge;
mod protocol;
mod session;
mod state;
mod stats;
mod store;
mod telegram;
mod telemetry;
mod util;
mod wizard;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::load_bot_config;
use crate::judge::OpenAiJudge;
use crate::state::AppState;
use crate::store::StateStore;
use crate::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    let config_path = PathBuf::from(
        std::env::var("COURSEBOT_CONFIG").unwrap_or_else(|_| "coursebot.toml".into()),
    );
    let cfg = load_bot_config(&config_path).unwrap_or_default();

    let token = std::env::var("TELEGRAM_BOT_TOKEN")
        .map_err(|_| "TELEGRAM_BOT_TOKEN is not set")?;
    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| "OPENAI_API_KEY is not set")?;
    let tg = TelegramClient::new(&token).ok_or("failed to build the Telegram client")?;
    let judge = OpenAiJudge::new(&cfg.judge, api_key).ok_or("failed to build the judge client")?;

    let data_dir = cfg.data_dir.clone();
    let state = Arc::new(AppState::new(StateStore::new(&data_dir)));
    backup::spawn(state.clone(), tg.clone(), config_path.clone(), data_dir.join("backups"));

    info!(
        target: "coursebot",
        config = %config_path.display(),
        data_dir = %data_dir.display(),
        admins = cfg.admin_users.len(),
        "coursebot started"
    );

    // One long-lived polling loop: updates are fetched and handled strictly
    // sequentially, which keeps the per-user state machines race-free
    // without locking inside the handlers.
    let mut offset = 0i64;
    loop {
        let batch = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            r = tg.get_updates(offset) => r,
        };
        let updates = match batch {
            Ok(updates) => updates,
            Err(e) => {
                error!(target: "coursebot", error = %e, "getUpdates failed; backing off");
                tokio::time::sleep(Duration::from_secs(3)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(inbound) = update.to_inbound() else { continue };

            // Re-read the config per message so admin-list and policy edits
            // apply without a restart; the core never caches either.
            let cfg = load_bot_config(&config_path).unwrap_or_default();
            let request_id = Uuid::new_v4();
            let span = info_span!("update", %request_id, update_id = update.update_id);
            async {
                let replies = dispatch::handle_message(state.as_ref(), &cfg, &judge, &inbound).await;
                for out in &replies {
                    tg.deliver(&cfg.admin_users, out).await;
                }
            }
            .instrument(span)
            .await;
        }
    }

    info!(target: "coursebot", "Shutting down");
    Ok(())
}
