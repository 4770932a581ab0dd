// =============================================================================
// Telegram front-end — long-poll loop and per-update handling
// =============================================================================
//
// Each update is handled on its own task so one slow chart never delays
// another chat.  Poll errors back off for 5 s and retry; the offset is only
// advanced past updates that were received.
// =============================================================================

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::telegram::client::{TelegramClient, Update};
use crate::telegram::commands::{self, Command};

/// Poll Telegram forever, dispatching every message to [`handle_update`].
pub async fn run_bot(state: Arc<AppState>, telegram: TelegramClient) {
    info!("Telegram long-poll loop starting");
    let mut offset: i64 = 0;

    loop {
        match telegram.get_updates(offset).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let st = state.clone();
                    let tg = telegram.clone();
                    tokio::spawn(async move { handle_update(&st, &tg, update).await });
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed — retrying in 5s");
                tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
            }
        }
    }
}

async fn handle_update(state: &AppState, telegram: &TelegramClient, update: Update) {
    let Some(message) = update.message else {
        return;
    };
    let Some(text) = message.text.as_deref() else {
        return;
    };
    let chat_id = message.chat.id;

    let result = match commands::parse(text) {
        None => return,
        Some(Command::Start) => telegram.send_message(chat_id, commands::USAGE_HINT).await,
        Some(Command::MalformedSignal) => telegram.send_message(chat_id, commands::FORMAT_HINT).await,
        Some(Command::Signal(request)) => {
            if let Err(e) = telegram
                .send_message(chat_id, &commands::progress_text(&request))
                .await
            {
                warn!(chat_id, error = %e, "failed to send progress message");
            }

            match state.generate_chart(request).await {
                Ok(artifact) => {
                    telegram
                        .send_photo(chat_id, &artifact.file_name, artifact.png)
                        .await
                }
                Err(e) => telegram.send_message(chat_id, &commands::error_text(&e)).await,
            }
        }
    };

    if let Err(e) = result {
        state.record_error("CollaboratorFailure", format!("delivery failed: {e:#}"));
        error!(chat_id, error = %e, "failed to deliver Telegram reply");
    }
}
