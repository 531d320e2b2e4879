//! Telegram chat notifier

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::TelegramConfig;
use crate::io::HttpClient;
use crate::notifier::ChatNotifier;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram hard limit is 4096 chars; cut earlier to leave room for the marker.
const MESSAGE_LIMIT: usize = 4000;
const TRUNCATION_MARKER: &str = "\n… (truncated)";

/// Sends text blobs to a Telegram chat via the Bot API.
///
/// An empty token or chat id disables the notifier: sends are skipped
/// with a warning instead of failing the cycle.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            http,
        }
    }

    fn configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

/// Cut a message down to the platform limit, marking the cut.
fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let cut: String = text.chars().take(MESSAGE_LIMIT).collect();
    format!("{}{}", cut, TRUNCATION_MARKER)
}

#[async_trait]
impl ChatNotifier for TelegramNotifier {
    async fn send(&self, text: &str) -> crate::Result<()> {
        if !self.configured() {
            tracing::warn!("TG_BOT_TOKEN / TG_CHAT_ID not set, skipping Telegram message");
            return Ok(());
        }

        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_URL, self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": truncate_message(text),
        });

        let response = self.http.post_json(&url, None, &body).await?;
        if !response.ok() {
            return Err(crate::WatchtowerError::Notifier(format!(
                "Telegram API returned status {}: {}",
                response.status, response.body
            )));
        }

        tracing::debug!("Telegram message sent ({} chars)", text.len());
        Ok(())
    }
}
