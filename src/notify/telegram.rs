use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::notify::{Notifier, NotifyError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram Bot API delivery. `send` is best effort: failures are
/// logged and swallowed so an unreachable chat can never take down a
/// detection pass.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            client: Client::new(),
        }
    }

    async fn try_send(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Api(body));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) {
        match self.try_send(text).await {
            Ok(()) => debug!(chars = text.chars().count(), "alert delivered"),
            Err(e) => warn!("alert delivery failed: {e}"),
        }
    }
}
