use async_trait::async_trait;
use teloxide::{prelude::*, types::ParseMode};

use crate::{config::env::TelegramConfig, notify::Notify};

/// Delivers messages to the operator chat, prefixed with the monitor header
/// naming the watched mail host.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
    header: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, mail_host: &str) -> Self {
        Self {
            bot: Bot::new(&config.bot_token),
            chat_id: ChatId(config.chat_id),
            header: format!("*Deferred queue monitor* {mail_host}"),
        }
    }
}

#[async_trait]
impl Notify for TelegramNotifier {
    async fn send(&self, text: &str) {
        let message = format!("{}\n\n{}", self.header, text);
        if let Err(err) = self
            .bot
            .send_message(self.chat_id, message)
            .parse_mode(ParseMode::Markdown)
            .await
        {
            tracing::warn!(
                target: "notify",
                error = %err,
                chat_id = self.chat_id.0,
                "failed to deliver operator notification"
            );
        }
    }
}
