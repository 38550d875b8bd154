//! Telegram transport: normalizes teloxide updates into [`InboundEvent`]s
//! and renders [`OutboundMessage`]s back as Telegram messages.

use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode,
    ReplyMarkup,
};

use super::dispatcher::ConversationController;
use super::intent;
use super::transport::Transport;
use super::types::{InboundEvent, Intent, Keyboard, OutboundMessage};
use crate::error::TransportError;

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, user_id: i64, message: OutboundMessage) -> Result<(), TransportError> {
        let mut request = self.bot.send_message(ChatId(user_id), message.text);
        if message.html {
            request = request.parse_mode(ParseMode::Html);
        }
        if let Some(keyboard) = message.keyboard {
            request = request.reply_markup(reply_markup(keyboard));
        }

        request
            .send()
            .await
            .map(|_| ())
            .map_err(|e| TransportError(e.to_string()))
    }
}

fn reply_markup(keyboard: Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Reply(rows) => {
            let mut markup = KeyboardMarkup::new(
                rows.into_iter()
                    .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>())
                    .collect::<Vec<_>>(),
            );
            markup.one_time_keyboard = true.into();
            markup.resize_keyboard = true.into();
            ReplyMarkup::Keyboard(markup)
        }
        Keyboard::Inline(rows) => ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(
            rows.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|button| InlineKeyboardButton::callback(button.label, button.data))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        )),
        Keyboard::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    }
}

/// Long-poll Telegram until Ctrl-C, routing every update to the controller.
pub async fn run(bot: Bot, controller: Arc<ConversationController>) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    log::info!("[TELEGRAM] Starting long polling");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![controller])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    log::info!("[TELEGRAM] Dispatcher stopped");
}

async fn on_message(bot: Bot, msg: Message, controller: Arc<ConversationController>) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        log::debug!("[TELEGRAM] Ignoring message from non-private chat {}", msg.chat.id);
        return Ok(());
    }
    let Some(user) = msg.from() else {
        return Ok(());
    };

    let intent = match msg.text() {
        Some(text) => intent::from_text(text),
        None => Intent::Unsupported,
    };
    let event = InboundEvent {
        user_id: msg.chat.id.0,
        user_name: user.first_name.clone(),
        intent,
    };

    controller.handle(event, &TelegramTransport::new(bot)).await;
    Ok(())
}

async fn on_callback(bot: Bot, q: CallbackQuery, controller: Arc<ConversationController>) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).send().await?;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let event = InboundEvent {
        user_id: q.from.id.0 as i64,
        user_name: q.from.first_name.clone(),
        intent: intent::from_callback(data),
    };

    controller.handle(event, &TelegramTransport::new(bot)).await;
    Ok(())
}
