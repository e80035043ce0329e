use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use {
    async_trait::async_trait,
    teleagent_channels::{
        ChatTransport, Dialog, Error as ChannelError, HistoryMessage, Result, normalize_handle,
    },
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{ChatId, Recipient, UserId},
    },
    tokio::task::JoinSet,
    tracing::{debug, info, warn},
};

use crate::{
    state::SeenChats,
    text::{TELEGRAM_MAX_MESSAGE_LEN, split_message},
};

const RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Outbound half of the Telegram transport.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
    /// The bot's own account, needed to check chat membership.
    me: Option<UserId>,
    seen: SeenChats,
    service_channel: Option<String>,
    /// Sends waiting out their delay.
    scheduled: Arc<Mutex<JoinSet<()>>>,
}

impl TelegramOutbound {
    pub fn new(bot: Bot, seen: SeenChats, service_channel: Option<String>) -> Self {
        Self {
            bot,
            me: None,
            seen,
            service_channel: service_channel
                .map(|c| normalize_handle(&c))
                .filter(|c| !c.is_empty()),
            scheduled: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_account(mut self, me: UserId) -> Self {
        self.me = Some(me);
        self
    }

    fn scheduled(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.scheduled.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Delayed sends that have not fired yet.
    pub fn pending_scheduled(&self) -> usize {
        let mut scheduled = self.scheduled();
        while scheduled.try_join_next().is_some() {}
        scheduled.len()
    }

    /// Abort every delayed send that has not fired yet. Returns how many
    /// were dropped.
    pub fn abort_scheduled(&self) -> usize {
        let pending = self.pending_scheduled();
        if pending > 0 {
            warn!(pending, "dropping scheduled telegram messages");
        }
        self.scheduled().abort_all();
        pending
    }

    async fn send_now(
        bot: &Bot,
        chat: &str,
        text: &str,
    ) -> std::result::Result<(), RequestError> {
        let target = recipient(chat);
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LEN) {
            with_retry(chat, "send message", || {
                let req = bot.send_message(target.clone(), chunk.clone());
                async move { req.await }
            })
            .await?;
        }
        debug!(chat, "telegram message sent");
        Ok(())
    }
}

/// Numeric strings are chat ids, anything else a public `@username`.
fn recipient(chat: &str) -> Recipient {
    match chat.trim().parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(format!("@{}", normalize_handle(chat))),
    }
}

fn channel_error(operation: &str, chat: &str, error: RequestError) -> ChannelError {
    match error {
        RequestError::Api(ApiError::ChatNotFound) => ChannelError::unknown_chat(chat),
        other => ChannelError::external(format!("telegram {operation}"), other),
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

/// Run a Bot API request, waiting out rate limits a few times.
async fn with_retry<T, F, Fut>(
    chat: &str,
    operation: &'static str,
    mut request: F,
) -> std::result::Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RequestError>>,
{
    let mut retries = 0usize;
    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };
                if retries >= RETRY_AFTER_MAX_RETRIES {
                    warn!(chat, operation, retries, "telegram rate limit persisted after retries");
                    return Err(err);
                }
                retries += 1;
                warn!(
                    chat,
                    operation,
                    retries,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramOutbound {
    async fn send(&self, chat: &str, text: &str, delay: Option<Duration>) -> Result<()> {
        let Some(delay) = delay.filter(|d| !d.is_zero()) else {
            return Self::send_now(&self.bot, chat, text)
                .await
                .map_err(|e| channel_error("send message", chat, e));
        };

        // The Bot API has no scheduled messages; hold the send in a task.
        let bot = self.bot.clone();
        let chat = chat.to_string();
        let text = text.to_string();
        info!(chat = %chat, delay_secs = delay.as_secs(), "telegram message scheduled");
        let task = async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = Self::send_now(&bot, &chat, &text).await {
                warn!(chat = %chat, error = %e, "scheduled telegram message failed");
            }
        };
        {
            let mut scheduled = self.scheduled();
            while scheduled.try_join_next().is_some() {}
            scheduled.spawn(task);
        }
        Ok(())
    }

    /// Bots cannot join chats on their own. This succeeds when the bot has
    /// already been added to the chat.
    async fn join_channel(&self, handle: &str) -> Result<()> {
        let not_joinable = || {
            ChannelError::unavailable(format!(
                "a bot cannot join {handle} by itself; add it to the chat as a member or admin"
            ))
        };
        let Some(me) = self.me else {
            return Err(not_joinable());
        };

        let member = with_retry(handle, "get chat member", || {
            let req = self.bot.get_chat_member(recipient(handle), me);
            async move { req.await }
        })
        .await
        .map_err(|e| channel_error("get chat member", handle, e))?;

        if !member.kind.is_present() {
            return Err(not_joinable());
        }
        self.seen.record(handle);
        debug!(chat = handle, "bot is already a member");
        Ok(())
    }

    async fn leave_channel(&self, handle: &str) -> Result<()> {
        with_retry(handle, "leave chat", || {
            let req = self.bot.leave_chat(recipient(handle));
            async move { req.await }
        })
        .await
        .map_err(|e| channel_error("leave chat", handle, e))?;
        self.seen.forget(handle);
        Ok(())
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>> {
        let mut handles = self.seen.handles();
        if let Some(service) = &self.service_channel
            && !handles.contains(service)
        {
            handles.push(service.clone());
        }
        Ok(handles
            .into_iter()
            .map(|handle| Dialog { handle })
            .collect())
    }

    async fn fetch_messages(&self, handle: &str, _limit: u32) -> Result<Vec<HistoryMessage>> {
        Err(ChannelError::unavailable(format!(
            "the Bot API cannot read the history of {handle}"
        )))
    }
}
