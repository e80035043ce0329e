use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teleagent_channels::ChatEvent,
    teleagent_config::TelegramConfig,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, Chat, UpdateKind},
    },
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    error::{Error, Result},
    inbound::event_from_message,
    outbound::TelegramOutbound,
    state::SeenChats,
};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A connected bot account.
pub struct TelegramBot {
    bot: Bot,
    username: Option<String>,
    poll_timeout_secs: u32,
    seen: SeenChats,
    outbound: Arc<TelegramOutbound>,
}

/// Verify the token, clear any webhook and prepare the transport.
pub async fn connect(config: &TelegramConfig) -> Result<TelegramBot> {
    if !config.has_token() {
        return Err(Error::message("telegram.token is not set"));
    }

    // The HTTP timeout must outlast the long-polling timeout.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs) + 15))
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    let me = bot.get_me().await?;
    bot.delete_webhook().await?;
    info!(username = ?me.username, "telegram bot connected (webhook cleared)");

    let seen = SeenChats::default();
    let outbound = Arc::new(
        TelegramOutbound::new(bot.clone(), seen.clone(), config.service_channel.clone())
            .with_account(me.id),
    );

    Ok(TelegramBot {
        bot,
        username: me.username.clone(),
        poll_timeout_secs: config.poll_timeout_secs,
        seen,
        outbound,
    })
}

impl TelegramBot {
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn outbound(&self) -> Arc<TelegramOutbound> {
        Arc::clone(&self.outbound)
    }

    /// Spawn the long-polling loop. Events are pushed into `events` until
    /// `cancel` fires, the receiver is dropped, or another instance takes
    /// over the token.
    pub fn start_polling(
        &self,
        events: mpsc::Sender<ChatEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let bot = self.bot.clone();
        let seen = self.seen.clone();
        let timeout = self.poll_timeout_secs;
        tokio::spawn(async move { poll_loop(bot, seen, timeout, events, cancel).await })
    }
}

/// Remember public groups and channels. Private chats are people, not
/// chats the bot is a member of.
fn record_chat(seen: &SeenChats, chat: &Chat) {
    if chat.is_private() {
        return;
    }
    if let Some(handle) = chat.username() {
        seen.record(handle);
    }
}

async fn poll_loop(
    bot: Bot,
    seen: SeenChats,
    timeout: u32,
    events: mpsc::Sender<ChatEvent>,
    cancel: CancellationToken,
) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(timeout)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::ChannelPost]);

        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    let msg = match update.kind {
                        UpdateKind::Message(msg) | UpdateKind::ChannelPost(msg) => msg,
                        other => {
                            debug!("ignoring telegram update: {other:?}");
                            continue;
                        },
                    };
                    record_chat(&seen, &msg.chat);
                    let Some(event) = event_from_message(&msg) else {
                        debug!(chat = msg.chat.id.0, "ignoring message without text");
                        continue;
                    };
                    if events.send(event).await.is_err() {
                        info!("event receiver closed, stopping telegram polling");
                        return;
                    }
                }
            },
            Err(e) => {
                if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                    error!("another instance is polling with this bot token, stopping");
                    cancel.cancel();
                    break;
                }

                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(ERROR_BACKOFF) => {},
                }
            },
        }
    }

    info!("telegram polling stopped");
}
