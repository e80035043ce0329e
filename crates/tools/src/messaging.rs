//! Sending messages and reading channel history.

use std::time::Duration;

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    serde_json::Value,
    teleagent_agents::{ActionArgs, ActionHandler, ParamKind, ParamSpec},
    teleagent_channels::{Error as ChannelError, HistoryMessage},
    tracing::{debug, info},
};

use crate::context::{ActionContext, ENTITY, channel_arg};

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

/// Sends a text message, optionally after a delay.
pub struct SendMessage {
    ctx: ActionContext,
}

impl SendMessage {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

const SEND_PARAMS: &[ParamSpec] = &[
    ParamSpec::required(ENTITY, ParamKind::String, "Recipient chat, channel or user"),
    ParamSpec::required("message", ParamKind::String, "Text to send"),
    ParamSpec::optional(
        "schedule",
        ParamKind::Integer,
        "Delay in seconds before the message is sent",
    ),
];

#[async_trait]
impl ActionHandler for SendMessage {
    fn name(&self) -> &str {
        "send-message"
    }

    fn description(&self) -> &str {
        "Send a text message to a chat, channel or user, optionally scheduled \
         a number of seconds in the future."
    }

    fn params(&self) -> &[ParamSpec] {
        SEND_PARAMS
    }

    async fn execute(&self, args: &ActionArgs) -> Result<Value> {
        let chat = channel_arg(args.get(ENTITY).unwrap_or_default())?;
        let message = args.get("message").unwrap_or_default();
        let delay = match args.get_i64("schedule") {
            None | Some(0) => None,
            Some(secs) if secs < 0 => anyhow::bail!("schedule must not be negative"),
            Some(secs) => Some(Duration::from_secs(secs.unsigned_abs())),
        };

        self.ctx
            .transport
            .send(&chat, message, delay)
            .await
            .with_context(|| format!("failed to send to {chat}"))?;
        info!(chat = %chat, delay_secs = delay.map(|d| d.as_secs()), "message sent");
        Ok(Value::Null)
    }
}

/// Reads the most recent messages of a channel. When the transport cannot
/// read history, messages logged from watched channels are served instead.
pub struct FetchHistory {
    ctx: ActionContext,
}

impl FetchHistory {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

const HISTORY_PARAMS: &[ParamSpec] = &[
    ParamSpec::required(ENTITY, ParamKind::String, "Channel or group to read"),
    ParamSpec::optional(
        "limit",
        ParamKind::Integer,
        "Maximum number of messages, newest first (default 20)",
    ),
];

#[async_trait]
impl ActionHandler for FetchHistory {
    fn name(&self) -> &str {
        "fetch-history"
    }

    fn description(&self) -> &str {
        "Fetch the most recent messages of a channel or group, newest first. \
         Falls back to the local log for watched channels."
    }

    fn params(&self) -> &[ParamSpec] {
        HISTORY_PARAMS
    }

    async fn execute(&self, args: &ActionArgs) -> Result<Value> {
        let handle = channel_arg(args.get(ENTITY).unwrap_or_default())?;
        let limit = args.get_i64("limit").unwrap_or(DEFAULT_HISTORY_LIMIT);
        if limit <= 0 {
            anyhow::bail!("limit must be positive");
        }
        let limit = limit.min(MAX_HISTORY_LIMIT) as u32;

        let messages = match self.ctx.transport.fetch_messages(&handle, limit).await {
            Ok(messages) => messages,
            Err(ChannelError::Unavailable { message }) => {
                debug!(chat = %handle, reason = %message, "reading history from the local log");
                self.logged_history(&handle, limit)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!("failed to fetch history of {handle}: {message}")
                    })?
            },
            Err(e) => {
                return Err(e).with_context(|| format!("failed to fetch history of {handle}"));
            },
        };
        Ok(serde_json::to_value(messages)?)
    }
}

impl FetchHistory {
    /// Logged messages of `handle`, or `None` if the channel was never
    /// watched or logged.
    async fn logged_history(
        &self,
        handle: &str,
        limit: u32,
    ) -> Result<Option<Vec<HistoryMessage>>> {
        let logged = self.ctx.store.recent_messages(handle, limit).await?;
        if logged.is_empty() && !self.ctx.watchlist.contains(handle) {
            return Ok(None);
        }
        Ok(Some(logged.into_iter().map(HistoryMessage::from).collect()))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{self, Sent},
        rstest::rstest,
        serde_json::json,
        std::sync::atomic::Ordering,
        teleagent_channels::MessageRecord,
    };

    #[rstest]
    #[case::immediate(None, None)]
    #[case::zero(Some("0"), None)]
    #[case::delayed(Some("90"), Some(Duration::from_secs(90)))]
    #[tokio::test]
    async fn send_with_schedule(#[case] schedule: Option<&str>, #[case] delay: Option<Duration>) {
        let (ctx, transport) = test_support::context().await;
        let mut args = ActionArgs::new()
            .with(ENTITY, "@Friends")
            .with("message", "see you at 8");
        if let Some(schedule) = schedule {
            args = args.with("schedule", schedule);
        }

        SendMessage::new(ctx).execute(&args).await.unwrap();
        assert_eq!(*transport.sent.lock().unwrap(), vec![Sent {
            chat: "friends".into(),
            text: "see you at 8".into(),
            delay,
        }]);
    }

    #[tokio::test]
    async fn negative_schedule_is_rejected() {
        let (ctx, transport) = test_support::context().await;
        let args = ActionArgs::new()
            .with(ENTITY, "friends")
            .with("message", "hi")
            .with("schedule", "-5");
        assert!(SendMessage::new(ctx).execute(&args).await.is_err());
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_respects_limit_and_shape() {
        let (ctx, transport) = test_support::context().await;
        *transport.history.lock().unwrap() = (1..=30)
            .rev()
            .map(|id| HistoryMessage {
                id,
                sender_handle: Some("alice".into()),
                text: format!("post {id}"),
                timestamp: 1_700_000_000 + id,
            })
            .collect();

        let handler = FetchHistory::new(ctx);
        let default = handler
            .execute(&ActionArgs::new().with(ENTITY, "news"))
            .await
            .unwrap();
        assert_eq!(default.as_array().unwrap().len(), 20);
        assert_eq!(
            default[0],
            json!({
                "id": 30,
                "senderHandle": "alice",
                "text": "post 30",
                "timestamp": 1_700_000_030
            })
        );

        let three = handler
            .execute(&ActionArgs::new().with(ENTITY, "news").with("limit", "3"))
            .await
            .unwrap();
        assert_eq!(three.as_array().unwrap().len(), 3);

        assert!(
            handler
                .execute(&ActionArgs::new().with(ENTITY, "news").with("limit", "0"))
                .await
                .is_err()
        );
    }

    async fn log(ctx: &ActionContext, channel: &str, count: i64) {
        for n in 1..=count {
            ctx.store
                .append_message(&MessageRecord {
                    sender_id: "-1001".into(),
                    sender_handle: Some(channel.into()),
                    channel_handle: channel.into(),
                    text: format!("post {n}"),
                    sent_at: 1_700_000_000 + n,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn history_falls_back_to_logged_messages() {
        let (ctx, transport) = test_support::context().await;
        transport.history_unavailable.store(true, Ordering::SeqCst);
        log(&ctx, "news", 120).await;
        log(&ctx, "other", 2).await;

        let handler = FetchHistory::new(ctx);
        let default = handler
            .execute(&ActionArgs::new().with(ENTITY, "https://t.me/News"))
            .await
            .unwrap();
        let default = default.as_array().unwrap();
        assert_eq!(default.len(), 20);
        assert_eq!(default[0]["senderHandle"], "news");
        assert_eq!(default[0]["text"], "post 120");
        assert_eq!(default[0]["timestamp"], 1_700_000_120);
        assert!(default[0]["id"].as_i64().unwrap() > default[1]["id"].as_i64().unwrap());

        let capped = handler
            .execute(&ActionArgs::new().with(ENTITY, "news").with("limit", "500"))
            .await
            .unwrap();
        assert_eq!(capped.as_array().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn watched_channel_without_logs_has_empty_history() {
        let (ctx, transport) = test_support::context().await;
        transport.history_unavailable.store(true, Ordering::SeqCst);
        ctx.store.add_to_watchlist("quiet").await.unwrap();
        ctx.watchlist.refresh(ctx.store.as_ref()).await.unwrap();

        let info = FetchHistory::new(ctx)
            .execute(&ActionArgs::new().with(ENTITY, "@quiet"))
            .await
            .unwrap();
        assert_eq!(info, json!([]));
    }

    #[tokio::test]
    async fn unknown_channel_history_stays_unavailable() {
        let (ctx, transport) = test_support::context().await;
        transport.history_unavailable.store(true, Ordering::SeqCst);

        let err = FetchHistory::new(ctx)
            .execute(&ActionArgs::new().with(ENTITY, "elsewhere"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("history is not readable"));
    }
}
