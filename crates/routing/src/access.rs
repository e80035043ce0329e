use {
    teleagent_channels::{ChatEvent, WatchlistSnapshot, gating, normalize_handle},
    teleagent_config::TelegramConfig,
};

/// Static access rules for the command path.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    whitelist: Vec<String>,
    /// Normalized handle or numeric chat id.
    service_channel: Option<String>,
}

impl AccessPolicy {
    pub fn new(whitelist: Vec<String>, service_channel: Option<&str>) -> Self {
        Self {
            whitelist,
            service_channel: service_channel
                .map(normalize_handle)
                .filter(|c| !c.is_empty()),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(
            config.whitelist.clone(),
            config.service_channel.as_deref(),
        )
    }

    fn is_service_channel(&self, event: &ChatEvent) -> bool {
        let Some(service) = &self.service_channel else {
            return false;
        };
        event.chat_id == *service
            || event
                .chat_handle
                .as_deref()
                .is_some_and(|h| normalize_handle(h) == *service)
    }
}

/// What to do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Run a turn and send the reply to `reply_to`.
    Command { reply_to: String },
    /// Append to the message log of `channel`.
    Passive { channel: String },
    Drop(DropReason),
}

/// Why an event was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    EmptyText,
    SenderNotWhitelisted,
    NotWatched,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "message has no text"),
            Self::SenderNotWhitelisted => write!(f, "sender not on whitelist"),
            Self::NotWatched => write!(f, "chat is not watched"),
        }
    }
}

/// Classify an inbound event. Performs no I/O.
pub fn classify(event: &ChatEvent, policy: &AccessPolicy, watchlist: &WatchlistSnapshot) -> Route {
    if event.text.trim().is_empty() {
        return Route::Drop(DropReason::EmptyText);
    }

    if event.is_private() {
        return if gating::sender_allowed(
            &event.sender_id,
            event.sender_handle.as_deref(),
            &policy.whitelist,
        ) {
            Route::Command {
                reply_to: event.chat_id.clone(),
            }
        } else {
            Route::Drop(DropReason::SenderNotWhitelisted)
        };
    }

    if policy.is_service_channel(event) {
        return Route::Command {
            reply_to: event.chat_id.clone(),
        };
    }

    match event.chat_handle.as_deref().map(normalize_handle) {
        Some(channel) if watchlist.contains(&channel) => Route::Passive { channel },
        _ => Route::Drop(DropReason::NotWatched),
    }
}
