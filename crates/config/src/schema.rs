use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeleagentConfig {
    pub telegram: TelegramConfig,
    pub completion: CompletionConfig,
    pub turn: TurnSettings,
    pub database: DatabaseConfig,
}

/// Telegram account and access rules.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: Secret<String>,

    /// Senders allowed to issue commands in private messages. Entries match
    /// the numeric sender id or the username, case-insensitively, and may
    /// contain `*` wildcards. An empty list denies everyone.
    pub whitelist: Vec<String>,

    /// Channel where every message is treated as a command.
    pub service_channel: Option<String>,

    /// Long-polling timeout passed to `getUpdates`.
    pub poll_timeout_secs: u32,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("whitelist", &self.whitelist)
            .field("service_channel", &self.service_channel)
            .finish_non_exhaustive()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            whitelist: Vec::new(),
            service_channel: None,
            poll_timeout_secs: 30,
        }
    }
}

impl TelegramConfig {
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

/// Environment variable consulted when `completion.api_key` is empty.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Remote completion engine (OpenAI Assistants API).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub api_key: Secret<String>,
    pub base_url: String,
    pub assistant_id: String,
    /// Conversation thread used for commands from the whitelist and the
    /// service channel.
    pub thread_id: String,
    /// I/O timeout for each HTTP request, independent of the poll cadence.
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("assistant_id", &self.assistant_id)
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            base_url: "https://api.openai.com/v1".into(),
            assistant_id: String::new(),
            thread_id: String::new(),
            request_timeout_secs: 60,
        }
    }
}

impl CompletionConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    /// The configured key, or [`API_KEY_ENV`] from the process environment.
    pub fn resolve_api_key(&self) -> Option<Secret<String>> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::resolve_api_key`] with an explicit environment lookup.
    pub fn resolve_api_key_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<Secret<String>> {
        if self.has_api_key() {
            return Some(self.api_key.clone());
        }
        env(API_KEY_ENV)
            .filter(|key| !key.trim().is_empty())
            .map(Secret::new)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Poll cadence and budgets for a single agent turn.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TurnSettings {
    pub poll_interval_ms: u64,
    /// Upper bound of the random delay added to every poll interval.
    pub poll_jitter_ms: u64,
    /// Maximum number of status polls per turn.
    pub max_cycles: usize,
    /// Maximum number of actions the engine may request in one turn. Unset
    /// means the turn is bounded only by `max_cycles`.
    pub max_actions: Option<usize>,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            poll_jitter_ms: 0,
            max_cycles: 25,
            max_actions: None,
        }
    }
}

impl TurnSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_jitter(&self) -> Duration {
        Duration::from_millis(self.poll_jitter_ms)
    }
}

/// Local SQLite store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://teleagent.db?mode=rwc".into(),
            max_connections: 5,
        }
    }
}
