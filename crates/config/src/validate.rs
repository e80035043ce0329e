//! Startup checks for a loaded configuration.

use crate::schema::{API_KEY_ENV, TeleagentConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "completion.thread_id"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn error(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            path,
            message: message.into(),
        });
    }

    fn warning(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            path,
            message: message.into(),
        });
    }
}

/// Check that everything `run` needs is present.
pub fn validate(config: &TeleagentConfig) -> ValidationResult {
    validate_with_env(config, |name| std::env::var(name).ok())
}

/// [`validate`] with an explicit environment lookup for secrets that may
/// come from the environment.
pub fn validate_with_env(
    config: &TeleagentConfig,
    env: impl Fn(&str) -> Option<String>,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !config.telegram.has_token() {
        result.error("telegram.token", "bot token is required");
    }
    if config.completion.resolve_api_key_with(env).is_none() {
        result.error(
            "completion.api_key",
            format!("API key is required (set it here or in {API_KEY_ENV})"),
        );
    }
    if config.completion.assistant_id.trim().is_empty() {
        result.error("completion.assistant_id", "assistant id is required");
    }
    if config.completion.thread_id.trim().is_empty() {
        result.error("completion.thread_id", "thread id is required");
    }
    if config.turn.max_cycles == 0 {
        result.error("turn.max_cycles", "must be at least 1");
    }
    if config.turn.max_actions == Some(0) {
        result.warning(
            "turn.max_actions",
            "0 rejects every action request; unset it to allow actions",
        );
    }
    if config.telegram.whitelist.is_empty()
        && config
            .telegram
            .service_channel
            .as_deref()
            .is_none_or(|c| c.trim().is_empty())
    {
        result.warning(
            "telegram.whitelist",
            "no whitelisted senders and no service channel: commands will never be accepted",
        );
    }

    result
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use secrecy::{ExposeSecret, Secret};

    use super::*;

    fn complete_config() -> TeleagentConfig {
        let mut cfg = TeleagentConfig::default();
        cfg.telegram.token = Secret::new("1:abc".into());
        cfg.telegram.whitelist = vec!["alice".into()];
        cfg.completion.api_key = Secret::new("sk-test".into());
        cfg.completion.assistant_id = "asst_1".into();
        cfg.completion.thread_id = "thread_1".into();
        cfg
    }

    #[test]
    fn complete_config_is_clean() {
        let result = validate(&complete_config());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn default_config_has_errors() {
        let result = validate(&TeleagentConfig::default());
        assert!(result.has_errors());
        let paths: Vec<_> = result.diagnostics.iter().map(|d| d.path).collect();
        assert!(paths.contains(&"telegram.token"));
        assert!(paths.contains(&"completion.thread_id"));
    }

    #[test]
    fn no_command_source_is_only_a_warning() {
        let mut cfg = complete_config();
        cfg.telegram.whitelist.clear();
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].severity, Severity::Warning);

        cfg.telegram.service_channel = Some("ops".into());
        assert!(validate(&cfg).diagnostics.is_empty());
    }

    fn env_key(name: &str) -> Option<String> {
        (name == API_KEY_ENV).then(|| "sk-from-env".to_string())
    }

    #[test]
    fn api_key_from_environment_is_accepted() {
        let mut cfg = complete_config();
        cfg.completion.api_key = Secret::new(String::new());

        let result = validate_with_env(&cfg, env_key);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);

        let key = cfg.completion.resolve_api_key_with(env_key).unwrap();
        assert_eq!(key.expose_secret(), "sk-from-env");
    }

    #[test]
    fn missing_api_key_everywhere_is_an_error() {
        let mut cfg = complete_config();
        cfg.completion.api_key = Secret::new(String::new());

        let result = validate_with_env(&cfg, |_| Some("  ".into()));
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].path, "completion.api_key");
    }

    #[test]
    fn configured_key_wins_over_environment() {
        let cfg = complete_config();
        let key = cfg.completion.resolve_api_key_with(env_key).unwrap();
        assert_eq!(key.expose_secret(), "sk-test");
    }
}
