//! Configuration loading, validation, and env substitution.
//!
//! Config files: `teleagent.toml`, `teleagent.yaml`, or `teleagent.json`
//! Searched in `./` then `~/.config/teleagent/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, load_config},
    schema::{
        API_KEY_ENV, CompletionConfig, DatabaseConfig, TeleagentConfig, TelegramConfig, TurnSettings,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_with_env},
};
