pub mod openai_assistants;

pub use openai_assistants::OpenAiAssistants;

use std::sync::Arc;

use teleagent_config::{API_KEY_ENV, CompletionConfig};

use crate::completion::CompletionGateway;

/// Build the completion gateway described by `config`.
pub fn gateway_from_config(config: &CompletionConfig) -> anyhow::Result<Arc<dyn CompletionGateway>> {
    let api_key = config
        .resolve_api_key()
        .ok_or_else(|| anyhow::anyhow!("completion.api_key is not set and {API_KEY_ENV} is empty"))?;
    let gateway = OpenAiAssistants::new(
        api_key,
        config.base_url.clone(),
        config.assistant_id.clone(),
        config.request_timeout(),
    )?;
    Ok(Arc::new(gateway))
}
