use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    serde_json::{Value, json},
    teleagent_channels::{
        ChatTransport, Dialog, Error as ChannelError, HistoryMessage, Result as ChannelResult,
        WatchlistSnapshot,
    },
    teleagent_store::SqliteStore,
    teleagent_tools::{ActionContext, default_registry},
};

/// Transport used only to build handlers for schema export.
struct Offline;

#[async_trait]
impl ChatTransport for Offline {
    async fn send(&self, _chat: &str, _text: &str, _delay: Option<Duration>) -> ChannelResult<()> {
        Err(offline())
    }

    async fn join_channel(&self, _handle: &str) -> ChannelResult<()> {
        Err(offline())
    }

    async fn leave_channel(&self, _handle: &str) -> ChannelResult<()> {
        Err(offline())
    }

    async fn list_dialogs(&self) -> ChannelResult<Vec<Dialog>> {
        Err(offline())
    }

    async fn fetch_messages(&self, _handle: &str, _limit: u32) -> ChannelResult<Vec<HistoryMessage>> {
        Err(offline())
    }
}

fn offline() -> ChannelError {
    ChannelError::unavailable("no chat transport is connected")
}

/// Function tools in the shape the assistant definition expects.
pub(crate) async fn function_tools() -> anyhow::Result<Vec<Value>> {
    let store = Arc::new(SqliteStore::connect("sqlite::memory:", 1).await?);
    let ctx = ActionContext::new(Arc::new(Offline), store, WatchlistSnapshot::default());
    Ok(default_registry(&ctx)
        .function_schemas()
        .into_iter()
        .map(|function| json!({ "type": "function", "function": function }))
        .collect())
}

pub async fn print_functions() -> anyhow::Result<()> {
    let tools = function_tools().await?;
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}
