use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    serde_json::Value,
    teleagent_agents::{ActionArgs, ActionHandler, ParamKind, ParamSpec},
    tracing::debug,
};

use crate::context::ActionContext;

/// Runs a raw statement against the local store.
pub struct QueryLocalStore {
    ctx: ActionContext,
}

impl QueryLocalStore {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

const PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "query",
    ParamKind::String,
    "SQL statement to run against the local SQLite database. Tables: \
     membership(channel_handle, joined_at), \
     messages(id, sender_id, sender_handle, channel_handle, text, sent_at), \
     watchlist(channel_handle).",
)];

#[async_trait]
impl ActionHandler for QueryLocalStore {
    fn name(&self) -> &str {
        "query-local-store"
    }

    fn description(&self) -> &str {
        "Run a SQL statement against the local database of joined channels, \
         logged channel messages and the watchlist. Returns the result rows."
    }

    fn params(&self) -> &[ParamSpec] {
        PARAMS
    }

    async fn execute(&self, args: &ActionArgs) -> Result<Value> {
        let query = args.get("query").unwrap_or_default();
        let rows = self.ctx.store.execute(query).await.context("query failed")?;
        debug!(rows = rows.len(), "local store query");
        Ok(serde_json::to_value(rows)?)
    }
}
