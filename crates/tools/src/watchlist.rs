//! Watchlist maintenance. Every mutation refreshes the shared snapshot so the
//! router sees the change on the next event.

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    serde_json::Value,
    teleagent_agents::{ActionArgs, ActionHandler, ParamKind, ParamSpec},
    tracing::info,
};

use crate::context::{ActionContext, ENTITY, channel_arg};

const ENTITY_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    ENTITY,
    ParamKind::String,
    "Channel: @handle, t.me link or bare handle",
)];

async fn refresh(ctx: &ActionContext) -> Result<()> {
    ctx.watchlist
        .refresh(ctx.store.as_ref())
        .await
        .context("watchlist changed but the snapshot could not be refreshed")
}

pub struct ListWatchlist {
    ctx: ActionContext,
}

impl ListWatchlist {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ActionHandler for ListWatchlist {
    fn name(&self) -> &str {
        "list-watchlist"
    }

    fn description(&self) -> &str {
        "List the channels whose messages are being logged."
    }

    async fn execute(&self, _args: &ActionArgs) -> Result<Value> {
        let handles = self.ctx.store.list_watchlist().await?;
        Ok(serde_json::to_value(handles)?)
    }
}

pub struct AddToWatchlist {
    ctx: ActionContext,
}

impl AddToWatchlist {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ActionHandler for AddToWatchlist {
    fn name(&self) -> &str {
        "add-to-watchlist"
    }

    fn description(&self) -> &str {
        "Start logging every message posted in a channel."
    }

    fn params(&self) -> &[ParamSpec] {
        ENTITY_PARAMS
    }

    async fn execute(&self, args: &ActionArgs) -> Result<Value> {
        let handle = channel_arg(args.get(ENTITY).unwrap_or_default())?;
        let added = self.ctx.store.add_to_watchlist(&handle).await?;
        refresh(&self.ctx).await?;
        info!(chat = %handle, added, "watchlist add");
        Ok(Value::Null)
    }
}

pub struct RemoveFromWatchlist {
    ctx: ActionContext,
}

impl RemoveFromWatchlist {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ActionHandler for RemoveFromWatchlist {
    fn name(&self) -> &str {
        "remove-from-watchlist"
    }

    fn description(&self) -> &str {
        "Stop logging messages from a channel."
    }

    fn params(&self) -> &[ParamSpec] {
        ENTITY_PARAMS
    }

    async fn execute(&self, args: &ActionArgs) -> Result<Value> {
        let handle = channel_arg(args.get(ENTITY).unwrap_or_default())?;
        let removed = self.ctx.store.remove_from_watchlist(&handle).await?;
        refresh(&self.ctx).await?;
        info!(chat = %handle, removed, "watchlist remove");
        Ok(Value::Null)
    }
}
