//! Channel membership actions.

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    serde_json::Value,
    teleagent_agents::{ActionArgs, ActionHandler, ParamKind, ParamSpec},
    teleagent_common::types::now_secs,
    tracing::{info, warn},
};

use crate::context::{ActionContext, ENTITY, channel_arg};

const ENTITY_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    ENTITY,
    ParamKind::String,
    "Channel or group: @handle, t.me link or bare handle",
)];

fn entity(args: &ActionArgs) -> Result<String> {
    channel_arg(args.get(ENTITY).unwrap_or_default())
}

/// Whether the agent account is a member of a channel.
pub struct MembershipCheck {
    ctx: ActionContext,
}

impl MembershipCheck {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ActionHandler for MembershipCheck {
    fn name(&self) -> &str {
        "membership-check"
    }

    fn description(&self) -> &str {
        "Check whether the bot is a member of a channel or group. Returns true or false."
    }

    fn params(&self) -> &[ParamSpec] {
        ENTITY_PARAMS
    }

    async fn execute(&self, args: &ActionArgs) -> Result<Value> {
        let handle = entity(args)?;

        let dialogs = self
            .ctx
            .transport
            .list_dialogs()
            .await
            .context("failed to list dialogs")?;
        if dialogs
            .iter()
            .any(|d| channel_arg(&d.handle).is_ok_and(|h| h == handle))
        {
            return Ok(Value::Bool(true));
        }

        let memberships = self.ctx.store.list_memberships().await?;
        Ok(Value::Bool(
            memberships.iter().any(|m| m.channel_handle == handle),
        ))
    }
}

/// Joins a channel and records the membership.
pub struct JoinChannel {
    ctx: ActionContext,
}

impl JoinChannel {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ActionHandler for JoinChannel {
    fn name(&self) -> &str {
        "join-channel"
    }

    fn description(&self) -> &str {
        "Join a public channel or group."
    }

    fn params(&self) -> &[ParamSpec] {
        ENTITY_PARAMS
    }

    async fn execute(&self, args: &ActionArgs) -> Result<Value> {
        let handle = entity(args)?;
        self.ctx
            .transport
            .join_channel(&handle)
            .await
            .with_context(|| format!("failed to join {handle}"))?;
        info!(chat = %handle, "joined channel");

        self.ctx
            .store
            .record_membership(&handle, now_secs())
            .await
            .with_context(|| format!("joined {handle} but failed to record membership"))?;
        Ok(Value::Null)
    }
}

/// Leaves a channel and drops the membership row.
pub struct LeaveChannel {
    ctx: ActionContext,
}

impl LeaveChannel {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ActionHandler for LeaveChannel {
    fn name(&self) -> &str {
        "leave-channel"
    }

    fn description(&self) -> &str {
        "Leave a channel or group."
    }

    fn params(&self) -> &[ParamSpec] {
        ENTITY_PARAMS
    }

    async fn execute(&self, args: &ActionArgs) -> Result<Value> {
        let handle = entity(args)?;
        self.ctx
            .transport
            .leave_channel(&handle)
            .await
            .with_context(|| format!("failed to leave {handle}"))?;
        info!(chat = %handle, "left channel");

        if !self.ctx.store.remove_membership(&handle).await? {
            warn!(chat = %handle, "left channel without a membership row");
        }
        Ok(Value::Null)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::test_support};

    fn args(entity: &str) -> ActionArgs {
        ActionArgs::new().with(ENTITY, entity)
    }

    #[tokio::test]
    async fn join_normalizes_and_records_membership() {
        let (ctx, transport) = test_support::context().await;
        let handler = JoinChannel::new(ctx.clone());

        let info = handler.execute(&args("https://t.me/News")).await.unwrap();
        assert_eq!(info, Value::Null);
        assert_eq!(*transport.joined.lock().unwrap(), vec!["news"]);

        let rows = ctx.store.list_memberships().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].channel_handle, "news");
        assert!(ctx.store.list_watchlist().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_join_records_nothing() {
        let (ctx, _) = test_support::context().await;
        let handler = JoinChannel::new(ctx.clone());

        let err = handler.execute(&args("@ghost_town")).await.unwrap_err();
        assert!(format!("{err:#}").contains("unknown chat: ghost_town"));
        assert!(ctx.store.list_memberships().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn leave_removes_membership() {
        let (ctx, transport) = test_support::context().await;
        JoinChannel::new(ctx.clone())
            .execute(&args("@rust"))
            .await
            .unwrap();
        LeaveChannel::new(ctx.clone())
            .execute(&args("rust"))
            .await
            .unwrap();

        assert_eq!(*transport.left.lock().unwrap(), vec!["rust"]);
        assert!(ctx.store.list_memberships().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn membership_check_consults_dialogs_and_store() {
        let (ctx, transport) = test_support::context().await;
        let handler = MembershipCheck::new(ctx.clone());

        assert_eq!(handler.execute(&args("@news")).await.unwrap(), Value::Bool(false));

        transport.dialogs.lock().unwrap().push("@News".into());
        assert_eq!(handler.execute(&args("news")).await.unwrap(), Value::Bool(true));

        ctx.store.record_membership("rust", 1).await.unwrap();
        assert_eq!(handler.execute(&args("t.me/rust")).await.unwrap(), Value::Bool(true));
    }

    #[tokio::test]
    async fn blank_handle_is_rejected() {
        let (ctx, transport) = test_support::context().await;
        let err = JoinChannel::new(ctx).execute(&args("@")).await.unwrap_err();
        assert!(err.to_string().contains("not a channel handle"));
        assert!(transport.joined.lock().unwrap().is_empty());
    }
}
