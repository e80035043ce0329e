use {async_trait::async_trait, serde::Serialize};

use crate::{LoggedMessage, MessageRecord, Result};

/// A channel the agent account has joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipRow {
    pub channel_handle: String,
    /// Unix seconds.
    pub joined_at: i64,
}

/// Rows returned by [`Store::execute`], each row a list of column values.
pub type QueryRows = Vec<Vec<serde_json::Value>>;

/// Persistent record store shared by the action handlers and the router.
///
/// Handles passed in are expected to be normalized already. Every method is
/// a single atomic statement, so concurrent callers never lose updates.
#[async_trait]
pub trait Store: Send + Sync {
    async fn record_membership(&self, channel_handle: &str, joined_at: i64) -> Result<()>;
    /// Returns `true` if a row was removed.
    async fn remove_membership(&self, channel_handle: &str) -> Result<bool>;
    async fn list_memberships(&self) -> Result<Vec<MembershipRow>>;

    async fn append_message(&self, record: &MessageRecord) -> Result<()>;
    /// Most recent first.
    async fn recent_messages(&self, channel_handle: &str, limit: u32)
    -> Result<Vec<LoggedMessage>>;

    async fn list_watchlist(&self) -> Result<Vec<String>>;
    /// Returns `true` if the handle was not already present.
    async fn add_to_watchlist(&self, channel_handle: &str) -> Result<bool>;
    /// Returns `true` if a row was removed.
    async fn remove_from_watchlist(&self, channel_handle: &str) -> Result<bool>;

    /// Raw statement escape hatch. Only reachable from the command path.
    async fn execute(&self, query: &str) -> Result<QueryRows>;
}
