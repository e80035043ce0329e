use std::sync::Arc;

use teleagent_channels::{ChatTransport, Store, WatchlistSnapshot, normalize_handle};

/// Shared dependencies handed to every action handler.
#[derive(Clone)]
pub struct ActionContext {
    pub transport: Arc<dyn ChatTransport>,
    pub store: Arc<dyn Store>,
    /// Same snapshot the router reads; refreshed on watchlist changes.
    pub watchlist: WatchlistSnapshot,
}

impl ActionContext {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn Store>,
        watchlist: WatchlistSnapshot,
    ) -> Self {
        Self {
            transport,
            store,
            watchlist,
        }
    }
}

/// Normalized channel handle from a raw argument.
pub fn channel_arg(raw: &str) -> anyhow::Result<String> {
    let handle = normalize_handle(raw);
    if handle.is_empty() {
        anyhow::bail!("'{raw}' is not a channel handle");
    }
    Ok(handle)
}

/// Common parameter shared by every channel action.
pub(crate) const ENTITY: &str = "entity";
