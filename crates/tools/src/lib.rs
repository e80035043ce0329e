//! Action handlers the completion engine can invoke.
//!
//! Every handler wraps one transport or store call and reports the outcome
//! as the `info` of an action result. Channel arguments are normalized with
//! [`teleagent_channels::normalize_handle`] before use.

pub mod channel_ops;
pub mod context;
pub mod messaging;
pub mod query_store;
pub mod watchlist;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{ActionContext, channel_arg};

use teleagent_agents::ActionRegistry;

/// Register the nine built-in actions.
pub fn register_default_actions(registry: &mut ActionRegistry, ctx: &ActionContext) {
    registry.register(Box::new(query_store::QueryLocalStore::new(ctx.clone())));
    registry.register(Box::new(channel_ops::MembershipCheck::new(ctx.clone())));
    registry.register(Box::new(channel_ops::JoinChannel::new(ctx.clone())));
    registry.register(Box::new(channel_ops::LeaveChannel::new(ctx.clone())));
    registry.register(Box::new(messaging::SendMessage::new(ctx.clone())));
    registry.register(Box::new(messaging::FetchHistory::new(ctx.clone())));
    registry.register(Box::new(watchlist::ListWatchlist::new(ctx.clone())));
    registry.register(Box::new(watchlist::AddToWatchlist::new(ctx.clone())));
    registry.register(Box::new(watchlist::RemoveFromWatchlist::new(ctx.clone())));
}

/// Registry holding only the built-in actions.
pub fn default_registry(ctx: &ActionContext) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    register_default_actions(&mut registry, ctx);
    registry
}
