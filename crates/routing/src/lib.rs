//! Decide what happens to every inbound chat event.
//!
//! Rules, first match wins:
//! 1. Private message from a whitelisted sender: run a turn, reply to the sender.
//! 2. Message in the service channel: run a turn, reply in the channel.
//! 3. Message in a watched channel: log it, no reply.
//! 4. Anything else is dropped.

pub mod access;
pub mod router;

pub use {
    access::{AccessPolicy, DropReason, Route, classify},
    router::EventRouter,
    teleagent_channels::WatchlistSnapshot,
};
