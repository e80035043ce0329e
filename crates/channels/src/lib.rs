//! Contracts between the agent core and the outside world.
//!
//! A chat transport (Telegram or anything else) implements [`ChatTransport`]
//! and feeds [`ChatEvent`]s to the router; the local record store implements
//! [`Store`]. Both are injected as trait objects so the core never depends on
//! a concrete network or database.

pub mod error;
pub mod gating;
pub mod handle;
pub mod message_log;
pub mod store;
pub mod transport;
pub mod watchlist;

pub use {
    error::{Error, Result},
    handle::normalize_handle,
    message_log::{LoggedMessage, MessageRecord},
    store::{MembershipRow, QueryRows, Store},
    transport::{ChatEvent, ChatTransport, Dialog, HistoryMessage},
    watchlist::WatchlistSnapshot,
};
