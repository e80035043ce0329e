//! Telegram chat transport.
//!
//! A long-polling loop turns Bot API updates into [`ChatEvent`]s on an
//! `mpsc` channel, and [`TelegramOutbound`] implements [`ChatTransport`] for
//! the action handlers and the router's replies.
//!
//! [`ChatEvent`]: teleagent_channels::ChatEvent
//! [`ChatTransport`]: teleagent_channels::ChatTransport

pub mod bot;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod state;
pub mod text;

pub use {
    bot::{TelegramBot, connect},
    error::{Error, Result},
    outbound::TelegramOutbound,
    state::SeenChats,
};
