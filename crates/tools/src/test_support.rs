#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    teleagent_channels::{
        ChatTransport, Dialog, Error, HistoryMessage, Result, WatchlistSnapshot,
    },
    teleagent_store::SqliteStore,
};

use crate::ActionContext;

/// Handles starting with this prefix do not exist on the mock network.
pub const MISSING_PREFIX: &str = "ghost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub chat: String,
    pub text: String,
    pub delay: Option<Duration>,
}

#[derive(Default)]
pub struct MockTransport {
    pub sent: Mutex<Vec<Sent>>,
    pub joined: Mutex<Vec<String>>,
    pub left: Mutex<Vec<String>>,
    pub dialogs: Mutex<Vec<String>>,
    pub history: Mutex<Vec<HistoryMessage>>,
    /// Behave like a transport that cannot read chat history.
    pub history_unavailable: AtomicBool,
}

fn check(handle: &str) -> Result<()> {
    if handle.starts_with(MISSING_PREFIX) {
        return Err(Error::unknown_chat(handle));
    }
    Ok(())
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(&self, chat: &str, text: &str, delay: Option<Duration>) -> Result<()> {
        check(chat)?;
        self.sent.lock().unwrap().push(Sent {
            chat: chat.into(),
            text: text.into(),
            delay,
        });
        Ok(())
    }

    async fn join_channel(&self, handle: &str) -> Result<()> {
        check(handle)?;
        self.joined.lock().unwrap().push(handle.into());
        self.dialogs.lock().unwrap().push(handle.into());
        Ok(())
    }

    async fn leave_channel(&self, handle: &str) -> Result<()> {
        check(handle)?;
        self.left.lock().unwrap().push(handle.into());
        self.dialogs.lock().unwrap().retain(|d| d != handle);
        Ok(())
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>> {
        Ok(self
            .dialogs
            .lock()
            .unwrap()
            .iter()
            .map(|handle| Dialog {
                handle: handle.clone(),
            })
            .collect())
    }

    async fn fetch_messages(&self, handle: &str, limit: u32) -> Result<Vec<HistoryMessage>> {
        if self.history_unavailable.load(Ordering::SeqCst) {
            return Err(Error::unavailable("history is not readable"));
        }
        check(handle)?;
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Context over a mock transport and a fresh in-memory SQLite store.
pub async fn context() -> (ActionContext, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::default());
    let store = Arc::new(SqliteStore::connect("sqlite::memory:", 1).await.unwrap());
    let ctx = ActionContext::new(transport.clone(), store, WatchlistSnapshot::default());
    (ctx, transport)
}
