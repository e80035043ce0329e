use std::time::Duration;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    teleagent_common::types::ChatKind,
};

use crate::Result;

/// An inbound message delivered by a chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub sender_id: String,
    /// Sender username without the leading `@`, when the account has one.
    pub sender_handle: Option<String>,
    /// Public handle of the chat, when it has one. Private chats and
    /// private groups usually don't.
    pub chat_handle: Option<String>,
    /// Transport-native chat identifier, always usable as a reply target.
    pub chat_id: String,
    pub kind: ChatKind,
    pub text: String,
}

impl ChatEvent {
    pub fn is_private(&self) -> bool {
        self.kind.is_private()
    }
}

/// A conversation visible to the agent account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dialog {
    pub handle: String,
}

/// A message fetched from a chat's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    pub id: i64,
    pub sender_handle: Option<String>,
    pub text: String,
    /// Unix seconds.
    pub timestamp: i64,
}

/// Outbound half of a chat network.
///
/// `chat` arguments accept either a public handle or a transport-native
/// chat id, as found in [`ChatEvent::chat_id`].
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text message, optionally deferred by `delay`.
    async fn send(&self, chat: &str, text: &str, delay: Option<Duration>) -> Result<()>;
    async fn join_channel(&self, handle: &str) -> Result<()>;
    async fn leave_channel(&self, handle: &str) -> Result<()>;
    async fn list_dialogs(&self) -> Result<Vec<Dialog>>;
    /// Up to `limit` most recent messages, newest first.
    async fn fetch_messages(&self, handle: &str, limit: u32) -> Result<Vec<HistoryMessage>>;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_message_uses_camel_case() {
        let msg = HistoryMessage {
            id: 7,
            sender_handle: Some("alice".into()),
            text: "hi".into(),
            timestamp: 1_700_000_000,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["senderHandle"], "alice");
        assert_eq!(value["timestamp"], 1_700_000_000);
    }

    #[test]
    fn private_follows_kind() {
        let event = ChatEvent {
            sender_id: "1".into(),
            sender_handle: None,
            chat_handle: None,
            chat_id: "1".into(),
            kind: ChatKind::Dm,
            text: "hello".into(),
        };
        assert!(event.is_private());
    }
}
