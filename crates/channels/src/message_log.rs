use serde::{Deserialize, Serialize};

use crate::transport::HistoryMessage;

/// A message observed in a watched channel.
///
/// Records are append-only; nothing in the agent ever edits or deletes one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender_id: String,
    #[serde(default)]
    pub sender_handle: Option<String>,
    /// Normalized handle of the channel the message was posted in.
    pub channel_handle: String,
    pub text: String,
    /// Unix seconds.
    pub sent_at: i64,
}

/// A [`MessageRecord`] as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedMessage {
    /// Store-assigned, increasing in insertion order.
    pub id: i64,
    #[serde(flatten)]
    pub record: MessageRecord,
}

impl From<LoggedMessage> for HistoryMessage {
    fn from(logged: LoggedMessage) -> Self {
        Self {
            id: logged.id,
            sender_handle: logged.record.sender_handle,
            text: logged.record.text,
            timestamp: logged.record.sent_at,
        }
    }
}
