//! Bot API message to [`ChatEvent`] conversion.

use {
    teleagent_channels::ChatEvent,
    teleagent_common::types::ChatKind,
    teloxide::types::{Chat, Message},
};

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Dm
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

/// Convert a message or channel post carrying text (or a caption).
///
/// Returns `None` for service messages and media without a caption.
pub fn event_from_message(msg: &Message) -> Option<ChatEvent> {
    let text = msg.text().or_else(|| msg.caption())?;

    // Channel posts have no `from`; the post is authored by the chat itself.
    let (sender_id, sender_handle) = match (&msg.from, &msg.sender_chat) {
        (Some(user), _) => (user.id.0.to_string(), user.username.clone()),
        (None, Some(sender_chat)) => (
            sender_chat.id.0.to_string(),
            sender_chat.username().map(str::to_string),
        ),
        (None, None) => (
            msg.chat.id.0.to_string(),
            msg.chat.username().map(str::to_string),
        ),
    };

    Some(ChatEvent {
        sender_id,
        sender_handle,
        chat_handle: msg.chat.username().map(str::to_string),
        chat_id: msg.chat.id.0.to_string(),
        kind: chat_kind(&msg.chat),
        text: text.to_string(),
    })
}
