use std::{
    collections::BTreeSet,
    sync::{Arc, RwLock},
};

use teleagent_channels::normalize_handle;

/// Public chats the bot has received traffic from.
///
/// The Bot API has no way to list the chats a bot belongs to, so the
/// inbound loop records every public handle it sees.
#[derive(Debug, Clone, Default)]
pub struct SeenChats {
    handles: Arc<RwLock<BTreeSet<String>>>,
}

impl SeenChats {
    pub fn record(&self, handle: &str) {
        let handle = normalize_handle(handle);
        if handle.is_empty() {
            return;
        }
        self.handles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle);
    }

    pub fn forget(&self, handle: &str) {
        self.handles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&normalize_handle(handle));
    }

    /// Sorted handles.
    pub fn handles(&self) -> Vec<String> {
        self.handles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_normalized_and_forgets() {
        let seen = SeenChats::default();
        seen.record("@Rust");
        seen.record("news");
        seen.record("rust");
        seen.record("@");
        assert_eq!(seen.handles(), vec!["news", "rust"]);

        seen.forget("t.me/rust");
        assert_eq!(seen.handles(), vec!["news"]);
    }
}
