use std::{
    collections::HashSet,
    sync::{Arc, RwLock},
};

use crate::{Result, Store, normalize_handle};

/// In-memory copy of the watchlist consulted on every inbound event.
///
/// Clones share the same set. The store stays the source of truth; call
/// [`Self::refresh`] after every watchlist mutation.
#[derive(Debug, Clone, Default)]
pub struct WatchlistSnapshot {
    handles: Arc<RwLock<HashSet<String>>>,
}

impl WatchlistSnapshot {
    pub async fn load(store: &dyn Store) -> Result<Self> {
        let snapshot = Self::default();
        snapshot.refresh(store).await?;
        Ok(snapshot)
    }

    pub fn from_handles<I, S>(handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let snapshot = Self::default();
        snapshot.replace(handles);
        snapshot
    }

    /// Reload the set from the store.
    pub async fn refresh(&self, store: &dyn Store) -> Result<()> {
        let handles = store.list_watchlist().await?;
        self.replace(handles);
        Ok(())
    }

    fn replace<I, S>(&self, handles: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let next: HashSet<String> = handles
            .into_iter()
            .map(|h| normalize_handle(h.as_ref()))
            .filter(|h| !h.is_empty())
            .collect();
        *self
            .handles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }

    /// Whether `handle` (in any accepted spelling) is watched.
    pub fn contains(&self, handle: &str) -> bool {
        let handle = normalize_handle(handle);
        self.handles
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.handles
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use {
        super::*,
        crate::{LoggedMessage, MembershipRow, MessageRecord, QueryRows},
    };

    #[derive(Default)]
    struct ListOnly(Mutex<Vec<String>>);

    #[async_trait]
    impl Store for ListOnly {
        async fn record_membership(&self, _: &str, _: i64) -> Result<()> {
            Ok(())
        }

        async fn remove_membership(&self, _: &str) -> Result<bool> {
            Ok(false)
        }

        async fn list_memberships(&self) -> Result<Vec<MembershipRow>> {
            Ok(Vec::new())
        }

        async fn append_message(&self, _: &MessageRecord) -> Result<()> {
            Ok(())
        }

        async fn recent_messages(&self, _: &str, _: u32) -> Result<Vec<LoggedMessage>> {
            Ok(Vec::new())
        }

        async fn list_watchlist(&self) -> Result<Vec<String>> {
            Ok(self.0.lock().unwrap().clone())
        }

        async fn add_to_watchlist(&self, _: &str) -> Result<bool> {
            Ok(true)
        }

        async fn remove_from_watchlist(&self, _: &str) -> Result<bool> {
            Ok(true)
        }

        async fn execute(&self, _: &str) -> Result<QueryRows> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn lookups_normalize_spelling() {
        let snapshot = WatchlistSnapshot::from_handles(["news"]);
        assert!(snapshot.contains("news"));
        assert!(snapshot.contains("@News"));
        assert!(snapshot.contains("https://t.me/news"));
        assert!(!snapshot.contains("other"));
    }

    #[tokio::test]
    async fn clones_see_refresh() {
        let store = ListOnly::default();
        let snapshot = WatchlistSnapshot::load(&store).await.unwrap();
        let router_view = snapshot.clone();
        assert!(router_view.is_empty());

        store.0.lock().unwrap().push("rust".into());
        snapshot.refresh(&store).await.unwrap();
        assert!(router_view.contains("@rust"));
        assert_eq!(router_view.len(), 1);

        store.0.lock().unwrap().clear();
        snapshot.refresh(&store).await.unwrap();
        assert!(!router_view.contains("rust"));
    }
}
