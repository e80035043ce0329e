use {
    clap::Subcommand,
    teleagent_channels::Store,
    teleagent_config::TeleagentConfig,
    teleagent_store::SqliteStore,
    teleagent_tools::channel_arg,
};

#[derive(Subcommand)]
pub enum WatchlistAction {
    /// Show every watched channel.
    List,
    /// Start logging a channel's messages.
    Add {
        /// Channel handle, `@name` or t.me link.
        handle: String,
    },
    /// Stop logging a channel's messages.
    Remove {
        /// Channel handle, `@name` or t.me link.
        handle: String,
    },
}

pub async fn handle_watchlist(
    config: &TeleagentConfig,
    action: WatchlistAction,
) -> anyhow::Result<()> {
    let store = SqliteStore::connect(&config.database.url, config.database.max_connections).await?;
    apply(&store, action).await
}

async fn apply(store: &dyn Store, action: WatchlistAction) -> anyhow::Result<()> {
    match action {
        WatchlistAction::List => {
            let handles = store.list_watchlist().await?;
            if handles.is_empty() {
                println!("Watchlist is empty.");
            }
            for handle in handles {
                println!("  @{handle}");
            }
        },
        WatchlistAction::Add { handle } => {
            let handle = channel_arg(&handle)?;
            if store.add_to_watchlist(&handle).await? {
                println!("Watching @{handle}. Restart a running agent to pick it up.");
            } else {
                println!("@{handle} is already watched.");
            }
        },
        WatchlistAction::Remove { handle } => {
            let handle = channel_arg(&handle)?;
            if store.remove_from_watchlist(&handle).await? {
                println!("Stopped watching @{handle}. Restart a running agent to pick it up.");
            } else {
                println!("@{handle} was not watched.");
            }
        },
    }
    Ok(())
}
