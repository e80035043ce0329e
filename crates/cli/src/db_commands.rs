use {clap::Subcommand, teleagent_config::TeleagentConfig, teleagent_store::SqliteStore};

#[derive(Subcommand)]
pub enum DbAction {
    /// Run all pending database migrations.
    Migrate,
}

pub async fn handle_db(config: &TeleagentConfig, action: DbAction) -> anyhow::Result<()> {
    match action {
        DbAction::Migrate => run_migrations(config).await,
    }
}

async fn run_migrations(config: &TeleagentConfig) -> anyhow::Result<()> {
    println!("Running migrations for {}...", config.database.url);
    // Connecting applies every pending migration.
    let store = SqliteStore::connect(&config.database.url, config.database.max_connections).await?;
    store.pool().close().await;
    println!("All migrations complete.");
    Ok(())
}
