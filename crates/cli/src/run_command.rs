//! The `run` command: wire every component together and serve until Ctrl-C.

use std::sync::Arc;

use {
    teleagent_agents::{TurnConfig, TurnController, providers::gateway_from_config},
    teleagent_channels::{ChatTransport, WatchlistSnapshot},
    teleagent_config::{Severity, TeleagentConfig, validate},
    teleagent_routing::{AccessPolicy, EventRouter},
    teleagent_store::SqliteStore,
    teleagent_tools::{ActionContext, default_registry},
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

/// Inbound events buffered between the poller and the router.
const EVENT_QUEUE: usize = 256;

/// Log every diagnostic and fail if any is an error.
pub(crate) fn check_config(config: &TeleagentConfig) -> anyhow::Result<()> {
    let report = validate(config);
    for diagnostic in &report.diagnostics {
        match diagnostic.severity {
            Severity::Error => error!(path = diagnostic.path, "{}", diagnostic.message),
            Severity::Warning => warn!(path = diagnostic.path, "{}", diagnostic.message),
        }
    }
    if report.has_errors() {
        anyhow::bail!("invalid configuration, see the errors above");
    }
    Ok(())
}

pub async fn run(config: TeleagentConfig) -> anyhow::Result<()> {
    check_config(&config)?;

    let store = Arc::new(
        SqliteStore::connect(&config.database.url, config.database.max_connections).await?,
    );
    let watchlist = WatchlistSnapshot::load(store.as_ref()).await?;
    info!(watched = watchlist.len(), "watchlist loaded");

    let bot = teleagent_telegram::connect(&config.telegram).await?;
    let outbound = bot.outbound();
    let transport: Arc<dyn ChatTransport> = outbound.clone();

    let ctx = ActionContext::new(Arc::clone(&transport), store.clone(), watchlist.clone());
    let registry = Arc::new(default_registry(&ctx));
    info!(actions = ?registry.names(), "action registry ready");

    let cancel = CancellationToken::new();
    let controller = Arc::new(TurnController::new(
        gateway_from_config(&config.completion)?,
        registry,
        TurnConfig::from(&config.turn),
        cancel.clone(),
    ));
    let router = Arc::new(EventRouter::new(
        controller,
        transport,
        store,
        watchlist,
        AccessPolicy::from_config(&config.telegram),
        config.completion.thread_id.clone(),
    ));

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
    let poller = bot.start_polling(events_tx, cancel.clone());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C, shutting down"),
        }
        shutdown.cancel();
    });

    info!(
        username = ?bot.username(),
        thread_id = %config.completion.thread_id,
        "teleagent running"
    );
    router.serve(events_rx, cancel.clone()).await;

    cancel.cancel();
    poller.await?;
    outbound.abort_scheduled();
    info!("teleagent stopped");
    Ok(())
}
