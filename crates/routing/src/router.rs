use std::sync::Arc;

use {
    teleagent_agents::TurnController,
    teleagent_channels::{ChatEvent, ChatTransport, MessageRecord, Store, WatchlistSnapshot},
    teleagent_common::types::now_secs,
    tokio::{sync::mpsc, task::JoinSet},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::access::{AccessPolicy, Route, classify};

const FAILURE_NOTICE: &str = "Sorry, I could not complete that request";

/// Applies the routing rules to inbound events and performs the side
/// effects: turns and replies on the command path, message logging on the
/// passive path.
pub struct EventRouter {
    controller: Arc<TurnController>,
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn Store>,
    watchlist: WatchlistSnapshot,
    policy: AccessPolicy,
    /// Completion thread used for every command.
    thread_id: String,
}

impl EventRouter {
    pub fn new(
        controller: Arc<TurnController>,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn Store>,
        watchlist: WatchlistSnapshot,
        policy: AccessPolicy,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            transport,
            store,
            watchlist,
            policy,
            thread_id: thread_id.into(),
        }
    }

    /// Route one event and wait for its side effects. Returns the route taken.
    pub async fn handle_event(&self, event: ChatEvent) -> Route {
        let route = classify(&event, &self.policy, &self.watchlist);
        self.handle_routed(event, &route).await;
        route
    }

    async fn handle_routed(&self, event: ChatEvent, route: &Route) {
        match route {
            Route::Command { reply_to } => {
                info!(
                    chat = %event.chat_id,
                    sender = %event.sender_id,
                    thread_id = %self.thread_id,
                    "command received"
                );
                self.run_command(reply_to, &event.text).await;
            },
            Route::Passive { channel } => self.log_passive(channel, &event).await,
            Route::Drop(reason) => {
                debug!(chat = %event.chat_id, sender = %event.sender_id, %reason, "event dropped");
            },
        }
    }

    async fn run_command(&self, reply_to: &str, text: &str) {
        let reply = match self.controller.run_turn(&self.thread_id, text).await {
            Ok(outcome) => outcome.text,
            Err(e) => {
                warn!(chat = %reply_to, thread_id = %self.thread_id, error = %e, "turn failed");
                format!("{FAILURE_NOTICE}: {e}")
            },
        };

        if let Err(e) = self.transport.send(reply_to, &reply, None).await {
            warn!(chat = %reply_to, error = %e, "failed to send reply");
        }
    }

    async fn log_passive(&self, channel: &str, event: &ChatEvent) {
        let record = MessageRecord {
            sender_id: event.sender_id.clone(),
            sender_handle: event.sender_handle.clone(),
            channel_handle: channel.to_string(),
            text: event.text.clone(),
            sent_at: now_secs(),
        };
        match self.store.append_message(&record).await {
            Ok(()) => debug!(chat = %channel, "message logged"),
            Err(e) => warn!(chat = %channel, error = %e, "failed to log message"),
        }
    }

    /// Consume events until the channel closes or `cancel` fires.
    ///
    /// Commands share one completion thread, so they go through a single
    /// queue and run in arrival order. Passive and dropped events each run
    /// on their own task so a long turn never delays logging.
    pub async fn serve(self: Arc<Self>, mut events: mpsc::Receiver<ChatEvent>, cancel: CancellationToken) {
        let mut tasks = JoinSet::new();
        let (commands, mut queue) = mpsc::unbounded_channel::<(ChatEvent, Route)>();
        let worker = Arc::clone(&self);
        tasks.spawn(async move {
            while let Some((event, route)) = queue.recv().await {
                worker.handle_routed(event, &route).await;
            }
        });
        info!(watched = self.watchlist.len(), "event router started");

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let route = classify(&event, &self.policy, &self.watchlist);
            if matches!(route, Route::Command { .. }) {
                if commands.send((event, route)).is_err() {
                    warn!("command worker stopped, dropping command");
                }
                continue;
            }

            let router = Arc::clone(&self);
            tasks.spawn(async move {
                router.handle_routed(event, &route).await;
            });

            // Reap finished tasks so the set stays small.
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    warn!(error = %e, "event task failed");
                }
            }
        }

        // Closing the queue lets the worker finish what is already queued.
        drop(commands);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "event task failed");
            }
        }
        info!("event router stopped");
    }
}
