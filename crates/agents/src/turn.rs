//! Drives one request/response exchange with the completion engine.
//!
//! A turn submits the input, then polls the run at a fixed cadence. When the
//! engine requests an action the controller dispatches it through the
//! [`ActionRegistry`], submits the result and keeps polling the run it gets
//! back. The turn ends with the latest assistant reply or a [`TurnError`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    rand::Rng,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    action::ActionRequest,
    action_registry::ActionRegistry,
    completion::{CompletionGateway, RunId, RunStatus},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Cadence and budgets for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnConfig {
    pub poll_interval: Duration,
    /// Upper bound of a random delay added to each interval.
    pub poll_jitter: Duration,
    /// Maximum number of status polls.
    pub max_cycles: usize,
    /// Maximum number of actions dispatched. `None` leaves only the cycle cap.
    pub max_actions: Option<usize>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            poll_jitter: Duration::ZERO,
            max_cycles: 25,
            max_actions: None,
        }
    }
}

impl From<&teleagent_config::TurnSettings> for TurnConfig {
    fn from(settings: &teleagent_config::TurnSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            poll_jitter: settings.poll_jitter(),
            max_cycles: settings.max_cycles.max(1),
            max_actions: settings.max_actions,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("completion engine error while trying to {stage}: {source}")]
    Gateway {
        stage: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("run ended with status {status}")]
    RunFailed { status: RunStatus },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("turn exceeded {cycles} poll cycles")]
    TurnBudgetExceeded { cycles: usize },

    #[error("turn interrupted by shutdown")]
    Interrupted,
}

impl TurnError {
    fn gateway(stage: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |e| Self::Gateway {
            stage,
            source: e.into(),
        }
    }

    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

/// A finished turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub text: String,
    /// Status polls issued.
    pub cycles: usize,
    /// Actions dispatched.
    pub actions: usize,
}

/// Sleeps between polls. Shutdown cuts the wait short.
pub struct PollTimer {
    interval: Duration,
    jitter: Duration,
    cancel: CancellationToken,
}

impl PollTimer {
    pub fn new(interval: Duration, jitter: Duration, cancel: CancellationToken) -> Self {
        Self {
            interval,
            jitter,
            cancel,
        }
    }

    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }
        let extra_ms = rand::rng().random_range(0..=self.jitter.as_millis() as u64);
        self.interval + Duration::from_millis(extra_ms)
    }

    pub async fn wait(&self) -> Result<(), TurnError> {
        let delay = self.next_delay();
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(TurnError::Interrupted),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

type ThreadLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// A claim on one thread's lock. The map entry is removed when the last
/// claim on it is dropped.
struct ThreadLease<'a> {
    locks: &'a ThreadLocks,
    thread_id: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> ThreadLease<'a> {
    fn acquire(locks: &'a ThreadLocks, thread_id: &'a str) -> Self {
        let lock = Arc::clone(
            locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .entry(thread_id.to_string())
                .or_default(),
        );
        Self {
            locks,
            thread_id,
            lock,
        }
    }

    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for ThreadLease<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Release under the map lock so concurrent leases agree on the count.
        drop(std::mem::take(&mut self.lock));
        if locks
            .get(self.thread_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(self.thread_id);
        }
    }
}

/// Per-turn bookkeeping.
struct Turn<'a> {
    thread_id: &'a str,
    run_id: RunId,
    status: RunStatus,
    cycles: usize,
    actions: usize,
}

pub struct TurnController {
    gateway: Arc<dyn CompletionGateway>,
    registry: Arc<ActionRegistry>,
    config: TurnConfig,
    cancel: CancellationToken,
    /// Turns on the same thread run one at a time.
    thread_locks: ThreadLocks,
}

impl TurnController {
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        registry: Arc<ActionRegistry>,
        config: TurnConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            registry,
            config,
            cancel,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    #[cfg(test)]
    fn tracked_threads(&self) -> usize {
        self.thread_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Run one turn on `thread_id` and return the engine's final reply.
    pub async fn run_turn(&self, thread_id: &str, input: &str) -> Result<TurnOutcome, TurnError> {
        let lease = ThreadLease::acquire(&self.thread_locks, thread_id);
        let _guard = lease.lock().await;

        if self.cancel.is_cancelled() {
            return Err(TurnError::Interrupted);
        }

        let run_id = self
            .gateway
            .submit_input(thread_id, input)
            .await
            .map_err(TurnError::gateway("submit input"))?;
        info!(thread_id, run_id = %run_id, "turn started");

        let mut turn = Turn {
            thread_id,
            run_id,
            status: RunStatus::Queued,
            cycles: 0,
            actions: 0,
        };
        let timer = PollTimer::new(
            self.config.poll_interval,
            self.config.poll_jitter,
            self.cancel.clone(),
        );

        loop {
            if turn.cycles >= self.config.max_cycles {
                warn!(
                    thread_id,
                    run_id = %turn.run_id,
                    cycles = turn.cycles,
                    "turn exceeded poll budget"
                );
                return Err(TurnError::TurnBudgetExceeded {
                    cycles: self.config.max_cycles,
                });
            }
            if turn.cycles > 0 {
                timer.wait().await?;
            }
            turn.cycles += 1;

            let snapshot = self
                .gateway
                .poll_status(thread_id, &turn.run_id)
                .await
                .map_err(TurnError::gateway("poll run status"))?;
            turn.status = snapshot.status;
            debug!(
                thread_id,
                run_id = %turn.run_id,
                cycle = turn.cycles,
                status = %turn.status,
                "polled run"
            );

            match turn.status {
                RunStatus::Queued | RunStatus::InProgress => {},
                RunStatus::RequiresAction => {
                    let action = single_action(snapshot.actions)?;
                    self.perform_action(&mut turn, action).await?;
                },
                RunStatus::Completed => return self.finish(turn).await,
                RunStatus::Failed | RunStatus::Expired | RunStatus::Cancelled => {
                    warn!(thread_id, run_id = %turn.run_id, status = %turn.status, "run failed");
                    return Err(TurnError::RunFailed {
                        status: turn.status,
                    });
                },
            }
        }
    }

    async fn perform_action(
        &self,
        turn: &mut Turn<'_>,
        action: ActionRequest,
    ) -> Result<(), TurnError> {
        if let Some(max) = self.config.max_actions
            && turn.actions >= max
        {
            return Err(TurnError::protocol(format!(
                "engine requested more than {max} action(s) in one turn"
            )));
        }

        info!(
            thread_id = turn.thread_id,
            run_id = %turn.run_id,
            action = %action.name,
            "engine requested action"
        );
        let result = self
            .registry
            .dispatch(&action.name, &action.arguments)
            .await;
        turn.actions += 1;
        if !result.is_success() {
            debug!(action = %action.name, error = ?result.error_message(), "action returned error");
        }

        turn.run_id = self
            .gateway
            .submit_action_result(
                turn.thread_id,
                &turn.run_id,
                &action.call_id,
                &result.to_output(),
            )
            .await
            .map_err(TurnError::gateway("submit action result"))?;
        turn.status = RunStatus::Queued;
        Ok(())
    }

    async fn finish(&self, turn: Turn<'_>) -> Result<TurnOutcome, TurnError> {
        let text = self
            .gateway
            .fetch_latest_reply(turn.thread_id)
            .await
            .map_err(TurnError::gateway("fetch reply"))?;
        if text.trim().is_empty() {
            return Err(TurnError::protocol("run completed without a reply"));
        }

        info!(
            thread_id = turn.thread_id,
            run_id = %turn.run_id,
            cycles = turn.cycles,
            actions = turn.actions,
            "turn completed"
        );
        Ok(TurnOutcome {
            text,
            cycles: turn.cycles,
            actions: turn.actions,
        })
    }
}

fn single_action(mut actions: Vec<ActionRequest>) -> Result<ActionRequest, TurnError> {
    match actions.len() {
        1 => Ok(actions.remove(0)),
        0 => Err(TurnError::protocol(
            "run requires action but no action was provided",
        )),
        n => Err(TurnError::protocol(format!(
            "run requested {n} actions at once, expected exactly one"
        ))),
    }
}
