use {anyhow::Result, async_trait::async_trait, serde::Serialize};

use crate::action::ActionRequest;

/// Identifier of one run on the remote engine.
pub type RunId = String;

/// Remote run status, as the controller sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl RunStatus {
    /// Map an Assistants API status string. `cancelling` still counts as in
    /// progress and `incomplete` as a failure.
    pub fn from_api(status: &str) -> Option<Self> {
        Some(match status {
            "queued" => Self::Queued,
            "in_progress" | "cancelling" => Self::InProgress,
            "requires_action" => Self::RequiresAction,
            "completed" => Self::Completed,
            "failed" | "incomplete" => Self::Failed,
            "expired" => Self::Expired,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Expired | Self::Cancelled
        )
    }

    /// Still running or waiting on us; what `cancel-runs` targets.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub status: RunStatus,
    /// Non-empty only when `status` is [`RunStatus::RequiresAction`].
    pub actions: Vec<ActionRequest>,
}

impl RunSnapshot {
    pub fn status(status: RunStatus) -> Self {
        Self {
            status,
            actions: Vec::new(),
        }
    }
}

/// The remote engine that produces replies and requests actions.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Append user input to the thread and start a run.
    async fn submit_input(&self, thread_id: &str, text: &str) -> Result<RunId>;

    async fn poll_status(&self, thread_id: &str, run_id: &str) -> Result<RunSnapshot>;

    /// Hand an action's output back. Returns the run to keep polling, which
    /// may differ from `run_id`.
    async fn submit_action_result(
        &self,
        thread_id: &str,
        run_id: &str,
        call_id: &str,
        output: &str,
    ) -> Result<RunId>;

    /// Text of the newest assistant message on the thread, empty if none.
    async fn fetch_latest_reply(&self, thread_id: &str) -> Result<String>;

    /// Runs on the thread that are not yet terminal.
    async fn list_active_runs(&self, thread_id: &str) -> Result<Vec<RunId>>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()>;
}
