use {
    teleagent_agents::providers::gateway_from_config,
    teleagent_config::TeleagentConfig,
    tracing::{info, warn},
};

/// Cancel every queued, in-progress or action-waiting run on a thread.
///
/// A stuck run keeps the thread locked on the completion engine side, so this
/// is the out-of-band escape hatch when a turn was abandoned mid-flight.
pub async fn cancel_runs(config: &TeleagentConfig, thread: Option<String>) -> anyhow::Result<()> {
    let thread_id = thread.unwrap_or_else(|| config.completion.thread_id.clone());
    if thread_id.trim().is_empty() {
        anyhow::bail!("no thread given and completion.thread_id is not set");
    }

    let gateway = gateway_from_config(&config.completion)?;
    let runs = gateway.list_active_runs(&thread_id).await?;
    if runs.is_empty() {
        println!("No active runs on {thread_id}.");
        return Ok(());
    }

    let mut failed = 0usize;
    for run_id in &runs {
        match gateway.cancel_run(&thread_id, run_id).await {
            Ok(()) => {
                info!(thread_id = %thread_id, run_id = %run_id, "run cancelled");
                println!("Cancelled {run_id}");
            },
            Err(e) => {
                warn!(thread_id = %thread_id, run_id = %run_id, error = %e, "cancel failed");
                failed += 1;
            },
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} runs could not be cancelled", runs.len());
    }
    Ok(())
}
