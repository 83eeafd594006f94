// src/task/log.rs

use tracing::info;

use super::{Task, TaskContext};

/// Logs the payload's `message` (or the job id). Useful as a placeholder
/// while wiring up a schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTask;

impl Task for LogTask {
    fn execute(&self, ctx: &TaskContext<'_>) -> anyhow::Result<()> {
        let message = ctx.payload_str("message").unwrap_or(ctx.job_id);
        info!(
            job = %ctx.job_id,
            attempt = ctx.attempt,
            fire_at = %ctx.fire_at,
            cycle = %ctx.cycle,
            "{message}"
        );
        Ok(())
    }
}
