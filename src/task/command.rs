// src/task/command.rs

//! Shell command task.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{debug, info, warn};

use super::{Task, TaskContext};

/// How often a running child is checked for exit or cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs `payload.cmd` through the platform shell (`sh -c` / `cmd /C`).
///
/// Optional `payload.cwd` sets the working directory. A non-zero exit status
/// fails the attempt; on cancellation the child is killed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTask;

impl Task for CommandTask {
    fn execute(&self, ctx: &TaskContext<'_>) -> anyhow::Result<()> {
        let Some(cmd) = ctx.payload_str("cmd") else {
            bail!("job '{}': command task needs a string `cmd` in its payload", ctx.job_id);
        };

        // Build a shell command appropriate for the platform.
        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(cmd);
            c
        };
        if let Some(cwd) = ctx.payload_str("cwd") {
            command.current_dir(cwd);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("TICKDAG_JOB", ctx.job_id)
            .env("TICKDAG_CYCLE", ctx.cycle.as_str())
            .env("TICKDAG_ATTEMPT", ctx.attempt.to_string());

        info!(job = %ctx.job_id, attempt = ctx.attempt, %cmd, "starting command");
        let mut child = command
            .spawn()
            .with_context(|| format!("spawning process for job '{}'", ctx.job_id))?;

        // Always consume output so pipe buffers don't fill; log at debug.
        let readers = [
            child.stdout.take().map(|s| forward_lines(ctx.job_id, "stdout", s)),
            child.stderr.take().map(|s| forward_lines(ctx.job_id, "stderr", s)),
        ];

        let status = wait_or_cancel(&mut child, ctx)?;
        for handle in readers.into_iter().flatten() {
            let _ = handle.join();
        }

        match status {
            Some(status) if status.success() => {
                info!(job = %ctx.job_id, "command exited successfully");
                Ok(())
            }
            Some(status) => bail!("command `{cmd}` exited with {status}"),
            None => bail!("command `{cmd}` killed on cancellation"),
        }
    }
}

/// Wait for the child, killing it if the attempt is cancelled first.
/// Returns `None` when the child was killed.
fn wait_or_cancel(
    child: &mut Child,
    ctx: &TaskContext<'_>,
) -> anyhow::Result<Option<std::process::ExitStatus>> {
    loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("waiting for process of job '{}'", ctx.job_id))?
        {
            return Ok(Some(status));
        }
        if ctx.is_cancelled() {
            info!(job = %ctx.job_id, "cancellation requested; killing process");
            if let Err(e) = child.kill() {
                warn!(job = %ctx.job_id, error = %e, "failed to kill child process on cancellation");
            }
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn forward_lines(
    job: &str,
    stream: &'static str,
    pipe: impl Read + Send + 'static,
) -> thread::JoinHandle<()> {
    let job = job.to_string();
    thread::spawn(move || {
        for line in BufReader::new(pipe).lines().map_while(Result::ok) {
            debug!(job = %job, stream, "{}", line);
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::task::CancelSignal;
    use crate::types::{CycleKey, Payload};

    fn run(payload: Payload) -> anyhow::Result<()> {
        let cycle = CycleKey::new("2026-10-19");
        let cancel = CancelSignal::new();
        let ctx = TaskContext::new("cmd_job", &payload, 1, Utc::now(), &cycle, &cancel);
        CommandTask.execute(&ctx)
    }

    fn payload(cmd: &str) -> Payload {
        let mut p = Payload::new();
        p.insert("cmd".into(), toml::Value::String(cmd.into()));
        p
    }

    #[test]
    fn zero_exit_succeeds() {
        assert!(run(payload("echo ok")).is_ok());
    }

    #[test]
    fn non_zero_exit_fails() {
        let err = run(payload("exit 3")).unwrap_err();
        assert!(err.to_string().contains("exited with"), "{err}");
    }

    #[test]
    fn missing_cmd_fails() {
        assert!(run(Payload::new()).is_err());
    }

    #[test]
    fn cancelled_command_is_killed() {
        let p = payload("sleep 5");
        let cycle = CycleKey::new("2026-10-19");
        let cancel = CancelSignal::new();
        cancel.cancel();
        let ctx = TaskContext::new("cmd_job", &p, 1, Utc::now(), &cycle, &cancel);

        let err = CommandTask.execute(&ctx).unwrap_err();
        assert!(err.to_string().contains("cancellation"), "{err}");
    }
}
