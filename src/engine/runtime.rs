// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::JobInstance;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::report::Reporter;

use super::core::DispatchCore;
use super::{CoreCommand, RuntimeEvent};

/// Drives the dispatcher core in response to `RuntimeEvent`s,
/// and delegates actual task execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `DispatchCore`, which contains all the
/// dispatch semantics. This struct handles async IO: reading events from
/// the channel, handing instances to the executor and delivering reports.
pub struct Runtime<E: ExecutorBackend> {
    core: DispatchCore,
    event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    executor: E,
    reporter: Arc<dyn Reporter>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: DispatchCore,
        event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
        executor: E,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            reporter,
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core.
    /// - Executes commands returned by the core (dispatch, report, cancel).
    ///
    /// Returns the core so callers can inspect the final state.
    pub async fn run(mut self) -> Result<DispatchCore> {
        info!("tickdag runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            match &event {
                RuntimeEvent::Tick { due, .. } if due.is_empty() => {}
                _ => debug!(?event, "runtime received event"),
            }

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.core)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::Dispatch(instance) => self.dispatch(instance).await?,
            CoreCommand::Report(report) => self.reporter.report(&report),
            CoreCommand::CancelRunning => self.executor.cancel_running(),
        }
        Ok(())
    }

    async fn dispatch(&mut self, instance: JobInstance) -> Result<()> {
        debug!(job = %instance.job_id(), seq = instance.seq, "handing instance to executor");
        self.executor.dispatch(instance).await
    }
}
