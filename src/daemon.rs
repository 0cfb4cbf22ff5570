//! ==============================================================================
//! daemon.rs - activity wiring and shutdown ordering
//! ==============================================================================
//!
//! purpose:
//!     starts the three activities against one shared ControlState and tears
//!     them down in a fixed order:
//!
//!     ┌────────────────┐  ┌──────────────────┐  ┌────────────────┐
//!     │ sampling loop  │  │ command listener │  │ button monitor │
//!     │ (this task)    │  │ (spawned)        │  │ (spawned)      │
//!     └───────┬────────┘  └────────┬─────────┘  └───────┬────────┘
//!             └─────────── try_join! ───────────────────┘
//!                                 │ all three stopped
//!                                 v
//!                      SHUTDOWN record (console + log)
//!                                 v
//!                      close log, release sensor + button
//!
//!     the first fatal error from any activity ends the join immediately and
//!     is returned to main, which exits with status 1. no record is written
//!     after the SHUTDOWN line because nothing that writes is still running.
//!
//! relationships:
//!     - uses: sampler.rs, commands.rs, button.rs, sink.rs, control.rs
//!     - called by: main.rs
//!
//! ==============================================================================

use crate::button::ButtonMonitor;
use crate::commands::CommandListener;
use crate::control::ControlState;
use crate::domain::Record;
use crate::hal::{ButtonPort, Clock, SensorPort};
use crate::sampler::SamplingLoop;
use crate::sink::{LogSink, Reporter};
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufRead;
use tokio::task::JoinHandle;

/// everything one monitor run needs, already opened and validated
pub struct Monitor<S, B, R> {
    pub state: Arc<ControlState>,
    pub sensor: S,
    pub button: B,
    pub input: R,
    pub clock: Arc<dyn Clock>,
    pub console: Box<dyn Write + Send>,
    pub log: Option<Arc<LogSink>>,
    pub button_poll: Duration,
}

impl<S, B, R> Monitor<S, B, R>
where
    S: SensorPort + 'static,
    B: ButtonPort + 'static,
    R: AsyncBufRead + Unpin + Send + 'static,
{
    /// run until shutdown; Ok only after the SHUTDOWN record is written and
    /// every resource has been released
    pub async fn run(self) -> Result<()> {
        let Monitor { state, sensor, button, input, clock, console, log, button_poll } = self;

        let listener = tokio::spawn(CommandListener::new(input, state.clone(), log.clone()).run());
        let watcher = tokio::spawn(ButtonMonitor::new(button, state.clone(), button_poll).run());
        let aborts = [listener.abort_handle(), watcher.abort_handle()];

        let sampler = SamplingLoop::new(sensor, state.clone(), clock.clone(), Reporter::new(console, log.clone()));

        let joined = tokio::try_join!(
            sampler.run(),
            join_activity("command listener", listener),
            join_activity("button monitor", watcher),
        );
        let ((sensor, mut reporter), (), button) = match joined {
            Ok(parts) => parts,
            Err(e) => {
                for handle in &aborts {
                    handle.abort();
                }
                return Err(e);
            }
        };

        tracing::info!(trigger = ?state.shutdown().trigger(), "all activities stopped");
        reporter.emit(&Record::Shutdown(clock.now())).await?;
        drop(reporter);

        if let Some(log) = log {
            log.close().await?;
        }
        drop(sensor);
        drop(button);
        Ok(())
    }
}

async fn join_activity<T>(name: &'static str, handle: JoinHandle<Result<T>>) -> Result<T> {
    handle.await.with_context(|| format!("{} task failed", name))?
}
