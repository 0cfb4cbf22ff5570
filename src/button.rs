//! ==============================================================================
//! button.rs - shutdown button watcher
//! ==============================================================================
//!
//! purpose:
//!     polls the digital input at a fixed short cadence (10 ms by default).
//!     a non-zero level requests shutdown and ends the task. it also ends as
//!     soon as any other trigger requests shutdown.
//!
//! relationships:
//!     - reads: hal.rs (ButtonPort, owned exclusively by this task and read
//!       on the blocking pool)
//!     - signals: control.rs (request_shutdown with Trigger::Button)
//!     - spawned by: daemon.rs
//!
//! ==============================================================================

use crate::control::ControlState;
use crate::hal::{BlockingDevice, ButtonPort};
use crate::shutdown::Trigger;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// poll cadence when the config does not set one
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct ButtonMonitor<B> {
    button: BlockingDevice<B>,
    state: Arc<ControlState>,
    poll_interval: Duration,
}

impl<B: ButtonPort + 'static> ButtonMonitor<B> {
    pub fn new(button: B, state: Arc<ControlState>, poll_interval: Duration) -> Self {
        Self { button: BlockingDevice::new(button), state, poll_interval }
    }

    /// watch until pressed or until shutdown is requested elsewhere
    ///
    /// hands the button back so the daemon can release it after the join.
    pub async fn run(mut self) -> Result<B> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.state.shutdown().wait() => break,
                _ = ticker.tick() => {}
            }

            let level = self
                .button
                .call(|button| button.read_level())
                .await
                .context("failed to read button")?;
            if level != 0 {
                tracing::info!(level, "button pressed");
                self.state.request_shutdown(Trigger::Button);
                break;
            }
        }
        self.button.into_inner()
    }
}
