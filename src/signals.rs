//! ==============================================================================
//! signals.rs - os interrupt to shutdown request translation
//! ==============================================================================
//!
//! purpose:
//!     SIGINT (ctrl-c) and, on unix, SIGTERM are turned into an ordinary
//!     request_shutdown(Trigger::Signal) call. no shutdown path bypasses the
//!     coordinator.
//!
//! relationships:
//!     - signals: control.rs (ControlState::request_shutdown)
//!     - spawned by: daemon.rs, aborted once the activities have joined
//!
//! ==============================================================================

use crate::control::ControlState;
use crate::shutdown::Trigger;
use anyhow::{Context, Result};
use std::sync::Arc;

/// wait for an interrupt and forward it; returns after the first one
pub async fn forward_interrupts(state: Arc<ControlState>) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("failed to listen for SIGINT")?,
            _ = term.recv() => {}
            _ = state.shutdown().wait() => return Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("failed to listen for ctrl-c")?,
            _ = state.shutdown().wait() => return Ok(()),
        }
    }

    tracing::info!("interrupt received");
    state.request_shutdown(Trigger::Signal);
    Ok(())
}
