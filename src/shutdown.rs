//! ==============================================================================
//! shutdown.rs - one-way shutdown token
//! ==============================================================================
//!
//! purpose:
//!     the single rendezvous for every shutdown trigger. the OFF command, the
//!     button and the os signal handler all call request(); the first call
//!     flips the flag and wakes every waiter, later calls are no-ops.
//!
//! design:
//!     - AtomicBool: cheap is_requested() checks from any task
//!     - broadcast channel: lets tasks await shutdown inside tokio::select!
//!     - wait() subscribes BEFORE checking the flag, so a request racing with
//!       a new waiter is never missed
//!
//! relationships:
//!     - owned by: control.rs (ControlState hands out the shared handle)
//!     - signalled by: commands.rs, button.rs, signals.rs
//!     - awaited by: sampler.rs, commands.rs, button.rs
//!
//! ==============================================================================

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tokio::sync::broadcast;

/// which activity asked for shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Command,
    Button,
    Signal,
}

impl Trigger {
    fn code(self) -> u8 {
        match self {
            Trigger::Command => 1,
            Trigger::Button => 2,
            Trigger::Signal => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Trigger::Command),
            2 => Some(Trigger::Button),
            3 => Some(Trigger::Signal),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ShutdownCoordinator {
    requested: AtomicBool,
    trigger: AtomicU8,
    tx: broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            requested: AtomicBool::new(false),
            trigger: AtomicU8::new(0),
            tx,
        }
    }

    /// request shutdown
    ///
    /// returns true only for the call that performed the transition.
    pub fn request(&self, trigger: Trigger) -> bool {
        if self
            .requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(?trigger, "shutdown already requested, ignoring");
            return false;
        }

        self.trigger.store(trigger.code(), Ordering::Release);
        tracing::info!(?trigger, "shutdown requested");
        // no receivers is fine: late waiters see the flag
        let _ = self.tx.send(());
        true
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// the trigger that won the race, if any
    pub fn trigger(&self) -> Option<Trigger> {
        Trigger::from_code(self.trigger.load(Ordering::Acquire))
    }

    /// resolve once shutdown has been requested
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        if self.is_requested() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
