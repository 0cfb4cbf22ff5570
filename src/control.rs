//! ==============================================================================
//! control.rs - shared run-time control state
//! ==============================================================================
//!
//! purpose:
//!     the one ControlState instance shared (via Arc) by the sampling loop,
//!     the command listener and the button monitor.
//!
//!     every field is an atomic, so reads from the sampling loop can never
//!     observe a torn write from the listener. setters refuse to mutate once
//!     shutdown has been requested and report that by returning false.
//!
//!     setters hold the shared side of `gate` across check + store and
//!     request_shutdown holds the exclusive side while raising the flag, so
//!     once request_shutdown returns no mutation can still land.
//!
//! relationships:
//!     - written by: commands.rs (reporting, period, scale)
//!     - read by: sampler.rs (snapshot() once per tick)
//!     - wraps: shutdown.rs (ShutdownCoordinator)
//!
//! ==============================================================================

use crate::domain::{Scale, Settings};
use crate::shutdown::{ShutdownCoordinator, Trigger};
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

const SCALE_CELSIUS: u8 = 0;
const SCALE_FAHRENHEIT: u8 = 1;

fn encode_scale(scale: Scale) -> u8 {
    match scale {
        Scale::Celsius => SCALE_CELSIUS,
        Scale::Fahrenheit => SCALE_FAHRENHEIT,
    }
}

fn decode_scale(raw: u8) -> Scale {
    if raw == SCALE_CELSIUS {
        Scale::Celsius
    } else {
        Scale::Fahrenheit
    }
}

#[derive(Debug)]
pub struct ControlState {
    reporting: AtomicBool,
    period_secs: AtomicU64,
    scale: AtomicU8,
    gate: RwLock<()>,
    shutdown: ShutdownCoordinator,
}

impl ControlState {
    /// reporting starts enabled
    pub fn new(period: NonZeroU64, scale: Scale) -> Self {
        Self {
            reporting: AtomicBool::new(true),
            period_secs: AtomicU64::new(period.get()),
            scale: AtomicU8::new(encode_scale(scale)),
            gate: RwLock::new(()),
            shutdown: ShutdownCoordinator::new(),
        }
    }

    pub fn reporting(&self) -> bool {
        self.reporting.load(Ordering::Acquire)
    }

    pub fn period_secs(&self) -> u64 {
        self.period_secs.load(Ordering::Acquire)
    }

    pub fn scale(&self) -> Scale {
        decode_scale(self.scale.load(Ordering::Acquire))
    }

    /// the settings the next tick will run with
    pub fn snapshot(&self) -> Settings {
        Settings {
            reporting: self.reporting(),
            period_secs: self.period_secs(),
            scale: self.scale(),
        }
    }

    /// shared gate, or None once shutdown is under way
    fn open_gate(&self) -> Option<RwLockReadGuard<'_, ()>> {
        let guard = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        (!self.shutdown.is_requested()).then_some(guard)
    }

    pub fn set_reporting(&self, on: bool) -> bool {
        let Some(_gate) = self.open_gate() else { return false };
        self.reporting.store(on, Ordering::Release);
        true
    }

    pub fn set_period(&self, period: NonZeroU64) -> bool {
        let Some(_gate) = self.open_gate() else { return false };
        self.period_secs.store(period.get(), Ordering::Release);
        true
    }

    pub fn set_scale(&self, scale: Scale) -> bool {
        let Some(_gate) = self.open_gate() else { return false };
        self.scale.store(encode_scale(scale), Ordering::Release);
        true
    }

    /// waits for in-flight setters, then raises the flag
    pub fn request_shutdown(&self, trigger: Trigger) -> bool {
        let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        self.shutdown.request(trigger)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_requested()
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    #[test]
    fn initial_snapshot() {
        let state = ControlState::new(secs(1), Scale::Fahrenheit);
        assert_eq!(
            state.snapshot(),
            Settings { reporting: true, period_secs: 1, scale: Scale::Fahrenheit }
        );
        assert!(!state.shutdown_requested());
    }

    #[test]
    fn setters_update_snapshot() {
        let state = ControlState::new(secs(1), Scale::Fahrenheit);
        assert!(state.set_reporting(false));
        assert!(state.set_period(secs(30)));
        assert!(state.set_scale(Scale::Celsius));
        assert_eq!(
            state.snapshot(),
            Settings { reporting: false, period_secs: 30, scale: Scale::Celsius }
        );
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let state = ControlState::new(secs(1), Scale::Fahrenheit);
        let taken = state.snapshot();
        state.set_period(secs(2));
        state.set_scale(Scale::Celsius);
        assert_eq!(taken.period_secs, 1);
        assert_eq!(taken.scale, Scale::Fahrenheit);
    }

    #[test]
    fn mutations_refused_after_shutdown() {
        let state = ControlState::new(secs(5), Scale::Celsius);
        assert!(state.request_shutdown(Trigger::Command));
        assert!(!state.set_reporting(false));
        assert!(!state.set_period(secs(9)));
        assert!(!state.set_scale(Scale::Fahrenheit));
        assert_eq!(
            state.snapshot(),
            Settings { reporting: true, period_secs: 5, scale: Scale::Celsius }
        );
    }

    #[test]
    fn no_mutation_lands_after_shutdown_returns() {
        use std::sync::Arc;

        for _ in 0..50 {
            let state = Arc::new(ControlState::new(secs(1), Scale::Fahrenheit));
            let writers: Vec<_> = (0..4u64)
                .map(|t| {
                    let state = state.clone();
                    std::thread::spawn(move || {
                        let mut n = 1;
                        while state.set_period(secs(t * 10_000 + n)) {
                            n += 1;
                        }
                    })
                })
                .collect();

            std::thread::yield_now();
            state.request_shutdown(Trigger::Signal);
            let frozen = state.snapshot();
            for w in writers {
                w.join().unwrap();
            }
            assert_eq!(state.snapshot(), frozen);
        }
    }

    #[test]
    fn shutdown_is_idempotent() {
        let state = ControlState::new(secs(1), Scale::Fahrenheit);
        assert!(state.request_shutdown(Trigger::Signal));
        assert!(!state.request_shutdown(Trigger::Button));
        assert!(!state.request_shutdown(Trigger::Command));
        assert!(state.shutdown_requested());
        assert_eq!(state.shutdown().trigger(), Some(Trigger::Signal));
    }
}
