//! ==============================================================================
//! sampler.rs - the periodic sampling loop
//! ==============================================================================
//!
//! purpose:
//!     the primary activity. once per period, while reporting is enabled, it
//!     reads the sensor, converts the sample and emits a report line to the
//!     console and the log sink.
//!
//! tick:
//!
//!     snapshot settings ──> reporting? ──yes──> read ──> convert ──> emit
//!            ^                  │no                        │fault
//!            │                  v                          v
//!            └──── wait(period) OR shutdown ◄──────── warn, skip
//!
//!     the wait is raced against the shutdown token, so shutdown latency does
//!     not depend on the period. the shutdown record itself is written by
//!     daemon.rs once every activity has stopped.
//!
//! relationships:
//!     - reads: control.rs (snapshot per tick), hal.rs (SensorPort, Clock)
//!     - sensor reads run on the blocking pool (hal.rs BlockingDevice)
//!     - uses: thermistor.rs (conversion), sink.rs (Reporter)
//!     - driven by: daemon.rs
//!
//! ==============================================================================

use crate::control::ControlState;
use crate::domain::{Record, Report, Scale};
use crate::hal::{BlockingDevice, Clock, SensorPort};
use crate::sink::Reporter;
use crate::thermistor;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// what a single tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Reported(Report),
    Faulted(thermistor::SensorFault),
}

pub struct SamplingLoop<S> {
    sensor: BlockingDevice<S>,
    state: Arc<ControlState>,
    clock: Arc<dyn Clock>,
    reporter: Reporter,
    faults: u64,
}

impl<S: SensorPort + 'static> SamplingLoop<S> {
    pub fn new(sensor: S, state: Arc<ControlState>, clock: Arc<dyn Clock>, reporter: Reporter) -> Self {
        Self { sensor: BlockingDevice::new(sensor), state, clock, reporter, faults: 0 }
    }

    /// ticks whose sample could not be converted
    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// run ticks until shutdown is requested
    ///
    /// returns the sensor and the reporter so the caller can write the
    /// shutdown record and release the sensor in the right order.
    pub async fn run(mut self) -> Result<(S, Reporter)> {
        while !self.state.shutdown_requested() {
            let settings = self.state.snapshot();
            if settings.reporting {
                self.tick(settings.scale).await?;
            }

            let period = Duration::from_secs(settings.period_secs);
            tokio::select! {
                biased;
                _ = self.state.shutdown().wait() => break,
                _ = tokio::time::sleep(period) => {}
            }
        }

        if self.faults > 0 {
            tracing::warn!(faults = self.faults, "sensor faults during this run");
        }
        Ok((self.sensor.into_inner()?, self.reporter))
    }

    /// read, convert and emit one report
    pub async fn tick(&mut self, scale: Scale) -> Result<TickOutcome> {
        let timestamp = self.clock.now();
        let raw = self
            .sensor
            .call(|sensor| sensor.read_raw())
            .await
            .context("failed to read sensor")?;

        let temperature = match thermistor::convert(raw, scale) {
            Ok(t) => t,
            Err(fault) => {
                self.faults += 1;
                tracing::warn!(%fault, "sensor fault, skipping tick");
                return Ok(TickOutcome::Faulted(fault));
            }
        };

        let report = Report { timestamp, temperature };
        self.reporter.emit(&Record::Report(report)).await?;
        Ok(TickOutcome::Reported(report))
    }
}
