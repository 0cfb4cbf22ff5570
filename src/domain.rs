//! ==============================================================================
//! domain.rs - shared value types
//! ==============================================================================
//!
//! purpose:
//!     plain data that flows between the activities: the temperature scale,
//!     a per-tick snapshot of the control settings, and the report/shutdown
//!     records written to the console and the log sink.
//!
//! relationships:
//!     - used by: control.rs (Scale, Settings), sampler.rs (Report, Record)
//!     - used by: config.rs (Scale is deserialized from monitor.toml)
//!
//! ==============================================================================

use chrono::NaiveTime;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// output unit for reported temperatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Scale {
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

impl Scale {
    pub fn symbol(self) -> char {
        match self {
            Scale::Celsius => 'C',
            Scale::Fahrenheit => 'F',
        }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Scale::Fahrenheit
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Scale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "C" | "c" => Ok(Scale::Celsius),
            "F" | "f" => Ok(Scale::Fahrenheit),
            other => Err(anyhow::anyhow!("invalid scale '{}' (expected C or F)", other)),
        }
    }
}

/// copy of the control settings taken at the start of a tick
///
/// the sampling loop works from this snapshot so a command that lands
/// mid-tick only affects the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub reporting: bool,
    pub period_secs: u64,
    pub scale: Scale,
}

/// a single temperature measurement, formatted then discarded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub timestamp: NaiveTime,
    pub temperature: f64,
}

/// one output line, identical on the console and in the log sink
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Record {
    Report(Report),
    Shutdown(NaiveTime),
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Report(r) => {
                writeln!(f, "{} {:.1}", r.timestamp.format("%H:%M:%S"), r.temperature)
            }
            Record::Shutdown(ts) => writeln!(f, "{} SHUTDOWN", ts.format("%H:%M:%S")),
        }
    }
}
