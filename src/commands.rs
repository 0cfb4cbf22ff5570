//! ==============================================================================
//! commands.rs - text command protocol and the command listener
//! ==============================================================================
//!
//! purpose:
//!     reads one command per line from the input stream (stdin in production),
//!     echoes the raw line into the log sink, parses it and applies it to the
//!     shared ControlState.
//!
//! protocol (case-sensitive prefix match, first match wins):
//!
//!     OFF            request shutdown, listener exits
//!     STOP           pause reporting
//!     START          resume reporting
//!     SCALE=F        report in fahrenheit
//!     SCALE=C        report in celsius
//!     PERIOD=<n>     sample every n seconds (n must be a positive integer)
//!     anything else  logged as invalid, no state change
//!
//!     lines are read as raw bytes, at most MAX_COMMAND_LEN per command. bytes
//!     that are not utf-8 make the line invalid, not the stream. a longer line
//!     is logged and rejected once, and the rest of it up to the newline is
//!     dropped.
//!
//! relationships:
//!     - mutates: control.rs (ControlState)
//!     - appends: sink.rs (LogSink)
//!     - spawned by: daemon.rs
//!
//! ==============================================================================

use crate::control::ControlState;
use crate::domain::Scale;
use crate::shutdown::Trigger;
use crate::sink::LogSink;
use anyhow::{Context, Result};
use std::num::NonZeroU64;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// longest command line accepted, newline included
pub const MAX_COMMAND_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Off,
    Stop,
    Start,
    SetScale(Scale),
    SetPeriod(NonZeroU64),
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        if line.starts_with("OFF") {
            Command::Off
        } else if line.starts_with("STOP") {
            Command::Stop
        } else if line.starts_with("START") {
            Command::Start
        } else if line.starts_with("SCALE=F") {
            Command::SetScale(Scale::Fahrenheit)
        } else if line.starts_with("SCALE=C") {
            Command::SetScale(Scale::Celsius)
        } else if let Some(arg) = line.strip_prefix("PERIOD=") {
            arg.trim()
                .parse::<u64>()
                .ok()
                .and_then(NonZeroU64::new)
                .map(Command::SetPeriod)
                .unwrap_or_else(|| Command::Invalid(line.to_string()))
        } else {
            Command::Invalid(line.to_string())
        }
    }
}

/// what applying a command did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Shutdown,
    /// malformed input, reported and dropped
    Invalid,
    /// shutdown was already under way, state left untouched
    Refused,
}

pub fn apply(state: &ControlState, command: &Command) -> Outcome {
    let accepted = match command {
        Command::Off => {
            state.request_shutdown(Trigger::Command);
            return Outcome::Shutdown;
        }
        Command::Stop => state.set_reporting(false),
        Command::Start => state.set_reporting(true),
        Command::SetScale(scale) => state.set_scale(*scale),
        Command::SetPeriod(period) => state.set_period(*period),
        Command::Invalid(raw) => {
            tracing::warn!(command = %raw, "bad command");
            return Outcome::Invalid;
        }
    };

    if accepted {
        tracing::debug!(?command, "command applied");
        Outcome::Applied
    } else {
        Outcome::Refused
    }
}

pub struct CommandListener<R> {
    input: R,
    state: Arc<ControlState>,
    log: Option<Arc<LogSink>>,
}

/// one bounded read from the command input
enum Chunk {
    Line(Vec<u8>),
    /// MAX_COMMAND_LEN bytes without a newline
    Overlong(Vec<u8>),
    Eof,
}

impl<R> CommandListener<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(input: R, state: Arc<ControlState>, log: Option<Arc<LogSink>>) -> Self {
        Self { input, state, log }
    }

    /// run until OFF, shutdown from another trigger, or a fatal i/o error
    pub async fn run(mut self) -> Result<()> {
        let mut skipping = false;
        loop {
            // losing the race to shutdown only drops a partial line we would ignore anyway
            let chunk = tokio::select! {
                biased;
                _ = self.state.shutdown().wait() => return Ok(()),
                chunk = read_chunk(&mut self.input) => chunk.context("failed to read from stdin")?,
            };

            let (raw, command) = match chunk {
                Chunk::Eof => {
                    tracing::info!("command input closed, waiting for shutdown");
                    self.state.shutdown().wait().await;
                    return Ok(());
                }
                Chunk::Line(raw) if skipping => {
                    tracing::trace!(bytes = raw.len(), "dropped tail of over-long command");
                    skipping = false;
                    continue;
                }
                Chunk::Overlong(raw) if skipping => {
                    tracing::trace!(bytes = raw.len(), "dropped tail of over-long command");
                    continue;
                }
                Chunk::Overlong(raw) => {
                    skipping = true;
                    let text = String::from_utf8_lossy(&raw).into_owned();
                    (raw, Command::Invalid(text))
                }
                Chunk::Line(raw) => {
                    let command =
                        Command::parse(String::from_utf8_lossy(&raw).trim_end_matches(['\n', '\r']));
                    (raw, command)
                }
            };

            if let Some(log) = &self.log {
                let mut record = raw;
                if record.last() != Some(&b'\n') {
                    record.push(b'\n');
                }
                log.append(&record).await.context("failed to log command")?;
            }

            if apply(&self.state, &command) == Outcome::Shutdown {
                return Ok(());
            }
        }
    }
}

async fn read_chunk<R: AsyncBufRead + Unpin>(input: &mut R) -> std::io::Result<Chunk> {
    let mut buf = Vec::with_capacity(MAX_COMMAND_LEN);
    let n = (&mut *input)
        .take(MAX_COMMAND_LEN as u64)
        .read_until(b'\n', &mut buf)
        .await?;
    Ok(if n == 0 {
        Chunk::Eof
    } else if buf.last() != Some(&b'\n') && buf.len() == MAX_COMMAND_LEN {
        Chunk::Overlong(buf)
    } else {
        Chunk::Line(buf)
    })
}
