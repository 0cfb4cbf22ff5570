//! ==============================================================================
//! thermo-monitor - periodic temperature monitoring daemon
//! ==============================================================================
//!
//! three activities share one ControlState:
//!
//!     - sampler.rs   reads the thermistor every period and reports it
//!     - commands.rs  applies OFF/STOP/START/SCALE=/PERIOD= from stdin
//!     - button.rs    requests shutdown when the button is pressed
//!
//! every shutdown trigger (OFF, button, SIGINT/SIGTERM) goes through
//! shutdown.rs; daemon.rs joins the activities and writes the final record.
//!
//! ==============================================================================

pub mod button;
pub mod commands;
pub mod config;
pub mod control;
pub mod daemon;
pub mod domain;
pub mod hal;
pub mod sampler;
pub mod signals;
pub mod sink;
pub mod shutdown;
pub mod thermistor;
