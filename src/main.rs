//! ==============================================================================
//! main.rs - thermo-monitor entry point
//! ==============================================================================
//!
//! purpose:
//!     samples a thermistor every period, prints "HH:MM:SS <temp>" lines to
//!     stdout (and the optional log file), and takes run-time commands on
//!     stdin. OFF, the button or ctrl-c end the run with one SHUTDOWN line.
//!
//! responsibilities:
//!     - parse command-line overrides and load monitor.toml
//!     - initialize tracing (stderr; stdout is reserved for records)
//!     - open the log file and the sensor/button devices
//!     - forward os interrupts into the shutdown coordinator
//!     - run the monitor and map the outcome to the exit status
//!
//! exit status:
//!     0  normal shutdown, every activity joined and every resource released
//!     1  bad options/config, device or log failure, stdin read failure
//!
//! relationships:
//!     - uses: config.rs, daemon.rs, hal.rs, signals.rs, sink.rs
//!
//! ==============================================================================

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thermo_monitor::config::{CliOverrides, MonitorConfig};
use thermo_monitor::control::ControlState;
use thermo_monitor::daemon::Monitor;
use thermo_monitor::hal::SystemClock;
use thermo_monitor::signals;
use thermo_monitor::sink::LogSink;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

// ==============================================================================
// main entry point
// ==============================================================================

fn main() -> ExitCode {
    // step 1: options (--help/--version exit 0, anything malformed exits 1)
    let cli = match CliOverrides::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    // step 2: configuration (bootstrap logger until the level is known)
    let bootstrap = tracing_subscriber::fmt().with_writer(std::io::stderr).finish();
    let config = match tracing::subscriber::with_default(bootstrap, || load_config(&cli)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // step 3: diagnostics
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    config.print_summary();

    // step 4: runtime
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("[ERROR] Fatal: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(config));

    // a stdin read parked on the blocking pool must not hold the process open
    runtime.shutdown_timeout(Duration::from_millis(100));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[ERROR] Fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &CliOverrides) -> Result<MonitorConfig> {
    let mut config = MonitorConfig::load_or_default(cli.config.as_deref())?;
    config.apply(cli);
    // validate up front so bad values fail before any device is opened
    config.period()?;
    config.button_poll_interval()?;
    Ok(config)
}

async fn run(config: MonitorConfig) -> Result<()> {
    let state = Arc::new(ControlState::new(config.period()?, config.sampling.scale));

    let log = match &config.log.path {
        Some(path) => Some(Arc::new(LogSink::open(path).await?)),
        None => None,
    };

    let (sensor, button) = open_devices(&config)?;

    let signal_state = state.clone();
    let signal_task = tokio::spawn(async move {
        if let Err(e) = signals::forward_interrupts(signal_state).await {
            tracing::error!("interrupt forwarding stopped: {:#}", e);
        }
    });

    tracing::info!("[RUNTIME] Starting sensor sampling");
    let monitor = Monitor {
        state,
        sensor,
        button,
        input: BufReader::new(tokio::io::stdin()),
        clock: Arc::new(SystemClock),
        console: Box::new(std::io::stdout()),
        log,
        button_poll: config.button_poll_interval()?,
    };
    let result = monitor.run().await;

    signal_task.abort();
    result
}

#[cfg(feature = "hardware")]
fn open_devices(
    config: &MonitorConfig,
) -> Result<(thermo_monitor::hal::AdcSensor, thermo_monitor::hal::GpioButton)> {
    use thermo_monitor::hal::{AdcSensor, GpioButton};
    let hw = &config.hardware;
    let sensor = AdcSensor::new(hw.adc_i2c_address, hw.adc_channel)?;
    let button = GpioButton::new(hw.button_pin)?;
    Ok((sensor, button))
}

#[cfg(not(feature = "hardware"))]
fn open_devices(
    config: &MonitorConfig,
) -> Result<(thermo_monitor::hal::SimulatedSensor, thermo_monitor::hal::SimulatedButton)> {
    use thermo_monitor::hal::{SimulatedButton, SimulatedSensor};
    Ok((SimulatedSensor::new(config.simulation.raw_sample), SimulatedButton::new()))
}
