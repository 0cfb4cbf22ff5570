//! ==============================================================================
//! hal.rs - Hardware Abstraction Layer
//! ==============================================================================
//!
//! purpose:
//!     the two hardware operations the monitor needs ("read analog sample",
//!     "read digital pin state") plus a wall clock, behind small traits.
//!     abstracts away the difference between running on a real Raspberry Pi
//!     (using `rppal`) and a development machine (using simulated devices).
//!
//! design philosophy:
//!     - "Compile Anywhere": the daemon builds and runs on any Linux/Mac box.
//!     - "Exclusive Ownership": the sensor belongs to the sampling loop and the
//!       button to the button monitor; neither handle is ever shared.
//!     - "Fail Loudly": opening a device is fallible and the caller treats
//!       that as fatal.
//!     - "Off the Workers": i2c and gpio calls block, so activities drive
//!       their device through BlockingDevice, which runs each call on
//!       tokio's blocking pool and takes the device back afterwards.
//!
//! relationships:
//!     - used by: sampler.rs (SensorPort, Clock), button.rs (ButtonPort)
//!     - built by: main.rs (from config.rs HardwareConfig / SimulationConfig)
//!     - uses: rppal (on feature="hardware")
//!
//! ==============================================================================

use anyhow::{Context, Result};
use chrono::NaiveTime;

/// analog input returning raw samples in the 10-bit adc domain `0..=1023`
pub trait SensorPort: Send {
    fn read_raw(&mut self) -> Result<u16>;
}

/// digital input; any non-zero level means "pressed"
pub trait ButtonPort: Send {
    fn read_level(&mut self) -> Result<u8>;
}

/// wall clock used to timestamp records
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveTime;
}

/// local time of day from the os clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveTime {
        chrono::Local::now().time()
    }
}

/// exclusive owner of a device whose calls run on the blocking pool
#[derive(Debug)]
pub struct BlockingDevice<D> {
    device: Option<D>,
}

impl<D: Send + 'static> BlockingDevice<D> {
    pub fn new(device: D) -> Self {
        Self { device: Some(device) }
    }

    /// run one device call on `spawn_blocking`
    ///
    /// the device comes back even when `op` fails; only a panicking call
    /// loses it, and every later call then reports that.
    pub async fn call<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut D) -> Result<T> + Send + 'static,
    {
        let mut device = self.device.take().context("device lost in an earlier call")?;
        let (device, out) = tokio::task::spawn_blocking(move || {
            let out = op(&mut device);
            (device, out)
        })
        .await
        .context("device call panicked")?;
        self.device = Some(device);
        out
    }

    /// hand the device back for release
    pub fn into_inner(self) -> Result<D> {
        self.device.context("device lost in an earlier call")
    }
}

// ==============================================================================================
// SIMULATED IMPLEMENTATION (For Non-Hardware Build)
// ==============================================================================================

/// analog input that always reads the configured raw sample
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    raw: u16,
}

impl SimulatedSensor {
    pub fn new(raw: u16) -> Self {
        tracing::info!(raw, "using simulated sensor (no hardware access)");
        Self { raw }
    }
}

impl SensorPort for SimulatedSensor {
    fn read_raw(&mut self) -> Result<u16> {
        tracing::trace!(raw = self.raw, "[SIM ADC] read");
        Ok(self.raw)
    }
}

/// digital input that is never pressed
#[derive(Debug, Default, Clone)]
pub struct SimulatedButton;

impl SimulatedButton {
    pub fn new() -> Self {
        tracing::info!("using simulated button (never pressed)");
        Self
    }
}

impl ButtonPort for SimulatedButton {
    fn read_level(&mut self) -> Result<u8> {
        Ok(0)
    }
}

// ==============================================================================================
// REAL IMPLEMENTATION (For Raspberry Pi)
// ==============================================================================================
#[cfg(feature = "hardware")]
pub use self::rpi::{AdcSensor, GpioButton};

#[cfg(feature = "hardware")]
mod rpi {
    use super::{ButtonPort, SensorPort};
    use anyhow::{Context, Result};
    use rppal::gpio::{Gpio, InputPin};
    use rppal::i2c::I2c;

    /// first raw-value register of the grove base hat adc; channel n is at base + n
    const REG_RAW_BASE: u8 = 0x10;

    /// analog channel on an i2c adc hat (12-bit), scaled to the 10-bit domain
    pub struct AdcSensor {
        i2c: I2c,
        channel: u8,
    }

    impl AdcSensor {
        pub fn new(address: u16, channel: u8) -> Result<Self> {
            tracing::info!(address, channel, "using i2c adc (rppal)");
            let mut i2c = I2c::new().context("failed to open analog input port")?;
            i2c.set_slave_address(address)
                .with_context(|| format!("failed to address adc at 0x{:02X}", address))?;
            Ok(Self { i2c, channel })
        }
    }

    impl SensorPort for AdcSensor {
        fn read_raw(&mut self) -> Result<u16> {
            let mut buf = [0u8; 2];
            self.i2c
                .write_read(&[REG_RAW_BASE + self.channel], &mut buf)
                .context("adc read failed")?;
            let raw12 = u16::from_le_bytes(buf) & 0x0FFF;
            Ok(raw12 >> 2)
        }
    }

    /// push button on a gpio input pin
    pub struct GpioButton {
        pin: InputPin,
    }

    impl GpioButton {
        pub fn new(pin: u8) -> Result<Self> {
            tracing::info!(pin, "using gpio button (rppal)");
            let gpio = Gpio::new().context("failed to open digital input port")?;
            let pin = gpio
                .get(pin)
                .with_context(|| format!("failed to claim gpio {}", pin))?
                .into_input();
            Ok(Self { pin })
        }
    }

    impl ButtonPort for GpioButton {
        fn read_level(&mut self) -> Result<u8> {
            Ok(if self.pin.is_high() { 1 } else { 0 })
        }
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_sensor_repeats_sample() {
        let mut s = SimulatedSensor::new(512);
        assert_eq!(s.read_raw().unwrap(), 512);
        assert_eq!(s.read_raw().unwrap(), 512);
    }

    #[test]
    fn simulated_button_is_released() {
        let mut b = SimulatedButton::new();
        assert_eq!(b.read_level().unwrap(), 0);
    }

    struct CountingSensor(u16);

    impl SensorPort for CountingSensor {
        fn read_raw(&mut self) -> Result<u16> {
            self.0 += 1;
            if self.0 > 2 {
                anyhow::bail!("bus error");
            }
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn blocking_device_keeps_state_between_calls() {
        let mut dev = BlockingDevice::new(CountingSensor(0));
        assert_eq!(dev.call(|s| s.read_raw()).await.unwrap(), 1);
        assert_eq!(dev.call(|s| s.read_raw()).await.unwrap(), 2);
        assert!(dev.call(|s| s.read_raw()).await.is_err());
        // a failed call still returns the device
        assert_eq!(dev.into_inner().unwrap().0, 3);
    }

    #[tokio::test]
    async fn blocking_device_runs_off_the_async_thread() {
        let caller = std::thread::current().id();
        let mut dev = BlockingDevice::new(SimulatedSensor::new(7));
        let worker = dev.call(|_| Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(worker, caller);
    }

    #[tokio::test]
    async fn panicking_call_loses_the_device() {
        let mut dev = BlockingDevice::new(SimulatedButton::new());
        let panicked: Result<u8> = dev.call(|_| panic!("driver bug")).await;
        assert!(format!("{:#}", panicked.unwrap_err()).contains("panicked"));
        assert!(dev.call(|b| b.read_level()).await.is_err());
        assert!(dev.into_inner().is_err());
    }

    #[test]
    fn system_clock_formats_as_time_of_day() {
        let stamp = SystemClock.now().format("%H:%M:%S").to_string();
        assert_eq!(stamp.len(), 8);
        assert_eq!(stamp.as_bytes()[2], b':');
    }
}
