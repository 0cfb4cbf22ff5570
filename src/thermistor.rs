//! ==============================================================================
//! thermistor.rs - adc sample to temperature conversion
//! ==============================================================================
//!
//! purpose:
//!     converts a 10-bit adc reading from the grove ntc thermistor divider into
//!     degrees using the nominal beta model:
//!
//!         R      = 1023 / raw - 1
//!         T(°C)  = 1 / (ln(R) / B + 1 / 298.15) - 273.15
//!
//!     raw 0 (division by zero) and values above the 10-bit range are
//!     reported as a SensorFault instead of leaking NaN/inf into a report
//!     line. full scale (raw 1023) gives R = 0, ln(R) = -inf, and the model
//!     evaluates to absolute zero, which is reported as-is.
//!
//! relationships:
//!     - used by: sampler.rs (once per reporting tick)
//!
//! ==============================================================================

use crate::domain::Scale;
use std::fmt;

/// nominal thermistor beta (not individually calibrated)
pub const BETA: f64 = 4275.0;
/// reference temperature of the beta model, in kelvin
pub const T0_KELVIN: f64 = 298.15;
/// full-scale value of the 10-bit adc
pub const ADC_MAX: u16 = 1023;

const KELVIN_OFFSET: f64 = 273.15;

/// a raw sample outside the domain of the conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// raw == 0: open circuit, resistance is infinite
    Open,
    /// raw above the 10-bit range
    OutOfRange(u16),
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorFault::Open => write!(f, "sensor reads 0 (open circuit)"),
            SensorFault::OutOfRange(raw) => {
                write!(f, "sensor reads {} (outside 0..={})", raw, ADC_MAX)
            }
        }
    }
}

impl std::error::Error for SensorFault {}

/// convert a raw adc sample to degrees celsius
pub fn to_celsius(raw: u16) -> Result<f64, SensorFault> {
    if raw == 0 {
        return Err(SensorFault::Open);
    }
    if raw > ADC_MAX {
        return Err(SensorFault::OutOfRange(raw));
    }

    let resistance = f64::from(ADC_MAX) / f64::from(raw) - 1.0;
    let inverse_t = resistance.ln() / BETA + 1.0 / T0_KELVIN;
    Ok(1.0 / inverse_t - KELVIN_OFFSET)
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// convert a raw adc sample to the requested scale
pub fn convert(raw: u16, scale: Scale) -> Result<f64, SensorFault> {
    let celsius = to_celsius(raw)?;
    Ok(match scale {
        Scale::Celsius => celsius,
        Scale::Fahrenheit => celsius_to_fahrenheit(celsius),
    })
}
