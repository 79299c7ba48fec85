//! AHT20 temperature/humidity sensor over I2C.
//!
//! A measurement is a trigger write, a fixed settling wait, then a 6-byte
//! read: one status byte followed by two 20-bit fields packed across five
//! bytes (humidity first, temperature second).

use embedded_hal::{
    delay::DelayNs,
    i2c::{Error as _, I2c},
};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_ADDRESS: u8 = 0x38;
pub const PAYLOAD_LEN: usize = 6;

const CMD_SOFT_RESET: [u8; 1] = [0xBA];
const CMD_CALIBRATE: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];
const SOFT_RESET_WAIT_MS: u32 = 20;
const CALIBRATE_WAIT_MS: u32 = 10;
const FULL_SCALE: f64 = (1u32 << 20) as f64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    #[error("bus fault: {0}")]
    BusFault(String),
}

/// Anything the control loop can sample a Fahrenheit temperature from.
pub trait SensorReader {
    fn read(&mut self) -> Result<f64, SensorError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

impl Measurement {
    pub fn decode(payload: &[u8]) -> Result<Self, SensorError> {
        if payload.len() != PAYLOAD_LEN {
            return Err(SensorError::ShortRead {
                expected: PAYLOAD_LEN,
                actual: payload.len(),
            });
        }

        // payload[0] is the status byte.
        let humidity_raw = ((u32::from(payload[1]) << 12)
            | (u32::from(payload[2]) << 4)
            | (u32::from(payload[3]) >> 4))
            & 0xF_FFFF;
        let temperature_raw = (((u32::from(payload[3]) & 0x0F) << 16)
            | (u32::from(payload[4]) << 8)
            | u32::from(payload[5]))
            & 0xF_FFFF;

        Ok(Self {
            temperature_c: f64::from(temperature_raw) * 200.0 / FULL_SCALE - 50.0,
            humidity_pct: f64::from(humidity_raw) * 100.0 / FULL_SCALE,
        })
    }

    pub fn temperature_f(&self) -> f64 {
        celsius_to_fahrenheit(self.temperature_c)
    }
}

pub fn celsius_to_fahrenheit(temp_c: f64) -> f64 {
    temp_c * 9.0 / 5.0 + 32.0
}

pub struct Aht20<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    settle_ms: u32,
}

impl<I: I2c, D: DelayNs> Aht20<I, D> {
    pub fn new(i2c: I, delay: D, address: u8, settle_ms: u32) -> Self {
        Self {
            i2c,
            delay,
            address,
            settle_ms,
        }
    }

    /// Soft reset followed by calibration. Failures are logged and tolerated;
    /// some clones ignore the reset command entirely.
    pub fn init(&mut self) {
        match self.i2c.write(self.address, &CMD_SOFT_RESET) {
            Ok(()) => self.delay.delay_ms(SOFT_RESET_WAIT_MS),
            Err(err) => warn!("AHT20 soft reset ignored: {:?}", err.kind()),
        }

        match self.i2c.write(self.address, &CMD_CALIBRATE) {
            Ok(()) => self.delay.delay_ms(CALIBRATE_WAIT_MS),
            Err(err) => warn!("AHT20 init step warning: {:?}", err.kind()),
        }
    }

    pub fn measure(&mut self) -> Result<Measurement, SensorError> {
        self.i2c
            .write(self.address, &CMD_TRIGGER)
            .map_err(|err| SensorError::BusFault(format!("trigger: {:?}", err.kind())))?;

        self.delay.delay_ms(self.settle_ms);

        let mut payload = [0u8; PAYLOAD_LEN];
        self.i2c
            .read(self.address, &mut payload)
            .map_err(|err| SensorError::BusFault(format!("read: {:?}", err.kind())))?;

        Measurement::decode(&payload)
    }

    /// Hands the bus and delay back, closing the driver.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}

impl<I: I2c, D: DelayNs> SensorReader for Aht20<I, D> {
    fn read(&mut self) -> Result<f64, SensorError> {
        self.measure().map(|measurement| measurement.temperature_f())
    }
}
