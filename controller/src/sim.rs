//! Host stand-ins for the panel hardware.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    thread,
    time::{Duration, Instant},
};

use embedded_hal::{
    delay::DelayNs,
    i2c::{ErrorKind, ErrorType, I2c, Operation},
};
use thermostat_common::{CharDisplay, DisplayError, IntensityOutput};
use tracing::{debug, trace};

const SIM_HUMIDITY_PCT: f64 = 45.0;
const SIM_BASE_TEMP_F: f64 = 70.0;
const SIM_SWING_F: f64 = 4.0;
const SIM_CYCLE_SECS: f64 = 240.0;
const CMD_TRIGGER: u8 = 0xAC;

/// AHT20 on a simulated bus. Each trigger latches a temperature that swings
/// slowly around 70 °F so both heat and cool indications get exercised.
pub struct SimulatedAht20 {
    started: Instant,
    latched: Option<[u8; 6]>,
}

impl SimulatedAht20 {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            latched: None,
        }
    }

    fn room_temp_f(&self) -> f64 {
        let phase = self.started.elapsed().as_secs_f64() / SIM_CYCLE_SECS;
        SIM_BASE_TEMP_F + SIM_SWING_F * (phase * std::f64::consts::TAU).sin()
    }
}

impl Default for SimulatedAht20 {
    fn default() -> Self {
        Self::new()
    }
}

/// Packs a reading into the sensor's 6-byte status + data payload.
pub fn encode_payload(temp_f: f64, humidity_pct: f64) -> [u8; 6] {
    let full_scale = (1u32 << 20) as f64;
    let temp_c = (temp_f - 32.0) * 5.0 / 9.0;
    let temp_raw = (((temp_c + 50.0) / 200.0) * full_scale)
        .round()
        .clamp(0.0, 0xF_FFFF as f64) as u32;
    let hum_raw = ((humidity_pct / 100.0) * full_scale)
        .round()
        .clamp(0.0, 0xF_FFFF as f64) as u32;

    [
        0x1C,
        (hum_raw >> 12) as u8,
        (hum_raw >> 4) as u8,
        (((hum_raw & 0x0F) << 4) | ((temp_raw >> 16) & 0x0F)) as u8,
        (temp_raw >> 8) as u8,
        temp_raw as u8,
    ]
}

impl ErrorType for SimulatedAht20 {
    type Error = ErrorKind;
}

impl I2c for SimulatedAht20 {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    if bytes.first() == Some(&CMD_TRIGGER) {
                        self.latched = Some(encode_payload(self.room_temp_f(), SIM_HUMIDITY_PCT));
                    }
                }
                Operation::Read(buf) => {
                    let payload = self.latched.take().ok_or(ErrorKind::Other)?;
                    let len = buf.len().min(payload.len());
                    buf[..len].copy_from_slice(&payload[..len]);
                }
            }
        }
        Ok(())
    }
}

pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// Stand-in for a PWM LED; levels go to the trace log.
pub struct LoggedLed {
    name: &'static str,
    level: f32,
}

impl LoggedLed {
    pub fn new(name: &'static str) -> Self {
        Self { name, level: 0.0 }
    }
}

impl IntensityOutput for LoggedLed {
    fn set_level(&mut self, level: f32) {
        if (level - self.level).abs() > f32::EPSILON {
            trace!("{} led level {:.2}", self.name, level);
            self.level = level;
        }
    }
}

/// Two-line display rendered with ANSI cursor control onto a terminal.
pub struct TerminalDisplay<W> {
    out: W,
}

impl TerminalDisplay<File> {
    pub fn open(path: &str) -> Result<Self, DisplayError> {
        let out = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|err| DisplayError::Unavailable(format!("{path}: {err}")))?;
        debug!("display attached to {path}");
        Ok(Self::new(out))
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
        self.out.write_all(bytes)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> CharDisplay for TerminalDisplay<W> {
    fn home(&mut self) -> Result<(), DisplayError> {
        self.emit(b"\x1b[H")
    }

    fn write_str(&mut self, text: &str) -> Result<(), DisplayError> {
        self.emit(text.as_bytes())
    }

    fn crlf(&mut self) -> Result<(), DisplayError> {
        self.emit(b"\r\n")
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.emit(b"\x1b[2J\x1b[H")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermostat_common::{
        display::{write_frame, Frame},
        Aht20, Measurement, SensorReader,
    };

    #[test]
    fn encoded_payload_decodes_back() {
        for temp_f in [-58.0_f64, 32.0, 68.3, 72.0, 99.5] {
            let measurement = Measurement::decode(&encode_payload(temp_f, 45.0)).unwrap();
            assert!((measurement.temperature_f() - temp_f).abs() < 0.01, "{temp_f}");
            assert!((measurement.humidity_pct - 45.0).abs() < 0.01);
        }
    }

    #[test]
    fn simulated_sensor_reads_through_driver() {
        let mut sensor = Aht20::new(SimulatedAht20::new(), StdDelay, 0x38, 1);
        sensor.init();
        let temp_f = sensor.read().unwrap();
        assert!((65.9..=74.1).contains(&temp_f), "{temp_f}");
    }

    #[test]
    fn read_without_trigger_is_a_bus_error() {
        let mut bus = SimulatedAht20::new();
        let mut buf = [0u8; 6];
        assert_eq!(bus.read(0x38, &mut buf), Err(ErrorKind::Other));
    }

    #[test]
    fn terminal_display_uses_cursor_control() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.clear().unwrap();
        write_frame(
            &mut display,
            &Frame {
                line1: "10/19 20:15:00  ".to_string(),
                line2: "T: 70.0F        ".to_string(),
            },
        )
        .unwrap();

        let written = String::from_utf8(display.out).unwrap();
        assert_eq!(
            written,
            "\x1b[2J\x1b[H\x1b[H10/19 20:15:00  \r\nT: 70.0F        "
        );
    }

    #[test]
    fn missing_display_device_is_unavailable() {
        let err = TerminalDisplay::open("/nonexistent/display").err().unwrap();
        assert!(matches!(err, DisplayError::Unavailable(_)));
    }
}
