use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThermostatConfig {
    pub default_setpoint_f: i32,
    pub display_alt_period_ms: u64,
    pub telemetry_period_ms: u64,
    pub fade_time_ms: u64,
    pub loop_interval_ms: u64,
    pub sensor_settle_ms: u32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            default_setpoint_f: 72,
            display_alt_period_ms: 2_000,
            telemetry_period_ms: 30_000,
            fade_time_ms: 1_000,
            loop_interval_ms: 50,
            sensor_settle_ms: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HardwareConfig {
    pub sensor_address: u8,
    pub display_cols: usize,
    /// Character device for the two-line display; `None` runs headless.
    pub display_device: Option<String>,
    /// Byte-stream device for telemetry; `None` disables telemetry.
    pub serial_port: Option<String>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            sensor_address: 0x38,
            display_cols: 16,
            display_device: Some("/dev/tty".to_string()),
            serial_port: Some("/dev/serial0".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub hardware: HardwareConfig,
    /// IANA zone for the display clock; local time when unset.
    pub timezone: Option<String>,
}

impl ThermostatConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.display_alt_period_ms == 0 {
            self.display_alt_period_ms = defaults.display_alt_period_ms;
        }
        if self.telemetry_period_ms == 0 {
            self.telemetry_period_ms = defaults.telemetry_period_ms;
        }
        self.fade_time_ms = self.fade_time_ms.clamp(50, 10_000);
        self.loop_interval_ms = self.loop_interval_ms.clamp(1, 1_000);
        self.sensor_settle_ms = self.sensor_settle_ms.clamp(80, 1_000);
    }
}

impl HardwareConfig {
    pub fn sanitize(&mut self) {
        // 7-bit bus addresses only.
        if self.sensor_address > 0x7F {
            self.sensor_address = 0x38;
        }
        self.display_cols = self.display_cols.clamp(8, 40);
        self.display_device = self.display_device.take().filter(|path| !path.is_empty());
        self.serial_port = self.serial_port.take().filter(|path| !path.is_empty());
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.thermostat.sanitize();
        self.hardware.sanitize();
        self.timezone = self.timezone.take().filter(|tz| !tz.trim().is_empty());
    }
}
