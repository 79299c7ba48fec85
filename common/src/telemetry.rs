use std::io::Write;

use thiserror::Error;
use tracing::{debug, warn};

use crate::types::ThermostatMode;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("transport write failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    NoSample,
    NotDue,
    Sent,
    NoTransport,
    Failed,
}

/// `"<mode>,<temp_f:.1>,<setpoint>\n"`
pub fn format_line(mode: ThermostatMode, temp_f: f64, setpoint_f: i32) -> String {
    format!("{},{:.1},{}\n", mode.as_str(), temp_f, setpoint_f)
}

pub fn send_line<W: Write + ?Sized>(transport: &mut W, line: &str) -> Result<(), TransportError> {
    transport.write_all(line.as_bytes())?;
    transport.flush()?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct TelemetryEmitter {
    period_ms: u64,
    last_sent_ms: Option<u64>,
}

impl TelemetryEmitter {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_sent_ms: None,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.last_sent_ms
            .map(|last| now_ms.saturating_sub(last) >= self.period_ms)
            .unwrap_or(true)
    }

    /// Emits one line when a sample exists and the period has elapsed. The
    /// timer restarts on every attempt, failed or not, so a dead transport
    /// is retried once per period rather than every tick.
    pub fn tick<W: Write + ?Sized>(
        &mut self,
        now_ms: u64,
        transport: Option<&mut W>,
        temp_f: Option<f64>,
        mode: ThermostatMode,
        setpoint_f: i32,
    ) -> EmitOutcome {
        let Some(temp_f) = temp_f else {
            return EmitOutcome::NoSample;
        };
        if !self.is_due(now_ms) {
            return EmitOutcome::NotDue;
        }
        self.last_sent_ms = Some(now_ms);

        let Some(transport) = transport else {
            return EmitOutcome::NoTransport;
        };

        let line = format_line(mode, temp_f, setpoint_f);
        match send_line(transport, &line) {
            Ok(()) => {
                debug!("telemetry sent: {}", line.trim_end());
                EmitOutcome::Sent
            }
            Err(err) => {
                warn!("telemetry write failed: {err}");
                EmitOutcome::Failed
            }
        }
    }
}
