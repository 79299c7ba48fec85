use chrono::NaiveDateTime;
use thiserror::Error;

use crate::types::ThermostatMode;

pub const DEFAULT_COLS: usize = 16;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display unavailable: {0}")]
    Unavailable(String),
    #[error("display write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A character display addressed line by line.
pub trait CharDisplay {
    fn home(&mut self) -> Result<(), DisplayError>;
    fn write_str(&mut self, text: &str) -> Result<(), DisplayError>;
    fn crlf(&mut self) -> Result<(), DisplayError>;
    fn clear(&mut self) -> Result<(), DisplayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub line1: String,
    pub line2: String,
}

/// Truncates to `cols` characters and right-pads with spaces, so a shorter
/// line fully overwrites a longer previous one.
pub fn fit_line(text: &str, cols: usize) -> String {
    let mut line: String = text.chars().take(cols).collect();
    let len = line.chars().count();
    line.push_str(&" ".repeat(cols - len));
    line
}

pub fn write_frame<D: CharDisplay + ?Sized>(
    display: &mut D,
    frame: &Frame,
) -> Result<(), DisplayError> {
    display.home()?;
    display.write_str(&frame.line1)?;
    display.crlf()?;
    display.write_str(&frame.line2)
}

/// Alternates the second line between the temperature and the
/// mode/setpoint view on a fixed period. The first line is the wall clock.
#[derive(Debug, Clone)]
pub struct DisplayMultiplexer {
    period_ms: u64,
    cols: usize,
    show_mode: bool,
    last_flip_ms: Option<u64>,
}

impl DisplayMultiplexer {
    pub fn new(period_ms: u64, cols: usize) -> Self {
        Self {
            period_ms,
            cols,
            show_mode: false,
            last_flip_ms: None,
        }
    }

    pub fn showing_mode(&self) -> bool {
        self.show_mode
    }

    /// Flips the second-line view once the period has elapsed. Returns
    /// whether a flip happened.
    pub fn advance(&mut self, now_ms: u64) -> bool {
        let due = self
            .last_flip_ms
            .map(|last| now_ms.saturating_sub(last) >= self.period_ms)
            .unwrap_or(true);
        if due {
            self.show_mode = !self.show_mode;
            self.last_flip_ms = Some(now_ms);
        }
        due
    }

    /// `None` when there is no sample this tick; the physical display keeps
    /// whatever it showed last.
    pub fn tick(
        &mut self,
        now_ms: u64,
        wall_clock: NaiveDateTime,
        temp_f: Option<f64>,
        mode: ThermostatMode,
        setpoint_f: i32,
    ) -> Option<Frame> {
        self.advance(now_ms);
        let temp_f = temp_f?;
        Some(self.render(wall_clock, temp_f, mode, setpoint_f))
    }

    pub fn render(
        &self,
        wall_clock: NaiveDateTime,
        temp_f: f64,
        mode: ThermostatMode,
        setpoint_f: i32,
    ) -> Frame {
        let line1 = wall_clock.format("%m/%d %H:%M:%S").to_string();
        let line2 = if self.show_mode {
            format!("{} SP:{:>3}F", mode.label(), setpoint_f)
        } else {
            format!("T:{temp_f:5.1}F")
        };

        Frame {
            line1: fit_line(&line1, self.cols),
            line2: fit_line(&line2, self.cols),
        }
    }
}
