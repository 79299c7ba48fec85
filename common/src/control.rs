//! The polling control loop.
//!
//! One thread owns every peripheral. Each iteration drains button events,
//! samples the sensor once, reconciles the indicator LEDs, then gives the
//! display and telemetry their chance to fire against the same timestamp.
//! Component failures downgrade to "unavailable this tick"; only the
//! shutdown flag ends the loop.

use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Receiver,
    },
    thread,
    time::Duration,
};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::{
    actuator::{ActuatorDriver, IntensityOutput},
    aht20::SensorReader,
    config::ThermostatConfig,
    display::{write_frame, CharDisplay, DisplayMultiplexer, Frame},
    telemetry::{EmitOutcome, TelemetryEmitter},
    thermostat::{EngineChange, ThermostatEngine},
    types::InputEvent,
};

pub trait Clock {
    /// Monotonic milliseconds since an arbitrary origin.
    fn now_ms(&self) -> u64;
    fn wall_clock(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
}

/// Hardware handles owned by the loop. Display and transport are optional
/// subsystems and may be absent for the whole process lifetime.
pub struct Peripherals<S, O, D, T> {
    pub sensor: S,
    pub heat_led: O,
    pub cool_led: O,
    pub display: Option<D>,
    pub transport: Option<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub temp_f: Option<f64>,
    pub frame: Option<Frame>,
    pub telemetry: EmitOutcome,
}

pub struct ControlLoop<S, O, D, T> {
    engine: ThermostatEngine,
    sensor: S,
    actuators: ActuatorDriver<O>,
    display: Option<D>,
    display_faulted: bool,
    transport: Option<T>,
    multiplexer: DisplayMultiplexer,
    telemetry: TelemetryEmitter,
    inputs: Receiver<InputEvent>,
    loop_interval: Duration,
    state: LoopState,
}

impl<S, O, D, T> ControlLoop<S, O, D, T>
where
    S: SensorReader,
    O: IntensityOutput,
    D: CharDisplay,
    T: Write,
{
    pub fn new(
        config: &ThermostatConfig,
        display_cols: usize,
        peripherals: Peripherals<S, O, D, T>,
        inputs: Receiver<InputEvent>,
    ) -> Self {
        let Peripherals {
            sensor,
            heat_led,
            cool_led,
            mut display,
            transport,
        } = peripherals;

        if let Some(lcd) = display.as_mut() {
            if let Err(err) = lcd.clear() {
                warn!("display init failed ({err}); continuing without display");
                display = None;
            }
        }

        Self {
            engine: ThermostatEngine::new(config.default_setpoint_f),
            sensor,
            actuators: ActuatorDriver::new(heat_led, cool_led, config.fade_time_ms),
            display,
            display_faulted: false,
            transport,
            multiplexer: DisplayMultiplexer::new(config.display_alt_period_ms, display_cols),
            telemetry: TelemetryEmitter::new(config.telemetry_period_ms),
            inputs,
            loop_interval: Duration::from_millis(config.loop_interval_ms),
            state: LoopState::Running,
        }
    }

    pub fn engine(&self) -> &ThermostatEngine {
        &self.engine
    }

    pub fn actuators(&self) -> &ActuatorDriver<O> {
        &self.actuators
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn has_display(&self) -> bool {
        self.display.is_some()
    }

    /// Applies queued button presses. A mode change lights the indicators
    /// from the mode alone so feedback does not wait for the next sample.
    pub fn drain_inputs(&mut self, now_ms: u64) {
        for event in self.inputs.try_iter() {
            match self.engine.handle_event(event) {
                EngineChange::Mode(mode) => {
                    info!("mode -> {}", mode.as_str());
                    self.actuators.apply_mode_feedback(mode, now_ms);
                }
                EngineChange::Setpoint(setpoint_f) => info!("setpoint {setpoint_f} F"),
            }
        }
    }

    pub fn tick(&mut self, now_ms: u64, wall_clock: NaiveDateTime) -> TickReport {
        self.drain_inputs(now_ms);

        let temp_f = match self.sensor.read() {
            Ok(temp_f) => Some(temp_f),
            Err(err) => {
                warn!("sensor read failed: {err}");
                None
            }
        };

        if let Some(temp_f) = temp_f {
            self.actuators.apply(self.engine.intents(temp_f), now_ms);
        }
        self.actuators.refresh(now_ms);

        let mode = self.engine.mode();
        let setpoint_f = self.engine.setpoint_f();

        let frame = self
            .multiplexer
            .tick(now_ms, wall_clock, temp_f, mode, setpoint_f);
        if let Some(frame) = &frame {
            self.write_display(frame);
        }

        let telemetry =
            self.telemetry
                .tick(now_ms, self.transport.as_mut(), temp_f, mode, setpoint_f);

        TickReport {
            temp_f,
            frame,
            telemetry,
        }
    }

    /// Polls until `shutdown` is raised, then cleans up.
    pub fn run<C: Clock>(mut self, clock: &C, shutdown: &AtomicBool) {
        info!("thermostat starting");
        while self.state == LoopState::Running {
            if shutdown.load(Ordering::Relaxed) {
                self.state = LoopState::Stopping;
                break;
            }
            self.tick(clock.now_ms(), clock.wall_clock());
            thread::sleep(self.loop_interval);
        }
        self.shutdown();
    }

    /// Each step runs regardless of how the previous one went.
    pub fn shutdown(mut self) {
        self.state = LoopState::Stopping;

        self.actuators.shutdown();

        if let Some(mut display) = self.display.take() {
            if let Err(err) = display.clear() {
                warn!("display clear failed during shutdown: {err}");
            }
        }

        drop(self.sensor);
        debug!("sensor bus released");

        if let Some(mut transport) = self.transport.take() {
            if let Err(err) = transport.flush() {
                warn!("telemetry flush failed during shutdown: {err}");
            }
        }

        info!("thermostat stopped cleanly");
    }

    fn write_display(&mut self, frame: &Frame) {
        let Some(display) = self.display.as_mut() else {
            return;
        };

        match write_frame(display, frame) {
            Ok(()) if self.display_faulted => {
                info!("display writes recovered");
                self.display_faulted = false;
            }
            Ok(()) => {}
            Err(err) => {
                if !self.display_faulted {
                    warn!("display write failed: {err}");
                }
                self.display_faulted = true;
            }
        }
    }
}
