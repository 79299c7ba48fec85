pub mod actuator;
pub mod aht20;
pub mod config;
pub mod control;
pub mod display;
pub mod telemetry;
pub mod thermostat;
pub mod types;

pub use actuator::{ActuatorDriver, ChannelState, IntensityOutput, LedChannel};
pub use aht20::{Aht20, Measurement, SensorError, SensorReader};
pub use config::{HardwareConfig, RuntimeConfig, ThermostatConfig};
pub use control::{Clock, ControlLoop, LoopState, Peripherals, TickReport};
pub use display::{CharDisplay, DisplayError, DisplayMultiplexer, Frame};
pub use telemetry::{EmitOutcome, TelemetryEmitter, TransportError};
pub use thermostat::{derive_intents, EngineChange, ThermostatEngine};
pub use types::{ChannelIntent, InputEvent, OutputIntents, ThermostatMode};
