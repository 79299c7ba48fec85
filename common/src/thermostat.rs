use crate::types::{ChannelIntent, InputEvent, OutputIntents, ThermostatMode};

/// Threshold comparison for the heat/cool indicators.
///
/// A temperature equal to the setpoint counts as satisfied in both
/// directions, so the active channel goes solid rather than fading.
pub fn derive_intents(mode: ThermostatMode, setpoint_f: i32, temp_f: f64) -> OutputIntents {
    let setpoint = f64::from(setpoint_f);
    match mode {
        ThermostatMode::Off => OutputIntents::ALL_OFF,
        ThermostatMode::Heat => {
            let heat = if temp_f < setpoint {
                ChannelIntent::Fade
            } else {
                ChannelIntent::SolidOn
            };
            OutputIntents::new(heat, ChannelIntent::Off)
        }
        ThermostatMode::Cool => {
            let cool = if temp_f > setpoint {
                ChannelIntent::Fade
            } else {
                ChannelIntent::SolidOn
            };
            OutputIntents::new(ChannelIntent::Off, cool)
        }
    }
}

/// Solid on/off per mode, used right after a mode change before a fresh
/// sample exists.
pub fn mode_feedback(mode: ThermostatMode) -> OutputIntents {
    match mode {
        ThermostatMode::Off => OutputIntents::ALL_OFF,
        ThermostatMode::Heat => OutputIntents::new(ChannelIntent::SolidOn, ChannelIntent::Off),
        ThermostatMode::Cool => OutputIntents::new(ChannelIntent::Off, ChannelIntent::SolidOn),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineChange {
    Mode(ThermostatMode),
    Setpoint(i32),
}

#[derive(Debug, Clone)]
pub struct ThermostatEngine {
    mode: ThermostatMode,
    setpoint_f: i32,
}

impl ThermostatEngine {
    pub fn new(default_setpoint_f: i32) -> Self {
        Self {
            mode: ThermostatMode::Off,
            setpoint_f: default_setpoint_f,
        }
    }

    pub fn mode(&self) -> ThermostatMode {
        self.mode
    }

    pub fn setpoint_f(&self) -> i32 {
        self.setpoint_f
    }

    pub fn cycle_mode(&mut self) -> ThermostatMode {
        self.mode = self.mode.next();
        self.mode
    }

    // Setpoint is deliberately unbounded; wrapping only guards the i32 edge.
    pub fn setpoint_up(&mut self) -> i32 {
        self.setpoint_f = self.setpoint_f.wrapping_add(1);
        self.setpoint_f
    }

    pub fn setpoint_down(&mut self) -> i32 {
        self.setpoint_f = self.setpoint_f.wrapping_sub(1);
        self.setpoint_f
    }

    pub fn handle_event(&mut self, event: InputEvent) -> EngineChange {
        match event {
            InputEvent::ModeCycle => EngineChange::Mode(self.cycle_mode()),
            InputEvent::SetpointUp => EngineChange::Setpoint(self.setpoint_up()),
            InputEvent::SetpointDown => EngineChange::Setpoint(self.setpoint_down()),
        }
    }

    pub fn intents(&self, temp_f: f64) -> OutputIntents {
        derive_intents(self.mode, self.setpoint_f, temp_f)
    }

    pub fn mode_feedback(&self) -> OutputIntents {
        mode_feedback(self.mode)
    }
}
