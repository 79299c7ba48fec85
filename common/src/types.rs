use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermostatMode {
    #[default]
    Off,
    Heat,
    Cool,
}

impl ThermostatMode {
    pub const ORDER: [ThermostatMode; 3] = [Self::Off, Self::Heat, Self::Cool];

    /// Wire name used by telemetry.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::Heat,
            Self::Heat => Self::Cool,
            Self::Cool => Self::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelIntent {
    Off,
    SolidOn,
    Fade,
}

/// Requested drive for the heat (red) and cool (blue) indicator channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputIntents {
    pub heat: ChannelIntent,
    pub cool: ChannelIntent,
}

impl OutputIntents {
    pub const ALL_OFF: OutputIntents = OutputIntents {
        heat: ChannelIntent::Off,
        cool: ChannelIntent::Off,
    };

    pub fn new(heat: ChannelIntent, cool: ChannelIntent) -> Self {
        Self { heat, cool }
    }
}

/// Already-debounced button presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    ModeCycle,
    SetpointUp,
    SetpointDown,
}

impl InputEvent {
    pub fn parse(command: &str) -> Option<Self> {
        match command.trim().to_ascii_lowercase().as_str() {
            "m" | "mode" => Some(Self::ModeCycle),
            "u" | "up" | "+" => Some(Self::SetpointUp),
            "d" | "down" | "-" => Some(Self::SetpointDown),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_cycle_is_a_three_step_permutation() {
        for mode in ThermostatMode::ORDER {
            assert_eq!(mode.next().next().next(), mode);
            assert_ne!(mode.next(), mode);
        }
        assert_eq!(ThermostatMode::Off.next(), ThermostatMode::Heat);
        assert_eq!(ThermostatMode::Heat.next(), ThermostatMode::Cool);
        assert_eq!(ThermostatMode::Cool.next(), ThermostatMode::Off);
    }

    #[test]
    fn parses_input_commands() {
        assert_eq!(InputEvent::parse("m"), Some(InputEvent::ModeCycle));
        assert_eq!(InputEvent::parse(" MODE \n"), Some(InputEvent::ModeCycle));
        assert_eq!(InputEvent::parse("+"), Some(InputEvent::SetpointUp));
        assert_eq!(InputEvent::parse("down"), Some(InputEvent::SetpointDown));
        assert_eq!(InputEvent::parse("reboot"), None);
    }
}
