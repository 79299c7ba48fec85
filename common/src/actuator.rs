use tracing::debug;

use crate::{
    thermostat::mode_feedback,
    types::{ChannelIntent, OutputIntents, ThermostatMode},
};

/// A dimmable output such as a PWM-driven LED. Levels are `0.0..=1.0`.
pub trait IntensityOutput {
    fn set_level(&mut self, level: f32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Off,
    SolidOn,
    Fading { started_ms: u64 },
}

impl ChannelState {
    pub fn intent(self) -> ChannelIntent {
        match self {
            Self::Off => ChannelIntent::Off,
            Self::SolidOn => ChannelIntent::SolidOn,
            Self::Fading { .. } => ChannelIntent::Fade,
        }
    }
}

/// Symmetric triangle ramp: dark at `elapsed = 0`, full at `fade_time_ms`,
/// dark again at `2 * fade_time_ms`, repeating.
pub fn fade_level(elapsed_ms: u64, fade_time_ms: u64) -> f32 {
    if fade_time_ms == 0 {
        return 1.0;
    }
    let period = fade_time_ms.saturating_mul(2);
    let phase = elapsed_ms % period;
    let ramp = if phase <= fade_time_ms {
        phase
    } else {
        period - phase
    };
    (ramp as f32 / fade_time_ms as f32).clamp(0.0, 1.0)
}

pub struct LedChannel<O> {
    name: &'static str,
    output: O,
    state: ChannelState,
    fade_time_ms: u64,
}

impl<O: IntensityOutput> LedChannel<O> {
    pub fn new(name: &'static str, mut output: O, fade_time_ms: u64) -> Self {
        output.set_level(0.0);
        Self {
            name,
            output,
            state: ChannelState::Off,
            fade_time_ms,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Drives the channel to `intent`. Re-applying the intent already in
    /// effect changes nothing, so a running fade keeps its phase. Any other
    /// transition stops the fade before the new state is set.
    pub fn reconcile(&mut self, intent: ChannelIntent, now_ms: u64) {
        if self.state.intent() == intent {
            return;
        }

        self.stop_fade();
        self.state = match intent {
            ChannelIntent::Off => {
                self.output.set_level(0.0);
                ChannelState::Off
            }
            ChannelIntent::SolidOn => {
                self.output.set_level(1.0);
                ChannelState::SolidOn
            }
            ChannelIntent::Fade => {
                self.output.set_level(0.0);
                ChannelState::Fading { started_ms: now_ms }
            }
        };
        debug!("{} channel -> {:?}", self.name, intent);
    }

    /// Safe to call when no fade is running.
    pub fn stop_fade(&mut self) {
        if let ChannelState::Fading { .. } = self.state {
            self.output.set_level(0.0);
            self.state = ChannelState::Off;
        }
    }

    pub fn refresh(&mut self, now_ms: u64) {
        if let ChannelState::Fading { started_ms } = self.state {
            let level = fade_level(now_ms.saturating_sub(started_ms), self.fade_time_ms);
            self.output.set_level(level);
        }
    }

    pub fn force_off(&mut self) {
        self.stop_fade();
        self.output.set_level(0.0);
        self.state = ChannelState::Off;
    }
}

pub struct ActuatorDriver<O> {
    heat: LedChannel<O>,
    cool: LedChannel<O>,
}

impl<O: IntensityOutput> ActuatorDriver<O> {
    pub fn new(heat: O, cool: O, fade_time_ms: u64) -> Self {
        Self {
            heat: LedChannel::new("heat", heat, fade_time_ms),
            cool: LedChannel::new("cool", cool, fade_time_ms),
        }
    }

    pub fn heat(&self) -> &LedChannel<O> {
        &self.heat
    }

    pub fn cool(&self) -> &LedChannel<O> {
        &self.cool
    }

    pub fn intents(&self) -> OutputIntents {
        OutputIntents::new(self.heat.state().intent(), self.cool.state().intent())
    }

    pub fn apply(&mut self, intents: OutputIntents, now_ms: u64) {
        // Release first so the two channels are never active together.
        if intents.heat == ChannelIntent::Off {
            self.heat.reconcile(ChannelIntent::Off, now_ms);
        }
        if intents.cool == ChannelIntent::Off {
            self.cool.reconcile(ChannelIntent::Off, now_ms);
        }
        self.heat.reconcile(intents.heat, now_ms);
        self.cool.reconcile(intents.cool, now_ms);
    }

    /// Reduced path for a mode change with no fresh sample: solid/off by
    /// mode alone. The next full tick decides between fade and solid.
    pub fn apply_mode_feedback(&mut self, mode: ThermostatMode, now_ms: u64) {
        self.apply(mode_feedback(mode), now_ms);
    }

    pub fn refresh(&mut self, now_ms: u64) {
        self.heat.refresh(now_ms);
        self.cool.refresh(now_ms);
    }

    pub fn shutdown(&mut self) {
        self.heat.force_off();
        self.cool.force_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ChannelIntent::{Fade, Off, SolidOn};

    #[derive(Default)]
    struct RecordingOutput {
        levels: Vec<f32>,
    }

    impl RecordingOutput {
        fn level(&self) -> f32 {
            self.levels.last().copied().unwrap_or(f32::NAN)
        }
    }

    impl IntensityOutput for RecordingOutput {
        fn set_level(&mut self, level: f32) {
            self.levels.push(level);
        }
    }

    fn driver() -> ActuatorDriver<RecordingOutput> {
        ActuatorDriver::new(RecordingOutput::default(), RecordingOutput::default(), 1_000)
    }

    #[test]
    fn fade_ramps_up_then_down() {
        assert_eq!(fade_level(0, 1_000), 0.0);
        assert_eq!(fade_level(500, 1_000), 0.5);
        assert_eq!(fade_level(1_000, 1_000), 1.0);
        assert_eq!(fade_level(1_500, 1_000), 0.5);
        assert_eq!(fade_level(2_000, 1_000), 0.0);
        assert_eq!(fade_level(2_250, 1_000), 0.25);
        assert_eq!(fade_level(123, 0), 1.0);
    }

    #[test]
    fn starts_dark() {
        let driver = driver();
        assert_eq!(driver.intents(), OutputIntents::ALL_OFF);
        assert_eq!(driver.heat().output().level(), 0.0);
        assert_eq!(driver.cool().output().level(), 0.0);
    }

    #[test]
    fn solid_and_off_set_full_and_zero() {
        let mut driver = driver();
        driver.apply(OutputIntents::new(SolidOn, Off), 0);
        assert_eq!(driver.heat().output().level(), 1.0);
        assert_eq!(driver.cool().output().level(), 0.0);

        driver.apply(OutputIntents::new(Off, SolidOn), 10);
        assert_eq!(driver.heat().output().level(), 0.0);
        assert_eq!(driver.cool().output().level(), 1.0);
    }

    #[test]
    fn fade_advances_on_refresh() {
        let mut driver = driver();
        driver.apply(OutputIntents::new(Fade, Off), 1_000);
        assert_eq!(
            driver.heat().state(),
            ChannelState::Fading { started_ms: 1_000 }
        );

        driver.refresh(1_250);
        assert_eq!(driver.heat().output().level(), 0.25);
        driver.refresh(2_000);
        assert_eq!(driver.heat().output().level(), 1.0);
        assert_eq!(driver.cool().output().level(), 0.0);
    }

    #[test]
    fn reapplying_same_fade_keeps_phase() {
        let mut driver = driver();
        driver.apply(OutputIntents::new(Off, Fade), 100);
        driver.apply(OutputIntents::new(Off, Fade), 600);
        assert_eq!(
            driver.cool().state(),
            ChannelState::Fading { started_ms: 100 }
        );
    }

    #[test]
    fn leaving_fade_cancels_it() {
        let mut driver = driver();
        driver.apply(OutputIntents::new(Fade, Off), 0);
        driver.apply(OutputIntents::new(SolidOn, Off), 300);
        assert_eq!(driver.heat().state(), ChannelState::SolidOn);

        driver.refresh(800);
        assert_eq!(driver.heat().output().level(), 1.0);
    }

    #[test]
    fn stop_fade_is_idempotent() {
        let mut driver = driver();
        driver.apply(OutputIntents::new(SolidOn, Off), 0);
        driver.heat.stop_fade();
        driver.heat.stop_fade();
        assert_eq!(driver.heat().state(), ChannelState::SolidOn);
        assert_eq!(driver.heat().output().level(), 1.0);
    }

    #[test]
    fn mode_feedback_ignores_temperature() {
        let mut driver = driver();
        driver.apply(OutputIntents::new(Fade, Off), 0);

        driver.apply_mode_feedback(ThermostatMode::Cool, 50);
        assert_eq!(driver.intents(), OutputIntents::new(Off, SolidOn));

        driver.apply_mode_feedback(ThermostatMode::Heat, 60);
        assert_eq!(driver.intents(), OutputIntents::new(SolidOn, Off));

        driver.apply_mode_feedback(ThermostatMode::Off, 70);
        assert_eq!(driver.intents(), OutputIntents::ALL_OFF);
    }

    #[test]
    fn channel_switch_releases_before_engaging() {
        let mut driver = driver();
        driver.apply(OutputIntents::new(SolidOn, Off), 0);
        driver.apply(OutputIntents::new(Off, Fade), 10);

        // Heat dropped to zero before cool began fading.
        assert_eq!(driver.heat().output().levels, vec![0.0, 1.0, 0.0]);
        assert_eq!(driver.cool().output().levels, vec![0.0, 0.0]);
    }

    #[test]
    fn shutdown_forces_everything_dark() {
        let mut driver = driver();
        driver.apply(OutputIntents::new(Off, Fade), 0);
        driver.refresh(700);
        driver.shutdown();

        assert_eq!(driver.intents(), OutputIntents::ALL_OFF);
        assert_eq!(driver.heat().output().level(), 0.0);
        assert_eq!(driver.cool().output().level(), 0.0);
    }
}
