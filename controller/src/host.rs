use std::{
    fs::{File, OpenOptions},
    future::Future,
    io::{BufRead, ErrorKind},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use anyhow::{anyhow, Context};
use chrono::{Local, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use thermostat_common::{
    Aht20, Clock, ControlLoop, InputEvent, Peripherals, RuntimeConfig, TransportError,
};

use crate::sim::{LoggedLed, SimulatedAht20, StdDelay, TerminalDisplay};

const CONFIG_PATH_ENV: &str = "THERMOSTAT_CONFIG";
const SERIAL_PORT_ENV: &str = "THERMOSTAT_SERIAL_PORT";
const DISPLAY_ENV: &str = "THERMOSTAT_DISPLAY";

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut runtime = load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });
    apply_env_overrides(
        &mut runtime,
        std::env::var(SERIAL_PORT_ENV).ok(),
        std::env::var(DISPLAY_ENV).ok(),
    );
    runtime.sanitize();
    debug!("runtime config: {runtime:?}");

    let (events_tx, events_rx) = mpsc::channel();
    spawn_input_reader(events_tx)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let loop_shutdown = Arc::clone(&shutdown);
    let control = thread::Builder::new()
        .name("control-loop".to_string())
        .spawn(move || {
            let clock = HostClock::new(runtime.timezone.as_deref());
            let control = build_control_loop(&runtime, events_rx);
            control.run(&clock, &loop_shutdown);
        })
        .context("failed to spawn control loop thread")?;

    info!("thermostat running; m = mode, u/d = setpoint, ctrl-c to stop");
    supervise(tokio::signal::ctrl_c(), &shutdown, control).await
}

/// Waits for `signal` or for the control loop to end on its own. The loop
/// is always stopped and joined before returning, so its cleanup runs even
/// when the signal listener fails.
async fn supervise<F>(
    signal: F,
    shutdown: &AtomicBool,
    control: JoinHandle<()>,
) -> anyhow::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let mut joined = tokio::task::spawn_blocking(move || control.join());

    let signal = tokio::select! {
        signal = signal => signal,
        finished = &mut joined => {
            finished
                .context("failed to join control loop")?
                .map_err(|_| anyhow!("control loop panicked"))?;
            warn!("control loop exited without a shutdown request");
            return Ok(());
        }
    };

    match &signal {
        Ok(()) => info!("shutdown requested"),
        Err(err) => warn!("failed to listen for ctrl-c ({err}); stopping"),
    }
    shutdown.store(true, Ordering::SeqCst);

    joined
        .await
        .context("failed to join control loop")?
        .map_err(|_| anyhow!("control loop panicked"))?;
    signal.context("failed to listen for ctrl-c")
}

fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.thermostat/runtime.json"))
}

async fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let path = config_path();
    match tokio::fs::read(&path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("invalid config at {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err.into()),
    }
}

/// An empty value disables the subsystem.
fn apply_env_overrides(
    runtime: &mut RuntimeConfig,
    serial_port: Option<String>,
    display: Option<String>,
) {
    if let Some(port) = serial_port {
        runtime.hardware.serial_port = Some(port);
    }
    if let Some(device) = display {
        runtime.hardware.display_device = Some(device);
    }
}

type HostLoop = ControlLoop<Aht20<SimulatedAht20, StdDelay>, LoggedLed, TerminalDisplay<File>, File>;

fn build_control_loop(runtime: &RuntimeConfig, events: mpsc::Receiver<InputEvent>) -> HostLoop {
    let hardware = &runtime.hardware;

    let mut sensor = Aht20::new(
        SimulatedAht20::new(),
        StdDelay,
        hardware.sensor_address,
        runtime.thermostat.sensor_settle_ms,
    );
    sensor.init();

    let display = hardware
        .display_device
        .as_deref()
        .and_then(|path| match TerminalDisplay::open(path) {
            Ok(display) => Some(display),
            Err(err) => {
                warn!("{err}; continuing without display");
                None
            }
        });

    let transport = hardware
        .serial_port
        .as_deref()
        .and_then(|path| match open_transport(path) {
            Ok(port) => Some(port),
            Err(err) => {
                warn!("{err}; continuing without telemetry");
                None
            }
        });

    ControlLoop::new(
        &runtime.thermostat,
        hardware.display_cols,
        Peripherals {
            sensor,
            heat_led: LoggedLed::new("heat"),
            cool_led: LoggedLed::new("cool"),
            display,
            transport,
        },
        events,
    )
}

fn open_transport(path: &str) -> Result<File, TransportError> {
    let port = OpenOptions::new()
        .write(true)
        .append(true)
        .open(path)
        .map_err(|err| TransportError::Unavailable(format!("{path}: {err}")))?;
    debug!("telemetry transport attached to {path}");
    Ok(port)
}

/// Stands in for the panel buttons: one command per stdin line.
fn spawn_input_reader(events: Sender<InputEvent>) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("input-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match InputEvent::parse(line) {
                    Some(event) => {
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    None => warn!("unknown input {line:?}; use m, u or d"),
                }
            }
            debug!("input reader stopped");
        })
        .context("failed to spawn input reader thread")?;
    Ok(())
}

struct HostClock {
    started: Instant,
    timezone: Option<Tz>,
}

impl HostClock {
    fn new(timezone: Option<&str>) -> Self {
        let timezone = timezone.and_then(|name| match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                warn!("unknown timezone {name:?}; using local time");
                None
            }
        });
        Self {
            started: Instant::now(),
            timezone,
        }
    }
}

impl Clock for HostClock {
    fn now_ms(&self) -> u64 {
        self.started
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    fn wall_clock(&self) -> NaiveDateTime {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_can_disable_subsystems() {
        let mut runtime = RuntimeConfig::default();
        apply_env_overrides(&mut runtime, Some(String::new()), Some("/dev/tty2".to_string()));
        runtime.sanitize();

        assert_eq!(runtime.hardware.serial_port, None);
        assert_eq!(runtime.hardware.display_device.as_deref(), Some("/dev/tty2"));
    }

    #[test]
    fn unset_env_keeps_config_values() {
        let mut runtime = RuntimeConfig::default();
        runtime.hardware.serial_port = Some("/tmp/uart".to_string());
        apply_env_overrides(&mut runtime, None, None);

        assert_eq!(runtime.hardware.serial_port.as_deref(), Some("/tmp/uart"));
        assert_eq!(runtime.hardware.display_device.as_deref(), Some("/dev/tty"));
    }

    #[test]
    fn unknown_timezone_falls_back_to_local() {
        let clock = HostClock::new(Some("Mars/Olympus_Mons"));
        assert!(clock.timezone.is_none());

        let clock = HostClock::new(Some("America/Denver"));
        assert_eq!(clock.timezone, Some(chrono_tz::America::Denver));
    }

    fn stoppable_loop(shutdown: Arc<AtomicBool>, cleaned_up: Arc<AtomicBool>) -> JoinHandle<()> {
        thread::spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                thread::sleep(std::time::Duration::from_millis(1));
            }
            cleaned_up.store(true, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn signal_stops_and_joins_the_loop() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let cleaned_up = Arc::new(AtomicBool::new(false));
        let control = stoppable_loop(Arc::clone(&shutdown), Arc::clone(&cleaned_up));

        supervise(async { Ok(()) }, &shutdown, control).await.unwrap();
        assert!(shutdown.load(Ordering::SeqCst));
        assert!(cleaned_up.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_signal_listener_still_cleans_up() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let cleaned_up = Arc::new(AtomicBool::new(false));
        let control = stoppable_loop(Arc::clone(&shutdown), Arc::clone(&cleaned_up));

        let result = supervise(
            async { Err(std::io::Error::other("no signal support")) },
            &shutdown,
            control,
        )
        .await;

        assert!(result.is_err());
        assert!(shutdown.load(Ordering::SeqCst));
        assert!(cleaned_up.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panicked_loop_ends_the_wait() {
        let shutdown = AtomicBool::new(false);
        let control = thread::spawn(|| panic!("sensor bus exploded"));

        let err = supervise(std::future::pending(), &shutdown, control)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "control loop panicked");
    }

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let clock = HostClock::new(None);
        let first = clock.now_ms();
        let second = clock.now_ms();
        assert!(second >= first);
    }
}
