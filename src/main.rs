mod api;
mod config;
mod coordinator;
mod history;
mod sensor;

use std::path::{Path, PathBuf};
use std::thread;

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt;

use api::FliprClient;
use config::ConfigEntry;
use coordinator::{FliprCoordinator, SCAN_INTERVAL};
use history::HistoryRecorder;
use sensor::{FliprSensor, setup_sensors};

const DEFAULT_CONFIG_PATH: &str = "flipr.json";
const LOG_DIR: &str = "logs";

/// Everything set up for one configured Flipr device.
struct Device {
    flipr_id: String,
    coordinator: FliprCoordinator,
    sensors: Vec<FliprSensor>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = setup_logging();
    info!("Starting flipr-monitor");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let entry = ConfigEntry::load(&config_path)?;

    let devices = setup_entry(&entry)?;
    info!("Setup complete, polling every {:?}", SCAN_INTERVAL);

    // Coordinators refresh in the background; report the sensor states
    // once per interval.
    loop {
        report_states(&devices);
        thread::sleep(SCAN_INTERVAL);
    }
}

/// Create a client, coordinator and sensor set for every configured id.
fn setup_entry(entry: &ConfigEntry) -> Result<Vec<Device>, Box<dyn std::error::Error>> {
    let flipr_ids = entry.flipr_ids();
    info!("Setting up {} Flipr device(s): {:?}", flipr_ids.len(), flipr_ids);

    let mut devices = Vec::new();
    for flipr_id in flipr_ids {
        let mut client = FliprClient::new(&entry.email, &entry.password)?;
        client.sign_in()?;

        // The account listing is advisory; a stray id still fails fast at
        // the first refresh below.
        match client.search_flipr_ids() {
            Ok(known) if !known.contains(&flipr_id) => {
                warn!("Flipr {} is not listed on this account ({:?})", flipr_id, known);
            }
            Ok(_) => {}
            Err(e) => warn!("Could not list account modules: {}", e),
        }

        let recorder = HistoryRecorder::create(Path::new(LOG_DIR), &flipr_id)?;
        let source = {
            let id = flipr_id.clone();
            move || client.get_pool_measure_latest(&id)
        };

        let mut coordinator = FliprCoordinator::new(&flipr_id, source).with_recorder(recorder);
        coordinator.first_refresh()?;
        coordinator.start();

        let sensors = setup_sensors(&coordinator.handle(), &flipr_id);
        if let Some(first) = sensors.first() {
            info!("Device: {:?} ({})", first.device_info(), first.attribution());
        }
        for sensor in &sensors {
            info!(
                "Registered sensor {} as '{}' (key {}, icon {}, device class {:?})",
                sensor.unique_id(),
                sensor.name(),
                sensor.kind().key(),
                sensor.icon(),
                sensor.device_class(),
            );
        }

        devices.push(Device {
            flipr_id,
            coordinator,
            sensors,
        });
    }

    Ok(devices)
}

fn report_states(devices: &[Device]) {
    for device in devices {
        if !device.coordinator.handle().last_update_success() {
            warn!("Flipr {}: last poll failed, values may be stale", device.flipr_id);
        }

        for sensor in &device.sensors {
            match sensor.state() {
                Some(state) => {
                    let unit = sensor.unit_of_measurement().unwrap_or("");
                    info!("{}: {} {}", sensor.name(), state, unit);
                    println!("{}: {} {}", sensor.name(), state, unit);
                }
                None => warn!("{}: unavailable", sensor.name()),
            }
        }
    }
}

fn setup_logging() -> WorkerGuard {
    // File-based logging with daily rotation; the guard keeps the writer
    // alive for the lifetime of the process.
    let file_appender = rolling::daily(LOG_DIR, "flipr-monitor.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_level(true)
        .init();

    guard
}
