mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use domain::settings::SettingsService;
use infrastructure::peripheral::queue::PeripheralQueue;
use infrastructure::peripheral::simulated::SimulatedDriver;
use infrastructure::peripheral::PeripheralService;
use tokio::sync::mpsc;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();

    let _logging_guard = infrastructure::logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting Fake Peripheral");
    info!("Settings loaded from {}", settings_service.path().display());

    let (queue, receiver) = PeripheralQueue::new();
    let (driver, radio) = SimulatedDriver::new(queue.clone());
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let service = PeripheralService::new(Box::new(driver), queue, receiver, event_tx, &settings);
    let handle = service.handle();

    // The peripheral runs on its own sequential queue, like a radio stack's callback queue
    let peripheral_thread = std::thread::Builder::new()
        .name("peripheral".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create tokio runtime for the peripheral: {}", e);
                    return;
                }
            };
            rt.block_on(service.run());
        })
        .context("Failed to spawn peripheral thread")?;

    radio.set_power(settings.peripheral.initial_radio_state);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime for the console")?;
    let result = rt.block_on(presentation::console::run(handle.clone(), radio, event_rx));

    if result.is_err() {
        let _ = handle.shutdown();
    }
    if peripheral_thread.join().is_err() {
        error!("Peripheral thread panicked");
    }

    info!("Fake Peripheral stopped");
    result
}
