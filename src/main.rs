use anyhow::Result;
use haptic_glove_bridge_lib::{
    config::{self, AppConfig},
    core::GloveEvent,
    logging,
    state::AppState,
};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let config_dir = config::config_dir()?;
    let app_config = match AppConfig::load(&config_dir).await {
        Ok(app_config) => app_config,
        Err(e) => {
            eprintln!("Failed to load config, using defaults: {}", e);
            AppConfig::default()
        }
    };
    // The bridge logger prints to stderr itself; the stream is for a UI.
    let _log_stream = logging::init(&app_config.glove.log_level);

    let state = AppState::new(app_config, config::data_dir()?).await?;

    let mut events = state.events.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                GloveEvent::ConnectionStateChanged(connection_state) => info!("[{}] {}", event.name(), connection_state),
                GloveEvent::DeviceDiscovered(device) => {
                    info!("[{}] {} ({} dBm)", event.name(), device.name, device.signal_strength)
                }
                GloveEvent::VibrationStateChanged(on) => info!("[{}] {}", event.name(), on),
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    if let Some(last) = state.last_device().await {
        info!("Last connected glove: {} ({})", last.name, last.id);
    }

    let mut devices = state.scan(cancel.clone()).await;
    if devices.is_empty() {
        warn!("No glove found.");
        printer.abort();
        return Ok(());
    }

    let glove = &mut devices[0];
    if !state.connection.connect(glove, cancel.clone()).await {
        error!("Could not connect to {}", glove.name);
        printer.abort();
        return Ok(());
    }

    if state.vibration.test_connection().await {
        info!("Test pulse delivered to {}", glove.name);
    } else {
        warn!("Test pulse failed");
    }

    match state.vibration.battery_level().await {
        Some(level) => info!("Battery: {}%", level),
        None => warn!("Battery level unavailable"),
    }

    state.shutdown().await;
    printer.abort();
    Ok(())
}
