mod config;
mod device;
mod error;
mod mqtt;
mod telemetry;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::device::router::Router;
use crate::device::{SharedState, door_label, led_label};
use crate::mqtt::client::MqttClient;
use crate::telemetry::SensorSimulation;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting device {} (mqtt={}:{}, telemetry every {}s)",
        config.device.name,
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.device.telemetry_interval_secs,
    );

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to register SIGTERM handler: {}", e);
            std::process::exit(1);
        }
    };

    let state = SharedState::default();
    let router = Router::new(state.clone());

    let mqtt_client = match MqttClient::connect(&config).await {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let publisher = mqtt_client.handle();

    let (stop_tx, stop_rx) = oneshot::channel();
    let mqtt_handle = tokio::spawn(mqtt_client.run(router, stop_rx));

    info!("RPC methods: setDoorValue, setLEDValue, getDoorValue, getLEDValue, getValue");

    let mut simulation = SensorSimulation::from_config(&config.device);
    let mut ticker = tokio::time::interval(config.telemetry_interval());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    // Main loop: publish telemetry until a shutdown signal arrives.
    // Publishing never waits, so the signal arms are always polled.
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match simulation
                    .outbound()
                    .and_then(|msg| mqtt::client::try_publish(&publisher, &msg).map(|()| msg))
                {
                    Ok(msg) => info!("Published telemetry: {}", msg.payload),
                    Err(e) => warn!("{}", e),
                }
                simulation.advance_now();
            }
            _ = &mut ctrl_c => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    // Stop the event loop first; it closes the connection on its way out
    let _ = stop_tx.send(());
    if let Err(e) = mqtt_handle.await {
        error!("MQTT task failed: {}", e);
    }

    let last = state.snapshot();
    info!(
        "Device stopped (door={}, led={})",
        door_label(last.door),
        led_label(last.led)
    );
}
