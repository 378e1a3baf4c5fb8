use clap::Parser;
use dew_point_bridge::config::{Config, DewPointConfig, load_dotenv};
use dew_point_bridge::host::{StateStore, setup_dew_point};
use dew_point_bridge::input::mqtt::MqttIntegration;
use dew_point_bridge::sensors::units::UnitSystem;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser)]
#[command(name = "dew-point-bridge")]
#[command(about = "Derive a dew point sensor from zigbee2mqtt temperature and humidity sources")]
struct Cli {
    /// JSON file with the dew point sensor section (name, temp_sensor, humidity_sensor)
    #[arg(long, env = "DEW_POINT_CONFIG")]
    config: Option<PathBuf>,

    /// Display name of the sensor
    #[arg(long, env = "DEW_POINT_NAME")]
    name: Option<String>,

    /// Temperature source entity, as <device>.<field>
    #[arg(long, env = "DEW_POINT_TEMPERATURE_SOURCE")]
    temperature_source: Option<String>,

    /// Humidity source entity, as <device>.<field>
    #[arg(long, env = "DEW_POINT_HUMIDITY_SOURCE")]
    humidity_source: Option<String>,

    /// Unit system of the host (metric or imperial)
    #[arg(long, env = "UNIT_SYSTEM")]
    unit_system: Option<UnitSystem>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn load_config(cli: Cli) -> dew_point_bridge::error::Result<Config> {
    let mut config = Config::from_env();

    if let Some(path) = &cli.config {
        config.dew_point = DewPointConfig::from_file(path)?;
    }
    if let Some(name) = cli.name {
        config.dew_point.name = name;
    }
    if let Some(source) = cli.temperature_source {
        config.dew_point.temperature_sensor = source;
    }
    if let Some(source) = cli.humidity_source {
        config.dew_point.humidity_sensor = source;
    }
    if let Some(unit_system) = cli.unit_system {
        config.unit_system = unit_system;
    }

    config.dew_point.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    load_dotenv();
    init_logger();
    info!("Starting Dew Point Bridge");

    let config = match load_config(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration loaded:");
    info!("  Sensor Name: {}", config.dew_point.name);
    info!("  Temperature Source: {}", config.dew_point.temperature_sensor);
    info!("  Humidity Source: {}", config.dew_point.humidity_sensor);
    info!(
        "  Unit System: {} (metric: {})",
        config.unit_system,
        config.unit_system.is_metric()
    );
    info!(
        "  MQTT Broker: {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );

    let store = Arc::new(StateStore::new());
    let platform = setup_dew_point(&store, &config.dew_point, config.unit_system);

    let mqtt_task = MqttIntegration::new(config.mqtt.clone(), store.clone())
        .with_source(&config.dew_point.temperature_sensor)
        .with_source(&config.dew_point.humidity_sensor)
        .with_publisher(config.dew_point.state_topic(), platform.updates)
        .start();

    info!("Dew Point Bridge is running");
    info!("  - {} ready as {}", config.dew_point.name, platform.entity_id);
    info!("  - Press Ctrl+C to exit");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    mqtt_task.abort();
    platform.listener.abort();

    info!("Known entities: {}", store.entity_ids().join(", "));

    info!(
        "Dew Point Bridge stopped (last value: {:?} °C)",
        platform.sensor.read().state()
    );
}
