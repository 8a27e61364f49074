pub mod channels;
pub mod config;
pub mod coordinator;
pub mod datalog_writer;
pub mod error;
pub mod influx;
pub mod lxp;
pub mod mqtt;
pub mod options;
pub mod prelude;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::influx::Influx;
use crate::lxp::inverter::Inverter;
use crate::mqtt::Mqtt;
use crate::prelude::*;

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Long-running parts of the bridge, kept together so they can be stopped
/// in order.
pub struct Components {
    pub coordinator: Coordinator,
    pub mqtt: Mqtt,
    pub influx: Influx,
    pub inverters: Vec<Inverter>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Components {
    /// Creates every component and spawns its task.
    pub fn start(config: ConfigWrapper, channels: Channels) -> Result<Self> {
        let datalog_writer = config.datalog_file().map(DatalogWriter::new).transpose()?;

        let coordinator = Coordinator::new(config.clone(), channels.clone(), datalog_writer);
        let mqtt = Mqtt::new(config.clone(), channels.clone(), coordinator.stats.clone());
        let influx = Influx::new(config.clone(), channels.clone(), coordinator.stats.clone());

        let mut handles = Vec::new();

        info!("  Creating Coordinator...");
        let c = coordinator.clone();
        handles.push(("coordinator", spawn("Coordinator", async move { c.start().await })));

        info!("  Creating MQTT client...");
        let m = mqtt.clone();
        handles.push(("mqtt", spawn("MQTT", async move { m.start().await })));

        info!("  Creating InfluxDB client...");
        let i = influx.clone();
        handles.push(("influx", spawn("InfluxDB", async move { i.start().await })));

        info!("  Creating Inverter instances...");
        let inverters: Vec<_> = config
            .enabled_inverters()
            .into_iter()
            .map(|inverter| Inverter::new(inverter, channels.clone()))
            .collect();
        for inverter in &inverters {
            let inverter = inverter.clone();
            handles.push(("inverter", spawn("Inverter", async move { inverter.start().await })));
        }

        Ok(Self {
            coordinator,
            mqtt,
            influx,
            inverters,
            handles,
        })
    }

    /// Stops the inverters first so no new frames arrive, then the
    /// coordinator (which prints the final statistics), then the sinks.
    pub async fn stop(self) -> Arc<Mutex<PacketStats>> {
        info!("Stopping all components...");

        if let Some(inverter) = self.inverters.first() {
            // one shutdown message reaches every inverter task
            inverter.stop();
        }
        self.coordinator.stop();
        self.influx.stop();
        self.mqtt.stop();

        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                error!("Error waiting for {} task: {}", name, e);
            }
        }

        info!("Shutdown complete");
        self.coordinator.stats
    }
}

fn spawn<F>(name: &'static str, future: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = future.await {
            error!("{} task failed: {}", name, e);
        }
    })
}

/// Runs the bridge until `shutdown_rx` fires. Returns the statistics
/// gathered while running.
pub async fn app(
    mut shutdown_rx: broadcast::Receiver<()>,
    config: ConfigWrapper,
) -> Result<Arc<Mutex<PacketStats>>> {
    info!("lxp-telemetry {} starting", CARGO_PKG_VERSION);

    let channels = Channels::new();

    info!("Initializing components...");
    let components = Components::start(config, channels)?;

    info!("Waiting for shutdown signal...");
    let _ = shutdown_rx.recv().await;

    info!("Shutdown signal received, stopping components...");
    Ok(components.stop().await)
}
