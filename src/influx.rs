use crate::prelude::*;

use rinfluxdb::line_protocol::{r#async::Client, Line, LineBuilder};
use std::sync::{Arc, Mutex};

#[derive(PartialEq, Clone, Debug)]
pub enum ChannelData {
    Record(Arc<Record>),
    Shutdown,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum FieldValue {
    Float(f64),
    /// fields kept as raw integers (codes, counters) stay integers
    Integer(i64),
}

/// One time-series point, before it is turned into line protocol.
#[derive(PartialEq, Clone, Debug)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(&'static str, String)>,
    pub fields: Vec<(String, FieldValue)>,
}

impl Point {
    pub fn for_record(config: &config::Influx, record: &Record) -> Self {
        Self {
            measurement: config.measurement().to_owned(),
            tags: vec![
                ("serial_number", record.serial_number.clone()),
                ("datalog", record.datalog.clone()),
            ],
            fields: point_fields(record),
        }
    }

    pub fn line(&self) -> Line {
        let mut line = LineBuilder::new(self.measurement.as_str());

        for (name, value) in &self.tags {
            line = line.insert_tag(*name, value.as_str());
        }

        for (name, value) in &self.fields {
            line = match *value {
                FieldValue::Float(v) => line.insert_field(name.as_str(), v),
                FieldValue::Integer(v) => line.insert_field(name.as_str(), v),
            };
        }

        line.build()
    }
}

/// Numeric fields written for a record: every reading of the loaded
/// sections, with word arrays expanded to one field per element.
pub fn point_fields(record: &Record) -> Vec<(String, FieldValue)> {
    record
        .sink_fields()
        .into_iter()
        .filter_map(|(name, value)| {
            let value = match value.as_i64() {
                Some(v) => FieldValue::Integer(v),
                None => FieldValue::Float(value.as_f64()?),
            };
            Some((name, value))
        })
        .collect()
}

#[derive(Clone)]
pub struct Influx {
    config: ConfigWrapper,
    channels: Channels,
    shared_stats: Arc<Mutex<PacketStats>>,
}

impl Influx {
    pub fn new(
        config: ConfigWrapper,
        channels: Channels,
        shared_stats: Arc<Mutex<PacketStats>>,
    ) -> Self {
        Self {
            config,
            channels,
            shared_stats,
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.influx().enabled() {
            info!("influx disabled, skipping");
            return Ok(());
        }

        info!("initializing influx at {}", self.config.influx().url());

        let client = {
            let config = self.config.influx();
            let url = reqwest::Url::parse(config.url())?;
            let credentials = match (config.username(), config.password()) {
                (Some(u), Some(p)) => Some((u, p)),
                _ => None,
            };

            Client::new(url, credentials)?
        };

        self.sender(client).await
    }

    pub fn stop(&self) {
        let _ = self.channels.to_influx.send(ChannelData::Shutdown);
    }

    fn line(&self, record: &Record) -> Line {
        Point::for_record(self.config.influx(), record).line()
    }

    async fn sender(&self, client: Client) -> Result<()> {
        use broadcast::error::RecvError;

        let mut receiver = self.channels.to_influx.subscribe();
        info!("InfluxDB sender started");

        loop {
            match receiver.recv().await {
                Ok(ChannelData::Shutdown) | Err(RecvError::Closed) => {
                    info!("InfluxDB sender received shutdown signal");
                    break;
                }
                Ok(ChannelData::Record(record)) => {
                    let points = vec![self.line(&record)];
                    trace!("Sending to InfluxDB: {:?}", points);

                    let mut sent = false;
                    for attempt in 1..=3 {
                        match client.send(self.config.influx().database(), &points).await {
                            Ok(_) => {
                                sent = true;
                                break;
                            }
                            Err(err) => {
                                error!(
                                    "InfluxDB push failed: {:?} - retrying in 10s (attempt {}/3)",
                                    err, attempt
                                );
                                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                            }
                        }
                    }

                    if let Ok(mut stats) = self.shared_stats.lock() {
                        if sent {
                            stats.influx_writes += 1;
                        } else {
                            error!("Failed to send record for {} to InfluxDB after 3 attempts", record.serial_number);
                            stats.influx_errors += 1;
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("influx sender lagging, {} records dropped", n);
                    if let Ok(mut stats) = self.shared_stats.lock() {
                        stats.influx_errors += n;
                    }
                }
            }
        }

        info!("InfluxDB sender loop exiting");

        Ok(())
    }
}
