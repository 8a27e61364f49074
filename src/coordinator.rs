use crate::prelude::*;

use lxp::packet::checksum_valid;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default, Debug)]
pub struct PacketStats {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub records_decoded: u64,
    pub unhandled_frames: u64,
    pub checksum_failures: u64,
    // rejected frames by DecodeError::kind
    pub rejected_frames: HashMap<&'static str, u64>,
    pub sections_loaded: HashMap<SectionId, u64>,
    // sinks
    pub mqtt_messages_sent: u64,
    pub mqtt_errors: u64,
    pub influx_writes: u64,
    pub influx_errors: u64,
    pub datalog_writes: u64,
    pub datalog_errors: u64,
    // connection stats
    pub inverter_disconnections: HashMap<String, u64>,
}

impl PacketStats {
    pub fn rejected(&self, kind: &str) -> u64 {
        self.rejected_frames.get(kind).copied().unwrap_or(0)
    }

    pub fn loaded(&self, id: SectionId) -> u64 {
        self.sections_loaded.get(&id).copied().unwrap_or(0)
    }

    pub fn print_summary(&self) {
        info!("Packet Statistics:");
        info!("  Frames received: {}", self.frames_received);
        info!("  Frames dropped (decoder lagging): {}", self.frames_dropped);
        info!("  Records decoded: {}", self.records_decoded);
        for id in SectionId::ALL {
            info!("    {} loaded: {}", id, self.loaded(id));
        }
        info!("  Unhandled frames: {}", self.unhandled_frames);
        info!("  Checksum failures: {}", self.checksum_failures);
        info!("  Rejected frames:");
        for (kind, count) in &self.rejected_frames {
            info!("    {}: {}", kind, count);
        }
        info!("  MQTT:");
        info!("    Messages sent: {}", self.mqtt_messages_sent);
        info!("    Errors: {}", self.mqtt_errors);
        info!("  InfluxDB:");
        info!("    Writes: {}", self.influx_writes);
        info!("    Errors: {}", self.influx_errors);
        info!("  Datalog file:");
        info!("    Writes: {}", self.datalog_writes);
        info!("    Errors: {}", self.datalog_errors);
        info!("  Inverter disconnections:");
        for (address, count) in &self.inverter_disconnections {
            info!("    {}: {}", address, count);
        }
    }
}

/// Decodes frames from the inverters and fans records out to the sinks.
#[derive(Clone)]
pub struct Coordinator {
    config: ConfigWrapper,
    channels: Channels,
    datalog_writer: Option<DatalogWriter>,
    pub stats: Arc<Mutex<PacketStats>>,
}

impl Coordinator {
    pub fn new(
        config: ConfigWrapper,
        channels: Channels,
        datalog_writer: Option<DatalogWriter>,
    ) -> Self {
        Self {
            config,
            channels,
            datalog_writer,
            stats: Arc::new(Mutex::new(PacketStats::default())),
        }
    }

    pub async fn start(&self) -> Result<()> {
        use broadcast::error::RecvError;
        use lxp::inverter::ChannelData::*;

        let mut receiver = self.channels.from_inverter.subscribe();

        loop {
            match receiver.recv().await {
                Ok(Frame(frame)) => {
                    self.process_frame(&frame);
                }
                Ok(Connected(address)) => {
                    info!("inverter {} connected", address);
                }
                Ok(Disconnect(address)) => {
                    info!("inverter {} disconnected, printing statistics:", address);
                    if let Ok(mut stats) = self.stats.lock() {
                        *stats.inverter_disconnections.entry(address).or_insert(0) += 1;
                        stats.print_summary();
                    }
                }
                Ok(Shutdown) => {
                    info!("Received shutdown signal, printing final statistics:");
                    if let Ok(stats) = self.stats.lock() {
                        stats.print_summary();
                    }
                    break;
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("coordinator lagging, {} frames dropped", n);
                    if let Ok(mut stats) = self.stats.lock() {
                        stats.frames_dropped += n;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }

        Ok(())
    }

    pub fn stop(&self) {
        let _ = self
            .channels
            .from_inverter
            .send(lxp::inverter::ChannelData::Shutdown);
    }

    /// Decodes one frame and forwards the record, if any. Every outcome is
    /// counted in `stats`.
    pub fn process_frame(&self, frame: &[u8]) -> Option<Arc<Record>> {
        self.count(|stats| stats.frames_received += 1);

        let record = match lxp::decode_frame(frame) {
            Ok(record) => record,
            Err(e) if e.is_unhandled() => {
                debug!("ignoring frame: {}", e);
                self.count(|stats| stats.unhandled_frames += 1);
                return None;
            }
            Err(e) => {
                warn!("rejected frame: {} ({} bytes)", e, frame.len());
                self.count(|stats| *stats.rejected_frames.entry(e.kind()).or_insert(0) += 1);
                return None;
            }
        };

        if self.config.strict_checksum() && !checksum_valid(frame) {
            warn!("rejected frame from {}: bad checksum", record.serial_number);
            self.count(|stats| stats.checksum_failures += 1);
            return None;
        }

        let record = Arc::new(record);
        debug!(
            "decoded record for {} ({:?})",
            record.serial_number,
            record.loaded_sections()
        );
        self.count(|stats| {
            stats.records_decoded += 1;
            for id in record.loaded_sections() {
                *stats.sections_loaded.entry(id).or_insert(0) += 1;
            }
        });

        self.forward(&record);

        Some(record)
    }

    fn forward(&self, record: &Arc<Record>) {
        if self.config.mqtt().enabled() {
            for message in mqtt::Message::for_record(record) {
                if self
                    .channels
                    .to_mqtt
                    .send(mqtt::ChannelData::Message(message))
                    .is_err()
                {
                    warn!("send(to_mqtt) failed - channel closed?");
                    break;
                }
            }
        }

        if self.config.influx().enabled()
            && self
                .channels
                .to_influx
                .send(influx::ChannelData::Record(record.clone()))
                .is_err()
        {
            warn!("send(to_influx) failed - channel closed?");
        }

        if let Some(writer) = &self.datalog_writer {
            match writer.write_record(record) {
                Ok(()) => self.count(|stats| stats.datalog_writes += 1),
                Err(e) => {
                    error!("failed to write datalog: {}", e);
                    self.count(|stats| stats.datalog_errors += 1);
                }
            }
        }
    }

    fn count<F: FnOnce(&mut PacketStats)>(&self, f: F) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}
