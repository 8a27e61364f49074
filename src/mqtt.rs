use crate::prelude::*;

use lxp::codes;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, QoS};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Message {{{
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

impl Message {
    /// One message per reading of every loaded section, topic
    /// `<serial>/<Field>`. The namespace is prefixed when publishing.
    pub fn for_record(record: &Record) -> Vec<Message> {
        let serial = record.serial_number.as_str();

        let mut r: Vec<Message> = record
            .sink_fields()
            .into_iter()
            .map(|(name, value)| Message {
                topic: format!("{}/{}", serial, name),
                retain: false,
                payload: value.to_string(),
            })
            .collect();

        if record.section1.is_loaded() {
            r.push(Self::text(
                serial,
                "Status_Text",
                codes::status_text(record.section1.raw().status),
            ));
        }

        if record.section2.is_loaded() {
            let raw = record.section2.raw();
            r.push(Self::text(serial, "FaultCode_Text", codes::fault_text(raw.fault_code)));
            r.push(Self::text(
                serial,
                "WarningCode_Text",
                codes::warning_text(raw.warning_code),
            ));
        }

        r
    }

    /// Topic as published: `<namespace>/<serial>/<Field>`.
    pub fn namespaced_topic(&self, config: &config::Mqtt) -> String {
        format!("{}/{}", config.namespace(), self.topic)
    }

    fn text(serial: &str, name: &str, payload: &str) -> Message {
        Message {
            topic: format!("{}/{}", serial, name),
            retain: false,
            payload: payload.to_owned(),
        }
    }
} // }}}

/// Retained `online`/`offline` availability topic.
pub fn lwt_topic(config: &config::Mqtt) -> String {
    format!("{}/LWT", config.namespace())
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    Message(Message),
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;

#[derive(Clone)]
pub struct Mqtt {
    config: ConfigWrapper,
    channels: Channels,
    shared_stats: Arc<Mutex<PacketStats>>,
}

impl Mqtt {
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
        let c = self.config.mqtt();

        if !c.enabled() {
            info!("mqtt disabled, skipping");
            return Ok(());
        }

        let mut options = MqttOptions::new("lxp-telemetry", c.host(), c.port());
        options.set_last_will(LastWill::new(
            self.lwt_topic(),
            "offline",
            QoS::AtLeastOnce,
            true,
        ));
        options.set_keep_alive(Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.username(), c.password()) {
            options.set_credentials(u, p);
        }

        info!("initializing mqtt at {}:{}", c.host(), c.port());

        let (client, eventloop) = AsyncClient::new(options, 10);

        futures::try_join!(
            self.setup(client.clone()),
            self.receiver(eventloop),
            self.sender(client)
        )?;

        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
    }

    async fn setup(&self, client: AsyncClient) -> Result<()> {
        client
            .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        Ok(())
    }

    // drives the connection; nothing is subscribed to, so incoming events
    // are only logged
    async fn receiver(&self, mut eventloop: EventLoop) -> Result<()> {
        let mut shutdown = self.channels.to_mqtt.subscribe();

        loop {
            tokio::select! {
                msg = shutdown.recv() => {
                    if matches!(msg, Ok(ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                        break;
                    }
                }
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(incoming)) => trace!("mqtt RX: {:?}", incoming),
                        Ok(Event::Outgoing(_)) => {}
                        Err(e) => {
                            error!("{}", e);
                            info!("reconnecting in 5s");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            }
        }

        info!("MQTT receiver loop exiting");
        Ok(())
    }

    // coordinator -> mqtt
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        use broadcast::error::RecvError;

        let mut receiver = self.channels.to_mqtt.subscribe();

        loop {
            match receiver.recv().await {
                Ok(ChannelData::Shutdown) | Err(RecvError::Closed) => {
                    info!("MQTT sender received shutdown signal");
                    let _ = client.disconnect().await;
                    break;
                }
                Ok(ChannelData::Message(message)) => self.publish(&client, message).await,
                Err(RecvError::Lagged(n)) => {
                    warn!("mqtt sender lagging, {} messages dropped", n);
                    self.count(|stats| stats.mqtt_errors += n);
                }
            }
        }

        info!("MQTT sender loop exiting");
        Ok(())
    }

    async fn publish(&self, client: &AsyncClient, message: Message) {
        let topic = message.namespaced_topic(self.config.mqtt());
        debug!("publishing: {} = {}", topic, message.payload);

        for attempt in 1..=3 {
            match client
                .publish(&topic, QoS::AtLeastOnce, message.retain, message.payload.clone())
                .await
            {
                Ok(()) => {
                    self.count(|stats| stats.mqtt_messages_sent += 1);
                    return;
                }
                Err(err) => {
                    error!("MQTT publish failed: {:?} (attempt {}/3)", err, attempt);
                    self.count(|stats| stats.mqtt_errors += 1);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn count<F: FnOnce(&mut PacketStats)>(&self, f: F) {
        if let Ok(mut stats) = self.shared_stats.lock() {
            f(&mut stats);
        }
    }

    fn lwt_topic(&self) -> String {
        lwt_topic(self.config.mqtt())
    }
}

