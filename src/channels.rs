use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Channels {
    pub from_inverter: lxp::inverter::Sender,
    pub to_inverter: lxp::inverter::Sender,
    pub to_mqtt: mqtt::Sender,
    pub to_influx: broadcast::Sender<influx::ChannelData>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            from_inverter: Self::channel(),
            to_inverter: Self::channel(),
            to_mqtt: Self::channel(),
            to_influx: Self::channel(),
        }
    }

    fn channel<T: Clone>() -> broadcast::Sender<T> {
        broadcast::channel(2048).0
    }
}
