pub use anyhow::{anyhow, bail, Error, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::str::FromStr;
pub use tokio::sync::broadcast;

pub use crate::{
    channels::Channels,
    config::{self, Config, ConfigWrapper},
    coordinator::{Coordinator, PacketStats},
    datalog_writer::DatalogWriter,
    error::DecodeError,
    influx,
    lxp::{
        self,
        packet::Serial,
        record::Record,
        section::SectionId,
    },
    mqtt,
    options::Options,
};
