use crate::prelude::*;

use bytes::{Bytes, BytesMut};
use net2::TcpStreamExt;
use std::time::Duration;
use tokio::io::AsyncReadExt;

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    Connected(String),  // inverter address, inverter->coordinator only
    Disconnect(String),
    Frame(Bytes),
    Shutdown,
}
pub type Sender = broadcast::Sender<ChannelData>;
pub type Receiver = broadcast::Receiver<ChannelData>;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const RECONNECT_DELAY_SECS: u64 = 5;
const TCP_KEEPALIVE_SECS: u64 = 60;
const MAX_FRAME_SIZE: usize = 65536;

/// Reads frames from one inverter's TCP port. Every successful read is
/// forwarded as one frame; nothing is reassembled.
#[derive(Clone)]
pub struct Inverter {
    config: config::Inverter,
    channels: Channels,
}

impl Inverter {
    pub fn new(config: config::Inverter, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        let mut shutdown = self.channels.to_inverter.subscribe();

        loop {
            match self.connect(&mut shutdown).await {
                Ok(Stop::Shutdown) => break,
                Ok(Stop::Disconnected(reason)) => {
                    warn!("inverter {}: {}", self.config.address(), reason)
                }
                Err(e) => error!("inverter {}: {}", self.config.address(), e),
            }

            info!(
                "inverter {}: reconnecting in {}s",
                self.config.address(),
                RECONNECT_DELAY_SECS
            );

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)) => {}
                msg = shutdown.recv() => {
                    if matches!(msg, Ok(ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                        break;
                    }
                }
            }
        }

        info!("inverter {}: exiting", self.config.address());
        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.channels.to_inverter.send(ChannelData::Shutdown);
    }

    // `shutdown` is the receiver `start` subscribed, so a stop requested
    // while connecting is still seen by the read loop
    async fn connect(&self, shutdown: &mut Receiver) -> Result<Stop> {
        let address = self.config.address();
        info!("connecting to inverter at {}", address);

        let stream = match tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            tokio::net::TcpStream::connect((self.config.host(), self.config.port())),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => bail!("failed to connect: {}", e),
            Err(_) => bail!("connection timeout after {} seconds", CONNECT_TIMEOUT_SECS),
        };

        let std_stream = stream.into_std()?;
        if let Err(e) = std_stream.set_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS))) {
            warn!("failed to set TCP keepalive: {}", e);
        }
        let stream = tokio::net::TcpStream::from_std(std_stream)?;

        if self.config.use_tcp_nodelay() {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("failed to set TCP_NODELAY: {}", e);
            }
        }

        info!("inverter {}: connected!", address);
        let _ = self
            .channels
            .from_inverter
            .send(ChannelData::Connected(address.clone()));

        let r = self.receiver(stream, shutdown).await;

        let _ = self
            .channels
            .from_inverter
            .send(ChannelData::Disconnect(address));

        r
    }

    // inverter -> coordinator
    async fn receiver(
        &self,
        mut socket: tokio::net::TcpStream,
        shutdown: &mut Receiver,
    ) -> Result<Stop> {
        let mut buf = BytesMut::with_capacity(MAX_FRAME_SIZE);
        let read_timeout = self.config.read_timeout();

        loop {
            buf.reserve(MAX_FRAME_SIZE);

            tokio::select! {
                msg = shutdown.recv() => {
                    match msg {
                        Ok(ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed) => {
                            info!("inverter {}: received shutdown signal", self.config.address());
                            return Ok(Stop::Shutdown);
                        }
                        _ => continue,
                    }
                }

                read = async {
                    if read_timeout > 0 {
                        tokio::time::timeout(Duration::from_secs(read_timeout), socket.read_buf(&mut buf)).await
                    } else {
                        Ok(socket.read_buf(&mut buf).await)
                    }
                } => {
                    let len = match read {
                        Ok(Ok(n)) => n,
                        Ok(Err(e)) => bail!("read error: {}", e),
                        Err(_) => {
                            return Ok(Stop::Disconnected(format!("no data received for {} seconds", read_timeout)))
                        }
                    };

                    if len == 0 {
                        return Ok(Stop::Disconnected("connection closed by peer".to_owned()));
                    }

                    let frame = buf.split().freeze();
                    trace!("inverter {}: RX {:?}", self.config.address(), frame);

                    if self.channels.from_inverter.send(ChannelData::Frame(frame)).is_err() {
                        bail!("send(from_inverter) failed - channel closed?");
                    }
                }
            }
        }
    }
}

enum Stop {
    Shutdown,
    Disconnected(String),
}
