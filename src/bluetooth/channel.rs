// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bluetooth transport channel.
//!
//! Owns one serial connection to the bridge: connect/disconnect/write plus a
//! background read loop that publishes complete newline-framed messages. The
//! channel instance belongs to one room session; nothing here is global.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::connector::{SerialStream, SppConnector};
use crate::error::ControlError;
use crate::state::ChannelStatus;

/// Events delivered by the channel to its owning session.
#[derive(Debug)]
pub enum ChannelEvent {
    /// One complete inbound message, delimiter stripped and trimmed.
    Line(String),
    /// The read loop terminated. `error` is `None` on clean EOF.
    Closed { error: Option<ControlError> },
}

/// One serial-style connection to a named remote endpoint.
pub struct BluetoothChannel {
    connector: Box<dyn SppConnector>,
    status_tx: watch::Sender<ChannelStatus>,
    event_tx: mpsc::UnboundedSender<ChannelEvent>,
    writer: Option<WriteHalf<Box<dyn SerialStream>>>,
    read_task: Option<JoinHandle<()>>,
    connected_address: Option<String>,
    connect_timeout: Duration,
    write_delay: Duration,
}

impl BluetoothChannel {
    /// Create a channel around a connector. Returns the channel and the
    /// receiver for its inbound events.
    pub fn new(
        connector: Box<dyn SppConnector>,
        connect_timeout: Duration,
        write_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(ChannelStatus::Disconnected);
        (
            Self {
                connector,
                status_tx,
                event_tx,
                writer: None,
                read_task: None,
                connected_address: None,
                connect_timeout,
                write_delay,
            },
            event_rx,
        )
    }

    /// Connection status signal.
    pub fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        *self.status_tx.borrow() == ChannelStatus::Connected
    }

    /// Try to connect to an endpoint. Never propagates an error; failures
    /// release all resources and return false. Connecting to the currently
    /// connected address is a no-op success. Any previous connection and its
    /// read loop are torn down before a new attempt.
    pub async fn connect(&mut self, address: &str, service_uuid: Uuid) -> bool {
        if self.is_connected() && self.connected_address.as_deref() == Some(address) {
            debug!(%address, "already connected to endpoint");
            return true;
        }

        self.disconnect();
        self.status_tx.send_replace(ChannelStatus::Connecting);
        info!(%address, "connecting via Bluetooth");

        let attempt =
            tokio::time::timeout(self.connect_timeout, self.connector.connect(address, service_uuid))
                .await;
        let stream = match attempt {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                warn!(%address, %err, "Bluetooth connect failed");
                self.status_tx.send_replace(ChannelStatus::Disconnected);
                return false;
            }
            Err(_) => {
                let err = ControlError::ConnectFailure(format!(
                    "timed out after {:?}",
                    self.connect_timeout
                ));
                warn!(%address, %err, "Bluetooth connect failed");
                self.status_tx.send_replace(ChannelStatus::Disconnected);
                return false;
            }
        };

        let (read_half, write_half) = tokio::io::split(stream);
        self.writer = Some(write_half);
        self.connected_address = Some(address.to_string());
        self.read_task = Some(tokio::spawn(read_loop(read_half, self.event_tx.clone())));
        self.status_tx.send_replace(ChannelStatus::Connected);
        info!(%address, "Bluetooth connected");
        true
    }

    /// Write one payload. Returns false without touching the link when not
    /// connected; an I/O failure disconnects and returns false. A short
    /// post-write delay paces frames to the bridge's processing rate.
    pub async fn write(&mut self, payload: &str) -> bool {
        let Some(writer) = self.writer.as_mut() else {
            warn!("not connected, dropping outbound payload");
            return false;
        };

        let result = async {
            writer.write_all(payload.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                tokio::time::sleep(self.write_delay).await;
                debug!(payload = payload.trim(), "payload sent");
                true
            }
            Err(err) => {
                let failure = ControlError::WriteFailure(err.to_string());
                error!(%failure, "disconnecting after failed write");
                self.disconnect();
                false
            }
        }
    }

    /// Tear down the connection. Idempotent; aborts the read loop
    /// synchronously (its framing buffer goes with it) and closes the stream.
    pub fn disconnect(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        self.writer = None;
        self.connected_address = None;
        let previous = self.status_tx.send_replace(ChannelStatus::Disconnected);
        if previous != ChannelStatus::Disconnected {
            info!("Bluetooth disconnected");
        }
    }
}

/// Accumulate bytes and publish each newline-terminated message, trimmed.
/// Terminates on EOF or I/O error; the owning session performs the
/// disconnect in response to the `Closed` event.
async fn read_loop(
    read_half: ReadHalf<Box<dyn SerialStream>>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let mut reader = BufReader::new(read_half);
    let mut buffer = String::new();
    debug!("Bluetooth read loop started");

    loop {
        buffer.clear();
        match reader.read_line(&mut buffer).await {
            Ok(0) => {
                info!("Bluetooth link closed by remote");
                let _ = events.send(ChannelEvent::Closed { error: None });
                break;
            }
            Ok(_) => {
                let message = buffer.trim();
                if message.is_empty() {
                    continue;
                }
                debug!(message, "received");
                let _ = events.send(ChannelEvent::Line(message.to_string()));
            }
            Err(err) => {
                let failure = ControlError::ReadFailure(err.to_string());
                error!(%failure, "Bluetooth read loop terminating");
                let _ = events.send(ChannelEvent::Closed {
                    error: Some(failure),
                });
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::io::DuplexStream;

    /// Connector handing out in-memory duplex streams; the far ends stay
    /// available to the test.
    #[derive(Clone, Default)]
    struct DuplexConnector {
        peers: Arc<Mutex<Vec<DuplexStream>>>,
    }

    impl DuplexConnector {
        fn take_peer(&self) -> DuplexStream {
            self.peers.lock().pop().unwrap()
        }

        fn handed_out(&self) -> usize {
            self.peers.lock().len()
        }
    }

    impl SppConnector for DuplexConnector {
        fn connect<'a>(
            &'a self,
            _address: &'a str,
            _service_uuid: Uuid,
        ) -> BoxFuture<'a, Result<Box<dyn SerialStream>, ControlError>> {
            Box::pin(async move {
                let (near, far) = tokio::io::duplex(1024);
                self.peers.lock().push(far);
                Ok(Box::new(near) as Box<dyn SerialStream>)
            })
        }
    }

    struct RefusingConnector;

    impl SppConnector for RefusingConnector {
        fn connect<'a>(
            &'a self,
            _address: &'a str,
            _service_uuid: Uuid,
        ) -> BoxFuture<'a, Result<Box<dyn SerialStream>, ControlError>> {
            Box::pin(async move { Err(ControlError::TransportUnavailable) })
        }
    }

    fn test_channel(
        connector: Box<dyn SppConnector>,
    ) -> (BluetoothChannel, mpsc::UnboundedReceiver<ChannelEvent>) {
        BluetoothChannel::new(connector, Duration::from_secs(1), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_connect_failure_returns_false() {
        let (mut channel, _events) = test_channel(Box::new(RefusingConnector));
        assert!(!channel.connect("00:00:00:00:00:00", Uuid::nil()).await);
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_write_when_disconnected_is_noop() {
        let (mut channel, _events) = test_channel(Box::new(RefusingConnector));
        assert!(!channel.write("{\"action\":\"requestStatus\"}\n").await);
    }

    #[tokio::test]
    async fn test_framing_splits_on_newline() {
        let connector = DuplexConnector::default();
        let (mut channel, mut events) = test_channel(Box::new(connector.clone()));
        assert!(channel.connect("AA:BB:CC:DD:EE:FF", Uuid::nil()).await);

        let mut peer = connector.take_peer();
        // Two messages delivered across fragment boundaries.
        peer.write_all(b"{\"ac_sta").await.unwrap();
        peer.write_all(b"tus\":\"ON\"}\n{\"wifi_connected\":true}\r\n")
            .await
            .unwrap();

        match events.recv().await.unwrap() {
            ChannelEvent::Line(line) => assert_eq!(line, "{\"ac_status\":\"ON\"}"),
            other => panic!("unexpected event: {:?}", other),
        }
        match events.recv().await.unwrap() {
            ChannelEvent::Line(line) => assert_eq!(line, "{\"wifi_connected\":true}"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_peer_close_emits_closed_event() {
        let connector = DuplexConnector::default();
        let (mut channel, mut events) = test_channel(Box::new(connector.clone()));
        assert!(channel.connect("AA:BB:CC:DD:EE:FF", Uuid::nil()).await);

        drop(connector.take_peer());
        match events.recv().await.unwrap() {
            ChannelEvent::Closed { error: None } => {}
            other => panic!("unexpected event: {:?}", other),
        }

        // The link is gone; the next write fails and tears the channel down.
        assert!(!channel.write("{\"action\":\"requestStatus\"}\n").await);
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_same_address_connect_is_noop() {
        let connector = DuplexConnector::default();
        let (mut channel, _events) = test_channel(Box::new(connector.clone()));
        assert!(channel.connect("AA:BB:CC:DD:EE:FF", Uuid::nil()).await);
        assert!(channel.connect("AA:BB:CC:DD:EE:FF", Uuid::nil()).await);
        assert_eq!(connector.handed_out(), 1);

        // A different endpoint tears down the old connection first.
        assert!(channel.connect("11:22:33:44:55:66", Uuid::nil()).await);
        assert_eq!(connector.handed_out(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let connector = DuplexConnector::default();
        let (mut channel, _events) = test_channel(Box::new(connector.clone()));
        assert!(channel.connect("AA:BB:CC:DD:EE:FF", Uuid::nil()).await);

        channel.disconnect();
        channel.disconnect();
        assert!(!channel.is_connected());
    }
}
