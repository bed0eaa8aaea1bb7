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

//! Room session: the connection arbiter.
//!
//! One actor task per open room serializes every state mutation. It selects
//! the single active control channel from the Bluetooth status, the online
//! signal, and the test-mode flag; routes outbound commands; and merges
//! inbound updates under the channel-priority rules. Bluetooth always wins
//! over the network path while connected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bluetooth::{BluetoothChannel, ChannelEvent, OutboundFrame, SppConnector, StatusReport};
use crate::cloud::{RoomStatus, StatusStore, StatusUpdate, CONTROL_SOURCE_APP};
use crate::command::Command;
use crate::config::{BluetoothConfig, Room};
use crate::error::ControlError;
use crate::state::{ActiveChannel, ChannelStatus, DeviceState};

/// Simulated round-trip delay applied by the test channel.
const TEST_COMMAND_DELAY: Duration = Duration::from_millis(500);

enum SessionRequest {
    Control(Command),
    Close,
}

/// Handle to an open room session. The state, active channel, and status
/// message are exposed as read-only watch receivers; commands are submitted
/// fire-and-forget.
pub struct RoomSession {
    requests: mpsc::UnboundedSender<SessionRequest>,
    state_rx: watch::Receiver<DeviceState>,
    active_rx: watch::Receiver<ActiveChannel>,
    message_rx: watch::Receiver<String>,
    task: JoinHandle<()>,
}

impl RoomSession {
    /// Open a session for a room. The connector and the store are injected;
    /// the session owns its Bluetooth channel for its whole lifetime.
    pub fn open(
        room: Room,
        connector: Box<dyn SppConnector>,
        bluetooth: &BluetoothConfig,
        store: Arc<dyn StatusStore>,
        online: watch::Receiver<bool>,
        test_mode: bool,
    ) -> Self {
        let (channel, bt_events) =
            BluetoothChannel::new(connector, bluetooth.connect_timeout(), bluetooth.write_delay());
        let bt_status = channel.status();
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(DeviceState::default());
        let (active_tx, active_rx) = watch::channel(ActiveChannel::None);
        let (message_tx, message_rx) = watch::channel("Starting connection...".to_string());

        info!(room = %room.name, test_mode, "room session opened");

        let online_seen = *online.borrow();
        let actor = SessionActor {
            room,
            bluetooth: channel,
            bt_events,
            bt_status,
            bt_connected_seen: false,
            store,
            subscription: None,
            online,
            online_seen,
            online_alive: true,
            test_mode,
            requests: requests_rx,
            active: ActiveChannel::None,
            state: DeviceState::default(),
            state_tx,
            active_tx,
            message_tx,
        };
        let task = tokio::spawn(actor.run());

        Self {
            requests: requests_tx,
            state_rx,
            active_rx,
            message_rx,
            task,
        }
    }

    /// Submit a command. Fire-and-forget: the outcome is surfaced through
    /// the status message.
    pub fn send(&self, command: Command) {
        if self
            .requests
            .send(SessionRequest::Control(command))
            .is_err()
        {
            warn!("session already closed, command dropped");
        }
    }

    /// Reconciled device state.
    pub fn state(&self) -> watch::Receiver<DeviceState> {
        self.state_rx.clone()
    }

    /// Currently active control channel.
    pub fn active_channel(&self) -> watch::Receiver<ActiveChannel> {
        self.active_rx.clone()
    }

    /// User-visible connection/command status line.
    pub fn status_message(&self) -> watch::Receiver<String> {
        self.message_rx.clone()
    }

    /// Close the session: unsubscribes from the store and disconnects
    /// Bluetooth regardless of current state.
    pub async fn close(self) {
        let _ = self.requests.send(SessionRequest::Close);
        let _ = self.task.await;
    }
}

struct SessionActor {
    room: Room,
    bluetooth: BluetoothChannel,
    bt_events: mpsc::UnboundedReceiver<ChannelEvent>,
    bt_status: watch::Receiver<ChannelStatus>,
    bt_connected_seen: bool,
    store: Arc<dyn StatusStore>,
    subscription: Option<watch::Receiver<Option<RoomStatus>>>,
    online: watch::Receiver<bool>,
    online_seen: bool,
    online_alive: bool,
    test_mode: bool,
    requests: mpsc::UnboundedReceiver<SessionRequest>,
    active: ActiveChannel,
    state: DeviceState,
    state_tx: watch::Sender<DeviceState>,
    active_tx: watch::Sender<ActiveChannel>,
    message_tx: watch::Sender<String>,
}

impl SessionActor {
    async fn run(mut self) {
        self.reevaluate().await;

        loop {
            // Borrow the optional subscription up front so the select arm
            // does not capture the whole actor.
            let subscription = self.subscription.as_mut();
            let online_alive = self.online_alive;

            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(SessionRequest::Control(command)) => self.dispatch(command).await,
                    Some(SessionRequest::Close) | None => break,
                },

                event = self.bt_events.recv() => match event {
                    Some(ChannelEvent::Line(line)) => self.merge_bluetooth_line(&line),
                    Some(ChannelEvent::Closed { error }) => {
                        match error {
                            Some(err) => warn!(%err, "bluetooth read loop failed"),
                            None => debug!("bluetooth read loop ended"),
                        }
                        self.bluetooth.disconnect();
                        self.reevaluate().await;
                    }
                    None => break,
                },

                changed = self.online.changed(), if online_alive => match changed {
                    Ok(()) => {
                        let online = *self.online.borrow_and_update();
                        if online != self.online_seen {
                            self.online_seen = online;
                            debug!(online, "connectivity signal changed");
                            self.reevaluate().await;
                        }
                    }
                    Err(_) => self.online_alive = false,
                },

                changed = self.bt_status.changed() => {
                    if changed.is_ok() {
                        let connected =
                            *self.bt_status.borrow_and_update() == ChannelStatus::Connected;
                        if connected != self.bt_connected_seen {
                            self.bt_connected_seen = connected;
                            debug!(connected, "bluetooth signal changed");
                            self.reevaluate().await;
                        }
                    }
                },

                snapshot = async {
                    match subscription {
                        Some(rx) => match rx.changed().await {
                            Ok(()) => Some(rx.borrow_and_update().clone()),
                            Err(_) => None,
                        },
                        None => std::future::pending().await,
                    }
                } => match snapshot {
                    Some(snapshot) => self.merge_store_snapshot(snapshot),
                    None => self.subscription = None,
                },
            }
        }

        self.teardown();
    }

    /// Pick the active control channel. Runs on entry and whenever the
    /// online or Bluetooth signal changes; a connect attempt is only ever
    /// triggered from here, so a new attempt always follows a full teardown
    /// of the previous connection.
    async fn reevaluate(&mut self) {
        if self.test_mode {
            self.set_subscribed(false);
            self.bluetooth.disconnect();
            self.set_active(ActiveChannel::Test);
            self.set_message("Test mode enabled.");
            return;
        }

        // The subscription mirrors the online flag for passive sync, no
        // matter which channel ends up controlling.
        let online = *self.online.borrow();
        self.set_subscribed(online);

        if self.bluetooth.is_connected() {
            self.set_active(ActiveChannel::Bluetooth);
            self.set_message("Connected via Bluetooth.");
            self.request_status().await;
            return;
        }

        self.set_message("Connecting via Bluetooth...");
        if self
            .bluetooth
            .connect(&self.room.bluetooth_address, self.room.service_uuid)
            .await
        {
            self.set_active(ActiveChannel::Bluetooth);
            self.set_message("Connected via Bluetooth.");
            self.request_status().await;
        } else if online {
            self.set_active(ActiveChannel::Network);
            self.set_message("Bluetooth unavailable. Connected via network.");
        } else {
            self.set_active(ActiveChannel::None);
            self.set_message("No connection available (Bluetooth or network).");
        }
    }

    /// Route a command over the active channel.
    async fn dispatch(&mut self, command: Command) {
        match self.active {
            ActiveChannel::Test => {
                tokio::time::sleep(TEST_COMMAND_DELAY).await;
                self.state.apply_command(&command);
                self.publish_state();
                self.set_message(format!("{} sent (simulated).", command.summary()));
                debug!(command = %command.summary(), "command simulated");
            }
            ActiveChannel::Bluetooth => {
                let line = match OutboundFrame::command(&command).to_line() {
                    Ok(line) => line,
                    Err(err) => {
                        error!(%err, "failed to encode command frame");
                        return;
                    }
                };
                if self.bluetooth.write(&line).await {
                    self.set_message(format!("{} sent via Bluetooth.", command.summary()));
                } else {
                    self.set_message(format!(
                        "Failed to send {} via Bluetooth.",
                        command.summary()
                    ));
                    // One level of fallback, no retry loop.
                    if *self.online.borrow() {
                        warn!(
                            command = %command.summary(),
                            "bluetooth write failed, falling back to network"
                        );
                        self.send_via_store(&command).await;
                    }
                }
            }
            ActiveChannel::Network => self.send_via_store(&command).await,
            ActiveChannel::None => {
                let err = ControlError::NoActiveChannel;
                warn!(command = %command.summary(), %err, "command dropped");
                self.set_message("No connection available to send the command.");
            }
        }
    }

    async fn send_via_store(&mut self, command: &Command) {
        let update = StatusUpdate::for_command(command, CONTROL_SOURCE_APP);
        match self.store.update(self.room.id, update).await {
            Ok(()) => self.set_message(format!("{} sent via network.", command.summary())),
            Err(err) => {
                error!(%err, command = %command.summary(), "network command failed");
                self.set_message(format!(
                    "Failed to send {} via network: {err}.",
                    command.summary()
                ));
            }
        }
    }

    /// Ask the bridge for its full state. Best-effort; a failure is logged
    /// and recovery happens through the Bluetooth signal, not here.
    async fn request_status(&mut self) {
        match OutboundFrame::status_request().to_line() {
            Ok(line) => {
                if !self.bluetooth.write(&line).await {
                    warn!("status request could not be sent");
                }
            }
            Err(err) => error!(%err, "failed to encode status request"),
        }
    }

    /// Apply one inbound Bluetooth line. Only honored while Bluetooth is the
    /// active control channel; a malformed line is dropped whole.
    fn merge_bluetooth_line(&mut self, line: &str) {
        if self.active != ActiveChannel::Bluetooth {
            debug!("ignoring bluetooth data while channel inactive");
            return;
        }
        match StatusReport::from_line(line) {
            Ok(report) => {
                self.state.apply_report(&report);
                self.publish_state();
                debug!(line, "state updated from bluetooth");
            }
            Err(err) => {
                warn!(%err, line, "inbound bluetooth message dropped");
                self.set_message(format!("Failed to read Bluetooth data: {err}."));
            }
        }
    }

    /// Apply a store snapshot. Bluetooth wins while active; a missing record
    /// resets the whole state to defaults (unlike the Bluetooth partial
    /// merge — kept as the original behaves).
    fn merge_store_snapshot(&mut self, snapshot: Option<RoomStatus>) {
        if self.active == ActiveChannel::Bluetooth
            || self.test_mode
            || !*self.online.borrow()
        {
            return;
        }
        match snapshot {
            Some(status) => {
                self.state = DeviceState::from_status(&status);
                debug!("state updated from store");
            }
            None => {
                self.state = DeviceState::default();
                debug!(room = self.room.id, "no store data, state reset to defaults");
            }
        }
        self.publish_state();
    }

    fn set_subscribed(&mut self, subscribe: bool) {
        if subscribe {
            if self.subscription.is_none() {
                let mut rx = self.store.subscribe(self.room.id);
                // Deliver the current record right away, like a fresh
                // listener registration does.
                rx.mark_changed();
                self.subscription = Some(rx);
                debug!(room = self.room.id, "store subscription activated");
            }
        } else if self.subscription.take().is_some() {
            debug!(room = self.room.id, "store subscription deactivated");
        }
    }

    fn set_active(&mut self, active: ActiveChannel) {
        if self.active != active {
            info!(channel = active.as_str(), "active control channel changed");
        }
        self.active = active;
        self.active_tx.send_replace(active);
    }

    fn set_message(&self, message: impl Into<String>) {
        self.message_tx.send_replace(message.into());
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.state);
    }

    fn teardown(&mut self) {
        self.set_subscribed(false);
        self.bluetooth.disconnect();
        info!(room = %self.room.name, "room session closed");
    }
}
