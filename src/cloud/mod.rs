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

//! Shared room-status store collaborator.
//!
//! The store is an externally provided real-time synchronization service; the
//! session only needs subscribe-to-room and update-room. `MemoryStatusStore`
//! is the in-process implementation used by the demo binary and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::bluetooth::PowerState;
use crate::command::{Command, CommandAction, Device};
use crate::error::ControlError;

/// `control_source` tag written with every update issued by this app.
pub const CONTROL_SOURCE_APP: &str = "APP_ONLINE";

/// The `current_status` record for one room. The bookkeeping fields are
/// write-only from this app's perspective; the dashboard consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStatus {
    pub ac_status: PowerState,
    pub ac_temperature: i32,
    pub projector_status: PowerState,
    pub wifi_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command: Option<String>,
    /// Store-assigned, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Default for RoomStatus {
    fn default() -> Self {
        Self {
            ac_status: PowerState::Off,
            ac_temperature: crate::state::DEFAULT_AC_TEMPERATURE,
            projector_status: PowerState::Off,
            wifi_connected: false,
            control_source: None,
            last_command: None,
            timestamp: None,
        }
    }
}

/// Multi-field update applied to a room record in one write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub ac_status: Option<PowerState>,
    pub ac_temperature: Option<i32>,
    pub projector_status: Option<PowerState>,
    pub control_source: String,
    pub last_command: String,
}

impl StatusUpdate {
    /// Build the update for a command, with the bookkeeping fields filled in.
    /// The store assigns the timestamp itself on write.
    pub fn for_command(command: &Command, source: &str) -> Self {
        let mut update = Self {
            control_source: source.to_string(),
            last_command: command.summary(),
            ..Self::default()
        };
        match command.device {
            Device::Ac => {
                match command.action {
                    CommandAction::On => update.ac_status = Some(PowerState::On),
                    CommandAction::Off => update.ac_status = Some(PowerState::Off),
                    CommandAction::Temp => {}
                }
                if let Some(value) = command.value {
                    update.ac_temperature = Some(value);
                }
            }
            Device::Projector => match command.action {
                CommandAction::On => update.projector_status = Some(PowerState::On),
                CommandAction::Off => update.projector_status = Some(PowerState::Off),
                CommandAction::Temp => {}
            },
        }
        update
    }
}

/// Subscribe/update surface of the shared store.
pub trait StatusStore: Send + Sync {
    /// Subscribe to a room's record. The receiver carries the current value;
    /// dropping it ends the subscription. `None` means the room has no data.
    fn subscribe(&self, room_id: u32) -> watch::Receiver<Option<RoomStatus>>;

    /// Apply a multi-field update to a room's record, stamping the
    /// store-assigned timestamp.
    fn update<'a>(
        &'a self,
        room_id: u32,
        update: StatusUpdate,
    ) -> BoxFuture<'a, Result<(), ControlError>>;
}

/// In-memory store used by the demo binary and by tests.
#[derive(Default)]
pub struct MemoryStatusStore {
    rooms: Mutex<HashMap<u32, watch::Sender<Option<RoomStatus>>>>,
    applied: Mutex<Vec<(u32, StatusUpdate)>>,
    reject_updates: AtomicBool,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a room's record, notifying subscribers with "no data".
    pub fn clear(&self, room_id: u32) {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room_id)
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(None);
    }

    /// When set, `update` fails with a remote-update error. Lets callers
    /// exercise the rejection path.
    pub fn set_reject_updates(&self, reject: bool) {
        self.reject_updates.store(reject, Ordering::SeqCst);
    }

    /// Updates applied so far, in order.
    pub fn applied_updates(&self) -> Vec<(u32, StatusUpdate)> {
        self.applied.lock().clone()
    }

    /// Live subscriber count for a room.
    pub fn watchers(&self, room_id: u32) -> usize {
        self.rooms
            .lock()
            .get(&room_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Current record for a room, if any.
    pub fn current(&self, room_id: u32) -> Option<RoomStatus> {
        self.rooms
            .lock()
            .get(&room_id)
            .and_then(|sender| sender.borrow().clone())
    }
}

impl StatusStore for MemoryStatusStore {
    fn subscribe(&self, room_id: u32) -> watch::Receiver<Option<RoomStatus>> {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room_id)
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    fn update<'a>(
        &'a self,
        room_id: u32,
        update: StatusUpdate,
    ) -> BoxFuture<'a, Result<(), ControlError>> {
        Box::pin(async move {
            if self.reject_updates.load(Ordering::SeqCst) {
                return Err(ControlError::RemoteUpdateFailure(
                    "update rejected by store".to_string(),
                ));
            }

            {
                let mut rooms = self.rooms.lock();
                let sender = rooms
                    .entry(room_id)
                    .or_insert_with(|| watch::channel(None).0);
                let mut record = sender.borrow().clone().unwrap_or_default();
                if let Some(power) = update.ac_status {
                    record.ac_status = power;
                }
                if let Some(temperature) = update.ac_temperature {
                    record.ac_temperature = temperature;
                }
                if let Some(power) = update.projector_status {
                    record.projector_status = power;
                }
                record.control_source = Some(update.control_source.clone());
                record.last_command = Some(update.last_command.clone());
                record.timestamp = Some(Utc::now().timestamp_millis());

                debug!(room = room_id, command = %update.last_command, "room status updated");
                sender.send_replace(Some(record));
            }
            self.applied.lock().push((room_id, update));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_for_command() {
        let update = StatusUpdate::for_command(&Command::power(Device::Ac, true), CONTROL_SOURCE_APP);
        assert_eq!(update.ac_status, Some(PowerState::On));
        assert_eq!(update.ac_temperature, None);
        assert_eq!(update.projector_status, None);
        assert_eq!(update.control_source, "APP_ONLINE");
        assert_eq!(update.last_command, "AC_ON");

        let update = StatusUpdate::for_command(&Command::ac_temperature(21).unwrap(), CONTROL_SOURCE_APP);
        assert_eq!(update.ac_status, None);
        assert_eq!(update.ac_temperature, Some(21));
        assert_eq!(update.last_command, "AC_TEMP_21");
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStatusStore::new();
        let mut rx = store.subscribe(201);
        assert!(rx.borrow().is_none());

        store
            .update(
                201,
                StatusUpdate::for_command(&Command::power(Device::Projector, true), CONTROL_SOURCE_APP),
            )
            .await
            .unwrap();

        let record = rx.borrow_and_update().clone().unwrap();
        assert_eq!(record.projector_status, PowerState::On);
        assert_eq!(record.ac_temperature, crate::state::DEFAULT_AC_TEMPERATURE);
        assert_eq!(record.last_command.as_deref(), Some("PROJECTOR_ON"));
        assert!(record.timestamp.is_some());

        store.clear(201);
        assert!(rx.borrow_and_update().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_rejection() {
        let store = MemoryStatusStore::new();
        store.set_reject_updates(true);
        let result = store
            .update(
                202,
                StatusUpdate::for_command(&Command::power(Device::Ac, false), CONTROL_SOURCE_APP),
            )
            .await;
        assert!(matches!(result, Err(ControlError::RemoteUpdateFailure(_))));
        assert!(store.applied_updates().is_empty());
    }
}
