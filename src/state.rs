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

//! Reconciled room state as rendered by downstream screens.

use crate::bluetooth::StatusReport;
use crate::cloud::RoomStatus;
use crate::command::{Command, CommandAction, Device};

/// Default AC temperature shown before any report arrives.
pub const DEFAULT_AC_TEMPERATURE: i32 = 24;

/// Per-transport connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Disconnected => "Disconnected",
            ChannelStatus::Connecting => "Connecting...",
            ChannelStatus::Connected => "Connected",
        }
    }
}

/// The single transport currently authoritative for commands and inbound
/// state. At most one is active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveChannel {
    None,
    Bluetooth,
    Network,
    Test,
}

impl ActiveChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveChannel::None => "none",
            ActiveChannel::Bluetooth => "bluetooth",
            ActiveChannel::Network => "network",
            ActiveChannel::Test => "test",
        }
    }
}

/// Reconciled device state for one room. Mutated only by the session's merge
/// step, never directly by UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    pub ac_power: bool,
    pub ac_temperature: i32,
    pub projector_power: bool,
    /// Whether the bridge reports its own network connectivity.
    pub peer_online: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            ac_power: false,
            ac_temperature: DEFAULT_AC_TEMPERATURE,
            projector_power: false,
            peer_online: false,
        }
    }
}

impl DeviceState {
    /// Merge a partial Bluetooth report: only keys present in the report are
    /// applied, everything else keeps its current value.
    pub fn apply_report(&mut self, report: &StatusReport) {
        if let Some(power) = report.ac_status {
            self.ac_power = power.is_on();
        }
        if let Some(temperature) = report.ac_temperature {
            self.ac_temperature = temperature;
        }
        if let Some(power) = report.projector_status {
            self.projector_power = power.is_on();
        }
        if let Some(online) = report.wifi_connected {
            self.peer_online = online;
        }
    }

    /// Rebuild from a full store snapshot. Unlike the Bluetooth path this
    /// replaces every field; a missing record resets to defaults upstream.
    pub fn from_status(status: &RoomStatus) -> Self {
        Self {
            ac_power: status.ac_status.is_on(),
            ac_temperature: status.ac_temperature,
            projector_power: status.projector_status.is_on(),
            peer_online: status.wifi_connected,
        }
    }

    /// Local echo used by the test channel, the only channel that applies a
    /// command without a round trip.
    pub fn apply_command(&mut self, command: &Command) {
        match command.device {
            Device::Ac => {
                match command.action {
                    CommandAction::On => self.ac_power = true,
                    CommandAction::Off => self.ac_power = false,
                    CommandAction::Temp => {}
                }
                if let Some(value) = command.value {
                    self.ac_temperature = value;
                }
            }
            Device::Projector => match command.action {
                CommandAction::On => self.projector_power = true,
                CommandAction::Off => self.projector_power = false,
                CommandAction::Temp => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::PowerState;

    #[test]
    fn test_partial_report_leaves_other_fields() {
        let mut state = DeviceState {
            ac_power: false,
            ac_temperature: 27,
            projector_power: true,
            peer_online: true,
        };
        state.apply_report(&StatusReport {
            ac_status: Some(PowerState::On),
            ..StatusReport::default()
        });
        assert!(state.ac_power);
        assert_eq!(state.ac_temperature, 27);
        assert!(state.projector_power);
        assert!(state.peer_online);
    }

    #[test]
    fn test_snapshot_replaces_every_field() {
        let state = DeviceState::from_status(&RoomStatus {
            ac_status: PowerState::On,
            ac_temperature: 18,
            projector_status: PowerState::Off,
            wifi_connected: true,
            ..RoomStatus::default()
        });
        assert!(state.ac_power);
        assert_eq!(state.ac_temperature, 18);
        assert!(!state.projector_power);
        assert!(state.peer_online);
    }

    #[test]
    fn test_defaults() {
        let state = DeviceState::default();
        assert!(!state.ac_power);
        assert_eq!(state.ac_temperature, 24);
        assert!(!state.projector_power);
        assert!(!state.peer_online);
    }

    #[test]
    fn test_command_echo() {
        let mut state = DeviceState::default();
        state.apply_command(&Command::power(Device::Projector, true));
        assert!(state.projector_power);

        state.apply_command(&Command::ac_temperature(19).unwrap());
        assert_eq!(state.ac_temperature, 19);
        assert!(!state.ac_power);
    }
}
