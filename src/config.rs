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

//! Configuration module.
//!
//! Handles loading and saving application settings, including the room
//! catalog.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standard SPP service UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Connectivity probe settings.
    pub network: NetworkConfig,

    /// Controllable rooms.
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BluetoothConfig {
    /// Upper bound on a single connect attempt in seconds.
    pub connect_timeout_secs: u64,

    /// Pause after each write so the bridge keeps up, in milliseconds.
    pub write_delay_ms: u64,

    /// RFCOMM channel the bridge registers its SPP service on.
    pub rfcomm_channel: u8,
}

impl BluetoothConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Endpoint used to validate internet reachability.
    pub probe_endpoint: String,

    /// Seconds between reachability probes.
    pub probe_interval_secs: u64,

    /// Seconds before a probe counts as unreachable.
    pub probe_timeout_secs: u64,
}

impl NetworkConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// One controllable room. Immutable once loaded from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub id: u32,
    /// MAC address of the room's ESP32 bridge.
    pub bluetooth_address: String,
    /// SPP service UUID advertised by the bridge.
    pub service_uuid: Uuid,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bluetooth: BluetoothConfig {
                connect_timeout_secs: 10,
                write_delay_ms: 50,
                rfcomm_channel: 1,
            },
            network: NetworkConfig {
                probe_endpoint: "1.1.1.1:443".to_string(),
                probe_interval_secs: 15,
                probe_timeout_secs: 5,
            },
            rooms: vec![
                Room {
                    name: "MALI-201".to_string(),
                    id: 201,
                    bluetooth_address: "94:54:C5:A9:9C:72".to_string(),
                    service_uuid: SPP_UUID,
                },
                Room {
                    name: "MALI-202".to_string(),
                    id: 202,
                    bluetooth_address: "00:00:00:00:00:00".to_string(),
                    service_uuid: Uuid::from_u128(0x00001101_0000_1000_8000_008055554444),
                },
                Room {
                    name: "MALI-203".to_string(),
                    id: 203,
                    bluetooth_address: "00:00:00:00:00:00".to_string(),
                    service_uuid: Uuid::from_u128(0x00001101_0000_1000_8000_008055554444),
                },
            ],
        }
    }
}

impl Config {
    /// Load configuration from the config directory, writing the default
    /// file on first run.
    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roomctl");
        std::fs::create_dir_all(&config_dir)?;
        Self::load_from(&config_dir.join("config.toml"))
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the config directory.
    pub fn save(&self) -> Result<()> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roomctl");
        self.save_to(&config_dir.join("config.toml"))
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Look up a room by name (case-insensitive) or numeric id.
    pub fn room(&self, selector: &str) -> Option<&Room> {
        self.rooms.iter().find(|room| {
            room.name.eq_ignore_ascii_case(selector)
                || selector.parse::<u32>().is_ok_and(|id| id == room.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let config = Config::default();
        assert_eq!(config.rooms.len(), 3);
        assert_eq!(config.rooms[0].name, "MALI-201");
        assert_eq!(config.rooms[0].id, 201);
        assert_eq!(config.rooms[0].service_uuid, SPP_UUID);
        assert_eq!(config.bluetooth.write_delay(), Duration::from_millis(50));
        assert_eq!(config.bluetooth.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_room_lookup() {
        let config = Config::default();
        assert_eq!(config.room("mali-202").map(|r| r.id), Some(202));
        assert_eq!(config.room("203").map(|r| r.name.as_str()), Some("MALI-203"));
        assert!(config.room("MALI-999").is_none());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        // First load writes the default file.
        let written = Config::load_from(&path).unwrap();
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.rooms.len(), written.rooms.len());
        assert_eq!(reloaded.rooms[1].service_uuid, written.rooms[1].service_uuid);
        assert_eq!(
            reloaded.network.probe_endpoint,
            written.network.probe_endpoint
        );
    }
}
