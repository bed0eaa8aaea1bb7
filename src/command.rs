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

//! Appliance commands as constructed by the UI layer.

use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Lowest selectable AC temperature.
pub const AC_TEMP_MIN: i32 = 16;

/// Highest selectable AC temperature.
pub const AC_TEMP_MAX: i32 = 30;

/// Controllable appliance in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "PROJECTOR")]
    Projector,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ac => "AC",
            Self::Projector => "PROJECTOR",
        }
    }
}

/// Action requested for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandAction {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
    #[serde(rename = "TEMP")]
    Temp,
}

impl CommandAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
            Self::Temp => "TEMP",
        }
    }
}

/// A single control command. Constructed by UI, consumed by the session;
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub device: Device,
    pub action: CommandAction,
    pub value: Option<i32>,
}

impl Command {
    /// Power a device on or off.
    pub fn power(device: Device, on: bool) -> Self {
        Self {
            device,
            action: if on { CommandAction::On } else { CommandAction::Off },
            value: None,
        }
    }

    /// Set the AC temperature. Values outside 16..=30 are rejected here,
    /// before the command can reach the session.
    pub fn ac_temperature(value: i32) -> Result<Self, ControlError> {
        if !(AC_TEMP_MIN..=AC_TEMP_MAX).contains(&value) {
            return Err(ControlError::TemperatureOutOfRange { value });
        }
        Ok(Self {
            device: Device::Ac,
            action: CommandAction::Temp,
            value: Some(value),
        })
    }

    /// Human-readable rendering used for status messages and the
    /// `last_command` bookkeeping field, e.g. `AC_TEMP_24`.
    pub fn summary(&self) -> String {
        match self.value {
            Some(value) => format!("{}_{}_{}", self.device.as_str(), self.action.as_str(), value),
            None => format!("{}_{}", self.device.as_str(), self.action.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_bounds() {
        assert!(Command::ac_temperature(16).is_ok());
        assert!(Command::ac_temperature(30).is_ok());
        assert!(matches!(
            Command::ac_temperature(31),
            Err(ControlError::TemperatureOutOfRange { value: 31 })
        ));
        assert!(matches!(
            Command::ac_temperature(15),
            Err(ControlError::TemperatureOutOfRange { value: 15 })
        ));
    }

    #[test]
    fn test_summary_format() {
        assert_eq!(Command::power(Device::Ac, true).summary(), "AC_ON");
        assert_eq!(Command::power(Device::Projector, false).summary(), "PROJECTOR_OFF");
        assert_eq!(Command::ac_temperature(24).unwrap().summary(), "AC_TEMP_24");
    }
}
