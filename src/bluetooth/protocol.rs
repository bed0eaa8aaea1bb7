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

//! Wire protocol shared with the ESP32 bridge.
//!
//! Both directions carry newline-delimited UTF-8 lines, each line one JSON
//! object. Inbound status reports are partial: any absent key leaves the
//! corresponding state field untouched.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandAction, Device};
use crate::error::ControlError;

/// Appliance power state as encoded on the wire and in the status store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl PowerState {
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Frames sent to the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum OutboundFrame {
    /// Ask the bridge to emit the IR command for a device.
    #[serde(rename = "sendIR")]
    SendIr {
        device: Device,
        command: CommandAction,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<i32>,
    },
    /// Ask the bridge to report its full current state immediately.
    #[serde(rename = "requestStatus")]
    RequestStatus,
}

impl OutboundFrame {
    /// Build the command frame for a UI command.
    pub fn command(command: &Command) -> Self {
        Self::SendIr {
            device: command.device,
            command: command.action,
            value: command.value,
        }
    }

    pub fn status_request() -> Self {
        Self::RequestStatus
    }

    /// Serialize to a JSON line, newline terminator included so the bridge
    /// reads up to the end of the frame.
    pub fn to_line(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Partial status report received from the bridge. Every key is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac_status: Option<PowerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac_temperature: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projector_status: Option<PowerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_connected: Option<bool>,
}

impl StatusReport {
    /// Parse one complete inbound line. A malformed line fails as a whole;
    /// no field of a bad message is ever applied.
    pub fn from_line(line: &str) -> Result<Self, ControlError> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frame_serialization() {
        let frame = OutboundFrame::command(&Command::power(Device::Projector, true));
        let line = frame.to_line().unwrap();
        assert_eq!(line, "{\"action\":\"sendIR\",\"device\":\"PROJECTOR\",\"command\":\"ON\"}\n");

        let frame = OutboundFrame::command(&Command::ac_temperature(22).unwrap());
        let line = frame.to_line().unwrap();
        assert_eq!(
            line,
            "{\"action\":\"sendIR\",\"device\":\"AC\",\"command\":\"TEMP\",\"value\":22}\n"
        );
    }

    #[test]
    fn test_status_request_serialization() {
        let line = OutboundFrame::status_request().to_line().unwrap();
        assert_eq!(line, "{\"action\":\"requestStatus\"}\n");
    }

    #[test]
    fn test_partial_report_parsing() {
        let report = StatusReport::from_line("{\"ac_status\":\"ON\"}\n").unwrap();
        assert_eq!(report.ac_status, Some(PowerState::On));
        assert_eq!(report.ac_temperature, None);
        assert_eq!(report.projector_status, None);
        assert_eq!(report.wifi_connected, None);

        let report = StatusReport::from_line(
            "{\"ac_status\":\"OFF\",\"ac_temperature\":26,\"projector_status\":\"ON\",\"wifi_connected\":true}",
        )
        .unwrap();
        assert_eq!(report.ac_status, Some(PowerState::Off));
        assert_eq!(report.ac_temperature, Some(26));
        assert_eq!(report.projector_status, Some(PowerState::On));
        assert_eq!(report.wifi_connected, Some(true));
    }

    #[test]
    fn test_malformed_report_rejected() {
        assert!(StatusReport::from_line("not json").is_err());
        // A bad value drops the whole message, including valid keys.
        assert!(StatusReport::from_line("{\"ac_status\":\"ON\",\"ac_temperature\":\"hot\"}").is_err());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let report = StatusReport::from_line("{\"uptime\":12}").unwrap();
        assert_eq!(report, StatusReport::default());
    }
}
