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

//! Failure taxonomy for the transport and arbitration layers.
//!
//! None of these are fatal to the process: transport failures are converted
//! to boolean/status outcomes at the boundary, and the session escalates only
//! by switching channel or surfacing a transient status message.

use thiserror::Error;

/// Errors produced by the transports and the connection arbiter.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The Bluetooth adapter is missing, unpowered, or otherwise unusable.
    #[error("bluetooth adapter unavailable")]
    TransportUnavailable,

    /// I/O, permission, or timeout failure while establishing a connection.
    #[error("bluetooth connect failed: {0}")]
    ConnectFailure(String),

    /// I/O failure while sending; the channel disconnects itself.
    #[error("bluetooth write failed: {0}")]
    WriteFailure(String),

    /// I/O failure while receiving; terminates the read loop.
    #[error("bluetooth read failed: {0}")]
    ReadFailure(String),

    /// Malformed inbound payload. The message is dropped whole; no field is
    /// applied to the state model.
    #[error("malformed inbound payload: {0}")]
    ParseFailure(#[from] serde_json::Error),

    /// A command was submitted while no control channel is active.
    #[error("no active control channel")]
    NoActiveChannel,

    /// The shared status store rejected or failed an update.
    #[error("remote status update failed: {0}")]
    RemoteUpdateFailure(String),

    /// AC temperature outside the supported range. Rejected at the UI
    /// boundary; the session never sees such a command.
    #[error("temperature {value} outside supported range 16-30")]
    TemperatureOutOfRange { value: i32 },
}
