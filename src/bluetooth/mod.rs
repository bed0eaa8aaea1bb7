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

//! Bluetooth communication module.
//!
//! RFCOMM client link to the ESP32 bridge: connector seam, channel with read
//! loop, and the newline-delimited JSON protocol.

mod channel;
mod connector;
mod protocol;

pub use channel::{BluetoothChannel, ChannelEvent};
pub use connector::{RfcommConnector, SerialStream, SppConnector};
pub use protocol::{OutboundFrame, PowerState, StatusReport};
