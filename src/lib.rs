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

//! Room appliance control core.
//!
//! Controls classroom appliances (AC, projector) through an ESP32 bridge,
//! reachable over a Bluetooth RFCOMM serial link or indirectly through a
//! shared room-status store. The session arbiter picks one active control
//! channel at a time, prefers Bluetooth whenever it is connected, and falls
//! back to the network path when it is not.

pub mod bluetooth;
pub mod cloud;
pub mod command;
pub mod config;
pub mod error;
pub mod monitor;
pub mod session;
pub mod state;

pub use command::{Command, Device};
pub use error::ControlError;
pub use session::RoomSession;
pub use state::{ActiveChannel, DeviceState};
