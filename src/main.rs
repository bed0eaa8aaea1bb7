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

//! Roomctl Desktop Companion

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roomctl::bluetooth::RfcommConnector;
use roomctl::cloud::{MemoryStatusStore, StatusStore};
use roomctl::config::Config;
use roomctl::monitor::ConnectivityMonitor;
use roomctl::session::RoomSession;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("roomctl=info".parse().unwrap()),
        )
        .init();

    info!("Starting Roomctl v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded, {} rooms in catalog", config.rooms.len());

    // Pick the room to control from the first argument (name or id)
    let room = match std::env::args().nth(1) {
        Some(selector) => config
            .room(&selector)
            .cloned()
            .with_context(|| format!("room '{}' not found in catalog", selector))?,
        None => config
            .rooms
            .first()
            .cloned()
            .context("no rooms configured")?,
    };
    info!("Controlling room {}", room.name);

    // Connectivity monitor validating reachability against the probe endpoint
    let monitor = ConnectivityMonitor::probing(
        config.network.probe_endpoint.clone(),
        config.network.probe_interval(),
        config.network.probe_timeout(),
    );

    // Status store stand-in; the deployed store is an external service
    let store: Arc<dyn StatusStore> = Arc::new(MemoryStatusStore::new());

    let connector = Box::new(RfcommConnector::new(config.bluetooth.rfcomm_channel));
    let session = RoomSession::open(
        room,
        connector,
        &config.bluetooth,
        store,
        monitor.subscribe(),
        false,
    );

    let mut state_rx = session.state();
    let mut active_rx = session.active_channel();
    let mut message_rx = session.status_message();

    info!("Ready. Press Ctrl-C to leave the room.");

    loop {
        tokio::select! {
            Ok(()) = state_rx.changed() => {
                let state = *state_rx.borrow_and_update();
                info!(
                    ac = state.ac_power,
                    temperature = state.ac_temperature,
                    projector = state.projector_power,
                    peer_online = state.peer_online,
                    "room state"
                );
            }
            Ok(()) = active_rx.changed() => {
                info!(channel = active_rx.borrow_and_update().as_str(), "active channel");
            }
            Ok(()) = message_rx.changed() => {
                info!("{}", message_rx.borrow_and_update().as_str());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    session.close().await;
    info!("Roomctl stopped");
    Ok(())
}
