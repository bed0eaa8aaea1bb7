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

//! Internet connectivity signal.
//!
//! "Online" means the active network path has been validated reachable, not
//! merely that an interface is up. The session treats this purely as an input
//! signal delivered through a watch channel.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Publisher side of a manually fed connectivity signal. Hosts that already
/// receive platform connectivity callbacks push them through this handle.
pub struct ConnectivityHandle {
    tx: watch::Sender<bool>,
}

impl ConnectivityHandle {
    pub fn set_online(&self, online: bool) {
        if *self.tx.borrow() != online {
            info!(online, "connectivity changed");
        }
        self.tx.send_replace(online);
    }
}

/// Boolean online signal with current value + change notifications.
pub struct ConnectivityMonitor {
    rx: watch::Receiver<bool>,
    probe_task: Option<JoinHandle<()>>,
}

impl ConnectivityMonitor {
    /// Manually fed monitor; used in tests and by host-driven callbacks.
    pub fn manual(initial: bool) -> (ConnectivityHandle, Self) {
        let (tx, rx) = watch::channel(initial);
        (
            ConnectivityHandle { tx },
            Self {
                rx,
                probe_task: None,
            },
        )
    }

    /// Monitor that validates reachability by timed TCP connect to a probe
    /// endpoint on a fixed interval.
    pub fn probing(endpoint: String, interval: Duration, timeout: Duration) -> Self {
        let (tx, rx) = watch::channel(false);
        let probe_task = tokio::spawn(async move {
            loop {
                let online = matches!(
                    tokio::time::timeout(timeout, TcpStream::connect(endpoint.as_str())).await,
                    Ok(Ok(_))
                );
                if *tx.borrow() != online {
                    info!(online, endpoint = %endpoint, "connectivity changed");
                } else {
                    debug!(online, "connectivity probe");
                }
                tx.send_replace(online);

                tokio::time::sleep(interval).await;
                if tx.is_closed() {
                    break;
                }
            }
        });
        Self {
            rx,
            probe_task: Some(probe_task),
        }
    }

    pub fn online(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.probe_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_signal() {
        let (handle, monitor) = ConnectivityMonitor::manual(false);
        assert!(!monitor.online());

        let mut rx = monitor.subscribe();
        handle.set_online(true);
        rx.changed().await.unwrap();
        assert!(monitor.online());
    }
}
