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

//! Socket factory behind the Bluetooth channel.
//!
//! The channel owns connection lifecycle and framing; the connector only
//! produces a serial-style stream for an endpoint. Tests inject in-memory
//! connectors through the same seam.

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ControlError;

/// Byte stream with serial semantics, as produced by a connector.
pub trait SerialStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> SerialStream for T {}

/// Factory for serial-style connections to a remote SPP endpoint.
pub trait SppConnector: Send + Sync {
    /// Open a stream to the endpoint. Adapter problems surface as
    /// `TransportUnavailable`, everything else as `ConnectFailure`.
    fn connect<'a>(
        &'a self,
        address: &'a str,
        service_uuid: Uuid,
    ) -> BoxFuture<'a, Result<Box<dyn SerialStream>, ControlError>>;
}

/// Real RFCOMM connector backed by BlueZ.
pub struct RfcommConnector {
    channel: u8,
}

impl RfcommConnector {
    /// `channel` is the RFCOMM channel the bridge registers its SPP service
    /// on. SDP resolution of the service UUID is left to BlueZ; the UUID is
    /// logged for the connection attempt.
    pub fn new(channel: u8) -> Self {
        Self { channel }
    }
}

impl SppConnector for RfcommConnector {
    fn connect<'a>(
        &'a self,
        address: &'a str,
        service_uuid: Uuid,
    ) -> BoxFuture<'a, Result<Box<dyn SerialStream>, ControlError>> {
        Box::pin(async move {
            let session = bluer::Session::new()
                .await
                .map_err(|_| ControlError::TransportUnavailable)?;
            let adapter = session
                .default_adapter()
                .await
                .map_err(|_| ControlError::TransportUnavailable)?;
            if !adapter
                .is_powered()
                .await
                .map_err(|_| ControlError::TransportUnavailable)?
            {
                return Err(ControlError::TransportUnavailable);
            }

            let peer: bluer::Address = address
                .parse()
                .map_err(|err| ControlError::ConnectFailure(format!("bad address: {err}")))?;

            debug!(%address, %service_uuid, channel = self.channel, "opening RFCOMM socket");
            let stream =
                bluer::rfcomm::Stream::connect(bluer::rfcomm::SocketAddr::new(peer, self.channel))
                    .await
                    .map_err(|err| ControlError::ConnectFailure(err.to_string()))?;

            info!(%address, "RFCOMM socket open");
            Ok(Box::new(stream) as Box<dyn SerialStream>)
        })
    }
}
