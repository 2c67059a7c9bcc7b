// Copyright 2024 FerroStore Team
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

use ferrostore_common::{evict_connection, GLOBAL_CONN_MAP};
use std::{error::Error, time::Duration};
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, warn};

pub mod proto_gen {
    pub mod node_service {
        tonic::include_proto!("node_service");
    }
}

use proto_gen::node_service::node_service_client::NodeServiceClient;

/// Timeout for connection establishment - kept low for fast failure detection.
const CONNECT_TIMEOUT_SECS: u64 = 3;

/// TCP keepalive interval - how often to probe the connection.
const TCP_KEEPALIVE_SECS: u64 = 10;

/// HTTP/2 keepalive interval - application-layer heartbeat.
const HTTP2_KEEPALIVE_INTERVAL_SECS: u64 = 5;

/// HTTP/2 keepalive timeout - how long to wait for PING ACK.
const HTTP2_KEEPALIVE_TIMEOUT_SECS: u64 = 3;

/// Overall RPC timeout - maximum time for any single RPC operation.
const RPC_TIMEOUT_SECS: u64 = 30;

/// Creates a new gRPC channel with keepalive settings tuned for cluster
/// resilience:
/// - Fast connection timeout (3s instead of default 30s+)
/// - Aggressive TCP keepalive (10s)
/// - HTTP/2 PING every 5s, timeout at 3s
/// - Overall RPC timeout of 30s
async fn create_new_channel(addr: &str) -> Result<Channel, Box<dyn Error + Send + Sync>> {
    debug!("Creating new gRPC channel to: {}", addr);

    let connector = Endpoint::from_shared(addr.to_string())?
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .http2_keep_alive_interval(Duration::from_secs(HTTP2_KEEPALIVE_INTERVAL_SECS))
        .keep_alive_timeout(Duration::from_secs(HTTP2_KEEPALIVE_TIMEOUT_SECS))
        // Send PINGs even when no active streams, so idle peers are probed.
        .keep_alive_while_idle(true)
        .timeout(Duration::from_secs(RPC_TIMEOUT_SECS));

    let channel = connector.connect().await?;

    {
        GLOBAL_CONN_MAP.write().await.insert(addr.to_string(), channel.clone());
    }

    debug!("Successfully created and cached gRPC channel to: {}", addr);
    Ok(channel)
}

/// Get a gRPC client for the NodeService.
///
/// Cached channels are reused for subsequent calls; on any RPC failure
/// the caller should evict via [`evict_failed_connection`] so the next
/// call establishes a fresh connection.
pub async fn node_service_time_out_client(addr: &String) -> Result<NodeServiceClient<Channel>, Box<dyn Error + Send + Sync>> {
    debug!("Obtaining gRPC client for NodeService at: {}", addr);

    let cached_channel = { GLOBAL_CONN_MAP.read().await.get(addr).cloned() };

    let channel = match cached_channel {
        Some(channel) => {
            debug!("Using cached gRPC channel for: {}", addr);
            channel
        }
        None => create_new_channel(addr).await?,
    };

    Ok(NodeServiceClient::new(channel))
}

/// Evict a connection from the cache after a failure, so fresh
/// connections are tried on the next call.
pub async fn evict_failed_connection(addr: &str) {
    warn!("Evicting failed gRPC connection: {}", addr);
    evict_connection(addr).await;
}
