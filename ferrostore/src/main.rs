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

use clap::Parser;
use ferrostore::config::Opt;
use ferrostore::error::Result as ApiResult;
use ferrostore::peer_rpc_client::PeerRpcClient;
use ferrostore::server::ServerContext;
use ferrostore::storage::{MemObjectStore, ObjectLayer};
use ferrostore::{grpc, profiling, version};
use ferrostore_utils::retry::{new_retry_timer, MAX_JITTER};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_env("FERROSTORE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Brings the storage backend up, pacing retries with the exponential
/// backoff timer. A cluster wake-up short-circuits the delay so format
/// state is re-read immediately after a heal elsewhere.
async fn init_object_layer(ctx: &Arc<ServerContext>, volumes: &[String]) {
    let cancel = CancellationToken::new();
    let mut attempts = new_retry_timer(
        Duration::from_secs(1),
        Duration::from_secs(30),
        MAX_JITTER,
        ctx.subscribe_wakeup(),
        cancel.clone(),
    );

    while let Some(attempt) = attempts.recv().await {
        if attempt > 0 {
            info!("Initializing storage backend.. (attempt {})", attempt + 1);
        }
        match prepare_object_layer(volumes).await {
            Ok(layer) => {
                ctx.set_object_layer(layer);
                break;
            }
            Err(err) => warn!("Storage backend not ready: {}; retrying", err),
        }
    }
    cancel.cancel();
}

async fn prepare_object_layer(volumes: &[String]) -> ApiResult<Arc<dyn ObjectLayer>> {
    info!("Exported volumes: {}", volumes.join(", "));
    Ok(Arc::new(MemObjectStore::new()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::parse();
    init_logging();

    info!("FerroStore Object Storage Server");
    info!("Version: {}", version::get_version());

    profiling::start_profiling_if_enabled();

    opt.validate()?;
    let creds = opt.credentials()?;

    let peers = opt
        .peers
        .iter()
        .map(|node| Arc::new(PeerRpcClient::new(node.clone(), creds.clone())))
        .collect();

    let ctx = Arc::new(ServerContext::new(opt.address.clone(), peers));
    ctx.set_credentials(creds);

    init_object_layer(&ctx, &opt.volumes).await;

    let addr: SocketAddr = opt.address.parse()?;
    info!("Control plane listening on {}", addr);

    tonic::transport::Server::builder()
        .add_service(grpc::make_server(ctx.clone()))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    profiling::stop_profiling();
    Ok(())
}
