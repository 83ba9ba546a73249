// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! gossip-price node entrypoint (systemd-friendly).
//! Starts the P2P protocol, the metrics endpoint, and the settle sweep,
//! and keeps the process alive until SIGINT.

use std::sync::Arc;

use gossip_price::core::config::Config;
use gossip_price::monitoring::http;
use gossip_price::monitoring::metrics::Metrics;
use gossip_price::server::Server;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let config = Config::from_env();
    let metrics = match Metrics::new() {
        Ok(m) => Arc::new(m),
        Err(err) => {
            eprintln!("metrics init failed: {err}");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();

    let metrics_addr = config.metrics_addr.clone();
    let metrics_for_http = (*metrics).clone();
    let metrics_cancel = cancel.clone();
    let metrics_task = tokio::spawn(async move {
        http::serve(&metrics_addr, metrics_for_http, metrics_cancel).await
    });

    info!(bootstrap = config.bootstrap, "gossip-price node starting");

    let server = match Server::new(config, Arc::clone(&metrics)).await {
        Ok(server) => server,
        Err(err) => {
            error!(?err, "failed to start node");
            std::process::exit(1);
        }
    };

    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
        }
        shutdown_cancel.cancel();
    });

    server.run(cancel).await;

    if let Ok(Err(err)) = metrics_task.await {
        error!(?err, "metrics endpoint exited with error");
    }
}
