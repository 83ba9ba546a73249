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

//! Orchestrator: fetch-and-broadcast, inbound co-signing, and the
//! aggregator's settle sweep, all running under one `CancellationToken`.
//!
//! The price-fetch loop and the inbound message loop are merged into a
//! single `tokio::select!` rather than run as two independent tasks — the
//! reference implementation runs them concurrently with no shared lock
//! around the aggregator's append path, which is a data race on the
//! underlying map. Merging them here means every `aggregator.append` call
//! for this node's own activity happens from one task; the aggregator's
//! own internal lock (see `core::consensus::aggregator`) covers the
//! remaining concurrency with the settle sweep.

use crate::core::config::Config;
use crate::core::consensus::aggregator::Aggregator;
use crate::core::observation::Observation;
use crate::core::persistence::{PersistenceAdapter, PostgresPersistence};
use crate::core::price::fetch_eth_price;
use crate::monitoring::metrics::Metrics;
use crate::networking::protocol::{Protocol, ProtocolConfig, ProtocolError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not reach the configured Postgres instance.
    #[error("persistence unavailable")]
    Persistence,
    /// The networking protocol failed to start.
    #[error("protocol start failed")]
    Protocol,
}

impl From<ProtocolError> for ServerError {
    fn from(_: ProtocolError) -> Self {
        ServerError::Protocol
    }
}

/// The running node: protocol handle, aggregator, and an HTTP client for
/// the price source.
pub struct Server<P: PersistenceAdapter> {
    config: Config,
    protocol: Protocol,
    aggregator: Arc<Aggregator<P>>,
    http_client: reqwest::Client,
}

impl Server<PostgresPersistence> {
    /// Build a server backed by Postgres persistence, per `config`.
    pub async fn new(config: Config, metrics: Arc<Metrics>) -> Result<Self, ServerError> {
        let persistence = PostgresPersistence::connect(&config.database_url)
            .await
            .map_err(|_| ServerError::Persistence)?;
        Self::with_persistence(config, Arc::new(persistence), metrics).await
    }
}

impl<P: PersistenceAdapter + 'static> Server<P> {
    /// Build a server with a caller-supplied persistence adapter (the
    /// Postgres-backed path goes through `Server::new`; tests use
    /// `InMemoryPersistence` directly).
    pub async fn with_persistence(
        config: Config,
        persistence: Arc<P>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ServerError> {
        let aggregator = Arc::new(Aggregator::new(
            config.minimum_signer_count,
            config.settle_seconds,
            persistence,
            Arc::clone(&metrics),
        ));

        let protocol = Protocol::start(
            ProtocolConfig {
                connection_addr: config.connection_addr.clone(),
                bootstrap_addr: config.bootstrap_addr.clone(),
                topic: config.topic.clone(),
                is_bootstrap: config.bootstrap,
            },
            Arc::clone(&metrics),
        )
        .await?;

        info!(
            bootstrap = config.bootstrap,
            peer_id = %protocol.id(),
            "node started"
        );

        Ok(Self {
            config,
            protocol,
            aggregator,
            http_client: reqwest::Client::new(),
        })
    }

    /// Run until `cancel` fires. Bootstrap-mode nodes only exist to answer
    /// DHT queries and accept connections, so they have nothing to do here
    /// beyond waiting; non-bootstrap nodes run the fetch/co-sign/settle
    /// loops.
    pub async fn run(mut self, cancel: CancellationToken) {
        let sweep_handle = tokio::spawn(Arc::clone(&self.aggregator).run_settle_sweep(cancel.clone()));

        if self.config.bootstrap {
            cancel.cancelled().await;
        } else {
            let mut fetch_ticker =
                tokio::time::interval(Duration::from_secs(self.config.fetch_price_interval_secs));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = fetch_ticker.tick() => {
                        self.fetch_and_broadcast().await;
                    }
                    received = self.protocol.message() => {
                        match received {
                            Some(msg) => self.handle_received(msg).await,
                            None => {
                                warn!("protocol message channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        }

        sweep_handle.abort();
        info!("server shut down");
    }

    async fn fetch_and_broadcast(&mut self) {
        let price = fetch_eth_price(&self.http_client).await;
        if price == 0.0 {
            return;
        }
        let observation = Observation::new(price);
        match self.protocol.broadcast(&observation).await {
            Ok(signed) => {
                if !self.aggregator.already_signed(&signed.msg_id, signed.signer).await {
                    self.aggregator.append(signed).await;
                }
            }
            Err(err) => warn!(?err, "failed to broadcast price observation"),
        }
    }

    /// An inbound observation from a peer: record it, and if it is still
    /// short of quorum, co-sign it with this node's own key and re-publish
    /// so the next hop's signature count moves forward. This is how a
    /// single observation accumulates N distinct signatures across a
    /// network with no single node ever seeing all N signers directly.
    async fn handle_received(&mut self, received: crate::networking::protocol::ReceivedMessage) {
        let observation = received.message;
        if self
            .aggregator
            .already_signed(&observation.msg_id, observation.signer)
            .await
        {
            return;
        }

        let below_quorum = self.aggregator.append(observation.clone()).await;
        if below_quorum {
            let unsigned = Observation {
                msg_id: observation.msg_id.clone(),
                price: observation.price,
            };
            if let Err(err) = self.protocol.broadcast(&unsigned).await {
                warn!(?err, "failed to co-sign and re-broadcast observation");
            }
        }
    }
}
