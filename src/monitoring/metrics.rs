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

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Connected peers gauge.
    pub p2p_peers: IntGauge,
    /// Messages published to the gossip topic.
    pub p2p_published_total: IntCounter,
    /// Messages received from the gossip topic.
    pub p2p_received_total: IntCounter,
    /// Messages rejected by the topic validator (malformed or bad signature).
    pub p2p_invalid_msg_total: IntCounter,

    /// Observations currently tracked in the aggregator.
    pub aggregator_tracked_ids: IntGauge,
    /// Observations that crossed quorum.
    pub aggregator_quorum_reached_total: IntCounter,
    /// Observations currently waiting out the settle delay.
    pub aggregator_settling_queue_len: IntGauge,

    /// Records successfully persisted.
    pub persistence_inserted_total: IntCounter,
    /// Persist attempts that found the record already present.
    pub persistence_conflict_total: IntCounter,
    /// Persist attempts that failed and were retried on the next sweep.
    pub persistence_retry_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let p2p_peers =
            IntGauge::new("gossip_price_p2p_peers", "Connected peers").map_err(|_| MetricsError::Prom)?;
        let p2p_published_total = IntCounter::new(
            "gossip_price_p2p_published_total",
            "Messages published to the gossip topic",
        )
        .map_err(|_| MetricsError::Prom)?;
        let p2p_received_total = IntCounter::new(
            "gossip_price_p2p_received_total",
            "Messages received from the gossip topic",
        )
        .map_err(|_| MetricsError::Prom)?;
        let p2p_invalid_msg_total = IntCounter::new(
            "gossip_price_p2p_invalid_msg_total",
            "Messages rejected by the topic validator",
        )
        .map_err(|_| MetricsError::Prom)?;

        let aggregator_tracked_ids = IntGauge::new(
            "gossip_price_aggregator_tracked_ids",
            "Observations currently tracked in the aggregator",
        )
        .map_err(|_| MetricsError::Prom)?;
        let aggregator_quorum_reached_total = IntCounter::new(
            "gossip_price_aggregator_quorum_reached_total",
            "Observations that crossed quorum",
        )
        .map_err(|_| MetricsError::Prom)?;
        let aggregator_settling_queue_len = IntGauge::new(
            "gossip_price_aggregator_settling_queue_len",
            "Observations currently waiting out the settle delay",
        )
        .map_err(|_| MetricsError::Prom)?;

        let persistence_inserted_total = IntCounter::new(
            "gossip_price_persistence_inserted_total",
            "Records successfully persisted",
        )
        .map_err(|_| MetricsError::Prom)?;
        let persistence_conflict_total = IntCounter::new(
            "gossip_price_persistence_conflict_total",
            "Persist attempts that found the record already present",
        )
        .map_err(|_| MetricsError::Prom)?;
        let persistence_retry_total = IntCounter::new(
            "gossip_price_persistence_retry_total",
            "Persist attempts that failed and were retried",
        )
        .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(p2p_peers.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(p2p_published_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(p2p_received_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(p2p_invalid_msg_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(aggregator_tracked_ids.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(aggregator_quorum_reached_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(aggregator_settling_queue_len.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(persistence_inserted_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(persistence_conflict_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(persistence_retry_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            p2p_peers,
            p2p_published_total,
            p2p_received_total,
            p2p_invalid_msg_total,
            aggregator_tracked_ids,
            aggregator_quorum_reached_total,
            aggregator_settling_queue_len,
            persistence_inserted_total,
            persistence_conflict_total,
            persistence_retry_total,
        })
    }
}
