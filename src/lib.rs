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

//! gossip-price - a peer-to-peer ETH/USD price attestation network.
//!
//! This repository provides:
//! - Signed price observations gossiped over libp2p pubsub, with
//!   DHT-assisted peer discovery
//! - A quorum aggregator that collects co-signatures across the network
//!   and settles each attestation exactly once to Postgres
//! - Monitoring via Prometheus metrics and structured logging

/// Core protocol primitives (addresses, observations, consensus, persistence).
pub mod core;
/// Observability (metrics, HTTP scrape endpoint).
pub mod monitoring;
/// P2P networking stack (libp2p transport, gossip topics, protocol façade).
pub mod networking;
/// The orchestrator tying networking, consensus, and persistence together.
pub mod server;
