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

//! Simulates a fleet of nodes, each running its own `Aggregator` against one
//! shared store, the way three independently-deployed processes would. No
//! real transport is involved — signatures are handed to each node's
//! aggregator directly, mirroring what the network layer would have
//! delivered after co-sign propagation.

use gossip_price::core::consensus::aggregator::Aggregator;
use gossip_price::core::observation::{Observation, SignedObservation};
use gossip_price::core::persistence::InMemoryPersistence;
use gossip_price::monitoring::metrics::Metrics;
use libp2p::identity::Keypair;
use std::sync::Arc;

fn co_sign(msg_id: &str, price: f64) -> SignedObservation {
    let key = Keypair::generate_ed25519();
    let obs = Observation {
        msg_id: msg_id.to_string(),
        price,
    };
    obs.sign(&key).unwrap()
}

fn test_metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new().unwrap())
}

#[tokio::test]
async fn three_nodes_converge_on_one_persisted_record() {
    let store = Arc::new(InMemoryPersistence::new());

    let node_a = Aggregator::new(3, 0, Arc::clone(&store), test_metrics());
    let node_b = Aggregator::new(3, 0, Arc::clone(&store), test_metrics());
    let node_c = Aggregator::new(3, 0, Arc::clone(&store), test_metrics());

    let msg_id = "m1";
    let sig_a = co_sign(msg_id, 1800.00);
    let sig_b = co_sign(msg_id, 1800.00);
    let sig_c = co_sign(msg_id, 1800.00);

    // Every node eventually observes all three signatures, in varying
    // arrival order, as gossip and co-sign relaying would deliver them.
    assert!(node_a.append(sig_a.clone()).await);
    assert!(node_a.append(sig_b.clone()).await);
    assert!(!node_a.append(sig_c.clone()).await); // crosses quorum here

    assert!(node_b.append(sig_b.clone()).await);
    assert!(node_b.append(sig_a.clone()).await);
    assert!(!node_b.append(sig_c.clone()).await);

    assert!(node_c.append(sig_c.clone()).await);
    assert!(node_c.append(sig_a.clone()).await);
    assert!(!node_c.append(sig_b.clone()).await);

    // All three nodes' settle sweeps race on the same store; only one write
    // survives, the other two see the row already exists.
    node_a.sweep_once_for_tests().await;
    node_b.sweep_once_for_tests().await;
    node_c.sweep_once_for_tests().await;

    assert_eq!(store.ids(), vec![msg_id.to_string()]);
    assert_eq!(node_a.settling_len().await, 0);
    assert_eq!(node_b.settling_len().await, 0);
    assert_eq!(node_c.settling_len().await, 0);
}

#[tokio::test]
async fn quorum_never_reached_with_only_two_distinct_signers() {
    let store = Arc::new(InMemoryPersistence::new());
    let node = Aggregator::new(3, 0, Arc::clone(&store), test_metrics());

    let msg_id = "m2";
    assert!(node.append(co_sign(msg_id, 1800.00)).await);
    assert!(node.append(co_sign(msg_id, 1800.00)).await);

    node.sweep_once_for_tests().await;

    assert_eq!(node.signed_count(msg_id).await, 2);
    assert!(store.ids().is_empty());
}

#[tokio::test]
async fn settle_delay_holds_back_a_freshly_crossed_quorum() {
    let store = Arc::new(InMemoryPersistence::new());
    let node = Aggregator::new(3, 3600, Arc::clone(&store), test_metrics());

    let msg_id = "m3";
    node.append(co_sign(msg_id, 1800.00)).await;
    node.append(co_sign(msg_id, 1800.00)).await;
    node.append(co_sign(msg_id, 1800.00)).await;

    node.sweep_once_for_tests().await;

    assert_eq!(node.settling_len().await, 1);
    assert!(store.ids().is_empty());
}
