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

//! Exercises two real `Protocol` instances over loopback TCP: one dials the
//! other's bootstrap address, and a broadcast from one arrives, verified,
//! at the other.

use gossip_price::core::observation::Observation;
use gossip_price::monitoring::metrics::Metrics;
use gossip_price::networking::protocol::{Protocol, ProtocolConfig};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn broadcast_reaches_a_dialed_peer() {
    let topic = "ethPrice-test-round-trip";

    let mut node_b = Protocol::start(
        ProtocolConfig {
            connection_addr: "/ip4/127.0.0.1/tcp/38911".to_string(),
            bootstrap_addr: String::new(),
            topic: topic.to_string(),
            is_bootstrap: false,
        },
        Arc::new(Metrics::new().unwrap()),
    )
    .await
    .unwrap();
    let b_peer_id = node_b.id();

    let node_a = Protocol::start(
        ProtocolConfig {
            connection_addr: "/ip4/127.0.0.1/tcp/38912".to_string(),
            bootstrap_addr: format!("/ip4/127.0.0.1/tcp/38911/p2p/{b_peer_id}"),
            topic: topic.to_string(),
            is_bootstrap: false,
        },
        Arc::new(Metrics::new().unwrap()),
    )
    .await
    .unwrap();

    let observation = Observation::new(2400.75);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);

    // Gossipsub mesh formation after the initial dial isn't instantaneous,
    // so retry the broadcast until node B reports a receipt or we time out.
    let received = loop {
        node_a.broadcast(&observation).await.unwrap();
        match tokio::time::timeout(Duration::from_secs(2), node_b.message()).await {
            Ok(Some(msg)) => break msg,
            _ if tokio::time::Instant::now() >= deadline => {
                panic!("node B never received the broadcast observation")
            }
            _ => continue,
        }
    };

    assert_eq!(received.message.msg_id, observation.msg_id);
    assert_eq!(received.message.price, observation.price);
    assert_eq!(received.topic, topic);
}

#[tokio::test]
async fn bootstrap_mode_node_cannot_broadcast() {
    let node = Protocol::start(
        ProtocolConfig {
            connection_addr: "/ip4/127.0.0.1/tcp/38913".to_string(),
            bootstrap_addr: String::new(),
            topic: "ethPrice-test-bootstrap".to_string(),
            is_bootstrap: true,
        },
        Arc::new(Metrics::new().unwrap()),
    )
    .await
    .unwrap();

    let observation = Observation::new(1.0);
    let err = node.broadcast(&observation).await.unwrap_err();
    assert!(matches!(err, gossip_price::networking::protocol::ProtocolError::EmptyTitle));
}
