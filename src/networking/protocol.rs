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

//! `Protocol`: the node-facing surface used by the rest of the program —
//! sign-and-broadcast an observation, receive others', bootstrap-role
//! semantics, and self-authored message filtering.

use crate::core::address::Address;
use crate::core::observation::{Observation, SignedObservation};
use crate::monitoring::metrics::Metrics;
use crate::networking::identity;
use crate::networking::node::{self, NodeError, NodeHandle};
use libp2p::identity::Keypair;
use libp2p::Multiaddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

/// A verified, received observation, annotated with who relayed it.
#[derive(Clone, Debug)]
pub struct ReceivedMessage {
    /// Address derived from the publishing peer's peer id.
    pub author: Address,
    /// Topic it arrived on.
    pub topic: String,
    /// The decoded, signature-checked observation.
    pub message: SignedObservation,
}

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying node/transport error.
    #[error("node error")]
    Node,
    /// A bootstrap-mode node was asked to broadcast, which it cannot do
    /// without being subscribed to the topic.
    #[error("empty title: bootstrap nodes do not broadcast")]
    EmptyTitle,
    /// Signing failed.
    #[error("signing failed")]
    Signing,
}

impl From<NodeError> for ProtocolError {
    fn from(_: NodeError) -> Self {
        ProtocolError::Node
    }
}

/// Configuration for starting a `Protocol`.
pub struct ProtocolConfig {
    /// Listen multiaddress.
    pub connection_addr: String,
    /// Bootstrap peer multiaddress (empty = no bootstrap dial/discovery).
    pub bootstrap_addr: String,
    /// Gossip topic.
    pub topic: String,
    /// Whether this node runs in bootstrap (rendezvous-only, non-subscribing) mode.
    pub is_bootstrap: bool,
}

/// The node-facing protocol surface: sign-and-broadcast, receive, bootstrap.
pub struct Protocol {
    id: libp2p::PeerId,
    node: NodeHandle,
    topic: String,
    is_bootstrap: bool,
    local_key: Keypair,
    msg_rx: mpsc::Receiver<ReceivedMessage>,
    _join: tokio::task::JoinHandle<()>,
}

impl Protocol {
    /// Start the node, subscribe (unless bootstrap-mode), and dial/bootstrap
    /// the configured peer.
    pub async fn start(cfg: ProtocolConfig, metrics: Arc<Metrics>) -> Result<Self, ProtocolError> {
        let (local_peer_id, local_key) = if cfg.is_bootstrap {
            identity::bootstrap_identity()
        } else {
            identity::fresh_identity()
        };

        let (handle, join) = node::spawn(local_key.clone(), &cfg.connection_addr, metrics)
            .map_err(|_| ProtocolError::Node)?;

        let (msg_tx, msg_rx) = mpsc::channel(256);

        if !cfg.is_bootstrap {
            let mut sub = handle
                .open_subscription(&cfg.topic)
                .await
                .map_err(ProtocolError::from)?;
            let topic = cfg.topic.clone();
            let self_id = local_peer_id;
            tokio::spawn(async move {
                while let Some(inbound) = sub.next().await {
                    if inbound.from == self_id {
                        continue;
                    }
                    let Ok(observation) = SignedObservation::decode(&inbound.data) else {
                        continue;
                    };
                    let author = Address::from_peer_id(&inbound.from);
                    let sent = msg_tx
                        .send(ReceivedMessage {
                            author,
                            topic: topic.clone(),
                            message: observation,
                        })
                        .await;
                    if sent.is_err() {
                        return;
                    }
                }
            });
        }

        if !cfg.bootstrap_addr.trim().is_empty() {
            if let Ok(addr) = cfg.bootstrap_addr.parse::<Multiaddr>() {
                if let Err(err) = handle.discover(vec![addr]).await {
                    warn!(?err, "dht bootstrap failed; continuing without it");
                }
            } else {
                warn!(addr = %cfg.bootstrap_addr, "bad bootstrap multiaddress; skipping");
            }
        }

        Ok(Self {
            id: local_peer_id,
            node: handle,
            topic: cfg.topic,
            is_bootstrap: cfg.is_bootstrap,
            local_key,
            msg_rx,
            _join: join,
        })
    }

    /// This node's own peer id.
    pub fn id(&self) -> libp2p::PeerId {
        self.id
    }

    /// Sign and broadcast an observation to the subscribed topic.
    /// Bootstrap-mode nodes never subscribe and so cannot broadcast.
    pub async fn broadcast(&self, observation: &Observation) -> Result<SignedObservation, ProtocolError> {
        if self.is_bootstrap {
            return Err(ProtocolError::EmptyTitle);
        }
        let signed = observation
            .sign(&self.local_key)
            .map_err(|_| ProtocolError::Signing)?;
        let bytes = signed.encode().map_err(|_| ProtocolError::Signing)?;
        self.node.publish(&self.topic, bytes).await?;
        Ok(signed)
    }

    /// Receive the next verified observation from a peer.
    pub async fn message(&mut self) -> Option<ReceivedMessage> {
        self.msg_rx.recv().await
    }
}
