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

//! The swarm-driving task: owns the libp2p `Swarm` and services a command
//! channel so the rest of the program never has to touch it directly.
//!
//! A `Swarm` cannot safely be shared across tasks, so every mutation —
//! subscribe, publish, connect, DHT bootstrap — is funneled through
//! `Command`s processed in a single `tokio::select!` loop alongside swarm
//! events, mirroring the teacher's `p2p::spawn_p2p` event loop.

use crate::core::observation::SignedObservation;
use crate::monitoring::metrics::Metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use libp2p::{
    core::upgrade,
    gossipsub::{self, IdentTopic, MessageAuthenticity},
    identify, kad, noise, ping,
    swarm::{NetworkBehaviour, Swarm, SwarmEvent},
    tcp, yamux, identity::Keypair, identity::PublicKey, Multiaddr, PeerId, Transport,
};
use libp2p::futures::StreamExt;
use libp2p::swarm::Config as SwarmConfig;

/// A message received from a subscribed topic.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Peer that published the message, per gossipsub's signed authenticity.
    pub from: PeerId,
    /// Topic it arrived on.
    pub topic: String,
    /// Raw payload bytes (still encoded; callers decode).
    pub data: Vec<u8>,
}

/// Node errors.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The listen or dial multiaddress did not parse.
    #[error("bad multiaddress")]
    BadAddress,
    /// Transport setup (noise/gossipsub) failed.
    #[error("transport setup failed")]
    Transport,
    /// Already subscribed to this topic.
    #[error("already subscribed")]
    AlreadySubscribed,
    /// Not subscribed to this topic.
    #[error("not subscribed")]
    NotSubscribed,
    /// `publish` was called with an empty payload.
    #[error("empty payload")]
    EmptyPayload,
    /// The swarm-driving task is gone.
    #[error("node shut down")]
    ShutDown,
    /// Kademlia bootstrap failed. Non-fatal: gossip still works without DHT
    /// discovery, but callers should log this (spec.md §9 REDESIGN FLAG:
    /// surfaced rather than swallowed).
    #[error("dht bootstrap failed")]
    DiscoveryFailed,
}

enum Command {
    Subscribe {
        topic: String,
        reply: oneshot::Sender<Result<mpsc::Receiver<InboundMessage>, NodeError>>,
    },
    Unsubscribe {
        topic: String,
    },
    Publish {
        topic: String,
        data: Vec<u8>,
        reply: oneshot::Sender<Result<(), NodeError>>,
    },
    Connect {
        addr: Multiaddr,
        reply: oneshot::Sender<Result<(), NodeError>>,
    },
    Discover {
        addrs: Vec<Multiaddr>,
        reply: oneshot::Sender<Result<(), NodeError>>,
    },
}

/// Handle to the swarm-driving task. Cloning shares the same command
/// channel; the task itself stops once every handle (and the node's own
/// internal clone) is dropped.
#[derive(Clone)]
pub struct NodeHandle {
    pub(crate) local_peer_id: PeerId,
    cmd_tx: mpsc::Sender<Command>,
}

impl NodeHandle {
    /// This node's own peer id.
    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    /// Subscribe to `topic`, returning a receiver of inbound messages.
    pub async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<InboundMessage>, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Subscribe {
                topic: topic.to_string(),
                reply,
            })
            .await
            .map_err(|_| NodeError::ShutDown)?;
        rx.await.map_err(|_| NodeError::ShutDown)?
    }

    /// Unsubscribe from `topic`; the associated receiver channel closes.
    pub async fn unsubscribe(&self, topic: &str) -> Result<(), NodeError> {
        self.cmd_tx
            .send(Command::Unsubscribe {
                topic: topic.to_string(),
            })
            .await
            .map_err(|_| NodeError::ShutDown)
    }

    /// Publish raw bytes to `topic`.
    pub async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), NodeError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Publish {
                topic: topic.to_string(),
                data,
                reply,
            })
            .await
            .map_err(|_| NodeError::ShutDown)?;
        rx.await.map_err(|_| NodeError::ShutDown)?
    }

    /// Dial a peer directly.
    pub async fn connect(&self, addr: Multiaddr) -> Result<(), NodeError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect { addr, reply })
            .await
            .map_err(|_| NodeError::ShutDown)?;
        rx.await.map_err(|_| NodeError::ShutDown)?
    }

    /// Seed the Kademlia routing table with `addrs` and bootstrap the DHT.
    pub async fn discover(&self, addrs: Vec<Multiaddr>) -> Result<(), NodeError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Discover { addrs, reply })
            .await
            .map_err(|_| NodeError::ShutDown)?;
        rx.await.map_err(|_| NodeError::ShutDown)?
    }

    /// Subscribe to `topic` and wrap the resulting channel in a
    /// `Subscription` handle.
    pub async fn open_subscription(
        &self,
        topic: &str,
    ) -> Result<super::subscription::Subscription, NodeError> {
        let rx = self.subscribe(topic).await?;
        Ok(super::subscription::Subscription::new(
            topic.to_string(),
            self.clone(),
            rx,
        ))
    }
}

#[derive(Debug)]
enum BehaviourEvent {
    Gossipsub(gossipsub::Event),
    Identify(identify::Event),
    Kad(kad::Event),
    Ping(ping::Event),
}
impl From<gossipsub::Event> for BehaviourEvent {
    fn from(e: gossipsub::Event) -> Self {
        Self::Gossipsub(e)
    }
}
impl From<identify::Event> for BehaviourEvent {
    fn from(e: identify::Event) -> Self {
        Self::Identify(e)
    }
}
impl From<kad::Event> for BehaviourEvent {
    fn from(e: kad::Event) -> Self {
        Self::Kad(e)
    }
}
impl From<ping::Event> for BehaviourEvent {
    fn from(e: ping::Event) -> Self {
        Self::Ping(e)
    }
}

#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "BehaviourEvent")]
struct Behaviour {
    gossipsub: gossipsub::Behaviour,
    identify: identify::Behaviour,
    kad: kad::Behaviour<kad::store::MemoryStore>,
    ping: ping::Behaviour,
}

/// Spawn the swarm-driving task and return a `NodeHandle` to it.
pub fn spawn(
    local_key: Keypair,
    listen_addr: &str,
    metrics: Arc<Metrics>,
) -> Result<(NodeHandle, tokio::task::JoinHandle<()>), NodeError> {
    let local_peer_id = PeerId::from(local_key.public());
    let listen: Multiaddr = listen_addr.parse().map_err(|_| NodeError::BadAddress)?;

    let noise_keys = noise::Config::new(&local_key).map_err(|_| NodeError::Transport)?;
    let transport = tcp::tokio::Transport::new(tcp::Config::default().nodelay(true))
        .upgrade(upgrade::Version::V1)
        .authenticate(noise_keys)
        .multiplex(yamux::Config::default())
        .boxed();

    let gossipsub_config = gossipsub::ConfigBuilder::default()
        .validation_mode(gossipsub::ValidationMode::Strict)
        .validate_messages()
        .heartbeat_interval(Duration::from_secs(1))
        .build()
        .map_err(|_| NodeError::Transport)?;
    let gossipsub = gossipsub::Behaviour::new(
        MessageAuthenticity::Signed(local_key.clone()),
        gossipsub_config,
    )
    .map_err(|_| NodeError::Transport)?;

    let identify = identify::Behaviour::new(identify::Config::new(
        "gossip-price/1.0.0".to_string(),
        local_key.public(),
    ));

    let kad_store = kad::store::MemoryStore::new(local_peer_id);
    let kad = kad::Behaviour::new(local_peer_id, kad_store);

    let ping = ping::Behaviour::new(
        ping::Config::new()
            .with_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(20)),
    );

    let behaviour = Behaviour {
        gossipsub,
        identify,
        kad,
        ping,
    };

    let mut swarm = Swarm::new(
        transport,
        behaviour,
        local_peer_id,
        SwarmConfig::with_tokio_executor(),
    );
    swarm.listen_on(listen).map_err(|_| NodeError::Transport)?;

    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let join = tokio::spawn(run(swarm, cmd_rx, metrics));

    Ok((
        NodeHandle {
            local_peer_id,
            cmd_tx,
        },
        join,
    ))
}

async fn run(mut swarm: Swarm<Behaviour>, mut cmd_rx: mpsc::Receiver<Command>, metrics: Arc<Metrics>) {
    let mut subs: HashMap<String, mpsc::Sender<InboundMessage>> = HashMap::new();
    let mut topics: HashMap<String, IdentTopic> = HashMap::new();
    let mut known_keys: HashMap<PeerId, PublicKey> = HashMap::new();

    metrics.p2p_peers.set(0);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Subscribe { topic, reply }) => {
                        let _ = reply.send(handle_subscribe(&mut swarm, &mut subs, &mut topics, topic));
                    }
                    Some(Command::Unsubscribe { topic }) => {
                        if let Some(t) = topics.remove(&topic) {
                            let _ = swarm.behaviour_mut().gossipsub.unsubscribe(&t);
                        }
                        subs.remove(&topic);
                    }
                    Some(Command::Publish { topic, data, reply }) => {
                        let result = if data.is_empty() {
                            Err(NodeError::EmptyPayload)
                        } else {
                            match topics.get(&topic) {
                                Some(t) => swarm
                                    .behaviour_mut()
                                    .gossipsub
                                    .publish(t.clone(), data)
                                    .map(|_| ())
                                    .map_err(|_| NodeError::NotSubscribed),
                                None => Err(NodeError::NotSubscribed),
                            }
                        };
                        if result.is_ok() {
                            metrics.p2p_published_total.inc();
                        }
                        let _ = reply.send(result);
                    }
                    Some(Command::Connect { addr, reply }) => {
                        let result = swarm.dial(addr).map_err(|_| NodeError::Transport);
                        let _ = reply.send(result);
                    }
                    Some(Command::Discover { addrs, reply }) => {
                        let _ = reply.send(handle_discover(&mut swarm, addrs));
                    }
                    None => {
                        info!("command channel closed; stopping node task");
                        return;
                    }
                }
            }

            ev = swarm.select_next_some() => {
                handle_swarm_event(ev, &mut swarm, &mut subs, &mut known_keys, &metrics).await;
            }
        }
    }
}

fn handle_subscribe(
    swarm: &mut Swarm<Behaviour>,
    subs: &mut HashMap<String, mpsc::Sender<InboundMessage>>,
    topics: &mut HashMap<String, IdentTopic>,
    topic: String,
) -> Result<mpsc::Receiver<InboundMessage>, NodeError> {
    if subs.contains_key(&topic) {
        return Err(NodeError::AlreadySubscribed);
    }
    let ident = IdentTopic::new(topic.clone());
    swarm
        .behaviour_mut()
        .gossipsub
        .subscribe(&ident)
        .map_err(|_| NodeError::Transport)?;
    let (tx, rx) = mpsc::channel(256);
    subs.insert(topic.clone(), tx);
    topics.insert(topic, ident);
    Ok(rx)
}

fn handle_discover(swarm: &mut Swarm<Behaviour>, addrs: Vec<Multiaddr>) -> Result<(), NodeError> {
    if addrs.is_empty() {
        return Ok(());
    }
    for addr in &addrs {
        let Some(peer_id) = extract_peer_id(addr) else {
            continue;
        };
        swarm.behaviour_mut().kad.add_address(&peer_id, addr.clone());
    }
    swarm
        .behaviour_mut()
        .kad
        .bootstrap()
        .map(|_| ())
        .map_err(|_| NodeError::DiscoveryFailed)
}

fn extract_peer_id(addr: &Multiaddr) -> Option<PeerId> {
    addr.iter().find_map(|proto| match proto {
        libp2p::multiaddr::Protocol::P2p(peer_id) => Some(peer_id),
        _ => None,
    })
}

async fn handle_swarm_event(
    ev: SwarmEvent<BehaviourEvent>,
    swarm: &mut Swarm<Behaviour>,
    subs: &mut HashMap<String, mpsc::Sender<InboundMessage>>,
    known_keys: &mut HashMap<PeerId, PublicKey>,
    metrics: &Arc<Metrics>,
) {
    match ev {
        SwarmEvent::NewListenAddr { address, .. } => {
            info!(addr = %address, "listening");
        }
        SwarmEvent::ConnectionEstablished { peer_id, .. } => {
            metrics.p2p_peers.inc();
            info!(%peer_id, "peer connected");
        }
        SwarmEvent::ConnectionClosed { peer_id, .. } => {
            metrics.p2p_peers.dec();
            known_keys.remove(&peer_id);
            info!(%peer_id, "peer disconnected");
        }
        SwarmEvent::Behaviour(BehaviourEvent::Identify(identify::Event::Received {
            peer_id,
            info,
            ..
        })) => {
            for addr in &info.listen_addrs {
                swarm.behaviour_mut().kad.add_address(&peer_id, addr.clone());
            }
            known_keys.insert(peer_id, info.public_key);
        }
        SwarmEvent::Behaviour(BehaviourEvent::Gossipsub(gossipsub::Event::Message {
            propagation_source,
            message_id,
            message,
        })) => {
            let acceptance = validate(&message.data, &propagation_source, known_keys);
            let _ = swarm
                .behaviour_mut()
                .gossipsub
                .report_message_validation_result(&message_id, &propagation_source, acceptance);

            if acceptance == gossipsub::MessageAcceptance::Accept {
                metrics.p2p_received_total.inc();
                let topic = message.topic.as_str().to_string();
                if let Some(tx) = subs.get(&topic) {
                    let _ = tx
                        .send(InboundMessage {
                            from: propagation_source,
                            topic,
                            data: message.data,
                        })
                        .await;
                }
            } else {
                metrics.p2p_invalid_msg_total.inc();
            }
        }
        SwarmEvent::Behaviour(BehaviourEvent::Kad(kad::Event::OutboundQueryProgressed {
            ..
        })) => {}
        _ => {}
    }
}

/// Parse and verify a gossiped payload before it is ever handed to a
/// subscriber. Unknown signers (identify hasn't completed yet) are
/// `Ignore`d rather than rejected, since this is a timing race rather than
/// evidence of a bad actor.
fn validate(
    data: &[u8],
    source: &PeerId,
    known_keys: &HashMap<PeerId, PublicKey>,
) -> gossipsub::MessageAcceptance {
    let Ok(observation) = SignedObservation::decode(data) else {
        return gossipsub::MessageAcceptance::Reject;
    };
    match known_keys.get(source) {
        Some(key) => match observation.verify(key) {
            Ok(()) => gossipsub::MessageAcceptance::Accept,
            Err(_) => gossipsub::MessageAcceptance::Reject,
        },
        None => gossipsub::MessageAcceptance::Ignore,
    }
}
