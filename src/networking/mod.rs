#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Networking: libp2p transport, gossip topics, and the protocol façade.

pub mod identity;
pub mod node;
pub mod protocol;
pub mod subscription;
