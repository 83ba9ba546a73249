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

//! A lightweight handle to one gossip topic: publish, and read what comes
//! back, without touching the swarm directly.

use super::node::{InboundMessage, NodeError, NodeHandle};
use tokio::sync::mpsc;

/// Handle to a single subscribed topic.
pub struct Subscription {
    topic: String,
    node: NodeHandle,
    inbound: mpsc::Receiver<InboundMessage>,
}

impl Subscription {
    pub(crate) fn new(topic: String, node: NodeHandle, inbound: mpsc::Receiver<InboundMessage>) -> Self {
        Self {
            topic,
            node,
            inbound,
        }
    }

    /// The topic this subscription is for.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish raw bytes to this topic. Fails if `data` is empty or the
    /// underlying transport refuses the message.
    pub async fn publish(&self, data: Vec<u8>) -> Result<(), NodeError> {
        self.node.publish(&self.topic, data).await
    }

    /// Wait for the next inbound message, or `None` once the subscription
    /// is torn down.
    pub async fn next(&mut self) -> Option<InboundMessage> {
        self.inbound.recv().await
    }

    /// Unsubscribe; any further `next()` calls return `None`.
    pub async fn close(self) -> Result<(), NodeError> {
        self.node.unsubscribe(&self.topic).await
    }
}
