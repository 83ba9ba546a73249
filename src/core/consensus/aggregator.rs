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

//! Per-`msg_id` signature aggregation, quorum detection, and the settle
//! sweep that hands finalized observations to persistence.

use crate::core::address::Address;
use crate::core::observation::SignedObservation;
use crate::core::persistence::{FinalizedRecord, PersistenceAdapter, PersistenceError};
use crate::monitoring::metrics::Metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Per-`msg_id` aggregation state.
struct AggregationEntry {
    signatures: Vec<SignedObservation>,
    originator: Address,
    finalized: bool,
}

struct Inner {
    by_id: HashMap<String, AggregationEntry>,
    settling: Vec<SignedObservation>,
}

/// Collects signatures per `msg_id`, detects quorum, and settles finalized
/// observations to persistence after `settle_seconds` have elapsed since the
/// quorum-crossing signature was produced.
///
/// `by_id` and `settling` are guarded by a single lock rather than two, so
/// the settle sweep can read a `msg_id`'s full signature list while holding
/// the same lock that protects the settling queue (spec.md §5's "the
/// settle-sweep reads `by_id` while holding the `settling` lock" is
/// satisfied by construction, not by convention).
pub struct Aggregator<P: PersistenceAdapter> {
    inner: Mutex<Inner>,
    quorum: usize,
    settle_seconds: u64,
    persistence: Arc<P>,
    metrics: Arc<Metrics>,
}

impl<P: PersistenceAdapter + 'static> Aggregator<P> {
    /// Construct an aggregator requiring `quorum` distinct signatures before
    /// a `msg_id` is eligible for settlement, and a `settle_seconds` aging
    /// delay before it is actually written.
    pub fn new(quorum: usize, settle_seconds: u64, persistence: Arc<P>, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_id: HashMap::new(),
                settling: Vec::new(),
            }),
            quorum: quorum.max(1),
            settle_seconds,
            persistence,
            metrics,
        }
    }

    /// Number of signatures collected so far for `msg_id`.
    pub async fn signed_count(&self, msg_id: &str) -> usize {
        self.inner
            .lock()
            .await
            .by_id
            .get(msg_id)
            .map(|e| e.signatures.len())
            .unwrap_or(0)
    }

    /// Has `signer` already contributed a signature for `msg_id`?
    pub async fn already_signed(&self, msg_id: &str, signer: Address) -> bool {
        self.inner
            .lock()
            .await
            .by_id
            .get(msg_id)
            .map(|e| e.signatures.iter().any(|s| s.signer == signer))
            .unwrap_or(false)
    }

    /// Record a signature. Returns `true` while `msg_id` is still below
    /// quorum, `false` the moment it crosses quorum for the first time.
    /// Callers are expected to have already checked `already_signed` (the
    /// aggregator itself does not reject a repeat signer — see DESIGN.md).
    ///
    /// Signatures received after the crossing point are still recorded (a
    /// later sweep may want the fuller list), but only the first crossing
    /// enqueues the `msg_id` for settlement.
    pub async fn append(&self, observation: SignedObservation) -> bool {
        let mut inner = self.inner.lock().await;
        let is_new_id = !inner.by_id.contains_key(&observation.msg_id);
        let entry = inner
            .by_id
            .entry(observation.msg_id.clone())
            .or_insert_with(|| AggregationEntry {
                signatures: Vec::new(),
                originator: observation.signer,
                finalized: false,
            });
        entry.signatures.push(observation.clone());

        let crossed = !entry.finalized && entry.signatures.len() >= self.quorum;
        if crossed {
            entry.finalized = true;
            inner.settling.push(observation);
        }

        if is_new_id {
            self.metrics.aggregator_tracked_ids.inc();
        }
        if crossed {
            self.metrics.aggregator_quorum_reached_total.inc();
            self.metrics.aggregator_settling_queue_len.set(inner.settling.len() as i64);
        }

        !crossed
    }

    /// Run the settle sweep until `cancel` fires: every `settle_seconds`,
    /// age out the settling queue and attempt persistence for entries old
    /// enough to write.
    pub async fn run_settle_sweep(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.settle_seconds));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// One sweep pass: drains `settling`, retaining anything not yet aged
    /// past `settle_seconds` or whose persistence attempt failed.
    async fn sweep_once(&self) {
        let mut inner = self.inner.lock().await;
        let now = chrono::Utc::now();
        let pending = std::mem::take(&mut inner.settling);
        let mut remaining = Vec::with_capacity(pending.len());

        for observation in pending {
            let age = now.signed_duration_since(observation.signed_time);
            if age.num_seconds() < self.settle_seconds as i64 {
                remaining.push(observation);
                continue;
            }

            match self.persistence.exists(&observation.msg_id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(_) => {
                    self.metrics.persistence_retry_total.inc();
                    remaining.push(observation);
                    continue;
                }
            }

            let Some(entry) = inner.by_id.get(&observation.msg_id) else {
                continue;
            };
            if entry.signatures.len() < self.quorum {
                remaining.push(observation);
                continue;
            }
            let record = FinalizedRecord::assemble(
                &observation.msg_id,
                observation.price,
                &entry.originator.to_hex(),
                &entry.signatures,
                observation.signed_time,
            );
            match self.persistence.insert(&record).await {
                Ok(()) => self.metrics.persistence_inserted_total.inc(),
                Err(PersistenceError::Conflict) => self.metrics.persistence_conflict_total.inc(),
                Err(PersistenceError::Unavailable) => {
                    self.metrics.persistence_retry_total.inc();
                    remaining.push(observation);
                }
            }
        }

        inner.settling = remaining;
        self.metrics
            .aggregator_settling_queue_len
            .set(inner.settling.len() as i64);
    }

    /// Exercises one sweep pass directly, without waiting on the ticker.
    /// Used by integration tests that need deterministic timing.
    pub async fn sweep_once_for_tests(&self) {
        self.sweep_once().await;
    }

    /// Number of distinct `msg_id`s currently tracked (for metrics).
    pub async fn tracked_ids(&self) -> usize {
        self.inner.lock().await.by_id.len()
    }

    /// Number of observations currently waiting out the settle delay (for
    /// metrics, and exercised directly by tests).
    pub async fn settling_len(&self) -> usize {
        self.inner.lock().await.settling.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observation::Observation;
    use crate::core::persistence::InMemoryPersistence;
    use libp2p::identity::Keypair;

    fn signed(price: f64, msg_id: Option<&str>) -> SignedObservation {
        let key = Keypair::generate_ed25519();
        let mut obs = Observation::new(price);
        if let Some(id) = msg_id {
            obs.msg_id = id.to_string();
        }
        obs.sign(&key).unwrap()
    }

    fn test_metrics() -> Arc<Metrics> {
        Arc::new(Metrics::new().unwrap())
    }

    #[tokio::test]
    async fn append_returns_true_below_quorum_false_at_crossing() {
        let store = Arc::new(InMemoryPersistence::new());
        let agg = Aggregator::new(3, 30, store, test_metrics());
        let a = signed(1.0, Some("m1"));
        let b = SignedObservation {
            msg_id: "m1".to_string(),
            ..signed(1.0, Some("m1"))
        };
        let c = SignedObservation {
            msg_id: "m1".to_string(),
            ..signed(1.0, Some("m1"))
        };

        assert!(agg.append(a).await);
        assert!(agg.append(b).await);
        assert!(!agg.append(c).await);
        assert_eq!(agg.signed_count("m1").await, 3);
    }

    #[tokio::test]
    async fn further_signatures_after_quorum_do_not_re_enqueue() {
        let store = Arc::new(InMemoryPersistence::new());
        let agg = Aggregator::new(2, 30, store, test_metrics());
        let msg_id = "m2";
        for _ in 0..4 {
            agg.append(SignedObservation {
                msg_id: msg_id.to_string(),
                ..signed(1.0, Some(msg_id))
            })
            .await;
        }
        assert_eq!(agg.signed_count(msg_id).await, 4);
        assert_eq!(agg.settling_len().await, 1);
    }

    #[tokio::test]
    async fn already_signed_detects_repeat_signer() {
        let store = Arc::new(InMemoryPersistence::new());
        let agg = Aggregator::new(3, 30, store, test_metrics());
        let key = Keypair::generate_ed25519();
        let obs = Observation::new(1.0);
        let signed = obs.sign(&key).unwrap();
        let signer = signed.signer;

        assert!(!agg.already_signed(&obs.msg_id, signer).await);
        agg.append(signed).await;
        assert!(agg.already_signed(&obs.msg_id, signer).await);
    }

    #[tokio::test]
    async fn sweep_persists_once_aged_past_settle_seconds() {
        let store = Arc::new(InMemoryPersistence::new());
        let agg = Aggregator::new(1, 0, Arc::clone(&store), test_metrics());
        let obs = signed(42.0, None);
        let msg_id = obs.msg_id.clone();
        agg.append(obs).await;

        agg.sweep_once().await;

        assert_eq!(agg.settling_len().await, 0);
        assert_eq!(store.ids(), vec![msg_id]);
    }

    #[tokio::test]
    async fn sweep_keeps_unaged_entries_in_queue() {
        let store = Arc::new(InMemoryPersistence::new());
        let agg = Aggregator::new(1, 30, Arc::clone(&store), test_metrics());
        agg.append(signed(1.0, None)).await;

        agg.sweep_once().await;

        assert_eq!(agg.settling_len().await, 1);
        assert!(store.ids().is_empty());
    }
}
