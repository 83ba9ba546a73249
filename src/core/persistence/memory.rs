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

//! In-memory `PersistenceAdapter` for tests.

use super::record::FinalizedRecord;
use super::{PersistenceAdapter, PersistenceError};
use std::collections::HashMap;
use std::sync::Mutex;

/// A `Mutex`-guarded map standing in for Postgres in tests.
#[derive(Default)]
pub struct InMemoryPersistence {
    rows: Mutex<HashMap<String, FinalizedRecord>>,
}

impl InMemoryPersistence {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of currently stored record ids, for assertions in tests.
    pub fn ids(&self) -> Vec<String> {
        self.rows.lock().unwrap().keys().cloned().collect()
    }
}

impl PersistenceAdapter for InMemoryPersistence {
    async fn exists(&self, msg_id: &str) -> Result<bool, PersistenceError> {
        Ok(self.rows.lock().unwrap().contains_key(msg_id))
    }

    async fn insert(&self, record: &FinalizedRecord) -> Result<(), PersistenceError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&record.id) {
            return Err(PersistenceError::Conflict);
        }
        rows.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observation::Observation;
    use libp2p::identity::Keypair;

    #[tokio::test]
    async fn insert_then_exists() {
        let store = InMemoryPersistence::new();
        let obs = Observation::new(1234.5);
        let key = Keypair::generate_ed25519();
        let signed = obs.sign(&key).unwrap();
        let record = FinalizedRecord::assemble(
            &obs.msg_id,
            obs.price,
            &signed.signer.to_hex(),
            &[signed.clone(), signed.clone(), signed.clone()],
            signed.signed_time,
        );

        assert!(!store.exists(&record.id).await.unwrap());
        store.insert(&record).await.unwrap();
        assert!(store.exists(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_insert_is_conflict() {
        let store = InMemoryPersistence::new();
        let obs = Observation::new(1.0);
        let key = Keypair::generate_ed25519();
        let signed = obs.sign(&key).unwrap();
        let record = FinalizedRecord::assemble(
            &obs.msg_id,
            obs.price,
            &signed.signer.to_hex(),
            &[signed.clone(), signed.clone(), signed.clone()],
            signed.signed_time,
        );

        store.insert(&record).await.unwrap();
        let err = store.insert(&record).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict));
    }
}
