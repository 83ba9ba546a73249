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

//! Exactly-once persistence of finalized records.

mod memory;
mod postgres;
pub mod record;

pub use memory::InMemoryPersistence;
pub use postgres::PostgresPersistence;
pub use record::FinalizedRecord;

use thiserror::Error;

/// Persistence error.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The record already exists (unique-key violation on `id`).
    #[error("record already exists")]
    Conflict,
    /// The backing store could not be reached or returned an error.
    #[error("store unavailable")]
    Unavailable,
}

/// Exactly-once sink for finalized records.
///
/// `exists` and `insert` together let the caller treat persistence as
/// idempotent: check before inserting to avoid a duplicate attempt after a
/// crash between insert and the next settle sweep, and treat a unique-key
/// conflict on insert itself as success rather than failure.
pub trait PersistenceAdapter: Send + Sync {
    /// Does a record with this `msg_id` already exist?
    fn exists(
        &self,
        msg_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, PersistenceError>> + Send;

    /// Insert a finalized record. A unique-key conflict on `id` is reported
    /// as `PersistenceError::Conflict`, which callers should treat the same
    /// as success (the record is, either way, durable).
    fn insert(
        &self,
        record: &FinalizedRecord,
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;
}
