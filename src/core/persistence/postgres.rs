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

//! Postgres-backed `PersistenceAdapter`.

use super::record::FinalizedRecord;
use super::{PersistenceAdapter, PersistenceError};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Error as SqlxError, PgPool};

const CREATE_RATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS rate (
    id              TEXT PRIMARY KEY,
    price           TEXT NOT NULL,
    first_signer    TEXT NOT NULL,
    sign_data       TEXT NOT NULL,
    lastsigned_time TIMESTAMPTZ NOT NULL,
    created_time    TIMESTAMPTZ NOT NULL
)
"#;

/// Postgres connection pool plus the `rate` table it owns.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Connect to `database_url` and ensure the `rate` table exists.
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|_| PersistenceError::Unavailable)?;
        sqlx::query(CREATE_RATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|_| PersistenceError::Unavailable)?;
        Ok(Self { pool })
    }
}

impl PersistenceAdapter for PostgresPersistence {
    async fn exists(&self, msg_id: &str) -> Result<bool, PersistenceError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM rate WHERE id = $1")
            .bind(msg_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| PersistenceError::Unavailable)?;
        Ok(row.is_some())
    }

    async fn insert(&self, record: &FinalizedRecord) -> Result<(), PersistenceError> {
        let res = sqlx::query(
            "INSERT INTO rate (id, price, first_signer, sign_data, lastsigned_time, created_time)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.id)
        .bind(&record.price)
        .bind(&record.first_signer)
        .bind(&record.sign_data)
        .bind(record.lastsigned_time)
        .bind(record.created_time)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(SqlxError::Database(db_err)) if db_err.is_unique_violation() => {
                Err(PersistenceError::Conflict)
            }
            Err(_) => Err(PersistenceError::Unavailable),
        }
    }
}
