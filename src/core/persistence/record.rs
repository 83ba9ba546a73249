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

//! The finalized record written to the `rate` table.

use crate::core::observation::SignedObservation;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A quorum-reached observation, assembled for persistence.
///
/// Mirrors the `rate` table schema from the reference implementation: price
/// is stored as a fixed 2-decimal string, and the first three signer/
/// signature pairs are folded into `sign_data` as a JSON blob rather than
/// given their own columns.
#[derive(Clone, Debug)]
pub struct FinalizedRecord {
    /// `msg_id`, primary key.
    pub id: String,
    /// Price, formatted to 2 decimal places.
    pub price: String,
    /// Hex address of whichever signer first produced this `msg_id`.
    pub first_signer: String,
    /// JSON blob: `first_/second_/third_{Signer,Signature}`.
    pub sign_data: String,
    /// Signing time of the quorum-crossing signature.
    pub lastsigned_time: DateTime<Utc>,
    /// Time this record was assembled for insertion.
    pub created_time: DateTime<Utc>,
}

#[derive(Serialize)]
struct SignData {
    first_signer: String,
    first_signature: String,
    second_signer: String,
    second_signature: String,
    third_signer: String,
    third_signature: String,
}

impl FinalizedRecord {
    /// Build a record from the first three signatures collected for
    /// `msg_id`, with `first_signer` carried separately as whoever
    /// authored the very first signature seen.
    ///
    /// `signatures` must contain at least three entries; callers only call
    /// this once quorum (>= 3) has been reached.
    pub fn assemble(
        msg_id: &str,
        price: f64,
        first_signer_hex: &str,
        signatures: &[SignedObservation],
        quorum_signed_time: DateTime<Utc>,
    ) -> Self {
        let sign_data = SignData {
            first_signer: signatures[0].signer.to_hex(),
            first_signature: signatures[0].signature.to_hex(),
            second_signer: signatures[1].signer.to_hex(),
            second_signature: signatures[1].signature.to_hex(),
            third_signer: signatures[2].signer.to_hex(),
            third_signature: signatures[2].signature.to_hex(),
        };
        FinalizedRecord {
            id: msg_id.to_string(),
            price: format!("{:.2}", price),
            first_signer: first_signer_hex.to_string(),
            sign_data: serde_json::to_string(&sign_data)
                .unwrap_or_else(|_| "{}".to_string()),
            lastsigned_time: quorum_signed_time,
            created_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observation::Observation;
    use libp2p::identity::Keypair;

    #[test]
    fn assembles_sign_data_from_first_three_signatures() {
        let obs = Observation::new(1800.0);
        let sigs: Vec<SignedObservation> = (0..3)
            .map(|_| {
                let key = Keypair::generate_ed25519();
                obs.sign(&key).unwrap()
            })
            .collect();
        let record = FinalizedRecord::assemble(
            &obs.msg_id,
            obs.price,
            &sigs[0].signer.to_hex(),
            &sigs,
            sigs[2].signed_time,
        );
        assert_eq!(record.price, "1800.00");
        assert!(record.sign_data.contains("first_signer"));
        assert!(record.sign_data.contains(&sigs[1].signer.to_hex()));
    }
}
