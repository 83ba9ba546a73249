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

//! The signed price observation and its wire codec.
//!
//! The signature covers only the 8-byte big-endian bit pattern of `price` —
//! `msg_id`, `signer`, and `signed_time` are not covered. This is
//! byte-for-byte what the reference implementation signs; see DESIGN.md for
//! why it is kept that way instead of widened.

use crate::core::address::Address;
use chrono::{DateTime, SecondsFormat, Utc};
use libp2p::identity::{Keypair, PeerId, PublicKey};
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// An unsigned price claim.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// Freshly generated unique identifier for this observation.
    pub msg_id: String,
    /// Observed price.
    pub price: f64,
}

impl Observation {
    /// Construct an observation with a fresh UUID-class `msg_id`.
    pub fn new(price: f64) -> Self {
        Self {
            msg_id: uuid::Uuid::new_v4().to_string(),
            price,
        }
    }

    /// Sign this observation with `key`, producing a `SignedObservation`.
    pub fn sign(&self, key: &Keypair) -> Result<SignedObservation, SigningError> {
        let payload = price_signing_bytes(self.price);
        let signature = key.sign(&payload).map_err(|_| SigningError::Sign)?;
        let signer = Address::from_peer_id(&PeerId::from(key.public()));
        Ok(SignedObservation {
            msg_id: self.msg_id.clone(),
            price: self.price,
            signer,
            signature: Signature(signature),
            signed_time: Utc::now(),
        })
    }
}

/// Canonical signing input: the 8-byte big-endian IEEE-754 bit pattern of
/// `price` alone.
pub fn price_signing_bytes(price: f64) -> [u8; 8] {
    price.to_bits().to_be_bytes()
}

/// Opaque signature bytes, hex-encoded on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Lowercase hex encoding, no `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim()).map_err(DeError::custom)?;
        Ok(Signature(bytes))
    }
}

/// Signing error.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The underlying key rejected the message.
    #[error("signing failed")]
    Sign,
}

/// Verification error.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// `signer` is not a well-formed public-key-derived address we can check.
    #[error("signer key unavailable")]
    UnknownSigner,
    /// Signature did not verify.
    #[error("bad signature")]
    BadSignature,
}

/// Decode error.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Malformed JSON, or a required field was missing.
    #[error("decode failed")]
    Malformed,
}

/// A price observation plus signer, signature, and signing time.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedObservation {
    /// Unique identifier, shared by every co-signer of the same observation.
    pub msg_id: String,
    /// Observed price.
    pub price: f64,
    /// Address derived from the signer's peer id.
    pub signer: Address,
    /// Signature over `price_signing_bytes(price)`.
    pub signature: Signature,
    /// Time the signer produced this signature. Set once, at signing;
    /// receivers must not overwrite it.
    pub signed_time: DateTime<Utc>,
}

impl SignedObservation {
    /// Encode as the canonical wire JSON (spec.md §3).
    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        serde_json::to_vec(&WireForm::from(self)).map_err(|_| DecodeError::Malformed)
    }

    /// Decode from the canonical wire JSON. Unknown fields are ignored;
    /// missing required fields fail.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireForm = serde_json::from_slice(bytes).map_err(|_| DecodeError::Malformed)?;
        wire.try_into()
    }

    /// Verify the signature against the claimed signer's public key.
    ///
    /// The wire form only carries a 20-byte *address*, not the full public
    /// key, so this accepts the public key out of band (the libp2p message
    /// source, which the gossip layer already authenticates) and checks it
    /// hashes to `signer` before verifying the signature itself.
    pub fn verify(&self, signer_public_key: &PublicKey) -> Result<(), VerifyError> {
        let derived = Address::from_peer_id(&PeerId::from(signer_public_key.clone()));
        if derived != self.signer {
            return Err(VerifyError::UnknownSigner);
        }
        let payload = price_signing_bytes(self.price);
        if signer_public_key.verify(&payload, &self.signature.0) {
            Ok(())
        } else {
            Err(VerifyError::BadSignature)
        }
    }
}

/// The exact wire shape from spec.md §3.
#[derive(Serialize, Deserialize)]
struct WireForm {
    id: String,
    price: f64,
    signer: Address,
    signature: Signature,
    signed_time: String,
}

impl From<&SignedObservation> for WireForm {
    fn from(s: &SignedObservation) -> Self {
        WireForm {
            id: s.msg_id.clone(),
            price: s.price,
            signer: s.signer,
            signature: s.signature.clone(),
            signed_time: s.signed_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl TryFrom<WireForm> for SignedObservation {
    type Error = DecodeError;

    fn try_from(w: WireForm) -> Result<Self, Self::Error> {
        let signed_time = DateTime::parse_from_rfc3339(&w.signed_time)
            .map_err(|_| DecodeError::Malformed)?
            .with_timezone(&Utc);
        Ok(SignedObservation {
            msg_id: w.id,
            price: w.price,
            signer: w.signer,
            signature: w.signature,
            signed_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_encode_decode_roundtrip() {
        let key = Keypair::generate_ed25519();
        let obs = Observation::new(1800.55);
        let signed = obs.sign(&key).unwrap();

        let bytes = signed.encode().unwrap();
        let decoded = SignedObservation::decode(&bytes).unwrap();

        assert_eq!(decoded.msg_id, signed.msg_id);
        assert_eq!(decoded.price, signed.price);
        assert_eq!(decoded.signer, signed.signer);
        assert_eq!(decoded.signature, signed.signature);
        // Second-precision round-trip only (spec.md §4.1).
        assert_eq!(
            decoded.signed_time.timestamp(),
            signed.signed_time.timestamp()
        );
    }

    #[test]
    fn signature_verifies_against_signer_public_key() {
        let key = Keypair::generate_ed25519();
        let obs = Observation::new(2400.0);
        let signed = obs.sign(&key).unwrap();

        signed.verify(&key.public()).expect("should verify");
    }

    #[test]
    fn signature_rejects_tampered_price() {
        let key = Keypair::generate_ed25519();
        let obs = Observation::new(2400.0);
        let mut signed = obs.sign(&key).unwrap();
        signed.price = 9999.0;

        assert!(signed.verify(&key.public()).is_err());
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let key = Keypair::generate_ed25519();
        let signed = Observation::new(1.0).sign(&key).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_slice(&signed.encode().unwrap()).unwrap();
        value["extra"] = serde_json::json!("ignored");
        let bytes = serde_json::to_vec(&value).unwrap();

        let decoded = SignedObservation::decode(&bytes).unwrap();
        assert_eq!(decoded.msg_id, signed.msg_id);
    }

    #[test]
    fn decode_fails_on_missing_field() {
        let bytes = br#"{"id":"x","price":1.0,"signer":"00"}"#;
        assert!(SignedObservation::decode(bytes).is_err());
    }
}
