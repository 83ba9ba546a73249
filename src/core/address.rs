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

//! Signer addresses: the last 20 bytes of a libp2p peer id.

use libp2p::PeerId;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 20-byte signer address derived from a libp2p peer id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

/// Address parsing error.
#[derive(Debug, Error)]
pub enum AddressError {
    /// Hex string was malformed or the wrong length.
    #[error("invalid address hex")]
    InvalidHex,
}

impl Address {
    /// Derive an address from a peer id: the last 20 bytes of its encoded
    /// form, left-zero-padded if the encoding is shorter than 20 bytes.
    ///
    /// Mirrors the original `PeerIDToAddress` helper, which truncates a
    /// byte slice to its trailing 20 bytes (`common.BytesToAddress`).
    pub fn from_peer_id(id: &PeerId) -> Self {
        let bytes = id.to_bytes();
        let mut out = [0u8; 20];
        if bytes.len() >= 20 {
            out.copy_from_slice(&bytes[bytes.len() - 20..]);
        } else {
            out[20 - bytes.len()..].copy_from_slice(&bytes);
        }
        Address(out)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex encoding, no `0x` prefix (per spec.md §3 wire form).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|_| AddressError::InvalidHex)?;
        if bytes.len() != 20 {
            return Err(AddressError::InvalidHex);
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_hex() {
        let addr = Address([7u8; 20]);
        let hex = addr.to_hex();
        let parsed: Address = hex.parse().unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn derives_trailing_twenty_bytes() {
        let kp = libp2p::identity::Keypair::generate_ed25519();
        let id = PeerId::from(kp.public());
        let addr = Address::from_peer_id(&id);
        let raw = id.to_bytes();
        assert_eq!(&raw[raw.len() - 20..], addr.as_bytes());
    }
}
