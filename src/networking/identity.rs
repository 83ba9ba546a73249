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

//! Node identity: a fresh Ed25519 keypair per start for ordinary nodes, and
//! the deterministic bootstrap-seed identity the rendezvous node uses
//! instead (spec.md §4.4). Only the bootstrap node's peer id is stable
//! across restarts — the reference implementation mints an ordinary node's
//! key with `crypto.GenerateEd25519Key(rand.Reader)` on every start and
//! never persists it.

use libp2p::identity::Keypair;
use libp2p::PeerId;
use rand::{RngCore, SeedableRng};

/// The fixed seed string the bootstrap node's key is derived from, matching
/// the reference implementation byte-for-byte so a fleet of independently
/// deployed bootstrap nodes converge on the same peer id.
const BOOTSTRAP_SEED: &str = "QmdErMiygrmkPsLTxzLTNEq5p4kCXSx26encEBkdoYRsGJ";

/// Mint a fresh Ed25519 identity from the OS RNG. Ordinary (non-bootstrap)
/// nodes call this on every start; their signer address is not stable
/// across restarts.
pub fn fresh_identity() -> (PeerId, Keypair) {
    let kp = Keypair::generate_ed25519();
    let pid = PeerId::from(kp.public());
    (pid, kp)
}

/// Derive the bootstrap node's identity from `BOOTSTRAP_SEED`, deterministically.
///
/// Bootstrap nodes don't persist this key: every bootstrap deployment
/// derives the same keypair from the same seed, so there is nothing to
/// store and no `data_dir` dependency for this path.
pub fn bootstrap_identity() -> (PeerId, Keypair) {
    let mut seed_bytes = [0u8; 32];
    let mut hasher_input = BOOTSTRAP_SEED.as_bytes().to_vec();
    // Stretch the 44-byte seed string into a fixed 32-byte seed for the
    // deterministic RNG backing key generation below.
    while hasher_input.len() < 32 {
        hasher_input.extend_from_slice(BOOTSTRAP_SEED.as_bytes());
    }
    seed_bytes.copy_from_slice(&hasher_input[..32]);

    let mut rng = rand_chacha::ChaCha20Rng::from_seed(seed_bytes);
    let mut key_bytes = [0u8; 32];
    rng.fill_bytes(&mut key_bytes);

    let kp = Keypair::ed25519_from_bytes(key_bytes).expect("32 bytes is a valid ed25519 seed");
    let pid = PeerId::from(kp.public());
    (pid, kp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_identity_differs_across_calls() {
        let (pid_a, _) = fresh_identity();
        let (pid_b, _) = fresh_identity();
        assert_ne!(pid_a, pid_b);
    }

    #[test]
    fn bootstrap_identity_is_deterministic() {
        let (pid_a, _) = bootstrap_identity();
        let (pid_b, _) = bootstrap_identity();
        assert_eq!(pid_a, pid_b);
    }
}
