//! Per-amount keyset derivation and keyset bookkeeping.
//!
//! A keyset is a set of secp256k1 keypairs, one per power-of-two
//! denomination, derived deterministically from `(seed, derivation_path)`.
//! Its id is stable as long as the derivation inputs don't change, which
//! lets a mint retire a seed while still honoring proofs signed under the
//! retired keyset.

use std::collections::HashMap;

use base64::{engine::general_purpose, Engine as _};
use bitcoin_hashes::{sha256, Hash};
use itertools::Itertools;
use rand::RngCore;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Number of supported power-of-two denominations, `2^0 .. 2^(MAX_ORDER-1)`.
pub const MAX_ORDER: u64 = 64;

pub fn generate_hash() -> String {
    let mut rng = rand::thread_rng();
    let mut random = [0u8; 32];
    rng.fill_bytes(&mut random);
    sha256::Hash::hash(&random).to_string()
}

#[derive(Debug, Clone)]
pub struct MintKeyset {
    pub private_keys: HashMap<u64, SecretKey>,
    pub public_keys: HashMap<u64, PublicKey>,
    pub keyset_id: String,
    pub mint_pubkey: PublicKey,
}

impl MintKeyset {
    pub fn new(seed: &str, derivation_path: &str) -> Self {
        let private_keys = derive_keys(seed, derivation_path);
        let public_keys = derive_pubkeys(&private_keys);
        Self {
            keyset_id: derive_keyset_id(&public_keys),
            private_keys,
            public_keys,
            mint_pubkey: derive_pubkey(seed).expect("invalid seed"),
        }
    }

    pub fn private_key_for_amount(&self, amount: u64) -> Option<&SecretKey> {
        self.private_keys.get(&amount)
    }

    pub fn public_key_for_amount(&self, amount: u64) -> Option<&PublicKey> {
        self.public_keys.get(&amount)
    }
}

/// Holds the active keyset used for issuance plus any retired keysets kept
/// around for verifying already-issued proofs (spec's "legacy" lookup).
#[derive(Debug, Clone)]
pub struct KeysetManager {
    active: MintKeyset,
    legacy: HashMap<String, MintKeyset>,
}

impl KeysetManager {
    pub fn new(active: MintKeyset) -> Self {
        Self {
            active,
            legacy: HashMap::new(),
        }
    }

    pub fn active(&self) -> &MintKeyset {
        &self.active
    }

    /// Replaces the active keyset, retiring the previous one into the
    /// legacy map. In-flight requests that captured the old keyset at
    /// entry (per the concurrency model) keep using it via their own
    /// reference, unaffected by this rotation.
    pub fn rotate(&mut self, new_active: MintKeyset) {
        let old = std::mem::replace(&mut self.active, new_active);
        self.legacy.insert(old.keyset_id.clone(), old);
    }

    /// Returns the active keyset when `id` is `None`; otherwise looks up
    /// `id` among the active and legacy keysets.
    pub fn get_keyset(&self, id: Option<&str>) -> Result<&MintKeyset, CoreError> {
        match id {
            None => Ok(&self.active),
            Some(id) if id == self.active.keyset_id => Ok(&self.active),
            Some(id) => self.legacy.get(id).ok_or(CoreError::InvalidKeysetId),
        }
    }

    pub fn keyset_ids(&self) -> Vec<String> {
        let mut ids = vec![self.active.keyset_id.clone()];
        ids.extend(self.legacy.keys().cloned());
        ids
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Keysets {
    pub keysets: Vec<String>,
}

impl Keysets {
    pub fn new(keysets: Vec<String>) -> Self {
        Self { keysets }
    }
}

/// Derives one secret key per denomination: `SHA256(seed || path || i)`,
/// mapped to amount `2^i` for `i` in `0..MAX_ORDER`.
pub fn derive_keys(seed: &str, derivation_path: &str) -> HashMap<u64, SecretKey> {
    let mut keys = HashMap::new();
    for i in 0..MAX_ORDER {
        let hash = sha256::Hash::hash(format!("{seed}{derivation_path}{i}").as_bytes());
        let key = SecretKey::from_slice(hash.as_byte_array())
            .expect("sha256 digest is always a valid 32-byte scalar candidate");
        keys.insert(2u64.pow(i as u32), key);
    }
    keys
}

pub fn derive_pubkeys(keys: &HashMap<u64, SecretKey>) -> HashMap<u64, PublicKey> {
    let secp = Secp256k1::new();
    keys.iter()
        .map(|(amount, key)| (*amount, key.public_key(&secp)))
        .collect()
}

/// First 12 base64 characters of `SHA256` of the concatenated compressed
/// public keys, sorted by ascending amount.
pub fn derive_keyset_id(keys: &HashMap<u64, PublicKey>) -> String {
    let pubkeys_concat = keys
        .iter()
        .sorted_by(|(amt_a, _), (amt_b, _)| amt_a.cmp(amt_b))
        .map(|(_, pubkey)| pubkey)
        .join("");
    let hashed_pubkeys = sha256::Hash::hash(pubkeys_concat.as_bytes()).to_byte_array();
    general_purpose::STANDARD.encode(hashed_pubkeys)[..12].to_string()
}

pub fn derive_pubkey(seed: &str) -> Result<PublicKey, CoreError> {
    let hash = sha256::Hash::hash(seed.as_bytes());
    let key = SecretKey::from_slice(hash.as_byte_array())?;
    let secp = Secp256k1::new();
    Ok(key.public_key(&secp))
}
