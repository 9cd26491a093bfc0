//! `Proof` — an unblinded `(secret, C)` pair redeemable once — and `Proofs`,
//! a bag of proofs used as the spending input to melt/split.

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

/// `(e, s, r)` attached to a proof so its origin can be proven to a third
/// party without contacting the mint. `r` is the blinding factor used to
/// derive `C` from `C_`, revealed so the verifier can recompute `B_`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ProofDleq {
    pub e: String,
    pub s: String,
    pub r: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Proof {
    pub amount: u64,
    #[serde(rename = "id")]
    pub keyset_id: String,
    pub secret: String,
    #[serde(rename = "C")]
    #[schema(value_type = String)]
    pub c: PublicKey,
    pub dleq: Option<ProofDleq>,
}

impl Proof {
    pub const fn new(amount: u64, secret: String, c: PublicKey, keyset_id: String) -> Self {
        Self {
            amount,
            secret,
            c,
            keyset_id,
            dleq: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Proofs(pub(super) Vec<Proof>);

impl Proofs {
    pub fn new(proofs: Vec<Proof>) -> Self {
        Self(proofs)
    }

    pub fn with_proof(proof: Proof) -> Self {
        Self(vec![proof])
    }

    pub const fn empty() -> Self {
        Self(vec![])
    }

    pub fn total_amount(&self) -> u64 {
        self.0.iter().map(|proof| proof.amount).sum()
    }

    pub fn as_slice(&self) -> &[Proof] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Proof> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn secrets(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.secret.as_str()).collect()
    }
}

impl From<Vec<Proof>> for Proofs {
    fn from(from: Vec<Proof>) -> Self {
        Self(from)
    }
}

impl From<Proof> for Proofs {
    fn from(from: Proof) -> Self {
        Self(vec![from])
    }
}

impl IntoIterator for Proofs {
    type Item = Proof;
    type IntoIter = std::vec::IntoIter<Proof>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_proof_deserialize() {
        let js = json!(
            {
              "id": "DSAl9nvvyfva",
              "amount": 2,
              "secret": "EhpennC9qB3iFlW8FZ_pZw",
              "C": "02c020067db727d586bc3183aecf97fcb800c3f4cc4759f69c626c9db5d8f5b5d4"
            }
        );

        let proof = serde_json::from_value::<Proof>(js).unwrap();
        assert_eq!(proof.amount, 2);
        assert_eq!(proof.keyset_id, "DSAl9nvvyfva");
        assert_eq!(proof.secret, "EhpennC9qB3iFlW8FZ_pZw");
        assert!(proof.dleq.is_none());
    }
}
