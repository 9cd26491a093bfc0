//! `BlindedMessage` (wallet → mint, to be signed) and `BlindedSignature`
//! (mint → wallet, the "promise"), plus the optional DLEQ proof attached to
//! a promise so a wallet can verify the mint signed honestly.

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

/// `(e, s)` as produced by `Dhke::step2_bob_dleq`, hex-encoded scalars.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DleqProof {
    pub e: String,
    pub s: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BlindedSignature {
    pub amount: u64,
    #[serde(rename = "C_")]
    #[schema(value_type = String)]
    pub c_: PublicKey,
    pub id: String,
    pub dleq: Option<DleqProof>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BlindedMessage {
    pub amount: u64,
    #[serde(rename = "B_")]
    #[schema(value_type = String)]
    pub b_: PublicKey,
    pub id: String,
}

pub trait TotalAmount {
    fn total_amount(&self) -> u64;
}

impl TotalAmount for Vec<BlindedSignature> {
    fn total_amount(&self) -> u64 {
        self.iter().fold(0, |acc, x| acc + x.amount)
    }
}

impl TotalAmount for Vec<BlindedMessage> {
    fn total_amount(&self) -> u64 {
        self.iter().fold(0, |acc, x| acc + x.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_amount() {
        let messages = vec![
            BlindedMessage {
                amount: 2,
                b_: crate::dhke::public_key_from_hex(
                    "02a9acc1e48c25eeeb9289b5031cc57da9fe72f3fe2861d264bdc074209b107ba2",
                ),
                id: "abc".to_string(),
            },
            BlindedMessage {
                amount: 8,
                b_: crate::dhke::public_key_from_hex(
                    "02a9acc1e48c25eeeb9289b5031cc57da9fe72f3fe2861d264bdc074209b107ba2",
                ),
                id: "abc".to_string(),
            },
        ];
        assert_eq!(messages.total_amount(), 10);
    }
}
