//! Request/response DTOs for the mint's HTTP surface. Kept separate from
//! the ledger's domain types so the wire format can evolve without
//! touching `Ledger`'s method signatures.

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

use crate::{
    blind::{BlindedMessage, BlindedSignature},
    proof::Proofs,
};

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub pr: String,
    pub hash: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, ToSchema)]
pub struct PostMintResponse {
    pub promises: Vec<BlindedSignature>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PostMintRequest {
    pub outputs: Vec<BlindedMessage>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckFeesRequest {
    pub pr: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckFeesResponse {
    /// fee reserve in satoshis
    pub fee: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PostMeltRequest {
    pub proofs: Proofs,
    pub pr: String,
    #[serde(default)]
    pub outputs: Vec<BlindedMessage>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, ToSchema)]
pub struct PostMeltResponse {
    pub paid: bool,
    pub preimage: String,
    pub change: Vec<BlindedSignature>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PostSplitRequest {
    pub proofs: Proofs,
    pub amount: u64,
    pub outputs: Vec<BlindedMessage>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, ToSchema)]
pub struct PostSplitResponse {
    pub fst: Vec<BlindedSignature>,
    pub snd: Vec<BlindedSignature>,
}

impl PostSplitResponse {
    pub fn new(fst: Vec<BlindedSignature>, snd: Vec<BlindedSignature>) -> Self {
        Self { fst, snd }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckSpendableRequest {
    pub proofs: Proofs,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckSpendableResponse {
    pub spendable: Vec<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservePromisesResponse {
    pub promises: Vec<BlindedSignature>,
    pub id: String,
    pub sum_amounts: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReserveProofsResponse {
    pub proofs: Vec<crate::proof::Proof>,
    pub id: String,
    pub sum_amounts: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct KeysResponse {
    #[serde(flatten)]
    #[schema(value_type = std::collections::HashMap<String, String>)]
    pub keys: std::collections::HashMap<String, PublicKey>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct KeysetsResponse {
    pub keysets: Vec<String>,
}

/// `{code, error}` — the error envelope every domain error is mapped to at
/// the HTTP boundary. `code` is always 0 today (see DESIGN.md's Open
/// Question (a) resolution); kept as a field so a future revision can
/// assign stable codes without an API break.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct CashuErrorResponse {
    pub code: u64,
    pub error: String,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MintInfoResponse {
    pub name: Option<String>,
    #[schema(value_type = String)]
    pub pubkey: PublicKey,
    pub version: Option<String>,
    pub description: Option<String>,
    pub description_long: Option<String>,
    pub contact: Option<Vec<Vec<String>>>,
    pub nuts: Vec<String>,
    pub motd: Option<String>,
}
