use thiserror::Error;

/// Errors raised by the crypto and data-model layer. Never carries ledger
/// state (spent-set, invoices) — that belongs to `mint-ledger::MintError`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),

    #[error("invalid keyset id")]
    InvalidKeysetId,

    #[error("invalid token amount")]
    InvalidAmount,

    #[error("DLEQ proof verification failed")]
    DleqVerificationFailed,

    #[error("could not serialize/deserialize: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}
