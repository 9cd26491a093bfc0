use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{event, Level};

use crate::lightning::LightningError;

/// Ledger-level errors, one variant per error kind named in the mint's
/// error-handling contract. Validation errors are raised before any state
/// mutation; errors from a partially-mutated transaction abort the
/// enclosing storage transaction (the `Storage` impl is responsible for
/// that rollback).
#[derive(Error, Debug)]
pub enum MintError {
    #[error("invalid point encoding or scalar out of range: {0}")]
    InvalidPoint(#[from] mint_core::error::CoreError),

    #[error("invalid signature for proof with secret {0}")]
    InvalidProofSignature(String),

    #[error("proof already spent: {0}")]
    ProofAlreadySpent(String),

    #[error("duplicate proof in request: {0}")]
    DuplicateProof(String),

    #[error("amount mismatch: {0}")]
    AmountMismatch(String),

    #[error("invoice not found for hash {0}")]
    InvoiceNotFound(String),

    #[error("invoice not paid yet")]
    InvoiceUnpaid,

    #[error("invoice already issued")]
    InvoiceAlreadyIssued,

    #[error("lightning payment failed: {0}")]
    LightningPaymentFailed(String),

    #[error("lightning payment outcome unknown, will be reconciled: {0}")]
    MeltPending(String),

    #[error("insufficient funds: proofs cover {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("unknown keyset: {0}")]
    UnknownKeyset(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("lightning adapter error: {0}")]
    Lightning(#[from] LightningError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Maps every domain error onto the `{code, error}` envelope. `code` is
/// always 0 — see DESIGN.md's resolution of Open Question (a). Storage
/// failures that leave the enclosing transaction's outcome undefined are
/// the one case surfaced as a 500; every other error is a normal,
/// expected outcome of an invalid request and is returned as 200, matching
/// the reference mint's behavior.
impl IntoResponse for MintError {
    fn into_response(self) -> Response {
        event!(Level::ERROR, "error in mint: {:?}", self);

        let status = match self {
            Self::Storage(_) | Self::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        };

        let body = Json(mint_core::primitives::CashuErrorResponse {
            code: 0,
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
