//! Persistence for everything the ledger needs to survive a restart: invoice
//! lifecycle state, the spent-secret set, issued promises and the proofs
//! redeemed for them, and keyset material. Every mutating operation is
//! threaded through a transaction handle (`Storage::Tx`) so the ledger can
//! group a pre-mark-and-pay or a spend-and-reissue into one atomic unit and
//! roll the whole thing back on failure — see the melt and split writeups
//! in the ledger module for how the handle is used.
//!
//! `delete_spent_proofs` exists separately from transaction rollback: it is
//! the reconciliation primitive used to undo a pre-mark whose owning
//! transaction already committed before the mint learned the Lightning
//! payment's outcome (a crash between pre-mark and payment, or a payment
//! that times out after commit).
//!
//! `mark_melt_pending`/`resolve_melt_pending`/`list_pending_melts` back the
//! other half of that same story: a melt whose `pay_invoice` call timed out
//! leaves its proofs spent but the payment's fate unknown. Those proofs are
//! recorded against the `payment_request` so a startup reconciliation pass
//! can re-query the Lightning backend for each one and either confirm the
//! spend (`resolve_melt_pending`) or undo it (`delete_spent_proofs`).

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use mint_core::{blind::BlindedSignature, proof::Proof};
use secp256k1::PublicKey;

use crate::{error::MintError, model::Invoice};

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

/// The public half of a keyset, persisted so `/keys/{id}` and `/keysets`
/// keep working for a retired keyset even after the mint operator stops
/// configuring the seed that derived it. Signing still requires the
/// private half, held only in the in-memory `KeysetManager`.
#[derive(Debug, Clone)]
pub struct StoredKeyset {
    pub keyset_id: String,
    pub public_keys: HashMap<u64, PublicKey>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    type Tx: Send;

    async fn begin_tx(&self) -> Result<Self::Tx, MintError>;
    async fn commit_tx(&self, tx: Self::Tx) -> Result<(), MintError>;
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<(), MintError>;

    async fn get_invoice(
        &self,
        tx: &mut Self::Tx,
        payment_hash: &str,
    ) -> Result<Option<Invoice>, MintError>;
    async fn store_invoice(&self, tx: &mut Self::Tx, invoice: Invoice) -> Result<(), MintError>;
    async fn mark_invoice_paid(
        &self,
        tx: &mut Self::Tx,
        payment_hash: &str,
    ) -> Result<(), MintError>;
    async fn mark_invoice_issued(
        &self,
        tx: &mut Self::Tx,
        payment_hash: &str,
    ) -> Result<(), MintError>;

    async fn is_secret_spent(&self, tx: &mut Self::Tx, secret: &str) -> Result<bool, MintError>;
    async fn insert_spent_proofs(
        &self,
        tx: &mut Self::Tx,
        proofs: &[Proof],
    ) -> Result<(), MintError>;
    async fn delete_spent_proofs(
        &self,
        tx: &mut Self::Tx,
        secrets: &[String],
    ) -> Result<(), MintError>;

    /// Records that `secrets` were spent to pay `payment_request` but the
    /// payment's outcome is not yet known. Called instead of a rollback
    /// when `pay_invoice` times out rather than reporting a definite
    /// failure.
    async fn mark_melt_pending(
        &self,
        tx: &mut Self::Tx,
        payment_request: &str,
        secrets: &[String],
    ) -> Result<(), MintError>;
    /// Clears the pending flag once a reconciliation pass confirms the
    /// payment went through; the proofs stay spent.
    async fn resolve_melt_pending(
        &self,
        tx: &mut Self::Tx,
        payment_request: &str,
    ) -> Result<(), MintError>;
    /// All melts still awaiting reconciliation, as `(payment_request,
    /// secrets)` pairs.
    async fn list_pending_melts(
        &self,
        tx: &mut Self::Tx,
    ) -> Result<Vec<(String, Vec<String>)>, MintError>;

    async fn store_promises(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
        promises: &[BlindedSignature],
    ) -> Result<(), MintError>;
    async fn get_promises_by_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
    ) -> Result<Vec<BlindedSignature>, MintError>;
    async fn get_proofs_by_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
    ) -> Result<Vec<Proof>, MintError>;

    async fn get_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
    ) -> Result<Option<StoredKeyset>, MintError>;
    async fn store_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset: &StoredKeyset,
    ) -> Result<(), MintError>;
}
