//! In-process `Storage` impl used by the ledger's own test suite and by
//! anyone embedding the mint without Postgres. A transaction is a real
//! mutual-exclusion window, not a compare-and-swap: `begin_tx` takes an
//! owned lock on the single `State` and holds it until `commit_tx`/
//! `rollback_tx` drops it, so a second `begin_tx` blocks until the first
//! transaction finishes — two concurrent callers can never both observe a
//! secret as unspent and both insert it. `rollback_tx` restores the
//! pre-transaction snapshot taken at `begin_tx` before releasing the lock.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use mint_core::{blind::BlindedSignature, proof::Proof};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{StoredKeyset, Storage};
use crate::{error::MintError, model::Invoice};

#[derive(Debug, Clone, Default)]
struct State {
    invoices: HashMap<String, Invoice>,
    spent_secrets: HashSet<String>,
    spent_proofs: HashMap<String, Vec<Proof>>,
    promises: HashMap<String, Vec<BlindedSignature>>,
    keysets: HashMap<String, StoredKeyset>,
    pending_melts: HashMap<String, Vec<String>>,
}

pub struct MemoryTx {
    before: State,
    guard: OwnedMutexGuard<State>,
}

#[derive(Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Tx = MemoryTx;

    async fn begin_tx(&self) -> Result<Self::Tx, MintError> {
        let guard = self.state.clone().lock_owned().await;
        let before = guard.clone();
        Ok(MemoryTx { before, guard })
    }

    async fn commit_tx(&self, _tx: Self::Tx) -> Result<(), MintError> {
        Ok(())
    }

    async fn rollback_tx(&self, mut tx: Self::Tx) -> Result<(), MintError> {
        *tx.guard = tx.before;
        Ok(())
    }

    async fn get_invoice(
        &self,
        tx: &mut Self::Tx,
        payment_hash: &str,
    ) -> Result<Option<Invoice>, MintError> {
        Ok(tx.guard.invoices.get(payment_hash).cloned())
    }

    async fn store_invoice(&self, tx: &mut Self::Tx, invoice: Invoice) -> Result<(), MintError> {
        tx.guard
            .invoices
            .insert(invoice.payment_hash.clone(), invoice);
        Ok(())
    }

    async fn mark_invoice_paid(
        &self,
        tx: &mut Self::Tx,
        payment_hash: &str,
    ) -> Result<(), MintError> {
        let invoice = tx
            .guard
            .invoices
            .get_mut(payment_hash)
            .ok_or_else(|| MintError::InvoiceNotFound(payment_hash.to_string()))?;
        invoice.paid = true;
        Ok(())
    }

    async fn mark_invoice_issued(
        &self,
        tx: &mut Self::Tx,
        payment_hash: &str,
    ) -> Result<(), MintError> {
        let invoice = tx
            .guard
            .invoices
            .get_mut(payment_hash)
            .ok_or_else(|| MintError::InvoiceNotFound(payment_hash.to_string()))?;
        invoice.issued = true;
        Ok(())
    }

    async fn is_secret_spent(&self, tx: &mut Self::Tx, secret: &str) -> Result<bool, MintError> {
        Ok(tx.guard.spent_secrets.contains(secret))
    }

    async fn insert_spent_proofs(
        &self,
        tx: &mut Self::Tx,
        proofs: &[Proof],
    ) -> Result<(), MintError> {
        for proof in proofs {
            if !tx.guard.spent_secrets.insert(proof.secret.clone()) {
                return Err(MintError::ProofAlreadySpent(proof.secret.clone()));
            }
        }
        for proof in proofs {
            tx.guard
                .spent_proofs
                .entry(proof.keyset_id.clone())
                .or_default()
                .push(proof.clone());
        }
        Ok(())
    }

    async fn delete_spent_proofs(
        &self,
        tx: &mut Self::Tx,
        secrets: &[String],
    ) -> Result<(), MintError> {
        for secret in secrets {
            tx.guard.spent_secrets.remove(secret);
        }
        for proofs in tx.guard.spent_proofs.values_mut() {
            proofs.retain(|proof| !secrets.contains(&proof.secret));
        }
        Ok(())
    }

    async fn mark_melt_pending(
        &self,
        tx: &mut Self::Tx,
        payment_request: &str,
        secrets: &[String],
    ) -> Result<(), MintError> {
        tx.guard
            .pending_melts
            .insert(payment_request.to_string(), secrets.to_vec());
        Ok(())
    }

    async fn resolve_melt_pending(
        &self,
        tx: &mut Self::Tx,
        payment_request: &str,
    ) -> Result<(), MintError> {
        tx.guard.pending_melts.remove(payment_request);
        Ok(())
    }

    async fn list_pending_melts(
        &self,
        tx: &mut Self::Tx,
    ) -> Result<Vec<(String, Vec<String>)>, MintError> {
        Ok(tx
            .guard
            .pending_melts
            .iter()
            .map(|(payment_request, secrets)| (payment_request.clone(), secrets.clone()))
            .collect())
    }

    async fn store_promises(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
        promises: &[BlindedSignature],
    ) -> Result<(), MintError> {
        tx.guard
            .promises
            .entry(keyset_id.to_string())
            .or_default()
            .extend(promises.iter().cloned());
        Ok(())
    }

    async fn get_promises_by_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
    ) -> Result<Vec<BlindedSignature>, MintError> {
        Ok(tx.guard.promises.get(keyset_id).cloned().unwrap_or_default())
    }

    async fn get_proofs_by_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
    ) -> Result<Vec<Proof>, MintError> {
        Ok(tx
            .guard
            .spent_proofs
            .get(keyset_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
    ) -> Result<Option<StoredKeyset>, MintError> {
        Ok(tx.guard.keysets.get(keyset_id).cloned())
    }

    async fn store_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset: &StoredKeyset,
    ) -> Result<(), MintError> {
        tx.guard
            .keysets
            .insert(keyset.keyset_id.clone(), keyset.clone());
        Ok(())
    }
}
