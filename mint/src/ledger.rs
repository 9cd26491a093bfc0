//! The mint's state machine: request_mint, mint, check_fees, melt, split and
//! check_spendable, each wired through a `Storage` transaction and, where
//! Lightning is involved, a `LightningClient`. Every public method maps
//! 1:1 onto an HTTP endpoint in `routes`.

use std::{collections::HashSet, sync::Arc};

use mint_core::{
    blind::{BlindedMessage, BlindedSignature, DleqProof, TotalAmount},
    dhke::Dhke,
    keyset::{KeysetManager, MintKeyset},
    proof::Proofs,
};
use tracing::instrument;

use crate::{
    config::LightningFeeConfig,
    error::MintError,
    lightning::{LightningClient, LightningError},
    model::Invoice,
    storage::Storage,
};

pub struct Ledger<S: Storage> {
    pub storage: S,
    pub lightning: Arc<dyn LightningClient>,
    pub keysets: std::sync::RwLock<KeysetManager>,
    pub fee_config: LightningFeeConfig,
    dhke: Dhke,
}

impl<S: Storage> Ledger<S> {
    pub fn new(
        storage: S,
        lightning: Arc<dyn LightningClient>,
        keysets: KeysetManager,
        fee_config: LightningFeeConfig,
    ) -> Self {
        Self {
            storage,
            lightning,
            keysets: std::sync::RwLock::new(keysets),
            fee_config,
            dhke: Dhke::new(),
        }
    }

    pub fn active_keyset(&self) -> MintKeyset {
        self.keysets.read().expect("lock poisoned").active().clone()
    }

    pub fn keyset_by_id(&self, id: Option<&str>) -> Result<MintKeyset, MintError> {
        Ok(self
            .keysets
            .read()
            .expect("lock poisoned")
            .get_keyset(id)?
            .clone())
    }

    pub fn keyset_ids(&self) -> Vec<String> {
        self.keysets.read().expect("lock poisoned").keyset_ids()
    }

    /// Read-only: the promises the mint has issued under `keyset_id`, used
    /// by the reserve-audit endpoints to let a third party verify the
    /// mint's total outstanding liability.
    pub async fn promises_by_keyset(
        &self,
        keyset_id: &str,
    ) -> Result<Vec<BlindedSignature>, MintError> {
        let mut tx = self.storage.begin_tx().await?;
        let promises = self.storage.get_promises_by_keyset(&mut tx, keyset_id).await?;
        self.storage.rollback_tx(tx).await?;
        Ok(promises)
    }

    /// Read-only: the proofs redeemed against `keyset_id`, i.e. the spent
    /// set restricted to that keyset.
    pub async fn proofs_by_keyset(
        &self,
        keyset_id: &str,
    ) -> Result<Vec<mint_core::proof::Proof>, MintError> {
        let mut tx = self.storage.begin_tx().await?;
        let proofs = self.storage.get_proofs_by_keyset(&mut tx, keyset_id).await?;
        self.storage.rollback_tx(tx).await?;
        Ok(proofs)
    }

    fn has_duplicate_pubkeys(outputs: &[BlindedMessage]) -> bool {
        let mut uniq = HashSet::new();
        !outputs.iter().all(|x| uniq.insert(x.b_))
    }

    /// Signs each blinded message under `keyset`, attaching a DLEQ proof so
    /// the wallet can verify the mint signed honestly without contacting it
    /// again.
    fn create_blinded_signatures(
        &self,
        blinded_messages: &[BlindedMessage],
        keyset: &MintKeyset,
    ) -> Result<Vec<BlindedSignature>, MintError> {
        blinded_messages
            .iter()
            .map(|msg| {
                let private_key = keyset
                    .private_key_for_amount(msg.amount)
                    .ok_or_else(|| MintError::AmountMismatch(format!("no key for amount {}", msg.amount)))?;
                let c_ = self.dhke.step2_bob(msg.b_, private_key)?;
                let (e, s) = self.dhke.step2_bob_dleq(msg.b_, private_key, None)?;
                Ok(BlindedSignature {
                    amount: msg.amount,
                    c_,
                    id: keyset.keyset_id.clone(),
                    dleq: Some(DleqProof {
                        e: hex::encode(e.secret_bytes()),
                        s: hex::encode(s.secret_bytes()),
                    }),
                })
            })
            .collect()
    }

    async fn verify_proof(&self, proof: &mint_core::proof::Proof) -> Result<(), MintError> {
        let keyset = self.keyset_by_id(Some(&proof.keyset_id))?;
        let private_key = keyset
            .private_key_for_amount(proof.amount)
            .ok_or_else(|| MintError::AmountMismatch(format!("no key for amount {}", proof.amount)))?;
        let valid = self.dhke.verify(*private_key, proof.c, &proof.secret)?;
        if !valid {
            return Err(MintError::InvalidProofSignature(proof.secret.clone()));
        }
        Ok(())
    }

    async fn verify_proofs(&self, proofs: &Proofs) -> Result<(), MintError> {
        for proof in proofs.as_slice() {
            self.verify_proof(proof).await?;
        }
        Ok(())
    }

    /// Step 1 of minting: asks the Lightning backend for an invoice and
    /// records it unpaid/unissued, keyed by payment hash.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn request_mint(&self, amount: u64) -> Result<(String, String), MintError> {
        let invoice = self.lightning.create_invoice(amount).await?;
        let mut tx = self.storage.begin_tx().await?;
        self.storage
            .store_invoice(
                &mut tx,
                Invoice::new(
                    amount,
                    invoice.payment_hash.clone(),
                    invoice.payment_request.clone(),
                ),
            )
            .await?;
        self.storage.commit_tx(tx).await?;
        Ok((invoice.payment_request, invoice.payment_hash))
    }

    /// Step 2 of minting: once the invoice is observed paid, exchanges the
    /// caller's blinded messages for signatures. Refuses to run twice for
    /// the same invoice.
    #[instrument(level = "debug", skip(self, outputs), err)]
    pub async fn mint(
        &self,
        payment_hash: &str,
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindedSignature>, MintError> {
        let mut tx = self.storage.begin_tx().await?;
        let invoice = self
            .storage
            .get_invoice(&mut tx, payment_hash)
            .await?
            .ok_or_else(|| MintError::InvoiceNotFound(payment_hash.to_string()))?;

        if invoice.issued {
            return Err(MintError::InvoiceAlreadyIssued);
        }

        let is_paid = invoice.paid || self.lightning.is_invoice_paid(payment_hash).await?;
        if !is_paid {
            return Err(MintError::InvoiceUnpaid);
        }
        if !invoice.paid {
            self.storage.mark_invoice_paid(&mut tx, payment_hash).await?;
        }

        if Self::has_duplicate_pubkeys(outputs) {
            return Err(MintError::DuplicateProof("duplicate blinded message".to_string()));
        }

        let requested = outputs.to_vec().total_amount();
        if requested != invoice.amount {
            return Err(MintError::AmountMismatch(format!(
                "invoice is for {}, outputs request {requested}",
                invoice.amount
            )));
        }

        let keyset = self.active_keyset();
        let signatures = self.create_blinded_signatures(outputs, &keyset)?;

        self.storage.mark_invoice_issued(&mut tx, payment_hash).await?;
        self.storage
            .store_promises(&mut tx, &keyset.keyset_id, &signatures)
            .await?;
        self.storage.commit_tx(tx).await?;

        Ok(signatures)
    }

    /// Fee reserve the caller must attach proofs for, on top of the
    /// invoice's own amount, before calling `melt`. Mint-internal payments
    /// (the destination is this mint's own Lightning identity) carry no
    /// routing fee, so the reserve is zero.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn check_fees(&self, payment_request: &str) -> Result<u64, MintError> {
        let decoded = self.lightning.decode(payment_request).await?;
        if decoded.is_internal {
            return Ok(0);
        }
        Ok(self.fee_config.get_fee_reserve(decoded.amount))
    }

    /// Atomically spends `proofs` to pay `payment_request`. The spent set
    /// is pre-marked before the Lightning call so a concurrent request can
    /// never reuse the same proofs while payment is in flight; if the
    /// payment fails outright the pre-mark is rolled back via a
    /// reconciliation transaction. A payment whose outcome is unknown
    /// (`LightningError::Timeout`) is left marked spent and recorded via
    /// `mark_melt_pending` — the proofs are unsafe to hand back without
    /// risking a double pay on retry, so `reconcile_pending_melts` is what
    /// eventually resolves them, not this call.
    ///
    /// If the payment succeeds but `outputs` cannot exactly cover the
    /// overpayment (see `select_change_outputs`), this returns an error
    /// even though the proofs stay spent and the payment already went
    /// out — the caller supplied outputs that can't represent their own
    /// change, which the mint has no way to recover from after the fact.
    #[instrument(level = "debug", skip(self, proofs, outputs), err)]
    pub async fn melt(
        &self,
        proofs: &Proofs,
        payment_request: &str,
        outputs: &[BlindedMessage],
    ) -> Result<(bool, String, Vec<BlindedSignature>), MintError> {
        self.verify_proofs(proofs).await?;

        let decoded = self.lightning.decode(payment_request).await?;
        let fee_reserve = if decoded.is_internal {
            0
        } else {
            self.fee_config.get_fee_reserve(decoded.amount)
        };
        let proofs_amount = proofs.total_amount();

        if proofs_amount < decoded.amount + fee_reserve {
            return Err(MintError::InsufficientFunds {
                have: proofs_amount,
                need: decoded.amount + fee_reserve,
            });
        }

        let mut tx = self.storage.begin_tx().await?;
        self.storage
            .insert_spent_proofs(&mut tx, proofs.as_slice())
            .await?;
        self.storage.commit_tx(tx).await?;

        let pay_result = match self
            .lightning
            .pay_invoice(payment_request, fee_reserve, std::time::Duration::from_secs(60))
            .await
        {
            Ok(result) => result,
            Err(LightningError::Timeout) => {
                let secrets: Vec<String> =
                    proofs.secrets().into_iter().map(str::to_string).collect();
                let mut tx = self.storage.begin_tx().await?;
                self.storage
                    .mark_melt_pending(&mut tx, payment_request, &secrets)
                    .await?;
                self.storage.commit_tx(tx).await?;
                return Err(MintError::MeltPending(payment_request.to_string()));
            }
            Err(err) => {
                self.reconcile_failed_melt(proofs).await?;
                return Err(MintError::LightningPaymentFailed(err.to_string()));
            }
        };

        if !pay_result.ok {
            self.reconcile_failed_melt(proofs).await?;
            return Err(MintError::LightningPaymentFailed(
                pay_result.error.unwrap_or_else(|| "payment failed".to_string()),
            ));
        }

        let actual_fee = pay_result.actual_fee.unwrap_or(0);
        let overpaid = proofs_amount.saturating_sub(decoded.amount + actual_fee);
        let change = if overpaid > 0 {
            let change_outputs = Self::select_change_outputs(outputs, overpaid)?;
            let keyset = self.active_keyset();
            self.create_blinded_signatures(&change_outputs, &keyset)?
        } else {
            vec![]
        };

        Ok((
            true,
            pay_result.preimage.unwrap_or_default(),
            change,
        ))
    }

    /// Selects a prefix of the caller's own `outputs`, in the order
    /// supplied, whose amounts sum exactly to `overpaid`; remaining
    /// outputs are discarded unsigned. Never changes an output's declared
    /// amount — unlike reassigning `Amount(overpaid).split()` onto
    /// whichever outputs happen to be in the slice, this only ever signs
    /// amounts the caller actually asked for. If no such prefix exists
    /// (outputs can't exactly cover the overpayment, e.g. too few or the
    /// wrong denominations) the melt is rejected rather than silently
    /// shorting the caller's change.
    fn select_change_outputs(
        outputs: &[BlindedMessage],
        overpaid: u64,
    ) -> Result<Vec<BlindedMessage>, MintError> {
        let mut selected = Vec::new();
        let mut running = 0u64;
        for output in outputs {
            if running == overpaid {
                break;
            }
            running += output.amount;
            selected.push(output.clone());
        }
        if running != overpaid {
            return Err(MintError::AmountMismatch(format!(
                "outputs cannot cover overpayment of {overpaid} exactly (got {running})"
            )));
        }
        Ok(selected)
    }

    /// Undoes a pre-mark after a Lightning payment that is known to have
    /// failed outright (not one whose outcome is unknown).
    async fn reconcile_failed_melt(&self, proofs: &Proofs) -> Result<(), MintError> {
        let mut tx = self.storage.begin_tx().await?;
        let secrets: Vec<String> = proofs.secrets().into_iter().map(str::to_string).collect();
        self.storage.delete_spent_proofs(&mut tx, &secrets).await?;
        self.storage.commit_tx(tx).await?;
        Ok(())
    }

    /// Startup/periodic recovery pass for melts left pending by a
    /// `pay_invoice` timeout: re-queries the Lightning backend for each
    /// one and either confirms the spend (payment went through) or undoes
    /// it (payment never happened). Melts whose outcome is still unknown
    /// are left untouched for a later pass. Returns the number resolved.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn reconcile_pending_melts(&self) -> Result<usize, MintError> {
        let mut tx = self.storage.begin_tx().await?;
        let pending = self.storage.list_pending_melts(&mut tx).await?;
        self.storage.rollback_tx(tx).await?;

        let mut resolved = 0;
        for (payment_request, secrets) in pending {
            let outcome = self.lightning.payment_status(&payment_request).await?;
            let Some(outcome) = outcome else {
                continue;
            };

            let mut tx = self.storage.begin_tx().await?;
            if !outcome.ok {
                self.storage.delete_spent_proofs(&mut tx, &secrets).await?;
            }
            self.storage
                .resolve_melt_pending(&mut tx, &payment_request)
                .await?;
            self.storage.commit_tx(tx).await?;
            resolved += 1;
        }
        Ok(resolved)
    }

    /// Spends `proofs` and reissues `outputs` as two groups: `fst` covers
    /// `amount`, `snd` covers the remainder. Conserves total value;
    /// mismatched totals are rejected before anything is persisted.
    #[instrument(level = "debug", skip(self, proofs, outputs), err)]
    pub async fn split(
        &self,
        proofs: &Proofs,
        amount: u64,
        outputs: &[BlindedMessage],
    ) -> Result<(Vec<BlindedSignature>, Vec<BlindedSignature>), MintError> {
        self.verify_proofs(proofs).await?;

        if Self::has_duplicate_pubkeys(outputs) {
            return Err(MintError::DuplicateProof("duplicate blinded message".to_string()));
        }

        let proofs_amount = proofs.total_amount();
        let outputs_amount = outputs.to_vec().total_amount();
        if proofs_amount != outputs_amount {
            return Err(MintError::AmountMismatch(format!(
                "{proofs_amount} != {outputs_amount}"
            )));
        }
        if amount > proofs_amount {
            return Err(MintError::AmountMismatch(format!(
                "requested split amount {amount} exceeds total {proofs_amount}"
            )));
        }

        let keyset = self.active_keyset();

        let mut tx = self.storage.begin_tx().await?;
        self.storage
            .insert_spent_proofs(&mut tx, proofs.as_slice())
            .await?;

        let mut fst = vec![];
        let mut snd = vec![];
        let mut running = 0u64;
        for output in outputs {
            if running < amount {
                fst.push(output.clone());
            } else {
                snd.push(output.clone());
            }
            running += output.amount;
        }

        let fst_signed = self.create_blinded_signatures(&fst, &keyset)?;
        let snd_signed = self.create_blinded_signatures(&snd, &keyset)?;
        let mut all_signed = fst_signed.clone();
        all_signed.extend(snd_signed.clone());

        self.storage
            .store_promises(&mut tx, &keyset.keyset_id, &all_signed)
            .await?;
        self.storage.commit_tx(tx).await?;

        Ok((fst_signed, snd_signed))
    }

    /// Read-only: which of `proofs`' secrets are still spendable.
    #[instrument(level = "debug", skip(self, proofs), err)]
    pub async fn check_spendable(&self, proofs: &Proofs) -> Result<Vec<bool>, MintError> {
        let mut tx = self.storage.begin_tx().await?;
        let mut result = Vec::with_capacity(proofs.len());
        for proof in proofs.as_slice() {
            let spent = self.storage.is_secret_spent(&mut tx, &proof.secret).await?;
            result.push(!spent);
        }
        self.storage.rollback_tx(tx).await?;
        Ok(result)
    }
}
