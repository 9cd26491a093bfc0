//! The Lightning backend is abstracted behind [`LightningClient`] so the
//! ledger never depends on a concrete node implementation. [`DeterministicLightning`]
//! is the one adapter carried here: an in-process, fully deterministic
//! stand-in used by the ledger's own test suite, and a template for a real
//! backend (LND/CLN/a Lightning service provider) to implement against.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LightningError {
    #[error("failed to decode payment request: {0}")]
    DecodeInvoice(String),

    #[error("failed to pay invoice: {0}")]
    PayInvoice(String),

    #[error("payment timed out")]
    Timeout,

    #[error("invoice not found: {0}")]
    InvoiceNotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceResult {
    pub payment_hash: String,
    pub payment_request: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayInvoiceResult {
    pub ok: bool,
    pub preimage: Option<String>,
    pub actual_fee: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedInvoice {
    pub amount: u64,
    pub destination: String,
    /// Set by the adapter's own `decode` when `destination` resolves to
    /// this mint's own Lightning identity — i.e. the invoice was one the
    /// mint itself issued via `create_invoice`. `check_fees`/`melt` waive
    /// the fee reserve for these, since no outbound routing is involved.
    pub is_internal: bool,
}

/// The operations the ledger needs from a Lightning node: invoice
/// creation, payment-status polling, outbound payment with a fee limit and
/// timeout, invoice decoding (used by `check_fees`/`melt` to learn the
/// invoice amount and destination up front), and re-querying a timed-out
/// payment's eventual outcome for reconciliation.
///
/// Implementations must be idempotent for `is_invoice_paid` and must
/// report `ok=false` — never an error — on non-final payment states, so
/// the ledger can retry or roll back safely rather than treating "unknown"
/// as "failed".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LightningClient: Send + Sync {
    async fn create_invoice(&self, amount: u64) -> Result<CreateInvoiceResult, LightningError>;
    async fn is_invoice_paid(&self, payment_hash: &str) -> Result<bool, LightningError>;
    async fn pay_invoice(
        &self,
        payment_request: &str,
        fee_limit_msat: u64,
        timeout: Duration,
    ) -> Result<PayInvoiceResult, LightningError>;
    async fn decode(&self, payment_request: &str) -> Result<DecodedInvoice, LightningError>;
    /// Re-queries the outcome of an outbound payment whose `pay_invoice`
    /// call returned `LightningError::Timeout` — the call itself gave up
    /// waiting, but the payment may still resolve on the node. Returns
    /// `None` while the outcome is still unknown.
    async fn payment_status(
        &self,
        payment_request: &str,
    ) -> Result<Option<PayInvoiceResult>, LightningError>;
}

#[derive(Debug, Clone)]
struct DeterministicInvoice {
    amount: u64,
    payment_request: String,
    destination: String,
    paid: bool,
}

/// A real, runnable Lightning stand-in: invoices are bookkept in memory and
/// looked up by their `payment_request` string. Invoices created via
/// `create_invoice` (the mint requesting payment to itself) are stamped
/// with `destination == mint_id`, so `decode` can report `is_internal` and
/// `check_fees`/`melt` can waive the fee reserve for them. Invoices that
/// stand in for a third-party Lightning node — the payee of a `melt` — are
/// created via [`DeterministicLightning::create_external_invoice`] with a
/// distinct destination. `pay_invoice` outcomes are scripted per-request
/// via [`DeterministicLightning::set_pay_outcome`] so tests can exercise
/// both the happy path and the melt-rollback path deterministically, and
/// [`DeterministicLightning::set_pay_timeout`] scripts the unknown-outcome
/// path exercised by melt reconciliation.
#[derive(Clone)]
pub struct DeterministicLightning {
    mint_id: String,
    invoices: Arc<Mutex<HashMap<String, DeterministicInvoice>>>,
    pay_outcomes: Arc<Mutex<HashMap<String, PayInvoiceResult>>>,
    timed_out_payments: Arc<Mutex<HashMap<String, Option<PayInvoiceResult>>>>,
    next_hash: Arc<Mutex<u64>>,
}

impl DeterministicLightning {
    pub fn new(mint_id: impl Into<String>) -> Self {
        Self {
            mint_id: mint_id.into(),
            invoices: Arc::new(Mutex::new(HashMap::new())),
            pay_outcomes: Arc::new(Mutex::new(HashMap::new())),
            timed_out_payments: Arc::new(Mutex::new(HashMap::new())),
            next_hash: Arc::new(Mutex::new(0)),
        }
    }

    /// Test hook: mark an invoice previously returned by `create_invoice`
    /// as paid, so a subsequent `mint()` call succeeds.
    pub fn mark_paid(&self, payment_hash: &str) {
        if let Some(invoice) = self.invoices.lock().expect("lock poisoned").get_mut(payment_hash) {
            invoice.paid = true;
        }
    }

    /// Test hook: script the outcome of the next `pay_invoice` call for a
    /// given payment request.
    pub fn set_pay_outcome(&self, payment_request: &str, outcome: PayInvoiceResult) {
        self.pay_outcomes
            .lock()
            .expect("lock poisoned")
            .insert(payment_request.to_string(), outcome);
    }

    /// Test hook: script the next `pay_invoice` call for `payment_request`
    /// to return `Err(LightningError::Timeout)`, as if the call gave up
    /// waiting on a final outcome. `eventual_outcome` becomes visible later
    /// through `payment_status`, simulating a payment that actually
    /// resolved on the node after the client-side call timed out. Pass
    /// `None` to simulate an outcome that never resolves, so
    /// `payment_status` keeps reporting unknown.
    pub fn set_pay_timeout(&self, payment_request: &str, eventual_outcome: Option<PayInvoiceResult>) {
        self.timed_out_payments
            .lock()
            .expect("lock poisoned")
            .insert(payment_request.to_string(), eventual_outcome);
    }

    /// Test hook: fabricate an invoice as if issued by a different
    /// Lightning node, for `melt` tests that need a genuinely external
    /// payment target rather than one of this mint's own invoices.
    pub fn create_external_invoice(
        &self,
        amount: u64,
        destination: impl Into<String>,
    ) -> CreateInvoiceResult {
        let mut next_hash = self.next_hash.lock().expect("lock poisoned");
        let payment_hash = format!("{:064x}", *next_hash);
        *next_hash += 1;

        let destination = destination.into();
        let payment_request = format!("lnmock-{payment_hash}-{amount}-{destination}");
        self.invoices.lock().expect("lock poisoned").insert(
            payment_hash.clone(),
            DeterministicInvoice {
                amount,
                payment_request: payment_request.clone(),
                destination,
                paid: false,
            },
        );

        CreateInvoiceResult {
            payment_hash,
            payment_request,
        }
    }
}

#[async_trait]
impl LightningClient for DeterministicLightning {
    async fn create_invoice(&self, amount: u64) -> Result<CreateInvoiceResult, LightningError> {
        let mut next_hash = self.next_hash.lock().expect("lock poisoned");
        let payment_hash = format!("{:064x}", *next_hash);
        *next_hash += 1;

        let payment_request = format!("lnmock-{payment_hash}-{amount}-{}", self.mint_id);
        self.invoices.lock().expect("lock poisoned").insert(
            payment_hash.clone(),
            DeterministicInvoice {
                amount,
                payment_request: payment_request.clone(),
                destination: self.mint_id.clone(),
                paid: false,
            },
        );

        Ok(CreateInvoiceResult {
            payment_hash,
            payment_request,
        })
    }

    async fn is_invoice_paid(&self, payment_hash: &str) -> Result<bool, LightningError> {
        self.invoices
            .lock()
            .expect("lock poisoned")
            .get(payment_hash)
            .map(|invoice| invoice.paid)
            .ok_or_else(|| LightningError::InvoiceNotFound(payment_hash.to_string()))
    }

    async fn pay_invoice(
        &self,
        payment_request: &str,
        _fee_limit_msat: u64,
        _timeout: Duration,
    ) -> Result<PayInvoiceResult, LightningError> {
        if self
            .timed_out_payments
            .lock()
            .expect("lock poisoned")
            .contains_key(payment_request)
        {
            return Err(LightningError::Timeout);
        }

        if let Some(outcome) = self
            .pay_outcomes
            .lock()
            .expect("lock poisoned")
            .remove(payment_request)
        {
            return Ok(outcome);
        }

        // default: pay successfully with zero actual fee
        Ok(PayInvoiceResult {
            ok: true,
            preimage: Some(format!("preimage-{payment_request}")),
            actual_fee: Some(0),
            error: None,
        })
    }

    async fn payment_status(
        &self,
        payment_request: &str,
    ) -> Result<Option<PayInvoiceResult>, LightningError> {
        Ok(self
            .timed_out_payments
            .lock()
            .expect("lock poisoned")
            .get(payment_request)
            .cloned()
            .flatten())
    }

    async fn decode(&self, payment_request: &str) -> Result<DecodedInvoice, LightningError> {
        let invoices = self.invoices.lock().expect("lock poisoned");
        let invoice = invoices
            .values()
            .find(|invoice| invoice.payment_request == payment_request)
            .ok_or_else(|| LightningError::DecodeInvoice(payment_request.to_string()))?;
        Ok(DecodedInvoice {
            amount: invoice.amount,
            destination: invoice.destination.clone(),
            is_internal: invoice.destination == self.mint_id,
        })
    }
}
