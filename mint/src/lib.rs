//! Wires the ledger, a storage backend and a Lightning backend together
//! into a runnable axum server. `MintBuilder` mirrors the construction
//! style the rest of the ambient stack uses: collect pieces from the
//! environment (or from tests, by hand), then `build()` into a `Ledger`.

pub mod config;
pub mod error;
pub mod ledger;
pub mod lightning;
pub mod model;
pub mod routes;
pub mod server;
pub mod storage;

use std::sync::Arc;

use mint_core::keyset::{KeysetManager, MintKeyset};

use crate::{
    config::{LightningFeeConfig, MintConfig},
    ledger::Ledger,
    lightning::LightningClient,
    storage::{PostgresStorage, Storage},
};

/// Builds a `Ledger` from a seed, a Lightning backend and a storage
/// backend. The derivation path is fixed (`MAX_ORDER` denominations under
/// a single keyset); a future revision that needs multiple active keysets
/// per mint would extend this with `with_keyset_rotation`.
pub struct MintBuilder<S: Storage> {
    seed: Option<String>,
    derivation_path: String,
    lightning: Option<Arc<dyn LightningClient>>,
    storage: Option<S>,
    fee_config: LightningFeeConfig,
}

impl<S: Storage> Default for MintBuilder<S> {
    fn default() -> Self {
        Self {
            seed: None,
            derivation_path: "0/0/0/0".to_string(),
            lightning: None,
            storage: None,
            fee_config: LightningFeeConfig::default(),
        }
    }
}

impl<S: Storage> MintBuilder<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: String) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_derivation_path(mut self, derivation_path: String) -> Self {
        self.derivation_path = derivation_path;
        self
    }

    pub fn with_lightning(mut self, lightning: Arc<dyn LightningClient>) -> Self {
        self.lightning = Some(lightning);
        self
    }

    pub fn with_storage(mut self, storage: S) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_fee_config(mut self, fee_config: LightningFeeConfig) -> Self {
        self.fee_config = fee_config;
        self
    }

    pub fn build(self) -> Ledger<S> {
        let keyset = MintKeyset::new(
            &self.seed.expect("MINT_PRIVATE_KEY not set"),
            &self.derivation_path,
        );
        let manager = KeysetManager::new(keyset);
        Ledger::new(
            self.storage.expect("storage backend not set"),
            self.lightning.expect("lightning backend not set"),
            manager,
            self.fee_config,
        )
    }
}

/// Convenience wiring for the common case: Postgres-backed storage, run to
/// completion with `server::run_server`. Exercised by the binary; kept
/// outside `main` so it stays testable.
///
/// Runs `Ledger::reconcile_pending_melts` once before returning, so any
/// melt left pending by a Lightning timeout before the last restart (or
/// crash) gets resolved before the mint starts serving new requests.
pub async fn build_postgres_ledger(
    lightning: Arc<dyn LightningClient>,
    config: &MintConfig,
) -> anyhow::Result<Ledger<PostgresStorage>> {
    let storage = PostgresStorage::new(&config.database).await?;
    storage.migrate().await;

    let ledger = MintBuilder::new()
        .with_seed(std::env::var("MINT_PRIVATE_KEY").expect("MINT_PRIVATE_KEY not set"))
        .with_lightning(lightning)
        .with_storage(storage)
        .with_fee_config(config.lightning_fee.clone())
        .build();

    let resolved = ledger.reconcile_pending_melts().await?;
    if resolved > 0 {
        tracing::info!(resolved, "reconciled pending melts on startup");
    }

    Ok(ledger)
}
