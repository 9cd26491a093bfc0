#![allow(clippy::blocks_in_conditions)]
use std::collections::HashMap;

use async_trait::async_trait;
use mint_core::{blind::BlindedSignature, dhke, proof::Proof};
use sqlx::postgres::PgPoolOptions;
use tracing::instrument;

use super::{StoredKeyset, Storage};
use crate::{config::DatabaseConfig, error::MintError, model::Invoice};

#[derive(Clone)]
pub struct PostgresStorage {
    pool: sqlx::Pool<sqlx::Postgres>,
}

impl PostgresStorage {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        Ok(Self {
            pool: PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(config.db_url.as_str())
                .await?,
        })
    }

    pub async fn migrate(&self) {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .expect("could not run migrations");
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    type Tx = sqlx::Transaction<'static, sqlx::Postgres>;

    async fn begin_tx(&self) -> Result<Self::Tx, MintError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit_tx(&self, tx: Self::Tx) -> Result<(), MintError> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback_tx(&self, tx: Self::Tx) -> Result<(), MintError> {
        tx.rollback().await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, tx), err)]
    async fn get_invoice(
        &self,
        tx: &mut Self::Tx,
        payment_hash: &str,
    ) -> Result<Option<Invoice>, MintError> {
        let invoice = sqlx::query!(
            "SELECT amount, payment_hash, payment_request, paid, issued FROM invoices WHERE payment_hash = $1",
            payment_hash
        )
        .map(|row| Invoice {
            amount: row.amount as u64,
            payment_hash: row.payment_hash,
            payment_request: row.payment_request,
            paid: row.paid,
            issued: row.issued,
        })
        .fetch_optional(&mut **tx)
        .await?;
        Ok(invoice)
    }

    #[instrument(level = "debug", skip(self, tx, invoice), err)]
    async fn store_invoice(&self, tx: &mut Self::Tx, invoice: Invoice) -> Result<(), MintError> {
        sqlx::query!(
            "INSERT INTO invoices (amount, payment_hash, payment_request, paid, issued) VALUES ($1, $2, $3, $4, $5)",
            invoice.amount as i64,
            invoice.payment_hash,
            invoice.payment_request,
            invoice.paid,
            invoice.issued
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, tx), err)]
    async fn mark_invoice_paid(
        &self,
        tx: &mut Self::Tx,
        payment_hash: &str,
    ) -> Result<(), MintError> {
        sqlx::query!(
            "UPDATE invoices SET paid = true WHERE payment_hash = $1",
            payment_hash
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, tx), err)]
    async fn mark_invoice_issued(
        &self,
        tx: &mut Self::Tx,
        payment_hash: &str,
    ) -> Result<(), MintError> {
        sqlx::query!(
            "UPDATE invoices SET issued = true WHERE payment_hash = $1",
            payment_hash
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, tx), err)]
    async fn is_secret_spent(&self, tx: &mut Self::Tx, secret: &str) -> Result<bool, MintError> {
        let row = sqlx::query!(
            "SELECT EXISTS(SELECT 1 FROM spent_proofs WHERE secret = $1) AS spent",
            secret
        )
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.spent.unwrap_or(false))
    }

    #[instrument(level = "debug", skip(self, tx, proofs), err)]
    async fn insert_spent_proofs(
        &self,
        tx: &mut Self::Tx,
        proofs: &[Proof],
    ) -> Result<(), MintError> {
        for proof in proofs {
            sqlx::query!(
                "INSERT INTO spent_proofs (amount, secret, c, keyset_id) VALUES ($1, $2, $3, $4)",
                proof.amount as i64,
                proof.secret,
                proof.c.to_string(),
                proof.keyset_id
            )
            .execute(&mut **tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    MintError::ProofAlreadySpent(proof.secret.clone())
                }
                other => MintError::Db(other),
            })?;
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self, tx, secrets), err)]
    async fn delete_spent_proofs(
        &self,
        tx: &mut Self::Tx,
        secrets: &[String],
    ) -> Result<(), MintError> {
        sqlx::query!("DELETE FROM spent_proofs WHERE secret = ANY($1)", secrets)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, tx, secrets), err)]
    async fn mark_melt_pending(
        &self,
        tx: &mut Self::Tx,
        payment_request: &str,
        secrets: &[String],
    ) -> Result<(), MintError> {
        sqlx::query!(
            "UPDATE spent_proofs SET payment_request = $1, pending = true WHERE secret = ANY($2)",
            payment_request,
            secrets
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, tx), err)]
    async fn resolve_melt_pending(
        &self,
        tx: &mut Self::Tx,
        payment_request: &str,
    ) -> Result<(), MintError> {
        sqlx::query!(
            "UPDATE spent_proofs SET pending = false WHERE payment_request = $1",
            payment_request
        )
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, tx), err)]
    async fn list_pending_melts(
        &self,
        tx: &mut Self::Tx,
    ) -> Result<Vec<(String, Vec<String>)>, MintError> {
        let rows = sqlx::query!(
            "SELECT payment_request, secret FROM spent_proofs WHERE pending AND payment_request IS NOT NULL"
        )
        .fetch_all(&mut **tx)
        .await?;

        let mut by_request: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            if let Some(payment_request) = row.payment_request {
                by_request.entry(payment_request).or_default().push(row.secret);
            }
        }
        Ok(by_request.into_iter().collect())
    }

    #[instrument(level = "debug", skip(self, tx, promises), err)]
    async fn store_promises(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
        promises: &[BlindedSignature],
    ) -> Result<(), MintError> {
        for promise in promises {
            sqlx::query!(
                "INSERT INTO promises (amount, c_, keyset_id) VALUES ($1, $2, $3)",
                promise.amount as i64,
                promise.c_.to_string(),
                keyset_id
            )
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self, tx), err)]
    async fn get_promises_by_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
    ) -> Result<Vec<BlindedSignature>, MintError> {
        let promises = sqlx::query!(
            "SELECT amount, c_, keyset_id FROM promises WHERE keyset_id = $1",
            keyset_id
        )
        .map(|row| BlindedSignature {
            amount: row.amount as u64,
            c_: dhke::public_key_from_hex(&row.c_),
            id: row.keyset_id,
            dleq: None,
        })
        .fetch_all(&mut **tx)
        .await?;
        Ok(promises)
    }

    #[instrument(level = "debug", skip(self, tx), err)]
    async fn get_proofs_by_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
    ) -> Result<Vec<Proof>, MintError> {
        let proofs = sqlx::query!(
            "SELECT amount, secret, c, keyset_id FROM spent_proofs WHERE keyset_id = $1",
            keyset_id
        )
        .map(|row| Proof {
            amount: row.amount as u64,
            secret: row.secret,
            c: dhke::public_key_from_hex(&row.c),
            keyset_id: row.keyset_id,
            dleq: None,
        })
        .fetch_all(&mut **tx)
        .await?;
        Ok(proofs)
    }

    #[instrument(level = "debug", skip(self, tx), err)]
    async fn get_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset_id: &str,
    ) -> Result<Option<StoredKeyset>, MintError> {
        let rows = sqlx::query!(
            "SELECT amount, pubkey FROM keyset_pubkeys WHERE keyset_id = $1",
            keyset_id
        )
        .fetch_all(&mut **tx)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let public_keys = rows
            .into_iter()
            .map(|row| (row.amount as u64, dhke::public_key_from_hex(&row.pubkey)))
            .collect::<HashMap<_, _>>();

        Ok(Some(StoredKeyset {
            keyset_id: keyset_id.to_string(),
            public_keys,
        }))
    }

    #[instrument(level = "debug", skip(self, tx, keyset), err)]
    async fn store_keyset(
        &self,
        tx: &mut Self::Tx,
        keyset: &StoredKeyset,
    ) -> Result<(), MintError> {
        for (amount, pubkey) in &keyset.public_keys {
            sqlx::query!(
                "INSERT INTO keyset_pubkeys (keyset_id, amount, pubkey) VALUES ($1, $2, $3)
                 ON CONFLICT (keyset_id, amount) DO NOTHING",
                keyset.keyset_id,
                *amount as i64,
                pubkey.to_string()
            )
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
