//! HTTP handlers, one per endpoint in `server::app`'s route table. Each
//! handler does argument extraction and response shaping only — all domain
//! logic lives in `Ledger`.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{FromRef, Path, Query, State},
    Json,
};
use mint_core::{
    blind::TotalAmount,
    primitives::{
        CheckFeesRequest, CheckFeesResponse, CheckSpendableRequest, CheckSpendableResponse,
        KeysResponse, KeysetsResponse, MintInfoResponse, PaymentRequest, PostMeltRequest,
        PostMeltResponse, PostMintRequest, PostMintResponse, PostSplitRequest, PostSplitResponse,
        ReservePromisesResponse, ReserveProofsResponse,
    },
};

use crate::{
    config::MintConfig,
    error::MintError,
    ledger::Ledger,
    model::{GetMintQuery, PostMintQuery},
    storage::Storage,
};

/// Nut's keyset ids are passed url-safe in the path; storage and the
/// `KeysetManager` key everything on the standard alphabet the id was
/// derived with.
fn urlsafe_to_standard_b64(id: &str) -> String {
    id.replace('-', "+").replace('_', "/")
}

fn keys_response(public_keys: &HashMap<u64, secp256k1::PublicKey>) -> KeysResponse {
    KeysResponse {
        keys: public_keys
            .iter()
            .map(|(amount, key)| (amount.to_string(), *key))
            .collect(),
    }
}

/// Shared axum state: the ledger behind an `Arc` (cheap to clone per
/// request) plus the static mint config used only by `/info`.
pub struct AppState<S: Storage> {
    pub ledger: Arc<Ledger<S>>,
    pub config: MintConfig,
}

impl<S: Storage> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: Storage> FromRef<AppState<S>> for Arc<Ledger<S>> {
    fn from_ref(state: &AppState<S>) -> Self {
        state.ledger.clone()
    }
}

impl<S: Storage> FromRef<AppState<S>> for MintConfig {
    fn from_ref(state: &AppState<S>) -> Self {
        state.config.clone()
    }
}

pub async fn get_info<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
    State(config): State<MintConfig>,
) -> Json<MintInfoResponse> {
    let mint_pubkey = ledger.active_keyset().mint_pubkey;
    Json(MintInfoResponse {
        name: config.info.name,
        pubkey: mint_pubkey,
        version: Some(config.build.full_version()),
        description: config.info.description,
        description_long: config.info.description_long,
        contact: config.info.contact,
        nuts: vec![
            "NUT-00".to_string(),
            "NUT-01".to_string(),
            "NUT-02".to_string(),
            "NUT-03".to_string(),
            "NUT-04".to_string(),
            "NUT-05".to_string(),
            "NUT-06".to_string(),
            "NUT-08".to_string(),
            "NUT-09".to_string(),
            "NUT-12".to_string(),
        ],
        motd: config.info.motd,
    })
}

pub async fn get_keys<S: Storage>(State(ledger): State<Arc<Ledger<S>>>) -> Json<KeysResponse> {
    Json(keys_response(&ledger.active_keyset().public_keys))
}

pub async fn get_keys_by_id<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
    Path(id): Path<String>,
) -> Result<Json<KeysResponse>, MintError> {
    let id = urlsafe_to_standard_b64(&id);
    let keyset = ledger.keyset_by_id(Some(&id))?;
    Ok(Json(keys_response(&keyset.public_keys)))
}

pub async fn get_keysets<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
) -> Json<KeysetsResponse> {
    Json(KeysetsResponse {
        keysets: ledger.keyset_ids(),
    })
}

pub async fn get_mint<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
    Query(query): Query<GetMintQuery>,
) -> Result<Json<PaymentRequest>, MintError> {
    let (pr, hash) = ledger.request_mint(query.amount).await?;
    Ok(Json(PaymentRequest { pr, hash }))
}

pub async fn post_mint<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
    Query(query): Query<PostMintQuery>,
    Json(request): Json<PostMintRequest>,
) -> Result<Json<PostMintResponse>, MintError> {
    let promises = ledger.mint(&query.payment_hash, &request.outputs).await?;
    Ok(Json(PostMintResponse { promises }))
}

pub async fn post_melt<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
    Json(request): Json<PostMeltRequest>,
) -> Result<Json<PostMeltResponse>, MintError> {
    let (paid, preimage, change) = ledger
        .melt(&request.proofs, &request.pr, &request.outputs)
        .await?;
    Ok(Json(PostMeltResponse {
        paid,
        preimage,
        change,
    }))
}

pub async fn post_check<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
    Json(request): Json<CheckSpendableRequest>,
) -> Result<Json<CheckSpendableResponse>, MintError> {
    let spendable = ledger.check_spendable(&request.proofs).await?;
    Ok(Json(CheckSpendableResponse { spendable }))
}

pub async fn post_check_fees<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
    Json(request): Json<CheckFeesRequest>,
) -> Result<Json<CheckFeesResponse>, MintError> {
    let fee = ledger.check_fees(&request.pr).await?;
    Ok(Json(CheckFeesResponse { fee }))
}

pub async fn post_split<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
    Json(request): Json<PostSplitRequest>,
) -> Result<Json<PostSplitResponse>, MintError> {
    let (fst, snd) = ledger
        .split(&request.proofs, request.amount, &request.outputs)
        .await?;
    Ok(Json(PostSplitResponse::new(fst, snd)))
}

pub async fn get_reserve_promises<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ReservePromisesResponse>, MintError> {
    let id = urlsafe_to_standard_b64(&id);
    let promises = ledger.promises_by_keyset(&id).await?;
    let sum_amounts = promises.total_amount();
    Ok(Json(ReservePromisesResponse {
        promises,
        id,
        sum_amounts,
    }))
}

pub async fn get_reserve_proofs<S: Storage>(
    State(ledger): State<Arc<Ledger<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ReserveProofsResponse>, MintError> {
    let id = urlsafe_to_standard_b64(&id);
    let proofs = ledger.proofs_by_keyset(&id).await?;
    let sum_amounts = proofs.iter().map(|proof| proof.amount).sum();
    Ok(Json(ReserveProofsResponse {
        proofs,
        id,
        sum_amounts,
    }))
}
