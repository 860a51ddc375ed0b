use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    api::AppState,
    error::{AppError, Result},
    models::{ApiResponse, BalancesResponse, Wallet, WalletIdentity, WalletSetRequest},
    services::ledger::assemble_balances,
};

/// POST /api/wallet/set?telegram_id=&username=&first_name=
pub async fn set_wallet(
    State(state): State<AppState>,
    Query(identity): Query<WalletIdentity>,
    Json(body): Json<WalletSetRequest>,
) -> Result<Json<ApiResponse<Wallet>>> {
    let wallet = state
        .ledger
        .register_wallet(&identity, &body.bnb_address, body.ton_address.as_deref())
        .await?;

    tracing::info!(telegram_id = %wallet.telegram_id, "wallet registered");
    Ok(Json(ApiResponse::success(wallet)))
}

/// GET /api/wallet/{telegram_id}
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
) -> Result<Json<ApiResponse<Wallet>>> {
    let wallet = state
        .db
        .get_wallet(&telegram_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no wallet for account {}", telegram_id)))?;

    Ok(Json(ApiResponse::success(wallet)))
}

/// GET /api/wallet/{telegram_id}/balances
pub async fn get_balances(
    State(state): State<AppState>,
    Path(telegram_id): Path<String>,
) -> Result<Json<ApiResponse<BalancesResponse>>> {
    let wallet = state.ledger.require_wallet(&telegram_id).await?;

    let (bnb, slh_onchain, internal) = tokio::join!(
        state.gateway.native_balance(&wallet.bnb_address),
        state.gateway.token_balance(&wallet.bnb_address),
        state.ledger.internal_balance(&telegram_id),
    );

    Ok(Json(ApiResponse::success(assemble_balances(
        &wallet,
        bnb,
        slh_onchain,
        internal?,
    ))))
}
