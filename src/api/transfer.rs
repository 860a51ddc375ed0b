use axum::{extract::State, http::HeaderMap, Json};

use crate::{
    api::{check_transfer_secret, AppState},
    error::Result,
    models::{ApiResponse, TransferRequest, TransferResponse},
    services::gateway::preflight_transfer,
    services::ledger::parse_ledger_amount,
};

/// POST /transfer/slh. Signs an operator-funded SLH transfer to an arbitrary
/// address and records it in the ledger as an outbound payout.
pub async fn transfer_slh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TransferRequest>,
) -> Result<Json<ApiResponse<TransferResponse>>> {
    check_transfer_secret(&state.config, &headers)?;

    let units = preflight_transfer(
        &body.to_addr,
        &body.amount_slh,
        state.config.slh_token_decimals,
    )?;
    let amount = parse_ledger_amount(&body.amount_slh)?;

    let tx_hash = state.gateway.send_token(&body.to_addr, units).await?;

    let note = format!("api transfer to {}", body.to_addr.trim().to_ascii_lowercase());
    state
        .db
        .insert_onchain_payout(None, amount, &tx_hash, Some(&note))
        .await?;

    tracing::info!(tx_hash = %tx_hash, to = %body.to_addr, amount = %amount, "api transfer broadcast");

    Ok(Json(ApiResponse::success(TransferResponse {
        ok: true,
        tx_hash,
        network_mode: state.config.network_mode().to_string(),
        chain_id: state.config.chain_id,
        token: state.config.slh_token_address.clone(),
    })))
}
