use axum::{extract::State, Json};

use crate::{
    api::AppState,
    constants::API_VERSION,
    error::Result,
    models::{ApiResponse, HealthResponse},
};

pub async fn health_check(State(state): State<AppState>) -> Result<Json<ApiResponse<HealthResponse>>> {
    let database = match state.db.ping().await {
        Ok(()) => "connected".to_string(),
        Err(e) => {
            tracing::error!(error = %e, "database ping failed");
            "error".to_string()
        }
    };

    Ok(Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: API_VERSION.to_string(),
        network_mode: state.config.network_mode().to_string(),
        chain_id: state.config.chain_id,
        token: state.config.slh_token_address.clone(),
        database,
    })))
}
