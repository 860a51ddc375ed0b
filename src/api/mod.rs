pub mod health;
pub mod telegram;
pub mod transfer;
pub mod wallet;

use axum::{
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    db::Database,
    error::{AppError, Result},
    services::{ChainGateway, PriceCache, TelegramBot, WalletLedger},
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub gateway: Arc<dyn ChainGateway>,
    pub ledger: WalletLedger,
    pub price: Arc<PriceCache>,
    pub bot: Option<Arc<TelegramBot>>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_from_config(&state.config);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/wallet/set", post(wallet::set_wallet))
        .route("/api/wallet/{telegram_id}", get(wallet::get_wallet))
        .route(
            "/api/wallet/{telegram_id}/balances",
            get(wallet::get_balances),
        )
        .route("/transfer/slh", post(transfer::transfer_slh))
        .route("/telegram/webhook", post(telegram::webhook))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let origins = config.cors_allowed_origins.trim();
    if origins.is_empty() || origins == "*" {
        return CorsLayer::very_permissive();
    }

    let parsed: Vec<axum::http::HeaderValue> = origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();
    if parsed.is_empty() {
        tracing::warn!("no parseable CORS origins, falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Shared-secret gate for the raw transfer endpoint. Open when no secret is
/// configured.
pub fn check_transfer_secret(config: &Config, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = config.transfer_shared_secret.as_deref() else {
        return Ok(());
    };

    let presented = headers
        .get("x-transfer-secret")
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected) {
        return Err(AppError::Forbidden(
            "missing or wrong x-transfer-secret".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use axum::http::HeaderValue;

    #[test]
    fn transfer_secret_gate() {
        let cfg = test_config();

        let mut headers = HeaderMap::new();
        assert!(check_transfer_secret(&cfg, &headers).is_err());

        headers.insert("x-transfer-secret", HeaderValue::from_static("wrong"));
        assert!(check_transfer_secret(&cfg, &headers).is_err());

        headers.insert("x-transfer-secret", HeaderValue::from_static("secret"));
        assert!(check_transfer_secret(&cfg, &headers).is_ok());
    }

    #[test]
    fn transfer_secret_open_when_unconfigured() {
        let mut cfg = test_config();
        cfg.transfer_shared_secret = None;
        assert!(check_transfer_secret(&cfg, &HeaderMap::new()).is_ok());
    }
}
