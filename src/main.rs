mod api;
mod codec;
mod config;
mod constants;
mod db;
mod error;
mod models;
mod services;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api::{build_router, AppState},
    config::Config,
    db::Database,
    services::{BscGateway, ChainGateway, PriceCache, TelegramBot, WalletLedger},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slh_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    tracing::info!(
        network = config.network_mode(),
        chain_id = config.chain_id,
        token = %config.slh_token_address,
        "starting slh-backend"
    );

    let db = Database::new(&config.database_url, config.database_max_connections).await?;
    db.run_migrations().await?;
    tracing::info!("database ready");

    let gateway: Arc<dyn ChainGateway> = Arc::new(BscGateway::from_config(&config)?);
    let ledger = WalletLedger::new(db.clone(), config.clone());
    let price = Arc::new(PriceCache::from_config(&config));

    let bot = config
        .telegram_bot_token
        .as_deref()
        .map(|token| Arc::new(TelegramBot::new(token)));

    // Webhook registration is best effort; the HTTP facade works without it.
    if let (Some(bot), Some(base)) = (bot.clone(), config.public_base_url.clone()) {
        tokio::spawn(async move {
            if let Err(e) = bot.set_webhook(&base).await {
                tracing::warn!(error = %e, "webhook registration failed");
            }
        });
    }

    let state = AppState {
        db,
        config: config.clone(),
        gateway,
        ledger,
        price,
        bot,
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
