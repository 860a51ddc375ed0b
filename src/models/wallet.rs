use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A custodial wallet record keyed by the Telegram account that owns it.
/// `slh_address` mirrors `bnb_address` since SLH is a BEP-20 token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub telegram_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bnb_address: String,
    pub ton_address: Option<String>,
    pub slh_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the internal double-entry ledger. A `NULL` from side means the
/// amount was minted into the ledger (claim, airdrop); a `NULL` to side means
/// it left through an on-chain payout.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub from_telegram_id: Option<String>,
    pub to_telegram_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub chain: String,
    pub onchain: bool,
    pub tx_hash: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct WalletIdentity {
    pub telegram_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WalletSetRequest {
    pub bnb_address: String,
    pub ton_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BalancesResponse {
    pub telegram_id: String,
    pub bnb_address: String,
    pub ton_address: Option<String>,
    pub slh_address: Option<String>,
    pub bnb_balance: Decimal,
    pub slh_balance: Decimal,
    pub slh_balance_onchain: Decimal,
    pub slh_balance_internal: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub to_addr: String,
    pub amount_slh: String,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub ok: bool,
    pub tx_hash: String,
    pub network_mode: String,
    pub chain_id: u64,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub network_mode: String,
    pub chain_id: u64,
    pub token: String,
    pub database: String,
}
