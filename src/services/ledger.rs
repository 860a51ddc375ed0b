//! Internal SLH ledger on top of the transfers table.
//!
//! Credits (claim, airdrop) insert rows with a NULL from side. Member to
//! member sends debit the sender after a funds check. Every write validates
//! amounts before touching the database.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::{
    codec,
    config::Config,
    db::Database,
    error::{AppError, Result},
    models::{BalancesResponse, LedgerEntry, Wallet, WalletIdentity},
};

#[derive(Clone)]
pub struct WalletLedger {
    db: Database,
    config: Config,
}

/// Parses a ledger amount. Strictly positive, at most 18 fractional digits
/// to match the NUMERIC(40,18) column.
pub fn parse_ledger_amount(value: &str) -> Result<Decimal> {
    let amount = Decimal::from_str(value.trim())
        .map_err(|_| AppError::InvalidAmount(format!("not a decimal number: {:?}", value)))?
        .normalize();
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(
            "amount must be positive".to_string(),
        ));
    }
    if amount.scale() > 18 {
        return Err(AppError::InvalidAmount(
            "more than 18 fractional digits".to_string(),
        ));
    }
    Ok(amount)
}

/// True while the rolling 24-hour claim window is still open.
pub fn claim_cooldown_active(last_claim_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_claim_at {
        Some(at) => now - at < Duration::hours(24),
        None => false,
    }
}

/// Combines a wallet row with chain reads into the balances payload. The
/// headline `slh_balance` is on-chain plus internal.
pub fn assemble_balances(
    wallet: &Wallet,
    bnb_balance: Decimal,
    slh_onchain: Decimal,
    slh_internal: Decimal,
) -> BalancesResponse {
    BalancesResponse {
        telegram_id: wallet.telegram_id.clone(),
        bnb_address: wallet.bnb_address.clone(),
        ton_address: wallet.ton_address.clone(),
        slh_address: wallet.slh_address.clone(),
        bnb_balance,
        slh_balance: slh_onchain + slh_internal,
        slh_balance_onchain: slh_onchain,
        slh_balance_internal: slh_internal,
    }
}

impl WalletLedger {
    pub fn new(db: Database, config: Config) -> Self {
        Self { db, config }
    }

    /// Binds an on-chain address to a Telegram account, creating the wallet
    /// row when needed.
    pub async fn register_wallet(
        &self,
        identity: &WalletIdentity,
        bnb_address: &str,
        ton_address: Option<&str>,
    ) -> Result<Wallet> {
        let bnb_address = bnb_address.trim();
        if !codec::is_valid_address(bnb_address) {
            return Err(AppError::InvalidAddress(format!(
                "expected 0x + 40 hex chars, got {:?}",
                bnb_address
            )));
        }
        self.db
            .upsert_wallet(identity, &bnb_address.to_ascii_lowercase(), ton_address)
            .await
    }

    pub async fn require_wallet(&self, telegram_id: &str) -> Result<Wallet> {
        self.db
            .get_wallet(telegram_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no wallet for account {}", telegram_id)))
    }

    pub async fn find_wallet_by_username(&self, username: &str) -> Result<Option<Wallet>> {
        self.db.get_wallet_by_username(username).await
    }

    /// Member to member transfer inside the ledger. The sender must hold
    /// enough internal SLH.
    pub async fn internal_send(
        &self,
        from_telegram_id: &str,
        to_telegram_id: &str,
        amount: &str,
        note: Option<&str>,
    ) -> Result<LedgerEntry> {
        let amount = parse_ledger_amount(amount)?;
        if from_telegram_id == to_telegram_id {
            return Err(AppError::BadRequest(
                "cannot send to yourself".to_string(),
            ));
        }

        let funds = self.db.internal_balance(from_telegram_id).await?;
        if funds < amount {
            return Err(AppError::BadRequest(format!(
                "insufficient internal balance: have {}, need {}",
                funds.normalize(),
                amount
            )));
        }

        self.db
            .insert_transfer(Some(from_telegram_id), Some(to_telegram_id), amount, note)
            .await
    }

    /// Daily engagement reward. One claim per rolling 24 hours, checked
    /// against the latest claim row so unrelated traffic cannot bury it.
    pub async fn claim(&self, telegram_id: &str) -> Result<LedgerEntry> {
        let reward = parse_ledger_amount(&self.config.claim_reward_slh)?;

        let last_claim = self.db.last_claim_at(telegram_id).await?;
        if claim_cooldown_active(last_claim, Utc::now()) {
            return Err(AppError::BadRequest(
                "already claimed in the last 24 hours".to_string(),
            ));
        }

        self.db
            .insert_transfer(None, Some(telegram_id), reward, Some("claim"))
            .await
    }

    /// Admin-only credit into a member's internal balance.
    pub async fn airdrop(
        &self,
        admin_telegram_id: &str,
        to_telegram_id: &str,
        amount: &str,
    ) -> Result<LedgerEntry> {
        if !self.config.is_admin(admin_telegram_id) {
            return Err(AppError::Forbidden(
                "admin allow-list does not include this account".to_string(),
            ));
        }
        let amount = parse_ledger_amount(amount)?;

        self.db
            .insert_transfer(None, Some(to_telegram_id), amount, Some("airdrop"))
            .await
    }

    pub async fn internal_balance(&self, telegram_id: &str) -> Result<Decimal> {
        self.db.internal_balance(telegram_id).await
    }

    pub async fn history(&self, telegram_id: &str, limit: i64) -> Result<Vec<LedgerEntry>> {
        self.db.transfer_history(telegram_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn wallet() -> Wallet {
        Wallet {
            telegram_id: "42".to_string(),
            username: Some("satoshi".to_string()),
            first_name: Some("Sat".to_string()),
            last_name: None,
            bnb_address: "0xd0617b54fb4b6b66307846f217b4d685800e3da4".to_string(),
            ton_address: None,
            slh_address: Some("0xd0617b54fb4b6b66307846f217b4d685800e3da4".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn ledger_amounts_are_validated() {
        assert_eq!(parse_ledger_amount("1.50").unwrap().to_string(), "1.5");
        assert!(parse_ledger_amount("0").is_err());
        assert!(parse_ledger_amount("-3").is_err());
        assert!(parse_ledger_amount("ten").is_err());
        assert!(parse_ledger_amount("0.0000000000000000001").is_err());
    }

    #[test]
    fn claim_cooldown_holds_for_a_full_day() {
        let now = Utc::now();
        // never claimed
        assert!(!claim_cooldown_active(None, now));
        // a fresh claim blocks, however much other traffic the account has
        assert!(claim_cooldown_active(Some(now - Duration::minutes(5)), now));
        assert!(claim_cooldown_active(Some(now - Duration::hours(23)), now));
        // reopens after the window
        assert!(!claim_cooldown_active(Some(now - Duration::hours(25)), now));
    }

    #[test]
    fn balances_sum_onchain_and_internal() {
        let w = wallet();
        let resp = assemble_balances(
            &w,
            Decimal::new(25, 2),
            Decimal::new(100, 0),
            Decimal::new(7, 0),
        );
        assert_eq!(resp.bnb_balance.to_string(), "0.25");
        assert_eq!(resp.slh_balance_onchain.to_string(), "100");
        assert_eq!(resp.slh_balance_internal.to_string(), "7");
        assert_eq!(resp.slh_balance.to_string(), "107");
        assert_eq!(resp.bnb_address, w.bnb_address);
    }
}
