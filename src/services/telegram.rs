//! Telegram chat facade. Receives webhook updates, dispatches bot commands,
//! replies through the Bot API.
//!
//! Command handlers never bubble errors back to the webhook: Telegram retries
//! non-200 responses, so every failure becomes a chat reply instead.

use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde_json::json;
use std::{collections::HashMap, time::Duration};
use tokio::sync::RwLock;

use crate::{
    api::AppState,
    codec,
    constants::{HISTORY_PAGE_SIZE, TELEGRAM_TIMEOUT_SECS},
    error::{AppError, Result},
    models::{LedgerEntry, TgUser, Update, Wallet, WalletIdentity},
};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Recipient of an internal send, before wallet resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Username(String),
    TelegramId(String),
}

impl Target {
    fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if let Some(name) = token.strip_prefix('@') {
            if name.is_empty() {
                return None;
            }
            return Some(Target::Username(name.to_string()));
        }
        if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
            return Some(Target::TelegramId(token.to_string()));
        }
        None
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct SendArgs {
    pub amount: String,
    pub target: Target,
    pub note: Option<String>,
}

/// `/send_slh <amount> <@username|telegram_id> [note...]`
pub fn parse_send_args(rest: &str) -> Result<SendArgs> {
    let mut parts = rest.split_whitespace();
    let amount = parts
        .next()
        .ok_or_else(|| AppError::BadRequest("usage: /send_slh <amount> <@user|id> [note]".into()))?;
    let target_token = parts
        .next()
        .ok_or_else(|| AppError::BadRequest("usage: /send_slh <amount> <@user|id> [note]".into()))?;
    let target = Target::parse(target_token).ok_or_else(|| {
        AppError::BadRequest(format!(
            "recipient must be @username or a numeric id, got {:?}",
            target_token
        ))
    })?;

    let note = parts.collect::<Vec<_>>().join(" ");
    Ok(SendArgs {
        amount: amount.to_string(),
        target,
        note: if note.is_empty() { None } else { Some(note) },
    })
}

/// `/airdrop <amount> <target> [target...]`
pub fn parse_airdrop_args(rest: &str) -> Result<(String, Vec<Target>)> {
    let mut parts = rest.split_whitespace();
    let amount = parts
        .next()
        .ok_or_else(|| AppError::BadRequest("usage: /airdrop <amount> <targets...>".into()))?
        .to_string();

    let mut targets = Vec::new();
    for token in parts {
        let target = Target::parse(token).ok_or_else(|| {
            AppError::BadRequest(format!("bad airdrop target {:?}", token))
        })?;
        targets.push(target);
    }
    if targets.is_empty() {
        return Err(AppError::BadRequest(
            "usage: /airdrop <amount> <targets...>".into(),
        ));
    }
    Ok((amount, targets))
}

/// Reply-keyboard labels double as commands.
fn canonical_command(text: &str) -> &str {
    match text.trim() {
        "💰 Balances" => "/balances",
        "👛 Wallet" => "/wallet",
        "📜 History" => "/history",
        "🎁 Claim" => "/claim",
        other => other,
    }
}

fn identity_of(user: &TgUser) -> WalletIdentity {
    WalletIdentity {
        telegram_id: user.id.to_string(),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}

fn format_usd(amount: Decimal, usd_per_unit: Option<f64>) -> String {
    match usd_per_unit.and_then(Decimal::from_f64) {
        Some(rate) => format!(" (~${:.2})", amount * rate),
        None => String::new(),
    }
}

fn format_entry(entry: &LedgerEntry, me: &str) -> String {
    let incoming = entry.to_telegram_id.as_deref() == Some(me);
    let sign = if incoming { "+" } else { "-" };
    let counterparty = if incoming {
        entry.from_telegram_id.clone().unwrap_or_else(|| "system".into())
    } else {
        entry.to_telegram_id.clone().unwrap_or_else(|| "on-chain".into())
    };
    let mut line = format!(
        "{}{} {} [{}] {} {}",
        sign,
        entry.amount.normalize(),
        entry.currency,
        entry.chain,
        counterparty,
        entry.created_at.format("%Y-%m-%d %H:%M"),
    );
    if let Some(hash) = &entry.tx_hash {
        line.push_str(&format!(" tx:{}", hash));
    }
    line
}

enum PendingInput {
    AwaitWalletAddress,
}

pub struct TelegramBot {
    client: reqwest::Client,
    api_base: String,
    sessions: RwLock<HashMap<String, PendingInput>>,
}

impl TelegramBot {
    pub fn new(token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: format!("{}/bot{}", TELEGRAM_API, token),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn main_keyboard() -> serde_json::Value {
        json!({
            "keyboard": [
                [{"text": "💰 Balances"}, {"text": "👛 Wallet"}],
                [{"text": "📜 History"}, {"text": "🎁 Claim"}],
            ],
            "resize_keyboard": true,
        })
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": Self::main_keyboard(),
        });

        let response = self
            .client
            .post(format!("{}/sendMessage", self.api_base))
            .timeout(Duration::from_secs(TELEGRAM_TIMEOUT_SECS))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Telegram(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Telegram(format!(
                "sendMessage returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Courtesy notification. Failures are logged, never propagated.
    pub async fn notify(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.send_message(chat_id, text).await {
            tracing::warn!(error = %e, chat_id, "failed to notify member");
        }
    }

    pub async fn set_webhook(&self, public_base_url: &str) -> Result<()> {
        let url = format!("{}/telegram/webhook", public_base_url);
        let response = self
            .client
            .post(format!("{}/setWebhook", self.api_base))
            .timeout(Duration::from_secs(TELEGRAM_TIMEOUT_SECS))
            .json(&json!({ "url": url }))
            .send()
            .await
            .map_err(|e| AppError::Telegram(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Telegram(format!(
                "setWebhook returned {}",
                response.status()
            )));
        }
        tracing::info!(url = %url, "telegram webhook registered");
        Ok(())
    }

    pub async fn handle_update(&self, state: &AppState, update: Update) {
        let Some(message) = update.into_message() else {
            return;
        };
        let Some(from) = message.from else {
            return;
        };
        let Some(text) = message.text else {
            return;
        };

        let chat_id = message.chat.id;
        let identity = identity_of(&from);

        let reply = match self.dispatch(state, &identity, chat_id, &text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(error = %e, telegram_id = %identity.telegram_id, "command failed");
                format!("⚠️ {}", e)
            }
        };

        self.notify(chat_id, &reply).await;
    }

    async fn dispatch(
        &self,
        state: &AppState,
        identity: &WalletIdentity,
        _chat_id: i64,
        raw_text: &str,
    ) -> Result<String> {
        let text = canonical_command(raw_text);
        let me = identity.telegram_id.as_str();

        // Bare address messages always register, command or session aside.
        if codec::is_valid_address(text) {
            self.sessions.write().await.remove(me);
            let wallet = state.ledger.register_wallet(identity, text, None).await?;
            return Ok(format!("✅ Wallet saved: {}", wallet.bnb_address));
        }

        if !text.starts_with('/') {
            if matches!(
                self.sessions.read().await.get(me),
                Some(PendingInput::AwaitWalletAddress)
            ) {
                return Err(AppError::InvalidAddress(format!(
                    "expected a 0x address, got {:?}",
                    text
                )));
            }
            return Ok("Unknown input. Try /wallet, /balances, /send_slh or /history.".into());
        }

        let (command, rest) = match text.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (text, ""),
        };
        // Group chats address commands as /cmd@BotName.
        let command = command.split('@').next().unwrap_or(command);

        match command {
            "/start" => self.cmd_start(state, identity).await,
            "/wallet" => self.cmd_wallet(state, me).await,
            "/set_wallet" => self.cmd_set_wallet(state, identity, rest).await,
            "/balances" => self.cmd_balances(state, me).await,
            "/send_slh" => self.cmd_send_slh(state, me, rest).await,
            "/history" => self.cmd_history(state, me).await,
            "/claim" => self.cmd_claim(state, me).await,
            "/airdrop" => self.cmd_airdrop(state, me, rest).await,
            "/admin" => self.cmd_admin(state, me).await,
            other => Ok(format!("Unknown command {}. Try /start.", other)),
        }
    }

    async fn cmd_start(&self, state: &AppState, identity: &WalletIdentity) -> Result<String> {
        let name = identity.first_name.as_deref().unwrap_or("there");
        let mut greeting = format!(
            "Hi {}! I manage SLH on BNB Smart Chain ({}).\n\
             /wallet - link your 0x address\n\
             /balances - BNB and SLH balances\n\
             /send_slh <amount> <@user|id> - send SLH to a member\n\
             /claim - daily SLH reward\n\
             /history - recent transfers",
            name,
            state.config.network_mode(),
        );
        if let Some(link) = &state.config.community_link {
            greeting.push_str(&format!("\nCommunity: {}", link));
        }
        Ok(greeting)
    }

    async fn cmd_wallet(&self, state: &AppState, me: &str) -> Result<String> {
        match state.db.get_wallet(me).await? {
            Some(wallet) => {
                let ton = wallet.ton_address.as_deref().unwrap_or("not set");
                Ok(format!(
                    "👛 BNB/SLH address: {}\nTON address: {}",
                    wallet.bnb_address, ton
                ))
            }
            None => {
                self.sessions
                    .write()
                    .await
                    .insert(me.to_string(), PendingInput::AwaitWalletAddress);
                Ok("No wallet linked yet. Send me your 0x address.".into())
            }
        }
    }

    async fn cmd_set_wallet(
        &self,
        state: &AppState,
        identity: &WalletIdentity,
        rest: &str,
    ) -> Result<String> {
        let mut parts = rest.split_whitespace();
        let Some(bnb) = parts.next() else {
            self.sessions.write().await.insert(
                identity.telegram_id.clone(),
                PendingInput::AwaitWalletAddress,
            );
            return Ok("Send me your 0x address.".into());
        };
        let ton = parts.next();

        self.sessions.write().await.remove(&identity.telegram_id);
        let wallet = state.ledger.register_wallet(identity, bnb, ton).await?;
        Ok(format!("✅ Wallet saved: {}", wallet.bnb_address))
    }

    async fn cmd_balances(&self, state: &AppState, me: &str) -> Result<String> {
        let wallet = state.ledger.require_wallet(me).await?;

        let (bnb, slh_onchain, internal, bnb_usd) = tokio::join!(
            state.gateway.native_balance(&wallet.bnb_address),
            state.gateway.token_balance(&wallet.bnb_address),
            state.ledger.internal_balance(me),
            state.price.bnb_usd(),
        );
        let internal = internal?;

        Ok(format!(
            "💰 Balances for {}\nBNB: {}{}\nSLH on-chain: {}{}\nSLH internal: {}{}",
            wallet.bnb_address,
            bnb,
            format_usd(bnb, bnb_usd),
            slh_onchain,
            format_usd(slh_onchain, state.price.slh_usd()),
            internal.normalize(),
            format_usd(internal, state.price.slh_usd()),
        ))
    }

    async fn cmd_send_slh(&self, state: &AppState, me: &str, rest: &str) -> Result<String> {
        let args = parse_send_args(rest)?;

        let recipient = self.resolve_target(state, &args.target).await?;
        let entry = state
            .ledger
            .internal_send(me, &recipient.telegram_id, &args.amount, args.note.as_deref())
            .await?;

        let mut reply = format!(
            "✅ Sent {} SLH to {}",
            entry.amount.normalize(),
            recipient
                .username
                .as_deref()
                .map(|u| format!("@{}", u))
                .unwrap_or_else(|| recipient.telegram_id.clone()),
        );

        // Best-effort on-chain settlement. The internal record stands even
        // when the broadcast fails.
        if state.config.onchain_transfers_enabled {
            match self.settle_onchain(state, &recipient, entry.id, &args.amount).await {
                Ok(tx_hash) => reply.push_str(&format!("\nOn-chain tx: {}", tx_hash)),
                Err(e) => {
                    tracing::warn!(error = %e, entry_id = entry.id, "on-chain settlement failed");
                    reply.push_str("\n(on-chain settlement pending)");
                }
            }
        }

        if let Ok(chat_id) = recipient.telegram_id.parse::<i64>() {
            self.notify(
                chat_id,
                &format!("📥 You received {} SLH from {}", entry.amount.normalize(), me),
            )
            .await;
        }

        Ok(reply)
    }

    async fn settle_onchain(
        &self,
        state: &AppState,
        recipient: &Wallet,
        entry_id: i64,
        amount: &str,
    ) -> Result<String> {
        let units = codec::to_minimal_units(amount, state.config.slh_token_decimals)?;
        let tx_hash = state
            .gateway
            .send_token(&recipient.bnb_address, units)
            .await?;
        state.db.mark_transfer_onchain(entry_id, &tx_hash).await?;
        Ok(tx_hash)
    }

    async fn resolve_target(&self, state: &AppState, target: &Target) -> Result<Wallet> {
        let wallet = match target {
            Target::Username(name) => state.ledger.find_wallet_by_username(name).await?,
            Target::TelegramId(id) => state.db.get_wallet(id).await?,
        };
        wallet.ok_or_else(|| {
            AppError::NotFound("recipient has no linked wallet yet".to_string())
        })
    }

    async fn cmd_history(&self, state: &AppState, me: &str) -> Result<String> {
        let entries = state.ledger.history(me, HISTORY_PAGE_SIZE).await?;
        if entries.is_empty() {
            return Ok("No transfers yet.".into());
        }
        let lines: Vec<String> = entries.iter().map(|e| format_entry(e, me)).collect();
        Ok(format!("📜 Last {} transfers:\n{}", lines.len(), lines.join("\n")))
    }

    async fn cmd_claim(&self, state: &AppState, me: &str) -> Result<String> {
        // Ledger rows reference the wallets table, so a wallet must exist.
        state.ledger.require_wallet(me).await?;
        let entry = state.ledger.claim(me).await?;
        Ok(format!(
            "🎁 Claimed {} SLH. Come back in 24 hours.",
            entry.amount.normalize()
        ))
    }

    async fn cmd_airdrop(&self, state: &AppState, me: &str, rest: &str) -> Result<String> {
        let (amount, targets) = parse_airdrop_args(rest)?;

        let mut credited = 0usize;
        let mut failed = Vec::new();
        for target in &targets {
            let result = match self.resolve_target(state, target).await {
                Ok(wallet) => state
                    .ledger
                    .airdrop(me, &wallet.telegram_id, &amount)
                    .await
                    .map(|_| ()),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => credited += 1,
                Err(e) => failed.push(format!("{:?}: {}", target, e)),
            }
        }

        let mut reply = format!("Airdrop done: {} credited, {} failed.", credited, failed.len());
        if !failed.is_empty() {
            reply.push_str(&format!("\n{}", failed.join("\n")));
        }
        Ok(reply)
    }

    async fn cmd_admin(&self, state: &AppState, me: &str) -> Result<String> {
        if !state.config.is_admin(me) {
            return Err(AppError::Forbidden(
                "admin allow-list does not include this account".to_string(),
            ));
        }
        let wallets = state.db.count_wallets().await?;
        Ok(format!(
            "🛠 network: {} (chain {})\ntoken: {}\nwallets: {}\non-chain transfers: {}",
            state.config.network_mode(),
            state.config.chain_id,
            state.config.slh_token_address,
            wallets,
            if state.config.onchain_transfers_enabled { "enabled" } else { "disabled" },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_args_accept_username_and_id_targets() {
        let args = parse_send_args("1.5 @satoshi coffee money").unwrap();
        assert_eq!(args.amount, "1.5");
        assert_eq!(args.target, Target::Username("satoshi".into()));
        assert_eq!(args.note.as_deref(), Some("coffee money"));

        let args = parse_send_args("10 12345").unwrap();
        assert_eq!(args.target, Target::TelegramId("12345".into()));
        assert_eq!(args.note, None);
    }

    #[test]
    fn send_args_reject_missing_or_malformed_parts() {
        assert!(parse_send_args("").is_err());
        assert!(parse_send_args("1.5").is_err());
        // bare word is neither @username nor numeric id
        assert!(parse_send_args("1.5 satoshi").is_err());
        assert!(parse_send_args("1.5 @").is_err());
    }

    #[test]
    fn airdrop_args_fan_out_over_targets() {
        let (amount, targets) = parse_airdrop_args("5 @a @b 777").unwrap();
        assert_eq!(amount, "5");
        assert_eq!(
            targets,
            vec![
                Target::Username("a".into()),
                Target::Username("b".into()),
                Target::TelegramId("777".into()),
            ]
        );

        assert!(parse_airdrop_args("5").is_err());
        assert!(parse_airdrop_args("").is_err());
    }

    #[test]
    fn keyboard_labels_map_to_commands() {
        assert_eq!(canonical_command("💰 Balances"), "/balances");
        assert_eq!(canonical_command("🎁 Claim"), "/claim");
        assert_eq!(canonical_command("/wallet"), "/wallet");
        assert_eq!(canonical_command("hello"), "hello");
    }

    #[test]
    fn history_lines_show_direction_and_counterparty() {
        let entry = LedgerEntry {
            id: 1,
            from_telegram_id: None,
            to_telegram_id: Some("42".into()),
            amount: Decimal::new(10, 0),
            currency: "SLH".into(),
            chain: "INTERNAL".into(),
            onchain: false,
            tx_hash: None,
            note: Some("claim".into()),
            created_at: chrono::Utc::now(),
        };
        let line = format_entry(&entry, "42");
        assert!(line.starts_with("+10 SLH [INTERNAL] system"));

        let entry = LedgerEntry {
            from_telegram_id: Some("42".into()),
            to_telegram_id: Some("7".into()),
            tx_hash: Some("0xabc".into()),
            ..entry
        };
        let line = format_entry(&entry, "42");
        assert!(line.starts_with("-10 SLH [INTERNAL] 7"));
        assert!(line.ends_with("tx:0xabc"));
    }
}
