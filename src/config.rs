use serde::Deserialize;
use std::env;

use crate::constants::BSC_MAINNET_CHAIN_ID;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Chain
    pub bsc_rpc_url: String,
    pub chain_id: u64,
    pub slh_token_address: String,
    pub slh_token_decimals: u32,

    // Operator / hot wallet. The key never leaves process memory.
    pub operator_address: Option<String>,
    pub operator_private_key: Option<String>,
    pub gas_price_gwei: Option<u64>,
    pub gas_limit: u64,
    pub onchain_transfers_enabled: bool,

    // Telegram
    pub telegram_bot_token: Option<String>,
    pub public_base_url: Option<String>,
    pub admin_owner_ids: String,
    pub claim_reward_slh: String,
    pub community_link: Option<String>,

    // HTTP facade
    pub transfer_shared_secret: Option<String>,
    pub cors_allowed_origins: String,

    // Pricing
    pub coingecko_api_url: String,
    pub slh_usd_price: Option<f64>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,

            bsc_rpc_url: env::var("BSC_RPC_URL")
                .unwrap_or_else(|_| "https://bsc-dataseed.binance.org".to_string()),
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| BSC_MAINNET_CHAIN_ID.to_string())
                .parse()?,
            slh_token_address: env::var("SLH_TOKEN_ADDRESS")?,
            slh_token_decimals: env::var("SLH_TOKEN_DECIMALS")
                .unwrap_or_else(|_| "18".to_string())
                .parse()?,

            operator_address: env::var("OPERATOR_ADDRESS").ok(),
            operator_private_key: env::var("OPERATOR_PRIVATE_KEY").ok(),
            gas_price_gwei: env::var("GAS_PRICE_GWEI").ok().and_then(|s| s.parse().ok()),
            gas_limit: env::var("GAS_LIMIT")
                .unwrap_or_else(|_| "120000".to_string())
                .parse()?,
            onchain_transfers_enabled: env_flag("SLH_ONCHAIN_ENABLED", false),

            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .ok()
                .map(|s| s.trim_end_matches('/').to_string()),
            admin_owner_ids: env::var("ADMIN_OWNER_IDS").unwrap_or_default(),
            claim_reward_slh: env::var("CLAIM_REWARD_SLH").unwrap_or_else(|_| "10".to_string()),
            community_link: env::var("COMMUNITY_LINK").ok(),

            transfer_shared_secret: env::var("TRANSFER_SHARED_SECRET").ok(),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),

            coingecko_api_url: env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
            slh_usd_price: env::var("SLH_USD_PRICE").ok().and_then(|s| s.parse().ok()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.bsc_rpc_url.trim().is_empty() {
            anyhow::bail!("BSC_RPC_URL is empty");
        }
        if self.slh_token_address.trim().is_empty() {
            anyhow::bail!("SLH_TOKEN_ADDRESS is empty");
        }
        if self.slh_token_decimals > 28 {
            anyhow::bail!("SLH_TOKEN_DECIMALS must be <= 28");
        }

        if self.slh_token_address.starts_with("0x0000") {
            tracing::warn!("Using placeholder SLH token address");
        }
        if self.onchain_transfers_enabled
            && (self.operator_address.is_none() || self.operator_private_key.is_none())
        {
            tracing::warn!(
                "SLH_ONCHAIN_ENABLED is set but OPERATOR_ADDRESS / OPERATOR_PRIVATE_KEY are missing; transfers will fail"
            );
        }
        if self.telegram_bot_token.is_none() {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set; the chat facade cannot reply");
        }
        if self.public_base_url.is_none() {
            tracing::warn!("PUBLIC_BASE_URL not set; Telegram webhook will not be registered");
        }
        if self.transfer_shared_secret.is_none() {
            tracing::warn!("TRANSFER_SHARED_SECRET not set; /transfer/slh is unauthenticated");
        }

        Ok(())
    }

    pub fn is_mainnet(&self) -> bool {
        self.chain_id == BSC_MAINNET_CHAIN_ID
    }

    pub fn network_mode(&self) -> &'static str {
        if self.is_mainnet() {
            "mainnet"
        } else {
            "testnet"
        }
    }

    /// Statically configured allow-list for /admin and /airdrop.
    pub fn admin_ids(&self) -> Vec<String> {
        self.admin_owner_ids
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn is_admin(&self, telegram_id: &str) -> bool {
        self.admin_ids().iter().any(|id| id == telegram_id)
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "0.0.0.0".to_string(),
        port: 8000,
        environment: "development".to_string(),
        database_url: "postgres://localhost/slh".to_string(),
        database_max_connections: 1,
        bsc_rpc_url: "http://localhost:8545".to_string(),
        chain_id: 97,
        slh_token_address: "0xef633c34715a5a581741379c9d690628a1c82b74".to_string(),
        slh_token_decimals: 18,
        operator_address: Some("0xd0617b54fb4b6b66307846f217b4d685800e3da4".to_string()),
        operator_private_key: None,
        gas_price_gwei: Some(3),
        gas_limit: 120_000,
        onchain_transfers_enabled: false,
        telegram_bot_token: None,
        public_base_url: None,
        admin_owner_ids: "1001, 1002".to_string(),
        claim_reward_slh: "10".to_string(),
        community_link: None,
        transfer_shared_secret: Some("secret".to_string()),
        cors_allowed_origins: "*".to_string(),
        coingecko_api_url: "https://api.coingecko.com/api/v3".to_string(),
        slh_usd_price: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_allow_list_is_parsed_and_trimmed() {
        let cfg = test_config();
        assert_eq!(cfg.admin_ids(), vec!["1001", "1002"]);
        assert!(cfg.is_admin("1001"));
        assert!(!cfg.is_admin("2002"));
    }

    #[test]
    fn network_mode_follows_chain_id() {
        let mut cfg = test_config();
        assert_eq!(cfg.network_mode(), "testnet");
        cfg.chain_id = 56;
        assert_eq!(cfg.network_mode(), "mainnet");
    }
}
