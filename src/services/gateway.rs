//! JSON-RPC gateway to BNB Smart Chain.
//!
//! Reads degrade to zero when the RPC node is unreachable so balance screens
//! keep rendering. Writes never degrade: every failure before signing aborts
//! the transfer, and broadcast failures surface as errors.

use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes,
        TransactionRequest, U256,
    },
};
use rust_decimal::Decimal;
use std::time::Duration;

use crate::{
    codec,
    config::Config,
    constants::{FALLBACK_GAS_LIMIT, NATIVE_DECIMALS, RPC_TIMEOUT_SECS},
    error::{AppError, Result},
};

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// BNB balance in human units. Zero when the node cannot be reached.
    async fn native_balance(&self, address: &str) -> Decimal;

    /// SLH balance in human units. Zero when the node cannot be reached.
    async fn token_balance(&self, address: &str) -> Decimal;

    /// SLH balance in minimal units. Errors propagate so write paths can
    /// refuse to sign on a failed read.
    async fn token_balance_minimal(&self, address: &str) -> Result<U256>;

    /// Signs and broadcasts an SLH transfer from the operator wallet.
    /// Returns the transaction hash as a 0x-prefixed hex string.
    async fn send_token(&self, to_address: &str, minimal_amount: U256) -> Result<String>;
}

/// Checks a transfer request before anything touches the chain. Returns the
/// amount in minimal units.
pub fn preflight_transfer(to_address: &str, amount_slh: &str, decimals: u32) -> Result<U256> {
    if !codec::is_valid_address(to_address) {
        return Err(AppError::InvalidAddress(format!(
            "recipient must be 0x + 40 hex chars, got {:?}",
            to_address
        )));
    }
    codec::to_minimal_units(amount_slh, decimals)
}

/// Strict funds check for the operator hot wallet. Runs before signing.
pub fn check_operator_funds(available: U256, required: U256) -> Result<()> {
    if available < required {
        tracing::warn!(
            required = %required,
            available = %available,
            "operator SLH balance too low for transfer"
        );
        return Err(AppError::InsufficientOperatorBalance);
    }
    Ok(())
}

pub struct BscGateway {
    provider: Provider<Http>,
    token_address: String,
    decimals: u32,
    chain_id: u64,
    operator_address: Option<String>,
    signer: Option<LocalWallet>,
    gas_price_gwei: Option<u64>,
    gas_limit: u64,
    enabled: bool,
}

impl BscGateway {
    pub fn from_config(config: &Config) -> Result<Self> {
        // The RPC client carries its own request timeout so write calls
        // (nonce, gas, broadcast) fail instead of hanging on a stuck node.
        let url = reqwest::Url::parse(&config.bsc_rpc_url)
            .map_err(|e| AppError::ChainUnavailable(format!("bad RPC url: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(RPC_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(format!("http client: {}", e)))?;
        let provider =
            Provider::new(Http::new_with_client(url, client)).interval(Duration::from_millis(500));

        let signer = match &config.operator_private_key {
            Some(key) => Some(
                key.trim_start_matches("0x")
                    .parse::<LocalWallet>()
                    .map_err(|e| AppError::Internal(format!("bad operator key: {}", e)))?
                    .with_chain_id(config.chain_id),
            ),
            None => None,
        };

        Ok(Self {
            provider,
            token_address: config.slh_token_address.clone(),
            decimals: config.slh_token_decimals,
            chain_id: config.chain_id,
            operator_address: config.operator_address.clone(),
            signer,
            gas_price_gwei: config.gas_price_gwei,
            gas_limit: config.gas_limit,
            enabled: config.onchain_transfers_enabled,
        })
    }

    fn parse_address(&self, value: &str) -> Result<Address> {
        value
            .parse::<Address>()
            .map_err(|_| AppError::InvalidAddress(format!("unparseable address {:?}", value)))
    }

    async fn call_balance_of(&self, address: &str) -> Result<U256> {
        let calldata = codec::encode_balance_of(address)?;
        let data = hex::decode(&calldata[2..])
            .map_err(|e| AppError::Internal(format!("calldata encode: {}", e)))?;

        let tx: TypedTransaction = TransactionRequest::new()
            .to(self.parse_address(&self.token_address)?)
            .data(Bytes::from(data))
            .into();

        let raw = tokio::time::timeout(
            Duration::from_secs(RPC_TIMEOUT_SECS),
            self.provider.call(&tx, None),
        )
        .await
        .map_err(|_| AppError::ChainUnavailable("eth_call timed out".to_string()))?
        .map_err(|e| AppError::ChainUnavailable(e.to_string()))?;

        Ok(codec::decode_hex_quantity(&format!("0x{}", hex::encode(raw))))
    }

    /// Fails the transfer before signing when the operator wallet cannot
    /// cover it.
    async fn ensure_operator_funded(&self, required: U256) -> Result<()> {
        let operator = self
            .operator_address
            .as_deref()
            .ok_or_else(|| AppError::Internal("OPERATOR_ADDRESS not configured".to_string()))?;

        let available = self.call_balance_of(operator).await?;
        check_operator_funds(available, required)
    }
}

#[async_trait]
impl ChainGateway for BscGateway {
    async fn native_balance(&self, address: &str) -> Decimal {
        let addr = match self.parse_address(address) {
            Ok(a) => a,
            Err(_) => return Decimal::ZERO,
        };

        let wei = match tokio::time::timeout(
            Duration::from_secs(RPC_TIMEOUT_SECS),
            self.provider.get_balance(addr, None),
        )
        .await
        {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, address, "eth_getBalance failed, reporting zero");
                return Decimal::ZERO;
            }
            Err(_) => {
                tracing::warn!(address, "eth_getBalance timed out, reporting zero");
                return Decimal::ZERO;
            }
        };

        codec::to_human_units(wei, NATIVE_DECIMALS).unwrap_or(Decimal::ZERO)
    }

    async fn token_balance(&self, address: &str) -> Decimal {
        match self.token_balance_minimal(address).await {
            Ok(units) => codec::to_human_units(units, self.decimals).unwrap_or(Decimal::ZERO),
            Err(e) => {
                tracing::warn!(error = %e, address, "balanceOf failed, reporting zero");
                Decimal::ZERO
            }
        }
    }

    async fn token_balance_minimal(&self, address: &str) -> Result<U256> {
        self.call_balance_of(address).await
    }

    async fn send_token(&self, to_address: &str, minimal_amount: U256) -> Result<String> {
        if !self.enabled {
            return Err(AppError::BadRequest(
                "on-chain transfers are disabled".to_string(),
            ));
        }
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| AppError::Internal("OPERATOR_PRIVATE_KEY not configured".to_string()))?;

        self.ensure_operator_funded(minimal_amount).await?;

        let calldata = codec::encode_transfer(to_address, minimal_amount)?;
        let data = hex::decode(&calldata[2..])
            .map_err(|e| AppError::Internal(format!("calldata encode: {}", e)))?;

        let nonce = self
            .provider
            .get_transaction_count(signer.address(), Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| AppError::ChainUnavailable(format!("nonce lookup: {}", e)))?;

        let gas_price = match self.gas_price_gwei {
            Some(gwei) => U256::from(gwei) * U256::exp10(9),
            None => self
                .provider
                .get_gas_price()
                .await
                .map_err(|e| AppError::ChainUnavailable(format!("gas price: {}", e)))?,
        };

        let mut tx: TypedTransaction = TransactionRequest::new()
            .from(signer.address())
            .to(self.parse_address(&self.token_address)?)
            .data(Bytes::from(data))
            .nonce(nonce)
            .gas_price(gas_price)
            .chain_id(self.chain_id)
            .into();

        let gas = match self.provider.estimate_gas(&tx, None).await {
            Ok(estimate) => estimate,
            Err(e) => {
                tracing::warn!(error = %e, "eth_estimateGas failed, using fallback gas limit");
                U256::from(FALLBACK_GAS_LIMIT)
            }
        };
        tx.set_gas(gas.max(U256::from(self.gas_limit)));

        let signature = signer
            .sign_transaction(&tx)
            .await
            .map_err(|e| AppError::Internal(format!("signing failed: {}", e)))?;
        let raw = tx.rlp_signed(&signature);

        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| AppError::BroadcastRejected(e.to_string()))?;

        let tx_hash = format!("{:?}", pending.tx_hash());
        tracing::info!(tx_hash = %tx_hash, to = to_address, "broadcast SLH transfer");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::test_config, services::ledger::assemble_balances};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory gateway with a fixed operator balance. Counts broadcasts so
    /// tests can assert nothing went out after a failed funds check.
    struct StubGateway {
        operator_balance: U256,
        broadcasts: AtomicUsize,
    }

    impl StubGateway {
        fn with_operator_balance(operator_balance: U256) -> Self {
            Self {
                operator_balance,
                broadcasts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChainGateway for StubGateway {
        async fn native_balance(&self, _address: &str) -> Decimal {
            Decimal::new(15, 1)
        }

        async fn token_balance(&self, _address: &str) -> Decimal {
            Decimal::new(42, 0)
        }

        async fn token_balance_minimal(&self, _address: &str) -> Result<U256> {
            Ok(self.operator_balance)
        }

        async fn send_token(&self, to_address: &str, minimal_amount: U256) -> Result<String> {
            preflight_transfer(to_address, "1", 18)?;
            check_operator_funds(self.operator_balance, minimal_amount)?;
            self.broadcasts.fetch_add(1, Ordering::SeqCst);
            Ok("0x00000000000000000000000000000000000000000000000000000000000000aa".into())
        }
    }

    #[test]
    fn gateway_builds_from_config_without_a_node() {
        assert!(BscGateway::from_config(&test_config()).is_ok());
    }

    #[tokio::test]
    async fn underfunded_operator_blocks_the_send_before_broadcast() {
        let gateway = StubGateway::with_operator_balance(U256::exp10(18));

        let err = gateway
            .send_token(
                "0xd0617b54fb4b6b66307846f217b4d685800e3da4",
                U256::exp10(18) * U256::from(2u64),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InsufficientOperatorBalance));
        assert_eq!(gateway.broadcasts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn funded_operator_broadcasts_exactly_once() {
        let gateway = StubGateway::with_operator_balance(U256::exp10(19));

        let tx_hash = gateway
            .send_token(
                "0xd0617b54fb4b6b66307846f217b4d685800e3da4",
                U256::exp10(18),
            )
            .await
            .unwrap();

        assert!(tx_hash.starts_with("0x"));
        assert_eq!(gateway.broadcasts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stubbed_reads_assemble_into_the_balances_payload() {
        use crate::models::Wallet;
        use std::sync::Arc;

        let gateway: Arc<dyn ChainGateway> =
            Arc::new(StubGateway::with_operator_balance(U256::zero()));
        let wallet = Wallet {
            telegram_id: "42".to_string(),
            username: Some("satoshi".to_string()),
            first_name: None,
            last_name: None,
            bnb_address: "0xd0617b54fb4b6b66307846f217b4d685800e3da4".to_string(),
            ton_address: None,
            slh_address: Some("0xd0617b54fb4b6b66307846f217b4d685800e3da4".to_string()),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let (bnb, slh_onchain) = tokio::join!(
            gateway.native_balance(&wallet.bnb_address),
            gateway.token_balance(&wallet.bnb_address),
        );
        let resp = assemble_balances(&wallet, bnb, slh_onchain, Decimal::new(8, 0));

        assert_eq!(resp.bnb_balance.to_string(), "1.5");
        assert_eq!(resp.slh_balance_onchain.to_string(), "42");
        assert_eq!(resp.slh_balance_internal.to_string(), "8");
        assert_eq!(resp.slh_balance.to_string(), "50");
        assert_eq!(resp.telegram_id, "42");
    }

    #[test]
    fn preflight_accepts_a_well_formed_transfer() {
        let units = preflight_transfer(
            "0xd0617b54fb4b6b66307846f217b4d685800e3da4",
            "1.5",
            18,
        )
        .unwrap();
        assert_eq!(units, U256::from(1_500_000_000_000_000_000u64));
    }

    #[test]
    fn preflight_rejects_bad_recipient() {
        let err = preflight_transfer("bogus", "1", 18).unwrap_err();
        assert!(matches!(err, AppError::InvalidAddress(_)));
    }

    #[test]
    fn preflight_rejects_non_positive_amounts() {
        let addr = "0xd0617b54fb4b6b66307846f217b4d685800e3da4";
        assert!(matches!(
            preflight_transfer(addr, "0", 18).unwrap_err(),
            AppError::InvalidAmount(_)
        ));
        assert!(matches!(
            preflight_transfer(addr, "-2", 18).unwrap_err(),
            AppError::InvalidAmount(_)
        ));
        assert!(matches!(
            preflight_transfer(addr, "one", 18).unwrap_err(),
            AppError::InvalidAmount(_)
        ));
    }
}
