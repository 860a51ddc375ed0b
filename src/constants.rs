// Service-wide constants

pub const API_VERSION: &str = "v1";

// ERC-20 function selectors, first 4 bytes of keccak256 of the signature.
pub const SELECTOR_BALANCE_OF: &str = "70a08231";
pub const SELECTOR_TRANSFER: &str = "a9059cbb";

// BNB (the chain-native coin) always uses 18 decimals.
pub const NATIVE_DECIMALS: u32 = 18;

pub const BSC_MAINNET_CHAIN_ID: u64 = 56;

// Gas limit used when eth_estimateGas fails. Matches the headroom the original
// operator wallet used for plain ERC-20 transfers.
pub const FALLBACK_GAS_LIMIT: u64 = 200_000;

pub const RPC_TIMEOUT_SECS: u64 = 10;
pub const TELEGRAM_TIMEOUT_SECS: u64 = 10;
pub const PRICE_TIMEOUT_SECS: u64 = 8;

// BNB/USD quotes are cached for five minutes to stay under CoinGecko rate limits.
pub const PRICE_CACHE_TTL_SECS: u64 = 300;

pub const CURRENCY_SLH: &str = "SLH";
pub const CHAIN_INTERNAL: &str = "INTERNAL";
pub const CHAIN_BSC: &str = "BSC";

pub const HISTORY_PAGE_SIZE: i64 = 10;
