//! BNB/USD quotes from CoinGecko with a small in-process cache.
//!
//! Quotes are decorative (balance screens only), so every failure path
//! degrades to `None` instead of erroring.

use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::{
    config::Config,
    constants::{PRICE_CACHE_TTL_SECS, PRICE_TIMEOUT_SECS},
};

#[derive(Deserialize)]
struct SimplePrice {
    binancecoin: Option<UsdQuote>,
}

#[derive(Deserialize)]
struct UsdQuote {
    usd: f64,
}

pub struct PriceCache {
    client: reqwest::Client,
    api_url: String,
    slh_usd: Option<f64>,
    cached: RwLock<Option<(f64, Instant)>>,
}

impl PriceCache {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.coingecko_api_url.clone(),
            slh_usd: config.slh_usd_price,
            cached: RwLock::new(None),
        }
    }

    /// Fixed operator-configured SLH quote, if any.
    pub fn slh_usd(&self) -> Option<f64> {
        self.slh_usd
    }

    pub async fn bnb_usd(&self) -> Option<f64> {
        if let Some((price, fetched_at)) = *self.cached.read().await {
            if fetched_at.elapsed() < Duration::from_secs(PRICE_CACHE_TTL_SECS) {
                return Some(price);
            }
        }

        match self.fetch_bnb_usd().await {
            Some(price) => {
                *self.cached.write().await = Some((price, Instant::now()));
                Some(price)
            }
            // Serve the stale quote rather than nothing.
            None => (*self.cached.read().await).map(|(price, _)| price),
        }
    }

    async fn fetch_bnb_usd(&self) -> Option<f64> {
        let url = format!(
            "{}/simple/price?ids=binancecoin&vs_currencies=usd",
            self.api_url
        );

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(PRICE_TIMEOUT_SECS))
            .send()
            .await;

        match response {
            Ok(resp) => match resp.json::<SimplePrice>().await {
                Ok(body) => body.binancecoin.map(|q| q.usd),
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable CoinGecko response");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "CoinGecko request failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cached_quote_is_served_within_ttl() {
        let cache = PriceCache {
            client: reqwest::Client::new(),
            api_url: "http://127.0.0.1:1".to_string(),
            slh_usd: Some(0.01),
            cached: RwLock::new(Some((612.5, Instant::now()))),
        };
        assert_eq!(cache.bnb_usd().await, Some(612.5));
        assert_eq!(cache.slh_usd(), Some(0.01));
    }

    #[tokio::test]
    async fn unreachable_api_degrades_to_none() {
        let cache = PriceCache {
            client: reqwest::Client::new(),
            api_url: "http://127.0.0.1:1".to_string(),
            slh_usd: None,
            cached: RwLock::new(None),
        };
        assert_eq!(cache.bnb_usd().await, None);
    }
}
