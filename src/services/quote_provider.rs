//! Quote provider for the market and CPI oracle values
//!
//! The token/USD rate is the token/ETH rate implied by the DEX pair reserves
//! multiplied by the ETH/USD rate from CoinGecko. The CPI index is the
//! latest observation of a BLS-style time series.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{PoolConfig, QuoteConfig};
use crate::services::chain_client::{ChainClient, PoolReserves};
use crate::services::fixed_point::from_base_units;

/// WETH always carries 18 decimals
const WETH_DECIMALS: u32 = 18;

const BLS_SUCCESS_STATUS: &str = "REQUEST_SUCCEEDED";

/// Error types for quote acquisition
#[derive(Debug)]
pub enum QuoteError {
    RequestError(String),
    ApiError(String),
    MalformedResponse(String),
    InvalidValue(String),
}

impl std::fmt::Display for QuoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteError::RequestError(msg) => write!(f, "Request error: {}", msg),
            QuoteError::ApiError(msg) => write!(f, "API error: {}", msg),
            QuoteError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            QuoteError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
        }
    }
}

impl std::error::Error for QuoteError {}

/// Market quote in its two parts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketQuote {
    pub token_eth_rate: Decimal,
    pub eth_usd_rate: Decimal,
}

impl MarketQuote {
    pub fn token_usd_rate(&self) -> Option<Decimal> {
        self.token_eth_rate.checked_mul(self.eth_usd_rate)
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn get_market_quote(&self) -> Result<MarketQuote, QuoteError>;

    async fn get_cpi_index(&self) -> Result<Decimal, QuoteError>;

    async fn get_token_usd_rate(&self) -> Result<Decimal, QuoteError> {
        let quote = self.get_market_quote().await?;
        quote.token_usd_rate().ok_or_else(|| {
            QuoteError::InvalidValue(format!(
                "{} * {} overflows",
                quote.token_eth_rate, quote.eth_usd_rate
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
struct CpiResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "Results")]
    results: Option<CpiResults>,
    #[serde(default)]
    message: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CpiResults {
    series: Vec<CpiSeries>,
}

#[derive(Debug, Deserialize)]
struct CpiSeries {
    #[serde(rename = "seriesID", default)]
    series_id: Option<String>,
    data: Vec<CpiObservation>,
}

#[derive(Debug, Deserialize)]
struct CpiObservation {
    year: String,
    period: String,
    value: String,
}

/// Quote provider over HTTP feeds plus the pool reserves on chain
pub struct HttpQuoteProvider {
    client: Client,
    chain: Arc<dyn ChainClient>,
    pool: PoolConfig,
    coingecko_base_url: String,
    coingecko_api_key: Option<String>,
    cpi_feed_url: String,
}

impl HttpQuoteProvider {
    pub fn new(
        config: &QuoteConfig,
        pool: PoolConfig,
        chain: Arc<dyn ChainClient>,
        timeout: Duration,
    ) -> Result<Self, QuoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuoteError::RequestError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            chain,
            pool,
            coingecko_base_url: config.coingecko_base_url.trim_end_matches('/').to_string(),
            coingecko_api_key: config.coingecko_api_key.clone(),
            cpi_feed_url: config.cpi_feed_url.clone(),
        })
    }

    async fn get_token_eth_rate(&self) -> Result<Decimal, QuoteError> {
        let reserves = self
            .chain
            .pool_reserves()
            .await
            .map_err(|e| QuoteError::RequestError(format!("Pool reserves: {}", e)))?;

        token_eth_rate(reserves, self.pool)
    }

    async fn get_eth_usd_rate(&self) -> Result<Decimal, QuoteError> {
        info!("Fetching ETH/USD rate from CoinGecko");

        let url = format!("{}/simple/price", self.coingecko_base_url);
        let mut request = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(&[("ids", "ethereum"), ("vs_currencies", "usd")]);

        if let Some(api_key) = &self.coingecko_api_key {
            request = request.header("x-cg-pro-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| QuoteError::RequestError(format!("CoinGecko: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(QuoteError::ApiError(format!(
                "CoinGecko API error {}: {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QuoteError::MalformedResponse(format!("CoinGecko: {}", e)))?;

        let rate = parse_eth_usd(&body)?;
        debug!(eth_usd = %rate, "Fetched ETH/USD rate");
        Ok(rate)
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    async fn get_market_quote(&self) -> Result<MarketQuote, QuoteError> {
        let token_eth_rate = self.get_token_eth_rate().await?;
        let eth_usd_rate = self.get_eth_usd_rate().await?;

        let quote = MarketQuote {
            token_eth_rate,
            eth_usd_rate,
        };

        info!(
            token_eth_rate = %quote.token_eth_rate,
            eth_usd_rate = %quote.eth_usd_rate,
            "Market quote acquired"
        );

        Ok(quote)
    }

    async fn get_cpi_index(&self) -> Result<Decimal, QuoteError> {
        info!(url = %self.cpi_feed_url, "Fetching CPI index");

        let response = self
            .client
            .get(&self.cpi_feed_url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| QuoteError::RequestError(format!("CPI feed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(QuoteError::ApiError(format!("CPI feed error {}: {}", status, error_text)));
        }

        let body: CpiResponse = response
            .json()
            .await
            .map_err(|e| QuoteError::MalformedResponse(format!("CPI feed: {}", e)))?;

        parse_cpi(body)
    }
}

/// Token price in ETH implied by the pair reserves
pub fn token_eth_rate(reserves: PoolReserves, pool: PoolConfig) -> Result<Decimal, QuoteError> {
    let (token_raw, weth_raw) = if pool.token_is_token0 {
        (reserves.reserve0, reserves.reserve1)
    } else {
        (reserves.reserve1, reserves.reserve0)
    };

    if token_raw == 0 || weth_raw == 0 {
        return Err(QuoteError::InvalidValue(format!(
            "Empty pool reserves (token: {}, weth: {})",
            token_raw, weth_raw
        )));
    }

    let token = from_base_units(token_raw, pool.token_decimals)
        .map_err(|e| QuoteError::InvalidValue(format!("Token reserve: {}", e)))?;
    let weth = from_base_units(weth_raw, WETH_DECIMALS)
        .map_err(|e| QuoteError::InvalidValue(format!("WETH reserve: {}", e)))?;

    weth.checked_div(token)
        .ok_or_else(|| QuoteError::InvalidValue(format!("{} / {} overflows", weth, token)))
}

fn parse_eth_usd(body: &serde_json::Value) -> Result<Decimal, QuoteError> {
    let value = body
        .get("ethereum")
        .and_then(|eth| eth.get("usd"))
        .ok_or_else(|| QuoteError::MalformedResponse(format!("Missing ethereum.usd in {}", body)))?;

    let rate = match value {
        serde_json::Value::Number(n) => parse_decimal(&n.to_string())?,
        serde_json::Value::String(s) => parse_decimal(s)?,
        other => {
            return Err(QuoteError::MalformedResponse(format!(
                "ethereum.usd is not a number: {}",
                other
            )));
        }
    };

    ensure_positive("ETH/USD", rate)
}

fn parse_cpi(body: CpiResponse) -> Result<Decimal, QuoteError> {
    if let Some(status) = &body.status {
        if status != BLS_SUCCESS_STATUS {
            return Err(QuoteError::ApiError(format!(
                "CPI feed status {}: {}",
                status,
                body.message.join("; ")
            )));
        }
    }

    let series = body
        .results
        .and_then(|r| r.series.into_iter().next())
        .ok_or_else(|| QuoteError::MalformedResponse("CPI feed returned no series".to_string()))?;

    let latest = series.data.into_iter().next().ok_or_else(|| {
        QuoteError::MalformedResponse(format!(
            "CPI series {} has no observations",
            series.series_id.as_deref().unwrap_or("?")
        ))
    })?;

    let cpi = ensure_positive("CPI", parse_decimal(&latest.value)?)?;

    info!(
        year = %latest.year,
        period = %latest.period,
        cpi = %cpi,
        "CPI index acquired"
    );

    Ok(cpi)
}

fn parse_decimal(text: &str) -> Result<Decimal, QuoteError> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| QuoteError::MalformedResponse(format!("'{}' is not a decimal: {}", text, e)))
}

fn ensure_positive(what: &str, value: Decimal) -> Result<Decimal, QuoteError> {
    if value <= Decimal::ZERO {
        return Err(QuoteError::InvalidValue(format!("{} must be positive, got {}", what, value)));
    }
    Ok(value)
}
