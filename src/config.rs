//! Process configuration
//!
//! Everything the keeper needs is read once at start-up from the environment
//! (a `.env` file is honoured through `dotenvy`) into an immutable [`Config`],
//! which is then passed into each component's constructor.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable names
pub mod vars {
    pub const RPC_URL: &str = "RPC_URL";
    pub const SENDER_PRIVATE_KEY: &str = "SENDER_PRIVATE_KEY";
    pub const SENDER_ADDRESS: &str = "SENDER_ADDRESS";
    pub const EXPECTED_CHAIN_ID: &str = "EXPECTED_CHAIN_ID";
    pub const ORCHESTRATOR_ADDRESS: &str = "ORCHESTRATOR_ADDRESS";
    pub const MARKET_ORACLE_ADDRESS: &str = "MARKET_ORACLE_ADDRESS";
    pub const CPI_ORACLE_ADDRESS: &str = "CPI_ORACLE_ADDRESS";
    pub const TOKEN_ADDRESS: &str = "TOKEN_ADDRESS";
    pub const POOL_ADDRESS: &str = "POOL_ADDRESS";
    pub const TOKEN_IS_TOKEN0: &str = "TOKEN_IS_TOKEN0";
    pub const TOKEN_DECIMALS: &str = "TOKEN_DECIMALS";
    pub const USD_DECIMALS: &str = "USD_DECIMALS";
    pub const REBASE_DELAY_SECS: &str = "REBASE_DELAY_SECS";
    pub const SECONDS_IN_DAY: &str = "SECONDS_IN_DAY";
    pub const AVERAGE_BLOCK_TIME_SECS: &str = "AVERAGE_BLOCK_TIME_SECS";
    pub const BLOCKS_DELAY: &str = "BLOCKS_DELAY";
    pub const GAS_LIMIT: &str = "GAS_LIMIT";
    pub const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
    pub const COINGECKO_BASE_URL: &str = "COINGECKO_BASE_URL";
    pub const COINGECKO_API_KEY: &str = "COINGECKO_API_KEY";
    pub const CPI_FEED_URL: &str = "CPI_FEED_URL";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const LAST_REBASE_BACKEND: &str = "LAST_REBASE_BACKEND";
    pub const LAST_REBASE_FILE: &str = "LAST_REBASE_FILE";
}

/// Defaults for optional settings
pub mod defaults {
    pub const TOKEN_IS_TOKEN0: bool = true;
    pub const TOKEN_DECIMALS: u32 = 9;
    pub const USD_DECIMALS: u32 = 18;
    pub const REBASE_DELAY_SECS: u64 = 3600; // 1 hour grace window
    pub const SECONDS_IN_DAY: u64 = 86400;
    pub const AVERAGE_BLOCK_TIME_SECS: u64 = 15;
    pub const BLOCKS_DELAY: u64 = 10;
    pub const GAS_LIMIT: u64 = 500_000;
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
    pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";
    pub const LAST_REBASE_FILE: &str = "last_rebase";
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { var: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{} must be set", var),
            ConfigError::Invalid { var, reason } => write!(f, "Invalid {}: {}", var, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where the last rebase delay is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastRebaseBackend {
    Database,
    File(PathBuf),
}

/// Contract addresses, kept as 0x strings until the chain client parses them
#[derive(Debug, Clone)]
pub struct ContractAddresses {
    pub orchestrator: String,
    pub market_oracle: String,
    pub cpi_oracle: String,
    pub token: String,
    pub pool: String,
}

/// Chain access settings
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub private_key: String,
    pub sender_address: Option<String>,
    pub expected_chain_id: Option<u64>,
    pub contracts: ContractAddresses,
    pub gas_limit: u64,
}

/// Which side of the DEX pair holds the rebasing token, and its precision
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub token_is_token0: bool,
    pub token_decimals: u32,
}

/// External quote feeds
#[derive(Debug, Clone)]
pub struct QuoteConfig {
    pub coingecko_base_url: String,
    pub coingecko_api_key: Option<String>,
    pub cpi_feed_url: String,
}

/// Timing and scaling constants for the rebase cycle
#[derive(Debug, Clone, Copy)]
pub struct CycleConfig {
    pub rebase_delay_secs: u64,
    pub seconds_in_day: u64,
    pub average_block_time_secs: u64,
    pub blocks_delay: u64,
    pub usd_decimals: u32,
}

impl CycleConfig {
    /// Fixed time allowed for submitted transactions to be mined
    pub fn confirmation_window(&self) -> Duration {
        Duration::from_secs(self.average_block_time_secs.saturating_mul(self.blocks_delay))
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            rebase_delay_secs: defaults::REBASE_DELAY_SECS,
            seconds_in_day: defaults::SECONDS_IN_DAY,
            average_block_time_secs: defaults::AVERAGE_BLOCK_TIME_SECS,
            blocks_delay: defaults::BLOCKS_DELAY,
            usd_decimals: defaults::USD_DECIMALS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chain: ChainConfig,
    pub pool: PoolConfig,
    pub quotes: QuoteConfig,
    pub cycle: CycleConfig,
    pub http_timeout: Duration,
    pub database_url: Option<String>,
    pub last_rebase_backend: LastRebaseBackend,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());
        let required = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let contracts = ContractAddresses {
            orchestrator: required(vars::ORCHESTRATOR_ADDRESS)?,
            market_oracle: required(vars::MARKET_ORACLE_ADDRESS)?,
            cpi_oracle: required(vars::CPI_ORACLE_ADDRESS)?,
            token: required(vars::TOKEN_ADDRESS)?,
            pool: required(vars::POOL_ADDRESS)?,
        };

        let chain = ChainConfig {
            rpc_url: required(vars::RPC_URL)?,
            private_key: required(vars::SENDER_PRIVATE_KEY)?,
            sender_address: get(vars::SENDER_ADDRESS),
            expected_chain_id: parse_optional(vars::EXPECTED_CHAIN_ID, get(vars::EXPECTED_CHAIN_ID))?,
            contracts,
            gas_limit: parse_or(vars::GAS_LIMIT, get(vars::GAS_LIMIT), defaults::GAS_LIMIT)?,
        };

        let pool = PoolConfig {
            token_is_token0: parse_bool_or(
                vars::TOKEN_IS_TOKEN0,
                get(vars::TOKEN_IS_TOKEN0),
                defaults::TOKEN_IS_TOKEN0,
            )?,
            token_decimals: parse_or(
                vars::TOKEN_DECIMALS,
                get(vars::TOKEN_DECIMALS),
                defaults::TOKEN_DECIMALS,
            )?,
        };

        let quotes = QuoteConfig {
            coingecko_base_url: get(vars::COINGECKO_BASE_URL)
                .unwrap_or_else(|| defaults::COINGECKO_BASE_URL.to_string()),
            coingecko_api_key: get(vars::COINGECKO_API_KEY),
            cpi_feed_url: required(vars::CPI_FEED_URL)?,
        };

        let cycle = CycleConfig {
            rebase_delay_secs: parse_or(
                vars::REBASE_DELAY_SECS,
                get(vars::REBASE_DELAY_SECS),
                defaults::REBASE_DELAY_SECS,
            )?,
            seconds_in_day: parse_or(
                vars::SECONDS_IN_DAY,
                get(vars::SECONDS_IN_DAY),
                defaults::SECONDS_IN_DAY,
            )?,
            average_block_time_secs: parse_or(
                vars::AVERAGE_BLOCK_TIME_SECS,
                get(vars::AVERAGE_BLOCK_TIME_SECS),
                defaults::AVERAGE_BLOCK_TIME_SECS,
            )?,
            blocks_delay: parse_or(vars::BLOCKS_DELAY, get(vars::BLOCKS_DELAY), defaults::BLOCKS_DELAY)?,
            usd_decimals: parse_or(vars::USD_DECIMALS, get(vars::USD_DECIMALS), defaults::USD_DECIMALS)?,
        };

        if cycle
            .average_block_time_secs
            .checked_mul(cycle.blocks_delay)
            .is_none()
        {
            return Err(ConfigError::Invalid {
                var: vars::BLOCKS_DELAY,
                reason: format!(
                    "{}s * {} blocks overflows the confirmation window",
                    cycle.average_block_time_secs, cycle.blocks_delay
                ),
            });
        }

        let http_timeout_secs: u64 = parse_or(
            vars::HTTP_TIMEOUT_SECS,
            get(vars::HTTP_TIMEOUT_SECS),
            defaults::HTTP_TIMEOUT_SECS,
        )?;

        let database_url = get(vars::DATABASE_URL);

        let last_rebase_backend = match get(vars::LAST_REBASE_BACKEND)
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            None | Some("database") | Some("db") => LastRebaseBackend::Database,
            Some("file") => LastRebaseBackend::File(PathBuf::from(
                get(vars::LAST_REBASE_FILE).unwrap_or_else(|| defaults::LAST_REBASE_FILE.to_string()),
            )),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: vars::LAST_REBASE_BACKEND,
                    reason: format!("expected 'database' or 'file', got '{}'", other),
                });
            }
        };

        Ok(Self {
            chain,
            pool,
            quotes,
            cycle,
            http_timeout: Duration::from_secs(http_timeout_secs),
            database_url,
            last_rebase_backend,
        })
    }
}

fn parse_optional<T>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                reason: format!("'{}': {}", v, e),
            })
        })
        .transpose()
}

fn parse_or<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(var, value)?.unwrap_or(default))
}

fn parse_bool_or(var: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}
