//! Chain client for the rebase contracts
//!
//! Wraps read access to the token and DEX pair, and signed write access to
//! the market oracle, CPI oracle and orchestrator. Submissions are
//! broadcast and not awaited; callers use a confirmation wait instead of
//! polling receipts.

use alloy::{
    network::EthereumWallet,
    primitives::{Address, TxHash, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::client::RpcClient,
    signers::local::PrivateKeySigner,
    sol,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::ChainConfig;

// Fixed contract interfaces used by the keeper
sol! {
    #[sol(rpc)]
    interface IOrchestrator {
        function rebase() external;
    }

    #[sol(rpc)]
    interface IOracle {
        function pushReport(uint256 payload) external;
    }

    #[sol(rpc)]
    interface IToken {
        function totalSupply() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }
}

/// Oracle contract a report is pushed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleKind {
    Market,
    Cpi,
}

impl std::fmt::Display for OracleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleKind::Market => write!(f, "market"),
            OracleKind::Cpi => write!(f, "cpi"),
        }
    }
}

/// Raw reserves of a Uniswap-v2 style pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReserves {
    pub reserve0: u128,
    pub reserve1: u128,
}

/// Error types for the chain client
#[derive(Debug)]
pub enum ChainClientError {
    ProviderError(String),
    ContractCallError(String),
    TransactionError(String),
    InvalidConfig(String),
}

impl std::fmt::Display for ChainClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainClientError::ProviderError(msg) => write!(f, "Provider error: {}", msg),
            ChainClientError::ContractCallError(msg) => write!(f, "Contract call error: {}", msg),
            ChainClientError::TransactionError(msg) => write!(f, "Transaction error: {}", msg),
            ChainClientError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ChainClientError {}

/// Read and submit capability over the rebase contracts
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current reserves of the token/ETH pair
    async fn pool_reserves(&self) -> Result<PoolReserves, ChainClientError>;

    /// Token total supply in base units
    async fn total_supply(&self) -> Result<U256, ChainClientError>;

    /// Sign and broadcast `pushReport(payload)` to an oracle
    async fn push_report(&self, oracle: OracleKind, payload: U256) -> Result<TxHash, ChainClientError>;

    /// Sign and broadcast `rebase()` to the orchestrator
    async fn rebase(&self) -> Result<TxHash, ChainClientError>;
}

/// Parsed contract addresses
#[derive(Debug, Clone, Copy)]
struct Contracts {
    orchestrator: Address,
    market_oracle: Address,
    cpi_oracle: Address,
    token: Address,
    pool: Address,
}

/// ChainClient over an HTTP JSON-RPC endpoint
pub struct AlloyChainClient {
    provider: RootProvider<Http<Client>>,
    http: Client,
    rpc_url: reqwest::Url,
    wallet: EthereumWallet,
    contracts: Contracts,
    gas_limit: u64,
}

impl AlloyChainClient {
    /// Create a new AlloyChainClient
    ///
    /// Parses the key and addresses, then verifies RPC connectivity.
    ///
    /// # Arguments
    ///
    /// * `config` - Chain access settings
    /// * `timeout` - Per-request timeout for the RPC transport
    pub async fn new(config: &ChainConfig, timeout: Duration) -> Result<Self, ChainClientError> {
        info!(rpc_url = %config.rpc_url, "Initializing AlloyChainClient");

        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .map_err(|e| ChainClientError::InvalidConfig(format!("Invalid private key: {}", e)))?;
        let sender = signer.address();

        if let Some(expected) = &config.sender_address {
            match Address::from_str(expected) {
                Ok(expected) if expected == sender => {}
                Ok(expected) => warn!(
                    expected = %expected,
                    actual = %sender,
                    "Configured sender address does not match private key"
                ),
                Err(e) => {
                    return Err(ChainClientError::InvalidConfig(format!(
                        "Invalid sender address: {}",
                        e
                    )));
                }
            }
        }

        let contracts = Contracts {
            orchestrator: parse_address("orchestrator", &config.contracts.orchestrator)?,
            market_oracle: parse_address("market oracle", &config.contracts.market_oracle)?,
            cpi_oracle: parse_address("CPI oracle", &config.contracts.cpi_oracle)?,
            token: parse_address("token", &config.contracts.token)?,
            pool: parse_address("pool", &config.contracts.pool)?,
        };

        let rpc_url: reqwest::Url = config
            .rpc_url
            .parse()
            .map_err(|e| ChainClientError::InvalidConfig(format!("Invalid RPC URL: {}", e)))?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainClientError::InvalidConfig(format!("HTTP client: {}", e)))?;

        let provider = ProviderBuilder::new().on_client(RpcClient::new(
            Http::with_client(http.clone(), rpc_url.clone()),
            false,
        ));

        // Verify connection
        let chain_id = provider.get_chain_id().await.map_err(|e| {
            error!(error = %e, "Failed to connect to RPC");
            ChainClientError::ProviderError(format!("Connection failed: {}", e))
        })?;

        if let Some(expected) = config.expected_chain_id {
            if chain_id != expected {
                warn!(expected = expected, actual = chain_id, "Chain ID mismatch");
            }
        }

        info!(
            chain_id = chain_id,
            sender = %sender,
            orchestrator = %contracts.orchestrator,
            token = %contracts.token,
            "AlloyChainClient initialized successfully"
        );

        Ok(Self {
            provider,
            http,
            rpc_url,
            wallet: EthereumWallet::from(signer),
            contracts,
            gas_limit: config.gas_limit,
        })
    }

    /// Provider that fills gas price, pending nonce and chain id, and signs
    fn signing_provider(&self) -> impl Provider<Http<Client>> {
        ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(self.wallet.clone())
            .on_client(RpcClient::new(
                Http::with_client(self.http.clone(), self.rpc_url.clone()),
                false,
            ))
    }

    fn oracle_address(&self, oracle: OracleKind) -> Address {
        match oracle {
            OracleKind::Market => self.contracts.market_oracle,
            OracleKind::Cpi => self.contracts.cpi_oracle,
        }
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn pool_reserves(&self) -> Result<PoolReserves, ChainClientError> {
        let pair = IUniswapV2Pair::new(self.contracts.pool, &self.provider);
        let reserves = pair.getReserves().call().await.map_err(|e| {
            ChainClientError::ContractCallError(format!("getReserves failed: {}", e))
        })?;

        let result = PoolReserves {
            reserve0: reserves.reserve0.to::<u128>(),
            reserve1: reserves.reserve1.to::<u128>(),
        };

        debug!(
            pool = %self.contracts.pool,
            reserve0 = result.reserve0,
            reserve1 = result.reserve1,
            "Fetched pool reserves"
        );

        Ok(result)
    }

    async fn total_supply(&self) -> Result<U256, ChainClientError> {
        let token = IToken::new(self.contracts.token, &self.provider);
        let supply = token
            .totalSupply()
            .call()
            .await
            .map_err(|e| ChainClientError::ContractCallError(format!("totalSupply failed: {}", e)))?
            ._0;

        debug!(token = %self.contracts.token, total_supply = %supply, "Fetched total supply");

        Ok(supply)
    }

    async fn push_report(&self, oracle: OracleKind, payload: U256) -> Result<TxHash, ChainClientError> {
        let address = self.oracle_address(oracle);
        info!(
            oracle = %oracle,
            to = %address,
            payload = %payload,
            gas_limit = self.gas_limit,
            "Sending pushReport transaction"
        );

        let provider = self.signing_provider();
        let contract = IOracle::new(address, &provider);

        let pending_tx = contract
            .pushReport(payload)
            .gas(self.gas_limit)
            .send()
            .await
            .map_err(|e| {
                error!(oracle = %oracle, error = %e, "Failed to send pushReport transaction");
                ChainClientError::TransactionError(format!("pushReport to {} oracle: {}", oracle, e))
            })?;

        let tx_hash = *pending_tx.tx_hash();
        info!(oracle = %oracle, tx_hash = %tx_hash, "pushReport transaction sent");

        Ok(tx_hash)
    }

    async fn rebase(&self) -> Result<TxHash, ChainClientError> {
        info!(
            to = %self.contracts.orchestrator,
            gas_limit = self.gas_limit,
            "Sending rebase transaction"
        );

        let provider = self.signing_provider();
        let orchestrator = IOrchestrator::new(self.contracts.orchestrator, &provider);

        let pending_tx = orchestrator
            .rebase()
            .gas(self.gas_limit)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send rebase transaction");
                ChainClientError::TransactionError(format!("rebase: {}", e))
            })?;

        let tx_hash = *pending_tx.tx_hash();
        info!(tx_hash = %tx_hash, "Rebase transaction sent");

        Ok(tx_hash)
    }
}

fn parse_address(role: &str, value: &str) -> Result<Address, ChainClientError> {
    Address::from_str(value)
        .map_err(|e| ChainClientError::InvalidConfig(format!("Invalid {} address: {}", role, e)))
}
