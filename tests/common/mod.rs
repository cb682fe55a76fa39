//! Recording test doubles for the rebase cycle

#![allow(dead_code)]

use alloy::primitives::{TxHash, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use rebase_keeper::config::CycleConfig;
use rebase_keeper::jobs::confirmation::ConfirmationWait;
use rebase_keeper::jobs::rebase_cycle::RebaseCycle;
use rebase_keeper::services::chain_client::{
    ChainClient, ChainClientError, OracleKind, PoolReserves,
};
use rebase_keeper::services::memory_store::{MemoryLastRebaseStore, MemoryRebaseHistoryStore};
use rebase_keeper::services::quote_provider::{MarketQuote, QuoteError, QuoteProvider};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Ordered record of every collaborator call
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn submissions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("push:") || c == "rebase")
            .collect()
    }
}

pub struct MockChainClient {
    pub log: CallLog,
    pub total_supply: U256,
    pub fail_rebase: bool,
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn pool_reserves(&self) -> Result<PoolReserves, ChainClientError> {
        self.log.push("pool_reserves");
        Ok(PoolReserves {
            reserve0: 1_000_000_000_000,
            reserve1: 2_000_000_000_000_000_000,
        })
    }

    async fn total_supply(&self) -> Result<U256, ChainClientError> {
        self.log.push("total_supply");
        Ok(self.total_supply)
    }

    async fn push_report(&self, oracle: OracleKind, payload: U256) -> Result<TxHash, ChainClientError> {
        self.log.push(format!("push:{}:{}", oracle, payload));
        let byte = match oracle {
            OracleKind::Market => 1,
            OracleKind::Cpi => 2,
        };
        Ok(TxHash::with_last_byte(byte))
    }

    async fn rebase(&self) -> Result<TxHash, ChainClientError> {
        self.log.push("rebase");
        if self.fail_rebase {
            return Err(ChainClientError::TransactionError("nonce too low".to_string()));
        }
        Ok(TxHash::with_last_byte(3))
    }
}

pub struct MockQuoteProvider {
    pub log: CallLog,
    pub market: Option<MarketQuote>,
    pub cpi: Option<Decimal>,
}

#[async_trait]
impl QuoteProvider for MockQuoteProvider {
    async fn get_market_quote(&self) -> Result<MarketQuote, QuoteError> {
        self.log.push("quote:market");
        self.market
            .ok_or_else(|| QuoteError::RequestError("ETH/USD feed unreachable".to_string()))
    }

    async fn get_cpi_index(&self) -> Result<Decimal, QuoteError> {
        self.log.push("quote:cpi");
        self.cpi
            .ok_or_else(|| QuoteError::MalformedResponse("CPI series has no observations".to_string()))
    }
}

/// Confirmation wait that only records that it happened
pub struct RecordingConfirmation {
    pub log: CallLog,
}

#[async_trait]
impl ConfirmationWait for RecordingConfirmation {
    async fn wait_for_confirmation(&self) {
        self.log.push("confirm");
    }
}

pub fn default_market_quote() -> MarketQuote {
    MarketQuote {
        token_eth_rate: dec!(0.002),
        eth_usd_rate: dec!(3000),
    }
}

/// Cycle settings with six payload decimals
pub fn cycle_settings() -> CycleConfig {
    CycleConfig {
        usd_decimals: 6,
        ..Default::default()
    }
}

pub struct Harness {
    pub log: CallLog,
    pub cycle: RebaseCycle,
    pub last_rebase: Arc<MemoryLastRebaseStore>,
    pub history: Arc<MemoryRebaseHistoryStore>,
}

pub struct HarnessBuilder {
    pub total_supply: U256,
    pub fail_rebase: bool,
    pub market: Option<MarketQuote>,
    pub cpi: Option<Decimal>,
    pub last_rebase: MemoryLastRebaseStore,
    pub history: MemoryRebaseHistoryStore,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            total_supply: U256::from(50_000_000_000_000_000u64),
            fail_rebase: false,
            market: Some(default_market_quote()),
            cpi: Some(dec!(315.301)),
            last_rebase: MemoryLastRebaseStore::new(),
            history: MemoryRebaseHistoryStore::new(),
        }
    }
}

impl HarnessBuilder {
    pub fn build(self) -> Harness {
        let log = CallLog::default();
        let last_rebase = Arc::new(self.last_rebase);
        let history = Arc::new(self.history);

        let chain = Arc::new(MockChainClient {
            log: log.clone(),
            total_supply: self.total_supply,
            fail_rebase: self.fail_rebase,
        });
        let quotes = Arc::new(MockQuoteProvider {
            log: log.clone(),
            market: self.market,
            cpi: self.cpi,
        });
        let confirmation = Arc::new(RecordingConfirmation { log: log.clone() });

        let cycle = RebaseCycle::new(
            cycle_settings(),
            chain,
            quotes,
            last_rebase.clone(),
            history.clone(),
            confirmation,
        );

        Harness {
            log,
            cycle,
            last_rebase,
            history,
        }
    }
}
