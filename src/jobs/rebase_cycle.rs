//! Rebase cycle
//!
//! One end-to-end rebase: wait a randomised delay, push the market and CPI
//! reports, wait for them to be mined, trigger the rebase, and record what
//! happened. Steps run strictly in order; any failure aborts the cycle and
//! nothing already broadcast is rolled back.

use alloy::primitives::{TxHash, U256};
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::CycleConfig;
use crate::jobs::confirmation::ConfirmationWait;
use crate::models::rebase_history::{NewRebaseHistoryEntry, RebaseHistoryEntry, supply_raised};
use crate::services::chain_client::{ChainClient, ChainClientError, OracleKind};
use crate::services::fixed_point::{FixedPointError, market_payload, to_fixed_point, u256_to_decimal};
use crate::services::last_rebase_store::{LastRebaseStore, StoreError};
use crate::services::quote_provider::{QuoteError, QuoteProvider};
use crate::services::rebase_history_store::RebaseHistoryStore;

/// Where a cycle is; strictly linear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    PendingDelay,
    OraclesPushed,
    Confirming,
    Rebased,
    Confirming2,
    Recorded,
}

impl std::fmt::Display for CycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CycleStage::PendingDelay => "pending_delay",
            CycleStage::OraclesPushed => "oracles_pushed",
            CycleStage::Confirming => "confirming",
            CycleStage::Rebased => "rebased",
            CycleStage::Confirming2 => "confirming_2",
            CycleStage::Recorded => "recorded",
        };
        write!(f, "{}", name)
    }
}

/// Error types for a rebase cycle
#[derive(Debug)]
pub enum RebaseCycleError {
    /// The delay range `[lower, upper]` is empty
    InvalidSchedule { lower: u64, upper: u64 },
    Quote(QuoteError),
    Encoding(FixedPointError),
    Chain(ChainClientError),
    Storage(StoreError),
}

impl std::fmt::Display for RebaseCycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RebaseCycleError::InvalidSchedule { lower, upper } => write!(
                f,
                "Invalid schedule: lower bound {}s exceeds upper bound {}s",
                lower, upper
            ),
            RebaseCycleError::Quote(e) => write!(f, "Quote failed: {}", e),
            RebaseCycleError::Encoding(e) => write!(f, "Encoding failed: {}", e),
            RebaseCycleError::Chain(e) => write!(f, "Chain call failed: {}", e),
            RebaseCycleError::Storage(e) => write!(f, "Storage failed: {}", e),
        }
    }
}

impl std::error::Error for RebaseCycleError {}

impl From<QuoteError> for RebaseCycleError {
    fn from(e: QuoteError) -> Self {
        RebaseCycleError::Quote(e)
    }
}

impl From<FixedPointError> for RebaseCycleError {
    fn from(e: FixedPointError) -> Self {
        RebaseCycleError::Encoding(e)
    }
}

impl From<ChainClientError> for RebaseCycleError {
    fn from(e: ChainClientError) -> Self {
        RebaseCycleError::Chain(e)
    }
}

impl From<StoreError> for RebaseCycleError {
    fn from(e: StoreError) -> Self {
        RebaseCycleError::Storage(e)
    }
}

/// Outcome of a completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub seconds_to_rebase: u64,
    pub usd_payload: U256,
    pub cpi_payload: U256,
    pub market_tx: TxHash,
    pub cpi_tx: TxHash,
    pub rebase_tx: TxHash,
    pub total_supply: U256,
    pub entry: RebaseHistoryEntry,
}

/// Draw the number of seconds to wait before the next rebase.
///
/// Uniform over `[max(last_rebase_seconds - rebase_delay, 0), seconds_in_day]`,
/// which keeps the rebase near the previous time of day without making it
/// predictable. An empty range is an error rather than being clamped.
pub fn generate_rebase_time<R: Rng + ?Sized>(
    last_rebase_seconds: u64,
    rebase_delay: u64,
    seconds_in_day: u64,
    rng: &mut R,
) -> Result<u64, RebaseCycleError> {
    let lower = last_rebase_seconds.saturating_sub(rebase_delay);
    if lower > seconds_in_day {
        return Err(RebaseCycleError::InvalidSchedule {
            lower,
            upper: seconds_in_day,
        });
    }
    Ok(rng.gen_range(lower..=seconds_in_day))
}

/// Wall-clock time `seconds` after `now`, if it is representable
fn execution_time(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let delta = TimeDelta::try_seconds(i64::try_from(seconds).ok()?)?;
    now.checked_add_signed(delta)
}

pub struct RebaseCycle {
    settings: CycleConfig,
    chain: Arc<dyn ChainClient>,
    quotes: Arc<dyn QuoteProvider>,
    last_rebase: Arc<dyn LastRebaseStore>,
    history: Arc<dyn RebaseHistoryStore>,
    confirmation: Arc<dyn ConfirmationWait>,
}

impl RebaseCycle {
    pub fn new(
        settings: CycleConfig,
        chain: Arc<dyn ChainClient>,
        quotes: Arc<dyn QuoteProvider>,
        last_rebase: Arc<dyn LastRebaseStore>,
        history: Arc<dyn RebaseHistoryStore>,
        confirmation: Arc<dyn ConfirmationWait>,
    ) -> Self {
        Self {
            settings,
            chain,
            quotes,
            last_rebase,
            history,
            confirmation,
        }
    }

    /// Run one full cycle
    pub async fn run(&self) -> Result<CycleReport, RebaseCycleError> {
        let seconds_to_rebase = self.schedule().await?;
        self.run_after(seconds_to_rebase).await
    }

    /// Draw this cycle's delay from the stored previous one
    pub async fn schedule(&self) -> Result<u64, RebaseCycleError> {
        let last_rebase_seconds = self.last_rebase.get().await?.unwrap_or(0);

        let seconds_to_rebase = generate_rebase_time(
            last_rebase_seconds,
            self.settings.rebase_delay_secs,
            self.settings.seconds_in_day,
            &mut rand::thread_rng(),
        )
        .inspect_err(|e| error!(error = %e, last_rebase_seconds, "Cannot schedule rebase"))?;

        debug!(
            last_rebase_seconds = last_rebase_seconds,
            seconds_to_rebase = seconds_to_rebase,
            "Rebase delay drawn"
        );

        Ok(seconds_to_rebase)
    }

    /// Run a cycle with an already drawn delay
    pub async fn run_after(&self, seconds_to_rebase: u64) -> Result<CycleReport, RebaseCycleError> {
        self.enter(CycleStage::PendingDelay);

        match execution_time(Utc::now(), seconds_to_rebase) {
            Some(at) => info!(
                seconds_to_rebase = seconds_to_rebase,
                execution_time = %at.format("%Y-%m-%d %H:%M:%S"),
                "Rebase scheduled (UTC)"
            ),
            None => warn!(
                seconds_to_rebase = seconds_to_rebase,
                "Rebase scheduled beyond the representable calendar"
            ),
        }
        tokio::time::sleep(Duration::from_secs(seconds_to_rebase)).await;

        // Both quotes before any submission, so a bad feed pushes nothing
        let market = self.quotes.get_market_quote().await?;
        let usd_payload = market_payload(
            market.token_eth_rate,
            market.eth_usd_rate,
            self.settings.usd_decimals,
        )?;

        let cpi_index = self.quotes.get_cpi_index().await?;
        let cpi_payload = to_fixed_point(cpi_index, self.settings.usd_decimals)?;

        info!(
            token_eth_rate = %market.token_eth_rate,
            eth_usd_rate = %market.eth_usd_rate,
            usd_payload = %usd_payload,
            cpi_index = %cpi_index,
            cpi_payload = %cpi_payload,
            "Oracle payloads prepared"
        );

        let market_tx = self.chain.push_report(OracleKind::Market, usd_payload).await?;
        let cpi_tx = self.chain.push_report(OracleKind::Cpi, cpi_payload).await?;
        self.enter(CycleStage::OraclesPushed);

        self.enter(CycleStage::Confirming);
        self.confirmation.wait_for_confirmation().await;

        let rebase_tx = self.chain.rebase().await?;
        self.enter(CycleStage::Rebased);

        self.last_rebase.set(seconds_to_rebase).await?;

        self.enter(CycleStage::Confirming2);
        self.confirmation.wait_for_confirmation().await;

        let total_supply = self.chain.total_supply().await?;
        let total_supply_dec = u256_to_decimal(total_supply)?;

        let previous = self.history.latest().await?;
        let raised = supply_raised(previous.as_ref(), total_supply_dec);

        let entry = self
            .history
            .append(NewRebaseHistoryEntry {
                usd_price: u256_to_decimal(usd_payload)?,
                cpi_value: u256_to_decimal(cpi_payload)?,
                total_supply: total_supply_dec,
                date: Utc::now(),
                raised,
            })
            .await?;
        self.enter(CycleStage::Recorded);

        info!(
            id = entry.id,
            total_supply = %total_supply,
            previous_supply = ?previous.map(|p| p.total_supply),
            raised = ?raised,
            rebase_tx = %rebase_tx,
            "Rebase cycle recorded"
        );

        Ok(CycleReport {
            seconds_to_rebase,
            usd_payload,
            cpi_payload,
            market_tx,
            cpi_tx,
            rebase_tx,
            total_supply,
            entry,
        })
    }

    fn enter(&self, stage: CycleStage) {
        info!(stage = %stage, "Rebase cycle stage");
    }
}
