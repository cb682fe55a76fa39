use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One completed rebase cycle as recorded in the history ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebaseHistoryEntry {
    pub id: i32,
    pub usd_price: Decimal,
    pub cpi_value: Decimal,
    pub total_supply: Decimal,
    pub date: DateTime<Utc>,
    pub raised: Option<bool>,
}

/// Entry about to be appended; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewRebaseHistoryEntry {
    pub usd_price: Decimal,
    pub cpi_value: Decimal,
    pub total_supply: Decimal,
    pub date: DateTime<Utc>,
    pub raised: Option<bool>,
}

/// Direction of the total supply compared with the previous entry.
///
/// Strictly greater is `Some(true)`, strictly lesser is `Some(false)`.
/// Equal supply and a missing predecessor both carry no signal.
pub fn supply_raised(previous: Option<&RebaseHistoryEntry>, total_supply: Decimal) -> Option<bool> {
    let previous = previous?;
    match total_supply.cmp(&previous.total_supply) {
        Ordering::Greater => Some(true),
        Ordering::Less => Some(false),
        Ordering::Equal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(total_supply: Decimal) -> RebaseHistoryEntry {
        RebaseHistoryEntry {
            id: 1,
            usd_price: dec!(1000000),
            cpi_value: dec!(250000000),
            total_supply,
            date: Utc::now(),
            raised: None,
        }
    }

    #[test]
    fn test_first_entry_has_no_signal() {
        assert_eq!(supply_raised(None, dec!(100)), None);
        assert_eq!(supply_raised(None, dec!(0)), None);
    }

    #[test]
    fn test_supply_increase() {
        assert_eq!(supply_raised(Some(&entry(dec!(100))), dec!(150)), Some(true));
    }

    #[test]
    fn test_supply_decrease() {
        assert_eq!(supply_raised(Some(&entry(dec!(150))), dec!(100)), Some(false));
    }

    #[test]
    fn test_supply_unchanged() {
        assert_eq!(supply_raised(Some(&entry(dec!(100))), dec!(100)), None);
    }
}
