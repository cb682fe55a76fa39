//! Fixed-point conversions between decimal quotes and on-chain integers
//!
//! Oracle payloads are integers scaled by `10^decimals`. Every conversion
//! from a decimal quote rounds once, on the final scaled value, half away
//! from zero.

use alloy::primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Integer digits a stored history value may carry (`NUMERIC(28, 0)`)
pub const MAX_STORED_DIGITS: usize = 28;

/// Error types for fixed-point conversion
#[derive(Debug, Clone, PartialEq)]
pub enum FixedPointError {
    Negative(Decimal),
    Overflow(String),
}

impl std::fmt::Display for FixedPointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixedPointError::Negative(value) => {
                write!(f, "Negative value cannot be encoded: {}", value)
            }
            FixedPointError::Overflow(msg) => write!(f, "Fixed-point overflow: {}", msg),
        }
    }
}

impl std::error::Error for FixedPointError {}

/// `10^decimals` as a Decimal
pub fn scale_factor(decimals: u32) -> Result<Decimal, FixedPointError> {
    (0..decimals).try_fold(Decimal::ONE, |acc, _| {
        acc.checked_mul(Decimal::TEN)
            .ok_or_else(|| FixedPointError::Overflow(format!("10^{} exceeds Decimal range", decimals)))
    })
}

/// Scale `value` by `10^decimals` and round to an integer payload
pub fn to_fixed_point(value: Decimal, decimals: u32) -> Result<U256, FixedPointError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(FixedPointError::Negative(value));
    }

    let scaled = value
        .checked_mul(scale_factor(decimals)?)
        .ok_or_else(|| FixedPointError::Overflow(format!("{} * 10^{}", value, decimals)))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let integer = scaled
        .to_u128()
        .ok_or_else(|| FixedPointError::Overflow(format!("{} does not fit u128", scaled)))?;

    Ok(U256::from(integer))
}

/// Market oracle payload: `round(token_eth_rate * eth_usd_rate * 10^decimals)`
pub fn market_payload(
    token_eth_rate: Decimal,
    eth_usd_rate: Decimal,
    decimals: u32,
) -> Result<U256, FixedPointError> {
    let token_usd_rate = token_eth_rate.checked_mul(eth_usd_rate).ok_or_else(|| {
        FixedPointError::Overflow(format!("{} * {}", token_eth_rate, eth_usd_rate))
    })?;
    to_fixed_point(token_usd_rate, decimals)
}

/// Interpret a raw token amount with `decimals` places as a Decimal
pub fn from_base_units(raw: u128, decimals: u32) -> Result<Decimal, FixedPointError> {
    let raw = i128::try_from(raw)
        .map_err(|_| FixedPointError::Overflow(format!("{} does not fit i128", raw)))?;
    Decimal::try_from_i128_with_scale(raw, decimals)
        .map_err(|e| FixedPointError::Overflow(format!("{} with scale {}: {}", raw, decimals, e)))
}

/// Lossless U256 to Decimal, failing past Decimal's 96-bit mantissa
pub fn u256_to_decimal(value: U256) -> Result<Decimal, FixedPointError> {
    let text = value.to_string();
    if text.len() > MAX_STORED_DIGITS {
        return Err(FixedPointError::Overflow(format!(
            "{} exceeds {} digits",
            text, MAX_STORED_DIGITS
        )));
    }
    Decimal::from_str(&text)
        .map_err(|e| FixedPointError::Overflow(format!("{} as Decimal: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_payload_six_decimals() {
        let payload = market_payload(dec!(0.002), dec!(3000), 6).unwrap();
        assert_eq!(payload, U256::from(6_000_000u64));
    }

    #[test]
    fn test_rounds_half_up() {
        assert_eq!(to_fixed_point(dec!(1.0000005), 6).unwrap(), U256::from(1_000_001u64));
        assert_eq!(to_fixed_point(dec!(1.0000004), 6).unwrap(), U256::from(1_000_000u64));
    }

    #[test]
    fn test_cpi_eighteen_decimals() {
        let payload = to_fixed_point(dec!(310.326), 18).unwrap();
        assert_eq!(payload, U256::from(310_326_000_000_000_000_000u128));
    }

    #[test]
    fn test_negative_rejected() {
        assert_eq!(
            to_fixed_point(dec!(-1), 6),
            Err(FixedPointError::Negative(dec!(-1)))
        );
    }

    #[test]
    fn test_scale_factor_overflow() {
        assert!(scale_factor(28).is_ok());
        assert!(scale_factor(40).is_err());
    }

    #[test]
    fn test_from_base_units() {
        let value = from_base_units(1_500_000_000, 9).unwrap();
        assert_eq!(value, dec!(1.5));
    }

    #[test]
    fn test_u256_to_decimal() {
        let value = u256_to_decimal(U256::from(50_000_000_000_000_000u128)).unwrap();
        assert_eq!(value, dec!(50000000000000000));
        assert!(u256_to_decimal(U256::MAX).is_err());

        let widest = U256::from(10u8).pow(U256::from(28u8)) - U256::from(1u8);
        assert!(u256_to_decimal(widest).is_ok());
        // fits rust_decimal but not the 28-digit column
        let too_wide = U256::from(10u8).pow(U256::from(28u8));
        assert!(matches!(u256_to_decimal(too_wide), Err(FixedPointError::Overflow(_))));
    }
}
