// COINS & GAS PRICES
// Integer coins for fees and balances, rational gas prices for thresholds.
//
// SAFETY INVARIANTS:
// 1. Fee thresholds round up (ceil), never down
// 2. Gas prices are exact rationals; no floating point in consensus paths

use num_rational::Ratio;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoinError {
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),

    #[error("Invalid coin: {0}")]
    InvalidCoin(String),
}

/// Maximum fractional digits accepted when parsing a decimal.
const MAX_DECIMAL_PLACES: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(amount: u64, denom: impl Into<String>) -> Self {
        Coin {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.denom.is_empty() && self.denom.chars().all(|c| c.is_ascii_alphanumeric() || c == '/')
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Amount of `denom` in a coin list (0 if absent).
pub fn amount_of(coins: &[Coin], denom: &str) -> u64 {
    coins
        .iter()
        .filter(|c| c.denom == denom)
        .map(|c| c.amount)
        .fold(0u64, |acc, a| acc.saturating_add(a))
}

pub fn format_coins(coins: &[Coin]) -> String {
    coins.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",")
}

/// A coin with a fractional amount, used for gas prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    pub amount: Ratio<u128>,
}

impl DecCoin {
    pub fn new(amount: Ratio<u128>, denom: impl Into<String>) -> Self {
        DecCoin {
            denom: denom.into(),
            amount,
        }
    }

    /// Parses `"0.002utsr"`.
    pub fn parse(s: &str) -> Result<Self, CoinError> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_alphabetic())
            .ok_or_else(|| CoinError::InvalidCoin(s.to_string()))?;
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() {
            return Err(CoinError::InvalidCoin(s.to_string()));
        }
        Ok(DecCoin {
            denom: denom.to_string(),
            amount: parse_decimal(amount)?,
        })
    }

    /// Fee this price demands for `gas` units: `ceil(amount × gas)`.
    pub fn required_fee(&self, gas: u64) -> u64 {
        let total = (self.amount * Ratio::from_integer(gas as u128)).ceil().to_integer();
        u64::try_from(total).unwrap_or(u64::MAX)
    }

    pub fn is_zero(&self) -> bool {
        *self.amount.numer() == 0
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}{}", self.amount.numer(), self.amount.denom(), self.denom)
    }
}

/// Parses a comma-separated list such as `"0.002utsr,1stake"`. Empty input
/// yields an empty list.
pub fn parse_dec_coins(s: &str) -> Result<Vec<DecCoin>, CoinError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(DecCoin::parse)
        .collect()
}

/// Parses a non-negative decimal string into an exact rational.
pub fn parse_decimal(s: &str) -> Result<Ratio<u128>, CoinError> {
    let invalid = || CoinError::InvalidDecimal(s.to_string());
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if frac_part.len() > MAX_DECIMAL_PLACES {
        return Err(invalid());
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let digits = format!("{}{}", int_part, frac_part);
    let numer: u128 = if digits.is_empty() {
        0
    } else {
        digits.parse().map_err(|_| invalid())?
    };
    let denom = 10u128.pow(frac_part.len() as u32);
    Ok(Ratio::new(numer, denom))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("0.002").unwrap(), Ratio::new(2, 1000));
        assert_eq!(parse_decimal("1").unwrap(), Ratio::from_integer(1));
        assert_eq!(parse_decimal(".5").unwrap(), Ratio::new(1, 2));
        assert!(parse_decimal("1.2.3").is_err());
        assert!(parse_decimal("-1").is_err());
        assert!(parse_decimal("").is_err());
    }

    #[test]
    fn test_parse_dec_coins() {
        let coins = parse_dec_coins("0.002utsr, 1stake").unwrap();
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0].denom, "utsr");
        assert_eq!(coins[1].amount, Ratio::from_integer(1));
        assert!(parse_dec_coins("").unwrap().is_empty());
        assert!(parse_dec_coins("utsr").is_err());
    }

    #[test]
    fn test_required_fee_rounds_up() {
        let price = DecCoin::parse("0.002utsr").unwrap();
        // 0.002 * 100_001 = 200.002 -> 201
        assert_eq!(price.required_fee(100_001), 201);
        assert_eq!(price.required_fee(100_000), 200);
        assert_eq!(price.required_fee(0), 0);
    }

    #[test]
    fn test_amount_of() {
        let coins = vec![Coin::new(5, "utsr"), Coin::new(7, "stake")];
        assert_eq!(amount_of(&coins, "utsr"), 5);
        assert_eq!(amount_of(&coins, "atom"), 0);
    }
}
