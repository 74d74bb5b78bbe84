//! Rate lookup and quote computation.
//!
//! The fee stored on a rate is informational: it is assumed to be already
//! applied to the quoted rate, so it is never subtracted here.

use std::collections::HashSet;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::{ExchangeError, ExchangeResult};
use crate::schema::{ExchangeRate, pair_key};

const QUOTE_DECIMALS: u32 = 2;

/// The first rate stored for `from_to`. Reverse pairs are never synthesized.
pub fn find_rate<'a>(rates: &'a [ExchangeRate], from: &str, to: &str) -> Option<&'a ExchangeRate> {
    let key = pair_key(from, to);
    rates.iter().find(|rate| rate.pair == key)
}

/// `amount_in × rate`, rounded half away from zero to two decimals.
pub fn estimate_output(amount_in: Decimal, rate: &ExchangeRate) -> ExchangeResult<Decimal> {
    amount_in
        .checked_mul(rate.rate)
        .map(|out| {
            out.round_dp_with_strategy(QUOTE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
        })
        .ok_or_else(|| ExchangeError::validation("Amount is too large"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub pair: String,
    pub amount_in: Decimal,
    pub rate: Decimal,
    pub fee_percent: Decimal,
    pub estimated_out: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub within_limits: bool,
}

impl Quote {
    pub fn new(amount_in: Decimal, rate: &ExchangeRate) -> ExchangeResult<Self> {
        Ok(Quote {
            pair: rate.pair.clone(),
            amount_in,
            rate: rate.rate,
            fee_percent: rate.fee_percent,
            estimated_out: estimate_output(amount_in, rate)?,
            min_amount: rate.min_amount,
            max_amount: rate.max_amount,
            within_limits: rate.accepts(amount_in),
        })
    }
}

/// Pairs an operator has switched off even though a rate is on file.
#[derive(Debug, Clone, Default)]
pub struct BlockedPairs(HashSet<String>);

impl BlockedPairs {
    /// Parses `XOF_USDT, usdt_btc`. Blank entries are skipped.
    pub fn parse(list: &str) -> Self {
        BlockedPairs(
            list.split(',')
                .map(|pair| pair.trim().to_ascii_uppercase())
                .filter(|pair| !pair.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, from: &str, to: &str) -> bool {
        self.0.contains(&pair_key(from, to))
    }
}

/// Resolves the rate for a conversion, treating blocked and missing pairs alike.
pub fn resolve_rate<'a>(
    rates: &'a [ExchangeRate],
    blocked: &BlockedPairs,
    from: &str,
    to: &str,
) -> ExchangeResult<&'a ExchangeRate> {
    if blocked.contains(from, to) {
        return Err(unavailable(from, to));
    }
    find_rate(rates, from, to).ok_or_else(|| unavailable(from, to))
}

/// Rejects amounts outside the rate's limits.
pub fn check_limits(amount_in: Decimal, rate: &ExchangeRate) -> ExchangeResult<()> {
    if amount_in < rate.min_amount {
        return Err(ExchangeError::validation(format!(
            "Amount {} is below the minimum of {} for {}",
            amount_in, rate.min_amount, rate.pair
        )));
    }
    if rate.has_upper_bound() && amount_in > rate.max_amount {
        return Err(ExchangeError::validation(format!(
            "Amount {} is above the maximum of {} for {}",
            amount_in, rate.max_amount, rate.pair
        )));
    }
    Ok(())
}

fn unavailable(from: &str, to: &str) -> ExchangeError {
    ExchangeError::validation(format!("Conversion {} is unavailable", pair_key(from, to)))
}
