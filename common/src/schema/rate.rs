use anyhow::anyhow;
use chrono::{DateTime, Utc};
use fancy_regex::Regex;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, ExchangeResult};

const PAIR_SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub id: i64,
    pub pair: String,
    pub rate: Decimal,
    pub fee_percent: Decimal,
    pub min_amount: Decimal,
    /// Zero means no upper bound.
    pub max_amount: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn has_upper_bound(&self) -> bool {
        self.max_amount > Decimal::ZERO
    }

    pub fn accepts(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && (!self.has_upper_bound() || amount <= self.max_amount)
    }
}

/// Payload of `POST /rates` and `set-rate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExchangeRate {
    pub pair: String,
    pub rate: Decimal,
    #[serde(default)]
    pub fee_percent: Decimal,
    #[serde(default)]
    pub min_amount: Decimal,
    #[serde(default)]
    pub max_amount: Decimal,
}

impl NewExchangeRate {
    pub fn new(pair: &str, rate: Decimal) -> Self {
        NewExchangeRate {
            pair: pair.to_string(),
            rate,
            fee_percent: Decimal::ZERO,
            min_amount: Decimal::ZERO,
            max_amount: Decimal::ZERO,
        }
    }

    pub fn with_fee(mut self, fee_percent: Decimal) -> Self {
        self.fee_percent = fee_percent;
        self
    }

    pub fn with_limits(mut self, min_amount: Decimal, max_amount: Decimal) -> Self {
        self.min_amount = min_amount;
        self.max_amount = max_amount;
        self
    }

    /// Checks the record and normalizes the pair to upper case.
    pub fn validated(mut self) -> ExchangeResult<Self> {
        let (from, to) = split_pair(&self.pair).ok_or_else(|| {
            ExchangeError::validation(format!(
                "Pair `{}` must be two currency codes joined by `_`",
                self.pair
            ))
        })?;
        self.pair = pair_key(&from, &to);

        if self.rate <= Decimal::ZERO {
            return Err(ExchangeError::validation("Rate must be greater than zero"));
        }
        if self.fee_percent < Decimal::ZERO || self.fee_percent > Decimal::ONE_HUNDRED {
            return Err(ExchangeError::validation(
                "Fee percent must be between 0 and 100",
            ));
        }
        if self.min_amount < Decimal::ZERO || self.max_amount < Decimal::ZERO {
            return Err(ExchangeError::validation("Amount limits cannot be negative"));
        }
        if self.max_amount > Decimal::ZERO && self.min_amount > self.max_amount {
            return Err(ExchangeError::validation(
                "Minimum amount cannot exceed maximum amount",
            ));
        }
        Ok(self)
    }
}

pub fn pair_key(from: &str, to: &str) -> String {
    format!("{}{}{}", from, PAIR_SEPARATOR, to)
}

/// Splits `XOF_USDT` into `("XOF", "USDT")`. Codes are upper-cased; `None` when malformed.
pub fn split_pair(pair: &str) -> Option<(String, String)> {
    let (from, to) = pair.trim().split_once(PAIR_SEPARATOR)?;
    let from = normalize_currency(from);
    let to = normalize_currency(to);
    match (is_currency_code(&from), is_currency_code(&to)) {
        (Ok(true), Ok(true)) if from != to => Some((from, to)),
        _ => None,
    }
}

pub fn normalize_currency(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn is_currency_code(code: &str) -> anyhow::Result<bool> {
    static RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{2,10}$").ok());
    match &*RE {
        Some(re) => re
            .is_match(code)
            .map_err(|e| anyhow!("Regex error for currency code: {e}")),
        None => Err(anyhow!(
            "Currency regex failed to compile. Rejecting all currency codes."
        )),
    }
}

/// Rates loaded into an empty store on first start.
pub fn default_rates() -> Vec<NewExchangeRate> {
    vec![
        NewExchangeRate::new("XOF_USDT", Decimal::new(16, 4))
            .with_fee(Decimal::new(15, 1))
            .with_limits(Decimal::new(5_000, 0), Decimal::new(1_000_000, 0)),
        NewExchangeRate::new("USDT_XOF", Decimal::new(600, 0))
            .with_fee(Decimal::new(15, 1))
            .with_limits(Decimal::new(10, 0), Decimal::new(2_000, 0)),
        NewExchangeRate::new("XOF_BTC", Decimal::new(2, 8))
            .with_fee(Decimal::new(2, 0))
            .with_limits(Decimal::new(10_000, 0), Decimal::new(5_000_000, 0)),
    ]
}
