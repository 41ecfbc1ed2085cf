//! Fixed exchange-rate table
//!
//! Rates are multipliers: `amount_in_to = amount_in_from * rate`. The result is
//! truncated toward zero to whole minor units, so a conversion never creates
//! value the sender did not pay for.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::core::traits::ExchangeRates;
use crate::types::{Currency, LedgerError, MinorUnits};

/// One directed rate, parsed from `FROM:TO=MULTIPLIER` (e.g. `USD:EUR=0.85`)
#[derive(Debug, Clone, PartialEq)]
pub struct RateSpec {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
}

impl FromStr for RateSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pair, rate) = s
            .split_once('=')
            .ok_or_else(|| format!("expected FROM:TO=RATE, got '{}'", s))?;
        let (from, to) = pair
            .split_once(':')
            .ok_or_else(|| format!("expected FROM:TO=RATE, got '{}'", s))?;

        let from = Currency::new(from).map_err(|e| e.to_string())?;
        let to = Currency::new(to).map_err(|e| e.to_string())?;
        let rate = Decimal::from_str(rate.trim())
            .map_err(|e| format!("invalid rate '{}': {}", rate, e))?;
        if rate <= Decimal::ZERO {
            return Err(format!("rate must be positive, got {}", rate));
        }

        Ok(RateSpec { from, to, rate })
    }
}

/// In-process rate table implementing [`ExchangeRates`]
#[derive(Debug, Clone, Default)]
pub struct StaticRates {
    rates: HashMap<(Currency, Currency), Decimal>,
    known: HashSet<Currency>,
}

impl StaticRates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a currency with no rates (same-currency moves only)
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.known.insert(currency);
        self
    }

    /// Register a directed rate; both currencies become known
    pub fn with_rate(mut self, from: Currency, to: Currency, rate: Decimal) -> Self {
        self.known.insert(from.clone());
        self.known.insert(to.clone());
        self.rates.insert((from, to), rate);
        self
    }

    pub fn from_specs(specs: impl IntoIterator<Item = RateSpec>) -> Self {
        specs.into_iter().fold(Self::new(), |rates, spec| {
            rates.with_rate(spec.from, spec.to, spec.rate)
        })
    }

    pub fn rate(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        self.rates.get(&(from.clone(), to.clone())).copied()
    }
}

#[async_trait]
impl ExchangeRates for StaticRates {
    async fn convert(
        &self,
        amount: MinorUnits,
        from: &Currency,
        to: &Currency,
    ) -> Result<MinorUnits, LedgerError> {
        if from == to {
            return Ok(amount);
        }
        for currency in [from, to] {
            if !self.known.contains(currency) {
                return Err(LedgerError::unknown_currency(currency.as_str()));
            }
        }

        let rate = self
            .rate(from, to)
            .ok_or_else(|| LedgerError::conversion_unavailable(from.as_str(), to.as_str()))?;

        Decimal::from(amount)
            .checked_mul(rate)
            .map(|converted| converted.round_dp_with_strategy(0, RoundingStrategy::ToZero))
            .and_then(|converted| converted.to_u64())
            .ok_or_else(|| LedgerError::conversion_unavailable(from.as_str(), to.as_str()))
    }
}
