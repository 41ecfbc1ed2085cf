//! Amount validation
//!
//! Callers hand amounts to the ledger as decimals (parsed from CSV or an API
//! payload); the ledger itself only ever stores whole minor units.

use super::error::LedgerError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Integer amount in the smallest denomination of a currency
pub type MinorUnits = u64;

/// Validate a caller-supplied amount and convert it to minor units
///
/// The amount must be strictly positive, integral, and fit in `u64`.
pub fn to_minor_units(amount: Decimal) -> Result<MinorUnits, LedgerError> {
    if amount <= Decimal::ZERO || !amount.fract().is_zero() {
        return Err(LedgerError::invalid_amount(amount));
    }
    amount
        .to_u64()
        .ok_or_else(|| LedgerError::invalid_amount(amount))
}
