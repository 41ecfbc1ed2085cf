//! CSV format handling for operations and account output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to ledger operations
//! - Account output serialization
//!
//! # Input columns
//!
//! `type,owner,counterparty,amount,currency,key`
//!
//! | type       | required columns              |
//! |------------|-------------------------------|
//! | `open`     | owner, currency               |
//! | `deposit`  | owner, amount, key            |
//! | `withdraw` | owner, amount, key            |
//! | `transfer` | owner, counterparty, amount, key |
//!
//! Amounts are whole minor units. They are parsed as decimals here and
//! validated by the ledger, so `10.5` reaches the ledger and fails there with
//! `InvalidAmount` rather than being dropped as a parse error.
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{Account, Currency, Operation};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Raw CSV row as read from the operation file
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub op_type: String,
    pub owner: String,
    pub counterparty: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub key: Option<String>,
}

fn required(value: Option<String>, column: &str, op_type: &str) -> Result<String, String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(format!("{} operation requires '{}'", op_type, column)),
    }
}

fn parse_amount(value: Option<String>, op_type: &str) -> Result<Decimal, String> {
    let raw = required(value, "amount", op_type)?;
    Decimal::from_str(&raw).map_err(|_| format!("Invalid amount '{}'", raw))
}

/// Convert a CSV row into an [`Operation`]
///
/// # Errors
///
/// Returns a message naming the problem when the type is unknown, the owner
/// is blank, a required column is missing, or the amount or currency cannot
/// be parsed.
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<Operation, String> {
    let op_type = csv_record.op_type.trim().to_lowercase();
    let owner = csv_record.owner.trim().to_string();
    if owner.is_empty() {
        return Err(format!("{} operation requires 'owner'", op_type));
    }

    match op_type.as_str() {
        "open" => {
            let code = required(csv_record.currency, "currency", &op_type)?;
            let currency = Currency::from_str(&code).map_err(|e| e.to_string())?;
            Ok(Operation::Open { owner, currency })
        }
        "deposit" => Ok(Operation::Deposit {
            owner,
            amount: parse_amount(csv_record.amount, &op_type)?,
            key: required(csv_record.key, "key", &op_type)?,
        }),
        "withdraw" => Ok(Operation::Withdraw {
            owner,
            amount: parse_amount(csv_record.amount, &op_type)?,
            key: required(csv_record.key, "key", &op_type)?,
        }),
        "transfer" => Ok(Operation::Transfer {
            recipient: required(csv_record.counterparty, "counterparty", &op_type)?,
            owner,
            amount: parse_amount(csv_record.amount, &op_type)?,
            key: required(csv_record.key, "key", &op_type)?,
        }),
        _ => Err(format!(
            "Invalid operation type: '{}' for owner {}",
            csv_record.op_type, owner
        )),
    }
}

/// Write the account table, sorted by account id
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["account", "owner", "currency", "balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.id.to_string(),
                account.owner.clone(),
                account.currency.to_string(),
                account.balance.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
