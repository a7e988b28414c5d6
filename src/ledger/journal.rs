use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::amount::deserialize_lenient;
use crate::errors::ServiceError;

/// Debits and credits may differ by less than this and still balance
pub const BALANCE_TOLERANCE: Decimal = dec!(0.01);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalStatus {
    #[default]
    #[serde(alias = "draft")]
    Draft,
    #[serde(alias = "pending_approval")]
    PendingApproval,
    #[serde(alias = "approved")]
    Approved,
    #[serde(alias = "posted")]
    Posted,
    #[serde(alias = "reversed")]
    Reversed,
}

/// One side of a double entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JournalLine {
    #[validate(length(min = 1, message = "account code is required"))]
    pub account_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    #[schema(value_type = f64)]
    pub debit_amount: Decimal,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    #[schema(value_type = f64)]
    pub credit_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_number: Option<String>,
    #[validate(length(min = 1, message = "transaction date is required"))]
    pub transaction_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posting_date: Option<String>,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub description: String,
    #[validate(
        length(min = 2, message = "a journal entry needs at least two lines"),
        custom = "validate_lines"
    )]
    pub lines: Vec<JournalLine>,
    #[serde(default)]
    pub status: JournalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

fn validate_lines(lines: &[JournalLine]) -> Result<(), ValidationError> {
    if lines.iter().all(|line| line.validate().is_ok()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("lines");
        err.message = Some("every line needs an account code".into());
        Err(err)
    }
}

/// Totals of a set of journal lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceCheck {
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    #[schema(value_type = f64)]
    pub total_debits: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    #[schema(value_type = f64)]
    pub total_credits: Decimal,
    /// Absolute difference rounded to two decimals
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    #[schema(value_type = f64)]
    pub difference: Decimal,
    pub balanced: bool,
}

/// Sums debits and credits; the entry balances when they differ by less than 0.01.
///
/// Totals beyond the range of `Decimal` are a validation failure.
pub fn check_balance(lines: &[JournalLine]) -> Result<BalanceCheck, ServiceError> {
    let total_debits = checked_total(lines.iter().map(|l| l.debit_amount))?;
    let total_credits = checked_total(lines.iter().map(|l| l.credit_amount))?;
    let raw_difference = total_debits
        .checked_sub(total_credits)
        .ok_or_else(amounts_too_large)?
        .abs();

    Ok(BalanceCheck {
        total_debits,
        total_credits,
        difference: raw_difference.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        balanced: raw_difference < BALANCE_TOLERANCE,
    })
}

fn checked_total(mut amounts: impl Iterator<Item = Decimal>) -> Result<Decimal, ServiceError> {
    amounts.try_fold(Decimal::ZERO, |total, amount| {
        total.checked_add(amount).ok_or_else(amounts_too_large)
    })
}

fn amounts_too_large() -> ServiceError {
    ServiceError::ValidationError("journal line amounts are too large to total".to_string())
}

/// Indices of lines that carry both a debit and a credit, or neither.
///
/// Advisory only: such lines do not block submission.
pub fn one_sided_violations(lines: &[JournalLine]) -> Vec<usize> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.debit_amount.is_zero() == line.credit_amount.is_zero())
        .map(|(i, _)| i)
        .collect()
}

impl JournalEntry {
    pub fn balance(&self) -> Result<BalanceCheck, ServiceError> {
        check_balance(&self.lines)
    }

    /// Rejects entries whose debits and credits do not balance
    pub fn ensure_balanced(&self) -> Result<BalanceCheck, ServiceError> {
        let check = self.balance()?;
        if check.balanced {
            Ok(check)
        } else {
            Err(ServiceError::ValidationError(format!(
                "Journal entry must balance - debits must equal credits (difference GHS {:.2})",
                check.difference
            )))
        }
    }
}
