//! Request and receipt types for the service boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountId, Currency};

// ─────────────────────────────────────────────────────────────────────────────
// Account DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to open a new account at onboarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccountRequest {
    pub user_id: Uuid,
    pub name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to convert between two of an account's currency balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub account_id: AccountId,
    pub from: Currency,
    pub to: Currency,
    /// Amount to debit, in minor units of `from`.
    pub amount: i64,
}

/// Result of a completed conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReceipt {
    pub account_id: AccountId,
    pub from: Currency,
    pub to: Currency,
    /// Amount debited, in minor units of `from`.
    pub debited: i64,
    /// Amount credited after fees, in minor units of `to`.
    pub credited: i64,
    pub rate: f64,
    /// Fee charged, in minor units of `to`.
    pub fee: i64,
    /// The exchange's transaction reference for the executed leg.
    pub exchange_ref: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Deposit DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to deposit into one of an account's currency balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub account_id: AccountId,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: Currency,
    /// Optional external reference (e.g., an invoice number).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Result of a completed deposit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub account_id: AccountId,
    pub amount: i64,
    pub currency: Currency,
    /// Balance in `currency` after the deposit, in minor units.
    pub new_balance: i64,
}
