//! Shared database types with feature-gated fields for SQLite and PostgreSQL.

use sqlx::FromRow;

use wallet_types::{
    Account, AccountId, Balances, Currency, LedgerEntry, LedgerEntryType, OutboxRecord, RepoError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Feature-gated imports
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(feature = "sqlite"))]
use chrono::{DateTime, Utc};
#[cfg(not(feature = "sqlite"))]
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// Account row from database.
#[derive(FromRow)]
pub struct DbAccount {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    pub name: String,

    #[cfg(not(feature = "sqlite"))]
    pub balances: serde_json::Value,
    #[cfg(feature = "sqlite")]
    pub balances: String,

    pub version: i64,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,
}

/// Outbox row from database.
#[derive(FromRow)]
pub struct DbOutboxRecord {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,

    #[cfg(not(feature = "sqlite"))]
    pub payload: serde_json::Value,
    #[cfg(feature = "sqlite")]
    pub payload: String,

    #[cfg(not(feature = "sqlite"))]
    pub published: bool,
    #[cfg(feature = "sqlite")]
    pub published: i64,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub published_at: Option<DateTime<Utc>>,
    #[cfg(feature = "sqlite")]
    pub published_at: Option<String>,
}

/// Ledger entry row from database.
#[derive(FromRow)]
pub struct DbLedgerEntry {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    #[cfg(not(feature = "sqlite"))]
    pub payment_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub payment_id: String,

    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    pub amount: i64,
    pub currency: String,
    pub entry_type: String,
    pub description: String,
    pub idempotency_key: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_currency(s: &str) -> Result<Currency, RepoError> {
    s.parse::<Currency>()
        .map_err(|_| RepoError::Database(format!("Unknown currency: {}", s)))
}

pub fn parse_entry_type(s: &str) -> Result<LedgerEntryType, RepoError> {
    match s {
        "CONVERSION_DEBIT" => Ok(LedgerEntryType::ConversionDebit),
        "CONVERSION_CREDIT" => Ok(LedgerEntryType::ConversionCredit),
        "DEPOSIT" => Ok(LedgerEntryType::Deposit),
        _ => Err(RepoError::Database(format!("Unknown entry type: {}", s))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain conversion (feature-gated implementations)
// ─────────────────────────────────────────────────────────────────────────────

impl DbAccount {
    /// Convert database row to domain Account.
    pub fn into_domain(self) -> Result<Account, RepoError> {
        #[cfg(not(feature = "sqlite"))]
        let (id, user_id, balances, created_at) = {
            let balances: Balances = serde_json::from_value(self.balances)
                .map_err(|e| RepoError::Database(e.to_string()))?;
            (
                AccountId::from_uuid(self.id),
                self.user_id,
                balances,
                self.created_at,
            )
        };

        #[cfg(feature = "sqlite")]
        let (id, user_id, balances, created_at) = {
            let uuid =
                uuid::Uuid::parse_str(&self.id).map_err(|e| RepoError::Database(e.to_string()))?;

            let user_id = uuid::Uuid::parse_str(&self.user_id)
                .map_err(|e| RepoError::Database(e.to_string()))?;

            let balances: Balances = serde_json::from_str(&self.balances)
                .map_err(|e| RepoError::Database(e.to_string()))?;

            let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
                .map_err(|e| RepoError::Database(e.to_string()))?
                .with_timezone(&chrono::Utc);

            (AccountId::from_uuid(uuid), user_id, balances, created_at)
        };

        Ok(Account::from_parts(
            id,
            user_id,
            self.name,
            balances,
            self.version,
            created_at,
        ))
    }
}

impl DbOutboxRecord {
    /// Convert database row to domain OutboxRecord.
    pub fn into_domain(self) -> Result<OutboxRecord, RepoError> {
        #[cfg(not(feature = "sqlite"))]
        let (id, payload, published, created_at, published_at) = (
            self.id,
            self.payload,
            self.published,
            self.created_at,
            self.published_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, payload, published, created_at, published_at) = {
            let uuid =
                uuid::Uuid::parse_str(&self.id).map_err(|e| RepoError::Database(e.to_string()))?;

            let payload: serde_json::Value = serde_json::from_str(&self.payload)
                .map_err(|e| RepoError::Database(e.to_string()))?;

            let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
                .map_err(|e| RepoError::Database(e.to_string()))?
                .with_timezone(&chrono::Utc);

            let published_at = match self.published_at {
                Some(s) => Some(
                    chrono::DateTime::parse_from_rfc3339(&s)
                        .map_err(|e| RepoError::Database(e.to_string()))?
                        .with_timezone(&chrono::Utc),
                ),
                None => None,
            };

            (uuid, payload, self.published != 0, created_at, published_at)
        };

        Ok(OutboxRecord {
            id,
            aggregate_type: self.aggregate_type,
            aggregate_id: self.aggregate_id,
            event_type: self.event_type,
            payload,
            published,
            created_at,
            published_at,
        })
    }
}

impl DbLedgerEntry {
    /// Convert database row to domain LedgerEntry.
    pub fn into_domain(self) -> Result<LedgerEntry, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let entry_type = parse_entry_type(&self.entry_type)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, payment_id, user_id, created_at) =
            (self.id, self.payment_id, self.user_id, self.created_at);

        #[cfg(feature = "sqlite")]
        let (id, payment_id, user_id, created_at) = {
            let uuid =
                uuid::Uuid::parse_str(&self.id).map_err(|e| RepoError::Database(e.to_string()))?;

            let payment_id = uuid::Uuid::parse_str(&self.payment_id)
                .map_err(|e| RepoError::Database(e.to_string()))?;

            let user_id = uuid::Uuid::parse_str(&self.user_id)
                .map_err(|e| RepoError::Database(e.to_string()))?;

            let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
                .map_err(|e| RepoError::Database(e.to_string()))?
                .with_timezone(&chrono::Utc);

            (uuid, payment_id, user_id, created_at)
        };

        Ok(LedgerEntry::from_parts(
            id,
            payment_id,
            user_id,
            self.amount,
            currency,
            entry_type,
            self.description,
            self.idempotency_key,
            created_at,
        ))
    }
}
