//! SQLite store adapter.
//!
//! SQLite has no row-level `FOR UPDATE`; `lock_account` escalates the
//! transaction to the database write lock with a no-op update before
//! reading, which serializes concurrent writers on the whole file. The
//! pool is capped at one connection so writers queue instead of hitting
//! SQLITE_BUSY.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

use wallet_types::{
    Account, AccountId, AccountStore, AccountTx, AppendOutcome, LedgerEntry, LedgerStore,
    OutboxRecord, OutboxStore, RepoError,
};

use crate::types::{DbAccount, DbLedgerEntry, DbOutboxRecord};

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Store
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite store implementation.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects to a SQLite database and runs migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            // Remove query parameters
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // Single connection: one writer at a time, waiters queue in the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        for ddl in [
            include_str!("../migrations/0001_create_accounts.sql"),
            include_str!("../migrations/0002_create_outbox.sql"),
            include_str!("../migrations/0003_create_ledger.sql"),
        ] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AccountStore implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AccountStore for SqliteStore {
    type Tx = SqliteTx;

    async fn begin(&self) -> Result<Self::Tx, RepoError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;
        Ok(SqliteTx { tx })
    }

    async fn create_account(&self, account: &Account) -> Result<(), RepoError> {
        let balances = serde_json::to_string(&account.balances)
            .map_err(|e| RepoError::Database(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO accounts (id, user_id, name, balances, version, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(account.id.to_string())
        .bind(account.user_id.to_string())
        .bind(&account.name)
        .bind(&balances)
        .bind(account.version)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepoError> {
        let row: Option<DbAccount> = sqlx::query_as(
            r#"SELECT id, user_id, name, balances, version, created_at FROM accounts WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbAccount::into_domain).transpose()
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, RepoError> {
        let rows: Vec<DbAccount> = sqlx::query_as(
            r#"SELECT id, user_id, name, balances, version, created_at FROM accounts
               ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbAccount::into_domain).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction handle
// ─────────────────────────────────────────────────────────────────────────────

/// A scoped SQLite transaction. Dropping without commit rolls back.
pub struct SqliteTx {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl AccountTx for SqliteTx {
    async fn lock_account(&mut self, id: AccountId) -> Result<Account, RepoError> {
        // No-op update takes the write lock before we read, so the state we
        // return cannot change under us for the rest of the transaction.
        let result = sqlx::query(r#"UPDATE accounts SET version = version WHERE id = ?"#)
            .bind(id.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        self.fetch_account(id).await
    }

    async fn fetch_account(&mut self, id: AccountId) -> Result<Account, RepoError> {
        let row: Option<DbAccount> = sqlx::query_as(
            r#"SELECT id, user_id, name, balances, version, created_at FROM accounts WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }

    async fn update_balances(&mut self, account: &Account) -> Result<(), RepoError> {
        let balances = serde_json::to_string(&account.balances)
            .map_err(|e| RepoError::Database(e.to_string()))?;

        let result =
            sqlx::query(r#"UPDATE accounts SET balances = ?, version = version + 1 WHERE id = ?"#)
                .bind(&balances)
                .bind(account.id.to_string())
                .execute(&mut *self.tx)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn update_balances_checked(
        &mut self,
        account: &Account,
        expected_version: i64,
    ) -> Result<bool, RepoError> {
        let balances = serde_json::to_string(&account.balances)
            .map_err(|e| RepoError::Database(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE accounts SET balances = ?, version = version + 1
               WHERE id = ? AND version = ?"#,
        )
        .bind(&balances)
        .bind(account.id.to_string())
        .bind(expected_version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_outbox(&mut self, record: &OutboxRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO outbox (id, aggregate_type, aggregate_id, event_type, payload, published, created_at)
               VALUES (?, ?, ?, ?, ?, 0, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.aggregate_type)
        .bind(&record.aggregate_id)
        .bind(&record.event_type)
        .bind(record.payload.to_string())
        .bind(record.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn commit(self) -> Result<(), RepoError> {
        self.tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))
    }

    async fn rollback(self) -> Result<(), RepoError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OutboxStore implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl OutboxStore for SqliteStore {
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRecord>, RepoError> {
        let rows: Vec<DbOutboxRecord> = sqlx::query_as(
            r#"SELECT id, aggregate_type, aggregate_id, event_type, payload, published, created_at, published_at
               FROM outbox
               WHERE published = 0
               ORDER BY created_at ASC, rowid ASC
               LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbOutboxRecord::into_domain).collect()
    }

    async fn mark_published(&self, id: Uuid) -> Result<bool, RepoError> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"UPDATE outbox SET published = 1, published_at = ?
               WHERE id = ? AND published = 0"#,
        )
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LedgerStore implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn append(&self, entry: &LedgerEntry) -> Result<AppendOutcome, RepoError> {
        let result = sqlx::query(
            r#"INSERT INTO ledger_entries (id, payment_id, user_id, amount, currency, entry_type, description, idempotency_key, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.payment_id.to_string())
        .bind(entry.user_id.to_string())
        .bind(entry.amount)
        .bind(entry.currency.to_string())
        .bind(entry.entry_type.as_ref())
        .bind(&entry.description)
        .bind(&entry.idempotency_key)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(AppendOutcome::Inserted),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(AppendOutcome::Duplicate)
            }
            Err(e) => Err(RepoError::Database(e.to_string())),
        }
    }

    async fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, RepoError> {
        let rows: Vec<DbLedgerEntry> = sqlx::query_as(
            r#"SELECT id, payment_id, user_id, amount, currency, entry_type, description, idempotency_key, created_at
               FROM ledger_entries
               WHERE user_id = ?
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbLedgerEntry::into_domain).collect()
    }
}
