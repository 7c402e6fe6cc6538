//! PostgreSQL store adapter.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use wallet_types::{
    Account, AccountId, AccountStore, AccountTx, AppendOutcome, LedgerEntry, LedgerStore,
    OutboxRecord, OutboxStore, RepoError,
};

use crate::types::{DbAccount, DbLedgerEntry, DbOutboxRecord};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Store
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL store with row-level locking.
pub struct PostgresStore {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_accounts_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_outbox_pg.sql"),
        "0002",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0003_create_ledger_pg.sql"),
        "0003",
    )
    .await?;

    Ok(())
}

impl PostgresStore {
    /// Connects to a PostgreSQL database and runs migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AccountStore implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AccountStore for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<Self::Tx, RepoError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;
        Ok(PostgresTx { tx })
    }

    async fn create_account(&self, account: &Account) -> Result<(), RepoError> {
        let balances = serde_json::to_value(&account.balances)
            .map_err(|e| RepoError::Database(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO accounts (id, user_id, name, balances, version, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(account.id.into_uuid())
        .bind(account.user_id)
        .bind(&account.name)
        .bind(&balances)
        .bind(account.version)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepoError> {
        let row: Option<DbAccount> = sqlx::query_as(
            r#"SELECT id, user_id, name, balances, version, created_at FROM accounts WHERE id = $1"#,
        )
        .bind(id.into_uuid())
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

/// A scoped PostgreSQL transaction. Dropping without commit rolls back.
pub struct PostgresTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl AccountTx for PostgresTx {
    async fn lock_account(&mut self, id: AccountId) -> Result<Account, RepoError> {
        let row: Option<DbAccount> = sqlx::query_as(
            r#"SELECT id, user_id, name, balances, version, created_at FROM accounts
               WHERE id = $1 FOR UPDATE"#,
        )
        .bind(id.into_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }

    async fn fetch_account(&mut self, id: AccountId) -> Result<Account, RepoError> {
        let row: Option<DbAccount> = sqlx::query_as(
            r#"SELECT id, user_id, name, balances, version, created_at FROM accounts WHERE id = $1"#,
        )
        .bind(id.into_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }

    async fn update_balances(&mut self, account: &Account) -> Result<(), RepoError> {
        let balances = serde_json::to_value(&account.balances)
            .map_err(|e| RepoError::Database(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE accounts SET balances = $1, version = version + 1 WHERE id = $2"#,
        )
        .bind(&balances)
        .bind(account.id.into_uuid())
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
        let balances = serde_json::to_value(&account.balances)
            .map_err(|e| RepoError::Database(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE accounts SET balances = $1, version = version + 1
               WHERE id = $2 AND version = $3"#,
        )
        .bind(&balances)
        .bind(account.id.into_uuid())
        .bind(expected_version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_outbox(&mut self, record: &OutboxRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO outbox (id, aggregate_type, aggregate_id, event_type, payload, published, created_at)
               VALUES ($1, $2, $3, $4, $5, FALSE, $6)"#,
        )
        .bind(record.id)
        .bind(&record.aggregate_type)
        .bind(&record.aggregate_id)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(record.created_at)
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
impl OutboxStore for PostgresStore {
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRecord>, RepoError> {
        let rows: Vec<DbOutboxRecord> = sqlx::query_as(
            r#"SELECT id, aggregate_type, aggregate_id, event_type, payload, published, created_at, published_at
               FROM outbox
               WHERE published = FALSE
               ORDER BY created_at ASC, seq ASC
               LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbOutboxRecord::into_domain).collect()
    }

    async fn mark_published(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE outbox SET published = TRUE, published_at = $1
               WHERE id = $2 AND published = FALSE"#,
        )
        .bind(Utc::now())
        .bind(id)
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
impl LedgerStore for PostgresStore {
    async fn append(&self, entry: &LedgerEntry) -> Result<AppendOutcome, RepoError> {
        let result = sqlx::query(
            r#"INSERT INTO ledger_entries (id, payment_id, user_id, amount, currency, entry_type, description, idempotency_key, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(entry.id)
        .bind(entry.payment_id)
        .bind(entry.user_id)
        .bind(entry.amount)
        .bind(entry.currency.to_string())
        .bind(entry.entry_type.as_ref())
        .bind(&entry.description)
        .bind(&entry.idempotency_key)
        .bind(entry.created_at)
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
               WHERE user_id = $1
               ORDER BY created_at ASC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbLedgerEntry::into_domain).collect()
    }
}
