//! Persistence ports.
//!
//! These are the primary ports in our hexagonal architecture.
//! Adapters (Postgres, SQLite, in-memory mocks) implement these traits.

use crate::domain::{Account, AccountId, LedgerEntry, OutboxRecord};
use crate::error::RepoError;
use uuid::Uuid;

/// Store for accounts and their outbox, with an explicit scoped transaction.
///
/// All balance mutations go through an [`AccountTx`] so the balance change
/// and its outbox record commit or roll back together.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync + 'static {
    type Tx: AccountTx;

    /// Opens a scoped transaction against the store.
    async fn begin(&self) -> Result<Self::Tx, RepoError>;

    /// Creates a new account with empty balances.
    async fn create_account(&self, account: &Account) -> Result<(), RepoError>;

    /// Gets an account by ID (plain read, no lock).
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepoError>;

    /// Lists all accounts.
    async fn list_accounts(&self) -> Result<Vec<Account>, RepoError>;
}

/// A scoped transaction handle.
///
/// Commit or roll back at exactly one boundary; dropping the handle without
/// committing rolls back, so every exit path releases the lock.
#[async_trait::async_trait]
pub trait AccountTx: Send {
    /// Locking read: acquires the row's exclusive lock for the remainder of
    /// the transaction, then returns the current state. Concurrent callers
    /// on the same account block until this transaction completes.
    async fn lock_account(&mut self, id: AccountId) -> Result<Account, RepoError>;

    /// Plain read inside the transaction, for the optimistic path. Captures
    /// the version counter but takes no lock.
    async fn fetch_account(&mut self, id: AccountId) -> Result<Account, RepoError>;

    /// Writes the account's balances and bumps the version by 1.
    /// Callers must hold the row lock (pessimistic path).
    async fn update_balances(&mut self, account: &Account) -> Result<(), RepoError>;

    /// Conditional write: applies the balances and bumps the version only if
    /// the stored version still equals `expected_version`. Returns whether
    /// the write applied (optimistic path).
    async fn update_balances_checked(
        &mut self,
        account: &Account,
        expected_version: i64,
    ) -> Result<bool, RepoError>;

    /// Appends an outbox record in this transaction.
    async fn insert_outbox(&mut self, record: &OutboxRecord) -> Result<(), RepoError>;

    /// Commits every write made through this handle atomically.
    async fn commit(self) -> Result<(), RepoError>;

    /// Discards every write made through this handle.
    async fn rollback(self) -> Result<(), RepoError>;
}

/// Read/flip access to the outbox, used by the relay.
#[async_trait::async_trait]
pub trait OutboxStore: Send + Sync + 'static {
    /// Unpublished records in creation order, bounded by `limit`.
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRecord>, RepoError>;

    /// Flips `published` to true and stamps `published_at`, conditional on
    /// the record still being unpublished. Returns whether this caller won
    /// the flip; a false return means another relay instance already did.
    async fn mark_published(&self, id: Uuid) -> Result<bool, RepoError>;
}

/// Outcome of a ledger append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry is now part of the audit trail.
    Inserted,
    /// An entry with this idempotency key already exists; the event was
    /// applied before. Not an error.
    Duplicate,
}

/// Append-only access to the audit ledger, used by the projector.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Inserts the entry in a single atomic write. A uniqueness violation on
    /// the idempotency key maps to [`AppendOutcome::Duplicate`].
    async fn append(&self, entry: &LedgerEntry) -> Result<AppendOutcome, RepoError>;

    /// Entries for a user in creation order.
    async fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, RepoError>;
}

// Shared-store impls: one adapter instance can back the conversion engine,
// the relay, and the projector at once.

#[async_trait::async_trait]
impl<S: AccountStore> AccountStore for std::sync::Arc<S> {
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, RepoError> {
        (**self).begin().await
    }

    async fn create_account(&self, account: &Account) -> Result<(), RepoError> {
        (**self).create_account(account).await
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepoError> {
        (**self).get_account(id).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, RepoError> {
        (**self).list_accounts().await
    }
}

#[async_trait::async_trait]
impl<S: OutboxStore> OutboxStore for std::sync::Arc<S> {
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxRecord>, RepoError> {
        (**self).fetch_unpublished(limit).await
    }

    async fn mark_published(&self, id: Uuid) -> Result<bool, RepoError> {
        (**self).mark_published(id).await
    }
}

#[async_trait::async_trait]
impl<S: LedgerStore> LedgerStore for std::sync::Arc<S> {
    async fn append(&self, entry: &LedgerEntry) -> Result<AppendOutcome, RepoError> {
        (**self).append(entry).await
    }

    async fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, RepoError> {
        (**self).entries_for_user(user_id).await
    }
}
