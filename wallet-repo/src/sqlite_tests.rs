//! SQLite store integration tests.

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use wallet_types::{
        Account, AccountId, AccountStore, AccountTx, AppendOutcome, BalanceEvent, Currency,
        LedgerEntry, LedgerStore, Money, OutboxRecord, OutboxStore, RepoError, event_types,
    };

    use crate::SqliteStore;

    async fn setup_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    async fn seeded_account(store: &SqliteStore, amount: i64, currency: Currency) -> Account {
        let mut account = Account::new(Uuid::new_v4(), "Test Account".to_string()).unwrap();
        account.credit(Money::new(amount, currency).unwrap());
        store.create_account(&account).await.unwrap();
        account
    }

    fn deposit_record(account: &Account, amount: i64) -> OutboxRecord {
        let event = BalanceEvent::account_event(
            account.id,
            account.user_id,
            event_types::DEPOSIT_COMPLETED,
            amount,
            Currency::USD,
        );
        OutboxRecord::for_event(&event).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let store = setup_store().await;
        let account = seeded_account(&store, 1000, Currency::USD).await;

        let fetched = store.get_account(account.id).await.unwrap().unwrap();

        assert_eq!(fetched.id, account.id);
        assert_eq!(fetched.user_id, account.user_id);
        assert_eq!(fetched.balance(Currency::USD), 1000);
        assert_eq!(fetched.version, 0);
    }

    #[tokio::test]
    async fn test_get_account_not_found() {
        let store = setup_store().await;

        let result = store.get_account(AccountId::new()).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_accounts() {
        let store = setup_store().await;
        seeded_account(&store, 100, Currency::USD).await;
        seeded_account(&store, 200, Currency::EUR).await;

        let accounts = store.list_accounts().await.unwrap();

        assert_eq!(accounts.len(), 2);
    }

    #[tokio::test]
    async fn test_lock_update_commit_bumps_version() {
        let store = setup_store().await;
        let account = seeded_account(&store, 1000, Currency::USD).await;

        let mut tx = store.begin().await.unwrap();
        let mut locked = tx.lock_account(account.id).await.unwrap();
        locked
            .debit(Money::new(300, Currency::USD).unwrap())
            .unwrap();
        tx.update_balances(&locked).await.unwrap();
        tx.commit().await.unwrap();

        let updated = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(updated.balance(Currency::USD), 700);
        assert_eq!(updated.version, 1);
    }

    #[tokio::test]
    async fn test_lock_account_not_found() {
        let store = setup_store().await;

        let mut tx = store.begin().await.unwrap();
        let result = tx.lock_account(AccountId::new()).await;
        tx.rollback().await.unwrap();

        assert!(matches!(result, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_rollback_discards_balance_and_outbox() {
        let store = setup_store().await;
        let account = seeded_account(&store, 1000, Currency::USD).await;

        let mut tx = store.begin().await.unwrap();
        let mut locked = tx.lock_account(account.id).await.unwrap();
        locked
            .debit(Money::new(500, Currency::USD).unwrap())
            .unwrap();
        tx.update_balances(&locked).await.unwrap();
        tx.insert_outbox(&deposit_record(&account, -500)).await.unwrap();
        tx.rollback().await.unwrap();

        let unchanged = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(unchanged.balance(Currency::USD), 1000);
        assert_eq!(unchanged.version, 0);

        let pending = store.fetch_unpublished(10).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_checked_update_applies_on_matching_version() {
        let store = setup_store().await;
        let account = seeded_account(&store, 1000, Currency::USD).await;

        let mut read = store.get_account(account.id).await.unwrap().unwrap();
        read.credit(Money::new(250, Currency::USD).unwrap());

        let mut tx = store.begin().await.unwrap();
        let applied = tx.update_balances_checked(&read, read.version).await.unwrap();
        tx.commit().await.unwrap();

        assert!(applied);
        let updated = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(updated.balance(Currency::USD), 1250);
        assert_eq!(updated.version, 1);
    }

    #[tokio::test]
    async fn test_checked_update_refuses_stale_version() {
        let store = setup_store().await;
        let account = seeded_account(&store, 1000, Currency::USD).await;

        // Capture state at version 0.
        let mut stale = store.get_account(account.id).await.unwrap().unwrap();

        // Someone else commits first, moving the row to version 1.
        let mut tx = store.begin().await.unwrap();
        let mut locked = tx.lock_account(account.id).await.unwrap();
        locked
            .debit(Money::new(100, Currency::USD).unwrap())
            .unwrap();
        tx.update_balances(&locked).await.unwrap();
        tx.commit().await.unwrap();

        stale.credit(Money::new(9999, Currency::USD).unwrap());

        let mut tx = store.begin().await.unwrap();
        let applied = tx
            .update_balances_checked(&stale, stale.version)
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(!applied);
        let current = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(current.balance(Currency::USD), 900);
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn test_outbox_fetch_order_and_conditional_flip() {
        let store = setup_store().await;
        let account = seeded_account(&store, 1000, Currency::USD).await;

        let first = deposit_record(&account, 100);
        let second = deposit_record(&account, 200);

        let mut tx = store.begin().await.unwrap();
        tx.insert_outbox(&first).await.unwrap();
        tx.insert_outbox(&second).await.unwrap();
        tx.commit().await.unwrap();

        let pending = store.fetch_unpublished(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[1].id, second.id);
        assert!(!pending[0].published);

        // Only the first flip wins.
        assert!(store.mark_published(first.id).await.unwrap());
        assert!(!store.mark_published(first.id).await.unwrap());

        let pending = store.fetch_unpublished(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
    }

    #[tokio::test]
    async fn test_fetch_unpublished_respects_limit() {
        let store = setup_store().await;
        let account = seeded_account(&store, 1000, Currency::USD).await;

        let mut tx = store.begin().await.unwrap();
        for i in 0..5 {
            tx.insert_outbox(&deposit_record(&account, i)).await.unwrap();
        }
        tx.commit().await.unwrap();

        let pending = store.fetch_unpublished(3).await.unwrap();
        assert_eq!(pending.len(), 3);
    }

    #[tokio::test]
    async fn test_ledger_append_and_duplicate() {
        let store = setup_store().await;
        let user_id = Uuid::new_v4();

        let event = BalanceEvent::account_event(
            AccountId::new(),
            user_id,
            event_types::DEPOSIT_COMPLETED,
            500,
            Currency::USD,
        );
        let entry = LedgerEntry::from_event(&event).unwrap();

        let outcome = store.append(&entry).await.unwrap();
        assert_eq!(outcome, AppendOutcome::Inserted);

        // Same event projected again: new row id, same idempotency key.
        let mut replay = LedgerEntry::from_event(&event).unwrap();
        replay.id = Uuid::new_v4();
        let outcome = store.append(&replay).await.unwrap();
        assert_eq!(outcome, AppendOutcome::Duplicate);

        let entries = store.entries_for_user(user_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 500);
        assert_eq!(entries[0].idempotency_key, event.event_id.to_string());
    }

    #[tokio::test]
    async fn test_entries_for_user_scoped_and_ordered() {
        let store = setup_store().await;
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        for (user, amount) in [(user_a, 100), (user_a, -40), (user_b, 999)] {
            let event = BalanceEvent::account_event(
                AccountId::new(),
                user,
                event_types::DEPOSIT_COMPLETED,
                amount,
                Currency::NGN,
            );
            let entry = LedgerEntry::from_event(&event).unwrap();
            assert_eq!(store.append(&entry).await.unwrap(), AppendOutcome::Inserted);
        }

        let entries = store.entries_for_user(user_a).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].amount, 100);
        assert_eq!(entries[1].amount, -40);
    }
}
