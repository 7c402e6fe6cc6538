//! WalletService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::OwnedMutexGuard;
    use uuid::Uuid;

    use wallet_types::{
        Account, AccountId, AccountStore, AccountTx, BalanceEvent, ConvertRequest, CoreError,
        Currency, DepositRequest, OpenAccountRequest, OutboxRecord, RepoError, event_types,
    };

    use crate::exchange::SimExchange;
    use crate::service::WalletService;

    // ─────────────────────────────────────────────────────────────────────────
    // In-memory store
    // ─────────────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct MockInner {
        accounts: HashMap<AccountId, Account>,
        outbox: Vec<OutboxRecord>,
    }

    /// Simple in-memory store for testing the service layer.
    ///
    /// Writes are staged on the transaction handle and only land in the
    /// shared state at commit, so rollback paths are observable. The
    /// `bump_version_before_checked` flag simulates a concurrent commit
    /// landing between the optimistic read and the conditional write.
    #[derive(Clone)]
    pub struct MockStore {
        inner: Arc<Mutex<MockInner>>,
        locks: Arc<Mutex<HashMap<AccountId, Arc<tokio::sync::Mutex<()>>>>>,
        bump_version_before_checked: Arc<AtomicBool>,
    }

    impl MockStore {
        pub fn new() -> Self {
            Self {
                inner: Arc::new(Mutex::new(MockInner::default())),
                locks: Arc::new(Mutex::new(HashMap::new())),
                bump_version_before_checked: Arc::new(AtomicBool::new(false)),
            }
        }

        fn force_conflict(&self) {
            self.bump_version_before_checked.store(true, Ordering::SeqCst);
        }

        fn account(&self, id: AccountId) -> Account {
            self.inner.lock().unwrap().accounts[&id].clone()
        }

        fn outbox(&self) -> Vec<OutboxRecord> {
            self.inner.lock().unwrap().outbox.clone()
        }

        fn lock_for(&self, id: AccountId) -> Arc<tokio::sync::Mutex<()>> {
            self.locks
                .lock()
                .unwrap()
                .entry(id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        }
    }

    pub struct MockTx {
        inner: Arc<Mutex<MockInner>>,
        store: MockStore,
        guards: Vec<OwnedMutexGuard<()>>,
        staged_accounts: Vec<Account>,
        staged_outbox: Vec<OutboxRecord>,
    }

    #[async_trait]
    impl AccountStore for MockStore {
        type Tx = MockTx;

        async fn begin(&self) -> Result<Self::Tx, RepoError> {
            Ok(MockTx {
                inner: Arc::clone(&self.inner),
                store: self.clone(),
                guards: Vec::new(),
                staged_accounts: Vec::new(),
                staged_outbox: Vec::new(),
            })
        }

        async fn create_account(&self, account: &Account) -> Result<(), RepoError> {
            self.inner
                .lock()
                .unwrap()
                .accounts
                .insert(account.id, account.clone());
            Ok(())
        }

        async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepoError> {
            Ok(self.inner.lock().unwrap().accounts.get(&id).cloned())
        }

        async fn list_accounts(&self) -> Result<Vec<Account>, RepoError> {
            Ok(self.inner.lock().unwrap().accounts.values().cloned().collect())
        }
    }

    #[async_trait]
    impl AccountTx for MockTx {
        async fn lock_account(&mut self, id: AccountId) -> Result<Account, RepoError> {
            let lock = self.store.lock_for(id);
            self.guards.push(lock.lock_owned().await);
            self.fetch_account(id).await
        }

        async fn fetch_account(&mut self, id: AccountId) -> Result<Account, RepoError> {
            self.inner
                .lock()
                .unwrap()
                .accounts
                .get(&id)
                .cloned()
                .ok_or(RepoError::NotFound)
        }

        async fn update_balances(&mut self, account: &Account) -> Result<(), RepoError> {
            let mut updated = account.clone();
            updated.version += 1;
            self.staged_accounts.push(updated);
            Ok(())
        }

        async fn update_balances_checked(
            &mut self,
            account: &Account,
            expected_version: i64,
        ) -> Result<bool, RepoError> {
            if self
                .store
                .bump_version_before_checked
                .swap(false, Ordering::SeqCst)
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(stored) = inner.accounts.get_mut(&account.id) {
                    stored.version += 1;
                }
            }

            let current = self
                .inner
                .lock()
                .unwrap()
                .accounts
                .get(&account.id)
                .map(|a| a.version)
                .ok_or(RepoError::NotFound)?;

            if current != expected_version {
                return Ok(false);
            }

            let mut updated = account.clone();
            updated.version = expected_version + 1;
            self.staged_accounts.push(updated);
            Ok(true)
        }

        async fn insert_outbox(&mut self, record: &OutboxRecord) -> Result<(), RepoError> {
            self.staged_outbox.push(record.clone());
            Ok(())
        }

        async fn commit(self) -> Result<(), RepoError> {
            let mut inner = self.inner.lock().unwrap();
            for account in self.staged_accounts {
                inner.accounts.insert(account.id, account);
            }
            inner.outbox.extend(self.staged_outbox);
            Ok(())
        }

        async fn rollback(self) -> Result<(), RepoError> {
            Ok(())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn service() -> (WalletService<MockStore, SimExchange>, MockStore) {
        fx_rates::disable_fluctuation();
        let store = MockStore::new();
        let exchange = SimExchange::new(Duration::from_secs(30), 50);
        (WalletService::new(store.clone(), exchange), store)
    }

    async fn seeded(
        service: &WalletService<MockStore, SimExchange>,
        amount: i64,
        currency: Currency,
    ) -> Account {
        let account = service
            .open_account(OpenAccountRequest {
                user_id: Uuid::new_v4(),
                name: "Test Wallet".to_string(),
            })
            .await
            .unwrap();

        service
            .deposit(DepositRequest {
                account_id: account.id,
                amount,
                currency,
                reference: None,
            })
            .await
            .unwrap();

        account
    }

    fn payload_event(record: &OutboxRecord) -> BalanceEvent {
        serde_json::from_value(record.payload.clone()).unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts and deposits
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_open_account_rejects_empty_name() {
        let (service, _) = service();
        let result = service
            .open_account(OpenAccountRequest {
                user_id: Uuid::new_v4(),
                name: "   ".to_string(),
            })
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_account_not_found() {
        let (service, _) = service();
        let result = service.get_account(AccountId::new()).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deposit_credits_and_writes_outbox() {
        let (service, store) = service();
        let account = seeded(&service, 50_000, Currency::USD).await;

        let stored = store.account(account.id);
        assert_eq!(stored.balance(Currency::USD), 50_000);
        assert_eq!(stored.version, 1);

        let outbox = store.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].event_type, event_types::DEPOSIT_COMPLETED);
        let event = payload_event(&outbox[0]);
        assert_eq!(event.amount, 50_000);
        assert_eq!(event.currency, Currency::USD);
    }

    #[tokio::test]
    async fn test_deposit_rejects_non_positive_amount() {
        let (service, _) = service();
        let result = service
            .deposit(DepositRequest {
                account_id: AccountId::new(),
                amount: 0,
                currency: Currency::USD,
                reference: None,
            })
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pessimistic conversion
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_convert_moves_both_balances_atomically() {
        let (service, store) = service();
        let account = seeded(&service, 10_000, Currency::USD).await;

        let receipt = service
            .convert(ConvertRequest {
                account_id: account.id,
                from: Currency::USD,
                to: Currency::NGN,
                amount: 10_000,
            })
            .await
            .unwrap();

        assert_eq!(receipt.debited, 10_000);
        assert!(receipt.credited > 0);
        assert!(receipt.fee > 0);

        let stored = store.account(account.id);
        assert_eq!(stored.balance(Currency::USD), 0);
        assert_eq!(stored.balance(Currency::NGN), receipt.credited);
        assert_eq!(stored.version, 2);

        // Deposit event plus the debit/credit pair, in order.
        let outbox = store.outbox();
        assert_eq!(outbox.len(), 3);
        assert_eq!(outbox[1].event_type, event_types::CONVERSION_DEBITED);
        assert_eq!(outbox[2].event_type, event_types::CONVERSION_CREDITED);
        assert_eq!(payload_event(&outbox[1]).amount, -10_000);
        assert_eq!(payload_event(&outbox[2]).amount, receipt.credited);
    }

    #[tokio::test]
    async fn test_convert_insufficient_funds_changes_nothing() {
        let (service, store) = service();
        let account = seeded(&service, 1_000, Currency::USD).await;

        let result = service
            .convert(ConvertRequest {
                account_id: account.id,
                from: Currency::USD,
                to: Currency::EUR,
                amount: 5_000,
            })
            .await;

        assert!(matches!(
            result,
            Err(CoreError::InsufficientFunds {
                available: 1_000,
                requested: 5_000,
                ..
            })
        ));

        let stored = store.account(account.id);
        assert_eq!(stored.balance(Currency::USD), 1_000);
        assert_eq!(stored.balance(Currency::EUR), 0);
        assert_eq!(store.outbox().len(), 1);
    }

    #[tokio::test]
    async fn test_convert_rejects_same_currency() {
        let (service, _) = service();
        let result = service
            .convert(ConvertRequest {
                account_id: AccountId::new(),
                from: Currency::USD,
                to: Currency::USD,
                amount: 100,
            })
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_convert_execution_failure_rolls_back() {
        fx_rates::disable_fluctuation();
        let store = MockStore::new();
        let exchange = SimExchange::new(Duration::from_secs(30), 50);
        exchange.fail_next_execute();
        let service = WalletService::new(store.clone(), exchange);

        let account = seeded(&service, 10_000, Currency::USD).await;

        let result = service
            .convert(ConvertRequest {
                account_id: account.id,
                from: Currency::USD,
                to: Currency::NGN,
                amount: 2_000,
            })
            .await;

        assert!(matches!(result, Err(CoreError::ExchangeUnavailable(_))));

        let stored = store.account(account.id);
        assert_eq!(stored.balance(Currency::USD), 10_000);
        assert_eq!(stored.balance(Currency::NGN), 0);
        assert_eq!(store.outbox().len(), 1);
    }

    #[tokio::test]
    async fn test_convert_exchange_down_fails_before_any_change() {
        fx_rates::disable_fluctuation();
        let store = MockStore::new();
        let exchange = SimExchange::new(Duration::from_secs(30), 50);
        let service = WalletService::new(store.clone(), exchange);

        let account = seeded(&service, 10_000, Currency::USD).await;

        // Same store, offline exchange.
        let exchange = SimExchange::new(Duration::from_secs(30), 50);
        exchange.set_available(false);
        let service = WalletService::new(store.clone(), exchange);

        let result = service
            .convert(ConvertRequest {
                account_id: account.id,
                from: Currency::USD,
                to: Currency::NGN,
                amount: 2_000,
            })
            .await;

        assert!(matches!(result, Err(CoreError::ExchangeUnavailable(_))));
        assert_eq!(store.account(account.id).balance(Currency::USD), 10_000);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Optimistic conversion
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_optimistic_convert_applies_on_clean_version() {
        let (service, store) = service();
        let account = seeded(&service, 10_000, Currency::USD).await;

        let receipt = service
            .convert_optimistic(ConvertRequest {
                account_id: account.id,
                from: Currency::USD,
                to: Currency::GBP,
                amount: 4_000,
            })
            .await
            .unwrap();

        let stored = store.account(account.id);
        assert_eq!(stored.balance(Currency::USD), 6_000);
        assert_eq!(stored.balance(Currency::GBP), receipt.credited);
        assert_eq!(stored.version, 2);
        assert_eq!(store.outbox().len(), 3);
    }

    #[tokio::test]
    async fn test_optimistic_conflict_fails_closed() {
        let (service, store) = service();
        let account = seeded(&service, 10_000, Currency::USD).await;
        store.force_conflict();

        let result = service
            .convert_optimistic(ConvertRequest {
                account_id: account.id,
                from: Currency::USD,
                to: Currency::NGN,
                amount: 3_000,
            })
            .await;

        assert!(matches!(result, Err(CoreError::ConcurrencyConflict)));

        // Balances untouched, no conversion events escaped.
        let stored = store.account(account.id);
        assert_eq!(stored.balance(Currency::USD), 10_000);
        assert_eq!(stored.balance(Currency::NGN), 0);
        assert_eq!(store.outbox().len(), 1);
    }
}
