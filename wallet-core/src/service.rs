//! Wallet application service.
//!
//! Orchestrates balance mutations through the store and exchange ports.
//! Every balance change and its outbox record commit in one store
//! transaction; the external exchange leg runs inside the operation but
//! outside the store's atomicity, so the engine only commits after a
//! confirmed execution and rolls everything back otherwise.

use tracing::{error, info, warn};

use wallet_types::{
    Account, AccountId, AccountStore, AccountTx, BalanceEvent, ConversionReceipt, ConvertRequest,
    CoreError, DepositReceipt, DepositRequest, ExchangeApi, Money, OpenAccountRequest,
    OutboxRecord, Quote, event_types,
};

/// Application service for wallet operations.
///
/// Generic over the store and exchange ports - adapters are injected at
/// compile time, so tests run against in-memory fakes with no code changes.
pub struct WalletService<S: AccountStore, X: ExchangeApi> {
    store: S,
    exchange: X,
}

impl<S: AccountStore, X: ExchangeApi> WalletService<S, X> {
    pub fn new(store: S, exchange: X) -> Self {
        Self { store, exchange }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Account Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Opens a new account with empty balances.
    pub async fn open_account(&self, req: OpenAccountRequest) -> Result<Account, CoreError> {
        let account = Account::new(req.user_id, req.name)?;
        self.store.create_account(&account).await?;
        info!(account_id = %account.id, user_id = %account.user_id, "account opened");
        Ok(account)
    }

    /// Gets an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, CoreError> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Account {}", id)))
    }

    /// Lists all accounts.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, CoreError> {
        self.store.list_accounts().await.map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Deposits
    // ─────────────────────────────────────────────────────────────────────────

    /// Deposits into one of an account's currency balances.
    ///
    /// The credit and its outbox record commit atomically.
    pub async fn deposit(&self, req: DepositRequest) -> Result<DepositReceipt, CoreError> {
        if req.amount <= 0 {
            return Err(CoreError::Validation("Amount must be positive".into()));
        }

        let money = Money::new(req.amount, req.currency)?;

        let mut tx = self.store.begin().await?;
        let mut account = tx.lock_account(req.account_id).await?;

        account.credit(money);
        tx.update_balances(&account).await?;

        let event = BalanceEvent::account_event(
            account.id,
            account.user_id,
            event_types::DEPOSIT_COMPLETED,
            req.amount,
            req.currency,
        );
        tx.insert_outbox(&to_record(&event)?).await?;
        tx.commit().await?;

        info!(
            account_id = %req.account_id,
            amount = req.amount,
            currency = %req.currency,
            "deposit completed"
        );

        Ok(DepositReceipt {
            account_id: req.account_id,
            amount: req.amount,
            currency: req.currency,
            new_balance: account.balance(req.currency),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Conversion: pessimistic path
    // ─────────────────────────────────────────────────────────────────────────

    /// Converts between two of an account's currency balances, holding the
    /// row lock across the entire operation.
    ///
    /// Order of events: lock, funds check, quote, execute, then debit and
    /// credit in one write. Any failure before commit rolls the whole
    /// conversion back; no partial state is ever visible.
    pub async fn convert(&self, req: ConvertRequest) -> Result<ConversionReceipt, CoreError> {
        validate_convert(&req)?;

        let mut tx = self.store.begin().await?;
        let mut account = tx.lock_account(req.account_id).await?;

        let debit = Money::new(req.amount, req.from)?;
        if !account.has_sufficient_funds(&debit) {
            tx.rollback().await?;
            return Err(CoreError::InsufficientFunds {
                currency: req.from,
                available: account.balance(req.from),
                requested: req.amount,
            });
        }

        let quote = self.priced_quote(&req).await?;

        let execution = self.exchange.execute(quote.quote_id).await?;
        if !execution.success {
            tx.rollback().await?;
            warn!(
                account_id = %req.account_id,
                exchange_ref = %execution.transaction_id,
                "exchange rejected execution; conversion rolled back"
            );
            return Err(CoreError::ExchangeUnavailable(execution.message));
        }

        account.debit(debit)?;
        account.credit(Money::new(quote.net_amount, req.to)?);
        tx.update_balances(&account).await?;

        let (debited, credited) = conversion_events(&account, &req, quote.net_amount);
        tx.insert_outbox(&to_record(&debited)?).await?;
        tx.insert_outbox(&to_record(&credited)?).await?;

        if let Err(e) = tx.commit().await {
            // The external leg already executed; this needs an operator.
            error!(
                account_id = %req.account_id,
                exchange_ref = %execution.transaction_id,
                error = %e,
                "commit failed after exchange execution"
            );
            return Err(e.into());
        }

        info!(
            account_id = %req.account_id,
            from = %req.from,
            to = %req.to,
            debited = req.amount,
            credited = quote.net_amount,
            exchange_ref = %execution.transaction_id,
            "conversion completed"
        );

        Ok(ConversionReceipt {
            account_id: req.account_id,
            from: req.from,
            to: req.to,
            debited: req.amount,
            credited: quote.net_amount,
            rate: quote.rate,
            fee: quote.fee,
            exchange_ref: execution.transaction_id,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Conversion: optimistic path
    // ─────────────────────────────────────────────────────────────────────────

    /// Converts without holding a lock during the exchange leg.
    ///
    /// Reads the account and its version, quotes and executes, then applies
    /// the balance change only if the version is unchanged. A conflict after
    /// the exchange executed fails closed: the caller gets
    /// [`CoreError::ConcurrencyConflict`] and the executed leg is surfaced in
    /// the error log for reconciliation.
    pub async fn convert_optimistic(
        &self,
        req: ConvertRequest,
    ) -> Result<ConversionReceipt, CoreError> {
        validate_convert(&req)?;

        let mut account = self.get_account(req.account_id).await?;
        let expected_version = account.version;

        let debit = Money::new(req.amount, req.from)?;
        if !account.has_sufficient_funds(&debit) {
            return Err(CoreError::InsufficientFunds {
                currency: req.from,
                available: account.balance(req.from),
                requested: req.amount,
            });
        }

        let quote = self.priced_quote(&req).await?;

        let execution = self.exchange.execute(quote.quote_id).await?;
        if !execution.success {
            return Err(CoreError::ExchangeUnavailable(execution.message));
        }

        account.debit(debit)?;
        account.credit(Money::new(quote.net_amount, req.to)?);

        let mut tx = self.store.begin().await?;
        let applied = tx.update_balances_checked(&account, expected_version).await?;
        if !applied {
            tx.rollback().await?;
            error!(
                account_id = %req.account_id,
                expected_version,
                exchange_ref = %execution.transaction_id,
                "version conflict after exchange execution; conversion not applied"
            );
            return Err(CoreError::ConcurrencyConflict);
        }

        let (debited, credited) = conversion_events(&account, &req, quote.net_amount);
        tx.insert_outbox(&to_record(&debited)?).await?;
        tx.insert_outbox(&to_record(&credited)?).await?;
        tx.commit().await?;

        info!(
            account_id = %req.account_id,
            from = %req.from,
            to = %req.to,
            debited = req.amount,
            credited = quote.net_amount,
            "optimistic conversion completed"
        );

        Ok(ConversionReceipt {
            account_id: req.account_id,
            from: req.from,
            to: req.to,
            debited: req.amount,
            credited: quote.net_amount,
            rate: quote.rate,
            fee: quote.fee,
            exchange_ref: execution.transaction_id,
        })
    }

    /// Quotes the conversion and rejects unusable quotes before execution.
    async fn priced_quote(&self, req: &ConvertRequest) -> Result<Quote, CoreError> {
        let quote = self.exchange.quote(req.from, req.to, req.amount).await?;

        if !quote.available {
            return Err(CoreError::ExchangeUnavailable(
                "no liquidity for this pair".into(),
            ));
        }
        if quote.is_expired(chrono::Utc::now()) {
            return Err(CoreError::ExchangeUnavailable("quote already expired".into()));
        }
        if quote.net_amount <= 0 {
            return Err(CoreError::Validation(
                "Amount too small to convert after fees".into(),
            ));
        }

        Ok(quote)
    }
}

fn validate_convert(req: &ConvertRequest) -> Result<(), CoreError> {
    if req.amount <= 0 {
        return Err(CoreError::Validation("Amount must be positive".into()));
    }
    if req.from == req.to {
        return Err(CoreError::Validation(
            "Cannot convert a currency to itself".into(),
        ));
    }
    Ok(())
}

fn conversion_events(
    account: &Account,
    req: &ConvertRequest,
    net_amount: i64,
) -> (BalanceEvent, BalanceEvent) {
    let debited = BalanceEvent::account_event(
        account.id,
        account.user_id,
        event_types::CONVERSION_DEBITED,
        -req.amount,
        req.from,
    );
    let credited = BalanceEvent::account_event(
        account.id,
        account.user_id,
        event_types::CONVERSION_CREDITED,
        net_amount,
        req.to,
    );
    (debited, credited)
}

fn to_record(event: &BalanceEvent) -> Result<OutboxRecord, CoreError> {
    OutboxRecord::for_event(event).map_err(|e| CoreError::Internal(e.to_string()))
}
