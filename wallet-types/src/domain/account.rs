//! Account domain model: multi-currency balances behind a version counter.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::{Currency, Money};
use crate::error::DomainError;

/// Unique identifier for an Account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Creates a new random AccountId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an AccountId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A set of named per-currency balances, all in minor units.
///
/// Balances are never negative; `debit` refuses to overdraw.
/// Serializes as a JSON object keyed by currency code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balances(BTreeMap<Currency, i64>);

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance held in the given currency; zero if the currency was never touched.
    pub fn get(&self, currency: Currency) -> i64 {
        self.0.get(&currency).copied().unwrap_or(0)
    }

    /// Adds money to the balance for its currency.
    pub fn credit(&mut self, amount: Money) {
        let entry = self.0.entry(amount.currency()).or_insert(0);
        *entry = entry.saturating_add(amount.amount());
    }

    /// Removes money from the balance for its currency.
    /// Fails without mutating if the balance would go negative.
    pub fn debit(&mut self, amount: Money) -> Result<(), DomainError> {
        let available = self.get(amount.currency());
        if available < amount.amount() {
            return Err(DomainError::InsufficientFunds {
                currency: amount.currency(),
                available,
                requested: amount.amount(),
            });
        }
        self.0.insert(amount.currency(), available - amount.amount());
        Ok(())
    }

    /// Iterates over (currency, minor units) pairs in currency order.
    pub fn iter(&self) -> impl Iterator<Item = (Currency, i64)> + '_ {
        self.0.iter().map(|(c, a)| (*c, *a))
    }
}

/// A financial account holding multi-currency balances.
///
/// The `version` counter increases by exactly 1 on every successful
/// mutation and backs the optimistic concurrency path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Owning user
    pub user_id: Uuid,
    /// Human-readable account name
    pub name: String,
    /// Per-currency balances in minor units
    pub balances: Balances,
    /// Monotonic mutation counter
    pub version: i64,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new account with empty balances.
    ///
    /// # Validation
    /// - Name cannot be empty
    pub fn new(user_id: Uuid, name: String) -> Result<Self, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Account name cannot be empty".into(),
            ));
        }

        Ok(Self {
            id: AccountId::new(),
            user_id,
            name,
            balances: Balances::new(),
            version: 0,
            created_at: Utc::now(),
        })
    }

    /// Creates an account with all fields specified (for database reconstruction).
    pub fn from_parts(
        id: AccountId,
        user_id: Uuid,
        name: String,
        balances: Balances,
        version: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            name,
            balances,
            version,
            created_at,
        }
    }

    /// Balance held in the given currency.
    pub fn balance(&self, currency: Currency) -> i64 {
        self.balances.get(currency)
    }

    /// Credits (adds) money to the account.
    pub fn credit(&mut self, amount: Money) {
        self.balances.credit(amount);
    }

    /// Debits (subtracts) money from the account.
    pub fn debit(&mut self, amount: Money) -> Result<(), DomainError> {
        self.balances.debit(amount)
    }

    /// Checks if the account can cover a debit in the given currency.
    pub fn has_sufficient_funds(&self, amount: &Money) -> bool {
        self.balance(amount.currency()) >= amount.amount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account() -> Account {
        Account::new(Uuid::new_v4(), "Test Account".to_string()).unwrap()
    }

    #[test]
    fn test_account_creation() {
        let account = new_account();
        assert_eq!(account.name, "Test Account");
        assert_eq!(account.balance(Currency::USD), 0);
        assert_eq!(account.version, 0);
    }

    #[test]
    fn test_empty_name_fails() {
        let result = Account::new(Uuid::new_v4(), "".to_string());
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_credit_and_debit() {
        let mut account = new_account();
        account.credit(Money::new(1000, Currency::USD).unwrap());
        account
            .debit(Money::new(300, Currency::USD).unwrap())
            .unwrap();
        assert_eq!(account.balance(Currency::USD), 700);
    }

    #[test]
    fn test_currencies_are_independent() {
        let mut account = new_account();
        account.credit(Money::new(1000, Currency::USD).unwrap());
        account.credit(Money::new(500, Currency::NGN).unwrap());
        assert_eq!(account.balance(Currency::USD), 1000);
        assert_eq!(account.balance(Currency::NGN), 500);
        assert_eq!(account.balance(Currency::GBP), 0);
    }

    #[test]
    fn test_overdraw_fails_without_mutation() {
        let mut account = new_account();
        account.credit(Money::new(100, Currency::USD).unwrap());
        let result = account.debit(Money::new(200, Currency::USD).unwrap());
        assert!(matches!(result, Err(DomainError::InsufficientFunds { .. })));
        assert_eq!(account.balance(Currency::USD), 100);
    }

    #[test]
    fn test_balances_round_trip_json() {
        let mut balances = Balances::new();
        balances.credit(Money::new(1000, Currency::USD).unwrap());
        balances.credit(Money::new(250, Currency::NGN).unwrap());
        let json = serde_json::to_string(&balances).unwrap();
        let back: Balances = serde_json::from_str(&json).unwrap();
        assert_eq!(back, balances);
    }
}
