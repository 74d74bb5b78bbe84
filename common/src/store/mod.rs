mod memory;
mod sqlite;


pub use memory::MemoryStore;
pub use sqlite::Database;

use async_trait::async_trait;

use crate::schema::{
    ExchangeRate, NewExchangeRate, Transaction, TransactionStatus, User, VerificationStatus,
};

/// Which unowned transactions an authenticating user picks up.
#[derive(Debug, Clone, Copy)]
pub enum LinkTarget<'a> {
    /// Only transactions carrying one of these claim codes.
    ClaimCodes(&'a [String]),
    /// Every unowned transaction in the store.
    AllUnowned,
}

/// Persistence contract shared by the in-memory and SQLite stores.
///
/// Lookups return `Ok(None)` for unknown ids; errors are reserved for store failures.
#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// All rates in insertion order.
    async fn list_rates(&self) -> anyhow::Result<Vec<ExchangeRate>>;
    async fn insert_rate(&self, rate: &NewExchangeRate) -> anyhow::Result<ExchangeRate>;

    /// Stores `transaction` under a fresh id, ignoring the id it carries.
    async fn insert_transaction(&self, transaction: &Transaction) -> anyhow::Result<Transaction>;
    /// Newest first. `owner = None` lists every transaction.
    async fn list_transactions(&self, owner: Option<i64>) -> anyhow::Result<Vec<Transaction>>;
    async fn get_transaction(&self, id: i64) -> anyhow::Result<Option<Transaction>>;
    /// Sets the status to `to` only while the stored status is still `from`.
    /// `None` when the id is unknown or the status has moved on.
    async fn update_transaction_status(
        &self,
        id: i64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> anyhow::Result<Option<Transaction>>;
    /// Assigns `user_id` to matching transactions that have no owner yet and
    /// returns how many were linked. Owned transactions are never touched.
    async fn link_transactions(&self, user_id: i64, target: LinkTarget<'_>)
    -> anyhow::Result<u64>;

    /// Stores `user` under a fresh id. `None` when the email is taken.
    async fn insert_user(&self, user: &User) -> anyhow::Result<Option<User>>;
    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn list_users_by_status(&self, status: VerificationStatus)
    -> anyhow::Result<Vec<User>>;
    async fn update_user_status(
        &self,
        id: i64,
        status: VerificationStatus,
    ) -> anyhow::Result<Option<User>>;
}
