use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ExchangeStore, LinkTarget};
use crate::schema::{
    ExchangeRate, NewExchangeRate, Transaction, TransactionStatus, User, VerificationStatus,
};

#[derive(Default)]
struct Tables {
    rates: Vec<ExchangeRate>,
    transactions: BTreeMap<i64, Transaction>,
    users: BTreeMap<i64, User>,
    last_rate_id: i64,
    last_transaction_id: i64,
    last_user_id: i64,
}

/// Process-local store. Used by the tests and by `STORE=memory`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExchangeStore for MemoryStore {
    async fn list_rates(&self) -> anyhow::Result<Vec<ExchangeRate>> {
        Ok(self.tables.read().await.rates.clone())
    }

    async fn insert_rate(&self, rate: &NewExchangeRate) -> anyhow::Result<ExchangeRate> {
        let mut tables = self.tables.write().await;
        tables.last_rate_id += 1;
        let saved = ExchangeRate {
            id: tables.last_rate_id,
            pair: rate.pair.clone(),
            rate: rate.rate,
            fee_percent: rate.fee_percent,
            min_amount: rate.min_amount,
            max_amount: rate.max_amount,
            updated_at: Utc::now(),
        };
        tables.rates.push(saved.clone());
        Ok(saved)
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> anyhow::Result<Transaction> {
        let mut tables = self.tables.write().await;
        tables.last_transaction_id += 1;
        let saved = Transaction {
            id: tables.last_transaction_id,
            ..transaction.clone()
        };
        tables.transactions.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn list_transactions(&self, owner: Option<i64>) -> anyhow::Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        let mut transactions: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|tx| owner.is_none() || tx.user_id == owner)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(transactions)
    }

    async fn get_transaction(&self, id: i64) -> anyhow::Result<Option<Transaction>> {
        Ok(self.tables.read().await.transactions.get(&id).cloned())
    }

    async fn update_transaction_status(
        &self,
        id: i64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> anyhow::Result<Option<Transaction>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .transactions
            .get_mut(&id)
            .filter(|tx| tx.status == from)
            .map(|tx| {
                tx.status = to;
                tx.clone()
            }))
    }

    async fn link_transactions(
        &self,
        user_id: i64,
        target: LinkTarget<'_>,
    ) -> anyhow::Result<u64> {
        let mut tables = self.tables.write().await;
        let mut linked = 0;
        for tx in tables.transactions.values_mut() {
            if tx.user_id.is_some() {
                continue;
            }
            let matches = match target {
                LinkTarget::AllUnowned => true,
                LinkTarget::ClaimCodes(codes) => tx
                    .claim_code
                    .as_ref()
                    .is_some_and(|code| codes.contains(code)),
            };
            if matches {
                tx.user_id = Some(user_id);
                tx.claim_code = None;
                linked += 1;
            }
        }
        Ok(linked)
    }

    async fn insert_user(&self, user: &User) -> anyhow::Result<Option<User>> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Ok(None);
        }
        tables.last_user_id += 1;
        let saved = User {
            id: tables.last_user_id,
            ..user.clone()
        };
        tables.users.insert(saved.id, saved.clone());
        Ok(Some(saved))
    }

    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users_by_status(
        &self,
        status: VerificationStatus,
    ) -> anyhow::Result<Vec<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .filter(|u| u.status == status)
            .cloned()
            .collect())
    }

    async fn update_user_status(
        &self,
        id: i64,
        status: VerificationStatus,
    ) -> anyhow::Result<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.status = status;
            user.clone()
        }))
    }
}
