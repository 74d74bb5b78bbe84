use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::{ExchangeStore, LinkTarget};
use crate::schema::{
    ExchangeRate, NewExchangeRate, Transaction, TransactionStatus, TransactionType, User,
    VerificationStatus,
};

const RATE_COLUMNS: &str = "id, pair, rate, fee_percent, min_amount, max_amount, updated_at";
const TRANSACTION_COLUMNS: &str = "id, user_id, type, amount_in, currency_in, amount_out, \
     currency_out, status, payment_method, payment_details, proof_url, claim_code, created_at";
const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, status, is_admin, created_at";

/// SQLite-backed store. Decimals are kept as TEXT to stay exact.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Failed to create SQLite connect options")?
            .create_if_missing(true);

        // Every connection to `sqlite::memory:` opens its own empty database.
        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(5))
        };
        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to `{}`", database_url))?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .context("Database migration error")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ExchangeStore for Database {
    async fn list_rates(&self) -> anyhow::Result<Vec<ExchangeRate>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM exchange_rates ORDER BY id",
            RATE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to get exchange rates from database")?;

        rows.iter().map(rate_from_row).collect()
    }

    async fn insert_rate(&self, rate: &NewExchangeRate) -> anyhow::Result<ExchangeRate> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO exchange_rates (
                pair, rate, fee_percent, min_amount, max_amount, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            RATE_COLUMNS
        ))
        .bind(&rate.pair)
        .bind(rate.rate.to_string())
        .bind(rate.fee_percent.to_string())
        .bind(rate.min_amount.to_string())
        .bind(rate.max_amount.to_string())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to save rate {} to database", rate.pair))?;

        rate_from_row(&row)
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> anyhow::Result<Transaction> {
        let payment_details = serde_json::to_string(&transaction.payment_details)
            .context("Failed to serialize payment details")?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO transactions (
                user_id, type, amount_in, currency_in, amount_out, currency_out,
                status, payment_method, payment_details, proof_url, claim_code, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(transaction.user_id)
        .bind(transaction.kind.as_str())
        .bind(transaction.amount_in.to_string())
        .bind(&transaction.currency_in)
        .bind(transaction.amount_out.to_string())
        .bind(&transaction.currency_out)
        .bind(transaction.status.as_str())
        .bind(&transaction.payment_method)
        .bind(payment_details)
        .bind(&transaction.proof_url)
        .bind(&transaction.claim_code)
        .bind(transaction.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to save transaction")?;

        transaction_from_row(&row)
    }

    async fn list_transactions(&self, owner: Option<i64>) -> anyhow::Result<Vec<Transaction>> {
        let rows = match owner {
            Some(user_id) => sqlx::query(&format!(
                "SELECT {} FROM transactions WHERE user_id = ? ORDER BY created_at DESC, id DESC",
                TRANSACTION_COLUMNS
            ))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to get transactions of user {}", user_id))?,
            None => sqlx::query(&format!(
                "SELECT {} FROM transactions ORDER BY created_at DESC, id DESC",
                TRANSACTION_COLUMNS
            ))
            .fetch_all(&self.pool)
            .await
            .context("Failed to get all transactions")?,
        };

        rows.iter().map(transaction_from_row).collect()
    }

    async fn get_transaction(&self, id: i64) -> anyhow::Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to get transaction with id {}", id))?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn update_transaction_status(
        &self,
        id: i64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> anyhow::Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "UPDATE transactions SET status = ? WHERE id = ? AND status = ? RETURNING {}",
            TRANSACTION_COLUMNS
        ))
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to update status of transaction {}", id))?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn link_transactions(
        &self,
        user_id: i64,
        target: LinkTarget<'_>,
    ) -> anyhow::Result<u64> {
        let linked = match target {
            LinkTarget::AllUnowned => sqlx::query(
                r#"
                UPDATE transactions
                SET user_id = ?, claim_code = NULL
                WHERE user_id IS NULL
                "#,
            )
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to link unowned transactions")?
            .rows_affected(),
            LinkTarget::ClaimCodes(codes) => {
                let mut tx = self.pool.begin().await?;
                let mut linked = 0;
                for code in codes {
                    linked += sqlx::query(
                        r#"
                        UPDATE transactions
                        SET user_id = ?, claim_code = NULL
                        WHERE user_id IS NULL AND claim_code = ?
                        "#,
                    )
                    .bind(user_id)
                    .bind(code)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to link claimed transactions")?
                    .rows_affected();
                }
                tx.commit().await.context("Failed to commit linking")?;
                linked
            }
        };
        Ok(linked)
    }

    async fn insert_user(&self, user: &User) -> anyhow::Result<Option<User>> {
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO users (
                email, password_hash, first_name, last_name, status, is_admin, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.status.as_str())
        .bind(user.is_admin)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => user_from_row(&row).map(Some),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to save user {}", user.email))),
        }
    }

    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to get user with id {}", id))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to get user with email {}", email))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users_by_status(
        &self,
        status: VerificationStatus,
    ) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE status = ? ORDER BY id",
            USER_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to get {} users", status))?;

        rows.iter().map(user_from_row).collect()
    }

    async fn update_user_status(
        &self,
        id: i64,
        status: VerificationStatus,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET status = ? WHERE id = ? RETURNING {}",
            USER_COLUMNS
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to update status of user {}", id))?;

        row.as_ref().map(user_from_row).transpose()
    }
}

fn decimal(row: &SqliteRow, column: &str) -> anyhow::Result<Decimal> {
    let text: String = row.try_get(column)?;
    Decimal::from_str(&text).with_context(|| format!("Invalid decimal `{}` in {}", text, column))
}

fn rate_from_row(row: &SqliteRow) -> anyhow::Result<ExchangeRate> {
    Ok(ExchangeRate {
        id: row.try_get("id")?,
        pair: row.try_get("pair")?,
        rate: decimal(row, "rate")?,
        fee_percent: decimal(row, "fee_percent")?,
        min_amount: decimal(row, "min_amount")?,
        max_amount: decimal(row, "max_amount")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn transaction_from_row(row: &SqliteRow) -> anyhow::Result<Transaction> {
    let kind: String = row.try_get("type")?;
    let status: String = row.try_get("status")?;
    let payment_details: String = row.try_get("payment_details")?;

    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: TransactionType::from_str(&kind)?,
        amount_in: decimal(row, "amount_in")?,
        currency_in: row.try_get("currency_in")?,
        amount_out: decimal(row, "amount_out")?,
        currency_out: row.try_get("currency_out")?,
        status: TransactionStatus::from_str(&status)?,
        payment_method: row.try_get("payment_method")?,
        payment_details: serde_json::from_str(&payment_details)
            .context("Invalid payment details JSON")?,
        proof_url: row.try_get("proof_url")?,
        claim_code: row.try_get("claim_code")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn user_from_row(row: &SqliteRow) -> anyhow::Result<User> {
    let status: String = row.try_get("status")?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        status: VerificationStatus::from_str(&status)?,
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}
