use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use rand::{Rng, distr::Alphanumeric};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::error::{ExchangeError, ExchangeResult};
use crate::pricing::{self, BlockedPairs, Quote};
use crate::schema::{
    ExchangeRate, LoginData, NewExchangeRate, NewTransaction, SignupData, Transaction,
    TransactionStatus, TransactionType, User, ValidTransactionRequest, VerificationStatus,
    default_rates, is_currency_code, normalize_currency,
};
use crate::store::{ExchangeStore, LinkTarget};

const CLAIM_CODE_LEN: usize = 12;

/// How unowned transactions are attributed when someone signs up or logs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicy {
    /// Only transactions whose claim code the user presents.
    ClaimCode,
    /// Every unowned transaction goes to whoever authenticates next.
    Global,
}

impl FromStr for LinkPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claim_code" => Ok(LinkPolicy::ClaimCode),
            "global" => Ok(LinkPolicy::Global),
            other => Err(anyhow!(
                "Unknown link policy `{}`, expected `claim_code` or `global`",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    pub link_policy: LinkPolicy,
    pub blocked_pairs: BlockedPairs,
    /// Selling this currency is a BUY of the other side.
    pub fiat_currency: String,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        ExchangeSettings {
            link_policy: LinkPolicy::ClaimCode,
            blocked_pairs: BlockedPairs::default(),
            fiat_currency: "XOF".to_string(),
        }
    }
}

/// Which transactions a listing covers. Only admins can see beyond their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionScope {
    #[default]
    All,
    #[serde(rename = "self")]
    Own,
}

/// Result of a successful signup or login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthOutcome {
    pub user: User,
    pub linked_transactions: u64,
}

/// The transaction lifecycle and rate-quoting engine.
pub struct Exchange {
    store: Arc<dyn ExchangeStore>,
    settings: ExchangeSettings,
}

impl Exchange {
    pub fn new(store: Arc<dyn ExchangeStore>, settings: ExchangeSettings) -> Self {
        Exchange { store, settings }
    }

    pub fn settings(&self) -> &ExchangeSettings {
        &self.settings
    }

    /// Loads the default rates when no rate is on file. Returns how many were added.
    pub async fn seed_default_rates(&self) -> anyhow::Result<usize> {
        if !self.store.list_rates().await?.is_empty() {
            return Ok(0);
        }
        let defaults = default_rates();
        for rate in &defaults {
            self.store.insert_rate(rate).await?;
        }
        log::info!("Seeded {} default exchange rates", defaults.len());
        Ok(defaults.len())
    }

    pub async fn list_rates(&self) -> ExchangeResult<Vec<ExchangeRate>> {
        Ok(self.store.list_rates().await?)
    }

    pub async fn create_rate(
        &self,
        ctx: &AuthContext,
        rate: NewExchangeRate,
    ) -> ExchangeResult<ExchangeRate> {
        self.active_admin(ctx).await?;
        let rate = rate.validated()?;
        let saved = self.store.insert_rate(&rate).await?;
        log::info!(
            "Rate {} set to {} (fee {}%) by user {}",
            saved.pair,
            saved.rate,
            saved.fee_percent,
            ctx.user_id
        );
        Ok(saved)
    }

    pub async fn quote(&self, from: &str, to: &str, amount_in: Decimal) -> ExchangeResult<Quote> {
        let (from, to) = currency_pair(from, to)?;
        if amount_in <= Decimal::ZERO {
            return Err(ExchangeError::validation("Amount must be greater than zero"));
        }
        let rates = self.store.list_rates().await?;
        let rate = pricing::resolve_rate(&rates, &self.settings.blocked_pairs, &from, &to)?;
        Quote::new(amount_in, rate)
    }

    /// Creates a PENDING transaction. Without a caller the transaction is
    /// unowned and gets a claim code for later linking.
    pub async fn create_transaction(
        &self,
        ctx: Option<&AuthContext>,
        input: NewTransaction,
    ) -> ExchangeResult<Transaction> {
        if let Some(ctx) = ctx {
            self.active_account(ctx).await?;
        }
        let request = self.validate_transaction(input).await?;

        let mut transaction = Transaction::pending(request, ctx.map(|c| c.user_id));
        if transaction.user_id.is_none() {
            transaction.claim_code = Some(generate_claim_code());
        }

        let saved = self.store.insert_transaction(&transaction).await?;
        log::info!(
            "Transaction {} created: {} {} -> {} {} (owner {:?})",
            saved.id,
            saved.amount_in,
            saved.currency_in,
            saved.amount_out,
            saved.currency_out,
            saved.user_id
        );
        Ok(saved)
    }

    async fn validate_transaction(
        &self,
        input: NewTransaction,
    ) -> ExchangeResult<ValidTransactionRequest> {
        let amount_in = input
            .amount_in
            .ok_or_else(|| ExchangeError::validation("Amount is required"))?;
        if amount_in <= Decimal::ZERO {
            return Err(ExchangeError::validation("Amount must be greater than zero"));
        }

        let payment_details = input
            .payment_details
            .filter(has_payment_content)
            .ok_or_else(|| ExchangeError::validation("Payment details are required"))?;

        let (currency_in, currency_out) = currency_pair(&input.currency_in, &input.currency_out)?;

        let rates = self.store.list_rates().await?;
        let rate = pricing::resolve_rate(
            &rates,
            &self.settings.blocked_pairs,
            &currency_in,
            &currency_out,
        )?;
        pricing::check_limits(amount_in, rate)?;

        // A client-computed output is recorded as sent.
        let amount_out = match input.amount_out {
            Some(out) if out < Decimal::ZERO => {
                return Err(ExchangeError::validation("Output amount cannot be negative"));
            }
            Some(out) => out,
            None => pricing::estimate_output(amount_in, rate)?,
        };

        let kind = input.kind.unwrap_or(if currency_in == self.settings.fiat_currency {
            TransactionType::Buy
        } else {
            TransactionType::Sell
        });

        Ok(ValidTransactionRequest {
            kind,
            amount_in,
            currency_in,
            amount_out,
            currency_out,
            payment_method: input
                .payment_method
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            payment_details,
            proof_url: input
                .proof_url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
        })
    }

    pub async fn list_transactions(
        &self,
        ctx: &AuthContext,
        scope: TransactionScope,
    ) -> ExchangeResult<Vec<Transaction>> {
        self.active_account(ctx).await?;
        let owner = if ctx.is_admin && scope == TransactionScope::All {
            None
        } else {
            Some(ctx.user_id)
        };
        Ok(self.store.list_transactions(owner).await?)
    }

    /// Transactions of other users are reported as missing to non-admins.
    pub async fn get_transaction(&self, ctx: &AuthContext, id: i64) -> ExchangeResult<Transaction> {
        self.active_account(ctx).await?;
        self.store
            .get_transaction(id)
            .await?
            .filter(|tx| ctx.can_read(tx))
            .ok_or_else(|| transaction_not_found(id))
    }

    pub async fn update_status(
        &self,
        ctx: &AuthContext,
        id: i64,
        status: TransactionStatus,
    ) -> ExchangeResult<Transaction> {
        self.active_admin(ctx).await?;
        loop {
            let current = self
                .store
                .get_transaction(id)
                .await?
                .ok_or_else(|| transaction_not_found(id))?;
            let target = current.status.transition_to(status)?;

            // A miss means another update landed first: check again against its status.
            if let Some(updated) = self
                .store
                .update_transaction_status(id, current.status, target)
                .await?
            {
                log::info!(
                    "Transaction {} moved from {} to {} by user {}",
                    id,
                    current.status,
                    updated.status,
                    ctx.user_id
                );
                return Ok(updated);
            }
            log::debug!("Transaction {} changed while updating its status", id);
        }
    }

    pub async fn signup(&self, data: SignupData) -> ExchangeResult<AuthOutcome> {
        let user = User::new(
            &data.email,
            &data.password,
            data.first_name,
            data.last_name,
            false,
        )?;

        let Some(user) = self.store.insert_user(&user).await? else {
            log::warn!("Signup rejected, email already used: {}", user.email);
            return Err(email_taken());
        };
        log::info!("User {} signed up as {}", user.id, user.email);
        let linked_transactions = self.link(&user, &data.claim_codes).await?;
        Ok(AuthOutcome {
            user,
            linked_transactions,
        })
    }

    pub async fn login(&self, data: LoginData) -> ExchangeResult<AuthOutcome> {
        let email = data.email.trim().to_lowercase();
        let invalid = || ExchangeError::Unauthorized("Invalid email or password".to_string());

        let Some(user) = self.store.get_user_by_email(&email).await? else {
            log::warn!("Login attempt for unknown email {}", email);
            return Err(invalid());
        };

        if let Err(err) = user.verify_password(&data.password) {
            log::warn!("Invalid password for user {}: {:?}", email, err);
            return Err(invalid());
        }

        if user.status == VerificationStatus::Rejected {
            log::warn!("Rejected user {} tried to log in", user.id);
            return Err(account_rejected());
        }

        let linked_transactions = self.link(&user, &data.claim_codes).await?;
        Ok(AuthOutcome {
            user,
            linked_transactions,
        })
    }

    async fn link(&self, user: &User, claim_codes: &[String]) -> ExchangeResult<u64> {
        let target = match self.settings.link_policy {
            LinkPolicy::Global => LinkTarget::AllUnowned,
            LinkPolicy::ClaimCode if claim_codes.is_empty() => return Ok(0),
            LinkPolicy::ClaimCode => LinkTarget::ClaimCodes(claim_codes),
        };
        let linked = self.store.link_transactions(user.id, target).await?;
        if linked > 0 {
            log::info!("Linked {} transactions to user {}", linked, user.id);
        }
        Ok(linked)
    }

    pub async fn pending_users(&self, ctx: &AuthContext) -> ExchangeResult<Vec<User>> {
        self.active_admin(ctx).await?;
        Ok(self
            .store
            .list_users_by_status(VerificationStatus::Pending)
            .await?)
    }

    pub async fn verify_user(
        &self,
        ctx: &AuthContext,
        id: i64,
        status: VerificationStatus,
    ) -> ExchangeResult<User> {
        self.active_admin(ctx).await?;
        if status == VerificationStatus::Pending {
            return Err(ExchangeError::validation(
                "Status must be either APPROVED or REJECTED",
            ));
        }
        let user = self
            .store
            .update_user_status(id, status)
            .await?
            .ok_or_else(|| ExchangeError::not_found(format!("User {} not found", id)))?;
        log::info!("User {} marked {} by user {}", id, status, ctx.user_id);
        Ok(user)
    }

    /// Creates an approved admin account. Used by the `create-admin` command.
    pub async fn create_admin(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> ExchangeResult<User> {
        let user = User::new(email, password, first_name, last_name, true)?;
        self.store
            .insert_user(&user)
            .await?
            .ok_or_else(email_taken)
    }

    /// The caller's stored account. Sessions outlive verification decisions,
    /// so a REJECTED account is refused here even with a valid token.
    async fn active_account(&self, ctx: &AuthContext) -> ExchangeResult<User> {
        let Some(user) = self.store.get_user(ctx.user_id).await? else {
            log::warn!("Session for unknown user {}", ctx.user_id);
            return Err(ExchangeError::Unauthorized(
                "Account no longer exists".to_string(),
            ));
        };
        if user.status == VerificationStatus::Rejected {
            log::warn!("Rejected user {} used an existing session", user.id);
            return Err(account_rejected());
        }
        Ok(user)
    }

    async fn active_admin(&self, ctx: &AuthContext) -> ExchangeResult<User> {
        ctx.require_admin()?;
        self.active_account(ctx).await
    }

    /// Appends a rate without an acting user. Used by the `set-rate` command.
    pub async fn set_rate(&self, rate: NewExchangeRate) -> ExchangeResult<ExchangeRate> {
        let rate = rate.validated()?;
        Ok(self.store.insert_rate(&rate).await?)
    }
}

fn email_taken() -> ExchangeError {
    ExchangeError::validation("email already used")
}

fn account_rejected() -> ExchangeError {
    ExchangeError::Forbidden("Account has been rejected".to_string())
}

fn currency_pair(from: &str, to: &str) -> ExchangeResult<(String, String)> {
    let from = normalize_currency(from);
    let to = normalize_currency(to);
    for code in [&from, &to] {
        if code.is_empty() {
            return Err(ExchangeError::validation("Both currencies are required"));
        }
        if !is_currency_code(code)? {
            return Err(ExchangeError::validation(format!(
                "`{}` is not a valid currency code",
                code
            )));
        }
    }
    if from == to {
        return Err(ExchangeError::validation(
            "Source and target currencies must differ",
        ));
    }
    Ok((from, to))
}

/// A JSON object with at least one non-blank value.
fn has_payment_content(details: &serde_json::Value) -> bool {
    details.as_object().is_some_and(|fields| {
        fields.values().any(|value| match value {
            serde_json::Value::Null => false,
            serde_json::Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
    })
}

fn transaction_not_found(id: i64) -> ExchangeError {
    ExchangeError::not_found(format!("Transaction {} not found", id))
}

fn generate_claim_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CLAIM_CODE_LEN)
        .map(char::from)
        .collect()
}
