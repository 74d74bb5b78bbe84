use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use fancy_regex::Regex;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, ExchangeResult};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "PENDING",
            VerificationStatus::Approved => "APPROVED",
            VerificationStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(VerificationStatus::Pending),
            "APPROVED" => Ok(VerificationStatus::Approved),
            "REJECTED" => Ok(VerificationStatus::Rejected),
            other => Err(anyhow!("Unknown verification status `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: VerificationStatus,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /auth/signup`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupData {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Codes handed out for guest transactions, claimed by this account.
    #[serde(default)]
    pub claim_codes: Vec<String>,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub claim_codes: Vec<String>,
}

impl User {
    /// Validates the credentials and hashes the password. Admins are approved up front.
    pub fn new(
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
        is_admin: bool,
    ) -> ExchangeResult<Self> {
        let email = email.trim().to_lowercase();
        if !validate_email(&email)? {
            return Err(ExchangeError::validation("Invalid email address."));
        }

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ExchangeError::validation(format!(
                "Password must be at least {} characters long.",
                MIN_PASSWORD_LEN
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {e}"))?
            .to_string();

        Ok(User {
            id: 0, //set by store
            email,
            password_hash,
            first_name: non_empty(first_name),
            last_name: non_empty(last_name),
            status: if is_admin {
                VerificationStatus::Approved
            } else {
                VerificationStatus::Pending
            },
            is_admin,
            created_at: Utc::now(),
        })
    }

    pub fn verify_password(&self, password: &str) -> anyhow::Result<()> {
        let hash = PasswordHash::new(&self.password_hash)
            .map_err(|e| anyhow!("Failed to parse password hash: {}", e))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .map_err(|e| anyhow!("Password not match: {}", e))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_email(email: &str) -> anyhow::Result<bool> {
    static RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());
    match &*RE {
        Some(re) => re
            .is_match(email)
            .map_err(|e| anyhow!("Regex error for email: {e}")),
        None => Err(anyhow!(
            "Email regex failed to compile. Rejecting all emails."
        )),
    }
}
