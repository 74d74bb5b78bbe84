use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, ExchangeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
        }
    }
}

impl FromStr for TransactionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(TransactionType::Buy),
            "SELL" => Ok(TransactionType::Sell),
            other => Err(anyhow::anyhow!("Unknown transaction type `{}`", other)),
        }
    }
}

/// Administrative state of a conversion request.
///
/// `Pending` is only ever the initial state. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Cancelled
        )
    }

    /// Returns `target` if an admin may move a transaction from `self` to it.
    /// Re-applying the current status is accepted as a no-op.
    pub fn transition_to(self, target: TransactionStatus) -> ExchangeResult<TransactionStatus> {
        if target == TransactionStatus::Pending {
            return Err(ExchangeError::validation(
                "Status must be one of PROCESSING, COMPLETED or CANCELLED",
            ));
        }
        if self == target {
            return Ok(target);
        }
        if self.is_terminal() {
            return Err(ExchangeError::validation(format!(
                "Transaction is already {} and cannot become {}",
                self, target
            )));
        }
        Ok(target)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "PROCESSING" => Ok(TransactionStatus::Processing),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            other => Err(anyhow::anyhow!("Unknown transaction status `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub user_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount_in: Decimal,
    pub currency_in: String,
    pub amount_out: Decimal,
    pub currency_out: String,
    pub status: TransactionStatus,
    pub payment_method: Option<String>,
    pub payment_details: serde_json::Value,
    pub proof_url: Option<String>,
    /// Set only while the transaction has no owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// A fresh PENDING record. The id is assigned by the store.
    pub fn pending(request: ValidTransactionRequest, user_id: Option<i64>) -> Self {
        Transaction {
            id: 0,
            user_id,
            kind: request.kind,
            amount_in: request.amount_in,
            currency_in: request.currency_in,
            amount_out: request.amount_out,
            currency_out: request.currency_out,
            status: TransactionStatus::Pending,
            payment_method: request.payment_method,
            payment_details: request.payment_details,
            proof_url: request.proof_url,
            claim_code: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == Some(user_id)
    }
}

/// Body of `POST /transactions`. Unknown fields such as `status` are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    #[serde(rename = "type", default)]
    pub kind: Option<TransactionType>,
    #[serde(default)]
    pub amount_in: Option<Decimal>,
    #[serde(default)]
    pub currency_in: String,
    #[serde(default)]
    pub amount_out: Option<Decimal>,
    #[serde(default)]
    pub currency_out: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_details: Option<serde_json::Value>,
    #[serde(default)]
    pub proof_url: Option<String>,
}

/// A request that passed field and pricing validation.
#[derive(Debug, Clone)]
pub struct ValidTransactionRequest {
    pub kind: TransactionType,
    pub amount_in: Decimal,
    pub currency_in: String,
    pub amount_out: Decimal,
    pub currency_out: String,
    pub payment_method: Option<String>,
    pub payment_details: serde_json::Value,
    pub proof_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_cannot_be_a_target() {
        for from in [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
        ] {
            assert!(from.transition_to(TransactionStatus::Pending).is_err());
        }
    }

    #[test]
    fn terminal_states_only_accept_themselves() {
        let done = TransactionStatus::Completed;
        assert_eq!(
            done.transition_to(TransactionStatus::Completed).ok(),
            Some(TransactionStatus::Completed)
        );
        assert!(done.transition_to(TransactionStatus::Cancelled).is_err());
        assert!(
            TransactionStatus::Cancelled
                .transition_to(TransactionStatus::Processing)
                .is_err()
        );
    }

    #[test]
    fn open_states_move_forward() {
        assert!(
            TransactionStatus::Pending
                .transition_to(TransactionStatus::Processing)
                .is_ok()
        );
        assert!(
            TransactionStatus::Pending
                .transition_to(TransactionStatus::Completed)
                .is_ok()
        );
        assert!(
            TransactionStatus::Processing
                .transition_to(TransactionStatus::Cancelled)
                .is_ok()
        );
    }

    #[test]
    fn status_round_trips_through_its_column_text() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<TransactionStatus>().ok(), Some(status));
        }
        assert!("DONE".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn client_status_field_is_ignored() {
        let body = r#"{
            "type": "BUY",
            "amountIn": "50000",
            "currencyIn": "XOF",
            "amountOut": "100.00",
            "currencyOut": "USDT",
            "status": "COMPLETED",
            "paymentDetails": {"addressOrNumber": "T9yK..."}
        }"#;
        let parsed: NewTransaction = serde_json::from_str(body).expect("valid body");
        assert_eq!(parsed.kind, Some(TransactionType::Buy));
        assert_eq!(parsed.amount_in, Some(Decimal::new(50_000, 0)));
        assert_eq!(parsed.amount_out, Some(Decimal::new(10_000, 2)));
    }
}
