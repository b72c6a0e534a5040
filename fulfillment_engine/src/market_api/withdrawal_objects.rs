use market_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{db_types::WithdrawalStatus, traits::FulfillmentError};

/// A merchant's position on the settlement ledger. Always derived, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MerchantBalance {
    /// Sum of settled (`paid`) merchant amounts
    pub total_earnings: Money,
    /// Sum of merchant amounts still waiting on payment or approval
    pub pending_balance: Money,
    /// Gross order value of settled merchant payments, before commission
    pub total_revenue: Money,
    /// Sum of completed withdrawals
    pub withdrawn_amount: Money,
    /// Sum of pending and processing withdrawals
    pub pending_withdrawal: Money,
    #[sqlx(default)]
    pub available_balance: Money,
}

impl MerchantBalance {
    /// Fills in `available_balance` from the other totals.
    pub fn with_available_balance(mut self) -> Self {
        self.available_balance = self.total_earnings - self.withdrawn_amount - self.pending_withdrawal;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An admin's decision on a withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalDecision {
    pub status: WithdrawalStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl WithdrawalDecision {
    pub fn processing() -> Self {
        Self { status: WithdrawalStatus::Processing, reason: None, notes: None }
    }

    pub fn completed() -> Self {
        Self { status: WithdrawalStatus::Completed, reason: None, notes: None }
    }

    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        Self { status: WithdrawalStatus::Rejected, reason: Some(reason.into()), notes: None }
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Admins cannot move a withdrawal back to `pending`, and a rejection must say why.
    pub fn validate(&self) -> Result<(), FulfillmentError> {
        match self.status {
            WithdrawalStatus::Pending => {
                Err(FulfillmentError::validation("A withdrawal cannot be moved back to pending"))
            },
            WithdrawalStatus::Rejected if self.reason.as_deref().map(str::trim).unwrap_or_default().is_empty() => {
                Err(FulfillmentError::validation("A reason is required when rejecting a withdrawal"))
            },
            _ => Ok(()),
        }
    }

    /// `completed` and `rejected` are final and get a `processed_at` stamp.
    pub fn is_final(&self) -> bool {
        matches!(self.status, WithdrawalStatus::Completed | WithdrawalStatus::Rejected)
    }
}
