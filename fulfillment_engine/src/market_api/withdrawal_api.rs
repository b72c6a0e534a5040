use std::fmt::Debug;

use log::*;
use market_common::Money;

use crate::{
    db_types::{MerchantWithdrawal, WithdrawalStatus},
    market_api::{
        settings::FulfillmentSettings,
        withdrawal_objects::{MerchantBalance, WithdrawalDecision, WithdrawalRequest},
    },
    traits::{FulfillmentError, WithdrawalManagement},
};

/// Merchant cash-outs and the balances they draw on.
pub struct WithdrawalApi<B> {
    db: B,
    min_withdrawal: Money,
}

impl<B> Debug for WithdrawalApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WithdrawalApi")
    }
}

impl<B> WithdrawalApi<B> {
    pub fn new(db: B, settings: &FulfillmentSettings) -> Self {
        Self { db, min_withdrawal: settings.min_withdrawal }
    }
}

impl<B> WithdrawalApi<B>
where B: WithdrawalManagement
{
    pub async fn balance(&self, merchant_id: i64) -> Result<MerchantBalance, FulfillmentError> {
        self.db.fetch_balance(merchant_id).await
    }

    pub async fn withdrawals_for_merchant(&self, merchant_id: i64) -> Result<Vec<MerchantWithdrawal>, FulfillmentError> {
        self.db.fetch_withdrawals_for_merchant(merchant_id).await
    }

    pub async fn search(&self, status: Option<WithdrawalStatus>) -> Result<Vec<MerchantWithdrawal>, FulfillmentError> {
        self.db.search_withdrawals(status).await
    }

    /// Requests a payout of `amount` to the merchant's bank account.
    ///
    /// The amount must be at least the configured minimum and no more than the available balance, the merchant must
    /// have bank details on file, and no other withdrawal may be pending or processing.
    pub async fn request_withdrawal(
        &self,
        merchant_id: i64,
        request: WithdrawalRequest,
    ) -> Result<MerchantWithdrawal, FulfillmentError> {
        if request.amount < self.min_withdrawal {
            return Err(FulfillmentError::validation(format!(
                "The minimum withdrawal amount is {}",
                self.min_withdrawal
            )));
        }
        let withdrawal = self.db.request_withdrawal(merchant_id, request.amount, request.notes.as_deref()).await?;
        info!("💸️ Withdrawal #{} of {} requested by merchant #{merchant_id}", withdrawal.id, withdrawal.amount);
        Ok(withdrawal)
    }

    pub async fn process_withdrawal(
        &self,
        admin_id: i64,
        withdrawal_id: i64,
        decision: WithdrawalDecision,
    ) -> Result<MerchantWithdrawal, FulfillmentError> {
        let withdrawal = self.db.process_withdrawal(admin_id, withdrawal_id, &decision).await?;
        info!("💸️ Withdrawal #{withdrawal_id} is now {} (admin #{admin_id})", withdrawal.status);
        Ok(withdrawal)
    }

    /// Withdraws a pending request. Requests an admin has started processing can no longer be cancelled.
    pub async fn cancel_withdrawal(
        &self,
        merchant_id: i64,
        withdrawal_id: i64,
    ) -> Result<MerchantWithdrawal, FulfillmentError> {
        let withdrawal = self.db.cancel_withdrawal(merchant_id, withdrawal_id).await?;
        debug!("💸️ Merchant #{merchant_id} cancelled withdrawal #{withdrawal_id}");
        Ok(withdrawal)
    }
}
