use market_common::Money;

use crate::{
    db_types::{MerchantWithdrawal, WithdrawalStatus},
    market_api::withdrawal_objects::{MerchantBalance, WithdrawalDecision},
    traits::FulfillmentError,
};

/// Merchant cash-out requests against the settled balance of the merchant payment ledger.
///
/// Balances are always derived from the ledger and the withdrawal table. Nothing is cached.
#[allow(async_fn_in_trait)]
pub trait WithdrawalManagement {
    /// Creates a `pending` withdrawal with the merchant's bank details copied onto it.
    ///
    /// Fails if the merchant has no bank details on file, already has a pending or processing withdrawal, or the
    /// amount exceeds the available balance.
    async fn request_withdrawal(
        &self,
        merchant_id: i64,
        amount: Money,
        notes: Option<&str>,
    ) -> Result<MerchantWithdrawal, FulfillmentError>;

    /// Admin decision on a pending or processing withdrawal.
    async fn process_withdrawal(
        &self,
        admin_id: i64,
        withdrawal_id: i64,
        decision: &WithdrawalDecision,
    ) -> Result<MerchantWithdrawal, FulfillmentError>;

    /// The merchant withdraws their own pending request.
    async fn cancel_withdrawal(&self, merchant_id: i64, withdrawal_id: i64)
        -> Result<MerchantWithdrawal, FulfillmentError>;

    async fn fetch_balance(&self, merchant_id: i64) -> Result<MerchantBalance, FulfillmentError>;

    /// Newest first
    async fn fetch_withdrawals_for_merchant(&self, merchant_id: i64)
        -> Result<Vec<MerchantWithdrawal>, FulfillmentError>;

    /// All withdrawals, optionally filtered by status, oldest first so that admins work through them in order.
    async fn search_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<MerchantWithdrawal>, FulfillmentError>;
}
