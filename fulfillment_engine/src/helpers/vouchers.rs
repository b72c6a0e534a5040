use chrono::{DateTime, Utc};
use market_common::{Money, Percentage};
use thiserror::Error;

use crate::db_types::{Voucher, VoucherType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoucherError {
    #[error("Voucher {0} is not active")]
    Inactive(String),
    #[error("Voucher {0} is not valid yet")]
    NotStarted(String),
    #[error("Voucher {0} has expired")]
    Expired(String),
    #[error("Voucher {0} has reached its usage limit")]
    UsageLimitReached(String),
    #[error("Voucher {code} requires a minimum purchase of {min_purchase}")]
    BelowMinimumPurchase { code: String, min_purchase: Money },
}

/// Checks that `voucher` can be applied to an order with the given subtotal at time `now`.
pub fn validate_voucher(voucher: &Voucher, subtotal: Money, now: DateTime<Utc>) -> Result<(), VoucherError> {
    let code = || voucher.code.clone();
    if !voucher.is_active {
        return Err(VoucherError::Inactive(code()));
    }
    if voucher.start_date.map(|start| now < start).unwrap_or(false) {
        return Err(VoucherError::NotStarted(code()));
    }
    if voucher.end_date.map(|end| now > end).unwrap_or(false) {
        return Err(VoucherError::Expired(code()));
    }
    if voucher.usage_limit.map(|limit| voucher.used_count >= limit).unwrap_or(false) {
        return Err(VoucherError::UsageLimitReached(code()));
    }
    if subtotal < voucher.min_purchase {
        return Err(VoucherError::BelowMinimumPurchase { code: code(), min_purchase: voucher.min_purchase });
    }
    Ok(())
}

/// The discount a voucher grants on `subtotal`.
///
/// Percentage vouchers round half-up and are capped at `max_discount`. The result never exceeds the subtotal.
pub fn calculate_discount(voucher: &Voucher, subtotal: Money) -> Money {
    let discount = match voucher.voucher_type {
        VoucherType::Percentage => {
            let discount = Percentage::from(voucher.discount_value).apply(subtotal);
            match voucher.max_discount {
                Some(cap) => discount.min(cap),
                None => discount,
            }
        },
        VoucherType::Fixed => Money::from(voucher.discount_value),
    };
    discount.max(Money::zero()).min(subtotal)
}
