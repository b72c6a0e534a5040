use market_common::{Money, Percentage};
use serde::{Deserialize, Serialize};

/// How an order amount divides between the platform and the merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub order_amount: Money,
    pub commission_amount: Money,
    pub merchant_amount: Money,
}

/// Splits `order_amount` into the platform commission and the merchant's share.
///
/// The commission is rounded half-up to the nearest minor unit. The merchant amount is never rounded on its own; it is
/// whatever remains, so `commission_amount + merchant_amount == order_amount` holds exactly.
pub fn split_commission(order_amount: Money, rate: Percentage) -> CommissionSplit {
    let commission_amount = rate.apply(order_amount);
    CommissionSplit { order_amount, commission_amount, merchant_amount: order_amount - commission_amount }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ten_percent_of_130k() {
        let split = split_commission(Money::from_major(130_000), Percentage::from_percent(10));
        assert_eq!(split.commission_amount, Money::from_major(13_000));
        assert_eq!(split.merchant_amount, Money::from_major(117_000));
    }

    #[test]
    fn rounding_is_half_up_and_exact() {
        // 12.5% of 0.99 = 0.12375 -> 0.12
        let split = split_commission(Money::from(99), Percentage::from(1250));
        assert_eq!(split.commission_amount, Money::from(12));
        assert_eq!(split.merchant_amount, Money::from(87));
        // 15% of 0.10 = 0.015 -> 0.02
        let split = split_commission(Money::from(10), Percentage::from_percent(15));
        assert_eq!(split.commission_amount, Money::from(2));
        assert_eq!(split.merchant_amount, Money::from(8));
        for amount in [1, 7, 33, 99, 101, 12_345, 9_999_999] {
            for rate in [0, 1, 333, 1000, 1250, 2599, 10_000] {
                let split = split_commission(Money::from(amount), Percentage::from(rate));
                assert_eq!(split.commission_amount + split.merchant_amount, split.order_amount);
                assert!(!split.merchant_amount.is_negative());
            }
        }
    }

    #[test]
    fn zero_rate() {
        let split = split_commission(Money::from_major(500), Percentage::default());
        assert_eq!(split.commission_amount, Money::zero());
        assert_eq!(split.merchant_amount, Money::from_major(500));
    }
}
