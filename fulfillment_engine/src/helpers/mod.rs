mod commission;
mod order_number;
mod vouchers;

pub use commission::{split_commission, CommissionSplit};
pub use order_number::{is_valid_order_number, new_order_number, random_code};
pub use vouchers::{calculate_discount, validate_voucher, VoucherError};
