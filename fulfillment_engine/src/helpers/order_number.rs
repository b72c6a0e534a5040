use rand::{distributions::Uniform, Rng};
use regex::Regex;

use crate::db_types::OrderNumber;

const ORDER_NUMBER_PREFIX: &str = "ORD-";
const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a fresh order number: `ORD-` followed by 10 random uppercase alphanumerics.
///
/// Uniqueness is enforced by the database. Callers retry on a collision.
pub fn new_order_number() -> OrderNumber {
    OrderNumber(format!("{ORDER_NUMBER_PREFIX}{}", random_code(10)))
}

/// A random string of uppercase letters and digits
pub fn random_code(len: usize) -> String {
    let dist = Uniform::from(0..ORDER_NUMBER_CHARSET.len());
    rand::thread_rng().sample_iter(dist).take(len).map(|i| ORDER_NUMBER_CHARSET[i] as char).collect()
}

/// True if `s` looks like an order number issued by [`new_order_number`].
pub fn is_valid_order_number(s: &str) -> bool {
    match Regex::new(r"^ORD-[A-Z0-9]{10}$") {
        Ok(re) => re.is_match(s),
        Err(_) => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_numbers_are_well_formed() {
        for _ in 0..100 {
            let number = new_order_number();
            assert!(is_valid_order_number(number.as_str()), "{number} is malformed");
        }
    }

    #[test]
    fn validation() {
        assert!(is_valid_order_number("ORD-ABCDE12345"));
        assert!(!is_valid_order_number("ORD-abcde12345"));
        assert!(!is_valid_order_number("ORD-ABCDE1234"));
        assert!(!is_valid_order_number("XYZ-ABCDE12345"));
    }
}
