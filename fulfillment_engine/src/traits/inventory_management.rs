use crate::{db_types::Product, traits::FulfillmentError};

/// Stock control. Both operations are single atomic statements and are safe under concurrent callers for the same
/// product.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Takes `quantity` units out of stock. Fails with `InsufficientStock`, leaving stock unchanged, if fewer than
    /// `quantity` units remain.
    async fn reserve_stock(&self, product_id: i64, quantity: i64) -> Result<Product, FulfillmentError>;

    /// Puts `quantity` units back into stock.
    async fn release_stock(&self, product_id: i64, quantity: i64) -> Result<Product, FulfillmentError>;
}
