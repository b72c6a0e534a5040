use std::fmt::Debug;

use log::*;

use crate::{
    db_types::Product,
    traits::{FulfillmentError, InventoryManagement},
};

/// Direct access to the stock ledger, for stock adjustments made outside of checkout and cancellation.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    /// Takes `quantity` units out of stock. Fails with `InsufficientStock` rather than letting stock go negative.
    pub async fn reserve(&self, product_id: i64, quantity: i64) -> Result<Product, FulfillmentError> {
        let product = self.db.reserve_stock(product_id, quantity).await?;
        debug!("📦️ Reserved {quantity} of product #{product_id}. {} left", product.stock);
        Ok(product)
    }

    pub async fn release(&self, product_id: i64, quantity: i64) -> Result<Product, FulfillmentError> {
        let product = self.db.release_stock(product_id, quantity).await?;
        debug!("📦️ Released {quantity} of product #{product_id}. {} in stock", product.stock);
        Ok(product)
    }
}
