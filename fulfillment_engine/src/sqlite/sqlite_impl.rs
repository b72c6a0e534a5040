//! `SqliteDatabase` is the concrete fulfillment engine backend.
//!
//! It implements every trait in [`crate::traits`] by composing the low-level functions in [`super::db`] inside
//! transactions. Each state-changing method opens with its guarding write (see the [`super::db`] module docs) and
//! either commits everything or, by returning early and dropping the transaction, nothing.
use std::{collections::BTreeMap, fmt::Debug};

use chrono::Utc;
use log::*;
use market_common::Money;
use sqlx::{migrate::MigrateError, SqliteConnection, SqlitePool};

use super::db::{
    carts,
    db_url,
    is_unique_violation,
    merchant_payments,
    new_pool,
    orders,
    payments,
    products,
    tracking,
    users,
    vouchers,
    withdrawals,
};
use crate::{
    db_types::{
        Address,
        CartItem,
        DeliveryTracking,
        GatewayPaymentStatus,
        MerchantStatus,
        MerchantWithdrawal,
        NewAddress,
        NewOrder,
        NewUser,
        Order,
        OrderStatus,
        Payment,
        PaymentMethod,
        PaymentStatus,
        Product,
        Role,
        TrackingStatus,
        User,
        WithdrawalStatus,
    },
    helpers::{calculate_discount, new_order_number, random_code, split_commission, validate_voucher, VoucherError},
    market_api::{
        actor::Actor,
        order_objects::{CheckoutRequest, OrderDetails, TrackingWithHistory},
        payment_objects::{GatewayNotification, GatewayVerdict, WebhookOutcome},
        tracking_objects::{DeliveryProof, LocationUpdate, PickupProof, TrackingPatch},
        withdrawal_objects::{MerchantBalance, WithdrawalDecision},
    },
    traits::{
        transition_error,
        ApprovalResult,
        DriverStatistics,
        FulfillmentDatabase,
        FulfillmentError,
        InventoryManagement,
        LocationChange,
        MarketplaceQueries,
        PaymentUpdate,
        WithdrawalManagement,
    },
};

const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `MKT_DATABASE_URL` or the default location.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    // Account, address, catalogue and cart management belong to the surrounding marketplace. These are the minimal
    // writes the engine needs to be driven end to end.

    pub async fn create_user(&self, user: NewUser) -> Result<User, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::insert_user(user, &mut conn).await?)
    }

    pub async fn create_address(&self, address: NewAddress) -> Result<Address, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::insert_address(address, &mut conn).await?)
    }

    pub async fn create_product(
        &self,
        merchant_id: i64,
        name: &str,
        price: Money,
        stock: i64,
    ) -> Result<Product, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::insert_product(merchant_id, name, price, stock, &mut conn).await?)
    }

    pub async fn set_product_active(&self, product_id: i64, is_active: bool) -> Result<Product, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        products::set_product_active(product_id, is_active, &mut conn)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Product"))
    }

    pub async fn set_user_active(&self, user_id: i64, is_active: bool) -> Result<User, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        users::set_active(user_id, is_active, &mut conn).await?.ok_or_else(|| FulfillmentError::not_found("User"))
    }

    pub async fn add_to_cart(
        &self,
        customer_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<CartItem, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(carts::add_to_cart(customer_id, product_id, quantity, &mut conn).await?)
    }

    pub async fn fetch_cart(&self, customer_id: i64) -> Result<Vec<CartItem>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(carts::fetch_cart(customer_id, &mut conn).await?)
    }
}

impl FulfillmentDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn checkout(
        &self,
        customer_id: i64,
        request: &CheckoutRequest,
        shipping_cost: Money,
    ) -> Result<OrderDetails, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let cart = carts::take_cart(customer_id, &mut tx).await?;
        if cart.is_empty() {
            return Err(FulfillmentError::validation("Cart is empty"));
        }
        users::fetch_address_for_user(request.address_id, customer_id, &mut tx)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Address"))?;
        let mut lines = Vec::with_capacity(cart.len());
        for item in &cart {
            let product = products::fetch_product(item.product_id, &mut tx)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| FulfillmentError::not_found("Product"))?;
            lines.push((product, item.quantity));
        }
        let subtotal = lines
            .iter()
            .try_fold(Money::zero(), |acc, (p, qty)| p.price.checked_mul(*qty).and_then(|line| acc.checked_add(line)))
            .filter(|s| s.checked_add(shipping_cost).is_some())
            .ok_or_else(|| FulfillmentError::validation("The order total is too large"))?;
        let (voucher, discount) = match request.normalized_voucher_code() {
            Some(code) => {
                let voucher = vouchers::fetch_voucher_by_code(&code, &mut tx)
                    .await?
                    .ok_or_else(|| FulfillmentError::validation("Invalid voucher code"))?;
                validate_voucher(&voucher, subtotal, Utc::now())?;
                let discount = calculate_discount(&voucher, subtotal);
                (Some(voucher), discount)
            },
            None => (None, Money::zero()),
        };
        let new_order = NewOrder {
            order_number: new_order_number(),
            customer_id,
            address_id: request.address_id,
            subtotal,
            shipping_cost,
            discount,
            payment_method: request.payment_method,
            voucher_id: voucher.as_ref().map(|v| v.id),
            notes: request.notes.clone(),
        };
        let order = insert_order_with_unique_number(new_order, &mut tx).await?;

        let mut merchant_totals = BTreeMap::<i64, Money>::new();
        for (product, quantity) in &lines {
            products::reserve_stock(product.id, *quantity, &mut tx).await?;
            let item = orders::insert_order_item(order.id, product, *quantity, &mut tx).await?;
            *merchant_totals.entry(item.merchant_id).or_default() += item.subtotal;
        }
        for (merchant_id, amount) in merchant_totals {
            let merchant = users::fetch_user(merchant_id, &mut tx)
                .await?
                .ok_or_else(|| FulfillmentError::not_found("Merchant"))?;
            let split = split_commission(amount, merchant.commission_rate);
            merchant_payments::insert_merchant_payment(order.id, merchant_id, merchant.commission_rate, split, &mut tx)
                .await?;
        }

        let new_tracking = tracking::insert_tracking(order.id, &mut tx).await?;
        tracking::insert_history(&new_tracking, TrackingStatus::PendingPayment.default_description(), &mut tx).await?;
        if let Some(v) = &voucher {
            vouchers::increment_usage(v.id, &mut tx)
                .await?
                .ok_or_else(|| VoucherError::UsageLimitReached(v.code.clone()))?;
        }

        let order = match order.payment_method {
            PaymentMethod::Cod => confirm_cash_on_delivery(order, &mut tx).await?,
            PaymentMethod::Midtrans => order,
        };
        let details = order_details(order, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Order {} placed by customer #{customer_id}: {} items, total {}",
            details.order.order_number,
            details.items.len(),
            details.order.total_price
        );
        Ok(details)
    }

    async fn initiate_payment(&self, customer_id: i64, order_id: i64) -> Result<Payment, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::claim_order_for_customer(order_id, customer_id, &mut tx)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Order"))?;
        if order.payment_method == PaymentMethod::Cod {
            return Err(FulfillmentError::validation("COD payment doesn't require online payment"));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(FulfillmentError::validation(format!("Order {} has been cancelled", order.order_number)));
        }
        if order.payment_status == PaymentStatus::Paid {
            return Err(FulfillmentError::validation(format!("Order {} has already been paid", order.order_number)));
        }
        let transaction_id = format!("{}-{}-{}", order.order_number, Utc::now().timestamp(), random_code(4));
        let payment =
            payments::upsert_pending_gateway_payment(order.id, &transaction_id, order.total_price, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment {transaction_id} initiated for order {}", order.order_number);
        Ok(payment)
    }

    async fn apply_gateway_notification(
        &self,
        notification: &GatewayNotification,
    ) -> Result<PaymentUpdate, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::claim_by_transaction_id(&notification.transaction_id, &mut tx)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Payment"))?;
        let order = orders::fetch_order(payment.order_id, &mut tx)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Order"))?;
        let already_paid = order.payment_status == PaymentStatus::Paid;
        let update = match notification.verdict() {
            GatewayVerdict::Success if already_paid && payment.status == GatewayPaymentStatus::Success => {
                PaymentUpdate { outcome: WebhookOutcome::AlreadyConfirmed, order, payment }
            },
            GatewayVerdict::Success if order.status == OrderStatus::Cancelled => {
                let payment =
                    record_gateway_status(payment.id, GatewayPaymentStatus::Success, notification, &mut tx).await?;
                let order = orders::mark_paid(order.id, &mut tx).await?;
                warn!(
                    "🗃️ Payment {} of {} arrived for cancelled order {}. The customer must be refunded.",
                    payment.transaction_id, payment.amount, order.order_number
                );
                PaymentUpdate { outcome: WebhookOutcome::RefundRequired, order, payment }
            },
            GatewayVerdict::Success if already_paid => {
                warn!(
                    "🗃️ Payment {} reports success, but order {} was already paid by another transaction",
                    payment.transaction_id, order.order_number
                );
                PaymentUpdate { outcome: WebhookOutcome::AlreadyConfirmed, order, payment }
            },
            GatewayVerdict::Success => {
                let payment =
                    record_gateway_status(payment.id, GatewayPaymentStatus::Success, notification, &mut tx).await?;
                let order = orders::mark_paid(order.id, &mut tx).await?;
                match tracking::compare_and_set(order.id, TrackingStatus::WaitingMerchant, &mut tx).await? {
                    Some(t) => {
                        tracking::insert_history(&t, TrackingStatus::WaitingMerchant.default_description(), &mut tx)
                            .await?;
                    },
                    None => warn!("🗃️ Order {} was paid after tracking left pending_payment", order.order_number),
                }
                merchant_payments::settle_ready(order.id, &mut tx).await?;
                PaymentUpdate { outcome: WebhookOutcome::Confirmed, order, payment }
            },
            GatewayVerdict::Pending if payment.status == GatewayPaymentStatus::Pending => {
                let payment =
                    record_gateway_status(payment.id, GatewayPaymentStatus::Pending, notification, &mut tx).await?;
                PaymentUpdate { outcome: WebhookOutcome::Pending, order, payment }
            },
            GatewayVerdict::Failure if !already_paid && payment.status != GatewayPaymentStatus::Success => {
                let payment =
                    record_gateway_status(payment.id, GatewayPaymentStatus::Failed, notification, &mut tx).await?;
                let order = orders::mark_payment_failed(order.id, &mut tx).await?.unwrap_or(order);
                PaymentUpdate { outcome: WebhookOutcome::Failed, order, payment }
            },
            _ => PaymentUpdate { outcome: WebhookOutcome::Ignored, order, payment },
        };
        tx.commit().await?;
        debug!(
            "🗃️ Notification [{}] for payment {}: {}",
            notification.transaction_status, update.payment.transaction_id, update.outcome
        );
        Ok(update)
    }

    async fn approve_order(&self, merchant_id: i64, order_id: i64) -> Result<ApprovalResult, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let ledger = merchant_payments::claim(order_id, merchant_id, &mut tx)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Order"))?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| FulfillmentError::not_found("Order"))?;
        if order.status == OrderStatus::Cancelled {
            return Err(FulfillmentError::InvalidTransition(format!(
                "Order {} has been cancelled",
                order.order_number
            )));
        }
        if order.payment_status != PaymentStatus::Paid {
            return Err(FulfillmentError::PaymentNotConfirmed(order.order_number.to_string()));
        }
        if ledger.approved_at.is_some() {
            return Err(FulfillmentError::AlreadyProcessed(format!(
                "You have already approved order {}",
                order.order_number
            )));
        }
        let current = tracking::fetch_for_order(order_id, &mut tx)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Order"))?;
        if current.status != TrackingStatus::WaitingMerchant {
            return Err(transition_error(current.status, TrackingStatus::WaitingDriver));
        }
        let approved = merchant_payments::record_approval(order_id, merchant_id, &mut tx).await?.ok_or_else(|| {
            FulfillmentError::AlreadyProcessed(format!("You have already approved order {}", order.order_number))
        })?;
        let settled = merchant_payments::settle_ready(order_id, &mut tx).await?;
        let merchant_payment = settled.into_iter().find(|p| p.merchant_id == merchant_id).unwrap_or(approved);
        let order_approved = merchant_payments::all_approved(order_id, &mut tx).await?;
        let order = if order_approved {
            let t = tracking::compare_and_set(order_id, TrackingStatus::WaitingDriver, &mut tx)
                .await?
                .ok_or_else(|| transition_error(current.status, TrackingStatus::WaitingDriver))?;
            tracking::insert_history(&t, TrackingStatus::WaitingDriver.default_description(), &mut tx).await?;
            orders::mark_approved(order_id, &mut tx).await?
        } else {
            order
        };
        tx.commit().await?;
        debug!(
            "🗃️ Merchant #{merchant_id} approved order {}. All merchants approved: {order_approved}",
            order.order_number
        );
        Ok(ApprovalResult { order, merchant_payment, order_approved })
    }

    async fn reject_order(&self, merchant_id: i64, order_id: i64, reason: &str) -> Result<Order, FulfillmentError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(FulfillmentError::validation("A reason is required to reject an order"));
        }
        let mut tx = self.pool.begin().await?;
        let ledger = merchant_payments::claim(order_id, merchant_id, &mut tx)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Order"))?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| FulfillmentError::not_found("Order"))?;
        if order.status == OrderStatus::Cancelled {
            return Err(FulfillmentError::AlreadyProcessed(format!(
                "Order {} has already been cancelled",
                order.order_number
            )));
        }
        if order.payment_status != PaymentStatus::Paid {
            return Err(FulfillmentError::PaymentNotConfirmed(order.order_number.to_string()));
        }
        if ledger.approved_at.is_some() {
            return Err(FulfillmentError::AlreadyProcessed(format!(
                "You have already approved order {}",
                order.order_number
            )));
        }
        let cancelled = match tracking::claim_in_status(order_id, TrackingStatus::WaitingMerchant, &mut tx).await? {
            Some(_) => tracking::compare_and_set(order_id, TrackingStatus::Cancelled, &mut tx).await?,
            None => None,
        };
        let cancelled = match cancelled {
            Some(t) => t,
            None => return Err(tracking_miss(order_id, TrackingStatus::Cancelled, &mut tx).await),
        };
        tracking::insert_history(&cancelled, &format!("Order rejected by merchant: {reason}"), &mut tx).await?;
        let order = annul(order_id, reason, Some(MerchantStatus::Rejected), &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Merchant #{merchant_id} rejected order {}. {reason}", order.order_number);
        Ok(order)
    }

    async fn cancel_order(&self, actor: &Actor, order_id: i64, reason: &str) -> Result<Order, FulfillmentError> {
        let default_reason = match actor.role {
            Role::Customer => "Cancelled by customer",
            Role::Admin => "Cancelled by admin",
            _ => return Err(FulfillmentError::not_found("Order")),
        };
        let mut tx = self.pool.begin().await?;
        let current = tracking::claim(order_id, &mut tx).await?.ok_or_else(|| FulfillmentError::not_found("Order"))?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| FulfillmentError::not_found("Order"))?;
        if actor.role == Role::Customer && order.customer_id != actor.id {
            return Err(FulfillmentError::not_found("Order"));
        }
        let cancelled = tracking::compare_and_set(order_id, TrackingStatus::Cancelled, &mut tx)
            .await?
            .ok_or_else(|| transition_error(current.status, TrackingStatus::Cancelled))?;
        let reason = Some(reason.trim()).filter(|r| !r.is_empty()).unwrap_or(default_reason);
        tracking::insert_history(&cancelled, &format!("Order cancelled: {reason}"), &mut tx).await?;
        let order = annul(order_id, reason, None, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {} cancelled by {actor}. {reason}", order.order_number);
        if order.payment_status == PaymentStatus::Paid {
            warn!("🗃️ Order {} was paid before it was cancelled. The customer must be refunded.", order.order_number);
        }
        Ok(order)
    }

    async fn accept_delivery(
        &self,
        driver_id: i64,
        order_id: i64,
        max_active_deliveries: i64,
    ) -> Result<DeliveryTracking, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let assigned = match tracking::assign_driver(order_id, driver_id, &mut tx).await? {
            Some(t) => t,
            None => {
                let err = match tracking::fetch_for_order(order_id, &mut tx).await? {
                    None => FulfillmentError::not_found("Order"),
                    Some(t) if t.driver_id.is_some() => {
                        FulfillmentError::InvalidTransition(format!("Order #{order_id} has already been assigned"))
                    },
                    Some(t) => transition_error(t.status, TrackingStatus::DriverAssigned),
                };
                return Err(err);
            },
        };
        let driver = users::fetch_user_with_role(driver_id, Role::Driver, &mut tx)
            .await?
            .filter(|d| d.is_active)
            .ok_or_else(|| FulfillmentError::not_found("Driver"))?;
        let active = tracking::count_active_for_driver(driver_id, &mut tx).await?;
        if active > max_active_deliveries {
            debug!("🗃️ Driver #{driver_id} already has {} active deliveries", active - 1);
            return Err(FulfillmentError::DriverCapacityExceeded(max_active_deliveries));
        }
        tracking::insert_history(&assigned, &format!("Driver {} accepted the order", driver.name), &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Driver #{driver_id} ({}) accepted order #{order_id}", driver.name);
        Ok(assigned)
    }

    async fn decline_delivery(
        &self,
        driver_id: i64,
        order_id: i64,
        reason: &str,
    ) -> Result<DeliveryTracking, FulfillmentError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(FulfillmentError::validation("A reason is required to reject an order"));
        }
        let mut tx = self.pool.begin().await?;
        let waiting = match tracking::claim_in_status(order_id, TrackingStatus::WaitingDriver, &mut tx).await? {
            Some(t) => t,
            None => {
                let err = match tracking::fetch_for_order(order_id, &mut tx).await? {
                    None => FulfillmentError::not_found("Order"),
                    Some(t) => FulfillmentError::InvalidTransition(format!(
                        "Order #{order_id} is no longer waiting for a driver. It is {}",
                        t.status
                    )),
                };
                return Err(err);
            },
        };
        let driver = users::fetch_user_with_role(driver_id, Role::Driver, &mut tx)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("Driver"))?;
        tracking::insert_history(&waiting, &format!("Driver {} rejected: {reason}", driver.name), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Driver #{driver_id} declined order #{order_id}. {reason}");
        Ok(waiting)
    }

    async fn update_location(
        &self,
        driver_id: i64,
        order_id: i64,
        update: &LocationUpdate,
    ) -> Result<LocationChange, FulfillmentError> {
        validate_coordinates(update.latitude, update.longitude)?;
        if let Some(status) = update.status {
            if !LocationUpdate::is_permitted_status(status) {
                return Err(FulfillmentError::validation(format!(
                    "Drivers can only report on_the_way, arrived or delivered, not {status}"
                )));
            }
        }
        let mut tx = self.pool.begin().await?;
        let notes = update.notes.as_deref();
        let positioned =
            match tracking::update_position(order_id, driver_id, update.latitude, update.longitude, notes, &mut tx)
                .await?
            {
                Some(t) => t,
                None => {
                    let err = match tracking::fetch_for_order(order_id, &mut tx).await? {
                        Some(t) if t.driver_id == Some(driver_id) => FulfillmentError::InvalidTransition(format!(
                            "Location updates are only accepted for active deliveries. This delivery is {}",
                            t.status
                        )),
                        _ => FulfillmentError::not_found("Delivery"),
                    };
                    return Err(err);
                },
            };
        let previous_status = positioned.status;
        let tracking = match update.status {
            Some(status) if status != previous_status => {
                let patch = TrackingPatch::from(update);
                driver_transition(order_id, driver_id, status, &patch, notes, &mut tx).await?
            },
            _ => positioned,
        };
        tx.commit().await?;
        trace!("🗃️ Driver #{driver_id} is at ({}, {}) for order #{order_id}", update.latitude, update.longitude);
        Ok(LocationChange { tracking, previous_status })
    }

    async fn start_delivery(
        &self,
        driver_id: i64,
        order_id: i64,
        proof: &PickupProof,
    ) -> Result<DeliveryTracking, FulfillmentError> {
        validate_coordinates(proof.latitude, proof.longitude)?;
        let mut tx = self.pool.begin().await?;
        let patch = TrackingPatch::from(proof);
        let tracking =
            driver_transition(order_id, driver_id, TrackingStatus::OnTheWay, &patch, proof.notes.as_deref(), &mut tx)
                .await?;
        tx.commit().await?;
        info!("🗃️ Driver #{driver_id} picked up order #{order_id}");
        Ok(tracking)
    }

    async fn complete_delivery(
        &self,
        driver_id: i64,
        order_id: i64,
        proof: &DeliveryProof,
    ) -> Result<DeliveryTracking, FulfillmentError> {
        validate_coordinates(proof.latitude, proof.longitude)?;
        if proof.delivery_photo.trim().is_empty() {
            return Err(FulfillmentError::validation("A delivery photo is required to complete a delivery"));
        }
        let mut tx = self.pool.begin().await?;
        let patch = TrackingPatch::from(proof);
        let tracking =
            driver_transition(order_id, driver_id, TrackingStatus::Delivered, &patch, proof.notes.as_deref(), &mut tx)
                .await?;
        tx.commit().await?;
        info!("🗃️ Driver #{driver_id} delivered order #{order_id}");
        Ok(tracking)
    }

    async fn close(&mut self) -> Result<(), FulfillmentError> {
        self.pool.close().await;
        Ok(())
    }
}

impl MarketplaceQueries for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(order_id, &mut conn).await?)
    }

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_number(order_number, &mut conn).await?)
    }

    async fn fetch_order_details(&self, order_id: i64) -> Result<Option<OrderDetails>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        match orders::fetch_order(order_id, &mut conn).await? {
            Some(order) => Ok(Some(order_details(order, &mut conn).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_customer(customer_id, &mut conn).await?)
    }

    async fn fetch_orders_for_merchant(
        &self,
        merchant_id: i64,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_merchant(merchant_id, status, &mut conn).await?)
    }

    async fn fetch_tracking(&self, order_id: i64) -> Result<Option<TrackingWithHistory>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        tracking_with_history(order_id, &mut conn).await
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_available_deliveries(&self) -> Result<Vec<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_available_for_delivery(&mut conn).await?)
    }

    async fn fetch_active_deliveries(&self, driver_id: i64) -> Result<Vec<DeliveryTracking>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(tracking::fetch_active_for_driver(driver_id, &mut conn).await?)
    }

    async fn fetch_delivery_history(&self, driver_id: i64) -> Result<Vec<DeliveryTracking>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(tracking::fetch_finished_for_driver(driver_id, &mut conn).await?)
    }

    async fn fetch_driver_statistics(&self, driver_id: i64) -> Result<DriverStatistics, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(tracking::driver_statistics(driver_id, &mut conn).await?)
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::fetch_user(user_id, &mut conn).await?)
    }

    async fn fetch_active_drivers(&self) -> Result<Vec<User>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::fetch_active_drivers(&mut conn).await?)
    }

    async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::fetch_address(address_id, &mut conn).await?)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(product_id, &mut conn).await?)
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn reserve_stock(&self, product_id: i64, quantity: i64) -> Result<Product, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let product = products::reserve_stock(product_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn release_stock(&self, product_id: i64, quantity: i64) -> Result<Product, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let product = products::release_stock(product_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }
}

impl WithdrawalManagement for SqliteDatabase {
    async fn request_withdrawal(
        &self,
        merchant_id: i64,
        amount: Money,
        notes: Option<&str>,
    ) -> Result<MerchantWithdrawal, FulfillmentError> {
        if !amount.is_positive() {
            return Err(FulfillmentError::validation("Withdrawal amount must be positive"));
        }
        let mut tx = self.pool.begin().await?;
        let withdrawal = match withdrawals::insert_withdrawal(merchant_id, amount, notes, &mut tx).await {
            Ok(Some(w)) => w,
            Ok(None) => return Err(FulfillmentError::not_found("Merchant")),
            Err(e) if is_unique_violation(&e) => {
                return Err(FulfillmentError::validation("You already have a pending withdrawal request"));
            },
            Err(e) => return Err(e.into()),
        };
        let merchant =
            users::fetch_user(merchant_id, &mut tx).await?.ok_or_else(|| FulfillmentError::not_found("Merchant"))?;
        if !merchant.has_bank_details() {
            return Err(FulfillmentError::validation(
                "Please complete your bank details before requesting a withdrawal",
            ));
        }
        // The new request already counts as a pending withdrawal here
        let balance = merchant_payments::balance(merchant_id, &mut tx).await?.with_available_balance();
        if balance.available_balance.is_negative() {
            return Err(FulfillmentError::InsufficientBalance(balance.available_balance + amount));
        }
        tx.commit().await?;
        info!("🗃️ Merchant #{merchant_id} requested a withdrawal of {amount}");
        Ok(withdrawal)
    }

    async fn process_withdrawal(
        &self,
        admin_id: i64,
        withdrawal_id: i64,
        decision: &WithdrawalDecision,
    ) -> Result<MerchantWithdrawal, FulfillmentError> {
        decision.validate()?;
        let mut tx = self.pool.begin().await?;
        let withdrawal = match withdrawals::apply_decision(withdrawal_id, admin_id, decision, &mut tx).await? {
            Some(w) => w,
            None => {
                let err = match withdrawals::fetch_withdrawal(withdrawal_id, &mut tx).await? {
                    None => FulfillmentError::not_found("Withdrawal"),
                    Some(w) => FulfillmentError::AlreadyProcessed(format!(
                        "Withdrawal #{} has already been {}",
                        w.id, w.status
                    )),
                };
                return Err(err);
            },
        };
        tx.commit().await?;
        info!("🗃️ Admin #{admin_id} marked withdrawal #{withdrawal_id} as {}", withdrawal.status);
        Ok(withdrawal)
    }

    async fn cancel_withdrawal(
        &self,
        merchant_id: i64,
        withdrawal_id: i64,
    ) -> Result<MerchantWithdrawal, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let withdrawal = match withdrawals::cancel_pending(withdrawal_id, merchant_id, &mut tx).await? {
            Some(w) => w,
            None => {
                let err = match withdrawals::fetch_withdrawal(withdrawal_id, &mut tx).await? {
                    Some(w) if w.merchant_id == merchant_id => FulfillmentError::AlreadyProcessed(format!(
                        "Only pending withdrawals can be cancelled. Withdrawal #{} is {}",
                        w.id, w.status
                    )),
                    _ => FulfillmentError::not_found("Withdrawal"),
                };
                return Err(err);
            },
        };
        tx.commit().await?;
        debug!("🗃️ Merchant #{merchant_id} cancelled withdrawal #{withdrawal_id}");
        Ok(withdrawal)
    }

    async fn fetch_balance(&self, merchant_id: i64) -> Result<MerchantBalance, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(merchant_payments::balance(merchant_id, &mut conn).await?.with_available_balance())
    }

    async fn fetch_withdrawals_for_merchant(
        &self,
        merchant_id: i64,
    ) -> Result<Vec<MerchantWithdrawal>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(withdrawals::fetch_for_merchant(merchant_id, &mut conn).await?)
    }

    async fn search_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<MerchantWithdrawal>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(withdrawals::search(status, &mut conn).await?)
    }
}

//--------------------------------------   Transaction steps   ------------------------------------------------------

async fn record_gateway_status(
    payment_id: i64,
    status: GatewayPaymentStatus,
    notification: &GatewayNotification,
    conn: &mut SqliteConnection,
) -> Result<Payment, FulfillmentError> {
    let payment_type = notification.payment_type.as_deref();
    let metadata = notification.to_metadata();
    Ok(payments::update_status(payment_id, status, payment_type, metadata.as_deref(), conn).await?)
}

async fn insert_order_with_unique_number(
    mut order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<Order, FulfillmentError> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        match orders::insert_order(&order, conn).await {
            Ok(inserted) => return Ok(inserted),
            Err(e) if is_unique_violation(&e) => {
                warn!("🗃️ Order number {} is already taken. Generating another", order.order_number);
                order.order_number = new_order_number();
            },
            Err(e) => return Err(e.into()),
        }
    }
    Err(FulfillmentError::DatabaseError(format!(
        "Could not allocate a unique order number after {ORDER_NUMBER_ATTEMPTS} attempts"
    )))
}

/// Cash-on-delivery orders are confirmed on the spot: the order is marked paid, the cash payment is recorded as
/// pending collection, and tracking moves straight on to `waiting_merchant`.
async fn confirm_cash_on_delivery(order: Order, conn: &mut SqliteConnection) -> Result<Order, FulfillmentError> {
    let transaction_id = format!("{}-COD", order.order_number);
    payments::insert_payment(order.id, PaymentMethod::Cod, &transaction_id, order.total_price, conn).await?;
    let order = orders::mark_paid(order.id, conn).await?;
    let t = tracking::compare_and_set(order.id, TrackingStatus::WaitingMerchant, conn)
        .await?
        .ok_or_else(|| transition_error(TrackingStatus::PendingPayment, TrackingStatus::WaitingMerchant))?;
    tracking::insert_history(&t, "Cash on delivery order confirmed, waiting for merchant approval", conn).await?;
    Ok(order)
}

/// Everything a cancellation or rejection does besides moving the tracking row: restore stock for every item, fail the
/// merchant ledger and any pending payments, and close the order.
async fn annul(
    order_id: i64,
    reason: &str,
    merchant_status: Option<MerchantStatus>,
    conn: &mut SqliteConnection,
) -> Result<Order, FulfillmentError> {
    for item in orders::fetch_items(order_id, conn).await? {
        products::release_stock(item.product_id, item.quantity, conn).await?;
    }
    merchant_payments::fail_all(order_id, conn).await?;
    payments::fail_pending(order_id, conn).await?;
    Ok(orders::cancel(order_id, reason, merchant_status, conn).await?)
}

/// Applies a driver-initiated transition and its side effects on the order. Only the assigned driver's delivery
/// matches.
async fn driver_transition(
    order_id: i64,
    driver_id: i64,
    to: TrackingStatus,
    patch: &TrackingPatch,
    description: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<DeliveryTracking, FulfillmentError> {
    let moved = match tracking::transition(order_id, Some(driver_id), to, patch, conn).await? {
        Some(t) => t,
        None => return Err(tracking_miss_for_driver(order_id, driver_id, to, conn).await),
    };
    let description = description.map(str::trim).filter(|d| !d.is_empty()).unwrap_or(to.default_description());
    tracking::insert_history(&moved, description, conn).await?;
    match to {
        TrackingStatus::OnTheWay => {
            orders::set_status(order_id, OrderStatus::Shipped, conn).await?;
        },
        TrackingStatus::Delivered => {
            orders::set_status(order_id, OrderStatus::Delivered, conn).await?;
            if let Some(cash) = payments::collect_cash(order_id, conn).await? {
                debug!("🗃️ Cash payment {} of {} collected", cash.transaction_id, cash.amount);
            }
        },
        _ => {},
    }
    Ok(moved)
}

/// Explains why a compare-and-set on the tracking row matched nothing.
async fn tracking_miss(order_id: i64, to: TrackingStatus, conn: &mut SqliteConnection) -> FulfillmentError {
    match tracking::fetch_for_order(order_id, conn).await {
        Ok(Some(t)) => transition_error(t.status, to),
        Ok(None) => FulfillmentError::not_found("Order"),
        Err(e) => e.into(),
    }
}

/// As [`tracking_miss`], but a delivery assigned to someone else is reported as not found.
async fn tracking_miss_for_driver(
    order_id: i64,
    driver_id: i64,
    to: TrackingStatus,
    conn: &mut SqliteConnection,
) -> FulfillmentError {
    match tracking::fetch_for_order(order_id, conn).await {
        Ok(Some(t)) if t.driver_id == Some(driver_id) => transition_error(t.status, to),
        Ok(_) => FulfillmentError::not_found("Delivery"),
        Err(e) => e.into(),
    }
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), FulfillmentError> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(FulfillmentError::validation(format!("Invalid coordinates ({latitude}, {longitude})")));
    }
    Ok(())
}

async fn tracking_with_history(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<TrackingWithHistory>, FulfillmentError> {
    match tracking::fetch_for_order(order_id, conn).await? {
        Some(t) => {
            let histories = tracking::fetch_histories(t.id, conn).await?;
            Ok(Some(TrackingWithHistory { tracking: t, histories }))
        },
        None => Ok(None),
    }
}

async fn order_details(order: Order, conn: &mut SqliteConnection) -> Result<OrderDetails, FulfillmentError> {
    let items = orders::fetch_items(order.id, conn).await?;
    let merchant_payments = merchant_payments::fetch_for_order(order.id, conn).await?;
    let payments = payments::fetch_for_order(order.id, conn).await?;
    let tracking = tracking_with_history(order.id, conn).await?;
    Ok(OrderDetails { order, items, merchant_payments, payments, tracking })
}
