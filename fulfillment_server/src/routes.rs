//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Every handler under `/api` sits behind the identity middleware, so the caller is known by the time the handler
//! runs. The roles allowed on each route are declared with the `route!` macro and checked by the ACL middleware. The
//! engine then applies ownership: an order that belongs to someone else is reported as not found.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every database call here is async, so handlers never block.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use fulfillment_engine::{
    db_types::Role,
    order_objects::{CheckoutRequest, MerchantOrderQuery},
    payment_objects::GatewayNotification,
    tracking_objects::{DeliveryProof, LocationUpdate, PickupProof},
    traits::RoutePlanner,
    withdrawal_objects::{WithdrawalDecision, WithdrawalRequest},
    DeliveryApi,
    FulfillmentDatabase,
    MarketplaceApi,
    MarketplaceQueries,
    OrderFlowApi,
    WithdrawalApi,
    WithdrawalManagement,
};
use log::*;

use crate::{
    auth::ActorClaims,
    config::ServerOptions,
    data_objects::{CancelParams, JsonResponse, RejectParams, WithdrawalSearch},
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Each trait bound becomes a type parameter on the route struct, in the same order as the handler's type parameters.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payment webhook  ----------------------------------------------------
route!(payment_webhook => Post "/webhook" impl FulfillmentDatabase);
/// Route handler for the payment gateway's status notifications.
///
/// The HMAC middleware has already verified the body signature. Redelivered notifications are answered with success,
/// so that the gateway stops retrying.
pub async fn payment_webhook<B>(
    req: HttpRequest,
    body: web::Json<GatewayNotification>,
    api: web::Data<OrderFlowApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where B: FulfillmentDatabase
{
    let notification = body.into_inner();
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    info!(
        "💻️ Payment notification for {} ({}) from {}",
        notification.transaction_id,
        notification.transaction_status,
        peer.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown address".into())
    );
    let update = api.process_gateway_notification(notification).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(update.outcome)))
}

//----------------------------------------------   Customer orders  ----------------------------------------------------
route!(checkout => Post "/checkout" impl FulfillmentDatabase where requires [Role::Customer]);
/// Turns the caller's cart into an order. The line items come from the cart; the body names the delivery address,
/// the payment method and, optionally, a voucher code and notes.
pub async fn checkout<B>(
    claims: ActorClaims,
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: FulfillmentDatabase
{
    debug!("💻️ POST checkout for customer #{}", claims.id);
    let details = api.checkout(claims.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(details))
}

route!(my_orders => Get "/orders" impl MarketplaceQueries where requires [Role::Customer]);
pub async fn my_orders<B>(claims: ActorClaims, api: web::Data<MarketplaceApi<B>>) -> Result<HttpResponse, ServerError>
where B: MarketplaceQueries
{
    debug!("💻️ GET my_orders for customer #{}", claims.id);
    let orders = api.orders_for_customer(claims.id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_number => Get "/orders/number/{order_number}" impl MarketplaceQueries where requires [Role::Customer, Role::Merchant, Role::Driver, Role::Admin]);
pub async fn order_by_number<B>(
    claims: ActorClaims,
    path: web::Path<String>,
    api: web::Data<MarketplaceApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: MarketplaceQueries
{
    let order_number = path.into_inner();
    debug!("💻️ GET order {order_number} for {}", claims.actor());
    let details = api.order_details_by_number(&claims.actor(), &order_number).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(order_by_id => Get "/orders/{id}" impl MarketplaceQueries where requires [Role::Customer, Role::Merchant, Role::Driver, Role::Admin]);
/// Full order details: the order, its items, the merchant ledger entries, payments and tracking.
///
/// Customers see their own orders, merchants the orders holding their items and drivers the orders assigned to them
/// (or waiting for one). Any other order id returns 404, whether it exists or not.
pub async fn order_by_id<B>(
    claims: ActorClaims,
    path: web::Path<i64>,
    api: web::Data<MarketplaceApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: MarketplaceQueries
{
    let order_id = path.into_inner();
    debug!("💻️ GET order #{order_id} for {}", claims.actor());
    let details = api.order_details(&claims.actor(), order_id).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(cancel_order => Post "/orders/{id}/cancel" impl FulfillmentDatabase where requires [Role::Customer, Role::Admin]);
pub async fn cancel_order<B>(
    claims: ActorClaims,
    path: web::Path<i64>,
    body: Option<web::Json<CancelParams>>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: FulfillmentDatabase
{
    let order_id = path.into_inner();
    let params = body.map(web::Json::into_inner).unwrap_or_default();
    debug!("💻️ POST cancel order #{order_id} by {}", claims.actor());
    let order = api.cancel_order(&claims.actor(), order_id, &params.reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(pay_order => Post "/orders/{id}/pay" impl FulfillmentDatabase where requires [Role::Customer]);
/// Opens (or refreshes) the gateway payment for an unpaid order and returns it. The client hands the transaction id to
/// the gateway's checkout.
pub async fn pay_order<B>(
    claims: ActorClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: FulfillmentDatabase
{
    let order_id = path.into_inner();
    debug!("💻️ POST pay order #{order_id} by customer #{}", claims.id);
    let payment = api.initiate_payment(claims.id, order_id).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(order_tracking => Get "/orders/{id}/tracking" impl MarketplaceQueries where requires [Role::Customer, Role::Merchant, Role::Driver, Role::Admin]);
pub async fn order_tracking<B>(
    claims: ActorClaims,
    path: web::Path<i64>,
    api: web::Data<MarketplaceApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: MarketplaceQueries
{
    let order_id = path.into_inner();
    trace!("💻️ GET tracking for order #{order_id} for {}", claims.actor());
    let view = api.tracking(&claims.actor(), order_id).await?;
    Ok(HttpResponse::Ok().json(view))
}

route!(driver_location => Get "/orders/{id}/driver-location" impl FulfillmentDatabase, RoutePlanner where requires [Role::Customer]);
pub async fn driver_location<B, R>(
    claims: ActorClaims,
    path: web::Path<i64>,
    api: web::Data<DeliveryApi<B, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    let order_id = path.into_inner();
    trace!("💻️ GET driver location for order #{order_id} for customer #{}", claims.id);
    let location = api.driver_location(claims.id, order_id).await?;
    Ok(HttpResponse::Ok().json(location))
}

//----------------------------------------------   Merchants  ----------------------------------------------------
route!(merchant_orders => Get "/merchant/orders" impl MarketplaceQueries where requires [Role::Merchant]);
/// Orders holding at least one of the merchant's items, newest first. Filter with `?status=paid` and so on.
pub async fn merchant_orders<B>(
    claims: ActorClaims,
    query: web::Query<MerchantOrderQuery>,
    api: web::Data<MarketplaceApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: MarketplaceQueries
{
    debug!("💻️ GET orders for merchant #{}", claims.id);
    let orders = api.orders_for_merchant(claims.id, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(approve_order => Post "/merchant/orders/{id}/approve" impl FulfillmentDatabase where requires [Role::Merchant]);
pub async fn approve_order<B>(
    claims: ActorClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: FulfillmentDatabase
{
    let order_id = path.into_inner();
    debug!("💻️ POST approve order #{order_id} by merchant #{}", claims.id);
    let result = api.approve_order(claims.id, order_id).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(reject_order => Post "/merchant/orders/{id}/reject" impl FulfillmentDatabase where requires [Role::Merchant]);
pub async fn reject_order<B>(
    claims: ActorClaims,
    path: web::Path<i64>,
    body: web::Json<RejectParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: FulfillmentDatabase
{
    let order_id = path.into_inner();
    debug!("💻️ POST reject order #{order_id} by merchant #{}", claims.id);
    let order = api.reject_order(claims.id, order_id, &body.reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(merchant_balance => Get "/merchant/balance" impl WithdrawalManagement where requires [Role::Merchant]);
pub async fn merchant_balance<B>(
    claims: ActorClaims,
    api: web::Data<WithdrawalApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: WithdrawalManagement
{
    debug!("💻️ GET balance for merchant #{}", claims.id);
    let balance = api.balance(claims.id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(my_withdrawals => Get "/merchant/withdrawals" impl WithdrawalManagement where requires [Role::Merchant]);
pub async fn my_withdrawals<B>(claims: ActorClaims, api: web::Data<WithdrawalApi<B>>) -> Result<HttpResponse, ServerError>
where B: WithdrawalManagement
{
    debug!("💻️ GET withdrawals for merchant #{}", claims.id);
    let withdrawals = api.withdrawals_for_merchant(claims.id).await?;
    Ok(HttpResponse::Ok().json(withdrawals))
}

route!(request_withdrawal => Post "/merchant/withdrawals" impl WithdrawalManagement where requires [Role::Merchant]);
pub async fn request_withdrawal<B>(
    claims: ActorClaims,
    body: web::Json<WithdrawalRequest>,
    api: web::Data<WithdrawalApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: WithdrawalManagement
{
    debug!("💻️ POST withdrawal of {} for merchant #{}", body.amount, claims.id);
    let withdrawal = api.request_withdrawal(claims.id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(withdrawal))
}

route!(cancel_withdrawal => Post "/merchant/withdrawals/{id}/cancel" impl WithdrawalManagement where requires [Role::Merchant]);
pub async fn cancel_withdrawal<B>(
    claims: ActorClaims,
    path: web::Path<i64>,
    api: web::Data<WithdrawalApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: WithdrawalManagement
{
    let withdrawal_id = path.into_inner();
    debug!("💻️ POST cancel withdrawal #{withdrawal_id} for merchant #{}", claims.id);
    let withdrawal = api.cancel_withdrawal(claims.id, withdrawal_id).await?;
    Ok(HttpResponse::Ok().json(withdrawal))
}

//----------------------------------------------   Drivers  ----------------------------------------------------
route!(available_orders => Get "/driver/orders/available" impl FulfillmentDatabase, RoutePlanner where requires [Role::Driver]);
pub async fn available_orders<B, R>(api: web::Data<DeliveryApi<B, R>>) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    trace!("💻️ GET available orders");
    let orders = api.available_orders().await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(active_deliveries => Get "/driver/deliveries" impl FulfillmentDatabase, RoutePlanner where requires [Role::Driver]);
pub async fn active_deliveries<B, R>(
    claims: ActorClaims,
    api: web::Data<DeliveryApi<B, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    trace!("💻️ GET active deliveries for driver #{}", claims.id);
    let deliveries = api.active_deliveries(claims.id).await?;
    Ok(HttpResponse::Ok().json(deliveries))
}

route!(delivery_history => Get "/driver/history" impl FulfillmentDatabase, RoutePlanner where requires [Role::Driver]);
pub async fn delivery_history<B, R>(
    claims: ActorClaims,
    api: web::Data<DeliveryApi<B, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    trace!("💻️ GET delivery history for driver #{}", claims.id);
    let deliveries = api.delivery_history(claims.id).await?;
    Ok(HttpResponse::Ok().json(deliveries))
}

route!(driver_statistics => Get "/driver/statistics" impl FulfillmentDatabase, RoutePlanner where requires [Role::Driver]);
pub async fn driver_statistics<B, R>(
    claims: ActorClaims,
    api: web::Data<DeliveryApi<B, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    trace!("💻️ GET statistics for driver #{}", claims.id);
    let stats = api.statistics(claims.id).await?;
    Ok(HttpResponse::Ok().json(stats))
}

route!(accept_delivery => Post "/driver/orders/{id}/accept" impl FulfillmentDatabase, RoutePlanner where requires [Role::Driver]);
pub async fn accept_delivery<B, R>(
    claims: ActorClaims,
    path: web::Path<i64>,
    api: web::Data<DeliveryApi<B, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    let order_id = path.into_inner();
    debug!("💻️ POST accept order #{order_id} by driver #{}", claims.id);
    let tracking = api.accept_order(claims.id, order_id).await?;
    Ok(HttpResponse::Ok().json(tracking))
}

route!(decline_delivery => Post "/driver/orders/{id}/reject" impl FulfillmentDatabase, RoutePlanner where requires [Role::Driver]);
pub async fn decline_delivery<B, R>(
    claims: ActorClaims,
    path: web::Path<i64>,
    body: web::Json<RejectParams>,
    api: web::Data<DeliveryApi<B, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    let order_id = path.into_inner();
    debug!("💻️ POST decline order #{order_id} by driver #{}", claims.id);
    let tracking = api.reject_order(claims.id, order_id, &body.reason).await?;
    Ok(HttpResponse::Ok().json(tracking))
}

route!(update_location => Post "/driver/orders/{id}/location" impl FulfillmentDatabase, RoutePlanner where requires [Role::Driver]);
/// The driver's periodic position report. A `status` of `on_the_way`, `arrived` or `delivered` may be attached, in
/// which case the delivery moves on, provided that step is allowed from where it is now.
pub async fn update_location<B, R>(
    claims: ActorClaims,
    path: web::Path<i64>,
    body: web::Json<LocationUpdate>,
    api: web::Data<DeliveryApi<B, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    let order_id = path.into_inner();
    trace!("💻️ POST location for order #{order_id} by driver #{}", claims.id);
    let change = api.update_location(claims.id, order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(change.tracking))
}

route!(start_delivery => Post "/driver/orders/{id}/start" impl FulfillmentDatabase, RoutePlanner where requires [Role::Driver]);
pub async fn start_delivery<B, R>(
    claims: ActorClaims,
    path: web::Path<i64>,
    body: web::Json<PickupProof>,
    api: web::Data<DeliveryApi<B, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    let order_id = path.into_inner();
    debug!("💻️ POST start delivery of order #{order_id} by driver #{}", claims.id);
    let tracking = api.start_delivery(claims.id, order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(tracking))
}

route!(complete_delivery => Post "/driver/orders/{id}/complete" impl FulfillmentDatabase, RoutePlanner where requires [Role::Driver]);
pub async fn complete_delivery<B, R>(
    claims: ActorClaims,
    path: web::Path<i64>,
    body: web::Json<DeliveryProof>,
    api: web::Data<DeliveryApi<B, R>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase,
    R: RoutePlanner,
{
    let order_id = path.into_inner();
    debug!("💻️ POST complete delivery of order #{order_id} by driver #{}", claims.id);
    let tracking = api.complete_delivery(claims.id, order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(tracking))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(search_withdrawals => Get "/admin/withdrawals" impl WithdrawalManagement where requires [Role::Admin]);
/// All withdrawals, oldest first. Filter with `?status=pending` and so on.
pub async fn search_withdrawals<B>(
    query: web::Query<WithdrawalSearch>,
    api: web::Data<WithdrawalApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: WithdrawalManagement
{
    debug!("💻️ GET withdrawals with status {:?}", query.status);
    let withdrawals = api.search(query.status).await?;
    Ok(HttpResponse::Ok().json(withdrawals))
}

route!(process_withdrawal => Post "/admin/withdrawals/{id}/process" impl WithdrawalManagement where requires [Role::Admin]);
pub async fn process_withdrawal<B>(
    claims: ActorClaims,
    path: web::Path<i64>,
    body: web::Json<WithdrawalDecision>,
    api: web::Data<WithdrawalApi<B>>,
) -> Result<HttpResponse, ServerError>
where B: WithdrawalManagement
{
    let withdrawal_id = path.into_inner();
    debug!("💻️ POST process withdrawal #{withdrawal_id} by admin #{}", claims.id);
    let withdrawal = api.process_withdrawal(claims.id, withdrawal_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(withdrawal))
}
