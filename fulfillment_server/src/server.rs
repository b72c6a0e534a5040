use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpResponse, HttpServer};
use fulfillment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    traits::NotificationGateway,
    DeliveryApi,
    MarketplaceApi,
    OrderFlowApi,
    SqliteDatabase,
    WithdrawalApi,
};
use log::*;

use crate::{
    config::{ServerConfig, ServerOptions},
    data_objects::JsonResponse,
    errors::ServerError,
    integrations::{ExpoNotifier, LocationIqRouter},
    middleware::{HmacMiddlewareFactory, IdentityMiddlewareFactory},
    routes::{
        health,
        AcceptDeliveryRoute,
        ActiveDeliveriesRoute,
        ApproveOrderRoute,
        AvailableOrdersRoute,
        CancelOrderRoute,
        CancelWithdrawalRoute,
        CheckoutRoute,
        CompleteDeliveryRoute,
        DeclineDeliveryRoute,
        DeliveryHistoryRoute,
        DriverLocationRoute,
        DriverStatisticsRoute,
        MerchantBalanceRoute,
        MerchantOrdersRoute,
        MyOrdersRoute,
        MyWithdrawalsRoute,
        OrderByIdRoute,
        OrderByNumberRoute,
        OrderTrackingRoute,
        PayOrderRoute,
        PaymentWebhookRoute,
        ProcessWithdrawalRoute,
        RejectOrderRoute,
        RequestWithdrawalRoute,
        SearchWithdrawalsRoute,
        StartDeliveryRoute,
        UpdateLocationRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 64;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not migrate the database. {e}")))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, create_event_hooks(&config));
    let producers = handlers.producers();
    handlers.start_handlers();
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::BackendError(e.to_string()))
}

/// Push notices go out through Expo. Payment and cancellation events are logged for the audit trail.
pub fn create_event_hooks(config: &ServerConfig) -> EventHooks {
    let notifier = ExpoNotifier::new(config.push.clone());
    let mut hooks = EventHooks::default();
    hooks
        .on_notification(move |ev| {
            let notifier = notifier.clone();
            Box::pin(async move {
                if let Err(e) = notifier.notify(&ev).await {
                    warn!("🔔️ Could not deliver '{}' to user #{}. {e}", ev.title, ev.recipient_id);
                }
            })
        })
        .on_order_paid(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} paid. Total {}", ev.order.order_number, ev.order.total_price);
            })
        })
        .on_order_annulled(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} annulled. Status is now {}", ev.order.order_number, ev.status);
            })
        });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let bind_addr = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let settings = config.settings;
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone(), settings);
        let marketplace_api = MarketplaceApi::new(db.clone());
        let router = LocationIqRouter::new(config.routing.clone());
        let delivery_api = DeliveryApi::new(db.clone(), producers.clone(), router, &settings);
        let withdrawal_api = WithdrawalApi::new(db.clone(), &settings);
        let options = ServerOptions::from_config(&config);
        let api_scope = web::scope("/api")
            .wrap(IdentityMiddlewareFactory::new(config.auth.identity_secret.clone(), config.auth.identity_checks))
            .configure(configure_api_routes);
        let webhook = &config.webhook;
        let payments_scope = web::scope("/payments")
            .wrap(HmacMiddlewareFactory::new(&webhook.hmac_header, webhook.hmac_secret.clone(), webhook.hmac_checks))
            .service(PaymentWebhookRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(marketplace_api))
            .app_data(web::Data::new(delivery_api))
            .app_data(web::Data::new(withdrawal_api))
            .app_data(web::Data::new(options))
            .configure(configure_extractors)
            .service(health)
            .service(payments_scope)
            .service(api_scope)
            .default_service(web::to(|| async { HttpResponse::NotFound().json(JsonResponse::failure("Not found")) }))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(bind_addr)?
    .run();
    Ok(srv)
}

/// Registers every `/api` route against the SQLite backend. The APIs themselves are supplied as app data.
pub fn configure_api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(CheckoutRoute::<SqliteDatabase>::new())
        .service(MyOrdersRoute::<SqliteDatabase>::new())
        .service(OrderByNumberRoute::<SqliteDatabase>::new())
        .service(OrderByIdRoute::<SqliteDatabase>::new())
        .service(CancelOrderRoute::<SqliteDatabase>::new())
        .service(PayOrderRoute::<SqliteDatabase>::new())
        .service(OrderTrackingRoute::<SqliteDatabase>::new())
        .service(DriverLocationRoute::<SqliteDatabase, LocationIqRouter>::new())
        .service(MerchantOrdersRoute::<SqliteDatabase>::new())
        .service(ApproveOrderRoute::<SqliteDatabase>::new())
        .service(RejectOrderRoute::<SqliteDatabase>::new())
        .service(MerchantBalanceRoute::<SqliteDatabase>::new())
        .service(MyWithdrawalsRoute::<SqliteDatabase>::new())
        .service(RequestWithdrawalRoute::<SqliteDatabase>::new())
        .service(CancelWithdrawalRoute::<SqliteDatabase>::new())
        .service(AvailableOrdersRoute::<SqliteDatabase, LocationIqRouter>::new())
        .service(ActiveDeliveriesRoute::<SqliteDatabase, LocationIqRouter>::new())
        .service(DeliveryHistoryRoute::<SqliteDatabase, LocationIqRouter>::new())
        .service(DriverStatisticsRoute::<SqliteDatabase, LocationIqRouter>::new())
        .service(AcceptDeliveryRoute::<SqliteDatabase, LocationIqRouter>::new())
        .service(DeclineDeliveryRoute::<SqliteDatabase, LocationIqRouter>::new())
        .service(UpdateLocationRoute::<SqliteDatabase, LocationIqRouter>::new())
        .service(StartDeliveryRoute::<SqliteDatabase, LocationIqRouter>::new())
        .service(CompleteDeliveryRoute::<SqliteDatabase, LocationIqRouter>::new())
        .service(SearchWithdrawalsRoute::<SqliteDatabase>::new())
        .service(ProcessWithdrawalRoute::<SqliteDatabase>::new());
}

/// Reports malformed bodies, paths and query strings as JSON errors, like every other failure.
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default().error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into()),
    );
}

#[cfg(test)]
mod test {
    use fulfillment_engine::test_utils::prepare_env::{prepare_test_env, random_db_path};

    use super::*;

    #[actix_web::test]
    async fn server_binds_to_configured_address() {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating database");
        // Port 0 lets the OS pick a free port
        let config = ServerConfig::new("127.0.0.1", 0);
        let srv = create_server_instance(config, db, EventProducers::default()).expect("Server did not bind");
        let handle = srv.handle();
        actix_web::rt::spawn(srv);
        handle.stop(false).await;
        let _ = std::fs::remove_file(url.trim_start_matches("sqlite://"));
    }
}
