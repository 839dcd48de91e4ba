use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use order_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    helpers::{KeyedRateLimiter, RateLimiter},
    OrderFlowApi,
    PaymentWebhookApi,
    SqliteDatabase,
    VoucherApi,
    WebhookConfig,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::{create_invoice_event_handlers, invoice::INVOICE_EVENT_BUFFER_SIZE},
    middleware::{AdminKeyMiddlewareFactory, RateLimitMiddlewareFactory},
    routes::{
        health,
        ApplyVoucherRoute,
        ApproveCancellationRoute,
        CompleteOrderRoute,
        DenyCancellationRoute,
        GatewayNotificationRoute,
        OrderByIdRoute,
        RequestCancellationRoute,
        ShipOrderRoute,
        SweepRoute,
    },
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_event_handlers(&config)?;
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if let Some(period) = config.sweep_interval {
        let _worker = start_expiry_worker(db.clone(), producers.clone(), period);
    }
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

fn create_event_handlers(config: &ServerConfig) -> Result<EventHandlers, ServerError> {
    match &config.invoice {
        Some(invoice) => create_invoice_event_handlers(invoice).map_err(|e| ServerError::InitializeError(e.to_string())),
        None => Ok(EventHandlers::new(INVOICE_EVENT_BUFFER_SIZE, EventHooks::default())),
    }
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    // One limiter for all workers, otherwise every worker would hand out its own quota
    let limiter: Arc<dyn RateLimiter> = Arc::new(KeyedRateLimiter::per_minute(config.webhook_rate_limit));
    let webhook_config = WebhookConfig::new(config.gateway_server_key.clone())
        .with_test_order_prefix(config.test_order_prefix.as_str());
    let admin_key = config.admin_api_key.clone();
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let webhook_api =
            PaymentWebhookApi::new(OrderFlowApi::new(db.clone(), producers.clone()), webhook_config.clone());
        let voucher_api = VoucherApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sol::access_log"))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                debug!("💻️ Rejected request body. {err}");
                ServerError::InvalidRequestBody(err.to_string()).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                ServerError::InvalidRequestPath(err.to_string()).into()
            }))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(voucher_api));
        let gateway_scope = web::scope("/gateway")
            .wrap(RateLimitMiddlewareFactory::new(Arc::clone(&limiter), options))
            .service(GatewayNotificationRoute::<SqliteDatabase>::new());
        // Routes that require the admin key
        let admin_scope = web::scope("/api")
            .wrap(AdminKeyMiddlewareFactory::new(admin_key.clone()))
            .service(SweepRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(ApproveCancellationRoute::<SqliteDatabase>::new())
            .service(DenyCancellationRoute::<SqliteDatabase>::new())
            .service(ShipOrderRoute::<SqliteDatabase>::new())
            .service(CompleteOrderRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(gateway_scope)
            .service(ApplyVoucherRoute::<SqliteDatabase>::new())
            .service(RequestCancellationRoute::<SqliteDatabase>::new())
            .service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .client_request_timeout(config.request_timeout)
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("🚀️ Server listening on {}:{}", config.host, config.port);
    Ok(srv)
}
