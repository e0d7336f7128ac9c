use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use pasal_gateways::GatewayRegistry;
use pasal_payment_engine::{
    events::{EventHandlers, EventProducers},
    EngineConfig,
    OrderFlowApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::AdminAuthMiddlewareFactory,
    notifications::create_notification_hooks,
    routes::{
        admin_create_order,
        admin_order,
        admin_transition,
        admin_withdrawal,
        checkout,
        health,
        payment_failure,
        payment_status,
        payment_success,
        payment_webhook,
    },
    workers::start_sweep_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(128, create_notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let engine_config = EngineConfig::default();
    start_sweep_worker(
        db.clone(),
        producers.clone(),
        engine_config.clone(),
        config.pending_payment_timeout,
        config.sweep_interval_secs,
    );
    let srv = create_server_instance(config, db, producers, engine_config)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    engine_config: EngineConfig,
) -> Result<Server, ServerError> {
    let registry =
        GatewayRegistry::from_config(&config.gateways).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = HttpServer::new(move || {
        let api = OrderFlowApi::new(db.clone(), producers.clone(), engine_config.clone());
        let admin_scope = web::scope("/admin")
            .wrap(AdminAuthMiddlewareFactory::new(config.admin_api_key.clone()))
            .service(admin_create_order)
            .service(admin_order)
            .service(admin_transition)
            .service(admin_withdrawal);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("pps::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(registry.clone()))
            .service(health)
            .service(checkout)
            .service(payment_status)
            .service(payment_success)
            .service(payment_failure)
            .service(payment_webhook)
            .service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
