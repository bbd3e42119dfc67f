use std::{sync::Arc, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::{future::ok, FutureExt};
use log::*;
use payment_reconciler::{
    diagnostics::{create_sink, DiagnosticSink},
    events::{EventHandlers, EventHooks},
    ReconciliationApi,
    ReconciliationConfig,
    SqliteDatabase,
    WebhookApi,
};

use crate::{
    config::ServerConfig,
    errors::{AuthError, ServerError},
    helpers::{get_remote_ip, is_peer_allowed},
    integrations::OmiseChargeProvider,
    middleware::ApiKeyMiddlewareFactory,
    routes::{health, LinkPendingRoute, OmiseWebhookRoute, PaymentStatusRoute, PendingConfirmationsRoute, RunSweepRoute},
    sweep_worker::start_sweep_worker,
};

const EVENT_BUFFER_SIZE: usize = 128;
const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig, hooks: EventHooks) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let reconciliation_config = ReconciliationConfig { buffer_unknown_hints: config.buffer_unknown_hints };
    let engine = ReconciliationApi::new(db, producers).with_config(reconciliation_config);
    let provider = OmiseChargeProvider::new(config.omise.clone())?;
    let diagnostics = create_sink(config.diagnostics_log.as_deref());
    let _sweeper = start_sweep_worker(engine.clone(), config.sweep);
    let srv = create_server_instance(config, engine, provider, diagnostics)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    engine: ReconciliationApi<SqliteDatabase>,
    provider: OmiseChargeProvider,
    diagnostics: Arc<dyn DiagnosticSink>,
) -> Result<Server, ServerError> {
    let webhook_config = config.webhook_config();
    let (host, port) = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let webhook_api = WebhookApi::new(engine.clone(), provider.clone(), Arc::clone(&diagnostics))
            .with_config(webhook_config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spr::access_log"))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(engine.clone()))
            .app_data(web::Data::new(config.sweep));
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let webhook_whitelist = config.webhook_whitelist.clone();
        let webhook_scope = web::scope("/webhooks")
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
                if is_peer_allowed(peer_ip, webhook_whitelist.as_deref()) {
                    srv.call(req).boxed_local()
                } else {
                    ok(req.error_response(ServerError::from(AuthError::ForbiddenPeer))).boxed_local()
                }
            })
            .service(OmiseWebhookRoute::<SqliteDatabase, OmiseChargeProvider>::new());
        let admin_scope = web::scope("/admin")
            .wrap(ApiKeyMiddlewareFactory::new(config.admin_api_key.clone()))
            .service(PendingConfirmationsRoute::<SqliteDatabase>::new())
            .service(LinkPendingRoute::<SqliteDatabase>::new())
            .service(RunSweepRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(PaymentStatusRoute::<SqliteDatabase, OmiseChargeProvider>::new())
            .service(webhook_scope)
            .service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    info!("💻️ Listening on {host}:{port}");
    Ok(srv)
}
