use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use billing_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    geoip::{GeoIpResolver, GeoIpTable},
    payment_system::PaymentSystemRegistry,
    OrderManagerApi,
    ProjectApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    routes::{
        health,
        CreateOrderFormRoute,
        CreateOrderRoute,
        CreatePaymentRoute,
        NotifyPaymentRoute,
        OrderByIdRoute,
        OrdersRoute,
        RevenueDynamicRoute,
        UpdateProjectRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

/// The pieces of the engine every worker shares.
#[derive(Clone)]
pub struct EngineContext {
    pub geoip: Arc<dyn GeoIpResolver>,
    pub payment_systems: PaymentSystemRegistry,
    pub psp_accounting_currency: Option<String>,
    pub producers: EventProducers,
}

impl EngineContext {
    pub fn order_manager(&self, db: SqliteDatabase) -> OrderManagerApi<SqliteDatabase> {
        OrderManagerApi::new(db, self.producers.clone())
            .with_geoip(Arc::clone(&self.geoip))
            .with_payment_systems(self.payment_systems.clone())
            .with_psp_accounting_currency(self.psp_accounting_currency.clone())
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    }
    let geoip = load_geoip(&config)?;
    let payment_systems = load_payment_systems(&config)?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let context = EngineContext {
        geoip,
        payment_systems,
        psp_accounting_currency: config.psp_accounting_currency.clone(),
        producers,
    };
    let srv = create_server_instance(config, db, context)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

fn load_geoip(config: &ServerConfig) -> Result<Arc<dyn GeoIpResolver>, ServerError> {
    let table = match &config.geoip_db {
        Some(path) => GeoIpTable::from_json_file(path)
            .map_err(|e| ServerError::ConfigurationError(format!("GeoIP table {}: {e}", path.display())))?,
        None => GeoIpTable::default(),
    };
    Ok(Arc::new(table))
}

fn load_payment_systems(config: &ServerConfig) -> Result<PaymentSystemRegistry, ServerError> {
    match &config.payment_systems {
        Some(path) => {
            let registry = PaymentSystemRegistry::from_json_file(path).map_err(|e| {
                ServerError::ConfigurationError(format!("Payment system settings {}: {e}", path.display()))
            })?;
            info!("💳️ Payment systems configured: {registry:?}");
            Ok(registry)
        },
        None => Ok(PaymentSystemRegistry::default()),
    }
}

/// Order events are written to the log. Integrations that need them (accounting, merchant callbacks) hook in here.
fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_created(|ev| {
        Box::pin(async move {
            info!("📬️ Order created: {}", ev.order);
        })
    });
    hooks.on_order_notified(|ev| {
        Box::pin(async move {
            match &ev.rejection {
                Some(reason) => warn!("📬️ Payment for order {} was rejected: {reason}", ev.order.id),
                None => info!("📬️ Payment for order {} completed. Status: {}", ev.order.id, ev.status),
            }
        })
    });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    context: EngineContext,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let srv = HttpServer::new(move || {
        let orders_api = context.order_manager(db.clone());
        let project_api = ProjectApi::new(db.clone());
        let api_scope = web::scope("/api")
            .service(OrdersRoute::<SqliteDatabase>::new())
            .service(RevenueDynamicRoute::<SqliteDatabase>::new())
            .service(UpdateProjectRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("billing::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(project_api))
            .app_data(web::Data::new(options))
            .service(health)
            .service(CreateOrderFormRoute::<SqliteDatabase>::new())
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(NotifyPaymentRoute::<SqliteDatabase>::new())
            .service(CreatePaymentRoute::<SqliteDatabase>::new())
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
