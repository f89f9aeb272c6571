mod api;
mod catalog;
mod config;
mod database;
mod middleware;
mod models;
mod services;
mod state;
mod store;
mod utils;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use config::{Config, StoreBackend};
use dotenv::dotenv;
use services::{DisabledProvider, PaymentProvider, StripeProvider, TokenService};
use state::AppState;
use std::sync::Arc;
use store::DocumentStore;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ Invalid configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    log::info!("🚀 Starting Yoga Master Service...");

    let store: Arc<dyn DocumentStore> = match (config.backend, config.database_url.as_deref()) {
        (StoreBackend::MongoDB, Some(url)) => {
            let db = database::MongoDB::connect(url, &config.database_name, config.transactions)
                .await
                .map_err(|e| {
                    log::error!("❌ Failed to connect to MongoDB: {}", e);
                    std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string())
                })?;
            log::info!("✅ MongoDB connected: {}", config.database_name);
            Arc::new(db)
        }
        (StoreBackend::MongoDB, None) => {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "DATABASE_URL must be set"));
        }
        (StoreBackend::Memory, _) => {
            log::warn!("⚠️ Using the in-memory store; data is lost on exit");
            Arc::new(catalog::memory_store())
        }
    };

    let payments: Arc<dyn PaymentProvider> = match &config.payment_secret {
        Some(secret) => Arc::new(StripeProvider::new(secret.clone())),
        None => {
            log::warn!("⚠️ PAYMENT_SECRET not set, payment intents are disabled");
            Arc::new(DisabledProvider)
        }
    };

    let tokens = TokenService::new(&config.access_secret, config.token_ttl_hours);
    let state = web::Data::new(AppState::new(Arc::clone(&store), tokens, payments));

    let (host, port) = (config.host.clone(), config.port);
    let origins = config.cors_origins.clone();

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers(vec![header::CONTENT_TYPE, header::RETRY_AFTER])
            .max_age(3600);
        if origins.is_empty() {
            cors = cors.allow_any_origin();
        } else {
            for origin in &origins {
                cors = cors.allowed_origin(origin);
            }
        }

        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            .configure(api::routes)
    })
    .bind((host.as_str(), port))?
    .run();

    let result = server.await;

    log::info!("🛑 Server stopped, closing store");
    store.shutdown().await;
    result
}
