use actix_cors::Cors;
use actix_web::{
    get,
    middleware::{self, Condition},
    web::Data,
    App, HttpResponse, HttpServer, Responder,
};
use clap::Parser;
use serde_json::json;
use store::store::store::PersonStore;

use crate::config::ServerConfig;

mod config;
mod contracts;
mod handlers;

/// Service status for dashboards and smoke checks
#[get("/")]
async fn root_status() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "app": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness probe
#[get("/healthz")]
async fn healthz() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}

/// Readiness probe
// TODO: Ping the store instead of reporting a static ready
#[get("/readyz")]
async fn readyz() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ready" }))
}

/// 📇 Person directory REST server, a JSON CRUD + search API over the person store
#[derive(Parser, Debug)]
struct Cli {
    /// Port the REST server will run on
    #[clap(short, long, default_value = "8000")]
    port: u16,

    /// Address the REST server will run on
    #[clap(short, long, default_value = "0.0.0.0")]
    address: String,

    /// Log every HTTP request
    #[clap(long)]
    log_http: bool,

    #[clap(long, default_value_t = 2)]
    http_workers: usize,
}

fn build_cors(config: &ServerConfig) -> Cors {
    if config.allows_any_origin() {
        return Cors::permissive();
    }

    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials();

    for origin in &config.cors_origins {
        cors = cors.allowed_origin(origin);
    }

    cors
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    env_logger::init_from_env(
        env_logger::Env::new().default_filter_or(config.log_level.clone()),
    );

    let args = Cli::parse();

    let store = PersonStore::new(&config.store)?;

    store.ensure_schema().await?;

    log::info!(
        "📀 Store ready        [{}:{}/{}]",
        config.store.host,
        config.store.port,
        config.store.dbname
    );

    let store_data = Data::new(store);

    log::info!("starting HTTP server on port {}.", args.port);

    log::info!(
        "person API: http://{}:{}{}",
        args.address,
        args.port,
        handlers::API_PREFIX
    );

    let bind_address = (args.address.clone(), args.port);
    let log_http = args.log_http;

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(store_data.clone())
            .service(root_status)
            .service(healthz)
            .service(readyz)
            .service(handlers::persons_scope())
            .wrap(build_cors(&config))
            .wrap(middleware::NormalizePath::trim())
            .wrap(Condition::new(log_http, middleware::Logger::default()))
    })
    .workers(args.http_workers)
    .bind(bind_address)?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn root_reports_the_app_name_and_version() {
        let app = test::init_service(App::new().service(root_status)).await;

        let request = test::TestRequest::get().uri("/").to_request();
        let response = test::call_service(&app, request).await;

        assert!(response.status().is_success());

        let body: serde_json::Value = test::read_body_json(response).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["app"], env!("CARGO_PKG_NAME"));
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn healthz_reports_healthy() {
        let app = test::init_service(App::new().service(healthz)).await;

        let request = test::TestRequest::get().uri("/healthz").to_request();
        let response = test::call_service(&app, request).await;

        assert!(response.status().is_success());

        let body: serde_json::Value = test::read_body_json(response).await;

        assert_eq!(body["status"], "healthy");
    }

    #[actix_web::test]
    async fn readyz_reports_ready() {
        let app = test::init_service(App::new().service(readyz)).await;

        let request = test::TestRequest::get().uri("/readyz").to_request();
        let response = test::call_service(&app, request).await;

        assert!(response.status().is_success());

        let body: serde_json::Value = test::read_body_json(response).await;

        assert_eq!(body["status"], "ready");
    }
}
