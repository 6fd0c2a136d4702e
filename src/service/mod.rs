//! HTTP surface of the isolation service.

pub mod config;
pub mod handlers;
pub mod schema;

use actix_web::{web, App, HttpServer};
use std::{sync::Arc, time::Duration};
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::core::isolator::IsolationService;
use config::AppConfig;

/// Shared by every worker; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IsolationService>,
    pub inference_timeout: Option<Duration>,
    /// Largest accepted `/isolate` body, in bytes.
    pub payload_limit: usize,
    pub model_name: String,
}

impl AppState {
    pub fn new(service: Arc<IsolationService>, config: &AppConfig) -> Self {
        let inference_timeout = match config.server.inference_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            service,
            inference_timeout,
            payload_limit: config.payload_limit_bytes(),
            model_name: config.model.name.clone(),
        }
    }
}

/// Route table, shared by the server and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::post().to(handlers::isolate))
        .route("/isolate", web::post().to(handlers::isolate))
        .route("/health", web::get().to(handlers::health));
}

pub async fn run_server(config: AppConfig, state: AppState) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();
    let workers = config.server.workers;

    info!("Starting HTTP server on {}", bind_addr);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(TracingLogger::default())
            .configure(configure)
    });
    if workers > 0 {
        server = server.workers(workers);
    }

    server.bind(&bind_addr)?.run().await?;

    info!("Server stopped gracefully");
    Ok(())
}
