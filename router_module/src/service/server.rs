use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use reqwest::Client;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::RouterConfig;
use crate::dispatcher::EventDispatcher;

use super::handlers::{health, line_push, line_webhook};
use super::state::AppState;
use super::BoxError;

pub fn build_state(config: RouterConfig) -> Result<AppState, BoxError> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.http_timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder.build()?;
    let dispatcher = EventDispatcher::new(&config, client);
    Ok(AppState::new(Arc::new(config), Arc::new(dispatcher)))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/lineWebhook", post(line_webhook))
        .route("/linePush", post(line_push))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(
    config: RouterConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let tls = config.tls.clone();
    info!(
        "router config loaded: stickers={} trello={} weather={} push_endpoint={}",
        config.sticker_replies.len(),
        config.trello.is_some(),
        config.weather.is_some(),
        config.line.push_token.is_some()
    );

    let app = build_router(build_state(config)?);

    match tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.full_chain_path, &tls.private_key_path)
                .await
                .map_err(|err| -> BoxError {
                    format!("failed to load TLS credentials: {}", err).into()
                })?;
            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown.await;
                shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
            });
            info!("listening on {} (tls)", addr);
            axum_server::bind_rustls(addr, rustls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            warn!("no sshCredential configured, serving plaintext HTTP");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("listening on {}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await?;
        }
    }

    Ok(())
}
