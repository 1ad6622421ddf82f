//! CORS relay for the Sproochmaschinn API.
//!
//! Browsers cannot call the service directly, so the relay forwards `/api/*`
//! requests verbatim and attaches CORS headers to every response. It does not
//! interpret payloads. The live channel does not go through the relay.
//!
//! ```rust,no_run
//! use sproochmaschinn_relay::{RelayConfig, serve};
//!
//! # async fn run() -> sproochmaschinn_relay::Result<()> {
//! serve(RelayConfig::default(), async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```

mod config;
mod cors;
mod error;
mod proxy;

use std::{future::Future, sync::Arc};

use axum::{Router, extract::DefaultBodyLimit, middleware};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::{
    DEFAULT_LISTEN, DEFAULT_MAX_BODY_BYTES, DEFAULT_TIMEOUT, DEFAULT_UPSTREAM, RelayConfig,
    parse_listen,
};
pub use cors::{ALLOW_HEADERS, ALLOW_METHODS, CorsPolicy, MAX_AGE};
pub use error::{RelayError, Result};
pub use proxy::forwarded_headers;

/// Shared state of the relay handler.
#[derive(Clone)]
pub struct RelayState {
    client: reqwest::Client,
    upstream: Arc<str>,
}

/// Builds the relay router.
pub fn router(config: RelayConfig) -> Result<Router> {
    let config = config.validate()?;

    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()?;
    let state = RelayState {
        client,
        upstream: Arc::from(config.upstream.as_str()),
    };
    let cors = Arc::new(CorsPolicy::new(&config.allowed_origins));

    Ok(Router::new()
        .fallback(proxy::relay)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(middleware::from_fn_with_state(cors, cors::cors_middleware))
        .layer(TraceLayer::new_for_http()))
}

/// Runs the relay until `shutdown` completes.
pub async fn serve<F>(config: RelayConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listen = config.listen;
    let upstream = config.upstream.clone();
    let app = router(config)?;

    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(
        "relay listening on http://{} -> {}",
        listener.local_addr()?,
        upstream
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("relay stopped");
    Ok(())
}
