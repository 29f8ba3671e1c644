//! This file defines the snapgate binary entry point.

use snapgate::app;
use snapgate::app_state::AppState;
use snapgate::auth::HttpIdentityProvider;
use snapgate::cli;
use snapgate::metrics;
use snapgate::server;
use snapgate::tracing;

use std::sync::Arc;
use std::time::Duration;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing();
    metrics::register_metrics();
    let provider = HttpIdentityProvider::new(
        args.auth_url.clone(),
        Duration::from_secs(args.auth_timeout),
    )
    .expect("failed to initialise identity provider client");
    let state = AppState::new(&args, Arc::new(provider)).expect("failed to initialise state");
    let app = app::router(Arc::new(state));
    server::serve(&args, app).await;
}
