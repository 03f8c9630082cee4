use std::sync::Arc;

use deck_builder::config::Config;
use deck_builder::service::DeckService;
use deck_builder::{api, cli, metrics};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    let port = config.port;
    let cli_mode = config.cli_mode;
    let service = DeckService::from_config(config).expect("Failed to initialize deck service");

    if cli_mode {
        if let Err(e) = cli::run(&service).await {
            tracing::error!("Menu stopped: {e}");
            std::process::exit(1);
        }
        return;
    }

    let app = api::router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to port {port}: {e}"));

    tracing::info!("Deck builder listening on port {port}");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
