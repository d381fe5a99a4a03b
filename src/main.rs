use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duetrack::api::router;
use duetrack::config::AppConfig;
use duetrack::db;
use duetrack::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "duetrack=debug,tower_http=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let pool = db::connect(&config.database_url, config.max_connections).await?;

    let addr = config.bind_addr;
    if config.site_url.is_none() {
        info!("SITE_URL is not set, calendar feed will omit X-ORIGINAL-URL");
    }

    let state = AppState {
        db: pool.clone(),
        config: Arc::new(config),
    };

    let app = router(state);

    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
