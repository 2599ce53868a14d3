use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use planbot::api::router;
use planbot::services::PlanScheduler;
use planbot::state::AppState;
use planbot::transport::{HttpNotifier, NoopNotifier, Notifier, TransportConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "planbot=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://planbot.db".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let notifier: Arc<dyn Notifier> = match TransportConfig::new_from_env() {
        Ok(config) => Arc::new(HttpNotifier::new(config)?),
        Err(_) => {
            warn!("WEBHOOK_URL not set, notifications will be discarded");
            Arc::new(NoopNotifier)
        }
    };

    let tick_secs = std::env::var("TICK_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);

    let scheduler = PlanScheduler::new(pool.clone(), notifier, tick_secs);
    tokio::spawn(scheduler.start());

    let state = AppState { db: pool.clone() };
    let app = router(state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
