//! Pushgate API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pushgate_common::config::AppConfig;
use pushgate_common::redis_pool::open_client;
use pushgate_common::traits::FeedbackSink;
use pushgate_engine::blacklist::{MemoryTokenFilter, RedisTokenFilter, TokenFilter};
use pushgate_engine::service::{self, Collaborators};
use pushgate_engine::stats::MemoryStats;
use pushgate_notifier::feedback::FeedbackDispatcher;
use pushgate_notifier::gateway::GatewayClientFactory;

use pushgate_api::routes::create_router;
use pushgate_api::state::AppState;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "pushgate_api=info,pushgate_engine=info,pushgate_notifier=info,tower_http=debug",
        )
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting Pushgate API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Token blacklist
    let filter: Arc<dyn TokenFilter> = match &config.blacklist_redis_url {
        Some(url) => {
            let filter = RedisTokenFilter::connect(open_client(url)?).await;
            if filter.is_connected() {
                tracing::info!("Blacklist store connected");
            } else {
                tracing::warn!("Blacklist store unreachable, screening degraded");
            }
            Arc::new(filter)
        }
        None => {
            tracing::info!("No blacklist store configured, using in-memory token filter");
            Arc::new(MemoryTokenFilter::new())
        }
    };

    // Feedback callbacks
    let (feedback, feedback_task) = match &config.feedback_url {
        Some(url) => {
            let (dispatcher, handle) = FeedbackDispatcher::spawn(
                url.clone(),
                Duration::from_secs(config.feedback_timeout_secs),
                config.feedback_queue_size,
            )?;
            let sink: Arc<dyn FeedbackSink> = Arc::new(dispatcher);
            (Some(sink), Some(handle))
        }
        None => (None, None),
    };

    let stats = Arc::new(MemoryStats::new());
    let (coordinator, workers) = service::start(
        &config,
        Collaborators {
            factory: Arc::new(GatewayClientFactory::new(GATEWAY_TIMEOUT)?),
            filter,
            stats: stats.clone(),
            feedback,
        },
    )
    .await;

    // Build router
    let app = create_router(AppState::new(coordinator, stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the coordinator; the queue is closed now.
    tracing::info!("Draining dispatch queue...");
    workers.join().await;

    if let Some(task) = feedback_task {
        task.await?;
    }

    tracing::info!("Pushgate API server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal, stopping gracefully...");
}
