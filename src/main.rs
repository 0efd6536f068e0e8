use article_sentiment::api::{self, AppState};
use article_sentiment::article::ArticleFetcher;
use article_sentiment::ml::build_backends;
use article_sentiment::{AppConfig, Reconciler};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    let backends = build_backends(&config)?;
    let state = Arc::new(AppState {
        fetcher: ArticleFetcher::new(&config)?,
        reconciler: Arc::new(Reconciler::new(backends, config.reconcile.clone())),
    });

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
