use axum::extract::DefaultBodyLimit;
use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use htsget_slice::{
    Config,
    auth::{AllowAll, AuthConfig, Authorizer, BearerTokens, UrlSigner},
    handlers::{AppState, create_router},
    index::{IndexCache, IndexProvider},
    planner::PlanOptions,
    storage::{LocalStorage, Storage},
    ticket::DataUrlResolver,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(config.data_dir.clone()));

    let cache = IndexCache::new(config.index_cache_capacity, config.index_failure_ttl());
    let indexes = Arc::new(IndexProvider::new(storage.clone(), cache));

    let signer = config.sign_urls.then(|| {
        let secret = match &config.url_signing_secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                tracing::warn!("no URL signing secret configured, using a random one");
                UrlSigner::generate_secret()
            }
        };
        UrlSigner::new(secret, config.url_lifetime())
    });

    let authorizer: Arc<dyn Authorizer> = if config.auth_tokens.is_empty() {
        Arc::new(AllowAll)
    } else {
        Arc::new(BearerTokens::new(config.auth_tokens.iter().cloned()))
    };

    let state = AppState {
        storage,
        indexes,
        resolver: Arc::new(DataUrlResolver::new(
            config.effective_base_url(),
            signer.clone(),
        )),
        planning: PlanOptions {
            merge_gap: config.merge_gap,
            block_size: config.block_size,
        },
    };
    let auth = Arc::new(AuthConfig::new(authorizer, signer));

    let app = create_router(state, auth).layer(DefaultBodyLimit::max(config.max_payload));

    let app = if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting htsget-slice server on {}", addr);
    tracing::info!("Data directory: {:?}", config.data_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
