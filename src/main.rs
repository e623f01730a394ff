mod composer;
mod config;
mod content_loader;
mod hot_reload;
mod markdown;
mod models;
mod repos;
mod routes;
mod state;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, sync::{broadcast, RwLock}};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SiteConfig;
use crate::content_loader::{load_content, Content};
use crate::hot_reload::start_content_watcher;
use crate::repos::RepoClient;
use crate::state::{AppState, RouterState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SiteConfig::load().context("failed to load site configuration")?;
    info!("RUST_ENV is set to development: {}", config.is_development);

    // Posts are loaded once up front; any bad post stops startup.
    let Content { templates, posts } = load_content(&config.content_dir)
        .await
        .with_context(|| format!("failed to load content from {}", config.content_dir.display()))?;

    let repos = RepoClient::from_config(&config.github).context("failed to build GitHub client")?;
    match &repos {
        Some(client) => info!(endpoint = client.endpoint(), "repository list enabled"),
        None => info!("no GitHub user configured, repository list stays empty"),
    }

    let state = Arc::new(AppState {
        templates: RwLock::new(templates),
        posts: RwLock::new(posts),
        profile: config.profile.clone(),
        content_dir: config.content_dir.clone(),
        repos,
        is_development: config.is_development,
    });

    let (tx, _rx) = broadcast::channel(1);
    if config.is_development {
        info!("Hot reload enabled. Check logs for file change events.");
        start_content_watcher(tx.clone(), state.clone());
    }

    let router_state = RouterState {
        app_state: state,
        broadcaster: tx,
    };
    let app = routes::router(router_state, &config.static_dir());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "listening");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
