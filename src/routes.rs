use std::{path::Path, sync::Arc};

use axum::{
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, get_service},
    Json, Router,
};
use tower_http::services::{ServeDir, ServeFile};
use tracing::error;

use crate::composer::{
    compose_home, compose_not_found, compose_post, nav_visible, render_repositories, HomePage,
};
use crate::content_loader::{read_post, POSTS_DIR};
use crate::hot_reload::ws_handler;
use crate::markdown::render_markdown_to_html;
use crate::models::{PostDescriptor, RepositoryList};
use crate::state::{AppState, RouterState};

pub fn router(state: RouterState, static_dir: &Path) -> Router {
    let static_files = get_service(ServeDir::new(static_dir));
    let favicon = get_service(ServeFile::new(static_dir.join("favicon.ico")));

    Router::new()
        .route("/", get(homepage))
        .route("/blog/{slug}", get(render_post))
        .route("/api/my-repos", get(my_repos))
        .route("/fragments/repos", get(repos_fragment))
        .nest_service("/static", static_files)
        .route_service("/favicon.ico", favicon)
        .route("/ws", get(ws_handler))
        .fallback(not_found)
        .with_state(state)
}

async fn homepage(State(state): State<Arc<AppState>>) -> Html<String> {
    let templates = state.templates.read().await;
    let posts = state.posts.read().await;

    // The repository list and the scroll observation only exist client-side.
    let page = HomePage {
        profile: &state.profile,
        posts: posts.as_slice(),
        repos: None,
        show_nav: nav_visible(None),
    };
    Html(compose_home(&templates.layout, &page, state.is_development))
}

async fn not_found_page(state: &AppState, slug: &str) -> Response {
    let templates = state.templates.read().await;
    let page = compose_not_found(
        &templates.layout,
        &templates.not_found,
        slug,
        state.is_development,
    );
    (StatusCode::NOT_FOUND, Html(page)).into_response()
}

async fn render_post(
    UrlPath(slug): UrlPath<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let known = state.posts.read().await.iter().any(|p| p.slug == slug);
    if !known {
        return not_found_page(&state, &slug).await;
    }

    let source = match read_post(&state.content_dir.join(POSTS_DIR), &slug).await {
        Ok(Some(source)) => source,
        Ok(None) => return not_found_page(&state, &slug).await,
        Err(e) => {
            error!("Failed to read post `{}`: {}", slug, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let body_html = render_markdown_to_html(&source.body);
    let post = PostDescriptor {
        slug,
        frontmatter: source.frontmatter,
    };
    let templates = state.templates.read().await;
    Html(compose_post(
        &templates.layout,
        &templates.post,
        &post,
        &body_html,
        state.is_development,
    ))
    .into_response()
}

async fn fetch_repositories(state: &AppState) -> Result<RepositoryList, StatusCode> {
    let Some(client) = &state.repos else {
        return Ok(RepositoryList::default());
    };
    client.fetch().await.map_err(|e| {
        error!(endpoint = client.endpoint(), "Failed to fetch repositories: {}", e);
        StatusCode::BAD_GATEWAY
    })
}

async fn my_repos(State(state): State<Arc<AppState>>) -> Result<Json<RepositoryList>, StatusCode> {
    fetch_repositories(&state).await.map(Json)
}

async fn repos_fragment(State(state): State<Arc<AppState>>) -> Result<Html<String>, StatusCode> {
    let list = fetch_repositories(&state).await?;
    Ok(Html(render_repositories(Some(&list.repos))))
}

async fn not_found(State(state): State<Arc<AppState>>) -> Response {
    not_found_page(&state, "").await
}
