use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::Profile;
use crate::content_loader::Templates;
use crate::models::PostDescriptor;
use crate::repos::RepoClient;

pub type RefreshBroadcaster = broadcast::Sender<()>;

pub struct AppState {
    pub templates: RwLock<Templates>,
    pub posts: RwLock<Vec<PostDescriptor>>,
    pub profile: Profile,
    pub content_dir: PathBuf,
    pub repos: Option<RepoClient>,
    pub is_development: bool,
}

#[derive(Clone)]
pub struct RouterState {
    pub app_state: Arc<AppState>,
    pub broadcaster: RefreshBroadcaster,
}

impl axum::extract::FromRef<RouterState> for Arc<AppState> {
    fn from_ref(state: &RouterState) -> Self {
        state.app_state.clone()
    }
}

impl axum::extract::FromRef<RouterState> for RefreshBroadcaster {
    fn from_ref(state: &RouterState) -> Self {
        state.broadcaster.clone()
    }
}
