use std::{path::Path, sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use notify_debouncer_full::{
    new_debouncer, DebouncedEvent,
    notify::{RecursiveMode, Watcher, Error as NotifyError},
};
use tracing::{debug, error, info};

use crate::content_loader::reload_content;
use crate::state::{AppState, RefreshBroadcaster};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(tx): State<RefreshBroadcaster>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, tx))
}

async fn handle_socket(mut socket: WebSocket, tx: RefreshBroadcaster) {
    let mut rx = tx.subscribe();

    if rx.recv().await.is_ok() {
        if socket.send(Message::Text("reload".to_string().into())).await.is_err() {
            debug!("Client disconnected before reload message could be sent");
        }
    }
}

/// Editor lock files and backups (Emacs `.#*`, `*~`) never trigger a reload.
fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |s| s.starts_with(".#") || s.ends_with('~'))
}

fn is_relevant(event: &DebouncedEvent) -> bool {
    let kind_matters = event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove();
    kind_matters && !event.event.paths.iter().any(|p| is_temp_file(p))
}

/// Watches the content directory and, on change, reloads posts and
/// templates before telling connected pages to refresh.
pub fn start_content_watcher(tx: RefreshBroadcaster, app_state: Arc<AppState>) {
    info!(dir = %app_state.content_dir.display(), "Starting content watcher for hot-reload...");
    tokio::spawn(async move {
        let (watcher_tx, mut watcher_rx) = tokio::sync::mpsc::channel(1);

        let debouncer = new_debouncer(Duration::from_millis(200), None, move |res: Result<Vec<DebouncedEvent>, Vec<NotifyError>>| {
            match res {
                Ok(events) => {
                    let changed: Vec<_> = events.iter().filter(|e| is_relevant(e)).collect();
                    if !changed.is_empty() {
                        debug!("Relevant file change detected: {:?}", changed.iter().flat_map(|e| &e.event.paths).map(|p| p.display()).collect::<Vec<_>>());
                        if let Err(e) = watcher_tx.blocking_send(()) {
                            error!("Failed to send watcher event: {}", e);
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!("Watcher error: {}", e);
                    }
                }
            }
        });

        let mut debouncer = match debouncer {
            Ok(d) => d,
            Err(e) => {
                error!("Failed to create debouncer, hot reload disabled: {}", e);
                return;
            }
        };

        if let Err(e) = debouncer
            .watcher()
            .watch(&app_state.content_dir, RecursiveMode::Recursive)
        {
            error!("Failed to watch content directory, hot reload disabled: {}", e);
            return;
        }

        // The debouncer stays alive for as long as this loop runs.
        while watcher_rx.recv().await.is_some() {
            info!("Content change detected, reloading content and sending signal...");

            reload_content(&app_state).await;

            if let Err(e) = tx.send(()) {
                debug!("No reload listeners: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::is_temp_file;
    use std::path::Path;

    #[test]
    fn editor_artifacts_are_ignored() {
        assert!(is_temp_file(Path::new("content/posts/.#draft.mdx")));
        assert!(is_temp_file(Path::new("content/posts/draft.mdx~")));
        assert!(!is_temp_file(Path::new("content/posts/draft.mdx")));
    }
}
