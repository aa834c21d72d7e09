use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use super::api::{self, AppState};
use super::directory::HttpAgentDirectory;
use super::github::GitHubPrClient;
use super::poller::BoardPoller;
use super::pr_status::PrStatusFetcher;
use super::relay::Relay;
use super::storage::FileStore;
use super::ws::{self, WsMessage, broadcast_message};
use crate::config::BoardConfig;

/// Configuration for the board server.
pub struct ServerConfig {
    pub port: u16,
    pub dev_mode: bool,
    /// Open the board in a browser once listening.
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3141,
            dev_mode: false,
            open_browser: false,
        }
    }
}

/// Build the full application router with API, relay and WebSocket.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Wire the production collaborators together from `config`.
pub fn build_state(config: &BoardConfig) -> Result<Arc<AppState>> {
    let directory = Arc::new(
        HttpAgentDirectory::from_config(config).context("Failed to create agent service client")?,
    );
    let github = Arc::new(GitHubPrClient::from_config(config)?);
    let prs = PrStatusFetcher::new(github, config.pr_cache_ttl(), config.pr_batch_size());
    let poller = Arc::new(BoardPoller::new(
        directory.clone(),
        prs,
        config.page_size(),
        config.poll_interval(),
    ));
    let relay = Relay::new(config.base_url(), config.request_timeout())?;
    let store = Arc::new(FileStore::new(&config.state_file));

    Ok(Arc::new(AppState::new(directory, poller, store, relay)))
}

/// Push every published snapshot to WebSocket clients until `shutdown` flips.
pub async fn publish_snapshots(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let mut snapshots = state.poller.subscribe();
    let mut last_error: Option<String> = None;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let error = snapshots.borrow_and_update().error.clone();
                if let Some(error) = &error
                    && last_error.as_ref() != Some(error)
                {
                    broadcast_message(
                        &state.ws_tx,
                        &WsMessage::PollFailed {
                            error: error.clone(),
                        },
                    );
                }
                last_error = error;
                broadcast_message(
                    &state.ws_tx,
                    &WsMessage::BoardUpdated {
                        board: state.board_view(),
                    },
                );
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Start the board server and its poller.
pub async fn start_server(config: ServerConfig, board: &BoardConfig) -> Result<()> {
    if board.api_key.is_none() {
        tracing::warn!("AGENT_BOARD_API_KEY is not set; the board will show an error banner");
    }
    let state = build_state(board)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller = state.poller.clone();
    let mut poller_shutdown = shutdown_rx.clone();
    let poller_task = tokio::spawn(poller.run(async move {
        let _ = poller_shutdown.changed().await;
    }));
    let publisher_task = tokio::spawn(publish_snapshots(state.clone(), shutdown_rx));

    let mut app = build_router(state.clone());
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    let url = format!("http://{}", local_addr);
    tracing::info!(
        %url,
        upstream = state.relay.upstream(),
        interval_secs = state.poller.interval().as_secs(),
        "agent board running"
    );
    println!("Agent Board running at {}", url);

    if config.open_browser
        && let Err(e) = open::that(&url)
    {
        tracing::warn!(error = %e, "failed to open browser");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(poller_task, publisher_task);
    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::models::AgentStatus;
    use crate::board::test_support::{FakeDirectory, agent, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_via_full_router() {
        let app = build_router(test_state(Arc::new(FakeDirectory::new(vec![]))));
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_mounted() {
        let app = build_router(test_state(Arc::new(FakeDirectory::new(vec![]))));
        let req = Request::builder()
            .uri("/api/board")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let app = build_router(test_state(Arc::new(FakeDirectory::new(vec![]))));
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = build_router(test_state(Arc::new(FakeDirectory::new(vec![]))));
        let req = Request::builder()
            .uri("/api/nothing-here")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_publisher_broadcasts_board_and_failures() {
        let directory = Arc::new(FakeDirectory::new(vec![agent("a1", AgentStatus::Running)]));
        let state = test_state(directory.clone());
        let mut rx = state.ws_tx.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(publish_snapshots(state.clone(), shutdown_rx));
        tokio::time::sleep(Duration::from_millis(20)).await;

        directory.fail_with(401);
        let _ = state.poller.poll_once().await;

        let mut messages = Vec::new();
        while let Ok(Ok(msg)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
            messages.push(msg);
        }
        assert!(messages.iter().any(|m| m.contains("\"type\":\"PollFailed\"")));
        assert!(messages.iter().any(|m| m.contains("\"type\":\"BoardUpdated\"")));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_build_state_from_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = BoardConfig::load_with_env(dir.path(), None, |_| None).unwrap();
        let state = build_state(&config).unwrap();
        assert_eq!(state.relay.upstream(), "https://api.cursor.com");
        assert_eq!(state.poller.interval(), Duration::from_secs(30));
    }
}
