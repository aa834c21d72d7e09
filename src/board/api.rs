use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get, post, put},
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::column_order::ColumnOrderManager;
use super::directory::AgentDirectory;
use super::drafts::DraftStore;
use super::models::{BoardView, ColumnDefinition, ColumnKey, CreateAgentRequest, Draft};
use super::poller::BoardPoller;
use super::relay::{Relay, relay_handler};
use super::storage::KvStore;
use super::view::build_board;
use super::ws::{WsMessage, broadcast_message};
use crate::errors::{BoardError, DirectoryError, StorageError};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub directory: Arc<dyn AgentDirectory>,
    pub poller: Arc<BoardPoller>,
    pub columns: ColumnOrderManager,
    pub drafts: DraftStore,
    pub relay: Relay,
    pub ws_tx: broadcast::Sender<String>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        poller: Arc<BoardPoller>,
        store: Arc<dyn KvStore>,
        relay: Relay,
    ) -> Self {
        let (ws_tx, _rx) = broadcast::channel::<String>(256);
        Self {
            directory,
            poller,
            columns: ColumnOrderManager::new(store.clone()),
            drafts: DraftStore::new(store),
            relay,
            ws_tx,
        }
    }

    /// The board as it stands: latest snapshot, local drafts, user order.
    pub fn board_view(&self) -> BoardView {
        build_board(
            &self.poller.snapshot(),
            &self.drafts.list(),
            &self.columns.current(),
            self.poller.is_focused(),
        )
    }

    fn broadcast_drafts(&self) {
        broadcast_message(
            &self.ws_tx,
            &WsMessage::DraftsChanged {
                drafts: self.drafts.list(),
            },
        );
    }

    fn broadcast_order(&self, order: &[ColumnKey]) {
        broadcast_message(
            &self.ws_tx,
            &WsMessage::ColumnsReordered {
                order: order.to_vec(),
            },
        );
    }
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ReorderRequest {
    pub order: Vec<String>,
}

#[derive(Deserialize)]
pub struct MoveColumnRequest {
    pub column: String,
    pub index: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusRequest {
    pub agent_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusResponse {
    pub focused: bool,
    pub agent_id: Option<String>,
}

#[derive(Deserialize)]
pub struct FollowupRequest {
    pub text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftRequest {
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(rename = "ref", default)]
    pub git_ref: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub auto_create_pr: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftList {
    pub drafts: Vec<Draft>,
    pub last_repository: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        if e.is_not_found() {
            ApiError::NotFound(e.to_string())
        } else {
            ApiError::BadGateway(e.to_string())
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<BoardError> for ApiError {
    fn from(e: BoardError) -> Self {
        match e {
            BoardError::Directory(e) => e.into(),
            BoardError::Storage(e) => e.into(),
            e @ (BoardError::AgentNotFound { .. } | BoardError::DraftNotFound { .. }) => {
                ApiError::NotFound(e.to_string())
            }
            e @ (BoardError::InvalidColumn { .. } | BoardError::BadRequest(_)) => {
                ApiError::BadRequest(e.to_string())
            }
            e => ApiError::Internal(e.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/board", get(get_board))
        .route("/api/board/refresh", post(refresh_board))
        .route("/api/columns", get(list_columns))
        .route("/api/columns/order", put(reorder_columns))
        .route("/api/columns/move", post(move_column))
        .route("/api/columns/reset", post(reset_columns))
        .route("/api/focus", put(set_focus))
        .route("/api/agents", post(create_agent))
        .route("/api/agents/{id}", get(get_agent).delete(delete_agent))
        .route("/api/agents/{id}/stop", post(stop_agent))
        .route("/api/agents/{id}/followup", post(add_followup))
        .route("/api/agents/{id}/conversation", get(get_conversation))
        .route("/api/models", get(list_models))
        .route("/api/repositories", get(list_repositories))
        .route("/api/drafts", get(list_drafts).post(create_draft))
        .route("/api/drafts/{id}", axum::routing::delete(delete_draft))
        .route("/api/drafts/{id}/launch", post(launch_draft))
        .route("/relay/{*path}", any(relay_handler))
        .route("/health", get(health_check))
}

fn require_non_blank(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(BoardError::BadRequest(format!("{} must not be empty", field)).into());
    }
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn get_board(State(state): State<SharedState>) -> Json<BoardView> {
    Json(state.board_view())
}

/// Poll now. A directory failure still answers with the (stale) board;
/// the failure shows up in its `error` field.
async fn refresh_board(State(state): State<SharedState>) -> Json<BoardView> {
    if let Err(e) = state.poller.poll_once().await {
        tracing::debug!(error = %e, "manual refresh failed");
    }
    Json(state.board_view())
}

async fn list_columns(State(state): State<SharedState>) -> Json<Vec<ColumnDefinition>> {
    Json(
        state
            .columns
            .current()
            .into_iter()
            .map(ColumnDefinition::from)
            .collect(),
    )
}

async fn reorder_columns(
    State(state): State<SharedState>,
    Json(req): Json<ReorderRequest>,
) -> Json<Vec<ColumnKey>> {
    let order = state.columns.reorder(&req.order);
    state.broadcast_order(&order);
    Json(order)
}

async fn move_column(
    State(state): State<SharedState>,
    Json(req): Json<MoveColumnRequest>,
) -> Result<Json<Vec<ColumnKey>>, ApiError> {
    let column: ColumnKey = req.column.parse().map_err(|_| BoardError::InvalidColumn {
        column: req.column.clone(),
    })?;
    let order = state.columns.move_column(column, req.index);
    state.broadcast_order(&order);
    Ok(Json(order))
}

async fn reset_columns(State(state): State<SharedState>) -> Json<Vec<ColumnKey>> {
    let order = state.columns.reset();
    state.broadcast_order(&order);
    Json(order)
}

async fn set_focus(
    State(state): State<SharedState>,
    Json(req): Json<FocusRequest>,
) -> Json<FocusResponse> {
    let agent_id = req.agent_id.filter(|id| !id.trim().is_empty());
    state.poller.set_focus(agent_id.clone());
    Json(FocusResponse {
        focused: agent_id.is_some(),
        agent_id,
    })
}

async fn create_agent(
    State(state): State<SharedState>,
    Json(req): Json<CreateAgentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_non_blank(&req.repository, "repository")?;
    require_non_blank(&req.prompt, "prompt")?;
    let agent = state.directory.create(&req).await?;
    state.drafts.set_last_repository(&req.repository);
    tracing::info!(agent_id = %agent.id, repository = %req.repository, "agent launched");
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn get_agent(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = state.directory.get(&id).await?;
    Ok(Json(agent))
}

async fn delete_agent(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.directory.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_agent(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = state.directory.get(&id).await?;
    if !agent.status.is_active() {
        return Err(BoardError::BadRequest(format!(
            "Agent {} is {} and cannot be stopped",
            id, agent.status
        ))
        .into());
    }
    state.directory.stop(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_followup(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<FollowupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_non_blank(&req.text, "text")?;
    state.directory.add_followup(&id, &req.text).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_conversation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state.directory.conversation(&id).await?;
    Ok(Json(conversation))
}

async fn list_models(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let models = state.directory.list_models().await?;
    Ok(Json(serde_json::json!({"models": models})))
}

async fn list_repositories(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let repositories = state.directory.list_repositories().await?;
    Ok(Json(serde_json::json!({"repositories": repositories})))
}

async fn list_drafts(State(state): State<SharedState>) -> Json<DraftList> {
    Json(DraftList {
        drafts: state.drafts.list(),
        last_repository: state.drafts.last_repository(),
    })
}

async fn create_draft(
    State(state): State<SharedState>,
    Json(req): Json<CreateDraftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_non_blank(&req.prompt, "prompt")?;
    let repository = req
        .repository
        .filter(|r| !r.trim().is_empty())
        .or_else(|| state.drafts.last_repository())
        .ok_or_else(|| ApiError::BadRequest("repository must not be empty".to_string()))?;
    let git_ref = req
        .git_ref
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "main".to_string());

    let mut draft = Draft::new(&repository, &git_ref, &req.prompt);
    draft.model = req.model.filter(|m| !m.trim().is_empty());
    if let Some(auto_create_pr) = req.auto_create_pr {
        draft.auto_create_pr = auto_create_pr;
    }
    let draft = state.drafts.save(draft)?;
    state.broadcast_drafts();
    Ok((StatusCode::CREATED, Json(draft)))
}

async fn delete_draft(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.drafts.delete(&id)? {
        return Err(BoardError::DraftNotFound { id }.into());
    }
    state.broadcast_drafts();
    Ok(StatusCode::NO_CONTENT)
}

/// Submit a draft. The draft is removed only once the agent exists.
async fn launch_draft(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state
        .drafts
        .get(&id)
        .ok_or_else(|| BoardError::DraftNotFound { id: id.clone() })?;
    let agent = state.directory.create(&draft.to_create_request()).await?;

    if let Err(e) = state.drafts.delete(&id) {
        tracing::warn!(draft_id = %id, error = %e, "launched draft could not be removed");
    }
    state.drafts.set_last_repository(&draft.repository);
    state.broadcast_drafts();
    tracing::info!(draft_id = %id, agent_id = %agent.id, "draft launched");
    Ok((StatusCode::CREATED, Json(agent)))
}
