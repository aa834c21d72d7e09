use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Agents ────────────────────────────────────────────────────────────

/// Lifecycle status reported by the agent directory service.
///
/// `Draft` is never returned by the service; it marks locally stored
/// creation requests. Status strings the service introduces later land in
/// `Unknown` instead of failing deserialization of the whole page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentStatus {
    Creating,
    Running,
    Finished,
    Error,
    Expired,
    Draft,
    Unknown(String),
}

impl AgentStatus {
    /// Every status the service (or the local draft store) is known to emit.
    pub const KNOWN: [AgentStatus; 6] = [
        AgentStatus::Creating,
        AgentStatus::Running,
        AgentStatus::Finished,
        AgentStatus::Error,
        AgentStatus::Expired,
        AgentStatus::Draft,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "CREATING",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
            Self::Expired => "EXPIRED",
            Self::Draft => "DRAFT",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATING" => Self::Creating,
            "RUNNING" => Self::Running,
            "FINISHED" => Self::Finished,
            "ERROR" => Self::Error,
            "EXPIRED" => Self::Expired,
            "DRAFT" => Self::Draft,
            _ => Self::Unknown(s.to_string()),
        }
    }

    /// Whether the agent can still be stopped.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Creating | Self::Running)
    }
}

impl From<String> for AgentStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<AgentStatus> for String {
    fn from(status: AgentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSource {
    pub repository: String,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_create_pr: Option<bool>,
}

/// A remote cloud agent as returned by the directory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: AgentStatus,
    pub source: AgentSource,
    #[serde(default)]
    pub target: AgentTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Agent {
    /// The associated pull request URL. Blank strings count as absent.
    pub fn pr_url(&self) -> Option<&str> {
        self.target
            .pr_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }
}

/// One page of `GET /v0/agents`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPage {
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parameters for launching a new agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub repository: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_create_pr: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub repository: String,
}

// ── Pull requests ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    #[default]
    Open,
    Closed,
    Merged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksStatus {
    Pending,
    Success,
    Failure,
    #[default]
    Unknown,
}

/// Normalized pull request state for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrStatus {
    pub state: PrState,
    #[serde(default)]
    pub is_draft: bool,
    /// `None` while the host has not computed mergeability yet.
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub mergeable_state: String,
    #[serde(default)]
    pub checks_status: ChecksStatus,
    #[serde(default)]
    pub has_approval: bool,
    #[serde(default)]
    pub review_decision: Option<String>,
}

// ── Columns ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKey {
    Backlog,
    Creating,
    Running,
    NeedsInput,
    Failed,
    DraftPr,
    ChecksFailing,
    HasConflict,
    ChecksPending,
    AwaitingReview,
    Approved,
    Merged,
}

impl ColumnKey {
    /// Canonical column set, in canonical order.
    pub const ALL: [ColumnKey; 12] = [
        ColumnKey::Backlog,
        ColumnKey::Creating,
        ColumnKey::Running,
        ColumnKey::NeedsInput,
        ColumnKey::Failed,
        ColumnKey::DraftPr,
        ColumnKey::ChecksFailing,
        ColumnKey::HasConflict,
        ColumnKey::ChecksPending,
        ColumnKey::AwaitingReview,
        ColumnKey::Approved,
        ColumnKey::Merged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Creating => "creating",
            Self::Running => "running",
            Self::NeedsInput => "needs_input",
            Self::Failed => "failed",
            Self::DraftPr => "draft_pr",
            Self::ChecksFailing => "checks_failing",
            Self::HasConflict => "has_conflict",
            Self::ChecksPending => "checks_pending",
            Self::AwaitingReview => "awaiting_review",
            Self::Approved => "approved",
            Self::Merged => "merged",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::Creating => "Creating",
            Self::Running => "Running",
            Self::NeedsInput => "Needs Input",
            Self::Failed => "Failed",
            Self::DraftPr => "Draft PR",
            Self::ChecksFailing => "Checks Failing",
            Self::HasConflict => "Has Conflict",
            Self::ChecksPending => "Checks Pending",
            Self::AwaitingReview => "Awaiting Review",
            Self::Approved => "Approved",
            Self::Merged => "Merged",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Backlog => "Drafts not yet launched",
            Self::Creating => "Agent is being provisioned",
            Self::Running => "Agent is working",
            Self::NeedsInput => "Finished without a pull request",
            Self::Failed => "Errored or expired",
            Self::DraftPr => "Pull request is still a draft",
            Self::ChecksFailing => "CI reported a failure",
            Self::HasConflict => "Pull request conflicts with its base",
            Self::ChecksPending => "CI is still running",
            Self::AwaitingReview => "Waiting for a reviewer",
            Self::Approved => "Approved and ready to merge",
            Self::Merged => "Merged or closed",
        }
    }
}

impl FromStr for ColumnKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("Invalid column: {}", s))
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Drafts ────────────────────────────────────────────────────────────

/// A locally persisted, not-yet-submitted agent creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: String,
    pub repository: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub auto_create_pr: bool,
    pub created_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(repository: &str, git_ref: &str, prompt: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            repository: repository.to_string(),
            git_ref: git_ref.to_string(),
            prompt: prompt.to_string(),
            model: None,
            auto_create_pr: true,
            created_at: Utc::now(),
        }
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus::Draft
    }

    pub fn to_create_request(&self) -> CreateAgentRequest {
        CreateAgentRequest {
            repository: self.repository.clone(),
            git_ref: self.git_ref.clone(),
            prompt: self.prompt.clone(),
            model: self.model.clone(),
            auto_create_pr: Some(self.auto_create_pr),
        }
    }
}

// ── API view types ────────────────────────────────────────────────────

/// A card on the board: either a remote agent or a local draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardCard {
    Agent {
        agent: Agent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pr_status: Option<PrStatus>,
    },
    Draft {
        draft: Draft,
    },
}

impl BoardCard {
    pub fn id(&self) -> &str {
        match self {
            Self::Agent { agent, .. } => &agent.id,
            Self::Draft { draft } => &draft.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub key: ColumnKey,
    pub title: String,
    pub description: String,
}

impl From<ColumnKey> for ColumnDefinition {
    fn from(key: ColumnKey) -> Self {
        Self {
            key,
            title: key.title().to_string(),
            description: key.description().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnView {
    #[serde(flatten)]
    pub column: ColumnDefinition,
    pub cards: Vec<BoardCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub columns: Vec<ColumnView>,
    /// Last directory failure, shown as a banner while stale data stays visible.
    pub error: Option<String>,
    pub agents_fetched_at: Option<DateTime<Utc>>,
    pub pr_statuses_fetched_at: Option<DateTime<Utc>>,
    pub focused: bool,
}

impl BoardView {
    pub fn column(&self, key: ColumnKey) -> Option<&ColumnView> {
        self.columns.iter().find(|c| c.column.key == key)
    }
}
