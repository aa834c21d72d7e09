//! Client for the remote agent directory service.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::models::{Agent, AgentPage, Conversation, CreateAgentRequest, Repository};
use crate::config::{AuthScheme, BoardConfig};
use crate::errors::DirectoryError;

/// Operations the board needs from the agent directory service.
/// Real implementation: `HttpAgentDirectory`. Test double: `test_support::FakeDirectory`.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn list(&self, limit: u32, cursor: Option<&str>) -> Result<AgentPage, DirectoryError>;
    async fn get(&self, id: &str) -> Result<Agent, DirectoryError>;
    async fn create(&self, request: &CreateAgentRequest) -> Result<Agent, DirectoryError>;
    async fn add_followup(&self, id: &str, text: &str) -> Result<(), DirectoryError>;
    async fn stop(&self, id: &str) -> Result<(), DirectoryError>;
    async fn delete(&self, id: &str) -> Result<(), DirectoryError>;
    async fn conversation(&self, id: &str) -> Result<Conversation, DirectoryError>;
    async fn list_models(&self) -> Result<Vec<String>, DirectoryError>;
    async fn list_repositories(&self) -> Result<Vec<Repository>, DirectoryError>;
}

/// Fetch every agent by following `nextCursor` until it is absent.
///
/// A cursor the service already handed out ends pagination early rather
/// than looping forever.
pub async fn list_all(
    directory: &dyn AgentDirectory,
    page_size: u32,
) -> Result<Vec<Agent>, DirectoryError> {
    let mut agents = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen_cursors = std::collections::HashSet::new();

    loop {
        let page = directory.list(page_size, cursor.as_deref()).await?;
        agents.extend(page.agents);

        match page.next_cursor.filter(|c| !c.is_empty()) {
            Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
            Some(next) => {
                tracing::warn!(
                    cursor = %next,
                    "agent service repeated a cursor; stopping pagination"
                );
                break;
            }
            None => break,
        }
    }

    Ok(agents)
}

// ── Wire payloads ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct PromptBody<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SourceBody<'a> {
    repository: &'a str,
    #[serde(rename = "ref")]
    git_ref: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetBody {
    auto_create_pr: bool,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    prompt: PromptBody<'a>,
    source: SourceBody<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<TargetBody>,
}

#[derive(Serialize)]
struct FollowupBody<'a> {
    prompt: PromptBody<'a>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<String>,
}

#[derive(Deserialize)]
struct RepositoriesResponse {
    #[serde(default)]
    repositories: Vec<Repository>,
}

// ── HTTP implementation ───────────────────────────────────────────────

pub struct HttpAgentDirectory {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    auth_scheme: AuthScheme,
}

impl HttpAgentDirectory {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        auth_scheme: AuthScheme,
        timeout: std::time::Duration,
    ) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("agent-board/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DirectoryError::Transport)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            auth_scheme,
        })
    }

    pub fn from_config(config: &BoardConfig) -> Result<Self, DirectoryError> {
        Self::new(
            config.base_url(),
            config.api_key.clone(),
            config.toml.api.auth_scheme,
            config.request_timeout(),
        )
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, DirectoryError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(DirectoryError::MissingCredential)?;
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");
        Ok(match self.auth_scheme {
            AuthScheme::Basic => builder.basic_auth(key, Some("")),
            AuthScheme::Bearer => builder.bearer_auth(key),
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, DirectoryError> {
        let resp = builder.send().await.map_err(DirectoryError::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, DirectoryError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(DirectoryError::Decode)
    }
}

#[async_trait]
impl AgentDirectory for HttpAgentDirectory {
    async fn list(&self, limit: u32, cursor: Option<&str>) -> Result<AgentPage, DirectoryError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        let builder = self.request(Method::GET, "/v0/agents")?.query(&query);
        self.send_json(builder).await
    }

    async fn get(&self, id: &str) -> Result<Agent, DirectoryError> {
        let builder = self.request(Method::GET, &format!("/v0/agents/{}", id))?;
        self.send_json(builder).await
    }

    async fn create(&self, request: &CreateAgentRequest) -> Result<Agent, DirectoryError> {
        let body = CreateBody {
            prompt: PromptBody {
                text: &request.prompt,
            },
            source: SourceBody {
                repository: &request.repository,
                git_ref: &request.git_ref,
            },
            model: request.model.as_deref().filter(|m| !m.is_empty()),
            target: request.auto_create_pr.map(|auto_create_pr| TargetBody { auto_create_pr }),
        };
        let builder = self.request(Method::POST, "/v0/agents")?.json(&body);
        self.send_json(builder).await
    }

    async fn add_followup(&self, id: &str, text: &str) -> Result<(), DirectoryError> {
        let body = FollowupBody {
            prompt: PromptBody { text },
        };
        let builder = self
            .request(Method::POST, &format!("/v0/agents/{}/followup", id))?
            .json(&body);
        self.send(builder).await.map(|_| ())
    }

    async fn stop(&self, id: &str) -> Result<(), DirectoryError> {
        let builder = self.request(Method::POST, &format!("/v0/agents/{}/stop", id))?;
        self.send(builder).await.map(|_| ())
    }

    async fn delete(&self, id: &str) -> Result<(), DirectoryError> {
        let builder = self.request(Method::DELETE, &format!("/v0/agents/{}", id))?;
        self.send(builder).await.map(|_| ())
    }

    async fn conversation(&self, id: &str) -> Result<Conversation, DirectoryError> {
        let builder = self.request(Method::GET, &format!("/v0/agents/{}/conversation", id))?;
        self.send_json(builder).await
    }

    async fn list_models(&self) -> Result<Vec<String>, DirectoryError> {
        let builder = self.request(Method::GET, "/v0/models")?;
        let resp: ModelsResponse = self.send_json(builder).await?;
        Ok(resp.models)
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, DirectoryError> {
        let builder = self.request(Method::GET, "/v0/repositories")?;
        let resp: RepositoriesResponse = self.send_json(builder).await?;
        Ok(resp.repositories)
    }
}
