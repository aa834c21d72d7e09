use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::models::{ChecksStatus, PrState, PrStatus};
use crate::config::BoardConfig;

static PR_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.com/([^/\s]+)/([^/\s]+)/pull/(\d+)(?:[/?#].*)?$")
        .expect("PR URL pattern is valid")
});

/// A pull request coordinate on GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

/// Parse `https://github.com/<owner>/<repo>/pull/<number>[/...]`.
///
/// Anything else (other hosts, issue links, truncated paths) yields `None`.
pub fn parse_pr_url(url: &str) -> Option<PrRef> {
    let caps = PR_URL_RE.captures(url.trim())?;
    Some(PrRef {
        owner: caps[1].to_string(),
        repo: caps[2].to_string(),
        number: caps[3].parse().ok()?,
    })
}

/// Source of normalized pull request state.
///
/// `Ok(None)` means the URL does not point at a pull request this source
/// understands.
#[async_trait]
pub trait PrStatusSource: Send + Sync {
    async fn fetch(&self, pr_url: &str) -> Result<Option<PrStatus>>;
}

// ── GitHub wire types ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GitHubPull {
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub merged: Option<bool>,
    #[serde(default)]
    pub merged_at: Option<String>,
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub mergeable_state: Option<String>,
    pub head: GitHubHead,
}

#[derive(Debug, Deserialize)]
pub struct GitHubHead {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct GitHubReview {
    #[serde(default)]
    pub user: Option<GitHubUser>,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct GitHubCheckRun {
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckRunsResponse {
    #[serde(default)]
    check_runs: Vec<GitHubCheckRun>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubCommitStatus {
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct CombinedStatusResponse {
    #[serde(default)]
    statuses: Vec<GitHubCommitStatus>,
}

// ── Normalization ─────────────────────────────────────────────────────

const FAILING_CONCLUSIONS: &[&str] = &[
    "failure",
    "cancelled",
    "timed_out",
    "action_required",
    "startup_failure",
];
const PASSING_CONCLUSIONS: &[&str] = &["success", "neutral", "skipped"];

pub fn pr_state(pull: &GitHubPull) -> PrState {
    if pull.merged == Some(true) || pull.merged_at.is_some() {
        PrState::Merged
    } else if pull.state.eq_ignore_ascii_case("closed") {
        PrState::Closed
    } else {
        PrState::Open
    }
}

/// Fold check runs and commit statuses into one verdict.
///
/// Failure wins over pending, pending over success.
pub fn aggregate_checks(runs: &[GitHubCheckRun], statuses: &[GitHubCommitStatus]) -> ChecksStatus {
    let conclusion = |run: &GitHubCheckRun| {
        run.conclusion
            .as_deref()
            .unwrap_or_default()
            .to_ascii_lowercase()
    };

    let failed = runs
        .iter()
        .any(|r| FAILING_CONCLUSIONS.contains(&conclusion(r).as_str()))
        || statuses
            .iter()
            .any(|s| matches!(s.state.as_str(), "failure" | "error"));
    if failed {
        return ChecksStatus::Failure;
    }

    let pending = runs
        .iter()
        .any(|r| r.status != "completed" || r.conclusion.is_none())
        || statuses.iter().any(|s| s.state == "pending");
    if pending {
        return ChecksStatus::Pending;
    }

    let passed = runs
        .iter()
        .any(|r| PASSING_CONCLUSIONS.contains(&conclusion(r).as_str()))
        || statuses.iter().any(|s| s.state == "success");
    if passed {
        ChecksStatus::Success
    } else {
        ChecksStatus::Unknown
    }
}

/// `(has_approval, review_decision)` from each reviewer's latest verdict.
///
/// Reviews arrive oldest first. Comments do not replace an earlier verdict;
/// a dismissal clears it.
pub fn review_summary(reviews: &[GitHubReview]) -> (bool, Option<String>) {
    let mut latest: HashMap<&str, &str> = HashMap::new();
    for review in reviews {
        let Some(user) = &review.user else { continue };
        match review.state.as_str() {
            "APPROVED" | "CHANGES_REQUESTED" => {
                latest.insert(&user.login, &review.state);
            }
            "DISMISSED" => {
                latest.remove(user.login.as_str());
            }
            _ => {}
        }
    }

    let has_approval = latest.values().any(|s| *s == "APPROVED");
    let decision = if latest.values().any(|s| *s == "CHANGES_REQUESTED") {
        Some("CHANGES_REQUESTED".to_string())
    } else if has_approval {
        Some("APPROVED".to_string())
    } else {
        None
    };
    (has_approval, decision)
}

pub fn normalize(
    pull: &GitHubPull,
    reviews: &[GitHubReview],
    runs: &[GitHubCheckRun],
    statuses: &[GitHubCommitStatus],
) -> PrStatus {
    let (has_approval, review_decision) = review_summary(reviews);
    PrStatus {
        state: pr_state(pull),
        is_draft: pull.draft,
        mergeable: pull.mergeable,
        mergeable_state: pull.mergeable_state.clone().unwrap_or_default(),
        checks_status: aggregate_checks(runs, statuses),
        has_approval,
        review_decision,
    }
}

// ── REST client ───────────────────────────────────────────────────────

pub struct GitHubPrClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubPrClient {
    pub fn new(api_base: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("agent-board/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build GitHub HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &BoardConfig) -> Result<Self> {
        Self::new(
            config.github_api_base(),
            config.github_token.clone(),
            config.request_timeout(),
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let mut req = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to reach GitHub for {}", path))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error ({}) for {}: {}", status, path, body);
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("Failed to parse GitHub response for {}", path))
    }
}

#[async_trait]
impl PrStatusSource for GitHubPrClient {
    async fn fetch(&self, pr_url: &str) -> Result<Option<PrStatus>> {
        let Some(pr) = parse_pr_url(pr_url) else {
            tracing::debug!(pr_url, "not a GitHub pull request URL");
            return Ok(None);
        };
        let repo_path = format!("/repos/{}/{}", pr.owner, pr.repo);

        let pull: GitHubPull = self
            .get_json(&format!("{}/pulls/{}", repo_path, pr.number))
            .await?;
        let sha = &pull.head.sha;
        let reviews_path = format!("{}/pulls/{}/reviews?per_page=100", repo_path, pr.number);
        let runs_path = format!("{}/commits/{}/check-runs?per_page=100", repo_path, sha);
        let status_path = format!("{}/commits/{}/status", repo_path, sha);

        let (reviews, runs, combined) = tokio::try_join!(
            self.get_json::<Vec<GitHubReview>>(&reviews_path),
            self.get_json::<CheckRunsResponse>(&runs_path),
            self.get_json::<CombinedStatusResponse>(&status_path),
        )?;

        Ok(Some(normalize(
            &pull,
            &reviews,
            &runs.check_runs,
            &combined.statuses,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::test_support::serve;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};

    fn pull(state: &str) -> GitHubPull {
        GitHubPull {
            state: state.to_string(),
            draft: false,
            merged: None,
            merged_at: None,
            mergeable: Some(true),
            mergeable_state: Some("clean".to_string()),
            head: GitHubHead {
                sha: "abc123".to_string(),
            },
        }
    }

    fn run(status: &str, conclusion: Option<&str>) -> GitHubCheckRun {
        GitHubCheckRun {
            status: status.to_string(),
            conclusion: conclusion.map(String::from),
        }
    }

    fn commit_status(state: &str) -> GitHubCommitStatus {
        GitHubCommitStatus {
            state: state.to_string(),
        }
    }

    fn review(login: &str, state: &str) -> GitHubReview {
        GitHubReview {
            user: Some(GitHubUser {
                login: login.to_string(),
            }),
            state: state.to_string(),
        }
    }

    #[test]
    fn test_parse_pr_url() {
        assert_eq!(
            parse_pr_url("https://github.com/acme/web/pull/42"),
            Some(PrRef {
                owner: "acme".to_string(),
                repo: "web".to_string(),
                number: 42
            })
        );
        assert_eq!(
            parse_pr_url("https://github.com/acme/web/pull/42/files").map(|p| p.number),
            Some(42)
        );
        assert!(parse_pr_url("https://github.com/acme/web/issues/42").is_none());
        assert!(parse_pr_url("https://gitlab.com/acme/web/pull/42").is_none());
        assert!(parse_pr_url("https://github.com/acme/web/pull/").is_none());
        assert!(parse_pr_url("").is_none());
    }

    #[test]
    fn test_pr_state_merged_takes_precedence() {
        let mut p = pull("closed");
        assert_eq!(pr_state(&p), PrState::Closed);
        p.merged_at = Some("2024-01-16T09:00:00Z".to_string());
        assert_eq!(pr_state(&p), PrState::Merged);

        let mut p = pull("closed");
        p.merged = Some(true);
        assert_eq!(pr_state(&p), PrState::Merged);
        assert_eq!(pr_state(&pull("open")), PrState::Open);
    }

    #[test]
    fn test_aggregate_checks_failure_beats_pending() {
        let runs = [run("in_progress", None), run("completed", Some("timed_out"))];
        assert_eq!(aggregate_checks(&runs, &[]), ChecksStatus::Failure);
        assert_eq!(
            aggregate_checks(&[run("completed", Some("success"))], &[commit_status("error")]),
            ChecksStatus::Failure
        );
    }

    #[test]
    fn test_aggregate_checks_pending_beats_success() {
        let runs = [run("queued", None), run("completed", Some("success"))];
        assert_eq!(aggregate_checks(&runs, &[]), ChecksStatus::Pending);
        assert_eq!(
            aggregate_checks(&[run("completed", Some("success"))], &[commit_status("pending")]),
            ChecksStatus::Pending
        );
    }

    #[test]
    fn test_aggregate_checks_success_and_unknown() {
        let runs = [run("completed", Some("success")), run("completed", Some("skipped"))];
        assert_eq!(aggregate_checks(&runs, &[]), ChecksStatus::Success);
        assert_eq!(
            aggregate_checks(&[], &[commit_status("success")]),
            ChecksStatus::Success
        );
        assert_eq!(aggregate_checks(&[], &[]), ChecksStatus::Unknown);
        assert_eq!(
            aggregate_checks(&[run("completed", Some("stale"))], &[]),
            ChecksStatus::Unknown
        );
    }

    #[test]
    fn test_review_summary_uses_latest_verdict_per_reviewer() {
        let reviews = [
            review("alice", "CHANGES_REQUESTED"),
            review("alice", "COMMENTED"),
            review("alice", "APPROVED"),
        ];
        assert_eq!(review_summary(&reviews), (true, Some("APPROVED".to_string())));
    }

    #[test]
    fn test_review_summary_changes_requested_dominates() {
        let reviews = [review("alice", "APPROVED"), review("bob", "CHANGES_REQUESTED")];
        assert_eq!(
            review_summary(&reviews),
            (true, Some("CHANGES_REQUESTED".to_string()))
        );
    }

    #[test]
    fn test_review_summary_dismissal_clears_verdict() {
        let reviews = [review("alice", "APPROVED"), review("alice", "DISMISSED")];
        assert_eq!(review_summary(&reviews), (false, None));
        assert_eq!(review_summary(&[review("bob", "COMMENTED")]), (false, None));
    }

    async fn pull_handler(
        Path((_, _, number)): Path<(String, String, u64)>,
        headers: HeaderMap,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        if number == 404 {
            return Err(StatusCode::NOT_FOUND);
        }
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let mergeable_state = if auth == "Bearer ghp_test" {
            "clean"
        } else {
            "unauthenticated"
        };
        Ok(Json(serde_json::json!({
            "state": "open",
            "draft": false,
            "merged": false,
            "merged_at": null,
            "mergeable": null,
            "mergeable_state": mergeable_state,
            "head": {"sha": "deadbeef"}
        })))
    }

    fn github_mock() -> Router {
        Router::new()
            .route("/repos/{owner}/{repo}/pulls/{number}", get(pull_handler))
            .route(
                "/repos/{owner}/{repo}/pulls/{number}/reviews",
                get(|| async {
                    Json(serde_json::json!([
                        {"user": {"login": "alice"}, "state": "APPROVED"}
                    ]))
                }),
            )
            .route(
                "/repos/{owner}/{repo}/commits/{sha}/check-runs",
                get(|| async {
                    Json(serde_json::json!({
                        "total_count": 2,
                        "check_runs": [
                            {"status": "completed", "conclusion": "success"},
                            {"status": "in_progress", "conclusion": null}
                        ]
                    }))
                }),
            )
            .route(
                "/repos/{owner}/{repo}/commits/{sha}/status",
                get(|| async { Json(serde_json::json!({"state": "pending", "statuses": []})) }),
            )
    }

    #[tokio::test]
    async fn test_fetch_normalizes_pull_request() {
        let base = serve(github_mock()).await;
        let client = GitHubPrClient::new(
            &base,
            Some("ghp_test".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let status = client
            .fetch("https://github.com/acme/web/pull/42")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.state, PrState::Open);
        assert_eq!(status.mergeable, None);
        assert_eq!(status.mergeable_state, "clean");
        assert_eq!(status.checks_status, ChecksStatus::Pending);
        assert!(status.has_approval);
        assert_eq!(status.review_decision.as_deref(), Some("APPROVED"));
    }

    #[tokio::test]
    async fn test_fetch_unparsable_url_is_none() {
        let client =
            GitHubPrClient::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        assert!(client.fetch("not a url").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_missing_pull_is_error() {
        let base = serve(github_mock()).await;
        let client = GitHubPrClient::new(&base, None, Duration::from_secs(5)).unwrap();
        let err = client
            .fetch("https://github.com/acme/web/pull/404")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"), "got {}", err);
    }
}
