use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::directory::{AgentDirectory, list_all};
use super::models::{Agent, PrStatus};
use super::pr_status::PrStatusFetcher;
use crate::errors::DirectoryError;

/// Immutable result of the most recent fetches.
#[derive(Debug, Clone, Default)]
pub struct BoardSnapshot {
    pub agents: Vec<Agent>,
    /// Keyed by agent id.
    pub pr_statuses: HashMap<String, PrStatus>,
    /// Last directory failure. Cleared by the next successful poll.
    pub error: Option<String>,
    pub agents_fetched_at: Option<DateTime<Utc>>,
    pub pr_statuses_fetched_at: Option<DateTime<Utc>>,
}

/// Periodically refreshes agents and their pull request state.
///
/// Each poll publishes twice: once with the new agent list (PR statuses
/// from the previous poll, restricted to agents still present), and once
/// the PR fan-out finishes.
pub struct BoardPoller {
    directory: Arc<dyn AgentDirectory>,
    prs: PrStatusFetcher,
    page_size: u32,
    interval: Duration,
    focus: Mutex<Option<String>>,
    tx: watch::Sender<Arc<BoardSnapshot>>,
}

impl BoardPoller {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        prs: PrStatusFetcher,
        page_size: u32,
        interval: Duration,
    ) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(BoardSnapshot::default()));
        Self {
            directory,
            prs,
            page_size,
            interval,
            focus: Mutex::new(None),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardSnapshot>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<BoardSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Open (`Some`) or close (`None`) a detail view. Timer polls are
    /// skipped while one is open.
    pub fn set_focus(&self, agent_id: Option<String>) {
        if let Ok(mut focus) = self.focus.lock() {
            if *focus != agent_id {
                tracing::debug!(agent_id = ?agent_id, "focus changed");
            }
            *focus = agent_id;
        }
    }

    pub fn focused(&self) -> Option<String> {
        self.focus.lock().ok().and_then(|f| f.clone())
    }

    pub fn is_focused(&self) -> bool {
        self.focused().is_some()
    }

    /// Run one full poll and publish the results.
    ///
    /// On a directory failure the previous agents and PR statuses stay
    /// published and the error is recorded on the snapshot.
    pub async fn poll_once(&self) -> Result<Arc<BoardSnapshot>, DirectoryError> {
        let agents = match list_all(self.directory.as_ref(), self.page_size).await {
            Ok(agents) => agents,
            Err(e) => {
                tracing::warn!(error = %e, "agent poll failed; keeping previous board");
                let mut snapshot = (*self.snapshot()).clone();
                snapshot.error = Some(e.to_string());
                self.tx.send_replace(Arc::new(snapshot));
                return Err(e);
            }
        };

        let previous = self.snapshot();
        let pr_statuses = carried_pr_statuses(&previous, &agents);
        let with_agents = BoardSnapshot {
            agents,
            pr_statuses,
            error: None,
            agents_fetched_at: Some(Utc::now()),
            pr_statuses_fetched_at: previous.pr_statuses_fetched_at,
        };
        self.tx.send_replace(Arc::new(with_agents.clone()));

        let pr_statuses = self.prs.fetch_all(&with_agents.agents).await;
        tracing::info!(
            agents = with_agents.agents.len(),
            pull_requests = pr_statuses.len(),
            "board refreshed"
        );
        let complete = Arc::new(BoardSnapshot {
            pr_statuses,
            pr_statuses_fetched_at: Some(Utc::now()),
            ..with_agents
        });
        self.tx.send_replace(complete.clone());
        Ok(complete)
    }

    /// Poll on every tick until `shutdown` resolves.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("board poller stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if self.is_focused() {
                        tracing::debug!("detail view open; skipping poll");
                        continue;
                    }
                    // Failures are recorded on the snapshot.
                    let _ = self.poll_once().await;
                }
            }
        }
    }
}

/// PR statuses from `previous` that still describe `agents`.
///
/// An entry survives only while its agent is still listed with the same PR
/// URL, so a replaced or removed PR never shows a stale status.
fn carried_pr_statuses(previous: &BoardSnapshot, agents: &[Agent]) -> HashMap<String, PrStatus> {
    let mut carried = previous.pr_statuses.clone();
    carried.retain(|id, _| {
        let before = previous
            .agents
            .iter()
            .find(|a| &a.id == id)
            .and_then(|a| a.pr_url());
        agents
            .iter()
            .any(|a| &a.id == id && a.pr_url().is_some() && a.pr_url() == before)
    });
    carried
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::classifier::classify;
    use crate::board::models::{AgentStatus, ChecksStatus, ColumnKey, PrState};
    use crate::board::test_support::{FakeDirectory, FakePrSource, agent, agent_with_pr};

    const PR_URL: &str = "https://github.com/acme/web/pull/42";

    fn poller(directory: Arc<FakeDirectory>, prs: Arc<FakePrSource>) -> BoardPoller {
        BoardPoller::new(
            directory,
            PrStatusFetcher::new(prs, Duration::ZERO, 5),
            100,
            Duration::from_millis(10),
        )
    }

    fn column_of(snapshot: &BoardSnapshot, id: &str) -> ColumnKey {
        let agent = snapshot.agents.iter().find(|a| a.id == id).unwrap();
        classify(&agent.status, agent.pr_url(), snapshot.pr_statuses.get(id))
    }

    #[tokio::test]
    async fn test_finished_agent_moves_from_needs_input_to_checks_pending() {
        let directory = Arc::new(FakeDirectory::new(vec![agent("a1", AgentStatus::Finished)]));
        let prs = Arc::new(FakePrSource::new());
        let poller = poller(directory.clone(), prs.clone());

        let first = poller.poll_once().await.unwrap();
        assert_eq!(column_of(&first, "a1"), ColumnKey::NeedsInput);

        directory.set_agents(vec![agent_with_pr("a1", AgentStatus::Finished, PR_URL)]);
        prs.insert(
            PR_URL,
            PrStatus {
                state: PrState::Open,
                checks_status: ChecksStatus::Pending,
                ..Default::default()
            },
        );
        let second = poller.poll_once().await.unwrap();
        assert_eq!(column_of(&second, "a1"), ColumnKey::ChecksPending);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_stale_agents_and_sets_error() {
        let directory = Arc::new(FakeDirectory::new(vec![agent("a1", AgentStatus::Running)]));
        let poller = poller(directory.clone(), Arc::new(FakePrSource::new()));
        poller.poll_once().await.unwrap();

        directory.fail_with(401);
        assert!(poller.poll_once().await.is_err());
        let snapshot = poller.snapshot();
        assert_eq!(snapshot.agents.len(), 1);
        assert!(snapshot.error.as_deref().unwrap().contains("401"));

        directory.clear_failure();
        let recovered = poller.poll_once().await.unwrap();
        assert!(recovered.error.is_none());
    }

    #[tokio::test]
    async fn test_poll_drops_pr_status_of_vanished_agents() {
        let directory = Arc::new(FakeDirectory::new(vec![
            agent_with_pr("a1", AgentStatus::Finished, PR_URL),
        ]));
        let prs = Arc::new(FakePrSource::new());
        prs.insert(PR_URL, PrStatus::default());
        let poller = poller(directory.clone(), prs);
        assert_eq!(poller.poll_once().await.unwrap().pr_statuses.len(), 1);

        directory.set_agents(vec![]);
        let snapshot = poller.poll_once().await.unwrap();
        assert!(snapshot.agents.is_empty());
        assert!(snapshot.pr_statuses.is_empty());
    }

    #[test]
    fn test_carried_statuses_drop_agents_whose_pr_changed() {
        let other_url = "https://github.com/acme/web/pull/99";
        let previous = BoardSnapshot {
            agents: vec![
                agent_with_pr("a1", AgentStatus::Finished, PR_URL),
                agent_with_pr("a2", AgentStatus::Finished, PR_URL),
                agent_with_pr("a3", AgentStatus::Finished, PR_URL),
            ],
            pr_statuses: ["a1", "a2", "a3"]
                .iter()
                .map(|id| (id.to_string(), PrStatus::default()))
                .collect(),
            ..Default::default()
        };
        let agents = vec![
            agent_with_pr("a1", AgentStatus::Finished, PR_URL),
            agent_with_pr("a2", AgentStatus::Finished, other_url),
            agent("a3", AgentStatus::Finished),
        ];

        let carried = carried_pr_statuses(&previous, &agents);
        assert_eq!(carried.len(), 1);
        assert!(carried.contains_key("a1"));
    }

    #[tokio::test]
    async fn test_subscribers_see_published_snapshot() {
        let directory = Arc::new(FakeDirectory::new(vec![agent("a1", AgentStatus::Creating)]));
        let poller = poller(directory, Arc::new(FakePrSource::new()));
        let mut rx = poller.subscribe();

        poller.poll_once().await.unwrap();
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.agents[0].id, "a1");
        assert!(snapshot.agents_fetched_at.is_some());
        assert!(snapshot.pr_statuses_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_run_skips_ticks_while_focused_and_stops_on_shutdown() {
        let directory = Arc::new(FakeDirectory::new(vec![agent("a1", AgentStatus::Running)]));
        let poller = Arc::new(poller(directory.clone(), Arc::new(FakePrSource::new())));
        poller.set_focus(Some("a1".to_string()));

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(poller.clone().run(async {
            let _ = stop_rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(directory.list_calls(), 0);

        poller.set_focus(None);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(directory.list_calls() > 0);

        stop_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
