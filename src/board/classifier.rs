//! Column placement for agents.
//!
//! [`classify`] maps an agent's lifecycle status, the presence of a pull
//! request URL, and the (possibly not yet fetched) pull request status to
//! exactly one board column. It is pure and total: unknown statuses and
//! contradictory PR data still resolve deterministically.
//!
//! Finished agents with a PR are placed by [`PR_RULES`], evaluated top to
//! bottom. Terminal PR states come first, then blockers (draft, conflict),
//! then CI, then review.

use super::models::{AgentStatus, ChecksStatus, ColumnKey, PrState, PrStatus};

/// One entry of the pull-request placement table.
pub struct PrRule {
    pub name: &'static str,
    pub matches: fn(&PrStatus) -> bool,
    pub column: ColumnKey,
}

/// Placement of finished agents whose PR status is known. First match wins.
pub const PR_RULES: &[PrRule] = &[
    PrRule {
        name: "merged",
        matches: |pr| pr.state == PrState::Merged,
        column: ColumnKey::Merged,
    },
    // Closed without merge shares the terminal bucket.
    PrRule {
        name: "closed",
        matches: |pr| pr.state == PrState::Closed,
        column: ColumnKey::Merged,
    },
    PrRule {
        name: "draft",
        matches: |pr| pr.is_draft,
        column: ColumnKey::DraftPr,
    },
    PrRule {
        name: "conflict",
        matches: |pr| pr.mergeable == Some(false) || pr.mergeable_state == "dirty",
        column: ColumnKey::HasConflict,
    },
    PrRule {
        name: "checks_failing",
        matches: |pr| pr.checks_status == ChecksStatus::Failure,
        column: ColumnKey::ChecksFailing,
    },
    PrRule {
        name: "checks_pending",
        matches: |pr| pr.checks_status == ChecksStatus::Pending,
        column: ColumnKey::ChecksPending,
    },
    PrRule {
        name: "approved",
        matches: |pr| pr.has_approval || pr.review_decision.as_deref() == Some("APPROVED"),
        column: ColumnKey::Approved,
    },
];

/// Column for a finished agent whose open PR matched no rule.
pub const PR_FALLBACK: ColumnKey = ColumnKey::AwaitingReview;

/// Place an agent on the board.
pub fn classify(
    status: &AgentStatus,
    pr_url: Option<&str>,
    pr_status: Option<&PrStatus>,
) -> ColumnKey {
    match status {
        AgentStatus::Draft => ColumnKey::Backlog,
        AgentStatus::Creating => ColumnKey::Creating,
        AgentStatus::Running => ColumnKey::Running,
        AgentStatus::Error | AgentStatus::Expired => ColumnKey::Failed,
        AgentStatus::Finished => classify_finished(pr_url, pr_status),
        AgentStatus::Unknown(_) => ColumnKey::NeedsInput,
    }
}

fn classify_finished(pr_url: Option<&str>, pr_status: Option<&PrStatus>) -> ColumnKey {
    if pr_url.is_none_or(|url| url.trim().is_empty()) {
        return ColumnKey::NeedsInput;
    }
    // Not fetched yet: optimistic placement, never wait on freshness.
    let Some(pr) = pr_status else {
        return PR_FALLBACK;
    };
    matching_rule(pr).map_or(PR_FALLBACK, |rule| rule.column)
}

/// The first rule in [`PR_RULES`] that matches, if any.
pub fn matching_rule(pr: &PrStatus) -> Option<&'static PrRule> {
    PR_RULES.iter().find(|rule| (rule.matches)(pr))
}
