use std::collections::HashMap;

use super::classifier::classify;
use super::models::{BoardCard, BoardView, ColumnDefinition, ColumnKey, ColumnView, Draft};
use super::poller::BoardSnapshot;

/// Lay out `snapshot` and the local drafts as columns in `order`.
///
/// Drafts always land in the backlog, ahead of any agent placed there.
/// Within a column, agents keep the order the directory returned them in.
/// A column missing from `order` is not rendered.
pub fn build_board(
    snapshot: &BoardSnapshot,
    drafts: &[Draft],
    order: &[ColumnKey],
    focused: bool,
) -> BoardView {
    let mut cards: HashMap<ColumnKey, Vec<BoardCard>> = HashMap::new();

    for draft in drafts {
        cards
            .entry(ColumnKey::Backlog)
            .or_default()
            .push(BoardCard::Draft {
                draft: draft.clone(),
            });
    }

    for agent in &snapshot.agents {
        let pr_status = snapshot.pr_statuses.get(&agent.id);
        let column = classify(&agent.status, agent.pr_url(), pr_status);
        cards.entry(column).or_default().push(BoardCard::Agent {
            agent: agent.clone(),
            pr_status: pr_status.cloned(),
        });
    }

    let columns = order
        .iter()
        .map(|key| ColumnView {
            column: ColumnDefinition::from(*key),
            cards: cards.remove(key).unwrap_or_default(),
        })
        .collect();

    BoardView {
        columns,
        error: snapshot.error.clone(),
        agents_fetched_at: snapshot.agents_fetched_at,
        pr_statuses_fetched_at: snapshot.pr_statuses_fetched_at,
        focused,
    }
}
