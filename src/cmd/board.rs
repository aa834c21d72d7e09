//! One-shot board rendering (`agent-board board`).

use anyhow::Result;
use console::style;

use agent_board::board::models::{BoardCard, BoardView, ColumnView};
use agent_board::board::server::build_state;
use agent_board::config::BoardConfig;

pub async fn cmd_board(config: &BoardConfig) -> Result<()> {
    let state = build_state(config)?;
    if let Err(e) = state.poller.poll_once().await {
        tracing::debug!(error = %e, "poll failed");
    }
    print!("{}", render_board(&state.board_view()));
    Ok(())
}

fn card_line(card: &BoardCard) -> String {
    match card {
        BoardCard::Agent { agent, pr_status } => {
            let name = agent.name.as_deref().unwrap_or(&agent.id);
            let mut line = format!("{} {} [{}]", style("●").cyan(), name, agent.status);
            if let Some(url) = agent.pr_url() {
                line.push_str(&format!("  {}", style(url).dim()));
            }
            if let Some(pr) = pr_status {
                line.push_str(&format!(
                    "  {}",
                    style(format!("{:?}/{:?}", pr.state, pr.checks_status).to_lowercase()).dim()
                ));
            }
            line
        }
        BoardCard::Draft { draft } => {
            let prompt: String = draft.prompt.chars().take(60).collect();
            format!(
                "{} {} ({}@{})",
                style("○").yellow(),
                prompt,
                draft.repository,
                draft.git_ref
            )
        }
    }
}

fn column_block(column: &ColumnView) -> String {
    let mut out = format!(
        "{} {}\n",
        style(&column.column.title).bold(),
        style(format!("({})", column.cards.len())).dim()
    );
    for card in &column.cards {
        out.push_str(&format!("  {}\n", card_line(card)));
    }
    out
}

/// Text rendering of the board. Empty columns are listed with a zero count.
pub fn render_board(board: &BoardView) -> String {
    let mut out = String::new();
    if let Some(error) = &board.error {
        out.push_str(&format!("{} {}\n\n", style("Error:").red().bold(), error));
    }
    for column in &board.columns {
        out.push_str(&column_block(column));
    }
    if let Some(at) = board.agents_fetched_at {
        out.push_str(&format!(
            "\n{}\n",
            style(format!("Agents fetched at {}", at.format("%Y-%m-%d %H:%M:%S UTC"))).dim()
        ));
    }
    out
}
