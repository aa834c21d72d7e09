//! Local draft commands (`agent-board drafts`).

use anyhow::{Context, Result, bail};
use console::style;

use agent_board::board::drafts::DraftStore;
use agent_board::board::models::Draft;
use agent_board::config::BoardConfig;

use super::super::DraftsCommands;
use super::open_store;

pub fn cmd_drafts(config: &BoardConfig, command: Option<DraftsCommands>) -> Result<()> {
    let drafts = DraftStore::new(open_store(config));

    match command {
        None | Some(DraftsCommands::List) => {
            let all = drafts.list();
            if all.is_empty() {
                println!("No drafts.");
                return Ok(());
            }
            for draft in all {
                println!(
                    "{}  {}@{}  {}",
                    style(&draft.id).cyan(),
                    draft.repository,
                    draft.git_ref,
                    draft.prompt
                );
            }
        }
        Some(DraftsCommands::Add {
            repository,
            git_ref,
            prompt,
            model,
        }) => {
            if prompt.trim().is_empty() {
                bail!("Draft prompt must not be empty");
            }
            let repository = match repository.or_else(|| drafts.last_repository()) {
                Some(repo) => repo,
                None => bail!("No repository given and none used before; pass --repository"),
            };
            let mut draft = Draft::new(&repository, &git_ref, &prompt);
            draft.model = model;
            let draft = drafts.save(draft).context("Failed to save draft")?;
            println!("{} Saved draft {}", style("✓").green(), style(&draft.id).cyan());
        }
        Some(DraftsCommands::Remove { id }) => {
            if drafts.delete(&id).context("Failed to delete draft")? {
                println!("{} Removed draft {}", style("✓").green(), id);
            } else {
                bail!("Draft not found: {}", id);
            }
        }
    }

    Ok(())
}
