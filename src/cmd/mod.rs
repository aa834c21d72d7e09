//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `serve`   | `Serve`          |
//! | `board`   | `Board`          |
//! | `columns` | `Columns`        |
//! | `drafts`  | `Drafts`         |
//! | `config`  | `Config`         |

pub mod board;
pub mod columns;
pub mod config;
pub mod drafts;
pub mod serve;

pub use board::cmd_board;
pub use columns::cmd_columns;
pub use config::cmd_config;
pub use drafts::cmd_drafts;
pub use serve::cmd_serve;

use std::path::Path;
use std::sync::Arc;

use agent_board::board::storage::{FileStore, KvStore};
use agent_board::config::BoardConfig;
use anyhow::Result;

use super::Cli;

/// Effective configuration for commands that talk to the board.
pub fn load_config(cli: &Cli, project_dir: &Path) -> Result<BoardConfig> {
    let config = BoardConfig::load(project_dir, cli.config.as_deref())?;
    Ok(config.with_state_file(cli.state_file.clone()))
}

pub(crate) fn open_store(config: &BoardConfig) -> Arc<dyn KvStore> {
    tracing::debug!(path = %config.state_file.display(), "using state file");
    Arc::new(FileStore::new(&config.state_file))
}
