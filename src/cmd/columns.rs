//! Column order commands (`agent-board columns`).

use anyhow::{Result, anyhow};
use console::style;

use agent_board::board::column_order::ColumnOrderManager;
use agent_board::board::models::ColumnKey;
use agent_board::config::BoardConfig;

use super::super::ColumnsCommands;
use super::open_store;

fn print_order(order: &[ColumnKey]) {
    for (index, key) in order.iter().enumerate() {
        println!(
            "  {:>2}. {:<16} {}",
            index,
            key.as_str(),
            style(key.title()).dim()
        );
    }
}

pub fn cmd_columns(config: &BoardConfig, command: Option<ColumnsCommands>) -> Result<()> {
    let columns = ColumnOrderManager::new(open_store(config));

    match command {
        None | Some(ColumnsCommands::Show) => {
            println!("Column order:");
            print_order(&columns.current());
        }
        Some(ColumnsCommands::Move { column, index }) => {
            let key: ColumnKey = column.parse().map_err(|e: String| anyhow!(e))?;
            let order = columns.move_column(key, index);
            println!("{} Moved {}", style("✓").green(), style(key.as_str()).cyan());
            print_order(&order);
        }
        Some(ColumnsCommands::Reset) => {
            let order = columns.reset();
            println!("{} Column order reset", style("✓").green());
            print_order(&order);
        }
    }

    Ok(())
}
