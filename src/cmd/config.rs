//! Configuration view and validation commands (`agent-board config`).

use std::path::Path;

use anyhow::Result;

use agent_board::config::{BoardConfig, BoardToml, ENV_API_KEY, ENV_GITHUB_TOKEN};

use super::super::ConfigCommands;

fn mask(secret: Option<&str>) -> String {
    match secret {
        None => "(not set)".to_string(),
        Some(s) if s.chars().count() <= 4 => "****".to_string(),
        Some(s) => {
            let tail: String = s.chars().skip(s.chars().count() - 4).collect();
            format!("****{}", tail)
        }
    }
}

fn print_toml(toml: &BoardToml) {
    println!("[api]");
    println!("  base_url = \"{}\"", toml.api.base_url);
    println!("  auth_scheme = \"{}\"", toml.api.auth_scheme);
    println!("  request_timeout_secs = {}", toml.api.request_timeout_secs);
    println!();
    println!("[github]");
    println!("  api_base = \"{}\"", toml.github.api_base);
    println!();
    println!("[polling]");
    println!("  interval_secs = {}", toml.polling.interval_secs);
    println!("  page_size = {}", toml.polling.page_size);
    println!("  pr_batch_size = {}", toml.polling.pr_batch_size);
    println!("  pr_cache_ttl_secs = {}", toml.polling.pr_cache_ttl_secs);
    println!();
    println!("[server]");
    println!("  port = {}", toml.server.port);
    println!();
}

pub fn cmd_config(
    project_dir: &Path,
    config_path: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let config = BoardConfig::load(project_dir, config_path)?;

            println!();
            println!("Agent Board Configuration");
            println!("=========================");
            println!();
            match &config.config_file {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("No config.toml found; using defaults."),
            }
            println!();
            print_toml(&config.toml);

            println!("Effective values (with env overrides):");
            println!("  base_url = \"{}\"", config.base_url());
            println!("  port = {}", config.port());
            println!("  state_file = \"{}\"", config.state_file.display());
            println!("  {} = {}", ENV_API_KEY, mask(config.api_key.as_deref()));
            println!(
                "  {} = {}",
                ENV_GITHUB_TOKEN,
                mask(config.github_token.as_deref())
            );
            println!();
            if config.config_file.is_none() {
                println!("Run 'agent-board config init' to create a config.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = BoardConfig::load(project_dir, config_path)?;
            if config.config_file.is_none() {
                println!("No config.toml found. Using defaults (valid).");
            }

            let warnings = config.toml.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            if config.api_key.is_none() {
                println!("  - {} is not set; the board cannot list agents", ENV_API_KEY);
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            let path = match config_path {
                Some(path) => path.to_path_buf(),
                None => BoardConfig::default_config_path(project_dir),
            };
            if path.exists() {
                println!("config.toml already exists at {}", path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            BoardToml::default().save(&path)?;

            println!("Created config.toml at {}", path.display());
            println!();
            println!("You can now customize:");
            println!("  - [api] base_url, auth_scheme");
            println!("  - [polling] interval_secs, pr_batch_size");
            println!("  - [server] port");
            println!();
            println!("Secrets are read from {} and {}.", ENV_API_KEY, ENV_GITHUB_TOKEN);
            println!();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_hides_all_but_last_four() {
        assert_eq!(mask(Some("key_abcdef1234")), "****1234");
        assert_eq!(mask(Some("abc")), "****");
        assert_eq!(mask(None), "(not set)");
    }
}
