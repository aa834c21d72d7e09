//! Configuration for agent-board.
//!
//! Settings are read from `.agent-board/config.toml` in the project
//! directory (falling back to `<user config dir>/agent-board/config.toml`),
//! then overridden by environment variables, then by CLI flags.
//! Credentials never live in the file; they come from the environment
//! (a `.env` file is honoured).
//!
//! ```toml
//! [api]
//! base_url = "https://api.cursor.com"
//! auth_scheme = "basic"
//! request_timeout_secs = 30
//!
//! [github]
//! api_base = "https://api.github.com"
//!
//! [polling]
//! interval_secs = 30
//! page_size = 100
//! pr_batch_size = 5
//! pr_cache_ttl_secs = 60
//!
//! [server]
//! port = 3141
//!
//! [storage]
//! state_file = ".agent-board/state.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const BOARD_DIR: &str = ".agent-board";
pub const CONFIG_FILE: &str = "config.toml";

pub const ENV_API_KEY: &str = "AGENT_BOARD_API_KEY";
pub const ENV_BASE_URL: &str = "AGENT_BOARD_BASE_URL";
pub const ENV_PORT: &str = "AGENT_BOARD_PORT";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";

/// How the API key is attached to directory requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// HTTP basic auth with the key as user name and an empty password.
    #[default]
    Basic,
    Bearer,
}

impl std::fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthScheme::Basic => write!(f, "basic"),
            AuthScheme::Bearer => write!(f, "bearer"),
        }
    }
}

impl std::str::FromStr for AuthScheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(AuthScheme::Basic),
            "bearer" => Ok(AuthScheme::Bearer),
            _ => anyhow::bail!("Invalid auth scheme '{}'. Valid values: basic, bearer", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub auth_scheme: AuthScheme,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.cursor.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_scheme: AuthScheme::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubSection {
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

impl Default for GithubSection {
    fn default() -> Self {
        Self {
            api_base: default_github_api_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Agents requested per page while listing.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Concurrent PR lookups per batch.
    #[serde(default = "default_pr_batch_size")]
    pub pr_batch_size: usize,
    #[serde(default = "default_pr_cache_ttl_secs")]
    pub pr_cache_ttl_secs: u64,
}

fn default_interval_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

fn default_pr_batch_size() -> usize {
    5
}

fn default_pr_cache_ttl_secs() -> u64 {
    60
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            page_size: default_page_size(),
            pr_batch_size: default_pr_batch_size(),
            pr_cache_ttl_secs: default_pr_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3141
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Relative paths resolve against the project directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardToml {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub github: GithubSection,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
}

impl BoardToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config.toml")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Human-readable warnings for settings that will misbehave.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !is_http_url(&self.api.base_url) {
            warnings.push(format!(
                "api.base_url '{}' is not an http(s) URL",
                self.api.base_url
            ));
        }
        if !is_http_url(&self.github.api_base) {
            warnings.push(format!(
                "github.api_base '{}' is not an http(s) URL",
                self.github.api_base
            ));
        }
        if self.polling.interval_secs == 0 {
            warnings.push("polling.interval_secs is 0; the default of 30 will be used".to_string());
        }
        if self.polling.pr_batch_size == 0 {
            warnings.push("polling.pr_batch_size is 0; the default of 5 will be used".to_string());
        }
        if self.polling.page_size == 0 {
            warnings.push("polling.page_size is 0; the default of 100 will be used".to_string());
        }
        warnings
    }
}

/// Effective runtime configuration.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub project_dir: PathBuf,
    /// The file the settings came from, if one existed.
    pub config_file: Option<PathBuf>,
    pub toml: BoardToml,
    pub api_key: Option<String>,
    pub github_token: Option<String>,
    pub state_file: PathBuf,
}

impl BoardConfig {
    /// Load from disk and the process environment.
    pub fn load(project_dir: &Path, config_path: Option<&Path>) -> Result<Self> {
        // A missing .env is the common case.
        let _ = dotenvy::from_path(project_dir.join(".env"));
        Self::load_with_env(project_dir, config_path, |key| std::env::var(key).ok())
    }

    /// Load using `env` for variable lookup.
    pub fn load_with_env(
        project_dir: &Path,
        config_path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(project_dir),
        };
        let toml = match &config_file {
            Some(path) => BoardToml::load(path)?,
            None => BoardToml::default(),
        };

        let mut config = Self {
            project_dir: project_dir.to_path_buf(),
            config_file,
            state_file: PathBuf::new(),
            toml,
            api_key: None,
            github_token: None,
        };
        config.apply_env(env)?;
        config.state_file = config.resolve_state_file();
        Ok(config)
    }

    fn discover(project_dir: &Path) -> Option<PathBuf> {
        let local = project_dir.join(BOARD_DIR).join(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        let user = dirs::config_dir()?.join("agent-board").join(CONFIG_FILE);
        user.exists().then_some(user)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        self.api_key = env(ENV_API_KEY).filter(|v| !v.trim().is_empty());
        self.github_token = env(ENV_GITHUB_TOKEN).filter(|v| !v.trim().is_empty());
        if let Some(base_url) = env(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.toml.api.base_url = base_url;
        }
        if let Some(port) = env(ENV_PORT) {
            self.toml.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} must be a port number, got '{}'", ENV_PORT, port))?;
        }
        Ok(())
    }

    fn resolve_state_file(&self) -> PathBuf {
        match &self.toml.storage.state_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.project_dir.join(path),
            None => self.project_dir.join(BOARD_DIR).join("state.json"),
        }
    }

    /// Override the state file (CLI flag).
    pub fn with_state_file(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.state_file = if path.is_absolute() {
                path
            } else {
                self.project_dir.join(path)
            };
        }
        self
    }

    /// Override the server port (CLI flag).
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.toml.server.port = port;
        }
        self
    }

    pub fn base_url(&self) -> &str {
        self.toml.api.base_url.trim_end_matches('/')
    }

    pub fn github_api_base(&self) -> &str {
        self.toml.github.api_base.trim_end_matches('/')
    }

    pub fn port(&self) -> u16 {
        self.toml.server.port
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.api.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        let secs = match self.toml.polling.interval_secs {
            0 => default_interval_secs(),
            n => n,
        };
        Duration::from_secs(secs)
    }

    pub fn page_size(&self) -> u32 {
        match self.toml.polling.page_size {
            0 => default_page_size(),
            n => n,
        }
    }

    pub fn pr_batch_size(&self) -> usize {
        match self.toml.polling.pr_batch_size {
            0 => default_pr_batch_size(),
            n => n,
        }
    }

    pub fn pr_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.toml.polling.pr_cache_ttl_secs)
    }

    pub fn default_config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(BOARD_DIR).join(CONFIG_FILE)
    }
}
