use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

// ---------------------------------------------------------------------------
// Environment variable names
// ---------------------------------------------------------------------------

pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_GOOGLE_CLIENT_ID: &str = "SHEETCHAT_GOOGLE_CLIENT_ID";
pub const ENV_GOOGLE_API_KEY: &str = "SHEETCHAT_GOOGLE_API_KEY";
pub const ENV_GOOGLE_CLIENT_SECRET: &str = "SHEETCHAT_GOOGLE_CLIENT_SECRET";
pub const ENV_GOOGLE_ACCESS_TOKEN: &str = "SHEETCHAT_GOOGLE_ACCESS_TOKEN";

// ---------------------------------------------------------------------------
// SheetChatConfig
// ---------------------------------------------------------------------------

/// Application configuration stored at `~/.sheetchat/config.json`.
///
/// Credentials are **never** written to the JSON file. They are read from the
/// environment on every start via [`SheetChatConfig::apply_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetChatConfig {
    #[serde(skip)]
    pub anthropic_api_key: Option<String>,
    #[serde(skip)]
    pub google_client_id: Option<String>,
    #[serde(skip)]
    pub google_api_key: Option<String>,
    #[serde(skip)]
    pub google_client_secret: Option<String>,
    #[serde(skip)]
    pub google_access_token: Option<String>,

    // Model
    pub model: String,
    pub max_tokens: u32,
    pub anthropic_base_url: String,

    // Google
    pub sheets_base_url: String,
    pub oauth_redirect_port: u16,

    // General
    pub export_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for SheetChatConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            google_client_id: None,
            google_api_key: None,
            google_client_secret: None,
            google_access_token: None,
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 4096,
            anthropic_base_url: "https://api.anthropic.com/v1/messages".into(),
            sheets_base_url: "https://sheets.googleapis.com/v4/spreadsheets".into(),
            oauth_redirect_port: 8742,
            export_dir: None,
            log_level: "info".into(),
        }
    }
}

impl SheetChatConfig {
    /// Returns the base config directory: `~/.sheetchat/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".sheetchat"))
    }

    /// Returns the config file path: `~/.sheetchat/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.sheetchat/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Ensures all required directories exist.
    pub fn ensure_dirs() -> Result<()> {
        for dir in [Self::base_dir()?, Self::logs_dir()?] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Loads config from disk (creating a default file if missing) and
    /// overlays credentials from the process environment.
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        let mut config = Self::load_from_path(&path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load config from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Save config to a specific file path (credentials are excluded).
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Fill credential fields from `lookup`. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        self.anthropic_api_key = get(ENV_ANTHROPIC_API_KEY);
        self.google_client_id = get(ENV_GOOGLE_CLIENT_ID);
        self.google_api_key = get(ENV_GOOGLE_API_KEY);
        self.google_client_secret = get(ENV_GOOGLE_CLIENT_SECRET);
        self.google_access_token = get(ENV_GOOGLE_ACCESS_TOKEN);
    }

    /// Google sign-in needs at least an OAuth client id.
    pub fn google_configured(&self) -> bool {
        self.google_client_id.is_some()
    }

    /// Loopback redirect URI registered for the OAuth client.
    pub fn oauth_redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.oauth_redirect_port)
    }
}
