use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration at ~/.config/termsync/config.toml, loaded once at startup
/// and passed down by value.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub google: GoogleConfig,
    pub portal: PortalConfig,
}

/// Google Calendar OAuth credentials and the sync target.
#[derive(Debug, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,

    /// Calendar to sync into ("primary" or a shared calendar id)
    pub calendar_id: String,

    /// How many whole calendar months to replace on each run
    #[serde(default = "default_sync_months")]
    pub sync_months: u32,
}

/// Credentials for the staff portal serving the ICS export.
#[derive(Debug, Deserialize)]
pub struct PortalConfig {
    pub base_url: String,
    pub user_id: String,
    pub user_name: String,
    pub password: String,
}

fn default_sync_months() -> u32 {
    3
}

/// Tokens for the authenticated Google account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Config {
    /// Parse and validate config file contents.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config file")?;

        if config.google.sync_months == 0 {
            anyhow::bail!("sync_months must be at least 1");
        }

        Ok(config)
    }
}

/// Get the config directory path (~/.config/termsync)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("termsync");
    Ok(config_dir)
}

/// Get the config file path (~/.config/termsync/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the tokens file path (~/.config/termsync/tokens.json)
pub fn tokens_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("tokens.json"))
}

/// Load config from ~/.config/termsync/config.toml
pub fn load_config() -> Result<Config> {
    let path = config_path()?;

    if !path.exists() {
        anyhow::bail!(
            "Config file not found at {}\n\n\
            Create it with your Google OAuth credentials and portal login:\n\n\
            [google]\n\
            client_id = \"your-client-id.apps.googleusercontent.com\"\n\
            client_secret = \"your-client-secret\"\n\
            calendar_id = \"primary\"\n\
            sync_months = 3\n\n\
            [portal]\n\
            base_url = \"https://portal.example.com/aqua\"\n\
            user_id = \"jdoe\"\n\
            user_name = \"jdoe\"\n\
            password = \"...\"",
            path.display()
        );
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;

    Config::from_toml(&contents)
        .with_context(|| format!("Invalid config file at {}", path.display()))
}

/// Load tokens from ~/.config/termsync/tokens.json, if present
pub fn load_tokens() -> Result<Option<AccountTokens>> {
    let path = tokens_path()?;

    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read tokens file at {}", path.display()))?;

    let tokens: AccountTokens = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse tokens file at {}", path.display()))?;

    Ok(Some(tokens))
}

/// Save tokens to ~/.config/termsync/tokens.json
pub fn save_tokens(tokens: &AccountTokens) -> Result<()> {
    let path = tokens_path()?;

    // Ensure config directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory at {}", parent.display()))?;
    }

    let contents = serde_json::to_string_pretty(tokens).context("Failed to serialize tokens")?;

    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write tokens file at {}", path.display()))?;

    Ok(())
}
