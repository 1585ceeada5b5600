use chrono::{DateTime, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use shared_types::{DateWindow, WindowError};
use std::path::{Path, PathBuf};

/// Environment variable names understood in addition to the `DEALSYNC__` prefix
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("HUBSPOT_API_KEY", "hubspot.access_token"),
    ("ADMIN_EMAIL", "email.admin_email"),
    ("EMAIL_USER", "email.username"),
    ("EMAIL_PASSWORD", "email.password"),
    ("HUBSPOT_CLIENT_ID", "oauth.client_id"),
    ("HUBSPOT_CLIENT_SECRET", "oauth.client_secret"),
    ("HUBSPOT_REDIRECT_URI", "oauth.redirect_uri"),
];

const DEFAULT_CONFIG: &str = r#"
[hubspot]
# Private app access token or OAuth access token
# access_token = "pat-na1-..."
api_base = "https://api.hubapi.com"
timeout_secs = 30
max_attempts = 3
requests_per_second = 9

[email]
# admin_email = "admin@example.com"
# username = "automation@example.com"
# password = "app-password"
smtp_host = "smtp.gmail.com"

[automation]
created_after = "2025-01-01T00:00:00Z"
created_before = "2025-01-31T23:59:59Z"
page_size = 100
max_pages = 100
max_concurrency = 1

[server]
host = "127.0.0.1"
port = 8080

[oauth]
# client_id = "YOUR_CLIENT_ID"
# client_secret = "YOUR_CLIENT_SECRET"
redirect_uri = "http://localhost:8080/oauth/callback"
"#;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AutomationConfig {
    pub hubspot: HubSpotConfig,
    pub email: EmailConfig,
    pub automation: RunConfig,
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HubSpotConfig {
    pub access_token: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
    /// Total attempts per request, including the first one
    pub max_attempts: u32,
    pub requests_per_second: u32,
}

impl Default for HubSpotConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base: "https://api.hubapi.com".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            requests_per_second: 9,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmailConfig {
    pub admin_email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub smtp_host: String,
    pub smtp_port: Option<u16>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            admin_email: None,
            username: None,
            password: None,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RunConfig {
    pub created_after: DateTime<Utc>,
    pub created_before: DateTime<Utc>,
    pub page_size: u32,
    pub max_pages: u32,
    pub max_concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        let window = DateWindow::january_2025();
        Self {
            created_after: window.start,
            created_before: window.end,
            page_size: 100,
            max_pages: 100,
            max_concurrency: 1,
        }
    }
}

impl RunConfig {
    pub fn date_window(&self) -> Result<DateWindow, WindowError> {
        DateWindow::new(self.created_after, self.created_before)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: "".to_string(),
            client_secret: None,
            redirect_uri: "http://localhost:8080/oauth/callback".to_string(),
            scopes: vec![
                "crm.objects.contacts.read".to_string(),
                "crm.objects.deals.read".to_string(),
                "crm.objects.deals.write".to_string(),
            ],
        }
    }
}

impl AutomationConfig {
    /// Loads the config file (creating a commented default if missing), then
    /// layers `DEALSYNC__*` and the legacy environment variables on top.
    pub fn load(path: Option<PathBuf>) -> Result<(Self, PathBuf), ConfigError> {
        let config_path = path.unwrap_or_else(get_config_path);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        if !config_path.exists() {
            std::fs::write(&config_path, DEFAULT_CONFIG).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        let legacy = LEGACY_ENV_KEYS
            .iter()
            .map(|(var, key)| (*key, std::env::var(var).ok()));

        let config = Self::from_sources(&config_path, legacy)?;
        Ok((config, config_path))
    }

    pub fn from_sources<'a>(
        config_path: &Path,
        overrides: impl IntoIterator<Item = (&'a str, Option<String>)>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::from(config_path.to_path_buf()))
            .add_source(
                Environment::with_prefix("DEALSYNC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        for (key, value) in overrides {
            builder = builder.set_override_option(key, value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Checks the settings a run cannot start without
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = |name: &str| ConfigError::Message(format!("Missing required setting: {name}"));

        if is_blank(&self.hubspot.access_token) {
            return Err(missing("hubspot.access_token (or HUBSPOT_API_KEY)"));
        }
        if is_blank(&self.email.admin_email) {
            return Err(missing("email.admin_email (or ADMIN_EMAIL)"));
        }
        if is_blank(&self.email.username) || is_blank(&self.email.password) {
            return Err(missing(
                "email.username and email.password (or EMAIL_USER / EMAIL_PASSWORD)",
            ));
        }
        if self.automation.page_size == 0 {
            return Err(ConfigError::Message(
                "automation.page_size must be greater than zero".to_string(),
            ));
        }
        if self.automation.max_concurrency == 0 {
            return Err(ConfigError::Message(
                "automation.max_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.hubspot.max_attempts == 0 {
            return Err(ConfigError::Message(
                "hubspot.max_attempts must be greater than zero".to_string(),
            ));
        }
        self.automation
            .date_window()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("dealsync").join("config.toml")
    } else {
        PathBuf::from("config.toml")
    }
}
