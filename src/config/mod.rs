use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pocketbase: PocketBaseConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Record service connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PocketBaseConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Administrative principal used by provisioning commands
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_email")]
    pub email: String,

    /// Never stored in config files; comes from the environment.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

/// Watchlist store behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Switch to the bundled sample data when the service fails.
    #[serde(default = "default_true")]
    pub mock_fallback: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_url() -> String {
    "http://127.0.0.1:8090".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("tickersage/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_admin_email() -> String {
    "admin@tickersage.com".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for PocketBaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: default_admin_email(),
            password: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mock_fallback: true,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    ///
    /// Precedence, lowest first: `config/default.toml`, `config/local.toml`,
    /// `TICKERSAGE__SECTION__KEY`, then `PB_URL` / `PB_ADMIN_EMAIL` /
    /// `PB_ADMIN_PASSWORD`.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("TICKERSAGE").separator("__"))
            .set_override_option("pocketbase.url", std::env::var("PB_URL").ok())?
            .set_override_option("admin.email", std::env::var("PB_ADMIN_EMAIL").ok())?
            .set_override_option("admin.password", std::env::var("PB_ADMIN_PASSWORD").ok())?
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!("Invalid configuration ({}), using defaults", e);
            AppConfig::default().with_legacy_env(|key| std::env::var(key).ok())
        });
        Ok(app_cfg)
    }

    /// Apply `PB_URL`, `PB_ADMIN_EMAIL` and `PB_ADMIN_PASSWORD` from `lookup`.
    fn with_legacy_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("PB_URL") {
            self.pocketbase.url = url;
        }
        if let Some(email) = lookup("PB_ADMIN_EMAIL") {
            self.admin.email = email;
        }
        if let Some(password) = lookup("PB_ADMIN_PASSWORD") {
            self.admin.password = Some(password);
        }
        self
    }
}

impl AdminConfig {
    /// The admin password, or an error telling the operator how to provide it.
    pub fn require_password(&self) -> Result<&str> {
        match self.password.as_deref() {
            Some(p) if !p.is_empty() => Ok(p),
            _ => bail!(
                "PB_ADMIN_PASSWORD environment variable is required. \
                 Set it before running this command: export PB_ADMIN_PASSWORD=your_password"
            ),
        }
    }
}
