use marginalia_core::query::{DEFAULT_PER_PAGE, MAX_PER_PAGE};

/// Annotation client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API, without the `/pdf-annotations` suffix.
    pub base_url: String,
    /// Bearer token, if one was configured.
    pub token: Option<String>,
    /// Per-request timeout in seconds (default: `30`).
    pub timeout_secs: u64,
    /// Page size used when fetching a whole document (default: `50`).
    pub per_page: u32,
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ClientConfig {
    /// Configuration with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout_secs: 30,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                   | Default  |
    /// |---------------------------|----------|
    /// | `MARGINALIA_API_URL`      | required |
    /// | `MARGINALIA_API_TOKEN`    | none     |
    /// | `MARGINALIA_TIMEOUT_SECS` | `30`     |
    /// | `MARGINALIA_PER_PAGE`     | `50`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("MARGINALIA_API_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("MARGINALIA_API_URL"))?;

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                var: "MARGINALIA_API_URL",
                value: base_url,
                reason: "must start with http:// or https://".to_string(),
            });
        }

        let token = lookup("MARGINALIA_API_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let timeout_secs = match lookup("MARGINALIA_TIMEOUT_SECS") {
            Some(raw) => parse_var("MARGINALIA_TIMEOUT_SECS", &raw)?,
            None => 30,
        };

        let per_page: u32 = match lookup("MARGINALIA_PER_PAGE") {
            Some(raw) => parse_var("MARGINALIA_PER_PAGE", &raw)?,
            None => DEFAULT_PER_PAGE,
        };
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(ConfigError::Invalid {
                var: "MARGINALIA_PER_PAGE",
                value: per_page.to_string(),
                reason: format!("must be between 1 and {MAX_PER_PAGE}"),
            });
        }

        Ok(Self {
            base_url,
            token,
            timeout_secs,
            per_page,
        })
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
