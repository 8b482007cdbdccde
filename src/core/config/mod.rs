use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} is required")]
    Missing { key: &'static str },
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub ai: AiConfig,
    pub whatsapp: WhatsAppConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { url: String },
    Memory,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub required: bool,
    pub session_ttl_hours: i64,
    pub invitation_expiry_days: i64,
}

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl AiConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThrottleKind {
    #[default]
    Fixed,
    Quota,
}

impl FromStr for ThrottleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "quota" => Ok(Self::Quota),
            other => Err(format!("expected 'fixed' or 'quota', got '{other}'")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub access_token: Option<String>,
    pub phone_number_id: Option<String>,
    pub api_base: String,
    pub api_version: String,
    pub verify_token: Option<String>,
    pub country_code: String,
    pub business_name: String,
    pub broadcast_delay_ms: u64,
    pub throttle: ThrottleKind,
}

impl WhatsAppConfig {
    /// Both the token and the sending phone id are needed to reach the API.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_token, &self.phone_number_id) {
            (Some(token), Some(phone_id)) => Some((token.as_str(), phone_id.as_str())),
            _ => None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                max_connections: 10,
            },
            auth: AuthConfig {
                required: true,
                session_ttl_hours: 168,
                invitation_expiry_days: 7,
            },
            ai: AiConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
            },
            whatsapp: WhatsAppConfig {
                access_token: None,
                phone_number_id: None,
                api_base: "https://graph.facebook.com".to_string(),
                api_version: "v18.0".to_string(),
                verify_token: None,
                country_code: "62".to_string(),
                business_name: "Our Store".to_string(),
                broadcast_delay_ms: 1000,
                throttle: ThrottleKind::Fixed,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let defaults = Self::default();

        let backend = match vars.string("CRM_STORAGE").as_deref() {
            Some("memory") => StorageBackend::Memory,
            Some("postgres") | None => StorageBackend::Postgres {
                url: vars
                    .string("DATABASE_URL")
                    .ok_or(ConfigError::Missing { key: "DATABASE_URL" })?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "CRM_STORAGE",
                    value: other.to_string(),
                    reason: "expected 'postgres' or 'memory'".to_string(),
                })
            }
        };

        Ok(Self {
            server: ServerConfig {
                host: vars.string("SERVER_HOST").unwrap_or(defaults.server.host),
                port: vars.parsed("SERVER_PORT", defaults.server.port)?,
            },
            database: DatabaseConfig {
                backend,
                max_connections: vars
                    .parsed("DATABASE_MAX_CONNECTIONS", defaults.database.max_connections)?,
            },
            auth: AuthConfig {
                required: vars.flag("AUTH_REQUIRED", defaults.auth.required)?,
                session_ttl_hours: vars
                    .parsed("SESSION_TTL_HOURS", defaults.auth.session_ttl_hours)?,
                invitation_expiry_days: vars
                    .parsed("INVITATION_EXPIRY_DAYS", defaults.auth.invitation_expiry_days)?,
            },
            ai: AiConfig {
                api_key: vars.string("AI_API_KEY"),
                base_url: vars
                    .string("AI_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.ai.base_url),
                model: vars.string("AI_MODEL").unwrap_or(defaults.ai.model),
                timeout_secs: vars.parsed("AI_TIMEOUT_SECS", defaults.ai.timeout_secs)?,
            },
            whatsapp: WhatsAppConfig {
                access_token: vars.string("WHATSAPP_ACCESS_TOKEN"),
                phone_number_id: vars.string("WHATSAPP_PHONE_NUMBER_ID"),
                api_base: vars
                    .string("WHATSAPP_API_BASE")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.whatsapp.api_base),
                api_version: vars
                    .string("WHATSAPP_API_VERSION")
                    .unwrap_or(defaults.whatsapp.api_version),
                verify_token: vars.string("WHATSAPP_VERIFY_TOKEN"),
                country_code: vars
                    .string("WHATSAPP_COUNTRY_CODE")
                    .unwrap_or(defaults.whatsapp.country_code),
                business_name: vars
                    .string("WHATSAPP_BUSINESS_NAME")
                    .unwrap_or(defaults.whatsapp.business_name),
                broadcast_delay_ms: vars.parsed(
                    "WHATSAPP_BROADCAST_DELAY_MS",
                    defaults.whatsapp.broadcast_delay_ms,
                )?,
                throttle: vars.parsed("WHATSAPP_THROTTLE", defaults.whatsapp.throttle)?,
            },
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            None => Ok(default),
            Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.string(key).map(|v| v.to_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(value) => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected a boolean".to_string(),
            }),
        }
    }
}
