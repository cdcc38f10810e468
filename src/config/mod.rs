use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public URL of the dashboard; used for deep links in emails and notifications.
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub server_key: String,
    pub api_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "billing@agency.local".to_string()
}

fn default_from_name() -> String {
    "Agency Billing".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
            from_name: default_from_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            batch_size: 25,
            max_attempts: 8,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix("AGENCY").separator("__"))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://agency.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("gateway.server_key", "")?
            .set_default("gateway.api_base_url", "https://api.sandbox.midtrans.com")?
            .set_default("gateway.timeout_secs", 10)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with AGENCY__ prefix, double underscore separates levels)
            .add_source(environment)

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://agency.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            gateway: GatewayConfig {
                server_key: String::new(),
                api_base_url: "https://api.sandbox.midtrans.com".to_string(),
                timeout_secs: 10,
            },
            email: EmailConfig::default(),
            workers: WorkerConfig::default(),
        }
    }
}
