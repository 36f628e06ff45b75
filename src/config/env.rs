use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub directory: DirectoryConfig,
    pub telegram: TelegramConfig,
    pub geo: GeoConfig,
    pub rules: RuleConfig,
    pub certs: CertConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub timezone: String,
}

/// Admin service endpoint and the mail host whose deferred queue is polled.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub mail_host: String,
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone)]
pub struct GeoConfig {
    pub token: String,
}

/// Knobs consumed by the classification rules.
#[derive(Debug, Clone)]
pub struct RuleConfig {
    pub spam_threshold: u64,
    pub known_services: Vec<String>,
    pub native_domain: String,
    pub ignored_addresses: Vec<String>,
    pub ip_threshold: usize,
    pub home_country: String,
}

#[derive(Debug, Clone)]
pub struct CertConfig {
    pub sites: Vec<CertSite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSite {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub queue_poll: Duration,
    pub cert_check: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub state_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
