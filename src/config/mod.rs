pub mod env;
mod loader;

pub use env::{AppConfig, CertSite, ConfigError, RuleConfig, StorageConfig};
pub use loader::load_config;
