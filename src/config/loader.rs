use std::{env, time::Duration};

use url::Url;

use super::env::{
    AppConfig, CertConfig, CertSite, ConfigError, DirectoryConfig, GeoConfig, LoggingConfig,
    RuleConfig, ScheduleConfig, StorageConfig, TelegramConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let directory_url = require("DIRECTORY_URL")?;
        Url::parse(&directory_url).map_err(|_| ConfigError::Invalid {
            name: "DIRECTORY_URL",
            value: directory_url.clone(),
        })?;

        let directory = DirectoryConfig {
            url: directory_url,
            user: require("DIRECTORY_USER")?,
            password: require("DIRECTORY_PASSWORD")?,
            mail_host: require("MAIL_HOST")?,
            accept_invalid_certs: parse_bool("DIRECTORY_ACCEPT_INVALID_CERTS"),
        };

        let telegram = TelegramConfig {
            bot_token: require("TELEGRAM_BOT_TOKEN")?,
            chat_id: require("TELEGRAM_CHAT_ID")?
                .parse::<i64>()
                .map_err(|_| ConfigError::Invalid {
                    name: "TELEGRAM_CHAT_ID",
                    value: env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
                })?,
        };

        let geo = GeoConfig {
            token: env::var("IPINFO_TOKEN").unwrap_or_default(),
        };

        let rules = RuleConfig {
            spam_threshold: parse_num("SPAM_THRESHOLD").unwrap_or(10),
            known_services: parse_list("KNOWN_EMAIL_SERVICES"),
            native_domain: require("NATIVE_DOMAIN")?,
            ignored_addresses: parse_list("IGNORED_EMAILS"),
            ip_threshold: parse_num::<usize>("IP_THRESHOLD").unwrap_or(1),
            home_country: env::var("HOME_COUNTRY").unwrap_or_else(|_| "BR".to_string()),
        };

        let certs = CertConfig {
            sites: parse_list("CERT_SITES")
                .iter()
                .map(|site| parse_cert_site(site))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let schedule = ScheduleConfig {
            queue_poll: Duration::from_secs(60 * parse_num("QUEUE_POLL_MINUTES").unwrap_or(10)),
            cert_check: Duration::from_secs(3600 * parse_num("CERT_CHECK_HOURS").unwrap_or(8)),
        };

        let storage = StorageConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            state_filename: env::var("STATE_FILENAME")
                .unwrap_or_else(|_| "address_ip_data.json".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let timezone =
            env::var("TIMEZONE").unwrap_or_else(|_| "America/Sao_Paulo".to_string());

        Ok(Self {
            directory,
            telegram,
            geo,
            rules,
            certs,
            schedule,
            storage,
            logging,
            timezone,
        })
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parse_bool(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn parse_num<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|value| {
            value
                .split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_cert_site(raw: &str) -> Result<CertSite, ConfigError> {
    let mut parts = raw.splitn(2, ':');
    let host = parts.next().unwrap_or_default().trim().to_string();
    if host.is_empty() {
        return Err(ConfigError::Invalid {
            name: "CERT_SITES",
            value: raw.to_string(),
        });
    }
    let port = match parts.next() {
        Some(port) => port.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
            name: "CERT_SITES",
            value: raw.to_string(),
        })?,
        None => 443,
    };
    Ok(CertSite { host, port })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cert_site_defaults_to_https_port() {
        let site = parse_cert_site("mail.example.com").unwrap();
        assert_eq!(site.host, "mail.example.com");
        assert_eq!(site.port, 443);
    }

    #[test]
    fn cert_site_honors_explicit_port() {
        let site = parse_cert_site("mail.example.com:8443").unwrap();
        assert_eq!(site.port, 8443);
    }

    #[test]
    fn cert_site_rejects_garbage_port() {
        assert!(parse_cert_site("mail.example.com:abc").is_err());
    }
}
