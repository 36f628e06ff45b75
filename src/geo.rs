use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::{config::env::GeoConfig, domain::GeoInfo};

const LOOKUP_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geolocation lookup for {ip} failed after {attempts} attempts")]
    Exhausted {
        ip: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

/// IP-to-location capability with bounded retry. Implementations return the
/// country and reverse hostname when the provider knows them.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn resolve(&self, ip: &str) -> Result<GeoInfo, GeoError>;
}

pub struct IpinfoClient {
    http: Client,
    config: GeoConfig,
}

impl IpinfoClient {
    pub fn new(http: Client, config: GeoConfig) -> Self {
        Self { http, config }
    }

    async fn fetch(&self, ip: &str) -> Result<GeoInfo, reqwest::Error> {
        self.http
            .get(format!("https://ipinfo.io/{ip}"))
            .query(&[("token", self.config.token.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<GeoInfo>()
            .await
    }
}

#[async_trait]
impl GeoLookup for IpinfoClient {
    async fn resolve(&self, ip: &str) -> Result<GeoInfo, GeoError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch(ip).await {
                Ok(info) => return Ok(info),
                Err(err) => {
                    tracing::warn!(
                        target: "geo",
                        ip,
                        attempt,
                        attempts = LOOKUP_ATTEMPTS,
                        error = %err,
                        "geolocation lookup failed"
                    );
                    if attempt >= LOOKUP_ATTEMPTS {
                        return Err(GeoError::Exhausted {
                            ip: ip.to_string(),
                            attempts: attempt,
                            source: err,
                        });
                    }
                }
            }
        }
    }
}
