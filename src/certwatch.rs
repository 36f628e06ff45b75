use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::CryptoProvider,
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, SignatureScheme,
};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::parse_x509_certificate;

use crate::{config::CertSite, notify::Notify};

const EXPIRY_WARNING_DAYS: i64 = 7;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Scheduled sweep over the configured sites: handshake, read the peer leaf
/// certificate, and warn the operator when it expires within a week. Shares
/// nothing with the queue engine; the two tasks may overlap freely.
pub struct CertWatcher<N> {
    sites: Vec<CertSite>,
    notifier: Arc<N>,
    connector: TlsConnector,
}

impl<N: Notify> CertWatcher<N> {
    pub fn new(sites: Vec<CertSite>, notifier: Arc<N>) -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .context("TLS protocol configuration")?
            .dangerous()
            // expiry is checked by hand below; verification would reject the
            // very certificates this sweep exists to look at
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert { provider }))
            .with_no_client_auth();
        Ok(Self {
            sites,
            notifier,
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    pub async fn run(&self) {
        for site in &self.sites {
            match self.peer_expiry(site).await {
                Ok(expires_at) => {
                    if expires_within(expires_at, Utc::now(), EXPIRY_WARNING_DAYS) {
                        tracing::warn!(
                            target: "certwatch",
                            host = %site.host,
                            port = site.port,
                            %expires_at,
                            "certificate close to expiry"
                        );
                        self.notifier
                            .send(&format!(
                                "The certificate for {}:{} expires on {}",
                                site.host,
                                site.port,
                                expires_at.to_rfc2822()
                            ))
                            .await;
                    } else {
                        tracing::debug!(
                            target: "certwatch",
                            host = %site.host,
                            port = site.port,
                            %expires_at,
                            "certificate ok"
                        );
                    }
                }
                Err(err) => {
                    tracing::error!(
                        target: "certwatch",
                        host = %site.host,
                        port = site.port,
                        error = %err,
                        "certificate check failed"
                    );
                    self.notifier
                        .send(&format!(
                            "Failed to check certificate for {}:{}: {err}",
                            site.host, site.port
                        ))
                        .await;
                }
            }
        }
    }

    async fn peer_expiry(&self, site: &CertSite) -> Result<DateTime<Utc>> {
        let stream = tokio::time::timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((site.host.as_str(), site.port)),
        )
        .await
        .map_err(|_| anyhow!("connect timed out"))?
        .with_context(|| format!("TCP connect to {}:{}", site.host, site.port))?;

        let server_name = ServerName::try_from(site.host.clone())
            .with_context(|| format!("invalid server name {:?}", site.host))?;
        let tls = tokio::time::timeout(CONNECT_TIMEOUT, self.connector.connect(server_name, stream))
            .await
            .map_err(|_| anyhow!("TLS handshake timed out"))?
            .context("TLS handshake")?;

        let (_, session) = tls.get_ref();
        let leaf = session
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| anyhow!("peer presented no certificate"))?;
        let (_, parsed) =
            parse_x509_certificate(leaf.as_ref()).context("certificate parsing")?;
        let not_after = parsed.validity().not_after.timestamp();
        DateTime::from_timestamp(not_after, 0)
            .ok_or_else(|| anyhow!("certificate notAfter out of range"))
    }
}

fn expires_within(expires_at: DateTime<Utc>, now: DateTime<Utc>, days: i64) -> bool {
    expires_at - now <= chrono::Duration::days(days)
}

#[derive(Debug)]
struct AcceptAnyCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn expiry_inside_the_window_warns() {
        assert!(expires_within(at(8), at(1), EXPIRY_WARNING_DAYS));
        assert!(expires_within(at(2), at(1), EXPIRY_WARNING_DAYS));
    }

    #[test]
    fn already_expired_still_warns() {
        assert!(expires_within(at(1), at(10), EXPIRY_WARNING_DAYS));
    }

    #[test]
    fn distant_expiry_is_quiet() {
        assert!(!expires_within(at(20), at(1), EXPIRY_WARNING_DAYS));
    }
}
