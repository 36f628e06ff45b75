use async_trait::async_trait;
use rand::rngs::OsRng;
use reqwest::Client;

use crate::{
    config::env::DirectoryConfig,
    directory::{
        error::DirectoryError,
        password::generate_password,
        soap::{self, NO_SUCH_ACCOUNT},
        AccountId, AuthToken, DirectoryApi,
    },
    domain::QueueSnapshot,
};

/// SOAP implementation of the admin directory capability. One instance is
/// shared across runs; every call is stateless apart from the auth token the
/// engine threads through.
pub struct SoapDirectoryClient {
    http: Client,
    config: DirectoryConfig,
}

impl SoapDirectoryClient {
    pub fn new(config: DirectoryConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("mailq-warden/", env!("CARGO_PKG_VERSION")))
            // admin endpoints habitually run on self-signed certificates
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { http, config })
    }

    /// Posts one envelope and hands back the raw body. Faults arrive with a
    /// non-2xx status and a parseable body, so the status is only an error
    /// when the body carries no fault for the parser to surface.
    async fn post(&self, envelope: String) -> Result<(reqwest::StatusCode, String), DirectoryError> {
        let response = self
            .http
            .post(&self.config.url)
            .header("Content-Type", "application/xml")
            .header("SOAPAction", "\"#POST\"")
            .body(envelope)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn call<T>(
        &self,
        envelope: String,
        parse: impl FnOnce(&str) -> Result<T, DirectoryError>,
    ) -> Result<T, DirectoryError> {
        let (status, body) = self.post(envelope).await?;
        match parse(&body) {
            Ok(value) => Ok(value),
            Err(DirectoryError::Malformed { reason }) if !status.is_success() => {
                Err(DirectoryError::Malformed {
                    reason: format!("HTTP {status}: {reason}"),
                })
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl DirectoryApi for SoapDirectoryClient {
    async fn authenticate(&self) -> Result<AuthToken, DirectoryError> {
        let envelope = soap::auth_envelope(&self.config.user, &self.config.password);
        match self.call(envelope, soap::parse_auth).await {
            Ok(token) => {
                tracing::debug!(target: "directory", "admin authentication succeeded");
                Ok(AuthToken::new(token))
            }
            Err(DirectoryError::Fault { reason, .. }) => Err(DirectoryError::Auth { reason }),
            Err(err) => Err(err),
        }
    }

    async fn fetch_queue(
        &self,
        token: &AuthToken,
        host: &str,
    ) -> Result<QueueSnapshot, DirectoryError> {
        let envelope = soap::mail_queue_envelope(token.as_str(), host);
        let snapshot = self.call(envelope, soap::parse_queue).await?;
        tracing::info!(
            target: "directory",
            host,
            senders = snapshot.sender_volumes.len(),
            "fetched deferred queue snapshot"
        );
        Ok(snapshot)
    }

    async fn resolve_account(
        &self,
        token: &AuthToken,
        address: &str,
    ) -> Result<Option<AccountId>, DirectoryError> {
        let envelope = soap::account_info_envelope(token.as_str(), address);
        match self.call(envelope, soap::parse_account_id).await {
            Ok(id) => Ok(Some(AccountId::new(id))),
            Err(DirectoryError::Fault { code, .. }) if code == NO_SUCH_ACCOUNT => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn set_password(
        &self,
        token: &AuthToken,
        id: &AccountId,
    ) -> Result<String, DirectoryError> {
        let generated = generate_password(&mut OsRng);
        let envelope = soap::set_password_envelope(token.as_str(), id.as_str(), &generated);
        match self
            .call(envelope, |body| soap::parse_set_password(body, generated.clone()))
            .await
        {
            Ok(password) => Ok(password),
            Err(err) => Err(not_found_for(err, id)),
        }
    }

    async fn lock_account(&self, token: &AuthToken, id: &AccountId) -> Result<bool, DirectoryError> {
        let envelope = soap::lock_account_envelope(token.as_str(), id.as_str());
        match self.call(envelope, soap::parse_modify_ack).await {
            Ok(acked) => Ok(acked),
            Err(err) => Err(not_found_for(err, id)),
        }
    }

    async fn append_note(
        &self,
        token: &AuthToken,
        id: &AccountId,
        note: &str,
    ) -> Result<bool, DirectoryError> {
        let existing = match self
            .call(
                soap::get_account_envelope(token.as_str(), id.as_str()),
                soap::parse_notes,
            )
            .await
        {
            Ok(notes) => notes,
            Err(err) => return Err(not_found_for(err, id)),
        };

        let combined = if existing.is_empty() {
            note.to_string()
        } else {
            format!("{existing}\n{note}")
        };
        match self
            .call(
                soap::set_notes_envelope(token.as_str(), id.as_str(), combined.trim()),
                soap::parse_modify_ack,
            )
            .await
        {
            Ok(acked) => Ok(acked),
            Err(err) => Err(not_found_for(err, id)),
        }
    }
}

fn not_found_for(err: DirectoryError, id: &AccountId) -> DirectoryError {
    match err {
        DirectoryError::Fault { code, .. } if code == NO_SUCH_ACCOUNT => DirectoryError::NotFound {
            address: id.as_str().to_string(),
        },
        other => other,
    }
}
