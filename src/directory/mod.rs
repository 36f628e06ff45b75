use async_trait::async_trait;

use crate::domain::QueueSnapshot;

mod client;
pub mod error;
pub mod password;
pub mod soap;

pub use client::SoapDirectoryClient;
pub use error::DirectoryError;

/// Opaque admin session handle, valid for one engine run.
#[derive(Debug, Clone)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: String) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Directory-internal account identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The account-management capability the engine remediates through. The
/// SOAP/XML wire format is an implementation detail of [`SoapDirectoryClient`];
/// tests substitute their own implementations.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn authenticate(&self) -> Result<AuthToken, DirectoryError>;

    /// Snapshot of the deferred queue on `host` (top page only).
    async fn fetch_queue(&self, token: &AuthToken, host: &str)
        -> Result<QueueSnapshot, DirectoryError>;

    /// `Ok(None)` when the directory has no account for the address.
    async fn resolve_account(
        &self,
        token: &AuthToken,
        address: &str,
    ) -> Result<Option<AccountId>, DirectoryError>;

    /// Resets the password to a random one and returns it. The returned
    /// value is what the server acknowledged, which may differ from the
    /// generated candidate.
    async fn set_password(&self, token: &AuthToken, id: &AccountId)
        -> Result<String, DirectoryError>;

    async fn lock_account(&self, token: &AuthToken, id: &AccountId)
        -> Result<bool, DirectoryError>;

    /// Appends `note` on a fresh line of the account's notes attribute.
    async fn append_note(
        &self,
        token: &AuthToken,
        id: &AccountId,
        note: &str,
    ) -> Result<bool, DirectoryError>;
}
