use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write history file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("history file {path} is not valid JSON")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-sender log of every distinct source IP ever observed, in discovery
/// order. This is an observation log, not a blocklist: entries accumulate
/// even for senders that were never flagged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct IpHistory {
    entries: HashMap<String, Vec<String>>,
}

impl IpHistory {
    pub fn distinct_ips(&self, address: &str) -> usize {
        self.entries.get(address).map_or(0, Vec::len)
    }

    pub fn last_ip(&self, address: &str) -> Option<&str> {
        self.entries
            .get(address)
            .and_then(|ips| ips.last())
            .map(String::as_str)
    }

    pub fn contains(&self, address: &str, ip: &str) -> bool {
        self.entries
            .get(address)
            .is_some_and(|ips| ips.iter().any(|known| known == ip))
    }

    /// Appends `ip` for `address` unless already recorded. Entries only ever
    /// grow and never duplicate.
    pub fn record(&mut self, address: &str, ip: &str) {
        let ips = self.entries.entry(address.to_string()).or_default();
        if !ips.iter().any(|known| known == ip) {
            ips.push(ip.to_string());
        }
    }
}

/// File persistence for [`IpHistory`]: loaded fresh at the start of every
/// engine run, saved once at the end. The save goes through a temp file and
/// an atomic rename, so a crash leaves either the previous or the new state,
/// never a torn file.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates an empty history file if none exists yet.
    pub async fn ensure(&self) -> Result<(), HistoryError> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }
        self.save(&IpHistory::default()).await
    }

    pub async fn load(&self) -> Result<IpHistory, HistoryError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IpHistory::default());
            }
            Err(err) => {
                return Err(HistoryError::Read {
                    path: self.path.clone(),
                    source: err,
                });
            }
        };
        serde_json::from_slice(&raw).map_err(|err| HistoryError::Decode {
            path: self.path.clone(),
            source: err,
        })
    }

    pub async fn save(&self, history: &IpHistory) -> Result<(), HistoryError> {
        let path = self.path.clone();
        let payload = serde_json::to_vec_pretty(history).map_err(|err| HistoryError::Decode {
            path: path.clone(),
            source: err,
        })?;

        let result = tokio::task::spawn_blocking(move || write_atomic(&path, &payload)).await;
        match result {
            Ok(inner) => inner,
            Err(join_err) => Err(HistoryError::Write {
                path: self.path.clone(),
                source: std::io::Error::other(join_err),
            }),
        }
    }
}

fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), HistoryError> {
    let io_err = |source| HistoryError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    staged.write_all(payload).map_err(io_err)?;
    staged.as_file().sync_all().map_err(io_err)?;
    staged
        .persist(path)
        .map_err(|err| io_err(err.error))
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_duplicate_free_and_ordered() {
        let mut history = IpHistory::default();
        history.record("a@x", "1.1.1.1");
        history.record("a@x", "2.2.2.2");
        history.record("a@x", "1.1.1.1");
        assert_eq!(history.distinct_ips("a@x"), 2);
        assert_eq!(history.last_ip("a@x"), Some("2.2.2.2"));
        assert!(history.contains("a@x", "1.1.1.1"));
        assert!(!history.contains("a@x", "3.3.3.3"));
    }

    #[test]
    fn unknown_address_is_empty() {
        let history = IpHistory::default();
        assert_eq!(history.distinct_ips("nobody@x"), 0);
        assert_eq!(history.last_ip("nobody@x"), None);
    }

    #[tokio::test]
    async fn load_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("state.json"));
        let history = store.load().await.unwrap();
        assert_eq!(history, IpHistory::default());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("state.json"));
        let mut history = IpHistory::default();
        history.record("a@x", "203.0.113.7");
        history.record("b@x", "198.51.100.4");
        store.save(&history).await.unwrap();
        assert_eq!(store.load().await.unwrap(), history);
    }

    #[tokio::test]
    async fn save_replaces_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("state.json"));
        let mut first = IpHistory::default();
        first.record("a@x", "203.0.113.7");
        store.save(&first).await.unwrap();

        first.record("a@x", "198.51.100.4");
        store.save(&first).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.distinct_ips("a@x"), 2);
        assert_eq!(loaded.last_ip("a@x"), Some("198.51.100.4"));
    }

    #[tokio::test]
    async fn ensure_creates_an_empty_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = HistoryStore::new(&path);
        store.ensure().await.unwrap();
        assert!(path.exists());

        let mut history = IpHistory::default();
        history.record("a@x", "203.0.113.7");
        store.save(&history).await.unwrap();
        // a second ensure must not clobber existing state
        store.ensure().await.unwrap();
        assert_eq!(store.load().await.unwrap(), history);
    }
}
