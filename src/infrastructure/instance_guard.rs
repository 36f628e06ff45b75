use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Seek, SeekFrom, Write},
    path::PathBuf,
    process,
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use fs2::FileExt;
use serde::Serialize;

use crate::infrastructure::directories::ResolvedPaths;

const LOCK_FILENAME: &str = ".warden.lock";

#[derive(Serialize)]
struct LockInfo {
    pid: u32,
    acquired_at: String,
}

/// Exclusive lock on a file in the data directory. The queue engine mutates
/// unsynchronized local state, so exactly one warden may run against a data
/// directory; a second process fails fast here instead of corrupting it.
#[derive(Debug)]
pub struct InstanceGuard {
    file: File,
    path: PathBuf,
}

impl InstanceGuard {
    pub fn acquire(paths: &ResolvedPaths) -> Result<Self> {
        let path = paths.data_dir.join(LOCK_FILENAME);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                return Err(anyhow!(
                    "another instance holds {}; refusing to start",
                    path.display()
                ));
            }
            Err(err) => return Err(err.into()),
        }

        let info = LockInfo {
            pid: process::id(),
            acquired_at: Utc::now().to_rfc3339(),
        };
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        serde_json::to_writer(&mut file, &info)?;
        file.flush()?;

        tracing::info!(
            target: "lifecycle",
            pid = info.pid,
            path = %path.display(),
            "acquired runtime lock"
        );
        Ok(Self { file, path })
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    target: "lifecycle",
                    path = %self.path.display(),
                    error = %err,
                    "failed to remove lock file on shutdown"
                );
            }
        }
    }
}
