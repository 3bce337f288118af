//! Index storage as a single JSON document
//!
//! - One document per storage directory (`index.json`), holding the current session
//! - Writes go through a temp file in the same directory and are renamed into
//!   place, so readers only ever see a complete document
//! - Previous sessions can optionally be kept under `sessions/<id>.json`

mod schema;

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{RecallError, Result};
use crate::Config;

pub use schema::{Exchange, PendingTurn, SessionIndex};

pub struct IndexStore {
    path: PathBuf,
    sessions_dir: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>, sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sessions_dir: sessions_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.index_path(), config.sessions_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored index.
    ///
    /// Returns `Ok(None)` when no index exists yet, and `CorruptIndex` when the
    /// document cannot be read as a valid index.
    pub fn load(&self) -> Result<Option<SessionIndex>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RecallError::CorruptIndex {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        let index: SessionIndex =
            serde_json::from_slice(&bytes).map_err(|e| RecallError::CorruptIndex {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        index.validate().map_err(|reason| RecallError::CorruptIndex {
            path: self.path.clone(),
            reason,
        })?;

        Ok(Some(index))
    }

    /// Atomically replace the stored index with `index`.
    pub fn save(&self, index: &SessionIndex) -> Result<()> {
        write_atomic(&self.path, index)
    }

    /// Keep a copy of a finished session's index next to the live one.
    pub fn archive(&self, index: &SessionIndex) -> Result<PathBuf> {
        let target = self
            .sessions_dir
            .join(format!("{}.json", sanitize_file_stem(&index.session_id)));
        write_atomic(&target, index)?;
        Ok(target)
    }
}

fn write_atomic(target: &Path, index: &SessionIndex) -> Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    // The temp file must live in the target's directory for the rename to be atomic
    let tmp = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, index)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| RecallError::Io(e.error))?;
    Ok(())
}

fn sanitize_file_stem(session_id: &str) -> String {
    let stem: String = session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "unknown".to_string()
    } else {
        stem
    }
}
