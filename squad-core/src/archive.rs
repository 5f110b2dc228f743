use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::squad::Squad;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("archive {path} is not valid JSON: {source}")]
    Serde {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Stored { index: usize },
    Duplicate { index: usize },
}

/// Accepted squads of one period, kept in a JSON file as a list of player
/// lists. Two squads are the same entry when their name sets match.
#[derive(Debug, Clone)]
pub struct SquadArchive {
    path: PathBuf,
    squads: Vec<Squad>,
}

impl SquadArchive {
    /// Opens the archive at `path`; a missing file is an empty archive.
    pub fn load(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref().to_path_buf();
        let squads = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| ArchiveError::Serde {
                    path: path.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(ArchiveError::Io { path, source }),
        };
        debug!(target: "archive", path = %path.display(), squads = squads.len(), "archive loaded");
        Ok(Self { path, squads })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn squads(&self) -> &[Squad] {
        &self.squads
    }

    pub fn len(&self) -> usize {
        self.squads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squads.is_empty()
    }

    pub fn position_of(&self, squad: &Squad) -> Option<usize> {
        let names = squad.names();
        self.squads.iter().position(|stored| stored.names() == names)
    }

    /// Appends `squad` and rewrites the file unless an entry with the same
    /// players exists, in which case nothing is written.
    pub fn submit(&mut self, squad: Squad) -> ArchiveResult<ArchiveOutcome> {
        if let Some(index) = self.position_of(&squad) {
            info!(target: "archive", index, path = %self.path.display(), "duplicate squad not stored");
            return Ok(ArchiveOutcome::Duplicate { index });
        }
        self.squads.push(squad);
        if let Err(err) = self.save() {
            self.squads.pop();
            return Err(err);
        }
        let index = self.squads.len() - 1;
        info!(target: "archive", index, path = %self.path.display(), "squad stored");
        Ok(ArchiveOutcome::Stored { index })
    }

    /// Name sets of every stored squad, in storage order.
    pub fn name_sets(&self) -> Vec<BTreeSet<String>> {
        self.squads.iter().map(Squad::names).collect()
    }

    fn save(&self) -> ArchiveResult<()> {
        let io_err = |source: io::Error| ArchiveError::Io {
            path: self.path.clone(),
            source,
        };
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent).map_err(io_err)?;

        let body = serde_json::to_vec_pretty(&self.squads).map_err(|source| ArchiveError::Serde {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp = NamedTempFile::new_in(&parent).map_err(io_err)?;
        tmp.write_all(&body).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|err| io_err(err.error))?;
        Ok(())
    }
}
