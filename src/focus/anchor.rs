//! Persistence for the reference ("anchor") embedding.
//!
//! The reference is a single vector the user nominates as "what focused
//! work looks like". It lives in its own small JSON file next to the
//! database rather than in SQLite, so users can inspect or delete it by
//! hand.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

pub struct ReferenceStore {
    path: PathBuf,
}

impl ReferenceStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the reference embedding. A missing file means no reference has
    /// been chosen yet and is not an error; an unreadable or malformed file
    /// is, because silently treating a corrupt reference as "none" would
    /// flatten every focus score to zero with no explanation.
    pub fn get(&self) -> Result<Option<Vec<f32>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read reference from {}", self.path.display()))?;
        let embedding = serde_json::from_str(&contents)
            .with_context(|| format!("malformed reference file {}", self.path.display()))?;
        Ok(Some(embedding))
    }

    /// Replace the reference embedding. Last write wins.
    pub fn set(&self, embedding: &[f32]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create reference directory {}", parent.display())
            })?;
        }

        let serialized = serde_json::to_string(embedding)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write reference to {}", self.path.display()))
    }

    /// Drop the reference entirely. Clearing an unset reference is a no-op.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove reference {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_none_before_first_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReferenceStore::new(dir.path().join("anchor.json"));
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReferenceStore::new(dir.path().join("anchor.json"));

        store.set(&[0.5, -1.0, 0.25]).unwrap();
        assert_eq!(store.get().unwrap(), Some(vec![0.5, -1.0, 0.25]));
    }

    #[test]
    fn test_set_overwrites_previous_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReferenceStore::new(dir.path().join("anchor.json"));

        store.set(&[1.0, 0.0]).unwrap();
        store.set(&[0.0, 1.0]).unwrap();
        assert_eq!(store.get().unwrap(), Some(vec![0.0, 1.0]));
    }

    #[test]
    fn test_clear_removes_the_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReferenceStore::new(dir.path().join("anchor.json"));

        store.clear().unwrap();
        store.set(&[1.0]).unwrap();
        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error_not_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anchor.json");
        fs::write(&path, "{not valid json").unwrap();

        let store = ReferenceStore::new(path);
        assert!(store.get().is_err());
    }
}
