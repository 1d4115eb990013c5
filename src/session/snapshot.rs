use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::TodoItem;

/// Fixed key of the editor snapshot kept across the calendar sign-in redirect.
pub const SNAPSHOT_KEY: &str = "currentState";

const SNAPSHOT_EXTENSION: &str = "json";
const SNAPSHOT_TMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
    pub is_popup_open: bool,
    pub current_note_id: Option<u64>,
    pub note_title: String,
    pub note_content: String,
    pub is_todo: bool,
    pub todo_items: Vec<TodoItem>,
    pub selected_color: String,
}

/// Single-slot store: written before the redirect, consumed once afterwards.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(format!("{SNAPSHOT_KEY}.{SNAPSHOT_EXTENSION}")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, snapshot: &EditorSnapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot).context("serialising editor snapshot")?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("ensuring snapshot dir {}", dir.display()))?;
        }
        let tmp_path = self.path.with_extension(SNAPSHOT_TMP_EXTENSION);
        fs::write(&tmp_path, &json).with_context(|| {
            format!("writing temporary editor snapshot {}", tmp_path.display())
        })?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("atomically persisting editor snapshot {}", self.path.display())
        })?;
        Ok(())
    }

    /// Reads the snapshot and deletes it. A corrupt snapshot is discarded.
    pub fn take(&self) -> Result<Option<EditorSnapshot>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("reading editor snapshot {}", self.path.display())
                })
            }
        };
        self.remove()?;
        match serde_json::from_slice(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                tracing::warn!(?err, "discarding unreadable editor snapshot {}", self.path.display());
                Ok(None)
            }
        }
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("removing editor snapshot {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> EditorSnapshot {
        EditorSnapshot {
            is_popup_open: true,
            current_note_id: Some(4),
            note_title: "Trip".into(),
            note_content: String::new(),
            is_todo: true,
            todo_items: vec![TodoItem::local("passport")],
            selected_color: "blue".into(),
        }
    }

    #[test]
    fn snapshot_is_deleted_after_read() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = SnapshotStore::new(temp.path());
        store.save(&sample())?;
        assert!(store.path().exists());

        let restored = store.take()?.expect("snapshot present");
        assert_eq!(restored.note_title, "Trip");
        assert_eq!(restored.todo_items[0].content, "passport");
        assert!(!store.path().exists());
        assert!(store.take()?.is_none());
        Ok(())
    }

    #[test]
    fn snapshot_uses_camel_case_keys() -> anyhow::Result<()> {
        let value = serde_json::to_value(sample())?;
        for key in [
            "isPopupOpen",
            "currentNoteId",
            "noteTitle",
            "noteContent",
            "isTodo",
            "todoItems",
            "selectedColor",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        Ok(())
    }

    #[test]
    fn corrupt_snapshot_is_discarded() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = SnapshotStore::new(temp.path());
        fs::write(store.path(), b"{not json")?;
        assert!(store.take()?.is_none());
        assert!(!store.path().exists());
        Ok(())
    }
}
