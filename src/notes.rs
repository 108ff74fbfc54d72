//! Local persistence of study notes.
//!
//! Notes are keyed by "course/module" and stored as one JSON document on
//! disk. The file is rewritten in full on every mutation; note volumes
//! are tiny and atomicity beyond a single write is not needed here.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Note {
    pub id: String,
    /// The lesson passage the note is attached to, if any.
    pub quote: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

pub struct NoteStore {
    path: PathBuf,
    notes: BTreeMap<String, Vec<Note>>,
}

impl NoteStore {
    /// Load the store from disk; a missing file is an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let notes = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt notes file '{}'", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read '{}'", path.display()));
            }
        };
        Ok(Self { path, notes })
    }

    fn save(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.notes)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write '{}'", self.path.display()))
    }

    fn key(course: &str, module: &str) -> String {
        format!("{}/{}", course, module)
    }

    /// Append a note and persist; returns the stored note with its id.
    pub fn add(
        &mut self,
        course: &str,
        module: &str,
        quote: Option<String>,
        text: String,
    ) -> Result<Note> {
        let note = Note {
            id: Uuid::new_v4().to_string(),
            quote,
            text,
            created_at: Utc::now(),
        };
        self.notes
            .entry(Self::key(course, module))
            .or_default()
            .push(note.clone());
        self.save()?;
        Ok(note)
    }

    /// Notes for one module, oldest first.
    pub fn list(&self, course: &str, module: &str) -> &[Note] {
        self.notes
            .get(&Self::key(course, module))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Remove a note by id; returns whether anything was deleted.
    pub fn remove(&mut self, course: &str, module: &str, id: &str) -> Result<bool> {
        let key = Self::key(course, module);
        let Some(notes) = self.notes.get_mut(&key) else {
            return Ok(false);
        };
        let before = notes.len();
        notes.retain(|n| n.id != id);
        let removed = notes.len() != before;
        if notes.is_empty() {
            self.notes.remove(&key);
        }
        if removed {
            self.save()?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::load(dir.path().join("notes.json")).unwrap();
        assert!(store.list("calc", "limits").is_empty());
    }

    #[test]
    fn notes_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");

        let mut store = NoteStore::load(&path).unwrap();
        let note = store
            .add("calc", "limits", Some("epsilon-delta".into()), "Review this".into())
            .unwrap();
        store.add("calc", "derivatives", None, "Power rule".into()).unwrap();

        let reloaded = NoteStore::load(&path).unwrap();
        let limits = reloaded.list("calc", "limits");
        assert_eq!(limits.len(), 1);
        assert_eq!(limits[0], note);
        assert_eq!(reloaded.list("calc", "derivatives").len(), 1);
    }

    #[test]
    fn remove_deletes_only_the_matching_note() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");

        let mut store = NoteStore::load(&path).unwrap();
        let a = store.add("c", "m", None, "first".into()).unwrap();
        let b = store.add("c", "m", None, "second".into()).unwrap();

        assert!(store.remove("c", "m", &a.id).unwrap());
        assert!(!store.remove("c", "m", &a.id).unwrap());

        let remaining = store.list("c", "m");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b.id);
    }

    #[test]
    fn modules_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = NoteStore::load(dir.path().join("notes.json")).unwrap();
        store.add("calc", "limits", None, "a".into()).unwrap();
        assert!(store.list("calc", "derivatives").is_empty());
        assert!(store.list("algebra", "limits").is_empty());
    }
}
