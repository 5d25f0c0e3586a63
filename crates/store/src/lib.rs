//! Save-slot persistence for skirmish sessions.
//!
//! The store is opaque to the rest of the core: a [`SaveStore`] holds
//! named slots, each a full serialized [`Session`]. A loaded session is
//! replayable — applying an action to it yields exactly what the
//! pre-save run would have yielded, because the whole state record
//! (seed, units, loot, combat, history, inventories) round-trips.

use serde::Deserialize;
use serde::Serialize;
use skr_core::Millis;
use skr_core::Slot;
use skr_core::now_ms;
use skr_rules::Session;
use std::path::Path;
use std::path::PathBuf;

/// Bump when the persisted layout changes incompatibly.
const FORMAT_VERSION: u32 = 1;

/// Metadata for one occupied slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSummary {
    pub slot: Slot,
    pub name: String,
    pub saved_at: Millis,
    pub summary: String,
}

/// On-disk envelope around a saved session.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveFile {
    format_version: u32,
    name: String,
    saved_at: Millis,
    session: Session,
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serde(serde_json::Error),
    UnsupportedVersion(u32),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "save store io: {}", e),
            Self::Serde(e) => write!(f, "save store serialization: {}", e),
            Self::UnsupportedVersion(v) => write!(f, "unsupported save format {}", v),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e)
    }
}

/// Slot-addressed persistence of full session state.
pub trait SaveStore: Send + Sync {
    fn save(&self, slot: &Slot, name: &str, session: &Session) -> Result<(), StoreError>;
    fn load(&self, slot: &Slot) -> Result<Option<Session>, StoreError>;
    fn list(&self) -> Result<Vec<SaveSummary>, StoreError>;
}

/// Default backend: one JSON file per slot under a base directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
    fn path(&self, slot: &Slot) -> PathBuf {
        self.base_dir.join(format!("{}.json", sanitize(slot)))
    }
    fn read(&self, path: &Path) -> Result<SaveFile, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        let file: SaveFile = serde_json::from_str(&contents)?;
        if file.format_version > FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(file.format_version));
        }
        Ok(file)
    }
}

impl SaveStore for JsonFileStore {
    fn save(&self, slot: &Slot, name: &str, session: &Session) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.base_dir)?;
        let file = SaveFile {
            format_version: FORMAT_VERSION,
            name: name.to_string(),
            saved_at: now_ms(),
            session: session.clone(),
        };
        let path = self.path(slot);
        std::fs::write(&path, serde_json::to_string(&file)?)?;
        log::info!("[store] saved slot {} to {}", slot, path.display());
        Ok(())
    }

    fn load(&self, slot: &Slot) -> Result<Option<Session>, StoreError> {
        let path = self.path(slot);
        if !path.exists() {
            return Ok(None);
        }
        self.read(&path).map(|f| Some(f.session))
    }

    fn list(&self) -> Result<Vec<SaveSummary>, StoreError> {
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let slot = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };
            match self.read(&path) {
                Ok(file) => out.push(SaveSummary {
                    slot,
                    name: file.name,
                    saved_at: file.saved_at,
                    summary: file.session.summary(),
                }),
                Err(e) => log::warn!("[store] skipping unreadable {}: {}", path.display(), e),
            }
        }
        out.sort_by(|a, b| a.slot.cmp(&b.slot));
        Ok(out)
    }
}

/// Keep slot names filesystem-safe.
fn sanitize(slot: &str) -> String {
    slot.chars()
        .map(|c| match c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            true => c,
            false => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use skr_core::ID;
    use skr_rules::SessionConfig;

    fn store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path());
        (dir, store)
    }

    fn session() -> Session {
        Session::new(ID::default(), 42, SessionConfig::default())
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = store();
        let s = session();
        store.save(&"slot1".to_string(), "first", &s).expect("save");
        let loaded = store.load(&"slot1".to_string()).expect("load").expect("present");
        assert_eq!(s, loaded);
    }

    #[test]
    fn missing_slot_loads_none() {
        let (_dir, store) = store();
        assert!(store.load(&"nope".to_string()).expect("load").is_none());
    }

    #[test]
    fn list_reports_saved_slots() {
        let (_dir, store) = store();
        store.save(&"a".to_string(), "alpha", &session()).expect("save");
        store.save(&"b".to_string(), "beta", &session()).expect("save");
        let listing = store.list().expect("list");
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].slot, "a");
        assert_eq!(listing[0].name, "alpha");
        assert!(listing[0].saved_at > 0);
        assert!(!listing[0].summary.is_empty());
    }

    #[test]
    fn saving_a_slot_twice_overwrites() {
        let (_dir, store) = store();
        let first = session();
        let second = session();
        store.save(&"slot".to_string(), "v1", &first).expect("save");
        store.save(&"slot".to_string(), "v2", &second).expect("save");
        let loaded = store.load(&"slot".to_string()).expect("load").expect("present");
        assert_eq!(loaded, second);
        assert_eq!(store.list().expect("list").len(), 1);
    }

    #[test]
    fn hostile_slot_names_are_sanitized() {
        let (_dir, store) = store();
        let slot = "../escape".to_string();
        store.save(&slot, "trap", &session()).expect("save");
        let listing = store.list().expect("list");
        assert_eq!(listing.len(), 1);
        assert!(!listing[0].slot.contains('/'));
    }
}
