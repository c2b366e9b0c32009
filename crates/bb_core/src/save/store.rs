//! Persistence collaborators
//!
//! One stored match per venue. Stores take `&self` so a coordinator can
//! share them between venues; `FileMatchStore` writes atomically, so a
//! crash mid-save leaves the previous file intact.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use super::error::SaveError;
use super::format::{decode, encode, MatchSave};
use crate::models::VenueId;
use crate::state::Match;

pub trait MatchStore: Send + Sync {
    fn load(&self, venue: VenueId) -> Result<Option<Match>, SaveError>;

    fn save(&self, venue: VenueId, state: &Match) -> Result<(), SaveError>;

    fn delete(&self, venue: VenueId) -> Result<(), SaveError>;

    /// Venues whose stored match is in play.
    fn list_active(&self) -> Result<Vec<VenueId>, SaveError>;
}

/// `<dir>/match_<venue>.dat`, one file per venue.
#[derive(Debug, Clone)]
pub struct FileMatchStore {
    dir: PathBuf,
}

impl FileMatchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, venue: VenueId) -> PathBuf {
        self.dir.join(format!("match_{}.dat", venue.0))
    }

    fn venue_of(path: &Path) -> Option<VenueId> {
        let stem = path.file_name()?.to_str()?.strip_suffix(".dat")?;
        stem.strip_prefix("match_")?.parse().ok().map(VenueId)
    }

    fn read_save(path: &Path) -> Result<MatchSave, SaveError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SaveError::FileNotFound { path: path.display().to_string() })
            }
            Err(err) => return Err(err.into()),
        };
        let save = decode(&bytes)?;
        debug!("Loaded {} bytes from {:?}", bytes.len(), path);
        Ok(save)
    }

    fn write_atomic(path: &Path, data: &[u8]) -> Result<(), SaveError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            file.flush()?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;

        debug!("Saved {} bytes to {:?}", data.len(), path);
        Ok(())
    }
}

impl MatchStore for FileMatchStore {
    fn load(&self, venue: VenueId) -> Result<Option<Match>, SaveError> {
        let path = self.path_for(venue);
        let save = match Self::read_save(&path) {
            Ok(save) => save,
            Err(SaveError::FileNotFound { .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        if save.venue != venue {
            return Err(SaveError::VenueMismatch { found: save.venue.0, expected: venue.0 });
        }
        Ok(Some(save.state))
    }

    fn save(&self, venue: VenueId, state: &Match) -> Result<(), SaveError> {
        let data = encode(&MatchSave::new(venue, state.clone()))?;
        Self::write_atomic(&self.path_for(venue), &data)
    }

    fn delete(&self, venue: VenueId) -> Result<(), SaveError> {
        let path = self.path_for(venue);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(%venue, "stored match deleted");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn list_active(&self) -> Result<Vec<VenueId>, SaveError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut venues = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let Some(venue) = Self::venue_of(&path) else {
                continue;
            };
            match Self::read_save(&path) {
                Ok(save) if save.state.is_active() => venues.push(venue),
                Ok(_) => {}
                // one unreadable file should not hide the others
                Err(err) => warn!(%venue, error = %err, "skipping unreadable save"),
            }
        }
        venues.sort();
        Ok(venues)
    }
}

/// Keeps encoded envelopes in memory, exercising the same codec as files.
#[derive(Debug, Default)]
pub struct MemoryMatchStore {
    saves: Mutex<BTreeMap<VenueId, Vec<u8>>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.saves.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MatchStore for MemoryMatchStore {
    fn load(&self, venue: VenueId) -> Result<Option<Match>, SaveError> {
        let saves = self.saves.lock().unwrap_or_else(PoisonError::into_inner);
        saves.get(&venue).map(|bytes| decode(bytes).map(|save| save.state)).transpose()
    }

    fn save(&self, venue: VenueId, state: &Match) -> Result<(), SaveError> {
        let data = encode(&MatchSave::new(venue, state.clone()))?;
        self.saves.lock().unwrap_or_else(PoisonError::into_inner).insert(venue, data);
        Ok(())
    }

    fn delete(&self, venue: VenueId) -> Result<(), SaveError> {
        self.saves.lock().unwrap_or_else(PoisonError::into_inner).remove(&venue);
        Ok(())
    }

    fn list_active(&self) -> Result<Vec<VenueId>, SaveError> {
        let saves = self.saves.lock().unwrap_or_else(PoisonError::into_inner);
        let mut venues = Vec::new();
        for (venue, bytes) in saves.iter() {
            if decode(bytes)?.state.is_active() {
                venues.push(*venue);
            }
        }
        Ok(venues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::models::PlayerId;
    use crate::state::test_support::started;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMatchStore::new(temp_dir.path());
        let m = started(MatchConfig::default());

        store.save(VenueId(3), &m).unwrap();
        assert_eq!(store.load(VenueId(3)).unwrap(), Some(m));
        assert_eq!(store.load(VenueId(4)).unwrap(), None);
    }

    #[test]
    fn test_atomic_save() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMatchStore::new(temp_dir.path().join("nested"));
        let m = started(MatchConfig::default());

        store.save(VenueId(1), &m).unwrap();
        let path = store.path_for(VenueId(1));
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMatchStore::new(temp_dir.path());
        store.save(VenueId(1), &started(MatchConfig::default())).unwrap();

        store.delete(VenueId(1)).unwrap();
        store.delete(VenueId(1)).unwrap();
        assert_eq!(store.load(VenueId(1)).unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_surfaces_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMatchStore::new(temp_dir.path());
        fs::write(store.path_for(VenueId(2)), b"definitely not a save file at all, honestly").unwrap();
        let err = store.load(VenueId(2)).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_renamed_file_detects_venue_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMatchStore::new(temp_dir.path());
        store.save(VenueId(1), &started(MatchConfig::default())).unwrap();
        fs::rename(store.path_for(VenueId(1)), store.path_for(VenueId(9))).unwrap();
        assert!(matches!(store.load(VenueId(9)), Err(SaveError::VenueMismatch { .. })));
    }

    #[test]
    fn test_list_active_skips_lobbies_and_junk() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMatchStore::new(temp_dir.path());
        store.save(VenueId(5), &started(MatchConfig::default())).unwrap();
        store.save(VenueId(2), &started(MatchConfig::default())).unwrap();
        store
            .save(VenueId(3), &Match::open_lobby(PlayerId(1), "host", MatchConfig::default()))
            .unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();

        assert_eq!(store.list_active().unwrap(), vec![VenueId(2), VenueId(5)]);
    }

    #[test]
    fn test_list_active_on_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMatchStore::new(temp_dir.path().join("absent"));
        assert!(store.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryMatchStore::new();
        let m = started(MatchConfig::default());
        store.save(VenueId(1), &m).unwrap();
        store
            .save(VenueId(2), &Match::open_lobby(PlayerId(1), "host", MatchConfig::default()))
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.load(VenueId(1)).unwrap(), Some(m));
        assert_eq!(store.list_active().unwrap(), vec![VenueId(1)]);
        store.delete(VenueId(1)).unwrap();
        assert_eq!(store.load(VenueId(1)).unwrap(), None);
    }
}
