//! Venue registry
//!
//! One match per venue, each behind its own lock. Different venues never
//! share mutable state, so they can be driven from different threads.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use crate::error::{EngineError, Result};
use crate::models::VenueId;
use crate::state::{Match, Phase};

pub type SharedMatch = Arc<RwLock<Match>>;

#[derive(Debug, Default)]
pub struct MatchRegistry {
    venues: RwLock<HashMap<VenueId, SharedMatch>>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, venue: VenueId) -> Result<Option<SharedMatch>> {
        Ok(self.table()?.get(&venue).cloned())
    }

    pub fn contains(&self, venue: VenueId) -> Result<bool> {
        Ok(self.table()?.contains_key(&venue))
    }

    /// Register a new lobby. Refused while the venue's match is in play;
    /// a lobby or finished match is replaced.
    pub fn create(&self, venue: VenueId, lobby: Match) -> Result<SharedMatch> {
        let mut table = self.table_mut()?;
        if let Some(existing) = table.get(&venue) {
            let phase = read_lock(existing)?.phase();
            if matches!(phase, Phase::Active | Phase::PeriodOver) {
                return Err(EngineError::invalid_state("a game is already active in this venue"));
            }
        }
        let shared = Arc::new(RwLock::new(lobby));
        if table.insert(venue, Arc::clone(&shared)).is_some() {
            info!(%venue, "previous match replaced");
        }
        Ok(shared)
    }

    /// Insert unconditionally (restoring from a store).
    pub fn insert(&self, venue: VenueId, state: Match) -> Result<SharedMatch> {
        let shared = Arc::new(RwLock::new(state));
        self.table_mut()?.insert(venue, Arc::clone(&shared));
        Ok(shared)
    }

    /// The venue's match, loading it with `load` on a miss. `load` runs
    /// without the table lock; if another caller registered the venue in
    /// the meantime, that entry wins and the loaded copy is dropped.
    pub fn get_or_insert_with(
        &self,
        venue: VenueId,
        load: impl FnOnce() -> Result<Option<Match>>,
    ) -> Result<Option<SharedMatch>> {
        if let Some(shared) = self.get(venue)? {
            return Ok(Some(shared));
        }
        let Some(state) = load()? else {
            return Ok(self.get(venue)?);
        };

        let mut table = self.table_mut()?;
        let shared = table.entry(venue).or_insert_with(|| Arc::new(RwLock::new(state)));
        Ok(Some(Arc::clone(shared)))
    }

    pub fn remove(&self, venue: VenueId) -> Result<Option<SharedMatch>> {
        Ok(self.table_mut()?.remove(&venue))
    }

    pub fn venues(&self) -> Result<Vec<VenueId>> {
        let mut venues: Vec<VenueId> = self.table()?.keys().copied().collect();
        venues.sort();
        Ok(venues)
    }

    pub fn len(&self) -> usize {
        self.table().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against a snapshot-consistent view of the venue's match.
    pub fn read<T>(&self, venue: VenueId, f: impl FnOnce(&Match) -> T) -> Result<T> {
        let shared = self.require(venue)?;
        let guard = read_lock(&shared)?;
        Ok(f(&guard))
    }

    /// Run `f` with exclusive access to the venue's match.
    pub fn write<T>(&self, venue: VenueId, f: impl FnOnce(&mut Match) -> Result<T>) -> Result<T> {
        let shared = self.require(venue)?;
        let mut guard = write_lock(&shared)?;
        f(&mut guard)
    }

    fn require(&self, venue: VenueId) -> Result<SharedMatch> {
        self.get(venue)?
            .ok_or_else(|| EngineError::not_found(format!("no game in venue {venue}")))
    }

    fn table(&self) -> Result<RwLockReadGuard<'_, HashMap<VenueId, SharedMatch>>> {
        self.venues.read().map_err(|_| EngineError::invalid_state("venue registry lock poisoned"))
    }

    fn table_mut(&self) -> Result<RwLockWriteGuard<'_, HashMap<VenueId, SharedMatch>>> {
        self.venues.write().map_err(|_| EngineError::invalid_state("venue registry lock poisoned"))
    }
}

pub fn read_lock(shared: &SharedMatch) -> Result<RwLockReadGuard<'_, Match>> {
    shared.read().map_err(|_| EngineError::invalid_state("match lock poisoned"))
}

pub fn write_lock(shared: &SharedMatch) -> Result<RwLockWriteGuard<'_, Match>> {
    shared.write().map_err(|_| EngineError::invalid_state("match lock poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::models::{PlayerId, TeamId};
    use crate::state::test_support::started;

    fn lobby(host: u64) -> Match {
        Match::open_lobby(PlayerId(host), "host", MatchConfig::default())
    }

    #[test]
    fn test_venues_are_independent() {
        let registry = MatchRegistry::new();
        registry.insert(VenueId(1), started(MatchConfig::default())).unwrap();
        registry.insert(VenueId(2), started(MatchConfig::default())).unwrap();

        registry.write(VenueId(1), |m| m.score_points(TeamId::One, 3)).unwrap();
        assert_eq!(registry.read(VenueId(1), |m| m.score(TeamId::One)).unwrap(), 3);
        assert_eq!(registry.read(VenueId(2), |m| m.score(TeamId::One)).unwrap(), 0);
        assert_eq!(registry.venues().unwrap(), vec![VenueId(1), VenueId(2)]);
    }

    #[test]
    fn test_create_refused_while_active() {
        let registry = MatchRegistry::new();
        registry.insert(VenueId(1), started(MatchConfig::default())).unwrap();
        let err = registry.create(VenueId(1), lobby(9)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert_eq!(registry.read(VenueId(1), |m| m.host()).unwrap(), PlayerId(1));
    }

    #[test]
    fn test_create_replaces_lobby_and_finished() {
        let registry = MatchRegistry::new();
        registry.create(VenueId(1), lobby(1)).unwrap();
        registry.create(VenueId(1), lobby(2)).unwrap();
        assert_eq!(registry.read(VenueId(1), |m| m.host()).unwrap(), PlayerId(2));

        registry
            .write(VenueId(1), |m| {
                m.end_game();
                Ok(())
            })
            .unwrap();
        registry.create(VenueId(1), lobby(3)).unwrap();
        assert_eq!(registry.read(VenueId(1), |m| m.host()).unwrap(), PlayerId(3));
    }

    #[test]
    fn test_missing_venue_is_not_found() {
        let registry = MatchRegistry::new();
        assert!(matches!(registry.read(VenueId(5), |_| ()), Err(EngineError::NotFound(_))));
        assert!(registry.remove(VenueId(5)).unwrap().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_or_insert_keeps_first_entry() {
        let registry = MatchRegistry::new();
        let first = registry.get_or_insert_with(VenueId(1), || Ok(Some(lobby(1)))).unwrap().unwrap();

        // a present entry skips the loader entirely
        let again = registry
            .get_or_insert_with(VenueId(1), || panic!("loader must not run"))
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(registry.get_or_insert_with(VenueId(2), || Ok(None)).unwrap().is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_racing_loads_share_one_entry() {
        let registry = Arc::new(MatchRegistry::new());
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let handles: Vec<_> = (1..=2)
            .map(|host| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    registry
                        .get_or_insert_with(VenueId(1), || {
                            // both threads miss before either inserts
                            barrier.wait();
                            Ok(Some(lobby(host)))
                        })
                        .unwrap()
                        .unwrap()
                })
            })
            .collect();
        let shared: Vec<SharedMatch> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(Arc::ptr_eq(&shared[0], &shared[1]));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_parallel_venues() {
        let registry = Arc::new(MatchRegistry::new());
        for v in 0..4 {
            registry.insert(VenueId(v), started(MatchConfig::default())).unwrap();
        }
        let handles: Vec<_> = (0..4)
            .map(|v| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        registry.write(VenueId(v), |m| m.complete_possession()).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for v in 0..4 {
            assert_eq!(registry.read(VenueId(v), |m| m.move_count()).unwrap(), 10);
        }
    }
}
