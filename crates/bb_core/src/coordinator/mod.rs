//! Command coordinator
//!
//! Drives matches on behalf of a chat front end: looks the venue up in the
//! registry (restoring it from the store after a restart), applies the
//! command under the match lock, persists, then hands notices to the
//! presenter once the lock is released.
//!
//! - `mod.rs` - lobby, captaincy, queries, manual end
//! - `play.rs` - toss, possessions, substitutions

mod play;
pub mod presenter;

pub use play::TossOutcome;
pub use presenter::{Audience, Notice, NoticeLog, Presenter, Selection};

use std::collections::BTreeSet;
use std::sync::Mutex;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::config::MatchConfig;
use crate::error::{EngineError, Result};
use crate::models::{PlayerId, Position, TeamId, VenueId};
use crate::registry::{read_lock, write_lock, MatchRegistry, SharedMatch};
use crate::save::MatchStore;
use crate::state::{LiveScore, Match};

type Notices = Vec<(Audience, Notice)>;

pub struct Coordinator<S: MatchStore> {
    registry: MatchRegistry,
    store: S,
    config: MatchConfig,
    rng: Mutex<ChaCha8Rng>,
}

impl<S: MatchStore> Coordinator<S> {
    /// Toss fallbacks draw from a `ChaCha8Rng` seeded with `seed`.
    pub fn new(store: S, config: MatchConfig, seed: u64) -> Self {
        Self::with_rng(store, config, ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn with_entropy(store: S, config: MatchConfig) -> Self {
        Self::with_rng(store, config, ChaCha8Rng::from_entropy())
    }

    fn with_rng(store: S, config: MatchConfig, rng: ChaCha8Rng) -> Self {
        Self { registry: MatchRegistry::new(), store, config, rng: Mutex::new(rng) }
    }

    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Load every stored match that is still in play into the registry.
    pub fn restore_active(&self) -> Result<Vec<VenueId>> {
        let mut restored = Vec::new();
        for venue in self.store.list_active().map_err(store_unavailable)? {
            let mut loaded = false;
            self.registry.get_or_insert_with(venue, || match self.store.load(venue) {
                Ok(state) => {
                    loaded = state.is_some();
                    Ok(state)
                }
                Err(err) => {
                    warn!(%venue, error = %err, "skipping unreadable stored match");
                    Ok(None)
                }
            })?;
            if loaded {
                restored.push(venue);
            }
        }
        info!(count = restored.len(), "active matches restored");
        Ok(restored)
    }

    // ========================
    // Lobby
    // ========================

    pub fn create_lobby(
        &self,
        venue: VenueId,
        host: PlayerId,
        host_name: &str,
        presenter: &dyn Presenter,
    ) -> Result<()> {
        // a match that survived a restart still occupies the venue
        self.registry.get_or_insert_with(venue, || match self.store.load(venue) {
            Ok(state) => Ok(state),
            Err(err) => {
                warn!(%venue, error = %err, "ignoring unreadable stored match");
                Ok(None)
            }
        })?;

        let lobby = Match::open_lobby(host, host_name, self.config.clone());
        let shared = self.registry.create(venue, lobby)?;
        {
            let m = read_lock(&shared)?;
            self.persist(venue, &m);
        }

        info!(%venue, %host, "lobby created");
        presenter.notify(venue, Audience::Venue, &Notice::LobbyCreated { host: host_name.to_string() });
        Ok(())
    }

    pub fn join(
        &self,
        venue: VenueId,
        player: PlayerId,
        name: &str,
        presenter: &dyn Presenter,
    ) -> Result<(TeamId, Position)> {
        let (team, position) = self.with_match(venue, |m| m.join(player, name))?;
        presenter.notify(
            venue,
            Audience::Venue,
            &Notice::PlayerJoined { name: name.to_string(), team, position },
        );
        Ok((team, position))
    }

    pub fn leave(
        &self,
        venue: VenueId,
        player: PlayerId,
        presenter: &dyn Presenter,
    ) -> Result<(TeamId, Position)> {
        let (seat, name) = self.with_match(venue, |m| {
            let name = display_name(m, player);
            Ok((m.leave(player)?, name))
        })?;
        presenter.notify(venue, Audience::Venue, &Notice::PlayerLeft { name });
        Ok(seat)
    }

    pub fn kick(
        &self,
        venue: VenueId,
        requester: PlayerId,
        target: PlayerId,
        presenter: &dyn Presenter,
    ) -> Result<(TeamId, Position)> {
        let (seat, name) = self.with_match(venue, |m| {
            let name = display_name(m, target);
            Ok((m.kick(requester, target)?, name))
        })?;
        presenter.notify(venue, Audience::Venue, &Notice::PlayerKicked { name });
        Ok(seat)
    }

    pub fn start(&self, venue: VenueId, requester: PlayerId, presenter: &dyn Presenter) -> Result<()> {
        self.with_match(venue, |m| m.start(requester))?;
        presenter.notify(venue, Audience::Venue, &Notice::GameStarted);
        Ok(())
    }

    // ========================
    // Captaincy
    // ========================

    pub fn transfer_captaincy(
        &self,
        venue: VenueId,
        requester: PlayerId,
        target: PlayerId,
        presenter: &dyn Presenter,
    ) -> Result<TeamId> {
        let (team, name) = self.with_match(venue, |m| {
            let team = m.transfer_captaincy(requester, target)?;
            Ok((team, display_name(m, target)))
        })?;
        presenter.notify(venue, Audience::Venue, &Notice::CaptainChanged { team, name });
        Ok(team)
    }

    pub fn rename_team(
        &self,
        venue: VenueId,
        requester: PlayerId,
        team: TeamId,
        name: &str,
        presenter: &dyn Presenter,
    ) -> Result<()> {
        let name = self.with_match(venue, |m| {
            m.rename_team(requester, team, name)?;
            Ok(m.team(team).name.clone())
        })?;
        presenter.notify(venue, Audience::Venue, &Notice::TeamRenamed { team, name });
        Ok(())
    }

    // ========================
    // Queries / Overrides / End
    // ========================

    pub fn live_score(&self, venue: VenueId) -> Result<LiveScore> {
        self.view(venue, Match::live_score)
    }

    /// Venues with a match in play, in memory or in the store.
    pub fn list_active(&self) -> Result<Vec<VenueId>> {
        let mut venues: BTreeSet<VenueId> =
            self.store.list_active().map_err(store_unavailable)?.into_iter().collect();
        for venue in self.registry.venues()? {
            if self.view(venue, Match::is_active)? {
                venues.insert(venue);
            } else {
                venues.remove(&venue);
            }
        }
        Ok(venues.into_iter().collect())
    }

    /// Host-only override of who starts the next possession.
    pub fn set_possession(
        &self,
        venue: VenueId,
        requester: PlayerId,
        team: TeamId,
        position: Position,
    ) -> Result<()> {
        self.with_match(venue, |m| {
            ensure_host(m, requester)?;
            m.set_possession(team, position)
        })
    }

    /// Host-only score correction.
    pub fn score_points(&self, venue: VenueId, requester: PlayerId, team: TeamId, points: u32) -> Result<()> {
        self.with_match(venue, |m| {
            ensure_host(m, requester)?;
            m.score_points(team, points)
        })
    }

    /// Host-only manual termination. The match leaves both registry and
    /// store; the final live score is returned.
    pub fn force_end(
        &self,
        venue: VenueId,
        requester: PlayerId,
        presenter: &dyn Presenter,
    ) -> Result<LiveScore> {
        let shared = self.shared(venue)?;
        let final_score = {
            let mut m = write_lock(&shared)?;
            if requester != m.host() {
                return Err(EngineError::rejected("only the host can end the game"));
            }
            m.end_game();
            m.live_score()
        };

        self.registry.remove(venue)?;
        if let Err(err) = self.store.delete(venue) {
            warn!(%venue, error = %err, "failed to delete stored match");
        }
        info!(%venue, %requester, "game ended manually");
        presenter.notify(venue, Audience::Venue, &Notice::GameEnded);
        Ok(final_score)
    }

    // ========================
    // Helpers
    // ========================

    /// Registry entry for `venue`, restored from the store on a miss.
    fn shared(&self, venue: VenueId) -> Result<SharedMatch> {
        let shared = self.registry.get_or_insert_with(venue, || match self.store.load(venue) {
            Ok(state) => {
                if state.is_some() {
                    info!(%venue, "match restored from store");
                }
                Ok(state)
            }
            Err(err) => {
                warn!(%venue, error = %err, "stored match unreadable");
                Err(EngineError::invalid_state(format!("stored game could not be read: {err}")))
            }
        })?;
        shared.ok_or_else(|| EngineError::not_found(format!("no game in venue {venue}")))
    }

    /// Apply `f` under the match lock and persist on success. A failed
    /// operation leaves the match untouched, so nothing is written.
    fn with_match<T>(&self, venue: VenueId, f: impl FnOnce(&mut Match) -> Result<T>) -> Result<T> {
        let shared = self.shared(venue)?;
        let mut m = write_lock(&shared)?;
        let value = f(&mut m)?;
        self.persist(venue, &m);
        Ok(value)
    }

    fn view<T>(&self, venue: VenueId, f: impl FnOnce(&Match) -> T) -> Result<T> {
        let shared = self.shared(venue)?;
        let m = read_lock(&shared)?;
        Ok(f(&m))
    }

    fn persist(&self, venue: VenueId, state: &Match) {
        if let Err(err) = self.store.save(venue, state) {
            warn!(%venue, error = %err, recoverable = err.is_recoverable(), "failed to persist match");
        }
    }

    fn announce(&self, venue: VenueId, presenter: &dyn Presenter, notices: Notices) {
        for (audience, notice) in notices {
            presenter.notify(venue, audience, &notice);
        }
    }
}

fn display_name(m: &Match, player: PlayerId) -> String {
    m.find_slot(player)
        .and_then(|(team, position)| m.slot(team, position))
        .map(|slot| slot.name.clone())
        .unwrap_or_else(|| format!("player {player}"))
}

fn ensure_host(m: &Match, requester: PlayerId) -> Result<()> {
    if requester != m.host() {
        return Err(EngineError::rejected("only the host can override the game"));
    }
    Ok(())
}

fn store_unavailable(err: crate::save::SaveError) -> EngineError {
    EngineError::invalid_state(format!("match store unavailable: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::MemoryMatchStore;
    use crate::state::Phase;

    fn coordinator() -> Coordinator<MemoryMatchStore> {
        Coordinator::new(MemoryMatchStore::new(), MatchConfig::default(), 7)
    }

    fn filled(c: &Coordinator<MemoryMatchStore>, venue: VenueId, log: &NoticeLog) {
        c.create_lobby(venue, PlayerId(1), "p1", log).unwrap();
        for id in 2..=6 {
            c.join(venue, PlayerId(id), &format!("p{id}"), log).unwrap();
        }
    }

    #[test]
    fn test_lobby_commands_persist() {
        let c = coordinator();
        let log = NoticeLog::new();
        filled(&c, VenueId(1), &log);

        let stored = c.store().load(VenueId(1)).unwrap().unwrap();
        assert_eq!(stored.join_order().len(), 6);
        assert!(stored.is_locked());
        assert_eq!(log.take().len(), 6);
    }

    #[test]
    fn test_unknown_venue_is_not_found() {
        let c = coordinator();
        let log = NoticeLog::new();
        let err = c.join(VenueId(9), PlayerId(1), "x", &log).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_restart_restores_from_store() {
        let c = coordinator();
        let log = NoticeLog::new();
        filled(&c, VenueId(1), &log);
        c.start(VenueId(1), PlayerId(1), &log).unwrap();

        // new coordinator over the same store
        let Coordinator { store, .. } = c;
        let c = Coordinator::new(store, MatchConfig::default(), 7);
        assert_eq!(c.list_active().unwrap(), vec![VenueId(1)]);
        assert_eq!(c.restore_active().unwrap(), vec![VenueId(1)]);
        assert_eq!(c.live_score(VenueId(1)).unwrap().phase, Phase::Active);

        // the restored game still blocks a new lobby
        assert!(c.create_lobby(VenueId(1), PlayerId(9), "late", &log).is_err());
    }

    #[test]
    fn test_create_lobby_blocked_after_restart_without_restore() {
        let c = coordinator();
        let log = NoticeLog::new();
        filled(&c, VenueId(1), &log);
        c.start(VenueId(1), PlayerId(1), &log).unwrap();

        let Coordinator { store, .. } = c;
        let c = Coordinator::new(store, MatchConfig::default(), 7);
        let err = c.create_lobby(VenueId(1), PlayerId(9), "late", &log).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn test_leave_and_kick_notices() {
        let c = coordinator();
        let log = NoticeLog::new();
        filled(&c, VenueId(1), &log);
        log.take();

        c.leave(VenueId(1), PlayerId(4), &log).unwrap();
        assert!(c.kick(VenueId(1), PlayerId(2), PlayerId(5), &log).is_err());
        c.kick(VenueId(1), PlayerId(1), PlayerId(5), &log).unwrap();

        let notices: Vec<Notice> = log.take().into_iter().map(|(_, n)| n).collect();
        assert_eq!(
            notices,
            vec![
                Notice::PlayerLeft { name: "p4".into() },
                Notice::PlayerKicked { name: "p5".into() },
            ]
        );
    }

    #[test]
    fn test_captaincy_and_rename() {
        let c = coordinator();
        let log = NoticeLog::new();
        filled(&c, VenueId(1), &log);

        assert!(c.transfer_captaincy(VenueId(1), PlayerId(2), PlayerId(3), &log).is_err());
        assert_eq!(c.transfer_captaincy(VenueId(1), PlayerId(1), PlayerId(3), &log).unwrap(), TeamId::One);
        assert!(c.rename_team(VenueId(1), PlayerId(1), TeamId::One, "Hoopers", &log).is_err());
        c.rename_team(VenueId(1), PlayerId(3), TeamId::One, "Hoopers", &log).unwrap();

        let live = c.live_score(VenueId(1)).unwrap();
        let one = live.team(TeamId::One).unwrap();
        assert_eq!(one.name, "Hoopers");
        assert_eq!(one.captain_name.as_deref(), Some("p3"));
    }

    #[test]
    fn test_force_end_is_host_only() {
        let c = coordinator();
        let log = NoticeLog::new();
        filled(&c, VenueId(1), &log);
        c.start(VenueId(1), PlayerId(1), &log).unwrap();

        assert!(matches!(
            c.force_end(VenueId(1), PlayerId(2), &log),
            Err(EngineError::RejectedAction(_))
        ));
        let last = c.force_end(VenueId(1), PlayerId(1), &log).unwrap();
        assert_eq!(last.phase, Phase::Finished);
        assert!(c.registry().is_empty());
        assert!(c.store().is_empty());
        assert!(c.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_overrides_refused_mid_possession() {
        let c = coordinator();
        let log = NoticeLog::new();
        filled(&c, VenueId(1), &log);
        c.start(VenueId(1), PlayerId(1), &log).unwrap();

        c.score_points(VenueId(1), PlayerId(1), TeamId::Two, 4).unwrap();
        c.begin_possession(VenueId(1), chrono::Utc::now(), &log).unwrap();
        assert!(c.set_possession(VenueId(1), PlayerId(1), TeamId::Two, Position::Sg).is_err());
        assert_eq!(c.live_score(VenueId(1)).unwrap().team(TeamId::Two).unwrap().score, 4);
    }

    #[test]
    fn test_overrides_are_host_only() {
        let c = coordinator();
        let log = NoticeLog::new();
        filled(&c, VenueId(1), &log);
        c.start(VenueId(1), PlayerId(1), &log).unwrap();
        let before = c.live_score(VenueId(1)).unwrap();

        let err = c.score_points(VenueId(1), PlayerId(4), TeamId::Two, 99).unwrap_err();
        assert!(matches!(err, EngineError::RejectedAction(_)));
        let err = c.set_possession(VenueId(1), PlayerId(4), TeamId::Two, Position::Ce).unwrap_err();
        assert!(matches!(err, EngineError::RejectedAction(_)));
        assert_eq!(c.live_score(VenueId(1)).unwrap(), before);

        c.set_possession(VenueId(1), PlayerId(1), TeamId::Two, Position::Ce).unwrap();
        let pointer = c.live_score(VenueId(1)).unwrap().possession.unwrap();
        assert_eq!((pointer.team, pointer.position), (TeamId::Two, Position::Ce));
    }

    /// Store whose loads stall, so concurrent commands all miss the registry.
    struct SlowStore(MemoryMatchStore);

    impl MatchStore for SlowStore {
        fn load(&self, venue: VenueId) -> std::result::Result<Option<Match>, crate::save::SaveError> {
            std::thread::sleep(std::time::Duration::from_millis(100));
            self.0.load(venue)
        }

        fn save(&self, venue: VenueId, state: &Match) -> std::result::Result<(), crate::save::SaveError> {
            self.0.save(venue, state)
        }

        fn delete(&self, venue: VenueId) -> std::result::Result<(), crate::save::SaveError> {
            self.0.delete(venue)
        }

        fn list_active(&self) -> std::result::Result<Vec<VenueId>, crate::save::SaveError> {
            self.0.list_active()
        }
    }

    #[test]
    fn test_concurrent_restore_keeps_every_join() {
        let c = coordinator();
        let log = NoticeLog::new();
        c.create_lobby(VenueId(1), PlayerId(1), "p1", &log).unwrap();

        // the lobby now lives only in the store
        let Coordinator { store, .. } = c;
        let c = Coordinator::new(SlowStore(store), MatchConfig::default(), 7);

        let seats: Vec<(TeamId, Position)> = std::thread::scope(|s| {
            let joins: Vec<_> = [2, 3]
                .into_iter()
                .map(|id| {
                    let c = &c;
                    s.spawn(move || c.join(VenueId(1), PlayerId(id), &format!("p{id}"), &NoticeLog::new()).unwrap())
                })
                .collect();
            joins.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_ne!(seats[0], seats[1]);
        let m = c.registry().read(VenueId(1), |m| m.clone()).unwrap();
        assert_eq!(m.join_order().len(), 3);
        assert!(m.team(TeamId::One).is_full());
        assert_eq!(c.store().0.load(VenueId(1)).unwrap().unwrap(), m);
    }
}
