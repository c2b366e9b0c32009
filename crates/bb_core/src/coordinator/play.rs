use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{display_name, Audience, Coordinator, Notice, Notices, Presenter, Selection};
use crate::engine::{
    ChoiceOption, ChoiceSet, OpenStep, PossessionOutcome, PromptKind, StepInput, StepResult,
};
use crate::error::{EngineError, Result};
use crate::models::{PlayerId, Position, TeamId, VenueId};
use crate::save::MatchStore;
use crate::state::{Match, TossSide};

const ACCEPT: &str = "accept";
const DECLINE: &str = "decline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TossOutcome {
    pub draw: TossSide,
    pub winner: TeamId,
    /// No single team matched the draw; the winner was flipped for.
    pub fallback: bool,
}

impl<S: MatchStore> Coordinator<S> {
    // ========================
    // Coin Toss
    // ========================

    /// Host or either captain opens the toss.
    pub fn begin_toss(&self, venue: VenueId, requester: PlayerId, presenter: &dyn Presenter) -> Result<()> {
        self.with_match(venue, |m| {
            if requester != m.host() && m.captain_of(requester).is_none() {
                return Err(EngineError::rejected("only the host or a captain can start the toss"));
            }
            m.start_toss()
        })?;
        presenter.notify(venue, Audience::Venue, &Notice::TossStarted);
        Ok(())
    }

    /// Record a captain's pick. Once both teams have picked, the outcome is
    /// drawn and possession awarded.
    pub fn choose_toss_side(
        &self,
        venue: VenueId,
        requester: PlayerId,
        team: TeamId,
        side: TossSide,
        presenter: &dyn Presenter,
    ) -> Result<Option<TossOutcome>> {
        let outcome = self.with_match(venue, |m| {
            if !m.team(team).is_captain(requester) {
                return Err(EngineError::rejected("only the team captain can choose"));
            }
            m.choose_side(team, side)?;
            if !m.toss().both_chosen() {
                return Ok(None);
            }

            let draw = if self.flip()? { TossSide::High } else { TossSide::Low };
            let (winner, fallback) = match m.resolve_toss(draw) {
                Some(winner) => (winner, false),
                None => (if self.flip()? { TeamId::One } else { TeamId::Two }, true),
            };
            m.award_toss(winner)?;
            info!(%venue, %draw, %winner, fallback, "toss resolved");
            Ok(Some(TossOutcome { draw, winner, fallback }))
        })?;

        presenter.notify(venue, Audience::Venue, &Notice::TossChoice { team, side });
        if let Some(toss) = outcome {
            presenter.notify(
                venue,
                Audience::Venue,
                &Notice::TossResult { draw: toss.draw, winner: toss.winner, fallback: toss.fallback },
            );
        }
        Ok(outcome)
    }

    pub fn toss_choices(&self, team: TeamId) -> ChoiceSet {
        ChoiceSet {
            prompt: PromptKind::TossSide { team },
            text: format!("Team {team} captain: call the toss."),
            options: TossSide::ALL.iter().map(|s| ChoiceOption::new(s.as_str(), s.as_str().to_uppercase())).collect(),
            timeout_secs: i64::from(self.config.step_timeouts.attacker_secs),
        }
    }

    /// Blocking toss. Each captain is asked in turn; one who lets the prompt
    /// lapse or answers nonsense gets a random side.
    pub fn run_toss(&self, venue: VenueId, requester: PlayerId, presenter: &dyn Presenter) -> Result<TossOutcome> {
        self.begin_toss(venue, requester, presenter)?;
        let captains = self.view(venue, |m| TeamId::ALL.map(|team| (team, m.team(team).captain)))?;

        let mut outcome = None;
        for (team, captain) in captains {
            let captain =
                captain.ok_or_else(|| EngineError::invalid_state(format!("Team {team} has no captain")))?;
            let choices = self.toss_choices(team);
            let called = match presenter.present_choices(venue, captain, &choices) {
                Selection::Chosen(answer) => choices.pick(&answer).and_then(|o| o.code.parse::<TossSide>().ok()),
                Selection::Timeout => None,
            };
            let side = match called {
                Some(side) => side,
                None => {
                    debug!(%venue, %team, "toss call lapsed, picking a side");
                    if self.flip()? { TossSide::High } else { TossSide::Low }
                }
            };
            outcome = self.choose_toss_side(venue, captain, team, side, presenter)?;
        }
        outcome.ok_or_else(|| EngineError::invalid_state("the toss did not resolve"))
    }

    fn flip(&self) -> Result<bool> {
        let mut rng = self.rng.lock().map_err(|_| EngineError::invalid_state("random source poisoned"))?;
        Ok(rng.gen_bool(0.5))
    }

    // ========================
    // Possession (step API)
    // ========================

    /// Open a possession and return its first prompt.
    pub fn begin_possession(
        &self,
        venue: VenueId,
        now: DateTime<Utc>,
        presenter: &dyn Presenter,
    ) -> Result<(OpenStep, ChoiceSet)> {
        let (step, choices, notices) = self.with_match(venue, |m| {
            let step = m.begin_possession(now)?;
            let choices = current_choices(m)?;
            let notices = vec![on_the_clock(m, &step)];
            Ok((step, choices, notices))
        })?;
        self.announce(venue, presenter, notices);
        Ok((step, choices))
    }

    /// Answer the open step. Period ends, overtime and game over are applied
    /// before this returns.
    pub fn respond(
        &self,
        venue: VenueId,
        seq: u32,
        actor: PlayerId,
        choice: &str,
        now: DateTime<Utc>,
        presenter: &dyn Presenter,
    ) -> Result<StepResult> {
        let (result, notices) = self.with_match(venue, |m| {
            let result = m.respond(seq, actor, choice, now)?;
            let notices = follow_up(m, &result)?;
            Ok((result, notices))
        })?;
        self.announce(venue, presenter, notices);
        Ok(result)
    }

    pub fn timeout_step(
        &self,
        venue: VenueId,
        seq: u32,
        now: DateTime<Utc>,
        presenter: &dyn Presenter,
    ) -> Result<StepResult> {
        let (result, notices) = self.with_match(venue, |m| {
            let result = m.timeout_step(seq, now)?;
            let notices = follow_up(m, &result)?;
            Ok((result, notices))
        })?;
        self.announce(venue, presenter, notices);
        Ok(result)
    }

    /// Time out the open step if its deadline has passed.
    pub fn expire_step(
        &self,
        venue: VenueId,
        now: DateTime<Utc>,
        presenter: &dyn Presenter,
    ) -> Result<Option<StepResult>> {
        let expired = self.with_match(venue, |m| {
            let Some(result) = m.expire_step(now) else {
                return Ok(None);
            };
            let notices = follow_up(m, &result)?;
            Ok(Some((result, notices)))
        })?;
        Ok(expired.map(|(result, notices)| {
            self.announce(venue, presenter, notices);
            result
        }))
    }

    /// Menu for whoever is on the clock, if a possession is open.
    pub fn step_choices(&self, venue: VenueId) -> Result<Option<ChoiceSet>> {
        self.view(venue, Match::step_choices)
    }

    /// Play one whole possession through the presenter. The match lock is
    /// held per step, never while waiting on a player.
    pub fn advance_possession(&self, venue: VenueId, presenter: &dyn Presenter) -> Result<PossessionOutcome> {
        let (mut step, mut choices) = self.begin_possession(venue, Utc::now(), presenter)?;

        loop {
            let result = match presenter.present_choices(venue, step.addressed, &choices) {
                Selection::Chosen(answer) => {
                    let code = choices.pick(&answer).map_or(answer.clone(), |o| o.code.clone());
                    match self.respond(venue, step.seq, step.addressed, &code, Utc::now(), presenter) {
                        Ok(result) => result,
                        Err(EngineError::RejectedAction(reason)) => {
                            presenter.notify(venue, Audience::Player(step.addressed), &Notice::Rejected { reason });
                            if !step.is_expired(Utc::now()) {
                                continue;
                            }
                            self.timeout_step(venue, step.seq, Utc::now(), presenter)?
                        }
                        Err(err) => return Err(err),
                    }
                }
                Selection::Timeout => self.timeout_step(venue, step.seq, Utc::now(), presenter)?,
            };

            match result {
                StepResult::Continue(next) => {
                    choices = self.view(venue, current_choices)??;
                    step = next;
                }
                StepResult::Finished(outcome) => return Ok(outcome),
            }
        }
    }

    // ========================
    // Substitutions
    // ========================

    /// Captain files a request; returns the offer to show the incoming player.
    #[allow(clippy::too_many_arguments)]
    pub fn request_substitution(
        &self,
        venue: VenueId,
        requester: PlayerId,
        team: TeamId,
        out_position: Position,
        in_player: PlayerId,
        in_name: &str,
        presenter: &dyn Presenter,
    ) -> Result<ChoiceSet> {
        let offer = self.with_match(venue, |m| {
            if !m.team(team).is_captain(requester) {
                return Err(EngineError::rejected("only the team captain can initiate subs"));
            }
            m.request_substitution(team, out_position, in_player, in_name, Utc::now())?;
            Ok(substitution_offer(m, team, out_position))
        })?;
        presenter.notify(
            venue,
            Audience::Player(in_player),
            &Notice::SubstitutionRequested { team, position: out_position, incoming: in_name.to_string() },
        );
        Ok(offer)
    }

    /// The incoming player answers their pending request. Returns true when
    /// the slot was replaced.
    pub fn answer_substitution(
        &self,
        venue: VenueId,
        in_player: PlayerId,
        accepted: bool,
        presenter: &dyn Presenter,
    ) -> Result<bool> {
        let (replaced, notice) = self.with_match(venue, |m| {
            let request = m
                .pending_substitution(in_player)
                .cloned()
                .ok_or_else(|| EngineError::not_found("no pending substitution for you"))?;
            let replaced = m.complete_substitution(in_player, accepted);
            let notice = if replaced {
                Notice::SubstitutionCompleted {
                    team: request.team,
                    position: request.out_position,
                    incoming: request.in_name,
                }
            } else {
                Notice::SubstitutionDeclined { incoming: request.in_name }
            };
            Ok((replaced, notice))
        })?;
        presenter.notify(venue, Audience::Venue, &notice);
        Ok(replaced)
    }

    /// Request and prompt in one go. `None` means the offer went unanswered
    /// and stays pending.
    #[allow(clippy::too_many_arguments)]
    pub fn run_substitution(
        &self,
        venue: VenueId,
        requester: PlayerId,
        team: TeamId,
        out_position: Position,
        in_player: PlayerId,
        in_name: &str,
        presenter: &dyn Presenter,
    ) -> Result<Option<bool>> {
        let offer = self.request_substitution(venue, requester, team, out_position, in_player, in_name, presenter)?;
        match presenter.present_choices(venue, in_player, &offer) {
            Selection::Chosen(answer) => {
                let accepted = offer.pick(&answer).is_some_and(|o| o.code == ACCEPT);
                self.answer_substitution(venue, in_player, accepted, presenter).map(Some)
            }
            Selection::Timeout => {
                debug!(%venue, %in_player, "substitution offer unanswered");
                Ok(None)
            }
        }
    }
}

fn current_choices(m: &Match) -> Result<ChoiceSet> {
    m.step_choices().ok_or_else(|| EngineError::invalid_state("no possession is in progress"))
}

fn on_the_clock(m: &Match, step: &OpenStep) -> (Audience, Notice) {
    (
        Audience::Player(step.addressed),
        Notice::OnTheClock {
            player: display_name(m, step.addressed),
            step: step.kind,
            seconds: (step.deadline - step.opened_at).num_seconds(),
        },
    )
}

fn substitution_offer(m: &Match, team: TeamId, position: Position) -> ChoiceSet {
    ChoiceSet {
        prompt: PromptKind::SubstitutionOffer { team, position },
        text: format!("Join Team {team} as {position}?"),
        options: vec![ChoiceOption::new(ACCEPT, "Accept"), ChoiceOption::new(DECLINE, "Decline")],
        timeout_secs: i64::from(m.config().step_timeouts.substitution_secs),
    }
}

/// Notices for a resolved step, plus the period bookkeeping that follows a
/// possession outcome: halftime, overtime or game over.
fn follow_up(m: &mut Match, result: &StepResult) -> Result<Notices> {
    let mut notices = Notices::new();

    let last = match result {
        StepResult::Continue(_) => m.live_possession().and_then(|live| live.trail.last()),
        StepResult::Finished(outcome) => outcome.trail.last(),
    };
    if let Some(resolved) = last.filter(|r| r.input == StepInput::TimedOut) {
        notices.push((
            Audience::Venue,
            Notice::StepTimedOut { player: display_name(m, resolved.step.addressed), step: resolved.step.kind },
        ));
    }

    let outcome = match result {
        StepResult::Continue(step) => {
            notices.push(on_the_clock(m, step));
            return Ok(notices);
        }
        StepResult::Finished(outcome) => outcome,
    };

    notices.push((
        Audience::Venue,
        Notice::PossessionResolved {
            outcome: outcome.kind,
            team: outcome.attacking_team,
            points: outcome.points,
            next_team: outcome.next.team,
            next_position: outcome.next.position,
        },
    ));
    let (score_1, score_2) = (m.score(TeamId::One), m.score(TeamId::Two));
    if outcome.halftime() {
        notices.push((Audience::Venue, Notice::Halftime { score_1, score_2 }));
    }
    if !outcome.period_over() {
        return Ok(notices);
    }

    notices.push((Audience::Venue, Notice::PeriodOver { period: m.period(), score_1, score_2 }));
    if m.overtime_due() {
        let period = m.begin_overtime()?;
        notices.push((Audience::Venue, Notice::OvertimeStarted { period, rule: m.config().overtime_rule }));
    } else {
        let winner = m.finish()?;
        notices.push((Audience::Venue, Notice::GameOver { winner, score_1, score_2 }));
    }
    Ok(notices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::coordinator::NoticeLog;
    use crate::engine::OutcomeKind;
    use crate::save::MemoryMatchStore;
    use crate::state::Phase;

    fn started(config: MatchConfig, log: &NoticeLog) -> Coordinator<MemoryMatchStore> {
        let c = Coordinator::new(MemoryMatchStore::new(), config, 11);
        c.create_lobby(VenueId(1), PlayerId(1), "p1", log).unwrap();
        for id in 2..=6 {
            c.join(VenueId(1), PlayerId(id), &format!("p{id}"), log).unwrap();
        }
        c.start(VenueId(1), PlayerId(1), log).unwrap();
        log.take();
        c
    }

    #[test]
    fn test_toss_needs_both_captains() {
        let log = NoticeLog::new();
        let c = started(MatchConfig::default(), &log);
        let v = VenueId(1);

        assert!(c.begin_toss(v, PlayerId(2), &log).is_err());
        c.begin_toss(v, PlayerId(4), &log).unwrap();

        assert!(c.choose_toss_side(v, PlayerId(2), TeamId::One, TossSide::High, &log).is_err());
        assert_eq!(c.choose_toss_side(v, PlayerId(1), TeamId::One, TossSide::High, &log).unwrap(), None);
        let toss = c.choose_toss_side(v, PlayerId(4), TeamId::Two, TossSide::Low, &log).unwrap().unwrap();

        let expected = if toss.draw == TossSide::High { TeamId::One } else { TeamId::Two };
        assert_eq!(toss.winner, expected);
        assert!(!toss.fallback);
        assert_eq!(c.live_score(v).unwrap().possession.unwrap().team, toss.winner);
    }

    #[test]
    fn test_run_toss_with_lapsed_calls() {
        let log = NoticeLog::new();
        let c = started(MatchConfig::default(), &log);

        // the log never answers, so both sides are drawn at random
        let toss = c.run_toss(VenueId(1), PlayerId(1), &log).unwrap();
        let notices = log.take();
        assert_eq!(notices.iter().filter(|(_, n)| matches!(n, Notice::TossChoice { .. })).count(), 2);
        assert!(notices.iter().any(|(_, n)| matches!(n, Notice::TossResult { .. })));
        assert_eq!(c.live_score(VenueId(1)).unwrap().possession.unwrap().team, toss.winner);

        let choices = c.toss_choices(TeamId::Two);
        assert_eq!(choices.pick("2").unwrap().code, "low");
        assert_eq!(choices.prompt, PromptKind::TossSide { team: TeamId::Two });
    }

    #[test]
    fn test_same_side_falls_back_reproducibly() {
        let run = || {
            let log = NoticeLog::new();
            let c = started(MatchConfig::default(), &log);
            c.begin_toss(VenueId(1), PlayerId(1), &log).unwrap();
            c.choose_toss_side(VenueId(1), PlayerId(1), TeamId::One, TossSide::Low, &log).unwrap();
            c.choose_toss_side(VenueId(1), PlayerId(4), TeamId::Two, TossSide::Low, &log).unwrap().unwrap()
        };
        let first = run();
        assert!(first.fallback);
        assert_eq!(first, run());
    }

    #[test]
    fn test_step_api_runs_to_game_over() {
        let log = NoticeLog::new();
        let config = MatchConfig { max_moves: 2, halftime_move: 1, ..MatchConfig::default() };
        let c = started(config, &log);
        let v = VenueId(1);
        let now = Utc::now();

        // team 1 scores on a missed save
        let (step, choices) = c.begin_possession(v, now, &log).unwrap();
        assert!(choices.contains("pg_dribble_layup"));
        let StepResult::Continue(defend) = c.respond(v, step.seq, PlayerId(1), "pg_dribble_layup", now, &log).unwrap() else {
            panic!("expected defender step");
        };
        let StepResult::Continue(save) = c.respond(v, defend.seq, PlayerId(6), "dunk", now, &log).unwrap() else {
            panic!("expected save step");
        };
        let StepResult::Finished(first) = c.respond(v, save.seq, PlayerId(6), "dunk", now, &log).unwrap() else {
            panic!("expected outcome");
        };
        assert_eq!(first.kind, OutcomeKind::ShotScored);
        let notices: Vec<Notice> = log.take().into_iter().map(|(_, n)| n).collect();
        assert!(notices.contains(&Notice::Halftime { score_1: 2, score_2: 0 }));

        // team 2 is stolen from; regulation ends 2-0
        let (step, _) = c.begin_possession(v, now, &log).unwrap();
        assert_eq!(step.addressed, PlayerId(4));
        c.respond(v, step.seq, PlayerId(4), "pg_halfcourt", now, &log).unwrap();
        let open = c.live_score(v).unwrap();
        assert_eq!(open.move_count, 1);
        let defend_seq = step.seq + 1;
        let StepResult::Finished(second) = c.respond(v, defend_seq, PlayerId(3), "3-pointer", now, &log).unwrap() else {
            panic!("expected outcome");
        };
        assert_eq!(second.kind, OutcomeKind::DefenderSteal);

        let notices: Vec<Notice> = log.take().into_iter().map(|(_, n)| n).collect();
        assert!(notices.contains(&Notice::GameOver { winner: Some(TeamId::One), score_1: 2, score_2: 0 }));
        assert_eq!(c.live_score(v).unwrap().phase, Phase::Finished);
        assert!(c.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_tied_regulation_goes_to_overtime() {
        let log = NoticeLog::new();
        let config = MatchConfig { max_moves: 1, halftime_move: 1, ..MatchConfig::default() };
        let c = started(config, &log);
        let v = VenueId(1);
        let now = Utc::now();

        let (step, _) = c.begin_possession(v, now, &log).unwrap();
        let StepResult::Continue(defend) = c.respond(v, step.seq, PlayerId(1), "pg_dribble_jump", now, &log).unwrap() else {
            panic!("expected defender step");
        };
        // not in the guess vocabulary
        c.respond(v, defend.seq, PlayerId(6), "hold", now, &log).unwrap_err();
        let StepResult::Finished(steal) = c.respond(v, defend.seq, PlayerId(6), "dribble", now, &log).unwrap() else {
            panic!("expected outcome");
        };
        assert_eq!(steal.kind, OutcomeKind::DefenderSteal);

        let notices: Vec<Notice> = log.take().into_iter().map(|(_, n)| n).collect();
        assert!(notices.iter().any(|n| matches!(n, Notice::OvertimeStarted { .. })));
        let live = c.live_score(v).unwrap();
        assert_eq!(live.phase, Phase::Active);
        assert_eq!(live.move_count, 0);
    }

    #[test]
    fn test_expired_step_announces_timeout() {
        let log = NoticeLog::new();
        let c = started(MatchConfig::default(), &log);
        let v = VenueId(1);
        let now = Utc::now();

        let (step, _) = c.begin_possession(v, now, &log).unwrap();
        assert!(c.expire_step(v, now, &log).unwrap().is_none());
        let result = c.expire_step(v, step.deadline, &log).unwrap().unwrap();
        assert!(matches!(result, StepResult::Finished(ref o) if o.kind == OutcomeKind::AttackerForfeit));

        let notices: Vec<Notice> = log.take().into_iter().map(|(_, n)| n).collect();
        assert!(notices.contains(&Notice::StepTimedOut {
            player: "p1".into(),
            step: crate::engine::StepKind::AttackerChoosing
        }));
    }

    #[test]
    fn test_substitution_offer_flow() {
        let log = NoticeLog::new();
        let c = started(MatchConfig::default(), &log);
        let v = VenueId(1);

        assert!(c.request_substitution(v, PlayerId(2), TeamId::One, Position::Sg, PlayerId(70), "bench", &log).is_err());
        let offer = c.request_substitution(v, PlayerId(1), TeamId::One, Position::Sg, PlayerId(70), "bench", &log).unwrap();
        assert_eq!(offer.timeout_secs, 15);
        assert!(offer.contains("accept"));

        // the JSON-style presenter never answers, so the request stays pending
        assert_eq!(
            c.run_substitution(v, PlayerId(1), TeamId::One, Position::Ce, PlayerId(71), "bench2", &log).unwrap(),
            None
        );

        assert!(c.answer_substitution(v, PlayerId(70), true, &log).unwrap());
        assert!(!c.answer_substitution(v, PlayerId(71), false, &log).unwrap());
        assert!(matches!(c.answer_substitution(v, PlayerId(71), true, &log), Err(EngineError::NotFound(_))));

        let live = c.live_score(v).unwrap();
        let one = live.team(TeamId::One).unwrap();
        assert_eq!(one.slots[Position::Sg.index()].name.as_deref(), Some("bench"));
    }
}
