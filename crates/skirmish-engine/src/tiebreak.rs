//! The sudden-death sub-state-machine.
//!
//! ```text
//!            both chose / window elapsed
//! Choosing ───────────────────────────────▶ Resolved
//!    ▲                │ same throw
//!    │ open_round     ▼
//! Restarting ◀──── Revealing
//!         reveal delay elapsed
//! ```
//!
//! The FSM owns no timers: the room schedules the choosing window and the
//! reveal delay and calls in when they elapse. Every transition checks
//! the current stage first, so a second resolution of the same round
//! (both choices arriving in the same instant the window closes, a
//! replayed timer) finds the stage already moved on and does nothing.

use rand::Rng;
use skirmish_protocol::{BattleId, Coord, PlayerId, Throw, UnitKind};

use crate::Rejection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieStage {
    /// Waiting for secret choices.
    Choosing,
    /// A drawn round is on display.
    Revealing,
    /// Between the end of the reveal and the next round opening.
    Restarting,
    /// Decided. Terminal.
    Resolved,
}

/// The outcome of resolving one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Both threw the same; another round follows.
    Draw(Throw),
    Decided {
        attacker: Throw,
        defender: Throw,
        attacker_wins: bool,
    },
}

/// One sudden-death encounter between two units of the same type.
#[derive(Debug, Clone)]
pub struct TieBreaker {
    encounter: u64,
    round: u32,
    stage: TieStage,
    attacker_choice: Option<Throw>,
    defender_choice: Option<Throw>,
    last_draw: Option<Throw>,
    pub from: Coord,
    pub to: Coord,
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub unit_kind: UnitKind,
}

impl TieBreaker {
    /// Opens round 0 of `encounter` in the choosing stage.
    pub fn new(
        encounter: u64,
        from: Coord,
        to: Coord,
        attacker: PlayerId,
        defender: PlayerId,
        unit_kind: UnitKind,
    ) -> Self {
        Self {
            encounter,
            round: 0,
            stage: TieStage::Choosing,
            attacker_choice: None,
            defender_choice: None,
            last_draw: None,
            from,
            to,
            attacker,
            defender,
            unit_kind,
        }
    }

    pub fn battle_id(&self) -> BattleId {
        BattleId::new(self.encounter, self.round)
    }

    pub fn stage(&self) -> TieStage {
        self.stage
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// The throw both players made in the last drawn round.
    pub fn last_draw(&self) -> Option<Throw> {
        self.last_draw
    }

    /// Records a secret choice. Returns `true` once both are in.
    pub fn submit(&mut self, player: PlayerId, throw: Throw) -> Result<bool, Rejection> {
        if self.stage != TieStage::Choosing {
            return Err(Rejection::RoundClosed);
        }
        let slot = if player == self.attacker {
            &mut self.attacker_choice
        } else if player == self.defender {
            &mut self.defender_choice
        } else {
            return Err(Rejection::NotInEncounter);
        };
        if slot.is_some() {
            return Err(Rejection::AlreadyChose);
        }
        *slot = Some(throw);
        Ok(self.attacker_choice.is_some() && self.defender_choice.is_some())
    }

    /// Resolves the current round, picking uniformly at random for
    /// whoever didn't choose.
    ///
    /// Returns `None` unless the round is still choosing, which makes
    /// every resolution after the first a no-op.
    pub fn resolve(&mut self, rng: &mut impl Rng) -> Option<RoundOutcome> {
        if self.stage != TieStage::Choosing {
            return None;
        }
        let attacker = *self
            .attacker_choice
            .get_or_insert_with(|| Throw::ALL[rng.random_range(0..Throw::ALL.len())]);
        let defender = *self
            .defender_choice
            .get_or_insert_with(|| Throw::ALL[rng.random_range(0..Throw::ALL.len())]);

        if attacker == defender {
            self.stage = TieStage::Revealing;
            self.last_draw = Some(attacker);
            Some(RoundOutcome::Draw(attacker))
        } else {
            self.stage = TieStage::Resolved;
            Some(RoundOutcome::Decided {
                attacker,
                defender,
                attacker_wins: attacker.beats(defender),
            })
        }
    }

    /// Ends the reveal of a drawn round. Returns `false` if there was no
    /// reveal in progress.
    pub fn finish_reveal(&mut self) -> bool {
        if self.stage != TieStage::Revealing {
            return false;
        }
        self.stage = TieStage::Restarting;
        true
    }

    /// Opens the next round with fresh choices and a new battle id.
    pub fn open_round(&mut self) -> Option<BattleId> {
        if self.stage != TieStage::Restarting {
            return None;
        }
        self.round += 1;
        self.attacker_choice = None;
        self.defender_choice = None;
        self.stage = TieStage::Choosing;
        Some(self.battle_id())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    const ATT: PlayerId = PlayerId(1);
    const DEF: PlayerId = PlayerId(2);

    fn tie() -> TieBreaker {
        TieBreaker::new(
            9,
            Coord::new(3, 2).unwrap(),
            Coord::new(2, 2).unwrap(),
            ATT,
            DEF,
            UnitKind::Rock,
        )
    }

    #[test]
    fn test_decided_round() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut tb = tie();
        assert_eq!(tb.submit(ATT, Throw::Paper), Ok(false));
        assert_eq!(tb.submit(DEF, Throw::Rock), Ok(true));
        assert_eq!(
            tb.resolve(&mut rng),
            Some(RoundOutcome::Decided {
                attacker: Throw::Paper,
                defender: Throw::Rock,
                attacker_wins: true,
            })
        );
        assert_eq!(tb.stage(), TieStage::Resolved);
    }

    #[test]
    fn test_second_resolution_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut tb = tie();
        tb.submit(ATT, Throw::Scissors).unwrap();
        tb.submit(DEF, Throw::Rock).unwrap();
        assert!(tb.resolve(&mut rng).is_some());
        assert_eq!(tb.resolve(&mut rng), None);
        assert_eq!(tb.submit(ATT, Throw::Rock), Err(Rejection::RoundClosed));
    }

    #[test]
    fn test_draw_reveal_restart_cycle() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut tb = tie();
        assert_eq!(tb.battle_id(), BattleId::new(9, 0));
        tb.submit(ATT, Throw::Rock).unwrap();
        tb.submit(DEF, Throw::Rock).unwrap();
        assert_eq!(tb.resolve(&mut rng), Some(RoundOutcome::Draw(Throw::Rock)));
        assert_eq!(tb.stage(), TieStage::Revealing);
        assert_eq!(tb.last_draw(), Some(Throw::Rock));

        assert_eq!(tb.open_round(), None, "cannot skip the reveal");
        assert!(tb.finish_reveal());
        assert!(!tb.finish_reveal());
        assert_eq!(tb.stage(), TieStage::Restarting);

        assert_eq!(tb.open_round(), Some(BattleId::new(9, 1)));
        assert_eq!(tb.stage(), TieStage::Choosing);
        assert_eq!(tb.submit(ATT, Throw::Paper), Ok(false), "choices were cleared");
    }

    #[test]
    fn test_choices_are_single_shot_and_participants_only() {
        let mut tb = tie();
        tb.submit(DEF, Throw::Paper).unwrap();
        assert_eq!(tb.submit(DEF, Throw::Rock), Err(Rejection::AlreadyChose));
        assert_eq!(tb.submit(PlayerId(3), Throw::Rock), Err(Rejection::NotInEncounter));
    }

    #[test]
    fn test_missing_choices_are_filled_at_random() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tb = tie();
        tb.submit(ATT, Throw::Rock).unwrap();
        let outcome = tb.resolve(&mut rng).unwrap();
        match outcome {
            RoundOutcome::Draw(t) => assert_eq!(t, Throw::Rock),
            RoundOutcome::Decided { attacker, .. } => assert_eq!(attacker, Throw::Rock),
        }
    }
}
