//! The Combat Resolver: what happens when a unit moves onto an enemy.
//!
//! [`resolve`] is a pure function of the two unit types. A trap kills any
//! attacker; a trap never attacks because it never moves.

use skirmish_protocol::{CombatReport, CombatResult, UnitKind};

/// Result of one encounter on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encounter {
    /// The attacker stepped onto the defender's flag. Ends the match.
    FlagCaptured,
    /// The attacker is destroyed; the trap stays and is revealed.
    TrapKills,
    /// The defender is destroyed and the attacker takes its cell.
    AttackerWins,
    /// The attacker is destroyed; the defender stays.
    DefenderWins,
    /// Same fighter type on both sides. Opens a sudden-death tie-breaker.
    Standoff,
}

impl Encounter {
    /// The wire result for a decided encounter. `None` for the two
    /// outcomes that never produce a combat event.
    pub fn result(self) -> Option<CombatResult> {
        match self {
            Self::TrapKills => Some(CombatResult::TrapKills),
            Self::AttackerWins => Some(CombatResult::AttackerWins),
            Self::DefenderWins => Some(CombatResult::DefenderWins),
            Self::FlagCaptured | Self::Standoff => None,
        }
    }
}

/// Resolves an attack by `attacker` on `defender`.
///
/// The attacker is always a fighter in a legal game; flags and traps
/// can't move.
pub fn resolve(attacker: UnitKind, defender: UnitKind) -> Encounter {
    match defender {
        UnitKind::Flag => Encounter::FlagCaptured,
        UnitKind::Trap => Encounter::TrapKills,
        _ if attacker == defender => Encounter::Standoff,
        _ if attacker.beats(defender) => Encounter::AttackerWins,
        _ => Encounter::DefenderWins,
    }
}

/// Builds the reveal payload for a decided encounter.
pub fn report(attacker: UnitKind, defender: UnitKind, result: CombatResult) -> CombatReport {
    CombatReport { attacker_kind: attacker, defender_kind: defender, result }
}

#[cfg(test)]
mod tests {
    use super::*;
    use UnitKind::*;

    #[test]
    fn test_flag_is_always_captured() {
        for attacker in UnitKind::FIGHTERS {
            assert_eq!(resolve(attacker, Flag), Encounter::FlagCaptured);
        }
    }

    #[test]
    fn test_trap_kills_every_attacker() {
        for attacker in UnitKind::FIGHTERS {
            assert_eq!(resolve(attacker, Trap), Encounter::TrapKills);
        }
    }

    #[test]
    fn test_same_type_is_a_standoff() {
        for kind in UnitKind::FIGHTERS {
            assert_eq!(resolve(kind, kind), Encounter::Standoff);
        }
    }

    #[test]
    fn test_advantage_cycle() {
        assert_eq!(resolve(Rock, Scissors), Encounter::AttackerWins);
        assert_eq!(resolve(Scissors, Paper), Encounter::AttackerWins);
        assert_eq!(resolve(Paper, Rock), Encounter::AttackerWins);
        assert_eq!(resolve(Scissors, Rock), Encounter::DefenderWins);
        assert_eq!(resolve(Paper, Scissors), Encounter::DefenderWins);
        assert_eq!(resolve(Rock, Paper), Encounter::DefenderWins);
    }

    #[test]
    fn test_only_decided_encounters_have_a_wire_result() {
        assert_eq!(Encounter::TrapKills.result(), Some(CombatResult::TrapKills));
        assert_eq!(Encounter::Standoff.result(), None);
        assert_eq!(Encounter::FlagCaptured.result(), None);
    }
}
