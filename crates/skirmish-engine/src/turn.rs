//! Turn Engine rules: move validation, legal-move enumeration, the
//! random move made for a stalled player and the terminal check.

use rand::Rng;
use rand::seq::IndexedRandom;
use skirmish_protocol::{Coord, PlayerId};

use crate::{Grid, Rejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Coord,
    pub to: Coord,
}

/// Checks a move by `player` against the board. Phase and turn order are
/// the caller's business.
pub fn check_move(grid: &Grid, player: PlayerId, from: Coord, to: Coord) -> Result<(), Rejection> {
    let unit = match grid.get(from) {
        Some(unit) if unit.owner == player => unit,
        _ => return Err(Rejection::NoOwnUnit(from)),
    };
    if !unit.kind.is_mobile() {
        return Err(Rejection::Immobile(unit.kind));
    }
    if !from.is_adjacent(to) {
        return Err(Rejection::NotAdjacent { from, to });
    }
    if grid.get(to).is_some_and(|u| u.owner == player) {
        return Err(Rejection::OwnUnitAtTarget(to));
    }
    Ok(())
}

/// Every move `player` could legally make: one orthogonal step by a
/// mobile unit onto an empty or enemy cell.
pub fn legal_moves(grid: &Grid, player: PlayerId) -> Vec<Move> {
    grid.units_of(player)
        .filter(|(_, unit)| unit.kind.is_mobile())
        .flat_map(|(from, _)| {
            from.neighbours()
                .into_iter()
                .filter(move |to| grid.get(*to).is_none_or(|u| u.owner != player))
                .map(move |to| Move { from, to })
        })
        .collect()
}

/// Picks one of `player`'s legal moves uniformly at random.
pub fn random_move(grid: &Grid, player: PlayerId, rng: &mut impl Rng) -> Option<Move> {
    legal_moves(grid, player).choose(rng).copied()
}

/// Who wins because someone ran out of mobile units, if anyone.
///
/// `mover` is the player whose action just changed the board. If both
/// sides are out at once the mover wins.
pub fn exhaustion_winner(grid: &Grid, mover: PlayerId, opponent: PlayerId) -> Option<PlayerId> {
    let mover_out = grid.mobile_count(mover) == 0;
    let opponent_out = grid.mobile_count(opponent) == 0;
    match (mover_out, opponent_out) {
        (_, true) => Some(mover),
        (true, false) => Some(opponent),
        (false, false) => None,
    }
}
