//! Setup Coordinator rules: where a player may place, how many of each
//! type, and the auto-fill used by `randomize` and the setup timeout.

use rand::Rng;
use rand::seq::SliceRandom;
use skirmish_protocol::{Coord, GRID_SIZE, PlayerId, Side, UnitKind};

use crate::{Composition, Grid, Rejection};

pub const FLAGS_PER_ARMY: usize = 1;
pub const TRAPS_PER_ARMY: usize = 1;
pub const FIGHTERS_PER_ARMY: usize = 10;
pub const ARMY_SIZE: usize = FLAGS_PER_ARMY + TRAPS_PER_ARMY + FIGHTERS_PER_ARMY;

/// The twelve cells a player of `side` places units on.
pub fn setup_cells(side: Side) -> impl Iterator<Item = Coord> {
    side.setup_rows()
        .into_iter()
        .flat_map(|row| (0..GRID_SIZE).map(move |col| Coord { row, col }))
}

pub fn is_setup_cell(side: Side, at: Coord) -> bool {
    side.setup_rows().contains(&at.row)
}

/// Whether one more unit of `kind` fits the quotas.
pub fn check_quota(comp: &Composition, kind: UnitKind) -> Result<(), Rejection> {
    let fits = match kind {
        UnitKind::Flag => comp.flags < FLAGS_PER_ARMY,
        UnitKind::Trap => comp.traps < TRAPS_PER_ARMY,
        _ => comp.fighters() < FIGHTERS_PER_ARMY,
    };
    if fits && comp.total() < ARMY_SIZE {
        Ok(())
    } else {
        Err(Rejection::QuotaExceeded(kind))
    }
}

/// Exactly one flag, one trap and ten fighters.
pub fn is_complete(comp: &Composition) -> bool {
    comp.flags == FLAGS_PER_ARMY
        && comp.traps == TRAPS_PER_ARMY
        && comp.fighters() == FIGHTERS_PER_ARMY
}

pub fn check_placement(
    grid: &Grid,
    owner: PlayerId,
    side: Side,
    at: Coord,
    kind: UnitKind,
) -> Result<(), Rejection> {
    if !is_setup_cell(side, at) {
        return Err(Rejection::NotOwnSetupCell(at));
    }
    if !grid.is_empty(at) {
        return Err(Rejection::CellOccupied(at));
    }
    check_quota(&grid.composition(owner), kind)
}

pub fn check_removal(grid: &Grid, owner: PlayerId, side: Side, at: Coord) -> Result<(), Rejection> {
    if !is_setup_cell(side, at) {
        return Err(Rejection::NotOwnSetupCell(at));
    }
    match grid.get(at) {
        Some(unit) if unit.owner == owner => Ok(()),
        _ => Err(Rejection::NoOwnUnit(at)),
    }
}

/// Plans placements that complete `owner`'s army.
///
/// The missing flag and trap come first, then the missing fighters split
/// as evenly as possible across rock, paper and scissors (which types get
/// the remainder is random). Target cells are a random selection of the
/// player's empty setup cells. Units already placed are never touched.
pub fn autofill_plan(
    grid: &Grid,
    owner: PlayerId,
    side: Side,
    rng: &mut impl Rng,
) -> Vec<(Coord, UnitKind)> {
    let comp = grid.composition(owner);

    let mut kinds = Vec::with_capacity(ARMY_SIZE);
    kinds.extend(std::iter::repeat_n(
        UnitKind::Flag,
        FLAGS_PER_ARMY.saturating_sub(comp.flags),
    ));
    kinds.extend(std::iter::repeat_n(
        UnitKind::Trap,
        TRAPS_PER_ARMY.saturating_sub(comp.traps),
    ));

    let missing = FIGHTERS_PER_ARMY.saturating_sub(comp.fighters());
    let mut order = UnitKind::FIGHTERS;
    order.shuffle(rng);
    let (base, extra) = (missing / order.len(), missing % order.len());
    for (i, kind) in order.into_iter().enumerate() {
        let n = base + usize::from(i < extra);
        kinds.extend(std::iter::repeat_n(kind, n));
    }

    let mut empty: Vec<Coord> = setup_cells(side).filter(|c| grid.is_empty(*c)).collect();
    empty.shuffle(rng);
    empty.into_iter().zip(kinds).collect()
}
