//! The board: units on a 6×6 grid and what each viewer may see of it.

use skirmish_protocol::{
    BoardView, CellKind, CellView, Coord, GRID_SIZE, PlayerId, Side, UnitId, UnitKind,
};

/// A unit on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: UnitId,
    pub kind: UnitKind,
    pub owner: PlayerId,
    pub side: Side,
    /// Once `true`, the opponent sees this unit's type. Never goes back.
    pub revealed: bool,
}

impl Unit {
    /// The cell as `viewer` may see it: the type is masked for an
    /// unrevealed opposing unit.
    pub fn view_for(&self, viewer: PlayerId) -> CellView {
        let kind = if self.owner == viewer || self.revealed {
            CellKind::from(self.kind)
        } else {
            CellKind::Hidden
        };
        CellView {
            id: self.id,
            kind,
            owner: self.owner,
            side: self.side,
            revealed: self.revealed,
        }
    }
}

/// How many units of each type one player has on the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Composition {
    pub flags: usize,
    pub traps: usize,
    pub rock: usize,
    pub paper: usize,
    pub scissors: usize,
}

impl Composition {
    pub fn fighters(&self) -> usize {
        self.rock + self.paper + self.scissors
    }

    pub fn total(&self) -> usize {
        self.flags + self.traps + self.fighters()
    }

    pub fn count(&self, kind: UnitKind) -> usize {
        match kind {
            UnitKind::Rock => self.rock,
            UnitKind::Paper => self.paper,
            UnitKind::Scissors => self.scissors,
            UnitKind::Flag => self.flags,
            UnitKind::Trap => self.traps,
        }
    }

    fn add(&mut self, kind: UnitKind) {
        match kind {
            UnitKind::Rock => self.rock += 1,
            UnitKind::Paper => self.paper += 1,
            UnitKind::Scissors => self.scissors += 1,
            UnitKind::Flag => self.flags += 1,
            UnitKind::Trap => self.traps += 1,
        }
    }
}

/// The 6×6 grid. Each cell holds at most one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    cells: [[Option<Unit>; GRID_SIZE]; GRID_SIZE],
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, at: Coord) -> Option<&Unit> {
        self.cells[at.row][at.col].as_ref()
    }

    pub fn get_mut(&mut self, at: Coord) -> Option<&mut Unit> {
        self.cells[at.row][at.col].as_mut()
    }

    pub fn is_empty(&self, at: Coord) -> bool {
        self.get(at).is_none()
    }

    /// Puts `unit` at `at`, returning whatever was there.
    pub fn put(&mut self, at: Coord, unit: Unit) -> Option<Unit> {
        self.cells[at.row][at.col].replace(unit)
    }

    pub fn take(&mut self, at: Coord) -> Option<Unit> {
        self.cells[at.row][at.col].take()
    }

    /// Moves the unit at `from` onto `to`, discarding anything at `to`.
    /// Does nothing if `from` is empty.
    pub fn relocate(&mut self, from: Coord, to: Coord) {
        if let Some(unit) = self.take(from) {
            self.put(to, unit);
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// All units with their positions, row-major.
    pub fn units(&self) -> impl Iterator<Item = (Coord, &Unit)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .filter_map(move |(col, cell)| cell.as_ref().map(|u| (Coord { row, col }, u)))
        })
    }

    /// Units belonging to `owner`.
    pub fn units_of(&self, owner: PlayerId) -> impl Iterator<Item = (Coord, &Unit)> + '_ {
        self.units().filter(move |(_, u)| u.owner == owner)
    }

    pub fn composition(&self, owner: PlayerId) -> Composition {
        let mut comp = Composition::default();
        for (_, unit) in self.units_of(owner) {
            comp.add(unit.kind);
        }
        comp
    }

    /// Rock, paper and scissors units `owner` still has.
    pub fn mobile_count(&self, owner: PlayerId) -> usize {
        self.units_of(owner).filter(|(_, u)| u.kind.is_mobile()).count()
    }

    /// The in-game view for `viewer`: every unit is visible as a unit,
    /// but unrevealed opposing units show up as [`CellKind::Hidden`].
    pub fn view_for(&self, viewer: PlayerId) -> BoardView {
        self.build_view(|unit| Some(unit.view_for(viewer)))
    }

    /// The setup view for `viewer`: opposing units are left out
    /// entirely, so not even their positions leak while armies are
    /// being arranged.
    pub fn setup_view_for(&self, viewer: PlayerId) -> BoardView {
        self.build_view(|unit| (unit.owner == viewer).then(|| unit.view_for(viewer)))
    }

    fn build_view(&self, mut f: impl FnMut(&Unit) -> Option<CellView>) -> BoardView {
        BoardView(
            self.cells
                .iter()
                .map(|row| row.iter().map(|cell| cell.as_ref().and_then(&mut f)).collect())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: PlayerId = PlayerId(1);
    const BOB: PlayerId = PlayerId(2);

    fn at(row: usize, col: usize) -> Coord {
        Coord::new(row, col).unwrap()
    }

    fn unit(id: u32, kind: UnitKind, owner: PlayerId, side: Side) -> Unit {
        Unit { id: UnitId(id), kind, owner, side, revealed: false }
    }

    fn sample() -> Grid {
        let mut grid = Grid::new();
        grid.put(at(4, 0), unit(1, UnitKind::Rock, ALICE, Side::Bottom));
        grid.put(at(5, 0), unit(2, UnitKind::Flag, ALICE, Side::Bottom));
        grid.put(at(1, 0), unit(3, UnitKind::Scissors, BOB, Side::Top));
        grid.put(at(0, 0), unit(4, UnitKind::Trap, BOB, Side::Top));
        grid
    }

    #[test]
    fn test_view_hides_unrevealed_opponents() {
        let grid = sample();
        let view = grid.view_for(ALICE);
        assert_eq!(view.cell(at(4, 0)).unwrap().kind, CellKind::Rock);
        assert_eq!(view.cell(at(1, 0)).unwrap().kind, CellKind::Hidden);
        assert_eq!(view.cell(at(1, 0)).unwrap().owner, BOB);
        assert_eq!(view.occupied(), 4);
    }

    #[test]
    fn test_view_shows_revealed_opponents() {
        let mut grid = sample();
        grid.get_mut(at(1, 0)).unwrap().revealed = true;
        let view = grid.view_for(ALICE);
        let cell = view.cell(at(1, 0)).unwrap();
        assert_eq!(cell.kind, CellKind::Scissors);
        assert!(cell.revealed);
    }

    #[test]
    fn test_setup_view_omits_opponents_entirely() {
        let grid = sample();
        let view = grid.setup_view_for(BOB);
        assert!(view.cell(at(4, 0)).is_none());
        assert!(view.cell(at(5, 0)).is_none());
        assert_eq!(view.cell(at(0, 0)).unwrap().kind, CellKind::Trap);
        assert_eq!(view.occupied(), 2);
    }

    #[test]
    fn test_composition_and_mobility() {
        let grid = sample();
        let comp = grid.composition(ALICE);
        assert_eq!(comp.flags, 1);
        assert_eq!(comp.rock, 1);
        assert_eq!(comp.total(), 2);
        assert_eq!(grid.mobile_count(ALICE), 1);
        assert_eq!(grid.mobile_count(BOB), 1);
    }

    #[test]
    fn test_relocate_overwrites_target() {
        let mut grid = sample();
        grid.relocate(at(4, 0), at(5, 0));
        assert!(grid.is_empty(at(4, 0)));
        assert_eq!(grid.get(at(5, 0)).unwrap().kind, UnitKind::Rock);
    }
}
