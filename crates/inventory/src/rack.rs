//! Storage rack: fixed-size grid of cells, each holding at most one bottle.

use std::collections::BTreeMap;

use cellar_core::{BottleId, DomainError, DomainResult};

use crate::bottle::{BottleRecord, Position};

/// Size of the rack. Defaults to 4 columns × 6 rows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RackDimensions {
    columns: u16,
    rows: u16,
}

impl Default for RackDimensions {
    fn default() -> Self {
        Self { columns: 4, rows: 6 }
    }
}

impl RackDimensions {
    pub fn new(columns: u16, rows: u16) -> DomainResult<Self> {
        if columns == 0 || rows == 0 {
            return Err(DomainError::validation(format!(
                "rack dimensions must be non-zero (columns: {columns}, rows: {rows})"
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn capacity(&self) -> usize {
        usize::from(self.columns) * usize::from(self.rows)
    }

    pub fn contains(&self, position: Position) -> bool {
        (1..=self.rows).contains(&position.row) && (1..=self.columns).contains(&position.col)
    }

    pub fn ensure_contains(&self, position: Position) -> DomainResult<()> {
        if self.contains(position) {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "cell {position} is outside the {}x{} rack",
                self.columns, self.rows
            )))
        }
    }

    /// All cells, row-major from (1,1).
    pub fn cells(&self) -> impl Iterator<Item = Position> + use<> {
        let columns = self.columns;
        (1..=self.rows).flat_map(move |row| (1..=columns).map(move |col| Position::new(row, col)))
    }
}

/// A cell claimed by more than one record. The later record (in scan order) wins.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Collision {
    pub position: Position,
    pub occupant: BottleId,
    pub shadowed: BottleId,
}

/// Outcome of planning a move of `bottle` into `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementPlan {
    pub bottle: BottleId,
    pub target: Position,
    /// Every other bottle claiming `target`, in scan order; all must be cleared first.
    pub displaced: Vec<BottleId>,
    /// The bottle already sits in `target`; nothing to do.
    pub unchanged: bool,
}

/// Sparse cell → bottle mapping derived from a collection in a single scan.
#[derive(Debug, Clone)]
pub struct RackOccupancy<'a> {
    dimensions: RackDimensions,
    cells: BTreeMap<Position, &'a BottleRecord>,
    collisions: Vec<Collision>,
    out_of_rack: Vec<BottleId>,
}

impl<'a> RackOccupancy<'a> {
    pub fn build(dimensions: RackDimensions, bottles: &'a [BottleRecord]) -> Self {
        let mut cells = BTreeMap::new();
        let mut collisions = Vec::new();
        let mut out_of_rack = Vec::new();

        for bottle in bottles {
            let Some(position) = bottle.position() else {
                continue;
            };
            if !dimensions.contains(position) {
                out_of_rack.push(bottle.id());
                continue;
            }
            if let Some(previous) = cells.insert(position, bottle) {
                collisions.push(Collision {
                    position,
                    occupant: bottle.id(),
                    shadowed: previous.id(),
                });
            }
        }

        Self {
            dimensions,
            cells,
            collisions,
            out_of_rack,
        }
    }

    pub fn dimensions(&self) -> RackDimensions {
        self.dimensions
    }

    pub fn occupant_at(&self, row: u16, col: u16) -> Option<&'a BottleRecord> {
        self.occupant(Position::new(row, col))
    }

    pub fn occupant(&self, position: Position) -> Option<&'a BottleRecord> {
        self.cells.get(&position).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Occupied cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &'a BottleRecord)> + '_ {
        self.cells.iter().map(|(p, b)| (*p, *b))
    }

    pub fn free_cells(&self) -> impl Iterator<Item = Position> + '_ {
        self.dimensions
            .cells()
            .filter(|p| !self.cells.contains_key(p))
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    /// Records whose stored position lies outside the rack; they are not mapped.
    pub fn out_of_rack(&self) -> &[BottleId] {
        &self.out_of_rack
    }

    /// Bottles claiming `position`: shadowed ones in scan order, then the occupant.
    pub fn claimants(&self, position: Position) -> Vec<BottleId> {
        self.collisions
            .iter()
            .filter(|c| c.position == position)
            .map(|c| c.shadowed)
            .chain(self.occupant(position).map(|b| b.id()))
            .collect()
    }

    /// Work out what moving `bottle` into `target` entails.
    ///
    /// A cell that already holds several bottles has all of them displaced.
    pub fn plan_placement(
        &self,
        bottle: BottleId,
        target: Position,
    ) -> DomainResult<PlacementPlan> {
        self.dimensions.ensure_contains(target)?;

        let claimants = self.claimants(target);
        let unchanged = claimants == [bottle];
        Ok(PlacementPlan {
            bottle,
            target,
            displaced: claimants.into_iter().filter(|id| *id != bottle).collect(),
            unchanged,
        })
    }

    /// Text grid: one line per row, occupied cells show the bottle id.
    pub fn render(&self) -> String {
        let mut out = String::from("    ");
        for col in 1..=self.dimensions.columns {
            out.push_str(&format!("{col:>5}"));
        }
        out.push('\n');

        for row in 1..=self.dimensions.rows {
            out.push_str(&format!("{row:>3} "));
            for col in 1..=self.dimensions.columns {
                match self.occupant_at(row, col) {
                    Some(b) => out.push_str(&format!("{:>5}", format!("#{}", b.id()))),
                    None => out.push_str(&format!("{:>5}", ".")),
                }
            }
            out.push('\n');
        }
        out
    }
}

/// What a click on a rack cell should do.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RackIntent {
    /// The occupant of the clicked cell became the selection.
    Select(BottleId),
    /// The selected bottle must be moved into the clicked cell.
    Move { bottle: BottleId, to: Position },
    /// Nothing selected and the clicked cell is empty.
    Ignore,
}

/// Selection-for-move state of the rack.
///
/// The selection survives a move, so consecutive clicks keep moving the same bottle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RackSelection {
    selected: Option<BottleId>,
}

impl RackSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<BottleId> {
        self.selected
    }

    pub fn select(&mut self, bottle: BottleId) {
        self.selected = Some(bottle);
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn click(&mut self, target: Position, occupancy: &RackOccupancy<'_>) -> RackIntent {
        match self.selected {
            Some(bottle) => RackIntent::Move { bottle, to: target },
            None => match occupancy.occupant(target) {
                Some(occupant) => {
                    self.selected = Some(occupant.id());
                    RackIntent::Select(occupant.id())
                }
                None => RackIntent::Ignore,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(raw: &[i64]) -> Vec<BottleId> {
        raw.iter().copied().map(BottleId::new).collect()
    }

    fn bottle(id: i64, position: Option<(u16, u16)>) -> BottleRecord {
        BottleRecord::new(BottleId::new(id), format!("Wine {id}"), 2000)
            .unwrap()
            .with_position(position.map(|(r, c)| Position::new(r, c)))
    }

    #[test]
    fn default_rack_is_four_by_six() {
        let rack = RackDimensions::default();
        assert_eq!((rack.columns(), rack.rows()), (4, 6));
        assert_eq!(rack.capacity(), 24);
        assert_eq!(rack.cells().count(), 24);
        assert_eq!(rack.cells().next(), Some(Position::new(1, 1)));
        assert_eq!(rack.cells().nth(4), Some(Position::new(2, 1)));
    }

    #[test]
    fn zero_sized_rack_is_rejected() {
        assert!(RackDimensions::new(0, 6).is_err());
        assert!(RackDimensions::new(3, 3).is_ok());
    }

    #[test]
    fn only_fully_positioned_bottles_are_mapped() {
        let bottles = vec![bottle(1, Some((2, 1))), bottle(2, None), bottle(3, Some((6, 4)))];
        let occ = RackOccupancy::build(RackDimensions::default(), &bottles);

        assert_eq!(occ.len(), 2);
        assert_eq!(occ.occupant_at(2, 1).map(|b| b.id()), Some(BottleId::new(1)));
        assert_eq!(occ.occupant_at(6, 4).map(|b| b.id()), Some(BottleId::new(3)));
        assert!(occ.occupant_at(1, 1).is_none());
        assert_eq!(occ.free_cells().count(), 22);
        assert!(occ.collisions().is_empty());
    }

    #[test]
    fn out_of_rack_positions_are_reported_not_mapped() {
        let bottles = vec![bottle(1, Some((7, 1))), bottle(2, Some((1, 5)))];
        let occ = RackOccupancy::build(RackDimensions::default(), &bottles);

        assert!(occ.is_empty());
        assert_eq!(occ.out_of_rack(), &[BottleId::new(1), BottleId::new(2)]);
    }

    #[test]
    fn dual_occupancy_is_reported_and_last_wins() {
        let bottles = vec![bottle(1, Some((3, 3))), bottle(2, Some((3, 3)))];
        let occ = RackOccupancy::build(RackDimensions::default(), &bottles);

        assert_eq!(occ.occupant_at(3, 3).map(|b| b.id()), Some(BottleId::new(2)));
        assert_eq!(
            occ.collisions(),
            &[Collision {
                position: Position::new(3, 3),
                occupant: BottleId::new(2),
                shadowed: BottleId::new(1),
            }]
        );
    }

    #[test]
    fn plan_names_displaced_occupant() {
        let bottles = vec![bottle(1, Some((1, 1))), bottle(2, None)];
        let occ = RackOccupancy::build(RackDimensions::default(), &bottles);

        let plan = occ.plan_placement(BottleId::new(2), Position::new(1, 1)).unwrap();
        assert_eq!(plan.displaced, [BottleId::new(1)]);
        assert!(!plan.unchanged);

        let same = occ.plan_placement(BottleId::new(1), Position::new(1, 1)).unwrap();
        assert!(same.displaced.is_empty());
        assert!(same.unchanged);

        let empty = occ.plan_placement(BottleId::new(2), Position::new(4, 2)).unwrap();
        assert!(empty.displaced.is_empty());

        assert!(occ.plan_placement(BottleId::new(2), Position::new(0, 1)).is_err());
    }

    #[test]
    fn plan_displaces_every_bottle_in_a_shared_cell() {
        let bottles = vec![
            bottle(1, Some((1, 1))),
            bottle(2, Some((1, 1))),
            bottle(3, None),
            bottle(4, Some((1, 1))),
        ];
        let occ = RackOccupancy::build(RackDimensions::default(), &bottles);
        let cell = Position::new(1, 1);

        assert_eq!(occ.claimants(cell), ids(&[1, 2, 4]));

        let plan = occ.plan_placement(BottleId::new(3), cell).unwrap();
        assert_eq!(plan.displaced, ids(&[1, 2, 4]));
        assert!(!plan.unchanged);

        // Already in the cell but sharing it: the others still have to go.
        let shared = occ.plan_placement(BottleId::new(2), cell).unwrap();
        assert_eq!(shared.displaced, ids(&[1, 4]));
        assert!(!shared.unchanged);
    }

    #[test]
    fn selection_protocol() {
        let bottles = vec![bottle(1, Some((1, 1))), bottle(2, Some((2, 2)))];
        let occ = RackOccupancy::build(RackDimensions::default(), &bottles);
        let mut selection = RackSelection::new();

        assert_eq!(selection.click(Position::new(5, 1), &occ), RackIntent::Ignore);
        assert_eq!(selection.selected(), None);

        assert_eq!(
            selection.click(Position::new(1, 1), &occ),
            RackIntent::Select(BottleId::new(1))
        );
        assert_eq!(selection.selected(), Some(BottleId::new(1)));

        // Occupied target: still a move of the selected bottle.
        assert_eq!(
            selection.click(Position::new(2, 2), &occ),
            RackIntent::Move { bottle: BottleId::new(1), to: Position::new(2, 2) }
        );
        assert_eq!(selection.selected(), Some(BottleId::new(1)));

        selection.clear();
        assert_eq!(selection.click(Position::new(3, 3), &occ), RackIntent::Ignore);
    }

    #[test]
    fn render_marks_occupied_cells() {
        let bottles = vec![bottle(12, Some((1, 2)))];
        let occ = RackOccupancy::build(RackDimensions::new(2, 2).unwrap(), &bottles);
        let grid = occ.render();

        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("#12"));
        assert!(!lines[2].contains('#'));
    }

    proptest! {
        /// Property: without collisions, every mapped cell holds a distinct bottle
        /// and every in-rack positioned bottle is mapped.
        #[test]
        fn occupancy_is_one_bottle_per_cell(
            cells in prop::collection::btree_set((1u16..=6, 1u16..=4), 0..24)
        ) {
            let bottles: Vec<BottleRecord> = cells
                .iter()
                .enumerate()
                .map(|(i, cell)| bottle(i as i64 + 1, Some(*cell)))
                .collect();
            let occ = RackOccupancy::build(RackDimensions::default(), &bottles);

            prop_assert!(occ.collisions().is_empty());
            prop_assert_eq!(occ.len(), bottles.len());

            let mut seen = std::collections::HashSet::new();
            for (_, b) in occ.iter() {
                prop_assert!(seen.insert(b.id()));
            }
        }
    }
}
