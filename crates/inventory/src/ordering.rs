//! Sorted projection of the inventory for display.

use core::cmp::Ordering;
use core::str::FromStr;

use cellar_core::DomainError;

use crate::bottle::BottleRecord;

/// Column a listing can be sorted by.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    Id,
    Name,
    #[default]
    Year,
}

impl FromStr for SortKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(SortKey::Id),
            "name" => Ok(SortKey::Name),
            "year" => Ok(SortKey::Year),
            other => Err(DomainError::validation(format!("unknown sort key: {other:?}"))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Current sort selection of a listing. Defaults to year, ascending.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct SortState {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Selecting the current key flips the direction; a new key starts ascending.
    pub fn toggle(self, key: SortKey) -> Self {
        if self.key == key {
            Self {
                key,
                direction: self.direction.flipped(),
            }
        } else {
            Self {
                key,
                direction: SortDirection::Ascending,
            }
        }
    }
}

/// Derive an ordered view of `bottles` without touching the source slice.
///
/// Ascending order is a stable sort; descending is the exact reverse of it.
pub fn sorted(bottles: &[BottleRecord], state: SortState) -> Vec<&BottleRecord> {
    let mut view: Vec<&BottleRecord> = bottles.iter().collect();
    view.sort_by(|a, b| compare(a, b, state.key));
    if state.direction == SortDirection::Descending {
        view.reverse();
    }
    view
}

fn compare(a: &BottleRecord, b: &BottleRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Id => a.id().cmp(&b.id()),
        SortKey::Year => a.year().cmp(&b.year()),
        SortKey::Name => a.name().to_lowercase().cmp(&b.name().to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellar_core::BottleId;
    use proptest::prelude::*;

    fn bottle(id: i64, name: &str, year: i32) -> BottleRecord {
        BottleRecord::new(BottleId::new(id), name, year).unwrap()
    }

    fn ids(view: &[&BottleRecord]) -> Vec<i64> {
        view.iter().map(|b| b.id().get()).collect()
    }

    #[test]
    fn toggle_flips_same_key_and_resets_on_new_key() {
        let state = SortState::default();
        assert_eq!(state, SortState::new(SortKey::Year, SortDirection::Ascending));

        let flipped = state.toggle(SortKey::Year);
        assert_eq!(flipped.direction, SortDirection::Descending);

        let back = flipped.toggle(SortKey::Year);
        assert_eq!(back.direction, SortDirection::Ascending);

        let by_name = flipped.toggle(SortKey::Name);
        assert_eq!(by_name, SortState::new(SortKey::Name, SortDirection::Ascending));
    }

    #[test]
    fn name_sort_ignores_case() {
        let bottles = vec![
            bottle(1, "zinfandel", 2018),
            bottle(2, "Merlot", 2016),
            bottle(3, "chablis", 2019),
        ];

        let view = sorted(&bottles, SortState::new(SortKey::Name, SortDirection::Ascending));
        assert_eq!(ids(&view), vec![3, 2, 1]);
    }

    #[test]
    fn ties_keep_source_order() {
        let bottles = vec![
            bottle(5, "A", 2015),
            bottle(2, "B", 2012),
            bottle(9, "C", 2015),
            bottle(1, "D", 2015),
        ];

        let view = sorted(&bottles, SortState::default());
        assert_eq!(ids(&view), vec![2, 5, 9, 1]);
    }

    #[test]
    fn source_is_not_mutated() {
        let bottles = vec![bottle(3, "C", 2001), bottle(1, "A", 2003), bottle(2, "B", 2002)];
        let before = bottles.clone();

        let _ = sorted(&bottles, SortState::new(SortKey::Id, SortDirection::Descending));
        assert_eq!(bottles, before);
    }

    #[test]
    fn parses_sort_keys() {
        assert_eq!("NAME".parse::<SortKey>().unwrap(), SortKey::Name);
        assert!("rating".parse::<SortKey>().is_err());
    }

    fn arb_bottles() -> impl Strategy<Value = Vec<BottleRecord>> {
        prop::collection::vec(("[a-zA-Z]{1,6}", 1990i32..2000), 0..24).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (name, year))| bottle(i as i64 + 1, &name, year))
                .collect()
        })
    }

    proptest! {
        /// Property: descending by year is exactly the reverse of ascending by year.
        #[test]
        fn toggling_year_reverses_sequence(bottles in arb_bottles()) {
            let asc = SortState::new(SortKey::Year, SortDirection::Ascending);
            let desc = asc.toggle(SortKey::Year);

            let mut forward = ids(&sorted(&bottles, asc));
            forward.reverse();
            prop_assert_eq!(forward, ids(&sorted(&bottles, desc)));
        }

        /// Property: deriving twice from identical inputs yields identical output.
        #[test]
        fn derivation_is_pure(bottles in arb_bottles(), key in prop_oneof![
            Just(SortKey::Id), Just(SortKey::Name), Just(SortKey::Year)
        ]) {
            let state = SortState::new(key, SortDirection::Ascending);
            prop_assert_eq!(ids(&sorted(&bottles, state)), ids(&sorted(&bottles, state)));
        }

        /// Property: equal years keep their relative source order.
        #[test]
        fn year_sort_is_stable(bottles in arb_bottles()) {
            let view = sorted(&bottles, SortState::default());
            for pair in view.windows(2) {
                if pair[0].year() == pair[1].year() {
                    prop_assert!(pair[0].id() < pair[1].id());
                }
            }
        }
    }
}
