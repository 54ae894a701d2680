//! Cellar inventory domain module.
//!
//! This crate contains the bottle record model and the views derived from a
//! collection of bottles (sorted listing, rack occupancy), implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod bottle;
pub mod ordering;
pub mod rack;

pub use bottle::{
    clamp_rating, BottleChange, BottleDraft, BottlePatch, BottleRecord, Color, Position,
    PositionUpdate, MAX_RATING,
};
pub use ordering::{sorted, SortDirection, SortKey, SortState};
pub use rack::{
    Collision, PlacementPlan, RackDimensions, RackIntent, RackOccupancy, RackSelection,
};
