//! Grid snake engine with power-up modifiers and a color-crate economy.
//!
//! [`SnekHaus`] advances the snek one tick at a time and reports the colors
//! of the morsels it ate; the [`economy`] functions route those colors into
//! crates and a bounded trash pile. [`ColorRun`] wires the two together for
//! a single run. All randomness comes from an injected [`UnitSource`].

pub mod color;
pub mod economy;
pub mod engine;
pub mod error;
pub mod grid;
pub mod rng;
pub mod run;

pub use color::{Color, DEFAULT_PALETTE};
pub use economy::{
    active_crate_colors, apply_consumed_color, create_crates, finalize_crate_replacement,
    pick_distinct_colors, ColorCrate, CrateOptions, EconomyRules, ReplacementPolicy, Resolution,
    ResolutionMode,
};
pub use engine::{EngineConfig, GameStatus, Morsel, Snapshot, SnekHaus};
pub use error::GameError;
pub use grid::{Direction, Pos, PosDelta, Size};
pub use rng::{RandSource, SequenceSource, UnitSource};
pub use run::{ColorRun, RunReport};
