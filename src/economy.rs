//! Color crates: a row of fixed-size crates that want morsels of their own
//! color, and a bounded trash pile for everything else.
//!
//! The crate list and the trash are owned by whoever runs the game and are
//! mutated in place by [`apply_consumed_color`] and
//! [`finalize_crate_replacement`]; both return a [`Resolution`] summary.
//!
//! Completing a crate swaps its color for an unused palette color and pulls
//! matching colors back out of the trash (newest first). In
//! [`ResolutionMode::TwoPhase`] the swap waits for an explicit finalize call
//! so a front-end can animate the full crate first; [`ResolutionMode::SingleStep`]
//! finalizes immediately, chaining further completions in the same call.

use crate::color::{self, Color, DEFAULT_PALETTE};
use crate::error::{GameError, Result};
use crate::rng::{pick_index, UnitSource};
use log::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorCrate {
    pub color: Color,
    pub capacity: u32,
    pub filled: u32,
    /// Outside the active window; never receives morsels.
    pub locked: bool,
    /// Set by the call that completed this crate, cleared by the next call.
    pub just_completed: bool,
    /// Full and waiting for [`finalize_crate_replacement`].
    pub is_completing: bool,
    pub pending_color: Option<Color>,
}

impl ColorCrate {
    pub fn new(color: Color, capacity: u32) -> Self {
        ColorCrate {
            color,
            capacity,
            filled: 0,
            locked: false,
            just_completed: false,
            is_completing: false,
            pending_color: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.filled >= self.capacity
    }

    fn accepts(&self, color: Color) -> bool {
        self.color == color && !self.locked && !self.is_completing && !self.is_full()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrateOptions {
    pub slots_per_crate: u32,
    pub active_count: usize,
    pub palette: Vec<Color>,
}

impl Default for CrateOptions {
    fn default() -> Self {
        CrateOptions {
            slots_per_crate: 3,
            active_count: 2,
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Replace colors and chain completions within the same call.
    SingleStep,
    /// Park completed crates until they are finalized.
    #[default]
    TwoPhase,
}

/// What to do when every palette color is already on a crate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplacementPolicy {
    /// Pick from the whole palette, even if that repeats a crate's color.
    #[default]
    Fallback,
    /// Refuse with a configuration error.
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EconomyRules {
    pub active_count: usize,
    pub overflow_capacity: usize,
    pub palette: Vec<Color>,
    pub mode: ResolutionMode,
    pub replacement: ReplacementPolicy,
}

impl Default for EconomyRules {
    fn default() -> Self {
        EconomyRules {
            active_count: 2,
            overflow_capacity: 5,
            palette: DEFAULT_PALETTE.to_vec(),
            mode: ResolutionMode::default(),
            replacement: ReplacementPolicy::default(),
        }
    }
}

impl EconomyRules {
    pub fn validate(&self) -> Result<()> {
        if self.overflow_capacity == 0 {
            return Err(GameError::Configuration(
                "overflow capacity must be at least 1".to_string(),
            ));
        }
        if self.palette.is_empty() {
            return Err(GameError::Configuration("palette is empty".to_string()));
        }
        Ok(())
    }

    fn overflowing(&self, overflow: &[Color]) -> bool {
        overflow.len() >= self.overflow_capacity
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub completions: u32,
    pub game_over: bool,
}

/// `count` different colors from `palette`, every ordering equally likely.
pub fn pick_distinct_colors(
    count: usize,
    palette: &[Color],
    source: &mut impl UnitSource,
) -> Result<Vec<Color>> {
    let mut pool = color::distinct(palette);
    if count > pool.len() {
        return Err(GameError::Configuration(format!(
            "cannot pick {} distinct colors from a palette of {}",
            count,
            pool.len()
        )));
    }
    // Fisher-Yates.
    for i in (1..pool.len()).rev() {
        let j = pick_index(source, i + 1);
        pool.swap(i, j);
    }
    pool.truncate(count);
    Ok(pool)
}

pub fn create_crates(
    count: usize,
    options: &CrateOptions,
    source: &mut impl UnitSource,
) -> Result<Vec<ColorCrate>> {
    if options.slots_per_crate == 0 {
        return Err(GameError::Configuration(
            "crates need at least one slot".to_string(),
        ));
    }
    let colors = pick_distinct_colors(count, &options.palette, source)?;
    Ok(colors
        .into_iter()
        .enumerate()
        .map(|(index, color)| ColorCrate {
            locked: index >= options.active_count,
            ..ColorCrate::new(color, options.slots_per_crate)
        })
        .collect())
}

pub fn active_crate_colors(crates: &[ColorCrate], active_count: usize) -> Vec<Color> {
    crates.iter().take(active_count).map(|c| c.color).collect()
}

/// Routes one eaten color to the first active crate that wants it, or to the
/// trash.
pub fn apply_consumed_color(
    color: Color,
    crates: &mut [ColorCrate],
    overflow: &mut Vec<Color>,
    rules: &EconomyRules,
    source: &mut impl UnitSource,
) -> Result<Resolution> {
    require_crates(crates)?;
    for c in crates.iter_mut() {
        c.just_completed = false;
    }

    let active = rules.active_count.min(crates.len());
    let Some(index) = crates[..active].iter().position(|c| c.accepts(color)) else {
        overflow.push(color);
        debug!("Trashed {} ({} in trash)", color, overflow.len());
        let game_over = rules.overflowing(overflow);
        if game_over {
            info!("Trash is full");
        }
        return Ok(Resolution {
            completions: 0,
            game_over,
        });
    };

    let target = &crates[index];
    if target.filled + 1 < target.capacity {
        crates[index].filled += 1;
        let filled = crates[index].filled;
        debug!("Crate {} took {} ({} filled)", index, color, filled);
        return Ok(Resolution {
            completions: 0,
            game_over: rules.overflowing(overflow),
        });
    }

    // Choose before touching the crate so a strict refusal leaves it as it was.
    let replacement = choose_replacement(crates, rules, source)?;
    crates[index].filled += 1;
    mark_completing(&mut crates[index], replacement);
    info!("Crate {} completed with {}", index, color);

    let mut completions = 1;
    if rules.mode == ResolutionMode::SingleStep {
        completions += settle(index, crates, overflow, rules, source)?;
        crates[index].just_completed = true;
    }
    Ok(Resolution {
        completions,
        game_over: rules.overflowing(overflow),
    })
}

/// Commits the pending color of a completing crate, refills it from the
/// trash and, if that fills it again, parks it for another finalize.
pub fn finalize_crate_replacement(
    index: usize,
    crates: &mut [ColorCrate],
    overflow: &mut Vec<Color>,
    rules: &EconomyRules,
    source: &mut impl UnitSource,
) -> Result<Resolution> {
    require_crates(crates)?;
    if index >= crates.len() {
        return Err(GameError::InvalidCall(format!(
            "crate index {} out of range for {} crates",
            index,
            crates.len()
        )));
    }
    let completions = finalize_at(index, crates, overflow, rules, source)?;
    Ok(Resolution {
        completions,
        game_over: rules.overflowing(overflow),
    })
}

fn require_crates(crates: &[ColorCrate]) -> Result<()> {
    if crates.is_empty() {
        return Err(GameError::InvalidCall(
            "crate economy called without crates".to_string(),
        ));
    }
    Ok(())
}

fn mark_completing(target: &mut ColorCrate, replacement: Color) {
    target.just_completed = true;
    target.is_completing = true;
    target.pending_color = Some(replacement);
}

/// Finalizes until the crate stops re-completing. Every re-completion takes
/// a full crate's worth of colors out of the trash, so the trash length
/// bounds the loop.
fn settle(
    index: usize,
    crates: &mut [ColorCrate],
    overflow: &mut Vec<Color>,
    rules: &EconomyRules,
    source: &mut impl UnitSource,
) -> Result<u32> {
    let mut chained = 0;
    for _ in 0..=overflow.len() {
        if !crates[index].is_completing {
            break;
        }
        chained += finalize_at(index, crates, overflow, rules, source)?;
    }
    Ok(chained)
}

fn finalize_at(
    index: usize,
    crates: &mut [ColorCrate],
    overflow: &mut Vec<Color>,
    rules: &EconomyRules,
    source: &mut impl UnitSource,
) -> Result<u32> {
    let target = &mut crates[index];
    let (true, Some(next)) = (target.is_completing, target.pending_color) else {
        return Ok(0);
    };
    target.is_completing = false;
    target.just_completed = false;
    target.pending_color = None;
    target.color = next;
    target.filled = 0;

    let pulled = pull_from_overflow(overflow, target);
    debug!("Crate {} now {}, pulled {} from trash", index, next, pulled);
    if !target.is_full() {
        return Ok(0);
    }

    let replacement = choose_replacement(crates, rules, source)?;
    mark_completing(&mut crates[index], replacement);
    info!("Crate {} completed again from trash", index);
    Ok(1)
}

/// Moves trash entries matching the crate's color into it, newest first.
fn pull_from_overflow(overflow: &mut Vec<Color>, target: &mut ColorCrate) -> u32 {
    let mut moved = 0;
    for i in (0..overflow.len()).rev() {
        if target.is_full() {
            break;
        }
        if overflow[i] != target.color {
            continue;
        }
        overflow.remove(i);
        target.filled += 1;
        moved += 1;
    }
    moved
}

fn choose_replacement(
    crates: &[ColorCrate],
    rules: &EconomyRules,
    source: &mut impl UnitSource,
) -> Result<Color> {
    let palette = color::distinct(&rules.palette);
    let in_use = |candidate: &Color| {
        crates
            .iter()
            .any(|c| c.color == *candidate || c.pending_color == Some(*candidate))
    };
    let candidates: Vec<Color> = palette.iter().copied().filter(|c| !in_use(c)).collect();
    if !candidates.is_empty() {
        return Ok(candidates[pick_index(source, candidates.len())]);
    }

    match rules.replacement {
        ReplacementPolicy::Strict => Err(GameError::Configuration(format!(
            "no unused color left in a palette of {} for {} crates",
            palette.len(),
            crates.len()
        ))),
        ReplacementPolicy::Fallback => {
            warn!("Palette exhausted, replacement color may repeat a crate");
            Ok(color::random_color(&palette, source))
        }
    }
}
