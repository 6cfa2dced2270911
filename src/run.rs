//! One color-crate run: the snek haus plus the crates and trash it feeds.

use crate::color::{self, Color};
use crate::economy::{
    apply_consumed_color, create_crates, finalize_crate_replacement, ColorCrate, CrateOptions,
    EconomyRules, Resolution,
};
use crate::engine::{EngineConfig, GameStatus, Snapshot, SnekHaus};
use crate::error::{GameError, Result};
use crate::grid::Direction;
use crate::rng::{RandSource, UnitSource};
use log::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub snapshot: Snapshot,
    pub completions: u32,
    pub trash_full: bool,
}

impl RunReport {
    pub fn is_over(&self) -> bool {
        self.trash_full || self.snapshot.status.is_terminal()
    }
}

#[derive(Debug)]
pub struct ColorRun<S = RandSource<rand::rngs::StdRng>> {
    haus: SnekHaus<S>,
    crate_count: usize,
    crate_options: CrateOptions,
    rules: EconomyRules,
    crates: Vec<ColorCrate>,
    trash: Vec<Color>,
    trash_full: bool,
}

impl<S: UnitSource> ColorRun<S> {
    pub fn new(
        engine: EngineConfig,
        crate_count: usize,
        crate_options: CrateOptions,
        rules: EconomyRules,
        source: S,
    ) -> Result<Self> {
        rules.validate()?;
        if crate_options.active_count != rules.active_count {
            return Err(GameError::Configuration(format!(
                "crates lock past {} but the rules fill {}",
                crate_options.active_count, rules.active_count
            )));
        }
        if color::distinct(&crate_options.palette) != color::distinct(&rules.palette) {
            return Err(GameError::Configuration(
                "crates and rules use different palettes".to_string(),
            ));
        }
        let mut haus = SnekHaus::new(engine, source)?;
        let crates = create_crates(crate_count, &crate_options, haus.source_mut())?;
        Ok(ColorRun {
            haus,
            crate_count,
            crate_options,
            rules,
            crates,
            trash: Vec::new(),
            trash_full: false,
        })
    }

    pub fn reset(&mut self) -> Result<RunReport> {
        let snapshot = self.haus.reset();
        let source = self.haus.source_mut();
        self.crates = create_crates(self.crate_count, &self.crate_options, source)?;
        self.trash = Vec::new();
        self.trash_full = false;
        info!("Color run reset with {} crates", self.crates.len());
        Ok(self.report(snapshot, 0))
    }

    pub fn haus(&self) -> &SnekHaus<S> {
        &self.haus
    }

    /// For the power-up modifiers; the crates are not reachable from here.
    pub fn haus_mut(&mut self) -> &mut SnekHaus<S> {
        &mut self.haus
    }

    pub fn crates(&self) -> &[ColorCrate] {
        &self.crates
    }

    pub fn trash(&self) -> &[Color] {
        &self.trash
    }

    pub fn rules(&self) -> &EconomyRules {
        &self.rules
    }

    pub fn status(&self) -> GameStatus {
        self.haus.status()
    }

    pub fn is_over(&self) -> bool {
        self.trash_full || self.haus.status().is_terminal()
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.haus.set_direction(direction);
    }

    pub fn tick(&mut self) -> Result<RunReport> {
        if self.trash_full {
            return Ok(self.report(self.haus.snapshot(), 0));
        }
        let snapshot = self.haus.tick();
        self.absorb(snapshot)
    }

    pub fn dash(&mut self, steps: u32) -> Result<RunReport> {
        if self.trash_full {
            return Ok(self.report(self.haus.snapshot(), 0));
        }
        let snapshot = self.haus.dash(steps);
        self.absorb(snapshot)
    }

    /// Finalizes every crate still waiting on its replacement color.
    pub fn finalize_pending(&mut self) -> Result<Resolution> {
        let mut total = Resolution::default();
        for index in 0..self.crates.len() {
            if !self.crates[index].is_completing {
                continue;
            }
            let result = finalize_crate_replacement(
                index,
                &mut self.crates,
                &mut self.trash,
                &self.rules,
                self.haus.source_mut(),
            )?;
            total.completions += result.completions;
        }
        self.trash_full |= self.trash.len() >= self.rules.overflow_capacity;
        total.game_over = self.trash_full;
        Ok(total)
    }

    /// Feeds the eaten colors to the crates in eating order. Colors eaten after
    /// the one that fills the trash are dropped; the run is already lost.
    fn absorb(&mut self, snapshot: Snapshot) -> Result<RunReport> {
        let mut completions = 0;
        for &color in &snapshot.consumed {
            let result = apply_consumed_color(
                color,
                &mut self.crates,
                &mut self.trash,
                &self.rules,
                self.haus.source_mut(),
            )?;
            completions += result.completions;
            if result.game_over {
                self.trash_full = true;
                info!("Run lost to a full trash at score {}", snapshot.score);
                break;
            }
        }
        Ok(self.report(snapshot, completions))
    }

    fn report(&self, snapshot: Snapshot, completions: u32) -> RunReport {
        RunReport {
            snapshot,
            completions,
            trash_full: self.trash_full,
        }
    }
}
