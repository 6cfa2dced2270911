//! Movement engine: the snek, its morsels and the per-tick state machine,
//! with the power-up modifiers (extra morsels, magnet, wall bounce, dash,
//! shrink) folded into the same tick.

use crate::color::{self, Color, DEFAULT_PALETTE};
use crate::error::{GameError, Result};
use crate::grid::{Direction, Pos, PosDelta, Size};
use crate::rng::{pick_index, RandSource, UnitSource};
use log::{debug, info};
use std::collections::{HashSet, VecDeque};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GameStatus {
    #[default]
    Idle,
    Running,
    Over,
    Won,
}

impl GameStatus {
    /// Over and won both freeze the board until a reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Over | GameStatus::Won)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Morsel {
    pub pos: Pos,
    pub color: Color,
}

impl From<Morsel> for Pos {
    fn from(morsel: Morsel) -> Self {
        morsel.pos
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub size: Size,
    pub initial_length: u16,
    /// Primary morsels kept on the board; 1 is classic play.
    pub food_slots: usize,
    /// Toroidal board instead of solid walls.
    pub wrap: bool,
    pub palette: Vec<Color>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            size: Size {
                width: 20,
                height: 20,
            },
            initial_length: 3,
            food_slots: 1,
            wrap: false,
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.size.width == 0 || self.size.height == 0 {
            return Err(GameError::Configuration(format!(
                "grid must be at least 1x1, got {}x{}",
                self.size.width, self.size.height
            )));
        }
        let length = self.initial_length.max(1);
        if length > self.size.width / 2 + 1 {
            return Err(GameError::Configuration(format!(
                "initial length {} does not fit a grid {} cells wide",
                length, self.size.width
            )));
        }
        if self.food_slots == 0 {
            return Err(GameError::Configuration(
                "at least one food slot is required".to_string(),
            ));
        }
        if self.palette.is_empty() {
            return Err(GameError::Configuration("palette is empty".to_string()));
        }
        Ok(())
    }
}

/// Read-only copy of the engine state. Owns all of its data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub size: Size,
    /// Head first.
    pub snake: Vec<Pos>,
    pub direction: Direction,
    pub pending_direction: Direction,
    pub score: u32,
    pub status: GameStatus,
    pub foods: Vec<Morsel>,
    pub extra_foods: Vec<Morsel>,
    /// Colors eaten during the last tick (or dash burst), in eating order.
    pub consumed: Vec<Color>,
    pub extra_food_slots: usize,
    pub magnet_radius: u32,
    pub wall_bounce_active: bool,
}

impl Snapshot {
    pub fn head(&self) -> Pos {
        self.snake[0]
    }

    pub fn len(&self) -> usize {
        self.snake.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snake.is_empty()
    }

    /// The primary morsel.
    pub fn food(&self) -> Option<Morsel> {
        self.foods.first().copied()
    }

    pub fn consumed_pickup(&self) -> Option<Color> {
        self.consumed.first().copied()
    }

    pub fn morsels(&self) -> impl Iterator<Item = &Morsel> {
        self.foods.iter().chain(self.extra_foods.iter())
    }
}

#[derive(Clone, Debug)]
struct Snek {
    /// Head first.
    body: VecDeque<Pos>,
    direction: Direction,
    pending_direction: Direction,
}

impl Snek {
    /// Horizontal snek with its head on the board centre, tail trailing left.
    fn new(size: Size, initial_length: u16) -> Self {
        let head = size.center();
        let body = (0..initial_length.max(1))
            .map(|i| Pos {
                x: head.x - i,
                y: head.y,
            })
            .collect();
        Snek {
            body,
            direction: Direction::Right,
            pending_direction: Direction::Right,
        }
    }

    fn head(&self) -> Pos {
        self.body[0]
    }

    fn len(&self) -> usize {
        self.body.len()
    }

    fn change_direction(&mut self, new_direction: Direction) {
        if self.len() > 1 && new_direction == self.direction.opposite() {
            return;
        }
        self.pending_direction = new_direction;
    }

    fn would_collide_with_body(&self, pos: impl Into<Pos>) -> bool {
        self.body.contains(&pos.into())
    }
}

#[derive(Debug)]
enum StepResult {
    Ongoing { removed_tail: Option<Pos> },
    Nommed,
    Collision,
    OutOfBounds,
}

#[derive(Debug, PartialEq, Eq)]
enum Pull {
    Stay,
    Moved(Pos),
    Consumed,
}

/// One greedy magnet step of `point` toward `head`, longer axis first.
fn attract(
    point: Pos,
    head: Pos,
    radius: u32,
    blocked: &HashSet<Pos>,
    food_cells: &HashSet<Pos>,
) -> Pull {
    let distance = point.manhattan(head);
    if distance == 0 {
        return Pull::Consumed;
    }
    if distance > radius {
        return Pull::Stay;
    }

    let dx = head.x as i32 - point.x as i32;
    let dy = head.y as i32 - point.y as i32;
    let x_step = PosDelta {
        x: dx.signum(),
        y: 0,
    };
    let y_step = PosDelta {
        x: 0,
        y: dy.signum(),
    };
    let ordered = if dx.abs() >= dy.abs() {
        [x_step, y_step]
    } else {
        [y_step, x_step]
    };

    for delta in ordered.into_iter().filter(|d| d.x != 0 || d.y != 0) {
        // Stepping toward the head never leaves the board.
        let next = Pos {
            x: (point.x as i32 + delta.x) as u16,
            y: (point.y as i32 + delta.y) as u16,
        };
        if next == head {
            return Pull::Consumed;
        }
        if blocked.contains(&next) || food_cells.contains(&next) {
            continue;
        }
        return Pull::Moved(next);
    }
    Pull::Stay
}

/// The movement engine. `S` supplies every random decision.
#[derive(Debug)]
pub struct SnekHaus<S = RandSource<rand::rngs::StdRng>> {
    config: EngineConfig,
    palette: Vec<Color>,
    source: S,
    snek: Snek,
    status: GameStatus,
    score: u32,
    foods: Vec<Morsel>,
    extra_foods: Vec<Morsel>,
    consumed: Vec<Color>,
    extra_food_slots: usize,
    magnet_radius: u32,
    wall_bounce_active: bool,
}

impl<S: UnitSource> SnekHaus<S> {
    pub fn new(config: EngineConfig, source: S) -> Result<Self> {
        config.validate()?;
        let palette = color::distinct(&config.palette);
        let snek = Snek::new(config.size, config.initial_length);
        let mut haus = SnekHaus {
            config,
            palette,
            source,
            snek,
            status: GameStatus::Idle,
            score: 0,
            foods: Vec::new(),
            extra_foods: Vec::new(),
            consumed: Vec::new(),
            extra_food_slots: 0,
            magnet_radius: 0,
            wall_bounce_active: false,
        };
        haus.reset();
        Ok(haus)
    }

    /// Starts a fresh run on the current configuration.
    pub fn reset(&mut self) -> Snapshot {
        self.extra_food_slots = 0;
        self.magnet_radius = 0;
        self.wall_bounce_active = false;
        self.snek = Snek::new(self.config.size, self.config.initial_length);
        self.status = GameStatus::Idle;
        self.score = 0;
        self.foods = Vec::with_capacity(self.config.food_slots);
        self.extra_foods = Vec::new();
        self.consumed = Vec::new();

        for _ in 0..self.config.food_slots {
            match self.spawn_morsel() {
                Some(morsel) => self.foods.push(morsel),
                None => break,
            }
        }
        info!(
            "New run on {}x{} board, length {}",
            self.config.size.width,
            self.config.size.height,
            self.snek.len()
        );
        self.snapshot()
    }

    /// Swaps in a new configuration and resets.
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<Snapshot> {
        config.validate()?;
        self.palette = color::distinct(&config.palette);
        self.config = config;
        Ok(self.reset())
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            size: self.config.size,
            snake: self.snek.body.iter().copied().collect(),
            direction: self.snek.direction,
            pending_direction: self.snek.pending_direction,
            score: self.score,
            status: self.status,
            foods: self.foods.clone(),
            extra_foods: self.extra_foods.clone(),
            consumed: self.consumed.clone(),
            extra_food_slots: self.extra_food_slots,
            magnet_radius: self.magnet_radius,
            wall_bounce_active: self.wall_bounce_active,
        }
    }

    /// Buffers a heading for the next tick. Reversing onto the neck is ignored.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.status.is_terminal() {
            return;
        }
        self.snek.change_direction(direction);
    }

    pub fn tick(&mut self) -> Snapshot {
        if self.status.is_terminal() {
            return self.snapshot();
        }
        self.consumed.clear();
        if self.status == GameStatus::Idle {
            self.status = GameStatus::Running;
        }

        match self.slither_on() {
            StepResult::Collision | StepResult::OutOfBounds => {
                self.status = GameStatus::Over;
                info!("Game over with score {}", self.score);
                return self.snapshot();
            }
            StepResult::Nommed => self.apply_magnet(None),
            StepResult::Ongoing { removed_tail } => self.apply_magnet(removed_tail),
        }
        self.sync_extra_foods();

        if self.foods.is_empty() && self.extra_foods.is_empty() {
            self.status = GameStatus::Won;
            info!("Board full, run won with score {}", self.score);
        }
        self.snapshot()
    }

    /// Up to `steps` ticks in one call, stopping as soon as the run ends.
    /// Colors eaten along the way are all reported in the returned snapshot.
    pub fn dash(&mut self, steps: u32) -> Snapshot {
        if self.status.is_terminal() {
            return self.snapshot();
        }
        let mut eaten = Vec::new();
        for _ in 0..steps.max(1) {
            self.tick();
            eaten.extend_from_slice(&self.consumed);
            if self.status != GameStatus::Running {
                break;
            }
        }
        self.consumed = eaten;
        self.snapshot()
    }

    /// Cuts up to `amount` tail segments, never the head.
    pub fn shrink(&mut self, amount: usize) -> Snapshot {
        if amount > 0 {
            let target = self.snek.len().saturating_sub(amount).max(1);
            self.snek.body.truncate(target);
        }
        self.snapshot()
    }

    pub fn set_extra_food_slots(&mut self, slots: usize) -> Snapshot {
        self.extra_food_slots = slots;
        self.extra_foods.truncate(slots);
        self.sync_extra_foods();
        self.snapshot()
    }

    pub fn add_extra_food_slots(&mut self, slots: usize) -> Snapshot {
        if slots == 0 {
            return self.snapshot();
        }
        self.set_extra_food_slots(self.extra_food_slots + slots)
    }

    pub fn clear_extra_food_slots(&mut self) -> Snapshot {
        self.set_extra_food_slots(0)
    }

    pub fn set_magnet_radius(&mut self, radius: u32) -> Snapshot {
        self.magnet_radius = radius;
        self.snapshot()
    }

    pub fn set_wall_bounce_active(&mut self, active: bool) -> Snapshot {
        self.wall_bounce_active = active;
        self.snapshot()
    }

    /// Moves the primary morsel to the first free candidate, or else to the
    /// free cell nearest the board centre.
    pub fn place_preferred_food(&mut self, candidates: &[Pos]) -> Snapshot {
        let current = self.foods.first().copied();
        let empty = self.empty_cells(current.map(Pos::from));
        if empty.is_empty() {
            if current.is_some() {
                self.foods.remove(0);
            }
            return self.snapshot();
        }

        let center = self.config.size.center();
        let target = candidates
            .iter()
            .copied()
            .find(|candidate| empty.contains(candidate))
            .or_else(|| {
                empty
                    .iter()
                    .copied()
                    .min_by_key(|cell| cell.distance_squared(center))
            });
        let Some(pos) = target else {
            return self.snapshot();
        };

        match current {
            Some(morsel) => self.foods[0] = Morsel { pos, ..morsel },
            None => {
                let color = color::random_color(&self.palette, &mut self.source);
                self.foods.insert(0, Morsel { pos, color });
            }
        }
        self.snapshot()
    }

    fn slither_on(&mut self) -> StepResult {
        self.snek.direction = self.snek.pending_direction;
        let Some(next_head) = self.next_head() else {
            return StepResult::OutOfBounds;
        };

        let food_hit = self.foods.iter().position(|m| m.pos == next_head);
        let extra_hit = self.extra_foods.iter().position(|m| m.pos == next_head);
        let grows = food_hit.is_some() || extra_hit.is_some();

        // A non-growing snek vacates its tail cell in the same step.
        let removed_tail = if grows {
            None
        } else {
            self.snek.body.pop_back()
        };
        if self.snek.would_collide_with_body(next_head) {
            if let Some(tail) = removed_tail {
                self.snek.body.push_back(tail);
            }
            return StepResult::Collision;
        }
        self.snek.body.push_front(next_head);

        if let Some(index) = food_hit {
            let morsel = self.foods.remove(index);
            self.nom(morsel);
            if let Some(replacement) = self.spawn_morsel() {
                self.foods.insert(index, replacement);
            }
        }
        if let Some(index) = extra_hit {
            let morsel = self.extra_foods.remove(index);
            self.nom(morsel);
        }

        if grows {
            StepResult::Nommed
        } else {
            StepResult::Ongoing { removed_tail }
        }
    }

    fn nom(&mut self, morsel: Morsel) {
        self.score += 1;
        self.consumed.push(morsel.color);
        debug!("Ate {} morsel at {:?}", morsel.color, morsel.pos);
    }

    fn next_head(&mut self) -> Option<Pos> {
        let size = self.config.size;
        let head = self.snek.head();
        let delta = self.snek.direction.into();
        if self.config.wrap {
            return Some(head.wrapped_add(delta, size));
        }
        if let Some(next) = head.checked_add(delta, size) {
            return Some(next);
        }
        if self.wall_bounce_active {
            return self.bounce(head);
        }
        None
    }

    /// Deflects onto a random perpendicular heading that stays on the board.
    fn bounce(&mut self, head: Pos) -> Option<Pos> {
        let sides = self.snek.direction.perpendiculars();
        let first = pick_index(&mut self.source, sides.len());
        for side in [sides[first], sides[1 - first]] {
            if let Some(next) = head.checked_add(side.into(), self.config.size) {
                debug!("Bounced off the wall heading {}", side.name());
                self.snek.direction = side;
                self.snek.pending_direction = side;
                return Some(next);
            }
        }
        None
    }

    fn grow(&mut self, removed_tail: &mut Option<Pos>) -> Option<Pos> {
        let tail = match removed_tail.take() {
            Some(tail) => tail,
            None => *self.snek.body.back()?,
        };
        self.snek.body.push_back(tail);
        Some(tail)
    }

    fn apply_magnet(&mut self, mut removed_tail: Option<Pos>) {
        let radius = self.magnet_radius;
        if radius == 0 {
            return;
        }
        let head = self.snek.head();

        // The vacated tail stays blocked while a magnet nom could still restore it.
        let mut blocked: HashSet<Pos> = self.snek.body.iter().copied().collect();
        blocked.extend(removed_tail);
        let mut food_cells: HashSet<Pos> = self
            .foods
            .iter()
            .chain(self.extra_foods.iter())
            .map(|m| m.pos)
            .collect();

        let mut index = 0;
        while index < self.foods.len() {
            let morsel = self.foods[index];
            food_cells.remove(&morsel.pos);
            match attract(morsel.pos, head, radius, &blocked, &food_cells) {
                Pull::Consumed => {
                    self.foods.remove(index);
                    self.nom(morsel);
                    blocked.extend(self.grow(&mut removed_tail));
                    // The replacement is not pulled until next tick.
                    let Some(replacement) = self.spawn_morsel() else {
                        continue;
                    };
                    food_cells.insert(replacement.pos);
                    self.foods.insert(index, replacement);
                }
                Pull::Moved(next) => {
                    self.foods[index].pos = next;
                    food_cells.insert(next);
                }
                Pull::Stay => {
                    food_cells.insert(morsel.pos);
                }
            }
            index += 1;
        }

        let mut index = 0;
        while index < self.extra_foods.len() {
            let morsel = self.extra_foods[index];
            food_cells.remove(&morsel.pos);
            match attract(morsel.pos, head, radius, &blocked, &food_cells) {
                Pull::Consumed => {
                    self.extra_foods.remove(index);
                    self.nom(morsel);
                    blocked.extend(self.grow(&mut removed_tail));
                    continue;
                }
                Pull::Moved(next) => {
                    self.extra_foods[index].pos = next;
                    food_cells.insert(next);
                }
                Pull::Stay => {
                    food_cells.insert(morsel.pos);
                }
            }
            index += 1;
        }
    }

    fn sync_extra_foods(&mut self) {
        while self.extra_foods.len() < self.extra_food_slots {
            match self.spawn_morsel() {
                Some(morsel) => self.extra_foods.push(morsel),
                None => break,
            }
        }
    }

    /// Free cells in scan order. `relocating` is a morsel cell that counts as free.
    fn empty_cells(&self, relocating: Option<Pos>) -> Vec<Pos> {
        let mut occupied: HashSet<Pos> = self.snek.body.iter().copied().collect();
        occupied.extend(
            self.foods
                .iter()
                .chain(self.extra_foods.iter())
                .map(|m| m.pos)
                .filter(|pos| Some(*pos) != relocating),
        );
        self.config
            .size
            .cells()
            .filter(|cell| !occupied.contains(cell))
            .collect()
    }

    fn spawn_morsel(&mut self) -> Option<Morsel> {
        let empty = self.empty_cells(None);
        if empty.is_empty() {
            return None;
        }
        let pos = empty[pick_index(&mut self.source, empty.len())];
        let color = color::random_color(&self.palette, &mut self.source);
        Some(Morsel { pos, color })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SequenceSource;

    fn haus(width: u16, height: u16) -> SnekHaus<SequenceSource> {
        let config = EngineConfig {
            size: Size { width, height },
            ..EngineConfig::default()
        };
        SnekHaus::new(config, SequenceSource::constant(0.0)).unwrap()
    }

    fn wrapping_haus(width: u16, height: u16) -> SnekHaus<SequenceSource> {
        let config = EngineConfig {
            size: Size { width, height },
            wrap: true,
            ..EngineConfig::default()
        };
        SnekHaus::new(config, SequenceSource::constant(0.0)).unwrap()
    }

    fn has_duplicates(cells: &[Pos]) -> bool {
        let unique: HashSet<&Pos> = cells.iter().collect();
        unique.len() != cells.len()
    }

    #[test]
    fn test_new_snek_is_centered_and_horizontal() {
        let haus = haus(10, 10);
        let state = haus.snapshot();
        assert_eq!(state.status, GameStatus::Idle);
        assert_eq!(state.direction, Direction::Right);
        assert_eq!(
            state.snake,
            vec![Pos::new(5, 5), Pos::new(4, 5), Pos::new(3, 5)]
        );
        // Constant zero picks the first free cell in scan order.
        assert_eq!(
            state.food(),
            Some(Morsel {
                pos: Pos::new(0, 0),
                color: Color::Red
            })
        );
    }

    #[test]
    fn test_moves_forward_each_tick() {
        let mut haus = haus(5, 5);
        let state = haus.tick();
        assert_eq!(state.status, GameStatus::Running);
        assert_eq!(state.head(), Pos::new(3, 2));
        assert_eq!(state.len(), 3);
        assert!(state.consumed.is_empty());
    }

    #[test]
    fn test_grows_when_food_is_eaten() {
        let mut haus = haus(6, 6);
        let head = haus.snapshot().head();
        haus.place_preferred_food(&[Pos::new(head.x + 1, head.y)]);

        let state = haus.tick();
        assert_eq!(state.score, 1);
        assert_eq!(state.len(), 4);
        assert_eq!(state.consumed_pickup(), Some(Color::Red));
        let food = state.food().unwrap();
        assert_ne!(food.pos, Pos::new(head.x + 1, head.y));
        assert!(!state.snake.contains(&food.pos));
    }

    #[test]
    fn test_wall_collision_ends_run() {
        let mut haus = haus(4, 4);
        haus.set_direction(Direction::Up);
        assert_eq!(haus.tick().status, GameStatus::Running);
        assert_eq!(haus.tick().status, GameStatus::Running);
        let state = haus.tick();
        assert_eq!(state.status, GameStatus::Over);
        assert_eq!(state.head(), Pos::new(2, 0));
    }

    #[test]
    fn test_over_is_idempotent() {
        let mut haus = haus(4, 4);
        haus.set_direction(Direction::Up);
        let over = haus.dash(5);
        assert_eq!(over.status, GameStatus::Over);

        haus.set_direction(Direction::Left);
        assert_eq!(haus.tick(), over);
        assert_eq!(haus.tick(), over);
    }

    #[test]
    fn test_self_collision() {
        let mut haus = haus(6, 6);
        haus.snek.body = VecDeque::from([
            Pos::new(2, 2),
            Pos::new(1, 2),
            Pos::new(1, 3),
            Pos::new(2, 3),
            Pos::new(3, 3),
            Pos::new(3, 2),
        ]);
        haus.snek.direction = Direction::Left;
        haus.snek.pending_direction = Direction::Left;
        haus.foods = vec![Morsel {
            pos: Pos::new(5, 5),
            color: Color::Blue,
        }];

        let state = haus.tick();
        assert_eq!(state.status, GameStatus::Over);
        assert_eq!(state.len(), 6);
    }

    #[test]
    fn test_may_follow_own_tail() {
        let mut haus = haus(4, 4);
        haus.snek.body = VecDeque::from([
            Pos::new(1, 0),
            Pos::new(0, 0),
            Pos::new(0, 1),
            Pos::new(1, 1),
        ]);
        haus.snek.direction = Direction::Down;
        haus.snek.pending_direction = Direction::Down;
        haus.foods = vec![Morsel {
            pos: Pos::new(3, 3),
            color: Color::Blue,
        }];

        let state = haus.tick();
        assert_eq!(state.status, GameStatus::Running);
        assert_eq!(state.head(), Pos::new(1, 1));
        assert_eq!(state.len(), 4);
    }

    #[test]
    fn test_change_direction() {
        let mut haus = haus(10, 10);
        haus.set_direction(Direction::Left);
        assert_eq!(haus.snapshot().pending_direction, Direction::Right);

        haus.set_direction(Direction::Up);
        assert_eq!(haus.snapshot().pending_direction, Direction::Up);
        // Still heading right until the tick commits the turn.
        assert_eq!(haus.snapshot().direction, Direction::Right);
        assert_eq!(haus.tick().direction, Direction::Up);
    }

    #[test]
    fn test_single_segment_may_reverse() {
        let config = EngineConfig {
            size: Size {
                width: 6,
                height: 6,
            },
            initial_length: 1,
            ..EngineConfig::default()
        };
        let mut haus = SnekHaus::new(config, SequenceSource::constant(0.0)).unwrap();
        haus.set_direction(Direction::Left);
        assert_eq!(haus.tick().head(), Pos::new(2, 3));
    }

    #[test]
    fn test_wraps_around_edges() {
        let mut haus = wrapping_haus(4, 4);
        haus.set_direction(Direction::Up);
        haus.tick();
        assert_eq!(haus.tick().head(), Pos::new(2, 0));
        let state = haus.tick();
        assert_eq!(state.head(), Pos::new(2, 3));
        assert_eq!(state.status, GameStatus::Running);
    }

    #[test]
    fn test_wall_bounce_deflects() {
        let mut haus = haus(4, 4);
        haus.set_wall_bounce_active(true);
        haus.set_direction(Direction::Up);
        haus.tick();
        haus.tick();
        let state = haus.tick();
        assert_eq!(state.status, GameStatus::Running);
        assert_eq!(state.head(), Pos::new(1, 0));
        assert_eq!(state.direction, Direction::Left);
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn test_wall_bounce_picks_second_side() {
        let config = EngineConfig {
            size: Size {
                width: 4,
                height: 4,
            },
            ..EngineConfig::default()
        };
        // Food position, food color, then the bounce choice.
        let source = SequenceSource::new(vec![0.0, 0.0, 0.9]);
        let mut haus = SnekHaus::new(config, source).unwrap();
        haus.set_wall_bounce_active(true);
        haus.set_direction(Direction::Up);
        haus.tick();
        haus.tick();
        let state = haus.tick();
        assert_eq!(state.head(), Pos::new(3, 0));
        assert_eq!(state.direction, Direction::Right);
    }

    #[test]
    fn test_wall_bounce_in_corner_takes_open_side() {
        let mut haus = haus(4, 4);
        haus.snek.body = VecDeque::from([Pos::new(0, 0)]);
        haus.snek.direction = Direction::Up;
        haus.snek.pending_direction = Direction::Up;
        haus.foods = vec![Morsel {
            pos: Pos::new(3, 3),
            color: Color::Green,
        }];
        haus.set_wall_bounce_active(true);

        let state = haus.tick();
        assert_eq!(state.status, GameStatus::Running);
        assert_eq!(state.head(), Pos::new(1, 0));
        assert_eq!(state.direction, Direction::Right);
    }

    #[test]
    fn test_food_never_spawns_on_snek() {
        let config = EngineConfig {
            size: Size {
                width: 3,
                height: 3,
            },
            initial_length: 1,
            ..EngineConfig::default()
        };
        let mut haus = SnekHaus::new(config, SequenceSource::constant(0.75)).unwrap();
        haus.snek.body = VecDeque::from([
            Pos::new(0, 0),
            Pos::new(1, 0),
            Pos::new(2, 0),
            Pos::new(2, 1),
            Pos::new(1, 1),
            Pos::new(0, 1),
            Pos::new(0, 2),
            Pos::new(1, 2),
        ]);
        haus.foods.clear();
        let morsel = haus.spawn_morsel().unwrap();
        assert_eq!(morsel.pos, Pos::new(2, 2));
    }

    #[test]
    fn test_full_board_wins() {
        let config = EngineConfig {
            size: Size {
                width: 3,
                height: 1,
            },
            initial_length: 2,
            ..EngineConfig::default()
        };
        let mut haus = SnekHaus::new(config, SequenceSource::constant(0.0)).unwrap();
        assert_eq!(haus.snapshot().food().unwrap().pos, Pos::new(2, 0));

        let state = haus.tick();
        assert_eq!(state.status, GameStatus::Won);
        assert_eq!(state.score, 1);
        assert!(state.foods.is_empty());
        assert_eq!(haus.tick(), state);
        assert_eq!(haus.dash(3), state);
    }

    #[test]
    fn test_multiple_food_slots() {
        let config = EngineConfig {
            size: Size {
                width: 8,
                height: 8,
            },
            food_slots: 3,
            ..EngineConfig::default()
        };
        let mut haus = SnekHaus::new(config, RandSource::seeded(3)).unwrap();
        let state = haus.snapshot();
        assert_eq!(state.foods.len(), 3);
        let cells: Vec<Pos> = state.foods.iter().map(|m| m.pos).collect();
        assert!(!has_duplicates(&cells));

        let head = state.head();
        let in_front = Pos::new(head.x + 1, head.y);
        haus.foods = vec![
            Morsel {
                pos: Pos::new(0, 0),
                color: Color::Red,
            },
            Morsel {
                pos: in_front,
                color: Color::Blue,
            },
            Morsel {
                pos: Pos::new(7, 7),
                color: Color::Green,
            },
        ];
        let state = haus.tick();
        assert_eq!(state.score, 1);
        assert_eq!(state.consumed, vec![Color::Blue]);
        assert_eq!(state.foods.len(), 3);
        assert_eq!(state.foods[0].pos, Pos::new(0, 0));
        assert_eq!(state.foods[2].pos, Pos::new(7, 7));
        let respawned = state.foods[1].pos;
        assert!(!state.snake.contains(&respawned));
        assert!(respawned != Pos::new(0, 0) && respawned != Pos::new(7, 7));
    }

    #[test]
    fn test_extra_food_slots() {
        let mut haus = haus(8, 8);
        let state = haus.set_extra_food_slots(2);
        assert_eq!(state.extra_foods.len(), 2);
        let mut cells: Vec<Pos> = state.morsels().map(|m| m.pos).collect();
        cells.extend(state.snake.iter().copied());
        assert!(!has_duplicates(&cells));

        // Feed the snek one of the extras.
        let head = state.head();
        haus.extra_foods[0].pos = Pos::new(head.x + 1, head.y);
        let state = haus.tick();
        assert_eq!(state.score, 1);
        assert_eq!(state.len(), 4);
        assert_eq!(state.extra_foods.len(), 2);

        assert_eq!(haus.add_extra_food_slots(1).extra_foods.len(), 3);
        let state = haus.clear_extra_food_slots();
        assert!(state.extra_foods.is_empty());
        assert_eq!(state.extra_food_slots, 0);
    }

    #[test]
    fn test_magnet_pulls_food_closer() {
        let mut haus = haus(8, 8);
        haus.set_magnet_radius(3);
        haus.place_preferred_food(&[Pos::new(7, 4)]);

        let state = haus.tick();
        assert_eq!(state.head(), Pos::new(5, 4));
        assert_eq!(state.food().unwrap().pos, Pos::new(6, 4));
        assert_eq!(state.score, 0);

        let state = haus.tick();
        assert_eq!(state.score, 1);
        assert_eq!(state.len(), 4);
    }

    #[test]
    fn test_magnet_ignores_distant_food() {
        let mut haus = haus(8, 8);
        haus.set_magnet_radius(2);
        haus.place_preferred_food(&[Pos::new(0, 7)]);
        let state = haus.tick();
        assert_eq!(state.food().unwrap().pos, Pos::new(0, 7));
    }

    #[test]
    fn test_magnet_consumes_adjacent_food() {
        let mut haus = haus(8, 8);
        haus.set_magnet_radius(1);
        haus.place_preferred_food(&[Pos::new(6, 4)]);

        let state = haus.tick();
        assert_eq!(state.score, 1);
        assert_eq!(state.consumed, vec![Color::Red]);
        assert_eq!(
            state.snake,
            vec![
                Pos::new(5, 4),
                Pos::new(4, 4),
                Pos::new(3, 4),
                Pos::new(2, 4),
            ]
        );
        assert_eq!(state.food().unwrap().pos, Pos::new(0, 0));
    }

    #[test]
    fn test_magnet_blocked_food_stays() {
        let mut haus = haus(8, 8);
        haus.set_extra_food_slots(1);
        haus.extra_foods[0].pos = Pos::new(5, 3);
        haus.place_preferred_food(&[Pos::new(5, 2)]);
        haus.set_magnet_radius(3);

        let state = haus.tick();
        // The primary morsel's only step is onto the extra, so it waits;
        // the extra then steps onto the head.
        assert_eq!(state.food().unwrap().pos, Pos::new(5, 2));
        assert_eq!(state.score, 1);
        assert_eq!(state.len(), 4);
        assert_eq!(state.extra_foods.len(), 1);
    }

    #[test]
    fn test_magnet_nom_after_direct_nom_repeats_tail() {
        let mut haus = haus(8, 8);
        haus.set_extra_food_slots(1);
        haus.extra_foods[0].pos = Pos::new(6, 4);
        haus.place_preferred_food(&[Pos::new(5, 4)]);
        haus.set_magnet_radius(1);

        let state = haus.tick();
        assert_eq!(state.status, GameStatus::Running);
        assert_eq!(state.consumed, vec![Color::Red, Color::Red]);
        assert_eq!(state.score, 2);
        // No tail moved this tick, so the magnet growth repeats the last cell.
        assert_eq!(
            state.snake,
            vec![
                Pos::new(5, 4),
                Pos::new(4, 4),
                Pos::new(3, 4),
                Pos::new(2, 4),
                Pos::new(2, 4),
            ]
        );

        // The stacked cell unfolds on the next move.
        let state = haus.tick();
        assert_eq!(state.status, GameStatus::Running);
        assert_eq!(state.head(), Pos::new(6, 4));
        assert_eq!(state.len(), 5);
        assert!(!has_duplicates(&state.snake));
    }

    #[test]
    fn test_attract_prefers_longer_axis() {
        let none = HashSet::new();
        let head = Pos::new(5, 5);
        assert_eq!(
            attract(Pos::new(2, 4), head, 5, &none, &none),
            Pull::Moved(Pos::new(3, 4))
        );
        assert_eq!(
            attract(Pos::new(4, 2), head, 5, &none, &none),
            Pull::Moved(Pos::new(4, 3))
        );

        let blocked = HashSet::from([Pos::new(3, 4)]);
        assert_eq!(
            attract(Pos::new(2, 4), head, 5, &blocked, &none),
            Pull::Moved(Pos::new(2, 5))
        );
        let walled = HashSet::from([Pos::new(3, 4), Pos::new(2, 5)]);
        assert_eq!(attract(Pos::new(2, 4), head, 5, &walled, &none), Pull::Stay);
        assert_eq!(attract(head, head, 5, &none, &none), Pull::Consumed);
    }

    #[test]
    fn test_dash_advances_several_cells() {
        let mut haus = haus(10, 10);
        let state = haus.dash(3);
        assert_eq!(state.head(), Pos::new(8, 5));
        assert_eq!(state.status, GameStatus::Running);

        assert_eq!(haus.dash(0).head(), Pos::new(9, 5));
    }

    #[test]
    fn test_dash_stops_at_wall() {
        let mut haus = haus(4, 4);
        haus.set_direction(Direction::Up);
        let state = haus.dash(10);
        assert_eq!(state.status, GameStatus::Over);
        assert_eq!(state.head(), Pos::new(2, 0));
    }

    #[test]
    fn test_dash_reports_everything_eaten() {
        let mut haus = haus(10, 10);
        haus.set_extra_food_slots(1);
        haus.extra_foods[0] = Morsel {
            pos: Pos::new(7, 5),
            color: Color::Purple,
        };
        haus.place_preferred_food(&[Pos::new(6, 5)]);
        let state = haus.dash(3);
        assert_eq!(state.consumed, vec![Color::Red, Color::Purple]);
        assert_eq!(state.score, 2);
        assert_eq!(state.len(), 5);
    }

    #[test]
    fn test_shrink() {
        let mut haus = haus(10, 10);
        haus.tick();
        assert_eq!(haus.shrink(0).len(), 3);
        assert_eq!(haus.shrink(1).len(), 2);
        let state = haus.shrink(10);
        assert_eq!(state.snake, vec![Pos::new(6, 5)]);
        assert_eq!(state.status, GameStatus::Running);
    }

    #[test]
    fn test_place_preferred_food() {
        let mut haus = haus(6, 6);
        // (3, 3) is the head, so the second candidate wins.
        let state = haus.place_preferred_food(&[Pos::new(3, 3), Pos::new(5, 1)]);
        assert_eq!(state.food().unwrap().pos, Pos::new(5, 1));
        assert_eq!(state.food().unwrap().color, Color::Red);

        // Relocating onto the food's own cell is allowed.
        let state = haus.place_preferred_food(&[Pos::new(5, 1)]);
        assert_eq!(state.food().unwrap().pos, Pos::new(5, 1));

        // No free candidate: nearest free cell to the centre in scan order.
        let state = haus.place_preferred_food(&[Pos::new(2, 3)]);
        assert_eq!(state.food().unwrap().pos, Pos::new(3, 2));
    }

    #[test]
    fn test_reset_starts_fresh() {
        let mut haus = haus(6, 6);
        haus.set_magnet_radius(2);
        haus.set_wall_bounce_active(true);
        haus.set_extra_food_slots(2);
        haus.dash(2);

        let state = haus.reset();
        assert_eq!(state.status, GameStatus::Idle);
        assert_eq!(state.score, 0);
        assert_eq!(state.magnet_radius, 0);
        assert!(!state.wall_bounce_active);
        assert!(state.extra_foods.is_empty());
        assert_eq!(state.head(), Pos::new(3, 3));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut haus = haus(10, 10);
        let before = haus.snapshot();
        let copy = before.clone();
        haus.tick();
        haus.set_direction(Direction::Down);
        haus.tick();
        assert_eq!(before, copy);
        assert_ne!(haus.snapshot().snake, before.snake);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let bad = [
            EngineConfig {
                size: Size {
                    width: 0,
                    height: 4,
                },
                ..EngineConfig::default()
            },
            EngineConfig {
                size: Size {
                    width: 6,
                    height: 6,
                },
                initial_length: 5,
                ..EngineConfig::default()
            },
            EngineConfig {
                food_slots: 0,
                ..EngineConfig::default()
            },
            EngineConfig {
                palette: Vec::new(),
                ..EngineConfig::default()
            },
        ];
        for config in bad {
            let result = SnekHaus::new(config, SequenceSource::constant(0.0));
            assert!(matches!(result, Err(GameError::Configuration(_))));
        }
    }

    #[test]
    fn test_reconfigure() {
        let mut haus = haus(6, 6);
        let size = Size {
            width: 12,
            height: 8,
        };
        let state = haus
            .reconfigure(EngineConfig {
                size,
                ..EngineConfig::default()
            })
            .unwrap();
        assert_eq!(state.size, size);
        assert_eq!(state.head(), Pos::new(6, 4));

        let result = haus.reconfigure(EngineConfig {
            food_slots: 0,
            ..EngineConfig::default()
        });
        assert!(result.is_err());
        assert_eq!(haus.snapshot().size, size);
    }

    #[test]
    fn test_same_seed_same_run() {
        let config = EngineConfig {
            size: Size {
                width: 12,
                height: 12,
            },
            wrap: true,
            ..EngineConfig::default()
        };
        let mut a = SnekHaus::new(config.clone(), RandSource::seeded(99)).unwrap();
        let mut b = SnekHaus::new(config, RandSource::seeded(99)).unwrap();
        a.set_extra_food_slots(2);
        b.set_extra_food_slots(2);
        for step in 0..120 {
            let turn = Direction::ALL[(step / 5) % 4];
            a.set_direction(turn);
            b.set_direction(turn);
            assert_eq!(a.tick(), b.tick());
        }
    }

    #[test]
    fn test_no_double_occupancy_and_growth() {
        let config = EngineConfig {
            size: Size {
                width: 10,
                height: 10,
            },
            wrap: true,
            food_slots: 2,
            ..EngineConfig::default()
        };
        let mut haus = SnekHaus::new(config, RandSource::seeded(5)).unwrap();
        haus.set_extra_food_slots(3);
        let mut previous = haus.snapshot();
        for step in 0..300 {
            haus.set_direction(Direction::ALL[(step * 7 / 3) % 4]);
            let state = haus.tick();
            if state.status.is_terminal() {
                break;
            }
            assert!(!has_duplicates(&state.snake));
            assert!(state.morsels().all(|m| !state.snake.contains(&m.pos)));
            assert_eq!(state.len(), previous.len() + state.consumed.len());
            assert_eq!(state.score, previous.score + state.consumed.len() as u32);
            previous = state;
        }
    }
}
