use clap::Parser;
use cratesnek::{
    active_crate_colors, ColorCrate, ColorRun, CrateOptions, Direction, EconomyRules,
    EngineConfig, GameStatus, Pos, RandSource, ResolutionMode, Size, Snapshot, SnekHaus,
};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info};
use ratatui::{backend::Backend, prelude::*, widgets::*};
use simplelog::{Config, LevelFilter, WriteLogger};
use std::error::Error;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const HIGH_SCORE_FILE: &str = ".cratesnek_high_score.txt";
const FINALIZE_DELAY: Duration = Duration::from_millis(400);
const DASH_STEPS: u32 = 3;
const SHRINK_AMOUNT: usize = 2;
const MAGNET_RADIUS: u32 = 3;

/// Snake in the terminal, with power-ups and an optional color-crate economy.
#[derive(Debug, Parser)]
#[command(
    name = "cratesnek",
    version,
    about = "Snake in the terminal, with power-ups and an optional color-crate economy.",
    long_about = "Steer the snek to eat morsels. With --crates, every morsel eaten is sorted \
        into a crate of its color or dropped in the trash; fill the trash and the run ends.\n\n\
        CONTROLS:\n  Arrows/WASD  Steer     Space  Pause      X  Dash\n  \
        Z            Shrink    M      Magnet     B  Wall bounce\n  \
        F            Extra food          Q  End run  Esc  Quit"
)]
struct Args {
    /// Board width in cells. Fills the terminal if not set.
    #[arg(long, value_name = "COLS")]
    width: Option<u16>,

    /// Board height in cells. Fills the terminal if not set.
    #[arg(long, value_name = "ROWS")]
    height: Option<u16>,

    #[arg(long, default_value = "3", value_name = "N")]
    initial_length: u16,

    /// Primary morsels kept on the board.
    #[arg(long, default_value = "1", value_name = "N")]
    foods: usize,

    /// Wrap around the edges instead of dying on the walls.
    #[arg(long)]
    wrap: bool,

    /// Start with wall bounce active.
    #[arg(long)]
    bounce: bool,

    /// Extra morsel slots to start with.
    #[arg(long, default_value = "0", value_name = "N")]
    extra_foods: usize,

    /// Starting magnet radius in cells; 0 disables it.
    #[arg(long, default_value = "0", value_name = "CELLS")]
    magnet: u32,

    #[arg(long, default_value = "150", value_name = "MS")]
    tick_ms: u64,

    /// Sort eaten morsels into color crates.
    #[arg(long)]
    crates: bool,

    #[arg(long, default_value = "4", value_name = "N")]
    crate_count: usize,

    /// Slots per crate.
    #[arg(long, default_value = "3", value_name = "N")]
    slots: u32,

    /// Crates that accept morsels; the rest are locked.
    #[arg(long, default_value = "2", value_name = "N")]
    active: usize,

    #[arg(long, default_value = "5", value_name = "N")]
    trash_capacity: usize,

    /// Swap completed crate colors immediately instead of after the fill animation.
    #[arg(long)]
    single_step: bool,

    /// Seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "cratesnek.log", value_name = "FILE")]
    log_file: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    // The terminal belongs to the UI, so logs go to a file.
    WriteLogger::init(
        LevelFilter::Info,
        Config::default(),
        File::create(&args.log_file)?,
    )?;

    info!("Starting cratesnek with {:?}", args);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let tick_rate = Duration::from_millis(args.tick_ms.max(1));
    let mut game = Game::new(args);
    let outcome = run_loop(&mut terminal, &mut game, tick_rate);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    outcome?;
    Ok(())
}

fn run_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    game: &mut Game,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut last_tick = Instant::now();
    let mut ignore_input = false;
    loop {
        terminal.draw(|f| game.render(f))?;

        // One key per tick, so two quick turns cannot fold the snek back on itself.
        if !ignore_input && event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                game.handle_input(key);
                ignore_input = true;
            }
        }

        if last_tick.elapsed() >= tick_rate {
            game.update();
            last_tick = Instant::now();
            ignore_input = false;
        }

        if let GameState::Exit = game.state {
            return Ok(());
        }
    }
}

/// One run, either classic or feeding the crates.
enum Session {
    Classic(SnekHaus),
    Crates {
        run: ColorRun,
        completing_since: Option<Instant>,
    },
}

impl Session {
    fn start(args: &Args, size: Size) -> cratesnek::error::Result<Session> {
        let engine = EngineConfig {
            size,
            initial_length: args.initial_length,
            food_slots: args.foods,
            wrap: args.wrap,
            ..EngineConfig::default()
        };
        let source = match args.seed {
            Some(seed) => RandSource::seeded(seed),
            None => RandSource::from_entropy(),
        };

        let mut session = if args.crates {
            let options = CrateOptions {
                slots_per_crate: args.slots,
                active_count: args.active,
                ..CrateOptions::default()
            };
            let rules = EconomyRules {
                active_count: args.active,
                overflow_capacity: args.trash_capacity,
                mode: if args.single_step {
                    ResolutionMode::SingleStep
                } else {
                    ResolutionMode::TwoPhase
                },
                ..EconomyRules::default()
            };
            Session::Crates {
                run: ColorRun::new(engine, args.crate_count, options, rules, source)?,
                completing_since: None,
            }
        } else {
            Session::Classic(SnekHaus::new(engine, source)?)
        };

        let haus = session.haus_mut();
        haus.set_wall_bounce_active(args.bounce);
        haus.set_extra_food_slots(args.extra_foods);
        haus.set_magnet_radius(args.magnet);
        Ok(session)
    }

    fn haus(&self) -> &SnekHaus {
        match self {
            Session::Classic(haus) => haus,
            Session::Crates { run, .. } => run.haus(),
        }
    }

    fn haus_mut(&mut self) -> &mut SnekHaus {
        match self {
            Session::Classic(haus) => haus,
            Session::Crates { run, .. } => run.haus_mut(),
        }
    }

    fn score(&self) -> u32 {
        self.haus().score()
    }

    fn is_over(&self) -> bool {
        match self {
            Session::Classic(haus) => haus.status().is_terminal(),
            Session::Crates { run, .. } => run.is_over(),
        }
    }

    fn set_direction(&mut self, direction: Direction) {
        self.haus_mut().set_direction(direction);
    }

    fn advance(&mut self, dash: Option<u32>) -> cratesnek::error::Result<()> {
        match self {
            Session::Classic(haus) => {
                match dash {
                    Some(steps) => haus.dash(steps),
                    None => haus.tick(),
                };
            }
            Session::Crates {
                run,
                completing_since,
            } => {
                let report = match dash {
                    Some(steps) => run.dash(steps)?,
                    None => run.tick()?,
                };
                if report.completions > 0 && completing_since.is_none() {
                    *completing_since = pending_since(run.crates());
                }
            }
        }
        Ok(())
    }

    /// Finalizes completed crates once their fill has been on screen long enough.
    fn settle(&mut self) -> cratesnek::error::Result<()> {
        let Session::Crates {
            run,
            completing_since,
        } = self
        else {
            return Ok(());
        };
        let Some(since) = *completing_since else {
            return Ok(());
        };
        if since.elapsed() < FINALIZE_DELAY {
            return Ok(());
        }
        let resolution = run.finalize_pending()?;
        if resolution.completions > 0 {
            info!("Refill completed {} crates", resolution.completions);
        }
        *completing_since = pending_since(run.crates());
        Ok(())
    }
}

fn pending_since(crates: &[ColorCrate]) -> Option<Instant> {
    crates.iter().any(|c| c.is_completing).then(Instant::now)
}

enum GameState {
    ReadyToStart,
    Playing(Session),
    Paused(Session),
    GameOver { session: Session, final_score: u32 },
    Exit,
}

struct Game {
    args: Args,
    state: GameState,
    high_score: u32,
    arena_size: Option<Size>,
    message: Option<String>,
}

impl Game {
    fn new(args: Args) -> Self {
        Game {
            args,
            state: GameState::ReadyToStart,
            high_score: Self::load_high_score(),
            arena_size: None,
            message: None,
        }
    }

    fn load_high_score() -> u32 {
        match fs::read_to_string(HIGH_SCORE_FILE).map(|s| s.trim().parse().unwrap_or(0)) {
            Ok(score) => score,
            Err(e) => {
                error!("Error loading high score: {}", e);
                0
            }
        }
    }

    fn save_high_score(&self) {
        if let Err(e) = fs::write(HIGH_SCORE_FILE, self.high_score.to_string()) {
            error!("Error saving high score: {}", e);
        }
    }

    fn update_high_score(&mut self, score: u32) {
        if score > self.high_score {
            self.high_score = score;
            self.save_high_score();
        }
    }

    fn board_size(&self) -> Size {
        let arena = self.arena_size.unwrap_or(Size {
            width: 20,
            height: 20,
        });
        Size {
            width: self.args.width.unwrap_or(arena.width),
            height: self.args.height.unwrap_or(arena.height),
        }
    }

    fn start(&mut self) -> GameState {
        match Session::start(&self.args, self.board_size()) {
            Ok(session) => {
                self.message = None;
                GameState::Playing(session)
            }
            Err(e) => {
                error!("Could not start a run: {}", e);
                self.message = Some(e.to_string());
                GameState::ReadyToStart
            }
        }
    }

    fn end_run(&mut self) {
        let state = std::mem::replace(&mut self.state, GameState::Exit);
        self.state = match state {
            GameState::Playing(session) | GameState::Paused(session) => {
                let final_score = session.score();
                self.update_high_score(final_score);
                GameState::GameOver {
                    session,
                    final_score,
                }
            }
            other => other,
        };
    }

    fn render(&mut self, frame: &mut Frame) {
        let score_text = match &self.state {
            GameState::Playing(session) | GameState::Paused(session) => format!(
                "SNEK    High Score: {}    Score: {}{}",
                self.high_score,
                session.score(),
                modifier_text(&session.haus().snapshot())
            ),
            _ => format!("SNEK    High Score: {}", self.high_score),
        };

        let crate_rows = if self.args.crates { 4 } else { 0 };
        let layout = Layout::default()
            .direction(layout::Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(crate_rows),
                Constraint::Min(0),
            ])
            .split(frame.area());

        frame.render_widget(
            Paragraph::new(score_text)
                .alignment(Alignment::Left)
                .block(Block::default().borders(Borders::ALL)),
            layout[0],
        );

        let session = match &self.state {
            GameState::Playing(session)
            | GameState::Paused(session)
            | GameState::GameOver { session, .. } => Some(session),
            _ => None,
        };
        if let Some(Session::Crates { run, .. }) = session {
            render_crates(frame, run, layout[1]);
        }

        let arena = layout[2];
        match &self.state {
            GameState::ReadyToStart => {
                let block = Block::default().borders(Borders::ALL);
                let inner_area = block.inner(arena);
                self.arena_size = Some(Size {
                    width: inner_area.width,
                    height: inner_area.height,
                });
                let text = match &self.message {
                    Some(message) => format!("{}\nPress SPACE to try again", message),
                    None => "Press SPACE to start".to_string(),
                };
                frame.render_widget(
                    Paragraph::new(text)
                        .alignment(Alignment::Center)
                        .block(block),
                    arena,
                );
            }
            GameState::Playing(session) => {
                let block = Block::default().title("Playing").borders(Borders::ALL);
                let inner_area = block.inner(arena);
                frame.render_widget(block, arena);
                render_board(frame, session, inner_area);
            }
            GameState::Paused(session) => {
                let block = Block::default()
                    .title("Paused. Press SPACE to continue")
                    .borders(Borders::ALL);
                let inner_area = block.inner(arena);
                frame.render_widget(block, arena);
                render_board(frame, session, inner_area);
            }
            GameState::GameOver {
                session,
                final_score,
            } => {
                let block = Block::default().borders(Borders::ALL);
                let inner_area = block.inner(arena);
                frame.render_widget(block, arena);
                render_board(frame, session, inner_area);

                let headline = match session {
                    _ if session.haus().status() == GameStatus::Won => "BOARD CLEARED",
                    Session::Crates { run, .. } if run.haus().status() != GameStatus::Over => {
                        "TRASH FULL"
                    }
                    _ => "GAME OVER",
                };
                frame.render_widget(
                    Paragraph::new(format!(
                        "{}\nFinal Score: {}\nPress SPACE to play again",
                        headline, final_score
                    ))
                    .alignment(Alignment::Center),
                    inner_area,
                );
            }
            GameState::Exit => {}
        }
    }

    fn handle_input(&mut self, key: event::KeyEvent) {
        use event::KeyCode;

        let mut dash = None;
        let new_state = match &mut self.state {
            GameState::ReadyToStart => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => Some(GameState::Exit),
                KeyCode::Char(' ') => Some(self.start()),
                _ => None,
            },
            GameState::Playing(session) => match key.code {
                KeyCode::Char('q') => {
                    self.end_run();
                    None
                }
                KeyCode::Esc => Some(GameState::Exit),
                KeyCode::Char(' ') => {
                    let state = std::mem::replace(&mut self.state, GameState::Exit);
                    match state {
                        GameState::Playing(session) => Some(GameState::Paused(session)),
                        other => Some(other),
                    }
                }
                KeyCode::Up | KeyCode::Char('w') => {
                    session.set_direction(Direction::Up);
                    None
                }
                KeyCode::Down | KeyCode::Char('s') => {
                    session.set_direction(Direction::Down);
                    None
                }
                KeyCode::Left | KeyCode::Char('a') => {
                    session.set_direction(Direction::Left);
                    None
                }
                KeyCode::Right | KeyCode::Char('d') => {
                    session.set_direction(Direction::Right);
                    None
                }
                KeyCode::Char('x') => {
                    dash = Some(DASH_STEPS);
                    None
                }
                KeyCode::Char('z') => {
                    session.haus_mut().shrink(SHRINK_AMOUNT);
                    None
                }
                KeyCode::Char('m') => {
                    let haus = session.haus_mut();
                    let radius = if haus.snapshot().magnet_radius > 0 {
                        0
                    } else {
                        MAGNET_RADIUS
                    };
                    haus.set_magnet_radius(radius);
                    None
                }
                KeyCode::Char('b') => {
                    let haus = session.haus_mut();
                    let active = haus.snapshot().wall_bounce_active;
                    haus.set_wall_bounce_active(!active);
                    None
                }
                KeyCode::Char('f') => {
                    session.haus_mut().add_extra_food_slots(1);
                    None
                }
                _ => None,
            },
            GameState::Paused(_) => match key.code {
                KeyCode::Char('q') => {
                    self.end_run();
                    None
                }
                KeyCode::Esc => Some(GameState::Exit),
                KeyCode::Char(' ') => {
                    let state = std::mem::replace(&mut self.state, GameState::Exit);
                    match state {
                        GameState::Paused(session) => Some(GameState::Playing(session)),
                        other => Some(other),
                    }
                }
                _ => None,
            },
            GameState::GameOver { .. } => match key.code {
                KeyCode::Esc => Some(GameState::Exit),
                KeyCode::Char(' ') | KeyCode::Char('q') => Some(GameState::ReadyToStart),
                _ => None,
            },
            GameState::Exit => None,
        };

        if let Some(new_state) = new_state {
            self.state = new_state;
        }
        if dash.is_some() {
            self.step(dash);
        }
    }

    fn update(&mut self) {
        self.step(None);
    }

    fn step(&mut self, dash: Option<u32>) {
        let GameState::Playing(session) = &mut self.state else {
            return;
        };
        let result = session.settle().and_then(|()| session.advance(dash));
        if let Err(e) = &result {
            error!("Run aborted: {}", e);
        }
        if result.is_err() || session.is_over() {
            self.end_run();
        }
    }
}

fn modifier_text(snapshot: &Snapshot) -> String {
    let mut text = String::new();
    if snapshot.magnet_radius > 0 {
        text.push_str(&format!("    Magnet: {}", snapshot.magnet_radius));
    }
    if snapshot.wall_bounce_active {
        text.push_str("    Bounce");
    }
    if snapshot.extra_food_slots > 0 {
        text.push_str(&format!("    Extra: {}", snapshot.extra_food_slots));
    }
    text
}

fn tint(color: cratesnek::Color) -> Color {
    match color {
        cratesnek::Color::Red => Color::Red,
        cratesnek::Color::Yellow => Color::Yellow,
        cratesnek::Color::Green => Color::Green,
        cratesnek::Color::Purple => Color::Magenta,
        cratesnek::Color::Blue => Color::Blue,
        cratesnek::Color::Orange => Color::Rgb(255, 140, 0),
    }
}

fn render_crates(frame: &mut Frame, run: &ColorRun, area: Rect) {
    let crates: Vec<Span> = run
        .crates()
        .iter()
        .flat_map(|c| {
            let mut style = Style::default().fg(tint(c.color));
            if c.locked {
                style = style.add_modifier(Modifier::DIM);
            }
            if c.is_completing {
                style = style.add_modifier(Modifier::REVERSED);
            }
            let filled = "■".repeat(c.filled.min(c.capacity) as usize);
            let empty = "□".repeat(c.capacity.saturating_sub(c.filled) as usize);
            [
                Span::styled(format!("[{}{}]", filled, empty), style),
                Span::raw(" "),
            ]
        })
        .collect();

    let capacity = run.rules().overflow_capacity;
    let label = format!("Trash {}/{} ", run.trash().len(), capacity);
    let mut trash = vec![Span::raw(label)];
    trash.extend(
        run.trash()
            .iter()
            .map(|&color| Span::styled("●", Style::default().fg(tint(color)))),
    );

    frame.render_widget(
        Paragraph::new(vec![Line::from(crates), Line::from(trash)])
            .block(Block::default().title("Crates").borders(Borders::ALL)),
        area,
    );
}

fn render_board(frame: &mut Frame, session: &Session, area: Rect) {
    let snapshot = session.haus().snapshot();
    let wanted = match session {
        Session::Crates { run, .. } => {
            Some(active_crate_colors(run.crates(), run.rules().active_count))
        }
        Session::Classic(_) => None,
    };
    frame.render_widget(
        Board {
            snapshot: &snapshot,
            wanted: wanted.as_deref(),
        },
        area,
    );
}

struct Board<'a> {
    snapshot: &'a Snapshot,
    /// Colors an active crate is waiting for; everything else is dimmed.
    wanted: Option<&'a [cratesnek::Color]>,
}

impl Widget for Board<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut paint = |pos: Pos, symbol: &str, style: Style| {
            if pos.x < area.width && pos.y < area.height {
                buf[(pos.x + area.x, pos.y + area.y)]
                    .set_symbol(symbol)
                    .set_style(style);
            }
        };

        for &pos in self.snapshot.snake.iter().skip(1) {
            paint(pos, " ", Style::default().bg(Color::Green));
        }
        if !self.snapshot.is_empty() {
            paint(
                self.snapshot.head(),
                "😀",
                Style::default().fg(Color::Yellow),
            );
        }

        let dim = |color: cratesnek::Color| {
            let style = Style::default().fg(tint(color));
            match self.wanted {
                Some(wanted) if !wanted.contains(&color) => style.add_modifier(Modifier::DIM),
                _ => style,
            }
        };
        for morsel in &self.snapshot.foods {
            paint(morsel.pos, "●", dim(morsel.color));
        }
        for morsel in &self.snapshot.extra_foods {
            paint(morsel.pos, "◆", dim(morsel.color));
        }
    }
}
