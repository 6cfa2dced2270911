//! Grid geometry: cells, board size, headings and the step arithmetic the
//! engine uses for walls, wraparound and magnet distance.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    pub fn center(&self) -> Pos {
        Pos {
            x: self.width / 2,
            y: self.height / 2,
        }
    }

    /// All cells in scan order (row by row, left to right).
    pub fn cells(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Pos { x, y }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// The two headings at right angles to this one, in a fixed order.
    pub fn perpendiculars(&self) -> [Direction; 2] {
        match self {
            Direction::Up | Direction::Down => [Direction::Left, Direction::Right],
            Direction::Left | Direction::Right => [Direction::Up, Direction::Down],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub x: u16,
    pub y: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PosDelta {
    pub x: i32,
    pub y: i32,
}

impl From<Direction> for PosDelta {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::Up => PosDelta { x: 0, y: -1 },
            Direction::Down => PosDelta { x: 0, y: 1 },
            Direction::Left => PosDelta { x: -1, y: 0 },
            Direction::Right => PosDelta { x: 1, y: 0 },
        }
    }
}

impl Pos {
    pub fn new(x: u16, y: u16) -> Pos {
        Pos { x, y }
    }

    /// Toroidal step: coordinates that leave the board re-enter on the far side.
    pub fn wrapped_add(&self, delta: PosDelta, size: Size) -> Pos {
        let new_x = (self.x as i32 + delta.x).rem_euclid(size.width as i32) as u16;
        let new_y = (self.y as i32 + delta.y).rem_euclid(size.height as i32) as u16;
        Pos { x: new_x, y: new_y }
    }

    /// Bounded step: `None` when the result would leave the board.
    pub fn checked_add(&self, delta: PosDelta, size: Size) -> Option<Pos> {
        let new_x = self.x as i32 + delta.x;
        let new_y = self.y as i32 + delta.y;
        if new_x < 0 || new_y < 0 || new_x >= size.width as i32 || new_y >= size.height as i32 {
            return None;
        }
        Some(Pos {
            x: new_x as u16,
            y: new_y as u16,
        })
    }

    pub fn manhattan(&self, other: Pos) -> u32 {
        self.x.abs_diff(other.x) as u32 + self.y.abs_diff(other.y) as u32
    }

    pub fn distance_squared(&self, other: Pos) -> u32 {
        let dx = self.x.abs_diff(other.x) as u32;
        let dy = self.y.abs_diff(other.y) as u32;
        dx * dx + dy * dy
    }
}
