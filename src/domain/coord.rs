/// Grid coordinates and the four compass directions.
///
/// The grid is addressed `(x, y)` with `y` growing downwards, so North is
/// `y - 1` and South is `y + 1`. Coordinates are signed: stepping off the
/// edge yields a coordinate that simply has no tile, which the resolver
/// treats as blocking.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Coord { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Coord { x: self.x + dx, y: self.y + dy }
    }

    pub fn manhattan(self, other: Coord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn euclidean(self, other: Coord) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Row-major ordering key: `y` first, then `x`.
    pub fn row_major(self) -> (i32, i32) {
        (self.y, self.x)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Clockwise order starting at North. Also the order in which
    /// neighbours are probed by pathfinding.
    pub const ALL: [Direction; 4] =
        [Direction::North, Direction::East, Direction::South, Direction::West];

    pub fn flip(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    pub fn turn_left(self) -> Self {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    pub fn turn_right(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// The neighbouring coordinate one step in this direction.
    pub fn advance(self, from: Coord) -> Coord {
        let (dx, dy) = self.delta();
        from.offset(dx, dy)
    }

    /// Direction of a single orthogonal step, if `to` is adjacent to `from`.
    pub fn between(from: Coord, to: Coord) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.advance(from) == to)
    }

    pub fn to_char(self) -> char {
        match self {
            Direction::North => 'N',
            Direction::East => 'E',
            Direction::South => 'S',
            Direction::West => 'W',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'N' => Some(Direction::North),
            'E' => Some(Direction::East),
            'S' => Some(Direction::South),
            'W' => Some(Direction::West),
            _ => None,
        }
    }
}
