use rand::distributions::Distribution;
use rand::distributions::WeightedIndex;
use rand::seq::SliceRandom;
use rand::Rng;

pub(crate) type Card = u32;

pub(crate) type Score = u64;

const SIZE: usize = 4;

const NEW_CARD_CHOICES: [Card; 2] = [2, 4];
const NEW_CARD_WEIGHTS: [u8; 2] = [9, 1];

/// Direction represents the direction a move slides the tiles towards.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub(crate) const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }

    pub(crate) fn arrow(&self) -> char {
        match self {
            Self::Up => '↑',
            Self::Down => '↓',
            Self::Left => '←',
            Self::Right => '→',
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Only the canonical upper-case names parse; anything else is not a direction.
impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            other => Err(format!("not a canonical direction: {other:?}")),
        }
    }
}

/// Idx addresses a single cell by row and column.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub(crate) struct Idx(pub(crate) usize, pub(crate) usize);

impl std::fmt::Display for Idx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gidx({0},{1})", self.0, self.1)
    }
}

impl Idx {
    pub(crate) fn row(&self) -> usize {
        self.0
    }

    pub(crate) fn col(&self) -> usize {
        self.1
    }
}

/// Grid is an immutable snapshot of the 4x4 board. Zero marks an empty cell.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub(crate) struct Grid([[Card; SIZE]; SIZE]);

impl From<[[Card; SIZE]; SIZE]> for Grid {
    fn from(rows: [[Card; SIZE]; SIZE]) -> Self {
        Grid(rows)
    }
}

impl std::fmt::Display for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.0.iter() {
            for value in row.iter() {
                write!(f, "{value:>6}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Grid {
    pub(crate) const EMPTY: Grid = Grid([[0; SIZE]; SIZE]);

    pub(crate) fn rows(&self) -> &[[Card; SIZE]; SIZE] {
        &self.0
    }

    pub(crate) fn get(&self, idx: &Idx) -> Card {
        self.0[idx.row()][idx.col()]
    }

    /// Returns a copy of the grid with the cell at idx replaced.
    pub(crate) fn with(&self, idx: &Idx, value: Card) -> Grid {
        let mut slots = self.0;
        slots[idx.row()][idx.col()] = value;
        Grid(slots)
    }

    pub(crate) fn max_tile(&self) -> Card {
        self.0.iter().flatten().copied().max().unwrap_or(0)
    }

    fn transpose(&self) -> Grid {
        let mut slots = [[0; SIZE]; SIZE];
        for (r, row) in self.0.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                slots[c][r] = *value;
            }
        }
        Grid(slots)
    }

    fn reverse_rows(&self) -> Grid {
        let mut slots = self.0;
        for row in slots.iter_mut() {
            row.reverse();
        }
        Grid(slots)
    }
}

/// The outcome of compressing a single line towards its start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LineResult {
    pub(crate) line: [Card; SIZE],
    pub(crate) score_delta: Score,
    pub(crate) changed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct MoveResult {
    pub(crate) grid: Grid,
    pub(crate) score_delta: Score,
    pub(crate) changed: bool,
}

impl MoveResult {
    fn map_grid(self, f: impl FnOnce(&Grid) -> Grid) -> MoveResult {
        MoveResult {
            grid: f(&self.grid),
            ..self
        }
    }
}

/// Slides the non-zero values of a line to its start, merging equal neighbours.
///
/// A merged tile never merges again within the same call, so `[2, 2, 4, 4]` becomes
/// `[4, 8, 0, 0]` rather than `[8, 4, 0, 0]`.
pub(crate) fn compress_line(line: [Card; SIZE]) -> LineResult {
    let tiles = line.iter().copied().filter(|v| *v != 0).collect::<Vec<Card>>();
    let mut out = [0; SIZE];
    let mut score_delta: Score = 0;
    let mut pos = 0;
    let mut i = 0;
    while i < tiles.len() {
        match tiles.get(i + 1) {
            Some(next) if *next == tiles[i] => {
                let merged = tiles[i] * 2;
                out[pos] = merged;
                score_delta += Score::from(merged);
                i += 2;
            }
            _ => {
                out[pos] = tiles[i];
                i += 1;
            }
        }
        pos += 1;
    }
    LineResult {
        line: out,
        score_delta,
        changed: out != line,
    }
}

pub(crate) fn move_left(grid: &Grid) -> MoveResult {
    let mut slots = [[0; SIZE]; SIZE];
    let mut score_delta = 0;
    let mut changed = false;
    for (out, row) in slots.iter_mut().zip(grid.rows().iter()) {
        let res = compress_line(*row);
        *out = res.line;
        score_delta += res.score_delta;
        changed |= res.changed;
    }
    MoveResult {
        grid: Grid(slots),
        score_delta,
        changed,
    }
}

pub(crate) fn move_right(grid: &Grid) -> MoveResult {
    move_left(&grid.reverse_rows()).map_grid(Grid::reverse_rows)
}

pub(crate) fn move_up(grid: &Grid) -> MoveResult {
    move_left(&grid.transpose()).map_grid(Grid::transpose)
}

pub(crate) fn move_down(grid: &Grid) -> MoveResult {
    move_right(&grid.transpose()).map_grid(Grid::transpose)
}

pub(crate) fn shift(grid: &Grid, direction: Direction) -> MoveResult {
    match direction {
        Direction::Up => move_up(grid),
        Direction::Down => move_down(grid),
        Direction::Left => move_left(grid),
        Direction::Right => move_right(grid),
    }
}

/// All empty positions in row-major order.
pub(crate) fn empty_cells(grid: &Grid) -> Vec<Idx> {
    let mut cells = Vec::with_capacity(SIZE * SIZE);
    for (r, row) in grid.rows().iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if *value == 0 {
                cells.push(Idx(r, c));
            }
        }
    }
    cells
}

/// Places a 2 (nine times in ten) or a 4 on a uniformly chosen empty cell.
pub(crate) fn spawn_random_tile<R: Rng + ?Sized>(grid: &Grid, rng: &mut R) -> Grid {
    let cells = empty_cells(grid);
    let idx = match cells.choose(rng) {
        Some(idx) => idx,
        None => return *grid,
    };
    let weights =
        WeightedIndex::new(NEW_CARD_WEIGHTS).expect("NEW_CARD_WEIGHTS should never be empty");
    let value = NEW_CARD_CHOICES[weights.sample(rng)];
    grid.with(idx, value)
}

pub(crate) fn is_terminal(grid: &Grid) -> bool {
    empty_cells(grid).is_empty() && Direction::ALL.iter().all(|d| !shift(grid, *d).changed)
}
