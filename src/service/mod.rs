use std::collections::BTreeMap;

use crate::engine::grid::{Card, Direction, Grid, Score};
use crate::error::Result;

pub(crate) mod local;

pub(crate) type BoardId = u32;

/// Session is the identity every move service call is keyed by. It is handed out by
/// whoever bootstrapped the session and never mutated by the controller.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct Session(String);

impl Session {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The search algorithms the move service knows how to run.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, clap::ValueEnum)]
pub(crate) enum Algorithm {
    #[default]
    Expectimax,
    Greedy,
    Bfs,
    Dls,
    Ids,
    Minimax,
}

impl Algorithm {
    pub(crate) const ALL: [Algorithm; 6] = [
        Algorithm::Expectimax,
        Algorithm::Greedy,
        Algorithm::Bfs,
        Algorithm::Dls,
        Algorithm::Ids,
        Algorithm::Minimax,
    ];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Expectimax => "expectimax",
            Self::Greedy => "greedy",
            Self::Bfs => "bfs",
            Self::Dls => "dls",
            Self::Ids => "ids",
            Self::Minimax => "minimax",
        }
    }

    /// The algorithm following this one, wrapping around.
    pub(crate) fn next(&self) -> Algorithm {
        let pos = Self::ALL.iter().position(|a| a == self).unwrap_or(0);
        Self::ALL[(pos + 1) % Self::ALL.len()]
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The authoritative state of a board after a service call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct GameSnapshot {
    pub(crate) grid: Grid,
    pub(crate) score: Score,
    pub(crate) game_over: bool,
}

/// An AI step: the board after the move plus the direction the service chose, as sent.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AiMove {
    pub(crate) snapshot: GameSnapshot,
    pub(crate) suggested_move: Option<String>,
}

/// A read-only suggestion, as sent. Validation is up to the caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Hint {
    pub(crate) suggested_move: Option<String>,
}

/// The outcome of a server side batch: games played and how often each maximum tile was
/// reached.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct BatchReport {
    pub(crate) total_games: u32,
    pub(crate) tile_histogram: BTreeMap<Card, u32>,
}

/// MoveService is the authority on a board's state and the home of the search algorithms.
///
/// Every call is keyed by the session handle and a board id. An unknown or expired session
/// must be answered with `Error::InvalidSession`, never a generic transport failure.
pub(crate) trait MoveService: Send + Sync {
    fn start_new_game(
        &self,
        session: &Session,
        board: BoardId,
        username: &str,
    ) -> Result<GameSnapshot>;

    fn apply_move(
        &self,
        session: &Session,
        board: BoardId,
        direction: Direction,
    ) -> Result<GameSnapshot>;

    /// Performs one move chosen by `algorithm` and reports which direction it took.
    fn compute_ai_move(
        &self,
        session: &Session,
        board: BoardId,
        algorithm: Algorithm,
    ) -> Result<AiMove>;

    /// Suggests a direction without touching the board.
    fn compute_hint(&self, session: &Session, board: BoardId, algorithm: Algorithm)
        -> Result<Hint>;

    fn configure_search(&self, session: &Session, board: BoardId, depth: u8) -> Result<()>;

    fn run_batch(
        &self,
        session: &Session,
        board: BoardId,
        count: u32,
        algorithm: Algorithm,
        username: &str,
    ) -> Result<BatchReport>;

    fn update_username(&self, session: &Session, board: BoardId, username: &str) -> Result<()>;

    fn clear_board(&self, session: &Session, board: BoardId) -> Result<()>;
}
