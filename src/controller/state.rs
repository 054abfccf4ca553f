use std::collections::BTreeMap;

use crate::engine::grid::{Card, Direction, Grid, Score};
use crate::service::Algorithm;

pub(crate) const MIN_SEARCH_DEPTH: u8 = 1;
pub(crate) const MAX_SEARCH_DEPTH: u8 = 6;
pub(crate) const DEFAULT_SEARCH_DEPTH: u8 = 3;

/// Mode is what the player is doing with a board. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub(crate) enum Mode {
    #[default]
    Manual,
    Ai,
    Batch,
}

impl Mode {
    pub(crate) fn next(&self) -> Mode {
        match self {
            Self::Manual => Self::Ai,
            Self::Ai => Self::Batch,
            Self::Batch => Self::Manual,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "MANUAL"),
            Self::Ai => write!(f, "AI"),
            Self::Batch => write!(f, "BATCH"),
        }
    }
}

/// Phase is the controller state derived from the mode and the run flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Phase {
    Idle,
    ManualActive,
    AiRunning,
    AiIdle,
    BatchRunning,
}

/// A transient "a move just happened" cue. The serial changes on every move so the same
/// direction twice in a row is still two distinct events.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct MoveSignal {
    pub(crate) direction: Direction,
    pub(crate) serial: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct BatchProgress {
    pub(crate) completed: u32,
    pub(crate) total: u32,
    pub(crate) tile_histogram: BTreeMap<Card, u32>,
}

impl BatchProgress {
    pub(crate) fn started(total: u32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Histogram entries with their share of the completed games, highest tile first.
    pub(crate) fn shares(&self) -> Vec<(Card, u32, f64)> {
        let completed = f64::from(self.completed.max(1));
        self.tile_histogram
            .iter()
            .rev()
            .map(|(tile, count)| (*tile, *count, f64::from(*count) * 100.0 / completed))
            .collect()
    }
}

/// SessionState is everything one board session shows and remembers.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SessionState {
    pub(crate) grid: Grid,
    pub(crate) score: Score,
    pub(crate) mode: Mode,
    pub(crate) algorithm: Algorithm,
    pub(crate) search_depth: u8,
    pub(crate) game_over: bool,
    pub(crate) suggested_direction: Option<Direction>,
    pub(crate) is_running: bool,
    pub(crate) is_hint_loading: bool,
    pub(crate) batch_running: bool,
    pub(crate) batch: BatchProgress,
    pub(crate) last_move: Option<MoveSignal>,
    pub(crate) username: String,
    pub(crate) started: bool,
}

impl SessionState {
    pub(crate) fn new(username: impl Into<String>) -> Self {
        Self {
            grid: Grid::EMPTY,
            score: 0,
            mode: Mode::default(),
            algorithm: Algorithm::default(),
            search_depth: DEFAULT_SEARCH_DEPTH,
            game_over: false,
            suggested_direction: None,
            is_running: false,
            is_hint_loading: false,
            batch_running: false,
            batch: BatchProgress::default(),
            last_move: None,
            username: username.into(),
            started: false,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        if !self.started {
            return Phase::Idle;
        }
        match self.mode {
            Mode::Manual => Phase::ManualActive,
            Mode::Ai if self.is_running => Phase::AiRunning,
            Mode::Ai => Phase::AiIdle,
            Mode::Batch if self.batch_running => Phase::BatchRunning,
            Mode::Batch => Phase::Idle,
        }
    }

    /// Whether a manual move would be accepted right now.
    pub(crate) fn accepts_moves(&self) -> bool {
        self.mode == Mode::Manual && !self.is_running && !self.batch_running && !self.game_over
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::not_started(false, Mode::Ai, true, false, Phase::Idle)]
    #[case::manual(true, Mode::Manual, false, false, Phase::ManualActive)]
    #[case::ai_running(true, Mode::Ai, true, false, Phase::AiRunning)]
    #[case::ai_idle(true, Mode::Ai, false, false, Phase::AiIdle)]
    #[case::batch_running(true, Mode::Batch, false, true, Phase::BatchRunning)]
    #[case::batch_idle(true, Mode::Batch, false, false, Phase::Idle)]
    fn phase(
        #[case] started: bool,
        #[case] mode: Mode,
        #[case] is_running: bool,
        #[case] batch_running: bool,
        #[case] expected: Phase,
    ) {
        let mut state = SessionState::new("Player1");
        state.started = started;
        state.mode = mode;
        state.is_running = is_running;
        state.batch_running = batch_running;
        assert_eq!(state.phase(), expected);
    }

    #[test]
    fn shares_highest_tile_first() {
        let progress = BatchProgress {
            completed: 4,
            total: 4,
            tile_histogram: BTreeMap::from([(256, 1), (512, 3)]),
        };
        assert_eq!(progress.shares(), vec![(512, 3, 75.0), (256, 1, 25.0)]);
    }
}
