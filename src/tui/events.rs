use std::time::Duration;

use crate::engine::grid::Direction;
use crate::error::Result;

pub(crate) trait EventSource {
    /// Waits up to `timeout` for the next event.
    fn next_event(&self, timeout: Duration) -> Result<Option<Event>>;
}

pub(crate) enum Event {
    UserInput(UserInput),
    Resize,
}

/// UserInput is every intent the player can express to the focused board.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum UserInput {
    Direction(Direction),
    NewGame,
    Hint,
    NextMode,
    StartAutoPlay,
    Stop,
    RunBatch,
    DepthUp,
    DepthDown,
    NextAlgorithm,
    SwitchBoard,
    Quit,
}
