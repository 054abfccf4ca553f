use std::sync::mpsc::Sender;
use std::sync::Mutex;

use super::state::{MoveSignal, SessionState};
use crate::engine::grid::Direction;
use crate::service::BoardId;

/// Update is what a controller tells the presentation layer.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Update {
    /// The full session state after any change.
    Snapshot(BoardId, Box<SessionState>),
    /// A hint arrived.
    Suggested(BoardId, Direction),
    /// A move happened; show the cue until the matching `MoveExpired`.
    MovePerformed(BoardId, MoveSignal),
    MoveExpired(BoardId, u64),
}

impl Update {
    pub(crate) fn board(&self) -> BoardId {
        match self {
            Self::Snapshot(board, _)
            | Self::Suggested(board, _)
            | Self::MovePerformed(board, _)
            | Self::MoveExpired(board, _) => *board,
        }
    }
}

/// PresentationSink consumes controller updates. Implementations are called from the
/// controller's worker threads and must not block for long.
pub(crate) trait PresentationSink: Send + Sync {
    fn publish(&self, update: Update);
}

/// ChannelSink hands updates to whoever owns the receiving end, typically the render loop.
pub(crate) struct ChannelSink {
    tx: Mutex<Sender<Update>>,
}

impl ChannelSink {
    pub(crate) fn new(tx: Sender<Update>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl PresentationSink for ChannelSink {
    fn publish(&self, update: Update) {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        if tx.send(update).is_err() {
            log::debug!("presentation receiver is gone, dropping update");
        }
    }
}
