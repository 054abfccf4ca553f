use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use super::{AiMove, Algorithm, BatchReport, BoardId, GameSnapshot, Hint, MoveService, Session};
use crate::engine::board::Board;
use crate::engine::grid::{self, Direction, Grid};
use crate::error::{Error, Result};

/// The order the offline fallback policy tries directions in.
const FALLBACK_ORDER: [Direction; 4] = [
    Direction::Up,
    Direction::Left,
    Direction::Right,
    Direction::Down,
];

const DEFAULT_DEPTH: u8 = 3;

struct LocalBoard {
    board: Board,
    username: String,
    depth: u8,
}

impl LocalBoard {
    fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            grid: self.board.grid(),
            score: self.board.score(),
            game_over: self.board.is_game_over(),
        }
    }
}

/// LocalService plays every board in-process on top of the engine so the client works
/// without a remote service.
///
/// It carries no search algorithm: AI moves, hints and batch games all use a fixed
/// fallback policy that takes the first direction in `FALLBACK_ORDER` that changes the
/// grid, whatever algorithm or depth was requested.
pub(crate) struct LocalService {
    session: Session,
    boards: Mutex<HashMap<BoardId, LocalBoard>>,
    rng: Mutex<SmallRng>,
}

impl LocalService {
    /// Serve `session` only, seeding every board from `rng`.
    pub(crate) fn new(session: Session, rng: SmallRng) -> Self {
        Self {
            session,
            boards: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    fn check(&self, session: &Session) -> Result<()> {
        if *session != self.session {
            log::warn!("rejecting call for unknown session {}", session);
            return Err(Error::InvalidSession(session.clone()));
        }
        Ok(())
    }

    fn boards(&self) -> MutexGuard<'_, HashMap<BoardId, LocalBoard>> {
        self.boards.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn new_board(&self) -> Board {
        let seed = self.rng.lock().unwrap_or_else(|e| e.into_inner()).next_u64();
        Board::new(SmallRng::seed_from_u64(seed))
    }

    fn with_board<T>(
        &self,
        session: &Session,
        id: BoardId,
        f: impl FnOnce(&mut LocalBoard) -> T,
    ) -> Result<T> {
        self.check(session)?;
        let mut boards = self.boards();
        let board = boards.get_mut(&id).ok_or(Error::UnknownBoard(id))?;
        Ok(f(board))
    }
}

/// The first direction in `FALLBACK_ORDER` that changes the grid.
fn fallback_direction(grid: &Grid) -> Option<Direction> {
    FALLBACK_ORDER
        .iter()
        .copied()
        .find(|d| grid::shift(grid, *d).changed)
}

impl MoveService for LocalService {
    fn start_new_game(
        &self,
        session: &Session,
        board: BoardId,
        username: &str,
    ) -> Result<GameSnapshot> {
        self.check(session)?;
        let local = LocalBoard {
            board: self.new_board(),
            username: username.to_string(),
            depth: self
                .boards()
                .get(&board)
                .map_or(DEFAULT_DEPTH, |b| b.depth),
        };
        let snapshot = local.snapshot();
        self.boards().insert(board, local);
        log::debug!("board {} started a local game for {}", board, username);
        Ok(snapshot)
    }

    fn apply_move(
        &self,
        session: &Session,
        board: BoardId,
        direction: Direction,
    ) -> Result<GameSnapshot> {
        self.with_board(session, board, |b| {
            if b.board.shift(direction).is_none() {
                log::trace!("board {} did not change moving {}", board, direction);
            }
            b.snapshot()
        })
    }

    fn compute_ai_move(
        &self,
        session: &Session,
        board: BoardId,
        algorithm: Algorithm,
    ) -> Result<AiMove> {
        self.with_board(session, board, |b| {
            log::trace!(
                "board {} ai move ({} at depth {}) using fallback policy",
                board,
                algorithm,
                b.depth
            );
            let direction = fallback_direction(&b.board.grid());
            if let Some(direction) = direction {
                b.board.shift(direction);
            }
            AiMove {
                snapshot: b.snapshot(),
                suggested_move: direction.map(|d| d.as_str().to_string()),
            }
        })
    }

    fn compute_hint(
        &self,
        session: &Session,
        board: BoardId,
        _algorithm: Algorithm,
    ) -> Result<Hint> {
        self.with_board(session, board, |b| Hint {
            suggested_move: fallback_direction(&b.board.grid()).map(|d| d.as_str().to_string()),
        })
    }

    fn configure_search(&self, session: &Session, board: BoardId, depth: u8) -> Result<()> {
        if !(1..=6).contains(&depth) {
            return Err(Error::ConfigurationRejected { depth });
        }
        self.with_board(session, board, |b| b.depth = depth)
    }

    fn run_batch(
        &self,
        session: &Session,
        board: BoardId,
        count: u32,
        algorithm: Algorithm,
        username: &str,
    ) -> Result<BatchReport> {
        self.check(session)?;
        log::debug!(
            "board {} running {} local games ({}) for {}",
            board,
            count,
            algorithm,
            username
        );
        let mut report = BatchReport::default();
        for _ in 0..count {
            let mut game = self.new_board();
            while let Some(direction) = fallback_direction(&game.grid()) {
                game.shift(direction);
            }
            *report.tile_histogram.entry(game.max_tile()).or_insert(0) += 1;
            report.total_games += 1;
        }
        Ok(report)
    }

    fn update_username(&self, session: &Session, board: BoardId, username: &str) -> Result<()> {
        self.with_board(session, board, |b| b.username = username.to_string())
    }

    fn clear_board(&self, session: &Session, board: BoardId) -> Result<()> {
        self.check(session)?;
        if let Some(b) = self.boards().remove(&board) {
            log::debug!(
                "cleared board {} of {} after {} moves",
                board,
                b.username,
                b.board.moves()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn service() -> LocalService {
        LocalService::new(Session::new("local"), SmallRng::seed_from_u64(42))
    }

    #[test]
    fn new_game_has_two_tiles() {
        let s = service();
        let snap = s
            .start_new_game(&Session::new("local"), 1, "Player1")
            .expect("starting a game");
        assert_eq!(grid::empty_cells(&snap.grid).len(), 14);
        assert_eq!(snap.score, 0);
        assert!(!snap.game_over);
    }

    #[test]
    fn rejects_foreign_session() {
        let s = service();
        let err = s
            .start_new_game(&Session::new("stale"), 1, "Player1")
            .expect_err("foreign session should be rejected");
        assert!(err.is_session_expired());
        let err = s
            .run_batch(&Session::new("stale"), 1, 3, Algorithm::Greedy, "Player1")
            .expect_err("foreign session should be rejected");
        assert!(err.is_session_expired());
    }

    #[test]
    fn moves_require_a_started_board() {
        let s = service();
        let err = s
            .apply_move(&Session::new("local"), 9, Direction::Left)
            .expect_err("board 9 was never started");
        assert!(matches!(err, Error::UnknownBoard(9)));
    }

    #[test]
    fn hint_does_not_mutate() {
        let s = service();
        let session = Session::new("local");
        s.start_new_game(&session, 1, "Player1").expect("starting a game");
        let first = s
            .compute_hint(&session, 1, Algorithm::Expectimax)
            .expect("hint");
        let second = s
            .compute_hint(&session, 1, Algorithm::Expectimax)
            .expect("hint");
        let step = s
            .compute_ai_move(&session, 1, Algorithm::Expectimax)
            .expect("ai move");
        assert!(first.suggested_move.is_some());
        assert_eq!(first, second);
        assert_eq!(first.suggested_move, step.suggested_move);
    }

    #[test]
    fn ai_move_reports_direction_taken() {
        let s = service();
        let session = Session::new("local");
        let start = s.start_new_game(&session, 1, "Player1").expect("starting a game");
        let step = s
            .compute_ai_move(&session, 1, Algorithm::Greedy)
            .expect("ai move");
        let direction: Direction = step
            .suggested_move
            .as_deref()
            .expect("a fresh game always has a move")
            .parse()
            .expect("canonical direction");
        let moved = grid::shift(&start.grid, direction);
        assert!(moved.changed);
        assert_eq!(step.snapshot.score, moved.score_delta);
    }

    #[test]
    fn depth_out_of_range_rejected() {
        let s = service();
        let session = Session::new("local");
        s.start_new_game(&session, 1, "Player1").expect("starting a game");
        assert!(matches!(
            s.configure_search(&session, 1, 7),
            Err(Error::ConfigurationRejected { depth: 7 })
        ));
        assert!(s.configure_search(&session, 1, 6).is_ok());
    }

    #[test]
    fn batch_histogram_counts_every_game() {
        let s = service();
        let report = s
            .run_batch(&Session::new("local"), 1, 5, Algorithm::Expectimax, "Player1")
            .expect("batch");
        assert_eq!(report.total_games, 5);
        assert_eq!(report.tile_histogram.values().sum::<u32>(), 5);
        assert!(report.tile_histogram.keys().all(|tile| tile.is_power_of_two()));
    }

    #[test]
    fn clear_board_forgets_it() {
        let s = service();
        let session = Session::new("local");
        s.start_new_game(&session, 2, "Player2").expect("starting a game");
        s.clear_board(&session, 2).expect("clearing");
        assert!(s.apply_move(&session, 2, Direction::Down).is_err());
    }
}
