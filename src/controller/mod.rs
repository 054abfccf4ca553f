use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) mod cancel;
pub(crate) mod sink;
pub(crate) mod state;

use cancel::CancelToken;
use sink::{PresentationSink, Update};
use state::{BatchProgress, Mode, MoveSignal, Phase, SessionState};
use state::{MAX_SEARCH_DEPTH, MIN_SEARCH_DEPTH};

use crate::engine::grid::Direction;
use crate::error::{Error, Result};
use crate::service::{Algorithm, BoardId, GameSnapshot, MoveService, Session};

/// How long autonomous play pauses between steps and how long a move cue stays visible.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Timings {
    pub(crate) step_delay: Duration,
    pub(crate) move_signal_ttl: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(200),
            move_signal_ttl: Duration::from_millis(300),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// The part of a controller its worker and timer threads need.
struct Shared {
    board: BoardId,
    session: Session,
    service: Arc<dyn MoveService>,
    sink: Arc<dyn PresentationSink>,
    timings: Timings,
    state: Mutex<SessionState>,
    serial: AtomicU64,
    batch_in_flight: AtomicBool,
    teardown: CancelToken,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }

    fn publish_snapshot(&self) {
        let snapshot = self.state().clone();
        self.sink
            .publish(Update::Snapshot(self.board, Box::new(snapshot)));
    }

    /// Replaces the grid with the authoritative one. A pending hint belongs to the old grid.
    fn apply(&self, snapshot: &GameSnapshot) {
        let mut s = self.state();
        s.grid = snapshot.grid;
        s.score = snapshot.score;
        s.game_over = snapshot.game_over;
        s.suggested_direction = None;
    }

    /// Raises a fresh move cue and arms its expiry timer.
    fn signal_move(self: &Arc<Self>, direction: Direction) {
        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        let signal = MoveSignal { direction, serial };
        self.state().last_move = Some(signal);
        self.sink.publish(Update::MovePerformed(self.board, signal));

        let weak = Arc::downgrade(self);
        let teardown = self.teardown.clone();
        let ttl = self.timings.move_signal_ttl;
        thread::spawn(move || {
            if teardown.wait_timeout(ttl) {
                return;
            }
            if let Some(shared) = weak.upgrade() {
                shared.expire_move(serial);
            }
        });
    }

    fn expire_move(&self, serial: u64) {
        let expired = {
            let mut s = self.state();
            match s.last_move {
                Some(signal) if signal.serial == serial => {
                    s.last_move = None;
                    true
                }
                _ => false,
            }
        };
        if expired {
            self.sink.publish(Update::MoveExpired(self.board, serial));
            self.publish_snapshot();
        }
    }

    /// The auto-play loop. Cancellation is only observed between steps: a step that is
    /// already in flight always lands.
    fn autoplay(self: Arc<Self>, token: CancelToken) {
        log::debug!("board {} auto-play started", self.board);
        loop {
            if token.is_cancelled() {
                break;
            }
            let algorithm = self.state().algorithm;
            let step = match self
                .service
                .compute_ai_move(&self.session, self.board, algorithm)
            {
                Ok(step) => step,
                Err(e) => {
                    log::error!("board {} ai step failed: {}", self.board, e);
                    break;
                }
            };

            let direction = match step.suggested_move.as_deref() {
                Some(raw) => match raw.to_ascii_uppercase().parse::<Direction>() {
                    Ok(d) => Some(d),
                    Err(e) => {
                        log::warn!("board {} {}", self.board, Error::InvalidResponse(e));
                        None
                    }
                },
                None => None,
            };

            // clear the previous cue first so a repeated direction is a new event
            self.state().last_move = None;
            self.apply(&step.snapshot);
            self.publish_snapshot();
            if let Some(direction) = direction {
                self.signal_move(direction);
                self.publish_snapshot();
            }

            if step.snapshot.game_over {
                log::info!(
                    "board {} game over at score {}",
                    self.board,
                    step.snapshot.score
                );
                break;
            }
            if token.wait_timeout(self.timings.step_delay) {
                break;
            }
        }
        self.state().is_running = false;
        self.publish_snapshot();
        log::debug!("board {} auto-play stopped", self.board);
    }
}

struct Worker {
    token: CancelToken,
    handle: JoinHandle<()>,
}

impl Worker {
    fn finish(self) {
        self.token.cancel();
        if self.handle.join().is_err() {
            log::error!("auto-play worker panicked");
        }
    }
}

/// PlayController sequences everything that happens to one board: manual moves, hints,
/// auto-play and batch runs. At most one autonomous loop runs per controller.
///
/// Operations take `&self` so a controller can be shared with the threads that call
/// its blocking operations (hints, batches).
pub(crate) struct PlayController {
    shared: Arc<Shared>,
    autoplay: Mutex<Option<Worker>>,
    batch_token: Mutex<Option<CancelToken>>,
}

impl PlayController {
    pub(crate) fn new(
        board: BoardId,
        session: Session,
        username: impl Into<String>,
        service: Arc<dyn MoveService>,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        Self::with_timings(board, session, username, service, sink, Timings::default())
    }

    pub(crate) fn with_timings(
        board: BoardId,
        session: Session,
        username: impl Into<String>,
        service: Arc<dyn MoveService>,
        sink: Arc<dyn PresentationSink>,
        timings: Timings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                board,
                session,
                service,
                sink,
                timings,
                state: Mutex::new(SessionState::new(username)),
                serial: AtomicU64::new(0),
                batch_in_flight: AtomicBool::new(false),
                teardown: CancelToken::new(),
            }),
            autoplay: Mutex::new(None),
            batch_token: Mutex::new(None),
        }
    }

    pub(crate) fn board(&self) -> BoardId {
        self.shared.board
    }

    pub(crate) fn snapshot(&self) -> SessionState {
        self.shared.state().clone()
    }

    pub(crate) fn phase(&self) -> Phase {
        self.shared.state().phase()
    }

    /// Cancels whatever runs, waits for an in-flight step to land and starts over.
    /// Auto-play cannot start until the reset has landed.
    pub(crate) fn new_game(&self) -> Result<()> {
        let mut autoplay = lock(&self.autoplay);
        if let Some(worker) = autoplay.take() {
            worker.finish();
        }
        if let Some(token) = lock(&self.batch_token).take() {
            token.cancel();
        }
        let username = {
            let mut s = self.shared.state();
            s.is_running = false;
            s.batch_running = false;
            s.suggested_direction = None;
            s.last_move = None;
            s.batch = BatchProgress::default();
            s.username.clone()
        };

        let shared = &self.shared;
        match shared
            .service
            .start_new_game(&shared.session, shared.board, &username)
        {
            Ok(snapshot) => {
                let mut s = shared.state();
                s.grid = snapshot.grid;
                s.score = snapshot.score;
                s.game_over = false;
                s.suggested_direction = None;
                s.started = true;
            }
            Err(e) => {
                log::error!("board {} could not start a new game: {}", shared.board, e);
                shared.publish_snapshot();
                return Err(e);
            }
        }
        log::info!("board {} new game for {}", shared.board, username);
        shared.publish_snapshot();
        Ok(())
    }

    /// A manual move. Ignored unless the board is in manual mode and nothing else drives
    /// it. On failure the session state is left untouched.
    pub(crate) fn shift(&self, direction: Direction) -> Result<()> {
        let shared = &self.shared;
        if !shared.state().accepts_moves() {
            log::debug!("board {} ignoring {} move", shared.board, direction);
            return Ok(());
        }
        let snapshot = shared
            .service
            .apply_move(&shared.session, shared.board, direction)
            .map_err(|e| {
                log::error!("board {} move {} failed: {}", shared.board, direction, e);
                e
            })?;
        shared.apply(&snapshot);
        shared.signal_move(direction);
        shared.publish_snapshot();
        Ok(())
    }

    /// Asks for a suggested direction. Any failure, or anything but one of the four
    /// canonical directions, resolves to no suggestion.
    pub(crate) fn request_hint(&self) -> Option<Direction> {
        let shared = &self.shared;
        let (algorithm, grid) = {
            let mut s = shared.state();
            if s.is_hint_loading || s.game_over {
                return None;
            }
            s.is_hint_loading = true;
            (s.algorithm, s.grid)
        };
        shared.publish_snapshot();

        let suggestion = match shared
            .service
            .compute_hint(&shared.session, shared.board, algorithm)
        {
            Ok(hint) => match hint.suggested_move.map(|raw| raw.parse::<Direction>()) {
                Some(Ok(direction)) => Some(direction),
                Some(Err(e)) => {
                    log::warn!("board {} hint: {}", shared.board, Error::InvalidResponse(e));
                    None
                }
                None => None,
            },
            Err(e) => {
                log::warn!("board {} hint unavailable: {}", shared.board, e);
                None
            }
        };

        let suggestion = {
            let mut s = shared.state();
            s.is_hint_loading = false;
            // a hint is only good for the grid and algorithm it was computed for
            let fresh = suggestion.filter(|_| s.grid == grid && s.algorithm == algorithm);
            s.suggested_direction = fresh;
            fresh
        };
        if let Some(direction) = suggestion {
            shared.sink.publish(Update::Suggested(shared.board, direction));
        }
        shared.publish_snapshot();
        suggestion
    }

    pub(crate) fn set_algorithm(&self, algorithm: Algorithm) {
        {
            let mut s = self.shared.state();
            s.algorithm = algorithm;
            s.suggested_direction = None;
        }
        self.shared.publish_snapshot();
    }

    pub(crate) fn set_search_depth(&self, depth: u8) -> Result<()> {
        if !(MIN_SEARCH_DEPTH..=MAX_SEARCH_DEPTH).contains(&depth) {
            return Err(Error::ConfigurationRejected { depth });
        }
        {
            let mut s = self.shared.state();
            s.search_depth = depth;
            s.suggested_direction = None;
        }
        self.shared.publish_snapshot();
        let shared = &self.shared;
        shared
            .service
            .configure_search(&shared.session, shared.board, depth)
            .map_err(|e| {
                log::error!("board {} could not set depth {}: {}", shared.board, depth, e);
                e
            })
    }

    pub(crate) fn set_username(&self, username: &str) {
        let started = {
            let mut s = self.shared.state();
            s.username = username.to_string();
            s.started
        };
        self.shared.publish_snapshot();
        if !started {
            return;
        }
        let shared = &self.shared;
        if let Err(e) = shared
            .service
            .update_username(&shared.session, shared.board, username)
        {
            log::error!("board {} could not update username: {}", shared.board, e);
        }
    }

    /// Starts the auto-play loop on its own thread. Ignored while anything already runs or
    /// the game is over.
    pub(crate) fn start_autoplay(&self) -> Result<()> {
        let mut autoplay = lock(&self.autoplay);
        if self.shared.state().is_running {
            return Ok(());
        }
        // a stopped loop may still be finishing its last step
        if let Some(prev) = autoplay.take() {
            prev.finish();
        }
        {
            let mut s = self.shared.state();
            if s.batch_running || s.game_over {
                return Ok(());
            }
            s.is_running = true;
            s.suggested_direction = None;
        }
        self.shared.publish_snapshot();

        let token = CancelToken::new();
        let shared = self.shared.clone();
        let loop_token = token.clone();
        let spawned = thread::Builder::new()
            .name(format!("autoplay-{}", self.shared.board))
            .spawn(move || shared.autoplay(loop_token));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.state().is_running = false;
                self.shared.publish_snapshot();
                return Err(e.into());
            }
        };
        *autoplay = Some(Worker { token, handle });
        Ok(())
    }

    /// Cancels auto-play and batch runs without waiting for them. Idempotent.
    pub(crate) fn stop(&self) {
        if let Some(worker) = lock(&self.autoplay).as_ref() {
            worker.token.cancel();
        }
        if let Some(token) = lock(&self.batch_token).as_ref() {
            token.cancel();
        }
        {
            let mut s = self.shared.state();
            s.is_running = false;
            s.batch_running = false;
            s.suggested_direction = None;
            s.last_move = None;
        }
        self.shared.publish_snapshot();
    }

    pub(crate) fn set_mode(&self, mode: Mode) {
        self.stop();
        {
            let mut s = self.shared.state();
            s.mode = mode;
            s.batch = BatchProgress::default();
            s.suggested_direction = None;
            s.last_move = None;
        }
        log::debug!("board {} switched to {} mode", self.shared.board, mode);
        self.shared.publish_snapshot();
    }

    /// Runs `count` games on the service as one request and keeps the resulting
    /// histogram. Returns `None` when ignored because something else is running.
    ///
    /// An expired session comes back as `Error::InvalidSession`; nothing is stored then.
    pub(crate) fn run_batch(&self, count: u32) -> Result<Option<BatchProgress>> {
        let shared = &self.shared;
        if count == 0 {
            log::debug!("board {} ignoring empty batch", shared.board);
            return Ok(None);
        }
        let (algorithm, username, token) = {
            let mut s = shared.state();
            if s.batch_running || s.is_running {
                return Ok(None);
            }
            if shared
                .batch_in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Ok(None);
            }
            s.batch_running = true;
            s.batch = BatchProgress::started(count);
            // stop() must find the token as soon as the batch shows as running
            let token = CancelToken::new();
            *lock(&self.batch_token) = Some(token.clone());
            (s.algorithm, s.username.clone(), token)
        };
        shared.publish_snapshot();

        log::info!("board {} batch of {} games ({})", shared.board, count, algorithm);
        let result =
            shared
                .service
                .run_batch(&shared.session, shared.board, count, algorithm, &username);
        shared.batch_in_flight.store(false, Ordering::SeqCst);

        let outcome = match result {
            Ok(report) => {
                let progress = BatchProgress {
                    completed: if report.total_games == 0 {
                        count
                    } else {
                        report.total_games
                    },
                    total: count,
                    tile_histogram: report.tile_histogram,
                };
                let mut s = shared.state();
                s.batch_running = false;
                // a stopped batch still reports to its caller but no longer owns the board
                if !token.is_cancelled() {
                    s.batch = progress.clone();
                }
                Ok(Some(progress))
            }
            Err(e) => {
                if e.is_session_expired() {
                    log::warn!("board {} batch rejected, session expired", shared.board);
                } else {
                    log::error!("board {} batch failed: {}", shared.board, e);
                }
                shared.state().batch_running = false;
                Err(e)
            }
        };
        shared.publish_snapshot();
        outcome
    }

    /// Waits for the auto-play loop, if any, to exit.
    pub(crate) fn join_autoplay(&self) {
        let worker = lock(&self.autoplay).take();
        if let Some(worker) = worker {
            if worker.handle.join().is_err() {
                log::error!("board {} auto-play worker panicked", self.shared.board);
            }
        }
    }

    /// Stops everything, waits for the loop and releases the board on the service.
    pub(crate) fn close(self) -> Result<()> {
        self.stop();
        self.halt();
        let shared = &self.shared;
        shared.service.clear_board(&shared.session, shared.board)
    }

    fn halt(&self) {
        let worker = lock(&self.autoplay).take();
        if let Some(worker) = worker {
            worker.finish();
        }
        if let Some(token) = lock(&self.batch_token).take() {
            token.cancel();
        }
    }
}

impl Drop for PlayController {
    fn drop(&mut self) {
        self.shared.teardown.cancel();
        self.halt();
    }
}
