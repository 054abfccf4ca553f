use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::controller::sink::Update;
use crate::controller::state::{Mode, Phase, SessionState, MAX_SEARCH_DEPTH, MIN_SEARCH_DEPTH};
use crate::controller::PlayController;
use crate::engine::grid::Card;
use crate::error::Result;
use crate::service::BoardId;
use crate::tui::events::{Event, EventSource, UserInput};
use crate::tui::renderer::{Renderer, Span, Style};

/// Generates one board panel, BOARD_WIDTH columns wide.
///
///  > Board 1 · Player1
///  MANUAL  expectimax d3  score 1024
///  +------+------+------+------+
///  |    2 |      |    4 |      |
///  +------+------+------+------+
///  ...
///  hint ← LEFT
///  ↑ UP
///
const BOARD_WIDTH: u16 = 36;
const BOARD_TOP: u16 = 2;
const GRID_BORDER: &str = "+------+------+------+------+";
const FRAME: Duration = Duration::from_millis(30);
const HELP: &str =
    "arrows move · n new · i hint · m mode · a auto · s stop · b batch · +/- depth · g algo · tab board · q quit";

pub(crate) struct Hint48<R: Renderer, E: EventSource> {
    renderer: R,
    event_source: E,
    boards: Vec<Arc<PlayController>>,
    views: HashMap<BoardId, SessionState>,
    focus: usize,
    updates: Receiver<Update>,
    notices_tx: Sender<String>,
    notices: Receiver<String>,
    status: Option<String>,
    batch_count: u32,
}

impl<R: Renderer, E: EventSource> Hint48<R, E> {
    pub(crate) fn new(
        boards: Vec<Arc<PlayController>>,
        updates: Receiver<Update>,
        renderer: R,
        event_source: E,
        batch_count: u32,
    ) -> Self {
        let (notices_tx, notices) = channel();
        let views = boards
            .iter()
            .map(|b| (b.board(), b.snapshot()))
            .collect();
        Self {
            renderer,
            event_source,
            boards,
            views,
            focus: 0,
            updates,
            notices_tx,
            notices,
            status: None,
            batch_count,
        }
    }

    pub(crate) fn run(mut self) -> Result<()> {
        match self.inner_run() {
            Err(e) => {
                self.renderer.recover();
                Err(e)
            }
            Ok(_) => Ok(()),
        }
    }

    fn inner_run(&mut self) -> Result<()> {
        let mut dirty = true;
        loop {
            while let Ok(update) = self.updates.try_recv() {
                self.absorb(update);
                dirty = true;
            }
            while let Ok(notice) = self.notices.try_recv() {
                self.status = Some(notice);
                dirty = true;
            }
            if dirty {
                self.draw()?;
                dirty = false;
            }

            match self.event_source.next_event(FRAME)? {
                Some(Event::UserInput(UserInput::Quit)) => break,
                Some(Event::UserInput(input)) => {
                    self.handle(input)?;
                    dirty = true;
                }
                Some(Event::Resize) => dirty = true,
                None => (),
            }
        }
        Ok(())
    }
}

impl<R: Renderer, E: EventSource> Hint48<R, E> {
    fn absorb(&mut self, update: Update) {
        let board = update.board();
        match update {
            Update::Snapshot(_, state) => {
                self.views.insert(board, *state);
            }
            Update::Suggested(_, direction) => {
                log::trace!("board {} suggested {}", board, direction)
            }
            Update::MovePerformed(_, signal) => {
                log::trace!("board {} moved {} ({})", board, signal.direction, signal.serial)
            }
            Update::MoveExpired(_, serial) => log::trace!("board {} cue {} expired", board, serial),
        }
    }

    fn focused(&self) -> Arc<PlayController> {
        self.boards[self.focus].clone()
    }

    fn handle(&mut self, input: UserInput) -> Result<()> {
        let ctrl = self.focused();
        let state = ctrl.snapshot();
        self.status = None;
        match input {
            UserInput::Direction(d) => {
                if let Err(e) = ctrl.shift(d) {
                    self.status = Some(format!("move failed: {e}"));
                }
            }
            UserInput::NewGame => self.background(ctrl, |c| c.new_game().map(|_| None)),
            UserInput::Hint => self.background(ctrl, |c| {
                Ok(Some(match c.request_hint() {
                    Some(d) => format!("hint: {} {}", d.arrow(), d),
                    None => String::from("no hint available"),
                }))
            }),
            UserInput::NextMode => ctrl.set_mode(state.mode.next()),
            UserInput::StartAutoPlay if state.mode == Mode::Ai => {
                self.background(ctrl, |c| c.start_autoplay().map(|_| None))
            }
            UserInput::StartAutoPlay => {
                self.status = Some(String::from("switch to AI mode (m) to auto-play"))
            }
            UserInput::Stop => ctrl.stop(),
            UserInput::RunBatch if state.mode == Mode::Batch => {
                let count = self.batch_count;
                self.background(ctrl, move |c| {
                    Ok(c.run_batch(count)?
                        .map(|p| format!("batch done: {} of {} games", p.completed, p.total)))
                })
            }
            UserInput::RunBatch => {
                self.status = Some(String::from("switch to BATCH mode (m) to run a batch"))
            }
            UserInput::DepthUp | UserInput::DepthDown => {
                let depth = match input {
                    UserInput::DepthUp => state.search_depth.saturating_add(1),
                    _ => state.search_depth.saturating_sub(1),
                }
                .clamp(MIN_SEARCH_DEPTH, MAX_SEARCH_DEPTH);
                if depth != state.search_depth {
                    if let Err(e) = ctrl.set_search_depth(depth) {
                        self.status = Some(format!("depth not applied: {e}"));
                    }
                }
            }
            UserInput::NextAlgorithm => ctrl.set_algorithm(state.algorithm.next()),
            UserInput::SwitchBoard => self.focus = (self.focus + 1) % self.boards.len(),
            UserInput::Quit => (),
        }
        Ok(())
    }

    /// Runs a blocking controller call off the render thread; its message, or its error,
    /// lands in the status line.
    fn background(
        &self,
        ctrl: Arc<PlayController>,
        f: impl FnOnce(&PlayController) -> Result<Option<String>> + Send + 'static,
    ) {
        let tx = self.notices_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("board-{}-call", ctrl.board()))
            .spawn(move || {
                let notice = match f(&ctrl) {
                    Ok(notice) => notice,
                    Err(e) if e.is_session_expired() => {
                        Some(String::from("session expired: restart to get a new session"))
                    }
                    Err(e) => Some(format!("board {}: {}", ctrl.board(), e)),
                };
                if let Some(notice) = notice {
                    let _ = tx.send(notice);
                }
            });
        if let Err(e) = spawned {
            log::error!("could not spawn background call: {}", e);
        }
    }

    fn draw(&mut self) -> Result<()> {
        let (width, height) = self.renderer.size_hint()?;
        let needed = (BOARD_WIDTH * self.boards.len() as u16, BOARD_TOP + 24);
        let mut spans = Vec::new();
        if width < needed.0 || height < needed.1 {
            spans.push(Span::new(
                0,
                0,
                Style::Alert,
                format!("terminal too small, required minimum size {} x {}", needed.0, needed.1),
            ));
            return self.renderer.render(&spans);
        }

        spans.push(Span::new(0, 0, Style::Plain, HELP));
        for (i, ctrl) in self.boards.iter().enumerate() {
            if let Some(state) = self.views.get(&ctrl.board()) {
                spans.extend(board_spans(
                    ctrl.board(),
                    state,
                    BOARD_WIDTH * i as u16,
                    BOARD_TOP,
                    i == self.focus,
                ));
            }
        }
        if let Some(status) = &self.status {
            spans.push(Span::new(0, height - 1, Style::Alert, status.clone()));
        }
        self.renderer.render(&spans)
    }
}

fn cell(value: Card) -> String {
    if value == 0 {
        String::from("      ")
    } else {
        format!("{value:>5} ")
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::ManualActive => "your move",
        Phase::AiRunning => "auto-playing",
        Phase::AiIdle => "ready to auto-play (a)",
        Phase::BatchRunning => "batch running",
    }
}

/// Lays out one board panel with its top-left corner at (x, y).
pub(crate) fn board_spans(
    board: BoardId,
    state: &SessionState,
    x: u16,
    y: u16,
    focused: bool,
) -> Vec<Span> {
    let mut spans = Vec::with_capacity(24);
    let marker = if focused { '>' } else { ' ' };
    spans.push(Span::new(
        x,
        y,
        if focused { Style::Title } else { Style::Plain },
        format!("{marker} Board {board} · {}", state.username),
    ));
    spans.push(Span::new(
        x,
        y + 1,
        Style::Plain,
        format!(
            "{}  {} d{}  score {}",
            state.mode, state.algorithm, state.search_depth, state.score
        ),
    ));

    let mut row_y = y + 2;
    spans.push(Span::new(x, row_y, Style::Plain, GRID_BORDER));
    for row in state.grid.rows() {
        let line = row.iter().map(|v| cell(*v)).collect::<Vec<_>>().join("|");
        spans.push(Span::new(x, row_y + 1, Style::Plain, format!("|{line}|")));
        spans.push(Span::new(x, row_y + 2, Style::Plain, GRID_BORDER));
        row_y += 2;
    }

    let mut line_y = row_y + 1;
    if let Some(direction) = state.suggested_direction {
        spans.push(Span::new(
            x,
            line_y,
            Style::Hint,
            format!("hint {} {}", direction.arrow(), direction),
        ));
    } else if state.is_hint_loading {
        spans.push(Span::new(x, line_y, Style::Hint, "hint …"));
    }
    line_y += 1;
    if let Some(signal) = state.last_move {
        spans.push(Span::new(
            x,
            line_y,
            Style::Cue,
            format!("{} {}", signal.direction.arrow(), signal.direction),
        ));
    }
    line_y += 1;
    if state.game_over {
        spans.push(Span::new(
            x,
            line_y,
            Style::Alert,
            format!(
                "GAME OVER  max tile {}  final score {}",
                state.grid.max_tile(),
                state.score
            ),
        ));
    } else {
        spans.push(Span::new(x, line_y, Style::Plain, phase_label(state.phase())));
    }
    line_y += 1;

    if state.batch.total > 0 {
        spans.push(Span::new(
            x,
            line_y,
            Style::Plain,
            format!("{} / {} games", state.batch.completed, state.batch.total),
        ));
        for (tile, count, share) in state.batch.shares() {
            line_y += 1;
            spans.push(Span::new(
                x,
                line_y,
                Style::Plain,
                format!("{tile:>6}  {count:>4}x  {share:>5.1}%"),
            ));
        }
    }
    spans
}
