use std::io::stdout;
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

mod controller;
mod engine;
mod error;
mod hint48;
mod service;
mod tui;

use controller::sink::{ChannelSink, PresentationSink};
use controller::state::{DEFAULT_SEARCH_DEPTH, MAX_SEARCH_DEPTH, MIN_SEARCH_DEPTH};
use controller::PlayController;
use hint48::Hint48;
use service::local::LocalService;
use service::{Algorithm, MoveService, Session};
use tui::crossterm::{Crossterm, CrosstermEvents};

/// Play 2048 by hand, let a search algorithm play it, or ask it for hints.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Name shown on the board and reported with batch results.
    #[arg(long, default_value = "Player1")]
    username: String,

    #[arg(long, value_enum, default_value_t = Algorithm::default())]
    algorithm: Algorithm,

    /// Search depth handed to the move service.
    #[arg(long, default_value_t = DEFAULT_SEARCH_DEPTH,
          value_parser = clap::value_parser!(u8).range(MIN_SEARCH_DEPTH as i64..=MAX_SEARCH_DEPTH as i64))]
    depth: u8,

    /// Play two boards side by side.
    #[arg(long)]
    parallel: bool,

    /// Number of games per batch run.
    #[arg(long, default_value_t = 10)]
    batch_count: u32,

    /// Seed for tile spawns, for reproducible games.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "./hint48.log")]
    log_file: PathBuf,

    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,
}

fn setup_logging(path: &PathBuf, level: log::LevelFilter) -> error::Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message,
            ))
        })
        .level(level)
        .chain(fern::log_file(path)?)
        .apply()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_file, args.verbose.log_level_filter())?;

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    log::info!("starting local session with seed {}", seed);
    let session = Session::new(format!("local-{seed:016x}"));
    let service: Arc<dyn MoveService> = Arc::new(LocalService::new(
        session.clone(),
        SmallRng::seed_from_u64(seed),
    ));

    let (tx, updates) = channel();
    let sink: Arc<dyn PresentationSink> = Arc::new(ChannelSink::new(tx));
    let board_ids = if args.parallel { 1..=2 } else { 1..=1 };
    let mut boards = Vec::new();
    for id in board_ids {
        let ctrl = PlayController::new(
            id,
            session.clone(),
            args.username.clone(),
            service.clone(),
            sink.clone(),
        );
        ctrl.set_algorithm(args.algorithm);
        ctrl.new_game()?;
        ctrl.set_search_depth(args.depth)?;
        boards.push(Arc::new(ctrl));
    }

    let w = stdout().lock();
    let renderer = Crossterm::new(Box::new(w))?;
    let event_source = CrosstermEvents::default();
    let app = Hint48::new(boards.clone(), updates, renderer, event_source, args.batch_count);
    let outcome = app.run();

    for ctrl in boards {
        match Arc::try_unwrap(ctrl) {
            Ok(ctrl) => {
                let board = ctrl.board();
                if let Err(e) = ctrl.close() {
                    log::warn!("board {} did not close cleanly: {}", board, e);
                }
            }
            // a background call still holds it; dropping stops the workers
            Err(ctrl) => ctrl.stop(),
        }
    }
    outcome?;
    Ok(())
}
