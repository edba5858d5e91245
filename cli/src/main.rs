use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use jigsaw_kit::{
    cleanup, format_elapsed, list_saved, mark_saved, puzzle_name, ControllerHooks, FileStore,
    Notice, SessionController,
};
use jigsaw_kit_core::{
    GeometryProvider, GridLayout, ProgressStore, PuzzleSession, SessionRules, SessionState,
};
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod bot;

#[derive(Parser)]
#[command(name = "jigsaw-kit", version, about = "Headless tools for jigsaw puzzle progress")]
struct Cli {
    #[arg(long, global = true, env = "JIGSAW_STORE_PATH", default_value = "jigsaw-kit.store")]
    store: PathBuf,
    /// JSON file with session rules. Missing fields take their defaults.
    #[arg(long, global = true, env = "JIGSAW_RULES")]
    rules: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Let the solver bot play a puzzle to the end and save the result.
    Solve {
        #[command(flatten)]
        puzzle: PuzzleArgs,
        #[command(flatten)]
        bot: bot::BotArgs,
    },
    Saves {
        #[command(subcommand)]
        command: SavesCommand,
    },
    /// Forget placed pieces and scramble again.
    Reset {
        #[command(flatten)]
        puzzle: PuzzleArgs,
    },
}

#[derive(Subcommand)]
enum SavesCommand {
    List {
        #[arg(long = "image")]
        images: Vec<String>,
        #[arg(long, default_value_t = 64)]
        max: usize,
    },
    Clear {
        name: String,
        /// Also drop hints and timer values.
        #[arg(long)]
        all: bool,
    },
}

#[derive(clap::Args, Clone, Debug)]
struct PuzzleArgs {
    #[arg(long, default_value = "sample")]
    image: String,
    #[arg(long, default_value_t = 4)]
    cols: u32,
    #[arg(long, default_value_t = 3)]
    rows: u32,
    #[arg(long, default_value_t = 1.0)]
    piece_size: f32,
    /// Scramble seed, decimal or 0x-prefixed hex.
    #[arg(long)]
    seed: Option<String>,
}

impl PuzzleArgs {
    fn layout(&self) -> GridLayout {
        GridLayout::new(self.cols, self.rows, self.piece_size, self.piece_size)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    let rules = load_rules(cli.rules.as_deref())?;

    match cli.command {
        Commands::Solve { puzzle, bot } => {
            let mut controller = open_controller(&cli.store, rules, &puzzle)?;
            let mut bot = bot::SolverBot::new(bot);
            let outcome = bot.solve(&mut controller);
            record_progress(&mut controller, &puzzle)?;
            controller.on_quit()?;
            let Some(session) = controller.session() else {
                return Ok(());
            };
            let elapsed = format_elapsed(session.timer().state().elapsed);
            match outcome {
                bot::Outcome::Assembled { frames } => {
                    println!("{}: assembled after {frames} frames ({elapsed})", session.name())
                }
                bot::Outcome::OutOfTime { frames } => {
                    println!("{}: time ran out after {frames} frames", session.name())
                }
                bot::Outcome::GaveUp { frames } => println!(
                    "{}: stopped after {frames} frames, {} pieces left",
                    session.name(),
                    session.pieces_left()
                ),
            }
        }
        Commands::Saves { command } => match command {
            SavesCommand::List { images, max } => {
                let store = FileStore::open(&cli.store)?;
                let images: Vec<&str> = images.iter().map(String::as_str).collect();
                let saved = list_saved(&store, &images, max);
                if saved.is_empty() {
                    println!("no saved puzzles");
                }
                for entry in saved {
                    println!("{} ({} {}x{})", entry.name, entry.image, entry.cols, entry.rows);
                }
            }
            SavesCommand::Clear { name, all } => {
                let mut store = FileStore::open(&cli.store)?;
                if all {
                    PuzzleSession::new(name.as_str(), rules).clear_saved(&mut store)?;
                } else {
                    cleanup(&mut store, &name)?;
                }
                store.flush()?;
                println!("cleared: {name}");
            }
        },
        Commands::Reset { puzzle } => {
            let mut controller = open_controller(&cli.store, rules, &puzzle)?;
            controller.restart_puzzle()?;
            if let Some(store) = controller.store_mut() {
                cleanup(store, &puzzle_name(&puzzle.image, puzzle.cols, puzzle.rows))?;
            }
            controller.on_quit()?;
            if let Some(session) = controller.session() {
                println!("reset: {}", session.name());
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_rules(path: Option<&Path>) -> Result<SessionRules, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(SessionRules::default());
    };
    let raw = fs::read_to_string(path)?;
    let rules = SessionRules::from_json(&raw)?;
    info!(path = %path.display(), "rules loaded");
    Ok(rules)
}

fn open_controller(
    store_path: &Path,
    rules: SessionRules,
    puzzle: &PuzzleArgs,
) -> Result<SessionController, Box<dyn Error>> {
    let layout = puzzle.layout();
    let store = FileStore::open(store_path)?;
    let name = puzzle_name(&puzzle.image, puzzle.cols, puzzle.rows);
    let mut session = PuzzleSession::new(name, rules);
    if let Some(raw) = puzzle.seed.as_deref() {
        session = session.with_seed(parse_seed_arg(raw)?);
    }
    session.prepare(layout.piece_count(), &layout)?;

    let mut controller = SessionController::new(log_hooks());
    controller.attach_store(Box::new(store));
    controller.attach_puzzle(session);
    controller.init()?;
    if let Some(session) = controller.session() {
        if session.state() == SessionState::Assembled {
            info!(name = session.name(), "puzzle already assembled");
        }
    }
    Ok(controller)
}

/// List the puzzle under `saves list` once it has been played.
fn record_progress(
    controller: &mut SessionController,
    puzzle: &PuzzleArgs,
) -> Result<(), Box<dyn Error>> {
    let played = controller.session().is_some_and(|session| {
        session.pieces_left() < session.pieces().len() || session.timer().state().elapsed > 0.0
    });
    if !played {
        return Ok(());
    }
    if let Some(store) = controller.store_mut() {
        mark_saved(store, &puzzle.image, puzzle.cols, puzzle.rows)?;
    }
    Ok(())
}

fn log_hooks() -> ControllerHooks {
    ControllerHooks {
        on_transition: Rc::new(|event| debug!(?event, "transition")),
        on_effect: Rc::new(|_| {}),
        on_lose: Rc::new(|| info!("lost: time is up")),
        on_notice: Rc::new(|notice| match notice {
            Notice::PersistenceFailed { key, message } => {
                warn!(key = %key, message = %message, "progress not saved")
            }
        }),
    }
}

fn random_seed() -> u64 {
    rand::rng().random()
}

fn seeded_rng(seed: Option<u64>) -> rand::rngs::StdRng {
    let seed = seed.unwrap_or_else(random_seed);
    debug!(seed, "bot rng seeded");
    rand::rngs::StdRng::seed_from_u64(seed)
}

fn parse_seed_arg(raw: &str) -> Result<u32, Box<dyn Error>> {
    let trimmed = raw.trim();
    let value = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16)?
    } else {
        trimmed.parse::<u32>()?
    };
    Ok(value)
}
