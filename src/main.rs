mod terminal;

use std::fs::File;
use std::io::Stdout;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pacman_engine::{Layout, Level, LevelOptions, LevelReport, SoundPlayer, TimedBackend, Tuning};
use terminal::{Renderer, Screen, TerminalKeys};

#[derive(Debug, Parser)]
#[command(name = "pacman", about = "Terminal maze chase with one thread per entity")]
struct Args {
    /// Level file to play.
    #[arg(long, default_value = "levels/level1.txt")]
    level: PathBuf,
    /// Number of ghosts, 1 to 8.
    #[arg(long, default_value_t = 4)]
    enemies: usize,
    /// Seed for ghost headings and wandering.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Write logs here. Filter with PACMAN_LOG, e.g. `PACMAN_LOG=pacman_engine=debug`.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let result = run(&args);
    if let Err(err) = &result {
        error!("pacman exited with an error: {err:#}");
    }
    result
}

fn run(args: &Args) -> Result<()> {
    let layout = Layout::load(&args.level)?;
    let options = LevelOptions {
        enemies: args.enemies,
        tuning: Tuning::from_env(),
        seed: args.seed,
    };
    let sound = SoundPlayer::new(Arc::new(TimedBackend::default()));
    let level = Level::new(layout, &options, sound)?;
    let (cols, rows) = level.world().dimensions();

    let report = {
        let mut screen = Screen::enter()?;
        play(screen.out(), level, cols, rows)?
    };
    println!("{:?}: final score {}", report.outcome, report.score);
    Ok(())
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_env("PACMAN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .init();
    Ok(())
}

fn play(stdout: &mut Stdout, level: Level, cols: usize, rows: usize) -> Result<LevelReport> {
    let quit = Arc::new(AtomicBool::new(false));
    let mut handle = level.spawn(Box::new(TerminalKeys::new(Arc::clone(&quit))))?;
    let world = Arc::clone(handle.world());
    let mut renderer = Renderer::new(cols, rows);
    let frame_time = Duration::from_micros(1_000_000 / terminal::read_render_fps());

    let report = loop {
        let frame_start = Instant::now();
        if quit.load(Ordering::Acquire) {
            info!("quit requested");
            break handle.abort();
        }
        if let Err(err) = renderer.render(stdout, &world) {
            handle.abort();
            return Err(err.into());
        }
        if handle.is_finished() {
            if let Some(report) = handle.wait_timeout(Duration::ZERO) {
                break report;
            }
        }
        let elapsed = frame_start.elapsed();
        if elapsed < frame_time {
            thread::sleep(frame_time - elapsed);
        }
    };

    renderer.render(stdout, &world)?;
    renderer.render_report(stdout, &report)?;
    Ok(report)
}
