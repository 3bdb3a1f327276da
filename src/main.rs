//! Flick shade driver
//!
//! Runs the notification shade headless against in-memory collaborators and
//! a scripted touch session. Useful for checking gesture, scrim and
//! visibility behavior without a compositor.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flick_shade::demo::{DemoWorld, JsonLinesSink, LogSink, Script};
use flick_shade::shade::collaborators::VisibilitySink;
use flick_shade::state::{self, ShadeState};
use flick_shade::{Shade, ShadeConfig};

#[derive(Parser, Debug)]
#[command(name = "flick-shade")]
#[command(about = "Flick notification shade driver", long_about = None)]
struct Args {
    /// Config file (default: ~/.local/state/flick/shade.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long)]
    debug: bool,

    /// Stop after this many frames (0 = until the scenario ends)
    #[arg(short, long, default_value_t = 0)]
    frames: u64,

    /// Print visibility deltas to stdout as JSON lines
    #[arg(short, long)]
    json: bool,
}

fn main() -> Result<()> {
    // Set up panic hook to log panics before crashing
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        if let Ok(home) = std::env::var("HOME") {
            let crash_log = format!("{}/.local/state/flick/crash.log", home);
            if let Ok(mut f) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                use std::io::Write;
                let _ = writeln!(f, "[{}] PANIC: {}", chrono::Local::now(), panic_info);
            }
        }
    }));

    // Log directory (~/.local/state/flick or /tmp/flick)
    let log_dir = std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local/state")))
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join("flick");

    std::fs::create_dir_all(&log_dir).ok();

    let args = Args::parse();

    let file_appender = rolling::daily(&log_dir, "shade.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Quiet by default, verbose with --debug
    let default_filter = if args.debug {
        "debug,flick_shade=debug"
    } else {
        "warn,flick_shade=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    info!(log_path = %log_dir.display(), "Flick shade starting");

    let config = match &args.config {
        Some(path) => ShadeConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ShadeConfig::load(),
    };

    let sink: Box<dyn VisibilitySink> = if args.json {
        Box::new(JsonLinesSink::new(std::io::stdout()))
    } else {
        Box::new(LogSink)
    };

    let world = DemoWorld::new();
    let shade = Shade::new(config, world.collaborators(Some(sink)));
    let mut state = ShadeState::new(shade, world, Script::heads_up_drag(), args.frames);

    state::run(&mut state)?;

    info!(frames = state.frames, "Flick shade exiting");
    Ok(())
}
