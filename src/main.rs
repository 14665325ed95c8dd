//! Anugam daemon entry point

use anugam::app::App;
use anugam::config::AppConfig;
use anugam::detect::DetectionAdapter;
use anugam::error::{Error, Result};
use anugam::sim::SimRig;
use clap::Parser;
use std::path::PathBuf;

/// Person-following chair control daemon
#[derive(Parser)]
#[command(name = "anugam", version, about)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "anugam.toml")]
    config: PathBuf,

    /// RNG seed for the simulated backends (0 = entropy)
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Stop after this many frames (default: run until signalled)
    #[arg(long)]
    frames: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_note) = match AppConfig::from_file(&cli.config) {
        Ok(c) => (c, format!("Using config: {}", cli.config.display())),
        Err(e) => (
            AppConfig::default(),
            format!(
                "Could not read config {} ({}), using defaults",
                cli.config.display(),
                e
            ),
        ),
    };

    // RUST_LOG still overrides the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    log::info!("anugam v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("{}", config_note);

    let mut app = App::new(config.clone())?;

    let result = match config.video.source.as_str() {
        "sim" => {
            log::info!("Frame source: simulation (seed {})", cli.seed);
            let rig = SimRig::with_defaults(
                config.video.frame_width,
                config.video.frame_height,
                cli.seed,
            );
            let mut adapter = DetectionAdapter::new(
                Box::new(rig.pose),
                Some(Box::new(rig.boxes)),
                config.tracking.detector_interval,
                config.tracking.confidence_threshold,
            );
            let mut source = rig.source;
            app.run(&mut source, &mut adapter, cli.frames)
        }
        other => Err(Error::InitializationFailed(format!(
            "unknown video source {:?}; camera capture integrates via the FrameSource trait",
            other
        ))),
    };

    app.stop();
    result
}
