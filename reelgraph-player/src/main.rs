//! # reelgraph player
//!
//! Headless driver for the reelgraph engine: builds a pipeline for one file,
//! reports progress while it plays for a while, then tears it down.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reelgraph_core::sim::SimFramework;
use reelgraph_core::{
    EngineConfig, MediaFramework, Pipeline, ProgressPoller, ResultCode, StaticSurface,
};
use tracing_subscriber::EnvFilter;

/// Surface handed to the pipeline when no window exists
const HEADLESS_SURFACE: (isize, i32, i32) = (1, 1280, 720);

#[derive(Debug)]
struct PlayerOptions {
    input: PathBuf,
    seconds: f64,
    config: Option<PathBuf>,
    headless: bool,
    /// Native window to render into (DirectShow only)
    window: Option<isize>,
}

impl PlayerOptions {
    fn from_args(args: &[String]) -> Result<Self> {
        let mut input = None;
        let mut seconds: f64 = 5.0;
        let mut config = None;
        let mut headless = false;
        let mut window = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--headless" | "headless" => {
                    headless = true;
                    i += 1;
                }
                "--seconds" | "-s" => {
                    let value = args
                        .get(i + 1)
                        .ok_or_else(|| anyhow::anyhow!("Missing value for --seconds"))?;
                    seconds = value
                        .parse()
                        .with_context(|| format!("Invalid --seconds value {:?}", value))?;
                    if !seconds.is_finite() || seconds < 0.0 {
                        return Err(anyhow::anyhow!(
                            "--seconds must be finite and not negative, got {:?}",
                            value
                        ));
                    }
                    i += 2;
                }
                "--config" | "-c" => {
                    let value = args
                        .get(i + 1)
                        .ok_or_else(|| anyhow::anyhow!("Missing value for --config"))?;
                    config = Some(PathBuf::from(value));
                    i += 2;
                }
                "--window" => {
                    let value = args
                        .get(i + 1)
                        .ok_or_else(|| anyhow::anyhow!("Missing value for --window"))?;
                    let handle = match value.strip_prefix("0x") {
                        Some(hex) => isize::from_str_radix(hex, 16),
                        None => value.parse(),
                    };
                    window = Some(handle.with_context(|| format!("Invalid window handle {:?}", value))?);
                    i += 2;
                }
                other if other.starts_with('-') => {
                    return Err(anyhow::anyhow!("Unknown option {:?}", other));
                }
                other => {
                    input = Some(PathBuf::from(other));
                    i += 1;
                }
            }
        }

        let input = input.ok_or_else(|| {
            anyhow::anyhow!(
                "Usage: reelgraph <file> [--seconds N] [--config PATH] [--headless] [--window HWND]"
            )
        })?;

        Ok(Self {
            input,
            seconds,
            config,
            headless,
            window,
        })
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).context("Loading config"),
        None => EngineConfig::load_or_default(&EngineConfig::default_path()).context("Loading config"),
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let options = PlayerOptions::from_args(&args)?;
    let config = load_config(options.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("reelgraph player v{}", reelgraph_core::VERSION);

    #[cfg(windows)]
    if let (Some(window), false) = (options.window, options.headless) {
        let framework =
            reelgraph_core::dshow::DShowFramework::new().context("Starting DirectShow")?;
        let pipeline = Pipeline::with_config(framework, &config);
        reelgraph_core::dshow::DShowFramework::report_installed(pipeline.registry());
        return play(pipeline, &options, &config, StaticSurface::new(window, 1280, 720));
    }

    if options.window.is_some() && !options.headless {
        tracing::warn!("--window needs DirectShow; playing headless");
    }
    let (handle, width, height) = HEADLESS_SURFACE;
    play(
        Pipeline::with_config(SimFramework::new(), &config),
        &options,
        &config,
        StaticSurface::new(handle, width, height),
    )
}

fn play_time(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("Cannot play for {} seconds", seconds))
}

fn play<F: MediaFramework>(
    mut pipeline: Pipeline<F>,
    options: &PlayerOptions,
    config: &EngineConfig,
    surface: StaticSurface,
) -> Result<()> {
    let result = pipeline.build_graph(&options.input, Some(&surface));
    let code = ResultCode::from(&result);
    let report = result.with_context(|| {
        format!(
            "Building graph for {} (result code {})",
            options.input.display(),
            code.as_i32()
        )
    })?;

    tracing::info!(
        "Playing {}: video {}, audio {}, {:.1}s",
        options.input.display(),
        report.video,
        report.audio,
        report.duration
    );

    let mut poller = ProgressPoller::spawn(
        pipeline.position_probe(),
        config.poll_interval(),
        |position, duration| {
            if duration > 0.0 {
                tracing::info!(
                    "{:7.2}s / {:.2}s ({:.0}%)",
                    position,
                    duration,
                    position / duration * 100.0
                );
            } else {
                tracing::info!("{:7.2}s", position);
            }
        },
    );

    std::thread::sleep(play_time(options.seconds)?);

    poller.stop();
    let state = pipeline.transport_state();
    tracing::info!(
        "Stopping at {:.2}s ({:?})",
        state.position,
        state.playback
    );
    pipeline.clear();
    Ok(())
}
