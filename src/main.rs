//! starcap CLI entry point.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use starcap::capture::{CaptureConfig, capture_star_video};
use starcap::error::StarcapError;
use starcap::repo_url::{default_output_filename, parse_github_url};
use starcap::transcode::{GifOptions, Transcoder};
use starcap::workdir::{WorkDir, ensure_parent_dir};

/// Generate an animated GIF that highlights the Star button on a GitHub
/// repository page.
#[derive(Parser, Debug)]
#[command(name = "starcap")]
#[command(version)]
#[command(
    about = "Generate an animated GIF that highlights the Star button on a GitHub repository page"
)]
struct Cli {
    /// GitHub repository URL (e.g. https://github.com/owner/repo)
    repo_url: String,

    /// Output GIF path (default: ./out/<owner>_<repo>.gif)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Tooltip text
    #[arg(long, default_value = "Star this repo \u{2B50}\u{1F446}")]
    message: String,

    /// Viewport width
    #[arg(long, default_value_t = 1280, value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Viewport height
    #[arg(long, default_value_t = 720, value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// GIF frames per second
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// Output GIF width in pixels (height follows the aspect ratio)
    #[arg(long, default_value_t = 960, value_parser = clap::value_parser!(u32).range(1..))]
    scale: u32,

    /// Total capture duration in ms
    #[arg(long, default_value_t = 4200, value_parser = clap::value_parser!(u64).range(1..))]
    duration: u64,

    /// Run browser in headful mode
    #[arg(long)]
    headful: bool,

    /// Keep intermediate recorded video next to the GIF
    #[arg(long)]
    keep_video: bool,

    /// Extra logs and keep the working directory
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "starcap=debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(e) = run(cli).await {
        eprintln!("\nError: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), StarcapError> {
    let parsed = parse_github_url(&cli.repo_url)?;
    info!("Repository: {}", parsed.normalized_url);

    let output_path = match cli.out {
        Some(path) => {
            ensure_parent_dir(&path)?;
            path
        }
        None => {
            let out_dir = PathBuf::from("out");
            std::fs::create_dir_all(&out_dir)?;
            out_dir.join(default_output_filename(&parsed.owner, &parsed.repo))
        }
    };

    // Fail before any browser work when the transcoder is absent.
    let transcoder = Transcoder::new();
    transcoder.ensure_available().await?;

    let work_dir = WorkDir::create()?;

    let config = CaptureConfig {
        url: parsed.normalized_url.clone(),
        message: cli.message,
        width: cli.width,
        height: cli.height,
        duration: Duration::from_millis(cli.duration),
        headful: cli.headful,
        debug: cli.debug,
    };

    let result = capture_star_video(&config, &work_dir).await?;
    if result.used_fallback {
        warn!("Star button not found on page. A fallback highlight region was used.");
    }

    let options = GifOptions {
        fps: cli.fps,
        scale: cli.scale,
    };
    transcoder
        .transcode(&result.video_path, &output_path, options, work_dir.path())
        .await?;

    if cli.keep_video {
        let kept = output_path.with_extension("mp4");
        ensure_parent_dir(&kept)?;
        std::fs::copy(&result.video_path, &kept)?;
        info!("Video kept: {}", kept.display());
    }

    info!("GIF saved: {}", output_path.display());

    if cli.debug {
        let preserved = work_dir.keep();
        debug!("Working directory preserved: {}", preserved.display());
    }

    Ok(())
}
