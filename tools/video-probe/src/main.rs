//! Video Probe
//!
//! Headless host for the video-playback crate. Opens a file, prints its
//! metadata and the hardware decode situation, then drives the playback clock
//! at a fixed tick rate the way a render loop would.

mod snapshot;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use video_playback::{DecodeSession, DecoderConfig, VideoStream};

/// Probe a video file and play it headless through the playback clock
#[derive(Parser, Debug)]
#[command(name = "video-probe")]
#[command(about = "Inspect and clock-decode a video file with hardware fallback")]
#[command(version)]
struct Args {
    /// Video file to open
    path: PathBuf,

    /// Decoder configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Force software decoding
    #[arg(long)]
    no_hw: bool,

    /// Seconds of playback to simulate (0 = metadata only)
    #[arg(long, default_value = "0")]
    play_secs: f64,

    /// Host tick rate in Hz
    #[arg(long, default_value = "60")]
    tick_hz: f64,

    /// Seek here before playing (seconds)
    #[arg(long)]
    start: Option<f64>,

    /// Write the last displayed image to this file (.png or .jpg)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<DecoderConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => DecoderConfig::default(),
    };

    if args.no_hw {
        config.use_hardware_acceleration = false;
    }

    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match ffmpeg_next::init() {
        Ok(()) => info!("FFmpeg initialized"),
        Err(e) => {
            error!("Failed to initialize FFmpeg: {}", e);
            return Err(anyhow!("FFmpeg initialization failed: {}", e));
        }
    }

    let config = load_config(&args)?;

    let mut stream = VideoStream::new(config.clone());
    stream
        .set_file(&args.path)
        .with_context(|| format!("opening {}", args.path.display()))?;

    let session = stream.session();
    let available = DecodeSession::available_hw_decoders();

    println!();
    println!("========================================================");
    println!("  Video Probe v{}", env!("CARGO_PKG_VERSION"));
    println!("========================================================");
    println!("  File:       {}", args.path.display());
    println!("  Size:       {}x{}", session.width(), session.height());
    println!("  Frame rate: {:.3} fps", session.frame_rate());
    println!("  Duration:   {:.3} s", session.duration());
    println!("  Format:     {}", session.pixel_format_name());
    println!("  Alpha:      {}", if session.has_alpha() { "yes" } else { "no" });
    println!("  HW accel:   {}", if config.use_hardware_acceleration { "requested" } else { "off" });
    println!("  Backend:    {}", session.current_hw_decoder());
    println!("  Available:  {}", if available.is_empty() { "none".to_string() } else { available.join(", ") });
    println!("========================================================");
    println!();

    if args.play_secs <= 0.0 {
        return Ok(());
    }
    if args.tick_hz <= 0.0 {
        return Err(anyhow!("tick rate must be positive, got {}", args.tick_hz));
    }

    let mut playback = stream.instantiate_playback();
    if let Some(start) = args.start {
        if let Err(e) = playback.seek(start) {
            warn!("Start seek to {:.3}s failed: {}", start, e);
        }
    }
    playback.play();

    let delta = 1.0 / args.tick_hz;
    let ticks = (args.play_secs * args.tick_hz).ceil() as u64;
    let started = Instant::now();
    let mut refreshed = 0u64;
    let mut ticked = 0u64;

    for _ in 0..ticks {
        if !playback.is_playing() {
            info!("Playback reached end of stream");
            break;
        }
        if playback.update(delta) {
            refreshed += 1;
        }
        ticked += 1;
    }

    let elapsed = started.elapsed();
    info!(
        "{} ticks, {} frames decoded in {:.1} ms ({:.2} ms/frame), position {:.3}s",
        ticked,
        refreshed,
        elapsed.as_secs_f64() * 1000.0,
        if refreshed > 0 { elapsed.as_secs_f64() * 1000.0 / refreshed as f64 } else { 0.0 },
        playback.position(),
    );

    if let Some(path) = &args.snapshot {
        let image = playback
            .image()
            .ok_or_else(|| anyhow!("no image to snapshot"))?;
        snapshot::save(image, path)?;
        info!("Wrote {}", path.display());
    }

    Ok(())
}
