use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use uuid::Uuid;

use docscan::{
    CompositeOutput, EventBus, FrameData, FrameScanner, InferenceBackend, ScanSession, ScanState,
    ScannerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "docscan")]
#[command(about = "Replay camera frames through the document scanning pipeline")]
#[command(version)]
#[command(long_about = "Feeds a sequence of still images through detection, stability gating, \
barcode search and the configured completion policy, as if they were consecutive camera \
frames. Prints every state transition and the final scan output as JSON.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "docscan.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Detection model
    #[arg(short, long, value_name = "ONNX", help = "Path to the ONNX detection model")]
    model: Option<PathBuf>,

    /// Simulated time between frames
    #[arg(long, default_value_t = 100, value_name = "MS", help = "Milliseconds between replayed frames")]
    frame_interval_ms: u64,

    /// Frames to replay, in order
    #[arg(value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without scanning")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[derive(Serialize)]
struct Transition {
    frame_id: u64,
    from: ScanState,
    to: ScanState,
    wants_torch: bool,
}

#[derive(Serialize)]
struct ReplaySummary<'a> {
    session_id: Uuid,
    state: ScanState,
    frames_replayed: usize,
    outputs_seen: u64,
    output: Option<&'a CompositeOutput>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting docscan v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match ScannerConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.images.is_empty() {
        anyhow::bail!("No images to replay");
    }

    let backend = load_backend(&args, &config)?;
    let event_bus = EventBus::new(64);
    let scanner = FrameScanner::builder()
        .config(config)
        .inference_backend(backend)
        .event_bus(event_bus.clone())
        .build()
        .map_err(|e| {
            error!("Failed to create scanner: {}", e);
            e
        })?;

    let start = Instant::now();
    let mut session = ScanSession::new(scanner, start).with_event_bus(event_bus);
    let mut frames_replayed = 0;

    for (index, path) in args.images.iter().enumerate() {
        let image = image::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .to_rgb8();
        let captured_at = start + Duration::from_millis(args.frame_interval_ms * index as u64);
        let frame = FrameData::from_rgb_image(index as u64, image).with_captured_at(captured_at);

        let completion = session.scanner().scan_async(frame).await?;
        frames_replayed += 1;

        let frame_id = completion.frame_id;
        let from = session.state();
        let to = session.handle_completion(completion, captured_at);
        if from != to {
            let transition = Transition {
                frame_id,
                from,
                to,
                wants_torch: session.wants_torch(),
            };
            println!("{}", serde_json::to_string(&transition)?);
        }

        if session.is_finished() {
            break;
        }
    }

    info!("Scanner metrics: {:?}", session.scanner().metrics());

    let summary = ReplaySummary {
        session_id: session.id(),
        state: session.state(),
        frames_replayed,
        outputs_seen: session.outputs_seen(),
        output: session.last_output(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

#[cfg(feature = "backend-tract")]
fn load_backend(args: &Args, config: &ScannerConfig) -> Result<Arc<dyn InferenceBackend>> {
    let model = args
        .model
        .as_ref()
        .context("--model is required to run detection")?;
    let backend = docscan::TractBackend::new(model, config.detector.input_size)?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_backend(args: &Args, _config: &ScannerConfig) -> Result<Arc<dyn InferenceBackend>> {
    if let Some(model) = &args.model {
        error!("Cannot load {}: no inference backend compiled in", model.display());
    }
    anyhow::bail!("docscan was built without an inference backend; rebuild with --features backend-tract")
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("docscan={}", log_level)));

    // Logs go to stderr; stdout carries the JSON results
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# docscan configuration file");
    println!("# Durations are in seconds. Every value can be overridden with");
    println!("# DOCSCAN_<SECTION>__<KEY> environment variables.");
    println!();
    println!("{}", ScannerConfig::default().to_toml()?);
    Ok(())
}
