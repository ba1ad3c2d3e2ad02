use anyhow::Result;
use clap::Parser;
use lapsecam::sim::simulated_devices;
use lapsecam::{LapsecamConfig, LapsecamOrchestrator};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "lapsecam")]
#[command(about = "Wi-Fi camera appliance with feed delivery, burst GIFs and timelapse")]
#[command(version)]
#[command(long_about = "Runs the lapsecam control loop against simulated hardware: \
frames are synthesized, the SD card is a directory, uploads land in an outbox \
directory and the camera buttons are mapped to keys. Wi-Fi loss, card removal \
and encoder faults can be injected from the keyboard while the loop runs.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lapsecam.toml", help = "Path to TOML configuration file")]
    config: String,

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
    #[arg(long, help = "Validate configuration file and exit without starting the camera")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - build the components but don't start the loop
    #[arg(long, help = "Perform dry run - wire up components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Write logs to a daily rotating file instead of stderr
    #[arg(long, value_name = "DIR", help = "Directory for rolling daily log files")]
    log_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting lapsecam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match LapsecamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    // The quit key and the signal handlers cancel the same token
    let token = CancellationToken::new();
    let (devices, keyboard) = simulated_devices(&config, token.clone());
    let mut orchestrator =
        LapsecamOrchestrator::new(config, devices).with_cancellation_token(token);

    if args.dry_run {
        info!("Dry run mode - components wired but not started");
        println!("✓ Dry run completed successfully - all components constructed");
        return Ok(());
    }

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start lapsecam: {}", e);
        e
    })?;

    keyboard.start();

    let reason = orchestrator.run().await;
    keyboard.stop();

    let exit_code = match reason {
        Ok(reason) => {
            info!("Control loop stopped: {:?}", reason);
            orchestrator.shutdown().await
        }
        Err(e) => {
            error!("Control loop error: {}", e);
            orchestrator.shutdown().await;
            1
        }
    };

    info!("lapsecam exited with code: {}", exit_code);

    // Flush buffered file output before exiting
    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{
        fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt,
        EnvFilter, Layer,
    };

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
        .unwrap_or_else(|_| EnvFilter::new(format!("lapsecam={}", log_level)));

    // Raw-mode keyboard input mangles terminal output, so a log directory
    // takes over from stderr entirely
    let (writer, guard, ansi) = match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "lapsecam.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(writer), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
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

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# lapsecam configuration file");
    println!("# Every key is optional; LAPSECAM__SECTION__KEY environment variables override it");
    println!();
    println!("{}", toml::to_string_pretty(&LapsecamConfig::default())?);
    Ok(())
}
