use anyhow::Result;
use clap::Parser;
use facecam::{FacecamConfig, FacecamOrchestrator};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "facecam")]
#[command(about = "Shared camera frame buffer with MJPEG streaming and face authentication")]
#[command(version)]
#[command(long_about = "Captures frames from a local camera on a dedicated thread, serves them \
as an MJPEG stream with optional face overlays, and verifies registered faces within a time \
budget.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "facecam.toml", help = "Path to TOML configuration file")]
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
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - initialize but don't start components
    #[arg(long, help = "Perform dry run - initialize components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Run one verification session and exit
    #[arg(long, help = "Verify a face once; exit code 0 when verified, 1 otherwise")]
    verify: bool,

    /// Verification budget in seconds
    #[arg(long, value_name = "SECONDS", requires = "verify", help = "Override auth.max_seconds for --verify")]
    timeout: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting Facecam system v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match FacecamConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        if args.validate_config {
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
        return Err(e.into());
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let mut orchestrator = FacecamOrchestrator::new(config).map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize system: {}", e);
        e
    })?;

    if args.dry_run {
        info!("Dry run mode - components initialized but not started");
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    if args.verify {
        let exit_code = run_verification(&mut orchestrator, args.timeout).await?;
        std::process::exit(exit_code);
    }

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start system: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Facecam system exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

/// One verification session; prints the result as JSON
async fn run_verification(orchestrator: &mut FacecamOrchestrator, timeout: Option<f64>) -> Result<i32> {
    orchestrator.start_core().await.map_err(|e| {
        error!("Failed to start camera: {}", e);
        e
    })?;

    let result = orchestrator.verify_once(timeout).await;
    orchestrator.shutdown().await?;
    let result = result?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.verified { 0 } else { 1 })
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
        .unwrap_or_else(|_| EnvFilter::new(format!("facecam={},tower_http={}", log_level, log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
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
    println!("# Facecam Configuration File");
    println!("# Every value below is the default; any key can also be set as");
    println!("# FACECAM__<SECTION>__<KEY>, e.g. FACECAM__CAMERA__INDEX=1");
    println!();
    println!("{}", toml::to_string_pretty(&FacecamConfig::default())?);
    Ok(())
}
