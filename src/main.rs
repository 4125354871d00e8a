use anyhow::Result;
use clap::Parser;
use harvester::{
    command_queue, create_data_manager, load_task_dir, Command, CommandDispatcher,
    CommandSender, DataManager, Engine, ExecutorRegistry, HarvesterConfig, IntervalTaskMaster,
    ResultHandler, ServiceRegistry, ShutdownCoordinator, SignalBridge,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(about = "Command-driven engine for scheduled collection tasks")]
#[command(version)]
#[command(long_about = "Runs a set of periodic collection tasks and stores their results. \
The engine is driven by START, STOP, RELOAD and SHUTDOWN commands arriving from OS signals, \
the HTTP query service or the interactive console.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "harvester.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Directory of task definition files
    #[arg(short, long, default_value = "tasks", help = "Directory containing task TOML files")]
    tasks: PathBuf,

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
    #[arg(long, help = "Validate configuration file and exit without starting the engine")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - build everything but never process commands
    #[arg(long, help = "Perform dry run - initialize components but don't run the control loop")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR", help = "Directory for daily rolling log files")]
    log_dir: Option<PathBuf>,

    /// Do not queue START on launch
    #[arg(long, help = "Wait for an explicit START command instead of starting immediately")]
    no_autostart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting Harvester v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match HarvesterConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            exit(1, log_guard);
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        if args.validate_config {
            eprintln!("✗ Configuration validation failed: {}", e);
        }
        exit(1, log_guard);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    // Storage must be ready before any command is read
    let data_manager = match create_data_manager(&config.storage).await {
        Ok(data_manager) => data_manager,
        Err(e) => {
            error!("Failed to create data manager: {}", e);
            exit(1, log_guard);
        }
    };

    let registry = load_task_dir(&args.tasks).await.map_err(|e| {
        error!("Failed to load tasks from {}: {}", args.tasks.display(), e);
        e
    })?;
    if registry.is_empty() {
        warn!("No tasks loaded from {}", args.tasks.display());
    }

    let coordinator = Arc::new(ShutdownCoordinator::new());
    let task_master = Arc::new(IntervalTaskMaster::new(
        registry,
        &ExecutorRegistry::with_builtin(),
        ResultHandler::new(Arc::clone(&data_manager)),
        coordinator.child_token(),
    ));

    let (sender, receiver) = command_queue(config.engine.command_queue_capacity);
    let services = build_services(&config, &data_manager, &sender, &coordinator)?;

    let mut engine = Engine::builder()
        .with_task_master(task_master)
        .with_data_manager(data_manager)
        .with_services(services)
        .with_coordinator(Arc::clone(&coordinator))
        .with_shutdown_grace(config.engine.shutdown_grace())
        .with_span(info_span!("engine"))
        .build()?;

    if args.dry_run {
        info!("Dry run mode - components initialized but control loop not started");
        engine.shutdown().await?;
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    engine.launch_services()?;
    let _signals = SignalBridge::install(sender.clone())?;

    if config.engine.autostart && !args.no_autostart {
        sender.push(Command::Start).await?;
    } else {
        info!("Autostart disabled, waiting for START");
    }

    // Only producers hold senders from here on
    drop(sender);

    let report = CommandDispatcher::new(engine, receiver)
        .with_span(info_span!("dispatcher"))
        .run()
        .await;

    let exit_code = report.exit_code();
    info!("Harvester exited with code: {}", exit_code);

    exit(exit_code, log_guard);
}

/// Flush the file appender, then exit
fn exit(code: i32, log_guard: Option<WorkerGuard>) -> ! {
    drop(log_guard);
    std::process::exit(code);
}

fn build_services(
    config: &HarvesterConfig,
    data_manager: &Arc<dyn DataManager>,
    commands: &CommandSender,
    coordinator: &ShutdownCoordinator,
) -> Result<ServiceRegistry> {
    let mut services = ServiceRegistry::new();

    #[cfg(feature = "query_service")]
    {
        if config.query.enabled {
            let query = harvester::QueryServiceBuilder::new()
                .config(config.query.clone())
                .data_manager(Arc::clone(data_manager))
                .commands(commands.clone())
                .token(coordinator.child_token())
                .span(info_span!("query"))
                .build()?;
            services.register(Arc::new(query));
        }
    }

    #[cfg(feature = "console")]
    {
        if config.console.enabled {
            services.register(Arc::new(harvester::ControlConsole::new(
                commands.clone(),
                coordinator.child_token(),
            )));
        }
    }

    #[cfg(not(all(feature = "query_service", feature = "console")))]
    let _ = (config, data_manager, commands, coordinator);

    Ok(services)
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
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
        .unwrap_or_else(|_| EnvFilter::new(format!("harvester={}", log_level)));

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

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "harvester.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Harvester Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Every key can be overridden with HARVESTER_<SECTION>__<KEY>");
    println!();
    println!("{}", HarvesterConfig::default().to_toml()?);
    Ok(())
}
