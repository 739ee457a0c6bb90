use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use influx::{InfluxDriver, ProvisionError};
use metric_gateway::errors::GatewayError;
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod config;

#[derive(Parser)]
#[command(name = "influxproxy", about = "Browser-facing metric gateway for InfluxDB")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Create every tenant database, then serve the gateway
    Run(RunArgs),
    /// Create every tenant database and exit
    CreateDatabases(ConfigArgs),
    /// Load and validate the configuration
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, env = "APP_SETTINGS_YAML")]
    config: PathBuf,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Overrides the listener port
    #[arg(long, env = "PORT")]
    port: Option<u16>,
    /// Log at debug level unless RUST_LOG says otherwise. Any non-empty
    /// `DEBUG` other than a falsey word ("0", "false", "no", "off") enables it.
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    debug: bool,
}

#[derive(thiserror::Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("could not create statsd recorder: {0}")]
    Statsd(#[from] StatsdError),
    #[error("a metrics recorder is already installed")]
    RecorderInstalled,
    #[error("could not provision databases: {0}")]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Run(args) => run(args),
        CliCommand::CreateDatabases(args) => create_databases(args),
        CliCommand::CheckConfig(args) => check_config(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "influxproxy failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: RunArgs) -> Result<(), StartupError> {
    let mut config = Config::from_file(&args.config.config)?;
    if let Some(port) = args.port {
        config.gateway.listener.port = port;
        config.validate()?;
    }

    let _sentry = init_logging(&config.common.logging, args.debug);
    if let Some(metrics) = &config.common.metrics {
        init_metrics(metrics)?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let driver = InfluxDriver::new(config.backend.clone())?;
        driver.create_databases(config.gateway.tenants.keys()).await?;

        let default_udp_port = config.backend.udp_port;
        metric_gateway::run(config.gateway, Arc::new(driver), default_udp_port).await?;
        tracing::info!("gateway stopped");
        Ok::<_, StartupError>(())
    })
}

fn create_databases(args: ConfigArgs) -> Result<(), StartupError> {
    let config = Config::from_file(&args.config)?;
    let _sentry = init_logging(&config.common.logging, false);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let driver = InfluxDriver::new(config.backend)?;
        driver.create_databases(config.gateway.tenants.keys()).await?;
        Ok::<_, StartupError>(())
    })
}

fn check_config(args: ConfigArgs) -> Result<(), StartupError> {
    let config = Config::from_file(&args.config)?;
    println!(
        "{}: ok, {} tenant(s)",
        args.config.display(),
        config.gateway.tenants.len()
    );
    Ok(())
}

/// Installs the global subscriber. The returned guard flushes Sentry on drop
/// and must be held until the process exits.
fn init_logging(logging: &LoggingConfig, debug: bool) -> Option<sentry::ClientInitGuard> {
    let level = if debug { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let sentry = logging.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(
            sentry
                .as_ref()
                .map(|_| sentry::integrations::tracing::layer()),
        )
        .init();

    sentry
}

fn init_metrics(metrics: &MetricsConfig) -> Result<(), StartupError> {
    let recorder = StatsdBuilder::from(metrics.statsd_host.clone(), metrics.statsd_port)
        .build(Some(&metrics.prefix))?;
    metrics::set_global_recorder(recorder).map_err(|_| StartupError::RecorderInstalled)?;
    shared::describe_metrics!(influx::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %metrics.statsd_host,
        port = metrics.statsd_port,
        "statsd metrics enabled"
    );
    Ok(())
}
