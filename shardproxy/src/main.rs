mod config;

use clap::{Args, Parser};
use config::{CommonConfig, Config};
use metrics_exporter_statsd::StatsdBuilder;
use shard_router::errors::ShardRouterError;
use shard_router::key_codec::KeyCodec;
use shard_router::shards::ShardPool;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const METRICS_PREFIX: &str = "shardproxy";

#[derive(Parser)]
#[command(name = "shardproxy", about = "Key-based sharding proxy")]
enum CliCommand {
    /// Serve client batches until terminated
    Run(ConfigArgs),
    /// Check the config file and shard list, then exit
    Validate(ConfigArgs),
    /// Print the canonical key and owning shard of each key
    Route {
        #[command(flatten)]
        config: ConfigArgs,
        /// Encoding tag applied to every key
        #[arg(long, default_value = "plain")]
        encoding: String,
        keys: Vec<String>,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the YAML config file
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("invalid shard router config: {0}")]
    ShardRouterConfig(#[from] shard_router::config::ConfigError),
    #[error(transparent)]
    ShardRouter(#[from] ShardRouterError),
    #[error("invalid sentry DSN: {0}")]
    SentryDsn(#[from] sentry::types::ParseDsnError),
    #[error("failed to set up metrics: {0}")]
    Metrics(String),
    #[error("failed to start runtime: {0}")]
    Runtime(std::io::Error),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "shardproxy failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: CliCommand) -> Result<(), CliError> {
    match cli {
        CliCommand::Run(args) => {
            let config = Config::from_file(&args.config)?;
            let _sentry = init_logging(&config.common)?;
            init_metrics(&config.common)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(CliError::Runtime)?;

            tracing::info!("Starting shard router");
            runtime.block_on(shard_router::run(config.shard_router))?;
            Ok(())
        }
        CliCommand::Validate(args) => {
            let config = Config::from_file(&args.config)?;
            config
                .shard_router
                .validate()
                .map_err(shard_router::config::ConfigError::from)?;
            let shards = config.shard_router.load_shards()?;
            println!("{}: ok ({} shards)", args.config.display(), shards.len());
            Ok(())
        }
        CliCommand::Route {
            config,
            encoding,
            keys,
        } => {
            let config = Config::from_file(&config.config)?;
            for line in route_keys(&config.shard_router, &encoding, &keys)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

/// Resolves each key to `<canonical key>\t<shard index>\t<shard address>`.
fn route_keys(
    config: &shard_router::config::Config,
    encoding: &str,
    keys: &[String],
) -> Result<Vec<String>, CliError> {
    let pool = ShardPool::new(config.load_shards()?)
        .map_err(shard_router::config::ConfigError::from)?;
    let codec = KeyCodec::new(config.keys.binary);
    let router = pool.router();

    keys.iter()
        .map(|key| {
            let canonical = codec.normalize(Some(encoding), key)?;
            let id = router.shard_for(&canonical);
            let target = pool
                .get(id)
                .map(|shard| shard.target().to_string())
                .unwrap_or_default();
            Ok(format!("{canonical}\t{id}\t{target}"))
        })
        .collect()
}

fn init_logging(common: &CommonConfig) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let guard = match &common.logging {
        Some(logging) => Some(sentry::init(sentry::ClientOptions {
            dsn: Some(logging.sentry_dsn.parse()?),
            release: sentry::release_name!(),
            ..Default::default()
        })),
        None => None,
    };

    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    Ok(guard)
}

fn init_metrics(common: &CommonConfig) -> Result<(), CliError> {
    let Some(metrics_config) = &common.metrics else {
        return Ok(());
    };

    let recorder = StatsdBuilder::from(&metrics_config.statsd_host, metrics_config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder)
        .map_err(|_| CliError::Metrics("a metrics recorder is already installed".into()))?;

    tracing::info!(
        host = %metrics_config.statsd_host,
        port = metrics_config.statsd_port,
        "Reporting metrics to statsd"
    );
    Ok(())
}
