use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use plugwatch::collector::Collector;
use plugwatch::config::{Config, LogFormat, LogLevel, Mode};
use plugwatch::logging;
use plugwatch_adapters::{ShellyClient, StatusSource};
use plugwatch_sdk::prometheus::{PrometheusConfig, PrometheusExporter};
use plugwatch_sdk::{Collect, Fanout, PushSink, Registry};

#[derive(Parser, Debug)]
#[command(name = "plugwatch")]
#[command(about = "Prometheus exporter polling a fleet of smart plugs")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "plugwatch.yml")]
    config: PathBuf,

    /// Debug logging with source locations
    #[arg(short, long)]
    debug: bool,

    /// Log output format
    #[arg(long, value_enum)]
    log: Option<LogFormat>,

    /// Minimum log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Collection mode, overriding the configuration file
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(format) = self.log {
            config.log.format = format;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
        if self.debug {
            config.log.level = LogLevel::Debug;
            config.log.add_source = true;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    args.apply(&mut config);

    logging::init(&config.log)?;

    let devices = config
        .resolve_devices()
        .context("invalid device configuration")?;
    if devices.is_empty() {
        warn!("no devices configured");
    }
    info!(
        devices = devices.len(),
        mode = ?config.mode,
        config = %args.config.display(),
        "starting plugwatch"
    );

    if config.global.tls_skip_verify {
        warn!("TLS certificate verification is disabled for secure devices");
    }
    let source: Arc<dyn StatusSource> = Arc::new(build_client(&config)?);
    let collector = Arc::new(Collector::new(devices, source));
    let registry = Arc::new(Registry::new());

    let (stop_tx, stop_rx) = watch::channel(false);

    let mut prometheus = PrometheusConfig::builder()
        .listen_addr(config.server.socket_addr())
        .metrics_path(config.server.endpoint.clone());
    if let Some(namespace) = &config.server.namespace {
        prometheus = prometheus.namespace(namespace.clone());
    }
    let server = PrometheusExporter::new(prometheus.build(), Arc::clone(&registry))
        .bind()
        .await
        .context("failed to start metrics server")?;
    info!(
        addr = %server.local_addr()?,
        path = %config.server.endpoint,
        "serving metrics"
    );
    let server_task = server.spawn(stop_rx.clone());

    #[cfg(feature = "otel")]
    let otel = build_otel(&config)?;

    let push_task = match config.mode {
        Mode::Push => {
            let sink = Fanout::new().with(Arc::clone(&registry) as Arc<dyn PushSink>);
            #[cfg(feature = "otel")]
            let sink = match &otel {
                Some(otel) => sink.with(Arc::clone(otel) as Arc<dyn PushSink>),
                None => sink,
            };
            let sink: Arc<dyn PushSink> = Arc::new(sink);
            let collector = Arc::clone(&collector);
            let stop = stop_rx.clone();
            Some(tokio::spawn(async move { collector.run(sink, stop).await }))
        }
        Mode::Pull => {
            registry.register_collector(Arc::clone(&collector) as Arc<dyn Collect>);
            None
        }
    };

    #[cfg(not(feature = "otel"))]
    if config.otel.is_some() {
        warn!("otel settings ignored: built without the `otel` feature");
    }

    shutdown_signal().await;
    info!("shutting down");
    let _ = stop_tx.send(true);

    if let Some(task) = push_task {
        task.await.context("collector task failed")?;
    }
    server_task.await.context("metrics server task failed")?;

    #[cfg(feature = "otel")]
    if let Some(otel) = otel {
        if let Err(err) = otel.shutdown() {
            warn!(error = %err, "failed to flush OTLP metrics");
        }
    }

    info!("stopped");
    Ok(())
}

fn build_client(config: &Config) -> Result<ShellyClient> {
    ShellyClient::builder()
        .user_agent(concat!("plugwatch/", env!("CARGO_PKG_VERSION")))
        .accept_invalid_certs(config.global.tls_skip_verify)
        .build()
        .context("failed to build HTTP client")
}

#[cfg(feature = "otel")]
fn build_otel(config: &Config) -> Result<Option<Arc<plugwatch_sdk::OtelSink>>> {
    use plugwatch_sdk::{OtelConfig, OtelSink};

    let Some(settings) = &config.otel else {
        return Ok(None);
    };
    if config.mode == Mode::Pull {
        warn!("otel export only runs in push mode");
        return Ok(None);
    }

    let mut builder = OtelConfig::builder()
        .endpoint(settings.endpoint.clone())
        .service_name("plugwatch");
    if !settings.instance_id.is_empty() {
        builder = builder.instance_id(settings.instance_id.clone());
    }
    let sink = OtelSink::new(&builder.build())
        .map_err(|e| anyhow::anyhow!("failed to start OTLP exporter: {e}"))?;
    info!(endpoint = %settings.endpoint, "exporting metrics over OTLP");
    Ok(Some(Arc::new(sink)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "plugwatch",
            "--config",
            "/etc/plugwatch.yml",
            "--log",
            "text",
            "--log-level",
            "warn",
            "--mode",
            "pull",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(args.config, PathBuf::from("/etc/plugwatch.yml"));
        assert_eq!(config.log.format, LogFormat::Text);
        assert_eq!(config.log.level, LogLevel::Warn);
        assert_eq!(config.mode, Mode::Pull);
        assert!(!config.log.add_source);
    }

    #[test]
    fn test_debug_flag_wins() {
        let args = Args::parse_from(["plugwatch", "--debug", "--log-level", "error"]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(args.config, PathBuf::from("plugwatch.yml"));
        assert_eq!(config.log.level, LogLevel::Debug);
        assert!(config.log.add_source);
    }

    #[test]
    fn test_no_flags_keep_file_values() {
        let args = Args::parse_from(["plugwatch"]);
        let mut config = Config::from_yaml("mode: pull\nlog:\n  format: text\n").unwrap();
        args.apply(&mut config);

        assert_eq!(config.mode, Mode::Pull);
        assert_eq!(config.log.format, LogFormat::Text);
    }

    #[test]
    fn test_client_builds_with_tls_skip_verify() {
        let config = Config::from_yaml("global:\n  tls_skip_verify: true\n").unwrap();
        assert!(config.global.tls_skip_verify);
        assert!(build_client(&config).is_ok());
    }
}
