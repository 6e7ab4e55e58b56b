//! Prometheus exposition format support.
//!
//! This module renders a [`Registry`] in the Prometheus text-based
//! exposition format and serves it over HTTP, so Prometheus or a compatible
//! scraper can pull the plug metrics.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plugwatch_sdk::prometheus::{PrometheusConfig, PrometheusExporter};
//! use plugwatch_sdk::Registry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PrometheusConfig::builder()
//!         .listen_addr("0.0.0.0:2112")
//!         .metrics_path("/metrics")
//!         .build();
//!
//!     let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//!     let server = PrometheusExporter::new(config, Arc::new(Registry::new()))
//!         .bind()
//!         .await?;
//!     let task = server.spawn(stop_rx);
//!
//!     // Metrics available at http://localhost:2112/metrics
//!     tokio::signal::ctrl_c().await?;
//!     stop_tx.send(true)?;
//!     task.await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use plugwatch_types::ValueKind;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::registry::{MetricFamily, Registry};

/// Header Prometheus sets to announce its scrape timeout.
pub const SCRAPE_TIMEOUT_HEADER: &str = "x-prometheus-scrape-timeout-seconds";

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Errors from the metrics HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address '{addr}': {source}")]
    Address {
        addr: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Configuration for Prometheus metrics endpoint.
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Address to listen on (e.g., "0.0.0.0:2112")
    pub listen_addr: String,
    /// Path for metrics endpoint (e.g., "/metrics")
    pub metrics_path: String,
    /// Optional namespace prefix for all metrics
    pub namespace: Option<String>,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:2112".to_string(),
            metrics_path: "/metrics".to_string(),
            namespace: None,
        }
    }
}

impl PrometheusConfig {
    /// Create a new builder for PrometheusConfig.
    pub fn builder() -> PrometheusConfigBuilder {
        PrometheusConfigBuilder::default()
    }
}

/// Builder for PrometheusConfig.
#[derive(Debug, Default)]
pub struct PrometheusConfigBuilder {
    listen_addr: Option<String>,
    metrics_path: Option<String>,
    namespace: Option<String>,
}

impl PrometheusConfigBuilder {
    /// Set the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the metrics path.
    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    /// Set the namespace prefix for all metrics.
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = Some(ns.into());
        self
    }

    /// Build the PrometheusConfig.
    pub fn build(self) -> PrometheusConfig {
        let defaults = PrometheusConfig::default();
        PrometheusConfig {
            listen_addr: self.listen_addr.unwrap_or(defaults.listen_addr),
            metrics_path: self.metrics_path.unwrap_or(defaults.metrics_path),
            namespace: self.namespace.filter(|ns| !ns.is_empty()),
        }
    }
}

/// Prometheus exporter that renders a registry over HTTP.
#[derive(Debug)]
pub struct PrometheusExporter {
    config: PrometheusConfig,
    registry: Arc<Registry>,
}

impl PrometheusExporter {
    /// Create a new Prometheus exporter.
    pub fn new(config: PrometheusConfig, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PrometheusConfig {
        &self.config
    }

    /// Gather the registry and render it in exposition format.
    ///
    /// Collector errors are logged; the values that were collected are
    /// rendered regardless.
    pub async fn render(&self, deadline: Option<Instant>) -> String {
        let gathered = self.registry.gather(deadline).await;
        for err in &gathered.errors {
            warn!(error = %err, "metrics collection finished with errors");
        }
        format_prometheus(&gathered.families, self.config.namespace.as_deref())
    }

    /// Bind the listener so address errors surface before serving.
    pub async fn bind(self) -> Result<MetricsServer, ServerError> {
        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|source| ServerError::Address {
                addr: self.config.listen_addr.clone(),
                source,
            })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(MetricsServer {
            listener,
            exporter: Arc::new(self),
        })
    }
}

/// A bound metrics server, ready to serve.
#[derive(Debug)]
pub struct MetricsServer {
    listener: TcpListener,
    exporter: Arc<PrometheusExporter>,
}

impl MetricsServer {
    /// The address the server is listening on.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the server on a background task that ends when `stop` flips to
    /// `true` or its sender is dropped.
    pub fn spawn(self, stop: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(stop))
    }

    /// Serve requests until `stop` flips to `true` or its sender is dropped.
    ///
    /// Accept errors (such as running out of file descriptors) are logged and
    /// retried after [`ACCEPT_BACKOFF`]; they never end the server.
    pub async fn run(self, stop: watch::Receiver<bool>) {
        let local = self.local_addr().ok();
        info!(addr = ?local, path = %self.exporter.config.metrics_path, "metrics server listening");
        serve(&self.listener, self.exporter, stop).await;
        info!("metrics server shut down");
    }
}

/// Pause after a failed accept before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[async_trait]
trait Listener: Send + Sync {
    async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Listener for TcpListener {
    async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

async fn serve<L: Listener>(
    listener: &L,
    exporter: Arc<PrometheusExporter>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "failed to accept metrics connection");
                        tokio::select! {
                            _ = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                            changed = stop.changed() => {
                                if changed.is_err() || *stop.borrow() {
                                    break;
                                }
                                continue;
                            }
                        }
                    }
                };
                let io = TokioIo::new(stream);
                let exporter = exporter.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let exporter = exporter.clone();
                        async move { handle_request(req, &exporter).await }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        debug!(peer = %peer, error = %e, "metrics connection error");
                    }
                });
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    exporter: &PrometheusExporter,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();

    if path == exporter.config.metrics_path {
        let deadline = scrape_deadline(&req);
        let body = exporter.render(deadline).await;
        Ok(response(StatusCode::OK, TEXT_FORMAT, body))
    } else if path == "/health" || path == "/healthz" {
        Ok(response(StatusCode::OK, "text/plain", "OK".to_string()))
    } else {
        Ok(response(
            StatusCode::NOT_FOUND,
            "text/plain",
            "Not Found".to_string(),
        ))
    }
}

fn response(
    status: StatusCode,
    content_type: &'static str,
    body: String,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Deadline announced by the scraper, if any.
fn scrape_deadline<B>(req: &Request<B>) -> Option<Instant> {
    let seconds: f64 = req
        .headers()
        .get(SCRAPE_TIMEOUT_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    let timeout = Duration::try_from_secs_f64(seconds).ok()?;
    Some(Instant::now() + timeout)
}

/// Format metric families in Prometheus exposition format.
pub fn format_prometheus(families: &[MetricFamily], namespace: Option<&str>) -> String {
    let mut output = String::new();
    let prefix = namespace.map(|n| format!("{}_", n)).unwrap_or_default();

    for family in families {
        let name = format!("{}{}", prefix, family.desc.name);
        let kind = match family.desc.kind {
            ValueKind::Gauge => "gauge",
            ValueKind::Counter => "counter",
        };

        let _ = writeln!(output, "# HELP {} {}", name, escape_help(family.desc.help));
        let _ = writeln!(output, "# TYPE {} {}", name, kind);

        for sample in &family.samples {
            output.push_str(&name);
            if !sample.attributes.is_empty() {
                let labels: Vec<String> = sample
                    .attributes
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
                    .collect();
                let _ = write!(output, "{{{}}}", labels.join(","));
            }
            let _ = writeln!(output, " {}", format_value(sample.value));
        }
    }

    output
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let inf = if value > 0.0 { "+Inf" } else { "-Inf" };
        inf.to_string()
    } else {
        value.to_string()
    }
}

/// Escape a label value for Prometheus format.
/// Backslash, double-quote, and newline must be escaped.
fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// HELP text only escapes backslash and newline.
fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}
