//! OpenTelemetry push sink for plug metrics.
//!
//! Every `set_gauge` / `add_counter` is recorded on an OpenTelemetry
//! instrument and exported periodically via OTLP/HTTP.
//!
//! # Example
//!
//! ```rust,no_run
//! use plugwatch_sdk::otel::{OtelConfig, OtelSink};
//! use plugwatch_sdk::PushSink;
//! use plugwatch_types::{Attributes, PLUG_TEMPERATURE};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OtelConfig::builder()
//!         .endpoint("http://localhost:4318")
//!         .service_name("plugwatch")
//!         .instance_id("garage")
//!         .build();
//!
//!     let sink = OtelSink::new(&config).expect("Failed to create OTLP exporter");
//!     sink.set_gauge(PLUG_TEMPERATURE, &Attributes::device("plug1"), 31.2);
//! }
//! ```

use std::collections::HashMap;

use opentelemetry::metrics::{Counter, Gauge, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;

use plugwatch_types::{Attributes, ValueKind, PLUG_METRICS};

use crate::sink::PushSink;

/// Configuration for OpenTelemetry export.
#[derive(Debug, Clone)]
pub struct OtelConfig {
    /// OTLP endpoint (e.g., "http://localhost:4318")
    pub endpoint: String,
    /// Service name for metrics attribution
    pub service_name: String,
    /// Optional `service.instance.id` resource attribute
    pub instance_id: Option<String>,
}

impl OtelConfig {
    /// Create a new builder for OtelConfig.
    pub fn builder() -> OtelConfigBuilder {
        OtelConfigBuilder::default()
    }
}

/// Builder for OtelConfig.
#[derive(Debug, Default)]
pub struct OtelConfigBuilder {
    endpoint: Option<String>,
    service_name: Option<String>,
    instance_id: Option<String>,
}

impl OtelConfigBuilder {
    /// Set the OTLP endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the service name.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Set the service instance id.
    pub fn instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    /// Build the OtelConfig.
    pub fn build(self) -> OtelConfig {
        OtelConfig {
            endpoint: self
                .endpoint
                .unwrap_or_else(|| "http://localhost:4318".to_string()),
            service_name: self.service_name.unwrap_or_else(|| "plugwatch".to_string()),
            instance_id: self.instance_id.filter(|id| !id.is_empty()),
        }
    }
}

/// Push sink recording plug metrics on OpenTelemetry instruments.
pub struct OtelSink {
    provider: SdkMeterProvider,
    gauges: HashMap<&'static str, Gauge<f64>>,
    counters: HashMap<&'static str, Counter<f64>>,
}

impl OtelSink {
    /// Create a new OtelSink with the given configuration.
    pub fn new(config: &OtelConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        use opentelemetry_otlp::MetricExporter;
        use opentelemetry_sdk::metrics::PeriodicReader;
        use opentelemetry_sdk::Resource;

        let exporter = MetricExporter::builder()
            .with_http()
            .with_endpoint(format!("{}/v1/metrics", config.endpoint))
            .build()?;

        let reader = PeriodicReader::builder(exporter).build();

        let mut resource = Resource::builder().with_service_name(config.service_name.clone());
        if let Some(id) = &config.instance_id {
            resource = resource.with_attribute(KeyValue::new("service.instance.id", id.clone()));
        }

        let provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource.build())
            .build();

        let meter = provider.meter("plugwatch");

        let mut gauges = HashMap::new();
        let mut counters = HashMap::new();
        for desc in PLUG_METRICS.iter() {
            match desc.kind {
                ValueKind::Gauge => {
                    let gauge = meter
                        .f64_gauge(desc.name)
                        .with_description(desc.help)
                        .with_unit(desc.unit)
                        .build();
                    gauges.insert(desc.name, gauge);
                }
                ValueKind::Counter => {
                    let counter = meter
                        .f64_counter(desc.name)
                        .with_description(desc.help)
                        .with_unit(desc.unit)
                        .build();
                    counters.insert(desc.name, counter);
                }
            }
        }

        Ok(Self {
            provider,
            gauges,
            counters,
        })
    }

    /// Flush pending metrics and stop the periodic exporter.
    pub fn shutdown(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.provider.shutdown()?;
        Ok(())
    }
}

fn key_values(attributes: &Attributes) -> Vec<KeyValue> {
    attributes
        .iter()
        .map(|(k, v)| KeyValue::new(k.to_string(), v.to_string()))
        .collect()
}

impl PushSink for OtelSink {
    fn set_gauge(&self, name: &'static str, attributes: &Attributes, value: f64) {
        if let Some(gauge) = self.gauges.get(name) {
            gauge.record(value, &key_values(attributes));
        }
    }

    fn add_counter(&self, name: &'static str, attributes: &Attributes, delta: f64) {
        if let Some(counter) = self.counters.get(name) {
            if delta >= 0.0 {
                counter.add(delta, &key_values(attributes));
            }
        }
    }
}

impl std::fmt::Debug for OtelSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtelSink")
            .field("gauges", &self.gauges.len())
            .field("counters", &self.counters.len())
            .finish()
    }
}
