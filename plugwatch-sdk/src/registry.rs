//! Metric registry combining retained push values with on-demand collectors.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use plugwatch_types::{Attributes, MetricDesc, ValueKind, PLUG_METRICS};

use crate::sink::{Observer, PushSink};

/// Error returned by a collection callback.
///
/// Errors are advisory: whatever the callback observed before returning is
/// still published.
pub type CollectError = Box<dyn std::error::Error + Send + Sync>;

/// A callback invoked by the registry at scrape time.
#[async_trait]
pub trait Collect: Send + Sync {
    /// Report the current values through `observer`.
    ///
    /// `deadline` is the scrape's own deadline, if the scraper announced one.
    async fn collect(
        &self,
        observer: Arc<dyn Observer>,
        deadline: Option<Instant>,
    ) -> Result<(), CollectError>;
}

/// One series value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub attributes: Attributes,
    pub value: f64,
}

/// All series of one metric, with its descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub desc: MetricDesc,
    pub samples: Vec<Sample>,
}

/// Result of [`Registry::gather`].
#[derive(Debug, Default)]
pub struct Gathered {
    /// Families in descriptor order; families without samples are kept.
    pub families: Vec<MetricFamily>,
    /// Errors reported by collectors during this gather.
    pub errors: Vec<CollectError>,
}

impl Gathered {
    /// Look up a sample by metric name and attribute values.
    pub fn value(&self, name: &str, attributes: &[(&str, &str)]) -> Option<f64> {
        self.families
            .iter()
            .find(|f| f.desc.name == name)?
            .samples
            .iter()
            .find(|s| attributes.iter().all(|(k, v)| s.attributes.get(k) == Some(*v)))
            .map(|s| s.value)
    }

    /// Total number of samples across all families.
    pub fn sample_count(&self) -> usize {
        self.families.iter().map(|f| f.samples.len()).sum()
    }
}

type SeriesKey = (&'static str, Attributes);

/// Holds metric descriptors, retained push values and pull collectors.
///
/// The registry is constructed explicitly and shared through an `Arc`; there
/// is no process-global instance.
pub struct Registry {
    descs: Vec<MetricDesc>,
    series: RwLock<BTreeMap<SeriesKey, f64>>,
    collectors: RwLock<Vec<Arc<dyn Collect>>>,
}

impl Registry {
    /// Create a registry describing the plug metrics.
    pub fn new() -> Self {
        Self::with_descriptors(PLUG_METRICS.iter().copied())
    }

    /// Create a registry with a custom descriptor set.
    pub fn with_descriptors(descs: impl IntoIterator<Item = MetricDesc>) -> Self {
        Self {
            descs: descs.into_iter().collect(),
            series: RwLock::new(BTreeMap::new()),
            collectors: RwLock::new(Vec::new()),
        }
    }

    /// Descriptors known to this registry.
    pub fn descriptors(&self) -> &[MetricDesc] {
        &self.descs
    }

    /// Register a collection callback run on every gather.
    pub fn register_collector(&self, collector: Arc<dyn Collect>) {
        self.collectors.write().push(collector);
    }

    /// Number of retained push series.
    pub fn series_count(&self) -> usize {
        self.series.read().len()
    }

    fn is_known(&self, name: &str) -> bool {
        self.descs.iter().any(|d| d.name == name)
    }

    /// Collect every metric family.
    ///
    /// Retained push values are merged with whatever each registered
    /// collector observes in this call. Collector failures are returned in
    /// [`Gathered::errors`] and do not discard the values they observed.
    pub async fn gather(&self, deadline: Option<Instant>) -> Gathered {
        let mut samples: BTreeMap<&'static str, Vec<Sample>> = BTreeMap::new();

        for ((name, attributes), value) in self.series.read().iter() {
            samples.entry(*name).or_default().push(Sample {
                attributes: attributes.clone(),
                value: *value,
            });
        }

        // Clone the list so no lock is held across collector awaits.
        let collectors: Vec<_> = self.collectors.read().clone();
        let mut errors = Vec::new();

        for collector in collectors {
            let round = Arc::new(RoundObserver::default());
            if let Err(err) = collector.collect(round.clone(), deadline).await {
                errors.push(err);
            }
            for (name, sample) in round.take() {
                if self.is_known(name) {
                    samples.entry(name).or_default().push(sample);
                } else {
                    tracing::debug!(metric = name, "dropping observation for unknown metric");
                }
            }
        }

        let families = self
            .descs
            .iter()
            .map(|desc| {
                let mut samples = samples.remove(desc.name).unwrap_or_default();
                samples.sort_by(|a, b| exposition_order(&a.attributes, &b.attributes));
                MetricFamily {
                    desc: *desc,
                    samples,
                }
            })
            .collect();

        Gathered { families, errors }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("descs", &self.descs.len())
            .field("series", &self.series.read().len())
            .field("collectors", &self.collectors.read().len())
            .finish()
    }
}

impl PushSink for Registry {
    fn set_gauge(&self, name: &'static str, attributes: &Attributes, value: f64) {
        if !self.is_known(name) {
            tracing::debug!(metric = name, "ignoring gauge for unknown metric");
            return;
        }
        self.series.write().insert((name, attributes.clone()), value);
    }

    fn add_counter(&self, name: &'static str, attributes: &Attributes, delta: f64) {
        if !self.is_known(name) {
            tracing::debug!(metric = name, "ignoring counter for unknown metric");
            return;
        }
        // Counters never go down.
        if delta.is_nan() || delta < 0.0 {
            return;
        }
        *self
            .series
            .write()
            .entry((name, attributes.clone()))
            .or_insert(0.0) += delta;
    }
}

/// Per-gather sample buffer handed to collectors.
#[derive(Default)]
struct RoundObserver {
    samples: Mutex<Vec<(&'static str, Sample)>>,
}

impl RoundObserver {
    fn take(&self) -> Vec<(&'static str, Sample)> {
        std::mem::take(&mut *self.samples.lock())
    }
}

impl Observer for RoundObserver {
    fn observe(&self, name: &'static str, attributes: &Attributes, value: f64) {
        let sample = Sample {
            attributes: attributes.clone(),
            value,
        };
        self.samples.lock().push((name, sample));
    }
}

/// Label-wise ordering where numeric values compare as numbers, so
/// `meter="2"` sorts before `meter="10"`.
fn exposition_order(a: &Attributes, b: &Attributes) -> std::cmp::Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ord = ka.cmp(kb).then_with(|| match (va.parse::<u64>(), vb.parse::<u64>()) {
            (Ok(na), Ok(nb)) => na.cmp(&nb),
            _ => va.cmp(vb),
        });
        if ord.is_ne() {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugwatch_types::{PLUG_POWER, PLUG_TEMPERATURE, PLUG_TOTAL_POWER};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn meter(name: &str, meter: u32) -> Attributes {
        Attributes::device(name).with("meter", meter)
    }

    struct Fixed {
        value: f64,
        fail: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Collect for Fixed {
        async fn collect(
            &self,
            observer: Arc<dyn Observer>,
            _deadline: Option<Instant>,
        ) -> Result<(), CollectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            observer.observe(PLUG_TEMPERATURE, &Attributes::device("pulled"), self.value);
            if self.fail {
                return Err("device b unreachable".into());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_gauge_last_write_wins() {
        let registry = Registry::new();
        registry.set_gauge(PLUG_POWER, &meter("a", 0), 1.0);
        registry.set_gauge(PLUG_POWER, &meter("a", 0), 2.0);

        let gathered = registry.gather(None).await;
        assert_eq!(
            gathered.value(PLUG_POWER, &[("name", "a"), ("meter", "0")]),
            Some(2.0)
        );
        assert_eq!(registry.series_count(), 1);
    }

    #[tokio::test]
    async fn test_counter_accumulates_and_ignores_negative() {
        let registry = Registry::new();
        registry.add_counter(PLUG_TOTAL_POWER, &meter("a", 0), 10.0);
        registry.add_counter(PLUG_TOTAL_POWER, &meter("a", 0), 5.0);
        registry.add_counter(PLUG_TOTAL_POWER, &meter("a", 0), -3.0);

        let gathered = registry.gather(None).await;
        assert_eq!(gathered.value(PLUG_TOTAL_POWER, &[("name", "a")]), Some(15.0));
    }

    #[tokio::test]
    async fn test_unknown_metric_is_ignored() {
        let registry = Registry::new();
        registry.set_gauge("plug_voltage", &Attributes::device("a"), 230.0);
        assert_eq!(registry.series_count(), 0);
    }

    #[tokio::test]
    async fn test_families_follow_descriptor_order() {
        let registry = Registry::new();
        let gathered = registry.gather(None).await;

        let names: Vec<_> = gathered.families.iter().map(|f| f.desc.name).collect();
        let expected: Vec<_> = PLUG_METRICS.iter().map(|d| d.name).collect();
        assert_eq!(names, expected);
        assert_eq!(gathered.sample_count(), 0);
    }

    #[tokio::test]
    async fn test_collector_runs_on_every_gather_without_caching() {
        let registry = Registry::new();
        let collector = Arc::new(Fixed {
            value: 30.0,
            fail: false,
            calls: AtomicU32::new(0),
        });
        registry.register_collector(collector.clone());

        let first = registry.gather(None).await;
        let second = registry.gather(None).await;

        assert_eq!(collector.calls.load(Ordering::SeqCst), 2);
        assert_eq!(first.value(PLUG_TEMPERATURE, &[("name", "pulled")]), Some(30.0));
        // One sample per gather, nothing carried over.
        assert_eq!(second.sample_count(), 1);
        assert_eq!(registry.series_count(), 0);
    }

    #[tokio::test]
    async fn test_collector_error_keeps_observed_values() {
        let registry = Registry::new();
        registry.register_collector(Arc::new(Fixed {
            value: 21.0,
            fail: true,
            calls: AtomicU32::new(0),
        }));

        let gathered = registry.gather(None).await;

        assert_eq!(gathered.errors.len(), 1);
        assert!(gathered.errors[0].to_string().contains("device b"));
        assert_eq!(
            gathered.value(PLUG_TEMPERATURE, &[("name", "pulled")]),
            Some(21.0)
        );
    }

    #[tokio::test]
    async fn test_samples_sorted_by_attributes() {
        let registry = Registry::new();
        registry.set_gauge(PLUG_POWER, &meter("b", 0), 2.0);
        registry.set_gauge(PLUG_POWER, &meter("a", 1), 1.5);
        registry.set_gauge(PLUG_POWER, &meter("a", 0), 1.0);

        let gathered = registry.gather(None).await;
        let power = &gathered.families[0];
        let values: Vec<_> = power.samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 1.5, 2.0]);
    }

    #[tokio::test]
    async fn test_meters_sorted_numerically() {
        let registry = Registry::new();
        registry.set_gauge(PLUG_POWER, &meter("a", 10), 10.0);
        registry.set_gauge(PLUG_POWER, &meter("a", 2), 2.0);
        registry.set_gauge(PLUG_POWER, &meter("a", 1), 1.0);

        let gathered = registry.gather(None).await;
        let values: Vec<_> = gathered.families[0].samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 10.0]);
    }
}
