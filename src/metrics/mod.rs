//! Thread-safe metrics registry with Prometheus text exposition (component
//! C6). Only the four pre-registered families accept mutations; unknown
//! names are silently ignored, matching the rest of the registry's
//! "unrecognized input is a no-op, not an error" posture.

use std::collections::HashMap;
use std::sync::Mutex;

/// Default latency bucket bounds, in seconds.
pub const DEFAULT_BUCKET_BOUNDS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

const REQUESTS_TOTAL: &str = "mcp_requests_total";
const SSE_EVENTS_SENT_TOTAL: &str = "mcp_sse_events_sent_total";
const REQUEST_DURATION_SECONDS: &str = "mcp_request_duration_seconds";
const SSE_CONNECTIONS_ACTIVE: &str = "mcp_sse_connections_active";

#[derive(Default)]
struct CounterFamily {
    values: HashMap<String, u64>,
}

#[derive(Default)]
struct GaugeFamily {
    values: HashMap<String, f64>,
}

/// Non-cumulative bucket counts plus the running sum/count needed to render
/// a Prometheus histogram. Cumulation happens only in `write_prometheus`.
struct Histogram {
    buckets: Vec<u64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    fn new(bound_count: usize) -> Self {
        Self {
            buckets: vec![0; bound_count + 1], // + 1 for the +Inf bucket
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, bounds: &[f64], value: f64) {
        let bucket_index = bounds.iter().position(|bound| value <= *bound).unwrap_or(bounds.len());
        self.buckets[bucket_index] += 1;
        self.sum += value;
        self.count += 1;
    }
}

#[derive(Default)]
struct HistogramFamily {
    bounds: Vec<f64>,
    values: HashMap<String, Histogram>,
}

impl HistogramFamily {
    fn new(bounds: &[f64]) -> Self {
        Self {
            bounds: bounds.to_vec(),
            values: HashMap::new(),
        }
    }

    fn observe(&mut self, labels: &str, value: f64) {
        let bounds = self.bounds.clone();
        self.values
            .entry(labels.to_string())
            .or_insert_with(|| Histogram::new(bounds.len()))
            .observe(&bounds, value);
    }
}

struct Inner {
    counters: HashMap<&'static str, CounterFamily>,
    gauges: HashMap<&'static str, GaugeFamily>,
    histograms: HashMap<&'static str, HistogramFamily>,
}

/// Counters, gauges, and histograms, each keyed by a family name and a
/// pre-formatted label string (e.g. `tool="click",status="ok"`, or empty).
pub struct MetricsRegistry {
    inner: Mutex<Inner>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut counters = HashMap::new();
        counters.insert(REQUESTS_TOTAL, CounterFamily::default());
        counters.insert(SSE_EVENTS_SENT_TOTAL, CounterFamily::default());

        let mut gauges = HashMap::new();
        gauges.insert(SSE_CONNECTIONS_ACTIVE, GaugeFamily::default());

        let mut histograms = HashMap::new();
        histograms.insert(REQUEST_DURATION_SECONDS, HistogramFamily::new(DEFAULT_BUCKET_BOUNDS));

        Self {
            inner: Mutex::new(Inner { counters, gauges, histograms }),
        }
    }

    pub fn increment_counter(&self, name: &str, labels: &str) {
        let mut inner = self.inner.lock().expect("metrics registry lock poisoned");
        if let Some(family) = inner.counters.get_mut(name) {
            *family.values.entry(labels.to_string()).or_insert(0) += 1;
        }
    }

    pub fn observe_histogram(&self, name: &str, labels: &str, value: f64) {
        let mut inner = self.inner.lock().expect("metrics registry lock poisoned");
        if let Some(family) = inner.histograms.get_mut(name) {
            family.observe(labels, value);
        }
    }

    pub fn set_gauge(&self, name: &str, labels: &str, value: f64) {
        let mut inner = self.inner.lock().expect("metrics registry lock poisoned");
        if let Some(family) = inner.gauges.get_mut(name) {
            family.values.insert(labels.to_string(), value);
        }
    }

    pub fn increment_gauge(&self, name: &str, labels: &str, delta: f64) {
        let mut inner = self.inner.lock().expect("metrics registry lock poisoned");
        if let Some(family) = inner.gauges.get_mut(name) {
            *family.values.entry(labels.to_string()).or_insert(0.0) += delta;
        }
    }

    /// One counter increment with `tool="…",status="…"` labels, and one
    /// histogram observation with `tool="…"` at `duration` seconds.
    pub fn record_request(&self, tool: &str, status: &str, duration_seconds: f64) {
        self.increment_counter(REQUESTS_TOTAL, &format!(r#"tool="{tool}",status="{status}""#));
        self.observe_histogram(REQUEST_DURATION_SECONDS, &format!(r#"tool="{tool}""#), duration_seconds);
    }

    pub fn record_sse_event(&self) {
        self.increment_counter(SSE_EVENTS_SENT_TOTAL, "");
    }

    pub fn set_sse_connections(&self, count: i64) {
        self.set_gauge(SSE_CONNECTIONS_ACTIVE, "", count as f64);
    }

    /// Render every family in deterministic order: counters, then gauges,
    /// then histograms, each sorted by label string. Histogram buckets are
    /// cumulated here — the only place cumulation happens.
    pub fn write_prometheus(&self) -> String {
        let inner = self.inner.lock().expect("metrics registry lock poisoned");
        let mut out = String::new();

        let mut counter_names: Vec<_> = inner.counters.keys().collect();
        counter_names.sort();
        for name in counter_names {
            let family = &inner.counters[name];
            out.push_str(&format!("# TYPE {name} counter\n"));
            let mut labels: Vec<_> = family.values.keys().collect();
            labels.sort();
            for label in labels {
                let value = family.values[label];
                out.push_str(&render_line(name, label, &value.to_string()));
            }
        }

        let mut gauge_names: Vec<_> = inner.gauges.keys().collect();
        gauge_names.sort();
        for name in gauge_names {
            let family = &inner.gauges[name];
            out.push_str(&format!("# TYPE {name} gauge\n"));
            let mut labels: Vec<_> = family.values.keys().collect();
            labels.sort();
            for label in labels {
                let value = family.values[label];
                out.push_str(&render_line(name, label, &value.to_string()));
            }
        }

        let mut histogram_names: Vec<_> = inner.histograms.keys().collect();
        histogram_names.sort();
        for name in histogram_names {
            let family = &inner.histograms[name];
            out.push_str(&format!("# TYPE {name} histogram\n"));
            let mut labels: Vec<_> = family.values.keys().collect();
            labels.sort();
            for label in labels {
                let histogram = &family.values[label];
                let mut cumulative = 0u64;
                for (bound, bucket_count) in family.bounds.iter().zip(histogram.buckets.iter()) {
                    cumulative += bucket_count;
                    let bucket_labels = join_labels(label, &format!(r#"le="{bound}""#));
                    out.push_str(&render_line(&format!("{name}_bucket"), &bucket_labels, &cumulative.to_string()));
                }
                cumulative += histogram.buckets[family.bounds.len()];
                let inf_labels = join_labels(label, r#"le="+Inf""#);
                out.push_str(&render_line(&format!("{name}_bucket"), &inf_labels, &cumulative.to_string()));
                out.push_str(&render_line(&format!("{name}_sum"), label, &histogram.sum.to_string()));
                out.push_str(&render_line(&format!("{name}_count"), label, &histogram.count.to_string()));
            }
        }

        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn render_line(metric: &str, labels: &str, value: &str) -> String {
    if labels.is_empty() {
        format!("{metric} {value}\n")
    } else {
        format!("{metric}{{{labels}}} {value}\n")
    }
}

fn join_labels(existing: &str, extra: &str) -> String {
    if existing.is_empty() {
        extra.to_string()
    } else {
        format!("{existing},{extra}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_names_are_silently_ignored() {
        let registry = MetricsRegistry::new();
        registry.increment_counter("not_a_real_counter", "");
        registry.set_gauge("not_a_real_gauge", "", 1.0);
        registry.observe_histogram("not_a_real_histogram", "", 1.0);
        let text = registry.write_prometheus();
        assert!(!text.contains("not_a_real"));
    }

    #[test]
    fn record_request_increments_counter_and_histogram() {
        let registry = MetricsRegistry::new();
        registry.record_request("click", "ok", 0.02);
        let text = registry.write_prometheus();
        assert!(text.contains(r#"mcp_requests_total{status="ok",tool="click"} 1"#));
        assert!(text.contains(r#"mcp_request_duration_seconds_count{tool="click"} 1"#));
    }

    #[test]
    fn histogram_buckets_are_cumulative_only_at_render_time() {
        let registry = MetricsRegistry::new();
        registry.observe_histogram(REQUEST_DURATION_SECONDS, "", 0.02);
        registry.observe_histogram(REQUEST_DURATION_SECONDS, "", 2.0);

        let text = registry.write_prometheus();
        // 0.02 lands in the 0.025 bucket; 2.0 lands in the 2.5 bucket.
        // Every bucket bound >= 2.5 must include both observations.
        assert!(text.contains(r#"mcp_request_duration_seconds_bucket{le="0.025"} 1"#));
        assert!(text.contains(r#"mcp_request_duration_seconds_bucket{le="0.5"} 1"#));
        assert!(text.contains(r#"mcp_request_duration_seconds_bucket{le="2.5"} 2"#));
        assert!(text.contains(r#"mcp_request_duration_seconds_bucket{le="10"} 2"#));
        assert!(text.contains(r#"mcp_request_duration_seconds_bucket{le="+Inf"} 2"#));
        assert!(text.contains("mcp_request_duration_seconds_sum{} 2.02"));
        assert!(text.contains("mcp_request_duration_seconds_count{} 2"));
    }

    #[test]
    fn value_above_largest_bound_lands_in_inf_bucket_only() {
        let registry = MetricsRegistry::new();
        registry.observe_histogram(REQUEST_DURATION_SECONDS, "", 99.0);
        let text = registry.write_prometheus();
        assert!(text.contains(r#"mcp_request_duration_seconds_bucket{le="10"} 0"#));
        assert!(text.contains(r#"mcp_request_duration_seconds_bucket{le="+Inf"} 1"#));
    }

    #[test]
    fn gauges_set_and_increment() {
        let registry = MetricsRegistry::new();
        registry.set_sse_connections(3);
        let text = registry.write_prometheus();
        assert!(text.contains("mcp_sse_connections_active 3"));

        registry.increment_gauge(SSE_CONNECTIONS_ACTIVE, "", -1.0);
        let text = registry.write_prometheus();
        assert!(text.contains("mcp_sse_connections_active 2"));
    }

    #[test]
    fn families_render_in_sorted_deterministic_order() {
        let registry = MetricsRegistry::new();
        registry.record_request("a", "ok", 0.01);
        registry.record_sse_event();
        registry.set_sse_connections(1);

        let text = registry.write_prometheus();
        let requests_pos = text.find("# TYPE mcp_requests_total").unwrap();
        let sse_events_pos = text.find("# TYPE mcp_sse_events_sent_total").unwrap();
        let gauge_pos = text.find("# TYPE mcp_sse_connections_active").unwrap();
        let histogram_pos = text.find("# TYPE mcp_request_duration_seconds").unwrap();
        assert!(requests_pos < sse_events_pos);
        assert!(sse_events_pos < gauge_pos);
        assert!(gauge_pos < histogram_pos);
    }
}
