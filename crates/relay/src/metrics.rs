use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use crate::ws::RelayStats;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EndpointMetricKey {
    endpoint: String,
    method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DropMetricKey {
    event: String,
    reason: String,
}

#[derive(Default)]
pub struct RelayMetrics {
    request_duration_count: Mutex<HashMap<EndpointMetricKey, u64>>,
    request_duration_sum_ms: Mutex<HashMap<EndpointMetricKey, u64>>,
    request_errors_total: Mutex<HashMap<EndpointMetricKey, u64>>,
    request_rate_total: Mutex<HashMap<EndpointMetricKey, u64>>,
    ws_events_total: Mutex<HashMap<String, u64>>,
    ws_duration_sum_ms: Mutex<HashMap<String, u64>>,
    ws_dropped_total: Mutex<HashMap<DropMetricKey, u64>>,
}

static GLOBAL_METRICS: OnceLock<Arc<RelayMetrics>> = OnceLock::new();

pub fn set_global_metrics(metrics: Arc<RelayMetrics>) {
    let _ = GLOBAL_METRICS.set(metrics);
}

fn global_metrics() -> Option<&'static Arc<RelayMetrics>> {
    GLOBAL_METRICS.get()
}

pub fn record_http_request(method: &str, path: &str, status_code: u16, latency_ms: u64) {
    if let Some(metrics) = global_metrics() {
        metrics.record_http_request(method, path, status_code, latency_ms);
    }
}

pub fn record_ws_event(event: &str, dropped_reason: Option<&str>, latency_ms: u64) {
    if let Some(metrics) = global_metrics() {
        metrics.record_ws_event(event, dropped_reason, latency_ms);
    }
}

impl RelayMetrics {
    pub fn record_http_request(&self, method: &str, path: &str, status_code: u16, latency_ms: u64) {
        let key = EndpointMetricKey {
            endpoint: normalize_endpoint(path),
            method: method.to_ascii_uppercase(),
        };

        increment_counter(&self.request_rate_total, &key, 1);
        increment_counter(&self.request_duration_sum_ms, &key, latency_ms);
        increment_counter(&self.request_duration_count, &key, 1);
        if status_code >= 400 {
            increment_counter(&self.request_errors_total, &key, 1);
        }
    }

    pub fn record_ws_event(&self, event: &str, dropped_reason: Option<&str>, latency_ms: u64) {
        let event = normalize_label(event);
        increment_counter(&self.ws_events_total, &event, 1);
        increment_counter(&self.ws_duration_sum_ms, &event, latency_ms);
        if let Some(reason) = dropped_reason {
            let key = DropMetricKey { event, reason: normalize_label(reason) };
            increment_counter(&self.ws_dropped_total, &key, 1);
        }
    }

    /// Render the Prometheus text exposition. Room and connection gauges are
    /// sampled by the caller at scrape time.
    pub fn render_prometheus(&self, stats: RelayStats) -> String {
        let mut output = String::new();

        output.push_str("# HELP relay_request_rate_total Total HTTP requests by endpoint.\n");
        output.push_str("# TYPE relay_request_rate_total counter\n");
        append_endpoint_lines(&mut output, "relay_request_rate_total", &self.request_rate_total);

        output.push_str(
            "# HELP relay_request_errors_total Total HTTP error responses by endpoint.\n",
        );
        output.push_str("# TYPE relay_request_errors_total counter\n");
        append_endpoint_lines(&mut output, "relay_request_errors_total", &self.request_errors_total);

        output.push_str("# HELP relay_request_duration_ms_sum Sum of HTTP request latency in milliseconds by endpoint.\n");
        output.push_str("# TYPE relay_request_duration_ms_sum counter\n");
        append_endpoint_lines(
            &mut output,
            "relay_request_duration_ms_sum",
            &self.request_duration_sum_ms,
        );

        output.push_str("# HELP relay_request_duration_ms_count Count of HTTP request latency samples by endpoint.\n");
        output.push_str("# TYPE relay_request_duration_ms_count counter\n");
        append_endpoint_lines(
            &mut output,
            "relay_request_duration_ms_count",
            &self.request_duration_count,
        );

        output.push_str("# HELP relay_ws_events_total Total websocket events by kind.\n");
        output.push_str("# TYPE relay_ws_events_total counter\n");
        append_event_lines(&mut output, "relay_ws_events_total", &self.ws_events_total);

        output.push_str("# HELP relay_ws_duration_ms_sum Sum of websocket event handling latency in milliseconds by kind.\n");
        output.push_str("# TYPE relay_ws_duration_ms_sum counter\n");
        append_event_lines(&mut output, "relay_ws_duration_ms_sum", &self.ws_duration_sum_ms);

        output.push_str(
            "# HELP relay_ws_dropped_total Websocket events dropped without effect by kind and reason.\n",
        );
        output.push_str("# TYPE relay_ws_dropped_total counter\n");
        append_drop_lines(&mut output, &self.ws_dropped_total);

        output.push_str("# HELP relay_active_rooms Rooms with at least one member.\n");
        output.push_str("# TYPE relay_active_rooms gauge\n");
        output.push_str(&format!("relay_active_rooms {}\n", stats.rooms));

        output.push_str("# HELP relay_active_connections Live websocket connections.\n");
        output.push_str("# TYPE relay_active_connections gauge\n");
        output.push_str(&format!("relay_active_connections {}\n", stats.connections));

        output.push_str("# HELP relay_joined_connections Connections currently in a room.\n");
        output.push_str("# TYPE relay_joined_connections gauge\n");
        output.push_str(&format!("relay_joined_connections {}\n", stats.joined_connections));

        output
    }
}

fn normalize_endpoint(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    let mut normalized_segments = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        // Room ids are caller-chosen; keep label cardinality bounded.
        if index > 0 && segments[index - 1] == "rooms" {
            normalized_segments.push("{room_id}".to_string());
            continue;
        }

        if segment.chars().all(|character| character.is_ascii_digit()) {
            normalized_segments.push("{number}".to_string());
            continue;
        }

        normalized_segments.push(segment.to_string());
    }

    if normalized_segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", normalized_segments.join("/"))
    }
}

fn normalize_label(label: &str) -> String {
    let normalized = label.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        "unknown".to_string()
    } else {
        normalized
    }
}

fn increment_counter<K>(map: &Mutex<HashMap<K, u64>>, key: &K, delta: u64)
where
    K: Clone + Eq + std::hash::Hash,
{
    let mut guard = map.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let value = guard.entry(key.clone()).or_insert(0);
    *value = value.saturating_add(delta);
}

fn append_endpoint_lines(
    output: &mut String,
    metric_name: &str,
    map: &Mutex<HashMap<EndpointMetricKey, u64>>,
) {
    let guard = map.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut entries: Vec<_> = guard.iter().collect();
    entries.sort_by(|(left_key, _), (right_key, _)| {
        left_key
            .method
            .cmp(&right_key.method)
            .then_with(|| left_key.endpoint.cmp(&right_key.endpoint))
    });

    for (key, value) in entries {
        output.push_str(&format!(
            "{metric_name}{{method=\"{}\",endpoint=\"{}\"}} {value}\n",
            escape_label_value(&key.method),
            escape_label_value(&key.endpoint),
        ));
    }
}

fn append_event_lines(output: &mut String, metric_name: &str, map: &Mutex<HashMap<String, u64>>) {
    let guard = map.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut entries: Vec<_> = guard.iter().collect();
    entries.sort_by(|(left, _), (right, _)| left.cmp(right));

    for (event, value) in entries {
        output.push_str(&format!(
            "{metric_name}{{event=\"{}\"}} {value}\n",
            escape_label_value(event),
        ));
    }
}

fn append_drop_lines(output: &mut String, map: &Mutex<HashMap<DropMetricKey, u64>>) {
    let guard = map.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut entries: Vec<_> = guard.iter().collect();
    entries.sort_by(|(left, _), (right, _)| {
        left.event.cmp(&right.event).then_with(|| left.reason.cmp(&right.reason))
    });

    for (key, value) in entries {
        output.push_str(&format!(
            "relay_ws_dropped_total{{event=\"{}\",reason=\"{}\"}} {value}\n",
            escape_label_value(&key.event),
            escape_label_value(&key.reason),
        ));
    }
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n").replace('"', "\\\"")
}
