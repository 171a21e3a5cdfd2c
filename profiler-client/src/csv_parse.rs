//! Parses `perf_analyzer`'s `-f` CSV report: one row per measurement window,
//! keeping the last row as the stabilized window.
//!
//! Real-world header, reproduced here for the column→metric-name mapping:
//! `Concurrency,Inferences/Second,Client Send,Network+Server Send/Recv,
//! Server Queue,Server Compute Input,Server Compute Infer,Server Compute
//! Output,Client Recv,p50 latency,p90 latency,p95 latency,p99 latency`.

use std::collections::BTreeMap;

use search_types::{SearchError, SearchResult};

/// Maps a CSV header column to the metric name the rest of the crate uses.
/// Columns not in this table are carried through verbatim (lowercased,
/// spaces replaced with underscores) so a user's custom metric columns
/// still show up in `non_gpu_metrics`.
fn canonical_metric_name(column: &str) -> String {
    match column {
        "Inferences/Second" => "perf_throughput".to_string(),
        "p50 latency" => "perf_latency_p50".to_string(),
        "p90 latency" => "perf_latency_p90".to_string(),
        "p95 latency" => "perf_latency_p95".to_string(),
        "p99 latency" => "perf_latency_p99".to_string(),
        "Client Send" => "perf_client_send_latency".to_string(),
        "Client Recv" => "perf_client_recv_latency".to_string(),
        "Network+Server Send/Recv" => "perf_network_latency".to_string(),
        "Server Queue" => "perf_server_queue_latency".to_string(),
        "Server Compute Input" => "perf_server_compute_input_latency".to_string(),
        "Server Compute Infer" => "perf_server_compute_infer_latency".to_string(),
        "Server Compute Output" => "perf_server_compute_output_latency".to_string(),
        other => other.to_lowercase().replace(' ', "_"),
    }
}

/// Parses a `perf_analyzer` CSV report into a metric map. Multiple rows are
/// one stability pass each; the last row is the converged measurement.
pub fn parse_csv_report(csv: &str, fingerprint: &str) -> SearchResult<BTreeMap<String, f64>> {
    let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or_else(|| SearchError::MeasurementFailure {
        fingerprint: fingerprint.to_string(),
        reason: "empty perf_analyzer CSV report".to_string(),
    })?;
    let columns: Vec<&str> = header.split(',').map(|c| c.trim()).collect();

    let last_row = lines.last().ok_or_else(|| SearchError::MeasurementFailure {
        fingerprint: fingerprint.to_string(),
        reason: "perf_analyzer CSV report has a header but no data rows".to_string(),
    })?;
    let values: Vec<&str> = last_row.split(',').map(|v| v.trim()).collect();

    if values.len() != columns.len() {
        return Err(SearchError::MeasurementFailure {
            fingerprint: fingerprint.to_string(),
            reason: format!(
                "perf_analyzer CSV row has {} columns, header declares {}",
                values.len(),
                columns.len()
            ),
        });
    }

    let mut metrics = BTreeMap::new();
    for (column, value) in columns.iter().zip(values.iter()) {
        let parsed: f64 = value.parse().map_err(|_| SearchError::MeasurementFailure {
            fingerprint: fingerprint.to_string(),
            reason: format!("non-numeric value '{value}' in column '{column}'"),
        })?;
        metrics.insert(canonical_metric_name(column), parsed);
    }
    Ok(metrics)
}
