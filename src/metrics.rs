//! Phase-organized metrics for the lakehouse pipeline
//!
//! Every stage records through the `metrics` facade. Without an installed
//! recorder the calls are no-ops, so library code never has to check.

use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Generate consistent metric names following the `lakehouse_<phase>_<name>` convention
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("lakehouse_", $phase, "_", $name, "_total")
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("lakehouse_", $phase, "_", $name)
    };
}

/// Install a Prometheus exporter when `LAKEHOUSE_METRICS_ADDR` is set.
///
/// Idempotent. Returns whether an exporter is active.
pub fn init_metrics() -> bool {
    let addr = match std::env::var("LAKEHOUSE_METRICS_ADDR") {
        Ok(addr) if !addr.trim().is_empty() => addr,
        _ => return false,
    };

    let mut installed = false;
    INIT.call_once(|| {
        let addr: SocketAddr = match addr.parse() {
            Ok(a) => a,
            Err(e) => {
                warn!("Invalid LAKEHOUSE_METRICS_ADDR '{}': {}", addr, e);
                return;
            }
        };
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                info!("Prometheus exporter listening on http://{}/metrics", addr);
                NormalizeMetrics::register_metrics();
                QualityGateMetrics::register_metrics();
                MaterializeMetrics::register_metrics();
                SmeltMetrics::register_metrics();
                CatalogMetrics::register_metrics();
                installed = true;
            }
            Err(e) => warn!("Prometheus exporter install failed: {}", e),
        }
    });
    installed
}

/// Schema Normalizer counters
pub struct NormalizeMetrics;

impl NormalizeMetrics {
    pub fn record_table_read(source_id: &str) {
        ::metrics::counter!(phase_metric!(counter, "normalize", "tables_read"), "source" => source_id.to_string())
            .increment(1);
    }

    pub fn record_table_skipped(source_id: &str, reason: &'static str) {
        ::metrics::counter!(
            phase_metric!(counter, "normalize", "tables_skipped"),
            "source" => source_id.to_string(),
            "reason" => reason
        )
        .increment(1);
    }

    pub fn record_rows_dropped(source_id: &str, reason: &'static str, count: usize) {
        ::metrics::counter!(
            phase_metric!(counter, "normalize", "rows_dropped"),
            "source" => source_id.to_string(),
            "reason" => reason
        )
        .increment(count as u64);
    }

    pub fn record_rows_emitted(source_id: &str, count: usize) {
        ::metrics::counter!(phase_metric!(counter, "normalize", "rows_emitted"), "source" => source_id.to_string())
            .increment(count as u64);
    }

    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "normalize", "tables_read"));
        let _ = ::metrics::counter!(phase_metric!(counter, "normalize", "tables_skipped"));
        let _ = ::metrics::counter!(phase_metric!(counter, "normalize", "rows_dropped"));
        let _ = ::metrics::counter!(phase_metric!(counter, "normalize", "rows_emitted"));
    }
}

/// Quality Gate counters
pub struct QualityGateMetrics;

impl QualityGateMetrics {
    pub fn record_filter(groups_dropped: usize, rows_dropped: usize) {
        ::metrics::counter!(phase_metric!(counter, "quality_gate", "groups_dropped"))
            .increment(groups_dropped as u64);
        ::metrics::counter!(phase_metric!(counter, "quality_gate", "rows_dropped"))
            .increment(rows_dropped as u64);
    }

    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "quality_gate", "groups_dropped"));
        let _ = ::metrics::counter!(phase_metric!(counter, "quality_gate", "rows_dropped"));
    }
}

/// Tier Materializer counters
pub struct MaterializeMetrics;

impl MaterializeMetrics {
    pub fn record_segment_written(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "materialize", "segments_written")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "materialize", "rows_written")).increment(rows as u64);
    }

    pub fn record_batch_retry() {
        ::metrics::counter!(phase_metric!(counter, "materialize", "batch_retries")).increment(1);
    }

    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "materialize", "segments_written"));
        let _ = ::metrics::counter!(phase_metric!(counter, "materialize", "rows_written"));
        let _ = ::metrics::counter!(phase_metric!(counter, "materialize", "batch_retries"));
    }
}

/// Consolidation counters
pub struct SmeltMetrics;

impl SmeltMetrics {
    pub fn record_consolidated(segments: usize, fact_rows: usize, datasets: usize) {
        ::metrics::counter!(phase_metric!(counter, "smelt", "segments_read")).increment(segments as u64);
        ::metrics::gauge!(phase_metric!(gauge, "smelt", "master_rows")).set(fact_rows as f64);
        ::metrics::gauge!(phase_metric!(gauge, "smelt", "datasets")).set(datasets as f64);
    }

    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "smelt", "segments_read"));
        let _ = ::metrics::gauge!(phase_metric!(gauge, "smelt", "master_rows"));
        let _ = ::metrics::gauge!(phase_metric!(gauge, "smelt", "datasets"));
    }
}

/// Catalog Reconciler counters
pub struct CatalogMetrics;

impl CatalogMetrics {
    pub fn record_reconciled(stubs_inserted: usize, orphans_retired: usize, rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "catalog", "stubs_inserted"))
            .increment(stubs_inserted as u64);
        ::metrics::counter!(phase_metric!(counter, "catalog", "orphans_retired"))
            .increment(orphans_retired as u64);
        ::metrics::gauge!(phase_metric!(gauge, "catalog", "rows")).set(rows as f64);
    }

    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "catalog", "stubs_inserted"));
        let _ = ::metrics::counter!(phase_metric!(counter, "catalog", "orphans_retired"));
        let _ = ::metrics::gauge!(phase_metric!(gauge, "catalog", "rows"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_metric_names() {
        assert_eq!(
            phase_metric!(counter, "materialize", "segments_written"),
            "lakehouse_materialize_segments_written_total"
        );
        assert_eq!(phase_metric!(gauge, "smelt", "datasets"), "lakehouse_smelt_datasets");
    }

    #[test]
    fn test_prometheus_recorder_sees_phase_metrics() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            NormalizeMetrics::record_rows_emitted("undata", 10);
            CatalogMetrics::record_reconciled(2, 1, 7);
        });

        let rendered = handle.render();
        assert!(rendered.contains("lakehouse_normalize_rows_emitted_total"));
        assert!(rendered.contains("source=\"undata\""));
        assert!(rendered.contains("lakehouse_catalog_stubs_inserted_total 2"));
        assert!(rendered.contains("lakehouse_catalog_rows 7"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        NormalizeMetrics::record_rows_emitted("undata", 10);
        QualityGateMetrics::record_filter(1, 5);
        CatalogMetrics::record_reconciled(1, 1, 3);
    }
}
