//! Storage operation metrics.

use crate::Result;
use std::time::Instant;

/// Records operation metrics for a storage call.
///
/// Records two metrics for each operation:
/// 1. `storage_operations_total` - Counter for operation count by status
/// 2. `storage_operation_duration_ms` - Histogram for operation latency
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Runs a storage call and records its metrics.
pub fn timed<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let result = f();
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics("sqlite", operation, start, status);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_timed_passes_result_through() {
        let ok = timed("test_operation", || Ok(3));
        assert_eq!(ok.unwrap(), 3);

        let err: Result<()> = timed("test_operation", || Err(Error::storage("op", "boom")));
        assert!(matches!(err, Err(Error::Storage { .. })));
    }
}
