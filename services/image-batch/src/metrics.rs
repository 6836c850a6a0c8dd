//! Prometheus metrics exposition
//!
//! The dispatch crate records attempts, rotations and job outcomes through
//! the `metrics` facade. This module installs the Prometheus recorder for a
//! run and, when `output.metrics_textfile` is set, writes the rendered
//! exposition at the end so node_exporter's textfile collector can pick it up.

use std::path::Path;

use anyhow::{Context, anyhow};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Bucket boundaries for `image_batch_attempt_duration_seconds`, from 100ms
/// up to the longest sensible HTTP timeout.
const ATTEMPT_DURATION_BUCKETS: &[f64] = &[
    0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0,
];

fn builder() -> anyhow::Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("image_batch_attempt_duration_seconds".to_string()),
            ATTEMPT_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow!("failed to set histogram buckets: {e}"))
}

/// Install the Prometheus recorder globally and return a handle for rendering.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .map_err(|e| anyhow!("failed to install Prometheus recorder: {e}"))
}

/// Write the rendered metrics to `path`.
///
/// Writes to a sibling temp file first and renames it into place, so the
/// collector never reads a half-written file.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> anyhow::Result<()> {
    let rendered = handle.render();
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, rendered)
        .with_context(|| format!("failed to write metrics to {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move metrics into {}", path.display()))?;
    Ok(())
}
