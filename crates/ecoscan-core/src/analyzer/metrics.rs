use crate::analyzer::report::Metrics;
use crate::analyzer::StopFlag;
use crate::config::Thresholds;
use crate::discovery::{self, CODE_EXTS, IMAGE_EXTS, SCRIPT_STYLE_EXTS};
use crate::error::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;

/// Domains whose appearance in a file path counts as a third-party reference.
pub const THIRD_PARTY_DOMAINS: &[&str] = &[
    "googleapis.com",
    "gstatic.com",
    "facebook.net",
    "analytics.com",
    "hotjar.com",
];

/// Gzip-compressed size of `data` at the default level.
pub fn gzip_size(data: &[u8]) -> std::io::Result<u64> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    Ok(compressed.len() as u64)
}

/// Compressed size of a file, falling back to its on-disk size, then to zero.
fn file_size(path: &Path) -> u64 {
    match std::fs::read(path).and_then(|raw| gzip_size(&raw)) {
        Ok(size) => size,
        Err(e) => {
            tracing::debug!(file = %path.display(), error = %e, "compression failed, using raw size");
            std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
        }
    }
}

/// Compute byte-level resource metrics for every regular file under `root`.
///
/// `stop` is checked before each file; once raised the walk ends with `Cancelled`.
pub fn compute_metrics(root: &Path, thresholds: &Thresholds, stop: &StopFlag) -> Result<Metrics> {
    tracing::info!(root = %root.display(), "computing metrics");
    let mut metrics = Metrics::default();

    for path in discovery::walk_all_files(root)? {
        stop.check()?;
        let relative = discovery::relative_path(&path, root);
        let ext = discovery::extension_of(&path);
        let size = file_size(&path);
        tracing::debug!(file = %relative, size, "measured");

        metrics.total_bytes += size;
        if IMAGE_EXTS.contains(&ext.as_str()) {
            metrics.image_bytes += size;
        }
        if SCRIPT_STYLE_EXTS.contains(&ext.as_str()) {
            metrics.js_bytes += size;
            if size > thresholds.uncompressed_asset_bytes {
                metrics.uncompressed_assets.push(relative.clone());
            }
        }
        if CODE_EXTS.contains(&ext.as_str()) {
            metrics.code_bytes += size;
        }
        if THIRD_PARTY_DOMAINS.iter().any(|d| relative.contains(d)) {
            metrics.third_party_requests += 1;
        }
    }

    tracing::info!(
        total_bytes = metrics.total_bytes,
        image_bytes = metrics.image_bytes,
        uncompressed = metrics.uncompressed_assets.len(),
        "metrics computed"
    );
    Ok(metrics)
}
