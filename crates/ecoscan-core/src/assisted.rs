use crate::analyzer::report::{Finding, FindingKind, Severity};
use crate::analyzer::RuleContext;
use crate::config::SamplingSettings;
use crate::discovery::{self, CODE_EXTS};
use crate::error::{Result, ScanError};
use crate::gateway::Gateway;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Leading excerpt of one source file sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledFile {
    pub path: String,
    pub content: String,
}

fn read_prefix(path: &Path, max_chars: usize) -> std::io::Result<String> {
    let mut raw = Vec::new();
    std::fs::File::open(path)?
        .take((max_chars as u64).saturating_mul(4))
        .read_to_end(&mut raw)?;
    Ok(String::from_utf8_lossy(&raw).chars().take(max_chars).collect())
}

/// Pick a bounded sample of code files: the first few of each directory, capped overall.
pub fn sample_files(
    root: &Path,
    ctx: &RuleContext,
    sampling: &SamplingSettings,
) -> Result<Vec<SampledFile>> {
    let mut samples = Vec::new();

    'dirs: for (_, files) in discovery::list_directories(root, &ctx.excludes)? {
        for path in files.iter().take(sampling.files_per_dir) {
            if samples.len() >= sampling.max_files {
                break 'dirs;
            }
            let ext = discovery::extension_of(path);
            if !CODE_EXTS.contains(&ext.as_str()) {
                continue;
            }
            match read_prefix(path, sampling.max_chars) {
                Ok(content) => samples.push(SampledFile {
                    path: discovery::relative_path(path, root),
                    content,
                }),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "failed to sample file");
                }
            }
        }
    }

    Ok(samples)
}

/// Build the single composite prompt for the secondary rule set.
pub fn build_prompt(samples: &[SampledFile], rules: &[String]) -> String {
    let files = samples
        .iter()
        .map(|s| format!("// File: {}\n{}", s.path, s.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a web performance auditor specialized in sustainable web development. \
         Analyze these code files for energy efficiency issues:\n\n\
         {}\n\n\
         Check against these guidelines:\n- {}\n\n\
         Respond ONLY with a JSON array: \
         [ {{ \"type\": string, \"compliant\": boolean, \"explanation\": string }} ] \
         where \"type\" is the guideline name.",
        files,
        rules.join("\n- ")
    )
}

/// Map a gateway response to findings for every non-compliant item.
pub fn parse_results(value: &Value, ctx: &RuleContext) -> Vec<Finding> {
    let Some(items) = value.as_array() else {
        tracing::warn!("assisted check response is not a list");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let compliant = item.get("compliant").and_then(Value::as_bool).unwrap_or(true);
            if compliant {
                return None;
            }
            let name = item.get("type").and_then(Value::as_str)?.trim();
            if name.is_empty() {
                return None;
            }
            tracing::info!(guideline = name, "assisted check reported non-compliance");
            Some(ctx.finding(FindingKind::from(name), None, Severity::Medium))
        })
        .collect()
}

/// Run the assisted rule batch over the tree at `root`.
///
/// Gateway failures yield an empty list; only an unusable root is an error.
pub async fn run_assisted_checks(
    root: PathBuf,
    gateway: Gateway,
    ctx: Arc<RuleContext>,
    sampling: SamplingSettings,
) -> Result<Vec<Finding>> {
    tracing::info!(root = %root.display(), "running assisted checks");

    let sample_ctx = ctx.clone();
    let samples = tokio::task::spawn_blocking(move || sample_files(&root, &sample_ctx, &sampling))
        .await
        .map_err(|e| ScanError::Stage {
            stage: "assisted scan",
            message: e.to_string(),
        })??;

    if samples.is_empty() {
        tracing::info!("no code files to sample, skipping assisted checks");
        return Ok(Vec::new());
    }

    let prompt = build_prompt(&samples, ctx.guidelines.assisted());
    let findings = match gateway.generate(&prompt).await {
        Some(value) => parse_results(&value, &ctx),
        None => Vec::new(),
    };

    tracing::info!(count = findings.len(), "assisted checks finished");
    Ok(findings)
}
