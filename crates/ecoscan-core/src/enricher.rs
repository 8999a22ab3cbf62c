use crate::analyzer::report::{
    Finding, FindingKind, Severity, DEFAULT_IMPACT, DEFAULT_REMEDIATION,
};
use crate::error::ScanError;
use crate::gateway::Gateway;
use crate::guidelines::Guidelines;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The shape of a finding as sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueRecord {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub file: Option<String>,
    pub detected_severity: Severity,
}

/// One annotation returned by the generation service.
#[derive(Debug, Clone, Deserialize)]
struct Annotation {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default, alias = "remediation")]
    solution: Option<String>,
}

fn coerce_file(file: &str) -> Result<Option<String>, ScanError> {
    let normalized = file.trim().replace('\\', "/");
    let normalized = normalized.trim_start_matches("./");
    if normalized.is_empty() {
        return Ok(None);
    }
    let path = Path::new(normalized);
    if path.is_absolute()
        || normalized.starts_with('/')
        || path.components().any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ScanError::Validation(format!(
            "file '{}' is not repository-relative",
            file
        )));
    }
    Ok(Some(normalized.to_string()))
}

/// Validate and normalize a batch; any invalid finding rejects the whole batch.
pub fn validate_batch(findings: &[Finding]) -> Result<Vec<IssueRecord>, ScanError> {
    findings
        .iter()
        .map(|f| {
            let name = f.kind.name();
            if name.trim().is_empty() || name.chars().any(char::is_control) {
                return Err(ScanError::Validation(format!("invalid kind '{}'", name)));
            }
            let file = match &f.file {
                Some(file) => coerce_file(file)?,
                None => None,
            };
            Ok(IssueRecord {
                kind: f.kind.clone(),
                file,
                detected_severity: f.rule_severity,
            })
        })
        .collect()
}

/// Build the enrichment prompt for one chunk.
pub fn build_prompt(records: &[IssueRecord]) -> String {
    let issues = serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are a web performance auditor specialized in sustainable web development. \
         For each issue, provide sustainability context:\n\
         1. For code issues (NestedLoop, HighComplexity): explain CPU impact\n\
         2. For images: explain data transfer costs\n\
         3. For accessibility: explain indirect energy impacts\n\n\
         Issues:\n{}\n\n\
         Return ONLY a JSON array of objects with: type, file, severity (High, Medium or Low), \
         impact, solution (technical specifics)",
        issues
    )
}

/// Index the service's annotations by `(kind, file)`; later entries win.
fn index_annotations(response: Option<Value>) -> HashMap<(FindingKind, Option<String>), Annotation> {
    let Some(Value::Array(items)) = response else {
        return HashMap::new();
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Annotation>(item).ok())
        .map(|a| {
            let file = a
                .file
                .as_deref()
                .and_then(|f| coerce_file(f).ok().flatten());
            ((FindingKind::from(a.kind.clone()), file), a)
        })
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn annotate(record: &IssueRecord, note: Option<&Annotation>, guidelines: &Guidelines) -> Finding {
    let severity = note
        .and_then(|n| n.severity.as_deref())
        .and_then(Severity::parse_lenient)
        .unwrap_or(Severity::Medium);
    let impact = non_empty(note.and_then(|n| n.impact.as_deref())).unwrap_or(DEFAULT_IMPACT);
    let remediation =
        non_empty(note.and_then(|n| n.solution.as_deref())).unwrap_or(DEFAULT_REMEDIATION);

    Finding {
        kind: record.kind.clone(),
        file: record.file.clone(),
        severity,
        rule_severity: record.detected_severity,
        weight: guidelines.weight(&record.kind),
        impact: impact.to_string(),
        remediation: remediation.to_string(),
    }
}

/// Annotates findings through the gateway under one wall-clock budget.
///
/// The budget starts when the enricher is created and spans every chunk it enriches.
#[derive(Clone)]
pub struct Enricher {
    gateway: Gateway,
    guidelines: Arc<Guidelines>,
    started: Instant,
    budget: Duration,
}

impl Enricher {
    pub fn new(gateway: Gateway, guidelines: Arc<Guidelines>, budget: Duration) -> Self {
        Self {
            gateway,
            guidelines,
            started: Instant::now(),
            budget,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.started.elapsed() > self.budget
    }

    /// Enrich one chunk.
    ///
    /// The output is a prefix of the input: once the budget runs out the remaining
    /// findings are dropped silently.
    pub async fn enrich(&self, findings: &[Finding]) -> Vec<Finding> {
        if findings.is_empty() {
            return Vec::new();
        }
        if self.is_exhausted() {
            tracing::warn!(skipped = findings.len(), "enrichment budget exhausted");
            return Vec::new();
        }

        let records = match validate_batch(findings) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "finding validation failed, returning raw findings");
                return findings.to_vec();
            }
        };

        tracing::info!(count = records.len(), "enriching findings");
        let annotations = index_annotations(self.gateway.generate(&build_prompt(&records)).await);

        let mut enriched = Vec::with_capacity(records.len());
        for record in &records {
            let key = (record.kind.clone(), record.file.clone());
            let finding = annotate(record, annotations.get(&key), &self.guidelines);
            tracing::debug!(kind = %finding.kind, severity = %finding.severity, "enriched finding");
            enriched.push(finding);

            if self.is_exhausted() {
                tracing::warn!(
                    budget_ms = self.budget.as_millis() as u64,
                    "enrichment timed out"
                );
                break;
            }
        }
        enriched
    }
}
