use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Impact text carried by a finding until the enricher replaces it.
pub const DEFAULT_IMPACT: &str = "Contributes to energy consumption";

/// Remediation text carried by a finding until the enricher replaces it.
pub const DEFAULT_REMEDIATION: &str = "Refer to guidelines";

/// Severity level for analysis findings.
///
/// The declaration order is the urgency order: `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    pub fn symbol(&self) -> &str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    /// The spelling used on the wire and in reports ("High", "Medium", "Low").
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }

    /// Case-insensitive parse of free-form severity text from the generation service.
    pub fn parse_lenient(value: &str) -> Option<Severity> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" => Some(Severity::High),
            "medium" | "moderate" => Some(Severity::Medium),
            "low" | "info" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a finding.
///
/// Static checks produce the named variants; the assisted rule batch reports whatever
/// guideline the generation service flagged, kept verbatim in `Guideline`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FindingKind {
    LegacyImageFormat,
    OversizedImage,
    MissingLazyLoading,
    NonResponsiveImage,
    MissingCachePolicy,
    UnusedCss,
    UnusedJavaScript,
    UncompressedJavaScript,
    NoCodeSplitting,
    NestedLoop,
    HighComplexity,
    MissingPreload,
    Guideline(String),
}

impl FindingKind {
    /// Stable identifier used for weight lookups and serialization.
    pub fn name(&self) -> &str {
        match self {
            FindingKind::LegacyImageFormat => "LegacyImageFormat",
            FindingKind::OversizedImage => "OversizedImage",
            FindingKind::MissingLazyLoading => "MissingLazyLoading",
            FindingKind::NonResponsiveImage => "NonResponsiveImage",
            FindingKind::MissingCachePolicy => "MissingCachePolicy",
            FindingKind::UnusedCss => "UnusedCSS",
            FindingKind::UnusedJavaScript => "UnusedJavaScript",
            FindingKind::UncompressedJavaScript => "UncompressedJS",
            FindingKind::NoCodeSplitting => "NoCodeSplitting",
            FindingKind::NestedLoop => "NestedLoop",
            FindingKind::HighComplexity => "HighComplexity",
            FindingKind::MissingPreload => "MissingPreload",
            FindingKind::Guideline(name) => name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FindingKind::LegacyImageFormat => "Legacy Image Format",
            FindingKind::OversizedImage => "Oversized Image",
            FindingKind::MissingLazyLoading => "Missing Lazy Loading",
            FindingKind::NonResponsiveImage => "Non-Responsive Image",
            FindingKind::MissingCachePolicy => "Missing Cache Policy",
            FindingKind::UnusedCss => "Unused CSS",
            FindingKind::UnusedJavaScript => "Unused JavaScript Export",
            FindingKind::UncompressedJavaScript => "Poorly Compressible Script",
            FindingKind::NoCodeSplitting => "No Code Splitting",
            FindingKind::NestedLoop => "Nested Loop",
            FindingKind::HighComplexity => "High Cyclomatic Complexity",
            FindingKind::MissingPreload => "Missing Preload Hints",
            FindingKind::Guideline(name) => name,
        }
    }

    pub fn is_static(&self) -> bool {
        !matches!(self, FindingKind::Guideline(_))
    }
}

impl From<String> for FindingKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "LegacyImageFormat" => FindingKind::LegacyImageFormat,
            "OversizedImage" => FindingKind::OversizedImage,
            "MissingLazyLoading" => FindingKind::MissingLazyLoading,
            "NonResponsiveImage" => FindingKind::NonResponsiveImage,
            "MissingCachePolicy" => FindingKind::MissingCachePolicy,
            "UnusedCSS" => FindingKind::UnusedCss,
            "UnusedJavaScript" => FindingKind::UnusedJavaScript,
            "UncompressedJS" => FindingKind::UncompressedJavaScript,
            "NoCodeSplitting" => FindingKind::NoCodeSplitting,
            "NestedLoop" => FindingKind::NestedLoop,
            "HighComplexity" => FindingKind::HighComplexity,
            "MissingPreload" => FindingKind::MissingPreload,
            _ => FindingKind::Guideline(value),
        }
    }
}

impl From<&str> for FindingKind {
    fn from(value: &str) -> Self {
        FindingKind::from(value.to_string())
    }
}

impl From<FindingKind> for String {
    fn from(kind: FindingKind) -> Self {
        match kind {
            FindingKind::Guideline(name) => name,
            other => other.name().to_string(),
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single reported issue.
///
/// `file` is repository-relative; `None` marks a repository-wide finding.
/// `severity`, `impact` and `remediation` hold defaults until enrichment, while
/// `rule_severity` keeps what the detecting rule assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub file: Option<String>,
    pub severity: Severity,
    pub rule_severity: Severity,
    pub weight: u32,
    pub impact: String,
    pub remediation: String,
}

impl Finding {
    pub fn new(
        kind: FindingKind,
        file: Option<String>,
        rule_severity: Severity,
        weight: u32,
    ) -> Self {
        Self {
            kind,
            file,
            severity: Severity::Medium,
            rule_severity,
            weight,
            impact: DEFAULT_IMPACT.to_string(),
            remediation: DEFAULT_REMEDIATION.to_string(),
        }
    }

    pub fn location(&self) -> &str {
        self.file.as_deref().unwrap_or("(repository)")
    }
}

/// Byte-level resource metrics for a source tree.
///
/// Byte counts are gzip-compressed sizes. Buckets overlap by extension but each is
/// bounded by `total_bytes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_bytes: u64,
    pub image_bytes: u64,
    pub js_bytes: u64,
    pub code_bytes: u64,
    pub third_party_requests: u64,
    pub uncompressed_assets: Vec<String>,
}

/// The ranked outcome of a complete pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metrics: Metrics,
    pub findings: Vec<Finding>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn high_count(&self) -> usize {
        self.findings.iter().filter(|f| f.severity == Severity::High).count()
    }

    pub fn medium_count(&self) -> usize {
        self.findings.iter().filter(|f| f.severity == Severity::Medium).count()
    }

    pub fn low_count(&self) -> usize {
        self.findings.iter().filter(|f| f.severity == Severity::Low).count()
    }

    pub fn total_weight(&self) -> u64 {
        self.findings.iter().map(|f| u64::from(f.weight)).sum()
    }
}

/// Format a byte count into a human-readable size string.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KIB * KIB {
        format!("{:.1} MiB", b / (KIB * KIB))
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_finding_carries_defaults() {
        let f = Finding::new(
            FindingKind::LegacyImageFormat,
            Some("img/logo.png".to_string()),
            Severity::High,
            3,
        );
        assert_eq!(f.severity, Severity::Medium);
        assert_eq!(f.rule_severity, Severity::High);
        assert_eq!(f.impact, DEFAULT_IMPACT);
        assert_eq!(f.remediation, DEFAULT_REMEDIATION);
    }

    #[test]
    fn test_kind_serializes_as_name() {
        let json = serde_json::to_string(&FindingKind::UnusedCss).unwrap();
        assert_eq!(json, "\"UnusedCSS\"");
        let back: FindingKind = serde_json::from_str("\"Reduce DOM size\"").unwrap();
        assert_eq!(back, FindingKind::Guideline("Reduce DOM size".to_string()));
        let known: FindingKind = serde_json::from_str("\"NestedLoop\"").unwrap();
        assert_eq!(known, FindingKind::NestedLoop);
    }

    #[test]
    fn test_severity_urgency_order() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::parse_lenient(" HIGH "), Some(Severity::High));
        assert_eq!(Severity::parse_lenient("urgent"), None);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }
}
