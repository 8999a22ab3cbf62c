pub mod complexity;
pub mod image_check;
pub mod markup_check;
pub mod metrics;
pub mod report;
pub mod script_check;
pub mod style_check;

use crate::config::{AnalysisConfig, Thresholds};
use crate::discovery::{self, Excludes, FileClass, SourceFile};
use crate::error::{Result, ScanError};
use crate::guidelines::Guidelines;
use report::{Finding, FindingKind, Severity};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything a rule needs besides the file itself.
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    pub guidelines: Guidelines,
    pub thresholds: Thresholds,
    pub excludes: Excludes,
}

impl RuleContext {
    pub fn from_config(config: &AnalysisConfig, guidelines: Guidelines) -> Self {
        Self {
            guidelines,
            thresholds: config.thresholds.clone(),
            excludes: Excludes::new(&config.scan.exclude),
        }
    }

    /// A fresh finding with the weight from the guideline table.
    pub fn finding(&self, kind: FindingKind, file: Option<&str>, severity: Severity) -> Finding {
        let weight = self.guidelines.weight(&kind);
        Finding::new(kind, file.map(str::to_string), severity, weight)
    }
}

/// Cooperative stop signal shared between a run and its blocking workers.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once raised.
    pub fn check(&self) -> Result<()> {
        if self.is_raised() {
            Err(ScanError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Run a per-file check, turning a panic into a logged skip.
fn isolated<T: Default>(file: &SourceFile, check: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(check)) {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(file = %file.relative_path, "check panicked, skipping file");
            T::default()
        }
    }
}

fn read_text(file: &SourceFile) -> Option<String> {
    match std::fs::read(&file.path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!(file = %file.relative_path, error = %e, "failed to read file");
            None
        }
    }
}

/// Run the full static rule battery over the tree at `root`.
///
/// Unreadable or malformed files are logged and skipped; only an unusable root or a
/// raised `stop` ends the scan early.
pub fn scan(root: &Path, ctx: &RuleContext, stop: &StopFlag) -> Result<Vec<Finding>> {
    tracing::info!(root = %root.display(), "running static checks");
    let files = discovery::discover_source_files(root, &ctx.excludes)?;

    let mut findings = Vec::new();
    let mut markup = Vec::new();
    let mut stylesheets = Vec::new();

    for file in &files {
        stop.check()?;
        match file.class {
            FileClass::Image => {
                findings.extend(isolated(file, || image_check::check_image(ctx, file)));
            }
            FileClass::Script => {
                if let Some(content) = read_text(file) {
                    findings.extend(isolated(file, || {
                        script_check::check_script(ctx, file, &content)
                    }));
                }
            }
            FileClass::Python => {
                if let Some(content) = read_text(file) {
                    findings.extend(isolated(file, || {
                        complexity::check_python(ctx, file, &content)
                    }));
                }
            }
            FileClass::Markup => {
                if let Some(content) = read_text(file) {
                    findings.extend(isolated(file, || {
                        markup_check::check_markup(ctx, file, &content)
                    }));
                    markup.push(content);
                }
            }
            FileClass::Stylesheet => {
                if let Some(content) = read_text(file) {
                    stylesheets.push((file, content));
                }
            }
            FileClass::Other => {}
        }
    }

    let all_markup = markup.join(" ");
    for (file, content) in &stylesheets {
        stop.check()?;
        findings.extend(isolated(file, || {
            style_check::check_stylesheet(ctx, file, content, &all_markup)
        }));
    }

    findings.extend(markup_check::check_preload(ctx, &all_markup));

    tracing::info!(count = findings.len(), "static checks finished");
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_mixed_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(
            root.join("index.html"),
            r#"<html><body><img src="a.png" class="hero"></body></html>"#,
        )
        .unwrap();
        fs::write(root.join("src/site.css"), ".hero{} .unused-a{} .unused-b{}").unwrap();
        fs::write(
            root.join("src/loop.js"),
            "for (const a of xs) { for (const b of ys) { f(a, b); } }",
        )
        .unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();

        let findings = scan(root, &RuleContext::default(), &StopFlag::default()).unwrap();
        let has = |kind: FindingKind, file: Option<&str>| {
            findings
                .iter()
                .any(|f| f.kind == kind && f.file.as_deref() == file)
        };
        assert!(has(FindingKind::MissingLazyLoading, Some("index.html")));
        assert!(has(FindingKind::NonResponsiveImage, Some("index.html")));
        assert!(has(FindingKind::MissingCachePolicy, Some("index.html")));
        assert!(has(FindingKind::UnusedCss, Some("src/site.css")));
        assert!(has(FindingKind::NestedLoop, Some("src/loop.js")));
        assert!(has(FindingKind::NoCodeSplitting, Some("src/loop.js")));
        assert!(has(FindingKind::MissingPreload, None));
    }

    #[test]
    fn test_every_finding_starts_at_medium() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "while (x) { while (y) { z(); } }").unwrap();
        let findings = scan(dir.path(), &RuleContext::default(), &StopFlag::default()).unwrap();
        assert!(!findings.is_empty());
        for f in &findings {
            assert_eq!(f.severity, Severity::Medium);
            assert_eq!(f.impact, report::DEFAULT_IMPACT);
            assert_eq!(f.remediation, report::DEFAULT_REMEDIATION);
        }
    }

    #[test]
    fn test_malformed_files_do_not_abort_scan() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("broken.js"), "for (;; { while ) {{{{ export").unwrap();
        fs::write(root.join("broken.png"), [0u8, 1, 2, 3]).unwrap();
        fs::write(root.join("binary.py"), [0xffu8, 0xfe, 0x00, 0x41]).unwrap();
        fs::write(root.join("page.html"), "<img src=x>").unwrap();

        let findings = scan(root, &RuleContext::default(), &StopFlag::default()).unwrap();
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::MissingLazyLoading));
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::LegacyImageFormat
                && f.file.as_deref() == Some("broken.png")));
    }

    #[test]
    fn test_dependency_directories_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let deps = dir.path().join("node_modules/pkg");
        fs::create_dir_all(&deps).unwrap();
        fs::write(deps.join("index.js"), "for(;;){for(;;){}}").unwrap();
        let findings = scan(dir.path(), &RuleContext::default(), &StopFlag::default()).unwrap();
        assert!(!findings.iter().any(|f| f.kind == FindingKind::NestedLoop));
    }

    #[test]
    fn test_deeply_nested_sources_are_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let depth = 60_000;
        let (open, close) = ("(".repeat(depth), ")".repeat(depth));
        fs::write(root.join("deep.js"), format!("x = {}1{};\n", open, close)).unwrap();
        fs::write(
            root.join("deep.py"),
            format!("def f():\n    return {}1{}\n", open, close),
        )
        .unwrap();

        let findings = scan(root, &RuleContext::default(), &StopFlag::default()).unwrap();
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::NoCodeSplitting && f.file.as_deref() == Some("deep.js")));
        assert!(!findings.iter().any(|f| f.kind == FindingKind::NestedLoop));
        assert!(!findings.iter().any(|f| f.kind == FindingKind::HighComplexity));
    }

    #[test]
    fn test_raised_stop_flag_cancels_scan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "f();").unwrap();
        let stop = StopFlag::default();
        assert!(!stop.is_raised());
        stop.clone().raise();
        assert!(stop.is_raised());
        let result = scan(dir.path(), &RuleContext::default(), &stop);
        assert!(matches!(result, Err(ScanError::Cancelled)));
    }
}
