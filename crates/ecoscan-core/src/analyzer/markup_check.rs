use crate::analyzer::report::{Finding, FindingKind, Severity};
use crate::analyzer::RuleContext;
use crate::discovery::SourceFile;
use once_cell::sync::Lazy;
use regex::Regex;

static CACHE_CONTROL_META: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+http-equiv=["']Cache-Control["']"#).expect("static regex")
});

static PRELOAD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<link[^>]+rel=["']preload["']"#).expect("static regex"));

/// Check one HTML document for image loading hints and a cache policy.
pub fn check_markup(ctx: &RuleContext, file: &SourceFile, content: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    let rel = Some(file.relative_path.as_str());

    if content.contains("<img") {
        if !content.contains(r#"loading="lazy""#) {
            findings.push(ctx.finding(FindingKind::MissingLazyLoading, rel, Severity::Medium));
        }
        if !content.contains("srcset=") {
            findings.push(ctx.finding(FindingKind::NonResponsiveImage, rel, Severity::Medium));
        }
    }

    if !CACHE_CONTROL_META.is_match(content) {
        findings.push(ctx.finding(FindingKind::MissingCachePolicy, rel, Severity::High));
    }

    findings
}

/// Repository-wide check: at least one document must preload a critical asset.
pub fn check_preload(ctx: &RuleContext, all_markup: &str) -> Option<Finding> {
    if PRELOAD_LINK.is_match(all_markup) {
        None
    } else {
        Some(ctx.finding(FindingKind::MissingPreload, None, Severity::Medium))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::FileClass;
    use std::path::PathBuf;

    fn page() -> SourceFile {
        SourceFile {
            path: PathBuf::from("index.html"),
            relative_path: "index.html".to_string(),
            extension: "html".to_string(),
            class: FileClass::Markup,
        }
    }

    fn kinds(findings: &[Finding]) -> Vec<FindingKind> {
        findings.iter().map(|f| f.kind.clone()).collect()
    }

    #[test]
    fn test_bare_image_page() {
        let html = r#"<html><body><img src="hero.jpg"></body></html>"#;
        let findings = check_markup(&RuleContext::default(), &page(), html);
        assert_eq!(
            kinds(&findings),
            vec![
                FindingKind::MissingLazyLoading,
                FindingKind::NonResponsiveImage,
                FindingKind::MissingCachePolicy,
            ]
        );
        let cache = findings
            .iter()
            .find(|f| f.kind == FindingKind::MissingCachePolicy)
            .unwrap();
        assert_eq!(cache.rule_severity, Severity::High);
        assert_eq!(cache.file.as_deref(), Some("index.html"));
    }

    #[test]
    fn test_well_formed_page() {
        let html = r#"<html><head>
<meta http-equiv="Cache-Control" content="max-age=31536000">
</head><body><img src="a.webp" srcset="a-2x.webp 2x" loading="lazy"></body></html>"#;
        let findings = check_markup(&RuleContext::default(), &page(), html);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_page_without_images_only_needs_cache_policy() {
        let findings = check_markup(&RuleContext::default(), &page(), "<p>hi</p>");
        assert_eq!(kinds(&findings), vec![FindingKind::MissingCachePolicy]);
    }

    #[test]
    fn test_preload_is_repository_wide() {
        let ctx = RuleContext::default();
        let missing = check_preload(&ctx, "<html></html>").unwrap();
        assert_eq!(missing.kind, FindingKind::MissingPreload);
        assert!(missing.file.is_none());

        let present = r#"<link rel="preload" href="/font.woff2" as="font">"#;
        assert!(check_preload(&ctx, present).is_none());
    }
}
