use crate::analyzer::report::{Finding, FindingKind, Severity};
use crate::analyzer::RuleContext;
use crate::discovery::SourceFile;
use once_cell::sync::Lazy;
use regex::Regex;

static CLASS_SELECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.([\w-]+)").expect("static regex"));

/// Fraction of class selectors in `css` whose name never appears in `all_markup`.
///
/// Every occurrence counts, so a selector repeated three times weighs three.
pub fn unused_selector_fraction(css: &str, all_markup: &str) -> Option<f64> {
    let selectors: Vec<&str> = CLASS_SELECTOR
        .captures_iter(css)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if selectors.is_empty() {
        return None;
    }
    let unused = selectors.iter().filter(|s| !all_markup.contains(*s)).count();
    Some(unused as f64 / selectors.len() as f64)
}

/// Flag a stylesheet whose unused class fraction exceeds the threshold.
pub fn check_stylesheet(
    ctx: &RuleContext,
    file: &SourceFile,
    content: &str,
    all_markup: &str,
) -> Option<Finding> {
    let fraction = unused_selector_fraction(content, all_markup)?;
    if fraction > ctx.thresholds.unused_css_fraction {
        tracing::debug!(file = %file.relative_path, fraction, "unused selectors");
        Some(ctx.finding(
            FindingKind::UnusedCss,
            Some(&file.relative_path),
            Severity::Medium,
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::FileClass;
    use std::path::PathBuf;

    fn sheet() -> SourceFile {
        SourceFile {
            path: PathBuf::from("styles/site.css"),
            relative_path: "styles/site.css".to_string(),
            extension: "css".to_string(),
            class: FileClass::Stylesheet,
        }
    }

    #[test]
    fn test_fraction() {
        let css = ".hero { } .nav { } .footer-old { } .ghost { }";
        let html = r#"<div class="hero"><nav class="nav"></nav></div>"#;
        let fraction = unused_selector_fraction(css, html).unwrap();
        assert!((fraction - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_selectors() {
        assert_eq!(unused_selector_fraction("body { margin: 0 }", ""), None);
    }

    #[test]
    fn test_mostly_unused_sheet_flagged() {
        let css = ".hero{} .nav{} .legacy-banner{}";
        let finding = check_stylesheet(&RuleContext::default(), &sheet(), css, "<div class=\"hero\">")
            .unwrap();
        assert_eq!(finding.kind, FindingKind::UnusedCss);
        assert_eq!(finding.rule_severity, Severity::Medium);
    }

    #[test]
    fn test_fully_used_sheet_passes() {
        let css = ".hero{} .nav{}";
        let html = "<div class=\"hero nav\"></div>";
        assert!(check_stylesheet(&RuleContext::default(), &sheet(), css, html).is_none());
    }

    #[test]
    fn test_no_markup_means_everything_unused() {
        let css = ".card{}";
        assert!(check_stylesheet(&RuleContext::default(), &sheet(), css, "").is_some());
    }
}
