//! Guideline catalogue and the per-kind weight table.
//!
//! Both are loaded once at startup and handed explicitly to the static rule engine,
//! the assisted batch and the enricher.

use crate::analyzer::report::FindingKind;
use std::collections::BTreeMap;

/// Guidelines the static rule engine already covers.
pub const STATIC_GUIDELINES: &[&str] = &[
    "Use efficient image formats",
    "Optimize image dimensions",
    "Lazy-load offscreen images",
    "Remove unused CSS",
    "Remove unused JavaScript",
    "Enable text compression",
    "Use HTTP caching",
    "Preload critical assets",
    "Defer non-critical CSS",
    "Defer non-critical JavaScript",
    "Use responsive images",
    "Use modern image formats",
];

/// Guidelines that need judgement and are delegated to the generation service.
pub const ASSISTED_GUIDELINES: &[&str] = &[
    "Reduce server response times",
    "Enable GZIP compression",
    "Use a CDN for static assets",
    "Limit third-party scripts",
    "Preconnect to required origins",
    "Reduce DOM size",
    "Avoid synchronous layouts",
    "Use efficient CSS selectors",
    "Avoid long tasks",
    "Use web workers for expensive tasks",
];

fn default_weights() -> [(FindingKind, u32); 12] {
    [
        (FindingKind::LegacyImageFormat, 3),
        (FindingKind::OversizedImage, 3),
        (FindingKind::NestedLoop, 3),
        (FindingKind::HighComplexity, 3),
        (FindingKind::MissingCachePolicy, 3),
        (FindingKind::MissingLazyLoading, 2),
        (FindingKind::NonResponsiveImage, 2),
        (FindingKind::UnusedCss, 2),
        (FindingKind::UnusedJavaScript, 2),
        (FindingKind::NoCodeSplitting, 2),
        (FindingKind::MissingPreload, 2),
        (FindingKind::UncompressedJavaScript, 1),
    ]
}

/// Weight assigned to kinds missing from the table.
pub const UNKNOWN_WEIGHT: u32 = 1;

/// Immutable rule configuration shared by the analysis stages.
#[derive(Debug, Clone)]
pub struct Guidelines {
    weights: BTreeMap<String, u32>,
    assisted: Vec<String>,
}

impl Default for Guidelines {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Guidelines {
    /// The built-in catalogue.
    pub fn builtin() -> Self {
        Self {
            weights: default_weights()
                .iter()
                .map(|(kind, w)| (kind.name().to_string(), *w))
                .collect(),
            assisted: ASSISTED_GUIDELINES.iter().map(|g| g.to_string()).collect(),
        }
    }

    /// Merge weight overrides (keyed by kind name) onto the table.
    pub fn with_weight_overrides(mut self, overrides: &BTreeMap<String, u32>) -> Self {
        for (name, weight) in overrides {
            self.weights.insert(name.clone(), *weight);
        }
        self
    }

    pub fn weight(&self, kind: &FindingKind) -> u32 {
        self.weights.get(kind.name()).copied().unwrap_or(UNKNOWN_WEIGHT)
    }

    pub fn weights(&self) -> &BTreeMap<String, u32> {
        &self.weights
    }

    pub fn assisted(&self) -> &[String] {
        &self.assisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_weights() {
        let g = Guidelines::builtin();
        assert_eq!(g.weight(&FindingKind::LegacyImageFormat), 3);
        assert_eq!(g.weight(&FindingKind::UncompressedJavaScript), 1);
        assert_eq!(g.weight(&FindingKind::Guideline("Reduce DOM size".into())), 1);
    }

    #[test]
    fn test_overrides_merge() {
        let mut overrides = BTreeMap::new();
        overrides.insert("NestedLoop".to_string(), 5);
        overrides.insert("Reduce DOM size".to_string(), 2);
        let g = Guidelines::builtin().with_weight_overrides(&overrides);
        assert_eq!(g.weight(&FindingKind::NestedLoop), 5);
        assert_eq!(g.weight(&FindingKind::Guideline("Reduce DOM size".into())), 2);
        assert_eq!(g.weight(&FindingKind::OversizedImage), 3);
    }

    #[test]
    fn test_assisted_set_is_disjoint_from_static() {
        let g = Guidelines::builtin();
        for rule in g.assisted() {
            assert!(!STATIC_GUIDELINES.contains(&rule.as_str()));
        }
        assert_eq!(STATIC_GUIDELINES.len() + g.assisted().len(), 22);
    }
}
