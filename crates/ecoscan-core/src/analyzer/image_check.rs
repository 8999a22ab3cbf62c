use crate::analyzer::report::{Finding, FindingKind, Severity};
use crate::analyzer::RuleContext;
use crate::discovery::{SourceFile, MODERN_IMAGE_EXTS};

/// Check an image for legacy encoding and excessive pixel dimensions.
pub fn check_image(ctx: &RuleContext, file: &SourceFile) -> Vec<Finding> {
    let mut findings = Vec::new();

    if !MODERN_IMAGE_EXTS.contains(&file.extension.as_str()) {
        findings.push(ctx.finding(
            FindingKind::LegacyImageFormat,
            Some(&file.relative_path),
            Severity::High,
        ));
    }

    match imagesize::size(&file.path) {
        Ok(dim) => {
            let pixels = (dim.width as u64).saturating_mul(dim.height as u64);
            if pixels > ctx.thresholds.max_pixels {
                findings.push(ctx.finding(
                    FindingKind::OversizedImage,
                    Some(&file.relative_path),
                    Severity::Medium,
                ));
            }
        }
        Err(e) => {
            tracing::warn!(file = %file.relative_path, error = ?e, "image analysis failed");
        }
    }

    findings
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::discovery::{classify, FileClass};
    use std::path::Path;

    /// Smallest byte sequence the header sniffer accepts as a baseline JPEG.
    pub(crate) fn jpeg_header(width: u16, height: u16) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        bytes.extend_from_slice(b"JFIF\0");
        bytes.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    fn source(path: &Path, rel: &str) -> SourceFile {
        let extension = crate::discovery::extension_of(path);
        SourceFile {
            path: path.to_path_buf(),
            relative_path: rel.to_string(),
            class: classify(&extension),
            extension,
        }
    }

    #[test]
    fn test_large_jpeg_flags_format_and_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hero.jpg");
        std::fs::write(&path, jpeg_header(1200, 1200)).unwrap();
        let file = source(&path, "hero.jpg");
        assert_eq!(file.class, FileClass::Image);

        let ctx = RuleContext::default();
        let findings = check_image(&ctx, &file);
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::LegacyImageFormat && f.rule_severity == Severity::High));
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::OversizedImage && f.rule_severity == Severity::Medium));
    }

    #[test]
    fn test_small_jpeg_only_legacy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon.jpg");
        std::fs::write(&path, jpeg_header(64, 64)).unwrap();
        let findings = check_image(&RuleContext::default(), &source(&path, "icon.jpg"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::LegacyImageFormat);
    }

    #[test]
    fn test_undecodable_webp_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.webp");
        std::fs::write(&path, b"definitely not an image").unwrap();
        let findings = check_image(&RuleContext::default(), &source(&path, "broken.webp"));
        assert!(findings.is_empty());
    }
}
