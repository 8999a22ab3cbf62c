use crate::analyzer::metrics::gzip_size;
use crate::analyzer::report::{Finding, FindingKind, Severity};
use crate::analyzer::RuleContext;
use crate::discovery::SourceFile;
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Node, Parser};

static DYNAMIC_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\(\s*['"]"#).expect("static regex"));

static RELATIVE_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import.*from.*['"]\./"#).expect("static regex"));

const LOOP_KINDS: &[&str] = &[
    "for_statement",
    "for_in_statement",
    "while_statement",
    "do_statement",
];

fn grammar_for(extension: &str) -> tree_sitter::Language {
    match extension {
        "ts" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
        _ => tree_sitter_javascript::LANGUAGE.into(),
    }
}

/// Parse a script and report whether any loop is nested inside another.
///
/// Returns `None` when the source could not be parsed at all.
pub fn has_nested_loop(content: &str, extension: &str) -> Option<bool> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar_for(extension)) {
        tracing::warn!(error = %e, extension, "failed to load script grammar");
        return None;
    }
    let tree = parser.parse(content, None)?;
    Some(contains_nested_loop(tree.root_node()))
}

/// Walk the tree with a cursor, keeping one "is a loop" flag per ancestor.
///
/// Source nesting depth never grows the call stack.
fn contains_nested_loop(root: Node) -> bool {
    let mut cursor = root.walk();
    let mut path: Vec<bool> = Vec::new();
    let mut loops = 0usize;

    loop {
        let is_loop = LOOP_KINDS.contains(&cursor.node().kind());
        if is_loop {
            if loops > 0 {
                return true;
            }
            loops += 1;
        }
        path.push(is_loop);

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if path.pop() == Some(true) {
                loops -= 1;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return false;
            }
        }
    }
}

/// Run every script check against one JS/TS file.
pub fn check_script(ctx: &RuleContext, file: &SourceFile, content: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    let rel = Some(file.relative_path.as_str());

    match has_nested_loop(content, &file.extension) {
        Some(true) => findings.push(ctx.finding(FindingKind::NestedLoop, rel, Severity::High)),
        Some(false) => {}
        None => tracing::warn!(file = %file.relative_path, "syntax analysis failed"),
    }

    if !DYNAMIC_IMPORT.is_match(content) {
        findings.push(ctx.finding(FindingKind::NoCodeSplitting, rel, Severity::Medium));
    }

    if content.contains("export ") && !RELATIVE_IMPORT.is_match(content) {
        findings.push(ctx.finding(FindingKind::UnusedJavaScript, rel, Severity::Medium));
    }

    if content.len() > ctx.thresholds.min_compress_bytes {
        match gzip_size(content.as_bytes()) {
            Ok(compressed) => {
                let ratio = compressed as f64 / content.len() as f64;
                if ratio > ctx.thresholds.compression_ratio {
                    findings.push(ctx.finding(
                        FindingKind::UncompressedJavaScript,
                        rel,
                        Severity::Low,
                    ));
                }
            }
            Err(e) => tracing::warn!(file = %file.relative_path, error = %e, "compression failed"),
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::FileClass;
    use std::path::PathBuf;

    fn script(rel: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(rel),
            relative_path: rel.to_string(),
            extension: rel.rsplit('.').next().unwrap().to_string(),
            class: FileClass::Script,
        }
    }

    #[test]
    fn test_nested_for_loops() {
        let code = "for (let i = 0; i < 10; i++) { for (let j = 0; j < 10; j++) { work(i, j); } }";
        assert_eq!(has_nested_loop(code, "js"), Some(true));
    }

    #[test]
    fn test_while_inside_for_of() {
        let code = "for (const x of xs) { let n = x; while (n > 0) { n--; } }";
        assert_eq!(has_nested_loop(code, "js"), Some(true));
    }

    #[test]
    fn test_sequential_loops_are_not_nested() {
        let code = "for (const a of xs) { f(a); }\nwhile (busy()) { tick(); }";
        assert_eq!(has_nested_loop(code, "js"), Some(false));
    }

    #[test]
    fn test_typescript_nested_loop() {
        let code = "function grid(n: number): void {\n  for (let i: number = 0; i < n; i++) {\n    do { i++; } while (i < 3);\n  }\n}";
        assert_eq!(has_nested_loop(code, "ts"), Some(true));
    }

    #[test]
    fn test_tsx_parses() {
        let code = "export const App = () => <div>{items.map(i => <span>{i}</span>)}</div>;";
        assert_eq!(has_nested_loop(code, "tsx"), Some(false));
    }

    #[test]
    fn test_code_splitting_and_exports() {
        let ctx = RuleContext::default();
        let plain = check_script(&ctx, &script("src/util.js"), "export const a = 1;");
        assert!(plain.iter().any(|f| f.kind == FindingKind::NoCodeSplitting));
        assert!(plain.iter().any(|f| f.kind == FindingKind::UnusedJavaScript));

        let split = check_script(
            &ctx,
            &script("src/main.js"),
            "import { a } from './util';\nconst page = import('./page');\nexport default page;",
        );
        assert!(!split.iter().any(|f| f.kind == FindingKind::NoCodeSplitting));
        assert!(!split.iter().any(|f| f.kind == FindingKind::UnusedJavaScript));
    }

    #[test]
    fn test_repetitive_large_script_compresses_well() {
        let ctx = RuleContext::default();
        let content = "console.log('hello world');\n".repeat(100);
        let findings = check_script(&ctx, &script("src/log.js"), &content);
        assert!(!findings.iter().any(|f| f.kind == FindingKind::UncompressedJavaScript));
    }

    #[test]
    fn test_small_script_never_checked_for_compression() {
        let ctx = RuleContext::default();
        let findings = check_script(&ctx, &script("a.js"), "x9Qz");
        assert!(!findings.iter().any(|f| f.kind == FindingKind::UncompressedJavaScript));
    }

    fn deeply_nested_expression(depth: usize) -> String {
        format!("x = {}1{};\n", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn test_deeply_nested_expression_does_not_overflow() {
        let code = deeply_nested_expression(60_000);
        assert_eq!(has_nested_loop(&code, "js"), Some(false));
    }

    #[test]
    fn test_nested_loop_found_after_deep_subtree() {
        let mut code = deeply_nested_expression(60_000);
        code.push_str("for (;;) { while (x) { x--; } }\n");
        assert_eq!(has_nested_loop(&code, "js"), Some(true));

        let ctx = RuleContext::default();
        let findings = check_script(&ctx, &script("deep.js"), &code);
        assert!(findings.iter().any(|f| f.kind == FindingKind::NestedLoop));
    }
}
