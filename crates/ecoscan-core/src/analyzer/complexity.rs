use crate::analyzer::report::{Finding, FindingKind, Severity};
use crate::analyzer::RuleContext;
use crate::discovery::SourceFile;
use tree_sitter::{Node, Parser};

/// Python syntax nodes that add an independent path through a function.
const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "conditional_expression",
    "boolean_operator",
    "for_in_clause",
    "if_clause",
    "case_clause",
];

/// Cyclomatic complexity of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionComplexity {
    pub name: String,
    pub line: usize,
    pub complexity: u32,
}

/// Compute per-function cyclomatic complexity for Python source.
///
/// Nested functions are scored on their own and do not add to their parent.
pub fn python_complexity(content: &str) -> anyhow::Result<Vec<FunctionComplexity>> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| anyhow::anyhow!("Failed to load Python grammar: {}", e))?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| anyhow::anyhow!("Failed to parse Python source"))?;

    Ok(collect_functions(tree.root_node(), content))
}

/// What a node on the current cursor path opened.
enum Mark {
    Plain,
    Function,
    Body,
}

/// A function whose subtree the cursor is inside.
struct Frame {
    slot: usize,
    body: Option<usize>,
    in_body: bool,
}

/// Score every function in one cursor pass.
///
/// Decisions count toward the innermost enclosing function, and only inside its body.
/// The walk is iterative: nesting depth lives in `path` and `frames`, not on the call stack.
fn collect_functions(root: Node, content: &str) -> Vec<FunctionComplexity> {
    let mut out = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();
    let mut path: Vec<Mark> = Vec::new();
    let mut cursor = root.walk();

    loop {
        let node = cursor.node();
        let mark = if node.kind() == "function_definition" {
            let name = node
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(content.as_bytes()).ok())
                .unwrap_or("<anonymous>")
                .to_string();
            frames.push(Frame {
                slot: out.len(),
                body: node.child_by_field_name("body").map(|b| b.id()),
                in_body: false,
            });
            out.push(FunctionComplexity {
                name,
                line: node.start_position().row + 1,
                complexity: 1,
            });
            Mark::Function
        } else if frames.last().map_or(false, |f| f.body == Some(node.id())) {
            if let Some(frame) = frames.last_mut() {
                frame.in_body = true;
            }
            Mark::Body
        } else {
            if DECISION_KINDS.contains(&node.kind()) {
                if let Some(frame) = frames.last().filter(|f| f.in_body) {
                    out[frame.slot].complexity += 1;
                }
            }
            Mark::Plain
        };
        path.push(mark);

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            match path.pop() {
                Some(Mark::Function) => {
                    frames.pop();
                }
                Some(Mark::Body) => {
                    if let Some(frame) = frames.last_mut() {
                        frame.in_body = false;
                    }
                }
                _ => {}
            }
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return out;
            }
        }
    }
}

/// One finding per file when any function exceeds the complexity threshold.
pub fn check_python(ctx: &RuleContext, file: &SourceFile, content: &str) -> Option<Finding> {
    let functions = match python_complexity(content) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(file = %file.relative_path, error = %e, "complexity analysis failed");
            return None;
        }
    };

    let offender = functions
        .iter()
        .find(|f| f.complexity > ctx.thresholds.complexity)?;
    tracing::debug!(
        file = %file.relative_path,
        function = %offender.name,
        complexity = offender.complexity,
        "complex function"
    );
    Some(ctx.finding(
        FindingKind::HighComplexity,
        Some(&file.relative_path),
        Severity::High,
    ))
}
