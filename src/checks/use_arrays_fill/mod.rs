use anyhow::Result;
use opentelemetry::KeyValue;

use crate::checks::{Check, CheckMetadata, Reporter};
use crate::engine::AnalysisContext;
use crate::ir::{ExprKind, Literal, Model, Stmt, StmtKind};
use crate::problem::{Message, ProblemType};
use crate::query::{ForLoopRange, effective_statements, is_immutable_type, uses_local};
use crate::visit::{NodeCategory, walk};

/// Check that detects counted loops filling an array with one value.
#[derive(Default)]
pub(crate) struct UseArraysFillCheck;

crate::register_check!(UseArraysFillCheck);

impl Check for UseArraysFillCheck {
    fn metadata(&self) -> CheckMetadata {
        CheckMetadata {
            id: "COMMON_REIMPLEMENTATION_ARRAYS_FILL",
            name: "Loop reimplements Arrays.fill",
            description: "Counted loops assigning the same immutable value to every array slot can use Arrays.fill",
            problem_types: &[ProblemType::CommonReimplementationArraysFill],
            maximum_problems: None,
        }
    }

    fn run(&mut self, context: &AnalysisContext, reporter: &mut Reporter) -> Result<()> {
        let model = context.model();
        context.with_span(
            "check.loops",
            &[KeyValue::new("autograde.category", "loop")],
            || {
                walk(model, &[NodeCategory::Loop], |cursor, node| {
                    let Some(stmt) = node.as_stmt() else {
                        return Ok(());
                    };
                    if stmt.implicit {
                        return Ok(());
                    }
                    if let Some(suggestion) = arrays_fill_suggestion(model, stmt) {
                        reporter.emit(
                            cursor,
                            node,
                            Message::new("common-reimplementation").with("suggestion", suggestion),
                            ProblemType::CommonReimplementationArraysFill,
                        );
                    }
                    Ok(())
                })
            },
        )
    }
}

fn arrays_fill_suggestion(model: &Model, stmt: &Stmt) -> Option<String> {
    let range = ForLoopRange::from_for(stmt)?;
    let StmtKind::For { body, .. } = &stmt.kind else {
        return None;
    };
    let statements = effective_statements(body);
    let [assignment] = statements.as_slice() else {
        return None;
    };
    let StmtKind::Assign {
        target,
        op: None,
        value,
    } = &assignment.kind
    else {
        return None;
    };
    let ExprKind::ArrayRead {
        target: array,
        index,
    } = &target.kind
    else {
        return None;
    };
    if !index.is_local(&range.loop_variable) || uses_local(value, &range.loop_variable) {
        return None;
    }
    if matches!(value.kind, ExprKind::New { .. } | ExprKind::NewArray { .. }) {
        return None;
    }
    if !is_immutable_type(model, value.static_type()?) {
        return None;
    }

    let starts_at_zero = matches!(
        range.start.kind,
        ExprKind::Literal {
            value: Literal::Int(0)
        }
    );
    let ends_at_length = matches!(
        &range.end.kind,
        ExprKind::Field { target: Some(length_of), name, .. }
            if name == "length" && length_of.to_string() == array.to_string()
    );
    if starts_at_zero && ends_at_length {
        return Some(format!("Arrays.fill({array}, {value})"));
    }
    Some(format!(
        "Arrays.fill({array}, {}, {}, {value})",
        range.start, range.end
    ))
}
