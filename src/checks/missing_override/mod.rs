use anyhow::Result;
use opentelemetry::KeyValue;

use crate::checks::{Check, CheckMetadata, Reporter};
use crate::descriptor::{display_signature, simple_name};
use crate::engine::AnalysisContext;
use crate::hierarchy::MethodLike;
use crate::problem::{Message, ProblemType};
use crate::visit::{Node, NodeCategory, walk};

const OVERRIDE: &str = "java/lang/Override";

/// Check that reports overriding methods without `@Override`.
#[derive(Default)]
pub(crate) struct MissingOverrideCheck;

crate::register_check!(MissingOverrideCheck);

impl Check for MissingOverrideCheck {
    fn metadata(&self) -> CheckMetadata {
        CheckMetadata {
            id: "MISSING_OVERRIDE_ANNOTATION",
            name: "Missing @Override",
            description: "Methods overriding or implementing a supertype method should be annotated with @Override",
            problem_types: &[ProblemType::MissingOverrideAnnotation],
            maximum_problems: None,
        }
    }

    fn run(&mut self, context: &AnalysisContext, reporter: &mut Reporter) -> Result<()> {
        let model = context.model();
        let hierarchy = context.hierarchy();
        context.with_span(
            "check.methods",
            &[KeyValue::new("autograde.category", "method")],
            || {
                walk(model, &[NodeCategory::Method], |cursor, node| {
                    let Node::Method(id, method) = node else {
                        return Ok(());
                    };
                    let owner = model.type_decl(id.ty);
                    if method.implicit || owner.is_anonymous() || method.has_annotation(OVERRIDE) {
                        return Ok(());
                    }
                    if !hierarchy.is_overriding(MethodLike::Method(id)) {
                        return Ok(());
                    }
                    let signature = format!(
                        "{}.{}",
                        simple_name(&owner.name),
                        display_signature(&method.name, &method.descriptor)
                    );
                    reporter.emit(
                        cursor,
                        node,
                        Message::new("missing-override").with("method", signature),
                        ProblemType::MissingOverrideAnnotation,
                    );
                    Ok(())
                })
            },
        )
    }
}
