use anyhow::Result;
use opentelemetry::KeyValue;

use crate::checks::{Check, CheckMetadata, Reporter};
use crate::descriptor::STRING;
use crate::engine::AnalysisContext;
use crate::ir::{Model, TypeDecl, TypeId, TypeKind, Visibility};
use crate::problem::{Message, ProblemType};
use crate::query::is_effectively_final;
use crate::visit::{Node, NodeCategory, walk};

/// Classes with fewer non-private constants only count when they have no methods.
const FIELD_THRESHOLD: usize = 12;
const ENUM_METHOD_LIMIT: usize = 3;

/// Check that detects classes and enums used only as bags of constants.
#[derive(Default)]
pub(crate) struct ConstantsClassCheck;

crate::register_check!(ConstantsClassCheck);

impl Check for ConstantsClassCheck {
    fn metadata(&self) -> CheckMetadata {
        CheckMetadata {
            id: "DO_NOT_HAVE_CONSTANTS_CLASS",
            name: "Constants class",
            description: "Constants belong to the types that use them, not to dedicated holder classes",
            problem_types: &[ProblemType::DoNotHaveConstantsClass],
            maximum_problems: None,
        }
    }

    fn run(&mut self, context: &AnalysisContext, reporter: &mut Reporter) -> Result<()> {
        let model = context.model();
        walk(model, &[NodeCategory::Type], |cursor, node| {
            let Node::Type(id, decl) = node else {
                return Ok(());
            };
            let flagged = context.with_span(
                "scan.type",
                &[KeyValue::new("autograde.type", decl.name.clone())],
                || is_constants_class(model, id, decl) || is_constants_enum(decl),
            );
            if flagged {
                reporter.emit(
                    cursor,
                    node,
                    Message::new("constants-class-exp"),
                    ProblemType::DoNotHaveConstantsClass,
                );
            }
            Ok(())
        })
    }
}

/// Only static, effectively final fields and nothing that gives the type behavior
/// through inheritance or nesting.
fn is_constants_class_like(model: &Model, id: TypeId, decl: &TypeDecl) -> bool {
    !decl.is_anonymous()
        && decl.outer.is_none()
        && !decl.is_abstract
        && decl.interfaces.is_empty()
        && model.nested_types(id).is_empty()
        && !decl.fields.is_empty()
        && decl.fields.iter().all(|field| {
            field.modifiers.is_static && is_effectively_final(model, &decl.name, field)
        })
}

fn is_constants_class(model: &Model, id: TypeId, decl: &TypeDecl) -> bool {
    if decl.kind != TypeKind::Class || decl.explicit_superclass().is_some() {
        return false;
    }
    if !is_constants_class_like(model, id, decl) {
        return false;
    }
    let visible_fields = decl
        .fields
        .iter()
        .filter(|field| field.modifiers.visibility != Visibility::Private)
        .count();
    let has_methods = decl.declared_methods().next().is_some();
    (!has_methods && visible_fields > 1) || visible_fields > FIELD_THRESHOLD
}

/// Many constants, few methods and at most a single string payload per constant.
fn is_constants_enum(decl: &TypeDecl) -> bool {
    if decl.kind != TypeKind::Enum || decl.enum_values.len() <= FIELD_THRESHOLD {
        return false;
    }
    if decl.declared_methods().count() > ENUM_METHOD_LIMIT {
        return false;
    }
    decl.enum_values.iter().all(|value| match value.arguments.as_slice() {
        [] => true,
        [argument] => argument.static_type() == Some(STRING),
        _ => false,
    })
}
