use std::collections::BTreeSet;

use anyhow::{Context, Result};
use tracing::warn;

use crate::descriptor::{class_name, erased_signature, parse_type};
use crate::ir::Model;

/// Types referenced by the model but not declared in it.
pub(crate) struct ReferenceIndex {
    pub(crate) referenced: BTreeSet<String>,
    pub(crate) missing: BTreeSet<String>,
}

/// Check every member descriptor and collect the types the model refers to.
/// Unresolved platform types are expected; other unresolved types only make
/// the hierarchy less complete and are reported as a warning.
pub(crate) fn resolve_references(model: &Model) -> Result<ReferenceIndex> {
    let mut referenced = BTreeSet::new();
    for (_, decl) in model.types() {
        referenced.extend(decl.superclass.iter().cloned());
        referenced.extend(decl.interfaces.iter().cloned());
        for field in &decl.fields {
            parse_type(&field.descriptor).with_context(|| {
                format!("invalid descriptor of field {}.{}", decl.name, field.name)
            })?;
            referenced.extend(class_name(&field.descriptor));
        }
        for method in &decl.methods {
            erased_signature(&method.name, &method.descriptor).with_context(|| {
                format!("invalid descriptor of method {}.{}", decl.name, method.name)
            })?;
            referenced.extend(method.annotations.iter().cloned());
        }
    }

    let missing: BTreeSet<String> = referenced
        .iter()
        .filter(|name| !is_platform_class(name) && model.type_named(name).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        warn!(
            count = missing.len(),
            first = missing.iter().next().map(String::as_str).unwrap_or_default(),
            "model references undeclared types; overrides through them are not resolved"
        );
    }

    Ok(ReferenceIndex {
        referenced,
        missing,
    })
}

fn is_platform_class(name: &str) -> bool {
    const PREFIXES: [&str; 5] = ["java/", "javax/", "jdk/", "sun/", "com/sun/"];
    PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::{class, field, interface, method, model, source_file};

    #[test]
    fn resolve_references_accepts_java_references() {
        let model = model(vec![source_file(
            "com/example/Foo.java",
            vec![
                class("com/example/Foo")
                    .extends("java/lang/Object")
                    .implements("com/example/Bar")
                    .field(field("name", "Ljava/lang/String;"))
                    .method(method("run", "(Lcom/example/Bar;)V").annotated("java/lang/Override"))
                    .build(),
                interface("com/example/Bar").build(),
            ],
        )]);

        let index = resolve_references(&model).expect("references");

        assert!(index.missing.is_empty());
        assert!(index.referenced.contains("java/lang/String"));
        assert!(index.referenced.contains("com/example/Bar"));
    }

    #[test]
    fn resolve_references_allows_missing_classes() {
        let model = model(vec![source_file(
            "com/example/Foo.java",
            vec![
                class("com/example/Foo")
                    .extends("com/example/Base")
                    .field(field("other", "Lcom/example/Other;"))
                    .build(),
            ],
        )]);

        let index = resolve_references(&model).expect("references");

        assert_eq!(
            index.missing.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["com/example/Base", "com/example/Other"]
        );
    }

    #[test]
    fn resolve_references_rejects_malformed_descriptors() {
        let broken_method = model(vec![source_file(
            "A.java",
            vec![class("A").method(method("run", "(V")).build()],
        )]);
        let broken_field = model(vec![source_file(
            "B.java",
            vec![class("B").field(field("x", "Q")).build()],
        )]);

        let error = resolve_references(&broken_method).err().expect("malformed method");
        assert!(format!("{error:#}").contains("A.run"));
        assert!(resolve_references(&broken_field).is_err());
    }
}
