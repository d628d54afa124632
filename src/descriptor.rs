use std::str::FromStr;

use anyhow::{Context, Result};
use jdescriptor::{MethodDescriptor, TypeDescriptor};

pub(crate) const STRING: &str = "Ljava/lang/String;";
pub(crate) const STRING_BUILDER: &str = "Ljava/lang/StringBuilder;";

/// Override-matching identity of a method: name plus erased parameter types.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct ErasedSignature {
    pub(crate) name: String,
    pub(crate) parameters: String,
}

impl std::fmt::Display for ErasedSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.parameters)
    }
}

/// Erased signature of a method from its JVM descriptor; the return type is ignored.
pub(crate) fn erased_signature(name: &str, descriptor: &str) -> Result<ErasedSignature> {
    let descriptor =
        MethodDescriptor::from_str(descriptor).context("parse method descriptor")?;
    let parameters = descriptor
        .parameter_types()
        .iter()
        .map(ToString::to_string)
        .collect::<String>();
    Ok(ErasedSignature {
        name: name.to_string(),
        parameters,
    })
}

/// Validate a field descriptor such as `I` or `[Ljava/lang/String;`.
pub(crate) fn parse_type(descriptor: &str) -> Result<TypeDescriptor> {
    let parsed = TypeDescriptor::from_str(descriptor)
        .with_context(|| format!("parse type descriptor {descriptor}"))?;
    if parsed.to_string() != descriptor {
        anyhow::bail!("trailing characters in type descriptor {descriptor}");
    }
    Ok(parsed)
}

pub(crate) fn is_primitive(descriptor: &str) -> bool {
    matches!(
        TypeDescriptor::from_str(descriptor),
        Ok(TypeDescriptor::Byte
            | TypeDescriptor::Char
            | TypeDescriptor::Double
            | TypeDescriptor::Float
            | TypeDescriptor::Integer
            | TypeDescriptor::Long
            | TypeDescriptor::Short
            | TypeDescriptor::Boolean)
    )
}

pub(crate) fn is_integral(descriptor: &str) -> bool {
    matches!(
        TypeDescriptor::from_str(descriptor),
        Ok(TypeDescriptor::Byte
            | TypeDescriptor::Short
            | TypeDescriptor::Integer
            | TypeDescriptor::Long
            | TypeDescriptor::Char)
    )
}

/// Internal class name of an object descriptor, `None` for primitives and arrays.
pub(crate) fn class_name(descriptor: &str) -> Option<String> {
    match TypeDescriptor::from_str(descriptor) {
        Ok(TypeDescriptor::Object(name)) => Some(name),
        _ => None,
    }
}

/// `java.util.Formatter` conversion for a value of the given static type.
pub(crate) fn format_placeholder(descriptor: &str) -> &'static str {
    match TypeDescriptor::from_str(descriptor) {
        Ok(TypeDescriptor::Boolean) => "%b",
        Ok(TypeDescriptor::Char) => "%c",
        Ok(
            TypeDescriptor::Byte
            | TypeDescriptor::Short
            | TypeDescriptor::Integer
            | TypeDescriptor::Long,
        ) => "%d",
        Ok(TypeDescriptor::Float | TypeDescriptor::Double) => "%f",
        _ => "%s",
    }
}

/// Unqualified source name of an internal class name: `java/util/Map$Entry` -> `Entry`.
pub(crate) fn simple_name(internal_name: &str) -> &str {
    let name = internal_name
        .rsplit_once('/')
        .map_or(internal_name, |(_, name)| name);
    name.rsplit_once('$').map_or(name, |(_, name)| name)
}

/// Source spelling of a descriptor: `I` -> `int`, `[Ljava/lang/String;` -> `String[]`.
pub(crate) fn source_type_name(descriptor: &str) -> String {
    match TypeDescriptor::from_str(descriptor) {
        Ok(parsed) => type_name(&parsed),
        Err(_) => descriptor.to_string(),
    }
}

fn type_name(descriptor: &TypeDescriptor) -> String {
    match descriptor {
        TypeDescriptor::Byte => "byte".to_string(),
        TypeDescriptor::Char => "char".to_string(),
        TypeDescriptor::Double => "double".to_string(),
        TypeDescriptor::Float => "float".to_string(),
        TypeDescriptor::Integer => "int".to_string(),
        TypeDescriptor::Long => "long".to_string(),
        TypeDescriptor::Short => "short".to_string(),
        TypeDescriptor::Boolean => "boolean".to_string(),
        TypeDescriptor::Void => "void".to_string(),
        TypeDescriptor::Array(element, dimensions) => {
            format!("{}{}", type_name(element), "[]".repeat(*dimensions as usize))
        }
        TypeDescriptor::Object(name) => simple_name(name).to_string(),
    }
}

/// Java-style signature used in messages, e.g. `foo(int, String)`.
pub(crate) fn display_signature(name: &str, descriptor: &str) -> String {
    match MethodDescriptor::from_str(descriptor) {
        Ok(parsed) => {
            let parameters = parsed
                .parameter_types()
                .iter()
                .map(type_name)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{name}({parameters})")
        }
        Err(_) => format!("{name}{descriptor}"),
    }
}
