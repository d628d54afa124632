//! Pure queries over the indexed model shared by checks.

use std::collections::BTreeSet;

use crate::descriptor::{class_name, is_integral, is_primitive};
use crate::ir::{BinaryOp, Expr, ExprKind, Field, Literal, Model, Stmt, StmtKind, TypeKind, UnaryOp};
use crate::visit::{Node, any_node};

const MAX_CONSTANT_DEPTH: usize = 16;

const IMMUTABLE_CLASSES: &[&str] = &[
    "java/lang/String",
    "java/lang/Boolean",
    "java/lang/Byte",
    "java/lang/Short",
    "java/lang/Character",
    "java/lang/Integer",
    "java/lang/Long",
    "java/lang/Float",
    "java/lang/Double",
    "java/lang/Class",
    "java/math/BigInteger",
    "java/math/BigDecimal",
    "java/util/UUID",
];

/// A field is effectively final when declared final or never written.
pub(crate) fn is_effectively_final(model: &Model, owner: &str, field: &Field) -> bool {
    field.modifiers.is_final || !model.is_field_written(owner, &field.name)
}

/// Whether values of the given descriptor can never change after construction.
pub(crate) fn is_immutable_type(model: &Model, descriptor: &str) -> bool {
    is_immutable(model, descriptor, &mut BTreeSet::new())
}

fn is_immutable(model: &Model, descriptor: &str, seen: &mut BTreeSet<String>) -> bool {
    if is_primitive(descriptor) {
        return true;
    }
    let Some(name) = class_name(descriptor) else {
        return false;
    };
    if IMMUTABLE_CLASSES.contains(&name.as_str()) {
        return true;
    }
    let Some(id) = model.type_named(&name) else {
        return false;
    };
    let decl = model.type_decl(id);
    if decl.kind == TypeKind::Enum {
        return true;
    }
    if !seen.insert(name.clone()) {
        // a cycle through final fields does not make the type mutable
        return true;
    }
    matches!(decl.kind, TypeKind::Class | TypeKind::Record)
        && decl
            .fields
            .iter()
            .filter(|field| !field.modifiers.is_static)
            .all(|field| {
                (field.modifiers.is_final || decl.kind == TypeKind::Record)
                    && is_immutable(model, &field.descriptor, seen)
            })
}

/// Constant value of an expression: a literal, a read of a static final field
/// with a constant initializer, or a `+` of constants.
pub(crate) fn resolve_constant(model: &Model, expr: &Expr) -> Option<Literal> {
    resolve(model, expr, 0)
}

fn resolve(model: &Model, expr: &Expr, depth: usize) -> Option<Literal> {
    if depth > MAX_CONSTANT_DEPTH {
        return None;
    }
    match &expr.kind {
        ExprKind::Literal { value } => Some(value.clone()),
        ExprKind::Field {
            target,
            owner,
            name,
            is_static: true,
        } if target
            .as_deref()
            .is_none_or(|target| matches!(target.kind, ExprKind::TypeAccess { .. })) =>
        {
            let decl = model.type_decl(model.type_named(owner)?);
            let field = decl.fields.iter().find(|field| &field.name == name)?;
            if !field.modifiers.is_static || !field.modifiers.is_final {
                return None;
            }
            resolve(model, field.initializer.as_ref()?, depth + 1)
        }
        ExprKind::Binary {
            op: BinaryOp::Plus,
            lhs,
            rhs,
        } => {
            let lhs = resolve(model, lhs, depth + 1)?;
            let rhs = resolve(model, rhs, depth + 1)?;
            fold_plus(lhs, rhs)
        }
        _ => None,
    }
}

fn fold_plus(lhs: Literal, rhs: Literal) -> Option<Literal> {
    match (lhs, rhs) {
        (Literal::String(lhs), rhs) => Some(Literal::String(lhs + &string_value(&rhs))),
        (lhs, Literal::String(rhs)) => Some(Literal::String(string_value(&lhs) + &rhs)),
        (Literal::Int(lhs), Literal::Int(rhs)) => {
            Some(Literal::Int(i64::from((lhs as i32).wrapping_add(rhs as i32))))
        }
        (Literal::Long(lhs) | Literal::Int(lhs), Literal::Long(rhs) | Literal::Int(rhs)) => {
            Some(Literal::Long(lhs.wrapping_add(rhs)))
        }
        _ => None,
    }
}

/// Java string conversion of a constant.
pub(crate) fn string_value(literal: &Literal) -> String {
    match literal {
        Literal::Int(value) | Literal::Long(value) => value.to_string(),
        Literal::Float(value) | Literal::Double(value) => format!("{value:?}"),
        Literal::Boolean(value) => value.to_string(),
        Literal::Char(value) => value.to_string(),
        Literal::String(value) => value.clone(),
        Literal::Null => "null".to_string(),
    }
}

/// Whether the local variable `name` is read or written anywhere in `expr`.
pub(crate) fn uses_local(expr: &Expr, name: &str) -> bool {
    any_node(Node::Expr(expr), &mut |node| {
        node.as_expr().is_some_and(|expr| expr.is_local(name))
    })
}

/// Whether `stmt` assigns, increments or decrements the local `name`.
pub(crate) fn writes_local(stmt: &Stmt, name: &str) -> bool {
    any_node(Node::Stmt(stmt), &mut |node| match node {
        Node::Stmt(Stmt {
            kind: StmtKind::Assign { target, .. },
            ..
        }) => target.is_local(name),
        Node::Expr(Expr {
            kind: ExprKind::Unary { op, operand },
            ..
        }) => op.is_write() && operand.is_local(name),
        _ => false,
    })
}

/// Statements that do something: empty statements dropped, blocks flattened.
pub(crate) fn effective_statements(stmt: &Stmt) -> Vec<&Stmt> {
    let mut statements = Vec::new();
    collect_effective(stmt, &mut statements);
    statements
}

fn collect_effective<'a>(stmt: &'a Stmt, statements: &mut Vec<&'a Stmt>) {
    match &stmt.kind {
        StmtKind::Empty => {}
        StmtKind::Block { statements: nested } => {
            for stmt in nested {
                collect_effective(stmt, statements);
            }
        }
        _ => statements.push(stmt),
    }
}

/// Counted loop `for (int i = start; i < end; i++)`. For `i <= end` the end
/// is rewritten to `end + 1`.
#[derive(Clone, Debug)]
pub(crate) struct ForLoopRange {
    pub(crate) loop_variable: String,
    pub(crate) start: Expr,
    pub(crate) end: Expr,
}

impl ForLoopRange {
    pub(crate) fn from_for(stmt: &Stmt) -> Option<Self> {
        let StmtKind::For {
            init,
            condition,
            update,
            body,
        } = &stmt.kind
        else {
            return None;
        };
        let [
            Stmt {
                kind:
                    StmtKind::Local {
                        name,
                        descriptor,
                        initializer: Some(start),
                    },
                ..
            },
        ] = init.as_slice()
        else {
            return None;
        };
        if !is_integral(descriptor) {
            return None;
        }
        let ExprKind::Binary { op, lhs, rhs } = &condition.as_ref()?.kind else {
            return None;
        };
        if !lhs.is_local(name) {
            return None;
        }
        let end = match op {
            BinaryOp::Lt => rhs.as_ref().clone(),
            BinaryOp::Le => Expr {
                kind: ExprKind::Binary {
                    op: BinaryOp::Plus,
                    lhs: rhs.clone(),
                    rhs: Box::new(Expr {
                        kind: ExprKind::Literal {
                            value: Literal::Int(1),
                        },
                        ty: Some("I".to_string()),
                        span: None,
                    }),
                },
                ty: rhs.ty.clone(),
                span: rhs.span,
            },
            _ => return None,
        };
        let [step] = update.as_slice() else {
            return None;
        };
        if !is_unit_increment(step, name) || writes_local(body, name) {
            return None;
        }
        Some(Self {
            loop_variable: name.clone(),
            start: start.clone(),
            end,
        })
    }
}

fn is_one(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Literal {
            value: Literal::Int(1)
        }
    )
}

/// `i++`, `++i`, `i += 1` or `i = i + 1`.
fn is_unit_increment(stmt: &Stmt, name: &str) -> bool {
    match &stmt.kind {
        StmtKind::Expression { expr } => matches!(
            &expr.kind,
            ExprKind::Unary {
                op: UnaryOp::PostInc | UnaryOp::PreInc,
                operand,
            } if operand.is_local(name)
        ),
        StmtKind::Assign {
            target,
            op: Some(BinaryOp::Plus),
            value,
        } => target.is_local(name) && is_one(value),
        StmtKind::Assign {
            target,
            op: None,
            value,
        } => {
            target.is_local(name)
                && matches!(
                    &value.kind,
                    ExprKind::Binary { op: BinaryOp::Plus, lhs, rhs }
                        if (lhs.is_local(name) && is_one(rhs))
                            || (is_one(lhs) && rhs.is_local(name))
                )
        }
        _ => false,
    }
}
