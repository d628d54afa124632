use std::fmt;

use crate::descriptor::{simple_name, source_type_name};
use crate::ir::{BinaryOp, Expr, ExprKind, LambdaBody, Literal, UnaryOp};

const ASSIGNMENT: u8 = 1;
const CONDITIONAL: u8 = 2;
const UNARY: u8 = 13;
const POSTFIX: u8 = 14;
const PRIMARY: u8 = 15;

/// Renders expressions in Java source syntax, adding parentheses only where
/// operator precedence requires them.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, ASSIGNMENT)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Long(value) => write!(f, "{value}L"),
            Literal::Float(value) => write!(f, "{value:?}f"),
            Literal::Double(value) => write!(f, "{value:?}"),
            Literal::Boolean(value) => write!(f, "{value}"),
            Literal::Char(value) => write!(f, "'{}'", escape_java(&value.to_string(), '\'')),
            Literal::String(value) => write!(f, "\"{}\"", escape_java(value, '"')),
            Literal::Null => f.write_str("null"),
        }
    }
}

/// Escape a string for use inside a Java literal delimited by `quote`.
pub(crate) fn escape_java(value: &str, quote: char) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\u{0008}' => escaped.push_str("\\b"),
            '\u{000C}' => escaped.push_str("\\f"),
            ch if ch == quote => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ch => escaped.push(ch),
        }
    }
    escaped
}

fn binary_precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Or => 3,
        BinaryOp::And => 4,
        BinaryOp::BitOr => 5,
        BinaryOp::BitXor => 6,
        BinaryOp::BitAnd => 7,
        BinaryOp::Eq | BinaryOp::Ne => 8,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::InstanceOf => 9,
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => 10,
        BinaryOp::Plus | BinaryOp::Minus => 11,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 12,
    }
}

pub(crate) fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Plus => "+",
        BinaryOp::Minus => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::Ushr => ">>>",
        BinaryOp::InstanceOf => "instanceof",
    }
}

fn precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Lambda { .. } => ASSIGNMENT,
        ExprKind::Conditional { .. } => CONDITIONAL,
        ExprKind::Binary { op, .. } => binary_precedence(*op),
        ExprKind::Unary { op, .. } => match op {
            UnaryOp::PostInc | UnaryOp::PostDec => POSTFIX,
            _ => UNARY,
        },
        ExprKind::Cast { .. } => UNARY,
        ExprKind::Literal {
            value: Literal::Int(value) | Literal::Long(value),
        } if *value < 0 => UNARY,
        _ => PRIMARY,
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, minimum: u8) -> fmt::Result {
    let own = precedence(expr);
    if own < minimum {
        f.write_str("(")?;
        write_bare(f, expr)?;
        return f.write_str(")");
    }
    write_bare(f, expr)
}

fn write_arguments(f: &mut fmt::Formatter<'_>, arguments: &[Expr]) -> fmt::Result {
    for (index, argument) in arguments.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write_expr(f, argument, ASSIGNMENT)?;
    }
    Ok(())
}

fn write_bare(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match &expr.kind {
        ExprKind::Literal { value } => write!(f, "{value}"),
        ExprKind::Local { name } => f.write_str(name),
        ExprKind::Field {
            target,
            owner,
            name,
            is_static,
        } => match target {
            Some(target) => {
                write_expr(f, target, POSTFIX)?;
                write!(f, ".{name}")
            }
            None if *is_static => write!(f, "{}.{name}", simple_name(owner)),
            None => f.write_str(name),
        },
        ExprKind::ArrayRead { target, index } => {
            write_expr(f, target, POSTFIX)?;
            f.write_str("[")?;
            write_expr(f, index, ASSIGNMENT)?;
            f.write_str("]")
        }
        ExprKind::TypeAccess { name } => f.write_str(simple_name(name)),
        ExprKind::This => f.write_str("this"),
        ExprKind::Unary { op, operand } => match op {
            UnaryOp::PostInc | UnaryOp::PostDec => {
                write_expr(f, operand, POSTFIX)?;
                f.write_str(if *op == UnaryOp::PostInc { "++" } else { "--" })
            }
            _ => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                    UnaryOp::BitNot => "~",
                    UnaryOp::PreInc => "++",
                    _ => "--",
                };
                f.write_str(symbol)?;
                write_expr(f, operand, UNARY)
            }
        },
        ExprKind::Binary { op, lhs, rhs } => {
            let own = binary_precedence(*op);
            write_expr(f, lhs, own)?;
            write!(f, " {} ", binary_symbol(*op))?;
            write_expr(f, rhs, own + 1)
        }
        ExprKind::Invocation {
            target,
            name,
            arguments,
            ..
        } => {
            if let Some(target) = target {
                write_expr(f, target, POSTFIX)?;
                f.write_str(".")?;
            }
            write!(f, "{name}(")?;
            write_arguments(f, arguments)?;
            f.write_str(")")
        }
        ExprKind::New {
            class,
            arguments,
            anonymous,
        } => {
            write!(f, "new {}(", simple_name(class))?;
            write_arguments(f, arguments)?;
            f.write_str(")")?;
            if anonymous.is_some() {
                f.write_str(" { ... }")?;
            }
            Ok(())
        }
        ExprKind::NewArray {
            element,
            dimensions,
            elements,
        } => {
            write!(f, "new {}", source_type_name(element))?;
            for dimension in dimensions {
                f.write_str("[")?;
                write_expr(f, dimension, ASSIGNMENT)?;
                f.write_str("]")?;
            }
            if let Some(elements) = elements {
                f.write_str("[] {")?;
                write_arguments(f, elements)?;
                f.write_str("}")?;
            }
            Ok(())
        }
        ExprKind::Lambda {
            parameters, body, ..
        } => {
            match parameters.as_slice() {
                [single] => f.write_str(single)?,
                parameters => write!(f, "({})", parameters.join(", "))?,
            }
            f.write_str(" -> ")?;
            match body {
                LambdaBody::Expression(expr) => write_expr(f, expr, ASSIGNMENT),
                LambdaBody::Block(_) => f.write_str("{ ... }"),
            }
        }
        ExprKind::Conditional {
            condition,
            then,
            otherwise,
        } => {
            write_expr(f, condition, CONDITIONAL + 1)?;
            f.write_str(" ? ")?;
            write_expr(f, then, CONDITIONAL + 1)?;
            f.write_str(" : ")?;
            write_expr(f, otherwise, CONDITIONAL)
        }
        ExprKind::Cast { to, operand } => {
            write!(f, "({}) ", source_type_name(to))?;
            write_expr(f, operand, UNARY)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_harness::{binary, field_of, int, local, static_field, string};
    use crate::ir::{BinaryOp, Literal};

    #[test]
    fn prints_precedence_parentheses_only_when_needed() {
        let sum = binary(BinaryOp::Plus, local("a", "I"), local("b", "I"), "I");
        let product = binary(BinaryOp::Mul, sum.clone(), int(2), "I");
        let right_nested = binary(BinaryOp::Minus, local("a", "I"), sum, "I");

        assert_eq!(product.to_string(), "(a + b) * 2");
        assert_eq!(right_nested.to_string(), "a - (a + b)");
    }

    #[test]
    fn prints_fields_and_literals_as_java() {
        let length = field_of(local("values", "[I"), "length", "I");
        let constant = static_field("com/example/Limits", "MAX", "I");

        assert_eq!(length.to_string(), "values.length");
        assert_eq!(constant.to_string(), "Limits.MAX");
        assert_eq!(string("say \"hi\"\n").to_string(), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(Literal::Long(3).to_string(), "3L");
        assert_eq!(Literal::Float(1.0).to_string(), "1.0f");
        assert_eq!(Literal::Char('\'').to_string(), "'\\''");
    }
}
