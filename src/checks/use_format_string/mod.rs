use anyhow::Result;
use opentelemetry::KeyValue;

use crate::checks::{Check, CheckMetadata, Reporter};
use crate::descriptor::{STRING, STRING_BUILDER, format_placeholder};
use crate::engine::AnalysisContext;
use crate::ir::{BinaryOp, Expr, ExprKind, Literal, Model};
use crate::printer::escape_java;
use crate::problem::{Message, ProblemType};
use crate::query::{resolve_constant, string_value};
use crate::visit::{Node, NodeCategory, walk};

const MIN_OPERANDS: usize = 3;
const MIN_LITERALS: usize = 2;

/// Check that suggests format strings for long concatenations and append chains.
#[derive(Default)]
pub(crate) struct UseFormatStringCheck {
    reported: bool,
}

crate::register_check!(UseFormatStringCheck);

impl Check for UseFormatStringCheck {
    fn metadata(&self) -> CheckMetadata {
        CheckMetadata {
            id: "USE_FORMAT_STRING",
            name: "Concatenation could be a format string",
            description: "String concatenations mixing several literals and values read better as String.formatted",
            problem_types: &[ProblemType::UseFormatString],
            maximum_problems: Some(1),
        }
    }

    fn run(&mut self, context: &AnalysisContext, reporter: &mut Reporter) -> Result<()> {
        self.reported = false;
        let model = context.model();
        context.with_span(
            "check.expressions",
            &[KeyValue::new("autograde.category", "expression")],
            || {
                walk(model, &[NodeCategory::Expression], |cursor, node| {
                    if self.reported {
                        return Ok(());
                    }
                    let Some(expr) = node.as_expr() else {
                        return Ok(());
                    };
                    let formatted = match &expr.kind {
                        ExprKind::Binary { .. } => {
                            let nested = cursor.has_ancestor(|ancestor| {
                                matches!(
                                    ancestor,
                                    Node::Expr(Expr {
                                        kind: ExprKind::Binary { .. },
                                        ..
                                    })
                                )
                            });
                            if nested {
                                None
                            } else {
                                concatenation_suggestion(model, expr)
                            }
                        }
                        ExprKind::Invocation { .. } => {
                            let nested = cursor.has_ancestor(|ancestor| {
                                matches!(
                                    ancestor,
                                    Node::Expr(Expr {
                                        kind: ExprKind::Invocation { .. },
                                        ..
                                    })
                                )
                            });
                            if nested {
                                None
                            } else {
                                append_chain_suggestion(model, expr)
                            }
                        }
                        _ => None,
                    };
                    if let Some(formatted) = formatted {
                        self.reported = reporter.emit(
                            cursor,
                            node,
                            Message::new("use-format-string").with("formatted", formatted),
                            ProblemType::UseFormatString,
                        );
                    }
                    Ok(())
                })
            },
        )
    }
}

fn is_concatenation(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Binary {
            op: BinaryOp::Plus,
            ..
        }
    ) && expr.static_type() == Some(STRING)
}

/// `"a" + b + "c"` as `"a%sc".formatted(b)`.
fn concatenation_suggestion(model: &Model, expr: &Expr) -> Option<String> {
    if !is_concatenation(expr) {
        return None;
    }
    let mut operands = Vec::new();
    let mut left = expr;
    while is_concatenation(left) {
        let ExprKind::Binary { lhs, rhs, .. } = &left.kind else {
            break;
        };
        operands.push(rhs.as_ref());
        left = lhs;
    }
    operands.push(left);
    operands.reverse();

    let literals = operands
        .iter()
        .filter(|operand| {
            resolve_constant(model, operand).is_some_and(|value| value != Literal::Null)
        })
        .count();
    if literals < MIN_LITERALS {
        return None;
    }
    formatted_string(model, &operands)
}

/// `sb.append("a").append(b)` as `sb.append("a%s".formatted(b))`.
fn append_chain_suggestion(model: &Model, expr: &Expr) -> Option<String> {
    if expr.static_type() != Some(STRING_BUILDER) {
        return None;
    }
    let mut operands = Vec::new();
    let mut current = expr;
    let builder = loop {
        let ExprKind::Invocation {
            target,
            name,
            arguments,
            ..
        } = &current.kind
        else {
            return None;
        };
        let ([argument], "append") = (arguments.as_slice(), name.as_str()) else {
            return None;
        };
        operands.push(argument);
        let target = target.as_deref()?;
        match &target.kind {
            ExprKind::Invocation { .. } => current = target,
            _ if target.static_type() == Some(STRING_BUILDER) => break target,
            _ => return None,
        }
    };
    operands.reverse();
    let formatted = formatted_string(model, &operands)?;
    Some(format!("{builder}.append({formatted})"))
}

/// Operand after newline normalization.
enum Part<'e> {
    Text(String),
    Value(&'e Expr),
}

fn normalize<'e>(model: &Model, expr: &'e Expr) -> Part<'e> {
    if is_line_separator(expr) {
        return Part::Text("\n".to_string());
    }
    match resolve_constant(model, expr) {
        Some(Literal::Char('\n')) => Part::Text("\n".to_string()),
        Some(Literal::String(value)) => Part::Text(value),
        _ => Part::Value(expr),
    }
}

fn is_line_separator(expr: &Expr) -> bool {
    matches!(
        &expr.kind,
        ExprKind::Invocation { target: Some(target), name, descriptor, arguments, .. }
            if name == "lineSeparator"
                && descriptor == "()Ljava/lang/String;"
                && arguments.is_empty()
                && matches!(
                    &target.kind,
                    ExprKind::TypeAccess { name } if name == "java/lang/System"
                )
    )
}

fn formatted_string(model: &Model, operands: &[&Expr]) -> Option<String> {
    if operands.len() < MIN_OPERANDS {
        return None;
    }
    let mut format = String::new();
    let mut arguments = Vec::new();
    for operand in operands {
        match normalize(model, operand) {
            Part::Text(value) => {
                if value == "\n" {
                    format.push_str("%n");
                } else {
                    format.push_str(&value.replace('%', "%%"));
                }
                // likely building a format string already
                if value.ends_with('%') {
                    return None;
                }
            }
            Part::Value(Expr {
                kind: ExprKind::Literal { value },
                ..
            }) => format.push_str(&string_value(value).replace('%', "%%")),
            Part::Value(expr) => {
                format.push_str(format_placeholder(expr.static_type().unwrap_or(STRING)));
                arguments.push(expr.to_string());
            }
        }
    }
    if arguments.is_empty() {
        return None;
    }
    Some(format!(
        "\"{}\".formatted({})",
        escape_java(&format, '"'),
        arguments.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Problem;
    use crate::test_harness::{
        char_lit, class, expr_stmt, final_field, int, invoke, local, method, model, run_check,
        source_file, span, static_field, string, type_access,
    };

    fn concat(parts: Vec<Expr>) -> Expr {
        let mut parts = parts.into_iter();
        let first = parts.next().expect("at least one operand");
        parts.fold(first, |lhs, rhs| {
            crate::test_harness::binary(BinaryOp::Plus, lhs, rhs, STRING)
        })
    }

    fn append(target: Expr, argument: Expr) -> Expr {
        invoke(
            Some(target),
            "java/lang/StringBuilder",
            "append",
            "(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
            vec![argument],
            STRING_BUILDER,
        )
    }

    fn analyze(statements: Vec<Expr>) -> Vec<Problem> {
        let body = statements
            .into_iter()
            .enumerate()
            .map(|(line, expr)| {
                let mut stmt = expr_stmt(expr);
                stmt.span = Some(span(10 + line as u32, 10 + line as u32));
                stmt
            })
            .collect();
        let model = model(vec![source_file(
            "Greeter.java",
            vec![
                class("Greeter")
                    .field(final_field("PREFIX", STRING, Some(string("id-"))))
                    .method(method("greet", "(Ljava/lang/String;I)V").body(body))
                    .build(),
            ],
        )]);
        run_check(UseFormatStringCheck::default(), model)
    }

    fn formatted(problems: &[Problem]) -> Vec<String> {
        problems
            .iter()
            .filter_map(|problem| problem.message().param("formatted").map(str::to_string))
            .collect()
    }

    #[test]
    fn concatenation_with_two_literals_is_reported() {
        let problems = analyze(vec![concat(vec![
            string("a"),
            local("b", STRING),
            string("c"),
            local("d", "I"),
        ])]);

        assert_eq!(formatted(&problems), vec!["\"a%sc%d\".formatted(b, d)"]);
        assert_eq!(problems[0].message().key(), "use-format-string");
        assert_eq!(problems[0].display_location(), "Greeter.java:10");
    }

    #[test]
    fn short_concatenation_is_not_reported() {
        assert!(analyze(vec![concat(vec![string("a"), local("b", STRING)])]).is_empty());
    }

    #[test]
    fn repeated_pattern_is_reported_once() {
        let statements = (0..5)
            .map(|_| concat(vec![string("a"), local("b", STRING), string("c"), local("d", "I")]))
            .collect();

        let problems = analyze(statements);

        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].display_location(), "Greeter.java:10");
    }

    #[test]
    fn line_separators_become_newline_placeholders() {
        let separator = invoke(
            Some(type_access("java/lang/System")),
            "java/lang/System",
            "lineSeparator",
            "()Ljava/lang/String;",
            Vec::new(),
            STRING,
        );
        let problems = analyze(vec![concat(vec![
            string("x="),
            local("x", "D"),
            separator,
            local("y", "Z"),
            char_lit('\n'),
        ])]);

        assert_eq!(formatted(&problems), vec!["\"x=%f%n%b%n\".formatted(x, y)"]);
    }

    #[test]
    fn constants_fold_into_the_format_and_literals_inline() {
        let problems = analyze(vec![concat(vec![
            static_field("Greeter", "PREFIX", STRING),
            local("name", STRING),
            string(" #"),
            int(1),
        ])]);

        assert_eq!(formatted(&problems), vec!["\"id-%s #1\".formatted(name)"]);
    }

    #[test]
    fn trailing_percent_and_literal_only_chains_are_not_reported() {
        let problems = analyze(vec![
            concat(vec![string("50%"), local("x", "I"), string("b")]),
            concat(vec![string("a"), string("b"), string("c")]),
        ]);

        assert!(problems.is_empty());
    }

    #[test]
    fn append_chain_suggests_single_append() {
        let chain = append(
            append(append(local("sb", STRING_BUILDER), string("a")), local("n", "I")),
            string("b\"q"),
        );

        let problems = analyze(vec![chain]);

        assert_eq!(
            formatted(&problems),
            vec!["sb.append(\"a%db\\\"q\".formatted(n))"]
        );
    }

    #[test]
    fn append_chain_needs_three_operands_but_one_literal() {
        let chain = append(
            append(append(local("sb", STRING_BUILDER), local("a", STRING)), local("b", "I")),
            string("c"),
        );

        let problems = analyze(vec![chain]);

        assert_eq!(
            formatted(&problems),
            vec!["sb.append(\"%s%dc\".formatted(a, b))"]
        );
    }

    #[test]
    fn finding_without_position_does_not_stop_the_search() {
        let chain = || concat(vec![string("a"), local("b", STRING), string("c")]);
        let mut unpositioned = class("Unpositioned")
            .method(method("run", "()V").body(vec![expr_stmt(chain())]))
            .build();
        unpositioned.span = None;
        let positioned = class("Positioned")
            .span(span(3, 8))
            .method(method("run", "()V").body(vec![expr_stmt(chain())]))
            .build();
        let model = model(vec![source_file("Chains.java", vec![unpositioned, positioned])]);

        let problems = run_check(UseFormatStringCheck::default(), model);

        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].display_location(), "Chains.java:3-8");
    }

    #[test]
    fn append_chain_ending_in_other_call_is_not_reported() {
        let chain = append(append(local("sb", STRING_BUILDER), string("a")), local("n", "I"));
        let to_string = invoke(
            Some(append(chain, string("b"))),
            "java/lang/StringBuilder",
            "toString",
            "()Ljava/lang/String;",
            Vec::new(),
            STRING,
        );

        assert!(analyze(vec![to_string]).is_empty());
    }
}
