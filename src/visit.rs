use anyhow::Result;

use crate::ir::{
    EnumValue, Expr, ExprKind, Field, FileId, LambdaBody, Method, MethodId, Model, Span, Stmt,
    StmtKind, TypeDecl, TypeId,
};
use crate::problem::CodePosition;

/// Node categories a check can subscribe to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) enum NodeCategory {
    Type,
    Method,
    Field,
    Loop,
    Statement,
    Expression,
    Lambda,
}

/// A borrowed node of the semantic model.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Node<'m> {
    Type(TypeId, &'m TypeDecl),
    Method(MethodId, &'m Method),
    Field(TypeId, &'m Field),
    EnumValue(TypeId, &'m EnumValue),
    Stmt(&'m Stmt),
    Expr(&'m Expr),
}

impl<'m> Node<'m> {
    pub(crate) fn span(&self) -> Option<Span> {
        match self {
            Node::Type(_, decl) => decl.span,
            Node::Method(_, method) => method.span,
            Node::Field(_, field) => field.span,
            Node::EnumValue(_, value) => value.span,
            Node::Stmt(stmt) => stmt.span,
            Node::Expr(expr) => expr.span,
        }
    }

    pub(crate) fn is_in(&self, category: NodeCategory) -> bool {
        match (self, category) {
            (Node::Type(..), NodeCategory::Type)
            | (Node::Method(..), NodeCategory::Method)
            | (Node::Field(..), NodeCategory::Field)
            | (Node::Stmt(_), NodeCategory::Statement)
            | (Node::Expr(_), NodeCategory::Expression) => true,
            (Node::Stmt(stmt), NodeCategory::Loop) => stmt.is_loop(),
            (Node::Expr(expr), NodeCategory::Lambda) => {
                matches!(expr.kind, ExprKind::Lambda { .. })
            }
            _ => false,
        }
    }

    pub(crate) fn as_expr(&self) -> Option<&'m Expr> {
        match self {
            Node::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub(crate) fn as_stmt(&self) -> Option<&'m Stmt> {
        match self {
            Node::Stmt(stmt) => Some(stmt),
            _ => None,
        }
    }

    /// Direct children in source order. Anonymous class bodies are only
    /// reachable through `model`.
    fn children(self, model: Option<&'m Model>) -> Vec<Node<'m>> {
        let mut children = Vec::new();
        match self {
            Node::Type(id, decl) => {
                children.extend(decl.fields.iter().map(|field| Node::Field(id, field)));
                children.extend(decl.enum_values.iter().map(|value| Node::EnumValue(id, value)));
                children.extend(
                    decl.methods
                        .iter()
                        .enumerate()
                        .map(|(index, method)| Node::Method(MethodId { ty: id, index }, method)),
                );
                if let Some(model) = model {
                    children.extend(
                        model
                            .nested_types(id)
                            .iter()
                            .map(|nested| Node::Type(*nested, model.type_decl(*nested))),
                    );
                }
            }
            Node::Method(_, method) => {
                if let Some(body) = &method.body {
                    children.extend(body.iter().map(Node::Stmt));
                }
            }
            Node::Field(_, field) => {
                children.extend(field.initializer.iter().map(Node::Expr));
            }
            Node::EnumValue(_, value) => {
                children.extend(value.arguments.iter().map(Node::Expr));
            }
            Node::Stmt(stmt) => stmt_children(stmt, &mut children),
            Node::Expr(expr) => expr_children(expr, model, &mut children),
        }
        children
    }
}

fn stmt_children<'m>(stmt: &'m Stmt, children: &mut Vec<Node<'m>>) {
    match &stmt.kind {
        StmtKind::Local { initializer, .. } => children.extend(initializer.iter().map(Node::Expr)),
        StmtKind::Assign { target, value, .. } => {
            children.push(Node::Expr(target));
            children.push(Node::Expr(value));
        }
        StmtKind::Expression { expr } => children.push(Node::Expr(expr)),
        StmtKind::Block { statements } => children.extend(statements.iter().map(Node::Stmt)),
        StmtKind::If {
            condition,
            then,
            otherwise,
        } => {
            children.push(Node::Expr(condition));
            children.push(Node::Stmt(then));
            children.extend(otherwise.iter().map(|stmt| Node::Stmt(stmt)));
        }
        StmtKind::For {
            init,
            condition,
            update,
            body,
        } => {
            children.extend(init.iter().map(Node::Stmt));
            children.extend(condition.iter().map(Node::Expr));
            children.extend(update.iter().map(Node::Stmt));
            children.push(Node::Stmt(body));
        }
        StmtKind::ForEach { iterable, body, .. } => {
            children.push(Node::Expr(iterable));
            children.push(Node::Stmt(body));
        }
        StmtKind::While { condition, body } => {
            children.push(Node::Expr(condition));
            children.push(Node::Stmt(body));
        }
        StmtKind::Return { value } => children.extend(value.iter().map(Node::Expr)),
        StmtKind::Empty => {}
    }
}

fn expr_children<'m>(expr: &'m Expr, model: Option<&'m Model>, children: &mut Vec<Node<'m>>) {
    match &expr.kind {
        ExprKind::Literal { .. }
        | ExprKind::Local { .. }
        | ExprKind::TypeAccess { .. }
        | ExprKind::This => {}
        ExprKind::Field { target, .. } => {
            children.extend(target.iter().map(|expr| Node::Expr(expr)))
        }
        ExprKind::ArrayRead { target, index } => {
            children.push(Node::Expr(target));
            children.push(Node::Expr(index));
        }
        ExprKind::Unary { operand, .. } => children.push(Node::Expr(operand)),
        ExprKind::Binary { lhs, rhs, .. } => {
            children.push(Node::Expr(lhs));
            children.push(Node::Expr(rhs));
        }
        ExprKind::Invocation {
            target, arguments, ..
        } => {
            children.extend(target.iter().map(|expr| Node::Expr(expr)));
            children.extend(arguments.iter().map(Node::Expr));
        }
        ExprKind::New {
            arguments,
            anonymous,
            ..
        } => {
            children.extend(arguments.iter().map(Node::Expr));
            let body = model.zip(anonymous.as_deref()).and_then(|(model, name)| {
                model
                    .type_named(name)
                    .map(|id| Node::Type(id, model.type_decl(id)))
            });
            children.extend(body);
        }
        ExprKind::NewArray {
            dimensions,
            elements,
            ..
        } => {
            children.extend(dimensions.iter().map(Node::Expr));
            children.extend(elements.iter().flatten().map(Node::Expr));
        }
        ExprKind::Lambda { body, .. } => match body {
            LambdaBody::Expression(expr) => children.push(Node::Expr(expr)),
            LambdaBody::Block(statements) => children.extend(statements.iter().map(Node::Stmt)),
        },
        ExprKind::Conditional {
            condition,
            then,
            otherwise,
        } => {
            children.push(Node::Expr(condition));
            children.push(Node::Expr(then));
            children.push(Node::Expr(otherwise));
        }
        ExprKind::Cast { operand, .. } => children.push(Node::Expr(operand)),
    }
}

/// Position of the traversal: the chain of ancestors of the current node,
/// outermost first.
pub(crate) struct Cursor<'m> {
    model: &'m Model,
    ancestors: Vec<Node<'m>>,
}

impl<'m> Cursor<'m> {
    pub(crate) fn new(model: &'m Model) -> Self {
        Self {
            model,
            ancestors: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn ancestors(&self) -> &[Node<'m>] {
        &self.ancestors
    }

    #[cfg(test)]
    pub(crate) fn parent(&self) -> Option<Node<'m>> {
        self.ancestors.last().copied()
    }

    pub(crate) fn has_ancestor(&self, mut predicate: impl FnMut(&Node<'m>) -> bool) -> bool {
        self.ancestors.iter().any(|node| predicate(node))
    }

    pub(crate) fn enclosing_type(&self) -> Option<TypeId> {
        self.ancestors.iter().rev().find_map(|node| match node {
            Node::Type(id, _) => Some(*id),
            _ => None,
        })
    }

    #[cfg(test)]
    pub(crate) fn enclosing_method(&self) -> Option<MethodId> {
        self.ancestors.iter().rev().find_map(|node| match node {
            Node::Method(id, _) => Some(*id),
            _ => None,
        })
    }

    pub(crate) fn file(&self) -> Option<FileId> {
        self.enclosing_type().map(|id| self.model.file_of(id))
    }

    /// Source position of `node`, falling back to the nearest ancestor with a
    /// span. Types are positioned in their own file.
    pub(crate) fn position(&self, node: Node<'m>) -> Option<CodePosition> {
        let span = node
            .span()
            .or_else(|| self.ancestors.iter().rev().find_map(Node::span))?;
        let file = match node {
            Node::Type(id, _) => self.model.file_of(id),
            _ => self.file()?,
        };
        Some(CodePosition {
            file: self.model.file(file).path.clone(),
            start_line: span.start_line,
            end_line: span.end(),
        })
    }
}

/// Full pre-order traversal invoking `callback` for every node in one of
/// `categories`. Anonymous classes are visited where they are instantiated.
pub(crate) fn walk<'m, F>(
    model: &'m Model,
    categories: &[NodeCategory],
    mut callback: F,
) -> Result<()>
where
    F: FnMut(&Cursor<'m>, Node<'m>) -> Result<()>,
{
    let mut cursor = Cursor::new(model);
    for file in model.file_ids() {
        for id in model.types_in(file) {
            if !is_root(model, id) {
                continue;
            }
            visit(
                model,
                categories,
                &mut cursor,
                Node::Type(id, model.type_decl(id)),
                &mut callback,
            )?;
        }
    }
    Ok(())
}

/// Instantiated anonymous types are entered from their single `new` site.
fn is_root(model: &Model, id: TypeId) -> bool {
    if model.type_decl(id).is_anonymous() {
        return !model.is_instantiated_anonymous(id);
    }
    model.outer_type(id).is_none()
}

fn visit<'m, F>(
    model: &'m Model,
    categories: &[NodeCategory],
    cursor: &mut Cursor<'m>,
    node: Node<'m>,
    callback: &mut F,
) -> Result<()>
where
    F: FnMut(&Cursor<'m>, Node<'m>) -> Result<()>,
{
    if categories.iter().any(|category| node.is_in(*category)) {
        callback(cursor, node)?;
    }
    cursor.ancestors.push(node);
    let result = node
        .children(Some(model))
        .into_iter()
        .try_for_each(|child| visit(model, categories, cursor, child, callback));
    cursor.ancestors.pop();
    result
}

/// Whether `predicate` holds for `node` or any statement or expression below
/// it. Anonymous class bodies are not entered.
pub(crate) fn any_node<'m>(node: Node<'m>, predicate: &mut dyn FnMut(Node<'m>) -> bool) -> bool {
    if predicate(node) {
        return true;
    }
    node.children(None)
        .into_iter()
        .any(|child| any_node(child, predicate))
}
