//! Programmatic model builders for unit tests.

use std::fs;

use anyhow::{Context, Result};

use crate::checks::Check;
use crate::engine::{Engine, EngineOutput, build_context, run_checks};
use crate::ir::{
    BinaryOp, EnumValue, Expr, ExprKind, Field, FieldModifiers, LambdaBody, LambdaId, Literal,
    Method, MethodModifiers, MethodRef, Model, SourceFile, Span, Stmt, StmtKind, TypeDecl, TypeKind,
    UnaryOp, Visibility,
};
use crate::problem::Problem;
use crate::scan::scan_input;

pub(crate) fn span(start_line: u32, end_line: u32) -> Span {
    Span {
        start_line,
        end_line: Some(end_line),
    }
}

/// Builder for a type declaration.
pub(crate) struct TypeBuilder {
    decl: TypeDecl,
}

impl TypeBuilder {
    fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            decl: TypeDecl {
                name: name.to_string(),
                kind,
                superclass: None,
                interfaces: Vec::new(),
                outer: None,
                is_abstract: false,
                fields: Vec::new(),
                methods: Vec::new(),
                enum_values: Vec::new(),
                span: Some(Span {
                    start_line: 1,
                    end_line: None,
                }),
            },
        }
    }

    pub(crate) fn extends(mut self, superclass: &str) -> Self {
        self.decl.superclass = Some(superclass.to_string());
        self
    }

    pub(crate) fn implements(mut self, interface: &str) -> Self {
        self.decl.interfaces.push(interface.to_string());
        self
    }

    pub(crate) fn outer(mut self, outer: &str) -> Self {
        self.decl.outer = Some(outer.to_string());
        self
    }

    pub(crate) fn is_abstract(mut self) -> Self {
        self.decl.is_abstract = true;
        self
    }

    pub(crate) fn field(mut self, field: Field) -> Self {
        self.decl.fields.push(field);
        self
    }

    pub(crate) fn method(mut self, method: MethodBuilder) -> Self {
        self.decl.methods.push(method.build());
        self
    }

    pub(crate) fn enum_value(mut self, value: EnumValue) -> Self {
        self.decl.enum_values.push(value);
        self
    }

    pub(crate) fn span(mut self, span: Span) -> Self {
        self.decl.span = Some(span);
        self
    }

    pub(crate) fn build(self) -> TypeDecl {
        self.decl
    }
}

pub(crate) fn class(name: &str) -> TypeBuilder {
    TypeBuilder::new(name, TypeKind::Class)
}

pub(crate) fn interface(name: &str) -> TypeBuilder {
    TypeBuilder::new(name, TypeKind::Interface)
}

pub(crate) fn enum_type(name: &str) -> TypeBuilder {
    TypeBuilder::new(name, TypeKind::Enum).extends("java/lang/Enum")
}

/// Anonymous class body declared inside `outer`, extending or implementing `supertype`.
pub(crate) fn anonymous_type(name: &str, outer: &str, supertype: &str) -> TypeBuilder {
    TypeBuilder::new(name, TypeKind::Anonymous)
        .outer(outer)
        .extends(supertype)
}

/// Builder for a method; public, non-static and bodiless by default.
pub(crate) struct MethodBuilder {
    method: Method,
}

impl MethodBuilder {
    pub(crate) fn body(mut self, body: Vec<Stmt>) -> Self {
        self.method.body = Some(body);
        self
    }

    pub(crate) fn span(mut self, span: Span) -> Self {
        self.method.span = Some(span);
        self
    }

    pub(crate) fn is_static(mut self) -> Self {
        self.method.modifiers.is_static = true;
        self
    }

    pub(crate) fn is_default(mut self) -> Self {
        self.method.modifiers.is_default = true;
        self.method.body.get_or_insert_with(Vec::new);
        self
    }

    pub(crate) fn private(mut self) -> Self {
        self.method.modifiers.visibility = Visibility::Private;
        self
    }

    pub(crate) fn package_private(mut self) -> Self {
        self.method.modifiers.visibility = Visibility::Package;
        self
    }

    pub(crate) fn annotated(mut self, annotation: &str) -> Self {
        self.method.annotations.push(annotation.to_string());
        self
    }

    pub(crate) fn implicit(mut self) -> Self {
        self.method.implicit = true;
        self
    }

    fn build(self) -> Method {
        self.method
    }
}

pub(crate) fn method(name: &str, descriptor: &str) -> MethodBuilder {
    MethodBuilder {
        method: Method {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            modifiers: MethodModifiers::default(),
            annotations: Vec::new(),
            parameters: Vec::new(),
            implicit: false,
            body: None,
            span: None,
        },
    }
}

/// Public static field without initializer.
pub(crate) fn field(name: &str, descriptor: &str) -> Field {
    Field {
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        modifiers: FieldModifiers {
            is_static: true,
            is_final: false,
            visibility: Visibility::Public,
        },
        initializer: None,
        span: None,
    }
}

/// Public static final field.
pub(crate) fn final_field(name: &str, descriptor: &str, initializer: Option<Expr>) -> Field {
    let mut field = field(name, descriptor);
    field.modifiers.is_final = true;
    field.initializer = initializer;
    field
}

pub(crate) fn instance(mut field: Field) -> Field {
    field.modifiers.is_static = false;
    field
}

pub(crate) fn private(mut field: Field) -> Field {
    field.modifiers.visibility = Visibility::Private;
    field
}

pub(crate) fn enum_value(name: &str, arguments: Vec<Expr>) -> EnumValue {
    EnumValue {
        name: name.to_string(),
        arguments,
        span: None,
    }
}

pub(crate) fn source_file(path: &str, types: Vec<TypeDecl>) -> SourceFile {
    SourceFile {
        path: path.to_string(),
        types,
    }
}

pub(crate) fn model(files: Vec<SourceFile>) -> Model {
    Model::from_files(files).expect("index model")
}

fn expr(kind: ExprKind, ty: Option<&str>) -> Expr {
    Expr {
        kind,
        ty: ty.map(str::to_string),
        span: None,
    }
}

fn object(class: &str) -> String {
    format!("L{class};")
}

fn literal(value: Literal) -> Expr {
    expr(ExprKind::Literal { value }, None)
}

pub(crate) fn int(value: i64) -> Expr {
    literal(Literal::Int(value))
}

pub(crate) fn string(value: &str) -> Expr {
    literal(Literal::String(value.to_string()))
}

pub(crate) fn char_lit(value: char) -> Expr {
    literal(Literal::Char(value))
}

pub(crate) fn local(name: &str, ty: &str) -> Expr {
    expr(
        ExprKind::Local {
            name: name.to_string(),
        },
        Some(ty),
    )
}

/// Instance field read such as `values.length`.
pub(crate) fn field_of(target: Expr, name: &str, ty: &str) -> Expr {
    let owner = target
        .static_type()
        .and_then(crate::descriptor::class_name)
        .unwrap_or_default();
    expr(
        ExprKind::Field {
            target: Some(Box::new(target)),
            owner,
            name: name.to_string(),
            is_static: false,
        },
        Some(ty),
    )
}

/// Unqualified static field read.
pub(crate) fn static_field(owner: &str, name: &str, ty: &str) -> Expr {
    expr(
        ExprKind::Field {
            target: None,
            owner: owner.to_string(),
            name: name.to_string(),
            is_static: true,
        },
        Some(ty),
    )
}

pub(crate) fn array_read(target: Expr, index: Expr, ty: &str) -> Expr {
    expr(
        ExprKind::ArrayRead {
            target: Box::new(target),
            index: Box::new(index),
        },
        Some(ty),
    )
}

pub(crate) fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: &str) -> Expr {
    expr(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        Some(ty),
    )
}

pub(crate) fn post_inc(operand: Expr) -> Expr {
    let ty = operand.ty.clone();
    Expr {
        kind: ExprKind::Unary {
            op: UnaryOp::PostInc,
            operand: Box::new(operand),
        },
        ty,
        span: None,
    }
}

pub(crate) fn invoke(
    target: Option<Expr>,
    owner: &str,
    name: &str,
    descriptor: &str,
    arguments: Vec<Expr>,
    ty: &str,
) -> Expr {
    expr(
        ExprKind::Invocation {
            target: target.map(Box::new),
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            arguments,
        },
        Some(ty),
    )
}

pub(crate) fn type_access(name: &str) -> Expr {
    expr(
        ExprKind::TypeAccess {
            name: name.to_string(),
        },
        Some(object(name).as_str()),
    )
}

pub(crate) fn new_object(class: &str, arguments: Vec<Expr>) -> Expr {
    expr(
        ExprKind::New {
            class: class.to_string(),
            arguments,
            anonymous: None,
        },
        Some(object(class).as_str()),
    )
}

pub(crate) fn new_anonymous(class: &str, anonymous: &str) -> Expr {
    expr(
        ExprKind::New {
            class: class.to_string(),
            arguments: Vec::new(),
            anonymous: Some(anonymous.to_string()),
        },
        Some(object(class).as_str()),
    )
}

/// Lambda with an empty block body, bound to `target` by its abstract method.
pub(crate) fn lambda(target: &str, parameters: &[&str]) -> Expr {
    expr(
        ExprKind::Lambda {
            target: target.to_string(),
            method: None,
            parameters: parameters.iter().map(|name| name.to_string()).collect(),
            body: LambdaBody::Block(Vec::new()),
            id: LambdaId::default(),
        },
        Some(object(target).as_str()),
    )
}

/// Lambda bound to the interface method the model names explicitly.
pub(crate) fn bound_lambda(target: &str, name: &str, descriptor: &str) -> Expr {
    let mut expr = lambda(target, &[]);
    if let ExprKind::Lambda { method, .. } = &mut expr.kind {
        *method = Some(MethodRef {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
    }
    expr
}

fn stmt(kind: StmtKind) -> Stmt {
    Stmt {
        kind,
        implicit: false,
        span: None,
    }
}

pub(crate) fn expr_stmt(expr: Expr) -> Stmt {
    stmt(StmtKind::Expression { expr })
}

pub(crate) fn local_decl(name: &str, descriptor: &str, initializer: Expr) -> Stmt {
    stmt(StmtKind::Local {
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        initializer: Some(initializer),
    })
}

pub(crate) fn assign(target: Expr, value: Expr) -> Stmt {
    stmt(StmtKind::Assign {
        target,
        op: None,
        value,
    })
}

pub(crate) fn compound_assign(target: Expr, op: BinaryOp, value: Expr) -> Stmt {
    stmt(StmtKind::Assign {
        target,
        op: Some(op),
        value,
    })
}

pub(crate) fn block(statements: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Block { statements })
}

pub(crate) fn for_loop(init: Stmt, condition: Expr, update: Stmt, body: Stmt) -> Stmt {
    stmt(StmtKind::For {
        init: vec![init],
        condition: Some(condition),
        update: vec![update],
        body: Box::new(body),
    })
}

/// Run a single check against `model`.
pub(crate) fn run_check<C: Check + 'static>(check: C, model: Model) -> Vec<Problem> {
    run_checks(model, vec![Box::new(check)]).expect("run check")
}

/// Write `model` as JSON to a temporary file, then load and analyze it with
/// every registered check.
pub(crate) fn analyze_json(model: &serde_json::Value) -> Result<EngineOutput> {
    let temp_dir = tempfile::tempdir().context("create temp dir")?;
    let path = temp_dir.path().join("model.json");
    fs::write(&path, serde_json::to_vec_pretty(model)?).context("write model")?;
    let scan = scan_input(&path, None).context("scan model")?;
    let context = build_context(scan.model);
    Engine::new().analyze(&context).context("run analysis")
}
