use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail};
use serde::Deserialize;

/// Index of a type declaration in an indexed [`Model`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct TypeId(pub(crate) usize);

/// Index of a source file in a [`Model`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct FileId(pub(crate) usize);

/// Index of a lambda expression, assigned in pre-order while indexing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct LambdaId(pub(crate) usize);

/// A method declared by a type, addressed by its position in the type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct MethodId {
    pub(crate) ty: TypeId,
    pub(crate) index: usize,
}

/// Line range in a source file. A missing end line means a single line.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct Span {
    pub(crate) start_line: u32,
    #[serde(default)]
    pub(crate) end_line: Option<u32>,
}

impl Span {
    pub(crate) fn end(&self) -> u32 {
        self.end_line.unwrap_or(self.start_line)
    }
}

/// Resolved program snapshot: every type of every analyzed source file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Model {
    pub(crate) files: Vec<SourceFile>,
    #[serde(skip)]
    index: ModelIndex,
}

/// A source file and the types compiled from it, nested ones included.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SourceFile {
    pub(crate) path: String,
    #[serde(default)]
    pub(crate) types: Vec<TypeDecl>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Anonymous,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Visibility {
    #[default]
    Public,
    Protected,
    Package,
    Private,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TypeDecl {
    /// JVM internal name, e.g. `com/example/Main` or `com/example/Main$1`.
    pub(crate) name: String,
    pub(crate) kind: TypeKind,
    #[serde(default)]
    pub(crate) superclass: Option<String>,
    #[serde(default)]
    pub(crate) interfaces: Vec<String>,
    /// Enclosing type for nested, local and anonymous types.
    #[serde(default)]
    pub(crate) outer: Option<String>,
    #[serde(default, rename = "abstract")]
    pub(crate) is_abstract: bool,
    #[serde(default)]
    pub(crate) fields: Vec<Field>,
    #[serde(default)]
    pub(crate) methods: Vec<Method>,
    #[serde(default)]
    pub(crate) enum_values: Vec<EnumValue>,
    #[serde(default)]
    pub(crate) span: Option<Span>,
}

impl TypeDecl {
    pub(crate) fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub(crate) fn is_anonymous(&self) -> bool {
        self.kind == TypeKind::Anonymous
    }

    /// Package part of the internal name, empty for the default package.
    pub(crate) fn package(&self) -> &str {
        self.name.rsplit_once('/').map_or("", |(package, _)| package)
    }

    /// Superclass other than the implicit `java/lang/Object`.
    pub(crate) fn explicit_superclass(&self) -> Option<&str> {
        self.superclass
            .as_deref()
            .filter(|name| *name != "java/lang/Object")
    }

    /// Methods written in source: no constructors, initializers or implicit members.
    pub(crate) fn declared_methods(&self) -> impl Iterator<Item = &Method> {
        self.methods
            .iter()
            .filter(|method| !method.implicit && !method.is_constructor())
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MethodModifiers {
    #[serde(default, rename = "static")]
    pub(crate) is_static: bool,
    #[serde(default, rename = "abstract")]
    pub(crate) is_abstract: bool,
    #[serde(default, rename = "default")]
    pub(crate) is_default: bool,
    #[serde(default, rename = "final")]
    pub(crate) is_final: bool,
    #[serde(default)]
    pub(crate) visibility: Visibility,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Method {
    pub(crate) name: String,
    pub(crate) descriptor: String,
    #[serde(default)]
    pub(crate) modifiers: MethodModifiers,
    /// Internal names of the annotation types present on the method.
    #[serde(default)]
    pub(crate) annotations: Vec<String>,
    #[serde(default)]
    pub(crate) parameters: Vec<String>,
    /// Compiler-generated member without a source counterpart.
    #[serde(default)]
    pub(crate) implicit: bool,
    #[serde(default)]
    pub(crate) body: Option<Vec<Stmt>>,
    #[serde(default)]
    pub(crate) span: Option<Span>,
}

impl Method {
    pub(crate) fn is_constructor(&self) -> bool {
        self.name == "<init>" || self.name == "<clinit>"
    }

    pub(crate) fn has_annotation(&self, name: &str) -> bool {
        self.annotations.iter().any(|annotation| annotation == name)
    }

    /// Abstract either explicitly or as a bodiless interface member.
    pub(crate) fn is_abstract_in(&self, owner: &TypeDecl) -> bool {
        if self.modifiers.is_abstract {
            return true;
        }
        owner.is_interface()
            && !self.modifiers.is_default
            && !self.modifiers.is_static
            && self.modifiers.visibility != Visibility::Private
            && self.body.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FieldModifiers {
    #[serde(default, rename = "static")]
    pub(crate) is_static: bool,
    #[serde(default, rename = "final")]
    pub(crate) is_final: bool,
    #[serde(default)]
    pub(crate) visibility: Visibility,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Field {
    pub(crate) name: String,
    pub(crate) descriptor: String,
    #[serde(default)]
    pub(crate) modifiers: FieldModifiers,
    #[serde(default)]
    pub(crate) initializer: Option<Expr>,
    #[serde(default)]
    pub(crate) span: Option<Span>,
}

/// Enum constant; `arguments` are those passed to the enum constructor.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EnumValue {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) arguments: Vec<Expr>,
    #[serde(default)]
    pub(crate) span: Option<Span>,
}

/// Method reference by name and descriptor, e.g. `apply` / `(I)V`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct MethodRef {
    pub(crate) name: String,
    pub(crate) descriptor: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Stmt {
    #[serde(flatten)]
    pub(crate) kind: StmtKind,
    #[serde(default)]
    pub(crate) implicit: bool,
    #[serde(default)]
    pub(crate) span: Option<Span>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub(crate) enum StmtKind {
    Local {
        name: String,
        descriptor: String,
        #[serde(default)]
        initializer: Option<Expr>,
    },
    /// Plain (`op` absent) or compound assignment.
    Assign {
        target: Expr,
        #[serde(default)]
        op: Option<BinaryOp>,
        value: Expr,
    },
    Expression {
        expr: Expr,
    },
    Block {
        #[serde(default)]
        statements: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then: Box<Stmt>,
        #[serde(default)]
        otherwise: Option<Box<Stmt>>,
    },
    For {
        #[serde(default)]
        init: Vec<Stmt>,
        #[serde(default)]
        condition: Option<Expr>,
        #[serde(default)]
        update: Vec<Stmt>,
        body: Box<Stmt>,
    },
    ForEach {
        name: String,
        descriptor: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    Empty,
}

impl Stmt {
    pub(crate) fn is_loop(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::For { .. } | StmtKind::ForEach { .. } | StmtKind::While { .. }
        )
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Expr {
    #[serde(flatten)]
    pub(crate) kind: ExprKind,
    /// Static type as a JVM field descriptor.
    #[serde(default, rename = "type")]
    pub(crate) ty: Option<String>,
    #[serde(default)]
    pub(crate) span: Option<Span>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub(crate) enum ExprKind {
    Literal {
        value: Literal,
    },
    Local {
        name: String,
    },
    /// Field read; `owner` is the declaring type, `target` the receiver if written.
    Field {
        #[serde(default)]
        target: Option<Box<Expr>>,
        owner: String,
        name: String,
        #[serde(default, rename = "static")]
        is_static: bool,
    },
    ArrayRead {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    TypeAccess {
        name: String,
    },
    This,
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Invocation {
        #[serde(default)]
        target: Option<Box<Expr>>,
        owner: String,
        name: String,
        descriptor: String,
        #[serde(default)]
        arguments: Vec<Expr>,
    },
    /// Object construction; `anonymous` names the anonymous class body, if any.
    New {
        class: String,
        #[serde(default)]
        arguments: Vec<Expr>,
        #[serde(default)]
        anonymous: Option<String>,
    },
    NewArray {
        element: String,
        #[serde(default)]
        dimensions: Vec<Expr>,
        #[serde(default)]
        elements: Option<Vec<Expr>>,
    },
    Lambda {
        /// Functional interface the lambda is bound to.
        target: String,
        #[serde(default)]
        method: Option<MethodRef>,
        #[serde(default)]
        parameters: Vec<String>,
        body: LambdaBody,
        #[serde(skip)]
        id: LambdaId,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Cast {
        to: String,
        operand: Box<Expr>,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LambdaBody {
    Expression(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub(crate) enum Literal {
    Int(i64),
    Long(i64),
    Float(f64),
    Double(f64),
    Boolean(bool),
    Char(char),
    String(String),
    Null,
}

impl Literal {
    /// Descriptor of the literal's type; `None` for `null`.
    pub(crate) fn descriptor(&self) -> Option<&'static str> {
        match self {
            Literal::Int(_) => Some("I"),
            Literal::Long(_) => Some("J"),
            Literal::Float(_) => Some("F"),
            Literal::Double(_) => Some("D"),
            Literal::Boolean(_) => Some("Z"),
            Literal::Char(_) => Some("C"),
            Literal::String(_) => Some("Ljava/lang/String;"),
            Literal::Null => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum UnaryOp {
    Neg,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub(crate) fn is_write(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum BinaryOp {
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Ushr,
    InstanceOf,
}

impl Expr {
    /// Static type, falling back to the literal type when none was recorded.
    pub(crate) fn static_type(&self) -> Option<&str> {
        if let Some(ty) = self.ty.as_deref() {
            return Some(ty);
        }
        match &self.kind {
            ExprKind::Literal { value } => value.descriptor(),
            _ => None,
        }
    }

    pub(crate) fn is_local(&self, name: &str) -> bool {
        matches!(&self.kind, ExprKind::Local { name: local } if local == name)
    }
}

/// Lambda expression recorded while indexing.
#[derive(Clone, Debug)]
pub(crate) struct LambdaSite {
    pub(crate) id: LambdaId,
    pub(crate) file: FileId,
    pub(crate) enclosing_type: TypeId,
    pub(crate) target: String,
    pub(crate) method: Option<MethodRef>,
    pub(crate) span: Option<Span>,
}

/// Key of a field by declaring type and name.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) struct FieldKey {
    pub(crate) owner: String,
    pub(crate) name: String,
}

#[derive(Debug, Default)]
struct ModelIndex {
    slots: Vec<(FileId, usize)>,
    by_name: BTreeMap<String, TypeId>,
    outer: BTreeMap<TypeId, TypeId>,
    nested: BTreeMap<TypeId, Vec<TypeId>>,
    anonymous_sites: BTreeSet<TypeId>,
    lambdas: Vec<LambdaSite>,
    written_fields: BTreeSet<FieldKey>,
}

impl Model {
    #[cfg(test)]
    pub(crate) fn from_files(files: Vec<SourceFile>) -> Result<Self> {
        Model {
            files,
            index: ModelIndex::default(),
        }
        .indexed()
    }

    /// Build the lookup tables. Lambda ids are written into the lambda nodes.
    pub(crate) fn indexed(mut self) -> Result<Self> {
        let mut index = ModelIndex::default();
        for (file_index, file) in self.files.iter().enumerate() {
            for (type_index, decl) in file.types.iter().enumerate() {
                let id = TypeId(index.slots.len());
                index.slots.push((FileId(file_index), type_index));
                if index.by_name.insert(decl.name.clone(), id).is_some() {
                    bail!("duplicate type declaration: {}", decl.name);
                }
            }
        }
        for (position, &(file, type_index)) in index.slots.iter().enumerate() {
            let decl = &self.files[file.0].types[type_index];
            let Some(outer) = decl.outer.as_ref().and_then(|name| index.by_name.get(name)) else {
                continue;
            };
            index.outer.insert(TypeId(position), *outer);
            if !decl.is_anonymous() {
                index.nested.entry(*outer).or_default().push(TypeId(position));
            }
        }

        let mut collector = IndexCollector {
            by_name: &index.by_name,
            lambdas: Vec::new(),
            anonymous_references: Vec::new(),
            written_fields: BTreeSet::new(),
        };
        for (position, &(file, type_index)) in index.slots.iter().enumerate() {
            let decl = &mut self.files[file.0].types[type_index];
            collector.type_decl(file, TypeId(position), decl);
        }
        let IndexCollector {
            lambdas,
            anonymous_references,
            written_fields,
            ..
        } = collector;
        for (site, target) in anonymous_references {
            let (file, type_index) = index.slots[site.0];
            let location = format!("files[{}].types[{}]", file.0, type_index);
            let target_decl = {
                let (file, type_index) = index.slots[target.0];
                &self.files[file.0].types[type_index]
            };
            if !target_decl.is_anonymous() {
                bail!(
                    "invalid model at {location}: `new` names {}, which is not an anonymous type",
                    target_decl.name
                );
            }
            if site == target {
                bail!(
                    "invalid model at {location}: anonymous type {} instantiates itself",
                    target_decl.name
                );
            }
            if !index.anonymous_sites.insert(target) {
                bail!(
                    "invalid model at {location}: anonymous type {} is instantiated more than once",
                    target_decl.name
                );
            }
        }
        index.lambdas = lambdas;
        index.written_fields = written_fields;
        self.index = index;
        Ok(self)
    }

    pub(crate) fn type_count(&self) -> usize {
        self.index.slots.len()
    }

    pub(crate) fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        (0..self.index.slots.len()).map(TypeId)
    }

    pub(crate) fn types(&self) -> impl Iterator<Item = (TypeId, &TypeDecl)> + '_ {
        self.type_ids().map(|id| (id, self.type_decl(id)))
    }

    pub(crate) fn type_decl(&self, id: TypeId) -> &TypeDecl {
        let (file, index) = self.index.slots[id.0];
        &self.files[file.0].types[index]
    }

    pub(crate) fn type_named(&self, name: &str) -> Option<TypeId> {
        self.index.by_name.get(name).copied()
    }

    pub(crate) fn file_of(&self, id: TypeId) -> FileId {
        self.index.slots[id.0].0
    }

    pub(crate) fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.0]
    }

    pub(crate) fn file_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        (0..self.files.len()).map(FileId)
    }

    /// Types declared in a file, in declaration order.
    pub(crate) fn types_in(&self, file: FileId) -> impl Iterator<Item = TypeId> + '_ {
        self.type_ids()
            .filter(move |id| self.index.slots[id.0].0 == file)
    }

    pub(crate) fn outer_type(&self, id: TypeId) -> Option<TypeId> {
        self.index.outer.get(&id).copied()
    }

    /// Member types, anonymous classes excluded.
    pub(crate) fn nested_types(&self, id: TypeId) -> &[TypeId] {
        self.index.nested.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Whether an anonymous type is instantiated by some `new` expression.
    pub(crate) fn is_instantiated_anonymous(&self, id: TypeId) -> bool {
        self.index.anonymous_sites.contains(&id)
    }

    pub(crate) fn method(&self, id: MethodId) -> &Method {
        &self.type_decl(id.ty).methods[id.index]
    }

    #[cfg(test)]
    pub(crate) fn method_ids(&self, ty: TypeId) -> impl Iterator<Item = MethodId> + '_ {
        (0..self.type_decl(ty).methods.len()).map(move |index| MethodId { ty, index })
    }

    #[cfg(test)]
    pub(crate) fn find_method(
        &self,
        type_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Option<MethodId> {
        let ty = self.type_named(type_name)?;
        self.method_ids(ty).find(|id| {
            let method = self.method(*id);
            method.name == name && method.descriptor == descriptor
        })
    }

    pub(crate) fn lambdas(&self) -> &[LambdaSite] {
        &self.index.lambdas
    }

    /// Whether any assignment or increment outside the declaration writes the field.
    pub(crate) fn is_field_written(&self, owner: &str, name: &str) -> bool {
        self.index.written_fields.contains(&FieldKey {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

/// Mutable pre-order pass assigning lambda ids and recording writes.
struct IndexCollector<'a> {
    by_name: &'a BTreeMap<String, TypeId>,
    lambdas: Vec<LambdaSite>,
    /// `(instantiating type, anonymous type)` per `new` with a class body.
    anonymous_references: Vec<(TypeId, TypeId)>,
    written_fields: BTreeSet<FieldKey>,
}

impl IndexCollector<'_> {
    fn type_decl(&mut self, file: FileId, ty: TypeId, decl: &mut TypeDecl) {
        for field in &mut decl.fields {
            if let Some(initializer) = field.initializer.as_mut() {
                self.expr(file, ty, initializer);
            }
        }
        for value in &mut decl.enum_values {
            for argument in &mut value.arguments {
                self.expr(file, ty, argument);
            }
        }
        for method in &mut decl.methods {
            if let Some(body) = method.body.as_mut() {
                for stmt in body {
                    self.stmt(file, ty, stmt);
                }
            }
        }
    }

    fn stmt(&mut self, file: FileId, ty: TypeId, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Local { initializer, .. } => {
                if let Some(initializer) = initializer {
                    self.expr(file, ty, initializer);
                }
            }
            StmtKind::Assign { target, value, .. } => {
                self.record_write(target);
                self.expr(file, ty, target);
                self.expr(file, ty, value);
            }
            StmtKind::Expression { expr } => self.expr(file, ty, expr),
            StmtKind::Block { statements } => {
                for stmt in statements {
                    self.stmt(file, ty, stmt);
                }
            }
            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                self.expr(file, ty, condition);
                self.stmt(file, ty, then);
                if let Some(otherwise) = otherwise {
                    self.stmt(file, ty, otherwise);
                }
            }
            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => {
                for stmt in init {
                    self.stmt(file, ty, stmt);
                }
                if let Some(condition) = condition {
                    self.expr(file, ty, condition);
                }
                for stmt in update {
                    self.stmt(file, ty, stmt);
                }
                self.stmt(file, ty, body);
            }
            StmtKind::ForEach { iterable, body, .. } => {
                self.expr(file, ty, iterable);
                self.stmt(file, ty, body);
            }
            StmtKind::While { condition, body } => {
                self.expr(file, ty, condition);
                self.stmt(file, ty, body);
            }
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.expr(file, ty, value);
                }
            }
            StmtKind::Empty => {}
        }
    }

    fn expr(&mut self, file: FileId, ty: TypeId, expr: &mut Expr) {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Literal { .. }
            | ExprKind::Local { .. }
            | ExprKind::TypeAccess { .. }
            | ExprKind::This => {}
            ExprKind::Field { target, .. } => {
                if let Some(target) = target {
                    self.expr(file, ty, target);
                }
            }
            ExprKind::ArrayRead { target, index } => {
                self.expr(file, ty, target);
                self.expr(file, ty, index);
            }
            ExprKind::Unary { op, operand } => {
                if op.is_write() {
                    self.record_write(operand);
                }
                self.expr(file, ty, operand);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(file, ty, lhs);
                self.expr(file, ty, rhs);
            }
            ExprKind::Invocation {
                target, arguments, ..
            } => {
                if let Some(target) = target {
                    self.expr(file, ty, target);
                }
                for argument in arguments {
                    self.expr(file, ty, argument);
                }
            }
            ExprKind::New {
                arguments,
                anonymous,
                ..
            } => {
                let target = anonymous
                    .as_ref()
                    .and_then(|name| self.by_name.get(name).copied());
                if let Some(target) = target {
                    self.anonymous_references.push((ty, target));
                }
                for argument in arguments {
                    self.expr(file, ty, argument);
                }
            }
            ExprKind::NewArray {
                dimensions,
                elements,
                ..
            } => {
                for dimension in dimensions {
                    self.expr(file, ty, dimension);
                }
                if let Some(elements) = elements {
                    for element in elements {
                        self.expr(file, ty, element);
                    }
                }
            }
            ExprKind::Lambda {
                target,
                method,
                body,
                id,
                ..
            } => {
                *id = LambdaId(self.lambdas.len());
                self.lambdas.push(LambdaSite {
                    id: *id,
                    file,
                    enclosing_type: ty,
                    target: target.clone(),
                    method: method.clone(),
                    span,
                });
                match body {
                    LambdaBody::Expression(expr) => self.expr(file, ty, expr),
                    LambdaBody::Block(statements) => {
                        for stmt in statements {
                            self.stmt(file, ty, stmt);
                        }
                    }
                }
            }
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                self.expr(file, ty, condition);
                self.expr(file, ty, then);
                self.expr(file, ty, otherwise);
            }
            ExprKind::Cast { operand, .. } => self.expr(file, ty, operand),
        }
    }

    fn record_write(&mut self, target: &Expr) {
        if let ExprKind::Field { owner, name, .. } = &target.kind {
            self.written_fields.insert(FieldKey {
                owner: owner.clone(),
                name: name.clone(),
            });
        }
    }
}
