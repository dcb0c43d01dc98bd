//! Program unit model
//!
//! The tree the rewrite rules operate on. It is deliberately small: it keeps
//! exactly what the rules need to reason about (declarations, markers,
//! imports, and statement/expression trees for scope analysis) and carries
//! everything else as raw text so the printer can reproduce it verbatim.

use crate::imports::ImportSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// One parsed source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramUnit {
    /// Path relative to the source root, used for diagnostics and output
    pub path: String,

    /// Package declaration, if any
    pub package: Option<String>,

    /// Import directives in source order
    #[serde(default)]
    pub imports: ImportSet,

    /// Top-level type declarations
    pub types: Vec<ClassDecl>,

    /// Free-form tags, e.g. marking engine-generated units
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Comments before the package declaration (license headers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
}

impl ProgramUnit {
    pub fn new(path: impl Into<String>, package: Option<String>) -> Self {
        Self {
            path: path.into(),
            package,
            imports: ImportSet::default(),
            types: Vec::new(),
            metadata: BTreeMap::new(),
            preamble: None,
        }
    }

    /// Fully qualified name of a top-level or nested type path (`Outer.Inner`)
    pub fn qualify(&self, type_path: &str) -> String {
        match &self.package {
            Some(pkg) if !pkg.is_empty() => format!("{}.{}", pkg, type_path),
            _ => type_path.to_string(),
        }
    }

    /// Simple names of every type declared in this unit, nested ones included
    pub fn declared_type_names(&self) -> BTreeSet<String> {
        fn collect(class: &ClassDecl, out: &mut BTreeSet<String>) {
            out.insert(class.name.clone());
            for member in &class.members {
                if let Member::Class(inner) = member {
                    collect(inner, out);
                }
            }
        }
        let mut out = BTreeSet::new();
        for class in &self.types {
            collect(class, &mut out);
        }
        out
    }

    /// Visit every class, depth first, with its dotted path
    pub fn for_each_class_mut(&mut self, mut f: impl FnMut(&str, &mut ClassDecl)) {
        fn visit(prefix: &str, class: &mut ClassDecl, f: &mut dyn FnMut(&str, &mut ClassDecl)) {
            let path = if prefix.is_empty() {
                class.name.clone()
            } else {
                format!("{}.{}", prefix, class.name)
            };
            f(&path, class);
            for member in &mut class.members {
                if let Member::Class(inner) = member {
                    visit(&path, inner, f);
                }
            }
        }
        for class in &mut self.types {
            visit("", class, &mut f);
        }
    }

    /// Dotted paths of every class in the unit, depth first
    pub fn class_paths(&self) -> Vec<String> {
        fn visit(prefix: &str, class: &ClassDecl, out: &mut Vec<String>) {
            let path = if prefix.is_empty() {
                class.name.clone()
            } else {
                format!("{}.{}", prefix, class.name)
            };
            out.push(path.clone());
            for member in &class.members {
                if let Member::Class(inner) = member {
                    visit(&path, inner, out);
                }
            }
        }
        let mut out = Vec::new();
        for class in &self.types {
            visit("", class, &mut out);
        }
        out
    }

    /// Look up a class by dotted path
    pub fn class(&self, path: &str) -> Option<&ClassDecl> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.types.iter().find(|c| c.name == first)?;
        for seg in segments {
            current = current.members.iter().find_map(|m| match m {
                Member::Class(c) if c.name == seg => Some(c),
                _ => None,
            })?;
        }
        Some(current)
    }

    /// Mutable lookup by dotted path
    pub fn class_mut(&mut self, path: &str) -> Option<&mut ClassDecl> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.types.iter_mut().find(|c| c.name == first)?;
        for seg in segments {
            current = current.members.iter_mut().find_map(|m| match m {
                Member::Class(c) if c.name == seg => Some(c),
                _ => None,
            })?;
        }
        Some(current)
    }

    /// Names referenced anywhere in the unit (imports excluded)
    pub fn names(&self) -> UnitNames {
        let mut names = UnitNames::default();
        for class in &self.types {
            names.collect_class(class);
        }
        names
    }
}

/// Kind of type declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

impl TypeKind {
    pub fn keyword(self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Interface => "interface",
            TypeKind::Enum => "enum",
            TypeKind::Record => "record",
            TypeKind::Annotation => "@interface",
        }
    }
}

/// A type declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    /// Leading comments, verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    pub name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub markers: Vec<Marker>,
    /// Everything between the name and the body (`<T> extends A implements B`)
    #[serde(default)]
    pub header: String,
    pub members: Vec<Member>,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            doc: None,
            name: name.into(),
            kind: TypeKind::Class,
            modifiers: Modifiers::default(),
            markers: Vec::new(),
            header: String::new(),
            members: Vec::new(),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldDecl> {
        self.members.iter_mut().find_map(|m| match m {
            Member::Field(f) if f.name == name => Some(f),
            _ => None,
        })
    }

    /// Constructors with their member index
    pub fn constructors(&self) -> impl Iterator<Item = (usize, &MethodDecl)> {
        self.members
            .iter()
            .enumerate()
            .filter_map(|(i, m)| match m {
                Member::Constructor(c) => Some((i, c)),
                _ => None,
            })
    }

    /// Methods (constructors excluded) with their member index
    pub fn methods(&self) -> impl Iterator<Item = (usize, &MethodDecl)> {
        self.members
            .iter()
            .enumerate()
            .filter_map(|(i, m)| match m {
                Member::Method(c) => Some((i, c)),
                _ => None,
            })
    }

    pub fn has_marker(&self, simple_name: &str) -> bool {
        self.markers.iter().any(|m| m.simple_name() == simple_name)
    }
}

/// A class body member, kept in source order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "member", rename_all = "lowercase")]
pub enum Member {
    Field(FieldDecl),
    Constructor(MethodDecl),
    Method(MethodDecl),
    Class(ClassDecl),
    Initializer(Block),
    /// Members outside the modelled subset (enum constants, static blocks, ...)
    Raw(String),
}

/// Declared visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    #[default]
    Package,
    Protected,
    Public,
}

impl Visibility {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Visibility::Private => Some("private"),
            Visibility::Package => None,
            Visibility::Protected => Some("protected"),
            Visibility::Public => Some("public"),
        }
    }
}

/// Declaration modifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub visibility: Visibility,
    /// Non-visibility keywords in source order (`static`, `final`, ...)
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Modifiers {
    pub fn public() -> Self {
        Self {
            visibility: Visibility::Public,
            keywords: Vec::new(),
        }
    }

    pub fn has(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }

    pub fn is_static(&self) -> bool {
        self.has("static")
    }

    /// Add a keyword if missing; returns whether anything changed
    pub fn add(&mut self, keyword: &str) -> bool {
        if self.has(keyword) {
            return false;
        }
        self.keywords.push(keyword.to_string());
        true
    }

    /// Render as source prefix, e.g. `private static final `
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(kw) = self.visibility.keyword() {
            out.push_str(kw);
            out.push(' ');
        }
        for kw in &self.keywords {
            out.push_str(kw);
            out.push(' ');
        }
        out
    }
}

/// A declarative marker (annotation) with its argument list.
///
/// `args == None` is the bare form (`@Foo`); `Some(vec![])` is `@Foo()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Name as written, possibly qualified
    pub name: String,
    #[serde(default)]
    pub args: Option<Vec<MarkerArg>>,
}

/// A marker argument; `name == None` is the implicit `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerArg {
    pub name: Option<String>,
    pub value: Expr,
}

impl Marker {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: name.into(),
            args: Some(vec![MarkerArg { name: None, value }]),
        }
    }

    /// Last segment of the marker name
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Whether the name was written fully qualified
    pub fn is_qualified(&self) -> bool {
        self.name.contains('.')
    }

    fn arg_position(&self, key: &str) -> Option<usize> {
        self.args.as_ref()?.iter().position(|a| match &a.name {
            Some(n) => n == key,
            None => key == "value",
        })
    }

    /// Argument value by attribute name; the unnamed argument answers to `value`
    pub fn arg(&self, key: &str) -> Option<&Expr> {
        let idx = self.arg_position(key)?;
        self.args.as_ref().map(|args| &args[idx].value)
    }

    /// Remove an argument, collapsing to the bare form when none remain
    pub fn remove_arg(&mut self, key: &str) -> Option<Expr> {
        let idx = self.arg_position(key)?;
        let args = self.args.as_mut()?;
        let removed = args.remove(idx);
        if args.is_empty() {
            self.args = None;
        } else if args.len() == 1 && args[0].name.as_deref() == Some("value") {
            // `@X(value = "a")` reads better as `@X("a")`
            args[0].name = None;
        }
        Some(removed.value)
    }
}

/// A type as written (`List<Foo>`, `int[]`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeRef(pub String);

impl TypeRef {
    pub fn new(s: impl Into<String>) -> Self {
        TypeRef(s.into())
    }

    /// Unqualified type names mentioned in this type (`Map<K, Foo>` -> `Map`, `K`, `Foo`)
    pub fn simple_names(&self) -> Vec<String> {
        self.0
            .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$' || c == '.'))
            .filter(|tok| !tok.is_empty() && !tok.contains('.'))
            .filter(|tok| tok.chars().next().is_some_and(|c| c.is_alphabetic()))
            .map(String::from)
            .collect()
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field declaration (one declarator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub name: String,
    #[serde(default)]
    pub init: Option<Expr>,
}

/// Method or constructor declaration; constructors have no return type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub type_params: Option<String>,
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub throws: Option<String>,
    #[serde(default)]
    pub body: Option<Block>,
}

impl MethodDecl {
    pub fn is_constructor(&self) -> bool {
        self.return_type.is_none()
    }
}

/// Formal parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub markers: Vec<Marker>,
    /// `final` and friends
    #[serde(default)]
    pub keywords: Vec<String>,
    pub ty: TypeRef,
    pub name: String,
    #[serde(default)]
    pub varargs: bool,
}

impl Param {
    pub fn new(ty: TypeRef, name: impl Into<String>) -> Self {
        Self {
            markers: Vec::new(),
            keywords: Vec::new(),
            ty,
            name: name.into(),
            varargs: false,
        }
    }
}

/// Statement block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Local {
        #[serde(default)]
        keywords: Vec<String>,
        ty: TypeRef,
        name: String,
        init: Option<Expr>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    Throw(Expr),
    Block(Block),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        ty: TypeRef,
        name: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    /// Statements outside the modelled subset, kept verbatim
    Raw(String),
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal exactly as written, quotes included
    Literal(String),
    Name(String),
    This,
    FieldAccess {
        target: Box<Expr>,
        name: String,
    },
    Call {
        target: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
    },
    New {
        ty: TypeRef,
        args: Vec<Expr>,
    },
    Assign {
        target: Box<Expr>,
        op: String,
        value: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
        postfix: bool,
    },
    Cast {
        ty: TypeRef,
        expr: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Paren(Box<Expr>),
    Lambda {
        params: Vec<String>,
        body: LambdaBody,
    },
    /// `{a, b}` in marker arguments and array initializers
    ArrayInit(Vec<Expr>),
    ClassLit(TypeRef),
    /// Expressions outside the modelled subset, kept verbatim
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}

impl Expr {
    pub fn name(n: impl Into<String>) -> Self {
        Expr::Name(n.into())
    }

    /// A double-quoted string literal
    pub fn string(s: &str) -> Self {
        Expr::Literal(format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")))
    }

    /// The unquoted content of a plain string literal
    pub fn as_string_literal(&self) -> Option<String> {
        match self {
            Expr::Literal(lit) if lit.len() >= 2 && lit.starts_with('"') && lit.ends_with('"') => {
                Some(lit[1..lit.len() - 1].replace("\\\"", "\"").replace("\\\\", "\\"))
            }
            _ => None,
        }
    }

    /// `this.<name> = <value>`
    pub fn assign_this(field: &str, value: Expr) -> Self {
        Expr::Assign {
            target: Box::new(Expr::FieldAccess {
                target: Box::new(Expr::This),
                name: field.to_string(),
            }),
            op: "=".into(),
            value: Box::new(value),
        }
    }
}

/// Identifier-shaped words in raw source text
pub fn words(text: &str) -> impl Iterator<Item = &str> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT
        .get_or_init(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").expect("static regex"))
        .find_iter(text)
        .map(|m| m.as_str())
}

/// Names referenced by a unit or class, used by the import reconciler and
/// by rules that must know whether a declaration is still used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitNames {
    /// Names in type position (types, markers, `new`, casts, class literals)
    pub types: BTreeSet<String>,
    /// Names in value position (identifiers, unqualified calls)
    pub values: BTreeSet<String>,
    /// Call counts by method name
    pub calls: BTreeMap<String, usize>,
    /// Members accessed through a non-`this` receiver (`other.field`)
    pub qualified_accesses: BTreeSet<String>,
    /// Names written to by assignment or increment. Verbatim code
    /// fragments count every word they contain.
    pub assigned: BTreeSet<String>,
    /// Simple names of types created by `new C(..)` or `C::new`
    pub instantiated: BTreeSet<String>,
    /// Simple names of extended types
    pub extended: BTreeSet<String>,
}

impl UnitNames {
    /// Whether a simple name is referenced in either position
    pub fn mentions(&self, name: &str) -> bool {
        self.types.contains(name) || self.values.contains(name)
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.get(name).copied().unwrap_or(0)
    }

    pub fn collect_class(&mut self, class: &ClassDecl) {
        self.collect_markers(&class.markers);
        self.collect_raw(&class.header);
        self.collect_extends(&class.header);
        for member in &class.members {
            match member {
                Member::Field(f) => {
                    self.collect_markers(&f.markers);
                    self.collect_type(&f.ty);
                    if let Some(init) = &f.init {
                        self.collect_expr(init);
                    }
                }
                Member::Method(m) | Member::Constructor(m) => self.collect_method(m),
                Member::Class(c) => self.collect_class(c),
                Member::Initializer(b) => self.collect_stmts(&b.stmts),
                Member::Raw(text) => self.collect_code(text),
            }
        }
    }

    pub fn collect_method(&mut self, method: &MethodDecl) {
        self.collect_markers(&method.markers);
        if let Some(tp) = &method.type_params {
            self.collect_raw(tp);
        }
        if let Some(ret) = &method.return_type {
            self.collect_type(ret);
        }
        if let Some(throws) = &method.throws {
            self.collect_raw(throws);
        }
        for p in &method.params {
            self.collect_markers(&p.markers);
            self.collect_type(&p.ty);
        }
        if let Some(body) = &method.body {
            self.collect_stmts(&body.stmts);
        }
    }

    fn collect_markers(&mut self, markers: &[Marker]) {
        for marker in markers {
            if !marker.is_qualified() {
                self.types.insert(marker.name.clone());
            }
            for arg in marker.args.iter().flatten() {
                self.collect_expr(&arg.value);
            }
        }
    }

    fn collect_type(&mut self, ty: &TypeRef) {
        self.types.extend(ty.simple_names());
    }

    fn collect_raw(&mut self, text: &str) {
        for w in words(text) {
            self.types.insert(w.to_string());
            self.values.insert(w.to_string());
            *self.calls.entry(w.to_string()).or_default() += 1;
        }
    }

    /// Unmodelled statements or expressions: any word may be written to or
    /// reached through another receiver
    fn collect_code(&mut self, text: &str) {
        static NEW: OnceLock<Regex> = OnceLock::new();
        self.collect_raw(text);
        for w in words(text) {
            self.assigned.insert(w.to_string());
            self.qualified_accesses.insert(w.to_string());
        }
        let created = NEW.get_or_init(|| {
            Regex::new(r"\bnew\s+([A-Za-z_$][\w$.]*)\s*(?:<[^()]*>)?\s*\(|([A-Za-z_$][\w$]*)\s*::\s*new\b")
                .expect("static regex")
        });
        for caps in created.captures_iter(text) {
            if let Some(ty) = caps.get(1).or_else(|| caps.get(2)) {
                self.instantiated.insert(base_name(ty.as_str()).to_string());
            }
        }
    }

    fn collect_extends(&mut self, header: &str) {
        static EXTENDS: OnceLock<Regex> = OnceLock::new();
        let extends = EXTENDS.get_or_init(|| Regex::new(r"\bextends\s+([A-Za-z_$][\w$.]*)").expect("static regex"));
        for caps in extends.captures_iter(header) {
            if let Some(ty) = caps.get(1) {
                self.extended.insert(base_name(ty.as_str()).to_string());
            }
        }
    }

    fn collect_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.collect_stmt(stmt);
        }
    }

    fn collect_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Local { ty, init, .. } => {
                self.collect_type(ty);
                if let Some(init) = init {
                    self.collect_expr(init);
                }
            }
            Stmt::Expr(e) | Stmt::Throw(e) => self.collect_expr(e),
            Stmt::Return(e) => {
                if let Some(e) = e {
                    self.collect_expr(e);
                }
            }
            Stmt::Block(b) => self.collect_stmts(&b.stmts),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.collect_expr(cond);
                self.collect_stmt(then_branch);
                if let Some(e) = else_branch {
                    self.collect_stmt(e);
                }
            }
            Stmt::While { cond, body } => {
                self.collect_expr(cond);
                self.collect_stmt(body);
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                self.collect_stmts(init);
                if let Some(c) = cond {
                    self.collect_expr(c);
                }
                for u in update {
                    self.collect_expr(u);
                }
                self.collect_stmt(body);
            }
            Stmt::ForEach {
                ty, iterable, body, ..
            } => {
                self.collect_type(ty);
                self.collect_expr(iterable);
                self.collect_stmt(body);
            }
            Stmt::Raw(text) => self.collect_code(text),
        }
    }

    fn collect_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) | Expr::This => {}
            Expr::Name(n) => {
                // A bare name may be a variable, a static import, or a type
                // used as a receiver (`RequestMethod.GET`).
                self.values.insert(n.clone());
                self.types.insert(n.clone());
            }
            Expr::FieldAccess { target, name } => {
                if !matches!(**target, Expr::This) {
                    self.qualified_accesses.insert(name.clone());
                }
                self.collect_expr(target);
            }
            Expr::Call { target, name, args } => {
                *self.calls.entry(name.clone()).or_default() += 1;
                match target {
                    Some(t) => self.collect_expr(t),
                    None => {
                        self.values.insert(name.clone());
                    }
                }
                for a in args {
                    self.collect_expr(a);
                }
            }
            Expr::New { ty, args } => {
                self.instantiated.insert(base_name(&ty.0).to_string());
                self.collect_type(ty);
                for a in args {
                    self.collect_expr(a);
                }
            }
            Expr::Assign { target, value, .. } => {
                self.note_assigned(target);
                self.collect_expr(target);
                self.collect_expr(value);
            }
            Expr::Binary { left, right, .. } => {
                self.collect_expr(left);
                self.collect_expr(right);
            }
            Expr::Unary { op, operand, .. } => {
                if op == "++" || op == "--" {
                    self.note_assigned(operand);
                }
                self.collect_expr(operand);
            }
            Expr::Cast { ty, expr } => {
                self.collect_type(ty);
                self.collect_expr(expr);
            }
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.collect_expr(cond);
                self.collect_expr(then_expr);
                self.collect_expr(else_expr);
            }
            Expr::Paren(e) => self.collect_expr(e),
            Expr::Lambda { body, .. } => match body {
                LambdaBody::Expr(e) => self.collect_expr(e),
                LambdaBody::Block(b) => self.collect_stmts(&b.stmts),
            },
            Expr::ArrayInit(items) => {
                for i in items {
                    self.collect_expr(i);
                }
            }
            Expr::ClassLit(ty) => self.collect_type(ty),
            Expr::Raw(text) => self.collect_code(text),
        }
    }

    fn note_assigned(&mut self, target: &Expr) {
        match target {
            Expr::Name(n) | Expr::FieldAccess { name: n, .. } => {
                self.assigned.insert(n.clone());
            }
            _ => {}
        }
    }
}

/// `Inner` for `a.Outer.Inner<T>`
fn base_name(ty: &str) -> &str {
    let raw = ty.split('<').next().unwrap_or(ty).trim();
    raw.rsplit('.').next().unwrap_or(raw)
}

/// What the units of a source tree reach in each other, so that a rule
/// looking at one unit knows what the rest of its package relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessIndex {
    /// Package -> members read or written through another receiver
    members: BTreeMap<String, BTreeSet<String>>,
    instantiated: BTreeSet<String>,
    extended: BTreeSet<String>,
}

impl AccessIndex {
    pub fn of_units(units: &[ProgramUnit]) -> Self {
        let mut index = Self::default();
        for unit in units {
            let names = unit.names();
            index
                .members
                .entry(unit.package.clone().unwrap_or_default())
                .or_default()
                .extend(names.qualified_accesses);
            index.instantiated.extend(names.instantiated);
            index.extended.extend(names.extended);
        }
        index
    }

    /// Whether code in `package` touches a member called `member` on some
    /// other object
    pub fn reaches(&self, package: &str, member: &str) -> bool {
        self.members.get(package).is_some_and(|m| m.contains(member))
    }

    /// Whether some unit creates a type of this simple name with `new`
    pub fn instantiates(&self, simple: &str) -> bool {
        self.instantiated.contains(simple)
    }

    pub fn is_extended(&self, simple: &str) -> bool {
        self.extended.contains(simple)
    }
}

// ============================================================================
// Symbol walkers
// ============================================================================

/// Lexical region entered by the symbol walkers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScopeKind {
    Unit,
    Class { name: String },
    /// Method or constructor; `member` is the index in the class body
    Method { name: String, member: usize },
    Block,
    Lambda,
    Loop,
}

/// What kind of binding a declaration introduces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeclKind {
    Field,
    Parameter,
    Local,
}

/// Role of a symbol occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolSite {
    Declaration(DeclKind),
    /// A bare identifier in value position
    Reference,
    /// `this.name`, which always binds to the enclosing class
    ThisReference,
}

/// Read-only symbol visitor
pub trait SymbolVisitor {
    fn enter_scope(&mut self, kind: ScopeKind);
    fn exit_scope(&mut self);
    #[allow(clippy::ptr_arg)]
    fn symbol(&mut self, site: SymbolSite, name: &String);
    fn raw(&mut self, text: &str);
}

/// Symbol visitor that may rewrite names in place
pub trait SymbolVisitorMut {
    fn enter_scope(&mut self, kind: ScopeKind);
    fn exit_scope(&mut self);
    fn symbol(&mut self, site: SymbolSite, name: &mut String);
    fn raw(&mut self, text: &str);
}

// Both walkers come from one body so that occurrence numbering is identical
// between the analysis pass and the rewrite pass.
macro_rules! symbol_walker {
    ($module:ident, $visitor:ident $(, $m:ident)?) => {
        pub mod $module {
            use super::*;

            pub fn walk_unit<V: $visitor>(unit: &$($m)? ProgramUnit, v: &mut V) {
                v.enter_scope(ScopeKind::Unit);
                for class in &$($m)? unit.types {
                    walk_class(class, v);
                }
                v.exit_scope();
            }

            pub fn walk_class<V: $visitor>(class: &$($m)? ClassDecl, v: &mut V) {
                for marker in &$($m)? class.markers {
                    walk_marker(marker, v);
                }
                v.enter_scope(ScopeKind::Class { name: class.name.clone() });
                for member in &$($m)? class.members {
                    if let Member::Field(f) = member {
                        v.symbol(SymbolSite::Declaration(DeclKind::Field), &$($m)? f.name);
                    }
                }
                for (index, member) in (&$($m)? class.members).into_iter().enumerate() {
                    match member {
                        Member::Field(f) => {
                            for marker in &$($m)? f.markers {
                                walk_marker(marker, v);
                            }
                            if let Some(init) = &$($m)? f.init {
                                walk_expr(init, v);
                            }
                        }
                        Member::Method(m) | Member::Constructor(m) => walk_method(m, index, v),
                        Member::Class(c) => walk_class(c, v),
                        Member::Initializer(b) => walk_block(b, v),
                        Member::Raw(text) => v.raw(text),
                    }
                }
                v.exit_scope();
            }

            pub fn walk_method<V: $visitor>(method: &$($m)? MethodDecl, index: usize, v: &mut V) {
                for marker in &$($m)? method.markers {
                    walk_marker(marker, v);
                }
                for p in &$($m)? method.params {
                    for marker in &$($m)? p.markers {
                        walk_marker(marker, v);
                    }
                }
                v.enter_scope(ScopeKind::Method {
                    name: method.name.clone(),
                    member: index,
                });
                for p in &$($m)? method.params {
                    v.symbol(SymbolSite::Declaration(DeclKind::Parameter), &$($m)? p.name);
                }
                if let Some(body) = &$($m)? method.body {
                    walk_stmts(&$($m)? body.stmts, v);
                }
                v.exit_scope();
            }

            fn walk_marker<V: $visitor>(marker: &$($m)? Marker, v: &mut V) {
                if let Some(args) = &$($m)? marker.args {
                    for arg in args {
                        walk_expr(&$($m)? arg.value, v);
                    }
                }
            }

            fn walk_block<V: $visitor>(block: &$($m)? Block, v: &mut V) {
                v.enter_scope(ScopeKind::Block);
                walk_stmts(&$($m)? block.stmts, v);
                v.exit_scope();
            }

            fn walk_stmts<V: $visitor>(stmts: &$($m)? [Stmt], v: &mut V) {
                for stmt in stmts {
                    walk_stmt(stmt, v);
                }
            }

            fn walk_stmt<V: $visitor>(stmt: &$($m)? Stmt, v: &mut V) {
                match stmt {
                    Stmt::Local { name, init, .. } => {
                        if let Some(init) = init {
                            walk_expr(init, v);
                        }
                        v.symbol(SymbolSite::Declaration(DeclKind::Local), name);
                    }
                    Stmt::Expr(e) | Stmt::Throw(e) => walk_expr(e, v),
                    Stmt::Return(e) => {
                        if let Some(e) = e {
                            walk_expr(e, v);
                        }
                    }
                    Stmt::Block(b) => walk_block(b, v),
                    Stmt::If { cond, then_branch, else_branch } => {
                        walk_expr(cond, v);
                        walk_stmt(then_branch, v);
                        if let Some(e) = else_branch {
                            walk_stmt(e, v);
                        }
                    }
                    Stmt::While { cond, body } => {
                        walk_expr(cond, v);
                        walk_stmt(body, v);
                    }
                    Stmt::For { init, cond, update, body } => {
                        v.enter_scope(ScopeKind::Loop);
                        walk_stmts(init, v);
                        if let Some(c) = cond {
                            walk_expr(c, v);
                        }
                        for u in update {
                            walk_expr(u, v);
                        }
                        walk_stmt(body, v);
                        v.exit_scope();
                    }
                    Stmt::ForEach { name, iterable, body, .. } => {
                        walk_expr(iterable, v);
                        v.enter_scope(ScopeKind::Loop);
                        v.symbol(SymbolSite::Declaration(DeclKind::Local), name);
                        walk_stmt(body, v);
                        v.exit_scope();
                    }
                    Stmt::Raw(text) => v.raw(text),
                }
            }

            fn walk_expr<V: $visitor>(expr: &$($m)? Expr, v: &mut V) {
                match expr {
                    Expr::Literal(_) | Expr::This | Expr::ClassLit(_) => {}
                    Expr::Name(n) => v.symbol(SymbolSite::Reference, n),
                    Expr::FieldAccess { target, name } => {
                        if matches!(**target, Expr::This) {
                            v.symbol(SymbolSite::ThisReference, name);
                        } else {
                            walk_expr(target, v);
                        }
                    }
                    Expr::Call { target, args, .. } => {
                        if let Some(t) = target {
                            walk_expr(t, v);
                        }
                        for a in args {
                            walk_expr(a, v);
                        }
                    }
                    Expr::New { args, .. } => {
                        for a in args {
                            walk_expr(a, v);
                        }
                    }
                    Expr::Assign { target, value, .. } => {
                        walk_expr(target, v);
                        walk_expr(value, v);
                    }
                    Expr::Binary { left, right, .. } => {
                        walk_expr(left, v);
                        walk_expr(right, v);
                    }
                    Expr::Unary { operand, .. } => walk_expr(operand, v),
                    Expr::Cast { expr, .. } => walk_expr(expr, v),
                    Expr::Conditional { cond, then_expr, else_expr } => {
                        walk_expr(cond, v);
                        walk_expr(then_expr, v);
                        walk_expr(else_expr, v);
                    }
                    Expr::Paren(e) => walk_expr(e, v),
                    Expr::Lambda { params, body } => {
                        v.enter_scope(ScopeKind::Lambda);
                        for p in params {
                            v.symbol(SymbolSite::Declaration(DeclKind::Parameter), p);
                        }
                        match body {
                            LambdaBody::Expr(e) => walk_expr(e, v),
                            LambdaBody::Block(b) => walk_stmts(&$($m)? b.stmts, v),
                        }
                        v.exit_scope();
                    }
                    Expr::ArrayInit(items) => {
                        for i in items {
                            walk_expr(i, v);
                        }
                    }
                    Expr::Raw(text) => v.raw(text),
                }
            }
        }
    };
}

symbol_walker!(walk, SymbolVisitor);
symbol_walker!(walk_mut, SymbolVisitorMut, mut);
