//! Java code generation using genco
//!
//! Statements and expressions are laid out as text lines; genco handles the
//! member-level structure and indentation of the file.

use crate::ast::*;
use crate::error::{Error, Result};
use genco::prelude::*;

const INDENT: &str = "    ";

/// Print a program unit as Java source
pub fn render_java(unit: &ProgramUnit) -> Result<String> {
    let mut tokens = java::Tokens::new();
    JavaPrinter.unit(&mut tokens, unit);
    tokens
        .to_file_string()
        .map_err(|e| Error::Render(format!("{}: {}", unit.path, e)))
}

struct JavaPrinter;

impl JavaPrinter {
    fn unit(&self, t: &mut java::Tokens, unit: &ProgramUnit) {
        if let Some(preamble) = &unit.preamble {
            emit(t, preamble);
            t.line();
        }
        if let Some(package) = &unit.package {
            quote_in! { *t => package $(package.as_str());};
            t.push();
            t.line();
        }
        if !unit.imports.is_empty() {
            for import in unit.imports.iter() {
                t.append(import.to_string());
                t.push();
            }
            t.line();
        }
        for (i, class) in unit.types.iter().enumerate() {
            if i > 0 {
                t.line();
            }
            self.class(t, class);
        }
    }

    fn class(&self, t: &mut java::Tokens, class: &ClassDecl) {
        if let Some(doc) = &class.doc {
            emit(t, doc);
        }
        for marker in &class.markers {
            t.append(marker_text(marker));
            t.push();
        }
        let header = match class.header.chars().next() {
            None => String::new(),
            Some('(') | Some('<') => class.header.clone(),
            Some(_) => format!(" {}", class.header),
        };
        t.append(format!(
            "{}{} {}{} {{",
            class.modifiers.render(),
            class.kind.keyword(),
            class.name,
            header
        ));
        t.push();
        t.indent();
        let mut previous: Option<&Member> = None;
        for member in &class.members {
            if let Some(prev) = previous {
                if !groups_with(prev, member) {
                    t.line();
                }
            }
            self.member(t, member);
            previous = Some(member);
        }
        t.unindent();
        t.append("}");
        t.push();
    }

    fn member(&self, t: &mut java::Tokens, member: &Member) {
        match member {
            Member::Field(f) => {
                if let Some(doc) = &f.doc {
                    emit(t, doc);
                }
                for marker in &f.markers {
                    t.append(marker_text(marker));
                    t.push();
                }
                let init = f
                    .init
                    .as_ref()
                    .map(|e| format!(" = {}", expr(e)))
                    .unwrap_or_default();
                emit(t, &format!("{}{} {}{};", f.modifiers.render(), f.ty, f.name, init));
            }
            Member::Constructor(m) | Member::Method(m) => self.method(t, m),
            Member::Class(c) => self.class(t, c),
            Member::Initializer(b) => {
                let mut lines = Lines::default();
                lines.block_body("", b, "");
                emit(t, &lines.finish());
            }
            Member::Raw(text) => emit(t, text),
        }
    }

    fn method(&self, t: &mut java::Tokens, m: &MethodDecl) {
        if let Some(doc) = &m.doc {
            emit(t, doc);
        }
        for marker in &m.markers {
            t.append(marker_text(marker));
            t.push();
        }
        let mut signature = m.modifiers.render();
        if let Some(tp) = &m.type_params {
            signature.push_str(tp);
            signature.push(' ');
        }
        if let Some(ret) = &m.return_type {
            signature.push_str(&ret.0);
            signature.push(' ');
        }
        signature.push_str(&m.name);
        signature.push('(');
        signature.push_str(&m.params.iter().map(param_text).collect::<Vec<_>>().join(", "));
        signature.push(')');
        if let Some(throws) = &m.throws {
            signature.push_str(" throws ");
            signature.push_str(throws);
        }
        match &m.body {
            None => emit(t, &format!("{};", signature)),
            Some(body) => {
                let mut lines = Lines::default();
                lines.block_body(&format!("{} ", signature), body, "");
                emit(t, &lines.finish());
            }
        }
    }
}

/// Consecutive plain fields are printed without a blank line between them
fn groups_with(prev: &Member, next: &Member) -> bool {
    match (prev, next) {
        (Member::Field(_), Member::Field(f)) => f.doc.is_none() && f.markers.is_empty(),
        (Member::Raw(a), Member::Raw(_)) => !a.contains('\n') && !a.ends_with(';'),
        _ => false,
    }
}

/// Append multi-line text one line at a time so genco indents every line
fn emit(t: &mut java::Tokens, text: &str) {
    for line in text.lines() {
        if line.trim().is_empty() {
            t.line();
        } else {
            t.append(line.trim_end().to_string());
            t.push();
        }
    }
}

pub(crate) fn marker_text(marker: &Marker) -> String {
    match &marker.args {
        None => format!("@{}", marker.name),
        Some(args) => {
            let args: Vec<String> = args
                .iter()
                .map(|a| match &a.name {
                    Some(n) => format!("{} = {}", n, expr(&a.value)),
                    None => expr(&a.value),
                })
                .collect();
            format!("@{}({})", marker.name, args.join(", "))
        }
    }
}

fn param_text(p: &Param) -> String {
    let mut out = String::new();
    for marker in &p.markers {
        out.push_str(&marker_text(marker));
        out.push(' ');
    }
    for kw in &p.keywords {
        out.push_str(kw);
        out.push(' ');
    }
    out.push_str(&p.ty.0);
    if p.varargs {
        out.push_str("...");
    }
    out.push(' ');
    out.push_str(&p.name);
    out
}

/// Statement printer producing indented text lines
#[derive(Default)]
struct Lines {
    out: Vec<String>,
    depth: usize,
}

impl Lines {
    fn line(&mut self, text: &str) {
        let pad = INDENT.repeat(self.depth);
        for l in text.lines() {
            if l.trim().is_empty() {
                self.out.push(String::new());
            } else {
                self.out.push(format!("{}{}", pad, l));
            }
        }
    }

    fn finish(self) -> String {
        self.out.join("\n")
    }

    /// `<head>{` + statements + `}<tail>`
    fn block_body(&mut self, head: &str, block: &Block, tail: &str) {
        self.line(&format!("{}{{", head));
        self.depth += 1;
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
        self.depth -= 1;
        self.line(&format!("}}{}", tail));
    }

    /// Statement after a header like `if (x)`; returns whether it was braced
    fn branch(&mut self, head: &str, body: &Stmt) -> bool {
        match body {
            Stmt::Block(b) => {
                self.block_body(&format!("{} ", head), b, "");
                true
            }
            other => {
                self.line(head);
                self.depth += 1;
                self.stmt(other);
                self.depth -= 1;
                false
            }
        }
    }

    fn if_chain(&mut self, head: &str, cond: &Expr, then: &Stmt, alternative: Option<&Stmt>) {
        let braced = self.branch(&format!("{}if ({})", head, expr(cond)), then);
        let Some(alternative) = alternative else {
            return;
        };
        // Continue on the closing brace line when the previous branch had one
        let prefix = if braced {
            if let Some(last) = self.out.last_mut() {
                last.truncate(last.trim_end().len());
            }
            let closing = self.out.pop().unwrap_or_default();
            format!("{} else ", closing.trim())
        } else {
            "else ".to_string()
        };
        match alternative {
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => self.if_chain(&prefix, cond, then_branch, else_branch.as_deref()),
            other => {
                self.branch(prefix.trim_end(), other);
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Local { .. } => {
                let text = local_text(stmt, true);
                self.line(&format!("{};", text));
            }
            Stmt::Expr(e) => self.line(&format!("{};", expr(e))),
            Stmt::Return(None) => self.line("return;"),
            Stmt::Return(Some(e)) => self.line(&format!("return {};", expr(e))),
            Stmt::Throw(e) => self.line(&format!("throw {};", expr(e))),
            Stmt::Block(b) => self.block_body("", b, ""),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => self.if_chain("", cond, then_branch, else_branch.as_deref()),
            Stmt::While { cond, body } => {
                self.branch(&format!("while ({})", expr(cond)), body);
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let init = init
                    .iter()
                    .enumerate()
                    .map(|(i, s)| match s {
                        Stmt::Expr(e) => expr(e),
                        other => local_text(other, i == 0),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let cond = cond.as_ref().map(expr).unwrap_or_default();
                let update = update.iter().map(expr).collect::<Vec<_>>().join(", ");
                self.branch(&format!("for ({}; {}; {})", init, cond, update), body);
            }
            Stmt::ForEach {
                ty,
                name,
                iterable,
                body,
            } => {
                self.branch(&format!("for ({} {} : {})", ty, name, expr(iterable)), body);
            }
            Stmt::Raw(text) => self.line(text),
        }
    }
}

/// `final int x = 1`, or just `x = 1` for follow-up declarators
fn local_text(stmt: &Stmt, with_type: bool) -> String {
    let Stmt::Local {
        keywords,
        ty,
        name,
        init,
    } = stmt
    else {
        return String::new();
    };
    let mut out = String::new();
    if with_type {
        for kw in keywords {
            out.push_str(kw);
            out.push(' ');
        }
        out.push_str(&ty.0);
        out.push(' ');
    }
    out.push_str(name);
    if let Some(init) = init {
        out.push_str(" = ");
        out.push_str(&expr(init));
    }
    out
}

/// Expression as source text; block lambdas span several lines
pub(crate) fn expr(e: &Expr) -> String {
    match e {
        Expr::Literal(s) | Expr::Name(s) | Expr::Raw(s) => s.clone(),
        Expr::This => "this".into(),
        Expr::FieldAccess { target, name } => format!("{}.{}", expr(target), name),
        Expr::Call { target, name, args } => {
            let args = args.iter().map(expr).collect::<Vec<_>>().join(", ");
            match target {
                Some(t) => format!("{}.{}({})", expr(t), name, args),
                None => format!("{}({})", name, args),
            }
        }
        Expr::New { ty, args } => format!(
            "new {}({})",
            ty,
            args.iter().map(expr).collect::<Vec<_>>().join(", ")
        ),
        Expr::Assign { target, op, value } => format!("{} {} {}", expr(target), op, expr(value)),
        Expr::Binary { left, op, right } => format!("{} {} {}", expr(left), op, expr(right)),
        Expr::Unary {
            op,
            operand,
            postfix,
        } => {
            if *postfix {
                format!("{}{}", expr(operand), op)
            } else {
                format!("{}{}", op, expr(operand))
            }
        }
        Expr::Cast { ty, expr: inner } => format!("({}) {}", ty, expr(inner)),
        Expr::Conditional {
            cond,
            then_expr,
            else_expr,
        } => format!("{} ? {} : {}", expr(cond), expr(then_expr), expr(else_expr)),
        Expr::Paren(inner) => format!("({})", expr(inner)),
        Expr::Lambda { params, body } => {
            let params = match params.as_slice() {
                [single] => single.clone(),
                many => format!("({})", many.join(", ")),
            };
            match body {
                LambdaBody::Expr(e) => format!("{} -> {}", params, expr(e)),
                LambdaBody::Block(b) => {
                    let mut lines = Lines::default();
                    lines.block_body(&format!("{} -> ", params), b, "");
                    lines.finish()
                }
            }
        }
        Expr::ArrayInit(items) => format!(
            "{{{}}}",
            items.iter().map(expr).collect::<Vec<_>>().join(", ")
        ),
        Expr::ClassLit(ty) => format!("{}.class", ty),
    }
}
