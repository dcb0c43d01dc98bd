//! Java parser - parses Java source code into a program unit

use crate::ast::*;
use crate::error::{Error, Result};
use crate::imports::Import;
use tree_sitter::{Node, Parser};

use super::{child_of_kind, collapse, dedent, first_error};

/// Parse one Java compilation unit. `path` is used for the unit and in errors.
pub fn parse_java(source: &str, path: &str) -> Result<ProgramUnit> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| Error::CodeParse(format!("Failed to set language: {}", e)))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::CodeParse("Failed to parse source".into()))?;

    let root = tree.root_node();
    if let Some(bad) = first_error(root) {
        let pos = bad.start_position();
        return Err(Error::CodeParse(format!(
            "{}:{}:{}: syntax error near `{}`",
            path,
            pos.row + 1,
            pos.column + 1,
            collapse(bad.utf8_text(source.as_bytes()).unwrap_or("")),
        )));
    }

    JavaReader { source, path }.unit(root)
}

struct JavaReader<'s> {
    source: &'s str,
    path: &'s str,
}

fn is_comment(node: &Node<'_>) -> bool {
    matches!(node.kind(), "line_comment" | "block_comment")
}

impl<'s> JavaReader<'s> {
    fn text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Node text with continuation lines re-indented relative to the node
    fn block_text(&self, node: Node<'_>) -> String {
        dedent(self.text(node), node.start_position().column)
    }

    fn location(&self, node: Node<'_>) -> String {
        format!("{}:{}", self.path, node.start_position().row + 1)
    }

    fn named<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        let children = node
            .named_children(&mut cursor)
            .filter(|c| !is_comment(c))
            .collect();
        children
    }

    fn unit(&self, root: Node<'_>) -> Result<ProgramUnit> {
        let mut unit = ProgramUnit::new(self.path, None);
        let mut preamble: Vec<String> = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        let mut seen_code = false;

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if is_comment(&child) {
                pending.push(self.block_text(child));
                continue;
            }
            if !seen_code {
                seen_code = true;
                if child.kind() == "package_declaration" {
                    preamble.append(&mut pending);
                }
            }
            match child.kind() {
                "package_declaration" => {
                    unit.package = self
                        .named(child)
                        .into_iter()
                        .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
                        .map(|n| self.text(n).to_string());
                }
                "import_declaration" => {
                    let text = self.text(child);
                    let text = text
                        .trim()
                        .strip_prefix("import")
                        .unwrap_or(text)
                        .trim_end_matches(';');
                    if let Some(import) = Import::parse(text) {
                        unit.imports.push(import);
                    }
                }
                "class_declaration"
                | "interface_declaration"
                | "enum_declaration"
                | "record_declaration"
                | "annotation_type_declaration" => {
                    let doc = take_doc(&mut pending);
                    unit.types.push(self.class(child, doc)?);
                }
                _ => {}
            }
        }

        if !preamble.is_empty() {
            unit.preamble = Some(preamble.join("\n"));
        }
        Ok(unit)
    }

    fn modifiers(&self, owner: Node<'_>) -> (Modifiers, Vec<Marker>) {
        let mut modifiers = Modifiers::default();
        let mut markers = Vec::new();
        let Some(node) = child_of_kind(owner, "modifiers") else {
            return (modifiers, markers);
        };
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "marker_annotation" | "annotation" => markers.push(self.marker(child)),
                "public" => modifiers.visibility = Visibility::Public,
                "protected" => modifiers.visibility = Visibility::Protected,
                "private" => modifiers.visibility = Visibility::Private,
                "line_comment" | "block_comment" => {}
                _ => modifiers.keywords.push(self.text(child).to_string()),
            }
        }
        (modifiers, markers)
    }

    fn marker(&self, node: Node<'_>) -> Marker {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let args = node.child_by_field_name("arguments").map(|list| {
            self.named(list)
                .into_iter()
                .map(|arg| {
                    if arg.kind() == "element_value_pair" {
                        MarkerArg {
                            name: arg.child_by_field_name("key").map(|k| self.text(k).to_string()),
                            value: arg
                                .child_by_field_name("value")
                                .map(|v| self.element_value(v))
                                .unwrap_or_else(|| Expr::Raw(String::new())),
                        }
                    } else {
                        MarkerArg {
                            name: None,
                            value: self.element_value(arg),
                        }
                    }
                })
                .collect()
        });
        Marker { name, args }
    }

    fn element_value(&self, node: Node<'_>) -> Expr {
        match node.kind() {
            "element_value_array_initializer" => Expr::ArrayInit(
                self.named(node)
                    .into_iter()
                    .map(|n| self.element_value(n))
                    .collect(),
            ),
            "annotation" | "marker_annotation" => Expr::Raw(self.text(node).to_string()),
            _ => self.expr(node),
        }
    }

    fn type_ref(&self, node: Option<Node<'_>>) -> TypeRef {
        TypeRef::new(node.map(|n| collapse(self.text(n))).unwrap_or_default())
    }

    fn class(&self, node: Node<'_>, doc: Option<String>) -> Result<ClassDecl> {
        let kind = match node.kind() {
            "interface_declaration" => TypeKind::Interface,
            "enum_declaration" => TypeKind::Enum,
            "record_declaration" => TypeKind::Record,
            "annotation_type_declaration" => TypeKind::Annotation,
            _ => TypeKind::Class,
        };
        let (modifiers, markers) = self.modifiers(node);
        let name = node.child_by_field_name("name").ok_or_else(|| {
            Error::CodeParse(format!("{}: type declaration without a name", self.location(node)))
        })?;
        let body = node.child_by_field_name("body").ok_or_else(|| {
            Error::CodeParse(format!("{}: type declaration without a body", self.location(node)))
        })?;
        let header = collapse(&self.source[name.end_byte()..body.start_byte()]);

        let members = match body.kind() {
            "class_body" | "interface_body" => self.members(body)?,
            "enum_body" => self.enum_members(body)?,
            _ => {
                // Annotation type bodies are kept as written
                let inner = self.block_text(body);
                let inner = inner
                    .trim()
                    .trim_start_matches('{')
                    .trim_end_matches('}')
                    .trim();
                if inner.is_empty() {
                    Vec::new()
                } else {
                    vec![Member::Raw(dedent_all(inner))]
                }
            }
        };

        Ok(ClassDecl {
            doc,
            name: self.text(name).to_string(),
            kind,
            modifiers,
            markers,
            header,
            members,
        })
    }

    fn members(&self, body: Node<'_>) -> Result<Vec<Member>> {
        let mut members = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            if is_comment(&child) {
                pending.push(self.block_text(child));
                continue;
            }
            match child.kind() {
                "field_declaration" | "constant_declaration" => {
                    let doc = take_doc(&mut pending);
                    members.extend(self.fields(child, doc).into_iter().map(Member::Field));
                }
                "method_declaration" => {
                    let doc = take_doc(&mut pending);
                    members.push(Member::Method(self.method(child, doc)));
                }
                "constructor_declaration" => {
                    let doc = take_doc(&mut pending);
                    members.push(Member::Constructor(self.method(child, doc)));
                }
                "class_declaration"
                | "interface_declaration"
                | "enum_declaration"
                | "record_declaration"
                | "annotation_type_declaration" => {
                    let doc = take_doc(&mut pending);
                    members.push(Member::Class(self.class(child, doc)?));
                }
                "block" => {
                    members.extend(pending.drain(..).map(Member::Raw));
                    members.push(Member::Initializer(self.block(child)));
                }
                _ => {
                    members.extend(pending.drain(..).map(Member::Raw));
                    members.push(Member::Raw(self.block_text(child)));
                }
            }
        }
        members.extend(pending.into_iter().map(Member::Raw));
        Ok(members)
    }

    fn enum_members(&self, body: Node<'_>) -> Result<Vec<Member>> {
        let named = self.named(body);
        let constants: Vec<String> = named
            .iter()
            .filter(|n| n.kind() == "enum_constant")
            .map(|n| collapse(self.text(*n)))
            .collect();
        let mut members = Vec::new();
        if !constants.is_empty() {
            members.push(Member::Raw(format!("{};", constants.join(", "))));
        }
        if let Some(decls) = named.iter().find(|n| n.kind() == "enum_body_declarations") {
            members.extend(self.members(*decls)?);
        }
        Ok(members)
    }

    fn fields(&self, node: Node<'_>, doc: Option<String>) -> Vec<FieldDecl> {
        let (modifiers, markers) = self.modifiers(node);
        let ty = self.type_ref(node.child_by_field_name("type"));
        let mut doc = doc;
        let mut cursor = node.walk();
        let declarators: Vec<Node<'_>> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        declarators
            .into_iter()
            .map(|decl| {
                let (name, ty) = self.declarator_name(decl, &ty);
                FieldDecl {
                    doc: doc.take(),
                    markers: markers.clone(),
                    modifiers: modifiers.clone(),
                    ty,
                    name,
                    init: decl.child_by_field_name("value").map(|v| self.initializer(v)),
                }
            })
            .collect()
    }

    /// Name of a variable declarator, with C-style dimensions moved onto the type
    fn declarator_name(&self, decl: Node<'_>, ty: &TypeRef) -> (String, TypeRef) {
        let name = decl
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let ty = match decl.child_by_field_name("dimensions") {
            Some(dims) => TypeRef::new(format!("{}{}", ty, collapse(self.text(dims)))),
            None => ty.clone(),
        };
        (name, ty)
    }

    fn initializer(&self, node: Node<'_>) -> Expr {
        if node.kind() == "array_initializer" {
            Expr::ArrayInit(
                self.named(node)
                    .into_iter()
                    .map(|n| self.initializer(n))
                    .collect(),
            )
        } else {
            self.expr(node)
        }
    }

    fn method(&self, node: Node<'_>, doc: Option<String>) -> MethodDecl {
        let (modifiers, markers) = self.modifiers(node);
        let throws = child_of_kind(node, "throws").map(|t| {
            let text = collapse(self.text(t));
            text.strip_prefix("throws").unwrap_or(&text).trim().to_string()
        });
        let return_type = if node.kind() == "method_declaration" {
            Some(self.type_ref(node.child_by_field_name("type")))
        } else {
            None
        };
        MethodDecl {
            doc,
            markers,
            modifiers,
            type_params: node
                .child_by_field_name("type_parameters")
                .map(|n| collapse(self.text(n))),
            return_type,
            name: node
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .unwrap_or_default(),
            params: node
                .child_by_field_name("parameters")
                .map(|p| self.params(p))
                .unwrap_or_default(),
            throws,
            body: node.child_by_field_name("body").map(|b| self.block(b)),
        }
    }

    fn params(&self, node: Node<'_>) -> Vec<Param> {
        let mut params = Vec::new();
        for child in self.named(node) {
            match child.kind() {
                "formal_parameter" => {
                    let (modifiers, markers) = self.modifiers(child);
                    let base = self.type_ref(child.child_by_field_name("type"));
                    let (name, ty) = self.declarator_name(child, &base);
                    params.push(Param {
                        markers,
                        keywords: modifiers.keywords,
                        ty,
                        name,
                        varargs: false,
                    });
                }
                "spread_parameter" => {
                    let (modifiers, markers) = self.modifiers(child);
                    let named = self.named(child);
                    let ty = named
                        .iter()
                        .find(|n| !matches!(n.kind(), "modifiers" | "variable_declarator"))
                        .copied();
                    let name = named
                        .iter()
                        .find(|n| n.kind() == "variable_declarator")
                        .and_then(|d| d.child_by_field_name("name"))
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    params.push(Param {
                        markers,
                        keywords: modifiers.keywords,
                        ty: self.type_ref(ty),
                        name,
                        varargs: true,
                    });
                }
                _ => {}
            }
        }
        params
    }

    fn block(&self, node: Node<'_>) -> Block {
        let mut stmts = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.stmt(child, &mut stmts);
        }
        Block { stmts }
    }

    /// A statement in a position that takes exactly one
    fn single(&self, node: Node<'_>) -> Stmt {
        let mut out = Vec::new();
        self.stmt(node, &mut out);
        if out.len() == 1 {
            out.remove(0)
        } else {
            Stmt::Block(Block { stmts: out })
        }
    }

    /// Condition of `if`/`while`, without its parentheses
    fn condition(&self, node: Option<Node<'_>>) -> Expr {
        match node {
            Some(n) if n.kind() == "parenthesized_expression" => match self.named(n).first() {
                Some(inner) => self.expr(*inner),
                None => Expr::Raw(self.text(n).to_string()),
            },
            Some(n) => self.expr(n),
            None => Expr::Raw(String::new()),
        }
    }

    fn locals(&self, node: Node<'_>, out: &mut Vec<Stmt>) {
        let (modifiers, markers) = self.modifiers(node);
        if !markers.is_empty() {
            out.push(Stmt::Raw(self.block_text(node)));
            return;
        }
        let ty = self.type_ref(node.child_by_field_name("type"));
        let mut cursor = node.walk();
        let declarators: Vec<Node<'_>> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for decl in declarators {
            let (name, ty) = self.declarator_name(decl, &ty);
            out.push(Stmt::Local {
                keywords: modifiers.keywords.clone(),
                ty,
                name,
                init: decl.child_by_field_name("value").map(|v| self.initializer(v)),
            });
        }
    }

    fn stmt(&self, node: Node<'_>, out: &mut Vec<Stmt>) {
        let stmt = match node.kind() {
            "local_variable_declaration" => return self.locals(node, out),
            "expression_statement" => match self.named(node).first() {
                Some(e) => Stmt::Expr(self.expr(*e)),
                None => return,
            },
            "return_statement" => Stmt::Return(self.named(node).first().map(|e| self.expr(*e))),
            "throw_statement" => match self.named(node).first() {
                Some(e) => Stmt::Throw(self.expr(*e)),
                None => Stmt::Raw(self.block_text(node)),
            },
            "block" => Stmt::Block(self.block(node)),
            "explicit_constructor_invocation" => Stmt::Expr(Expr::Call {
                target: node
                    .child_by_field_name("object")
                    .map(|o| Box::new(self.expr(o))),
                name: node
                    .child_by_field_name("constructor")
                    .map(|c| self.text(c).to_string())
                    .unwrap_or_else(|| "super".into()),
                args: node
                    .child_by_field_name("arguments")
                    .map(|a| self.args(a))
                    .unwrap_or_default(),
            }),
            "if_statement" => match node.child_by_field_name("consequence") {
                Some(then) => Stmt::If {
                    cond: self.condition(node.child_by_field_name("condition")),
                    then_branch: Box::new(self.single(then)),
                    else_branch: node
                        .child_by_field_name("alternative")
                        .map(|e| Box::new(self.single(e))),
                },
                None => Stmt::Raw(self.block_text(node)),
            },
            "while_statement" => match node.child_by_field_name("body") {
                Some(body) => Stmt::While {
                    cond: self.condition(node.child_by_field_name("condition")),
                    body: Box::new(self.single(body)),
                },
                None => Stmt::Raw(self.block_text(node)),
            },
            "for_statement" => match node.child_by_field_name("body") {
                Some(body) => {
                    let mut init = Vec::new();
                    let mut update = Vec::new();
                    let mut cursor = node.walk();
                    let inits: Vec<Node<'_>> =
                        node.children_by_field_name("init", &mut cursor).collect();
                    for i in inits {
                        if i.kind() == "local_variable_declaration" {
                            self.locals(i, &mut init);
                        } else {
                            init.push(Stmt::Expr(self.expr(i)));
                        }
                    }
                    let updates: Vec<Node<'_>> =
                        node.children_by_field_name("update", &mut cursor).collect();
                    for u in updates {
                        update.push(self.expr(u));
                    }
                    Stmt::For {
                        init,
                        cond: node.child_by_field_name("condition").map(|c| self.expr(c)),
                        update,
                        body: Box::new(self.single(body)),
                    }
                }
                None => Stmt::Raw(self.block_text(node)),
            },
            "enhanced_for_statement" => {
                let (modifiers, markers) = self.modifiers(node);
                match (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("value"),
                    node.child_by_field_name("body"),
                ) {
                    (Some(name), Some(value), Some(body))
                        if modifiers.keywords.is_empty() && markers.is_empty() =>
                    {
                        Stmt::ForEach {
                            ty: self.type_ref(node.child_by_field_name("type")),
                            name: self.text(name).to_string(),
                            iterable: self.expr(value),
                            body: Box::new(self.single(body)),
                        }
                    }
                    _ => Stmt::Raw(self.block_text(node)),
                }
            }
            _ => Stmt::Raw(self.block_text(node)),
        };
        out.push(stmt);
    }

    fn args(&self, node: Node<'_>) -> Vec<Expr> {
        self.named(node).into_iter().map(|a| self.expr(a)).collect()
    }

    fn boxed(&self, node: Option<Node<'_>>) -> Option<Box<Expr>> {
        node.map(|n| Box::new(self.expr(n)))
    }

    fn expr(&self, node: Node<'_>) -> Expr {
        self.try_expr(node)
            .unwrap_or_else(|| Expr::Raw(self.block_text(node)))
    }

    /// Modelled expressions; `None` falls back to raw text
    fn try_expr(&self, node: Node<'_>) -> Option<Expr> {
        Some(match node.kind() {
            "identifier" => Expr::Name(self.text(node).to_string()),
            "this" => Expr::This,
            "true"
            | "false"
            | "null_literal"
            | "string_literal"
            | "character_literal"
            | "text_block"
            | "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal"
            | "decimal_floating_point_literal"
            | "hex_floating_point_literal" => Expr::Literal(self.text(node).to_string()),
            "field_access" => Expr::FieldAccess {
                target: self.boxed(node.child_by_field_name("object"))?,
                name: self.text(node.child_by_field_name("field")?).to_string(),
            },
            "method_invocation" => {
                if node.child_by_field_name("type_arguments").is_some() {
                    return None;
                }
                Expr::Call {
                    target: self.boxed(node.child_by_field_name("object")),
                    name: self.text(node.child_by_field_name("name")?).to_string(),
                    args: self.args(node.child_by_field_name("arguments")?),
                }
            }
            "object_creation_expression" => {
                if child_of_kind(node, "class_body").is_some()
                    || node.child_by_field_name("object").is_some()
                    || node.child_by_field_name("type_arguments").is_some()
                {
                    return None;
                }
                Expr::New {
                    ty: self.type_ref(node.child_by_field_name("type")),
                    args: self.args(node.child_by_field_name("arguments")?),
                }
            }
            "assignment_expression" => Expr::Assign {
                target: self.boxed(node.child_by_field_name("left"))?,
                op: self.text(node.child_by_field_name("operator")?).to_string(),
                value: self.boxed(node.child_by_field_name("right"))?,
            },
            "binary_expression" => Expr::Binary {
                left: self.boxed(node.child_by_field_name("left"))?,
                op: self.text(node.child_by_field_name("operator")?).to_string(),
                right: self.boxed(node.child_by_field_name("right"))?,
            },
            "unary_expression" => Expr::Unary {
                op: self.text(node.child_by_field_name("operator")?).to_string(),
                operand: self.boxed(node.child_by_field_name("operand"))?,
                postfix: false,
            },
            "update_expression" => {
                let mut cursor = node.walk();
                let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
                let operand = children.iter().find(|c| c.is_named())?;
                let op = children.iter().find(|c| !c.is_named())?;
                Expr::Unary {
                    op: self.text(*op).to_string(),
                    operand: Box::new(self.expr(*operand)),
                    postfix: op.start_byte() > operand.start_byte(),
                }
            }
            "cast_expression" => Expr::Cast {
                ty: self.type_ref(node.child_by_field_name("type")),
                expr: self.boxed(node.child_by_field_name("value"))?,
            },
            "ternary_expression" => Expr::Conditional {
                cond: self.boxed(node.child_by_field_name("condition"))?,
                then_expr: self.boxed(node.child_by_field_name("consequence"))?,
                else_expr: self.boxed(node.child_by_field_name("alternative"))?,
            },
            "parenthesized_expression" => Expr::Paren(Box::new(self.expr(*self.named(node).first()?))),
            "lambda_expression" => {
                let params_node = node.child_by_field_name("parameters")?;
                let params = match params_node.kind() {
                    "identifier" => vec![self.text(params_node).to_string()],
                    "inferred_parameters" => self
                        .named(params_node)
                        .into_iter()
                        .map(|p| self.text(p).to_string())
                        .collect(),
                    "formal_parameters" if self.named(params_node).is_empty() => Vec::new(),
                    _ => return None,
                };
                let body_node = node.child_by_field_name("body")?;
                let body = if body_node.kind() == "block" {
                    LambdaBody::Block(self.block(body_node))
                } else {
                    LambdaBody::Expr(Box::new(self.expr(body_node)))
                };
                Expr::Lambda { params, body }
            }
            "array_initializer" => Expr::ArrayInit(
                self.named(node)
                    .into_iter()
                    .map(|n| self.initializer(n))
                    .collect(),
            ),
            "class_literal" => Expr::ClassLit(self.type_ref(self.named(node).first().copied())),
            _ => return None,
        })
    }
}

fn take_doc(pending: &mut Vec<String>) -> Option<String> {
    if pending.is_empty() {
        None
    } else {
        Some(pending.drain(..).collect::<Vec<_>>().join("\n"))
    }
}

/// Remove the common leading whitespace of all lines but the first
fn dedent_all(text: &str) -> String {
    let indent = text
        .lines()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    dedent(text, indent)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROLLER: &str = r#"/*
 * Copyright Acme
 */
package com.acme.web;

import org.springframework.beans.factory.annotation.Autowired;
import org.springframework.web.bind.annotation.*;

/** Serves orders. */
@RestController
public class OrderController extends Base implements Api {
    @Autowired
    private OrderService service;

    private int a, b[];

    public OrderController() {
        super();
    }

    @RequestMapping(value = "/orders/{id}", method = RequestMethod.GET)
    public Order get(@PathVariable("id") String orderId, String... tags) throws NotFound {
        for (int i = 0; i < tags.length; i++) {
            log(tags[i]);
        }
        tags.forEach(t -> log(t));
        return service.find(orderId);
    }

    public void setService(OrderService service) {
        this.service = service;
    }
}
"#;

    fn unit() -> ProgramUnit {
        parse_java(CONTROLLER, "com/acme/web/OrderController.java").unwrap()
    }

    #[test]
    fn test_package_imports_and_preamble() {
        let unit = unit();
        assert_eq!(unit.package.as_deref(), Some("com.acme.web"));
        assert_eq!(unit.imports.len(), 2);
        assert!(unit.preamble.as_deref().unwrap().contains("Copyright Acme"));
    }

    #[test]
    fn test_class_header_and_doc() {
        let unit = unit();
        let class = &unit.types[0];
        assert_eq!(class.name, "OrderController");
        assert_eq!(class.header, "extends Base implements Api");
        assert_eq!(class.doc.as_deref(), Some("/** Serves orders. */"));
        assert!(class.has_marker("RestController"));
        assert_eq!(class.modifiers.visibility, Visibility::Public);
    }

    #[test]
    fn test_fields_split_per_declarator() {
        let unit = unit();
        let class = &unit.types[0];
        let names: Vec<_> = class.fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["service", "a", "b"]);
        assert_eq!(class.field("b").unwrap().ty, TypeRef::new("int[]"));
        assert_eq!(class.field("service").unwrap().markers[0].name, "Autowired");
        assert_eq!(class.field("service").unwrap().markers[0].args, None);
    }

    #[test]
    fn test_marker_arguments() {
        let unit = unit();
        let (_, get) = unit.types[0].methods().find(|(_, m)| m.name == "get").unwrap();
        let mapping = &get.markers[0];
        assert_eq!(mapping.arg("value").unwrap().as_string_literal().as_deref(), Some("/orders/{id}"));
        assert!(matches!(
            mapping.arg("method"),
            Some(Expr::FieldAccess { name, .. }) if name == "GET"
        ));
        let param = &get.params[0];
        assert_eq!(param.name, "orderId");
        assert_eq!(param.markers[0].arg("value").unwrap().as_string_literal().as_deref(), Some("id"));
        assert!(get.params[1].varargs);
        assert_eq!(get.params[1].ty, TypeRef::new("String"));
        assert_eq!(get.throws.as_deref(), Some("NotFound"));
    }

    #[test]
    fn test_method_bodies_are_modelled() {
        let unit = unit();
        let (_, get) = unit.types[0].methods().find(|(_, m)| m.name == "get").unwrap();
        let stmts = &get.body.as_ref().unwrap().stmts;
        assert!(matches!(stmts[0], Stmt::For { .. }));
        assert!(matches!(
            &stmts[1],
            Stmt::Expr(Expr::Call { args, .. }) if matches!(args[0], Expr::Lambda { .. })
        ));
        assert!(matches!(stmts[2], Stmt::Return(Some(Expr::Call { .. }))));
    }

    #[test]
    fn test_constructor_and_setter() {
        let unit = unit();
        let class = &unit.types[0];
        let (_, ctor) = class.constructors().next().unwrap();
        assert!(ctor.is_constructor());
        assert!(matches!(
            &ctor.body.as_ref().unwrap().stmts[0],
            Stmt::Expr(Expr::Call { name, target: None, .. }) if name == "super"
        ));
        let (_, setter) = class.methods().find(|(_, m)| m.name == "setService").unwrap();
        assert_eq!(
            setter.body.as_ref().unwrap().stmts[0],
            Stmt::Expr(Expr::assign_this("service", Expr::name("service")))
        );
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = parse_java("class A { void f( }", "A.java").unwrap_err();
        assert!(err.to_string().contains("A.java:1"));
    }

    #[test]
    fn test_enum_constants_kept_raw() {
        let unit = parse_java("enum Color { RED, GREEN; int x; }", "Color.java").unwrap();
        let class = &unit.types[0];
        assert_eq!(class.kind, TypeKind::Enum);
        assert_eq!(class.members[0], Member::Raw("RED, GREEN;".into()));
        assert!(class.field("x").is_some());
    }
}
