//! Request-method narrowing elision
//!
//! `@RequestMapping(value = "/x", method = RequestMethod.GET)` on a method
//! says exactly what `@GetMapping("/x")` says. The narrowing attribute may
//! be written as a qualified constant, a statically imported constant, a
//! string, or a one-element array of any of those.

use super::{RewriteRule, RuleContext, RuleOutcome};
use crate::ast::{Expr, Member, ProgramUnit};
use crate::error::Result;
use crate::imports::{Import, ImportSet};
use crate::markers::{Capability, CapabilityKind, MarkerDef};
use tracing::debug;

/// Replaces compound mappings narrowed to one method by the specific marker
pub struct ElideRequestMethod;

/// How the narrowing constant was spelled
#[derive(Debug, Clone, PartialEq, Eq)]
enum Spelling {
    /// `RequestMethod.GET`, through the owner's simple name
    OwnerSimple,
    /// `org...RequestMethod.GET`
    OwnerQualified,
    /// `GET` via a static import
    StaticImport,
    /// `"GET"`
    Literal,
}

#[derive(Debug)]
struct Edit<'c> {
    class_path: String,
    member: usize,
    marker: usize,
    attribute: String,
    owner: String,
    constant: String,
    spelling: Spelling,
    shortcut: &'c MarkerDef,
}

impl RewriteRule for ElideRequestMethod {
    fn name(&self) -> &'static str {
        "elide-request-method"
    }

    fn apply(&self, unit: &mut ProgramUnit, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        let mut outcome = RuleOutcome::unchanged();
        let edits = collect_edits(unit, ctx);
        if edits.is_empty() {
            return Ok(outcome);
        }

        let mut removed = Vec::new();
        for edit in &edits {
            let location = format!("{}.{}", edit.class_path, method_name(unit, edit));
            let qualified = unit
                .class(&edit.class_path)
                .and_then(|c| match c.members.get(edit.member) {
                    Some(Member::Method(m)) => m.markers.get(edit.marker),
                    _ => None,
                })
                .is_some_and(|m| m.is_qualified());
            let new_name = if qualified {
                edit.shortcut.qualified()
            } else {
                ctx.import_marker(
                    unit,
                    &edit.shortcut.namespace,
                    &edit.shortcut.name,
                    &location,
                    &mut outcome,
                )
            };

            let Some(Member::Method(method)) = unit
                .class_mut(&edit.class_path)
                .and_then(|c| c.members.get_mut(edit.member))
            else {
                continue;
            };
            let Some(marker) = method.markers.get_mut(edit.marker) else {
                continue;
            };
            removed.push(marker.clone());
            marker.remove_arg(&edit.attribute);
            marker.name = new_name;
            debug!(unit = %unit.path, %location, shortcut = %edit.shortcut.name, "elided request method");
            outcome.mark_changed();
        }

        ctx.release_markers(unit, &removed);
        for edit in &edits {
            match edit.spelling {
                Spelling::StaticImport => {
                    ctx.reconciler
                        .remove_static_from_unit(unit, &edit.owner, &edit.constant);
                }
                Spelling::OwnerSimple => {
                    if let Some((namespace, name)) = edit.owner.rsplit_once('.') {
                        ctx.reconciler.remove_type_from_unit(unit, namespace, name);
                    }
                }
                Spelling::OwnerQualified | Spelling::Literal => {}
            }
        }
        Ok(outcome)
    }
}

fn method_name(unit: &ProgramUnit, edit: &Edit<'_>) -> String {
    unit.class(&edit.class_path)
        .and_then(|c| match c.members.get(edit.member) {
            Some(Member::Method(m)) => Some(m.name.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn collect_edits<'c>(unit: &ProgramUnit, ctx: &RuleContext<'c>) -> Vec<Edit<'c>> {
    let mut edits = Vec::new();
    for class_path in unit.class_paths() {
        let Some(class) = unit.class(&class_path) else {
            continue;
        };
        for (member, method) in class.methods() {
            for (index, marker) in method.markers.iter().enumerate() {
                let Some(Capability::BindsRequestMethod {
                    attribute,
                    constants_owner,
                }) = ctx.capability(&unit.imports, marker, CapabilityKind::BindsRequestMethod)
                else {
                    continue;
                };
                let Some(value) = marker.arg(attribute) else {
                    continue;
                };
                let Some((constant, spelling)) = narrowed_constant(value, constants_owner, &unit.imports) else {
                    continue;
                };
                let Some(shortcut) = ctx.catalog.shortcut_for(&constant) else {
                    continue;
                };
                edits.push(Edit {
                    class_path: class_path.clone(),
                    member,
                    marker: index,
                    attribute: attribute.clone(),
                    owner: constants_owner.clone(),
                    constant,
                    spelling,
                    shortcut,
                });
            }
        }
    }
    edits
}

/// The single request-method constant an attribute value names
fn narrowed_constant(value: &Expr, owner: &str, imports: &ImportSet) -> Option<(String, Spelling)> {
    let owner_simple = owner.rsplit('.').next().unwrap_or(owner);
    match value {
        Expr::ArrayInit(items) => match items.as_slice() {
            [single] => narrowed_constant(single, owner, imports),
            _ => None,
        },
        Expr::FieldAccess { target, name } => {
            let spelling = match target.as_ref() {
                Expr::Name(n) if n == owner_simple => Spelling::OwnerSimple,
                // tree-sitter reads `a.b.C` as nested field accesses
                other if crate::render::java_expr(other) == owner => Spelling::OwnerQualified,
                _ => return None,
            };
            Some((name.clone(), spelling))
        }
        Expr::Name(n) => {
            let imported = imports.iter().any(|i| match i {
                Import::Static { owner: o, member } => o == owner && member == n,
                Import::StaticWildcard { owner: o } => o == owner,
                _ => false,
            });
            imported.then(|| (n.clone(), Spelling::StaticImport))
        }
        Expr::Literal(_) => value.as_string_literal().map(|s| (s, Spelling::Literal)),
        _ => None,
    }
}
