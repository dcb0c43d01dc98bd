//! Explicit parameter-name elision
//!
//! `@PathVariable("id") String orderId` binds the name `id`. Renaming the
//! parameter to `id` makes the explicit name redundant. The rename goes
//! through the scope resolver; if it would capture or shadow anything the
//! explicit name stays, since dropping it alone would change the binding.

use super::{RewriteRule, RuleContext, RuleOutcome};
use crate::ast::{Member, MethodDecl, ProgramUnit};
use crate::diagnostics::DiagnosticKind;
use crate::error::Result;
use crate::markers::{Capability, CapabilityKind};
use crate::scope::ScopeTree;
use tracing::debug;

/// Renames parameters to their bound names and drops the explicit name
pub struct ElideParameterNames;

#[derive(Debug)]
struct Site {
    class_path: String,
    member: usize,
    param: usize,
    marker: usize,
    attribute: String,
    bound: String,
}

impl RewriteRule for ElideParameterNames {
    fn name(&self) -> &'static str {
        "elide-parameter-names"
    }

    fn apply(&self, unit: &mut ProgramUnit, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        let mut outcome = RuleOutcome::unchanged();
        for site in collect_sites(unit, ctx) {
            let Some(method) = method_at(unit, &site.class_path, site.member) else {
                continue;
            };
            let Some(param) = method.params.get(site.param) else {
                continue;
            };
            let location = format!("{}.{}({})", site.class_path, method.name, param.name);

            if param.name != site.bound {
                // The tree is stale after every rename, so build it per site
                let tree = ScopeTree::build(unit);
                let decl = tree
                    .method_scope(&site.class_path, site.member)
                    .and_then(|scope| tree.scope(scope).declares(&param.name));
                let Some(decl) = decl else {
                    continue;
                };
                let old = param.name.clone();
                match tree.rename(unit, decl, &site.bound) {
                    Ok(count) => {
                        debug!(unit = %unit.path, %location, new = %site.bound, count, "renamed parameter");
                    }
                    Err(conflict) => {
                        debug!(unit = %unit.path, %location, %conflict, "rename refused");
                        outcome.report(
                            DiagnosticKind::RenameConflict,
                            unit,
                            location,
                            format!("cannot rename '{}' to '{}': {}", old, site.bound, conflict),
                        );
                        continue;
                    }
                }
            }

            let marker = match unit
                .class_mut(&site.class_path)
                .and_then(|c| c.members.get_mut(site.member))
            {
                Some(Member::Method(m)) | Some(Member::Constructor(m)) => m
                    .params
                    .get_mut(site.param)
                    .and_then(|p| p.markers.get_mut(site.marker)),
                _ => None,
            };
            if let Some(marker) = marker {
                marker.remove_arg(&site.attribute);
                outcome.mark_changed();
            }
        }
        Ok(outcome)
    }
}

fn method_at<'u>(unit: &'u ProgramUnit, class_path: &str, member: usize) -> Option<&'u MethodDecl> {
    match unit.class(class_path)?.members.get(member)? {
        Member::Method(m) | Member::Constructor(m) => Some(m),
        _ => None,
    }
}

/// Parameter markers that bind a name through a string attribute
fn collect_sites(unit: &ProgramUnit, ctx: &RuleContext<'_>) -> Vec<Site> {
    let mut sites = Vec::new();
    for class_path in unit.class_paths() {
        let Some(class) = unit.class(&class_path) else {
            continue;
        };
        for (member, entry) in class.members.iter().enumerate() {
            let (Member::Method(method) | Member::Constructor(method)) = entry else {
                continue;
            };
            for (param_index, param) in method.params.iter().enumerate() {
                for (marker_index, marker) in param.markers.iter().enumerate() {
                    let Some(Capability::NamesParameter { attributes }) =
                        ctx.capability(&unit.imports, marker, CapabilityKind::NamesParameter)
                    else {
                        continue;
                    };
                    let bound = attributes.iter().find_map(|attr| {
                        let value = marker.arg(attr)?.as_string_literal()?;
                        Some((attr.clone(), value))
                    });
                    if let Some((attribute, bound)) = bound {
                        sites.push(Site {
                            class_path: class_path.clone(),
                            member,
                            param: param_index,
                            marker: marker_index,
                            attribute,
                            bound,
                        });
                    }
                }
            }
        }
    }
    sites
}
