//! Inert marker removal
//!
//! Some markers assert nothing in certain positions: an injection marker on
//! the only constructor of a class is implied by the container, and some
//! markers are ignored altogether by current framework versions.
//! Parameter markers are never touched, since they may be the only thing
//! making a parameter injectable.

use super::{RewriteRule, RuleContext, RuleOutcome};
use crate::ast::{Marker, Member, ProgramUnit};
use crate::error::Result;
use crate::imports::ImportSet;
use crate::markers::{Capability, CapabilityKind, InertContext};
use tracing::debug;

/// Removes markers that are inert where they stand
pub struct RemoveInertMarkers;

fn inert_in(ctx: &RuleContext<'_>, imports: &ImportSet, marker: &Marker, sole_constructor: bool) -> bool {
    match ctx.capability(imports, marker, CapabilityKind::Inert) {
        Some(Capability::Inert {
            context: InertContext::Anywhere,
        }) => true,
        // `@Autowired(required = false)` on a constructor still means something
        Some(Capability::Inert {
            context: InertContext::SoleConstructor,
        }) => sole_constructor && marker.args.as_ref().is_none_or(|a| a.is_empty()),
        _ => false,
    }
}

fn strip(markers: &mut Vec<Marker>, removed: &mut Vec<Marker>, mut inert: impl FnMut(&Marker) -> bool) {
    let (gone, kept): (Vec<Marker>, Vec<Marker>) = markers.drain(..).partition(|m| inert(m));
    *markers = kept;
    removed.extend(gone);
}

impl RewriteRule for RemoveInertMarkers {
    fn name(&self) -> &'static str {
        "remove-inert-markers"
    }

    fn apply(&self, unit: &mut ProgramUnit, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        let mut outcome = RuleOutcome::unchanged();
        let imports = unit.imports.clone();
        let path = unit.path.clone();
        let mut removed = Vec::new();

        unit.for_each_class_mut(|class_path, class| {
            let before = removed.len();
            let sole = class.constructors().count() == 1;
            strip(&mut class.markers, &mut removed, |m| inert_in(ctx, &imports, m, false));
            for member in &mut class.members {
                match member {
                    Member::Field(f) => {
                        strip(&mut f.markers, &mut removed, |m| inert_in(ctx, &imports, m, false))
                    }
                    Member::Method(m) => {
                        strip(&mut m.markers, &mut removed, |mk| inert_in(ctx, &imports, mk, false))
                    }
                    Member::Constructor(c) => {
                        strip(&mut c.markers, &mut removed, |mk| inert_in(ctx, &imports, mk, sole))
                    }
                    _ => {}
                }
            }
            if removed.len() > before {
                debug!(unit = %path, class = %class_path, count = removed.len() - before, "removed inert markers");
            }
        });

        if !removed.is_empty() {
            outcome.mark_changed();
            ctx.release_markers(unit, &removed);
        }
        Ok(outcome)
    }
}
