//! Rewrite rules
//!
//! Each rule is a focused transformation of one [`ProgramUnit`]. Rules are
//! run in order, repeatedly, by the [`Pipeline`](crate::pipeline::Pipeline)
//! until none of them reports a change. A rule must therefore report
//! `changed` only when it actually edited the unit, and must leave a unit it
//! has already rewritten alone on the next pass.
//!
//! Rules never match on concrete marker names. They go through the
//! [`MarkerCatalog`] and ask for capabilities.

mod component_scan;
mod consolidate;
mod inert;
mod param_name;
mod request_mapping;
mod visibility;

pub use component_scan::{scannable_classes, MakeComponentScannable};
pub use consolidate::ConsolidateInjection;
pub use inert::RemoveInertMarkers;
pub use param_name::ElideParameterNames;
pub use request_mapping::ElideRequestMethod;
pub use visibility::NormalizeFactoryVisibility;

use crate::ast::{AccessIndex, Marker, ProgramUnit};
use crate::config::NullabilityConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::Result;
use crate::imports::{AddOutcome, Import, ImportReconciler, ImportSet};
use crate::markers::{Capability, CapabilityKind, MarkerCatalog, MarkerDef};
use crate::registry::Registry;

/// A single rewrite over one program unit
pub trait RewriteRule: Send + Sync {
    /// Stable rule name, used in logs and errors
    fn name(&self) -> &'static str;

    /// Rewrite `unit` in place
    fn apply(&self, unit: &mut ProgramUnit, ctx: &RuleContext<'_>) -> Result<RuleOutcome>;
}

/// What a rule did to a unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    pub changed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl RuleOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        unit: &ProgramUnit,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics
            .push(Diagnostic::new(kind, unit.path.clone(), location, message));
    }
}

/// Read-only session state shared by every rule
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub registry: &'a Registry,
    pub catalog: &'a MarkerCatalog,
    pub reconciler: &'a ImportReconciler,
    pub nullability: &'a NullabilityConfig,
    /// Cross-unit accesses of the whole source tree. Without one, rules
    /// keep every declaration other units might reach.
    pub accesses: Option<&'a AccessIndex>,
}

impl<'a> RuleContext<'a> {
    /// Catalog entry a marker refers to in a unit with `imports`.
    ///
    /// A simple name explicitly imported from another namespace is not the
    /// catalog's marker, even when the simple names agree.
    pub fn resolve(&self, imports: &ImportSet, marker: &Marker) -> Option<&'a MarkerDef> {
        let def = self.catalog.lookup(marker)?;
        if marker.is_qualified() {
            return Some(def);
        }
        let foreign = imports.iter().any(|i| match i {
            Import::Type { namespace, name } => name == &def.name && namespace != &def.namespace,
            _ => false,
        });
        if foreign {
            None
        } else {
            Some(def)
        }
    }

    pub fn capability(
        &self,
        imports: &ImportSet,
        marker: &Marker,
        kind: CapabilityKind,
    ) -> Option<&'a Capability> {
        self.resolve(imports, marker)?.capability(kind)
    }

    pub fn has(&self, imports: &ImportSet, marker: &Marker, kind: CapabilityKind) -> bool {
        self.capability(imports, marker, kind).is_some()
    }

    /// Make a marker type usable in `unit` and return the name to write.
    ///
    /// Falls back to the qualified name, with an `ImportAmbiguity`
    /// diagnostic, when another type of the same simple name is in scope.
    pub fn import_marker(
        &self,
        unit: &mut ProgramUnit,
        namespace: &str,
        name: &str,
        location: &str,
        outcome: &mut RuleOutcome,
    ) -> String {
        match self.reconciler.add_type_to_unit(unit, namespace, name) {
            AddOutcome::Conflict(existing) => {
                outcome.report(
                    DiagnosticKind::ImportAmbiguity,
                    unit,
                    location,
                    format!(
                        "'{}' already refers to {}; writing {}.{} qualified",
                        name, existing, namespace, name
                    ),
                );
                format!("{}.{}", namespace, name)
            }
            _ => name.to_string(),
        }
    }

    /// Drop the imports of removed markers that nothing references anymore
    pub fn release_markers<'m>(&self, unit: &mut ProgramUnit, removed: impl IntoIterator<Item = &'m Marker>) {
        let mut seen = Vec::new();
        for marker in removed {
            if marker.is_qualified() || seen.contains(&marker.name) {
                continue;
            }
            seen.push(marker.name.clone());
            let Some(def) = self.resolve(&unit.imports, marker) else {
                continue;
            };
            self.reconciler
                .remove_type_from_unit(unit, &def.namespace, &def.name);
        }
    }
}

/// The built-in rule list, in application order
pub fn default_rules() -> Vec<Box<dyn RewriteRule>> {
    vec![
        Box::new(MakeComponentScannable),
        Box::new(ConsolidateInjection),
        Box::new(ElideRequestMethod),
        Box::new(ElideParameterNames),
        Box::new(NormalizeFactoryVisibility),
        Box::new(RemoveInertMarkers),
    ]
}

/// `Name` for `name`
pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `orderService` for `OrderService`
pub(crate) fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
