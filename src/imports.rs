//! Import directives and the import reconciler
//!
//! The reconciler keeps a unit's import list minimal and correct while rules
//! add and remove references. It never guesses: a wildcard import is only
//! dropped or unfolded when every name it could still supply is accounted
//! for, either by the known-member table or by other imports.

use crate::ast::ProgramUnit;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Types visible in every unit without an import
const IMPLICIT_TYPES: &[&str] = &[
    "AutoCloseable",
    "Boolean",
    "Byte",
    "CharSequence",
    "Character",
    "Class",
    "Comparable",
    "Deprecated",
    "Double",
    "Enum",
    "Error",
    "Exception",
    "Float",
    "FunctionalInterface",
    "IllegalArgumentException",
    "IllegalStateException",
    "Integer",
    "Iterable",
    "Long",
    "Math",
    "Number",
    "Object",
    "Override",
    "Record",
    "Runnable",
    "RuntimeException",
    "SafeVarargs",
    "Short",
    "String",
    "StringBuilder",
    "SuppressWarnings",
    "System",
    "Thread",
    "Throwable",
    "Void",
];

/// A single import directive
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Import {
    /// `import a.b.Type;`
    Type { namespace: String, name: String },
    /// `import a.b.*;`
    Wildcard { namespace: String },
    /// `import static a.b.Type.MEMBER;`
    Static { owner: String, member: String },
    /// `import static a.b.Type.*;`
    StaticWildcard { owner: String },
}

impl Import {
    /// Build a type import from a qualified name
    pub fn of_type(qualified: &str) -> Option<Self> {
        let (namespace, name) = qualified.rsplit_once('.')?;
        Some(Import::Type {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Parse the text between `import` and `;`
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (is_static, path) = match text.strip_prefix("static") {
            Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest.trim()),
            _ => (false, text),
        };
        let path: String = path.chars().filter(|c| !c.is_whitespace()).collect();
        let (prefix, last) = path.rsplit_once('.')?;
        if prefix.is_empty() || last.is_empty() {
            return None;
        }
        Some(match (is_static, last) {
            (false, "*") => Import::Wildcard {
                namespace: prefix.to_string(),
            },
            (false, _) => Import::Type {
                namespace: prefix.to_string(),
                name: last.to_string(),
            },
            (true, "*") => Import::StaticWildcard {
                owner: prefix.to_string(),
            },
            (true, _) => Import::Static {
                owner: prefix.to_string(),
                member: last.to_string(),
            },
        })
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Import::Static { .. } | Import::StaticWildcard { .. })
    }

    /// Name this directive brings into scope, if it names exactly one
    pub fn simple_name(&self) -> Option<&str> {
        match self {
            Import::Type { name, .. } => Some(name),
            Import::Static { member, .. } => Some(member),
            _ => None,
        }
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Import::Type { namespace, name } => write!(f, "import {}.{};", namespace, name),
            Import::Wildcard { namespace } => write!(f, "import {}.*;", namespace),
            Import::Static { owner, member } => write!(f, "import static {}.{};", owner, member),
            Import::StaticWildcard { owner } => write!(f, "import static {}.*;", owner),
        }
    }
}

/// Ordered, duplicate-free import list of one unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportSet {
    directives: Vec<Import>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Import> {
        self.directives.iter()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn contains(&self, import: &Import) -> bool {
        self.directives.contains(import)
    }

    /// Append unless already present
    pub fn push(&mut self, import: Import) -> bool {
        if self.contains(&import) {
            return false;
        }
        self.directives.push(import);
        true
    }

    pub fn remove(&mut self, import: &Import) -> bool {
        let before = self.directives.len();
        self.directives.retain(|d| d != import);
        before != self.directives.len()
    }

    fn has_wildcard(&self, namespace: &str) -> bool {
        self.directives
            .iter()
            .any(|d| matches!(d, Import::Wildcard { namespace: ns } if ns == namespace))
    }

    fn has_static_wildcard(&self, owner: &str) -> bool {
        self.directives
            .iter()
            .any(|d| matches!(d, Import::StaticWildcard { owner: o } if o == owner))
    }

    /// Whether a single-name import (type or static) brings `name` in
    fn names_explicitly(&self, name: &str, statics: bool) -> bool {
        self.directives
            .iter()
            .any(|d| d.is_static() == statics && d.simple_name() == Some(name))
    }

    fn wildcard_namespaces(&self, statics: bool) -> Vec<&str> {
        self.directives
            .iter()
            .filter_map(|d| match d {
                Import::Wildcard { namespace } if !statics => Some(namespace.as_str()),
                Import::StaticWildcard { owner } if statics => Some(owner.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ImportSet {
    type Item = &'a Import;
    type IntoIter = std::slice::Iter<'a, Import>;

    fn into_iter(self) -> Self::IntoIter {
        self.directives.iter()
    }
}

impl FromIterator<Import> for ImportSet {
    fn from_iter<I: IntoIterator<Item = Import>>(iter: I) -> Self {
        let mut set = ImportSet::new();
        for import in iter {
            set.push(import);
        }
        set
    }
}

/// Import layout preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImportLayout {
    /// Single imports from one namespace folded into a wildcard at this count
    #[serde(default = "default_fold_threshold")]
    pub fold_threshold: usize,

    /// Replace a wildcard by single imports once few of its names remain
    #[serde(default)]
    pub unfold: bool,
}

fn default_fold_threshold() -> usize {
    5
}

impl Default for ImportLayout {
    fn default() -> Self {
        Self {
            fold_threshold: default_fold_threshold(),
            unfold: false,
        }
    }
}

/// Result of asking for a name to be imported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new directive was added
    Added,
    /// An existing single or wildcard import already supplies the name
    AlreadyCovered,
    /// The name needs no import (same package, `java.lang`)
    Implicit,
    /// Another binding of the same simple name is already in scope
    Conflict(String),
}

/// Names a unit still references, as seen by the reconciler
#[derive(Debug, Clone, Default)]
pub struct ImportUsage {
    referenced: BTreeSet<String>,
    declared: BTreeSet<String>,
}

impl ImportUsage {
    pub fn of(unit: &ProgramUnit) -> Self {
        let names = unit.names();
        Self {
            referenced: names.types.union(&names.values).cloned().collect(),
            declared: unit.declared_type_names(),
        }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            referenced: names.into_iter().map(Into::into).collect(),
            declared: BTreeSet::new(),
        }
    }

    pub fn is_referenced(&self, name: &str) -> bool {
        self.referenced.contains(name)
    }
}

/// Keeps import lists minimal as symbols come and go
#[derive(Debug, Clone, Default)]
pub struct ImportReconciler {
    layout: ImportLayout,
    /// Known members per namespace (types) or owner (static members)
    members: BTreeMap<String, BTreeSet<String>>,
    /// Namespaces whose member list above is exhaustive
    closed: BTreeSet<String>,
}

impl ImportReconciler {
    pub fn new(layout: ImportLayout) -> Self {
        Self {
            layout,
            members: BTreeMap::new(),
            closed: BTreeSet::new(),
        }
    }

    /// Record names known to live in `namespace`
    pub fn with_members<I, S>(mut self, namespace: &str, names: I, exhaustive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members
            .entry(namespace.to_string())
            .or_default()
            .extend(names.into_iter().map(Into::into));
        if exhaustive {
            self.closed.insert(namespace.to_string());
        }
        self
    }

    pub fn layout(&self) -> &ImportLayout {
        &self.layout
    }

    fn knows(&self, namespace: &str, name: &str) -> bool {
        self.members
            .get(namespace)
            .is_some_and(|m| m.contains(name))
    }

    // ------------------------------------------------------------------
    // Import-set level operations
    // ------------------------------------------------------------------

    /// Make `namespace.name` resolvable with the fewest new directives
    pub fn add_symbol(&self, imports: &mut ImportSet, namespace: &str, name: &str) -> AddOutcome {
        if namespace == "java.lang" {
            return AddOutcome::Implicit;
        }
        let wanted = Import::Type {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        if imports.contains(&wanted) || imports.has_wildcard(namespace) {
            return AddOutcome::AlreadyCovered;
        }
        if let Some(Import::Type { namespace: other, .. }) = imports
            .iter()
            .find(|d| !d.is_static() && d.simple_name() == Some(name))
        {
            return AddOutcome::Conflict(format!("{}.{}", other, name));
        }
        imports.push(wanted);
        AddOutcome::Added
    }

    /// Make a static member resolvable
    pub fn add_static(&self, imports: &mut ImportSet, owner: &str, member: &str) -> AddOutcome {
        let wanted = Import::Static {
            owner: owner.to_string(),
            member: member.to_string(),
        };
        if imports.contains(&wanted) || imports.has_static_wildcard(owner) {
            return AddOutcome::AlreadyCovered;
        }
        if let Some(Import::Static { owner: other, .. }) = imports
            .iter()
            .find(|d| d.is_static() && d.simple_name() == Some(member))
        {
            return AddOutcome::Conflict(format!("{}.{}", other, member));
        }
        imports.push(wanted);
        AddOutcome::Added
    }

    /// Drop the import supplying `namespace.name` if nothing needs it anymore
    pub fn remove_symbol_if_unused(
        &self,
        imports: &mut ImportSet,
        namespace: &str,
        name: &str,
        usage: &ImportUsage,
    ) -> bool {
        if usage.is_referenced(name) {
            return false;
        }
        let single = Import::Type {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        if imports.remove(&single) {
            debug!(import = %single, "removed unused import");
            return true;
        }
        if imports.has_wildcard(namespace) {
            return self.reconsider_wildcard(imports, namespace, usage, false);
        }
        false
    }

    /// Static counterpart of [`Self::remove_symbol_if_unused`]
    pub fn remove_static_if_unused(
        &self,
        imports: &mut ImportSet,
        owner: &str,
        member: &str,
        usage: &ImportUsage,
    ) -> bool {
        if usage.is_referenced(member) {
            return false;
        }
        let single = Import::Static {
            owner: owner.to_string(),
            member: member.to_string(),
        };
        if imports.remove(&single) {
            debug!(import = %single, "removed unused static import");
            return true;
        }
        if imports.has_static_wildcard(owner) {
            return self.reconsider_wildcard(imports, owner, usage, true);
        }
        false
    }

    /// Names a wildcard may still be supplying: the known members that are
    /// referenced, plus whether some referenced name has no known origin.
    fn wildcard_dependents(
        &self,
        imports: &ImportSet,
        namespace: &str,
        usage: &ImportUsage,
        statics: bool,
    ) -> (BTreeSet<String>, bool) {
        let mut known = BTreeSet::new();
        let mut unknown = false;
        let closed = self.closed.contains(namespace);
        let others: Vec<&str> = imports
            .wildcard_namespaces(statics)
            .into_iter()
            .filter(|ns| *ns != namespace)
            .collect();

        for name in &usage.referenced {
            if usage.declared.contains(name) || imports.names_explicitly(name, statics) {
                continue;
            }
            if self.knows(namespace, name) {
                known.insert(name.clone());
                continue;
            }
            if closed {
                continue;
            }
            // Only type-shaped names can silently come from a type wildcard;
            // static wildcards may supply anything.
            let type_shaped = name.chars().next().is_some_and(char::is_uppercase);
            if !statics && (!type_shaped || IMPLICIT_TYPES.contains(&name.as_str())) {
                continue;
            }
            if others.iter().any(|ns| self.knows(ns, name)) {
                continue;
            }
            unknown = true;
        }
        (known, unknown)
    }

    fn reconsider_wildcard(
        &self,
        imports: &mut ImportSet,
        namespace: &str,
        usage: &ImportUsage,
        statics: bool,
    ) -> bool {
        let (known, unknown) = self.wildcard_dependents(imports, namespace, usage, statics);
        let wildcard = if statics {
            Import::StaticWildcard {
                owner: namespace.to_string(),
            }
        } else {
            Import::Wildcard {
                namespace: namespace.to_string(),
            }
        };

        if unknown {
            return false;
        }
        if known.is_empty() {
            debug!(import = %wildcard, "removed unused wildcard import");
            return imports.remove(&wildcard);
        }
        // A lone survivor keeps its wildcard.
        if known.len() == 1 || !self.layout.unfold || known.len() >= self.layout.fold_threshold {
            return false;
        }

        let position = imports
            .directives
            .iter()
            .position(|d| d == &wildcard)
            .unwrap_or(imports.directives.len());
        imports.remove(&wildcard);
        let singles: Vec<Import> = known
            .into_iter()
            .map(|name| {
                if statics {
                    Import::Static {
                        owner: namespace.to_string(),
                        member: name,
                    }
                } else {
                    Import::Type {
                        namespace: namespace.to_string(),
                        name,
                    }
                }
            })
            .filter(|i| !imports.contains(i))
            .collect();
        debug!(import = %wildcard, count = singles.len(), "unfolded wildcard import");
        let tail = imports.directives.split_off(position.min(imports.directives.len()));
        imports.directives.extend(singles);
        imports.directives.extend(tail);
        true
    }

    /// Fold runs of single imports into wildcards where the layout asks for
    /// it and doing so cannot make any referenced name ambiguous.
    pub fn refold(&self, imports: &mut ImportSet, usage: &ImportUsage) -> bool {
        let mut changed = false;
        for statics in [false, true] {
            let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for d in imports.iter() {
                match d {
                    Import::Type { namespace, name } if !statics => {
                        groups.entry(namespace.clone()).or_default().push(name.clone())
                    }
                    Import::Static { owner, member } if statics => {
                        groups.entry(owner.clone()).or_default().push(member.clone())
                    }
                    _ => {}
                }
            }

            for (namespace, names) in groups {
                if names.len() < self.layout.fold_threshold {
                    continue;
                }
                let others: Vec<String> = imports
                    .wildcard_namespaces(statics)
                    .into_iter()
                    .filter(|ns| *ns != namespace)
                    .map(String::from)
                    .collect();

                // A name currently supplied by another wildcard that this
                // namespace also exports would become ambiguous.
                let clashes_with_other_wildcard = usage.referenced.iter().any(|n| {
                    !imports.names_explicitly(n, statics)
                        && !usage.declared.contains(n)
                        && self.knows(&namespace, n)
                        && others.iter().any(|o| self.knows(o, n))
                });
                if clashes_with_other_wildcard {
                    debug!(namespace = %namespace, "skipped folding: ambiguous name");
                    continue;
                }

                let keep: BTreeSet<&String> = names
                    .iter()
                    .filter(|n| others.iter().any(|o| self.knows(o, n)))
                    .collect();
                let wildcard = if statics {
                    Import::StaticWildcard {
                        owner: namespace.clone(),
                    }
                } else {
                    Import::Wildcard {
                        namespace: namespace.clone(),
                    }
                };

                let first = imports.directives.iter().position(|d| match d {
                    Import::Type { namespace: ns, .. } if !statics => ns == &namespace,
                    Import::Static { owner, .. } if statics => owner == &namespace,
                    _ => false,
                });
                let Some(first) = first else { continue };

                let mut rebuilt = Vec::with_capacity(imports.directives.len());
                for (i, d) in imports.directives.drain(..).enumerate() {
                    if i == first {
                        rebuilt.push(wildcard.clone());
                    }
                    let folded = match &d {
                        Import::Type { namespace: ns, name } if !statics => {
                            ns == &namespace && !keep.contains(name)
                        }
                        Import::Static { owner, member } if statics => {
                            owner == &namespace && !keep.contains(member)
                        }
                        _ => false,
                    };
                    if !folded && d != wildcard {
                        rebuilt.push(d);
                    }
                }
                imports.directives = rebuilt;
                debug!(import = %wildcard, "folded single imports");
                changed = true;
            }
        }
        changed
    }

    // ------------------------------------------------------------------
    // Unit level conveniences
    // ------------------------------------------------------------------

    /// Import a type into a unit, respecting its package and declared types
    pub fn add_type_to_unit(&self, unit: &mut ProgramUnit, namespace: &str, name: &str) -> AddOutcome {
        if unit.package.as_deref() == Some(namespace) {
            return AddOutcome::Implicit;
        }
        if unit.declared_type_names().contains(name) {
            return AddOutcome::Conflict(unit.qualify(name));
        }
        let outcome = self.add_symbol(&mut unit.imports, namespace, name);
        if outcome == AddOutcome::Added {
            let usage = ImportUsage::of(unit);
            self.refold(&mut unit.imports, &usage);
        }
        outcome
    }

    pub fn remove_type_from_unit(&self, unit: &mut ProgramUnit, namespace: &str, name: &str) -> bool {
        let usage = ImportUsage::of(unit);
        self.remove_symbol_if_unused(&mut unit.imports, namespace, name, &usage)
    }

    pub fn remove_static_from_unit(&self, unit: &mut ProgramUnit, owner: &str, member: &str) -> bool {
        let usage = ImportUsage::of(unit);
        self.remove_static_if_unused(&mut unit.imports, owner, member, &usage)
    }
}
