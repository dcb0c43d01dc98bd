//! Scope resolver
//!
//! Builds the lexical scope tree of a unit in one pass and answers two
//! questions for the rewrite rules: where is a symbol declared, and which
//! occurrences bind to that declaration. Renames are checked against every
//! binding visible at the declaration and its uses before anything changes.

use crate::ast::{walk, walk_mut, DeclKind, ProgramUnit, ScopeKind, SymbolSite};
use crate::ast::{SymbolVisitor, SymbolVisitorMut};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use thiserror::Error;

/// Index of a scope in its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

/// Index of a symbol occurrence, in walk order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OccurrenceId(pub usize);

/// One lexical region
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    declared: IndexMap<String, OccurrenceId>,
    /// Identifier-shaped words found in unmodelled source text
    opaque_words: BTreeSet<String>,
}

impl Scope {
    pub fn declares(&self, name: &str) -> Option<OccurrenceId> {
        self.declared.get(name).copied()
    }

    pub fn declared_names(&self) -> impl Iterator<Item = &str> {
        self.declared.keys().map(String::as_str)
    }
}

/// A symbol occurrence
#[derive(Debug, Clone)]
pub struct Occurrence {
    pub name: String,
    pub site: SymbolSite,
    /// Innermost scope containing the occurrence
    pub scope: ScopeId,
}

/// Why a rename was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenameConflict {
    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("'{new}' is already declared in the scope of '{old}'")]
    Redeclared { old: String, new: String },

    #[error("'{new}' is visible from an enclosing scope of '{old}'")]
    OuterBinding { old: String, new: String },

    #[error("'{new}' is referenced inside the scope of '{old}' and would be captured")]
    Captured { old: String, new: String },

    #[error("scope of '{old}' contains source the resolver cannot see into")]
    Opaque { old: String },

    #[error("occurrence is not a declaration")]
    NotADeclaration,
}

/// Lexical scope tree of one unit
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    occurrences: Vec<Occurrence>,
}

impl ScopeTree {
    /// Build the tree for a unit (single pass)
    pub fn build(unit: &ProgramUnit) -> Self {
        let mut builder = Builder {
            tree: ScopeTree {
                scopes: Vec::new(),
                occurrences: Vec::new(),
            },
            stack: Vec::new(),
        };
        walk::walk_unit(unit, &mut builder);
        builder.tree
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn occurrence(&self, id: OccurrenceId) -> &Occurrence {
        &self.occurrences[id.0]
    }

    pub fn occurrences(&self) -> impl Iterator<Item = (OccurrenceId, &Occurrence)> {
        self.occurrences
            .iter()
            .enumerate()
            .map(|(i, o)| (OccurrenceId(i), o))
    }

    /// Dotted path of the classes enclosing a scope
    pub fn class_path(&self, id: ScopeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(s) = current {
            if let ScopeKind::Class { name } = &self.scopes[s.0].kind {
                names.push(name.as_str());
            }
            current = self.scopes[s.0].parent;
        }
        names.reverse();
        names.join(".")
    }

    /// Scope of the method or constructor at `member` in the class at `class_path`
    pub fn method_scope(&self, class_path: &str, member: usize) -> Option<ScopeId> {
        self.scopes.iter().enumerate().find_map(|(i, s)| match &s.kind {
            ScopeKind::Method { member: m, .. }
                if *m == member
                    && s.parent.is_some_and(|p| {
                        matches!(self.scopes[p.0].kind, ScopeKind::Class { .. })
                            && self.class_path(p) == class_path
                    }) =>
            {
                Some(ScopeId(i))
            }
            _ => None,
        })
    }

    /// The class scope for a dotted class path
    pub fn class_scope(&self, class_path: &str) -> Option<ScopeId> {
        self.scopes.iter().enumerate().find_map(|(i, s)| match &s.kind {
            ScopeKind::Class { .. } if self.class_path(ScopeId(i)) == class_path => Some(ScopeId(i)),
            _ => None,
        })
    }

    /// Declaration an occurrence binds to, if it resolves within the unit
    pub fn resolve(&self, id: OccurrenceId) -> Option<OccurrenceId> {
        let occ = &self.occurrences[id.0];
        match occ.site {
            SymbolSite::Declaration(_) => Some(id),
            SymbolSite::ThisReference => {
                let class = self.enclosing_class(occ.scope)?;
                self.scopes[class.0].declares(&occ.name)
            }
            SymbolSite::Reference => self.lookup(occ.scope, &occ.name, Some(id)),
        }
    }

    /// Scope declaring the symbol an occurrence refers to
    pub fn declaring_scope(&self, id: OccurrenceId) -> Option<ScopeId> {
        self.resolve(id).map(|d| self.occurrences[d.0].scope)
    }

    /// Every occurrence (declaration included) bound to `name` declared in `scope`
    pub fn uses_of(&self, scope: ScopeId, name: &str) -> Vec<OccurrenceId> {
        let Some(decl) = self.scopes[scope.0].declares(name) else {
            return Vec::new();
        };
        (0..self.occurrences.len())
            .map(OccurrenceId)
            .filter(|o| self.occurrences[o.0].name == name && self.resolve(*o) == Some(decl))
            .collect()
    }

    fn enclosing_class(&self, from: ScopeId) -> Option<ScopeId> {
        let mut current = Some(from);
        while let Some(s) = current {
            if matches!(self.scopes[s.0].kind, ScopeKind::Class { .. }) {
                return Some(s);
            }
            current = self.scopes[s.0].parent;
        }
        None
    }

    /// Nearest declaration of `name` visible from `from`. Locals declared
    /// after `at` in the same scope are not yet visible.
    fn lookup(&self, from: ScopeId, name: &str, at: Option<OccurrenceId>) -> Option<OccurrenceId> {
        let mut current = Some(from);
        while let Some(s) = current {
            if let Some(decl) = self.scopes[s.0].declares(name) {
                let is_later_local = matches!(
                    self.occurrences[decl.0].site,
                    SymbolSite::Declaration(DeclKind::Local)
                ) && at.is_some_and(|a| decl > a);
                if !is_later_local {
                    return Some(decl);
                }
            }
            current = self.scopes[s.0].parent;
        }
        None
    }

    fn subtree(&self, root: ScopeId) -> Vec<ScopeId> {
        let mut out = vec![root];
        let mut i = 0;
        while i < out.len() {
            out.extend(self.scopes[out[i].0].children.iter().copied());
            i += 1;
        }
        out
    }

    /// Check that renaming the declaration `decl` to `new_name` is sound.
    ///
    /// Any binding of `new_name` visible at the declaration or at one of its
    /// uses counts as a conflict, even when the body never refers to it.
    pub fn check_rename(&self, decl: OccurrenceId, new_name: &str) -> Result<(), RenameConflict> {
        let occ = &self.occurrences[decl.0];
        if !matches!(occ.site, SymbolSite::Declaration(_)) {
            return Err(RenameConflict::NotADeclaration);
        }
        if occ.name == new_name {
            return Ok(());
        }
        if !is_identifier(new_name) {
            return Err(RenameConflict::InvalidIdentifier(new_name.to_string()));
        }
        let old = occ.name.clone();
        let subtree = self.subtree(occ.scope);

        if subtree
            .iter()
            .any(|s| self.scopes[s.0].declares(new_name).is_some())
        {
            return Err(RenameConflict::Redeclared {
                old,
                new: new_name.to_string(),
            });
        }

        if let Some(parent) = self.scopes[occ.scope.0].parent {
            if self.lookup(parent, new_name, None).is_some() {
                return Err(RenameConflict::OuterBinding {
                    old,
                    new: new_name.to_string(),
                });
            }
        }

        let in_subtree: BTreeSet<ScopeId> = subtree.iter().copied().collect();
        let captured = self.occurrences.iter().any(|o| {
            o.name == new_name
                && in_subtree.contains(&o.scope)
                && !matches!(o.site, SymbolSite::Declaration(_))
        });
        if captured {
            return Err(RenameConflict::Captured {
                old,
                new: new_name.to_string(),
            });
        }

        if subtree.iter().any(|s| {
            let words = &self.scopes[s.0].opaque_words;
            words.contains(new_name) || words.contains(&old)
        }) {
            return Err(RenameConflict::Opaque { old });
        }

        Ok(())
    }

    /// Rename a declaration and every occurrence bound to it.
    ///
    /// `self` must have been built from `unit` as it is now; the tree is
    /// stale afterwards. Returns the number of occurrences rewritten.
    pub fn rename(
        &self,
        unit: &mut ProgramUnit,
        decl: OccurrenceId,
        new_name: &str,
    ) -> Result<usize, RenameConflict> {
        self.check_rename(decl, new_name)?;
        let occ = &self.occurrences[decl.0];
        let targets: BTreeSet<usize> = self
            .uses_of(occ.scope, &occ.name)
            .into_iter()
            .map(|o| o.0)
            .collect();
        let mut renamer = Renamer {
            next: 0,
            targets: &targets,
            new_name,
            renamed: 0,
        };
        walk_mut::walk_unit(unit, &mut renamer);
        Ok(renamer.renamed)
    }
}

struct Builder {
    tree: ScopeTree,
    stack: Vec<ScopeId>,
}

impl Builder {
    fn current(&self) -> ScopeId {
        // Every walk starts by entering the unit scope.
        self.stack.last().copied().unwrap_or(ScopeId(0))
    }
}

impl SymbolVisitor for Builder {
    fn enter_scope(&mut self, kind: ScopeKind) {
        let id = ScopeId(self.tree.scopes.len());
        let parent = self.stack.last().copied();
        self.tree.scopes.push(Scope {
            kind,
            parent,
            children: Vec::new(),
            declared: IndexMap::new(),
            opaque_words: BTreeSet::new(),
        });
        if let Some(p) = parent {
            self.tree.scopes[p.0].children.push(id);
        }
        self.stack.push(id);
    }

    fn exit_scope(&mut self) {
        self.stack.pop();
    }

    fn symbol(&mut self, site: SymbolSite, name: &String) {
        let scope = self.current();
        let id = OccurrenceId(self.tree.occurrences.len());
        self.tree.occurrences.push(Occurrence {
            name: name.clone(),
            site,
            scope,
        });
        if let SymbolSite::Declaration(_) = site {
            self.tree.scopes[scope.0]
                .declared
                .entry(name.clone())
                .or_insert(id);
        }
    }

    fn raw(&mut self, text: &str) {
        let scope = self.current();
        self.tree.scopes[scope.0]
            .opaque_words
            .extend(crate::ast::words(text).map(String::from));
    }
}

struct Renamer<'a> {
    next: usize,
    targets: &'a BTreeSet<usize>,
    new_name: &'a str,
    renamed: usize,
}

impl SymbolVisitorMut for Renamer<'_> {
    fn enter_scope(&mut self, _kind: ScopeKind) {}

    fn exit_scope(&mut self) {}

    fn symbol(&mut self, _site: SymbolSite, name: &mut String) {
        if self.targets.contains(&self.next) {
            *name = self.new_name.to_string();
            self.renamed += 1;
        }
        self.next += 1;
    }

    fn raw(&mut self, _text: &str) {}
}

const KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "false", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "null", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "true", "try", "void", "volatile", "while", "var", "yield", "record",
];

/// Whether `name` can be used as a Java identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !KEYWORDS.contains(&name)
}
