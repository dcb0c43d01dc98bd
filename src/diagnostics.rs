//! Non-fatal diagnostics collected during a migration run

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a non-fatal finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A class could not receive a consolidated constructor
    ConsolidationConflict,
    /// A parameter rename would capture or shadow another binding
    RenameConflict,
    /// A registry entry has no materializer translation
    UnsupportedKind,
    /// A bean class keeps its factory method because scanning cannot
    /// restate its definition
    ScanDeclined,
    /// An import could not be added without clashing with another import
    ImportAmbiguity,
    /// A unit was left untouched because a rule failed on it
    UnitSkipped,
    /// The rule list did not reach a fixed point within the iteration bound
    IterationLimit,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::ConsolidationConflict => "consolidation-conflict",
            DiagnosticKind::RenameConflict => "rename-conflict",
            DiagnosticKind::UnsupportedKind => "unsupported-kind",
            DiagnosticKind::ScanDeclined => "scan-declined",
            DiagnosticKind::ImportAmbiguity => "import-ambiguity",
            DiagnosticKind::UnitSkipped => "unit-skipped",
            DiagnosticKind::IterationLimit => "iteration-limit",
        };
        f.write_str(s)
    }
}

/// A single diagnostic, attributed to a unit and a declaration inside it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Unit path, or registry entry name for materializer diagnostics
    pub unit: String,
    /// Dotted declaration path, e.g. `OrderController.find`
    pub location: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        unit: impl Into<String>,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            unit: unit.into(),
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.kind, self.unit, self.location, self.message
        )
    }
}
