// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # remodel
//!
//! Source-to-source modernization: migrates XML bean configuration into
//! annotation-driven Java configuration.
//!
//! ## Core Concept
//!
//! A migration run has three stages:
//!
//! - **Ingest** the XML configuration into an immutable [`Registry`] of
//!   component definitions. Namespace overrides are handed to the handler
//!   resolver when it is built, so nothing can be installed too late.
//! - **Rewrite** every Java [`ProgramUnit`] with an ordered list of
//!   [`RewriteRule`]s, run to a fixed point on a working copy that is only
//!   committed when every rule succeeded.
//! - **Materialize** whatever has no in-source counterpart (placeholders,
//!   component scanning, third-party beans) into a generated configuration
//!   class.
//!
//! Rules know markers only through the capability-keyed [`MarkerCatalog`],
//! so a different annotation vocabulary is a catalog file, not new code.
//! Per-declaration problems never fail a run; they come back as
//! [`Diagnostic`]s next to the rewritten units.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use remodel::{ConfigSource, EngineConfig, JavaPackage, Migration};
//!
//! let config = EngineConfig::new(JavaPackage::try_from("com.acme.config".to_string())?);
//! let sources = vec![ConfigSource::from_path(Path::new("beans.xml"))?];
//! let migration = Migration::new(config, &sources)?;
//!
//! let units = remodel::load_source_tree(Path::new("src/main/java"))?;
//! let report = migration.run(&units, Path::new("src/main/java"))?;
//! for unit in report.changed_units() {
//!     println!("{}", remodel::render_java(unit)?);
//! }
//! for diagnostic in &report.diagnostics {
//!     eprintln!("{}", diagnostic);
//! }
//! ```

// Model
pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod registry;

// Frontend and printer
pub mod parse;
pub mod render;

// Analysis
pub mod imports;
pub mod markers;
pub mod scope;

// Operations
pub mod ingest;
pub mod materialize;
pub mod migration;
pub mod pipeline;
pub mod rules;

// Re-exports
pub use ast::{AccessIndex, ClassDecl, Marker, ProgramUnit};
pub use config::{EngineConfig, FailurePolicy, NullabilityConfig, CONFIG_FILE};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{Error, IngestError, Result};
pub use imports::{Import, ImportLayout, ImportReconciler, ImportSet};
pub use ingest::{
    ingest, ConfigElement, ConfigParser, ConfigSource, HandlerResolver, NamespaceOverrides,
    XmlConfigParser,
};
pub use markers::{Capability, CapabilityKind, MarkerCatalog, MarkerDef};
pub use materialize::{DeclaredOutput, Materialized, Materializer, Translation};
pub use migration::{java_files, load_source_tree, Migration, MigrationReport, ReportSummary};
pub use parse::parse_java;
pub use pipeline::{Pipeline, UnitResult};
pub use registry::{ComponentDefinition, ComponentKind, PropertyValue, Registry};
pub use render::{render_java, JavaPackage, NamespaceError};
pub use rules::{default_rules, RewriteRule, RuleContext, RuleOutcome};
pub use scope::{RenameConflict, ScopeTree};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
