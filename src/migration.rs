//! Migration session
//!
//! Ties the pieces together for one run: the configuration documents are
//! ingested into a registry first, then every program unit goes through the
//! rule pipeline, then the materializer declares the generated
//! configuration class. Ingestion errors abort before any unit is touched.

use crate::ast::{AccessIndex, ProgramUnit};
use crate::config::EngineConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{Error, Result};
use crate::imports::ImportReconciler;
use crate::ingest::{ingest, ConfigParser, ConfigSource, XmlConfigParser};
use crate::markers::MarkerCatalog;
use crate::materialize::{DeclaredOutput, Materializer};
use crate::parse::parse_java;
use crate::pipeline::{Pipeline, UnitResult};
use crate::registry::Registry;
use crate::rules::{scannable_classes, RuleContext};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// One migration run over a fixed registry
pub struct Migration {
    config: EngineConfig,
    catalog: MarkerCatalog,
    reconciler: ImportReconciler,
    registry: Registry,
    pipeline: Pipeline,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub units: Vec<UnitResult>,
    pub outputs: Vec<DeclaredOutput>,
    /// Unit diagnostics in unit order, then materializer diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

/// Serializable digest of a [`MigrationReport`]
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub changed: Vec<String>,
    pub unchanged: usize,
    pub generated: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MigrationReport {
    pub fn changed_units(&self) -> impl Iterator<Item = &ProgramUnit> {
        self.units.iter().filter(|r| r.changed).map(|r| &r.unit)
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn summary(&self) -> ReportSummary {
        let changed: Vec<String> = self.changed_units().map(|u| u.path.clone()).collect();
        ReportSummary {
            unchanged: self.units.len() - changed.len(),
            changed,
            generated: self.outputs.iter().map(|o| o.path.clone()).collect(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

impl Migration {
    /// Ingest XML bean configuration and prepare a session
    pub fn new(config: EngineConfig, sources: &[ConfigSource]) -> Result<Self> {
        Self::with_parser(config, sources, &XmlConfigParser)
    }

    pub fn with_parser(config: EngineConfig, sources: &[ConfigSource], parser: &dyn ConfigParser) -> Result<Self> {
        config.validate()?;
        let catalog = config.marker_catalog()?;
        let reconciler = catalog.reconciler(config.imports.clone());
        let registry = ingest(sources, parser, &config.namespace_overrides())?;
        let pipeline = Pipeline::from_config(&config);
        info!(
            definitions = registry.len(),
            rules = ?pipeline.rule_names(),
            "migration session ready"
        );
        Ok(Self {
            config,
            catalog,
            reconciler,
            registry,
            pipeline,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> RuleContext<'_> {
        RuleContext {
            registry: &self.registry,
            catalog: &self.catalog,
            reconciler: &self.reconciler,
            nullability: &self.config.nullability,
            accesses: None,
        }
    }

    /// Rewrite `units` and declare the generated configuration class under
    /// `source_root`. Inputs are never modified.
    pub fn run(&self, units: &[ProgramUnit], source_root: &Path) -> Result<MigrationReport> {
        let accesses = AccessIndex::of_units(units);
        let ctx = RuleContext {
            accesses: Some(&accesses),
            ..self.context()
        };
        let results = self.pipeline.run_all(units, &ctx)?;

        let materialized = Materializer::new(&self.catalog, &self.reconciler)
            .class_name(self.config.configuration_class.clone())
            .scanned_classes(units.iter().flat_map(|unit| scannable_classes(unit, &ctx)))
            .materialize(&self.registry, &self.config.target_package, source_root);

        let mut diagnostics: Vec<Diagnostic> = results
            .iter()
            .flat_map(|r| r.diagnostics.iter().cloned())
            .collect();
        diagnostics.extend(materialized.diagnostics);

        let report = MigrationReport {
            units: results,
            outputs: materialized.outputs,
            diagnostics,
        };
        info!(
            changed = report.changed_units().count(),
            generated = report.outputs.len(),
            diagnostics = report.diagnostics.len(),
            "migration finished"
        );
        Ok(report)
    }
}

/// Every `.java` file under `root`, sorted
pub fn java_files(root: &Path) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            let path = entry.path();
            if path.is_dir() {
                walk(&path, out)?;
            } else if path.extension().is_some_and(|ext| ext == "java") {
                out.push(path);
            }
        }
        Ok(())
    }
    let mut files = Vec::new();
    walk(root, &mut files)?;
    files.sort();
    Ok(files)
}

/// Parse every `.java` file under `root`; unit paths are relative to it
pub fn load_source_tree(root: &Path) -> Result<Vec<ProgramUnit>> {
    java_files(root)?
        .iter()
        .map(|path| {
            let source = std::fs::read_to_string(path).map_err(Error::Io)?;
            let relative = path.strip_prefix(root).unwrap_or(path);
            parse_java(&source, &relative.to_string_lossy().replace('\\', "/"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::JavaPackage;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn config() -> EngineConfig {
        EngineConfig::new(JavaPackage::try_from("com.acme.config".to_string()).unwrap())
    }

    #[test]
    fn test_ingestion_error_aborts_session() {
        let sources = [ConfigSource::new("broken.xml", "<beans><bean")];
        let err = Migration::new(config(), &sources).err().unwrap();
        assert!(matches!(err, Error::Ingest(_)));
    }

    #[test]
    fn test_load_source_tree_relative_paths() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("com/acme");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("B.java"), "package com.acme;\n\nclass B {\n}\n").unwrap();
        fs::write(pkg.join("A.java"), "package com.acme;\n\nclass A {\n}\n").unwrap();
        fs::write(pkg.join("notes.txt"), "ignored").unwrap();

        let units = load_source_tree(dir.path()).unwrap();
        let paths: Vec<&str> = units.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(paths, vec!["com/acme/A.java", "com/acme/B.java"]);
    }

    #[test]
    fn test_run_reports_and_leaves_inputs_alone() {
        let sources = [ConfigSource::new(
            "beans.xml",
            r#"<beans xmlns="http://www.springframework.org/schema/beans">
  <bean id="orderService" class="com.acme.OrderService"/>
</beans>"#,
        )];
        let migration = Migration::new(config(), &sources).unwrap();
        let units = vec![parse_java("package com.acme;\n\npublic class OrderService {\n}\n", "com/acme/OrderService.java").unwrap()];
        let before = units.clone();

        let report = migration.run(&units, Path::new("src")).unwrap();
        assert_eq!(units, before);

        let summary = report.summary();
        assert_eq!(summary.changed, vec!["com/acme/OrderService.java".to_string()]);
        assert_eq!(summary.unchanged, 0);
        assert_eq!(
            summary.generated,
            vec![PathBuf::from("src/com/acme/config/MyConfiguration.java")]
        );
        assert!(summary.diagnostics.is_empty());
    }
}
