//! Engine configuration
//!
//! Handles loading of `remodel.yaml`, which tells a migration run where the
//! generated configuration class goes and how the rewrite rules behave.

use crate::error::{Error, Result};
use crate::imports::ImportLayout;
use crate::ingest::{NamespaceOverrides, CONTEXT_NAMESPACE};
use crate::markers::MarkerCatalog;
use crate::render::JavaPackage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up by [`EngineConfig::load_from_dir`]
pub const CONFIG_FILE: &str = "remodel.yaml";

/// Root engine configuration (`remodel.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    /// Package of the generated configuration class
    pub target_package: JavaPackage,

    /// Simple name of the generated configuration class
    #[serde(default = "default_configuration_class")]
    pub configuration_class: String,

    /// Upper bound on rule-list iterations per unit
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Nullability markers for optional dependencies
    #[serde(default)]
    pub nullability: NullabilityConfig,

    /// Import layout preferences
    #[serde(default)]
    pub imports: ImportLayout,

    /// What happens when a rule fails on a unit
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Namespace URI -> element name -> component kind, captured losslessly
    #[serde(default = "default_overrides")]
    pub overrides: BTreeMap<String, BTreeMap<String, String>>,

    /// YAML marker catalog replacing the built-in Spring one
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

fn default_configuration_class() -> String {
    "MyConfiguration".to_string()
}

fn default_max_iterations() -> usize {
    8
}

fn default_overrides() -> BTreeMap<String, BTreeMap<String, String>> {
    let mut context = BTreeMap::new();
    context.insert("property-placeholder".to_string(), "property-placeholder".to_string());
    context.insert("component-scan".to_string(), "component-scan".to_string());
    let mut overrides = BTreeMap::new();
    overrides.insert(CONTEXT_NAMESPACE.to_string(), context);
    overrides
}

/// Nullability marker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NullabilityConfig {
    /// Decorate consolidated dependencies with nullability markers
    #[serde(default)]
    pub enabled: bool,

    /// Package of the nullability markers
    #[serde(default = "default_nullability_namespace")]
    pub namespace: String,

    /// Marker for dependencies that may be absent
    #[serde(default = "default_nullable")]
    pub nullable: String,

    /// Marker for dependencies that must be present
    #[serde(default = "default_non_null")]
    pub non_null: String,

    /// Also mark required dependencies with `non_null`
    #[serde(default)]
    pub annotate_required: bool,
}

fn default_nullability_namespace() -> String {
    "org.springframework.lang".to_string()
}

fn default_nullable() -> String {
    "Nullable".to_string()
}

fn default_non_null() -> String {
    "NonNull".to_string()
}

impl Default for NullabilityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            namespace: default_nullability_namespace(),
            nullable: default_nullable(),
            non_null: default_non_null(),
            annotate_required: false,
        }
    }
}

/// Failure handling for rule errors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Any rule error fails the whole run; nothing is committed
    #[default]
    AbortRun,
    /// The failing unit is left untouched and reported; others proceed
    SkipUnit,
}

impl EngineConfig {
    /// Defaults for a target package
    pub fn new(target_package: JavaPackage) -> Self {
        Self {
            target_package,
            configuration_class: default_configuration_class(),
            max_iterations: default_max_iterations(),
            nullability: NullabilityConfig::default(),
            imports: ImportLayout::default(),
            failure_policy: FailurePolicy::default(),
            overrides: default_overrides(),
            catalog: None,
        }
    }

    /// Load `remodel.yaml` from a directory
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_file = dir.join(CONFIG_FILE);
        if !config_file.exists() {
            return Ok(None);
        }
        let config = Self::load(&config_file)?;
        Ok(Some(config))
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut config: EngineConfig = serde_norway::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        // Catalog paths are relative to the configuration file
        if let (Some(catalog), Some(dir)) = (&config.catalog, path.parent()) {
            if catalog.is_relative() {
                config.catalog = Some(dir.join(catalog));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !crate::scope::is_identifier(&self.configuration_class) {
            return Err(Error::Config(format!(
                "configuration_class '{}' is not a valid Java identifier",
                self.configuration_class
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".into()));
        }
        if self.imports.fold_threshold < 2 {
            return Err(Error::Config(
                "imports.fold_threshold must be at least 2".into(),
            ));
        }
        if self.nullability.enabled {
            for name in [&self.nullability.nullable, &self.nullability.non_null] {
                if !crate::scope::is_identifier(name) {
                    return Err(Error::Config(format!(
                        "nullability marker '{}' is not a valid Java identifier",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Namespace overrides handed to the handler resolver
    pub fn namespace_overrides(&self) -> NamespaceOverrides {
        NamespaceOverrides::from_table(&self.overrides)
    }

    /// The configured marker catalog, or the built-in one
    pub fn marker_catalog(&self) -> Result<MarkerCatalog> {
        match &self.catalog {
            Some(path) => MarkerCatalog::load(path),
            None => Ok(MarkerCatalog::spring()),
        }
    }
}
