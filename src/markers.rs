//! Marker catalog
//!
//! Rules never match on concrete annotation names. They ask the catalog
//! which markers carry a capability ("injects a dependency", "names a
//! parameter", ...). Supporting another framework means adding catalog
//! entries, not rule code. Catalogs can be loaded from YAML.

use crate::ast::{Expr, Marker};
use crate::error::{Error, Result};
use crate::imports::ImportReconciler;
use crate::imports::ImportLayout;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a marker means to the rewrite rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "capability", rename_all = "kebab-case")]
pub enum Capability {
    /// Field/setter/constructor dependency injection. When
    /// `optional_attribute` is set to `false` the dependency may be absent.
    InjectsDependency {
        #[serde(default)]
        optional_attribute: Option<String>,
    },
    /// Travels from an injected field to the constructor parameter
    /// (qualifiers, value expressions)
    CarriedToParameter,
    /// Selects a dependency by component name
    Qualifier,
    /// Injects a literal or placeholder expression
    LiteralValue,
    /// Binds a declarative name to a method parameter
    NamesParameter { attributes: Vec<String> },
    /// Compound mapping whose `attribute` narrows to one request method
    /// given as a constant of `constants_owner` (a qualified type name)
    BindsRequestMethod {
        attribute: String,
        constants_owner: String,
    },
    /// Specific mapping equivalent to the compound one restricted to `method`
    RequestMethodShortcut { method: String },
    /// Marks a class as a configuration role
    ConfigurationRole,
    /// Marks a factory method inside a configuration-role class
    FactoryMethod,
    /// Marks a class as a scannable component; `attribute` holds its name
    Component { attribute: String },
    /// Declares a property source location on a configuration class
    PropertySource,
    /// Declares packages to scan on a configuration class
    ComponentScan { attribute: String },
    /// Restates a bean definition attribute on a factory method: bare for
    /// `true`, with the attribute's values otherwise
    BeanAttribute { attribute: String },
    /// Asserts nothing in `context`
    Inert { context: InertContext },
}

/// Where an inert marker may be dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum InertContext {
    /// On the only constructor of a class
    SoleConstructor,
    /// On any declaration
    Anywhere,
}

/// Capability discriminant, for lookups that ignore payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    InjectsDependency,
    CarriedToParameter,
    Qualifier,
    LiteralValue,
    NamesParameter,
    BindsRequestMethod,
    RequestMethodShortcut,
    ConfigurationRole,
    FactoryMethod,
    Component,
    PropertySource,
    ComponentScan,
    BeanAttribute,
    Inert,
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::InjectsDependency { .. } => CapabilityKind::InjectsDependency,
            Capability::CarriedToParameter => CapabilityKind::CarriedToParameter,
            Capability::Qualifier => CapabilityKind::Qualifier,
            Capability::LiteralValue => CapabilityKind::LiteralValue,
            Capability::NamesParameter { .. } => CapabilityKind::NamesParameter,
            Capability::BindsRequestMethod { .. } => CapabilityKind::BindsRequestMethod,
            Capability::RequestMethodShortcut { .. } => CapabilityKind::RequestMethodShortcut,
            Capability::ConfigurationRole => CapabilityKind::ConfigurationRole,
            Capability::FactoryMethod => CapabilityKind::FactoryMethod,
            Capability::Component { .. } => CapabilityKind::Component,
            Capability::PropertySource => CapabilityKind::PropertySource,
            Capability::ComponentScan { .. } => CapabilityKind::ComponentScan,
            Capability::BeanAttribute { .. } => CapabilityKind::BeanAttribute,
            Capability::Inert { .. } => CapabilityKind::Inert,
        }
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MarkerDef {
    /// Simple name (`Autowired`)
    pub name: String,
    /// Package the marker type lives in
    pub namespace: String,
    pub capabilities: Vec<Capability>,
}

impl MarkerDef {
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn capability(&self, kind: CapabilityKind) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.kind() == kind)
    }
}

/// Known constants of an enum-like owner, e.g. request method names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConstantSet {
    /// Qualified owner type
    pub owner: String,
    pub constants: Vec<String>,
}

/// The open set of markers the rules understand
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MarkerCatalog {
    pub markers: Vec<MarkerDef>,
    #[serde(default)]
    pub constants: Vec<ConstantSet>,
}

impl MarkerCatalog {
    /// Load a catalog from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        let catalog: MarkerCatalog = serde_norway::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse catalog {}: {}", path.display(), e))
        })?;
        Ok(catalog)
    }

    /// Catalog entry for a marker as written (qualified or simple)
    pub fn lookup(&self, marker: &Marker) -> Option<&MarkerDef> {
        if marker.is_qualified() {
            self.markers.iter().find(|d| d.qualified() == marker.name)
        } else {
            self.markers.iter().find(|d| d.name == marker.name)
        }
    }

    pub fn has(&self, marker: &Marker, kind: CapabilityKind) -> bool {
        self.capability(marker, kind).is_some()
    }

    pub fn capability(&self, marker: &Marker, kind: CapabilityKind) -> Option<&Capability> {
        self.lookup(marker)?.capability(kind)
    }

    /// First catalog entry carrying a capability
    pub fn first_with(&self, kind: CapabilityKind) -> Option<&MarkerDef> {
        self.markers.iter().find(|d| d.capability(kind).is_some())
    }

    /// The specific marker standing in for a compound one narrowed to `method`
    pub fn shortcut_for(&self, method: &str) -> Option<&MarkerDef> {
        self.markers.iter().find(|d| {
            d.capabilities.iter().any(|c| {
                matches!(c, Capability::RequestMethodShortcut { method: m } if m == method)
            })
        })
    }

    /// Whether an injection marker declares its dependency optional
    pub fn is_optional_injection(&self, marker: &Marker) -> bool {
        match self.capability(marker, CapabilityKind::InjectsDependency) {
            Some(Capability::InjectsDependency {
                optional_attribute: Some(attr),
            }) => matches!(marker.arg(attr), Some(Expr::Literal(v)) if v == "false"),
            _ => false,
        }
    }

    /// Reconciler seeded with every namespace this catalog knows about
    pub fn reconciler(&self, layout: ImportLayout) -> ImportReconciler {
        let mut reconciler = ImportReconciler::new(layout);
        for def in &self.markers {
            reconciler = reconciler.with_members(&def.namespace, [def.name.clone()], false);
        }
        for set in &self.constants {
            reconciler = reconciler.with_members(&set.owner, set.constants.iter().cloned(), true);
            if let Some((ns, name)) = set.owner.rsplit_once('.') {
                reconciler = reconciler.with_members(ns, [name.to_string()], false);
            }
        }
        reconciler
    }

    /// The catalog for Spring's annotation model
    pub fn spring() -> Self {
        const BEANS: &str = "org.springframework.beans.factory.annotation";
        const WEB: &str = "org.springframework.web.bind.annotation";
        const CONTEXT: &str = "org.springframework.context.annotation";
        const STEREOTYPE: &str = "org.springframework.stereotype";

        let def = |name: &str, namespace: &str, capabilities: Vec<Capability>| MarkerDef {
            name: name.to_string(),
            namespace: namespace.to_string(),
            capabilities,
        };
        let names_param = || Capability::NamesParameter {
            attributes: vec!["value".into(), "name".into()],
        };
        let component = || Capability::Component {
            attribute: "value".into(),
        };
        let shortcut = |method: &str| Capability::RequestMethodShortcut {
            method: method.to_string(),
        };
        let bean_attribute = |attribute: &str| Capability::BeanAttribute {
            attribute: attribute.to_string(),
        };

        Self {
            markers: vec![
                def(
                    "Autowired",
                    BEANS,
                    vec![
                        Capability::InjectsDependency {
                            optional_attribute: Some("required".into()),
                        },
                        Capability::Inert {
                            context: InertContext::SoleConstructor,
                        },
                    ],
                ),
                def(
                    "Inject",
                    "javax.inject",
                    vec![
                        Capability::InjectsDependency {
                            optional_attribute: None,
                        },
                        Capability::Inert {
                            context: InertContext::SoleConstructor,
                        },
                    ],
                ),
                def(
                    "Value",
                    BEANS,
                    vec![
                        Capability::InjectsDependency {
                            optional_attribute: None,
                        },
                        Capability::CarriedToParameter,
                        Capability::LiteralValue,
                    ],
                ),
                def(
                    "Qualifier",
                    BEANS,
                    vec![Capability::CarriedToParameter, Capability::Qualifier],
                ),
                def(
                    "Required",
                    BEANS,
                    vec![Capability::Inert {
                        context: InertContext::Anywhere,
                    }],
                ),
                def("PathVariable", WEB, vec![names_param()]),
                def("RequestParam", WEB, vec![names_param()]),
                def("RequestHeader", WEB, vec![names_param()]),
                def("CookieValue", WEB, vec![names_param()]),
                def(
                    "RequestMapping",
                    WEB,
                    vec![Capability::BindsRequestMethod {
                        attribute: "method".into(),
                        constants_owner: format!("{}.RequestMethod", WEB),
                    }],
                ),
                def("GetMapping", WEB, vec![shortcut("GET")]),
                def("PostMapping", WEB, vec![shortcut("POST")]),
                def("PutMapping", WEB, vec![shortcut("PUT")]),
                def("DeleteMapping", WEB, vec![shortcut("DELETE")]),
                def("PatchMapping", WEB, vec![shortcut("PATCH")]),
                def("Configuration", CONTEXT, vec![Capability::ConfigurationRole]),
                def("Bean", CONTEXT, vec![Capability::FactoryMethod]),
                def("Scope", CONTEXT, vec![bean_attribute("scope")]),
                def("Lazy", CONTEXT, vec![bean_attribute("lazy-init")]),
                def("Primary", CONTEXT, vec![bean_attribute("primary")]),
                def("DependsOn", CONTEXT, vec![bean_attribute("depends-on")]),
                def("PropertySource", CONTEXT, vec![Capability::PropertySource]),
                def(
                    "ComponentScan",
                    CONTEXT,
                    vec![Capability::ComponentScan {
                        attribute: "basePackages".into(),
                    }],
                ),
                def("Component", STEREOTYPE, vec![component()]),
                def("Service", STEREOTYPE, vec![component()]),
                def("Repository", STEREOTYPE, vec![component()]),
                def("Controller", STEREOTYPE, vec![component()]),
                def("RestController", WEB, vec![component()]),
            ],
            constants: vec![ConstantSet {
                owner: format!("{}.RequestMethod", WEB),
                constants: ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }],
        }
    }
}
