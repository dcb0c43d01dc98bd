//! Configuration ingestion
//!
//! A [`ConfigParser`] turns raw configuration documents into generic
//! `(namespace, tag, attributes)` elements. Each element is routed to the
//! [`NamespaceHandler`] registered for its namespace, which produces a
//! [`ComponentDefinition`].
//!
//! Handler overrides are injected when the [`HandlerResolver`] is built.
//! Once the resolver has answered its first lookup it is sealed, and any
//! later installation attempt is an [`IngestError::OverrideOrdering`].

mod xml;

pub use xml::XmlConfigParser;

use crate::error::{Error, IngestError};
use crate::registry::{
    ComponentDefinition, ComponentKind, ConstructorArg, PropertyBinding, PropertyValue, Registry,
    RegistryBuilder,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Namespace of plain bean definitions
pub const BEANS_NAMESPACE: &str = "http://www.springframework.org/schema/beans";

/// Namespace of `context:` elements
pub const CONTEXT_NAMESPACE: &str = "http://www.springframework.org/schema/context";

/// An opaque configuration document
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Display name, usually the file path
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ConfigSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let bytes = std::fs::read(path).map_err(Error::Io)?;
        Ok(Self::new(path.display().to_string(), bytes))
    }
}

/// One parsed configuration element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigElement {
    /// Namespace URI, empty when the document declares none
    pub namespace: String,
    /// Local element name
    pub tag: String,
    /// Attributes in document order
    pub attributes: IndexMap<String, String>,
    /// Trimmed text content, if any
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<ConfigElement>,
    /// `<source>:<line>`
    pub location: String,
}

impl ConfigElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Pluggable configuration document parser
pub trait ConfigParser: Send + Sync {
    /// Top-level elements of one document
    fn parse(&self, source: &ConfigSource) -> Result<Vec<ConfigElement>, IngestError>;
}

/// Turns elements of one namespace into component definitions
pub trait NamespaceHandler: Send + Sync {
    fn handle(
        &self,
        element: &ConfigElement,
        registry: &mut RegistryBuilder,
    ) -> Result<Option<ComponentDefinition>, IngestError>;
}

/// Namespace URI -> element tag -> kind, for handlers that keep every attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceOverrides {
    table: IndexMap<String, IndexMap<String, ComponentKind>>,
}

impl NamespaceOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, namespace: &str, tag: &str, kind: ComponentKind) -> Self {
        self.table
            .entry(namespace.to_string())
            .or_default()
            .insert(tag.to_string(), kind);
        self
    }

    /// `context:property-placeholder` and `context:component-scan`
    pub fn spring_context() -> Self {
        Self::new()
            .with(
                CONTEXT_NAMESPACE,
                "property-placeholder",
                ComponentKind::PropertyPlaceholder,
            )
            .with(CONTEXT_NAMESPACE, "component-scan", ComponentKind::ComponentScan)
    }

    pub fn from_table(table: &BTreeMap<String, BTreeMap<String, String>>) -> Self {
        let mut overrides = Self::new();
        for (namespace, tags) in table {
            for (tag, kind) in tags {
                overrides = overrides.with(namespace, tag, ComponentKind::from(kind.as_str()));
            }
        }
        overrides
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexMap<String, ComponentKind>)> {
        self.table.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Lossless handler used for overridden namespaces
#[derive(Debug, Clone)]
pub struct OverrideHandler {
    kinds: IndexMap<String, ComponentKind>,
}

impl OverrideHandler {
    pub fn new(kinds: IndexMap<String, ComponentKind>) -> Self {
        Self { kinds }
    }
}

impl NamespaceHandler for OverrideHandler {
    fn handle(
        &self,
        element: &ConfigElement,
        registry: &mut RegistryBuilder,
    ) -> Result<Option<ComponentDefinition>, IngestError> {
        let kind = self
            .kinds
            .get(&element.tag)
            .cloned()
            .unwrap_or_else(|| ComponentKind::Other(element.tag.clone()));
        let name = match element.attribute("id") {
            Some(id) => id.to_string(),
            None => registry.anonymous_name(kind.as_str()),
        };
        Ok(Some(ComponentDefinition {
            name,
            aliases: Vec::new(),
            kind,
            raw_attributes: element.attributes.clone(),
            properties: Vec::new(),
            constructor_args: Vec::new(),
            source_location: element.location.clone(),
        }))
    }
}

/// Default handler for `<bean>` definitions
#[derive(Debug, Clone, Default)]
pub struct BeansHandler;

impl BeansHandler {
    /// `value`/`ref` attribute, or a nested `<value>`/`<ref>` element.
    /// Any other form is carried as [`PropertyValue::Unsupported`] so the
    /// wiring entry keeps its place.
    fn value(child: &ConfigElement) -> PropertyValue {
        if let Some(v) = child.attribute("value") {
            return PropertyValue::Literal(v.to_string());
        }
        if let Some(r) = child.attribute("ref") {
            return PropertyValue::Reference(r.to_string());
        }
        let Some(nested) = child.children.first() else {
            return PropertyValue::Unsupported("missing value".to_string());
        };
        match nested.tag.as_str() {
            "value" => PropertyValue::Literal(nested.text.clone().unwrap_or_default()),
            "ref" => match nested.attribute("bean").or_else(|| nested.attribute("local")) {
                Some(target) => PropertyValue::Reference(target.to_string()),
                None => PropertyValue::Unsupported("ref".to_string()),
            },
            other => PropertyValue::Unsupported(other.to_string()),
        }
    }

    fn property(child: &ConfigElement) -> Option<PropertyBinding> {
        let name = child.attribute("name")?.to_string();
        Some(PropertyBinding {
            name,
            value: Self::value(child),
        })
    }

    fn constructor_arg(child: &ConfigElement) -> ConstructorArg {
        ConstructorArg {
            name: child.attribute("name").map(String::from),
            index: child.attribute("index").and_then(|i| i.trim().parse().ok()),
            value: Self::value(child),
        }
    }
}

impl NamespaceHandler for BeansHandler {
    fn handle(
        &self,
        element: &ConfigElement,
        registry: &mut RegistryBuilder,
    ) -> Result<Option<ComponentDefinition>, IngestError> {
        if element.tag != "bean" {
            debug!(tag = %element.tag, location = %element.location, "skipping beans element");
            return Ok(None);
        }

        let mut aliases: Vec<String> = Vec::new();
        for alias in element
            .attribute("name")
            .unwrap_or_default()
            .split([',', ';', ' '])
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            if !aliases.iter().any(|a| a == alias) {
                aliases.push(alias.to_string());
            }
        }
        let name = match element.attribute("id") {
            Some(id) => id.to_string(),
            None if !aliases.is_empty() => aliases.remove(0),
            None => {
                let base = element.attribute("class").unwrap_or("bean").to_string();
                registry.anonymous_name(&base)
            }
        };
        aliases.retain(|a| a != &name);

        let properties = element
            .children
            .iter()
            .filter(|c| c.tag == "property")
            .filter_map(Self::property)
            .collect();
        let constructor_args = element
            .children
            .iter()
            .filter(|c| c.tag == "constructor-arg")
            .map(Self::constructor_arg)
            .collect();

        Ok(Some(ComponentDefinition {
            name,
            aliases,
            kind: ComponentKind::GenericBean,
            raw_attributes: element.attributes.clone(),
            properties,
            constructor_args,
            source_location: element.location.clone(),
        }))
    }
}

/// Lossy default translation for namespaces nobody overrides.
/// Keeps only the element's `id`.
#[derive(Debug, Clone, Default)]
pub struct FallbackHandler;

impl NamespaceHandler for FallbackHandler {
    fn handle(
        &self,
        element: &ConfigElement,
        registry: &mut RegistryBuilder,
    ) -> Result<Option<ComponentDefinition>, IngestError> {
        let mut raw_attributes = IndexMap::new();
        let name = match element.attribute("id") {
            Some(id) => {
                raw_attributes.insert("id".to_string(), id.to_string());
                id.to_string()
            }
            None => registry.anonymous_name(&element.tag),
        };
        Ok(Some(ComponentDefinition {
            name,
            aliases: Vec::new(),
            kind: ComponentKind::Other(element.tag.clone()),
            raw_attributes,
            properties: Vec::new(),
            constructor_args: Vec::new(),
            source_location: element.location.clone(),
        }))
    }
}

/// Namespace -> handler table with overrides injected at construction
pub struct HandlerResolver {
    handlers: IndexMap<String, Box<dyn NamespaceHandler>>,
    fallback: Box<dyn NamespaceHandler>,
    sealed: AtomicBool,
}

impl HandlerResolver {
    /// Default handlers plus `overrides`, which win over defaults
    pub fn new(overrides: &NamespaceOverrides) -> Self {
        let mut handlers: IndexMap<String, Box<dyn NamespaceHandler>> = IndexMap::new();
        handlers.insert(BEANS_NAMESPACE.to_string(), Box::new(BeansHandler));
        handlers.insert(String::new(), Box::new(BeansHandler));
        for (namespace, kinds) in overrides.iter() {
            handlers.insert(namespace.clone(), Box::new(OverrideHandler::new(kinds.clone())));
        }
        Self {
            handlers,
            fallback: Box::new(FallbackHandler),
            sealed: AtomicBool::new(false),
        }
    }

    /// Install an extra handler. Only valid before the first lookup.
    pub fn install(
        &mut self,
        namespace: &str,
        handler: Box<dyn NamespaceHandler>,
    ) -> Result<(), IngestError> {
        if self.is_sealed() {
            return Err(IngestError::OverrideOrdering {
                namespace: namespace.to_string(),
            });
        }
        self.handlers.insert(namespace.to_string(), handler);
        Ok(())
    }

    /// Handler for a namespace; seals the table
    pub fn resolve(&self, namespace: &str) -> &dyn NamespaceHandler {
        self.sealed.store(true, Ordering::Release);
        self.handlers
            .get(namespace)
            .map(|h| h.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for HandlerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerResolver")
            .field("namespaces", &self.handlers.keys().collect::<Vec<_>>())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

/// Ingest configuration documents into a registry
pub fn ingest(
    sources: &[ConfigSource],
    parser: &dyn ConfigParser,
    overrides: &NamespaceOverrides,
) -> Result<Registry, IngestError> {
    let resolver = HandlerResolver::new(overrides);
    ingest_with(sources, parser, &resolver)
}

/// Ingest with a prepared resolver
pub fn ingest_with(
    sources: &[ConfigSource],
    parser: &dyn ConfigParser,
    resolver: &HandlerResolver,
) -> Result<Registry, IngestError> {
    let mut builder = RegistryBuilder::new();
    for source in sources {
        let elements = parser.parse(source)?;
        info!(source = %source.name, elements = elements.len(), "ingesting configuration");
        for element in &elements {
            ingest_element(element, resolver, &mut builder)?;
        }
    }
    let registry = builder.build();
    info!(definitions = registry.len(), "registry built");
    Ok(registry)
}

fn ingest_element(
    element: &ConfigElement,
    resolver: &HandlerResolver,
    builder: &mut RegistryBuilder,
) -> Result<(), IngestError> {
    let is_beans_ns = element.namespace == BEANS_NAMESPACE || element.namespace.is_empty();
    if is_beans_ns && element.tag == "beans" {
        // Nested `<beans profile="...">` groups
        for child in &element.children {
            ingest_element(child, resolver, builder)?;
        }
        return Ok(());
    }
    let handler = resolver.resolve(&element.namespace);
    if let Some(definition) = handler.handle(element, builder)? {
        debug!(name = %definition.name, kind = %definition.kind, "captured component");
        builder.insert(definition)?;
    }
    Ok(())
}
