//! Component registry
//!
//! Named component definitions captured from external configuration. A
//! registry is assembled by [`RegistryBuilder`] during ingestion and is
//! immutable afterwards, so it can be shared across worker threads.

use crate::error::IngestError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Known configuration patterns
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ComponentKind {
    PropertyPlaceholder,
    ComponentScan,
    GenericBean,
    /// Any other element, named by its tag
    Other(String),
}

impl ComponentKind {
    pub fn as_str(&self) -> &str {
        match self {
            ComponentKind::PropertyPlaceholder => "property-placeholder",
            ComponentKind::ComponentScan => "component-scan",
            ComponentKind::GenericBean => "generic-bean",
            ComponentKind::Other(tag) => tag,
        }
    }
}

impl From<&str> for ComponentKind {
    fn from(s: &str) -> Self {
        match s {
            "property-placeholder" => ComponentKind::PropertyPlaceholder,
            "component-scan" => ComponentKind::ComponentScan,
            "generic-bean" => ComponentKind::GenericBean,
            other => ComponentKind::Other(other.to_string()),
        }
    }
}

impl TryFrom<String> for ComponentKind {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(ComponentKind::from(s.as_str()))
    }
}

impl From<ComponentKind> for String {
    fn from(kind: ComponentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value assigned to a bean property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    /// Literal text
    Literal(String),
    /// Name of another component
    Reference(String),
    /// A value form with no Java restatement (`<list>`, `<map>`, `<null/>`,
    /// inner `<bean>`), named by its tag
    Unsupported(String),
}


/// A `name = value` wiring entry of a bean
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBinding {
    pub name: String,
    pub value: PropertyValue,
}

/// A `<constructor-arg>` of a bean, matched by name, index, or position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorArg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub value: PropertyValue,
}

/// One externally configured component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Unique within a registry
    pub name: String,
    /// Further names from `name="a, b"`, also unique within a registry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub kind: ComponentKind,
    /// Every attribute of the source element, in document order
    pub raw_attributes: IndexMap<String, String>,
    /// Property wiring of bean definitions
    #[serde(default)]
    pub properties: Vec<PropertyBinding>,
    /// Constructor wiring of bean definitions
    #[serde(default)]
    pub constructor_args: Vec<ConstructorArg>,
    /// Originating element, `<source>:<line>`
    pub source_location: String,
}

/// Whether a bean attribute holds the value a plain singleton definition
/// has anyway. Naming attributes always count as default.
pub fn is_default_attribute(key: &str, value: &str) -> bool {
    matches!(
        (key, value.trim()),
        ("id" | "name" | "class", _)
            | ("scope", "" | "singleton")
            | ("lazy-init", "" | "false" | "default")
            | ("abstract", "" | "false")
            | ("primary", "" | "false")
            | ("autowire", "" | "no" | "default")
            | ("autowire-candidate", "" | "true" | "default")
    )
}

impl ComponentDefinition {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.raw_attributes.get(name).map(String::as_str)
    }

    /// Comma/whitespace separated attribute values (`base-package="a, b"`)
    pub fn attribute_list(&self, name: &str) -> Vec<String> {
        self.attribute(name)
            .map(|v| {
                v.split([',', ';', ' ', '\t', '\n'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Qualified class of a bean definition
    pub fn class_name(&self) -> Option<&str> {
        self.attribute("class")
    }

    /// First property or constructor-arg value with no Java restatement
    pub fn unsupported_value(&self) -> Option<&str> {
        self.properties
            .iter()
            .map(|p| &p.value)
            .chain(self.constructor_args.iter().map(|a| &a.value))
            .find_map(|v| match v {
                PropertyValue::Unsupported(tag) => Some(tag.as_str()),
                _ => None,
            })
    }

    /// Place constructor-args into the leading parameter slots.
    ///
    /// Indexed args take their index, named args the position of the
    /// parameter of that name, and the rest fill the free slots in
    /// document order. Without `params`, named args can only be placed
    /// when they are the sole argument. Parameters past the last slot are
    /// left to the caller.
    pub fn constructor_slots(&self, params: Option<&[String]>) -> Result<Vec<&ConstructorArg>, String> {
        let arity = self.constructor_args.len();
        if let Some(params) = params {
            if params.len() < arity {
                return Err(format!(
                    "{} constructor-args for a {}-parameter constructor",
                    arity,
                    params.len()
                ));
            }
        }
        let mut slots: Vec<Option<&ConstructorArg>> = vec![None; arity];
        let mut free = Vec::new();
        for arg in &self.constructor_args {
            let slot = match (arg.index, arg.name.as_deref()) {
                (Some(index), _) => Some(index),
                (None, Some(name)) => match params {
                    Some(params) => Some(
                        params
                            .iter()
                            .position(|p| p == name)
                            .ok_or_else(|| format!("no constructor parameter named `{}`", name))?,
                    ),
                    None if arity == 1 => Some(0),
                    None => return Err(format!("constructor-arg `{}` has no known parameter order", name)),
                },
                (None, None) => None,
            };
            match slot {
                Some(slot) if slot >= arity => {
                    return Err(format!("constructor-arg index {} out of range", slot));
                }
                Some(slot) if slots[slot].is_some() => {
                    return Err(format!("two constructor-args for parameter {}", slot));
                }
                Some(slot) => slots[slot] = Some(arg),
                None => free.push(arg),
            }
        }
        let mut free = free.into_iter();
        for slot in slots.iter_mut().filter(|s| s.is_none()) {
            *slot = free.next();
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

/// Read-only name -> definition map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    definitions: IndexMap<String, ComponentDefinition>,
    /// alias -> name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    aliases: IndexMap<String, String>,
}

impl Registry {
    /// Definition by name or alias
    pub fn get(&self, name: &str) -> Option<&ComponentDefinition> {
        match self.aliases.get(name) {
            Some(canonical) => self.definitions.get(canonical),
            None => self.definitions.get(name),
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in ingestion order
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.definitions.values()
    }

    pub fn of_kind<'a>(&'a self, kind: &'a ComponentKind) -> impl Iterator<Item = &'a ComponentDefinition> {
        self.definitions.values().filter(move |d| &d.kind == kind)
    }

    /// Bean definitions whose class is `qualified`
    pub fn beans_of_class(&self, qualified: &str) -> Vec<&ComponentDefinition> {
        self.definitions
            .values()
            .filter(|d| d.kind == ComponentKind::GenericBean && d.class_name() == Some(qualified))
            .collect()
    }

    /// The bean definition of a class, when exactly one exists
    pub fn sole_bean_of_class(&self, qualified: &str) -> Option<&ComponentDefinition> {
        match self.beans_of_class(qualified).as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Stable content hash, recorded on generated units
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for def in self.definitions.values() {
            hasher.update(def.name.as_bytes());
            hasher.update([0]);
            hasher.update(def.kind.as_str().as_bytes());
            for alias in &def.aliases {
                hasher.update([b',']);
                hasher.update(alias.as_bytes());
            }
            for (k, v) in &def.raw_attributes {
                hasher.update([0]);
                hasher.update(k.as_bytes());
                hasher.update([b'=']);
                hasher.update(v.as_bytes());
            }
            hasher.update([b'\n']);
        }
        format!("sha256:{}", hex::encode(&hasher.finalize()[..8]))
    }
}

/// Transient builder used only while ingesting
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    definitions: IndexMap<String, ComponentDefinition>,
    aliases: IndexMap<String, String>,
    anonymous: usize,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generated name for an element without one (`<base>#<n>`)
    pub fn anonymous_name(&mut self, base: &str) -> String {
        loop {
            let candidate = format!("{}#{}", base, self.anonymous);
            self.anonymous += 1;
            if !self.definitions.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn claimed(&self, name: &str) -> Option<&ComponentDefinition> {
        match self.aliases.get(name) {
            Some(canonical) => self.definitions.get(canonical),
            None => self.definitions.get(name),
        }
    }

    pub fn insert(&mut self, definition: ComponentDefinition) -> Result<(), IngestError> {
        let taken = std::iter::once(&definition.name)
            .chain(&definition.aliases)
            .find_map(|name| self.claimed(name).map(|existing| (name.clone(), existing.source_location.clone())));
        if let Some((name, first)) = taken {
            return Err(IngestError::NameCollision {
                name,
                first,
                second: definition.source_location,
            });
        }
        for alias in &definition.aliases {
            self.aliases.insert(alias.clone(), definition.name.clone());
        }
        self.definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn build(self) -> Registry {
        Registry {
            definitions: self.definitions,
            aliases: self.aliases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, kind: ComponentKind) -> ComponentDefinition {
        ComponentDefinition {
            name: name.into(),
            kind,
            aliases: vec![],
            raw_attributes: IndexMap::new(),
            properties: vec![],
            constructor_args: vec![],
            source_location: format!("beans.xml:{}", name.len()),
        }
    }

    #[test]
    fn test_name_collision_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.insert(def("dataSource", ComponentKind::GenericBean)).unwrap();
        let err = builder
            .insert(def("dataSource", ComponentKind::GenericBean))
            .unwrap_err();
        assert!(matches!(err, IngestError::NameCollision { name, .. } if name == "dataSource"));
    }

    #[test]
    fn test_kind_string_round_trip() {
        for s in ["property-placeholder", "component-scan", "generic-bean", "annotation-config"] {
            assert_eq!(String::from(ComponentKind::from(s)), s);
        }
    }

    #[test]
    fn test_attribute_list_splits() {
        let mut d = def("scan", ComponentKind::ComponentScan);
        d.raw_attributes
            .insert("base-package".into(), "com.acme.web, com.acme.data".into());
        assert_eq!(d.attribute_list("base-package"), vec!["com.acme.web", "com.acme.data"]);
    }

    #[test]
    fn test_anonymous_names_are_unique() {
        let mut builder = RegistryBuilder::new();
        let a = builder.anonymous_name("component-scan");
        builder.insert(def(&a, ComponentKind::ComponentScan)).unwrap();
        let b = builder.anonymous_name("component-scan");
        assert_ne!(a, b);
    }

    fn arg(name: Option<&str>, index: Option<usize>, value: &str) -> ConstructorArg {
        ConstructorArg {
            name: name.map(String::from),
            index,
            value: PropertyValue::Literal(value.into()),
        }
    }

    fn placed(d: &ComponentDefinition, params: Option<&[String]>) -> Result<Vec<String>, String> {
        d.constructor_slots(params).map(|args| {
            args.iter()
                .map(|a| match &a.value {
                    PropertyValue::Literal(v) => v.clone(),
                    other => format!("{:?}", other),
                })
                .collect()
        })
    }

    #[test]
    fn test_constructor_slots_follow_names_and_indexes() {
        let params: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let mut d = def("t", ComponentKind::GenericBean);
        d.constructor_args = vec![arg(Some("b"), None, "B"), arg(Some("a"), None, "A"), arg(None, None, "C")];
        assert_eq!(placed(&d, Some(&params)).unwrap(), vec!["A", "B", "C"]);

        // positional args fill the slots an index leaves free
        d.constructor_args = vec![arg(None, None, "A"), arg(None, Some(0), "Z"), arg(None, None, "B")];
        assert_eq!(placed(&d, None).unwrap(), vec!["Z", "A", "B"]);
    }

    #[test]
    fn test_constructor_slots_reject_unplaceable_args() {
        let mut d = def("t", ComponentKind::GenericBean);
        d.constructor_args = vec![arg(Some("b"), None, "B"), arg(Some("a"), None, "A")];
        assert!(placed(&d, None).is_err());

        d.constructor_args = vec![arg(None, Some(1), "A"), arg(None, Some(1), "B")];
        assert!(placed(&d, None).is_err());

        d.constructor_args = vec![arg(None, Some(2), "A")];
        assert!(placed(&d, None).is_err());

        d.constructor_args = vec![arg(Some("only"), None, "A")];
        assert_eq!(placed(&d, None).unwrap(), vec!["A"]);
    }

    #[test]
    fn test_aliases_resolve_and_collide() {
        let mut builder = RegistryBuilder::new();
        let mut pool = def("pool", ComponentKind::GenericBean);
        pool.aliases = vec!["dbPool".into(), "mainPool".into()];
        builder.insert(pool).unwrap();
        let err = builder
            .insert(def("mainPool", ComponentKind::GenericBean))
            .unwrap_err();
        assert!(matches!(err, IngestError::NameCollision { name, .. } if name == "mainPool"));

        let registry = builder.build();
        assert_eq!(registry.get("mainPool").map(|d| d.name.as_str()), Some("pool"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sole_bean_of_class_outlives_the_query() {
        let mut builder = RegistryBuilder::new();
        let mut clock = def("clock", ComponentKind::GenericBean);
        clock.raw_attributes.insert("class".into(), "java.time.Clock".into());
        builder.insert(clock).unwrap();
        let registry = builder.build();
        let found = {
            let qualified = String::from("java.time.Clock");
            registry.sole_bean_of_class(&qualified)
        };
        assert_eq!(found.map(|d| d.name.as_str()), Some("clock"));
        assert!(registry.sole_bean_of_class("java.time.Instant").is_none());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let mut builder = RegistryBuilder::new();
        builder.insert(def("a", ComponentKind::GenericBean)).unwrap();
        let registry = builder.build();
        assert_eq!(registry.fingerprint(), registry.clone().fingerprint());
        assert!(registry.fingerprint().starts_with("sha256:"));
    }
}
