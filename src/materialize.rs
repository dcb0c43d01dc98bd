//! Declared-output materializer
//!
//! Turns the registry entries that have no in-source counterpart into a
//! generated configuration class: placeholder and scan elements become
//! class markers, beans whose class is not component-scanned become
//! factory methods. The generated unit is tagged in its metadata so that
//! downstream tooling can tell it from hand-written code.

use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::imports::{AddOutcome, ImportReconciler};
use crate::markers::{Capability, CapabilityKind, MarkerCatalog};
use crate::registry::{is_default_attribute, ComponentDefinition, ComponentKind, PropertyValue, Registry};
use crate::render::JavaPackage;
use crate::rules::{capitalize, decapitalize};
use crate::scope::is_identifier;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Metadata key tagging engine-generated units
pub const FILE_TYPE_KEY: &str = "remodel.fileType";
/// Value of [`FILE_TYPE_KEY`] on generated configuration classes
pub const CONFIGURATION_CLASS: &str = "ConfigurationClass";
/// Metadata key holding the fingerprint of the registry a unit was built from
pub const REGISTRY_KEY: &str = "remodel.registry";

/// A unit the host is expected to persist
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredOutput {
    /// `<source_root>/<package dirs>/<Class>.java`
    pub path: PathBuf,
    pub package: String,
    pub class_name: String,
    pub generated: bool,
    pub unit: ProgramUnit,
}

/// How a component kind is restated in the configuration class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// A property-source class marker per definition
    PropertySource,
    /// Base packages merged into one component-scan class marker
    ComponentScan,
    /// A factory method, unless the bean's class is component-scanned
    FactoryMethod,
}

/// Materializer output
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    pub outputs: Vec<DeclaredOutput>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds the generated configuration class from a registry
pub struct Materializer<'a> {
    catalog: &'a MarkerCatalog,
    reconciler: &'a ImportReconciler,
    class_name: String,
    translations: BTreeMap<ComponentKind, Translation>,
    scanned: BTreeSet<String>,
}

impl<'a> Materializer<'a> {
    pub fn new(catalog: &'a MarkerCatalog, reconciler: &'a ImportReconciler) -> Self {
        let mut translations = BTreeMap::new();
        translations.insert(ComponentKind::PropertyPlaceholder, Translation::PropertySource);
        translations.insert(ComponentKind::ComponentScan, Translation::ComponentScan);
        translations.insert(ComponentKind::GenericBean, Translation::FactoryMethod);
        Self {
            catalog,
            reconciler,
            class_name: "MyConfiguration".to_string(),
            translations,
            scanned: BTreeSet::new(),
        }
    }

    pub fn class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = name.into();
        self
    }

    /// Register or replace the translation of a component kind
    pub fn translate(mut self, kind: ComponentKind, translation: Translation) -> Self {
        self.translations.insert(kind, translation);
        self
    }

    /// Binary names of source classes that component scanning will pick up.
    /// Their sole bean definitions produce no factory method.
    pub fn scanned_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scanned.extend(classes.into_iter().map(Into::into));
        self
    }

    pub fn materialize(&self, registry: &Registry, target: &JavaPackage, source_root: &Path) -> Materialized {
        let relative = target.source_path(&self.class_name);
        let mut unit = ProgramUnit::new(relative.clone(), Some(target.render()));
        let mut class = ClassDecl::new(self.class_name.clone());
        class.modifiers = Modifiers::public();
        unit.types.push(class);

        let mut build = Build {
            unit,
            markers: Vec::new(),
            methods: Vec::new(),
            diagnostics: Vec::new(),
        };

        if let Some(name) = self.marker_name(&mut build, CapabilityKind::ConfigurationRole) {
            build.markers.push(Marker::bare(name));
        }

        let mut base_packages: Vec<String> = Vec::new();
        let mut scanning = false;
        for definition in registry.iter() {
            match self.translations.get(&definition.kind) {
                Some(Translation::PropertySource) => self.property_source(&mut build, definition),
                Some(Translation::ComponentScan) => {
                    scanning = true;
                    for package in definition.attribute_list("base-package") {
                        if !base_packages.contains(&package) {
                            base_packages.push(package);
                        }
                    }
                }
                Some(Translation::FactoryMethod) => {
                    let class = definition.class_name().unwrap_or_default();
                    if self.scanned.contains(class) && registry.sole_bean_of_class(class) == Some(definition) {
                        scanning = true;
                        let package = class.rsplit_once('.').map(|(p, _)| p).unwrap_or_default();
                        let covered = base_packages
                            .iter()
                            .any(|b| package == b || package.starts_with(&format!("{}.", b)));
                        if !package.is_empty() && !covered {
                            base_packages.push(package.to_string());
                        }
                        debug!(bean = %definition.name, class, "left to component scanning");
                    } else {
                        self.factory_method(&mut build, registry, definition);
                    }
                }
                None => build.unsupported(
                    definition,
                    format!("no translation for '{}' elements", definition.kind),
                ),
            }
        }

        if scanning {
            self.component_scan(&mut build, &base_packages);
        }

        let Build {
            mut unit,
            markers,
            methods,
            diagnostics,
        } = build;
        if let Some(class) = unit.types.first_mut() {
            class.markers = markers;
            class.members = methods.into_iter().map(Member::Method).collect();
        }
        unit.metadata
            .insert(FILE_TYPE_KEY.to_string(), CONFIGURATION_CLASS.to_string());
        unit.metadata
            .insert(REGISTRY_KEY.to_string(), registry.fingerprint());

        info!(
            class = %target.qualify(&self.class_name),
            markers = unit.types.first().map(|c| c.markers.len()).unwrap_or(0),
            factory_methods = unit.types.first().map(|c| c.members.len()).unwrap_or(0),
            skipped = diagnostics.len(),
            "materialized configuration class"
        );

        Materialized {
            outputs: vec![DeclaredOutput {
                path: source_root.join(&relative),
                package: target.render(),
                class_name: self.class_name.clone(),
                generated: true,
                unit,
            }],
            diagnostics,
        }
    }

    /// Import the first catalog marker with `kind` and return its written name
    fn marker_name(&self, build: &mut Build, kind: CapabilityKind) -> Option<String> {
        let def = self.catalog.first_with(kind)?;
        Some(self.import(&mut build.unit, &def.namespace, &def.name, &def.name))
    }

    /// Import `namespace.outer` and return `written`, qualified on a clash
    fn import(&self, unit: &mut ProgramUnit, namespace: &str, outer: &str, written: &str) -> String {
        if namespace.is_empty() {
            return written.to_string();
        }
        match self.reconciler.add_type_to_unit(unit, namespace, outer) {
            AddOutcome::Conflict(_) => format!("{}.{}", namespace, written),
            _ => written.to_string(),
        }
    }

    /// Type name to write for a binary class name such as `a.b.Outer$Inner`
    fn class_type(&self, unit: &mut ProgramUnit, class: &str) -> String {
        let (namespace, binary) = class.rsplit_once('.').unwrap_or(("", class));
        let outer = binary.split('$').next().unwrap_or(binary);
        self.import(unit, namespace, outer, &binary.replace('$', "."))
    }

    fn property_source(&self, build: &mut Build, definition: &ComponentDefinition) {
        let locations = definition.attribute_list("location");
        if locations.is_empty() {
            build.unsupported(definition, "property placeholder without a location");
            return;
        }
        let Some(name) = self.marker_name(build, CapabilityKind::PropertySource) else {
            build.unsupported(definition, "the marker catalog has no property-source marker");
            return;
        };
        build.markers.push(Marker::with_value(name, string_list(&locations)));
    }

    fn component_scan(&self, build: &mut Build, packages: &[String]) {
        let Some(def) = self.catalog.first_with(CapabilityKind::ComponentScan) else {
            return;
        };
        let attribute = match def.capability(CapabilityKind::ComponentScan) {
            Some(Capability::ComponentScan { attribute }) => attribute.clone(),
            _ => "value".to_string(),
        };
        let name = self.import(&mut build.unit, &def.namespace, &def.name, &def.name);
        let marker = if packages.is_empty() {
            Marker::bare(name)
        } else if attribute == "value" {
            Marker::with_value(name, string_list(packages))
        } else {
            Marker {
                name,
                args: Some(vec![MarkerArg {
                    name: Some(attribute),
                    value: string_list(packages),
                }]),
            }
        };
        build.markers.push(marker);
    }

    fn factory_method(&self, build: &mut Build, registry: &Registry, definition: &ComponentDefinition) {
        let attribute = |key: &str| definition.attribute(key).filter(|v| !v.is_empty());
        if attribute("abstract") == Some("true") {
            debug!(bean = %definition.name, "abstract bean definition has no instance");
            return;
        }
        if attribute("parent").is_some() || attribute("factory-bean").is_some() {
            build.unsupported(definition, "bean inheritance and instance factories are not translated");
            return;
        }
        let Some(class) = definition.class_name() else {
            build.unsupported(definition, "bean definition without a class");
            return;
        };

        if let Some(tag) = definition.unsupported_value() {
            build.unsupported(definition, format!("'{}' values are not translated", tag));
            return;
        }
        let unknown = definition
            .constructor_args
            .iter()
            .map(|a| &a.value)
            .chain(definition.properties.iter().map(|p| &p.value))
            .find_map(|value| match value {
                PropertyValue::Reference(target) if registry.get(target).and_then(|d| d.class_name()).is_none() => {
                    Some(target)
                }
                _ => None,
            });
        if let Some(target) = unknown {
            build.unsupported(
                definition,
                format!("reference to '{}' whose class is unknown", target),
            );
            return;
        }
        let slots = match definition.constructor_slots(None) {
            Ok(slots) => slots,
            Err(reason) => {
                build.unsupported(definition, reason);
                return;
            }
        };

        // Every referenced bean becomes one parameter typed by its class,
        // whichever of its names the reference uses
        let mut params: Vec<Param> = Vec::new();
        let mut bound: BTreeMap<String, String> = BTreeMap::new();
        let mut reference = |build: &mut Build, target: &str| -> Option<Expr> {
            let referenced = registry.get(target)?;
            if let Some(name) = bound.get(&referenced.name) {
                return Some(Expr::name(name.clone()));
            }
            let class = referenced.class_name()?;
            let ty = self.class_type(&mut build.unit, class);
            let simple = ty.rsplit('.').next().unwrap_or(&ty);
            let mut name = if is_identifier(&referenced.name) {
                referenced.name.clone()
            } else {
                decapitalize(simple)
            };
            while params.iter().any(|p| p.name == name) {
                name.push('_');
            }
            params.push(Param::new(TypeRef(ty.clone()), name.clone()));
            bound.insert(referenced.name.clone(), name.clone());
            Some(Expr::name(name))
        };
        let mut value_of = |build: &mut Build, value: &PropertyValue| -> Option<Expr> {
            match value {
                PropertyValue::Literal(text) => Some(literal(text)),
                PropertyValue::Reference(target) => reference(build, target),
                PropertyValue::Unsupported(_) => None,
            }
        };

        let mut args = Vec::new();
        for arg in slots {
            let Some(value) = value_of(build, &arg.value) else {
                return;
            };
            args.push(value);
        }
        let mut setters = Vec::new();
        for property in &definition.properties {
            let Some(value) = value_of(build, &property.value) else {
                return;
            };
            setters.push((format!("set{}", capitalize(&property.name)), value));
        }

        let ty = self.class_type(&mut build.unit, class);
        let create = match attribute("factory-method") {
            Some(factory) => Expr::Call {
                target: Some(Box::new(Expr::name(ty.clone()))),
                name: factory.to_string(),
                args,
            },
            None => Expr::New {
                ty: TypeRef(ty.clone()),
                args,
            },
        };
        let mut stmts = Vec::new();
        if setters.is_empty() {
            stmts.push(Stmt::Return(Some(create)));
        } else {
            let local = ["bean", "instance", "created"]
                .into_iter()
                .find(|n| params.iter().all(|p| p.name != *n))
                .unwrap_or("created");
            stmts.push(Stmt::Local {
                keywords: Vec::new(),
                ty: TypeRef(ty.clone()),
                name: local.to_string(),
                init: Some(create),
            });
            for (setter, value) in setters {
                stmts.push(Stmt::Expr(Expr::Call {
                    target: Some(Box::new(Expr::name(local))),
                    name: setter,
                    args: vec![value],
                }));
            }
            stmts.push(Stmt::Return(Some(Expr::name(local))));
        }

        let simple = ty.rsplit('.').next().unwrap_or(&ty).to_string();
        let (method_name, explicit_name) = self.method_name(build, definition, &simple);
        let Some(bean_marker) = self.marker_name(build, CapabilityKind::FactoryMethod) else {
            build.unsupported(definition, "the marker catalog has no factory-method marker");
            return;
        };
        let mut marker_args: Vec<(&str, Expr)> = Vec::new();
        if explicit_name || !definition.aliases.is_empty() {
            let names: Vec<String> = std::iter::once(&definition.name)
                .chain(&definition.aliases)
                .cloned()
                .collect();
            marker_args.push(("name", string_list(&names)));
        }
        if let Some(init) = attribute("init-method") {
            marker_args.push(("initMethod", Expr::string(init)));
        }
        if let Some(destroy) = attribute("destroy-method") {
            marker_args.push(("destroyMethod", Expr::string(destroy)));
        }
        if attribute("autowire-candidate") == Some("false") {
            marker_args.push(("autowireCandidate", literal("false")));
        }
        let marker = match marker_args.as_slice() {
            [] => Marker::bare(bean_marker),
            [("name", value)] => Marker::with_value(bean_marker, value.clone()),
            many => Marker {
                name: bean_marker,
                args: Some(
                    many.iter()
                        .map(|(key, value)| MarkerArg {
                            name: Some(key.to_string()),
                            value: value.clone(),
                        })
                        .collect(),
                ),
            },
        };

        let mut markers = vec![marker];
        markers.extend(self.attribute_markers(build, definition));

        debug!(bean = %definition.name, method = %method_name, "materialized factory method");
        build.methods.push(MethodDecl {
            doc: None,
            markers,
            modifiers: Modifiers::default(),
            type_params: None,
            return_type: Some(TypeRef(ty)),
            name: method_name,
            params,
            throws: None,
            body: Some(Block { stmts }),
        });
    }

    /// Markers restating `scope`, `lazy-init` and the like, in catalog order
    fn attribute_markers(&self, build: &mut Build, definition: &ComponentDefinition) -> Vec<Marker> {
        let mut markers = Vec::new();
        for def in &self.catalog.markers {
            let Some(Capability::BeanAttribute { attribute }) = def.capability(CapabilityKind::BeanAttribute) else {
                continue;
            };
            let Some(value) = definition.attribute(attribute) else {
                continue;
            };
            if is_default_attribute(attribute, value) {
                continue;
            }
            let name = self.import(&mut build.unit, &def.namespace, &def.name, &def.name);
            markers.push(match value.trim() {
                "true" => Marker::bare(name),
                _ => Marker::with_value(name, string_list(&definition.attribute_list(attribute))),
            });
        }
        markers
    }

    /// The method name for a bean, and whether the bean name must be spelled out
    fn method_name(&self, build: &Build, definition: &ComponentDefinition, simple: &str) -> (String, bool) {
        let taken = |name: &str| build.methods.iter().any(|m| m.name == name);
        if is_identifier(&definition.name) && !taken(&definition.name) {
            return (definition.name.clone(), false);
        }
        let base = decapitalize(simple);
        let mut name = base.clone();
        let mut n = 2;
        while taken(&name) {
            name = format!("{}{}", base, n);
            n += 1;
        }
        // Generated names (`a.B#0`) were never visible to anyone
        (name, !definition.name.contains('#'))
    }
}

/// Mutable state of one materialization
struct Build {
    unit: ProgramUnit,
    markers: Vec<Marker>,
    methods: Vec<MethodDecl>,
    diagnostics: Vec<Diagnostic>,
}

impl Build {
    fn unsupported(&mut self, definition: &ComponentDefinition, message: impl Into<String>) {
        let message = message.into();
        debug!(definition = %definition.name, %message, "skipping registry entry");
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnsupportedKind,
            definition.name.clone(),
            definition.source_location.clone(),
            message,
        ));
    }
}

/// `"a"` for one value, `{"a", "b"}` for several
fn string_list(values: &[String]) -> Expr {
    match values {
        [single] => Expr::string(single),
        many => Expr::ArrayInit(many.iter().map(|v| Expr::string(v)).collect()),
    }
}

/// Canonical decimal numbers and booleans stay bare; everything else,
/// `010` and `08080` included, is a string
fn literal(text: &str) -> Expr {
    let canonical = |digits: &str| {
        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) && (digits == "0" || !digits.starts_with('0'))
    };
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let bare = match unsigned.split_once('.') {
        None if canonical(unsigned) => {
            if text.parse::<i32>().is_ok() {
                Some(text.to_string())
            } else if text.parse::<i64>().is_ok() {
                Some(format!("{}L", text))
            } else {
                None
            }
        }
        Some((whole, fraction)) if canonical(whole) && !fraction.is_empty() && fraction.bytes().all(|b| b.is_ascii_digit()) => {
            Some(text.to_string())
        }
        _ if text == "true" || text == "false" => Some(text.to_string()),
        _ => None,
    };
    match bare {
        Some(spelled) => Expr::Literal(spelled),
        None => Expr::string(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::ImportLayout;
    use crate::ingest::{ingest, ConfigSource, NamespaceOverrides, XmlConfigParser};
    use crate::render::render_java;
    use pretty_assertions::assert_eq;

    const XML: &str = r#"<beans xmlns="http://www.springframework.org/schema/beans"
       xmlns:context="http://www.springframework.org/schema/context"
       xmlns:aop="http://www.springframework.org/schema/aop">
  <context:property-placeholder location="classpath:app.properties"/>
  <context:component-scan base-package="com.acme.web"/>
  <bean id="orderService" class="com.acme.OrderService"/>
  <bean id="dataSource" class="com.zaxxer.hikari.HikariDataSource" destroy-method="close">
    <property name="jdbcUrl" value="jdbc:h2:mem:orders"/>
    <property name="maximumPoolSize" value="4"/>
  </bean>
  <bean id="orderRepository" class="com.acme.JdbcOrderRepository">
    <constructor-arg ref="dataSource"/>
  </bean>
  <aop:config/>
</beans>"#;

    fn registry(xml: &str) -> Registry {
        ingest(
            &[ConfigSource::new("beans.xml", xml)],
            &XmlConfigParser,
            &NamespaceOverrides::spring_context(),
        )
        .unwrap()
    }

    fn package() -> JavaPackage {
        JavaPackage::try_from("com.acme.config".to_string()).unwrap()
    }

    #[test]
    fn test_configuration_class_generated() {
        let catalog = MarkerCatalog::spring();
        let reconciler = catalog.reconciler(ImportLayout::default());
        let registry = registry(XML);
        let result = Materializer::new(&catalog, &reconciler)
            .scanned_classes(["com.acme.OrderService"])
            .materialize(&registry, &package(), Path::new("src/main/java"));

        let expected = r#"package com.acme.config;

import org.springframework.context.annotation.Configuration;
import org.springframework.context.annotation.PropertySource;
import com.zaxxer.hikari.HikariDataSource;
import org.springframework.context.annotation.Bean;
import com.acme.JdbcOrderRepository;
import org.springframework.context.annotation.ComponentScan;

@Configuration
@PropertySource("classpath:app.properties")
@ComponentScan(basePackages = {"com.acme.web", "com.acme"})
public class MyConfiguration {
    @Bean(destroyMethod = "close")
    HikariDataSource dataSource() {
        HikariDataSource bean = new HikariDataSource();
        bean.setJdbcUrl("jdbc:h2:mem:orders");
        bean.setMaximumPoolSize(4);
        return bean;
    }

    @Bean
    JdbcOrderRepository orderRepository(HikariDataSource dataSource) {
        return new JdbcOrderRepository(dataSource);
    }
}
"#;
        let output = &result.outputs[0];
        assert_eq!(render_java(&output.unit).unwrap(), expected);
        assert_eq!(
            output.path,
            PathBuf::from("src/main/java/com/acme/config/MyConfiguration.java")
        );
        assert!(output.generated);
        assert_eq!(output.unit.metadata[FILE_TYPE_KEY], CONFIGURATION_CLASS);
        assert_eq!(output.unit.metadata[REGISTRY_KEY], registry.fingerprint());

        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnsupportedKind);
    }

    #[test]
    fn test_anonymous_and_named_beans() {
        let catalog = MarkerCatalog::spring();
        let reconciler = catalog.reconciler(ImportLayout::default());
        let registry = registry(
            r#"<beans xmlns="http://www.springframework.org/schema/beans">
  <bean class="java.time.Clock" factory-method="systemUTC"/>
  <bean id="main-clock" class="java.time.Clock" factory-method="systemDefaultZone" init-method="start"/>
  <bean id="base" class="com.acme.Base" abstract="true"/>
  <bean id="broken" class="com.acme.Repo">
    <constructor-arg ref="missing"/>
  </bean>
</beans>"#,
        );
        let result = Materializer::new(&catalog, &reconciler)
            .class_name("ClockConfiguration")
            .materialize(&registry, &package(), Path::new("."));
        let class = &result.outputs[0].unit.types[0];
        let methods: Vec<(&str, String)> = class
            .members
            .iter()
            .filter_map(|m| match m {
                Member::Method(m) => Some((m.name.as_str(), crate::render::marker_text(&m.markers[0]))),
                _ => None,
            })
            .collect();
        assert_eq!(
            methods,
            vec![
                ("clock", "@Bean".to_string()),
                (
                    "clock2",
                    "@Bean(name = \"main-clock\", initMethod = \"start\")".to_string()
                ),
            ]
        );
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].unit, "broken");
    }

    #[test]
    fn test_scan_markers_without_scan_element() {
        let catalog = MarkerCatalog::spring();
        let reconciler = catalog.reconciler(ImportLayout::default());
        let registry = registry(
            r#"<beans xmlns="http://www.springframework.org/schema/beans">
  <bean id="orderService" class="com.acme.orders.OrderService"/>
</beans>"#,
        );
        let result = Materializer::new(&catalog, &reconciler)
            .scanned_classes(["com.acme.orders.OrderService"])
            .materialize(&registry, &package(), Path::new("."));
        let class = &result.outputs[0].unit.types[0];
        assert!(class.members.is_empty());
        assert_eq!(
            class.markers[1],
            Marker {
                name: "ComponentScan".into(),
                args: Some(vec![MarkerArg {
                    name: Some("basePackages".into()),
                    value: Expr::string("com.acme.orders"),
                }]),
            }
        );
    }

    #[test]
    fn test_literal_spelling() {
        assert_eq!(literal("42"), Expr::Literal("42".into()));
        assert_eq!(literal("-7"), Expr::Literal("-7".into()));
        assert_eq!(literal("0"), Expr::Literal("0".into()));
        assert_eq!(literal("2.5"), Expr::Literal("2.5".into()));
        assert_eq!(literal("3000000000"), Expr::Literal("3000000000L".into()));
        assert_eq!(literal("false"), Expr::Literal("false".into()));
        assert_eq!(literal("orders"), Expr::string("orders"));
        // leading zeros would read as octal, or not compile at all
        assert_eq!(literal("010"), Expr::string("010"));
        assert_eq!(literal("08080"), Expr::string("08080"));
        assert_eq!(literal("99999999999999999999"), Expr::string("99999999999999999999"));
        assert_eq!(literal("1e3"), Expr::string("1e3"));
        assert_eq!(literal(".5"), Expr::string(".5"));
    }

    fn factory_methods(xml: &str) -> (Vec<String>, Vec<Diagnostic>) {
        let catalog = MarkerCatalog::spring();
        let reconciler = catalog.reconciler(ImportLayout::default());
        let result = Materializer::new(&catalog, &reconciler).materialize(&registry(xml), &package(), Path::new("."));
        let methods = result.outputs[0].unit.types[0]
            .members
            .iter()
            .filter_map(|m| match m {
                Member::Method(m) => Some(m.name.clone()),
                _ => None,
            })
            .collect();
        (methods, result.diagnostics)
    }

    #[test]
    fn test_unsupported_value_skips_the_whole_bean() {
        let (methods, diagnostics) = factory_methods(
            r#"<beans xmlns="http://www.springframework.org/schema/beans">
  <bean id="pool" class="com.acme.Pool">
    <property name="hosts"><list><value>a</value><value>b</value></list></property>
    <property name="size" value="4"/>
  </bean>
  <bean id="clock" class="java.time.Clock" factory-method="systemUTC"/>
</beans>"#,
        );
        assert_eq!(methods, vec!["clock"]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnsupportedKind);
        assert_eq!(diagnostics[0].unit, "pool");
        assert_eq!(diagnostics[0].message, "'list' values are not translated");
    }

    #[test]
    fn test_constructor_args_placed_by_index_then_position() {
        let catalog = MarkerCatalog::spring();
        let reconciler = catalog.reconciler(ImportLayout::default());
        let registry = registry(
            r#"<beans xmlns="http://www.springframework.org/schema/beans">
  <bean id="range" class="com.acme.Range">
    <constructor-arg value="high"/>
    <constructor-arg index="0" value="low"/>
  </bean>
  <bean id="pair" class="com.acme.Pair">
    <constructor-arg name="b" value="2"/>
    <constructor-arg name="a" value="1"/>
  </bean>
</beans>"#,
        );
        let result = Materializer::new(&catalog, &reconciler).materialize(&registry, &package(), Path::new("."));
        let text = render_java(&result.outputs[0].unit).unwrap();
        assert!(text.contains("        return new Range(\"low\", \"high\");"), "{}", text);
        assert!(!text.contains("Pair"));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].unit, "pair");
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnsupportedKind);
    }

    #[test]
    fn test_aliases_named_on_bean_and_resolved_in_references() {
        let catalog = MarkerCatalog::spring();
        let reconciler = catalog.reconciler(ImportLayout::default());
        let registry = registry(
            r#"<beans xmlns="http://www.springframework.org/schema/beans">
  <bean id="pool" name="dbPool,mainPool" class="com.acme.Pool"/>
  <bean id="repo" class="com.acme.Repo">
    <constructor-arg ref="mainPool"/>
    <property name="backup" ref="dbPool"/>
  </bean>
</beans>"#,
        );
        let result = Materializer::new(&catalog, &reconciler).materialize(&registry, &package(), Path::new("."));
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let text = render_java(&result.outputs[0].unit).unwrap();
        let expected = r#"    @Bean({"pool", "dbPool", "mainPool"})
    Pool pool() {
        return new Pool();
    }

    @Bean
    Repo repo(Pool pool) {
        Repo bean = new Repo(pool);
        bean.setBackup(pool);
        return bean;
    }
"#;
        assert!(text.contains(expected), "{}", text);
    }

    #[test]
    fn test_bean_attributes_become_method_markers() {
        let catalog = MarkerCatalog::spring();
        let reconciler = catalog.reconciler(ImportLayout::default());
        let registry = registry(
            r#"<beans xmlns="http://www.springframework.org/schema/beans">
  <bean id="cart" class="com.acme.Cart" scope="prototype" lazy-init="true" autowire-candidate="false"/>
  <bean id="clock" class="com.acme.Clock" primary="true" depends-on="cart, pool" scope="singleton"/>
</beans>"#,
        );
        let result = Materializer::new(&catalog, &reconciler).materialize(&registry, &package(), Path::new("."));
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let text = render_java(&result.outputs[0].unit).unwrap();
        let expected = r#"    @Bean(autowireCandidate = false)
    @Scope("prototype")
    @Lazy
    Cart cart() {
        return new Cart();
    }

    @Bean
    @Primary
    @DependsOn({"cart", "pool"})
    Clock clock() {
        return new Clock();
    }
"#;
        assert!(text.contains(expected), "{}", text);
    }
}
