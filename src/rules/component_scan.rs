//! Component-scannable marking
//!
//! Classes defined as beans in the registry get the catalog's component
//! marker so that component scanning finds them, and their XML wiring is
//! restated with injection markers: `<property>` on fields (which the
//! consolidation rule then moves into the constructor) and
//! `<constructor-arg>` on the parameters of the only constructor.
//!
//! A bean is only handed over to scanning when every part of its
//! definition can be restated. Otherwise the class is left alone, the
//! materializer keeps a factory method for it, and a `ScanDeclined`
//! diagnostic names what stood in the way.

use super::{decapitalize, RewriteRule, RuleContext, RuleOutcome};
use crate::ast::*;
use crate::diagnostics::DiagnosticKind;
use crate::error::Result;
use crate::imports::ImportSet;
use crate::markers::CapabilityKind;
use crate::registry::{is_default_attribute, ComponentDefinition, PropertyValue};
use std::collections::BTreeMap;
use tracing::debug;

/// Marks bean classes as components and restates their wiring
pub struct MakeComponentScannable;

/// A marker to add: which capability, and an optional `value` argument
#[derive(Debug, Clone)]
struct Addition {
    kind: CapabilityKind,
    value: Option<Expr>,
}

impl Addition {
    fn bare(kind: CapabilityKind) -> Self {
        Self { kind, value: None }
    }

    fn with(kind: CapabilityKind, value: &str) -> Self {
        Self {
            kind,
            value: Some(Expr::string(value)),
        }
    }
}

#[derive(Debug, Default)]
struct Plan {
    component: Option<Addition>,
    fields: Vec<(String, Vec<Addition>)>,
    /// Parameter index of the sole constructor
    params: Vec<(usize, Vec<Addition>)>,
}

impl Plan {
    fn is_empty(&self) -> bool {
        self.component.is_none() && self.fields.is_empty() && self.params.is_empty()
    }

    fn additions(&self) -> impl Iterator<Item = &Addition> {
        self.component
            .iter()
            .chain(self.fields.iter().flat_map(|(_, a)| a))
            .chain(self.params.iter().flat_map(|(_, a)| a))
    }
}

/// What component scanning can do with the bean definition of a class
#[derive(Debug)]
enum Restatement<'r> {
    NotABean,
    Restatable(&'r ComponentDefinition, Plan),
    /// The definition stays a factory method, for this reason
    Declined(String),
}

impl RewriteRule for MakeComponentScannable {
    fn name(&self) -> &'static str {
        "make-component-scannable"
    }

    fn apply(&self, unit: &mut ProgramUnit, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        let mut outcome = RuleOutcome::unchanged();
        if ctx.registry.is_empty() {
            return Ok(outcome);
        }

        for path in unit.class_paths() {
            let (bean, plan) = match restatement(unit, &path, ctx) {
                Restatement::NotABean => continue,
                Restatement::Declined(reason) => {
                    debug!(unit = %unit.path, class = %path, %reason, "bean left to its factory method");
                    outcome.report(DiagnosticKind::ScanDeclined, unit, &path, reason);
                    continue;
                }
                Restatement::Restatable(bean, plan) => (bean, plan),
            };
            if plan.is_empty() {
                continue;
            }

            // Resolve the written name of every marker kind before editing
            let mut names: BTreeMap<&'static str, String> = BTreeMap::new();
            for addition in plan.additions() {
                let key = kind_key(addition.kind);
                if names.contains_key(key) {
                    continue;
                }
                let Some(def) = ctx.catalog.first_with(addition.kind) else {
                    continue;
                };
                let name = ctx.import_marker(unit, &def.namespace, &def.name, &path, &mut outcome);
                names.insert(key, name);
            }
            let marker = |addition: &Addition| -> Option<Marker> {
                let name = names.get(kind_key(addition.kind))?.clone();
                Some(match &addition.value {
                    Some(value) => Marker::with_value(name, value.clone()),
                    None => Marker::bare(name),
                })
            };

            let Some(class) = unit.class_mut(&path) else {
                continue;
            };
            if let Some(m) = plan.component.as_ref().and_then(marker) {
                class.markers.push(m);
            }
            for (field, additions) in &plan.fields {
                if let Some(f) = class.field_mut(field) {
                    f.markers.extend(additions.iter().filter_map(marker));
                }
            }
            let ctor = class.members.iter_mut().find_map(|m| match m {
                Member::Constructor(c) => Some(c),
                _ => None,
            });
            if let Some(ctor) = ctor {
                for (index, additions) in &plan.params {
                    if let Some(p) = ctor.params.get_mut(*index) {
                        p.markers.extend(additions.iter().filter_map(marker));
                    }
                }
            }
            debug!(unit = %unit.path, class = %path, bean = %bean.name, "restated bean definition in source");
            outcome.mark_changed();
        }
        Ok(outcome)
    }
}

fn kind_key(kind: CapabilityKind) -> &'static str {
    match kind {
        CapabilityKind::Component => "component",
        CapabilityKind::InjectsDependency => "inject",
        CapabilityKind::Qualifier => "qualifier",
        CapabilityKind::LiteralValue => "value",
        _ => "other",
    }
}

/// Whether component scanning could instantiate the class at `path`:
/// a concrete top-level or static nested class.
fn is_scannable(path: &str, class: &ClassDecl) -> bool {
    class.kind == TypeKind::Class
        && !class.modifiers.has("abstract")
        && (!path.contains('.') || class.modifiers.is_static())
}

/// Binary names (`a.b.Outer$Inner`) of the classes of a unit whose bean
/// definitions component scanning takes over
pub fn scannable_classes(unit: &ProgramUnit, ctx: &RuleContext<'_>) -> Vec<String> {
    unit.class_paths()
        .into_iter()
        .filter(|path| matches!(restatement(unit, path, ctx), Restatement::Restatable(..)))
        .map(|path| unit.qualify(&path.replace('.', "$")))
        .collect()
}

/// Whether the class at `path` has a bean definition that stays a factory
/// method, which calls the class's constructors as they are now
pub(crate) fn keeps_factory_method(unit: &ProgramUnit, path: &str, ctx: &RuleContext<'_>) -> bool {
    matches!(restatement(unit, path, ctx), Restatement::Declined(_))
}

fn restatement<'r>(unit: &ProgramUnit, path: &str, ctx: &RuleContext<'r>) -> Restatement<'r> {
    let Some(class) = unit.class(path) else {
        return Restatement::NotABean;
    };
    let qualified = unit.qualify(path);
    // Nested classes appear in bean definitions in binary form
    let binary = unit.qualify(&path.replace('.', "$"));
    let mut beans = ctx.registry.beans_of_class(&qualified);
    if binary != qualified {
        beans.extend(ctx.registry.beans_of_class(&binary));
    }
    let bean = match beans.as_slice() {
        [] => return Restatement::NotABean,
        [bean] => *bean,
        many => return Restatement::Declined(format!("{} bean definitions name the class", many.len())),
    };
    if !is_scannable(path, class) {
        return Restatement::Declined("component scanning cannot instantiate the class".into());
    }
    if !bean.aliases.is_empty() {
        return Restatement::Declined(format!("bean '{}' has aliases", bean.name));
    }
    if let Some((key, value)) = bean
        .raw_attributes
        .iter()
        .find(|(k, v)| !is_default_attribute(k, v))
    {
        return Restatement::Declined(format!("attribute {}=\"{}\" has no component equivalent", key, value));
    }
    if let Some(tag) = bean.unsupported_value() {
        return Restatement::Declined(format!("'{}' values cannot be restated", tag));
    }
    match plan_class(class, bean, &unit.imports, ctx) {
        Ok(plan) => Restatement::Restatable(bean, plan),
        Err(reason) => Restatement::Declined(reason),
    }
}

/// String argument of the first marker with `kind`
fn marker_value(markers: &[Marker], kind: CapabilityKind, imports: &ImportSet, ctx: &RuleContext<'_>) -> Option<String> {
    markers
        .iter()
        .filter(|m| ctx.has(imports, m, kind))
        .find_map(|m| m.arg("value").and_then(Expr::as_string_literal))
}

/// Whether the markers of a field or parameter called `name` already inject
/// `value`
fn restates(
    markers: &[Marker],
    name: &str,
    value: &PropertyValue,
    imports: &ImportSet,
    ctx: &RuleContext<'_>,
) -> bool {
    let qualifier = marker_value(markers, CapabilityKind::Qualifier, imports, ctx);
    let literal = marker_value(markers, CapabilityKind::LiteralValue, imports, ctx);
    match value {
        PropertyValue::Reference(target) => match qualifier {
            Some(q) => &q == target,
            None => target == name && literal.is_none(),
        },
        PropertyValue::Literal(text) => literal.as_deref() == Some(text.as_str()),
        PropertyValue::Unsupported(_) => false,
    }
}

/// `this.field = param` or `field = param`, returning `(field, param)`
fn plain_assignment(stmt: &Stmt) -> Option<(&str, &str)> {
    let Stmt::Expr(Expr::Assign { target, op, value }) = stmt else {
        return None;
    };
    let Expr::Name(param) = value.as_ref() else {
        return None;
    };
    let field = match target.as_ref() {
        Expr::FieldAccess { target, name } if matches!(**target, Expr::This) => name,
        Expr::Name(name) if name != param => name,
        _ => return None,
    };
    (op == "=").then_some((field.as_str(), param.as_str()))
}

fn plan_class(
    class: &ClassDecl,
    bean: &ComponentDefinition,
    imports: &ImportSet,
    ctx: &RuleContext<'_>,
) -> std::result::Result<Plan, String> {
    let mut plan = Plan::default();

    if !class
        .markers
        .iter()
        .any(|m| ctx.has(imports, m, CapabilityKind::Component))
    {
        let default_name = decapitalize(&class.name);
        plan.component = Some(if bean.name == default_name || bean.name.contains('#') {
            Addition::bare(CapabilityKind::Component)
        } else {
            Addition::with(CapabilityKind::Component, &bean.name)
        });
    }

    let ctors: Vec<&MethodDecl> = class.constructors().map(|(_, c)| c).collect();
    let mut ctor_names = UnitNames::default();
    // field -> constructor parameter it is plainly assigned from
    let mut ctor_params: BTreeMap<&str, &Param> = BTreeMap::new();
    for ctor in &ctors {
        ctor_names.collect_method(ctor);
        for stmt in ctor.body.iter().flat_map(|b| &b.stmts) {
            if let Some((field, param)) = plain_assignment(stmt) {
                if let Some(p) = ctor.params.iter().find(|p| p.name == param) {
                    ctor_params.insert(field, p);
                }
            }
        }
    }

    for property in &bean.properties {
        let Some(field) = class.field(&property.name).filter(|f| !f.modifiers.is_static()) else {
            return Err(format!("no instance field for property '{}'", property.name));
        };
        let setter = format!("set{}", super::capitalize(&property.name));
        let odd_setter = class.methods().any(|(_, m)| {
            m.name == setter
                && m.params.len() == 1
                && !matches!(
                    m.body.as_ref().map(|b| b.stmts.as_slice()),
                    Some([stmt]) if plain_assignment(stmt) == Some((field.name.as_str(), m.params[0].name.as_str()))
                )
        });
        if odd_setter {
            return Err(format!("{} does more than assign '{}'", setter, field.name));
        }

        let injected = field
            .markers
            .iter()
            .any(|m| ctx.has(imports, m, CapabilityKind::InjectsDependency));
        if injected {
            if restates(&field.markers, &field.name, &property.value, imports, ctx) {
                continue;
            }
            return Err(format!("field '{}' is injected with other wiring", field.name));
        }
        if let Some(param) = ctor_params.get(field.name.as_str()) {
            if restates(&param.markers, &param.name, &property.value, imports, ctx) {
                continue;
            }
        }
        if ctor_names.assigned.contains(&field.name) {
            return Err(format!("a constructor sets field '{}'", field.name));
        }

        let additions = match &property.value {
            PropertyValue::Reference(target) => {
                let mut a = vec![Addition::bare(CapabilityKind::InjectsDependency)];
                if target != &field.name {
                    a.push(Addition::with(CapabilityKind::Qualifier, target));
                }
                a
            }
            PropertyValue::Literal(text) => vec![Addition::with(CapabilityKind::LiteralValue, text)],
            PropertyValue::Unsupported(tag) => return Err(format!("'{}' values cannot be restated", tag)),
        };
        plan.fields.push((field.name.clone(), additions));
    }

    if !bean.constructor_args.is_empty() {
        let [ctor] = ctors.as_slice() else {
            return Err(format!(
                "constructor-args need exactly one constructor, found {}",
                ctors.len()
            ));
        };
        plan.params = plan_params(ctor, bean, imports, ctx)?;
    }
    Ok(plan)
}

fn plan_params(
    ctor: &MethodDecl,
    bean: &ComponentDefinition,
    imports: &ImportSet,
    ctx: &RuleContext<'_>,
) -> std::result::Result<Vec<(usize, Vec<Addition>)>, String> {
    let names: Vec<String> = ctor.params.iter().map(|p| p.name.clone()).collect();
    let mut out = Vec::new();
    for (index, arg) in bean.constructor_slots(Some(&names))?.into_iter().enumerate() {
        let param = &ctor.params[index];
        if restates(&param.markers, &param.name, &arg.value, imports, ctx) {
            continue;
        }
        let wired = [CapabilityKind::Qualifier, CapabilityKind::LiteralValue]
            .into_iter()
            .any(|kind| param.markers.iter().any(|m| ctx.has(imports, m, kind)));
        if wired {
            return Err(format!("parameter '{}' is wired differently", param.name));
        }
        let addition = match &arg.value {
            PropertyValue::Literal(text) => Addition::with(CapabilityKind::LiteralValue, text),
            PropertyValue::Reference(target) => Addition::with(CapabilityKind::Qualifier, target),
            PropertyValue::Unsupported(tag) => return Err(format!("'{}' values cannot be restated", tag)),
        };
        out.push((index, vec![addition]));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ingest, ConfigSource, NamespaceOverrides, XmlConfigParser};
    use crate::registry::Registry;
    use crate::rules::testing::Harness;
    use pretty_assertions::assert_eq;

    fn registry(beans: &str) -> Registry {
        let xml = format!(
            r#"<beans xmlns="http://www.springframework.org/schema/beans">{}</beans>"#,
            beans
        );
        ingest(
            &[ConfigSource::new("beans.xml", xml)],
            &XmlConfigParser,
            &NamespaceOverrides::spring_context(),
        )
        .unwrap()
    }

    #[test]
    fn test_bean_class_marked_and_properties_restated() {
        let harness = Harness::with_registry(registry(
            r#"<bean id="orderService" class="com.acme.OrderService">
                 <property name="repository" ref="jdbcRepository"/>
                 <property name="limit" value="10"/>
               </bean>"#,
        ));
        let source = r#"package com.acme;

public class OrderService {
    private OrderRepository repository;
    private int limit;

    public void setRepository(OrderRepository repository) {
        this.repository = repository;
    }
}
"#;
        let expected = r#"package com.acme;

import org.springframework.stereotype.Component;
import org.springframework.beans.factory.annotation.Autowired;
import org.springframework.beans.factory.annotation.Qualifier;
import org.springframework.beans.factory.annotation.Value;

@Component
public class OrderService {
    @Autowired
    @Qualifier("jdbcRepository")
    private OrderRepository repository;

    @Value("10")
    private int limit;

    public void setRepository(OrderRepository repository) {
        this.repository = repository;
    }
}
"#;
        let (out, outcome) = harness.apply(&MakeComponentScannable, source);
        assert!(outcome.changed);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_explicit_bean_name_kept_as_marker_value() {
        let harness = Harness::with_registry(registry(
            r#"<bean id="orders" class="com.acme.OrderService"/>"#,
        ));
        let source = "package com.acme;\n\nclass OrderService {\n}\n";
        let (unit, _) = harness.apply_unit(&MakeComponentScannable, source);
        let class = unit.class("OrderService").unwrap();
        assert_eq!(
            class.markers,
            vec![Marker::with_value("Component", Expr::string("orders"))]
        );
    }

    #[test]
    fn test_existing_stereotype_and_second_pass_untouched() {
        let harness = Harness::with_registry(registry(
            r#"<bean id="orderService" class="com.acme.OrderService">
                 <property name="limit" value="10"/>
               </bean>"#,
        ));
        let source = "package com.acme;\n\n@Service\nclass OrderService {\n    private int limit;\n}\n";
        let (mut unit, first) = harness.apply_unit(&MakeComponentScannable, source);
        assert!(first.changed);
        let class = unit.class("OrderService").unwrap();
        assert_eq!(class.markers, vec![Marker::bare("Service")]);
        let second = MakeComponentScannable.apply(&mut unit, &harness.ctx()).unwrap();
        assert!(!second.changed);
    }

    #[test]
    fn test_constructor_args_on_sole_constructor() {
        let harness = Harness::with_registry(registry(
            r#"<bean id="jdbcOrderRepository" class="com.acme.JdbcOrderRepository">
                 <constructor-arg name="table" value="orders"/>
                 <constructor-arg index="1" ref="mainDataSource"/>
               </bean>"#,
        ));
        let source = r#"package com.acme;

class JdbcOrderRepository {
    JdbcOrderRepository(String table, DataSource dataSource) {
    }
}
"#;
        let (unit, _) = harness.apply_unit(&MakeComponentScannable, source);
        let class = unit.class("JdbcOrderRepository").unwrap();
        let (_, ctor) = class.constructors().next().unwrap();
        assert_eq!(
            ctor.params[0].markers,
            vec![Marker::with_value("Value", Expr::string("orders"))]
        );
        assert_eq!(
            ctor.params[1].markers,
            vec![Marker::with_value("Qualifier", Expr::string("mainDataSource"))]
        );
        assert_eq!(class.markers, vec![Marker::bare("Component")]);
    }

    #[test]
    fn test_scannable_classes_skip_abstract_and_inner() {
        let harness = Harness::with_registry(registry(
            r#"<bean id="base" class="com.acme.Base"/>
               <bean id="outer" class="com.acme.Outer"/>
               <bean id="nested" class="com.acme.Outer$Nested"/>
               <bean id="inner" class="com.acme.Outer$Inner"/>"#,
        ));
        let source = r#"package com.acme;

abstract class Base {
}

class Outer {
    static class Nested {
    }

    class Inner {
    }
}

interface Port {
}
"#;
        let unit = crate::parse::parse_java(source, "Outer.java").unwrap();
        assert_eq!(
            scannable_classes(&unit, &harness.ctx()),
            vec!["com.acme.Outer".to_string(), "com.acme.Outer$Nested".to_string()]
        );
        assert!(keeps_factory_method(&unit, "Base", &harness.ctx()));
        assert!(keeps_factory_method(&unit, "Outer.Inner", &harness.ctx()));
        assert!(!keeps_factory_method(&unit, "Port", &harness.ctx()));
    }

    #[test]
    fn test_unrelated_and_ambiguous_classes_ignored() {
        let harness = Harness::with_registry(registry(
            r#"<bean id="a" class="com.acme.Twice"/>
               <bean id="b" class="com.acme.Twice"/>"#,
        ));
        let source = "package com.acme;\n\nclass Twice {\n}\n\nclass Other {\n}\n";
        let (_, outcome) = harness.apply_unit(&MakeComponentScannable, source);
        assert!(!outcome.changed);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::ScanDeclined);
        assert_eq!(outcome.diagnostics[0].location, "Twice");
    }

    fn declined(beans: &str, source: &str) -> Vec<String> {
        let harness = Harness::with_registry(registry(beans));
        let before = crate::parse::parse_java(source, "Test.java").unwrap();
        let (unit, outcome) = harness.apply_unit(&MakeComponentScannable, source);
        assert!(!outcome.changed);
        assert_eq!(unit, before);
        assert!(scannable_classes(&unit, &harness.ctx()).is_empty());
        outcome
            .diagnostics
            .iter()
            .inspect(|d| assert_eq!(d.kind, DiagnosticKind::ScanDeclined))
            .map(|d| d.message.clone())
            .collect()
    }

    #[test]
    fn test_bean_attributes_without_component_form_decline() {
        let source = "package com.acme;\n\npublic class Cart {\n}\n";
        let messages = declined(
            r#"<bean id="cart" class="com.acme.Cart" scope="prototype" factory-method="create" init-method="open" lazy-init="true"/>"#,
            source,
        );
        assert_eq!(messages, vec![r#"attribute scope="prototype" has no component equivalent"#]);

        let messages = declined(r#"<bean id="cart" class="com.acme.Cart" abstract="true"/>"#, source);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_default_attribute_values_still_scan() {
        let harness = Harness::with_registry(registry(
            r#"<bean id="cart" class="com.acme.Cart" scope="singleton" lazy-init="default"/>"#,
        ));
        let (unit, outcome) = harness.apply_unit(&MakeComponentScannable, "package com.acme;\n\nclass Cart {\n}\n");
        assert!(outcome.changed);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(unit.class("Cart").unwrap().markers, vec![Marker::bare("Component")]);
    }

    #[test]
    fn test_setter_writing_another_field_declines() {
        let messages = declined(
            r#"<bean id="client" class="com.acme.Client">
                 <property name="timeout" value="30"/>
               </bean>"#,
            r#"package com.acme;

class Client {
    private long millis;

    void setTimeout(int seconds) {
        this.millis = seconds * 1000L;
    }
}
"#,
        );
        assert_eq!(messages, vec!["no instance field for property 'timeout'"]);

        let messages = declined(
            r#"<bean id="client" class="com.acme.Client">
                 <property name="timeout" value="30"/>
               </bean>"#,
            r#"package com.acme;

class Client {
    private int timeout;

    void setTimeout(int seconds) {
        this.timeout = seconds * 1000;
    }
}
"#,
        );
        assert_eq!(messages, vec!["setTimeout does more than assign 'timeout'"]);
    }

    #[test]
    fn test_unsupported_values_and_aliases_decline() {
        let source = "package com.acme;\n\nclass Pool {\n    private List<String> hosts;\n}\n";
        let messages = declined(
            r#"<bean id="pool" class="com.acme.Pool">
                 <property name="hosts"><list><value>a</value></list></property>
               </bean>"#,
            source,
        );
        assert_eq!(messages, vec!["'list' values cannot be restated"]);

        let messages = declined(r#"<bean id="pool" name="mainPool" class="com.acme.Pool"/>"#, source);
        assert_eq!(messages, vec!["bean 'pool' has aliases"]);
    }

    #[test]
    fn test_constructor_args_without_sole_constructor_decline() {
        let messages = declined(
            r#"<bean id="repo" class="com.acme.Repo">
                 <constructor-arg value="orders"/>
               </bean>"#,
            r#"package com.acme;

class Repo {
    Repo() {
    }

    Repo(String table) {
    }
}
"#,
        );
        assert_eq!(messages, vec!["constructor-args need exactly one constructor, found 2"]);
    }

    #[test]
    fn test_constructor_set_field_declines_unless_already_wired() {
        let beans = r#"<bean id="job" class="com.acme.Job">
                 <property name="limit" value="5"/>
               </bean>"#;
        let messages = declined(
            beans,
            "package com.acme;\n\nclass Job {\n    private int limit;\n\n    Job() {\n        this.limit = 3;\n    }\n}\n",
        );
        assert_eq!(messages, vec!["a constructor sets field 'limit'"]);

        // A consolidated constructor already carries the wiring
        let harness = Harness::with_registry(registry(beans));
        let source = r#"package com.acme;

@Component
class Job {
    private final int limit;

    Job(@Value("5") int limit) {
        this.limit = limit;
    }
}
"#;
        let (_, outcome) = harness.apply_unit(&MakeComponentScannable, source);
        assert_eq!(outcome, RuleOutcome::unchanged());
        let unit = crate::parse::parse_java(source, "Job.java").unwrap();
        assert_eq!(scannable_classes(&unit, &harness.ctx()), vec!["com.acme.Job".to_string()]);
    }
}
