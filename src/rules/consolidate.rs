//! Field-to-constructor consolidation
//!
//! Injected fields become constructor parameters. For each class with
//! injection-marked fields, either the single existing constructor is
//! extended or a new one is synthesized, one parameter per field in
//! declaration order. Setters that only assign such a field are removed
//! when nothing in the unit calls them.
//!
//! A class is left alone when code outside the class relies on its current
//! constructors: subclasses, `new` expressions, or a bean definition that
//! stays a factory method. Optional injection only moves into the
//! constructor when nullability markers are written.

use super::component_scan::keeps_factory_method;
use super::{capitalize, RewriteRule, RuleContext, RuleOutcome};
use crate::ast::*;
use crate::diagnostics::DiagnosticKind;
use crate::error::Result;
use crate::imports::ImportSet;
use crate::markers::CapabilityKind;
use tracing::debug;

/// Moves field injection into a constructor
pub struct ConsolidateInjection;

#[derive(Debug)]
struct Candidate {
    name: String,
    ty: TypeRef,
    /// Markers that travel to the constructor parameter
    carried: Vec<Marker>,
    optional: bool,
    setter: SetterState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetterState {
    None,
    /// Trivial setter at this member index with no callers
    Removable(usize),
    /// Setter that is still called; field stays mutable and visible
    Called,
}

#[derive(Debug)]
enum Target {
    Synthesize,
    Extend,
}

#[derive(Debug)]
struct Plan {
    candidates: Vec<Candidate>,
    target: Target,
}

impl RewriteRule for ConsolidateInjection {
    fn name(&self) -> &'static str {
        "consolidate-injection"
    }

    fn apply(&self, unit: &mut ProgramUnit, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        let mut outcome = RuleOutcome::unchanged();
        let names = unit.names();
        let imports = unit.imports.clone();
        let package = unit.package.clone();
        let mut removed: Vec<Marker> = Vec::new();

        for path in unit.class_paths() {
            let Some(class) = unit.class(&path) else {
                continue;
            };
            let plan = match plan_class(unit, &path, class, &names, &imports, ctx) {
                Ok(Some(plan)) => plan,
                Ok(None) => continue,
                Err(reason) => {
                    debug!(unit = %unit.path, class = %path, %reason, "consolidation conflict");
                    outcome.report(DiagnosticKind::ConsolidationConflict, unit, &path, reason);
                    continue;
                }
            };

            let nullable = nullability_markers(unit, &path, &plan, ctx, &mut outcome);
            let Some(class) = unit.class_mut(&path) else {
                continue;
            };
            removed.extend(apply_plan(class, plan, &names, package.as_deref(), &imports, ctx, &nullable));
            debug!(unit = %unit.path, class = %path, "consolidated injected fields");
            outcome.mark_changed();
        }

        if outcome.changed {
            ctx.release_markers(unit, &removed);
        }
        Ok(outcome)
    }
}

/// Names of the nullability markers to write (optional, required)
#[derive(Debug, Default)]
struct NullabilityNames {
    nullable: Option<String>,
    non_null: Option<String>,
}

fn nullability_markers(
    unit: &mut ProgramUnit,
    path: &str,
    plan: &Plan,
    ctx: &RuleContext<'_>,
    outcome: &mut RuleOutcome,
) -> NullabilityNames {
    let config = ctx.nullability;
    let mut names = NullabilityNames::default();
    if !config.enabled {
        return names;
    }
    if plan.candidates.iter().any(|c| c.optional) {
        names.nullable = Some(ctx.import_marker(unit, &config.namespace, &config.nullable, path, outcome));
    }
    if config.annotate_required && plan.candidates.iter().any(|c| !c.optional) {
        names.non_null = Some(ctx.import_marker(unit, &config.namespace, &config.non_null, path, outcome));
    }
    names
}

fn plan_class(
    unit: &ProgramUnit,
    path: &str,
    class: &ClassDecl,
    names: &UnitNames,
    imports: &ImportSet,
    ctx: &RuleContext<'_>,
) -> std::result::Result<Option<Plan>, String> {
    if class.kind != TypeKind::Class {
        return Ok(None);
    }

    let mut candidates = Vec::new();
    for field in class.fields() {
        if field.modifiers.is_static() {
            continue;
        }
        let injects: Vec<&Marker> = field
            .markers
            .iter()
            .filter(|m| ctx.has(imports, m, CapabilityKind::InjectsDependency))
            .collect();
        if injects.is_empty() {
            continue;
        }
        let optional = injects.iter().any(|m| ctx.catalog.is_optional_injection(m));
        if optional && !ctx.nullability.enabled {
            // A plain constructor parameter would make the dependency required
            debug!(class = %class.name, field = %field.name, "optional injection stays on the field");
            continue;
        }
        let carried = field
            .markers
            .iter()
            .filter(|m| ctx.has(imports, m, CapabilityKind::CarriedToParameter))
            .cloned()
            .collect();
        let setter = match find_setter(class, field, imports, ctx) {
            Some(index) if names.call_count(&setter_name(&field.name)) == 0 => SetterState::Removable(index),
            Some(_) => SetterState::Called,
            None => SetterState::None,
        };
        candidates.push(Candidate {
            name: field.name.clone(),
            ty: field.ty.clone(),
            carried,
            optional,
            setter,
        });
    }
    if candidates.is_empty() {
        return Ok(None);
    }
    check_constructor_users(unit, path, class, names, ctx)?;

    let constructors: Vec<&MethodDecl> = class.constructors().map(|(_, c)| c).collect();
    let target = match constructors.as_slice() {
        [] => Target::Synthesize,
        [only] => {
            check_extensible(only, &candidates)?;
            Target::Extend
        }
        many => {
            return Err(format!(
                "{} constructors declared; cannot choose one to receive {} injected field(s)",
                many.len(),
                candidates.len()
            ))
        }
    };
    Ok(Some(Plan { candidates, target }))
}

/// Changing the constructors of a class breaks code that calls them
fn check_constructor_users(
    unit: &ProgramUnit,
    path: &str,
    class: &ClassDecl,
    names: &UnitNames,
    ctx: &RuleContext<'_>,
) -> std::result::Result<(), String> {
    if class.modifiers.has("abstract") {
        return Err("abstract class; subclass constructors call its constructor".into());
    }
    let elsewhere = |check: fn(&AccessIndex, &str) -> bool| ctx.accesses.is_some_and(|a| check(a, &class.name));
    if names.extended.contains(&class.name) || elsewhere(AccessIndex::is_extended) {
        return Err(format!("subclasses of {} call its constructor", class.name));
    }
    if names.instantiated.contains(&class.name) || elsewhere(AccessIndex::instantiates) {
        return Err(format!("'new {}' expressions call its constructor", class.name));
    }
    if keeps_factory_method(unit, path, ctx) {
        return Err("its bean definition stays a factory method calling the current constructor".into());
    }
    Ok(())
}

/// An existing constructor may only be extended when it does not delegate
/// and does not already use any of the names it would receive.
fn check_extensible(ctor: &MethodDecl, candidates: &[Candidate]) -> std::result::Result<(), String> {
    let Some(body) = &ctor.body else {
        return Err("constructor has no body".into());
    };
    if let Some(Stmt::Expr(Expr::Call { target: None, name, .. })) = body.stmts.first() {
        if name == "this" {
            return Err("constructor delegates to another constructor".into());
        }
    }
    let mut used = UnitNames::default();
    used.collect_method(ctor);
    for c in candidates {
        if ctor.params.iter().any(|p| p.name == c.name)
            || used.values.contains(&c.name)
            || used.assigned.contains(&c.name)
        {
            return Err(format!("constructor already refers to '{}'", c.name));
        }
    }
    Ok(())
}

fn setter_name(field: &str) -> String {
    format!("set{}", capitalize(field))
}

/// Member index of a setter whose whole body assigns its parameter to `field`
fn find_setter(class: &ClassDecl, field: &FieldDecl, imports: &ImportSet, ctx: &RuleContext<'_>) -> Option<usize> {
    let wanted = setter_name(&field.name);
    class.methods().find_map(|(index, m)| {
        if m.name != wanted || m.modifiers.is_static() || m.params.len() != 1 || m.type_params.is_some() {
            return None;
        }
        if m.return_type.as_ref().map(|t| t.0.as_str()) != Some("void") {
            return None;
        }
        if m.markers
            .iter()
            .any(|mk| !ctx.has(imports, mk, CapabilityKind::InjectsDependency))
        {
            return None;
        }
        let param = &m.params[0].name;
        let [Stmt::Expr(Expr::Assign { target, op, value })] = m.body.as_ref()?.stmts.as_slice() else {
            return None;
        };
        let assigns_field = match target.as_ref() {
            Expr::FieldAccess { target, name } => matches!(**target, Expr::This) && name == &field.name,
            Expr::Name(name) => name == &field.name && param != &field.name,
            _ => false,
        };
        let from_param = matches!(value.as_ref(), Expr::Name(v) if v == param);
        (op == "=" && assigns_field && from_param).then_some(index)
    })
}

/// Edit the class; returns the markers taken off fields
fn apply_plan(
    class: &mut ClassDecl,
    plan: Plan,
    unit_names: &UnitNames,
    package: Option<&str>,
    imports: &ImportSet,
    ctx: &RuleContext<'_>,
    nullability: &NullabilityNames,
) -> Vec<Marker> {
    let mut removed = Vec::new();

    let mut setters: Vec<usize> = plan
        .candidates
        .iter()
        .filter_map(|c| match c.setter {
            SetterState::Removable(index) => Some(index),
            _ => None,
        })
        .collect();
    setters.sort_unstable();
    for index in setters.iter().rev() {
        class.members.remove(*index);
    }

    // Assignments left once the constructor takes over
    let remaining = {
        let mut names = UnitNames::default();
        names.collect_class(class);
        names
    };

    let mut params = Vec::new();
    let mut assignments = Vec::new();
    for candidate in &plan.candidates {
        let marker_name = if candidate.optional {
            nullability.nullable.as_ref()
        } else {
            nullability.non_null.as_ref()
        };

        if let Some(field) = class.field_mut(&candidate.name) {
            let (taken, kept): (Vec<Marker>, Vec<Marker>) = field.markers.drain(..).partition(|m| {
                ctx.has(imports, m, CapabilityKind::InjectsDependency)
                    || ctx.has(imports, m, CapabilityKind::CarriedToParameter)
            });
            field.markers = kept;
            removed.extend(taken);
            if let Some(name) = marker_name {
                field.markers.push(Marker::bare(name.clone()));
            }
            if candidate.setter != SetterState::Called {
                // Package-private fields stay reachable from the rest of the
                // package unless the whole tree is known not to touch them
                let reached = unit_names.qualified_accesses.contains(&candidate.name)
                    || ctx
                        .accesses
                        .is_none_or(|a| a.reaches(package.unwrap_or_default(), &candidate.name));
                if field.modifiers.visibility == Visibility::Package && !reached {
                    field.modifiers.visibility = Visibility::Private;
                }
                if field.init.is_none() && !remaining.assigned.contains(&candidate.name) {
                    field.modifiers.add("final");
                }
            }
        }

        let mut param = Param::new(candidate.ty.clone(), candidate.name.clone());
        param.markers = candidate.carried.clone();
        if let Some(name) = marker_name {
            param.markers.push(Marker::bare(name.clone()));
        }
        params.push(param);
        assignments.push(Stmt::Expr(Expr::assign_this(
            &candidate.name,
            Expr::name(candidate.name.clone()),
        )));
    }

    match plan.target {
        Target::Extend => {
            let ctor = class.members.iter_mut().find_map(|m| match m {
                Member::Constructor(c) => Some(c),
                _ => None,
            });
            if let Some(ctor) = ctor {
                ctor.params.extend(params);
                let body = ctor.body.get_or_insert_with(Block::default);
                let at = match body.stmts.first() {
                    Some(Stmt::Expr(Expr::Call { target: None, name, .. })) if name == "super" => 1,
                    _ => 0,
                };
                body.stmts.splice(at..at, assignments);
            }
        }
        Target::Synthesize => {
            let ctor = MethodDecl {
                doc: None,
                markers: Vec::new(),
                modifiers: Modifiers::public(),
                type_params: None,
                return_type: None,
                name: class.name.clone(),
                params,
                throws: None,
                body: Some(Block { stmts: assignments }),
            };
            let at = class
                .members
                .iter()
                .rposition(|m| matches!(m, Member::Field(_)))
                .map_or(0, |i| i + 1);
            class.members.insert(at, Member::Constructor(ctor));
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::Harness;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_synthesizes_constructor_in_declaration_order() {
        let source = r#"package com.acme;

import org.springframework.beans.factory.annotation.Autowired;

public class OrderService {
    @Autowired
    private OrderRepository repository;

    @Autowired
    private Clock clock;

    public int count() {
        return repository.count();
    }
}
"#;
        let expected = r#"package com.acme;

public class OrderService {
    private final OrderRepository repository;
    private final Clock clock;

    public OrderService(OrderRepository repository, Clock clock) {
        this.repository = repository;
        this.clock = clock;
    }

    public int count() {
        return repository.count();
    }
}
"#;
        let harness = Harness::new();
        let (out, outcome) = harness.apply(&ConsolidateInjection, source);
        assert!(outcome.changed);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(out, expected);
    }

    #[test]
    fn test_optional_field_with_setter_and_nullability() {
        let source = r#"package com.acme;

import org.springframework.beans.factory.annotation.Autowired;

class Checkout {
    @Autowired
    A a;

    @Autowired(required = false)
    B b;

    public void setB(B b) {
        this.b = b;
    }
}
"#;
        let mut harness = Harness::new();
        harness.nullability.enabled = true;
        let (unit, outcome) = harness.apply_unit(&ConsolidateInjection, source);
        assert!(outcome.changed);

        let class = unit.class("Checkout").unwrap();
        assert!(class.methods().next().is_none(), "setter removed");
        let (_, ctor) = class.constructors().next().unwrap();
        let params: Vec<&str> = ctor.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, vec!["a", "b"]);
        assert_eq!(ctor.params[1].markers, vec![Marker::bare("Nullable")]);
        assert!(ctor.params[0].markers.is_empty());

        let a = class.field("a").unwrap();
        let b = class.field("b").unwrap();
        assert_eq!(a.modifiers.visibility, Visibility::Private);
        assert_eq!(b.modifiers.visibility, Visibility::Private);
        assert_eq!(b.markers, vec![Marker::bare("Nullable")]);
        assert!(a.modifiers.has("final"));

        let imports: Vec<String> = unit.imports.iter().map(|i| i.to_string()).collect();
        assert_eq!(imports, vec!["import org.springframework.lang.Nullable;"]);
    }

    #[test]
    fn test_called_setter_is_kept() {
        let source = r#"class Job {
    @Autowired
    Runner runner;

    void setRunner(Runner runner) {
        this.runner = runner;
    }

    void reset() {
        setRunner(null);
    }
}
"#;
        let harness = Harness::new();
        let (unit, outcome) = harness.apply_unit(&ConsolidateInjection, source);
        assert!(outcome.changed);
        let class = unit.class("Job").unwrap();
        assert!(class.methods().any(|(_, m)| m.name == "setRunner"));
        let field = class.field("runner").unwrap();
        assert_eq!(field.modifiers.visibility, Visibility::Package);
        assert!(!field.modifiers.has("final"));
        assert_eq!(class.constructors().count(), 1);
    }

    #[test]
    fn test_two_constructors_conflict_leaves_class_untouched() {
        let source = r#"class Repo {
    @Autowired
    private Db db;

    Repo() {
    }

    Repo(int size) {
    }
}
"#;
        let harness = Harness::new();
        let before = crate::parse::parse_java(source, "Test.java").unwrap();
        let (unit, outcome) = harness.apply_unit(&ConsolidateInjection, source);
        assert!(!outcome.changed);
        assert_eq!(unit, before);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::ConsolidationConflict);
        assert_eq!(outcome.diagnostics[0].location, "Repo");
    }

    #[test]
    fn test_extends_single_constructor_after_super() {
        let source = r#"class Repo extends Base {
    @Autowired
    @Qualifier("main")
    private Db db;

    private final int size;

    Repo(int size) {
        super(size);
        this.size = size;
    }
}
"#;
        let expected = r#"class Repo extends Base {
    private final Db db;
    private final int size;

    Repo(int size, @Qualifier("main") Db db) {
        super(size);
        this.db = db;
        this.size = size;
    }
}
"#;
        let harness = Harness::new();
        let (out, _) = harness.apply(&ConsolidateInjection, source);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_delegating_constructor_conflicts() {
        let source = r#"class Repo {
    @Autowired
    private Db db;

    Repo() {
        this(1);
    }
}
"#;
        let harness = Harness::new();
        let (_, outcome) = harness.apply_unit(&ConsolidateInjection, source);
        assert!(!outcome.changed);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::ConsolidationConflict);
    }

    #[test]
    fn test_value_marker_moves_to_parameter() {
        let source = r#"import org.springframework.beans.factory.annotation.Value;

class Mailer {
    @Value("${mail.host}")
    private String host;
}
"#;
        let harness = Harness::new();
        let (out, _) = harness.apply(&ConsolidateInjection, source);
        assert!(out.contains("import org.springframework.beans.factory.annotation.Value;"));
        assert!(out.contains("public Mailer(@Value(\"${mail.host}\") String host) {"));
        assert!(out.contains("    private final String host;"));
    }

    #[test]
    fn test_static_and_foreign_markers_ignored() {
        let source = r#"import com.acme.Autowired;

class Plain {
    @Autowired
    private Db db;
}
"#;
        let harness = Harness::new();
        let (_, outcome) = harness.apply_unit(&ConsolidateInjection, source);
        assert_eq!(outcome, RuleOutcome::unchanged());
    }

    #[test]
    fn test_second_application_is_noop() {
        let source = r#"class S {
    @Autowired
    private Db db;
}
"#;
        let harness = Harness::new();
        let (mut unit, _) = harness.apply_unit(&ConsolidateInjection, source);
        let again = ConsolidateInjection.apply(&mut unit, &harness.ctx()).unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn test_field_written_in_unmodelled_block_stays_mutable() {
        let source = r#"class Svc {
    @Autowired
    private Repo repo;

    void reset(Repo r) {
        try {
            this.repo = r;
        } catch (RuntimeException e) {
        }
    }
}
"#;
        let harness = Harness::new();
        let (unit, outcome) = harness.apply_unit(&ConsolidateInjection, source);
        assert!(outcome.changed);
        let field = unit.class("Svc").unwrap().field("repo").unwrap();
        assert!(!field.modifiers.has("final"));
        assert!(crate::render::render_java(&unit).unwrap().contains("            this.repo = r;"));
    }

    #[test]
    fn test_field_read_by_another_class_keeps_package_access() {
        let source = r#"class Svc {
    @Autowired
    Repo repo;
}

class Peer {
    Repo peek(Svc s) {
        return s.repo;
    }
}
"#;
        let harness = Harness::new();
        let (unit, _) = harness.apply_unit(&ConsolidateInjection, source);
        let field = unit.class("Svc").unwrap().field("repo").unwrap();
        assert_eq!(field.modifiers.visibility, Visibility::Package);
        assert!(field.modifiers.has("final"));
    }

    #[test]
    fn test_field_reached_from_same_package_keeps_package_access() {
        let peer = crate::parse::parse_java(
            "package com.acme;\n\nclass Peer {\n    Repo peek(Svc s) {\n        return s.repo;\n    }\n}\n",
            "com/acme/Peer.java",
        )
        .unwrap();
        let mut harness = Harness::new();
        harness.accesses = AccessIndex::of_units(&[peer]);
        let source = "package com.acme;\n\nclass Svc {\n    @Autowired\n    Repo repo;\n\n    @Autowired\n    Clock clock;\n}\n";
        let (unit, _) = harness.apply_unit(&ConsolidateInjection, source);
        let svc = unit.class("Svc").unwrap();
        assert_eq!(svc.field("repo").unwrap().modifiers.visibility, Visibility::Package);
        assert_eq!(svc.field("clock").unwrap().modifiers.visibility, Visibility::Private);

        // Without a view of the tree nothing is demoted
        let ctx = RuleContext {
            accesses: None,
            ..harness.ctx()
        };
        let mut unit = crate::parse::parse_java(source, "com/acme/Svc.java").unwrap();
        ConsolidateInjection.apply(&mut unit, &ctx).unwrap();
        let svc = unit.class("Svc").unwrap();
        assert_eq!(svc.field("clock").unwrap().modifiers.visibility, Visibility::Package);
    }

    #[test]
    fn test_optional_field_stays_without_nullability() {
        let source = r#"class Checkout {
    @Autowired
    private Gateway gateway;

    @Autowired(required = false)
    private AuditLog audit;
}
"#;
        let expected = r#"class Checkout {
    private final Gateway gateway;

    @Autowired(required = false)
    private AuditLog audit;

    public Checkout(Gateway gateway) {
        this.gateway = gateway;
    }
}
"#;
        let harness = Harness::new();
        assert!(!harness.nullability.enabled);
        let (out, outcome) = harness.apply(&ConsolidateInjection, source);
        assert!(outcome.changed);
        assert_eq!(out, expected);

        let only_optional = "class Audit {\n    @Autowired(required = false)\n    private AuditLog audit;\n}\n";
        let (_, outcome) = harness.apply_unit(&ConsolidateInjection, only_optional);
        assert_eq!(outcome, RuleOutcome::unchanged());
    }

    #[rstest]
    #[case::abstract_base("abstract class Base {\n    @Autowired\n    Db db;\n}\n\nclass Child extends Base {\n}\n", "Base")]
    #[case::subclassed("class Base {\n    @Autowired\n    Db db;\n}\n\nclass Child extends Base {\n}\n", "Base")]
    #[case::constructed("class Db {\n}\n\nclass Cache {\n    @Autowired\n    Db db;\n\n    static Cache create() {\n        return new Cache();\n    }\n}\n", "Cache")]
    fn test_constructor_users_block_consolidation(#[case] source: &str, #[case] class: &str) {
        let harness = Harness::new();
        let before = crate::parse::parse_java(source, "Test.java").unwrap();
        let (unit, outcome) = harness.apply_unit(&ConsolidateInjection, source);
        assert!(!outcome.changed);
        assert_eq!(unit, before);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::ConsolidationConflict);
        assert_eq!(outcome.diagnostics[0].location, class);
    }

    #[test]
    fn test_class_built_by_factory_method_keeps_constructor() {
        let registry = crate::ingest::ingest(
            &[crate::ingest::ConfigSource::new(
                "beans.xml",
                r#"<beans xmlns="http://www.springframework.org/schema/beans">
  <bean id="cart" class="com.acme.Cart" scope="prototype"/>
</beans>"#,
            )],
            &crate::ingest::XmlConfigParser,
            &crate::ingest::NamespaceOverrides::spring_context(),
        )
        .unwrap();
        let harness = Harness::with_registry(registry);
        let source = "package com.acme;\n\nclass Cart {\n    @Autowired\n    private Pricing pricing;\n}\n";
        let (unit, outcome) = harness.apply_unit(&ConsolidateInjection, source);
        assert!(!outcome.changed);
        assert_eq!(unit.class("Cart").unwrap().constructors().count(), 0);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::ConsolidationConflict);
    }
}
