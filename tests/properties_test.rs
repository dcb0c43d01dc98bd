//! Behavioral properties of the rewrite pipeline
//!
//! Idempotence is also checked over generated classes when the `proptest`
//! feature is enabled.

use pretty_assertions::assert_eq;
use remodel::*;
use rstest::rstest;

struct Session {
    registry: Registry,
    catalog: MarkerCatalog,
    reconciler: ImportReconciler,
    nullability: NullabilityConfig,
    accesses: AccessIndex,
}

impl Session {
    fn new() -> Self {
        let catalog = MarkerCatalog::spring();
        let reconciler = catalog.reconciler(ImportLayout::default());
        Self {
            registry: Registry::default(),
            catalog,
            reconciler,
            nullability: NullabilityConfig {
                enabled: true,
                ..NullabilityConfig::default()
            },
            accesses: AccessIndex::default(),
        }
    }

    fn ctx(&self) -> RuleContext<'_> {
        RuleContext {
            registry: &self.registry,
            catalog: &self.catalog,
            reconciler: &self.reconciler,
            nullability: &self.nullability,
            accesses: Some(&self.accesses),
        }
    }

    fn run(&self, source: &str) -> UnitResult {
        let unit = parse_java(source, "Test.java").unwrap();
        Pipeline::default().run(&unit, &self.ctx()).unwrap()
    }
}

fn class<'u>(unit: &'u ProgramUnit, name: &str) -> &'u ClassDecl {
    unit.class(name).unwrap()
}

#[test]
fn test_rename_touches_only_its_own_scope() {
    let source = r#"public class KeyController {
    public String show(@PathVariable("id") String key) {
        return lookup(key);
    }

    public String other(String key) {
        return lookup(key);
    }

    static class Cache {
        String get(String key) {
            return key;
        }
    }
}
"#;
    let expected = r#"public class KeyController {
    public String show(@PathVariable String id) {
        return lookup(id);
    }

    public String other(String key) {
        return lookup(key);
    }

    static class Cache {
        String get(String key) {
            return key;
        }
    }
}
"#;
    let result = Session::new().run(source);
    assert_eq!(render_java(&result.unit).unwrap(), expected);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(6)]
fn test_consolidation_is_complete(#[case] fields: usize) {
    let mut source = String::from("class Service {\n");
    for i in 0..fields {
        source.push_str(&format!("    @Autowired\n    private Dep{i} dep{i};\n\n"));
    }
    source.push_str("    void run() {\n    }\n}\n");

    let result = Session::new().run(&source);
    let service = class(&result.unit, "Service");
    let (_, ctor) = service.constructors().next().unwrap();
    let params: Vec<String> = ctor.params.iter().map(|p| p.name.clone()).collect();
    let expected: Vec<String> = (0..fields).map(|i| format!("dep{i}")).collect();
    assert_eq!(params, expected);
    assert!(service.fields().all(|f| f.markers.is_empty()));
    assert!(service.fields().all(|f| f.modifiers.has("final")));
}

#[rstest]
#[case::two_constructors("Service() {\n    }\n\n    Service(int size) {\n    }")]
#[case::delegating("Service() {\n        this(1);\n    }\n\n    Service(int size) {\n    }")]
fn test_conflicting_constructors_untouched(#[case] constructors: &str) {
    let source = format!("class Service {{\n    @Autowired\n    private Repo repo;\n\n    {}\n}}\n", constructors);
    let session = Session::new();
    let before = parse_java(&source, "Test.java").unwrap();
    let result = session.run(&source);
    assert_eq!(result.unit, before);
    assert_eq!(
        result
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::ConsolidationConflict)
            .count(),
        1
    );
}

#[test]
fn test_example_scenario() {
    let source = r#"class Checkout {
    @Autowired
    PaymentGateway a;

    @Autowired(required = false)
    AuditLog b;

    public void setB(AuditLog b) {
        this.b = b;
    }
}
"#;
    let result = Session::new().run(source);
    let checkout = class(&result.unit, "Checkout");
    let (_, ctor) = checkout.constructors().next().unwrap();
    let params: Vec<&str> = ctor.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["a", "b"]);
    assert_eq!(ctor.params[1].markers, vec![Marker::bare("Nullable")]);
    assert_eq!(checkout.field("b").unwrap().markers, vec![Marker::bare("Nullable")]);
    assert!(checkout.field("a").unwrap().markers.is_empty());
    assert!(checkout.methods().next().is_none());
    for field in checkout.fields() {
        assert_eq!(field.modifiers.visibility, ast::Visibility::Private);
    }
}

#[test]
fn test_static_import_dropped_only_when_unused() {
    let source = r#"import org.springframework.web.bind.annotation.RequestMapping;
import static org.springframework.web.bind.annotation.RequestMethod.GET;
import static org.springframework.web.bind.annotation.RequestMethod.POST;

class Api {
    @RequestMapping(method = GET)
    void list() {
    }

    @RequestMapping(method = POST)
    void save() {
    }

    @RequestMapping(method = {GET, POST})
    void both() {
    }
}
"#;
    let result = Session::new().run(source);
    let imports: Vec<String> = result.unit.imports.iter().map(|i| i.to_string()).collect();
    assert_eq!(
        imports,
        vec![
            "import org.springframework.web.bind.annotation.RequestMapping;",
            "import static org.springframework.web.bind.annotation.RequestMethod.GET;",
            "import static org.springframework.web.bind.annotation.RequestMethod.POST;",
            "import org.springframework.web.bind.annotation.GetMapping;",
            "import org.springframework.web.bind.annotation.PostMapping;",
        ]
    );
}

#[test]
fn test_override_attributes_survive_ingestion() {
    let xml = r#"<beans xmlns="http://www.springframework.org/schema/beans"
       xmlns:context="http://www.springframework.org/schema/context">
  <context:component-scan base-package="com.acme" use-default-filters="false" resource-pattern="**/*.class"/>
</beans>"#;
    let registry = ingest(
        &[ConfigSource::new("beans.xml", xml)],
        &XmlConfigParser,
        &NamespaceOverrides::spring_context(),
    )
    .unwrap();
    let scan = registry.of_kind(&ComponentKind::ComponentScan).next().unwrap();
    let attributes: Vec<(&str, &str)> = scan
        .raw_attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        attributes,
        vec![
            ("base-package", "com.acme"),
            ("use-default-filters", "false"),
            ("resource-pattern", "**/*.class"),
        ]
    );
}

#[cfg(feature = "proptest")]
mod generated {
    use super::*;
    use proptest::prelude::*;

    /// One field: injection marker (none, required, optional), and a setter
    fn field_spec() -> impl Strategy<Value = (u8, bool)> {
        (0u8..3, any::<bool>())
    }

    fn class_source(fields: &[(u8, bool)], constructors: usize) -> String {
        let mut out = String::from("class Generated {\n");
        for (i, (marker, _)) in fields.iter().enumerate() {
            match marker {
                1 => out.push_str("    @Autowired\n"),
                2 => out.push_str("    @Autowired(required = false)\n"),
                _ => {}
            }
            out.push_str(&format!("    private Dep{i} dep{i};\n\n"));
        }
        for c in 0..constructors {
            let params: Vec<String> = (0..c).map(|p| format!("int p{p}")).collect();
            out.push_str(&format!("    Generated({}) {{\n    }}\n\n", params.join(", ")));
        }
        for (i, (_, setter)) in fields.iter().enumerate() {
            if *setter {
                out.push_str(&format!(
                    "    void setDep{i}(Dep{i} dep{i}) {{\n        this.dep{i} = dep{i};\n    }}\n\n"
                ));
            }
        }
        out.push_str("}\n");
        out
    }

    proptest! {
        #[test]
        fn test_pipeline_is_idempotent(
            fields in prop::collection::vec(field_spec(), 0..6),
            constructors in 0usize..3,
        ) {
            let session = Session::new();
            let source = class_source(&fields, constructors);
            let once = session.run(&source);
            let twice = Pipeline::default().run(&once.unit, &session.ctx()).unwrap();
            prop_assert!(!twice.changed);
            prop_assert_eq!(&twice.unit, &once.unit);
        }

        #[test]
        fn test_consolidated_fields_lose_markers(
            fields in prop::collection::vec(field_spec(), 1..6),
        ) {
            let session = Session::new();
            let result = session.run(&class_source(&fields, 0));
            let generated = result.unit.class("Generated").unwrap();
            let injected = fields.iter().filter(|(m, _)| *m > 0).count();
            let ctor_params = generated.constructors().next().map(|(_, c)| c.params.len()).unwrap_or(0);
            prop_assert_eq!(ctor_params, injected);
            prop_assert!(generated.fields().all(|f| !f.markers.iter().any(|m| m.name == "Autowired")));
        }
    }
}
