//! Factory-method visibility normalization

use super::{RewriteRule, RuleContext, RuleOutcome};
use crate::ast::{words, ClassDecl, Member, MethodDecl, ProgramUnit, Visibility};
use crate::error::Result;
use crate::markers::CapabilityKind;
use tracing::debug;

/// Drops `public` from factory methods of configuration-role classes; the
/// container reaches package-private factory methods just as well.
///
/// Methods that override or implement another one keep their access.
pub struct NormalizeFactoryVisibility;

/// A supertype may declare the method as public
fn has_supertypes(class: &ClassDecl) -> bool {
    words(&class.header).any(|w| w == "extends" || w == "implements")
}

fn is_override(method: &MethodDecl) -> bool {
    method
        .markers
        .iter()
        .any(|m| m.name == "Override" || m.name == "java.lang.Override")
}

impl RewriteRule for NormalizeFactoryVisibility {
    fn name(&self) -> &'static str {
        "normalize-factory-visibility"
    }

    fn apply(&self, unit: &mut ProgramUnit, ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
        let mut outcome = RuleOutcome::unchanged();
        let imports = unit.imports.clone();
        let path = unit.path.clone();
        unit.for_each_class_mut(|class_path, class| {
            let configuration = class
                .markers
                .iter()
                .any(|m| ctx.has(&imports, m, CapabilityKind::ConfigurationRole));
            if !configuration || has_supertypes(class) {
                return;
            }
            for member in &mut class.members {
                let Member::Method(method) = member else {
                    continue;
                };
                let factory = method
                    .markers
                    .iter()
                    .any(|m| ctx.has(&imports, m, CapabilityKind::FactoryMethod));
                if factory && method.modifiers.visibility == Visibility::Public && !is_override(method) {
                    method.modifiers.visibility = Visibility::Package;
                    debug!(unit = %path, class = %class_path, method = %method.name, "dropped public from factory method");
                    outcome.mark_changed();
                }
            }
        });
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::Harness;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_public_factory_methods_lose_modifier() {
        let source = r#"@Configuration
public class AppConfig {
    @Bean
    public DataSource dataSource() {
        return new HikariDataSource();
    }

    public String helper() {
        return "x";
    }
}
"#;
        let expected = r#"@Configuration
public class AppConfig {
    @Bean
    DataSource dataSource() {
        return new HikariDataSource();
    }

    public String helper() {
        return "x";
    }
}
"#;
        let harness = Harness::new();
        let (out, outcome) = harness.apply(&NormalizeFactoryVisibility, source);
        assert!(outcome.changed);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_outside_configuration_untouched() {
        let source = r#"@Component
public class Factory {
    @Bean
    public Clock clock() {
        return null;
    }
}
"#;
        let harness = Harness::new();
        let (_, outcome) = harness.apply_unit(&NormalizeFactoryVisibility, source);
        assert!(!outcome.changed);
    }

    #[test]
    fn test_overriding_factory_methods_keep_public() {
        let source = r#"@Configuration
public class AppConfig implements Factories {
    @Override
    @Bean
    public Clock clock() {
        return Clock.systemUTC();
    }

    @Bean
    public Clock backup() {
        return Clock.systemUTC();
    }
}
"#;
        let harness = Harness::new();
        let (out, outcome) = harness.apply(&NormalizeFactoryVisibility, source);
        assert!(!outcome.changed);
        assert_eq!(out, source);

        let source = r#"@Configuration
public class AppConfig {
    @Override
    @Bean
    public Clock clock() {
        return Clock.systemUTC();
    }

    @Bean
    public Clock backup() {
        return Clock.systemUTC();
    }
}
"#;
        let (unit, outcome) = harness.apply_unit(&NormalizeFactoryVisibility, source);
        assert!(outcome.changed);
        let class = unit.class("AppConfig").unwrap();
        let visibility: Vec<(&str, Visibility)> = class
            .methods()
            .map(|(_, m)| (m.name.as_str(), m.modifiers.visibility))
            .collect();
        assert_eq!(
            visibility,
            vec![("clock", Visibility::Public), ("backup", Visibility::Package)]
        );
    }
}
