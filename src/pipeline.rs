//! Fixed-point rule runner
//!
//! Every unit is rewritten on a working copy: the rule list runs in order,
//! again and again, until a whole pass reports no change or the iteration
//! bound is hit. The copy replaces the input only when every rule
//! succeeded, so a failing rule never leaves a half-rewritten unit behind.
//! Units are independent of each other and run in parallel.

use crate::ast::ProgramUnit;
use crate::config::{EngineConfig, FailurePolicy};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{Error, Result};
use crate::rules::{default_rules, RewriteRule, RuleContext};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Result of running the pipeline over one unit
#[derive(Debug, Clone, PartialEq)]
pub struct UnitResult {
    pub unit: ProgramUnit,
    /// Whether any rule edited the unit
    pub changed: bool,
    /// Passes run, including the final quiet one
    pub iterations: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// An ordered rule list with its iteration bound and failure policy
pub struct Pipeline {
    rules: Vec<Box<dyn RewriteRule>>,
    max_iterations: usize,
    failure_policy: FailurePolicy,
}

impl Pipeline {
    pub fn new(rules: Vec<Box<dyn RewriteRule>>) -> Self {
        Self {
            rules,
            max_iterations: 8,
            failure_policy: FailurePolicy::default(),
        }
    }

    /// The built-in rules with the bounds from `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(default_rules())
            .max_iterations(config.max_iterations)
            .failure_policy(config.failure_policy)
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Rewrite one unit. `unit` itself is never modified.
    pub fn run(&self, unit: &ProgramUnit, ctx: &RuleContext<'_>) -> Result<UnitResult> {
        let mut work = unit.clone();
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let mut changed = false;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            let mut pass_changed = false;
            for rule in &self.rules {
                let outcome = rule.apply(&mut work, ctx).map_err(|e| Error::Rule {
                    rule: rule.name().to_string(),
                    unit: unit.path.clone(),
                    message: e.to_string(),
                })?;
                if outcome.changed {
                    debug!(unit = %unit.path, rule = rule.name(), iteration = iterations, "rule changed unit");
                    pass_changed = true;
                }
                // A rule that declines to act reports the same finding on every pass
                for diagnostic in outcome.diagnostics {
                    if !diagnostics.contains(&diagnostic) {
                        diagnostics.push(diagnostic);
                    }
                }
            }
            if !pass_changed {
                converged = true;
                break;
            }
            changed = true;
        }

        if !converged {
            warn!(unit = %unit.path, max = self.max_iterations, "rules did not reach a fixed point");
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::IterationLimit,
                unit.path.clone(),
                "",
                format!(
                    "rules still changing the unit after {} passes; result kept as of the last pass",
                    self.max_iterations
                ),
            ));
        }

        Ok(UnitResult {
            unit: work,
            changed,
            iterations,
            diagnostics,
        })
    }

    /// Rewrite every unit in parallel. Results keep the input order.
    ///
    /// Under [`FailurePolicy::AbortRun`] the first rule error fails the whole
    /// call and no result is returned. Under [`FailurePolicy::SkipUnit`] the
    /// failing unit comes back unchanged with a `UnitSkipped` diagnostic.
    pub fn run_all(&self, units: &[ProgramUnit], ctx: &RuleContext<'_>) -> Result<Vec<UnitResult>> {
        info!(units = units.len(), rules = self.rules.len(), "running rewrite pipeline");
        let results = units
            .par_iter()
            .map(|unit| match self.run(unit, ctx) {
                Ok(result) => Ok(result),
                Err(e) if self.failure_policy == FailurePolicy::SkipUnit => {
                    warn!(unit = %unit.path, error = %e, "skipping unit");
                    Ok(UnitResult {
                        unit: unit.clone(),
                        changed: false,
                        iterations: 0,
                        diagnostics: vec![Diagnostic::new(
                            DiagnosticKind::UnitSkipped,
                            unit.path.clone(),
                            "",
                            e.to_string(),
                        )],
                    })
                }
                Err(e) => Err(e),
            })
            .collect::<Result<Vec<_>>>()?;
        let changed = results.iter().filter(|r| r.changed).count();
        info!(changed, unchanged = results.len() - changed, "pipeline finished");
        Ok(results)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_java;
    use crate::render::render_java;
    use crate::rules::testing::Harness;
    use crate::rules::RuleOutcome;
    use pretty_assertions::assert_eq;

    /// Never settles: flips a metadata entry on every application
    struct Flip;

    impl RewriteRule for Flip {
        fn name(&self) -> &'static str {
            "flip"
        }

        fn apply(&self, unit: &mut ProgramUnit, _ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
            if unit.metadata.remove("flip").is_none() {
                unit.metadata.insert("flip".into(), "on".into());
            }
            let mut outcome = RuleOutcome::unchanged();
            outcome.mark_changed();
            Ok(outcome)
        }
    }

    /// Edits the unit, then fails
    struct Fail;

    impl RewriteRule for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn apply(&self, unit: &mut ProgramUnit, _ctx: &RuleContext<'_>) -> Result<RuleOutcome> {
            unit.types.clear();
            Err(Error::Other("boom".into()))
        }
    }

    fn unit(source: &str) -> ProgramUnit {
        parse_java(source, "Test.java").unwrap()
    }

    #[test]
    fn test_example_scenario_converges() {
        let source = r#"package com.acme;

import org.springframework.beans.factory.annotation.Autowired;

public class OrderService {
    @Autowired
    private Repo a;

    @Autowired(required = false)
    private Clock b;

    public void setB(Clock b) {
        this.b = b;
    }
}
"#;
        let mut harness = Harness::new();
        harness.nullability.enabled = true;
        let pipeline = Pipeline::default();
        let result = pipeline.run(&unit(source), &harness.ctx()).unwrap();
        let expected = r#"package com.acme;

import org.springframework.lang.Nullable;

public class OrderService {
    private final Repo a;

    @Nullable
    private final Clock b;

    public OrderService(Repo a, @Nullable Clock b) {
        this.a = a;
        this.b = b;
    }
}
"#;
        assert!(result.changed);
        assert!(result.diagnostics.is_empty());
        assert_eq!(render_java(&result.unit).unwrap(), expected);

        // Running again on the output changes nothing
        let again = pipeline.run(&result.unit, &harness.ctx()).unwrap();
        assert!(!again.changed);
        assert_eq!(again.iterations, 1);
        assert_eq!(again.unit, result.unit);
    }

    #[test]
    fn test_iteration_limit_reported() {
        let harness = Harness::new();
        let pipeline = Pipeline::new(vec![Box::new(Flip)]).max_iterations(3);
        let result = pipeline.run(&unit("class A {\n}\n"), &harness.ctx()).unwrap();
        assert_eq!(result.iterations, 3);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::IterationLimit);
    }

    #[test]
    fn test_repeated_conflict_reported_once() {
        let source = r#"class A {
    @Autowired
    private Repo repo;

    A() {
    }

    A(int x) {
    }
}
"#;
        let harness = Harness::new();
        let result = Pipeline::default().run(&unit(source), &harness.ctx()).unwrap();
        let conflicts: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::ConsolidationConflict)
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(result.unit, unit(source));
    }

    #[test]
    fn test_abort_run_fails_everything() {
        let harness = Harness::new();
        let pipeline = Pipeline::new(vec![Box::new(Fail)]);
        let units = vec![unit("class A {\n}\n"), unit("class B {\n}\n")];
        let err = pipeline.run_all(&units, &harness.ctx()).unwrap_err();
        assert!(matches!(err, Error::Rule { ref rule, .. } if rule == "fail"));
    }

    #[test]
    fn test_skip_unit_keeps_original() {
        let harness = Harness::new();
        let pipeline = Pipeline::new(vec![Box::new(Fail)]).failure_policy(FailurePolicy::SkipUnit);
        let input = unit("class A {\n}\n");
        let results = pipeline.run_all(std::slice::from_ref(&input), &harness.ctx()).unwrap();
        assert_eq!(results[0].unit, input);
        assert!(!results[0].changed);
        assert_eq!(results[0].diagnostics[0].kind, DiagnosticKind::UnitSkipped);
    }

    #[test]
    fn test_run_all_keeps_order() {
        let harness = Harness::new();
        let units: Vec<ProgramUnit> = (0..16)
            .map(|i| parse_java(&format!("class C{} {{\n}}\n", i), &format!("C{}.java", i)).unwrap())
            .collect();
        let results = Pipeline::default().run_all(&units, &harness.ctx()).unwrap();
        let paths: Vec<&str> = results.iter().map(|r| r.unit.path.as_str()).collect();
        let expected: Vec<String> = (0..16).map(|i| format!("C{}.java", i)).collect();
        assert_eq!(paths, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
