//! Execution engine for loaded specifications

use crate::config::RunnerConfig;
use crate::dereference::dereference;
use crate::error::{PackspecError, Result};
use crate::feature::{Feature, Test};
use crate::loader::Specification;
use crate::reporter::{Failure, Reporter};
use crate::scope::Scope;
use crate::types::{Mapping, Value};

/// Runs specifications feature by feature, in declaration order
pub struct SpecExecutor {
    config: RunnerConfig,
}

impl SpecExecutor {
    /// Create a new executor
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run every specification; true when all of them passed
    pub fn run_all(
        &self,
        specs: Vec<Specification>,
        reporter: &mut dyn Reporter,
    ) -> Result<bool> {
        reporter.comment(&format!(" #  packspec ({})", self.config.runtime_tag))?;
        let mut success = true;
        for spec in specs {
            reporter.comment("---")?;
            let spec_success = self.run(spec, reporter)?;
            success = success && spec_success;
        }
        Ok(success)
    }

    /// Run one specification; its scope is dropped when it finishes
    pub fn run(&self, spec: Specification, reporter: &mut dyn Reporter) -> Result<bool> {
        let Specification {
            package,
            features,
            mut scope,
            stats,
        } = spec;

        let mut passed = 0;
        for feature in &features {
            if self.execute(feature, &mut scope, reporter)? {
                passed += 1;
            } else if self.config.exit_first {
                tracing::error!("Stopping {} at first failure", package);
                tracing::debug!("Scope: {}", scope.names().collect::<Vec<_>>().join(", "));
                return Err(PackspecError::FeatureFailed(feature.text().to_string()));
            }
        }

        let success = passed == stats.features;
        let reported = passed.saturating_sub(stats.comments + stats.skipped);
        let total = stats.tests - stats.skipped;
        tracing::info!("{}: {}/{} passed", package, reported, total);
        reporter.summary(&package, reported, total)?;
        Ok(success)
    }

    /// Execute one feature against `scope`; true when it passed
    pub fn execute(
        &self,
        feature: &Feature,
        scope: &mut Scope,
        reporter: &mut dyn Reporter,
    ) -> Result<bool> {
        let test = match feature {
            Feature::Comment(comment) => {
                reporter.heading(&comment.text)?;
                return Ok(true);
            }
            Feature::Test(test) => test,
        };
        if test.skip {
            reporter.skipped(&test.text)?;
            return Ok(true);
        }
        tracing::debug!("Executing {}", test.text);

        let args = test
            .args
            .iter()
            .map(|arg| dereference(arg, scope))
            .collect::<Result<Vec<_>>>()?;
        let kwargs = test
            .kwargs
            .iter()
            .map(|(name, value)| Ok((name.clone(), dereference(value, scope)?)))
            .collect::<Result<Mapping>>()?;
        let expected = dereference(&test.result, scope)?;

        let mut exception = None;
        let mut result = expected.clone();
        if let Some(property) = &test.property {
            match invoke(test, property, args, kwargs, scope) {
                Ok(value) => result = value,
                Err(err) if err.is_raised() => {
                    tracing::debug!("{} raised: {}", property, err);
                    exception = Some(err.to_string());
                    result = Value::error();
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(assign) = &test.assign {
            scope.assign(assign, result.clone())?;
        }

        let success = if expected.is_null() {
            !result.is_error()
        } else {
            result == expected
        };
        if success {
            reporter.pass(&test.text)?;
        } else {
            let failure = match exception {
                Some(message) => Failure::Exception(message),
                None => Failure::Mismatch {
                    actual: result.render(),
                    expected: expected.render(),
                },
            };
            reporter.fail(&test.text, &failure)?;
        }
        Ok(success)
    }
}

/// Resolve the property and call, construct or read it
fn invoke(
    test: &Test,
    property: &str,
    mut args: Vec<Value>,
    kwargs: Mapping,
    scope: &Scope,
) -> Result<Value> {
    let target = scope.lookup(property)?;
    if !test.call {
        return match target {
            Value::Function(function) => function.call(&[]),
            other => Ok(other),
        };
    }
    if !kwargs.is_empty() {
        args.push(Value::Object(kwargs));
    }
    match target {
        Value::Class(class) => class.construct(&args),
        Value::Function(function) => function.call(&args),
        other => Err(PackspecError::raise(format!(
            "{} is not callable ({})",
            property,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SpecLoader;
    use crate::reporter::{Event, Recorder};
    use crate::scope::{Package, PackageRegistry};
    use crate::types::{Class, Function, Instance};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Accumulator {
        total: Rc<Cell<i64>>,
    }

    impl Instance for Accumulator {
        fn class_name(&self) -> &str {
            "Accumulator"
        }

        fn member(&self, name: &str) -> Option<Value> {
            let total = self.total.clone();
            match name {
                "add" => Some(Value::Function(Function::new("add", move |args| {
                    for arg in args {
                        let n = arg
                            .as_int()
                            .ok_or_else(|| PackspecError::raise("add expects integers"))?;
                        total.set(total.get() + n);
                    }
                    Ok(Value::Int(total.get()))
                }))),
                "total" => Some(Value::Function(Function::new("total", move |_| {
                    Ok(Value::Int(total.get()))
                }))),
                _ => None,
            }
        }

        fn set_member(&self, name: &str, value: Value) -> Result<()> {
            match (name, value.as_int()) {
                ("total", Some(total)) => {
                    self.total.set(total);
                    Ok(())
                }
                _ => Err(PackspecError::raise(format!("cannot set {}", name))),
            }
        }
    }

    struct Calc;

    impl Package for Calc {
        fn name(&self) -> &str {
            "Calc"
        }

        fn exports(&self) -> Mapping {
            let mut exports = Mapping::new();
            exports.insert(
                "foo".to_string(),
                Function::new("foo", |args| {
                    Ok(Value::Int(args.iter().filter_map(Value::as_int).sum()))
                })
                .into(),
            );
            exports.insert(
                "bad".to_string(),
                Function::new("bad", |_| Err(PackspecError::raise("bad things"))).into(),
            );
            exports.insert(
                "identity".to_string(),
                Function::new("identity", |args| Ok(args.first().cloned().unwrap_or_default()))
                    .into(),
            );
            exports.insert(
                "echo".to_string(),
                Function::new("echo", |args| Ok(Value::Array(args.to_vec()))).into(),
            );
            exports.insert(
                "Accumulator".to_string(),
                Class::new("Accumulator", |args| {
                    let start = args.first().and_then(Value::as_int).unwrap_or_default();
                    Ok(Value::Instance(Rc::new(Accumulator {
                        total: Rc::new(Cell::new(start)),
                    })))
                })
                .with_member("LIMIT", 100i64)
                .with_member("META", Value::Object(Mapping::new()))
                .into(),
            );
            exports.insert("VERSION".to_string(), Value::from("1.0"));
            exports
        }
    }

    fn load(yaml: &str) -> Specification {
        let mut packages = PackageRegistry::new();
        packages.register(Calc);
        SpecLoader::new(&RunnerConfig::default())
            .unwrap()
            .with_packages(packages)
            .load_string(yaml)
            .unwrap()
            .unwrap()
    }

    fn run(yaml: &str) -> (bool, Vec<Event>) {
        let mut recorder = Recorder::new();
        let success = SpecExecutor::new(RunnerConfig::default())
            .run(load(yaml), &mut recorder)
            .unwrap();
        (success, recorder.events)
    }

    fn pass(text: &str) -> Event {
        Event::Pass(text.to_string())
    }

    fn summary(passed: usize, total: usize) -> Event {
        Event::Summary {
            package: "Calc".to_string(),
            passed,
            total,
        }
    }

    #[test]
    fn test_call_returns_expected_value() {
        let (success, events) = run(r#"
- Calc
- "calc = $import": [calc]
- "calc.foo": [1, 2, {"==": 3}]
"#);

        assert!(success);
        assert_eq!(
            events,
            vec![
                Event::Heading("Calc".to_string()),
                pass(r#"calc = $import("calc")"#),
                pass("calc.foo(1, 2) == 3"),
                summary(2, 2),
            ]
        );
    }

    #[test]
    fn test_raised_call_fails_against_expected_value() {
        let (success, events) = run(r#"
- Calc
- "calc = $import": [calc]
- "calc.bad": [{"==": 1}]
"#);

        assert!(!success);
        assert_eq!(
            events[2],
            Event::Fail(
                "calc.bad() == 1".to_string(),
                Failure::Exception("bad things".to_string())
            )
        );
        assert_eq!(events[3], summary(1, 2));
    }

    #[test]
    fn test_raised_call_fails_without_expected_value() {
        let (success, events) = run(r#"
- Calc
- "calc = $import": [calc]
- "calc.bad": []
"#);

        assert!(!success);
        assert!(matches!(&events[2], Event::Fail(text, Failure::Exception(_)) if text == "calc.bad()"));
    }

    #[test]
    fn test_expected_error_passes_when_call_raises() {
        let (success, _) = run(r#"
- Calc
- "calc = $import": [calc]
- "calc.bad": [{"==": ERROR}]
- "calc.foo": ["not a number", {"==": 0}]
"#);

        assert!(success);
    }

    #[test]
    fn test_literal_error_string_is_indistinguishable_from_exception() {
        let (success, events) = run(r#"
- Calc
- "calc = $import": [calc]
- "calc.identity": [ERROR, {"==": ERROR}]
- "calc.identity": [ERROR]
"#);

        assert!(!success);
        assert_eq!(events[2], pass(r#"calc.identity("ERROR") == ERROR"#));
        assert_eq!(
            events[3],
            Event::Fail(
                r#"calc.identity("ERROR")"#.to_string(),
                Failure::Mismatch {
                    actual: r#""ERROR""#.to_string(),
                    expected: "null".to_string(),
                }
            )
        );
    }

    #[test]
    fn test_null_result_passes_regardless_of_value() {
        let (success, _) = run(r#"
- Calc
- "calc = $import": [calc]
- "calc.foo": [5]
- "calc.echo": []
"#);

        assert!(success);
    }

    #[test]
    fn test_mismatch_reports_actual_and_expected() {
        let (success, events) = run(r#"
- Calc
- "calc = $import": [calc]
- "calc.echo": [1, {"==": [2]}]
"#);

        assert!(!success);
        assert_eq!(
            events[2],
            Event::Fail(
                "calc.echo(1) == [2]".to_string(),
                Failure::Mismatch {
                    actual: "[1]".to_string(),
                    expected: "[2]".to_string(),
                }
            )
        );
    }

    #[test]
    fn test_assignment_is_visible_to_later_features() {
        let (success, events) = run(r#"
- Calc
- "calc = $import": [calc]
- "x=": 5
- "calc.echo": [{x: null}, {"==": [5]}]
- "y = calc.foo": [{x: null}, 2]
- "calc.echo": [{y: null}, {"==": [{y: null}]}]
"#);

        assert!(success);
        assert_eq!(events[3], pass("calc.echo(x) == [5]"));
        assert_eq!(events[4], pass("y = calc.foo(x, 2)"));
    }

    #[test]
    fn test_kwargs_are_passed_as_trailing_mapping() {
        let (success, _) = run(r#"
- Calc
- "calc = $import": [calc]
- "calc.echo": [1, {sep=: ","}, {flag=: null}, {"==": [1, {sep: ",", flag: null}]}]
"#);

        assert!(success);
    }

    #[test]
    fn test_kwarg_references_are_resolved() {
        let (success, events) = run(r#"
- Calc
- "calc = $import": [calc]
- "x=": 5
- "calc.echo": [{k=: {x: null}}, {"==": [{k: 5}]}]
"#);

        assert!(success);
        assert_eq!(events[3], pass(r#"calc.echo(k=x) == [{"k":5}]"#));
    }

    #[test]
    fn test_assignment_on_class_and_instance_owners() {
        let (success, _) = run(r#"
- Calc
- "calc = $import": [calc]
- "calc.Accumulator.LIMIT=": 200
- "calc.Accumulator.LIMIT==": 200
- "calc.Accumulator.META.owner=": tests
- "calc.Accumulator.META==": {owner: tests}
- "acc = calc.Accumulator": [1]
- "acc.total=": 50
- "acc.add": [1, {"==": 51}]
"#);

        assert!(success);
    }

    #[test]
    fn test_assignment_through_function_result_is_fatal() {
        let spec = load("- Calc\n- \"calc = $import\": [calc]\n- \"calc.foo.value=\": 1\n");
        let err = SpecExecutor::new(RunnerConfig::default())
            .run(spec, &mut Recorder::new())
            .unwrap_err();

        assert!(matches!(err, PackspecError::Assignment { path, .. } if path == "calc.foo.value"));
    }

    #[test]
    fn test_construct_and_use_instance() {
        let (success, _) = run(r#"
- Calc
- "calc = $import": [calc]
- "acc = calc.Accumulator": [10]
- "acc.add": [1, 2, {"==": 13}]
- "acc.total==": 13
- "calc.Accumulator.LIMIT==": 100
- "calc.VERSION==": "1.0"
- "acc.add": [x, {"==": ERROR}]
- "acc.missing": [{"==": ERROR}]
"#);

        assert!(success);
    }

    #[test]
    fn test_reading_a_function_invokes_it() {
        let (success, events) = run(r#"
- Calc
- "calc = $import": [calc]
- "calc.echo==": []
- "calc.bad==": ERROR
"#);

        assert!(success);
        assert_eq!(events[3], pass("calc.bad == ERROR"));
    }

    #[test]
    fn test_skipped_features_are_excluded_from_total() {
        let (success, events) = run(r#"
- Calc
- "calc = $import": [calc]
- (js) some feature text
- "calc.bad": [{"==": 1}]
- "(rs)calc.foo": [1, {"==": 1}]
"#);

        assert!(success);
        assert_eq!(
            events,
            vec![
                Event::Heading("Calc".to_string()),
                pass(r#"calc = $import("calc")"#),
                Event::Heading("some feature text".to_string()),
                Event::Skipped("calc.bad() == 1".to_string()),
                pass("calc.foo(1) == 1"),
                summary(2, 2),
            ]
        );
    }

    #[test]
    fn test_exit_first_aborts_on_failure() {
        let config = RunnerConfig {
            exit_first: true,
            ..RunnerConfig::default()
        };
        let spec = load(
            r#"
- Calc
- "calc = $import": [calc]
- "calc.foo": [1, {"==": 2}]
- "calc.foo": [1, {"==": 1}]
"#,
        );
        let mut recorder = Recorder::new();
        let err = SpecExecutor::new(config)
            .run(spec, &mut recorder)
            .unwrap_err();

        assert!(matches!(err, PackspecError::FeatureFailed(text) if text == "calc.foo(1) == 2"));
        assert_eq!(recorder.events.len(), 3);
    }

    #[test]
    fn test_failed_import_is_fatal() {
        let spec = load("- Calc\n- \"lib = $import\": [nothing]\n");
        let err = SpecExecutor::new(RunnerConfig::default())
            .run(spec, &mut Recorder::new())
            .unwrap_err();

        assert!(matches!(err, PackspecError::ImportFailed(_)));
    }

    #[test]
    fn test_failed_assignment_is_fatal() {
        let spec = load("- Calc\n- \"missing.value=\": 1\n");
        let err = SpecExecutor::new(RunnerConfig::default())
            .run(spec, &mut Recorder::new())
            .unwrap_err();

        assert!(matches!(err, PackspecError::Assignment { .. }));
    }

    #[test]
    fn test_run_all_ands_specifications() {
        let specs = vec![
            load("- Calc\n- \"x=\": 1\n"),
            load("- Calc\n- \"undefined\": []\n"),
        ];
        let mut recorder = Recorder::new();
        let success = SpecExecutor::new(RunnerConfig::default())
            .run_all(specs, &mut recorder)
            .unwrap();

        assert!(!success);
        assert_eq!(recorder.events[0], Event::Comment(" #  packspec (rs)".to_string()));
        assert_eq!(recorder.events.last(), Some(&summary(0, 1)));
    }
}
