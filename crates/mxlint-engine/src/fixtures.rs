//! Rule fixtures: `<stem>_test.yaml` files beside each rule that declare
//! inputs and the expected `allow` outcome.
//!
//! Fixtures run straight through the rule's backend. The result cache and
//! noqa directives play no part.

use std::path::{Path, PathBuf};

use mxlint_backends::{BackendRegistry, Sandbox};
use mxlint_types::{LintError, Result, Rule};
use serde::Deserialize;

use crate::rules::{discover_rules, ensure_unique_rule_numbers, FIXTURE_SUFFIX};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FixtureFile {
    #[serde(default)]
    test_cases: Vec<FixtureCase>,
}

#[derive(Debug, Deserialize)]
struct FixtureCase {
    #[serde(default = "unnamed")]
    name: String,
    #[serde(default)]
    input: serde_json::Value,
    allow: bool,
}

fn unnamed() -> String {
    "unnamed test".to_string()
}

/// One fixture case whose outcome differed from the declared one.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureFailure {
    pub rule: PathBuf,
    pub case: String,
    pub expected: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureSummary {
    pub passed: usize,
    pub failed: Vec<FixtureFailure>,
    /// Rules without a fixture file.
    pub missing: Vec<PathBuf>,
}

impl FixtureSummary {
    pub fn ensure_passed(&self) -> Result<()> {
        match self.failed.len() {
            0 => Ok(()),
            n => Err(LintError::FixtureFailures(n)),
        }
    }
}

/// Path of the fixture file for a rule: same directory, `<stem>_test.yaml`.
pub fn fixture_path(rule_path: &Path) -> PathBuf {
    let stem = rule_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    rule_path.with_file_name(format!("{stem}{FIXTURE_SUFFIX}.yaml"))
}

/// Discover every rule under `rules_root` and run its fixtures.
pub fn run_fixtures(rules_root: &Path, registry: &BackendRegistry) -> Result<FixtureSummary> {
    let rules = discover_rules(rules_root, registry)?;
    ensure_unique_rule_numbers(&rules)?;

    let mut summary = FixtureSummary::default();
    for rule in &rules {
        run_rule_fixtures(rule, registry, &mut summary)?;
    }
    tracing::info!(
        passed = summary.passed,
        failed = summary.failed.len(),
        missing = summary.missing.len(),
        "Rule fixtures finished"
    );
    Ok(summary)
}

fn run_rule_fixtures(
    rule: &Rule,
    registry: &BackendRegistry,
    summary: &mut FixtureSummary,
) -> Result<()> {
    let path = fixture_path(&rule.path);
    tracing::info!(rule = %rule.path.display(), ">>");

    let content = match std::fs::read(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(rule = %rule.path.display(), fixture = %path.display(), "No fixture file");
            summary.missing.push(rule.path.clone());
            return Ok(());
        }
        Err(source) => return Err(LintError::ReadFile { path, source }),
    };
    let file: FixtureFile = serde_yaml::from_slice(&content).map_err(|e| LintError::Yaml {
        path: path.clone(),
        message: e.to_string(),
    })?;

    let root = rule.path.parent().unwrap_or_else(|| Path::new("."));
    let sandbox = Sandbox::new(root)?;

    for case in file.test_cases {
        let verdict = registry.evaluate(rule, &case.input, &sandbox)?;
        if verdict.allow == case.allow {
            tracing::info!(case = %case.name, "PASS");
            summary.passed += 1;
        } else {
            tracing::warn!(
                case = %case.name,
                expected = case.allow,
                got = verdict.allow,
                errors = ?verdict.errors,
                "FAIL"
            );
            summary.failed.push(FixtureFailure {
                rule: rule.path.clone(),
                case: case.name,
                expected: case.allow,
                errors: verdict.errors,
            });
        }
    }
    Ok(())
}
