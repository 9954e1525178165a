//! Rego policy backend.
//!
//! Metadata lives in the leading `# key: value` comment block of the policy;
//! evaluation queries `data.<package>` and reads `allow` and `errors` from the
//! resulting object.

use std::path::Path;

use mxlint_types::{Language, LintError, Result, Rule, Verdict};

use crate::backend::{verdict_from_value, Backend};
use crate::sandbox::Sandbox;
use crate::sprintf::sprintf_extension;

#[derive(Debug, Clone, Copy, Default)]
pub struct RegoBackend;

impl Backend for RegoBackend {
    fn language(&self) -> Language {
        Language::Rego
    }

    fn parse_metadata(&self, path: &Path) -> Result<Rule> {
        tracing::debug!(rule = %path.display(), "Reading rego rule metadata");
        let source = read_rule(path)?;
        Ok(parse_rego_metadata(path, &source))
    }

    fn evaluate(
        &self,
        rule: &Rule,
        document: &serde_json::Value,
        _sandbox: &Sandbox,
    ) -> Result<Verdict> {
        let source = read_rule(&rule.path)?;
        let policy_err = |message: String| LintError::Policy {
            rule: rule.path.clone(),
            message,
        };

        let mut engine = regorus::Engine::new();
        engine
            .add_extension("sprintf".to_string(), 2, Box::new(sprintf_extension))
            .map_err(|e| policy_err(e.to_string()))?;
        engine
            .add_policy(rule.path.display().to_string(), source)
            .map_err(|e| policy_err(e.to_string()))?;

        let input = regorus::Value::from_json_str(&serde_json::to_string(document)?)
            .map_err(|e| policy_err(e.to_string()))?;
        engine.set_input(input);

        let query = format!("data.{}", rule.package_name);
        let results = engine
            .eval_query(query.clone(), false)
            .map_err(|e| policy_err(e.to_string()))?;

        let value = results
            .result
            .first()
            .and_then(|r| r.expressions.first())
            .map(|expr| &expr.value)
            .ok_or_else(|| policy_err(format!("query {query} produced no result")))?;
        let json = value.to_json_str().map_err(|e| policy_err(e.to_string()))?;
        let mut object: serde_json::Value = serde_json::from_str(&json)?;

        // A policy whose errors set is empty leaves `errors` undefined.
        if let Some(map) = object.as_object_mut() {
            map.entry("errors")
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        }
        tracing::debug!(rule = %rule.path.display(), result = %object, "Rego result");
        verdict_from_value(&rule.path, &object)
    }
}

fn read_rule(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| LintError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Extract the rule descriptor from a Rego source.
///
/// Only lines starting with `# ` are read. Each is split on its first `:`,
/// and both halves are trimmed of whitespace and double quotes. The package
/// name comes from the first `package` declaration.
pub fn parse_rego_metadata(path: &Path, source: &str) -> Rule {
    let mut rule = Rule::new(path, Language::Rego);

    for line in source.lines() {
        if rule.package_name.is_empty() {
            if let Some(name) = line.strip_prefix("package ") {
                rule.package_name = name.trim().to_string();
            }
        }

        let Some(comment) = line.strip_prefix("# ") else {
            continue;
        };
        let Some((key, value)) = comment.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches('"');
        let value = value.trim().trim_matches('"').to_string();

        match key {
            "input" => rule.pattern = value,
            "skip" => rule.skip_reason = value,
            "title" => rule.title = value,
            "description" => rule.description = value,
            "category" => rule.category = value,
            "rulename" => rule.rule_name = value,
            "severity" => rule.severity = value,
            "rulenumber" => rule.rule_number = value,
            "remediation" => rule.remediation = value,
            _ => {}
        }
    }

    rule
}
