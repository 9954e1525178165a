//! Rule discovery and the duplicate rule-number pre-flight.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mxlint_backends::BackendRegistry;
use mxlint_types::{Language, LintError, Result, Rule};
use walkdir::WalkDir;

/// Stem suffix of fixture files that live beside the rules.
pub const FIXTURE_SUFFIX: &str = "_test";

/// Whether a path is a rule file: a known language extension and not a
/// `_test` fixture.
pub fn is_rule_file(path: &Path) -> bool {
    if Language::from_path(path).is_none() {
        return false;
    }
    !path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem.ends_with(FIXTURE_SUFFIX))
}

/// Find and parse every rule under `rules_root`, in lexical order.
pub fn discover_rules(rules_root: &Path, registry: &BackendRegistry) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for entry in WalkDir::new(rules_root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            LintError::Other(format!("walking {}: {e}", rules_root.display()))
        })?;
        if !entry.file_type().is_file() || !is_rule_file(entry.path()) {
            continue;
        }
        let rule = registry.parse_metadata(entry.path())?;
        tracing::debug!(
            rule = %rule.path.display(),
            number = %rule.rule_number,
            language = %rule.language,
            "Discovered rule"
        );
        rules.push(rule);
    }
    Ok(rules)
}

/// Reject a rule set in which two rules share a non-empty rule number.
pub fn ensure_unique_rule_numbers(rules: &[Rule]) -> Result<()> {
    let mut by_number: BTreeMap<&str, Vec<PathBuf>> = BTreeMap::new();
    for rule in rules.iter().filter(|r| !r.rule_number.is_empty()) {
        by_number
            .entry(rule.rule_number.as_str())
            .or_default()
            .push(rule.path.clone());
    }

    let mut first = None;
    for (number, paths) in by_number.into_iter().filter(|(_, p)| p.len() > 1) {
        tracing::error!(
            rule_number = %number,
            paths = ?paths,
            "Duplicate rule number"
        );
        first.get_or_insert((number.to_string(), paths));
    }

    match first {
        Some((rule_number, paths)) => Err(LintError::DuplicateRuleNumbers { rule_number, paths }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxlint_backends::default_registry;

    const REGO: &str = "# title: T\n# rulenumber: 001_0001\n# input: .*\\.yaml\npackage a\n";
    const JS: &str = r#"const metadata = { title: "J", custom: { rulenumber: "001_0002" } };
function rule(i) { return { allow: true, errors: [] }; }"#;

    fn rules_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("001_0001_a.rego"), REGO).unwrap();
        std::fs::write(dir.path().join("001_0001_a_test.yaml"), "TestCases: []").unwrap();
        std::fs::write(dir.path().join("nested/001_0002_b.js"), JS).unwrap();
        std::fs::write(dir.path().join("nested/001_0002_b_test.js"), "broken(").unwrap();
        std::fs::write(dir.path().join("README.md"), "# rules").unwrap();
        dir
    }

    #[test]
    fn is_rule_file_filters_fixtures() {
        assert!(is_rule_file(Path::new("a.rego")));
        assert!(is_rule_file(Path::new("x/a.ts")));
        assert!(!is_rule_file(Path::new("a_test.rego")));
        assert!(!is_rule_file(Path::new("a_test.yaml")));
        assert!(!is_rule_file(Path::new("a.yaml")));
    }

    #[test]
    fn discovers_rules_in_lexical_order() {
        let dir = rules_dir();
        let rules = discover_rules(dir.path(), &default_registry()).unwrap();
        let numbers: Vec<_> = rules.iter().map(|r| r.rule_number.as_str()).collect();
        assert_eq!(numbers, vec!["001_0001", "001_0002"]);
        assert_eq!(rules[0].language, Language::Rego);
        assert_eq!(rules[1].language, Language::JavaScript);
    }

    #[test]
    fn duplicate_numbers_are_rejected() {
        let rules = vec![
            Rule::new("a.rego", Language::Rego).with_rule_number("001_0001"),
            Rule::new("b.js", Language::JavaScript).with_rule_number("001_0001"),
            Rule::new("c.js", Language::JavaScript).with_rule_number("001_0002"),
        ];
        match ensure_unique_rule_numbers(&rules) {
            Err(LintError::DuplicateRuleNumbers { rule_number, paths }) => {
                assert_eq!(rule_number, "001_0001");
                assert_eq!(paths, vec![PathBuf::from("a.rego"), PathBuf::from("b.js")]);
            }
            other => panic!("expected DuplicateRuleNumbers, got {other:?}"),
        }
    }

    #[test]
    fn empty_numbers_are_not_duplicates() {
        let rules = vec![
            Rule::new("a.rego", Language::Rego),
            Rule::new("b.js", Language::JavaScript),
        ];
        assert!(ensure_unique_rule_numbers(&rules).is_ok());
    }
}
