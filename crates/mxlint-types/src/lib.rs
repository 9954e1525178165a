//! Shared types, errors, and report model for the mxlint rule engine.
//!
//! This crate provides the foundational types used across all other mxlint crates:
//! - `LintError`: unified error taxonomy
//! - `Rule` / `Language`: immutable rule descriptors produced by the metadata parsers
//! - `Verdict`: the `{allow, errors}` pair every backend returns
//! - `Testcase` / `Testsuite` / `LintReport`: evaluation outcomes and their aggregates

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Unified error type for all mxlint subsystems.
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    // === Pre-flight Errors ===
    #[error("Duplicate rule number '{rule_number}' in: {}", join_paths(.paths))]
    DuplicateRuleNumbers {
        rule_number: String,
        paths: Vec<PathBuf>,
    },

    // === File Errors ===
    #[error("Failed to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML document {}: {message}", .path.display())]
    Yaml { path: PathBuf, message: String },

    // === Backend Contract Errors ===
    #[error("rule(...) function not found in rule file: {}", .rule.display())]
    MissingRuleFunction { rule: PathBuf },

    #[error("Rule {} returned an invalid result: {message}", .rule.display())]
    InvalidRuleResult { rule: PathBuf, message: String },

    #[error("Script error in {}: {message}", .rule.display())]
    Script { rule: PathBuf, message: String },

    #[error("Policy error in {}: {message}", .rule.display())]
    Policy { rule: PathBuf, message: String },

    #[error("Failed to transpile typescript rule {}: {message}", .rule.display())]
    Transpile { rule: PathBuf, message: String },

    #[error("Invalid metadata in {}: {message}", .rule.display())]
    InvalidMetadata { rule: PathBuf, message: String },

    #[error("Unsupported rule language for {}", .0.display())]
    UnsupportedLanguage(PathBuf),

    // === Matching Errors ===
    #[error("Invalid input pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    // === Sandbox Errors ===
    #[error("path {path:?} is outside working directory {:?}", .root.display().to_string())]
    OutsideWorkingDirectory { path: String, root: PathBuf },

    // === Outcome Errors ===
    #[error("{0} failures")]
    RuleFailures(usize),

    #[error("{0} rule fixtures failed")]
    FixtureFailures(usize),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl LintError {
    /// Returns `true` if the error means the rule itself is broken rather than
    /// the model violating it.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            LintError::MissingRuleFunction { .. }
                | LintError::InvalidRuleResult { .. }
                | LintError::Script { .. }
                | LintError::Policy { .. }
                | LintError::Transpile { .. }
                | LintError::InvalidMetadata { .. }
        )
    }

    /// Returns `true` if the error aborts a run without producing a report.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LintError::RuleFailures(_) | LintError::FixtureFailures(_)
        )
    }
}

/// A convenience alias for `Result<T, LintError>`.
pub type Result<T> = std::result::Result<T, LintError>;

// ---------------------------------------------------------------------------
// Language: the three supported rule source languages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rego,
    JavaScript,
    TypeScript,
}

impl Language {
    /// Map a rule file to its language by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rego") => Some(Language::Rego),
            Some("js") => Some(Language::JavaScript),
            Some("ts") => Some(Language::TypeScript),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Rego => "rego",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Rule: immutable descriptor, one per rule file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub title: String,
    pub description: String,
    pub category: String,
    pub severity: String,
    /// Identifier addressed by noqa directives. Unique across a rule set.
    pub rule_number: String,
    pub remediation: String,
    pub rule_name: String,
    pub path: PathBuf,
    /// Author-level blanket skip. Empty when the rule is active.
    pub skip_reason: String,
    /// Regular expression matched against document paths relative to the
    /// model-source root. Empty matches nothing.
    pub pattern: String,
    pub package_name: String,
    pub language: Language,
}

impl Rule {
    /// A rule with only its identity filled in; metadata parsers overwrite the rest.
    pub fn new(path: impl Into<PathBuf>, language: Language) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            category: String::new(),
            severity: String::new(),
            rule_number: String::new(),
            remediation: String::new(),
            rule_name: String::new(),
            path: path.into(),
            skip_reason: String::new(),
            pattern: String::new(),
            package_name: String::new(),
            language,
        }
    }

    pub fn with_rule_number(mut self, rule_number: impl Into<String>) -> Self {
        self.rule_number = rule_number.into();
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_package_name(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = package_name.into();
        self
    }

    pub fn with_skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = reason.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Verdict: what a backend returns for one document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub allow: bool,
    pub errors: Vec<String>,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            allow: true,
            errors: Vec::new(),
        }
    }

    pub fn deny(errors: Vec<String>) -> Self {
        Self {
            allow: false,
            errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Testcase: outcome of one (rule, document) evaluation
// ---------------------------------------------------------------------------

/// Classification recorded on every rule failure.
pub const ASSERTION_ERROR: &str = "AssertionError";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skipped {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testcase {
    /// Path of the evaluated document.
    pub name: String,
    /// Seconds spent, including backend start-up.
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<Skipped>,
}

impl Testcase {
    /// Build a testcase from a backend verdict. A denied verdict becomes a
    /// failure whose message is the newline-joined error list.
    pub fn from_verdict(name: impl Into<String>, time: f64, verdict: Verdict) -> Self {
        let failure = (!verdict.allow).then(|| Failure {
            message: verdict.errors.join("\n"),
            kind: ASSERTION_ERROR.to_string(),
            data: String::new(),
        });
        Self {
            name: name.into(),
            time,
            failure,
            skipped: None,
        }
    }

    /// A zero-time skipped testcase.
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time: 0.0,
            failure: None,
            skipped: Some(Skipped {
                message: reason.into(),
            }),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    /// Short status label used in console progress.
    pub fn status(&self) -> &'static str {
        if self.is_skipped() {
            "SKIP"
        } else if self.is_failure() {
            "FAIL"
        } else {
            "PASS"
        }
    }
}

// ---------------------------------------------------------------------------
// Testsuite: all testcases for one rule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testsuite {
    pub name: String,
    pub tests: usize,
    pub failures: usize,
    pub skipped: usize,
    pub time: f64,
    pub testcases: Vec<Testcase>,
}

impl Testsuite {
    /// Aggregate testcases, preserving their order.
    pub fn from_testcases(name: impl Into<String>, testcases: Vec<Testcase>) -> Self {
        Self {
            name: name.into(),
            tests: testcases.len(),
            failures: testcases.iter().filter(|t| t.is_failure()).count(),
            skipped: testcases.iter().filter(|t| t.is_skipped()).count(),
            time: testcases.iter().map(|t| t.time).sum(),
            testcases,
        }
    }
}

// ---------------------------------------------------------------------------
// LintReport: the aggregate result of one run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintReport {
    pub testsuites: Vec<Testsuite>,
    pub rules: Vec<Rule>,
}

impl LintReport {
    pub fn total_testcases(&self) -> usize {
        self.testsuites.iter().map(|ts| ts.testcases.len()).sum()
    }

    pub fn failures(&self) -> usize {
        self.testsuites.iter().map(|ts| ts.failures).sum()
    }

    pub fn skipped(&self) -> usize {
        self.testsuites.iter().map(|ts| ts.skipped).sum()
    }

    /// `Err(RuleFailures)` when any testcase recorded a failure.
    pub fn ensure_passed(&self) -> Result<()> {
        match self.failures() {
            0 => Ok(()),
            n => Err(LintError::RuleFailures(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testcase(name: &str) -> Testcase {
        Testcase::from_verdict(name, 0.5, Verdict::allow())
    }

    // --- LintError display ---

    #[test]
    fn error_display_duplicate_rule_numbers() {
        let err = LintError::DuplicateRuleNumbers {
            rule_number: "001_0001".into(),
            paths: vec!["a.rego".into(), "b.js".into()],
        };
        assert_eq!(
            err.to_string(),
            "Duplicate rule number '001_0001' in: a.rego, b.js"
        );
    }

    #[test]
    fn error_display_missing_rule_function() {
        let err = LintError::MissingRuleFunction {
            rule: "rules/x.js".into(),
        };
        assert_eq!(
            err.to_string(),
            "rule(...) function not found in rule file: rules/x.js"
        );
    }

    #[test]
    fn error_display_outside_working_directory() {
        let err = LintError::OutsideWorkingDirectory {
            path: "../etc/passwd".into(),
            root: "/work".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("outside working directory"));
        assert!(msg.contains("../etc/passwd"));
    }

    #[test]
    fn error_display_rule_failures() {
        assert_eq!(LintError::RuleFailures(3).to_string(), "3 failures");
    }

    // --- classification ---

    #[test]
    fn contract_violations_are_classified() {
        let err = LintError::Transpile {
            rule: "r.ts".into(),
            message: "unexpected token".into(),
        };
        assert!(err.is_contract_violation());
        assert!(err.is_fatal());

        let err = LintError::InvalidRuleResult {
            rule: "r.js".into(),
            message: "allow is not a boolean".into(),
        };
        assert!(err.is_contract_violation());
    }

    #[test]
    fn rule_failures_are_not_fatal() {
        assert!(!LintError::RuleFailures(1).is_fatal());
        assert!(!LintError::RuleFailures(1).is_contract_violation());
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LintError = io_err.into();
        assert!(matches!(err, LintError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    // --- Language ---

    #[test]
    fn language_from_path() {
        assert_eq!(
            Language::from_path(Path::new("rules/a.rego")),
            Some(Language::Rego)
        );
        assert_eq!(
            Language::from_path(Path::new("a.js")),
            Some(Language::JavaScript)
        );
        assert_eq!(
            Language::from_path(Path::new("a.ts")),
            Some(Language::TypeScript)
        );
        assert_eq!(Language::from_path(Path::new("a_test.yaml")), None);
        assert_eq!(Language::from_path(Path::new("README")), None);
    }

    #[test]
    fn language_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Language::TypeScript).unwrap(),
            "\"typescript\""
        );
        let lang: Language = serde_json::from_str("\"rego\"").unwrap();
        assert_eq!(lang, Language::Rego);
    }

    // --- Testcase ---

    #[test]
    fn denied_verdict_joins_errors() {
        let tc = Testcase::from_verdict(
            "doc.yaml",
            0.1,
            Verdict::deny(vec!["first".into(), "second".into()]),
        );
        let failure = tc.failure.as_ref().unwrap();
        assert_eq!(failure.message, "first\nsecond");
        assert_eq!(failure.kind, "AssertionError");
        assert_eq!(tc.status(), "FAIL");
    }

    #[test]
    fn allowed_verdict_has_no_failure() {
        let tc = testcase("doc.yaml");
        assert!(tc.failure.is_none());
        assert!(tc.skipped.is_none());
        assert_eq!(tc.status(), "PASS");
    }

    #[test]
    fn skipped_testcase_has_zero_time() {
        let tc = Testcase::skipped("doc.yaml", "#noqa");
        assert_eq!(tc.time, 0.0);
        assert_eq!(tc.skipped.unwrap().message, "#noqa");
    }

    #[test]
    fn failure_serializes_type_field() {
        let tc = Testcase::from_verdict("d", 0.0, Verdict::deny(vec!["x".into()]));
        let json = serde_json::to_value(&tc).unwrap();
        assert_eq!(json["failure"]["type"], "AssertionError");
        assert!(json.get("skipped").is_none());
    }

    // --- Testsuite / LintReport ---

    #[test]
    fn testsuite_aggregates_counts_in_order() {
        let cases = vec![
            testcase("a"),
            Testcase::from_verdict("b", 0.25, Verdict::deny(vec!["bad".into()])),
            Testcase::skipped("c", "#noqa"),
        ];
        let ts = Testsuite::from_testcases("rule.js", cases);
        assert_eq!(ts.tests, 3);
        assert_eq!(ts.failures, 1);
        assert_eq!(ts.skipped, 1);
        assert!((ts.time - 0.75).abs() < f64::EPSILON);
        let names: Vec<_> = ts.testcases.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn report_counts_total_testcases() {
        let report = LintReport {
            testsuites: vec![
                Testsuite::from_testcases("r1", vec![testcase("a"), testcase("b")]),
                Testsuite::from_testcases("r2", vec![]),
                Testsuite::from_testcases("r3", vec![testcase("c")]),
            ],
            rules: vec![],
        };
        assert_eq!(report.total_testcases(), 3);
        assert_eq!(report.failures(), 0);
        assert!(report.ensure_passed().is_ok());
    }

    #[test]
    fn report_ensure_passed_reports_failure_count() {
        let report = LintReport {
            testsuites: vec![Testsuite::from_testcases(
                "r1",
                vec![
                    Testcase::from_verdict("a", 0.0, Verdict::deny(vec![])),
                    Testcase::from_verdict("b", 0.0, Verdict::deny(vec![])),
                ],
            )],
            rules: vec![],
        };
        match report.ensure_passed() {
            Err(LintError::RuleFailures(n)) => assert_eq!(n, 2),
            other => panic!("expected RuleFailures, got {other:?}"),
        }
    }

    #[test]
    fn rule_builder_sets_fields() {
        let rule = Rule::new("r.js", Language::JavaScript)
            .with_rule_number("001_0001")
            .with_pattern(".*\\.yaml")
            .with_skip_reason("not yet");
        assert_eq!(rule.rule_number, "001_0001");
        assert_eq!(rule.pattern, ".*\\.yaml");
        assert_eq!(rule.skip_reason, "not yet");
        assert_eq!(rule.language, Language::JavaScript);
    }
}
