//! Evaluation orchestrator.
//!
//! One blocking task per rule, joined in rule order. Within a task the
//! matched documents are evaluated sequentially: decode, noqa check, cache
//! lookup, backend evaluation, cache write.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use mxlint_backends::{default_registry, BackendRegistry, Sandbox};
use mxlint_types::{LintError, LintReport, Result, Rule, Testcase, Testsuite};
use tokio::sync::mpsc;

use crate::cache::{default_cache_dir, CacheKey, ResultCache};
use crate::document::decode_document;
use crate::fixtures::{run_fixtures, FixtureSummary};
use crate::matcher::expand_paths;
use crate::noqa::{documentation, should_skip_rule};
use crate::report::write_reports;
use crate::rules::{discover_rules, ensure_unique_rule_numbers};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a lint run.
#[derive(Debug, Clone)]
pub struct LintConfig {
    pub rules_root: PathBuf,
    pub model_source: PathBuf,
    pub xunit_report: Option<PathBuf>,
    pub json_report: Option<PathBuf>,
    /// Evaluate documents even when they carry a noqa directive. Results of
    /// such a run are never written to the cache.
    pub ignore_noqa: bool,
    /// Neither read nor write the result cache.
    pub no_cache: bool,
    pub cache_dir: PathBuf,
    /// Print per-rule progress to stdout.
    pub progress: bool,
}

impl LintConfig {
    pub fn new(rules_root: impl Into<PathBuf>, model_source: impl Into<PathBuf>) -> Self {
        Self {
            rules_root: rules_root.into(),
            model_source: model_source.into(),
            xunit_report: None,
            json_report: None,
            ignore_noqa: false,
            no_cache: false,
            cache_dir: default_cache_dir(),
            progress: true,
        }
    }

    pub fn with_xunit_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.xunit_report = Some(path.into());
        self
    }

    pub fn with_json_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_report = Some(path.into());
        self
    }

    pub fn with_ignore_noqa(mut self, ignore_noqa: bool) -> Self {
        self.ignore_noqa = ignore_noqa;
        self
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

// ---------------------------------------------------------------------------
// Linter
// ---------------------------------------------------------------------------

/// Runs a rule set against a model-source tree.
///
/// Cheap to clone; clones share the backend registry, cache and console.
#[derive(Clone)]
pub struct Linter {
    inner: Arc<LinterInner>,
}

struct LinterInner {
    config: LintConfig,
    registry: BackendRegistry,
    cache: ResultCache,
    console: Mutex<()>,
}

impl Linter {
    /// Create a linter with the Rego, JavaScript and TypeScript backends.
    pub fn new(config: LintConfig) -> Self {
        Self::with_registry(config, default_registry())
    }

    pub fn with_registry(config: LintConfig, registry: BackendRegistry) -> Self {
        let cache = ResultCache::new(&config.cache_dir);
        Self {
            inner: Arc::new(LinterInner {
                config,
                registry,
                cache,
                console: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &LintConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.inner.cache
    }

    /// Discover rules under the rules root.
    pub async fn discover(&self) -> Result<Vec<Rule>> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            discover_rules(&inner.config.rules_root, &inner.registry)
        })
        .await
        .map_err(join_error)?
    }

    /// Discover and evaluate every rule, then write the configured reports.
    ///
    /// Rule failures do not make this fail; use
    /// [`LintReport::ensure_passed`] on the result.
    pub async fn run(&self) -> Result<LintReport> {
        let rules = self.discover().await?;
        let report = self.run_rules(rules).await?;

        write_reports(
            &report,
            self.inner.config.xunit_report.as_deref(),
            self.inner.config.json_report.as_deref(),
        )?;
        log_failures(&report);
        Ok(report)
    }

    /// Evaluate an already-parsed rule set.
    ///
    /// Fails before any evaluation when two rules share a rule number. When
    /// rule tasks report errors, exactly one of them is returned.
    pub async fn run_rules(&self, rules: Vec<Rule>) -> Result<LintReport> {
        ensure_unique_rule_numbers(&rules)?;

        let (err_tx, mut err_rx) = mpsc::channel::<LintError>(rules.len().max(1));
        let mut handles = Vec::with_capacity(rules.len());
        for rule in &rules {
            let inner = Arc::clone(&self.inner);
            let rule = rule.clone();
            let err_tx = err_tx.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                match inner.evaluate_rule(&rule) {
                    Ok(suite) => Some(suite),
                    Err(err) => {
                        tracing::debug!(rule = %rule.path.display(), error = %err, "Rule task failed");
                        // The receiver outlives every task.
                        let _ = err_tx.blocking_send(err);
                        None
                    }
                }
            }));
        }
        drop(err_tx);

        let mut slots: Vec<Option<Testsuite>> = Vec::with_capacity(handles.len());
        for handle in handles {
            slots.push(handle.await.map_err(join_error)?);
        }

        if let Ok(err) = err_rx.try_recv() {
            return Err(err);
        }

        Ok(LintReport {
            testsuites: slots.into_iter().flatten().collect(),
            rules,
        })
    }

    /// Run every rule's `_test.yaml` fixtures.
    pub async fn test_rules(&self) -> Result<FixtureSummary> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            run_fixtures(&inner.config.rules_root, &inner.registry)
        })
        .await
        .map_err(join_error)?
    }
}

fn join_error(err: tokio::task::JoinError) -> LintError {
    LintError::Other(format!("rule task failed: {err}"))
}

impl LinterInner {
    fn evaluate_rule(&self, rule: &Rule) -> Result<Testsuite> {
        tracing::debug!(rule = %rule.path.display(), pattern = %rule.pattern, "Evaluating rule");
        let documents = expand_paths(&rule.pattern, &self.config.model_source)?;

        let testcases = if !rule.skip_reason.is_empty() {
            documents
                .iter()
                .map(|doc| Testcase::skipped(doc.display().to_string(), rule.skip_reason.as_str()))
                .collect()
        } else {
            let rule_bytes = read_bytes(&rule.path)?;
            let sandbox = Sandbox::new(&self.config.model_source)?;
            let mut testcases = Vec::with_capacity(documents.len());
            for doc in &documents {
                testcases.push(self.evaluate_document(rule, &rule_bytes, doc, &sandbox)?);
            }
            testcases
        };

        let suite = Testsuite::from_testcases(rule.path.display().to_string(), testcases);
        if self.config.progress {
            self.print_testsuite(&suite);
        }
        Ok(suite)
    }

    fn evaluate_document(
        &self,
        rule: &Rule,
        rule_bytes: &[u8],
        path: &Path,
        sandbox: &Sandbox,
    ) -> Result<Testcase> {
        let name = path.display().to_string();
        let bytes = read_bytes(path)?;
        let document = decode_document(path, &bytes)?;

        if let Some(doc) = documentation(&document) {
            if let Some(reason) = should_skip_rule(doc, &rule.rule_number, self.config.ignore_noqa)
            {
                tracing::debug!(rule = %rule.path.display(), document = %name, %reason, "Skipped by noqa");
                return Ok(Testcase::skipped(name, reason));
            }
        }

        let key = (!self.config.no_cache).then(|| CacheKey::from_bytes(rule_bytes, &bytes));
        if let Some(key) = &key {
            if let Some(mut cached) = self.cache.load(key) {
                cached.name = name;
                return Ok(cached);
            }
        }

        let start = Instant::now();
        let verdict = self.registry.evaluate(rule, &document, sandbox)?;
        let testcase = Testcase::from_verdict(name, start.elapsed().as_secs_f64(), verdict);

        if let Some(key) = &key {
            if !self.config.ignore_noqa {
                if let Err(err) = self.cache.save(key, &testcase) {
                    tracing::warn!(document = %testcase.name, error = %err, "Failed to write cache entry");
                }
            }
        }
        Ok(testcase)
    }

    fn print_testsuite(&self, suite: &Testsuite) {
        let mut out = format!("## {}\n", suite.name);
        for tc in &suite.testcases {
            out.push_str(&format!("{} ({:.5}s) {}\n", tc.status(), tc.time, tc.name));
        }
        let _guard = self.console.lock().unwrap_or_else(|e| e.into_inner());
        println!("{out}");
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| LintError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn log_failures(report: &LintReport) {
    for suite in report.testsuites.iter().filter(|s| s.failures > 0) {
        tracing::warn!(rule = %suite.name, failures = suite.failures, "Rule failed");
        for tc in &suite.testcases {
            if let Some(failure) = &tc.failure {
                tracing::warn!(document = %tc.name, message = %failure.message, "Failing document");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
