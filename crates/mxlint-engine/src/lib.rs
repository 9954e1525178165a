//! Rule evaluation engine for mxlint.
//!
//! This crate implements rule discovery, the noqa directive language, input
//! pattern matching, the content-addressed result cache, the concurrent
//! evaluation orchestrator, xUnit/JSON report generation, and rule fixtures.

pub mod cache;
pub mod document;
pub mod engine;
pub mod fixtures;
pub mod matcher;
pub mod noqa;
pub mod report;
pub mod rules;

pub use cache::{default_cache_dir, CacheKey, CacheStats, CachedTestcase, ResultCache, CACHE_VERSION};
pub use document::decode_document;
pub use engine::{LintConfig, Linter};
pub use fixtures::{fixture_path, run_fixtures, FixtureFailure, FixtureSummary};
pub use matcher::{expand_paths, normalize_pattern};
pub use noqa::{parse_noqa_directive, should_skip_rule, NoqaDirective};
pub use report::{render_json, render_xunit, write_reports};
pub use rules::{discover_rules, ensure_unique_rule_numbers, is_rule_file};
