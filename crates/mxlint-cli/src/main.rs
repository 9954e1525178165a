//! CLI binary for linting an exported model with mxlint rules.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mxlint_engine::{default_cache_dir, LintConfig, Linter, ResultCache};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mxlint", version, about = "Policy rule engine for exported models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate all rules against the model source
    Lint {
        /// Directory containing the rules
        #[arg(short, long, default_value = "rules")]
        rules: PathBuf,

        /// Directory containing the exported model
        #[arg(short, long, default_value = "modelsource")]
        modelsource: PathBuf,

        /// Write an xUnit XML report to this path
        #[arg(short = 'x', long)]
        xunit_report: Option<PathBuf>,

        /// Write a JSON report to this path
        #[arg(short = 'j', long)]
        json_file: Option<PathBuf>,

        /// Evaluate documents even if they carry a noqa directive
        #[arg(long)]
        ignore_noqa: bool,

        /// Do not read or write the result cache
        #[arg(long)]
        no_cache: bool,

        /// Result cache directory (default: per-user cache dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Run each rule's _test.yaml fixtures
    TestRules {
        /// Directory containing the rules
        #[arg(short, long, default_value = "rules")]
        rules: PathBuf,
    },

    /// Remove all cached results
    CacheClear {
        /// Result cache directory (default: per-user cache dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Show cache entry count and size
    CacheStats {
        /// Result cache directory (default: per-user cache dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Lint {
            rules,
            modelsource,
            xunit_report,
            json_file,
            ignore_noqa,
            no_cache,
            cache_dir,
        } => {
            let mut config = LintConfig::new(rules, modelsource)
                .with_ignore_noqa(ignore_noqa)
                .with_no_cache(no_cache);
            if let Some(path) = xunit_report {
                config = config.with_xunit_report(path);
            }
            if let Some(path) = json_file {
                config = config.with_json_report(path);
            }
            if let Some(dir) = cache_dir {
                config = config.with_cache_dir(dir);
            }
            cmd_lint(config).await?;
        }
        Commands::TestRules { rules } => {
            cmd_test_rules(rules).await?;
        }
        Commands::CacheClear { cache_dir } => {
            cache(cache_dir.as_deref()).clear().await?;
        }
        Commands::CacheStats { cache_dir } => {
            let cache = cache(cache_dir.as_deref());
            let stats = cache.stats().await?;
            println!("Cache directory: {}", cache.dir().display());
            println!("Entries: {}", stats.entries);
            println!("Total size: {} bytes", stats.total_bytes);
        }
    }

    Ok(())
}

fn cache(dir: Option<&Path>) -> ResultCache {
    ResultCache::new(dir.map_or_else(default_cache_dir, Path::to_path_buf))
}

async fn cmd_lint(config: LintConfig) -> anyhow::Result<()> {
    let linter = Linter::new(config);
    let report = linter.run().await?;

    println!(
        "{} testcases, {} failures, {} skipped",
        report.total_testcases(),
        report.failures(),
        report.skipped()
    );
    exit_on_failures(report.ensure_passed())?;
    tracing::info!("All rules passed");
    Ok(())
}

async fn cmd_test_rules(rules: PathBuf) -> anyhow::Result<()> {
    // The model source is unused when running fixtures.
    let linter = Linter::new(LintConfig::new(rules, ".").with_progress(false));
    let summary = linter.test_rules().await?;

    println!(
        "{} passed, {} failed, {} rules without fixtures",
        summary.passed,
        summary.failed.len(),
        summary.missing.len()
    );
    for failure in &summary.failed {
        println!(
            "FAIL {} :: {} (expected allow={})",
            failure.rule.display(),
            failure.case,
            failure.expected
        );
        for error in &failure.errors {
            println!("    {error}");
        }
    }
    exit_on_failures(summary.ensure_passed())
}

/// Rule failures exit with status 1 after their summary has been printed;
/// any other error propagates.
fn exit_on_failures(result: mxlint_types::Result<()>) -> anyhow::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if !err.is_fatal() => {
            eprintln!("{err}");
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
