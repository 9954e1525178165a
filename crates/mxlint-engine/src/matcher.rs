//! Resolve a rule's input pattern to the documents it applies to.

use std::path::{Path, PathBuf};

use mxlint_types::{LintError, Result};
use regex::Regex;
use walkdir::WalkDir;

/// Rewrite a legacy glob-style pattern into a regular expression.
///
/// Patterns starting with `.*` are already regular expressions and are
/// returned unchanged.
pub fn normalize_pattern(pattern: &str) -> String {
    if pattern.starts_with(".*") {
        return pattern.to_string();
    }
    let rewritten = pattern
        .replace('$', "\\$")
        .replace('.', "\\.")
        .replace("**", ".*");
    tracing::info!(from = %pattern, to = %rewritten, "Expanded legacy pattern");
    rewritten
}

/// All files under `root` whose root-relative path matches `pattern`.
///
/// The match is unanchored. Results are absolute paths in lexical walk
/// order. An empty pattern matches nothing.
pub fn expand_paths(pattern: &str, root: &Path) -> Result<Vec<PathBuf>> {
    if pattern.is_empty() {
        tracing::warn!(root = %root.display(), "Rule has no input pattern");
        return Ok(Vec::new());
    }

    let pattern = normalize_pattern(pattern);
    let regex = Regex::new(&pattern).map_err(|e| LintError::InvalidPattern {
        pattern: pattern.clone(),
        message: e.to_string(),
    })?;

    let root = std::path::absolute(root)?;
    let mut matches = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry
            .map_err(|e| LintError::Other(format!("walking {}: {e}", root.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&root) else {
            continue;
        };
        if regex.is_match(&relative.to_string_lossy()) {
            matches.push(entry.path().to_path_buf());
        }
    }

    if matches.is_empty() {
        tracing::warn!(pattern = %pattern, "No matches found for pattern");
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn model_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let files = [
            "MyModule/DomainModels$DomainModel.yaml",
            "MyModule/Folder/ACT_Do.Microflows$Microflow.yaml",
            "MyModule/Folder/ACT_Other.Microflows$Microflow.yaml",
            "Security$ProjectSecurity.yaml",
            "Other/readme.txt",
        ];
        for f in files {
            let path = dir.path().join(f);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "Name: x\n").unwrap();
        }
        dir
    }

    fn relative(root: &Path, paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn regex_pattern_matches_unanchored() {
        let dir = model_tree();
        let paths = expand_paths(".*Microflows\\$Microflow\\.yaml", dir.path()).unwrap();
        assert_eq!(
            relative(dir.path(), &paths),
            vec![
                "MyModule/Folder/ACT_Do.Microflows$Microflow.yaml",
                "MyModule/Folder/ACT_Other.Microflows$Microflow.yaml",
            ]
        );
    }

    #[test]
    fn legacy_pattern_is_rewritten() {
        assert_eq!(
            normalize_pattern("**/Security$ProjectSecurity.yaml"),
            ".*/Security\\$ProjectSecurity\\.yaml"
        );
        assert_eq!(normalize_pattern(".*\\.yaml"), ".*\\.yaml");
    }

    #[test]
    fn legacy_pattern_matches_files() {
        let dir = model_tree();
        let paths = expand_paths("Security$ProjectSecurity.yaml", dir.path()).unwrap();
        assert_eq!(
            relative(dir.path(), &paths),
            vec!["Security$ProjectSecurity.yaml"]
        );
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let dir = model_tree();
        let paths = expand_paths(".*\\.json", dir.path()).unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn empty_pattern_matches_nothing() {
        let dir = model_tree();
        assert!(expand_paths("", dir.path()).unwrap().is_empty());
    }

    #[test]
    fn invalid_regex_is_error() {
        let dir = model_tree();
        let err = expand_paths(".*(unclosed", dir.path()).unwrap_err();
        assert!(matches!(err, LintError::InvalidPattern { .. }));
    }

    #[test]
    fn results_are_in_lexical_order() {
        let dir = model_tree();
        let paths = expand_paths(".*\\.yaml", dir.path()).unwrap();
        let rel = relative(dir.path(), &paths);
        let mut sorted = rel.clone();
        sorted.sort();
        assert_eq!(rel, sorted);
        assert_eq!(rel.len(), 4);
    }
}
