//! TypeScript rules: transpiled to JavaScript with `deno_ast`, then run by the
//! script backend.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use deno_ast::{
    EmitOptions, MediaType, ModuleSpecifier, ParseParams, SourceMapOption,
    TranspileModuleOptions, TranspileOptions,
};
use mxlint_types::{Language, LintError, Result, Rule, Verdict};
use sha2::{Digest, Sha256};

use crate::backend::Backend;
use crate::sandbox::Sandbox;
use crate::script::{evaluate_script, parse_script_metadata, read_rule};

/// Hex SHA-256 of rule source bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Transpiler with an in-process cache keyed by source content hash.
///
/// Safe to share between concurrently evaluated rules; an entry is never
/// returned for source whose hash differs from the one it was built from.
#[derive(Debug, Default)]
pub struct Transpiler {
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl Transpiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transpile_file(&self, path: &Path) -> Result<Arc<str>> {
        let source = read_rule(path)?;
        self.transpile(path, &source)
    }

    pub fn transpile(&self, path: &Path, source: &str) -> Result<Arc<str>> {
        let hash = content_hash(source.as_bytes());
        if let Some(code) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&hash)
        {
            tracing::debug!(rule = %path.display(), "Transpile cache hit");
            return Ok(Arc::clone(code));
        }

        let code: Arc<str> = transpile_typescript(path, source)?.into();
        tracing::debug!(rule = %path.display(), code = %code, "Transpiled typescript rule");
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(hash, Arc::clone(&code));
        Ok(code)
    }

    /// Number of cached transpilations.
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn transpile_typescript(path: &Path, source: &str) -> Result<String> {
    let transpile_err = |message: String| LintError::Transpile {
        rule: path.to_path_buf(),
        message,
    };

    let specifier = match std::path::absolute(path)
        .ok()
        .and_then(|abs| ModuleSpecifier::from_file_path(abs).ok())
    {
        Some(specifier) => specifier,
        None => ModuleSpecifier::parse("file:///rule.ts")
            .map_err(|e| transpile_err(e.to_string()))?,
    };

    let parsed = deno_ast::parse_module(ParseParams {
        specifier,
        text: source.into(),
        media_type: MediaType::TypeScript,
        capture_tokens: false,
        scope_analysis: false,
        maybe_syntax: None,
    })
    .map_err(|e| transpile_err(e.to_string()))?;

    let emit = EmitOptions {
        source_map: SourceMapOption::None,
        ..Default::default()
    };
    let transpiled = parsed
        .transpile(
            &TranspileOptions::default(),
            &TranspileModuleOptions::default(),
            &emit,
        )
        .map_err(|e| transpile_err(e.to_string()))?;
    Ok(transpiled.into_source().text)
}

// ---------------------------------------------------------------------------
// TypeScriptBackend
// ---------------------------------------------------------------------------

pub struct TypeScriptBackend {
    transpiler: Arc<Transpiler>,
}

impl TypeScriptBackend {
    pub fn new(transpiler: Arc<Transpiler>) -> Self {
        Self { transpiler }
    }
}

impl Backend for TypeScriptBackend {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn parse_metadata(&self, path: &Path) -> Result<Rule> {
        tracing::debug!(rule = %path.display(), "Reading typescript rule metadata");
        let code = self.transpiler.transpile_file(path)?;
        parse_script_metadata(path, &code, Language::TypeScript)
    }

    fn evaluate(
        &self,
        rule: &Rule,
        document: &serde_json::Value,
        sandbox: &Sandbox,
    ) -> Result<Verdict> {
        let code = self.transpiler.transpile_file(&rule.path)?;
        evaluate_script(rule, &code, document, sandbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const TS_RULE: &str = r#"const metadata = {
    title: "TypeScript example rule",
    description: "Validates that the Name field is set",
    custom: {
        category: "Example",
        rulename: "TypescriptExampleRule",
        severity: "LOW",
        rulenumber: "001_0005",
        remediation: "No action required",
        input: ".*\\$Microflow\\.yaml"
    }
};
type RuleInput = {
    Name?: string;
};

function rule(input: RuleInput = {}) {
    const errors: string[] = [];
    const name = input.Name ?? "";
    if (name === "") {
        errors.push("Name must be set");
    }
    return { allow: errors.length === 0, errors };
}
"#;

    #[test]
    fn content_hash_is_hex_sha256() {
        let hash = content_hash(b"abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn strips_type_annotations() {
        let transpiler = Transpiler::new();
        let code = transpiler.transpile(Path::new("r.ts"), TS_RULE).unwrap();
        assert!(!code.contains("RuleInput"));
        assert!(!code.contains("string[]"));
        assert!(code.contains("function rule"));
    }

    #[test]
    fn cache_reuses_identical_source() {
        let transpiler = Transpiler::new();
        let first = transpiler.transpile(Path::new("a.ts"), TS_RULE).unwrap();
        let second = transpiler.transpile(Path::new("b.ts"), TS_RULE).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transpiler.len(), 1);

        let changed = format!("{TS_RULE}\n// changed\n");
        transpiler.transpile(Path::new("a.ts"), &changed).unwrap();
        assert_eq!(transpiler.len(), 2);
    }

    #[test]
    fn syntax_error_is_transpile_error() {
        let transpiler = Transpiler::new();
        let err = transpiler
            .transpile(Path::new("bad.ts"), "function rule(: {")
            .unwrap_err();
        assert!(matches!(err, LintError::Transpile { .. }));
        assert!(err.is_contract_violation());
        assert!(transpiler.is_empty());
    }

    #[test]
    fn backend_parses_and_evaluates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("001_0005_typescript_example.ts");
        std::fs::write(&path, TS_RULE).unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();

        let backend = TypeScriptBackend::new(Arc::new(Transpiler::new()));
        let rule = backend.parse_metadata(&path).unwrap();
        assert_eq!(rule.rule_number, "001_0005");
        assert_eq!(rule.pattern, ".*\\$Microflow\\.yaml");
        assert_eq!(rule.language, Language::TypeScript);

        let ok = backend
            .evaluate(&rule, &json!({"Name": "MF_Do"}), &sandbox)
            .unwrap();
        assert!(ok.allow);
        let denied = backend.evaluate(&rule, &json!({}), &sandbox).unwrap();
        assert_eq!(denied.errors, vec!["Name must be set".to_string()]);
    }
}
