use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use mxlint_types::{Language, LintError, Result, Rule, Verdict};

use crate::rego::RegoBackend;
use crate::sandbox::Sandbox;
use crate::script::JavaScriptBackend;
use crate::transpile::{Transpiler, TypeScriptBackend};

/// Language-specific executor for rule logic.
///
/// Implementations are blocking: they may read files and run a script or
/// policy engine to completion on the calling thread.
pub trait Backend: Send + Sync {
    fn language(&self) -> Language;

    /// Extract the rule descriptor without running the rule's evaluation logic.
    fn parse_metadata(&self, path: &Path) -> Result<Rule>;

    /// Evaluate one decoded document against the rule.
    fn evaluate(
        &self,
        rule: &Rule,
        document: &serde_json::Value,
        sandbox: &Sandbox,
    ) -> Result<Verdict>;
}

/// Registry that maps each rule language to its backend.
pub struct BackendRegistry {
    backends: HashMap<Language, Box<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register a backend, replacing any previous one for the same language.
    pub fn register(&mut self, backend: impl Backend + 'static) {
        self.backends.insert(backend.language(), Box::new(backend));
    }

    pub fn get(&self, language: Language) -> Option<&dyn Backend> {
        self.backends.get(&language).map(|b| b.as_ref())
    }

    /// The backend that handles a rule file, chosen by extension.
    pub fn for_path(&self, path: &Path) -> Result<&dyn Backend> {
        Language::from_path(path)
            .and_then(|language| self.get(language))
            .ok_or_else(|| LintError::UnsupportedLanguage(path.to_path_buf()))
    }

    pub fn parse_metadata(&self, path: &Path) -> Result<Rule> {
        self.for_path(path)?.parse_metadata(path)
    }

    pub fn evaluate(
        &self,
        rule: &Rule,
        document: &serde_json::Value,
        sandbox: &Sandbox,
    ) -> Result<Verdict> {
        let backend = self
            .get(rule.language)
            .ok_or_else(|| LintError::UnsupportedLanguage(rule.path.clone()))?;
        backend.evaluate(rule, document, sandbox)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with the Rego, JavaScript and TypeScript backends.
pub fn default_registry() -> BackendRegistry {
    default_registry_with_transpiler(Arc::new(Transpiler::new()))
}

/// Same as [`default_registry`], sharing an existing transpilation cache.
pub fn default_registry_with_transpiler(transpiler: Arc<Transpiler>) -> BackendRegistry {
    let mut reg = BackendRegistry::new();
    reg.register(RegoBackend);
    reg.register(JavaScriptBackend);
    reg.register(TypeScriptBackend::new(transpiler));
    reg
}

/// Destructure an `{allow, errors}` object returned by rule logic.
pub(crate) fn verdict_from_value(rule: &Path, value: &serde_json::Value) -> Result<Verdict> {
    let invalid = |message: &str| LintError::InvalidRuleResult {
        rule: rule.to_path_buf(),
        message: message.to_string(),
    };

    let object = value
        .as_object()
        .ok_or_else(|| invalid("expected an object with `allow` and `errors`"))?;
    let allow = object
        .get("allow")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| invalid("`allow` must be a boolean"))?;
    let errors = object
        .get("errors")
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid("`errors` must be an array"))?
        .iter()
        .map(|e| match e {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    Ok(Verdict { allow, errors })
}

/// Render a metadata field as a string; absent or null becomes empty.
pub(crate) fn metadata_text(value: Option<&serde_json::Value>, key: &str) -> String {
    match value.and_then(|v| v.get(key)) {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
