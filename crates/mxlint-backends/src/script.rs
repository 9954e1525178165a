//! JavaScript backend built on an embedded `boa` runtime.
//!
//! A rule script declares a top-level `metadata` object and a `rule(input)`
//! function returning `{allow, errors}`. Every evaluation gets a fresh
//! runtime; the sandboxed file capability is installed as the global `mxlint`.

use std::path::{Path, PathBuf};

use boa_engine::object::builtins::JsArray;
use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{
    js_string, Context, JsError, JsNativeError, JsResult, JsString, JsValue, NativeFunction,
    Source,
};
use boa_gc::{Finalize, Trace};
use mxlint_types::{Language, LintError, Result, Rule, Verdict};

use crate::backend::{metadata_text, verdict_from_value, Backend};
use crate::sandbox::Sandbox;

/// A single-use script context bound to one rule file.
pub struct ScriptRuntime {
    context: Context,
    rule: PathBuf,
}

impl ScriptRuntime {
    /// Create a runtime; with a sandbox, the `mxlint` global is installed.
    pub fn new(rule: &Path, sandbox: Option<&Sandbox>) -> Result<Self> {
        let mut runtime = Self {
            context: Context::default(),
            rule: rule.to_path_buf(),
        };
        if let Some(sandbox) = sandbox {
            install_capability(&mut runtime.context, sandbox)
                .map_err(|e| runtime.script_error(e))?;
        }
        Ok(runtime)
    }

    /// Run the rule source so its top-level declarations become visible.
    pub fn load(&mut self, source: &str) -> Result<()> {
        self.context
            .eval(Source::from_bytes(source))
            .map_err(|e| self.script_error(e))?;
        Ok(())
    }

    /// Value of a top-level binding, `undefined` if it was never declared.
    ///
    /// Evaluated as an expression so `const`/`let` declarations, which do not
    /// become global object properties, are found too.
    fn binding(&mut self, name: &str) -> Result<JsValue> {
        let probe = format!("typeof {name} === \"undefined\" ? undefined : {name}");
        self.context
            .eval(Source::from_bytes(probe.as_str()))
            .map_err(|e| self.script_error(e))
    }

    /// The `metadata` object as JSON, or `None` when the script has none.
    pub fn metadata(&mut self) -> Result<Option<serde_json::Value>> {
        let value = self.binding("metadata")?;
        if !value.is_object() {
            return Ok(None);
        }
        let json = value
            .to_json(&mut self.context)
            .map_err(|e| self.script_error(e))?;
        Ok(Some(json))
    }

    /// Call `rule(document)` and destructure its `{allow, errors}` result.
    pub fn call_rule(&mut self, document: &serde_json::Value) -> Result<Verdict> {
        let rule_fn = self
            .binding("rule")?
            .as_callable()
            .cloned()
            .ok_or_else(|| LintError::MissingRuleFunction {
                rule: self.rule.clone(),
            })?;

        let input = JsValue::from_json(document, &mut self.context)
            .map_err(|e| self.script_error(e))?;
        let result = rule_fn
            .call(&JsValue::undefined(), &[input], &mut self.context)
            .map_err(|e| self.script_error(e))?;

        if !result.is_object() {
            return Err(LintError::InvalidRuleResult {
                rule: self.rule.clone(),
                message: format!("rule(...) returned {}", result.type_of()),
            });
        }
        let json = result
            .to_json(&mut self.context)
            .map_err(|e| self.script_error(e))?;
        tracing::debug!(rule = %self.rule.display(), result = %json, "Script result");
        verdict_from_value(&self.rule, &json)
    }

    fn script_error(&self, err: JsError) -> LintError {
        LintError::Script {
            rule: self.rule.clone(),
            message: err.to_string(),
        }
    }
}

/// Build a rule descriptor from the script's `metadata` object.
///
/// `package_name` is the rule path itself; script rules have no package.
pub fn parse_script_metadata(path: &Path, source: &str, language: Language) -> Result<Rule> {
    let mut runtime = ScriptRuntime::new(path, None)?;
    runtime.load(source)?;

    let mut rule = Rule::new(path, language).with_package_name(path.display().to_string());
    let Some(metadata) = runtime.metadata()? else {
        tracing::warn!(rule = %path.display(), "Rule declares no metadata object");
        return Ok(rule);
    };

    rule.title = metadata_text(Some(&metadata), "title");
    rule.description = metadata_text(Some(&metadata), "description");

    let custom = metadata.get("custom");
    rule.category = metadata_text(custom, "category");
    rule.severity = metadata_text(custom, "severity");
    rule.rule_number = metadata_text(custom, "rulenumber");
    rule.remediation = metadata_text(custom, "remediation");
    rule.rule_name = metadata_text(custom, "rulename");
    rule.pattern = metadata_text(custom, "input");
    rule.skip_reason = metadata_text(custom, "skip");
    Ok(rule)
}

/// Run already-compiled JavaScript against one document.
pub fn evaluate_script(
    rule: &Rule,
    source: &str,
    document: &serde_json::Value,
    sandbox: &Sandbox,
) -> Result<Verdict> {
    let mut runtime = ScriptRuntime::new(&rule.path, Some(sandbox))?;
    runtime.load(source)?;
    runtime.call_rule(document)
}

pub(crate) fn read_rule(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| LintError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// JavaScriptBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct JavaScriptBackend;

impl Backend for JavaScriptBackend {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn parse_metadata(&self, path: &Path) -> Result<Rule> {
        tracing::debug!(rule = %path.display(), "Reading javascript rule metadata");
        let source = read_rule(path)?;
        parse_script_metadata(path, &source, Language::JavaScript)
    }

    fn evaluate(
        &self,
        rule: &Rule,
        document: &serde_json::Value,
        sandbox: &Sandbox,
    ) -> Result<Verdict> {
        let source = read_rule(&rule.path)?;
        evaluate_script(rule, &source, document, sandbox)
    }
}

// ---------------------------------------------------------------------------
// The `mxlint` capability object
// ---------------------------------------------------------------------------

#[derive(Clone, Trace, Finalize)]
struct SandboxCapture {
    #[unsafe_ignore_trace]
    sandbox: Sandbox,
}

fn install_capability(context: &mut Context, sandbox: &Sandbox) -> JsResult<()> {
    let capture = SandboxCapture {
        sandbox: sandbox.clone(),
    };
    let readfile = NativeFunction::from_copy_closure_with_captures(readfile, capture.clone());
    let listdir = NativeFunction::from_copy_closure_with_captures(listdir, capture.clone());
    let isdir = NativeFunction::from_copy_closure_with_captures(isdir, capture);

    let io = ObjectInitializer::new(context)
        .function(readfile.clone(), js_string!("readfile"), 1)
        .function(listdir.clone(), js_string!("listdir"), 1)
        .function(isdir.clone(), js_string!("isdir"), 1)
        .build();

    let mxlint = ObjectInitializer::new(context)
        .property(js_string!("io"), io, Attribute::all())
        .function(readfile, js_string!("readfile"), 1)
        .function(listdir, js_string!("listdir"), 1)
        .function(isdir, js_string!("isdir"), 1)
        .build();

    context.register_global_property(js_string!("mxlint"), mxlint, Attribute::all())
}

fn path_argument(name: &str, args: &[JsValue], context: &mut Context) -> JsResult<String> {
    match args.first() {
        Some(value) if !value.is_undefined() => {
            Ok(value.to_string(context)?.to_std_string_escaped())
        }
        _ => Err(JsNativeError::typ()
            .with_message(format!("mxlint.{name} requires a path argument"))
            .into()),
    }
}

fn capability_error(name: &str, err: LintError) -> JsError {
    JsNativeError::error()
        .with_message(format!("mxlint.{name}: {err}"))
        .into()
}

fn readfile(
    _this: &JsValue,
    args: &[JsValue],
    capture: &SandboxCapture,
    context: &mut Context,
) -> JsResult<JsValue> {
    let path = path_argument("readfile", args, context)?;
    let content = capture
        .sandbox
        .read_file(&path)
        .map_err(|e| capability_error("readfile", e))?;
    Ok(JsValue::from(JsString::from(content.as_str())))
}

fn listdir(
    _this: &JsValue,
    args: &[JsValue],
    capture: &SandboxCapture,
    context: &mut Context,
) -> JsResult<JsValue> {
    let path = path_argument("listdir", args, context)?;
    let names = capture
        .sandbox
        .list_dir(&path)
        .map_err(|e| capability_error("listdir", e))?;
    let array = JsArray::from_iter(
        names
            .iter()
            .map(|name| JsValue::from(JsString::from(name.as_str()))),
        context,
    );
    Ok(array.into())
}

fn isdir(
    _this: &JsValue,
    args: &[JsValue],
    capture: &SandboxCapture,
    context: &mut Context,
) -> JsResult<JsValue> {
    let path = path_argument("isdir", args, context)?;
    let is_dir = capture
        .sandbox
        .is_dir(&path)
        .map_err(|e| capability_error("isdir", e))?;
    Ok(JsValue::from(is_dir))
}
