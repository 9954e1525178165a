//! Rule backends and the sandboxed file capability for mxlint.
//!
//! Provides the `Backend` trait, `BackendRegistry`, the Rego, JavaScript and
//! TypeScript backends with their metadata parsers, the shared TypeScript
//! `Transpiler`, and the `Sandbox` handed to script rules.

pub mod backend;
pub mod rego;
pub mod sandbox;
pub mod script;
pub mod sprintf;
pub mod transpile;

pub use backend::{default_registry, default_registry_with_transpiler, Backend, BackendRegistry};
pub use rego::{parse_rego_metadata, RegoBackend};
pub use sandbox::Sandbox;
pub use sprintf::go_sprintf;
pub use script::{parse_script_metadata, JavaScriptBackend, ScriptRuntime};
pub use transpile::{content_hash, Transpiler, TypeScriptBackend};
