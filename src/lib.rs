//! Tsumugi — a small Jinja-style text templating engine.
//!
//! A template is literal text interleaved with `{{ … }}` print expressions,
//! `{% … %}` control blocks (`if`/`elif`/`else`, `for`, `set`), and
//! `{# … #}` comments. Parsing goes through a stateful lexer and a
//! recursive-descent parser into an immutable tree; rendering walks the tree
//! against a stack of scopes built from the caller's JSON context.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//!
//! let out = tsumugi::render("Hello {{ name }}", json!({"name": "Jason"})).unwrap();
//! assert_eq!(out, "Hello Jason");
//! ```
//!
//! Templates are parsed once and rendered many times, with arithmetic,
//! comparisons, and container literals available in expressions:
//!
//! ```rust
//! use serde_json::json;
//!
//! let env = tsumugi::Environment::new();
//! let template = env
//!     .parse("{{ greeting }}, {{ 6 * 7 }}!", "demo", "demo.tmpl")
//!     .unwrap();
//! let out = template.render(json!({"greeting": "hi"})).unwrap();
//! assert_eq!(out, "hi, 42!");
//! ```

// Public modules - part of the API
pub mod ast;
pub mod environment;
pub mod error;
pub mod loader;
pub mod value;

// Internal implementation modules
mod context;
mod lexer;
mod parser;
mod renderer;
mod token;

pub use environment::Environment;
pub use error::{Result, TsumugiError};
pub use loader::FileLoader;
pub use value::Value;

use std::collections::HashMap;

use ast::ListNode;
use renderer::Renderer;

/// A parsed template: immutable after parsing, cheap to clone, and safe to
/// render from multiple threads since every render owns its own scope stack
/// and output buffer.
#[derive(Debug, Clone)]
pub struct Template {
    pub(crate) name: String,
    pub(crate) filename: String,
    pub(crate) source: String,
    pub(crate) root: ListNode,
    pub(crate) auto_escape: bool,
    pub(crate) strict: bool,
    pub(crate) globals: HashMap<String, Value>,
}

impl Template {
    /// Render with a JSON object as the context.
    pub fn render(&self, data: serde_json::Value) -> Result<String> {
        self.render_value(Value::from_json(data))
    }

    /// Render with an already-converted value as the context; it must be a
    /// string-keyed map.
    pub fn render_value(&self, context: Value) -> Result<String> {
        Renderer::new(self, context)?.render()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The source text the template was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The root of the parsed tree.
    pub fn root(&self) -> &ListNode {
        &self.root
    }
}

/// A template prints as template syntax: re-parsing the output yields a
/// structurally equal tree.
impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)
    }
}

/// Convenience: parse and render in one call with default settings.
///
/// ```rust
/// use serde_json::json;
///
/// let out = tsumugi::render("{{ 1 + 2 }}", json!({})).unwrap();
/// assert_eq!(out, "3");
/// ```
pub fn render(source: &str, data: serde_json::Value) -> Result<String> {
    Environment::new()
        .parse(source, "template", "<string>")?
        .render(data)
}
