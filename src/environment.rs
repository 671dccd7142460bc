use std::collections::HashMap;

use crate::error::{Result, TsumugiError};
use crate::lexer::{LexConfig, Lexer};
use crate::parser::Parser;
use crate::value::Value;
use crate::Template;

/// Engine configuration: the six delimiter strings plus behaviour flags.
///
/// Delimiters are fixed when the environment is constructed and the
/// construction-time sanity check rejects sets the lexer could not
/// disambiguate, so a held environment is always usable. The behaviour
/// flags stay public: no value of a flag can make the configuration
/// invalid. Templates snapshot the settings they need at parse time, so
/// reconfiguring an environment never changes templates parsed earlier.
#[derive(Debug, Clone)]
pub struct Environment {
    block_start: String,
    block_end: String,
    variable_start: String,
    variable_end: String,
    comment_start: String,
    comment_end: String,
    /// If true, the first newline after a block is removed. Default false.
    pub trim_blocks: bool,
    /// If true, leading whitespace is stripped from the start of a line to a
    /// block. Default false.
    pub lstrip_blocks: bool,
    /// If true, variable output is HTML-escaped. Default false.
    pub auto_escape: bool,
    /// Honoured by `FileLoader`: reload a cached template when its backing
    /// file changes. Default false.
    pub auto_reload: bool,
    /// If true, failed name lookups are render errors instead of nulls.
    pub strict: bool,
    /// Variables available to every template, shadowed by the render
    /// context.
    pub globals: HashMap<String, Value>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            block_start: "{%".to_string(),
            block_end: "%}".to_string(),
            variable_start: "{{".to_string(),
            variable_end: "}}".to_string(),
            comment_start: "{#".to_string(),
            comment_end: "#}".to_string(),
            trim_blocks: false,
            lstrip_blocks: false,
            auto_escape: false,
            auto_reload: false,
            strict: false,
            globals: HashMap::new(),
        }
    }
}

impl Environment {
    /// An environment with the default delimiters (`{%`/`%}`, `{{`/`}}`,
    /// `{#`/`#}`); the default set is always valid.
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment with custom delimiters, given as (start, end) pairs
    /// for blocks, print expressions, and comments. Construction fails if
    /// any delimiter is empty or the three start markers are not pairwise
    /// distinct.
    pub fn with_delimiters(
        block: (&str, &str),
        variable: (&str, &str),
        comment: (&str, &str),
    ) -> Result<Self> {
        let env = Self {
            block_start: block.0.to_string(),
            block_end: block.1.to_string(),
            variable_start: variable.0.to_string(),
            variable_end: variable.1.to_string(),
            comment_start: comment.0.to_string(),
            comment_end: comment.1.to_string(),
            ..Self::default()
        };
        env.sanity_check()?;
        Ok(env)
    }

    /// Reject configurations the lexer cannot disambiguate: every delimiter
    /// must be non-empty and the three start markers pairwise distinct.
    fn sanity_check(&self) -> Result<()> {
        let delims = [
            &self.block_start,
            &self.block_end,
            &self.variable_start,
            &self.variable_end,
            &self.comment_start,
            &self.comment_end,
        ];
        if delims.iter().any(|d| d.is_empty()) {
            return Err(TsumugiError::Config {
                message: "delimiters must not be empty".to_string(),
            });
        }
        if self.comment_start == self.block_start
            || self.comment_start == self.variable_start
            || self.block_start == self.variable_start
        {
            return Err(TsumugiError::Config {
                message: "block_start, variable_start, and comment_start must be distinct"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Parse `source` into a reusable template. `name` identifies the
    /// template; `filename` appears in diagnostics.
    pub fn parse(&self, source: &str, name: &str, filename: &str) -> Result<Template> {
        let lexer = Lexer::new(source, self.lex_config());
        let root = Parser::new(lexer, source, filename).parse()?;
        Ok(Template {
            name: name.to_string(),
            filename: filename.to_string(),
            source: source.to_string(),
            root,
            auto_escape: self.auto_escape,
            strict: self.strict,
            globals: self.globals.clone(),
        })
    }

    fn lex_config(&self) -> LexConfig {
        LexConfig {
            block_start: self.block_start.clone(),
            block_end: self.block_end.clone(),
            variable_start: self.variable_start.clone(),
            variable_end: self.variable_end.clone(),
            comment_start: self.comment_start.clone(),
            comment_end: self.comment_end.clone(),
            trim_blocks: self.trim_blocks,
            lstrip_blocks: self.lstrip_blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_environment_always_constructs() {
        let env = Environment::new();
        assert!(env.parse("plain", "t", "<t>").is_ok());
    }

    #[test]
    fn colliding_start_markers_fail_at_construction() {
        // comment start collides with the variable start
        let err = Environment::with_delimiters(("{%", "%}"), ("{{", "}}"), ("{{", "#}"))
            .unwrap_err();
        assert!(err.to_string().contains("must be distinct"));
        let err = Environment::with_delimiters(("{{", "%}"), ("{{", "}}"), ("{#", "#}"))
            .unwrap_err();
        assert!(err.to_string().contains("must be distinct"));
    }

    #[test]
    fn empty_delimiter_fails_at_construction() {
        assert!(Environment::with_delimiters(("{%", "%}"), ("{{", ""), ("{#", "#}")).is_err());
    }

    #[test]
    fn custom_delimiters_parse_and_render() {
        let env = Environment::with_delimiters(("<%", "%>"), ("<<", ">>"), ("<#", "#>")).unwrap();
        let template = env
            .parse("<% if on %><< name >><% endif %><# gone #>", "t", "<t>")
            .unwrap();
        let out = template.render(json!({"on": true, "name": "ok"})).unwrap();
        assert_eq!(out, "ok");
    }

    #[test]
    fn trim_and_lstrip_flags_flow_into_the_lexer() {
        let mut env = Environment::new();
        env.trim_blocks = true;
        env.lstrip_blocks = true;
        let template = env
            .parse(
                "<ul>\n  {% for x in xs %}\n  <li>{{ x }}</li>\n  {% endfor %}\n</ul>",
                "t",
                "<t>",
            )
            .unwrap();
        let out = template.render(json!({"xs": [1, 2]})).unwrap();
        assert_eq!(out, "<ul>\n  <li>1</li>\n  <li>2</li>\n</ul>");
    }
}
