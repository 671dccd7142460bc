use std::collections::HashMap;

use crate::ast::{ArithOp, CmpOp, Expr, ForNode, ForTarget, ListNode, LogicOp, Node, UnaryOp, VarNode};
use crate::context::{Scope, ScopeStack};
use crate::error::{Location, Result, TsumugiError};
use crate::value::Value;
use crate::Template;

/// Walks a parsed tree against a scope stack and appends to an output
/// buffer. Each renderer owns its own stack and buffer, so one template can
/// be rendered from many threads at once.
pub(crate) struct Renderer<'a> {
    template: &'a Template,
    scopes: ScopeStack,
    out: String,
}

impl<'a> Renderer<'a> {
    /// Build a renderer over `template` with `context` as the root scope.
    /// The environment's globals sit below the context, so context names
    /// shadow globals.
    pub fn new(template: &'a Template, context: Value) -> Result<Self> {
        let mut scopes = ScopeStack::new();
        scopes.push(Scope::from_bindings(template.globals.clone()));

        let mut bindings = HashMap::new();
        match context {
            Value::Map(pairs) => {
                for (key, value) in pairs {
                    match key {
                        Value::Str(name) => {
                            bindings.insert(name, value);
                        }
                        other => {
                            return Err(TsumugiError::Type {
                                message: format!(
                                    "context keys must be strings, got {}",
                                    other.type_name()
                                ),
                                filename: template.filename.clone(),
                                line: 1,
                            })
                        }
                    }
                }
            }
            other => {
                return Err(TsumugiError::Type {
                    message: format!("render context must be a map, got {}", other.type_name()),
                    filename: template.filename.clone(),
                    line: 1,
                })
            }
        }
        scopes.push(Scope::from_bindings(bindings));

        Ok(Self {
            template,
            scopes,
            out: String::new(),
        })
    }

    pub fn render(mut self) -> Result<String> {
        let template = self.template;
        self.render_list(&template.root)?;
        Ok(self.out)
    }

    fn render_list(&mut self, list: &ListNode) -> Result<()> {
        for node in &list.nodes {
            self.render_node(node)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::List(n) => self.render_list(n),
            Node::Text(n) => {
                self.out.push_str(&n.text);
                Ok(())
            }
            Node::Var(n) => self.render_var(n),
            Node::If(n) => {
                for branch in &n.branches {
                    if self.eval(&branch.guard)?.is_truthy() {
                        return self.render_list(&branch.body);
                    }
                }
                match &n.else_body {
                    Some(body) => self.render_list(body),
                    None => Ok(()),
                }
            }
            Node::For(n) => self.render_for(n),
            Node::Set(n) => {
                let value = self.eval(&n.value)?;
                self.scopes.bind(n.name.clone(), value);
                Ok(())
            }
        }
    }

    fn render_var(&mut self, node: &VarNode) -> Result<()> {
        let value = self.eval(&node.expr)?;
        if self.template.strict && value == Value::Null {
            return Err(self.type_error(node.pos, "null value in output".to_string()));
        }
        let text = value.to_string();
        if self.template.auto_escape {
            self.out.push_str(&escape(&text));
        } else {
            self.out.push_str(&text);
        }
        Ok(())
    }

    fn render_for(&mut self, node: &ForNode) -> Result<()> {
        let iterable = self.eval(&node.iter)?;
        let items: Vec<Value> = match iterable {
            Value::List(items) => items,
            // a map iterates its keys, in insertion order
            Value::Map(pairs) => pairs.into_iter().map(|(key, _)| key).collect(),
            other => {
                return Err(self.type_error(
                    node.iter.pos(),
                    format!("{} is not iterable", other.type_name()),
                ))
            }
        };

        for item in items {
            let mut scope = Scope::new();
            match &node.target {
                ForTarget::Single(name) => scope.bind(name.clone(), item),
                ForTarget::Tuple(names) => match item {
                    Value::List(values) if values.len() == names.len() => {
                        for (name, value) in names.iter().zip(values) {
                            scope.bind(name.clone(), value);
                        }
                    }
                    other => {
                        return Err(self.type_error(
                            node.pos,
                            format!(
                                "cannot unpack {} into {} names",
                                other.type_name(),
                                names.len()
                            ),
                        ))
                    }
                },
            }
            self.scopes.push(scope);
            let result = self.render_list(&node.body);
            self.scopes.pop();
            result?;
        }
        Ok(())
    }

    // -- expression evaluation --

    fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Int { value, .. } => Ok(Value::Int(*value)),
            Expr::Float { value, .. } => Ok(Value::Float(*value)),
            Expr::Str { value, .. } => Ok(Value::Str(value.clone())),
            Expr::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expr::Lookup { name, pos } => match self.scopes.lookup(name) {
                Some(value) => Ok(value.clone()),
                None if self.template.strict => Err(TsumugiError::Undefined {
                    name: name.clone(),
                    filename: self.template.filename.clone(),
                    line: self.line_of(*pos),
                }),
                None => Ok(Value::Null),
            },
            Expr::Unary { op, operand, pos } => self.eval_unary(*op, operand, *pos),
            Expr::Add { op, lhs, rhs, pos } | Expr::Mul { op, lhs, rhs, pos } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                self.eval_arith(*op, lhs, rhs, *pos)
            }
            Expr::Compare { op, lhs, rhs, pos } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                self.eval_compare(*op, lhs, rhs, *pos)
            }
            Expr::Logic { op, lhs, rhs, .. } => {
                // short-circuit; the deciding operand is the result
                let lhs = self.eval(lhs)?;
                match op {
                    LogicOp::Or if lhs.is_truthy() => Ok(lhs),
                    LogicOp::Or => self.eval(rhs),
                    LogicOp::And if lhs.is_truthy() => self.eval(rhs),
                    LogicOp::And => Ok(lhs),
                }
            }
            Expr::Map { elems, .. } => {
                let mut pairs = Vec::with_capacity(elems.len());
                for elem in elems {
                    pairs.push((self.eval(&elem.key)?, self.eval(&elem.value)?));
                }
                Ok(Value::Map(pairs))
            }
            Expr::List { elems, .. } => {
                let items: Result<Vec<Value>> = elems.iter().map(|e| self.eval(e)).collect();
                Ok(Value::List(items?))
            }
            Expr::Index { target, index, pos } => self.eval_index(target, index, *pos),
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, pos: usize) -> Result<Value> {
        let value = self.eval(operand)?;
        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOp::Minus => match value {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| self.arith_error(pos, "integer overflow".to_string())),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(self.type_error(
                    pos,
                    format!("unary '-' not defined on {}", other.type_name()),
                )),
            },
            UnaryOp::Plus => match value {
                numeric @ (Value::Int(_) | Value::Float(_)) => Ok(numeric),
                other => Err(self.type_error(
                    pos,
                    format!("unary '+' not defined on {}", other.type_name()),
                )),
            },
        }
    }

    /// Same-type operands operate in that type; mixed numeric operands are
    /// coerced to float; anything else is a type error.
    fn eval_arith(&self, op: ArithOp, lhs: Value, rhs: Value, pos: usize) -> Result<Value> {
        match (lhs, rhs) {
            (Value::Int(l), Value::Int(r)) => self.int_arith(op, l, r, pos),
            (Value::Str(l), Value::Str(r)) => self.str_arith(op, &l, &r, pos),
            (l, r) => match (l.as_float(), r.as_float()) {
                (Some(a), Some(b)) => self.float_arith(op, a, b, pos),
                _ => Err(self.type_error(
                    pos,
                    format!(
                        "{} and {} not compatible with {}",
                        l.type_name(),
                        r.type_name(),
                        op.symbol()
                    ),
                )),
            },
        }
    }

    fn int_arith(&self, op: ArithOp, l: i64, r: i64, pos: usize) -> Result<Value> {
        if r == 0 && matches!(op, ArithOp::Div | ArithOp::Floordiv | ArithOp::Mod) {
            return Err(self.arith_error(pos, "integer division by zero".to_string()));
        }
        let result = match op {
            ArithOp::Add => l.checked_add(r),
            ArithOp::Sub => l.checked_sub(r),
            ArithOp::Mul => l.checked_mul(r),
            ArithOp::Div | ArithOp::Floordiv => l.checked_div(r),
            ArithOp::Mod => l.checked_rem(r),
        };
        result
            .map(Value::Int)
            .ok_or_else(|| self.arith_error(pos, "integer overflow".to_string()))
    }

    fn float_arith(&self, op: ArithOp, l: f64, r: f64, pos: usize) -> Result<Value> {
        let result = match op {
            ArithOp::Add => l + r,
            ArithOp::Sub => l - r,
            ArithOp::Mul => l * r,
            // IEEE semantics: division by zero yields infinity or NaN
            ArithOp::Div => l / r,
            ArithOp::Floordiv => (l / r).floor(),
            ArithOp::Mod => {
                return Err(self.type_error(pos, "'%' not defined on float".to_string()))
            }
        };
        Ok(Value::Float(result))
    }

    fn str_arith(&self, op: ArithOp, l: &str, r: &str, pos: usize) -> Result<Value> {
        match op {
            ArithOp::Add => Ok(Value::Str(format!("{}{}", l, r))),
            other => Err(self.type_error(
                pos,
                format!("'{}' not defined on string", other.symbol()),
            )),
        }
    }

    fn eval_compare(&self, op: CmpOp, lhs: Value, rhs: Value, pos: usize) -> Result<Value> {
        match op {
            CmpOp::Eq => return Ok(Value::Bool(lhs.loose_eq(&rhs))),
            CmpOp::Ne => return Ok(Value::Bool(!lhs.loose_eq(&rhs))),
            _ => {}
        }
        let result = match (&lhs, &rhs) {
            (Value::Str(a), Value::Str(b)) => match op {
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
                _ => false,
            },
            _ => match (lhs.as_float(), rhs.as_float()) {
                (Some(a), Some(b)) => match op {
                    CmpOp::Lt => a < b,
                    CmpOp::Le => a <= b,
                    CmpOp::Gt => a > b,
                    CmpOp::Ge => a >= b,
                    _ => false,
                },
                _ => {
                    return Err(self.type_error(
                        pos,
                        format!(
                            "{} and {} not comparable with {}",
                            lhs.type_name(),
                            rhs.type_name(),
                            op.symbol()
                        ),
                    ))
                }
            },
        };
        Ok(Value::Bool(result))
    }

    fn eval_index(&self, target: &Expr, index: &Expr, pos: usize) -> Result<Value> {
        let target_value = self.eval(target)?;
        let index_value = self.eval(index)?;
        match target_value {
            Value::List(items) => match index_value {
                Value::Int(i) => usize::try_from(i)
                    .ok()
                    .and_then(|idx| items.get(idx).cloned())
                    .ok_or_else(|| {
                        self.arith_error(pos, format!("list index out of range: {}", i))
                    }),
                other => Err(self.type_error(
                    pos,
                    format!("list index must be int, got {}", other.type_name()),
                )),
            },
            Value::Map(pairs) => {
                for (key, value) in &pairs {
                    if key.loose_eq(&index_value) {
                        return Ok(value.clone());
                    }
                }
                if self.template.strict {
                    Err(TsumugiError::Undefined {
                        name: index_value.to_string(),
                        filename: self.template.filename.clone(),
                        line: self.line_of(pos),
                    })
                } else {
                    Ok(Value::Null)
                }
            }
            other => Err(self.type_error(pos, format!("cannot index {}", other.type_name()))),
        }
    }

    // -- error helpers --

    fn line_of(&self, pos: usize) -> usize {
        Location::from_offset(&self.template.source, pos).line
    }

    fn type_error(&self, pos: usize, message: String) -> TsumugiError {
        TsumugiError::Type {
            message,
            filename: self.template.filename.clone(),
            line: self.line_of(pos),
        }
    }

    fn arith_error(&self, pos: usize, message: String) -> TsumugiError {
        TsumugiError::Arithmetic {
            message,
            filename: self.template.filename.clone(),
            line: self.line_of(pos),
        }
    }
}

/// Escape `&`, `<`, `>`, `"`, and `'` for HTML output.
pub(crate) fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Environment;
    use serde_json::json;

    fn render(src: &str, data: serde_json::Value) -> Result<String> {
        Environment::new().parse(src, "test", "<test>")?.render(data)
    }

    fn render_strict(src: &str, data: serde_json::Value) -> Result<String> {
        let mut env = Environment::new();
        env.strict = true;
        env.parse(src, "test", "<test>")?.render(data)
    }

    #[test]
    fn renders_text_and_lookup() {
        let out = render("Hello {{ name }}", json!({"name": "Jason"})).unwrap();
        assert_eq!(out, "Hello Jason");
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(render("{{ 1 + 2 }}", json!({})).unwrap(), "3");
        assert_eq!(render("{{ 7 - 2 * 3 }}", json!({})).unwrap(), "1");
        assert_eq!(render("{{ 7 / 2 }}", json!({})).unwrap(), "3");
        assert_eq!(render("{{ 7 // 2 }}", json!({})).unwrap(), "3");
        assert_eq!(render("{{ 7 % 2 }}", json!({})).unwrap(), "1");
    }

    #[test]
    fn mixed_numerics_coerce_to_float() {
        assert_eq!(render("{{ 7.0 / 2 }}", json!({})).unwrap(), "3.5");
        assert_eq!(render("{{ 1 + 0.5 }}", json!({})).unwrap(), "1.5");
        assert_eq!(render("{{ 7.5 // 2 }}", json!({})).unwrap(), "3");
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(render("{{ \"foo\" + \"bar\" }}", json!({})).unwrap(), "foobar");
        assert_eq!(
            render("{{ foo + \"bar\" }}", json!({"foo": "baz"})).unwrap(),
            "bazbar"
        );
    }

    #[test]
    fn string_subtraction_is_a_type_error() {
        let err = render("{{ \"a\" - \"b\" }}", json!({})).unwrap_err();
        assert!(err.to_string().contains("'-' not defined on string"));
    }

    #[test]
    fn incompatible_operands_are_a_type_error() {
        let err = render("{{ 1 + \"a\" }}", json!({})).unwrap_err();
        assert!(err
            .to_string()
            .contains("type error: int and string not compatible with +"));
    }

    #[test]
    fn integer_division_by_zero() {
        for src in ["{{ 1 / 0 }}", "{{ 1 // 0 }}", "{{ 1 % 0 }}"] {
            let err = render(src, json!({})).unwrap_err();
            assert!(err.to_string().contains("division by zero"), "{}", src);
        }
    }

    #[test]
    fn float_division_by_zero_is_ieee() {
        assert_eq!(render("{{ 1.0 / 0.0 }}", json!({})).unwrap(), "inf");
        assert_eq!(render("{{ -1.0 / 0.0 }}", json!({})).unwrap(), "-inf");
        assert_eq!(render("{{ 0.0 / 0.0 }}", json!({})).unwrap(), "NaN");
    }

    #[test]
    fn float_modulo_is_an_error() {
        let err = render("{{ 1.5 % 2.0 }}", json!({})).unwrap_err();
        assert!(err.to_string().contains("'%' not defined on float"));
    }

    #[test]
    fn unary_minus_on_variables() {
        assert_eq!(render("{{ -n }}", json!({"n": 4})).unwrap(), "-4");
        assert_eq!(render("{{ -n }}", json!({"n": 2.5})).unwrap(), "-2.5");
        let err = render("{{ -s }}", json!({"s": "x"})).unwrap_err();
        assert!(err.to_string().contains("unary '-' not defined on string"));
    }

    #[test]
    fn comparisons() {
        assert_eq!(render("{{ 1 < 2 }}", json!({})).unwrap(), "true");
        assert_eq!(render("{{ 2 <= 1 }}", json!({})).unwrap(), "false");
        assert_eq!(render("{{ 1 == 1.0 }}", json!({})).unwrap(), "true");
        assert_eq!(render("{{ 1 != 2 }}", json!({})).unwrap(), "true");
        assert_eq!(render("{{ \"a\" < \"b\" }}", json!({})).unwrap(), "true");
        let err = render("{{ 1 < \"a\" }}", json!({})).unwrap_err();
        assert!(err.to_string().contains("not comparable"));
    }

    #[test]
    fn logic_returns_the_deciding_operand() {
        assert_eq!(
            render("{{ missing or \"default\" }}", json!({})).unwrap(),
            "default"
        );
        assert_eq!(render("{{ 0 or 7 }}", json!({})).unwrap(), "7");
        assert_eq!(render("{{ 3 and 7 }}", json!({})).unwrap(), "7");
        assert_eq!(render("{{ 0 and 7 }}", json!({})).unwrap(), "0");
        assert_eq!(render("{{ not 0 }}", json!({})).unwrap(), "true");
    }

    #[test]
    fn logic_short_circuits_past_errors() {
        // rhs would divide by zero; short-circuit must skip it
        assert_eq!(render("{{ 1 or 1 / 0 }}", json!({})).unwrap(), "1");
        assert_eq!(render("{{ 0 and 1 / 0 }}", json!({})).unwrap(), "0");
    }

    #[test]
    fn if_uses_truthiness() {
        let src = "{% if v %}t{% else %}f{% endif %}";
        assert_eq!(render(src, json!({"v": true})).unwrap(), "t");
        assert_eq!(render(src, json!({"v": false})).unwrap(), "f");
        assert_eq!(render(src, json!({"v": 0})).unwrap(), "f");
        assert_eq!(render(src, json!({"v": ""})).unwrap(), "f");
        assert_eq!(render(src, json!({"v": []})).unwrap(), "f");
        assert_eq!(render(src, json!({"v": {}})).unwrap(), "f");
        assert_eq!(render(src, json!({"v": "x"})).unwrap(), "t");
    }

    #[test]
    fn elif_chain_takes_first_true_guard() {
        let src = "{% if a %}A{% elif b %}B{% elif c %}C{% else %}D{% endif %}";
        assert_eq!(render(src, json!({"b": true})).unwrap(), "B");
        assert_eq!(render(src, json!({"c": 1})).unwrap(), "C");
        assert_eq!(render(src, json!({})).unwrap(), "D");
    }

    #[test]
    fn for_over_list() {
        let out = render(
            "{% for item in items %}{{ item }},{% endfor %}",
            json!({"items": ["a", "b", "c"]}),
        )
        .unwrap();
        assert_eq!(out, "a,b,c,");
    }

    #[test]
    fn for_over_map_iterates_keys_in_insertion_order() {
        let out = render(
            "{% for key in config %}{{ key }};{% endfor %}",
            json!({"config": {"zeta": 1, "alpha": 2}}),
        )
        .unwrap();
        assert_eq!(out, "zeta;alpha;");
    }

    #[test]
    fn for_scope_is_popped_after_the_loop() {
        let out = render(
            "{% for item in items %}{{ item }}{% endfor %}{{ item }}",
            json!({"items": [1]}),
        )
        .unwrap();
        // permissive mode: the loop variable is gone afterwards
        assert_eq!(out, "1");
    }

    #[test]
    fn for_with_tuple_unpacking() {
        let out = render(
            "{% for (k, v) in pairs %}{{ k }}={{ v }};{% endfor %}",
            json!({"pairs": [["a", 1], ["b", 2]]}),
        )
        .unwrap();
        assert_eq!(out, "a=1;b=2;");
    }

    #[test]
    fn tuple_unpacking_arity_mismatch_is_an_error() {
        let err = render(
            "{% for (a, b) in pairs %}x{% endfor %}",
            json!({"pairs": [[1, 2, 3]]}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot unpack"));
    }

    #[test]
    fn iterating_a_scalar_is_a_type_error() {
        let err = render("{% for x in n %}x{% endfor %}", json!({"n": 5})).unwrap_err();
        assert!(err.to_string().contains("int is not iterable"));
    }

    #[test]
    fn set_binds_for_later_nodes() {
        let out = render("{% set x = 1 + 2 %}{{ x }}{{ x * 2 }}", json!({})).unwrap();
        assert_eq!(out, "36");
    }

    #[test]
    fn set_inside_for_is_scoped_to_the_iteration() {
        let out = render(
            "{% for i in items %}{% set double = i * 2 %}{{ double }}{% endfor %}{{ double }}",
            json!({"items": [1, 2]}),
        )
        .unwrap();
        assert_eq!(out, "24");
    }

    #[test]
    fn index_expressions() {
        assert_eq!(
            render("{{ items[1] }}", json!({"items": [10, 20]})).unwrap(),
            "20"
        );
        assert_eq!(
            render("{{ user[\"name\"] }}", json!({"user": {"name": "Ada"}})).unwrap(),
            "Ada"
        );
        assert_eq!(
            render("{{ user.name }}", json!({"user": {"name": "Ada"}})).unwrap(),
            "Ada"
        );
        assert_eq!(
            render("{{ {1: \"one\"}[1] }}", json!({})).unwrap(),
            "one"
        );
    }

    #[test]
    fn list_index_errors() {
        let err = render("{{ items[5] }}", json!({"items": [1]})).unwrap_err();
        assert!(err.to_string().contains("list index out of range: 5"));
        let err = render("{{ items[-1] }}", json!({"items": [1]})).unwrap_err();
        assert!(err.to_string().contains("list index out of range: -1"));
        let err = render("{{ items[\"a\"] }}", json!({"items": [1]})).unwrap_err();
        assert!(err.to_string().contains("list index must be int"));
    }

    #[test]
    fn indexing_a_scalar_is_a_type_error() {
        let err = render("{{ n[0] }}", json!({"n": 5})).unwrap_err();
        assert!(err.to_string().contains("cannot index int"));
    }

    #[test]
    fn missing_lookup_is_empty_in_permissive_mode() {
        assert_eq!(render("[{{ missing }}]", json!({})).unwrap(), "[]");
        assert_eq!(
            render("[{{ user[\"nope\"] }}]", json!({"user": {}})).unwrap(),
            "[]"
        );
    }

    #[test]
    fn missing_lookup_is_an_error_in_strict_mode() {
        let err = render_strict("{{ missing }}", json!({})).unwrap_err();
        assert!(err.to_string().contains("undefined variable 'missing'"));
        let err = render_strict("{{ user[\"nope\"] }}", json!({"user": {}})).unwrap_err();
        assert!(err.to_string().contains("undefined variable 'nope'"));
    }

    #[test]
    fn render_errors_carry_filename_and_line() {
        let err = render("line1\n{{ 1 / 0 }}", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "<test>:2: integer division by zero");
    }

    #[test]
    fn map_literal_renders_in_insertion_order() {
        let out = render("{{ {b: 1, a: 2} }}", json!({"b": "bee", "a": "ay"})).unwrap();
        assert_eq!(out, r#"{"bee": 1, "ay": 2}"#);
    }

    #[test]
    fn auto_escape_escapes_var_output_only() {
        let mut env = Environment::new();
        env.auto_escape = true;
        let template = env.parse("<b>{{ html }}</b>", "test", "<test>").unwrap();
        let out = template
            .render(json!({"html": "<script>alert('x')</script>"}))
            .unwrap();
        assert_eq!(out, "<b>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;</b>");
    }

    #[test]
    fn escape_covers_all_special_characters() {
        assert_eq!(escape("a & b"), "a &amp; b");
        assert_eq!(escape("<>\"'"), "&lt;&gt;&quot;&#39;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn context_must_be_a_map() {
        let err = render("{{ x }}", json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("render context must be a map"));
    }

    #[test]
    fn globals_are_visible_but_shadowed_by_context() {
        let mut env = Environment::new();
        env.globals
            .insert("site".to_string(), Value::Str("tsumugi".to_string()));
        env.globals
            .insert("name".to_string(), Value::Str("global".to_string()));
        let template = env
            .parse("{{ site }}/{{ name }}", "test", "<test>")
            .unwrap();
        let out = template.render(json!({"name": "local"})).unwrap();
        assert_eq!(out, "tsumugi/local");
    }
}
