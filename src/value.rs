use std::fmt;

use serde_json::Value as JsonValue;

/// Runtime value for template rendering.
///
/// Maps preserve insertion order and may be keyed by arbitrary values; they
/// are looked up by structural equality.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

/// Type tag used by coercion and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Int,
    Float,
    Str,
    Bool,
    List,
    Map,
    Null,
}

impl Kind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Int | Kind::Float)
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Str => "string",
            Kind::Bool => "bool",
            Kind::List => "list",
            Kind::Map => "map",
            Kind::Null => "null",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// Convert caller data into an engine value. JSON object order is kept
    /// as the map's insertion order.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            JsonValue::String(s) => Value::Str(s),
            JsonValue::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            JsonValue::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Str(_) => Kind::Str,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Numeric coercion; `None` for non-numeric values.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Python-compatible truthiness: `false`, null, numeric zero, and empty
    /// strings/lists/maps are false; everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(pairs) => !pairs.is_empty(),
        }
    }

    /// Structural equality with mixed-numeric coercion, used by `==`/`!=`
    /// and by map key lookup.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka.loose_eq(kb) && va.loose_eq(vb))
            }
            _ => self == other,
        }
    }

    /// Quoting form used inside rendered containers.
    fn write_repr(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_repr(f)?;
                }
                f.write_str("]")
            }
            Value::Map(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    key.write_repr(f)?;
                    f.write_str(": ")?;
                    value.write_repr(f)?;
                }
                f.write_str("}")
            }
            other => write!(f, "{}", other),
        }
    }
}

/// Default string form: base-10 integers, shortest round-trip floats,
/// `true`/`false`, strings verbatim, null as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => f.write_str(s),
            Value::List(_) | Value::Map(_) => self.write_repr(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_table() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(Value::Float(0.1).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Str("x".to_string()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::List(vec![Value::Null]).is_truthy());
        assert!(!Value::Map(vec![]).is_truthy());
        assert!(Value::Map(vec![(Value::Int(1), Value::Int(2))]).is_truthy());
    }

    #[test]
    fn loose_eq_coerces_mixed_numerics() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(!Value::Int(1).loose_eq(&Value::Float(1.5)));
        assert!(Value::Int(2).loose_eq(&Value::Int(2)));
        assert!(!Value::Int(1).loose_eq(&Value::Str("1".to_string())));
    }

    #[test]
    fn loose_eq_recurses_into_containers() {
        let a = Value::List(vec![Value::Int(1), Value::Float(2.0)]);
        let b = Value::List(vec![Value::Float(1.0), Value::Int(2)]);
        assert!(a.loose_eq(&b));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(2.0).to_string(), "2");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Str("plain".to_string()).to_string(), "plain");
    }

    #[test]
    fn containers_render_with_quoted_strings() {
        let list = Value::List(vec![Value::Int(1), Value::Str("a".to_string()), Value::Null]);
        assert_eq!(list.to_string(), r#"[1, "a", null]"#);
        let map = Value::Map(vec![(
            Value::Str("k".to_string()),
            Value::List(vec![Value::Bool(false)]),
        )]);
        assert_eq!(map.to_string(), r#"{"k": [false]}"#);
    }

    #[test]
    fn from_json_preserves_object_order() {
        let value = Value::from_json(json!({"zeta": 1, "alpha": 2, "mid": 3}));
        match value {
            Value::Map(pairs) => {
                let keys: Vec<_> = pairs.iter().map(|(k, _)| k.to_string()).collect();
                assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn from_json_numbers() {
        assert_eq!(Value::from_json(json!(7)), Value::Int(7));
        assert_eq!(Value::from_json(json!(-7)), Value::Int(-7));
        assert_eq!(Value::from_json(json!(2.5)), Value::Float(2.5));
        // beyond i64 range falls back to float
        assert_eq!(
            Value::from_json(json!(18446744073709551615u64)),
            Value::Float(18446744073709551615.0)
        );
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Str(String::new()).type_name(), "string");
        assert_eq!(Value::List(vec![]).type_name(), "list");
        assert!(Kind::Int.is_numeric());
        assert!(Kind::Float.is_numeric());
        assert!(!Kind::Str.is_numeric());
    }
}
