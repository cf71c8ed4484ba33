//! The value object model: the closed set of types a FilterX expression can
//! produce, plus the operation contract every one of them answers to.
//!
//! Unlike the source runtime, which dispatches through a per-type virtual
//! method table resolved by walking a type hierarchy, this is modeled as a
//! single enum with the closed set of builtin kinds dispatched by match, per
//! the "tagged union for the closed builtin set" option this design
//! intentionally takes: there is no plugin mechanism for third-party value
//! types in this runtime, so a vtable buys nothing a `match` doesn't already
//! give us, and it buys exhaustiveness checking besides.
//!
//! Immutable scalars (`Null`, `Bool`, `Int`, `Double`) are `Copy` and need no
//! reference counting at all. Immutable heap values (`Str`, `Bytes`,
//! `Protobuf`) are `Rc`-backed and share structure freely since nothing can
//! ever observe a mutation through them. The two mutable container kinds
//! (`List`, `Dict`) hold an [`XRef`](crate::container::XRef), which is where
//! all of the copy-on-write bookkeeping lives.

use std::fmt;
use std::rc::Rc;

use crate::container::{Container, XRef};
use crate::error::{ErrorKind, FilterxError};

pub type FxResult<T> = Result<T, FilterxError>;

/// The wire-level type tag a value marshals to, mirroring the host message's
/// own value-type enumeration. Used both for marshal/sync and for the
/// `istype()` builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TypeTag {
    Null,
    Bool,
    Int,
    Double,
    String,
    Bytes,
    Protobuf,
    List,
    Dict,
    /// A value pulled straight out of the host message, not yet unmarshalled
    /// into one of the typed kinds above.
    Message,
}

/// The closed set of runtime value kinds.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Protobuf(Rc<[u8]>),
    List(XRef),
    Dict(XRef),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn bytes(b: impl Into<Rc<[u8]>>) -> Value {
        Value::Bytes(b.into())
    }

    pub fn list(container: Vec<Value>) -> Value {
        Value::List(XRef::new(Container::List(container)))
    }

    pub fn dict(container: crate::container::DictMap) -> Value {
        Value::Dict(XRef::new(Container::Dict(container)))
    }

    pub fn empty_list() -> Value {
        Value::list(Vec::new())
    }

    pub fn empty_dict() -> Value {
        Value::dict(crate::container::DictMap::default())
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Double(_) => TypeTag::Double,
            Value::Str(_) => TypeTag::String,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::Protobuf(_) => TypeTag::Protobuf,
            Value::List(_) => TypeTag::List,
            Value::Dict(_) => TypeTag::Dict,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.type_tag() {
            TypeTag::Null => "null",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Double => "double",
            TypeTag::String => "string",
            TypeTag::Bytes => "bytes",
            TypeTag::Protobuf => "protobuf",
            TypeTag::List => "list",
            TypeTag::Dict => "dict",
            TypeTag::Message => "message_value",
        }
    }

    pub fn is_mutable_container(&self) -> bool {
        matches!(self, Value::List(_) | Value::Dict(_))
    }

    /// Truthiness used by conditionals, `and`/`or`, and `not`.
    ///
    /// Zero, empty strings/bytes, empty containers, `null` and `false` are
    /// falsy; everything else, including `NaN`, is truthy (this runtime
    /// follows the common scripting-language convention of only treating
    /// `NaN` as a distinct *comparison* oddity, not as a falsy value).
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Double(d) => *d != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) | Value::Protobuf(b) => !b.is_empty(),
            Value::List(xref) => xref.with_container(|c| match c {
                Container::List(v) => !v.is_empty(),
                _ => unreachable!(),
            }),
            Value::Dict(xref) => xref.with_container(|c| match c {
                Container::Dict(m) => !m.is_empty(),
                _ => unreachable!(),
            }),
        }
    }

    /// Clone-for-store semantics used whenever a value is about to be
    /// assigned somewhere new: a no-op for immutable kinds, and a
    /// fresh-floating-xref fork for mutable containers (see
    /// [`XRef::fork_for_store`]).
    pub fn clone_for_store(&self) -> Value {
        match self {
            Value::List(xref) => Value::List(xref.fork_for_store()),
            Value::Dict(xref) => Value::Dict(xref.fork_for_store()),
            other => other.clone(),
        }
    }

    pub fn deep_clone(&self) -> Value {
        match self {
            Value::List(xref) => Value::List(xref.deep_clone()),
            Value::Dict(xref) => Value::Dict(xref.deep_clone()),
            other => other.clone(),
        }
    }

    /// Human-readable representation used for error messages and the
    /// `repr()` builtin. Strings are quoted, bytes/protobuf are hex-encoded.
    pub fn repr(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Double(d) => format_double(*d),
            Value::Str(s) => format!("{:?}", s.as_ref()),
            Value::Bytes(b) => format!("bytes(\"{}\")", hex::encode(b.as_ref())),
            Value::Protobuf(b) => format!("protobuf(\"{}\")", hex::encode(b.as_ref())),
            Value::List(xref) => xref.with_container(|c| match c {
                Container::List(items) => {
                    let inner = items.iter().map(Value::repr).collect::<Vec<_>>().join(", ");
                    format!("[{inner}]")
                }
                _ => unreachable!(),
            }),
            Value::Dict(xref) => xref.with_container(|c| match c {
                Container::Dict(map) => {
                    let inner = map
                        .iter()
                        .map(|(k, v)| format!("{:?}: {}", k.as_ref(), v.repr()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{{{inner}}}")
                }
                _ => unreachable!(),
            }),
        }
    }

    /// Plain string conversion (as opposed to `repr`, strings are not
    /// re-quoted and bytes are emitted raw-lossy rather than hex).
    pub fn str_repr(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Bytes(b) | Value::Protobuf(b) => String::from_utf8_lossy(b).into_owned(),
            other => other.repr(),
        }
    }

    pub fn len(&self) -> FxResult<u64> {
        match self {
            Value::Str(s) => Ok(s.chars().count() as u64),
            Value::Bytes(b) | Value::Protobuf(b) => Ok(b.len() as u64),
            Value::List(xref) => Ok(xref.with_container(|c| match c {
                Container::List(v) => v.len() as u64,
                _ => unreachable!(),
            })),
            Value::Dict(xref) => Ok(xref.with_container(|c| match c {
                Container::Dict(m) => m.len() as u64,
                _ => unreachable!(),
            })),
            _ => Err(FilterxError::new(ErrorKind::Type, "Object has no length").with_object(self.clone())),
        }
    }

    /// Numeric `+` with int/double coercion: int+int stays int; any
    /// operand being a double promotes the result to double. Strings
    /// concatenate. Lists concatenate. Anything else is a type error.
    pub fn add(&self, rhs: &Value) -> FxResult<Value> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (Value::Int(a), Value::Double(b)) => Ok(Value::Double(*a as f64 + b)),
            (Value::Double(a), Value::Int(b)) => Ok(Value::Double(a + *b as f64)),
            (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::string(format!("{a}{b}"))),
            (Value::Bytes(a), Value::Bytes(b)) => {
                let mut v = a.to_vec();
                v.extend_from_slice(b);
                Ok(Value::bytes(v))
            }
            (Value::List(a), Value::List(b)) => {
                let merged = a.with_container(|ca| match ca {
                    Container::List(va) => b.with_container(|cb| match cb {
                        Container::List(vb) => {
                            let mut out = va.clone();
                            out.extend(vb.iter().cloned());
                            out
                        }
                        _ => unreachable!(),
                    }),
                    _ => unreachable!(),
                });
                Ok(Value::list(merged))
            }
            _ => Err(FilterxError::new(ErrorKind::Type, "Object does not support addition").with_object(self.clone())),
        }
    }

    /// Dict-only `merge`, used by plus-assign on `dict += dict` and by the
    /// append-mode deep-path assignment helper (`dpath(...)+= {...}`).
    pub fn merge_dict(&self, rhs: &Value) -> FxResult<()> {
        let (Value::Dict(a), Value::Dict(b)) = (self, rhs) else {
            return Err(FilterxError::new(ErrorKind::Type, "merge() requires two dicts"));
        };
        a.cow_touch()?;
        let entries = b.with_container(|c| match c {
            Container::Dict(m) => m.clone(),
            _ => unreachable!(),
        });
        a.with_container_mut(|c| match c {
            Container::Dict(m) => {
                for (k, v) in entries {
                    m.insert(k, v.clone_for_store());
                }
            }
            _ => unreachable!(),
        });
        Ok(())
    }

    /// The value `+=` combines `self` (the current value of an lvalue) with
    /// `addend` into: a dict-merge when both sides are dicts, plain `add`
    /// otherwise. Shared by every lvalue kind's `+=` dispatch so the merge-
    /// vs-add choice lives in one place.
    pub fn combine_for_plus_assign(&self, addend: &Value) -> FxResult<Value> {
        if let (Value::Dict(_), Value::Dict(_)) = (self, addend) {
            self.merge_dict(addend)?;
            return Ok(self.clone());
        }
        self.add(addend)
    }

    pub fn getattr(&self, name: &str) -> FxResult<Option<Value>> {
        self.get_subscript_str(name)
    }

    pub fn get_subscript_str(&self, key: &str) -> FxResult<Option<Value>> {
        match self {
            Value::Dict(xref) => {
                let found = xref.with_container(|c| match c {
                    Container::Dict(m) => m.get(key).cloned(),
                    _ => unreachable!(),
                });
                Ok(found.map(|v| replace_shared_xref(v, xref)))
            }
            _ => Err(FilterxError::new(ErrorKind::Type, "Object is not a dict").with_object(self.clone())),
        }
    }

    pub fn get_subscript_index(&self, index: i64) -> FxResult<Option<Value>> {
        match self {
            Value::List(xref) => {
                let found = xref.with_container(|c| match c {
                    Container::List(v) => normalize_index(index, v.len()).and_then(|i| v.get(i).cloned()),
                    _ => unreachable!(),
                });
                Ok(found.map(|v| replace_shared_xref(v, xref)))
            }
            _ => Err(FilterxError::new(ErrorKind::Type, "Object is not a list").with_object(self.clone())),
        }
    }

    pub fn set_subscript_str(&self, key: &str, value: Value) -> FxResult<()> {
        match self {
            Value::Dict(xref) => {
                if xref.is_readonly() {
                    return Err(FilterxError::new(ErrorKind::Readonly, "Object is readonly"));
                }
                xref.cow_touch()?;
                let stored = value.clone_for_store();
                if let Value::List(c) | Value::Dict(c) = &stored {
                    c.ground_in(xref);
                }
                xref.with_container_mut(|c| match c {
                    Container::Dict(m) => {
                        m.insert(Rc::from(key), stored);
                    }
                    _ => unreachable!(),
                });
                Ok(())
            }
            _ => Err(FilterxError::new(ErrorKind::Type, "Object is not a dict").with_object(self.clone())),
        }
    }

    pub fn set_subscript_index(&self, index: i64, value: Value) -> FxResult<()> {
        match self {
            Value::List(xref) => {
                if xref.is_readonly() {
                    return Err(FilterxError::new(ErrorKind::Readonly, "Object is readonly"));
                }
                xref.cow_touch()?;
                let stored = value.clone_for_store();
                if let Value::List(c) | Value::Dict(c) = &stored {
                    c.ground_in(xref);
                }
                xref.with_container_mut(|c| match c {
                    Container::List(v) => {
                        let len = v.len();
                        match normalize_index(index, len) {
                            Some(i) => {
                                v[i] = stored;
                                Ok(())
                            }
                            None if index == len as i64 => {
                                v.push(stored);
                                Ok(())
                            }
                            None => Err(FilterxError::new(ErrorKind::Range, "Index is out of range")),
                        }
                    }
                    _ => unreachable!(),
                })
            }
            _ => Err(FilterxError::new(ErrorKind::Type, "Object is not a list").with_object(self.clone())),
        }
    }

    pub fn is_key_set_str(&self, key: &str) -> FxResult<bool> {
        match self {
            Value::Dict(xref) => Ok(xref.with_container(|c| match c {
                Container::Dict(m) => m.contains_key(key),
                _ => unreachable!(),
            })),
            _ => Err(FilterxError::new(ErrorKind::Type, "Object is not a dict").with_object(self.clone())),
        }
    }

    pub fn unset_key_str(&self, key: &str) -> FxResult<()> {
        match self {
            Value::Dict(xref) => {
                xref.cow_touch()?;
                xref.with_container_mut(|c| match c {
                    Container::Dict(m) => {
                        m.shift_remove(key);
                    }
                    _ => unreachable!(),
                });
                Ok(())
            }
            _ => Err(FilterxError::new(ErrorKind::Type, "Object is not a dict").with_object(self.clone())),
        }
    }

    /// Moves the value stored at `key` out of `self`, leaving the key unset.
    /// Used by the `move()`/`unset()` generic functions, which must observe
    /// the value without incurring a copy-for-store fork.
    pub fn move_key_str(&self, key: &str) -> FxResult<Option<Value>> {
        match self {
            Value::Dict(xref) => {
                xref.cow_touch()?;
                Ok(xref.with_container_mut(|c| match c {
                    Container::Dict(m) => m.shift_remove(key),
                    _ => unreachable!(),
                }))
            }
            _ => Err(FilterxError::new(ErrorKind::Type, "Object is not a dict").with_object(self.clone())),
        }
    }

    /// Marshals this value to its wire representation, the pair the host
    /// message actually stores on sync: a UTF-8 buffer plus a type tag.
    pub fn marshal(&self) -> (String, TypeTag) {
        match self {
            Value::Null => (String::new(), TypeTag::Null),
            Value::Bool(b) => (b.to_string(), TypeTag::Bool),
            Value::Int(i) => (i.to_string(), TypeTag::Int),
            Value::Double(d) => (format_double(*d), TypeTag::Double),
            Value::Str(s) => (s.to_string(), TypeTag::String),
            Value::Bytes(b) => (base64_encode(b), TypeTag::Bytes),
            Value::Protobuf(b) => (base64_encode(b), TypeTag::Protobuf),
            Value::List(_) | Value::Dict(_) => (self.format_json(), TypeTag::String),
        }
    }

    /// Renders this value as JSON text, the format used both for
    /// `format_json()` output and for marshalling containers back to the
    /// host message.
    pub fn format_json(&self) -> String {
        json_value_of(self).to_string()
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Grounded on `double_repr`: `NaN`/`Infinity`/`-Infinity` spelled out
/// rather than the lowercase `nan`/`inf` a raw float formatter would
/// produce, and a finite value always keeps a visible fractional part.
pub(crate) fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else {
        let mut buf = ryu::Buffer::new();
        let formatted = buf.format(d);
        if formatted.contains('.') || formatted.contains('e') {
            formatted.to_string()
        } else {
            format!("{formatted}.0")
        }
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    if i >= 0 && i < len { Some(i as usize) } else { None }
}

/// Applies the "don't let a shared child xref escape un-floated" protocol on
/// read: if `container` is itself shared, or this value's own xref isn't
/// already at home in `container`, a fresh floating wrapper is handed back
/// instead of the stored handle.
fn replace_shared_xref(value: Value, container: &XRef) -> Value {
    match value {
        Value::List(xref) => Value::List(xref.read_through(container)),
        Value::Dict(xref) => Value::Dict(xref.read_through(container)),
        other => other,
    }
}

fn json_value_of(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.to_string()),
        Value::Bytes(b) => serde_json::Value::String(base64_encode(b)),
        Value::Protobuf(b) => serde_json::Value::String(base64_encode(b)),
        Value::List(xref) => xref.with_container(|c| match c {
            Container::List(items) => serde_json::Value::Array(items.iter().map(json_value_of).collect()),
            _ => unreachable!(),
        }),
        Value::Dict(xref) => xref.with_container(|c| match c {
            Container::Dict(map) => {
                serde_json::Value::Object(map.iter().map(|(k, v)| (k.to_string(), json_value_of(v))).collect())
            }
            _ => unreachable!(),
        }),
    }
}

impl From<&serde_json::Value> for Value {
    fn from(j: &serde_json::Value) -> Self {
        match j {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::string(s.as_str()),
            serde_json::Value::Array(items) => Value::list(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                let mut out = crate::container::DictMap::default();
                for (k, v) in map {
                    out.insert(Rc::from(k.as_str()), Value::from(v));
                }
                Value::dict(out)
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.repr())
    }
}

/// Type-and-value equality, used by `==`, `switch`, and dict/list membership
/// checks. Numbers compare across int/double after coercion; everything
/// else must match by type first.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Double(x), Value::Double(y)) => x == y,
        (Value::Int(x), Value::Double(y)) | (Value::Double(y), Value::Int(x)) => *x as f64 == *y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Protobuf(x), Value::Protobuf(y)) => x == y,
        (Value::List(x), Value::List(y)) => x.with_container(|cx| match cx {
            Container::List(vx) => y.with_container(|cy| match cy {
                Container::List(vy) => vx.len() == vy.len() && vx.iter().zip(vy.iter()).all(|(a, b)| values_equal(a, b)),
                _ => unreachable!(),
            }),
            _ => unreachable!(),
        }),
        (Value::Dict(x), Value::Dict(y)) => x.with_container(|cx| match cx {
            Container::Dict(mx) => y.with_container(|cy| match cy {
                Container::Dict(my) => {
                    mx.len() == my.len() && mx.iter().all(|(k, v)| my.get(k.as_ref()).is_some_and(|v2| values_equal(v, v2)))
                }
                _ => unreachable!(),
            }),
            _ => unreachable!(),
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn format_double_matches_double_repr_conventions() {
        assert_eq!(format_double(f64::NAN), "NaN");
        assert_eq!(format_double(f64::INFINITY), "Infinity");
        assert_eq!(format_double(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_double(7.0), "7.0");
        assert_eq!(format_double(-3.0), "-3.0");
        assert_eq!(format_double(1.5), "1.5");
    }

    #[test]
    fn truthy_excludes_nan() {
        assert!(Value::Double(f64::NAN).truthy(), "NaN is a distinct comparison oddity, not falsy");
        assert!(!Value::Double(0.0).truthy());
        assert!(!Value::Null.truthy());
        assert!(!Value::empty_list().truthy());
        assert!(!Value::empty_dict().truthy());
        assert!(!Value::string("").truthy());
    }

    #[test]
    fn values_equal_coerces_int_and_double() {
        assert!(values_equal(&Value::Int(3), &Value::Double(3.0)));
        assert!(!values_equal(&Value::Int(3), &Value::Double(3.1)));
        assert!(!values_equal(&Value::Int(1), &Value::Bool(true)));
    }

    #[test]
    fn clone_for_store_forks_mutable_containers_independently() {
        let original = Value::list(vec![Value::Int(1)]);
        let stored = original.clone_for_store();

        if let Value::List(xref) = &stored {
            xref.cow_touch().unwrap();
            xref.with_container_mut(|c| {
                if let Container::List(v) = c {
                    v.push(Value::Int(2));
                }
            });
        }

        assert_eq!(original.len().unwrap(), 1);
        assert_eq!(stored.len().unwrap(), 2);
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let mut map = crate::container::DictMap::new();
        map.insert(Rc::from("a"), Value::Int(1));
        map.insert(Rc::from("b"), Value::list(vec![Value::Bool(true), Value::Null]));
        let dict = Value::dict(map);

        let json = dict.format_json();
        let parsed = crate::json::parse(&json).unwrap();
        assert_eq!(parsed.format_json(), json);
    }

    #[test]
    fn repr_quotes_strings_and_hex_encodes_bytes() {
        assert_eq!(Value::string("hi").repr(), "\"hi\"");
        assert_eq!(Value::bytes(vec![0xde, 0xad]).repr(), "bytes(\"dead\")");
    }
}
