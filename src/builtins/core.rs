//! The core set of builtins: type introspection, string/repr conversion,
//! length, JSON (de)serialization, and dict flattening. Grounded on
//! `func-len.c`, `func-istype.c`, `func-repr.c`, `func-flatten.c`; `keys`/
//! `values` are grounded on `object-dict-interface.c`'s iteration contract
//! rather than a dedicated `func-*.c` file (the source exposes them as
//! dict-interface methods, not standalone functions).

use std::rc::Rc;

use crate::container::Container;
use crate::error::{ErrorKind, FilterxError};
use crate::function::{Arity, FunctionDef};
use crate::value::{FxResult, Value};

pub fn defs() -> Vec<FunctionDef> {
    vec![
        FunctionDef { name: "len", arity: Arity::Exact(1), param_names: &[], call: len },
        FunctionDef { name: "istype", arity: Arity::Exact(2), param_names: &[], call: istype },
        FunctionDef { name: "repr", arity: Arity::Exact(1), param_names: &[], call: repr },
        FunctionDef { name: "str", arity: Arity::Exact(1), param_names: &[], call: str_of },
        FunctionDef { name: "int", arity: Arity::Exact(1), param_names: &[], call: int_of },
        FunctionDef { name: "double", arity: Arity::Exact(1), param_names: &[], call: double_of },
        FunctionDef { name: "bool", arity: Arity::Exact(1), param_names: &[], call: bool_of },
        FunctionDef { name: "keys", arity: Arity::Exact(1), param_names: &[], call: keys },
        FunctionDef { name: "values", arity: Arity::Exact(1), param_names: &[], call: values },
        FunctionDef {
            name: "flatten",
            arity: Arity::Range(1, 2),
            param_names: &["dict", "separator"],
            call: flatten,
        },
        FunctionDef { name: "parse_json", arity: Arity::Exact(1), param_names: &[], call: parse_json },
        FunctionDef { name: "format_json", arity: Arity::Exact(1), param_names: &[], call: format_json },
    ]
}

fn len(args: &[Value]) -> FxResult<Value> {
    Ok(Value::Int(args[0].len()? as i64))
}

fn istype(args: &[Value]) -> FxResult<Value> {
    let Value::Str(type_name) = &args[1] else {
        return Err(FilterxError::new(ErrorKind::Argument, "istype() second argument must be a string"));
    };
    Ok(Value::Bool(args[0].type_name() == type_name.as_ref()))
}

fn repr(args: &[Value]) -> FxResult<Value> {
    Ok(Value::string(args[0].repr()))
}

fn str_of(args: &[Value]) -> FxResult<Value> {
    Ok(Value::string(args[0].str_repr()))
}

fn int_of(args: &[Value]) -> FxResult<Value> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Double(d) => Ok(Value::Int(*d as i64)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| FilterxError::new(ErrorKind::Type, "Cannot convert string to int").with_object(args[0].clone())),
        other => Err(FilterxError::new(ErrorKind::Type, "Cannot convert value to int").with_object(other.clone())),
    }
}

fn double_of(args: &[Value]) -> FxResult<Value> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Double(*i as f64)),
        Value::Double(d) => Ok(Value::Double(*d)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| FilterxError::new(ErrorKind::Type, "Cannot convert string to double").with_object(args[0].clone())),
        other => Err(FilterxError::new(ErrorKind::Type, "Cannot convert value to double").with_object(other.clone())),
    }
}

fn bool_of(args: &[Value]) -> FxResult<Value> {
    Ok(Value::Bool(args[0].truthy()))
}

fn keys(args: &[Value]) -> FxResult<Value> {
    let Value::Dict(xref) = &args[0] else {
        return Err(FilterxError::new(ErrorKind::Type, "keys() requires a dict"));
    };
    let out = xref.with_container(|c| match c {
        Container::Dict(map) => map.keys().map(|k| Value::string(Rc::clone(k))).collect(),
        _ => unreachable!(),
    });
    Ok(Value::list(out))
}

fn values(args: &[Value]) -> FxResult<Value> {
    let Value::Dict(xref) = &args[0] else {
        return Err(FilterxError::new(ErrorKind::Type, "values() requires a dict"));
    };
    let out = xref.with_container(|c| match c {
        Container::Dict(map) => map.values().cloned().collect(),
        _ => unreachable!(),
    });
    Ok(Value::list(out))
}

/// Flattens nested dict values into the top-level dict in place, joining key
/// paths with `separator` (default `.`). A dict-valued key at the top level
/// is removed and replaced by its (recursively flattened) leaves; a
/// non-dict top-level value is left exactly where it is. Grounded on
/// `func-flatten.c`'s `_flatten`/`_collect_modifications_from_elem`, with
/// one simplification: the source joins a generic `repr()` of each key
/// (keys need not be strings there), while this crate's dict keys are
/// always strings, so the raw key text is used directly instead of a
/// quoted repr.
fn flatten(args: &[Value]) -> FxResult<Value> {
    if !matches!(&args[0], Value::Dict(_)) {
        return Err(FilterxError::new(ErrorKind::Type, "flatten() requires a dict").with_object(args[0].clone()));
    }
    let separator = match args.get(1) {
        Some(Value::Str(s)) => s.to_string(),
        Some(other) => {
            return Err(FilterxError::new(ErrorKind::Argument, "flatten() separator must be a string").with_object(other.clone()))
        }
        None => ".".to_string(),
    };

    let dict = args[0].clone();
    let mut collected = Vec::new();
    let mut top_level_dict_keys = Vec::new();
    collect_flattened(&dict, &separator, &mut String::new(), true, &mut collected, &mut top_level_dict_keys)?;

    for key in &top_level_dict_keys {
        dict.unset_key_str(key)?;
    }
    for (key, value) in collected {
        dict.set_subscript_str(&key, value)?;
    }

    Ok(Value::Bool(true))
}

fn collect_flattened(
    dict: &Value,
    separator: &str,
    prefix: &mut String,
    is_top_level: bool,
    collected: &mut Vec<(String, Value)>,
    top_level_dict_keys: &mut Vec<String>,
) -> FxResult<()> {
    let Value::Dict(xref) = dict else { unreachable!() };
    let entries = xref.with_container(|c| match c {
        Container::Dict(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>(),
        _ => unreachable!(),
    });

    for (key, value) in entries {
        if matches!(&value, Value::Dict(_)) {
            if is_top_level {
                top_level_dict_keys.push(key.to_string());
            }
            let orig_len = prefix.len();
            prefix.push_str(&key);
            prefix.push_str(separator);
            collect_flattened(&value, separator, prefix, false, collected, top_level_dict_keys)?;
            prefix.truncate(orig_len);
        } else if !is_top_level {
            let orig_len = prefix.len();
            prefix.push_str(&key);
            collected.push((prefix.clone(), value));
            prefix.truncate(orig_len);
        }
    }
    Ok(())
}

fn parse_json(args: &[Value]) -> FxResult<Value> {
    let Value::Str(s) = &args[0] else {
        return Err(FilterxError::new(ErrorKind::Type, "parse_json() requires a string"));
    };
    crate::json::parse(s)
}

fn format_json(args: &[Value]) -> FxResult<Value> {
    Ok(Value::string(args[0].format_json()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: Vec<(&str, Value)>) -> Value {
        let mut map = crate::container::DictMap::default();
        for (k, v) in entries {
            map.insert(Rc::from(k), v);
        }
        Value::dict(map)
    }

    #[test]
    fn flatten_joins_nested_dict_keys_and_leaves_top_level_leaves_in_place() {
        let nested = dict(vec![("c", Value::Int(1)), ("d", Value::Int(2))]);
        let top = dict(vec![("a", Value::Int(0)), ("b", nested)]);

        let result = flatten(&[top.clone()]).unwrap();
        assert!(matches!(result, Value::Bool(true)));

        assert!(matches!(top.get_subscript_str("a").unwrap(), Some(Value::Int(0))));
        assert!(top.get_subscript_str("b").unwrap().is_none(), "the dict-valued top-level key is removed");
        assert!(matches!(top.get_subscript_str("b.c").unwrap(), Some(Value::Int(1))));
        assert!(matches!(top.get_subscript_str("b.d").unwrap(), Some(Value::Int(2))));
    }

    #[test]
    fn flatten_accepts_a_custom_separator() {
        let nested = dict(vec![("c", Value::Int(1))]);
        let top = dict(vec![("b", nested)]);

        flatten(&[top.clone(), Value::string("/")]).unwrap();
        assert!(matches!(top.get_subscript_str("b/c").unwrap(), Some(Value::Int(1))));
    }

    #[test]
    fn flatten_rejects_non_dict_input() {
        assert!(flatten(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn len_saturates_and_istype_matches_type_name() {
        assert!(matches!(len(&[Value::string("hi")]).unwrap(), Value::Int(2)));
        assert!(matches!(istype(&[Value::Int(1), Value::string("int")]).unwrap(), Value::Bool(true)));
        assert!(matches!(istype(&[Value::Int(1), Value::string("string")]).unwrap(), Value::Bool(false)));
    }

    #[test]
    fn int_of_and_double_of_parse_trimmed_strings() {
        assert!(matches!(int_of(&[Value::string(" 42 ")]).unwrap(), Value::Int(42)));
        assert!(matches!(double_of(&[Value::string(" 1.5 ")]).unwrap(), Value::Double(d) if d == 1.5));
        assert!(int_of(&[Value::string("nope")]).is_err());
    }

    #[test]
    fn keys_and_values_preserve_insertion_order() {
        let d = dict(vec![("z", Value::Int(1)), ("a", Value::Int(2))]);
        let keys_list = keys(&[d.clone()]).unwrap();
        let Value::List(xref) = &keys_list else { panic!("expected list") };
        let first_key = xref.with_container(|c| match c {
            Container::List(items) => items[0].clone(),
            _ => unreachable!(),
        });
        assert!(matches!(first_key, Value::Str(s) if s.as_ref() == "z"));
    }
}
