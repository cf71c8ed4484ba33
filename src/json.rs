//! JSON reading and writing.
//!
//! Tokenization and parsing are delegated to `serde_json` rather than
//! hand-rolled here, per the runtime's treatment of JSON as an out-of-scope
//! external collaborator -- the only thing this module owns is the
//! translation between JSON text and [`Value`], plus the guardrails the
//! source runtime wraps around the underlying parser: a cap on how large an
//! input it will accept, and an error split between "not valid JSON at all"
//! and "looks like a truncated prefix of valid JSON".

use crate::error::{ErrorKind, FilterxError};
use crate::message::RawField;
use crate::value::{FxResult, TypeTag, Value};

/// Refuses to parse an input whose token count would exceed this, the same
/// guardrail the source runtime applies before handing text to its JSON
/// parser, so a single oversized field can't make evaluation do unbounded
/// work.
pub const MAX_JSON_TOKENS: usize = 65536;

fn check_size(input: &str) -> FxResult<()> {
    let approx_tokens = input.bytes().filter(|b| !b.is_ascii_whitespace()).count();
    if approx_tokens > MAX_JSON_TOKENS {
        return Err(FilterxError::new(ErrorKind::Range, "JSON input is too large to parse"));
    }
    Ok(())
}

/// Parses a JSON document into a [`Value`], distinguishing outright-invalid
/// input from input that merely looks like an incomplete prefix of a valid
/// document (the two diagnostics the source runtime's JSON reader reports
/// separately).
pub fn parse(input: &str) -> FxResult<Value> {
    check_size(input)?;
    match serde_json::from_str::<serde_json::Value>(input) {
        Ok(json) => Ok(Value::from(&json)),
        Err(e) if e.is_eof() => {
            let excerpt = excerpt_around(input, input.len());
            Err(FilterxError::new(ErrorKind::Evaluation, "JSON input is incomplete").with_info(excerpt))
        }
        Err(e) => {
            let offset = byte_offset_of(input, e.line(), e.column());
            let excerpt = excerpt_around(input, offset);
            Err(FilterxError::new(ErrorKind::Evaluation, "JSON input is invalid").with_info(excerpt))
        }
    }
}

fn byte_offset_of(input: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, l) in input.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            return offset + column.saturating_sub(1);
        }
        offset += l.len();
    }
    input.len()
}

fn excerpt_around(input: &str, offset: usize) -> String {
    const RADIUS: usize = 24;
    let start = offset.saturating_sub(RADIUS);
    let end = (offset + RADIUS).min(input.len());
    let start = floor_char_boundary(input, start);
    let end = ceil_char_boundary(input, end);
    format!("...{}...", &input[start..end])
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Unmarshals a raw message field into a typed [`Value`], dispatching on the
/// field's wire type tag: scalars parse directly from their text buffer,
/// containers go through the JSON reader, and a raw, not-yet-typed
/// `Message` field is treated as JSON as well (the same fallback the source
/// runtime applies to an LTZ/JSON-typed name-value pair pulled cold off the
/// message).
pub fn value_from_raw_field(field: &RawField) -> FxResult<Value> {
    match field.type_tag {
        TypeTag::Null => Ok(Value::Null),
        TypeTag::Bool => parse_bool(&field.buffer),
        TypeTag::Int => field
            .buffer
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| FilterxError::new(ErrorKind::Type, "Field does not hold a valid int")),
        TypeTag::Double => field
            .buffer
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| FilterxError::new(ErrorKind::Type, "Field does not hold a valid double")),
        TypeTag::String => Ok(Value::string(field.buffer.as_str())),
        TypeTag::Bytes => decode_base64(&field.buffer).map(Value::bytes),
        TypeTag::Protobuf => decode_base64(&field.buffer).map(Value::Protobuf),
        TypeTag::List | TypeTag::Dict | TypeTag::Message => parse(&field.buffer),
    }
}

fn parse_bool(buffer: &str) -> FxResult<Value> {
    match buffer {
        "true" | "1" => Ok(Value::Bool(true)),
        "false" | "0" => Ok(Value::Bool(false)),
        _ => Err(FilterxError::new(ErrorKind::Type, "Field does not hold a valid bool")),
    }
}

fn decode_base64(buffer: &str) -> FxResult<std::rc::Rc<[u8]>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(buffer)
        .map(std::rc::Rc::from)
        .map_err(|_| FilterxError::new(ErrorKind::Type, "Field does not hold valid base64"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_objects_arrays_and_scalars() {
        let v = parse(r#"{"a": 1, "b": [true, null, "x"]}"#).unwrap();
        assert!(matches!(v, Value::Dict(_)));
        assert!(matches!(v.get_subscript_str("a").unwrap(), Some(Value::Int(1))));
        let b = v.get_subscript_str("b").unwrap().unwrap();
        assert_eq!(b.len().unwrap(), 3);
    }

    #[test]
    fn incomplete_input_is_distinguished_from_invalid_input() {
        let incomplete = parse(r#"{"a": "#).unwrap_err();
        assert_eq!(incomplete.message, "JSON input is incomplete");

        let invalid = parse(r#"{"a": ]}"#).unwrap_err();
        assert_eq!(invalid.message, "JSON input is invalid");
    }

    #[test]
    fn oversized_input_is_rejected_before_parsing() {
        let huge = "[".to_string() + &"1,".repeat(MAX_JSON_TOKENS) + "1]";
        let err = parse(&huge).unwrap_err();
        assert_eq!(err.message, "JSON input is too large to parse");
    }

    #[test]
    fn value_from_raw_field_dispatches_on_type_tag() {
        let int_field = RawField { buffer: "42".to_string(), type_tag: TypeTag::Int };
        assert!(matches!(value_from_raw_field(&int_field).unwrap(), Value::Int(42)));

        let bool_field = RawField { buffer: "1".to_string(), type_tag: TypeTag::Bool };
        assert!(matches!(value_from_raw_field(&bool_field).unwrap(), Value::Bool(true)));

        let bad_bool = RawField { buffer: "nope".to_string(), type_tag: TypeTag::Bool };
        assert!(value_from_raw_field(&bad_bool).is_err());
    }
}
