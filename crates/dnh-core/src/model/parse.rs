// ── Parameter definition parsing ──
//
// Turns a JSON definition object into a typed `Value`. The error strings
// are sent verbatim to clients, so they stay stable.

use serde_json::Value as Json;

use super::data_type::DataType;
use super::value::{Slots, Value, ValueKind};

/// Parse one parameter definition.
pub fn parse_definition(js: &Json) -> Result<Value, String> {
    let Some(obj) = js.as_object() else {
        return Err("Attempting to parse Param that is not an object.".into());
    };

    let Some(id) = obj.get("id").and_then(Json::as_str) else {
        return Err("Encountered Param missing id.".into());
    };

    let Some(type_name) = obj.get("type").and_then(Json::as_str) else {
        return Err(format!("Encountered {id} Param missing type."));
    };

    let Some(data_type) = DataType::from_wire(type_name) else {
        return Err(format!("Encounter {id} Param with unknown data type."));
    };

    let kind = match data_type {
        DataType::Int => {
            let slots = read_slots(js, read_int)
                .ok_or_else(|| format!("Param int {id}, must contain either a default or current value."))?;
            ValueKind::Int(slots.with_range(read_int(js.get("min")), read_int(js.get("max"))))
        }
        DataType::Float => {
            let slots = read_slots(js, read_float)
                .ok_or_else(|| format!("Param float {id}, must have either a default or current value."))?;
            ValueKind::Float(slots.with_range(read_float(js.get("min")), read_float(js.get("max"))))
        }
        DataType::Bool => ValueKind::Bool(
            read_slots(js, read_bool)
                .ok_or_else(|| format!("Param bool {id} must have either a current or default value."))?,
        ),
        DataType::String => ValueKind::String(
            read_slots(js, read_string)
                .ok_or_else(|| format!("Param string {id}, must have either a default or current value."))?,
        ),
        DataType::Enum => {
            let slots = read_slots(js, read_string)
                .ok_or_else(|| format!("Param enum {id}, must have either a default or current value."))?;
            let possible = match obj.get("possible") {
                None => return Err(format!("Param enum {id} is missing the possible values set")),
                Some(Json::Array(entries)) => entries
                    .iter()
                    .filter_map(Json::as_str)
                    .map(str::to_owned)
                    .collect(),
                Some(_) => {
                    return Err(format!("Param enum {id}, possible values must be an array."));
                }
            };
            ValueKind::Enum { slots, possible }
        }
        DataType::Event => ValueKind::Event {
            trigger_on_reset: read_bool(js.get("default")).unwrap_or(false),
            trigger_on_failsafe: read_bool(js.get("fail")).unwrap_or(false),
        },
    };

    let mut value = Value::new(id, kind);
    if let Some(label) = obj.get("label").and_then(Json::as_str) {
        value = value.with_label(label);
    }
    if let Some(category) = obj.get("category").and_then(Json::as_str) {
        value = value.with_category(category);
    }
    if let Some(unit) = obj.get("unit").and_then(Json::as_str) {
        value = value.with_unit(unit);
    }
    Ok(value)
}

/// Read current/default/fail. A missing current is taken from default;
/// `None` when neither is present.
fn read_slots<T: Clone>(js: &Json, read: fn(Option<&Json>) -> Option<T>) -> Option<Slots<T>> {
    let default = read(js.get("default"));
    let current = read(js.get("current")).or_else(|| default.clone())?;
    Some(
        Slots::new(current)
            .with_default(default)
            .with_fail(read(js.get("fail"))),
    )
}

fn read_int(js: Option<&Json>) -> Option<i64> {
    js?.as_i64()
}

fn read_float(js: Option<&Json>) -> Option<f64> {
    js?.as_f64()
}

fn read_bool(js: Option<&Json>) -> Option<bool> {
    match js? {
        Json::Bool(b) => Some(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Some(i != 0),
            None => n.as_f64().map(|f| f != 0.0),
        },
        _ => None,
    }
}

fn read_string(js: Option<&Json>) -> Option<String> {
    js?.as_str().map(str::to_owned)
}
