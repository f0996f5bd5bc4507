// ── Typed parameter values ──
//
// A `Value` is one introspectable parameter. Its kind is a closed sum
// type; each variant carries only the slots its data type supports, and
// every setter, getter and wire encoder dispatches on that tag.

use serde_json::{Map, Value as Json};

use super::data_type::{DataType, SetOutcome, Slot};
use super::raw::{RawValue, bool_to_text, parse_float_prefix, parse_int_prefix, text_to_bool};

/// Stored when an enum is built with an empty allowed-value set.
pub const ENUM_EMPTY_SENTINEL: &str = "!Error_Empty";

// ── Slots ────────────────────────────────────────────────────────────

/// Slot storage shared by every non-event kind.
///
/// `min`/`max` are only ever populated for numeric kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct Slots<T> {
    pub current: T,
    pub default: Option<T>,
    pub fail: Option<T>,
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: Clone> Slots<T> {
    pub fn new(current: T) -> Self {
        Self {
            current,
            default: None,
            fail: None,
            min: None,
            max: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Option<T>) -> Self {
        self.default = default;
        self
    }

    #[must_use]
    pub fn with_fail(mut self, fail: Option<T>) -> Self {
        self.fail = fail;
        self
    }

    #[must_use]
    pub fn with_range(mut self, min: Option<T>, max: Option<T>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    fn get(&self, slot: Slot) -> Option<&T> {
        match slot {
            Slot::Current => Some(&self.current),
            Slot::Default => self.default.as_ref(),
            Slot::Fail => self.fail.as_ref(),
            Slot::Min => self.min.as_ref(),
            Slot::Max => self.max.as_ref(),
        }
    }

    fn put(&mut self, slot: Slot, value: T, ranged: bool) -> SetOutcome {
        match slot {
            Slot::Current => self.current = value,
            Slot::Default => self.default = Some(value),
            Slot::Fail => self.fail = Some(value),
            Slot::Min if ranged => self.min = Some(value),
            Slot::Max if ranged => self.max = Some(value),
            Slot::Min | Slot::Max => return SetOutcome::Invalid,
        }
        SetOutcome::Success
    }

    fn reset(&mut self) -> SetOutcome {
        match &self.default {
            Some(default) => {
                self.current = default.clone();
                SetOutcome::Success
            }
            None => SetOutcome::Invalid,
        }
    }
}

// ── ValueKind ────────────────────────────────────────────────────────

/// Type-specific payload of a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Bool(Slots<bool>),
    Int(Slots<i64>),
    Float(Slots<f64>),
    String(Slots<String>),
    /// A string restricted to `possible`.
    Enum {
        slots: Slots<String>,
        possible: Vec<String>,
    },
    /// A momentary trigger. Never holds a current value.
    Event {
        trigger_on_reset: bool,
        trigger_on_failsafe: bool,
    },
}

impl ValueKind {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::String(_) => DataType::String,
            Self::Enum { .. } => DataType::Enum,
            Self::Event { .. } => DataType::Event,
        }
    }

    /// Force enum slots into the allowed set.
    fn sanitized(self) -> Self {
        match self {
            Self::Enum { mut slots, possible } => {
                let fallback = possible
                    .first()
                    .cloned()
                    .unwrap_or_else(|| ENUM_EMPTY_SENTINEL.to_owned());
                let coerce = |v: String| {
                    if possible.contains(&v) {
                        v
                    } else {
                        fallback.clone()
                    }
                };
                slots.current = coerce(slots.current);
                slots.default = slots.default.map(coerce);
                slots.fail = slots.fail.map(coerce);
                slots.min = None;
                slots.max = None;
                Self::Enum { slots, possible }
            }
            Self::Bool(mut slots) => {
                slots.min = None;
                slots.max = None;
                Self::Bool(slots)
            }
            Self::String(mut slots) => {
                slots.min = None;
                slots.max = None;
                Self::String(slots)
            }
            other => other,
        }
    }
}

// ── Value ────────────────────────────────────────────────────────────

/// One typed, introspectable parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    id: String,
    label: String,
    category: String,
    unit: String,
    kind: ValueKind,
}

impl Value {
    /// Build a value. The label defaults to the id; enum slots are
    /// coerced into the allowed set.
    pub fn new(id: impl Into<String>, kind: ValueKind) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            category: String::new(),
            unit: String::new(),
            kind: kind.sanitized(),
        }
    }

    pub fn bool(id: impl Into<String>, current: bool) -> Self {
        Self::new(id, ValueKind::Bool(Slots::new(current)))
    }

    pub fn int(id: impl Into<String>, current: i64) -> Self {
        Self::new(id, ValueKind::Int(Slots::new(current)))
    }

    pub fn float(id: impl Into<String>, current: f64) -> Self {
        Self::new(id, ValueKind::Float(Slots::new(current)))
    }

    pub fn string(id: impl Into<String>, current: impl Into<String>) -> Self {
        Self::new(id, ValueKind::String(Slots::new(current.into())))
    }

    pub fn enumeration(
        id: impl Into<String>,
        current: impl Into<String>,
        possible: Vec<String>,
    ) -> Self {
        Self::new(
            id,
            ValueKind::Enum {
                slots: Slots::new(current.into()),
                possible,
            },
        )
    }

    pub fn event(id: impl Into<String>, trigger_on_reset: bool, trigger_on_failsafe: bool) -> Self {
        Self::new(
            id,
            ValueKind::Event {
                trigger_on_reset,
                trigger_on_failsafe,
            },
        )
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the default slot, builder style. Ignores invalid conversions.
    #[must_use]
    pub fn with_default(mut self, raw: impl Into<RawValue>) -> Self {
        let _ = self.set(&raw.into(), Slot::Default);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn data_type(&self) -> DataType {
        self.kind.data_type()
    }

    /// Whether a Default slot is configured (events: `trigger_on_reset`).
    pub fn has_default(&self) -> bool {
        match &self.kind {
            ValueKind::Bool(s) => s.default.is_some(),
            ValueKind::Int(s) => s.default.is_some(),
            ValueKind::Float(s) => s.default.is_some(),
            ValueKind::String(s) | ValueKind::Enum { slots: s, .. } => s.default.is_some(),
            ValueKind::Event {
                trigger_on_reset, ..
            } => *trigger_on_reset,
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Write `raw` into `slot`, coercing per the value's type.
    ///
    /// `Invalid` leaves the value untouched.
    pub fn set(&mut self, raw: &RawValue, slot: Slot) -> SetOutcome {
        match &mut self.kind {
            ValueKind::Bool(slots) => slots.put(slot, raw_as_bool(raw), false),
            ValueKind::Int(slots) => match raw_as_int(raw) {
                Some(i) => slots.put(slot, i, true),
                None => SetOutcome::Invalid,
            },
            ValueKind::Float(slots) => match raw_as_float(raw) {
                Some(f) => slots.put(slot, f, true),
                None => SetOutcome::Invalid,
            },
            ValueKind::String(slots) => match raw {
                // A bool written to a string acts as a button press.
                RawValue::Bool(b) => match slots.put(slot, bool_to_text(*b).to_owned(), false) {
                    SetOutcome::Success => SetOutcome::Submit,
                    other => other,
                },
                other => slots.put(slot, raw_as_text(other), false),
            },
            ValueKind::Enum { slots, possible } => {
                let text = raw_as_text(raw);
                if !possible.contains(&text) {
                    return SetOutcome::Invalid;
                }
                match (raw, slots.put(slot, text, false)) {
                    // Same button-press rule as strings.
                    (RawValue::Bool(_), SetOutcome::Success) => SetOutcome::Submit,
                    (_, outcome) => outcome,
                }
            }
            ValueKind::Event {
                trigger_on_reset,
                trigger_on_failsafe,
            } => {
                let fire = match raw {
                    RawValue::Bool(b) => *b,
                    RawValue::String(s) => s == "submit",
                    RawValue::Int(_) | RawValue::Float(_) => return SetOutcome::Invalid,
                };
                match slot {
                    Slot::Current if fire => SetOutcome::Submit,
                    Slot::Current => SetOutcome::Success,
                    Slot::Default => {
                        *trigger_on_reset = fire;
                        SetOutcome::Success
                    }
                    Slot::Fail => {
                        *trigger_on_failsafe = fire;
                        SetOutcome::Success
                    }
                    Slot::Min | Slot::Max => SetOutcome::Invalid,
                }
            }
        }
    }

    /// Write to the Current slot.
    pub fn set_current(&mut self, raw: impl Into<RawValue>) -> SetOutcome {
        self.set(&raw.into(), Slot::Current)
    }

    /// Copy Default into Current. Events fire instead of holding a value.
    pub fn reset_to_default(&mut self) -> SetOutcome {
        match &mut self.kind {
            ValueKind::Bool(s) => s.reset(),
            ValueKind::Int(s) => s.reset(),
            ValueKind::Float(s) => s.reset(),
            ValueKind::String(s) | ValueKind::Enum { slots: s, .. } => s.reset(),
            ValueKind::Event {
                trigger_on_reset, ..
            } => {
                if *trigger_on_reset {
                    SetOutcome::Submit
                } else {
                    SetOutcome::Success
                }
            }
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Read a slot in the value's native shape.
    pub fn get(&self, slot: Slot) -> Option<RawValue> {
        match &self.kind {
            ValueKind::Bool(s) => s.get(slot).map(|b| RawValue::Bool(*b)),
            ValueKind::Int(s) => s.get(slot).map(|i| RawValue::Int(*i)),
            ValueKind::Float(s) => s.get(slot).map(|f| RawValue::Float(*f)),
            ValueKind::String(s) | ValueKind::Enum { slots: s, .. } => {
                s.get(slot).map(|t| RawValue::String(t.clone()))
            }
            ValueKind::Event {
                trigger_on_reset,
                trigger_on_failsafe,
            } => match slot {
                Slot::Current => Some(RawValue::String(String::new())),
                Slot::Default => Some(RawValue::Bool(*trigger_on_reset)),
                Slot::Fail => Some(RawValue::Bool(*trigger_on_failsafe)),
                Slot::Min | Slot::Max => None,
            },
        }
    }

    pub fn get_bool(&self, slot: Slot) -> Option<bool> {
        self.get(slot).map(|raw| raw_as_bool(&raw))
    }

    pub fn get_int(&self, slot: Slot) -> Option<i64> {
        self.get(slot).and_then(|raw| raw_as_int(&raw))
    }

    pub fn get_float(&self, slot: Slot) -> Option<f64> {
        self.get(slot).and_then(|raw| raw_as_float(&raw))
    }

    pub fn get_string(&self, slot: Slot) -> Option<String> {
        if let ValueKind::Event {
            trigger_on_reset,
            trigger_on_failsafe,
        } = &self.kind
        {
            let armed = match slot {
                Slot::Current => false,
                Slot::Default => *trigger_on_reset,
                Slot::Fail => *trigger_on_failsafe,
                Slot::Min | Slot::Max => return None,
            };
            return Some(if armed { "submit".into() } else { String::new() });
        }
        self.get(slot).map(|raw| raw_as_text(&raw))
    }

    // ── Wire encoding ────────────────────────────────────────────────

    /// The Current slot, type-correctly encoded. Events encode as `""`.
    pub fn to_wire_value(&self) -> Json {
        match &self.kind {
            ValueKind::Event { .. } => Json::String(String::new()),
            _ => self
                .get(Slot::Current)
                .map_or(Json::Null, |raw| raw.to_json()),
        }
    }

    /// Full definition object, omitting absent slots and empty metadata.
    pub fn to_wire_definition(&self) -> Json {
        let mut def = Map::new();
        def.insert("id".into(), Json::String(self.id.clone()));
        if !self.label.is_empty() {
            def.insert("label".into(), Json::String(self.label.clone()));
        }
        def.insert("type".into(), Json::String(self.data_type().wire_name().into()));
        if !self.category.is_empty() {
            def.insert("category".into(), Json::String(self.category.clone()));
        }
        if !self.unit.is_empty() {
            def.insert("unit".into(), Json::String(self.unit.clone()));
        }

        match &self.kind {
            ValueKind::Bool(s) => write_slots(&mut def, s, Json::Bool),
            ValueKind::Int(s) => write_slots(&mut def, s, Json::from),
            ValueKind::Float(s) => write_slots(&mut def, s, Json::from),
            ValueKind::String(s) => write_slots(&mut def, s, Json::String),
            ValueKind::Enum { slots, possible } => {
                write_slots(&mut def, slots, Json::String);
                def.insert(
                    "possible".into(),
                    Json::Array(possible.iter().cloned().map(Json::String).collect()),
                );
            }
            ValueKind::Event {
                trigger_on_reset,
                trigger_on_failsafe,
            } => {
                def.insert("current".into(), Json::String(String::new()));
                if *trigger_on_reset {
                    def.insert("default".into(), Json::Bool(true));
                }
                if *trigger_on_failsafe {
                    def.insert("fail".into(), Json::Bool(true));
                }
            }
        }

        Json::Object(def)
    }
}

fn write_slots<T: Clone>(def: &mut Map<String, Json>, slots: &Slots<T>, encode: impl Fn(T) -> Json) {
    def.insert("current".into(), encode(slots.current.clone()));
    let optional = [
        ("default", &slots.default),
        ("fail", &slots.fail),
        ("min", &slots.min),
        ("max", &slots.max),
    ];
    for (key, slot) in optional {
        if let Some(v) = slot {
            def.insert(key.into(), encode(v.clone()));
        }
    }
}

// ── Coercions ────────────────────────────────────────────────────────

fn raw_as_bool(raw: &RawValue) -> bool {
    match raw {
        RawValue::Bool(b) => *b,
        RawValue::Int(i) => *i != 0,
        RawValue::Float(f) => *f != 0.0,
        RawValue::String(s) => text_to_bool(s),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn raw_as_int(raw: &RawValue) -> Option<i64> {
    match raw {
        RawValue::Bool(b) => Some(i64::from(*b)),
        RawValue::Int(i) => Some(*i),
        // Saturating truncation toward zero.
        RawValue::Float(f) => Some(f.trunc() as i64),
        RawValue::String(s) => parse_int_prefix(s),
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn raw_as_float(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        RawValue::Int(i) => Some(*i as f64),
        RawValue::Float(f) => Some(*f),
        RawValue::String(s) => parse_float_prefix(s),
    }
}

fn raw_as_text(raw: &RawValue) -> String {
    match raw {
        RawValue::Bool(b) => bool_to_text(*b).to_owned(),
        RawValue::Int(i) => i.to_string(),
        RawValue::Float(f) => f.to_string(),
        RawValue::String(s) => s.clone(),
    }
}
