// ── Parameter collections ──
//
// An insertion-ordered bag of values keyed by id. Values live behind
// shared handles so a shallow clone observes (and can drive) the same
// underlying parameters as its source.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use super::data_type::{SetOutcome, Slot};
use super::parse::parse_definition;
use super::raw::RawValue;
use super::value::Value;

// ── ValueHandle ──────────────────────────────────────────────────────

/// Shared, lockable reference to one [`Value`].
#[derive(Debug, Clone)]
pub struct ValueHandle(Arc<RwLock<Value>>);

impl ValueHandle {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Value> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Value> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether two handles point at the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ── ResetReport ──────────────────────────────────────────────────────

/// Ids touched by [`ValueSet::reset`], sorted for deterministic output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub changed: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub submitted: BTreeSet<String>,
}

// ── ValueSet ─────────────────────────────────────────────────────────

/// Parameter bag of a participant, or the hub's datacache.
///
/// `Clone` is shallow: both sets share value handles.
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    values: IndexMap<String, ValueHandle>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from values, dropping any later duplicate ids.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut set = Self::new();
        for value in values {
            let _ = set.insert(value);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<ValueHandle> {
        self.values.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueHandle)> {
        self.values.iter().map(|(id, h)| (id.as_str(), h))
    }

    /// Add a value. Fails if the id is already present.
    pub fn insert(&mut self, value: Value) -> Result<ValueHandle, String> {
        if self.contains(value.id()) {
            return Err(format!("Param ID {} already taken.", value.id()));
        }
        let id = value.id().to_owned();
        let handle = ValueHandle::new(value);
        self.values.insert(id, handle.clone());
        Ok(handle)
    }

    /// Parse a definition and add it.
    pub fn parse_and_insert(&mut self, definition: &Json) -> Result<ValueHandle, String> {
        self.insert(parse_definition(definition)?)
    }

    /// Write a JSON scalar into the Current slot of `id`.
    ///
    /// With `create_if_missing`, an absent id is created with a type
    /// inferred from the JSON value.
    pub fn set(&mut self, id: &str, json: &Json, create_if_missing: bool) -> SetOutcome {
        let Some(raw) = RawValue::from_json(json) else {
            return SetOutcome::Invalid;
        };

        if let Some(handle) = self.values.get(id) {
            return handle.write().set(&raw, Slot::Current);
        }
        if !create_if_missing {
            return SetOutcome::Invalid;
        }

        let value = match raw {
            RawValue::Bool(b) => Value::bool(id, b),
            RawValue::Int(i) => Value::int(id, i),
            RawValue::Float(f) => Value::float(id, f),
            RawValue::String(s) => Value::string(id, s),
        };
        self.values.insert(id.to_owned(), ValueHandle::new(value));
        SetOutcome::Success
    }

    /// Write through a shared handle. `None` when the id is absent.
    ///
    /// Unlike [`set`](Self::set) this never changes the set's shape, so
    /// it works on shared snapshots.
    pub fn update(&self, id: &str, json: &Json) -> Option<SetOutcome> {
        let handle = self.values.get(id)?;
        Some(match RawValue::from_json(json) {
            Some(raw) => handle.write().set(&raw, Slot::Current),
            None => SetOutcome::Invalid,
        })
    }

    /// Reset every value to its default.
    ///
    /// Only values whose current value actually moved count as changed.
    /// Reset-triggered events fire on every reset. Values without a
    /// default are dropped when `remove_if_no_default`.
    pub fn reset(&mut self, remove_if_no_default: bool) -> ResetReport {
        let mut report = ResetReport::default();
        let mut no_default = Vec::new();

        for (id, handle) in &self.values {
            let mut value = handle.write();
            let before = value.get(Slot::Current);
            match value.reset_to_default() {
                SetOutcome::Success => {
                    if value.get(Slot::Current) != before {
                        report.changed.insert(id.clone());
                    }
                }
                SetOutcome::Submit => {
                    report.submitted.insert(id.clone());
                }
                SetOutcome::Invalid => no_default.push(id.clone()),
            }
        }

        if remove_if_no_default {
            for id in no_default {
                self.values.shift_remove(&id);
                report.removed.insert(id);
            }
        }
        report
    }

    /// Same handles, new map.
    pub fn shallow_clone(&self) -> Self {
        self.clone()
    }

    /// Independent copies of every value.
    pub fn deep_clone(&self) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(id, h)| (id.clone(), ValueHandle::new(h.read().clone())))
                .collect(),
        }
    }

    /// `{id: current}` for every value.
    pub fn to_wire_value_map(&self) -> Json {
        let map: Map<String, Json> = self
            .values
            .iter()
            .map(|(id, h)| (id.clone(), h.read().to_wire_value()))
            .collect();
        Json::Object(map)
    }

    /// Definition objects for every value.
    pub fn to_wire_definition_array(&self) -> Json {
        Json::Array(
            self.values
                .values()
                .map(|h| h.read().to_wire_definition())
                .collect(),
        )
    }
}
