// ── Hub domain model ──
//
// Typed parameters, the collections that hold them, and the equipment
// that owns them. Everything here is transport-agnostic.

pub mod data_type;
pub mod raw;

pub mod parse;
pub mod participant;
pub mod value;
pub mod value_set;

// ── Re-exports ──────────────────────────────────────────────────────
// Flat access: `use dnh_core::model::*` gives you everything.

pub use data_type::{DataType, SetOutcome, Slot};
pub use raw::RawValue;

pub use parse::parse_definition;
pub use participant::{EquipmentType, Participant, Registration, equipment_header, type_json};
pub use value::{ENUM_EMPTY_SENTINEL, Slots, Value, ValueKind};
pub use value_set::{ResetReport, ValueHandle, ValueSet};
