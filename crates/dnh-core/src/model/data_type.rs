// ── Parameter type tags ──

use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// The data type of a [`Value`](super::Value). Fixed for the value's lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum DataType {
    Bool,
    Int,
    Float,
    String,
    Enum,
    Event,
}

impl DataType {
    /// Parse a wire type name. Unknown names yield `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// The wire name (`"int"`, `"enum"`, ...).
    pub fn wire_name(self) -> &'static str {
        self.into()
    }
}

/// A named storage slot on a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Slot {
    #[default]
    Current,
    Default,
    Min,
    Max,
    Fail,
}

/// Outcome of writing to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOutcome {
    /// The slot now holds the coerced input.
    Success,
    /// The write is a momentary trigger and must be forwarded as an event.
    Submit,
    /// Conversion undefined or rejected; nothing was mutated.
    Invalid,
}

impl SetOutcome {
    /// Per-id status string used in `valset` replies.
    pub fn status(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Submit => "submit",
            Self::Invalid => "fail",
        }
    }
}
