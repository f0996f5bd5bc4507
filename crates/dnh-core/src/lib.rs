//! Session core of the DNH hub: participants, typed parameters, and the
//! realtime protocol.
//!
//! This crate owns everything that does not touch a socket:
//!
//! - **[`Coordinator`]**: Shared hub state. Holds the participant
//!   [`Registry`] behind a lock with a lazily republished snapshot, the
//!   `system` datacache, and the lifecycle command collections. Builds the
//!   `equipment` / `system` / `status` payloads and drives hub resets.
//!
//! - **[`ProtocolDispatcher`]**: Per-connection state machine. Parses each
//!   inbound JSON frame, enforces registration, and routes by `apity` to the
//!   command handlers. Replies and broadcasts are queued through the
//!   [`Outbound`] seam.
//!
//! - **[`ConnectionTable`]**: The default [`Outbound`]: one bounded queue per
//!   connection, drained by whatever transport owns the socket.
//!
//! - **Parameter model** ([`model`]): [`Value`] with its per-type coercion
//!   rules, [`ValueSet`] keyed by id, and [`Participant`].

pub mod commands;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod log;
pub mod model;
pub mod store;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use commands::{CommandsCollection, LifecycleCommands};
pub use config::HubSettings;
pub use coordinator::{Coordinator, DataCacheReport, ResetSummary, SELF_GUID, SYSTEM_GUID};
pub use dispatch::{ConnectionState, ProtocolDispatcher, parse_registration};
pub use error::{CoreError, ErrorSeverity, SendError};
pub use log::{LogSink, TracingSink};
pub use store::{BroadcastReport, Registry};
pub use transport::{ConnectionId, ConnectionTable, DEFAULT_OUTBOUND_QUEUE, Outbound, Payload};

pub use model::{
    DataType, EquipmentType, Participant, RawValue, Registration, ResetReport, SetOutcome, Slot,
    Value, ValueHandle, ValueKind, ValueSet, parse_definition,
};
