// ── Participant storage ──
//
// Mutex-guarded registry with published shallow snapshots.

mod registry;

pub use registry::{BroadcastReport, Registry};
