// ── Hub settings ──
//
// The parts of the configuration file the core consumes: datacache
// parameter definitions and the lifecycle command lists. Network and
// logging options live in the binary's config layer.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Settings applied to a [`Coordinator`](crate::Coordinator) at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    /// Parameter definitions seeded into the datacache.
    pub params: Vec<Json>,
    pub startupcmds: Vec<String>,
    pub resetcmds: Vec<String>,
    pub fatalcmds: Vec<String>,
    pub endcmds: Vec<String>,
}
