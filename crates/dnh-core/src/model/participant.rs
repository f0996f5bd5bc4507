// ── Registered equipment ──

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};
use strum::{Display, EnumString, IntoStaticStr};

use super::value_set::ValueSet;
use crate::transport::ConnectionId;

/// Equipment category declared at registration.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EquipmentType {
    Lamp,
    Camera,
    Sonic,
    Mic,
    Sensor,
    Cut,
    Input,
    Event,
    Actuator,
    Display,
    Spectator,
    /// Reserved for the hub itself; never registrable.
    System,
}

impl EquipmentType {
    /// Parse a wire name; unknown names yield `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn wire_name(self) -> &'static str {
        self.into()
    }
}

/// Wire encoding of an optional equipment type (`null` when unknown).
pub fn type_json(eq_type: Option<EquipmentType>) -> Json {
    eq_type.map_or(Json::Null, |t| Json::String(t.wire_name().into()))
}

/// The `{name, guid, type, purpose}` header shared by every equipment entry.
pub fn equipment_header(name: &str, guid: &str, eq_type: Option<EquipmentType>, purpose: &str) -> Map<String, Json> {
    let mut obj = Map::new();
    obj.insert("name".into(), json!(name));
    obj.insert("guid".into(), json!(guid));
    obj.insert("type".into(), type_json(eq_type));
    obj.insert("purpose".into(), json!(purpose));
    obj
}

// ── Registration ─────────────────────────────────────────────────────

/// Everything a participant declares when it registers.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    /// A caller-proposed GUID; a fresh UUID is assigned when absent.
    pub guid: Option<String>,
    pub name: String,
    pub manufacturer: String,
    pub purpose: String,
    pub hostname: String,
    pub eq_type: Option<EquipmentType>,
    pub params: ValueSet,
    /// Passthrough fields echoed back in equipment listings.
    pub client_data: Map<String, Json>,
    /// Topics subscribed on arrival.
    pub topics: Vec<String>,
}

impl Registration {
    pub fn new(name: impl Into<String>, eq_type: Option<EquipmentType>) -> Self {
        Self {
            name: name.into(),
            eq_type,
            ..Self::default()
        }
    }
}

// ── Participant ──────────────────────────────────────────────────────

/// A registered piece of equipment bound to one live connection.
#[derive(Debug)]
pub struct Participant {
    guid: String,
    name: String,
    manufacturer: String,
    purpose: String,
    hostname: String,
    eq_type: Option<EquipmentType>,
    params: ValueSet,
    client_data: Map<String, Json>,
    connection: ConnectionId,
    registered_at: DateTime<Utc>,
    active: AtomicBool,
    topics: Mutex<BTreeSet<String>>,
}

impl Participant {
    pub fn new(guid: impl Into<String>, connection: ConnectionId, registration: Registration) -> Self {
        let Registration {
            name,
            manufacturer,
            purpose,
            hostname,
            eq_type,
            params,
            client_data,
            topics,
            ..
        } = registration;
        Self {
            guid: guid.into(),
            name,
            manufacturer,
            purpose,
            hostname,
            eq_type,
            params,
            client_data,
            connection,
            registered_at: Utc::now(),
            active: AtomicBool::new(true),
            topics: Mutex::new(topics.into_iter().collect()),
        }
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn eq_type(&self) -> Option<EquipmentType> {
        self.eq_type
    }

    pub fn params(&self) -> &ValueSet {
        &self.params
    }

    pub fn client_data(&self) -> &Map<String, Json> {
        &self.client_data
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark as removed. Returns `true` only on the first call.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    // ── Topics ───────────────────────────────────────────────────────

    fn topics(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add topics. `true` if at least one was new.
    pub fn subscribe<S: AsRef<str>>(&self, topics: &[S]) -> bool {
        let mut set = self.topics();
        topics
            .iter()
            .fold(false, |any, t| set.insert(t.as_ref().to_owned()) | any)
    }

    /// Remove topics. `true` if at least one was present.
    pub fn unsubscribe<S: AsRef<str>>(&self, topics: &[S]) -> bool {
        let mut set = self.topics();
        topics.iter().fold(false, |any, t| set.remove(t.as_ref()) | any)
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.topics().contains(topic)
    }

    /// Current subscriptions, sorted.
    pub fn subscriptions(&self) -> Vec<String> {
        self.topics().iter().cloned().collect()
    }

    // ── Wire encoding ────────────────────────────────────────────────

    /// Full listing entry: header, manufacturer, hostname, parameter
    /// definitions and passthrough client data.
    pub fn to_json(&self) -> Json {
        let mut obj = equipment_header(&self.name, &self.guid, self.eq_type, &self.purpose);
        obj.insert("manufacturer".into(), json!(self.manufacturer));
        if !self.hostname.is_empty() {
            obj.insert("hostname".into(), json!(self.hostname));
        }
        obj.insert("params".into(), self.params.to_wire_definition_array());
        for (key, value) in &self.client_data {
            obj.insert(key.clone(), value.clone());
        }
        Json::Object(obj)
    }

    /// `{name, guid}` as used by the system summary.
    pub fn summary_json(&self) -> Json {
        json!({ "name": self.name, "guid": self.guid })
    }
}
