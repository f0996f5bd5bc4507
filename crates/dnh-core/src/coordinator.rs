// ── Hub coordinator ──
//
// Owns the participant registry, the shared datacache, and the
// lifecycle command collections. Readers work from a published registry
// snapshot that is rebuilt only after a registration change.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as Json, json};
use tracing::{debug, info};

use crate::commands::{CommandsCollection, LifecycleCommands};
use crate::config::HubSettings;
use crate::error::{CoreError, ErrorSeverity, SendError};
use crate::log::LogSink;
use crate::model::{EquipmentType, Participant, Registration, ResetReport, ValueHandle, ValueSet, equipment_header};
use crate::store::{BroadcastReport, Registry};
use crate::transport::{ConnectionId, Outbound, Payload};

/// GUID alias for the requester's own participant.
pub const SELF_GUID: &str = "self";
/// GUID of the hub's datacache pseudo-participant.
pub const SYSTEM_GUID: &str = "system";

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Reports ──────────────────────────────────────────────────────────

/// Outcome of adding a batch of datacache definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataCacheReport {
    pub ids: Vec<String>,
    pub errors: Vec<String>,
}

impl DataCacheReport {
    /// `success`, `fail` or `mixed`.
    pub fn status(&self) -> &'static str {
        match (self.ids.is_empty(), self.errors.is_empty()) {
            (false, true) => "success",
            (true, false) => "fail",
            _ => "mixed",
        }
    }
}

/// What a hub reset touched.
#[derive(Debug, Clone, Default)]
pub struct ResetSummary {
    pub datacache: ResetReport,
    /// Per participant GUID.
    pub equipment: BTreeMap<String, ResetReport>,
    pub broadcast: BroadcastReport,
    pub commands_started: usize,
}

// ── Coordinator ──────────────────────────────────────────────────────

/// Session coordinator shared by every connection.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    equipment: Mutex<Registry>,
    equipment_dirty: AtomicBool,
    equipment_snapshot: ArcSwap<Registry>,
    datacache: Mutex<ValueSet>,
    commands: Mutex<LifecycleCommands>,
    outbound: Arc<dyn Outbound>,
    sink: Arc<dyn LogSink>,
    started_at: DateTime<Utc>,
    fatal: Mutex<Option<String>>,
}

impl Coordinator {
    pub fn new(outbound: Arc<dyn Outbound>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                equipment: Mutex::new(Registry::new()),
                equipment_dirty: AtomicBool::new(false),
                equipment_snapshot: ArcSwap::from_pointee(Registry::new()),
                datacache: Mutex::new(ValueSet::new()),
                commands: Mutex::new(LifecycleCommands::default()),
                outbound,
                sink,
                started_at: Utc::now(),
                fatal: Mutex::new(None),
            }),
        }
    }

    pub fn sink(&self) -> &dyn LogSink {
        self.inner.sink.as_ref()
    }

    pub fn outbound(&self) -> &dyn Outbound {
        self.inner.outbound.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    // ── Delivery ─────────────────────────────────────────────────────

    /// Serialize and queue `message` for one connection.
    pub fn send_json(&self, to: ConnectionId, message: &Json) -> Result<(), SendError> {
        let payload: Payload = Arc::from(message.to_string());
        self.inner.outbound.send(to, &payload)
    }

    /// Send `message` to every registered participant except `exclude`.
    pub fn broadcast_json(&self, message: &Json, exclude: Option<ConnectionId>) -> BroadcastReport {
        let payload: Payload = Arc::from(message.to_string());
        self.equipment_snapshot()
            .broadcast(self.inner.outbound.as_ref(), &payload, exclude)
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Bind a new participant to `connection`.
    ///
    /// A proposed GUID is honoured unless it is reserved or taken;
    /// otherwise a fresh UUIDv4 is assigned.
    pub fn register(
        &self,
        connection: ConnectionId,
        registration: Registration,
    ) -> Result<Arc<Participant>, CoreError> {
        let guid = match registration.guid.as_deref() {
            Some(g @ (SELF_GUID | SYSTEM_GUID)) => {
                return Err(CoreError::GuidReserved { guid: g.to_owned() });
            }
            Some(g) => g.to_owned(),
            None => uuid::Uuid::new_v4().to_string(),
        };

        let mut equipment = lock(&self.inner.equipment);
        if equipment.contains_guid(&guid) {
            return Err(CoreError::GuidTaken { guid });
        }
        if equipment.find_by_connection(connection).is_some() {
            return Err(CoreError::ConnectionTaken { connection });
        }

        let participant = Arc::new(Participant::new(guid, connection, registration));
        equipment.register(Arc::clone(&participant));
        self.inner.equipment_dirty.store(true, Ordering::Release);
        debug!(guid = %participant.guid(), conn = %connection, "participant registered");
        Ok(participant)
    }

    pub fn unregister_guid(&self, guid: &str) -> bool {
        let mut equipment = lock(&self.inner.equipment);
        let removed = equipment.remove_by_guid(guid);
        if removed {
            self.inner.equipment_dirty.store(true, Ordering::Release);
        }
        removed
    }

    /// Drop whatever participant is bound to `connection`.
    pub fn unregister_connection(&self, connection: ConnectionId) -> Option<String> {
        let mut equipment = lock(&self.inner.equipment);
        let removed = equipment.remove_by_connection(connection);
        if removed.is_some() {
            self.inner.equipment_dirty.store(true, Ordering::Release);
        }
        removed
    }

    /// The current registry, re-cloned only after a change.
    pub fn equipment_snapshot(&self) -> Arc<Registry> {
        if self.inner.equipment_dirty.load(Ordering::Acquire) {
            let equipment = lock(&self.inner.equipment);
            if self.inner.equipment_dirty.swap(false, Ordering::AcqRel) {
                self.inner
                    .equipment_snapshot
                    .store(Arc::new(equipment.snapshot()));
            }
        }
        self.inner.equipment_snapshot.load_full()
    }

    // ── Datacache ────────────────────────────────────────────────────

    /// Shallow copy of the datacache; writes through it reach the hub.
    pub fn datacache(&self) -> ValueSet {
        lock(&self.inner.datacache).shallow_clone()
    }

    pub fn register_datacache(&self, definition: &Json) -> Result<ValueHandle, String> {
        lock(&self.inner.datacache).parse_and_insert(definition)
    }

    /// Add every definition in `definitions`, collecting per-entry errors.
    pub fn register_datacache_array(&self, definitions: &Json) -> DataCacheReport {
        let mut report = DataCacheReport::default();
        let Some(entries) = definitions.as_array() else {
            report
                .errors
                .push("Registration for datacache was not an array.".into());
            return report;
        };
        if entries.is_empty() {
            report.errors.push("Empty Param definitions array.".into());
            return report;
        }

        let mut datacache = lock(&self.inner.datacache);
        for entry in entries {
            match datacache.parse_and_insert(entry) {
                Ok(handle) => report.ids.push(handle.read().id().to_owned()),
                Err(e) => report.errors.push(e),
            }
        }
        if report.ids.is_empty() && !report.errors.is_empty() {
            report.errors.push("Nothing was registered.".into());
        }
        report
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Every participant plus the `system` datacache entry.
    pub fn generate_equipment_snapshot(&self) -> Json {
        self.sink().log_verbose("Generating Equipment JSON");

        let mut list: Vec<Json> = self
            .equipment_snapshot()
            .iter()
            .map(|p| p.to_json())
            .collect();

        let mut system = equipment_header(SYSTEM_GUID, SYSTEM_GUID, Some(EquipmentType::System), "hub");
        system.insert(
            "params".into(),
            lock(&self.inner.datacache).to_wire_definition_array(),
        );
        list.push(Json::Object(system));

        json!({ "apity": "equipment", "equipment": list })
    }

    /// Host details and an abridged equipment list.
    pub fn generate_system_snapshot(&self) -> Json {
        self.sink().log_verbose("Generating System JSON");

        let equipment: Vec<Json> = self
            .equipment_snapshot()
            .iter()
            .map(|p| p.summary_json())
            .collect();
        let uptime = (Utc::now() - self.inner.started_at).num_seconds().max(0);

        json!({
            "apity": "system",
            "hostname": hostname(),
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": uptime,
            "equipment": equipment,
        })
    }

    pub fn generate_status(&self) -> Json {
        self.sink().log_verbose("Generating Status JSON");
        json!({ "apity": "status", "UNIMPLEMENTED": "UNIMPLEMENTED" })
    }

    // ── Reset & ping ─────────────────────────────────────────────────

    /// Reset the datacache and every participant to defaults and
    /// broadcast what changed. Reset commands run after both locks are
    /// released.
    pub fn reset(&self, reason: &str, run_reset_commands: bool) -> ResetSummary {
        let mut summary = ResetSummary::default();
        {
            let mut datacache = lock(&self.inner.datacache);
            let equipment = lock(&self.inner.equipment);

            let cache = datacache.reset(true);
            let mut chvals = Map::new();
            for id in &cache.changed {
                if let Some(handle) = datacache.get(id) {
                    chvals.insert(id.clone(), handle.read().to_wire_value());
                }
            }

            let mut eqvals = Map::new();
            let mut eqsub = Map::new();
            for participant in equipment.iter() {
                let mut params = participant.params().shallow_clone();
                let report = params.reset(false);

                if !report.changed.is_empty() {
                    let vals: Map<String, Json> = report
                        .changed
                        .iter()
                        .filter_map(|id| {
                            params
                                .get(id)
                                .map(|h| (id.clone(), h.read().to_wire_value()))
                        })
                        .collect();
                    eqvals.insert(participant.guid().to_owned(), Json::Object(vals));
                }
                if !report.submitted.is_empty() {
                    eqsub.insert(participant.guid().to_owned(), json!(report.submitted));
                }
                summary
                    .equipment
                    .insert(participant.guid().to_owned(), report);
            }

            let eqguids: Vec<&String> = eqvals.keys().collect();
            let message = json!({
                "apity": "reset",
                "reason": reason,
                "chrmv": cache.removed,
                "chids": chvals.keys().collect::<Vec<_>>(),
                "chvals": chvals,
                "chsub": cache.submitted,
                "eqvals": eqvals,
                "eqguids": eqguids,
                "eqsub": eqsub,
            });

            let payload: Payload = Arc::from(message.to_string());
            summary.broadcast = equipment.broadcast(self.inner.outbound.as_ref(), &payload, None);
            summary.datacache = cache;
        }

        info!(reason, "hub reset");
        if run_reset_commands {
            summary.commands_started = self.commands_for(|c| &c.reset).execute();
        }
        summary
    }

    /// Send `{apity:"ping"}` to every open connection.
    pub fn ping(&self) -> usize {
        let payload: Payload = Arc::from(json!({ "apity": "ping" }).to_string());
        let outbound = self.inner.outbound.as_ref();
        outbound
            .open_connections()
            .into_iter()
            .filter(|conn| match outbound.send(*conn, &payload) {
                Ok(()) => true,
                Err(e) => {
                    debug!(conn = %conn, error = %e, "ping not delivered");
                    false
                }
            })
            .count()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Seed datacache params and load the command collections. Bad
    /// definitions are logged and skipped.
    pub fn apply_configuration(&self, settings: &HubSettings) {
        if !settings.params.is_empty() {
            self.sink().log("Parsing config Params.");
            let mut datacache = lock(&self.inner.datacache);
            for definition in &settings.params {
                if let Err(e) = datacache.parse_and_insert(definition) {
                    self.sink()
                        .log(&format!("Error parsing Param definition entry: {e}"));
                }
            }
            drop(datacache);
            self.sink().log("Finished parsing config Params.");
        }

        let mut guard = lock(&self.inner.commands);
        let commands = &mut *guard;
        let lists = [
            (&mut commands.startup, &settings.startupcmds),
            (&mut commands.reset, &settings.resetcmds),
            (&mut commands.fatal, &settings.fatalcmds),
            (&mut commands.end, &settings.endcmds),
        ];
        for (collection, entries) in lists {
            if entries.is_empty() {
                continue;
            }
            self.sink()
                .log(&format!("Parsing command collection for {}", collection.name()));
            for entry in entries {
                collection.add_command(entry.clone());
            }
        }
    }

    /// A copy of the configured command collections.
    pub fn commands(&self) -> LifecycleCommands {
        lock(&self.inner.commands).clone()
    }

    fn commands_for(&self, pick: impl Fn(&LifecycleCommands) -> &CommandsCollection) -> CommandsCollection {
        pick(&lock(&self.inner.commands)).clone()
    }

    /// Run the startup commands.
    pub fn finalize_initialization(&self) -> usize {
        self.commands_for(|c| &c.startup).execute()
    }

    /// Run the end commands.
    pub fn finalize_shutdown(&self) -> usize {
        self.commands_for(|c| &c.end).execute()
    }

    /// Record a fatal condition and run the fatal commands. Performs no
    /// other shutdown action; the embedder decides what happens next.
    pub fn raise_fatal(&self, reason: &str) -> usize {
        *lock(&self.inner.fatal) = Some(reason.to_owned());
        self.sink().log_error(ErrorSeverity::Fatal, reason);
        self.commands_for(|c| &c.fatal).execute()
    }

    pub fn fatal_reason(&self) -> Option<String> {
        lock(&self.inner.fatal).clone()
    }
}

fn hostname() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .into_iter()
        .find_map(|key| std::env::var(key).ok().filter(|h| !h.is_empty()))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_owned())
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::log::TracingSink;
    use crate::model::Value;
    use crate::transport::ConnectionTable;
    use pretty_assertions::assert_eq;

    fn hub() -> (Coordinator, Arc<ConnectionTable>) {
        let table = Arc::new(ConnectionTable::default());
        let coord = Coordinator::new(table.clone(), Arc::new(TracingSink));
        (coord, table)
    }

    fn lamp() -> Registration {
        Registration::new("lamp", Some(EquipmentType::Lamp))
    }

    #[test]
    fn register_assigns_uuid() {
        let (coord, table) = hub();
        let (conn, _rx) = table.open();
        let p = coord.register(conn, lamp()).unwrap();
        assert!(uuid::Uuid::parse_str(p.guid()).is_ok());
    }

    #[test]
    fn proposed_guid_rules() {
        let (coord, table) = hub();
        let (c1, _r1) = table.open();
        let (c2, _r2) = table.open();

        let mut reg = lamp();
        reg.guid = Some("system".into());
        assert!(matches!(
            coord.register(c1, reg),
            Err(CoreError::GuidReserved { .. })
        ));

        let mut reg = lamp();
        reg.guid = Some("fixed".into());
        assert_eq!(coord.register(c1, reg).unwrap().guid(), "fixed");

        let mut reg = lamp();
        reg.guid = Some("fixed".into());
        assert!(matches!(coord.register(c2, reg), Err(CoreError::GuidTaken { .. })));
        assert!(matches!(
            coord.register(c1, lamp()),
            Err(CoreError::ConnectionTaken { .. })
        ));
    }

    #[test]
    fn snapshot_rebuilt_only_when_dirty() {
        let (coord, table) = hub();
        let first = coord.equipment_snapshot();
        assert!(Arc::ptr_eq(&first, &coord.equipment_snapshot()));

        let (conn, _rx) = table.open();
        let p = coord.register(conn, lamp()).unwrap();
        let second = coord.equipment_snapshot();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 1);
        assert!(Arc::ptr_eq(&second, &coord.equipment_snapshot()));

        assert_eq!(coord.unregister_connection(conn).as_deref(), Some(p.guid()));
        assert!(coord.equipment_snapshot().is_empty());
        assert!(!p.is_active());
    }

    #[test]
    fn datacache_array_errors() {
        let (coord, _) = hub();
        assert_eq!(
            coord.register_datacache_array(&json!({})).errors,
            vec!["Registration for datacache was not an array."]
        );
        assert_eq!(
            coord.register_datacache_array(&json!([])).errors,
            vec!["Empty Param definitions array."]
        );
        let report = coord.register_datacache_array(&json!([{"id": "x"}]));
        assert_eq!(
            report.errors,
            vec!["Encountered x Param missing type.", "Nothing was registered."]
        );
        assert_eq!(report.status(), "fail");

        let report = coord.register_datacache_array(&json!([
            {"id": "a", "type": "int", "current": 1},
            {"id": "a", "type": "int", "current": 2},
        ]));
        assert_eq!(report.ids, vec!["a"]);
        assert_eq!(report.errors, vec!["Param ID a already taken."]);
        assert_eq!(report.status(), "mixed");
    }

    #[test]
    fn equipment_snapshot_ends_with_system_entry() {
        let (coord, _) = hub();
        coord
            .register_datacache(&json!({"id": "mode", "type": "string", "current": "idle"}))
            .unwrap();
        assert_eq!(
            coord.generate_equipment_snapshot(),
            json!({
                "apity": "equipment",
                "equipment": [{
                    "name": "system",
                    "guid": "system",
                    "type": "system",
                    "purpose": "hub",
                    "params": [{"id": "mode", "label": "mode", "type": "string", "current": "idle"}]
                }]
            })
        );
    }

    #[test]
    fn reset_broadcasts_changes() {
        let (coord, table) = hub();
        let (conn, mut rx) = table.open();
        let mut reg = lamp();
        reg.guid = Some("g1".into());
        reg.params = ValueSet::from_values([
            Value::int("level", 5).with_default(0),
            Value::event("flash", true, false),
            Value::string("note", "keep"),
        ]);
        coord.register(conn, reg).unwrap();
        coord.register_datacache(&json!({"id": "temp", "type": "int", "current": 3})).unwrap();
        coord.register_datacache(&json!({"id": "mode", "type": "int", "current": 3, "default": 1})).unwrap();

        let summary = coord.reset("operator", false);
        assert_eq!(summary.broadcast.delivered, 1);
        assert!(coord.datacache().get("temp").is_none());

        let msg: Json = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(
            msg,
            json!({
                "apity": "reset",
                "reason": "operator",
                "chrmv": ["temp"],
                "chids": ["mode"],
                "chvals": {"mode": 1},
                "chsub": [],
                "eqvals": {"g1": {"level": 0}},
                "eqguids": ["g1"],
                "eqsub": {"g1": ["flash"]}
            })
        );
    }

    #[test]
    fn ping_reaches_pending_connections() {
        let (coord, table) = hub();
        let (_c1, mut r1) = table.open();
        let (c2, mut r2) = table.open();
        coord.register(c2, lamp()).unwrap();
        assert_eq!(coord.ping(), 2);
        assert_eq!(&*r1.try_recv().unwrap(), r#"{"apity":"ping"}"#);
        assert_eq!(&*r2.try_recv().unwrap(), r#"{"apity":"ping"}"#);
    }

    #[test]
    fn configuration_seeds_datacache_and_commands() {
        let (coord, _) = hub();
        coord.apply_configuration(&HubSettings {
            params: vec![
                json!({"id": "ok", "type": "bool", "current": true}),
                json!({"id": "bad", "type": "nope"}),
            ],
            resetcmds: vec!["true".into()],
            ..HubSettings::default()
        });
        assert!(coord.datacache().contains("ok"));
        assert!(!coord.datacache().contains("bad"));
        assert_eq!(coord.commands().reset.commands(), ["true"]);
        assert!(coord.commands().startup.is_empty());
    }

    #[test]
    fn raise_fatal_records_reason() {
        let (coord, _) = hub();
        assert_eq!(coord.fatal_reason(), None);
        assert_eq!(coord.raise_fatal("sensor bus lost"), 0);
        assert_eq!(coord.fatal_reason().as_deref(), Some("sensor bus lost"));
    }
}
