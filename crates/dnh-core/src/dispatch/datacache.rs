// ── `datacache` ──

use serde_json::{Map, Value as Json, json};

use super::ProtocolDispatcher;
use super::response::{Handled, Rejection, Request};

impl ProtocolDispatcher {
    /// Add shared parameters to the hub datacache. Reads and writes go
    /// through `valget`/`valset` with the `system` GUID.
    pub(super) fn handle_datacache(&self, req: &Request<'_>) -> Handled {
        const APITY: &str = "datacache";
        let mode = req
            .str_field("mode")
            .ok_or_else(|| Rejection::new("datacache must have a mode member of add.").on(APITY))?;

        let invoker = self
            .coordinator
            .equipment_snapshot()
            .find_by_connection(req.conn)
            .ok_or_else(|| Rejection::desync("Could not validate registration.").on(APITY))?;

        if mode != "add" {
            return Err(Rejection::new("datacache must have a mode member of add").on(APITY));
        }
        let definitions = req.get("params").filter(|p| p.is_array()).ok_or_else(|| {
            Rejection::new(
                "datacache adding must have a params member of type array, containing Param definitions.",
            )
            .on(APITY)
        })?;

        let report = self.coordinator.register_datacache_array(definitions);

        let mut reply = req.reply(APITY);
        reply.insert("mode".into(), json!(mode));
        reply.insert("status".into(), json!(report.status()));
        reply.insert("ids".into(), json!(report.ids));
        reply.insert("errors".into(), json!(report.errors));
        self.send(req.conn, &Json::Object(reply));

        let datacache = self.coordinator.datacache();
        let mut ids = Vec::new();
        let mut params = Map::new();
        for id in &report.ids {
            if let Some(handle) = datacache.get(id) {
                ids.push(id.as_str());
                params.insert(id.clone(), handle.read().to_wire_definition());
            }
        }
        if !ids.is_empty() {
            self.coordinator.broadcast_json(
                &json!({
                    "apity": "addedcache",
                    "guid": invoker.guid(),
                    "ids": ids,
                    "params": params,
                }),
                Some(req.conn),
            );
        }
        Ok(())
    }
}
