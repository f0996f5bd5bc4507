// ── `system` / `equipment` / `status` / `purpose` ──

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value as Json, json};

use super::ProtocolDispatcher;
use super::response::{Handled, Rejection, Request};

impl ProtocolDispatcher {
    pub(super) fn handle_equipment(&self, req: &Request<'_>) -> Handled {
        let snapshot = self.coordinator.generate_equipment_snapshot();
        self.send(req.conn, &req.stamp(snapshot));
        Ok(())
    }

    pub(super) fn handle_status(&self, req: &Request<'_>) -> Handled {
        let status = self.coordinator.generate_status();
        self.send(req.conn, &req.stamp(status));
        Ok(())
    }

    /// Group registered participants by the purposes the requester asked for.
    pub(super) fn handle_purpose(&self, req: &Request<'_>) -> Handled {
        let wanted: BTreeSet<&str> = req
            .array_field("equipments")
            .ok_or_else(|| {
                Rejection::new("Purpose listing is missing expected equipment array.").on("purpose")
            })?
            .iter()
            .filter_map(Json::as_str)
            .collect();

        let mut grouped: BTreeMap<&str, Vec<Json>> = BTreeMap::new();
        let equipment = self.coordinator.equipment_snapshot();
        for participant in equipment.iter() {
            if let Some(purpose) = wanted.get(participant.purpose()) {
                grouped.entry(*purpose).or_default().push(participant.to_json());
            }
        }

        let found: Vec<&str> = grouped.keys().copied().collect();
        let missing: Vec<&str> = wanted
            .iter()
            .copied()
            .filter(|purpose| !grouped.contains_key(purpose))
            .collect();
        let equipment: Map<String, Json> = grouped
            .into_iter()
            .map(|(purpose, list)| (purpose.to_owned(), Json::Array(list)))
            .collect();

        let mut reply = req.reply("purpose");
        reply.insert("equipment".into(), Json::Object(equipment));
        reply.insert("found".into(), json!(found));
        reply.insert("missing".into(), json!(missing));
        self.send(req.conn, &Json::Object(reply));
        Ok(())
    }
}
