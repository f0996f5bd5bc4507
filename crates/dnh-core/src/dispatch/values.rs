// ── `valget` / `valset` ──

use std::sync::Arc;

use serde_json::{Map, Value as Json, json};

use super::ProtocolDispatcher;
use super::response::{Handled, Rejection, Request};
use crate::coordinator::{SELF_GUID, SYSTEM_GUID};
use crate::model::{Participant, RawValue, SetOutcome, ValueSet};

/// The parameter owner a value request addresses.
enum Target {
    Participant(Arc<Participant>),
    System(ValueSet),
}

impl Target {
    fn guid(&self) -> &str {
        match self {
            Self::Participant(p) => p.guid(),
            Self::System(_) => SYSTEM_GUID,
        }
    }

    fn params(&self) -> &ValueSet {
        match self {
            Self::Participant(p) => p.params(),
            Self::System(cache) => cache,
        }
    }
}

impl ProtocolDispatcher {
    /// Look up the requester and resolve `guid` to a target.
    fn resolve_target(
        &self,
        req: &Request<'_>,
        guid: &str,
        apity: &str,
    ) -> Result<(Arc<Participant>, Target), Rejection> {
        let equipment = self.coordinator.equipment_snapshot();
        let sender = equipment
            .find_by_connection(req.conn)
            .ok_or_else(|| Rejection::desync("Requestor not recognized as Registered").on(apity))?;

        let target = match guid {
            SELF_GUID => Target::Participant(Arc::clone(&sender)),
            SYSTEM_GUID => Target::System(self.coordinator.datacache()),
            other => Target::Participant(
                equipment
                    .find_by_guid(other)
                    .ok_or_else(|| Rejection::new("Target equipment is not Registered.").on(apity))?,
            ),
        };
        Ok((sender, target))
    }

    pub(super) fn handle_valget(&self, req: &Request<'_>) -> Handled {
        const APITY: &str = "valget";
        self.coordinator
            .sink()
            .log_verbose("Responding to valget request");

        let guid = req
            .str_field("guid")
            .ok_or_else(|| Rejection::new("Request to get value missing Equipment GUID.").on(APITY))?;
        let gets = req.array_field("gets").ok_or_else(|| {
            Rejection::new("Expected gets member as array with target ids to retrieve.").on(APITY)
        })?;
        let (_, target) = self.resolve_target(req, guid, APITY)?;

        let mut bad_gets = false;
        let mut unknown = Vec::new();
        let mut values = Vec::new();
        for entry in gets {
            let Some(id) = entry.as_str() else {
                bad_gets = true;
                continue;
            };
            match target.params().get(id) {
                Some(handle) => {
                    let value = handle.read();
                    values.push(json!({
                        "id": value.id(),
                        "type": value.data_type().wire_name(),
                        "val": value.to_wire_value(),
                    }));
                }
                None => unknown.push(id),
            }
        }

        let mut reply = req.reply(APITY);
        reply.insert("reqguid".into(), json!(guid));
        reply.insert("guid".into(), json!(target.guid()));
        reply.insert("gets".into(), Json::Array(values));
        if bad_gets || !unknown.is_empty() {
            let issues: Vec<String> = bad_gets
                .then(|| "Bad_Gets".to_owned())
                .into_iter()
                .chain(unknown.iter().map(|id| format!("No_Record {id}")))
                .collect();
            reply.insert("issues".into(), json!(issues));
        }
        self.send(req.conn, &Json::Object(reply));
        Ok(())
    }

    pub(super) fn handle_valset(&self, req: &Request<'_>) -> Handled {
        const APITY: &str = "valset";
        self.coordinator
            .sink()
            .log_verbose("Responding to valset request");

        let guid = req
            .str_field("guid")
            .ok_or_else(|| Rejection::new("Request to get value missing Equipment GUID.").on(APITY))?;
        let sets = req.get("sets").and_then(Json::as_object).ok_or_else(|| {
            Rejection::new("Expected sets member as object with target ids to retrieve.").on(APITY)
        })?;
        let (sender, target) = self.resolve_target(req, guid, APITY)?;
        let params = target.params();

        let mut statuses = Map::new();
        let mut broadcast = Map::new();
        for (id, input) in sets {
            let status = match params.get(id) {
                None => "notexist",
                Some(_) if RawValue::from_json(input).is_none() => "unknownvalue",
                Some(_) => {
                    let outcome = params.update(id, input).unwrap_or(SetOutcome::Invalid);
                    outcome.status()
                }
            };

            let mut entry = Map::new();
            entry.insert("status".into(), json!(status));
            if let Some(handle) = params.get(id) {
                let val = handle.read().to_wire_value();
                if matches!(status, "success" | "submit") {
                    broadcast.insert(
                        id.clone(),
                        json!({ "id": id, "status": status, "val": val.clone() }),
                    );
                }
                entry.insert("val".into(), val);
            }
            statuses.insert(id.clone(), Json::Object(entry));
        }

        let mut reply = req.reply(APITY);
        reply.insert("guid".into(), json!(guid));
        reply.insert("ids".into(), json!(sets.keys().collect::<Vec<_>>()));
        reply.insert("sets".into(), Json::Object(statuses));
        self.send(req.conn, &Json::Object(reply));

        if !broadcast.is_empty() {
            let ids: Vec<&String> = broadcast.keys().collect();
            let message = json!({
                "apity": "changedval",
                "guid": target.guid(),
                "invoker": sender.guid(),
                "ids": ids,
                "sets": broadcast,
            });
            self.coordinator.broadcast_json(&message, Some(req.conn));
        }
        Ok(())
    }
}
