// ── `register` ──

use serde_json::{Map, Value as Json, json};

use super::ProtocolDispatcher;
use super::response::{Handled, Rejection, Request};
use crate::coordinator::lock;
use crate::model::{EquipmentType, Registration, ValueSet, type_json};

/// Request keys consumed by registration; everything else is client data.
const RESERVED_KEYS: [&str; 10] = [
    "apity",
    "postage",
    "guid",
    "type",
    "name",
    "manufacturer",
    "params",
    "topics",
    "purpose",
    "hostname",
];

/// Parse a `register` request body into a [`Registration`].
pub fn parse_registration(body: &Map<String, Json>) -> Result<Registration, String> {
    let text = |key: &str| {
        body.get(key)
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_owned()
    };

    let type_name = text("type");
    if type_name.is_empty() {
        return Err("Registration is missing equipment type.".into());
    }
    let eq_type = EquipmentType::from_wire(&type_name);
    if eq_type == Some(EquipmentType::System) {
        return Err(
            "Equipment type system cannot be registered; it is a reserved type.".into(),
        );
    }

    let name = text("name");
    if name.is_empty() {
        return Err("Registration is missing equipment name.".into());
    }

    let mut params = ValueSet::new();
    match body.get("params") {
        None => {}
        Some(Json::Array(definitions)) => {
            for definition in definitions {
                params.parse_and_insert(definition)?;
            }
        }
        Some(_) => {
            return Err("Registration params must be an array of parameter definitions.".into());
        }
    }

    let topics = body
        .get("topics")
        .and_then(Json::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Json::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let client_data = body
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Registration {
        guid: body.get("guid").and_then(Json::as_str).map(str::to_owned),
        name,
        manufacturer: text("manufacturer"),
        purpose: text("purpose"),
        hostname: text("hostname"),
        eq_type,
        params,
        client_data,
        topics,
    })
}

impl ProtocolDispatcher {
    pub(super) fn handle_register(&self, req: &Request<'_>) -> Handled {
        const REREGISTER: &str = "Attempting to re-register. Equipment can only be registered once.";

        if !lock(&self.pending).contains(&req.conn) {
            return Err(Rejection::new(REREGISTER));
        }
        let registration = parse_registration(req.body).map_err(Rejection::new)?;

        let participant = {
            let mut pending = lock(&self.pending);
            // A concurrent register on this connection may have won meanwhile.
            if !pending.remove(&req.conn) {
                return Err(Rejection::new(REREGISTER));
            }
            match self.coordinator.register(req.conn, registration) {
                Ok(participant) => participant,
                Err(e) => {
                    pending.insert(req.conn);
                    tracing::warn!(conn = %req.conn, error = %e, "registration refused");
                    return Err(Rejection::new(
                        "Could not register for unknown reason. Server state corrupted, or attempting to re-register?",
                    )
                    .on("register"));
                }
            }
        };

        let mut reply = req.reply("register");
        reply.insert("status".into(), json!("success"));
        reply.insert("guid".into(), json!(participant.guid()));
        self.send(req.conn, &Json::Object(reply));

        self.coordinator.broadcast_json(
            &json!({
                "apity": "changedroster",
                "change": "add",
                "guid": participant.guid(),
                "name": participant.name(),
                "type": type_json(participant.eq_type()),
            }),
            Some(req.conn),
        );

        self.coordinator
            .sink()
            .log(&format!("Registered Equipment with GUID {}", participant.guid()));
        Ok(())
    }
}
