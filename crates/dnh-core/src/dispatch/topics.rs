// ── `subscribe` / `publish` ──

use std::collections::BTreeSet;

use serde_json::{Value as Json, json};
use tracing::debug;

use super::ProtocolDispatcher;
use super::response::{Handled, Rejection, Request};

impl ProtocolDispatcher {
    pub(super) fn handle_subscribe(&self, req: &Request<'_>) -> Handled {
        const APITY: &str = "subscribe";
        let mode = req
            .str_field("mode")
            .filter(|m| matches!(*m, "add" | "rem" | "report"))
            .ok_or_else(|| {
                Rejection::new("subscribe must have a mode member of either add, rem, or report.")
                    .on(APITY)
            })?;

        if mode == "report" {
            let participant = self
                .coordinator
                .equipment_snapshot()
                .find_by_connection(req.conn)
                .ok_or_else(|| Rejection::desync("Could not verify registration.").on(APITY))?;

            let mut reply = req.reply(APITY);
            reply.insert("mode".into(), json!("report"));
            reply.insert("status".into(), json!("success"));
            reply.insert("topics".into(), json!(participant.subscriptions()));
            self.send(req.conn, &Json::Object(reply));
            return Ok(());
        }

        let topics: Vec<&str> = req
            .array_field("topics")
            .ok_or_else(|| {
                Rejection::new("subscribe must have a mode topics member of type array.").on(APITY)
            })?
            .iter()
            .filter_map(Json::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let participant = self
            .coordinator
            .equipment_snapshot()
            .find_by_connection(req.conn)
            .ok_or_else(|| {
                Rejection::desync("Corrupted state detected while modifying subscriptions.").on(APITY)
            })?;

        let changed = if mode == "add" {
            participant.subscribe(&topics)
        } else {
            participant.unsubscribe(&topics)
        };

        let mut reply = req.reply(APITY);
        reply.insert("mode".into(), json!(mode));
        reply.insert("status".into(), json!(if changed { "success" } else { "fail" }));
        self.send(req.conn, &Json::Object(reply));
        Ok(())
    }

    /// Relay `data` to explicit GUIDs or to every subscriber of a topic.
    pub(super) fn handle_publish(&self, req: &Request<'_>) -> Handled {
        const APITY: &str = "publish";
        let data = req
            .get("data")
            .ok_or_else(|| Rejection::new("publish's data member is missing.").on(APITY))?;
        if !data.is_object() {
            return Err(Rejection::new("publish's data member isn't an object.").on(APITY));
        }

        let equipment = self.coordinator.equipment_snapshot();
        let (message, recipients) = if let Some(guids) = req.get("guids") {
            let guids = guids
                .as_array()
                .ok_or_else(|| Rejection::new("publish's guid member isn't an array.").on(APITY))?;
            let recipients: Vec<_> = guids
                .iter()
                .filter_map(Json::as_str)
                .filter_map(|guid| equipment.find_by_guid(guid))
                .collect();
            (json!({ "apity": "msg", "mode": "guids", "data": data }), recipients)
        } else if let Some(topic) = req.get("topic") {
            let topic = topic
                .as_str()
                .ok_or_else(|| Rejection::new("publish's topic member must be a string.").on(APITY))?;
            let recipients: Vec<_> = equipment
                .iter()
                .filter(|p| p.is_subscribed(topic))
                .cloned()
                .collect();
            (
                json!({ "apity": "msg", "mode": "topic", "topic": topic, "data": data }),
                recipients,
            )
        } else {
            return Err(
                Rejection::new("publish request must either have a guids or topic member.").on(APITY),
            );
        };

        let mut anyrecv = false;
        for participant in &recipients {
            match self.coordinator.send_json(participant.connection(), &message) {
                Ok(()) => anyrecv = true,
                Err(e) => debug!(guid = %participant.guid(), error = %e, "publish not delivered"),
            }
        }

        let mut reply = req.reply(APITY);
        reply.insert("anyrecv".into(), json!(anyrecv));
        self.send(req.conn, &Json::Object(reply));
        Ok(())
    }
}
