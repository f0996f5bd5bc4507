// ── Protocol dispatcher ──
//
// Per-connection command router for the realtime protocol. A new
// connection starts pending; its first accepted command must be
// `register`. Everything else is routed by `apity`.

mod datacache;
mod register;
mod response;
mod roster;
mod topics;
mod values;

use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::Value as Json;
use tracing::{debug, error};

use crate::coordinator::{Coordinator, lock};
use crate::transport::ConnectionId;

use response::{Handled, Rejection, Request, error_reply};

pub use register::parse_registration;

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Pending,
    Registered,
    Closed,
}

/// Routes inbound frames to the coordinator and queues the replies.
pub struct ProtocolDispatcher {
    coordinator: Coordinator,
    pending: Mutex<HashSet<ConnectionId>>,
}

impl ProtocolDispatcher {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn state(&self, conn: ConnectionId) -> ConnectionState {
        if lock(&self.pending).contains(&conn) {
            ConnectionState::Pending
        } else if self.coordinator.equipment_snapshot().find_by_connection(conn).is_some() {
            ConnectionState::Registered
        } else {
            ConnectionState::Closed
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Track a freshly opened connection as pending.
    pub fn on_open(&self, conn: ConnectionId) {
        lock(&self.pending).insert(conn);
        debug!(conn = %conn, "connection opened");
    }

    /// Forget a connection. Safe to call more than once.
    pub fn on_close(&self, conn: ConnectionId, reason: &str) {
        let was_pending = lock(&self.pending).remove(&conn);
        let removed = self.coordinator.unregister_connection(conn);
        if !was_pending && removed.is_none() {
            return;
        }

        self.coordinator
            .sink()
            .log(&format!("Removing connection : {reason}"));
        if let Some(guid) = removed {
            self.coordinator.broadcast_json(
                &serde_json::json!({ "apity": "changedroster", "change": "rem", "guid": guid }),
                None,
            );
        }
    }

    // ── Inbound ──────────────────────────────────────────────────────

    /// Handle one text frame from `conn`.
    pub fn on_message(&self, conn: ConnectionId, text: &str) {
        let js: Json = match serde_json::from_str(text) {
            Ok(js) => js,
            Err(e) => {
                self.send_error(conn, &Rejection::new(format!("Request is not valid JSON: {e}")), None);
                self.coordinator.sink().log("Rejected non-JSON request.");
                return;
            }
        };

        let Some(body) = js.as_object() else {
            self.send_error(conn, &Rejection::new("Invalid request object."), None);
            return;
        };

        let req = Request {
            conn,
            body,
            postage: body.get("postage").and_then(Json::as_str),
        };

        let Some(apity) = req.str_field("apity") else {
            self.send_error(conn, &Rejection::new("Request missing apity member."), req.postage);
            return;
        };

        let result = if apity == "register" {
            self.handle_register(&req)
        } else if lock(&self.pending).contains(&conn) {
            Err(Rejection::new("Connection must be registered to submit request."))
        } else {
            self.route(apity, &req)
        };

        if let Err(rejection) = result {
            self.send_error(conn, &rejection, req.postage);
        }
    }

    fn route(&self, apity: &str, req: &Request<'_>) -> Handled {
        debug!(conn = %req.conn, apity, "dispatching request");
        match apity {
            "valset" => self.handle_valset(req),
            "valget" => self.handle_valget(req),
            "system" | "equipment" => self.handle_equipment(req),
            "status" => self.handle_status(req),
            "arm" | "disarm" => {
                self.coordinator
                    .sink()
                    .log_verbose(&format!("Received {apity} request; no action taken."));
                Ok(())
            }
            "purpose" => self.handle_purpose(req),
            "subscribe" => self.handle_subscribe(req),
            "publish" => self.handle_publish(req),
            "datacache" => self.handle_datacache(req),
            other => Err(Rejection::new("Unknown apity.").on(other)),
        }
    }

    // ── Outbound ─────────────────────────────────────────────────────

    fn send(&self, conn: ConnectionId, message: &Json) {
        if let Err(e) = self.coordinator.send_json(conn, message) {
            debug!(conn = %conn, error = %e, "reply not delivered");
        }
    }

    fn send_error(&self, conn: ConnectionId, rejection: &Rejection, postage: Option<&str>) {
        if rejection.desync {
            error!(conn = %conn, reason = %rejection.reason, desync = true, "hub state out of sync");
        }
        self.coordinator
            .sink()
            .log_error(rejection.severity, &rejection.log_line());
        self.send(conn, &error_reply(&rejection.reason, &rejection.request, postage));
    }
}
