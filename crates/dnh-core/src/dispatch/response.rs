// ── Request context and reply helpers ──

use serde_json::{Map, Value as Json};

use crate::error::ErrorSeverity;
use crate::log::format_error_line;
use crate::transport::ConnectionId;

/// One validated request envelope.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Request<'a> {
    pub conn: ConnectionId,
    pub body: &'a Map<String, Json>,
    pub postage: Option<&'a str>,
}

impl<'a> Request<'a> {
    pub fn get(&self, key: &str) -> Option<&'a Json> {
        self.body.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&'a str> {
        self.body.get(key).and_then(Json::as_str)
    }

    pub fn array_field(&self, key: &str) -> Option<&'a Vec<Json>> {
        self.body.get(key).and_then(Json::as_array)
    }

    /// Start a reply object: `apity`, then `postage` when supplied.
    pub fn reply(&self, apity: &str) -> Map<String, Json> {
        let mut obj = Map::new();
        obj.insert("apity".into(), Json::String(apity.into()));
        if let Some(postage) = self.postage {
            obj.insert("postage".into(), Json::String(postage.into()));
        }
        obj
    }

    /// Append postage to an already-built payload.
    pub fn stamp(&self, mut message: Json) -> Json {
        if let (Some(postage), Some(obj)) = (self.postage, message.as_object_mut()) {
            obj.insert("postage".into(), Json::String(postage.into()));
        }
        message
    }
}

/// A request the hub refuses, reported back as an `error` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rejection {
    pub severity: ErrorSeverity,
    pub reason: String,
    pub request: String,
    /// The hub's own bookkeeping disagrees with itself, as opposed to a
    /// malformed request.
    pub desync: bool,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Error,
            reason: reason.into(),
            request: String::new(),
            desync: false,
        }
    }

    /// A rejection for a state that should be unreachable.
    pub fn desync(reason: impl Into<String>) -> Self {
        Self {
            desync: true,
            ..Self::new(reason)
        }
    }

    /// The line handed to the log sink.
    pub fn log_line(&self) -> String {
        let line = format_error_line(self.severity, &self.reason, &self.request);
        if self.desync {
            format!("State desync detected. {line}")
        } else {
            line
        }
    }

    /// Name the command the error relates to.
    #[must_use]
    pub fn on(mut self, request: impl Into<String>) -> Self {
        self.request = request.into();
        self
    }
}

pub(crate) type Handled = Result<(), Rejection>;

/// `{apity:"error", reason, [request], [postage]}`.
pub(crate) fn error_reply(reason: &str, request: &str, postage: Option<&str>) -> Json {
    let mut obj = Map::new();
    obj.insert("apity".into(), Json::String("error".into()));
    obj.insert("reason".into(), Json::String(reason.into()));
    if !request.is_empty() {
        obj.insert("request".into(), Json::String(request.into()));
    }
    if let Some(postage) = postage {
        obj.insert("postage".into(), Json::String(postage.into()));
    }
    Json::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn error_reply_omits_empty_fields() {
        assert_eq!(
            error_reply("Invalid request object.", "", None),
            json!({"apity": "error", "reason": "Invalid request object."})
        );
        assert_eq!(
            error_reply("Unknown apity.", "bogus", Some("p1")),
            json!({"apity": "error", "reason": "Unknown apity.", "request": "bogus", "postage": "p1"})
        );
    }

    #[test]
    fn desync_rejections_are_marked_in_the_log() {
        let routine = Rejection::new("Unknown apity.").on("bogus");
        assert_eq!(
            routine.log_line(),
            "Error of type Error:Unknown apity. - Request: bogus"
        );

        let desync = Rejection::desync("Requestor not recognized as Registered").on("valget");
        assert!(desync.desync);
        assert_eq!(
            desync.log_line(),
            "State desync detected. Error of type Error:Requestor not recognized as Registered - Request: valget"
        );
    }

    #[test]
    fn reply_carries_postage() {
        let body = Map::new();
        let req = Request {
            conn: ConnectionId::from_raw(1),
            body: &body,
            postage: Some("abc"),
        };
        assert_eq!(
            Json::Object(req.reply("status")),
            json!({"apity": "status", "postage": "abc"})
        );
        assert_eq!(
            req.stamp(json!({"apity": "equipment"})),
            json!({"apity": "equipment", "postage": "abc"})
        );
    }
}
