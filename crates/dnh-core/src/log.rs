// ── Log sink ──
//
// Hub events are reported through a capability handed to the
// coordinator, so embedders and tests can capture them.

use crate::error::ErrorSeverity;

/// Destination for hub log lines.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);

    fn log_verbose(&self, message: &str);

    fn log_error(&self, severity: ErrorSeverity, message: &str);
}

/// Forwards to `tracing` under the `dnh` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        tracing::info!(target: "dnh", "{message}");
    }

    fn log_verbose(&self, message: &str) {
        tracing::debug!(target: "dnh", "{message}");
    }

    fn log_error(&self, severity: ErrorSeverity, message: &str) {
        match severity {
            ErrorSeverity::Log => tracing::info!(target: "dnh", severity = %severity, "{message}"),
            ErrorSeverity::Warning => {
                tracing::warn!(target: "dnh", severity = %severity, "{message}");
            }
            ErrorSeverity::Error | ErrorSeverity::Fatal => {
                tracing::error!(target: "dnh", severity = %severity, "{message}");
            }
        }
    }
}

/// The line written for a protocol error.
pub(crate) fn format_error_line(severity: ErrorSeverity, reason: &str, request: &str) -> String {
    if request.is_empty() {
        format!("Error of type {severity}:{reason}")
    } else {
        format!("Error of type {severity}:{reason} - Request: {request}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_line_includes_request_when_present() {
        assert_eq!(
            format_error_line(ErrorSeverity::Error, "Unknown apity.", "bogus"),
            "Error of type Error:Unknown apity. - Request: bogus"
        );
        assert_eq!(
            format_error_line(ErrorSeverity::Warning, "oops", ""),
            "Error of type Warning:oops"
        );
    }
}
