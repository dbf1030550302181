//! Error taxonomy and classification.
//!
//! Transport errors are classified twice: once against the configured
//! no-content sentinels (which turn a failure into an informational "nothing
//! to act on" notice), and once into a coarse cause used for log fields.

use crate::commands::Command;
use crate::model::{Context, Operation, Route};
use crate::notify::Severity;
use std::fmt;

const CONTACT_HINT: &str = "Contact administrator or see logs for more details.";

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failure reported by a `Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Backend answered with a non-success status; `reason` is the machine-readable reason string.
    Backend { status: u16, reason: String },
    /// Backend answered 204 No Content.
    NoContent,
    /// Request could not be sent or the response could not be read.
    Network(String),
    /// Response body was not the expected JSON shape.
    Decode(String),
}

impl TransportError {
    /// Raw reason text as shown to the user.
    pub fn reason(&self) -> &str {
        match self {
            TransportError::Backend { reason, .. } => reason,
            TransportError::NoContent => "NoContent",
            TransportError::Network(msg) | TransportError::Decode(msg) => msg,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Backend { status, .. } => Some(*status),
            TransportError::NoContent => Some(204),
            _ => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Backend { status, reason } => write!(f, "{reason} (HTTP {status})"),
            TransportError::NoContent => write!(f, "No content"),
            TransportError::Network(msg) => write!(f, "Network error: {msg}"),
            TransportError::Decode(msg) => write!(f, "Invalid response: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Whether an error means "nothing to act on" rather than a failure.
///
/// Sentinel spelling differs across backend revisions, so the accepted
/// values come from configuration and are compared exactly after trimming.
pub fn is_no_content(err: &TransportError, sentinels: &[String]) -> bool {
    match err {
        TransportError::NoContent => true,
        TransportError::Backend { reason, .. } => {
            let reason = reason.trim();
            sentinels.iter().any(|s| s.trim() == reason)
        }
        _ => false,
    }
}

/// Classify a transport error into a coarse cause for logging.
///
/// Returns one of: "network", "server", "auth", "not_found", "validation", "decode", "unknown".
pub fn classify_cause(err: &TransportError) -> &'static str {
    match err {
        TransportError::Network(_) => "network",
        TransportError::Decode(_) => "decode",
        TransportError::NoContent => "not_found",
        TransportError::Backend { status, reason } => match status {
            401 | 403 => "auth",
            404 => "not_found",
            400 | 409 | 422 => "validation",
            500..=599 => "server",
            _ => classify_reason(reason),
        },
    }
}

/// Pattern-based fallback for statuses that carry no meaning on their own.
fn classify_reason(reason: &str) -> &'static str {
    let lower = reason.to_lowercase();

    if lower.contains("internal server error")
        || lower.contains("service unavailable")
        || lower.contains("bad gateway")
    {
        return "server";
    }
    // Bare status codes only, so "5000ms" or "15001" don't match
    {
        lazy_static::lazy_static! {
            static ref HTTP_5XX: regex::Regex =
                regex::Regex::new(r"\b50[0234]\b").unwrap();
        }
        if HTTP_5XX.is_match(&lower) {
            return "server";
        }
    }

    if lower.contains("connection refused") || lower.contains("timeout") || lower.contains("timed out") {
        return "network";
    }

    if lower.contains("unauthorized") || lower.contains("forbidden") || lower.contains("not authorized") {
        return "auth";
    }

    if lower.contains("invalid") || lower.contains("missing") {
        return "validation";
    }

    "unknown"
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyListing,
    Transport,
    Resolution,
    Configuration,
    Unsupported,
}

impl FailureKind {
    /// An empty listing is informational; everything else is an error.
    pub fn severity(self) -> Severity {
        match self {
            FailureKind::EmptyListing => Severity::Info,
            _ => Severity::Error,
        }
    }
}

/// Terminal outcome of a flow that did not complete. Cancellation is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A listing returned zero items (or the backend's no-content sentinel).
    EmptyListing { command: Command, route: Route },
    /// Network or backend error. Never retried.
    Transport { command: Command, error: TransportError },
    /// A selected label is missing from the listing it was chosen from.
    Resolution { label: String, route: Route },
    /// Backend grading scope is neither `current` nor `all`.
    Configuration { scope: String },
    /// The operation does not exist for the context (e.g. backup of a problem).
    Unsupported { operation: Operation, context: Context },
}

impl DispatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DispatchError::EmptyListing { .. } => FailureKind::EmptyListing,
            DispatchError::Transport { .. } => FailureKind::Transport,
            DispatchError::Resolution { .. } => FailureKind::Resolution,
            DispatchError::Configuration { .. } => FailureKind::Configuration,
            DispatchError::Unsupported { .. } => FailureKind::Unsupported,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }
}

/// Plural noun shown for a listing route.
fn route_noun(route: Route) -> &'static str {
    match route {
        Route::Courses | Route::CoursesActive | Route::CoursesCurrent => "courses",
        Route::Assignments => "assignments",
        Route::Problems => "problems",
        Route::Grades => "grades",
        Route::Config => "config",
        Route::Title => "title",
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::EmptyListing { command, route } => {
                let noun = route_noun(*route);
                match command {
                    Command::Import(_) => write!(f, "No {noun} found that could be copied. {CONTACT_HINT}"),
                    Command::Backup => write!(f, "No {noun} found that could be backed up. {CONTACT_HINT}"),
                    Command::Reset => write!(f, "No {noun} found that could be reset. {CONTACT_HINT}"),
                    Command::Delete => write!(f, "No {noun} found that could be deleted. {CONTACT_HINT}"),
                    Command::SendGrades if *route == Route::CoursesCurrent => {
                        write!(f, "No current course found to send grades for. {CONTACT_HINT}")
                    }
                    Command::SendGrades => write!(f, "No {noun} found to send grades for. {CONTACT_HINT}"),
                }
            }
            DispatchError::Transport { command: Command::SendGrades, error } => {
                write!(f, "Sending grades failed with {}", error.reason())
            }
            DispatchError::Transport { command, error } => match (command.context(), command.operation()) {
                (Some(ctx), Some(op)) => write!(f, "{} while {ctx} {op}. {CONTACT_HINT}", error.reason()),
                _ => write!(f, "{}. {CONTACT_HINT}", error.reason()),
            },
            DispatchError::Resolution { label, route } => {
                write!(f, "\"{label}\" is no longer available in {}. {CONTACT_HINT}", route_noun(*route))
            }
            DispatchError::Configuration { scope } => {
                write!(f, "Unsupported grading scope \"{scope}\". {CONTACT_HINT}")
            }
            DispatchError::Unsupported { operation, context } => {
                write!(f, "Unsupported command: {operation} {context}")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sentinels() -> Vec<String> {
        vec!["NoContentFound".to_string(), "NoContentError".to_string()]
    }

    fn backend(status: u16, reason: &str) -> TransportError {
        TransportError::Backend {
            status,
            reason: reason.to_string(),
        }
    }

    // -- No-content sentinel --

    #[test]
    fn both_sentinel_spellings_match() {
        assert!(is_no_content(&backend(404, "NoContentFound"), &sentinels()));
        assert!(is_no_content(&backend(404, "NoContentError"), &sentinels()));
        assert!(is_no_content(&backend(404, " NoContentFound\n"), &sentinels()));
    }

    #[test]
    fn sentinel_match_is_exact() {
        assert!(!is_no_content(&backend(404, "nocontentfound"), &sentinels()));
        assert!(!is_no_content(&backend(500, "NoContentFoundX"), &sentinels()));
        assert!(!is_no_content(&TransportError::Network("NoContentFound".into()), &sentinels()));
    }

    #[test]
    fn sentinel_list_is_configurable() {
        let custom = vec!["Empty".to_string()];
        assert!(is_no_content(&backend(404, "Empty"), &custom));
        assert!(!is_no_content(&backend(404, "NoContentFound"), &custom));
    }

    #[test]
    fn http_204_is_always_no_content() {
        assert!(is_no_content(&TransportError::NoContent, &[]));
    }

    // -- Cause classification --

    #[test]
    fn classifies_by_status() {
        assert_eq!(classify_cause(&backend(401, "x")), "auth");
        assert_eq!(classify_cause(&backend(403, "x")), "auth");
        assert_eq!(classify_cause(&backend(404, "x")), "not_found");
        assert_eq!(classify_cause(&backend(422, "x")), "validation");
        assert_eq!(classify_cause(&backend(502, "x")), "server");
    }

    #[test]
    fn classifies_by_reason_when_status_is_vague() {
        assert_eq!(classify_cause(&backend(418, "Internal Server Error")), "server");
        assert_eq!(classify_cause(&backend(418, "upstream said 503")), "server");
        assert_eq!(classify_cause(&backend(418, "waited 5000ms")), "unknown");
        assert_eq!(classify_cause(&backend(418, "Unauthorized user")), "auth");
        assert_eq!(classify_cause(&backend(418, "missing path")), "validation");
        assert_eq!(classify_cause(&backend(418, "something odd")), "unknown");
    }

    #[test]
    fn classifies_non_backend_errors() {
        assert_eq!(classify_cause(&TransportError::Network("refused".into())), "network");
        assert_eq!(classify_cause(&TransportError::Decode("eof".into())), "decode");
        assert_eq!(classify_cause(&TransportError::NoContent), "not_found");
    }

    // -- Messages --

    #[test]
    fn empty_listing_message_names_collection() {
        let err = DispatchError::EmptyListing {
            command: Command::Import(Context::Problem),
            route: Route::Problems,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("No problems found that could be copied."), "{msg}");
        assert_eq!(err.severity(), Severity::Info);
    }

    #[test]
    fn empty_grade_listing_names_scope() {
        let current = DispatchError::EmptyListing {
            command: Command::SendGrades,
            route: Route::CoursesCurrent,
        };
        let all = DispatchError::EmptyListing {
            command: Command::SendGrades,
            route: Route::CoursesActive,
        };
        assert_eq!(
            current.to_string(),
            "No current course found to send grades for. Contact administrator or see logs for more details."
        );
        assert!(all.to_string().starts_with("No courses found to send grades for."));
    }

    #[test]
    fn transport_message_includes_context_operation_and_reason() {
        let err = DispatchError::Transport {
            command: Command::Delete,
            error: backend(500, "PermissionDenied"),
        };
        assert_eq!(
            err.to_string(),
            "PermissionDenied while course delete. Contact administrator or see logs for more details."
        );
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn grade_transport_message() {
        let err = DispatchError::Transport {
            command: Command::SendGrades,
            error: backend(500, "LMSUnreachable"),
        };
        assert_eq!(err.to_string(), "Sending grades failed with LMSUnreachable");
    }

    #[test]
    fn resolution_and_configuration_are_errors() {
        let res = DispatchError::Resolution {
            label: "HW9".into(),
            route: Route::Assignments,
        };
        assert_eq!(res.kind(), FailureKind::Resolution);
        assert!(res.to_string().contains("\"HW9\" is no longer available in assignments"));

        let cfg = DispatchError::Configuration { scope: "some".into() };
        assert_eq!(cfg.severity(), Severity::Error);
        assert!(cfg.to_string().contains("Unsupported grading scope \"some\""));
    }

    #[test]
    fn unsupported_command_message() {
        let err = DispatchError::Unsupported {
            operation: Operation::Reset,
            context: Context::Assignment,
        };
        assert_eq!(err.to_string(), "Unsupported command: reset assignment");
        assert_eq!(err.kind(), FailureKind::Unsupported);
    }

    #[test]
    fn transport_error_display_and_status() {
        assert_eq!(backend(404, "Gone").to_string(), "Gone (HTTP 404)");
        assert_eq!(backend(404, "Gone").status(), Some(404));
        assert_eq!(TransportError::Network("down".into()).status(), None);
        assert_eq!(TransportError::Network("down".into()).reason(), "down");
    }
}
