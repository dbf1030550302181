//! Operation dispatcher.
//!
//! Turns a command into at most three backend calls, with dialogs in between.
//! Each invocation is one sequential async flow. It fetches its own listings,
//! issues every call through the injected `Transport`, asks the user through
//! the injected `DialogProvider` and reports the outcome through the injected
//! `NotificationSink`. Nothing is cached between invocations and nothing is
//! retried. Every failure ends at `execute` as exactly one notice.
//!
//! A flow has two phases. Selection fetches listings and asks the user, and
//! may stop silently on a dismissed dialog. Commit sends the one mutating
//! request.

use crate::commands::Command;
use crate::dialog::{ConfirmPrompt, DialogProvider, SelectPrompt};
use crate::error::{DispatchError, FailureKind, TransportError, classify_cause, is_no_content};
use crate::model::{
    BackendConfig, Context, CourseTitle, GradingScope, MessageResponse, Operation,
    OperationRequest, RequestBody, ResourceListing, Route,
};
use crate::notify::{NoticePolicy, NotificationSink, Severity};
use crate::routing::{self, Plan};
use crate::transport::{Transport, send_json};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::Instrument;

const GRADES_PENDING: &str = "Sending grades to LMS...";
const GRADES_SUCCESS: &str = "Sending grades successful.";

/// Outcome of one command invocation, after the user has been notified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationResult {
    Success { message: String },
    /// A dialog was dismissed or declined. No notice was shown.
    Cancelled,
    Failure { kind: FailureKind, detail: String },
}

/// Entry point consumed by any front end.
#[async_trait]
pub trait DispatchService: Send + Sync {
    /// Run the flow of `operation` on `context`.
    async fn dispatch(&self, operation: Operation, context: Context) -> OperationResult;

    /// Run a registered command.
    async fn execute(&self, command: Command) -> OperationResult;

    /// Title of the session's course for the status widget. Empty on failure.
    async fn course_title(&self) -> String;
}

/// Selection result: the request to commit and an optional pending notice to show while it runs.
struct Commit {
    request: OperationRequest,
    /// Listing the target was picked from. A no-content commit is reported against it.
    source: Route,
    pending: Option<&'static str>,
}

type Selection = Result<Option<Commit>, DispatchError>;

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    dialogs: Arc<dyn DialogProvider>,
    notices: Arc<dyn NotificationSink>,
    no_content_reasons: Vec<String>,
    policy: NoticePolicy,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        dialogs: Arc<dyn DialogProvider>,
        notices: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            transport,
            dialogs,
            notices,
            no_content_reasons: vec!["NoContentFound".to_string(), "NoContentError".to_string()],
            policy: NoticePolicy::default(),
        }
    }

    /// Backend reasons that mean "nothing to act on".
    pub fn with_no_content_reasons(mut self, reasons: Vec<String>) -> Self {
        self.no_content_reasons = reasons;
        self
    }

    pub fn with_notice_policy(mut self, policy: NoticePolicy) -> Self {
        self.policy = policy;
        self
    }

    // -----------------------------------------------------------------------
    // Flow boundary
    // -----------------------------------------------------------------------

    async fn run(&self, command: Command) -> OperationResult {
        let selection = match command {
            Command::Import(context) => self.select_import(context).await,
            Command::Backup | Command::Reset | Command::Delete => {
                self.select_course_operation(command).await
            }
            Command::SendGrades => self.select_grade_target().await,
        };

        match selection {
            Ok(Some(commit)) => self.commit(command, commit).await,
            Ok(None) => {
                tracing::info!("cancelled by user");
                OperationResult::Cancelled
            }
            Err(err) => self.fail(err).await,
        }
    }

    async fn commit(&self, command: Command, commit: Commit) -> OperationResult {
        let pending = match commit.pending {
            Some(message) => Some(self.notices.begin_pending(message).await),
            None => None,
        };

        let outcome = match self.transport.send(&commit.request).await {
            Ok(body) => Ok(success_message(command, commit_response(body))),
            Err(error) if is_no_content(&error, &self.no_content_reasons) => {
                Err(DispatchError::EmptyListing {
                    command,
                    route: commit.source,
                })
            }
            Err(error) => Err(DispatchError::Transport { command, error }),
        };

        let (result, notice) = match outcome {
            Ok(message) => {
                tracing::info!(route = %commit.request.route, verb = %commit.request.verb, "committed");
                let notice = self.policy.notice(Severity::Success, message.clone());
                (OperationResult::Success { message }, notice)
            }
            Err(err) => {
                log_failure(&err);
                let notice = self.policy.notice(err.severity(), err.to_string());
                (
                    OperationResult::Failure {
                        kind: err.kind(),
                        detail: err.to_string(),
                    },
                    notice,
                )
            }
        };

        // The notice must show its final state before the flow returns
        match pending {
            Some(pending) => self.notices.settle(pending, notice).await,
            None => self.notices.notify(notice).await,
        }
        result
    }

    async fn fail(&self, err: DispatchError) -> OperationResult {
        log_failure(&err);
        let detail = err.to_string();
        self.notices
            .notify(self.policy.notice(err.severity(), detail.clone()))
            .await;
        OperationResult::Failure {
            kind: err.kind(),
            detail,
        }
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    /// Fetch a listing fresh. Empty listings and no-content sentinels stop the flow.
    async fn fetch_listing(&self, command: Command, route: Route) -> Result<ResourceListing, DispatchError> {
        let listing = send_json::<ResourceListing>(&*self.transport, &OperationRequest::get(route))
            .await
            .map_err(|error| {
                if is_no_content(&error, &self.no_content_reasons) {
                    DispatchError::EmptyListing { command, route }
                } else {
                    DispatchError::Transport { command, error }
                }
            })?;

        if listing.is_empty() {
            return Err(DispatchError::EmptyListing { command, route });
        }
        if !listing.is_aligned() {
            return Err(DispatchError::Transport {
                command,
                error: TransportError::Decode(format!(
                    "{route} returned {} names but {} paths",
                    listing.names.len(),
                    listing.paths.len()
                )),
            });
        }
        tracing::debug!(%route, items = listing.len(), "listing fetched");
        Ok(listing)
    }

    /// Resolve a selected label against the listing it was chosen from.
    fn resolve(listing: &ResourceListing, label: &str, route: Route) -> Result<String, DispatchError> {
        listing
            .path_of(label)
            .map(str::to_string)
            .ok_or_else(|| DispatchError::Resolution {
                label: label.to_string(),
                route,
            })
    }

    // -----------------------------------------------------------------------
    // Import
    // -----------------------------------------------------------------------

    async fn select_import(&self, context: Context) -> Selection {
        let command = Command::Import(context);
        let plan = routing::import_plan(context);
        let source_route = plan.source.route;
        let destination_route = plan
            .destination
            .map(|step| step.route)
            .unwrap_or(Route::CoursesActive);

        let sources = self.fetch_listing(command, source_route).await?;
        let prompt = SelectPrompt::new(format!("Select {context} to import:"), "Import");
        let Some(source) = self.dialogs.select(&prompt, &sources.names).await else {
            return Ok(None);
        };

        let destinations = self.fetch_listing(command, destination_route).await?;
        let prompt = SelectPrompt::new(format!("Select course to import {source} into:"), "Import");
        let Some(destination) = self.dialogs.select(&prompt, &destinations.names).await else {
            return Ok(None);
        };

        let from_path = Self::resolve(&sources, &source, source_route)?;
        let to_path = Self::resolve(&destinations, &destination, destination_route)?;
        tracing::info!(%source, %destination, "importing {context}");

        Ok(Some(Commit {
            request: commit_request(&plan, RequestBody::Copy { from_path, to_path }),
            source: source_route,
            pending: None,
        }))
    }

    // -----------------------------------------------------------------------
    // Backup / reset / delete
    // -----------------------------------------------------------------------

    async fn select_course_operation(&self, command: Command) -> Selection {
        // Only course commands are routed here
        let (Some(plan), Some(operation)) = (routing::course_plan(command), command.operation()) else {
            return Ok(None);
        };
        let route = plan.source.route;

        let courses = self.fetch_listing(command, route).await?;
        let prompt = SelectPrompt::new(format!("Select course to {operation}:"), operation.title());
        let Some(name) = self.dialogs.select(&prompt, &courses.names).await else {
            return Ok(None);
        };
        let path = Self::resolve(&courses, &name, route)?;
        tracing::info!(course = %name, %path, "{operation} course");

        let body = match command {
            Command::Backup => RequestBody::Backup { path, name },
            Command::Delete => {
                let confirm = ConfirmPrompt::new("Delete course", "Delete")
                    .line("Are you certain that you want to delete")
                    .highlighted_line(name.clone())
                    .line("This cannot be undone.")
                    .destructive();
                if !self.dialogs.confirm(&confirm).await {
                    return Ok(None);
                }
                RequestBody::Path { path }
            }
            _ => RequestBody::Path { path },
        };

        Ok(Some(Commit {
            request: commit_request(&plan, body),
            source: route,
            pending: None,
        }))
    }

    // -----------------------------------------------------------------------
    // Grades
    // -----------------------------------------------------------------------

    async fn select_grade_target(&self) -> Selection {
        let command = Command::SendGrades;

        // Read on every invocation, never cached
        let config = send_json::<BackendConfig>(&*self.transport, &OperationRequest::get(Route::Config))
            .await
            .map_err(|error| DispatchError::Transport { command, error })?;
        let scope = GradingScope::from(&config);
        let Some(plan) = routing::grades_plan(&scope) else {
            return Err(DispatchError::Configuration {
                scope: config.grading_scope,
            });
        };
        let route = plan.source.route;
        let courses = self.fetch_listing(command, route).await?;

        let path = match scope {
            GradingScope::Current => {
                let Some((name, path)) = courses.first() else {
                    return Err(DispatchError::EmptyListing { command, route });
                };
                let confirm = ConfirmPrompt::new("Confirm Send Grades", "Send")
                    .line("Are you sure you want to send all grades of")
                    .highlighted_line(name)
                    .line("to the LMS?");
                if !self.dialogs.confirm(&confirm).await {
                    return Ok(None);
                }
                path.to_string()
            }
            _ => {
                let prompt = SelectPrompt::new("Select course to send grades for:", "Send");
                let Some(name) = self.dialogs.select(&prompt, &courses.names).await else {
                    return Ok(None);
                };
                Self::resolve(&courses, &name, route)?
            }
        };
        tracing::info!(?scope, %path, "sending grades");

        Ok(Some(Commit {
            request: commit_request(&plan, RequestBody::Path { path }),
            source: route,
            pending: Some(GRADES_PENDING),
        }))
    }
}

fn commit_request(plan: &Plan, body: RequestBody) -> OperationRequest {
    OperationRequest::with_body(plan.commit.verb, plan.commit.route, body)
}

/// Any 2xx body counts as success; only an object carrying `message` has text to show.
fn commit_response(body: serde_json::Value) -> MessageResponse {
    serde_json::from_value(body).unwrap_or_else(|e| {
        tracing::debug!("commit response has no message: {e}");
        MessageResponse::default()
    })
}

fn success_message(command: Command, response: MessageResponse) -> String {
    match command {
        Command::SendGrades => GRADES_SUCCESS.to_string(),
        _ if response.message.is_empty() => format!("{} completed.", command.label()),
        _ => response.message,
    }
}

fn log_failure(err: &DispatchError) {
    match err {
        DispatchError::EmptyListing { route, .. } => {
            tracing::info!(%route, "nothing to act on");
        }
        DispatchError::Transport { error, .. } => {
            tracing::error!(cause = classify_cause(error), status = ?error.status(), "{error}");
        }
        other => tracing::error!(kind = ?other.kind(), "{other}"),
    }
}

#[async_trait]
impl DispatchService for Dispatcher {
    async fn dispatch(&self, operation: Operation, context: Context) -> OperationResult {
        match Command::new(operation, context) {
            Ok(command) => self.execute(command).await,
            Err(_) => self.fail(DispatchError::Unsupported { operation, context }).await,
        }
    }

    async fn execute(&self, command: Command) -> OperationResult {
        let span = tracing::info_span!("dispatch", command = %command.id());
        self.run(command).instrument(span).await
    }

    async fn course_title(&self) -> String {
        match send_json::<CourseTitle>(&*self.transport, &OperationRequest::get(Route::Title)).await {
            Ok(title) => title.title,
            Err(error) => {
                tracing::warn!(cause = classify_cause(&error), "course title unavailable: {error}");
                String::new()
            }
        }
    }
}

/// Show the current course title through `dialogs`, or `(no course)` when
/// the service has none to report.
pub async fn show_status(service: &dyn DispatchService, dialogs: &dyn DialogProvider) {
    let title = service.course_title().await;
    let body = if title.is_empty() { "(no course)" } else { title.as_str() };
    dialogs.inform("Course", body).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
