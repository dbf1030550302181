//! Wire and domain types shared by the dispatcher, the transport and the proxy.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Operation / Context
// ---------------------------------------------------------------------------

/// User-facing intent. Determines the HTTP verb of the commit call and the dialog flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Import,
    Backup,
    Reset,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Import,
        Operation::Backup,
        Operation::Reset,
        Operation::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Import => "import",
            Operation::Backup => "backup",
            Operation::Reset => "reset",
            Operation::Delete => "delete",
        }
    }

    /// Capitalized form used in labels and dialog buttons.
    pub fn title(self) -> &'static str {
        match self {
            Operation::Import => "Import",
            Operation::Backup => "Backup",
            Operation::Reset => "Reset",
            Operation::Delete => "Delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resource kind being acted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Context {
    Course,
    Assignment,
    Problem,
}

impl Context {
    pub const ALL: [Context; 3] = [Context::Course, Context::Assignment, Context::Problem];

    pub fn as_str(self) -> &'static str {
        match self {
            Context::Course => "course",
            Context::Assignment => "assignment",
            Context::Problem => "problem",
        }
    }

    /// Backend collection holding resources of this kind.
    pub fn collection(self) -> Route {
        match self {
            Context::Course => Route::Courses,
            Context::Assignment => Route::Assignments,
            Context::Problem => Route::Problems,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ctx| ctx.as_str() == s)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Route / Verb
// ---------------------------------------------------------------------------

/// Backend endpoint, relative to the service prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Courses,
    CoursesActive,
    CoursesCurrent,
    Assignments,
    Problems,
    Grades,
    Config,
    Title,
}

impl Route {
    pub const ALL: [Route; 8] = [
        Route::Courses,
        Route::CoursesActive,
        Route::CoursesCurrent,
        Route::Assignments,
        Route::Problems,
        Route::Grades,
        Route::Config,
        Route::Title,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Route::Courses => "courses",
            Route::CoursesActive => "courses/active",
            Route::CoursesCurrent => "courses/current",
            Route::Assignments => "assignments",
            Route::Problems => "problems",
            Route::Grades => "grades",
            Route::Config => "config",
            Route::Title => "title",
        }
    }

}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verb> for reqwest::Method {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Get => reqwest::Method::GET,
            Verb::Post => reqwest::Method::POST,
            Verb::Put => reqwest::Method::PUT,
            Verb::Patch => reqwest::Method::PATCH,
            Verb::Delete => reqwest::Method::DELETE,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// JSON body of an operation request. `Empty` is never serialized onto the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    Copy {
        #[serde(rename = "fromPath")]
        from_path: String,
        #[serde(rename = "toPath")]
        to_path: String,
    },
    Backup {
        path: String,
        name: String,
    },
    Path {
        path: String,
    },
    Empty {},
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty {})
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationRequest {
    pub verb: Verb,
    pub route: Route,
    pub body: RequestBody,
}

impl OperationRequest {
    pub fn get(route: Route) -> Self {
        Self {
            verb: Verb::Get,
            route,
            body: RequestBody::Empty {},
        }
    }

    pub fn with_body(verb: Verb, route: Route, body: RequestBody) -> Self {
        Self { verb, route, body }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Index-aligned names/paths pair returned by a listing query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceListing {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
}

impl ResourceListing {
    pub fn new(names: Vec<String>, paths: Vec<String>) -> Self {
        Self { names, paths }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Names and paths must pair up one to one.
    pub fn is_aligned(&self) -> bool {
        self.names.len() == self.paths.len()
    }

    /// Path of the first entry whose name equals `label`.
    pub fn path_of(&self, label: &str) -> Option<&str> {
        let index = self.names.iter().position(|name| name == label)?;
        self.paths.get(index).map(String::as_str)
    }

    /// First entry of the listing, used for the single-element `courses/current` record.
    pub fn first(&self) -> Option<(&str, &str)> {
        match (self.names.first(), self.paths.first()) {
            (Some(name), Some(path)) => Some((name.as_str(), path.as_str())),
            _ => None,
        }
    }
}

/// Response of a mutating call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Course title shown by the status widget.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseTitle {
    #[serde(default)]
    pub title: String,
}

/// Backend configuration as returned by `GET /config`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub grading_scope: String,
}

/// Whether grade sending targets the session's course or lets the user choose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GradingScope {
    Current,
    All,
    Unsupported(String),
}

impl GradingScope {
    pub fn parse(value: &str) -> Self {
        match value {
            "current" => GradingScope::Current,
            "all" => GradingScope::All,
            other => GradingScope::Unsupported(other.to_string()),
        }
    }
}

impl From<&BackendConfig> for GradingScope {
    fn from(config: &BackendConfig) -> Self {
        GradingScope::parse(&config.grading_scope)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
