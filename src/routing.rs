//! Static routing table: which calls a command makes, in which order.
//!
//! A command resolves to a listing step that offers the source choices, an
//! optional second listing step for the destination (import only), and one
//! commit step. Grade sending picks its listing route from the grading scope.

use crate::commands::Command;
use crate::model::{Context, GradingScope, Route, Verb};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub verb: Verb,
    pub route: Route,
}

impl Step {
    const fn new(verb: Verb, route: Route) -> Self {
        Self { verb, route }
    }

    const fn get(route: Route) -> Self {
        Self::new(Verb::Get, route)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.route)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Plan {
    /// Listing the user selects the acted-on resource from.
    pub source: Step,
    /// Listing of import destinations. Always the active courses.
    pub destination: Option<Step>,
    pub commit: Step,
}

impl Plan {
    /// Steps in the order they are issued.
    pub fn steps(&self) -> Vec<Step> {
        let mut steps = vec![self.source];
        steps.extend(self.destination);
        steps.push(self.commit);
        steps
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps().iter().map(Step::to_string).collect();
        f.write_str(&steps.join(" -> "))
    }
}

/// Import: list the source collection, list active courses, copy.
pub fn import_plan(context: Context) -> Plan {
    let collection = context.collection();
    Plan {
        source: Step::get(collection),
        destination: Some(Step::get(Route::CoursesActive)),
        commit: Step::new(Verb::Post, collection),
    }
}

/// Course mutations select among the active courses. Returns `None` for
/// commands that are not course mutations.
pub fn course_plan(command: Command) -> Option<Plan> {
    let verb = match command {
        Command::Backup => Verb::Put,
        Command::Reset => Verb::Patch,
        Command::Delete => Verb::Delete,
        Command::Import(_) | Command::SendGrades => return None,
    };
    Some(Plan {
        source: Step::get(Route::CoursesActive),
        destination: None,
        commit: Step::new(verb, Route::Courses),
    })
}

/// Grade sending. `None` for an unsupported scope.
pub fn grades_plan(scope: &GradingScope) -> Option<Plan> {
    let source = match scope {
        GradingScope::Current => Route::CoursesCurrent,
        GradingScope::All => Route::CoursesActive,
        GradingScope::Unsupported(_) => return None,
    };
    Some(Plan {
        source: Step::get(source),
        destination: None,
        commit: Step::new(Verb::Post, Route::Grades),
    })
}

/// Resolve any command. `scope` is only consulted for grade sending.
pub fn plan(command: Command, scope: &GradingScope) -> Option<Plan> {
    match command {
        Command::Import(ctx) => Some(import_plan(ctx)),
        Command::Backup | Command::Reset | Command::Delete => course_plan(command),
        Command::SendGrades => grades_plan(scope),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
