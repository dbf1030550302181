//! Host-facing command registry.
//!
//! Every command is addressable by a stable id of the form
//! `kore:<operation>-<context>` (or `kore:send-grades`) and carries a
//! human-readable label and caption. Labels come from fixed tables rather
//! than string manipulation.

use crate::model::{Context, Operation};
use std::fmt;

/// Namespace prefix of every command id.
pub const NAMESPACE: &str = "kore";

/// A dispatchable command. Unsupported operation/context pairs are unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Import(Context),
    Backup,
    Reset,
    Delete,
    SendGrades,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Import(Context::Course),
        Command::Import(Context::Assignment),
        Command::Import(Context::Problem),
        Command::Backup,
        Command::Reset,
        Command::Delete,
        Command::SendGrades,
    ];

    /// Build a command from an operation and the context it acts on.
    /// Backup, reset and delete only exist for courses.
    pub fn new(operation: Operation, context: Context) -> Result<Self, String> {
        match (operation, context) {
            (Operation::Import, ctx) => Ok(Command::Import(ctx)),
            (Operation::Backup, Context::Course) => Ok(Command::Backup),
            (Operation::Reset, Context::Course) => Ok(Command::Reset),
            (Operation::Delete, Context::Course) => Ok(Command::Delete),
            (op, ctx) => Err(format!("Unsupported command: {op} {ctx}")),
        }
    }

    pub fn operation(self) -> Option<Operation> {
        match self {
            Command::Import(_) => Some(Operation::Import),
            Command::Backup => Some(Operation::Backup),
            Command::Reset => Some(Operation::Reset),
            Command::Delete => Some(Operation::Delete),
            Command::SendGrades => None,
        }
    }

    pub fn context(self) -> Option<Context> {
        match self {
            Command::Import(ctx) => Some(ctx),
            Command::Backup | Command::Reset | Command::Delete => Some(Context::Course),
            Command::SendGrades => None,
        }
    }

    /// Stable identifier, e.g. `kore:import-course`.
    pub fn id(self) -> String {
        format!("{NAMESPACE}:{}", self.local_name())
    }

    fn local_name(self) -> &'static str {
        match self {
            Command::Import(Context::Course) => "import-course",
            Command::Import(Context::Assignment) => "import-assignment",
            Command::Import(Context::Problem) => "import-problem",
            Command::Backup => "backup-course",
            Command::Reset => "reset-course",
            Command::Delete => "delete-course",
            Command::SendGrades => "send-grades",
        }
    }

    /// Parse a command id. The namespace prefix is required.
    pub fn from_id(id: &str) -> Option<Self> {
        let local = id.strip_prefix(NAMESPACE)?.strip_prefix(':')?;
        Self::ALL.into_iter().find(|cmd| cmd.local_name() == local)
    }

    /// Resolve what a user typed: a full id (`kore:reset-course`), an id
    /// without the namespace (`reset-course`) or an operation followed by
    /// its context (`import assignment`).
    pub fn resolve(input: &str) -> Result<Self, String> {
        let input = input.trim().to_ascii_lowercase();
        let words: Vec<&str> = input.split_whitespace().collect();
        match words.as_slice() {
            [op, ctx] => {
                let operation = Operation::parse(op).ok_or_else(|| format!("Unknown operation \"{op}\""))?;
                let context = Context::parse(ctx).ok_or_else(|| format!("Unknown context \"{ctx}\""))?;
                Self::new(operation, context)
            }
            [id] if id.contains(':') => Self::from_id(id).ok_or_else(|| format!("Unknown command \"{id}\"")),
            [id] => Self::from_id(&format!("{NAMESPACE}:{id}")).ok_or_else(|| format!("Unknown command \"{id}\"")),
            _ => Err(format!("Cannot read command \"{}\"", input)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Command::Import(Context::Course) => "Import course",
            Command::Import(Context::Assignment) => "Import assignment",
            Command::Import(Context::Problem) => "Import problem",
            Command::Backup => "Backup course",
            Command::Reset => "Reset course",
            Command::Delete => "Delete course",
            Command::SendGrades => "Send all grades to LMS",
        }
    }

    pub fn caption(self) -> &'static str {
        match self {
            Command::Import(Context::Course) => "Import current course.",
            Command::Import(Context::Assignment) => "Import current assignment.",
            Command::Import(Context::Problem) => "Import current problem.",
            Command::Backup => "Backup current course.",
            Command::Reset => "Reset current course.",
            Command::Delete => "Delete current course.",
            Command::SendGrades => "Used to transfer all grades of current course to LMS.",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Registry entry as presented to a front end.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CommandInfo {
    pub id: String,
    pub label: &'static str,
    pub caption: &'static str,
}

/// All commands in registration order.
pub fn registry() -> Vec<CommandInfo> {
    Command::ALL
        .into_iter()
        .map(|cmd| CommandInfo {
            id: cmd.id(),
            label: cmd.label(),
            caption: cmd.caption(),
        })
        .collect()
}
