//! Dialog capability consumed by the dispatcher.
//!
//! Dismissing any dialog is a silent cancellation: `select` returns `None`
//! and `confirm` returns `false`.

use async_trait::async_trait;

/// Single-choice selector over listing names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectPrompt {
    pub title: String,
    pub accept_label: String,
}

impl SelectPrompt {
    pub fn new(title: impl Into<String>, accept_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            accept_label: accept_label.into(),
        }
    }
}

/// Yes/no confirmation. The body is multi-line; `highlight` names the line
/// that must be rendered visually distinct (e.g. the course grades go to).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub lines: Vec<String>,
    pub highlight: Option<usize>,
    pub accept_label: String,
    pub destructive: bool,
}

impl ConfirmPrompt {
    pub fn new(title: impl Into<String>, accept_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
            highlight: None,
            accept_label: accept_label.into(),
            destructive: false,
        }
    }

    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    /// Append a line and mark it as the highlighted one.
    pub fn highlighted_line(mut self, text: impl Into<String>) -> Self {
        self.highlight = Some(self.lines.len());
        self.lines.push(text.into());
        self
    }

    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlight.and_then(|i| self.lines.get(i)).map(String::as_str)
    }
}

#[async_trait]
pub trait DialogProvider: Send + Sync {
    /// Ask the user to pick one of `items`. `None` means the dialog was dismissed.
    async fn select(&self, prompt: &SelectPrompt, items: &[String]) -> Option<String>;

    /// Ask for a yes/no decision. `false` means declined or dismissed.
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;

    /// Show read-only information.
    async fn inform(&self, title: &str, body: &str);
}
