//! Line-oriented dialogs and notices for the `kore` binary.
//!
//! Selections are numbered lists answered by index or exact label. An empty
//! answer or end of input dismisses the dialog.

use crate::dialog::{ConfirmPrompt, DialogProvider, SelectPrompt};
use crate::notify::{Notice, NotificationSink, PendingNotice, Severity};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

type Input = Box<dyn AsyncBufRead + Send + Unpin>;
type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// Parse a selection answer: a 1-based index or an exact label.
pub fn parse_choice(answer: &str, items: &[String]) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    if let Ok(index) = answer.parse::<usize>()
        && index >= 1
        && index <= items.len()
    {
        return Some(items[index - 1].clone());
    }
    items.iter().find(|item| item.as_str() == answer).cloned()
}

/// Parse a yes/no answer. Anything but an explicit yes declines.
pub fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub struct TerminalDialogs {
    input: Mutex<Input>,
    output: Mutex<Output>,
}

impl TerminalDialogs {
    pub fn new() -> Self {
        Self::with_io(
            Box::new(BufReader::new(tokio::io::stdin())),
            Box::new(tokio::io::stdout()),
        )
    }

    pub fn with_io(input: Input, output: Output) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }

    async fn write(&self, text: &str) {
        let mut out = self.output.lock().await;
        if let Err(e) = out.write_all(text.as_bytes()).await {
            tracing::warn!("Failed to write prompt: {e}");
        }
        let _ = out.flush().await;
    }

    /// Read one answer line. `None` at end of input.
    async fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        match self.input.lock().await.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(e) => {
                tracing::warn!("Failed to read answer: {e}");
                None
            }
        }
    }
}

impl Default for TerminalDialogs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DialogProvider for TerminalDialogs {
    async fn select(&self, prompt: &SelectPrompt, items: &[String]) -> Option<String> {
        let mut text = format!("{}\n", prompt.title);
        for (i, item) in items.iter().enumerate() {
            text.push_str(&format!("  {:>2}) {item}\n", i + 1));
        }
        text.push_str(&format!("{} [1-{}, empty to cancel]: ", prompt.accept_label, items.len()));

        loop {
            self.write(&text).await;
            let answer = self.read_line().await?;
            if answer.trim().is_empty() {
                return None;
            }
            match parse_choice(&answer, items) {
                Some(choice) => return Some(choice),
                None => self.write(&format!("No such entry: {}\n", answer.trim())).await,
            }
        }
    }

    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        let mut text = format!("{}\n", prompt.title);
        for (i, line) in prompt.lines.iter().enumerate() {
            if prompt.highlight == Some(i) {
                text.push_str(&format!("    >> {line} <<\n"));
            } else {
                text.push_str(&format!("  {line}\n"));
            }
        }
        let warning = if prompt.destructive { " (cannot be undone)" } else { "" };
        text.push_str(&format!("{}{warning}? [y/N]: ", prompt.accept_label));

        self.write(&text).await;
        self.read_line().await.is_some_and(|answer| parse_confirmation(&answer))
    }

    async fn inform(&self, title: &str, body: &str) {
        self.write(&format!("{title}\n  {body}\n")).await;
    }
}

/// Notices printed one per line to stderr.
#[derive(Default)]
pub struct TerminalNotices;

impl TerminalNotices {
    fn render(severity: Option<Severity>, message: &str) -> String {
        match severity {
            Some(severity) => format!("[{}] {message}", severity.as_str()),
            None => format!("[pending] {message}"),
        }
    }
}

#[async_trait]
impl NotificationSink for TerminalNotices {
    async fn notify(&self, notice: Notice) {
        eprintln!("{}", Self::render(Some(notice.severity), &notice.message));
    }

    async fn begin_pending(&self, message: &str) -> PendingNotice {
        eprintln!("{}", Self::render(None, message));
        PendingNotice::new(message)
    }

    async fn settle(&self, _pending: PendingNotice, notice: Notice) {
        eprintln!("{}", Self::render(Some(notice.severity), &notice.message));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
