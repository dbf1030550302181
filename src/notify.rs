//! User-facing notices.
//!
//! Flows report outcomes through an injected `NotificationSink` instead of a
//! process-wide toast singleton. A pending notice bridges a long suspend point
//! (grade sending) and is settled with the final notice before the flow
//! returns. `NoticeLog` is an in-memory sink backed by a fixed-capacity ring
//! buffer, used by embedding front ends that render notices themselves.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Error => "error",
        }
    }
}

/// When a notice disappears on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoDismiss {
    /// Stays until the user closes it
    #[default]
    Never,
    AfterMs(u64),
}

impl AutoDismiss {
    pub fn duration(self) -> Option<Duration> {
        match self {
            AutoDismiss::Never => None,
            AutoDismiss::AfterMs(ms) => Some(Duration::from_millis(ms)),
        }
    }
}

/// Auto-dismiss policy per severity, supplied by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticePolicy {
    #[serde(default)]
    pub success: AutoDismiss,
    #[serde(default)]
    pub info: AutoDismiss,
    #[serde(default)]
    pub error: AutoDismiss,
}

impl NoticePolicy {
    pub fn for_severity(&self, severity: Severity) -> AutoDismiss {
        match severity {
            Severity::Success => self.success,
            Severity::Info => self.info,
            Severity::Error => self.error,
        }
    }

    pub fn notice(&self, severity: Severity, message: impl Into<String>) -> Notice {
        Notice {
            severity,
            message: message.into(),
            auto_dismiss: self.for_severity(severity),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    pub auto_dismiss: AutoDismiss,
}

/// Handle of a pending notice, consumed when it is settled.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingNotice {
    pub id: String,
    pub message: String,
}

impl PendingNotice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notice: Notice);

    /// Show a notice that stays up until `settle` replaces it.
    async fn begin_pending(&self, message: &str) -> PendingNotice;

    /// Replace a pending notice with its final state.
    async fn settle(&self, pending: PendingNotice, notice: Notice);
}

// ---------------------------------------------------------------------------
// Ring buffer
// ---------------------------------------------------------------------------

pub const NOTICE_LOG_CAPACITY: usize = 200;

/// A notice as recorded by `NoticeLog`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeEntry {
    pub id: u64,
    pub timestamp_ms: i64,
    /// `None` while the entry is a pending notice
    pub severity: Option<Severity>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_id: Option<String>,
}

impl NoticeEntry {
    pub fn is_pending(&self) -> bool {
        self.severity.is_none()
    }
}

/// Fixed-capacity circular buffer of notices.
struct NoticeRing {
    entries: Vec<Option<NoticeEntry>>,
    capacity: usize,
    /// Write position (wraps around)
    write_pos: usize,
    /// Number of entries currently stored (≤ capacity)
    count: usize,
    next_id: u64,
}

impl NoticeRing {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Self {
            entries,
            capacity,
            write_pos: 0,
            count: 0,
            next_id: 1,
        }
    }

    fn push(&mut self, severity: Option<Severity>, message: String, pending_id: Option<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.entries[self.write_pos] = Some(NoticeEntry {
            id,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            severity,
            message,
            pending_id,
        });
        self.write_pos = (self.write_pos + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
        id
    }

    /// Settle a pending entry in place. Falls back to appending if it was already evicted.
    fn settle(&mut self, pending_id: &str, severity: Severity, message: String) {
        let slot = self.entries.iter_mut().flatten().find(|e| {
            e.pending_id.as_deref() == Some(pending_id) && e.is_pending()
        });
        match slot {
            Some(entry) => {
                entry.severity = Some(severity);
                entry.message = message;
                entry.timestamp_ms = chrono::Utc::now().timestamp_millis();
            }
            None => {
                self.push(Some(severity), message, Some(pending_id.to_string()));
            }
        }
    }

    /// Entries oldest first, the most recent `limit` of them (0 = all).
    fn get_entries(&self, limit: usize) -> Vec<NoticeEntry> {
        if self.count == 0 {
            return Vec::new();
        }
        let effective_limit = if limit == 0 { self.count } else { limit.min(self.count) };
        // write_pos points to the oldest entry once the buffer is full
        let start = if self.count < self.capacity { 0 } else { self.write_pos };
        let skip = self.count - effective_limit;
        (skip..self.count)
            .filter_map(|i| self.entries[(start + i) % self.capacity].clone())
            .collect()
    }

    fn clear(&mut self) {
        for slot in self.entries.iter_mut() {
            *slot = None;
        }
        self.write_pos = 0;
        self.count = 0;
        // next_id stays monotonic
    }
}

/// In-memory `NotificationSink`.
pub struct NoticeLog {
    ring: Mutex<NoticeRing>,
}

impl NoticeLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(NoticeRing::new(capacity)),
        }
    }

    /// Most recent `limit` entries, oldest first (0 = all).
    pub fn entries(&self, limit: usize) -> Vec<NoticeEntry> {
        self.ring.lock().get_entries(limit)
    }

    pub fn len(&self) -> usize {
        self.ring.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.ring.lock().clear();
    }
}

impl Default for NoticeLog {
    fn default() -> Self {
        Self::new(NOTICE_LOG_CAPACITY)
    }
}

#[async_trait]
impl NotificationSink for NoticeLog {
    async fn notify(&self, notice: Notice) {
        self.ring.lock().push(Some(notice.severity), notice.message, None);
    }

    async fn begin_pending(&self, message: &str) -> PendingNotice {
        let pending = PendingNotice::new(message);
        self.ring
            .lock()
            .push(None, pending.message.clone(), Some(pending.id.clone()));
        pending
    }

    async fn settle(&self, pending: PendingNotice, notice: Notice) {
        self.ring.lock().settle(&pending.id, notice.severity, notice.message);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn info(message: &str) -> Notice {
        NoticePolicy::default().notice(Severity::Info, message)
    }

    #[tokio::test]
    async fn entries_are_chronological_with_monotonic_ids() {
        let log = NoticeLog::new(10);
        log.notify(info("first")).await;
        log.notify(info("second")).await;

        let entries = log.entries(0);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].id, 2);
        assert!(entries[1].timestamp_ms > 0);
    }

    #[tokio::test]
    async fn ring_drops_oldest_when_full() {
        let log = NoticeLog::new(3);
        for i in 0..5 {
            log.notify(info(&format!("n-{i}"))).await;
        }
        assert_eq!(log.len(), 3);
        let messages: Vec<_> = log.entries(0).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["n-2", "n-3", "n-4"]);
        assert_eq!(log.entries(2)[0].message, "n-3");
    }

    #[tokio::test]
    async fn pending_notice_is_settled_in_place() {
        let log = NoticeLog::new(10);
        let pending = log.begin_pending("Sending grades to LMS...").await;
        assert!(log.entries(0)[0].is_pending());

        log.notify(info("unrelated")).await;
        log.settle(
            pending,
            NoticePolicy::default().notice(Severity::Success, "Sending grades successful."),
        )
        .await;

        let entries = log.entries(0);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].severity, Some(Severity::Success));
        assert_eq!(entries[0].message, "Sending grades successful.");
        assert!(entries.iter().all(|e| !e.is_pending()));
    }

    #[tokio::test]
    async fn settling_evicted_pending_appends() {
        let log = NoticeLog::new(1);
        let pending = log.begin_pending("waiting").await;
        log.notify(info("evicts pending")).await;
        log.settle(pending, NoticePolicy::default().notice(Severity::Error, "failed")).await;

        let entries = log.entries(0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "failed");
    }

    #[tokio::test]
    async fn clear_keeps_ids_monotonic() {
        let log = NoticeLog::new(5);
        log.notify(info("a")).await;
        log.notify(info("b")).await;
        log.clear();
        assert!(log.is_empty());
        log.notify(info("c")).await;
        assert_eq!(log.entries(0)[0].id, 3);
    }

    #[test]
    fn policy_applies_per_severity() {
        let policy = NoticePolicy {
            success: AutoDismiss::AfterMs(5000),
            ..NoticePolicy::default()
        };
        let notice = policy.notice(Severity::Success, "done");
        assert_eq!(notice.auto_dismiss.duration(), Some(Duration::from_millis(5000)));
        assert_eq!(policy.notice(Severity::Error, "x").auto_dismiss, AutoDismiss::Never);
    }

    #[test]
    fn policy_deserializes_from_config_json() {
        let policy: NoticePolicy =
            serde_json::from_str(r#"{"success": {"after_ms": 3000}, "error": "never"}"#).unwrap();
        assert_eq!(policy.success, AutoDismiss::AfterMs(3000));
        assert_eq!(policy.info, AutoDismiss::Never);
    }
}
