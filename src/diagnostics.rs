//! Deprecation diagnostics.
//!
//! Deprecated entry points keep working but report a [`DeprecationNotice`] through the
//! [`DiagnosticsSink`] the owning context was created with. The default sink emits a
//! `tracing` warning; [`RecordingSink`] keeps notices in memory so callers can inspect
//! them.

use parking_lot::Mutex;
use std::fmt;

/// Structured notice emitted by a deprecated entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationNotice {
    /// Name of the deprecated operation
    pub entry_point: &'static str,
    /// Operation callers should migrate to
    pub replacement: &'static str,
}

impl DeprecationNotice {
    /// Create a notice for `entry_point`, pointing at `replacement`
    #[must_use]
    pub const fn new(entry_point: &'static str, replacement: &'static str) -> Self {
        Self {
            entry_point,
            replacement,
        }
    }
}

impl fmt::Display for DeprecationNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is deprecated, use {} instead",
            self.entry_point, self.replacement
        )
    }
}

/// Receiver for deprecation notices.
pub trait DiagnosticsSink: Send + Sync {
    /// Report that a deprecated entry point was called
    fn deprecated(&self, notice: &DeprecationNotice);
}

/// Sink emitting each notice as a `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn deprecated(&self, notice: &DeprecationNotice) {
        tracing::warn!(
            target: "tsm_sessions::deprecation",
            entry_point = notice.entry_point,
            replacement = notice.replacement,
            "{}",
            notice
        );
    }
}

/// Sink collecting notices in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<DeprecationNotice>>,
}

impl RecordingSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices recorded so far, oldest first
    #[must_use]
    pub fn notices(&self) -> Vec<DeprecationNotice> {
        self.notices.lock().clone()
    }

    /// Drain recorded notices
    #[must_use]
    pub fn take(&self) -> Vec<DeprecationNotice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

impl DiagnosticsSink for RecordingSink {
    fn deprecated(&self, notice: &DeprecationNotice) {
        self.notices.lock().push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const NOTICE: DeprecationNotice = DeprecationNotice::new("old_call", "new_call");

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.deprecated(&NOTICE);
        sink.deprecated(&NOTICE);

        assert_eq!(sink.notices().len(), 2);
        assert_eq!(sink.take(), vec![NOTICE, NOTICE]);
        assert!(sink.notices().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_tracing_sink_emits_warning() {
        TracingSink.deprecated(&NOTICE);
        assert!(logs_contain("old_call is deprecated, use new_call instead"));
    }
}
