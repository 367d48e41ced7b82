//! Progress side channel.
//!
//! The driver emits status lines and intermediate markdown fragments here
//! while the search runs. The channel is advisory only: sinks must not fail,
//! and nothing the sink does can affect control flow.

/// Receiver for incremental status and intermediate-result notifications.
pub trait ProgressSink: Send + Sync {
    /// Short human-readable status line ("Iteration 2/6 | Best: 7.1/10").
    fn status(&self, _message: &str) {}

    /// A markdown fragment: intermediate node result or tree snapshot.
    fn message(&self, _content: &str) {}
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}
