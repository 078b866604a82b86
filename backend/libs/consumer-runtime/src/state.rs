use std::fmt;

/// Lifecycle of a `ConsumerRuntime`
///
/// ```text
/// Disconnected → Connecting → Subscribed → Running ⇄ Reconnecting
///                                             any ──stop──▶ Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Subscribed,
    Running,
    Reconnecting,
    /// Terminal; reached only through `stop_consumer` or a fatal run loop error
    Stopped,
}

impl ConsumerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerState::Disconnected => "disconnected",
            ConsumerState::Connecting => "connecting",
            ConsumerState::Subscribed => "subscribed",
            ConsumerState::Running => "running",
            ConsumerState::Reconnecting => "reconnecting",
            ConsumerState::Stopped => "stopped",
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ConsumerState::Stopped)
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
