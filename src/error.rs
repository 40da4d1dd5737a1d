use std::fmt;

/// Why an established transport went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    IceFailed,
    Disconnected,
    ChannelClosed,
    ChannelError,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureCause::IceFailed => "Connection failed",
            FailureCause::Disconnected => "Disconnected",
            FailureCause::ChannelClosed => "Data channel closed",
            FailureCause::ChannelError => "Data channel error",
        };
        f.write_str(text)
    }
}

/// Session failures. `Display` is the status text shown to the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Microphone permission denied")]
    PermissionDenied,
    #[error("Token not available")]
    TokenUnavailable,
    #[error("Error: {0}")]
    Negotiation(String),
    #[error("{0}")]
    TransportFailure(FailureCause),
    #[error("Failed to fetch recipes: {0}")]
    ToolLookup(String),
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
    #[error("Data channel not open")]
    ChannelNotOpen,
    #[error("Transport closed")]
    Closed,
}

impl SessionError {
    /// Errors the session recovers from without leaving its current phase.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::ToolLookup(_) | SessionError::MalformedEvent(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_status_text() {
        assert_eq!(SessionError::TokenUnavailable.to_string(), "Token not available");
        assert_eq!(SessionError::Negotiation("bad answer".into()).to_string(), "Error: bad answer");
        assert_eq!(
            SessionError::TransportFailure(FailureCause::IceFailed).to_string(),
            "Connection failed"
        );
        assert_eq!(
            SessionError::TransportFailure(FailureCause::Disconnected).to_string(),
            "Disconnected"
        );
    }

    #[test]
    fn only_lookup_and_malformed_recover() {
        assert!(SessionError::ToolLookup("timeout".into()).is_recoverable());
        assert!(SessionError::MalformedEvent("eof".into()).is_recoverable());
        assert!(!SessionError::PermissionDenied.is_recoverable());
        assert!(!SessionError::TransportFailure(FailureCause::ChannelClosed).is_recoverable());
    }
}
