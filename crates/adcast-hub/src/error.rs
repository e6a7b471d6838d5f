use adcast_core::SessionId;

/// Errors surfaced by [`crate::HubHandle`]. Fan-out itself never fails.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("broadcast hub is shut down")]
    Closed,
    /// The registry already holds this id; the existing session is untouched.
    #[error("session {0} is already registered")]
    DuplicateSession(SessionId),
}

/// Failure writing an ad to a remote peer. Always fatal for that session only.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("peer closed the connection")]
    Closed,
    #[error("write failed: {0}")]
    Write(String),
    #[error("encode failed: {0}")]
    Encode(String),
}
