#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Host element is missing or detached")]
    MissingHostElement,

    #[error("Invalid mount state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: crate::gate::MountState,
        to: crate::gate::MountState,
    },
}

/// Errors raised while fetching or instantiating the heavy visual subsystem. These never leave
/// the gate; they end up as [`MountState::Failed`](crate::gate::MountState::Failed).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Net(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("cannot decode scene descriptor: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cannot instantiate subsystem: {0}")]
    Instantiate(String),

    #[error("subsystem loader panicked")]
    Panicked,
}
