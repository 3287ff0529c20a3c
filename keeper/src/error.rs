use thiserror::Error;

/// Failure of a single external read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed readout: {0}")]
    Decode(String),
    #[error("no balances for holder {0}")]
    UnknownHolder(String),
}

/// Why a refresh round did not produce a new snapshot.
///
/// Cloneable so every caller joined to the same round receives the same
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("snapshot is stale: {0}")]
    Stale(#[from] ReadError),
    #[error("unknown phase tag {0}")]
    UnknownPhase(u64),
    #[error("inconsistent readout: {0}")]
    InvalidReadout(String),
    #[error("refresh abandoned")]
    Abandoned,
}
