use thiserror::Error;

/// Rolling back a failed projection failed too. Both causes are kept.
#[derive(Debug, Error)]
#[error("failed rollback (original failure: {cause:#})")]
pub struct RollbackFailed {
    #[source]
    pub rollback: rusqlite::Error,
    pub cause: anyhow::Error,
}
