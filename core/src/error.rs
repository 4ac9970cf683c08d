use thiserror::Error;

/// Failures surfaced by the intake ledger and the reminder scheduler.
///
/// All of them are transient from the caller's point of view: they are
/// reported once and never retried automatically.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(
        "Notification permissions are required to set an alarm. Please enable notifications in your device settings."
    )]
    PermissionDenied,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Gateway(String),
}

impl CoreError {
    #[must_use]
    pub fn storage(err: &anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    #[must_use]
    pub fn gateway(err: &anyhow::Error) -> Self {
        Self::Gateway(format!("{err:#}"))
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
