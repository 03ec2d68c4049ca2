use thiserror::Error;

/// Failures at the capture/render device boundary.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("microphone capture is not permitted")]
    PermissionDenied,

    #[error("no input device matched (and no default available)")]
    NoInputDevice,

    #[error("no output device matched (and no default available)")]
    NoOutputDevice,

    #[error("device initialization failed: {0}")]
    Init(String),

    /// The capture side produced no data for too many consecutive reads.
    #[error("capture stalled: {0} consecutive reads returned no data")]
    Stalled(u32),

    /// The render side refused data for longer than the write timeout.
    #[error("render device stopped draining audio")]
    WriteTimeout,
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// `release()` was called; the engine cannot be started again.
    #[error("engine has been released")]
    Released,

    #[error(transparent)]
    Device(#[from] DeviceError),
}
