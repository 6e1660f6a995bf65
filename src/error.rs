use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum OtgError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IRQ error: {0}")]
    Irq(String),

    #[error("Host controller error: {0}")]
    Host(String),

    #[error("Gadget error: {0}")]
    Gadget(String),

    #[error("OTG device not found: {0}")]
    NotFound(String),

    #[error("Device has been removed")]
    DeviceRemoved,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OtgError {
    /// Whether this error aborts probe (as opposed to a transient hardware failure)
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Irq(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, OtgError>;
