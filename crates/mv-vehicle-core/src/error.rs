use mavlink::error::MessageWriteError;

#[derive(Debug, thiserror::Error)]
pub enum VehicleError {
    #[error("no heartbeat received yet")]
    IdentityUnknown,
    #[error("mode '{0}' not available for this vehicle")]
    ModeNotAvailable(String),
    #[error("mission validation failed: {0}")]
    MissionValidation(String),
    #[error("MAVLink I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MessageWriteError> for VehicleError {
    fn from(err: MessageWriteError) -> Self {
        VehicleError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            err.to_string(),
        ))
    }
}
