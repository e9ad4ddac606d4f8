use thiserror::Error;

use crate::scsi::DeviceHandle;

pub type Result<T> = std::result::Result<T, TapeCtlError>;

#[derive(Error, Debug)]
pub enum TapeCtlError {
    #[error("Cannot open device {path}: {source}")]
    CannotOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid device handle: {0}")]
    InvalidHandle(DeviceHandle),

    #[error("SCSI transport failure: {0}")]
    IoFailure(String),

    #[error("Device stayed busy after {attempts} attempts (last status 0x{last_status:02X})")]
    RetriesExhausted { attempts: u32, last_status: u8 },

    #[error("Invalid command request: {0}")]
    InvalidRequest(String),

    #[error("Malformed device response: {0}")]
    MalformedResponse(String),

    #[error("INQUIRY failed for {path}: {reason}")]
    InquiryFailed { path: String, reason: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl TapeCtlError {
    pub fn io_failure<T: Into<String>>(msg: T) -> Self {
        Self::IoFailure(msg.into())
    }

    pub fn invalid_request<T: Into<String>>(msg: T) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn malformed<T: Into<String>>(msg: T) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn unsupported<T: Into<String>>(msg: T) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn cannot_open<P: Into<String>>(path: P, source: std::io::Error) -> Self {
        Self::CannotOpen {
            path: path.into(),
            source,
        }
    }

    /// True for transport-level failures that the executor never retries
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::IoFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = TapeCtlError::io_failure("SG_IO failed");
        assert!(matches!(err, TapeCtlError::IoFailure(_)));
        assert!(err.is_transport());

        let err = TapeCtlError::config("retry_budget must be at least 1");
        assert!(!err.is_transport());
    }

    #[test]
    fn test_error_messages() {
        let err = TapeCtlError::RetriesExhausted {
            attempts: 5,
            last_status: 0x08,
        };
        assert_eq!(
            err.to_string(),
            "Device stayed busy after 5 attempts (last status 0x08)"
        );

        let err = TapeCtlError::cannot_open(
            "/dev/nst0",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.to_string().starts_with("Cannot open device /dev/nst0"));
    }
}
