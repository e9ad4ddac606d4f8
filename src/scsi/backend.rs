//! Platform backend contract
//!
//! One implementation per operating-system SCSI passthrough facility. The
//! backend is the only place where wire structures and ioctl numbers appear;
//! everything above it works with `CommandRequest` and `Completion`.

use std::time::Duration;
use tracing::{debug, warn};

use super::commands::inquiry_cdb;
use super::constants::{INQUIRY_ALLOC_LEN, SENSE_INFO_LEN};
use super::executor::CommandExecutor;
use super::status::TapeStatusFlags;
use super::types::{CommandRequest, Completion, ScsiStatus};
use crate::error::{Result, TapeCtlError};

/// INQUIRY result captured while opening a device node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InquiryData {
    Raw(Vec<u8>),
    /// The node opened but did not answer INQUIRY
    Unavailable(String),
}

/// A freshly opened OS handle together with its identity data
#[derive(Debug)]
pub struct OpenedDevice<H> {
    pub handle: H,
    pub inquiry: InquiryData,
}

pub trait PlatformBackend {
    /// Owned OS handle; dropping or closing it releases the device node
    type Handle;

    /// Short identifier used in log messages
    fn name(&self) -> &'static str;

    /// Open the device node read-write without waiting for media
    fn open_node(&self, path: &str) -> Result<Self::Handle>;

    /// Release the OS handle
    fn close(&self, handle: Self::Handle) -> Result<()>;

    /// Issue one command. Transport failures are `TapeCtlError::IoFailure`.
    fn submit(&self, handle: &Self::Handle, request: &mut CommandRequest<'_>) -> Result<Completion>;

    /// Unload the tape through the platform's tape-control call
    fn eject(&self, handle: &Self::Handle) -> Result<()>;

    fn rewind(&self, handle: &Self::Handle) -> Result<()>;

    /// Read mechanical status through the platform's tape-control call
    fn query_status(&self, handle: &Self::Handle) -> Result<TapeStatusFlags>;

    /// Open the node and read its identity with INQUIRY.
    ///
    /// A node that opens but rejects INQUIRY is still returned, with
    /// `InquiryData::Unavailable`; the registry decides what that means.
    fn open(
        &self,
        path: &str,
        executor: &CommandExecutor,
        inquiry_timeout: Duration,
    ) -> Result<OpenedDevice<Self::Handle>> {
        let handle = self.open_node(path)?;
        let inquiry = match self.inquire(&handle, executor, inquiry_timeout) {
            Ok(raw) => InquiryData::Raw(raw),
            Err(e) => {
                debug!("{}: INQUIRY on {} failed: {}", self.name(), path, e);
                InquiryData::Unavailable(e.to_string())
            }
        };
        Ok(OpenedDevice { handle, inquiry })
    }

    /// Issue a standard INQUIRY through the retry executor
    fn inquire(
        &self,
        handle: &Self::Handle,
        executor: &CommandExecutor,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let cdb = inquiry_cdb(INQUIRY_ALLOC_LEN as u16);
        let mut data = vec![0u8; INQUIRY_ALLOC_LEN];
        let mut sense = [0u8; SENSE_INFO_LEN];

        let outcome = {
            let mut request = CommandRequest::new(&cdb, &mut sense)
                .read_into(&mut data)
                .with_timeout(timeout);
            executor.execute(self, handle, &mut request)?
        };

        match outcome.status {
            ScsiStatus::Good => {
                data.truncate(INQUIRY_ALLOC_LEN.saturating_sub(outcome.residual));
                Ok(data)
            }
            status => {
                let reason = outcome
                    .sense_info()
                    .map(|info| info.to_string())
                    .unwrap_or_else(|| "no sense data".to_string());
                warn!(
                    "{}: INQUIRY completed with {} (0x{:02X}): {}",
                    self.name(),
                    status.description(),
                    outcome.raw_status,
                    reason
                );
                Err(TapeCtlError::io_failure(format!(
                    "INQUIRY completed with {}: {}",
                    status.description(),
                    reason
                )))
            }
        }
    }
}

/// Backend for targets without a supported passthrough facility
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

impl UnsupportedBackend {
    pub fn new() -> Self {
        Self
    }

    fn error(&self) -> TapeCtlError {
        TapeCtlError::unsupported(format!(
            "no SCSI passthrough backend for {}",
            std::env::consts::OS
        ))
    }
}

impl PlatformBackend for UnsupportedBackend {
    type Handle = ();

    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn open_node(&self, _path: &str) -> Result<()> {
        Err(self.error())
    }

    fn close(&self, _handle: ()) -> Result<()> {
        Ok(())
    }

    fn submit(&self, _handle: &(), _request: &mut CommandRequest<'_>) -> Result<Completion> {
        Err(self.error())
    }

    fn eject(&self, _handle: &()) -> Result<()> {
        Err(self.error())
    }

    fn rewind(&self, _handle: &()) -> Result<()> {
        Err(self.error())
    }

    fn query_status(&self, _handle: &()) -> Result<TapeStatusFlags> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scsi::inquiry::inquiry_response;
    use crate::scsi::sim::SimBackend;

    fn executor() -> CommandExecutor {
        CommandExecutor::new(3, Duration::ZERO)
    }

    #[test]
    fn test_open_reads_inquiry() {
        let (backend, state) = SimBackend::new();
        state.borrow_mut().inquiry = Some(inquiry_response(0x01, "IBM", "ULT3580-TD5"));

        let opened = backend
            .open("/dev/nst0", &executor(), Duration::from_secs(1))
            .unwrap();
        match opened.inquiry {
            InquiryData::Raw(raw) => assert_eq!(raw.len(), 36),
            other => panic!("unexpected inquiry result {:?}", other),
        }
        assert_eq!(state.borrow().inquiries, 1);
        assert_eq!(state.borrow().submits, 0);
    }

    #[test]
    fn test_open_without_inquiry() {
        let (backend, _state) = SimBackend::new();
        let opened = backend
            .open("/dev/nst0", &executor(), Duration::from_secs(1))
            .unwrap();
        assert!(matches!(opened.inquiry, InquiryData::Unavailable(_)));
    }

    #[test]
    fn test_open_retries_busy_inquiry() {
        let (backend, state) = SimBackend::new();
        state.borrow_mut().inquiry = Some(inquiry_response(0x01, "QUANTUM", "DLT7000"));
        state.borrow_mut().inquiry_busy = 2;

        let opened = backend
            .open("/dev/nst0", &executor(), Duration::from_secs(1))
            .unwrap();
        assert!(matches!(opened.inquiry, InquiryData::Raw(_)));
        assert_eq!(state.borrow().inquiries, 3);
    }

    #[test]
    fn test_open_busy_inquiry_exhausts_budget() {
        let (backend, state) = SimBackend::new();
        state.borrow_mut().inquiry = Some(inquiry_response(0x01, "QUANTUM", "DLT7000"));
        state.borrow_mut().inquiry_busy = 10;

        let opened = backend
            .open("/dev/nst0", &executor(), Duration::from_secs(1))
            .unwrap();
        match opened.inquiry {
            InquiryData::Unavailable(reason) => assert!(reason.contains("busy")),
            other => panic!("unexpected inquiry result {:?}", other),
        }
        assert_eq!(state.borrow().inquiries, 3);
    }

    #[test]
    fn test_unsupported_backend() {
        let backend = UnsupportedBackend::new();
        assert!(matches!(
            backend.open_node("/dev/nst0"),
            Err(TapeCtlError::Unsupported(_))
        ));
        assert!(backend.query_status(&()).is_err());
    }
}
