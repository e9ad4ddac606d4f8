//! SCSI Basic Commands
//!
//! CDB builders and registry helpers for TEST UNIT READY, REQUEST SENSE and
//! INQUIRY. Everything here goes through `DeviceRegistry::execute_command`.

use std::time::Duration;
use tracing::debug;

use super::backend::PlatformBackend;
use super::constants::*;
use super::inquiry::Identity;
use super::registry::DeviceRegistry;
use super::sense::SenseInfo;
use super::types::{CommandOutcome, CommandRequest, DeviceHandle, ScsiStatus};
use crate::error::{Result, TapeCtlError};

/// INQUIRY (6) with a two-byte allocation length
pub fn inquiry_cdb(alloc_len: u16) -> [u8; 6] {
    let [hi, lo] = alloc_len.to_be_bytes();
    [scsi_commands::INQUIRY, 0, 0, hi, lo, 0]
}

pub fn test_unit_ready_cdb() -> [u8; 6] {
    [scsi_commands::TEST_UNIT_READY, 0, 0, 0, 0, 0]
}

pub fn request_sense_cdb(alloc_len: u8) -> [u8; 6] {
    [scsi_commands::REQUEST_SENSE, 0, 0, 0, alloc_len, 0]
}

impl<B: PlatformBackend> DeviceRegistry<B> {
    /// Test Unit Ready command - check if device is ready
    ///
    /// A not-ready drive answers CHECK CONDITION; inspect the outcome's sense.
    pub fn test_unit_ready(&self, handle: DeviceHandle) -> Result<CommandOutcome> {
        debug!("Executing Test Unit Ready command on {}", handle);

        let cdb = test_unit_ready_cdb();
        let mut sense = [0u8; SENSE_INFO_LEN];
        let mut request = CommandRequest::new(&cdb, &mut sense)
            .with_timeout(Duration::from_secs(timeouts::TEST_UNIT_READY_SECS));
        self.execute_command(handle, &mut request)
    }

    /// REQUEST SENSE; `None` when the device has no sense to report
    pub fn request_sense(&self, handle: DeviceHandle) -> Result<Option<SenseInfo>> {
        debug!("Executing Request Sense command on {}", handle);

        let cdb = request_sense_cdb(SENSE_INFO_LEN as u8);
        let mut data = [0u8; SENSE_INFO_LEN];
        let mut sense = [0u8; SENSE_INFO_LEN];
        let outcome = {
            let mut request = CommandRequest::new(&cdb, &mut sense)
                .read_into(&mut data)
                .with_timeout(self.command_timeout());
            self.execute_command(handle, &mut request)?
        };

        if !outcome.is_good() {
            return Err(TapeCtlError::io_failure(format!(
                "REQUEST SENSE completed with {}",
                outcome.status.description()
            )));
        }

        let len = SENSE_INFO_LEN.saturating_sub(outcome.residual);
        Ok(SenseInfo::parse(&data[..len]))
    }

    /// Re-read the device identity through the retry executor
    pub fn inquiry(&self, handle: DeviceHandle) -> Result<Identity> {
        let path = self.lookup(handle)?.path().to_string();
        debug!("Executing Inquiry command on {}", path);

        let cdb = inquiry_cdb(INQUIRY_ALLOC_LEN as u16);
        let mut data = [0u8; INQUIRY_ALLOC_LEN];
        let mut sense = [0u8; SENSE_INFO_LEN];
        let outcome = {
            let mut request = CommandRequest::new(&cdb, &mut sense)
                .read_into(&mut data)
                .with_timeout(self.command_timeout());
            self.execute_command(handle, &mut request)?
        };

        match outcome.status {
            ScsiStatus::Good => {
                let len = INQUIRY_ALLOC_LEN.saturating_sub(outcome.residual);
                Identity::decode(&data[..len])
            }
            status => Err(TapeCtlError::InquiryFailed {
                path,
                reason: match outcome.sense_info() {
                    Some(info) => format!("{}: {}", status.description(), info),
                    None => status.description().to_string(),
                },
            }),
        }
    }
}
