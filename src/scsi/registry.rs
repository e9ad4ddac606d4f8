//! Open-device registry
//!
//! Single owner of every open device. Each entry owns its OS handle and
//! identity; removing the entry releases both. The registry is not
//! thread-safe: callers sharing it across threads must lock it themselves.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::{InquiryData, OpenedDevice, PlatformBackend};
use super::executor::CommandExecutor;
use super::inquiry::Identity;
use super::status::TapeStatusFlags;
use super::types::{CommandOutcome, CommandRequest, DataTransfer, DeviceHandle, DeviceType};
use super::HostBackend;
use crate::config::{Config, InquiryFailurePolicy};
use crate::error::{Result, TapeCtlError};

/// One opened device
#[derive(Debug)]
pub struct DeviceDescriptor<H> {
    os_handle: H,
    path: String,
    scsi_capable: bool,
    identity: Option<Identity>,
}

impl<H> DeviceDescriptor<H> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True when INQUIRY identified a tape drive or medium changer
    pub fn is_scsi(&self) -> bool {
        self.scsi_capable
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn short_name(&self) -> Option<&str> {
        self.identity.as_ref().map(|id| id.short_name())
    }

    pub fn device_type(&self) -> Option<DeviceType> {
        self.identity.as_ref().map(|id| id.device_type())
    }

    /// Underlying OS handle, for raw tape I/O by higher layers
    pub fn os_handle(&self) -> &H {
        &self.os_handle
    }
}

pub struct DeviceRegistry<B: PlatformBackend> {
    backend: B,
    executor: CommandExecutor,
    inquiry_policy: InquiryFailurePolicy,
    inquiry_timeout: Duration,
    command_timeout: Duration,
    entries: BTreeMap<DeviceHandle, DeviceDescriptor<B::Handle>>,
    next_handle: u32,
}

impl DeviceRegistry<HostBackend> {
    /// Registry on the backend selected for this build target
    pub fn host(config: &Config) -> Self {
        Self::new(HostBackend::default(), config)
    }
}

impl<B: PlatformBackend> DeviceRegistry<B> {
    pub fn new(backend: B, config: &Config) -> Self {
        Self {
            backend,
            executor: CommandExecutor::from_config(config),
            inquiry_policy: config.inquiry_failure,
            inquiry_timeout: config.inquiry_timeout(),
            command_timeout: config.command_timeout(),
            entries: BTreeMap::new(),
            next_handle: 1,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handles of all open devices, lowest first
    pub fn handles(&self) -> impl Iterator<Item = DeviceHandle> + '_ {
        self.entries.keys().copied()
    }

    /// Open `path`, identify it and register it.
    ///
    /// Opening the same path twice yields two independent entries.
    pub fn open_device(&mut self, path: &str) -> Result<DeviceHandle> {
        info!("Opening device {} via {}", path, self.backend.name());

        let OpenedDevice { handle: os_handle, inquiry } =
            self.backend
                .open(path, &self.executor, self.inquiry_timeout)?;

        let decoded = match inquiry {
            InquiryData::Raw(raw) => Identity::decode(&raw).map_err(|e| e.to_string()),
            InquiryData::Unavailable(reason) => Err(reason),
        };

        let identity = match decoded {
            Ok(identity) => Some(identity),
            Err(reason) => match self.inquiry_policy {
                InquiryFailurePolicy::PlainTape => {
                    warn!(
                        "No SCSI identity for {} ({}), using it as a plain tape device",
                        path, reason
                    );
                    None
                }
                InquiryFailurePolicy::Fail => {
                    self.release(path, os_handle);
                    return Err(TapeCtlError::InquiryFailed {
                        path: path.to_string(),
                        reason,
                    });
                }
            },
        };

        let handle = match self.next_handle.checked_add(1) {
            Some(next) => {
                let handle = DeviceHandle(self.next_handle);
                self.next_handle = next;
                handle
            }
            None => {
                self.release(path, os_handle);
                return Err(TapeCtlError::unsupported("device handle space exhausted"));
            }
        };

        let scsi_capable = identity
            .as_ref()
            .map_or(false, |id| id.device_type().is_scsi_capable());

        match &identity {
            Some(id) => info!(
                "Opened {} as {}: {} {} [{}] ({})",
                path,
                handle,
                id.vendor(),
                id.product(),
                id.short_name(),
                id.device_type().description()
            ),
            None => info!("Opened {} as {} without identity", path, handle),
        }

        self.entries.insert(
            handle,
            DeviceDescriptor {
                os_handle,
                path: path.to_string(),
                scsi_capable,
                identity,
            },
        );
        Ok(handle)
    }

    /// Remove the entry and release its OS handle
    pub fn close_device(&mut self, handle: DeviceHandle) -> Result<()> {
        let descriptor = self
            .entries
            .remove(&handle)
            .ok_or(TapeCtlError::InvalidHandle(handle))?;
        debug!("Closing {} ({})", handle, descriptor.path);
        self.backend.close(descriptor.os_handle)
    }

    /// Close every open device, reporting the first failure
    pub fn close_all(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some((handle, descriptor)) = self.entries.pop_first() {
            debug!("Closing {} ({})", handle, descriptor.path);
            if let Err(e) = self.backend.close(descriptor.os_handle) {
                warn!("Closing {} failed: {}", descriptor.path, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn lookup(&self, handle: DeviceHandle) -> Result<&DeviceDescriptor<B::Handle>> {
        self.entries
            .get(&handle)
            .ok_or(TapeCtlError::InvalidHandle(handle))
    }

    /// First open handle for `path`, if any
    pub fn find_by_path(&self, path: &str) -> Option<DeviceHandle> {
        self.entries
            .iter()
            .find(|(_, descriptor)| descriptor.path == path)
            .map(|(handle, _)| *handle)
    }

    /// Execute a fully built request through the retry executor
    pub fn execute_command(
        &self,
        handle: DeviceHandle,
        request: &mut CommandRequest<'_>,
    ) -> Result<CommandOutcome> {
        let descriptor = self.lookup(handle)?;
        if !descriptor.scsi_capable {
            debug!(
                "{}: issuing opcode 0x{:02X} to a non-SCSI node",
                handle,
                request.cdb.first().copied().unwrap_or_default()
            );
        }
        self.executor
            .execute(&self.backend, &descriptor.os_handle, request)
    }

    /// Execute `cdb` with the configured command timeout
    pub fn execute(
        &self,
        handle: DeviceHandle,
        cdb: &[u8],
        data: DataTransfer<'_>,
        sense: &mut [u8],
    ) -> Result<CommandOutcome> {
        let mut request = CommandRequest {
            cdb,
            data,
            sense,
            timeout: self.command_timeout,
        };
        self.execute_command(handle, &mut request)
    }

    pub fn eject(&self, handle: DeviceHandle) -> Result<()> {
        let descriptor = self.lookup(handle)?;
        info!("Ejecting tape in {}", descriptor.path);
        self.backend.eject(&descriptor.os_handle)
    }

    pub fn rewind(&self, handle: DeviceHandle) -> Result<()> {
        let descriptor = self.lookup(handle)?;
        info!("Rewinding tape in {}", descriptor.path);
        self.backend.rewind(&descriptor.os_handle)
    }

    /// Tape mechanical status; an absent or faulted tape is a status, not an error
    pub fn query_tape_status(&self, handle: DeviceHandle) -> Result<TapeStatusFlags> {
        let descriptor = self.lookup(handle)?;
        let flags = self.backend.query_status(&descriptor.os_handle)?;
        debug!("{} status: {:?}", descriptor.path, flags);
        Ok(flags)
    }

    fn release(&self, path: &str, os_handle: B::Handle) {
        if let Err(e) = self.backend.close(os_handle) {
            warn!("Closing {} after failed open: {}", path, e);
        }
    }
}

/// Devices still registered are released when the registry goes away
impl<B: PlatformBackend> Drop for DeviceRegistry<B> {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            debug!("Registry dropped with {} open device(s)", self.entries.len());
            let _ = self.close_all();
        }
    }
}
