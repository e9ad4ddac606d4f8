//! SCSI device control
//!
//! Device registry, retry executor and the per-platform passthrough backends,
//! plus the INQUIRY, sense and tape-status decoders they share.

pub mod backend;
pub mod commands;
pub mod constants;
pub mod executor;
pub mod ffi;
pub mod inquiry;
pub mod registry;
pub mod sense;
pub mod status;
pub mod types;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(windows)]
pub mod windows;

#[cfg(test)]
pub(crate) mod sim;

pub use backend::{InquiryData, OpenedDevice, PlatformBackend, UnsupportedBackend};
pub use constants::{MAX_CDB_LEN, SENSE_INFO_LEN};
pub use executor::CommandExecutor;
pub use inquiry::{canonical_name, Identity};
pub use registry::{DeviceDescriptor, DeviceRegistry};
pub use sense::{SenseInfo, SenseKey};
pub use status::{TapeStatusFlags, TapeStatusReport};
pub use types::{
    CommandOutcome, CommandRequest, Completion, DataTransfer, DeviceHandle, DeviceType,
    Direction, ScsiStatus,
};

/// Backend selected for this build target
#[cfg(target_os = "linux")]
pub type HostBackend = linux::LinuxBackend;

#[cfg(windows)]
pub type HostBackend = windows::WindowsBackend;

#[cfg(not(any(target_os = "linux", windows)))]
pub type HostBackend = backend::UnsupportedBackend;

/// Registry bound to the host backend
pub type HostRegistry = DeviceRegistry<HostBackend>;
