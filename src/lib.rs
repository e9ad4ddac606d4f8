//! RustTapeCtl Library
//!
//! Device-control layer for tape drives and tape-changer robots: opens and
//! identifies device nodes, executes raw SCSI commands with bounded retry,
//! decodes sense data and reports tape mechanical status, over one backend per
//! operating system.

pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod scsi;


// Re-export key types for easier use
pub use config::{Config, InquiryFailurePolicy};
pub use error::{Result, TapeCtlError};
pub use scsi::{
    CommandOutcome, CommandRequest, DataTransfer, DeviceDescriptor, DeviceHandle, DeviceRegistry,
    DeviceType, HostBackend, HostRegistry, Identity, PlatformBackend, ScsiStatus, SenseInfo,
    TapeStatusFlags,
};
