use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::constants::{scsi_status, timeouts, TYPE_MEDIUM_CHANGER, TYPE_SEQUENTIAL_ACCESS};
use super::sense::SenseInfo;

/// Opaque handle for a device held open by a `DeviceRegistry`
///
/// Handles are never reused within one registry, so a stale handle can
/// always be told apart from a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DeviceHandle(pub(crate) u32);

impl DeviceHandle {
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev#{}", self.0)
    }
}

/// Peripheral device type reported by INQUIRY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceType {
    /// Sequential-access device (tape drive)
    Tape,
    /// Medium changer (tape library robot)
    MediumChanger,
    Other(u8),
}

impl DeviceType {
    /// Convert from the low 5 bits of INQUIRY byte 0
    pub fn from_peripheral_type(code: u8) -> Self {
        match code & 0x1F {
            TYPE_SEQUENTIAL_ACCESS => DeviceType::Tape,
            TYPE_MEDIUM_CHANGER => DeviceType::MediumChanger,
            other => DeviceType::Other(other),
        }
    }

    /// Only tapes and changers are driven through the SCSI command path
    pub fn is_scsi_capable(&self) -> bool {
        matches!(self, DeviceType::Tape | DeviceType::MediumChanger)
    }

    pub fn description(&self) -> &'static str {
        match self {
            DeviceType::Tape => "Sequential-access (tape)",
            DeviceType::MediumChanger => "Medium changer",
            DeviceType::Other(_) => "Other",
        }
    }
}

/// Data transfer direction of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    None,
    FromDevice,
    ToDevice,
}

/// Data buffer of one command; the variant fixes the transfer direction
#[derive(Debug)]
pub enum DataTransfer<'a> {
    None,
    FromDevice(&'a mut [u8]),
    ToDevice(&'a [u8]),
}

impl DataTransfer<'_> {
    pub fn direction(&self) -> Direction {
        match self {
            DataTransfer::None => Direction::None,
            DataTransfer::FromDevice(_) => Direction::FromDevice,
            DataTransfer::ToDevice(_) => Direction::ToDevice,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DataTransfer::None => 0,
            DataTransfer::FromDevice(buf) => buf.len(),
            DataTransfer::ToDevice(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One command submission: CDB, data buffer, sense buffer and timeout
///
/// Built per call; the sense buffer is overwritten on every attempt.
#[derive(Debug)]
pub struct CommandRequest<'a> {
    pub cdb: &'a [u8],
    pub data: DataTransfer<'a>,
    pub sense: &'a mut [u8],
    pub timeout: Duration,
}

impl<'a> CommandRequest<'a> {
    pub fn new(cdb: &'a [u8], sense: &'a mut [u8]) -> Self {
        Self {
            cdb,
            data: DataTransfer::None,
            sense,
            timeout: Duration::from_secs(timeouts::COMMAND_SECS),
        }
    }

    pub fn read_into(mut self, buffer: &'a mut [u8]) -> Self {
        self.data = DataTransfer::FromDevice(buffer);
        self
    }

    pub fn write_from(mut self, buffer: &'a [u8]) -> Self {
        self.data = DataTransfer::ToDevice(buffer);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn direction(&self) -> Direction {
        self.data.direction()
    }

    /// Timeout in whole milliseconds, saturated to the 32-bit wire field
    pub fn timeout_millis(&self) -> u32 {
        u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX)
    }

    /// Timeout in whole seconds, rounded up and never zero
    pub fn timeout_secs_ceil(&self) -> u32 {
        let millis = self.timeout.as_millis();
        let secs = (millis + 999) / 1000;
        u32::try_from(secs.max(1)).unwrap_or(u32::MAX)
    }
}

/// What a backend reports for one raw submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub raw_status: u8,
    /// Valid sense bytes written into the request's sense buffer
    pub sense_len: usize,
    /// Bytes of the data buffer that were not transferred
    pub residual: usize,
}

/// Vendor-independent classification of a raw status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScsiStatus {
    Good,
    CheckCondition,
    /// Transient; retried by the executor and never returned to callers
    Busy,
    Unknown(u8),
}

impl ScsiStatus {
    pub fn classify(raw: u8) -> Self {
        match raw {
            scsi_status::GOOD | scsi_status::CONDITION_MET => ScsiStatus::Good,
            scsi_status::CHECK_CONDITION => ScsiStatus::CheckCondition,
            scsi_status::BUSY | scsi_status::TASK_SET_FULL => ScsiStatus::Busy,
            other => ScsiStatus::Unknown(other),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScsiStatus::Good => "GOOD",
            ScsiStatus::CheckCondition => "CHECK CONDITION",
            ScsiStatus::Busy => "BUSY",
            ScsiStatus::Unknown(scsi_status::RESERVATION_CONFLICT) => "RESERVATION CONFLICT",
            ScsiStatus::Unknown(scsi_status::ACA_ACTIVE) => "ACA ACTIVE",
            ScsiStatus::Unknown(scsi_status::TASK_ABORTED) => "TASK ABORTED",
            ScsiStatus::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Terminal result of a command run through the executor
///
/// `status` is never `Busy`. On `CheckCondition` the sense bytes are the
/// diagnostic payload and are returned exactly as the device wrote them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub status: ScsiStatus,
    pub raw_status: u8,
    pub sense: Vec<u8>,
    pub residual: usize,
    pub attempts: u32,
}

impl CommandOutcome {
    pub fn is_good(&self) -> bool {
        self.status == ScsiStatus::Good
    }

    pub fn is_check_condition(&self) -> bool {
        self.status == ScsiStatus::CheckCondition
    }

    /// Decoded sense data, if any was returned
    pub fn sense_info(&self) -> Option<SenseInfo> {
        SenseInfo::parse(&self.sense)
    }
}
