//! Tape positional status
//!
//! Portable flag set built from the platform's mechanical status report.

use serde::Serialize;

use super::constants::{gmt, win32};

bitflags::bitflags! {
    /// Portable tape status; flags are independent and may combine
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TapeStatusFlags: u8 {
        const ONLINE = 0x01;
        const BOT = 0x02;
        const EOT = 0x04;
        const WRITE_PROTECTED = 0x08;
    }
}

impl TapeStatusFlags {
    /// Decode the Linux `mt_gstat` generic status word
    pub fn from_gmt(gstat: i64) -> Self {
        let mut flags = Self::empty();
        if gstat & gmt::ONLINE != 0 {
            flags |= Self::ONLINE;
        }
        if gstat & gmt::BOT != 0 {
            flags |= Self::BOT;
        }
        if gstat & gmt::EOT != 0 {
            flags |= Self::EOT;
        }
        if gstat & gmt::WR_PROT != 0 {
            flags |= Self::WRITE_PROTECTED;
        }
        flags
    }

    /// Decode a Windows tape status report.
    ///
    /// `status` is the `GetTapeStatus` result, `write_protected` comes from the
    /// media parameters and `logical_offset` from `GetTapePosition`; both are
    /// `None` when the drive could not be asked.
    pub fn from_win32(status: u32, write_protected: Option<bool>, logical_offset: Option<u64>) -> Self {
        let mut flags = Self::empty();
        match status {
            win32::NO_ERROR
            | win32::ERROR_MEDIA_CHANGED
            | win32::ERROR_FILEMARK_DETECTED
            | win32::ERROR_NO_DATA_DETECTED => flags |= Self::ONLINE,
            win32::ERROR_BEGINNING_OF_MEDIA => flags |= Self::ONLINE | Self::BOT,
            win32::ERROR_END_OF_MEDIA => flags |= Self::ONLINE | Self::EOT,
            win32::ERROR_WRITE_PROTECT => flags |= Self::ONLINE | Self::WRITE_PROTECTED,
            _ => return flags,
        }
        if write_protected == Some(true) {
            flags |= Self::WRITE_PROTECTED;
        }
        if logical_offset == Some(0) {
            flags |= Self::BOT;
        }
        flags
    }

    pub fn is_online(&self) -> bool {
        self.contains(Self::ONLINE)
    }

    pub fn report(&self) -> TapeStatusReport {
        TapeStatusReport {
            online: self.contains(Self::ONLINE),
            beginning_of_tape: self.contains(Self::BOT),
            end_of_tape: self.contains(Self::EOT),
            write_protected: self.contains(Self::WRITE_PROTECTED),
        }
    }
}

/// Serializable view of `TapeStatusFlags`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TapeStatusReport {
    pub online: bool,
    pub beginning_of_tape: bool,
    pub end_of_tape: bool,
    pub write_protected: bool,
}
