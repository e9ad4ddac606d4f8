//! SCSI Sense Data Parsing
//!
//! This module handles parsing and interpretation of SCSI sense data in both
//! the fixed (0x70/0x71) and descriptor (0x72/0x73) formats.

use serde::Serialize;
use std::fmt;

/// SCSI sense key (low nibble of the sense key byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SenseKey {
    NoSense,
    RecoveredError,
    NotReady,
    MediumError,
    HardwareError,
    IllegalRequest,
    UnitAttention,
    DataProtect,
    BlankCheck,
    VendorSpecific,
    CopyAborted,
    AbortedCommand,
    VolumeOverflow,
    Miscompare,
    Completed,
    Reserved(u8),
}

impl SenseKey {
    pub fn from_code(code: u8) -> Self {
        match code & 0x0F {
            0x00 => SenseKey::NoSense,
            0x01 => SenseKey::RecoveredError,
            0x02 => SenseKey::NotReady,
            0x03 => SenseKey::MediumError,
            0x04 => SenseKey::HardwareError,
            0x05 => SenseKey::IllegalRequest,
            0x06 => SenseKey::UnitAttention,
            0x07 => SenseKey::DataProtect,
            0x08 => SenseKey::BlankCheck,
            0x09 => SenseKey::VendorSpecific,
            0x0A => SenseKey::CopyAborted,
            0x0B => SenseKey::AbortedCommand,
            0x0D => SenseKey::VolumeOverflow,
            0x0E => SenseKey::Miscompare,
            0x0F => SenseKey::Completed,
            other => SenseKey::Reserved(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SenseKey::NoSense => "No Sense",
            SenseKey::RecoveredError => "Recovered Error",
            SenseKey::NotReady => "Not Ready",
            SenseKey::MediumError => "Medium Error",
            SenseKey::HardwareError => "Hardware Error",
            SenseKey::IllegalRequest => "Illegal Request",
            SenseKey::UnitAttention => "Unit Attention",
            SenseKey::DataProtect => "Data Protect",
            SenseKey::BlankCheck => "Blank Check",
            SenseKey::VendorSpecific => "Vendor Specific",
            SenseKey::CopyAborted => "Copy Aborted",
            SenseKey::AbortedCommand => "Aborted Command",
            SenseKey::VolumeOverflow => "Volume Overflow",
            SenseKey::Miscompare => "Miscompare",
            SenseKey::Completed => "Completed",
            SenseKey::Reserved(_) => "Reserved",
        }
    }
}

/// Decoded sense data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SenseInfo {
    pub response_code: u8,
    pub key: SenseKey,
    pub asc: u8,
    pub ascq: u8,
    pub filemark: bool,
    pub end_of_medium: bool,
    pub incorrect_length: bool,
    /// Information field, present when the VALID bit is set
    pub information: Option<u64>,
}

impl SenseInfo {
    /// Parse raw sense bytes, returning `None` when no sense is present
    pub fn parse(sense: &[u8]) -> Option<Self> {
        let response_code = *sense.first()? & 0x7F;
        match response_code {
            0x70 | 0x71 => Self::parse_fixed(sense, response_code),
            0x72 | 0x73 => Self::parse_descriptor(sense, response_code),
            _ => None,
        }
    }

    fn parse_fixed(sense: &[u8], response_code: u8) -> Option<Self> {
        if sense.len() < 3 {
            return None;
        }

        let flags = sense[2];
        let valid = sense[0] & 0x80 != 0;
        let information = if valid && sense.len() >= 7 {
            Some(u32::from_be_bytes([sense[3], sense[4], sense[5], sense[6]]) as u64)
        } else {
            None
        };

        Some(Self {
            response_code,
            key: SenseKey::from_code(flags),
            asc: sense.get(12).copied().unwrap_or(0),
            ascq: sense.get(13).copied().unwrap_or(0),
            filemark: flags & 0x80 != 0,
            end_of_medium: flags & 0x40 != 0,
            incorrect_length: flags & 0x20 != 0,
            information,
        })
    }

    fn parse_descriptor(sense: &[u8], response_code: u8) -> Option<Self> {
        if sense.len() < 4 {
            return None;
        }

        let mut info = Self {
            response_code,
            key: SenseKey::from_code(sense[1]),
            asc: sense[2],
            ascq: sense[3],
            filemark: false,
            end_of_medium: false,
            incorrect_length: false,
            information: None,
        };

        let additional = sense.get(7).copied().unwrap_or(0) as usize;
        let end = sense.len().min(8 + additional);
        let mut offset = 8;
        while offset + 2 <= end {
            let code = sense[offset];
            let len = sense[offset + 1] as usize;
            let body = &sense[offset + 2..end.min(offset + 2 + len)];
            match code {
                // Information descriptor
                0x00 if body.len() >= 10 && body[0] & 0x80 != 0 => {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(&body[2..10]);
                    info.information = Some(u64::from_be_bytes(bytes));
                }
                // Stream commands descriptor
                0x04 if body.len() >= 2 => {
                    info.filemark = body[1] & 0x80 != 0;
                    info.end_of_medium = body[1] & 0x40 != 0;
                    info.incorrect_length = body[1] & 0x20 != 0;
                }
                _ => {}
            }
            offset += 2 + len;
        }

        Some(info)
    }

    /// True when the drive reports that no medium is loaded
    pub fn is_no_medium(&self) -> bool {
        self.key == SenseKey::NotReady && self.asc == 0x3A
    }

    /// Human-readable interpretation of key and ASC/ASCQ
    pub fn description(&self) -> String {
        match (self.key, self.asc, self.ascq) {
            (SenseKey::NoSense, 0x00, 0x00) => "No additional sense information".to_string(),
            (_, 0x00, 0x01) => "Filemark detected".to_string(),
            (_, 0x00, 0x02) => "End of partition/medium detected".to_string(),
            (_, 0x00, 0x04) => "Beginning of partition/medium detected".to_string(),
            (_, 0x00, 0x05) => "End of data detected".to_string(),
            (SenseKey::NotReady, 0x3A, _) => "No tape loaded".to_string(),
            (SenseKey::NotReady, 0x04, 0x01) => "Drive not ready - becoming ready".to_string(),
            (SenseKey::NotReady, 0x04, _) => "Drive not ready".to_string(),
            (SenseKey::NotReady, 0x3B, 0x0D) => "Medium destination element full".to_string(),
            (SenseKey::NotReady, 0x3B, 0x0E) => "Medium source element empty".to_string(),
            (SenseKey::UnitAttention, 0x28, 0x00) => {
                "Unit attention - not ready to ready transition".to_string()
            }
            (SenseKey::UnitAttention, 0x29, _) => "Unit attention - power on or reset".to_string(),
            (SenseKey::DataProtect, 0x27, _) => "Write protected".to_string(),
            (SenseKey::IllegalRequest, 0x20, 0x00) => "Invalid command operation code".to_string(),
            (SenseKey::IllegalRequest, 0x24, 0x00) => "Invalid field in CDB".to_string(),
            (key, asc, ascq) => format!(
                "{} - ASC/ASCQ: 0x{:02X}/0x{:02X}",
                key.name(),
                asc,
                ascq
            ),
        }
    }
}

impl fmt::Display for SenseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (key 0x{:02X}, ASC 0x{:02X}, ASCQ 0x{:02X})",
            self.description(),
            sense_key_code(self.key),
            self.asc,
            self.ascq
        )
    }
}

fn sense_key_code(key: SenseKey) -> u8 {
    match key {
        SenseKey::NoSense => 0x00,
        SenseKey::RecoveredError => 0x01,
        SenseKey::NotReady => 0x02,
        SenseKey::MediumError => 0x03,
        SenseKey::HardwareError => 0x04,
        SenseKey::IllegalRequest => 0x05,
        SenseKey::UnitAttention => 0x06,
        SenseKey::DataProtect => 0x07,
        SenseKey::BlankCheck => 0x08,
        SenseKey::VendorSpecific => 0x09,
        SenseKey::CopyAborted => 0x0A,
        SenseKey::AbortedCommand => 0x0B,
        SenseKey::VolumeOverflow => 0x0D,
        SenseKey::Miscompare => 0x0E,
        SenseKey::Completed => 0x0F,
        SenseKey::Reserved(code) => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_sense(key: u8, asc: u8, ascq: u8) -> [u8; 18] {
        let mut sense = [0u8; 18];
        sense[0] = 0x70;
        sense[2] = key;
        sense[7] = 10;
        sense[12] = asc;
        sense[13] = ascq;
        sense
    }

    #[test]
    fn test_no_tape_sense() {
        let info = SenseInfo::parse(&fixed_sense(0x02, 0x3A, 0x00)).unwrap();
        assert_eq!(info.key, SenseKey::NotReady);
        assert!(info.is_no_medium());
        assert_eq!(info.description(), "No tape loaded");
    }

    #[test]
    fn test_fixed_sense_flags_and_information() {
        let mut sense = fixed_sense(0x80 | 0x20, 0x00, 0x01);
        sense[0] = 0xF0; // VALID bit
        sense[3..7].copy_from_slice(&512u32.to_be_bytes());

        let info = SenseInfo::parse(&sense).unwrap();
        assert!(info.filemark);
        assert!(info.incorrect_length);
        assert!(!info.end_of_medium);
        assert_eq!(info.information, Some(512));
        assert_eq!(info.description(), "Filemark detected");
    }

    #[test]
    fn test_descriptor_sense() {
        let sense = [
            0x72, 0x03, 0x11, 0x00, 0, 0, 0, 6, // header, 6 descriptor bytes
            0x04, 0x02, 0x00, 0x40, // stream commands: EOM
            0x09, 0x00, // unknown descriptor, empty
        ];
        let info = SenseInfo::parse(&sense).unwrap();
        assert_eq!(info.key, SenseKey::MediumError);
        assert_eq!(info.asc, 0x11);
        assert!(info.end_of_medium);
        assert!(!info.filemark);
    }

    #[test]
    fn test_empty_or_short_sense() {
        assert!(SenseInfo::parse(&[]).is_none());
        assert!(SenseInfo::parse(&[0u8; 18]).is_none());
        assert!(SenseInfo::parse(&[0x70, 0x00]).is_none());
    }

    #[test]
    fn test_fallback_description() {
        let info = SenseInfo::parse(&fixed_sense(0x04, 0x44, 0x00)).unwrap();
        assert_eq!(info.description(), "Hardware Error - ASC/ASCQ: 0x44/0x00");
        assert!(info.to_string().contains("key 0x04"));
    }
}
