// SCSI constant definitions shared by every backend

/// Sense buffer size handed to the OS on every submission
pub const SENSE_INFO_LEN: usize = 64;

/// Largest CDB accepted by both SG_IO and SCSI_PASS_THROUGH_DIRECT
pub const MAX_CDB_LEN: usize = 16;

/// Allocation length used for the identity INQUIRY issued at open time
pub const INQUIRY_ALLOC_LEN: usize = 96;

/// Standard INQUIRY data is at least this long (through the revision field)
pub const INQUIRY_MIN_LEN: usize = 36;

// Standard INQUIRY field layout
pub const INQUIRY_VENDOR_OFFSET: usize = 8;
pub const INQUIRY_VENDOR_LEN: usize = 8;
pub const INQUIRY_PRODUCT_OFFSET: usize = 16;
pub const INQUIRY_PRODUCT_LEN: usize = 16;
pub const INQUIRY_REVISION_OFFSET: usize = 32;
pub const INQUIRY_REVISION_LEN: usize = 4;

/// Canonical short names never exceed the product-identifier width
pub const SHORT_NAME_MAX: usize = 16;

// Peripheral device type codes (low 5 bits of INQUIRY byte 0)
pub const TYPE_SEQUENTIAL_ACCESS: u8 = 0x01;
pub const TYPE_MEDIUM_CHANGER: u8 = 0x08;

// SCSI Commands Module
pub mod scsi_commands {
    pub const TEST_UNIT_READY: u8 = 0x00;
    pub const REQUEST_SENSE: u8 = 0x03;
    pub const INQUIRY: u8 = 0x12;
}

// Raw completion status byte (SAM status codes)
pub mod scsi_status {
    pub const GOOD: u8 = 0x00;
    pub const CHECK_CONDITION: u8 = 0x02;
    pub const CONDITION_MET: u8 = 0x04;
    pub const BUSY: u8 = 0x08;
    pub const RESERVATION_CONFLICT: u8 = 0x18;
    pub const TASK_SET_FULL: u8 = 0x28;
    pub const ACA_ACTIVE: u8 = 0x30;
    pub const TASK_ABORTED: u8 = 0x40;
}

// Default timeouts (seconds)
pub mod timeouts {
    pub const COMMAND_SECS: u64 = 240;
    pub const INQUIRY_SECS: u64 = 120;
    pub const TEST_UNIT_READY_SECS: u64 = 30;
}

// Linux generic tape status bits (mt_gstat), from /usr/include/linux/mtio.h
pub mod gmt {
    pub const EOF: i64 = 0x8000_0000;
    pub const BOT: i64 = 0x4000_0000;
    pub const EOT: i64 = 0x2000_0000;
    pub const EOD: i64 = 0x0800_0000;
    pub const WR_PROT: i64 = 0x0400_0000;
    pub const ONLINE: i64 = 0x0100_0000;
    pub const DR_OPEN: i64 = 0x0004_0000;
}

// Win32 tape error codes consumed by the status decoder (winerror.h)
pub mod win32 {
    pub const NO_ERROR: u32 = 0;
    pub const ERROR_WRITE_PROTECT: u32 = 19;
    pub const ERROR_NOT_READY: u32 = 21;
    pub const ERROR_END_OF_MEDIA: u32 = 1100;
    pub const ERROR_FILEMARK_DETECTED: u32 = 1101;
    pub const ERROR_BEGINNING_OF_MEDIA: u32 = 1102;
    pub const ERROR_NO_DATA_DETECTED: u32 = 1104;
    pub const ERROR_MEDIA_CHANGED: u32 = 1110;
    pub const ERROR_NO_MEDIA_IN_DRIVE: u32 = 1112;
}
