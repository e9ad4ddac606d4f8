//! Platform wire structures for SCSI passthrough and tape control
//!
//! Linux: scsi/sg.h and sys/mtio.h. Windows: ntddscsi.h.

#[cfg(target_os = "linux")]
pub use self::linux_abi::*;

#[cfg(windows)]
pub use self::windows_abi::*;

#[cfg(target_os = "linux")]
mod linux_abi {
    use libc::{c_int, c_long, c_short, c_uchar, c_uint, c_ushort, c_void};
    use std::ptr;

    //#define SG_IO 0x2285
    pub const SG_IO: c_uint = 0x2285;

    pub const SG_DXFER_NONE: c_int = -1;
    pub const SG_DXFER_TO_DEV: c_int = -2;
    pub const SG_DXFER_FROM_DEV: c_int = -3;

    // driver_status values (low nibble)
    pub const SG_DRIVER_MASK: c_ushort = 0x0f;
    pub const DRIVER_TIMEOUT: c_ushort = 0x06;
    pub const DRIVER_SENSE: c_ushort = 0x08;

    /// sg_io_hdr_t from scsi/sg.h
    #[repr(C)]
    #[derive(Debug)]
    pub struct SgIoHdr {
        pub interface_id: c_int,    // [i] 'S' for SCSI generic (required)
        pub dxfer_direction: c_int, // [i] data transfer direction
        pub cmd_len: c_uchar,       // [i] SCSI command length ( <= 16 bytes)
        pub mx_sb_len: c_uchar,     // [i] max length to write to sbp
        pub iovec_count: c_ushort,  // [i] 0 implies no scatter gather
        pub dxfer_len: c_uint,      // [i] byte count of data transfer
        pub dxferp: *mut c_void,    // [i], [*io] data transfer memory
        pub cmdp: *const c_uchar,   // [i], [*i] command to perform
        pub sbp: *mut c_uchar,      // [i], [*o] sense_buffer memory
        pub timeout: c_uint,        // [i] MAX_UINT->no timeout (unit: millisec)
        pub flags: c_uint,          // [i] 0 -> default, see SG_FLAG...
        pub pack_id: c_int,         // [i->o] unused internally (normally)
        pub usr_ptr: *mut c_void,   // [i->o] unused internally
        pub status: c_uchar,        // [o] scsi status
        pub masked_status: c_uchar, // [o] shifted, masked scsi status
        pub msg_status: c_uchar,    // [o] messaging level data (optional)
        pub sb_len_wr: c_uchar,     // [o] byte count actually written to sbp
        pub host_status: c_ushort,  // [o] errors from host adapter
        pub driver_status: c_ushort, // [o] errors from software driver
        pub resid: c_int,           // [o] dxfer_len - actual_transferred
        pub duration: c_uint,       // [o] time taken by cmd (unit: millisec)
        pub info: c_uint,           // [o] auxiliary information
    }

    impl SgIoHdr {
        pub fn new() -> Self {
            Self {
                interface_id: 'S' as c_int,
                dxfer_direction: SG_DXFER_NONE,
                cmd_len: 0,
                mx_sb_len: 0,
                iovec_count: 0,
                dxfer_len: 0,
                dxferp: ptr::null_mut(),
                cmdp: ptr::null(),
                sbp: ptr::null_mut(),
                timeout: 0,
                flags: 0,
                pack_id: 0,
                usr_ptr: ptr::null_mut(),
                status: 0,
                masked_status: 0,
                msg_status: 0,
                sb_len_wr: 0,
                host_status: 0,
                driver_status: 0,
                resid: 0,
                duration: 0,
                info: 0,
            }
        }
    }

    nix::ioctl_readwrite_bad!(sg_io, SG_IO, SgIoHdr);

    /// struct mtop from sys/mtio.h
    #[repr(C)]
    #[derive(Debug)]
    pub struct Mtop {
        pub mt_op: c_short,
        pub mt_count: c_int,
    }

    pub const MTREW: c_short = 6; // rewind
    pub const MTOFFL: c_short = 7; // rewind and put the drive offline (eject)

    //#define MTIOCTOP _IOW('m', 1, struct mtop)
    nix::ioctl_write_ptr!(mtioctop, b'm', 1, Mtop);

    /// struct mtget from sys/mtio.h
    #[repr(C)]
    #[derive(Default, Debug)]
    pub struct Mtget {
        pub mt_type: c_long,
        pub mt_resid: c_long,
        pub mt_dsreg: c_long,
        pub mt_gstat: c_long, // generic (device independent) status
        pub mt_erreg: c_long,
        pub mt_fileno: i32,
        pub mt_blkno: i32,
    }

    //#define MTIOCGET _IOR('m', 2, struct mtget)
    nix::ioctl_read!(mtiocget, b'm', 2, Mtget);
}

#[cfg(windows)]
mod windows_abi {
    use winapi::shared::{
        minwindef::{UCHAR, ULONG, USHORT},
        ntdef::PVOID,
    };

    use crate::scsi::constants::SENSE_INFO_LEN;

    pub const IOCTL_SCSI_PASS_THROUGH_DIRECT: u32 = 0x0004D014;

    // SCSI data direction
    pub const SCSI_IOCTL_DATA_OUT: u8 = 0;
    pub const SCSI_IOCTL_DATA_IN: u8 = 1;
    pub const SCSI_IOCTL_DATA_UNSPECIFIED: u8 = 2;

    /// SCSI Pass Through Direct structure (SCSI_PASS_THROUGH_DIRECT in ntddscsi.h)
    #[repr(C)]
    #[derive(Debug)]
    pub struct ScsiPassThroughDirect {
        pub length: USHORT,
        pub scsi_status: UCHAR,
        pub path_id: UCHAR,
        pub target_id: UCHAR,
        pub lun: UCHAR,
        pub cdb_length: UCHAR,
        pub sense_info_length: UCHAR,
        pub data_in: UCHAR,
        pub data_transfer_length: ULONG,
        pub timeout_value: ULONG,
        pub data_buffer: PVOID,
        pub sense_info_offset: ULONG,
        pub cdb: [UCHAR; 16],
    }

    /// Pass-through request followed by its sense buffer in one allocation
    #[repr(C)]
    #[derive(Debug)]
    pub struct ScsiPassThroughDirectWithSense {
        pub sptd: ScsiPassThroughDirect,
        pub sense: [UCHAR; SENSE_INFO_LEN],
    }
}
