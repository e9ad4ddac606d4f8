//! Windows backend: SCSI_PASS_THROUGH_DIRECT and the Win32 tape API

use std::ffi::CString;
use std::mem::{offset_of, size_of};
use tracing::{debug, warn};

use winapi::{
    shared::{
        minwindef::{DWORD, FALSE, UCHAR, ULONG, USHORT},
        ntdef::{HANDLE, PVOID},
    },
    um::{
        errhandlingapi::GetLastError,
        fileapi::{CreateFileA, OPEN_EXISTING},
        handleapi::{CloseHandle, INVALID_HANDLE_VALUE},
        ioapiset::DeviceIoControl,
        winbase::{GetTapeParameters, GetTapePosition, GetTapeStatus, PrepareTape, SetTapePosition},
        winnt::{
            GENERIC_READ, GENERIC_WRITE, GET_TAPE_MEDIA_INFORMATION, TAPE_GET_MEDIA_PARAMETERS,
            TAPE_LOGICAL_POSITION, TAPE_REWIND, TAPE_UNLOAD,
        },
    },
};

use super::backend::PlatformBackend;
use super::constants::{scsi_status, win32, SENSE_INFO_LEN};
use super::ffi::*;
use super::status::TapeStatusFlags;
use super::types::{CommandRequest, Completion, DataTransfer};
use crate::error::{Result, TapeCtlError};

/// Device handle wrapper that ensures proper resource cleanup
#[derive(Debug)]
pub struct WinHandle {
    handle: HANDLE,
    device_path: String,
}

impl WinHandle {
    pub fn raw(&self) -> HANDLE {
        self.handle
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    fn into_raw(mut self) -> HANDLE {
        std::mem::replace(&mut self.handle, INVALID_HANDLE_VALUE)
    }
}

/// Implement Drop trait to ensure device handle is properly closed
impl Drop for WinHandle {
    fn drop(&mut self) {
        if self.handle != INVALID_HANDLE_VALUE {
            unsafe {
                CloseHandle(self.handle);
            }
            debug!("Device handle closed: {}", self.device_path);
        }
    }
}

/// Build complete device path, similar to "\\\\.\\TAPE0"
fn full_device_path(device_path: &str) -> String {
    if device_path.starts_with(r"\\.\") {
        device_path.to_string()
    } else if device_path.to_ascii_uppercase().starts_with("TAPE")
        || device_path.to_ascii_uppercase().starts_with("CHANGER")
    {
        format!(r"\\.\{}", device_path)
    } else {
        device_path.to_string()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        Self
    }

    fn check(code: DWORD, what: &str) -> Result<()> {
        if code == win32::NO_ERROR {
            Ok(())
        } else {
            Err(TapeCtlError::io_failure(format!(
                "{what} failed: Windows error code 0x{:08X}",
                code
            )))
        }
    }
}

impl PlatformBackend for WindowsBackend {
    type Handle = WinHandle;

    fn name(&self) -> &'static str {
        "windows-sptd"
    }

    fn open_node(&self, path: &str) -> Result<WinHandle> {
        let full_path = full_device_path(path);
        debug!("Full device path: {}", full_path);

        let path_cstring = CString::new(full_path.clone()).map_err(|e| {
            TapeCtlError::cannot_open(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            )
        })?;

        let handle = unsafe {
            CreateFileA(
                path_cstring.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0, // Exclusive access (0), no sharing allowed
                std::ptr::null_mut(),
                OPEN_EXISTING,
                0,
                std::ptr::null_mut(),
            )
        };

        if handle == INVALID_HANDLE_VALUE {
            return Err(TapeCtlError::cannot_open(
                full_path,
                std::io::Error::last_os_error(),
            ));
        }

        Ok(WinHandle {
            handle,
            device_path: full_path,
        })
    }

    fn close(&self, handle: WinHandle) -> Result<()> {
        let path = handle.device_path.clone();
        let raw = handle.into_raw();
        if unsafe { CloseHandle(raw) } == 0 {
            let code = unsafe { GetLastError() };
            return Err(TapeCtlError::io_failure(format!(
                "CloseHandle({}) failed: Windows error code 0x{:08X}",
                path, code
            )));
        }
        debug!("Device handle closed: {}", path);
        Ok(())
    }

    fn submit(&self, handle: &WinHandle, request: &mut CommandRequest<'_>) -> Result<Completion> {
        let mut buffer: ScsiPassThroughDirectWithSense = unsafe { std::mem::zeroed() };
        fill_sptd(&mut buffer, request)?;

        let mut bytes_returned: DWORD = 0;
        let ok = unsafe {
            DeviceIoControl(
                handle.handle,
                IOCTL_SCSI_PASS_THROUGH_DIRECT,
                &mut buffer as *mut _ as PVOID,
                size_of::<ScsiPassThroughDirectWithSense>() as DWORD,
                &mut buffer as *mut _ as PVOID,
                size_of::<ScsiPassThroughDirectWithSense>() as DWORD,
                &mut bytes_returned,
                std::ptr::null_mut(),
            )
        } != 0;

        if !ok {
            let error_code = unsafe { GetLastError() };
            warn!(
                "SCSI command failed: Windows error code 0x{:08X}, CDB: {:02X?}",
                error_code, request.cdb
            );
            return Err(TapeCtlError::io_failure(format!(
                "DeviceIoControl failed: Windows error code 0x{:08X}",
                error_code
            )));
        }

        let requested = request.data.len();
        let completion = completion_from_sptd(&buffer, &mut *request.sense, requested);

        debug!(
            "SPTD: CDB {:02X?} status 0x{:02X} sense {} transferred {}",
            request.cdb,
            completion.raw_status,
            completion.sense_len,
            buffer.sptd.data_transfer_length
        );

        Ok(completion)
    }

    fn eject(&self, handle: &WinHandle) -> Result<()> {
        let code = unsafe { PrepareTape(handle.handle, TAPE_UNLOAD, FALSE) };
        Self::check(code, "PrepareTape(TAPE_UNLOAD)")
    }

    fn rewind(&self, handle: &WinHandle) -> Result<()> {
        let code = unsafe { SetTapePosition(handle.handle, TAPE_REWIND, 0, 0, 0, FALSE) };
        Self::check(code, "SetTapePosition(TAPE_REWIND)")
    }

    fn query_status(&self, handle: &WinHandle) -> Result<TapeStatusFlags> {
        let status = unsafe { GetTapeStatus(handle.handle) };

        let mut params: TAPE_GET_MEDIA_PARAMETERS = unsafe { std::mem::zeroed() };
        let mut size = size_of::<TAPE_GET_MEDIA_PARAMETERS>() as DWORD;
        let code = unsafe {
            GetTapeParameters(
                handle.handle,
                GET_TAPE_MEDIA_INFORMATION,
                &mut size,
                &mut params as *mut _ as PVOID,
            )
        };
        let write_protected = (code == win32::NO_ERROR).then(|| params.WriteProtected != 0);

        let (mut partition, mut low, mut high): (DWORD, DWORD, DWORD) = (0, 0, 0);
        let code = unsafe {
            GetTapePosition(
                handle.handle,
                TAPE_LOGICAL_POSITION,
                &mut partition,
                &mut low,
                &mut high,
            )
        };
        let offset = (code == win32::NO_ERROR).then(|| ((high as u64) << 32) | low as u64);

        debug!(
            "GetTapeStatus 0x{:08X}, write protected {:?}, logical offset {:?}",
            status, write_protected, offset
        );

        Ok(TapeStatusFlags::from_win32(status, write_protected, offset))
    }
}

/// Fill the pass-through request; sense lands in the trailing buffer
fn fill_sptd(
    buffer: &mut ScsiPassThroughDirectWithSense,
    request: &mut CommandRequest<'_>,
) -> Result<()> {
    let requested = request.data.len();
    let transfer_len = ULONG::try_from(requested).map_err(|_| {
        TapeCtlError::invalid_request(format!("data buffer too large: {requested} bytes"))
    })?;

    let sptd = &mut buffer.sptd;
    sptd.length = size_of::<ScsiPassThroughDirect>() as USHORT;
    sptd.cdb_length = request.cdb.len() as UCHAR;
    sptd.sense_info_length = SENSE_INFO_LEN as UCHAR;
    sptd.sense_info_offset = offset_of!(ScsiPassThroughDirectWithSense, sense) as ULONG;
    sptd.timeout_value = request.timeout_secs_ceil();
    sptd.cdb[..request.cdb.len()].copy_from_slice(request.cdb);

    match &mut request.data {
        DataTransfer::None => {
            sptd.data_in = SCSI_IOCTL_DATA_UNSPECIFIED;
            sptd.data_buffer = std::ptr::null_mut();
            sptd.data_transfer_length = 0;
        }
        DataTransfer::FromDevice(buf) => {
            sptd.data_in = SCSI_IOCTL_DATA_IN;
            sptd.data_buffer = buf.as_mut_ptr() as PVOID;
            sptd.data_transfer_length = transfer_len;
        }
        DataTransfer::ToDevice(buf) => {
            sptd.data_in = SCSI_IOCTL_DATA_OUT;
            sptd.data_buffer = buf.as_ptr() as PVOID;
            sptd.data_transfer_length = transfer_len;
        }
    }
    Ok(())
}

/// Decode a returned request and copy its sense into the caller's buffer
fn completion_from_sptd(
    buffer: &ScsiPassThroughDirectWithSense,
    sense: &mut [u8],
    requested: usize,
) -> Completion {
    let raw_status = buffer.sptd.scsi_status;
    let sense_len = if raw_status == scsi_status::GOOD {
        0
    } else {
        (buffer.sptd.sense_info_length as usize)
            .min(SENSE_INFO_LEN)
            .min(sense.len())
    };
    sense[..sense_len].copy_from_slice(&buffer.sense[..sense_len]);

    Completion {
        raw_status,
        sense_len,
        residual: requested.saturating_sub(buffer.sptd.data_transfer_length as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_full_device_path() {
        assert_eq!(full_device_path("TAPE0"), r"\\.\TAPE0");
        assert_eq!(full_device_path(r"\\.\TAPE1"), r"\\.\TAPE1");
        assert_eq!(full_device_path("Changer0"), r"\\.\Changer0");
    }

    fn zeroed() -> ScsiPassThroughDirectWithSense {
        unsafe { std::mem::zeroed() }
    }

    #[test]
    fn test_fill_sptd_read() {
        let cdb = [0x12u8, 0, 0, 0, 96, 0];
        let mut sense = [0u8; 32];
        let mut data = [0u8; 96];
        let data_ptr = data.as_mut_ptr();
        let mut request = CommandRequest::new(&cdb, &mut sense)
            .read_into(&mut data)
            .with_timeout(Duration::from_millis(1500));

        let mut buffer = zeroed();
        fill_sptd(&mut buffer, &mut request).unwrap();

        let sptd = &buffer.sptd;
        assert_eq!(sptd.data_in, SCSI_IOCTL_DATA_IN);
        assert_eq!(sptd.data_transfer_length, 96);
        assert_eq!(sptd.data_buffer as *mut u8, data_ptr);
        assert_eq!(sptd.cdb_length, 6);
        assert_eq!(&sptd.cdb[..6], &cdb);
        assert_eq!(sptd.timeout_value, 2);
        assert_eq!(sptd.sense_info_length as usize, SENSE_INFO_LEN);
        assert_eq!(
            sptd.sense_info_offset as usize,
            size_of::<ScsiPassThroughDirect>()
        );
    }

    #[test]
    fn test_fill_sptd_write_and_none() {
        let cdb = [0x0Au8, 0, 0, 0, 4, 0];
        let payload = [1u8, 2, 3, 4];
        let mut sense = [0u8; 32];
        let mut request = CommandRequest::new(&cdb, &mut sense).write_from(&payload);

        let mut buffer = zeroed();
        fill_sptd(&mut buffer, &mut request).unwrap();
        assert_eq!(buffer.sptd.data_in, SCSI_IOCTL_DATA_OUT);
        assert_eq!(buffer.sptd.data_transfer_length, 4);

        let tur = [0u8; 6];
        let mut sense = [0u8; 32];
        let mut request = CommandRequest::new(&tur, &mut sense);
        fill_sptd(&mut buffer, &mut request).unwrap();
        assert_eq!(buffer.sptd.data_in, SCSI_IOCTL_DATA_UNSPECIFIED);
        assert_eq!(buffer.sptd.data_transfer_length, 0);
        assert!(buffer.sptd.data_buffer.is_null());
    }

    #[test]
    fn test_completion_copies_sense_on_check_condition() {
        let mut buffer = zeroed();
        buffer.sptd.scsi_status = scsi_status::CHECK_CONDITION;
        buffer.sptd.sense_info_length = 18;
        buffer.sense[0] = 0x70;
        buffer.sense[2] = 0x02;
        buffer.sense[12] = 0x3A;

        let mut sense = [0u8; 8];
        let completion = completion_from_sptd(&buffer, &mut sense, 0);
        assert_eq!(completion.raw_status, scsi_status::CHECK_CONDITION);
        assert_eq!(completion.sense_len, 8);
        assert_eq!(&sense[..3], &[0x70, 0x00, 0x02]);
    }

    #[test]
    fn test_completion_good_reports_no_sense() {
        let mut buffer = zeroed();
        buffer.sptd.scsi_status = scsi_status::GOOD;
        buffer.sptd.sense_info_length = SENSE_INFO_LEN as UCHAR;
        buffer.sptd.data_transfer_length = 36;
        buffer.sense[0] = 0x70;

        let mut sense = [0u8; 32];
        let completion = completion_from_sptd(&buffer, &mut sense, 96);
        assert_eq!(completion.sense_len, 0);
        assert_eq!(completion.residual, 60);
        assert!(sense.iter().all(|&b| b == 0));

        buffer.sptd.data_transfer_length = 200;
        assert_eq!(completion_from_sptd(&buffer, &mut sense, 96).residual, 0);
    }

    #[test]
    fn test_sptd_layout() {
        assert_eq!(
            offset_of!(ScsiPassThroughDirectWithSense, sense),
            size_of::<ScsiPassThroughDirect>()
        );
    }
}
