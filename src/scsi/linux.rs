//! Linux backend: SG_IO passthrough and st(4) tape ioctls

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, IntoRawFd};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use tracing::debug;

use super::backend::PlatformBackend;
use super::constants::scsi_status;
use super::ffi::*;
use super::status::TapeStatusFlags;
use super::types::{CommandRequest, Completion, DataTransfer};
use crate::error::{Result, TapeCtlError};

/// SCSI generic passthrough for /dev/sg*, /dev/st* and /dev/nst* nodes
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxBackend;

impl LinuxBackend {
    pub fn new() -> Self {
        Self
    }

    fn tape_op(&self, file: &File, op: libc::c_short, name: &str) -> Result<()> {
        let cmd = Mtop {
            mt_op: op,
            mt_count: 1,
        };
        unsafe { mtioctop(file.as_raw_fd(), &cmd) }
            .map_err(|err| TapeCtlError::io_failure(format!("{name} failed - {err}")))?;
        debug!("{} completed", name);
        Ok(())
    }
}

impl PlatformBackend for LinuxBackend {
    type Handle = File;

    fn name(&self) -> &'static str {
        "linux-sg"
    }

    fn open_node(&self, path: &str) -> Result<File> {
        debug!("Opening device node: {}", path);

        // do not wait for media, use O_NONBLOCK
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|err| TapeCtlError::cannot_open(path, err))?;

        // then clear O_NONBLOCK
        let flags = fcntl(file.as_raw_fd(), FcntlArg::F_GETFL)
            .map_err(|err| TapeCtlError::cannot_open(path, err.into()))?;

        let mut flags = OFlag::from_bits_truncate(flags);
        flags.remove(OFlag::O_NONBLOCK);

        fcntl(file.as_raw_fd(), FcntlArg::F_SETFL(flags))
            .map_err(|err| TapeCtlError::cannot_open(path, err.into()))?;

        Ok(file)
    }

    fn close(&self, handle: File) -> Result<()> {
        let fd = handle.into_raw_fd();
        nix::unistd::close(fd)
            .map_err(|err| TapeCtlError::io_failure(format!("close failed - {err}")))
    }

    fn submit(&self, handle: &File, request: &mut CommandRequest<'_>) -> Result<Completion> {
        let mut hdr = SgIoHdr::new();
        fill_hdr(&mut hdr, request)?;

        unsafe { sg_io(handle.as_raw_fd(), &mut hdr) }
            .map_err(|err| TapeCtlError::io_failure(format!("SG_IO failed - {err}")))?;

        debug!(
            "SG_IO: CDB {:02X?} status 0x{:02X} host 0x{:04X} driver 0x{:04X} sense {} resid {} ({} ms)",
            request.cdb,
            hdr.status,
            hdr.host_status,
            hdr.driver_status,
            hdr.sb_len_wr,
            hdr.resid,
            hdr.duration
        );

        completion_from_hdr(&hdr, request.sense.len(), request.data.len())
    }

    fn eject(&self, handle: &File) -> Result<()> {
        self.tape_op(handle, MTOFFL, "MTOFFL")
    }

    fn rewind(&self, handle: &File) -> Result<()> {
        self.tape_op(handle, MTREW, "MTREW")
    }

    fn query_status(&self, handle: &File) -> Result<TapeStatusFlags> {
        let mut status = Mtget::default();
        match unsafe { mtiocget(handle.as_raw_fd(), &mut status) } {
            Ok(_) => {
                debug!(
                    "MTIOCGET: type 0x{:X} gstat 0x{:08X} file {} block {}",
                    status.mt_type, status.mt_gstat, status.mt_fileno, status.mt_blkno
                );
                Ok(TapeStatusFlags::from_gmt(status.mt_gstat as i64))
            }
            Err(Errno::ENOTTY) | Err(Errno::EINVAL) => Err(TapeCtlError::unsupported(
                "MTIOCGET not supported - not a tape device",
            )),
            Err(err) => {
                debug!("MTIOCGET failed - {}, reporting drive offline", err);
                Ok(TapeStatusFlags::empty())
            }
        }
    }
}

/// Point `hdr` at the request's CDB, sense and data buffers
fn fill_hdr(hdr: &mut SgIoHdr, request: &mut CommandRequest<'_>) -> Result<()> {
    hdr.cmd_len = request.cdb.len() as u8;
    hdr.cmdp = request.cdb.as_ptr();
    hdr.mx_sb_len = request.sense.len().min(u8::MAX as usize) as u8;
    hdr.sbp = request.sense.as_mut_ptr();
    hdr.timeout = request.timeout_millis();

    let requested = request.data.len();
    let dxfer_len = u32::try_from(requested).map_err(|_| {
        TapeCtlError::invalid_request(format!("data buffer too large: {requested} bytes"))
    })?;

    match &mut request.data {
        DataTransfer::None => {
            hdr.dxfer_direction = SG_DXFER_NONE;
            hdr.dxferp = std::ptr::null_mut();
            hdr.dxfer_len = 0;
        }
        DataTransfer::FromDevice(buf) => {
            hdr.dxfer_direction = SG_DXFER_FROM_DEV;
            hdr.dxferp = buf.as_mut_ptr() as *mut libc::c_void;
            hdr.dxfer_len = dxfer_len;
        }
        DataTransfer::ToDevice(buf) => {
            // the driver only reads from dxferp for TO_DEV transfers
            hdr.dxfer_direction = SG_DXFER_TO_DEV;
            hdr.dxferp = buf.as_ptr() as *mut libc::c_void;
            hdr.dxfer_len = dxfer_len;
        }
    }
    Ok(())
}

/// Decode a finished header; `sense_cap` and `requested` bound the reported lengths
fn completion_from_hdr(hdr: &SgIoHdr, sense_cap: usize, requested: usize) -> Result<Completion> {
    if hdr.host_status != 0 {
        return Err(TapeCtlError::io_failure(format!(
            "host adapter error 0x{:04X}",
            hdr.host_status
        )));
    }

    let driver = hdr.driver_status & SG_DRIVER_MASK;
    if driver == DRIVER_TIMEOUT {
        return Err(TapeCtlError::io_failure("command timed out"));
    }

    let sense_len = (hdr.sb_len_wr as usize).min(sense_cap);
    let mut raw_status = hdr.status;
    if raw_status == scsi_status::GOOD && driver == DRIVER_SENSE && sense_len > 0 {
        raw_status = scsi_status::CHECK_CONDITION;
    }

    Ok(Completion {
        raw_status,
        sense_len,
        residual: (hdr.resid.max(0) as usize).min(requested),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn finished(status: u8, host: u16, driver: u16, sb_len_wr: u8, resid: i32) -> SgIoHdr {
        let mut hdr = SgIoHdr::new();
        hdr.status = status;
        hdr.host_status = host;
        hdr.driver_status = driver;
        hdr.sb_len_wr = sb_len_wr;
        hdr.resid = resid;
        hdr
    }

    #[test]
    fn test_fill_hdr_read() {
        let cdb = [0x12u8, 0, 0, 0, 96, 0];
        let mut sense = [0u8; 32];
        let mut data = [0u8; 96];
        let data_ptr = data.as_mut_ptr();
        let mut request = CommandRequest::new(&cdb, &mut sense)
            .read_into(&mut data)
            .with_timeout(Duration::from_secs(120));

        let mut hdr = SgIoHdr::new();
        fill_hdr(&mut hdr, &mut request).unwrap();

        assert_eq!(hdr.interface_id, 'S' as libc::c_int);
        assert_eq!(hdr.dxfer_direction, SG_DXFER_FROM_DEV);
        assert_eq!(hdr.dxfer_len, 96);
        assert_eq!(hdr.dxferp as *mut u8, data_ptr);
        assert_eq!(hdr.cmd_len, 6);
        assert_eq!(hdr.cmdp, cdb.as_ptr());
        assert_eq!(hdr.mx_sb_len, 32);
        assert_eq!(hdr.timeout, 120_000);
    }

    #[test]
    fn test_fill_hdr_write_and_none() {
        let cdb = [0x0Au8, 0, 0, 0, 4, 0];
        let payload = [1u8, 2, 3, 4];
        let mut sense = [0u8; 300];
        let mut request = CommandRequest::new(&cdb, &mut sense).write_from(&payload);

        let mut hdr = SgIoHdr::new();
        fill_hdr(&mut hdr, &mut request).unwrap();
        assert_eq!(hdr.dxfer_direction, SG_DXFER_TO_DEV);
        assert_eq!(hdr.dxfer_len, 4);
        assert_eq!(hdr.dxferp as *const u8, payload.as_ptr());
        assert_eq!(hdr.mx_sb_len, u8::MAX);

        let tur = [0u8; 6];
        let mut sense = [0u8; 32];
        let mut request = CommandRequest::new(&tur, &mut sense);
        fill_hdr(&mut hdr, &mut request).unwrap();
        assert_eq!(hdr.dxfer_direction, SG_DXFER_NONE);
        assert_eq!(hdr.dxfer_len, 0);
        assert!(hdr.dxferp.is_null());
    }

    #[test]
    fn test_host_error_is_transport_failure() {
        let hdr = finished(scsi_status::GOOD, 0x0001, 0, 0, 0);
        assert!(matches!(
            completion_from_hdr(&hdr, 32, 0),
            Err(TapeCtlError::IoFailure(_))
        ));
    }

    #[test]
    fn test_driver_timeout_is_transport_failure() {
        let hdr = finished(scsi_status::GOOD, 0, DRIVER_TIMEOUT, 0, 0);
        assert!(matches!(
            completion_from_hdr(&hdr, 32, 0),
            Err(TapeCtlError::IoFailure(_))
        ));
    }

    #[test]
    fn test_driver_sense_promotes_good() {
        let hdr = finished(scsi_status::GOOD, 0, DRIVER_SENSE, 18, 0);
        let completion = completion_from_hdr(&hdr, 32, 0).unwrap();
        assert_eq!(completion.raw_status, scsi_status::CHECK_CONDITION);
        assert_eq!(completion.sense_len, 18);

        // driver sense without any bytes written stays GOOD
        let hdr = finished(scsi_status::GOOD, 0, DRIVER_SENSE, 0, 0);
        let completion = completion_from_hdr(&hdr, 32, 0).unwrap();
        assert_eq!(completion.raw_status, scsi_status::GOOD);
    }

    #[test]
    fn test_lengths_are_capped() {
        let hdr = finished(scsi_status::CHECK_CONDITION, 0, DRIVER_SENSE, 64, 500);
        let completion = completion_from_hdr(&hdr, 16, 96).unwrap();
        assert_eq!(completion.raw_status, scsi_status::CHECK_CONDITION);
        assert_eq!(completion.sense_len, 16);
        assert_eq!(completion.residual, 96);

        let hdr = finished(scsi_status::GOOD, 0, 0, 0, -4);
        assert_eq!(completion_from_hdr(&hdr, 16, 96).unwrap().residual, 0);
    }

    #[test]
    fn test_busy_status_passes_through() {
        let hdr = finished(scsi_status::BUSY, 0, 0, 0, 0);
        let completion = completion_from_hdr(&hdr, 32, 0).unwrap();
        assert_eq!(completion.raw_status, scsi_status::BUSY);
        assert_eq!(completion.sense_len, 0);
    }
}
