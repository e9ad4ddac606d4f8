//! Scripted backend used by the executor and registry tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::backend::PlatformBackend;
use super::constants::{scsi_commands, scsi_status};
use super::status::TapeStatusFlags;
use super::types::{CommandRequest, Completion, DataTransfer};
use crate::error::{Result, TapeCtlError};

/// One scripted reply to a non-INQUIRY submission
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Status { raw: u8, sense: Vec<u8> },
    Data { bytes: Vec<u8> },
    TransportFailure,
}

impl Step {
    pub(crate) fn status(raw: u8) -> Self {
        Step::Status {
            raw,
            sense: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SimState {
    pub script: VecDeque<Step>,
    /// Raw INQUIRY response; `None` makes INQUIRY a transport failure
    pub inquiry: Option<Vec<u8>>,
    /// INQUIRY answers BUSY this many times before it is served
    pub inquiry_busy: u32,
    pub fail_open: bool,
    pub gstat: i64,
    pub submits: u32,
    pub inquiries: u32,
    pub opens: u32,
    pub closes: u32,
    pub ejects: u32,
    pub rewinds: u32,
    /// Whether the sense buffer was all zero at every submission
    pub sense_zeroed_on_entry: Vec<bool>,
    pub last_cdb: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct SimHandle(pub u32);

pub(crate) struct SimBackend {
    state: Rc<RefCell<SimState>>,
}

impl SimBackend {
    pub(crate) fn new() -> (Self, Rc<RefCell<SimState>>) {
        let state = Rc::new(RefCell::new(SimState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            state,
        )
    }

    pub(crate) fn scripted(steps: Vec<Step>) -> (Self, Rc<RefCell<SimState>>) {
        let (backend, state) = Self::new();
        state.borrow_mut().script = steps.into();
        (backend, state)
    }
}

impl PlatformBackend for SimBackend {
    type Handle = SimHandle;

    fn name(&self) -> &'static str {
        "sim"
    }

    fn open_node(&self, path: &str) -> Result<SimHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_open {
            return Err(TapeCtlError::cannot_open(
                path,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        state.opens += 1;
        Ok(SimHandle(state.opens))
    }

    fn close(&self, _handle: SimHandle) -> Result<()> {
        self.state.borrow_mut().closes += 1;
        Ok(())
    }

    fn submit(&self, _handle: &SimHandle, request: &mut CommandRequest<'_>) -> Result<Completion> {
        let mut state = self.state.borrow_mut();

        if request.cdb.first() == Some(&scsi_commands::INQUIRY) {
            state.inquiries += 1;
            if state.inquiry_busy > 0 {
                state.inquiry_busy -= 1;
                return Ok(Completion {
                    raw_status: scsi_status::BUSY,
                    sense_len: 0,
                    residual: 0,
                });
            }
            let raw = state
                .inquiry
                .clone()
                .ok_or_else(|| TapeCtlError::io_failure("SG_IO failed - ENOTTY"))?;
            return Ok(fill_data(request, &raw));
        }

        state.submits += 1;
        state.last_cdb = request.cdb.to_vec();
        let zeroed = request.sense.iter().all(|&b| b == 0);
        state.sense_zeroed_on_entry.push(zeroed);

        match state.script.pop_front() {
            None => Ok(Completion {
                raw_status: scsi_status::GOOD,
                sense_len: 0,
                residual: 0,
            }),
            Some(Step::Status { raw, sense }) => {
                let len = sense.len().min(request.sense.len());
                request.sense[..len].copy_from_slice(&sense[..len]);
                Ok(Completion {
                    raw_status: raw,
                    sense_len: len,
                    residual: 0,
                })
            }
            Some(Step::Data { bytes }) => Ok(fill_data(request, &bytes)),
            Some(Step::TransportFailure) => {
                Err(TapeCtlError::io_failure("simulated transport failure"))
            }
        }
    }

    fn eject(&self, _handle: &SimHandle) -> Result<()> {
        self.state.borrow_mut().ejects += 1;
        Ok(())
    }

    fn rewind(&self, _handle: &SimHandle) -> Result<()> {
        self.state.borrow_mut().rewinds += 1;
        Ok(())
    }

    fn query_status(&self, _handle: &SimHandle) -> Result<TapeStatusFlags> {
        Ok(TapeStatusFlags::from_gmt(self.state.borrow().gstat))
    }
}

fn fill_data(request: &mut CommandRequest<'_>, bytes: &[u8]) -> Completion {
    let residual = match &mut request.data {
        DataTransfer::FromDevice(buf) => {
            let len = bytes.len().min(buf.len());
            buf[..len].copy_from_slice(&bytes[..len]);
            buf.len() - len
        }
        _ => 0,
    };
    Completion {
        raw_status: scsi_status::GOOD,
        sense_len: 0,
        residual,
    }
}
