//! Bounded-retry command execution
//!
//! Masks transient BUSY completions from callers. GOOD and CHECK CONDITION
//! are terminal; an unrecognized status is terminal and surfaced as
//! `ScsiStatus::Unknown`; transport failures are never retried.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::PlatformBackend;
use super::constants::MAX_CDB_LEN;
use super::sense::SenseInfo;
use super::types::{CommandOutcome, CommandRequest, ScsiStatus};
use crate::config::Config;
use crate::error::{Result, TapeCtlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandExecutor {
    retry_budget: u32,
    busy_delay: Duration,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RETRY_BUDGET, Duration::from_millis(500))
    }
}

impl CommandExecutor {
    pub const DEFAULT_RETRY_BUDGET: u32 = 5;

    /// A budget of zero is treated as one attempt
    pub fn new(retry_budget: u32, busy_delay: Duration) -> Self {
        Self {
            retry_budget: retry_budget.max(1),
            busy_delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.retry_budget, config.busy_delay())
    }

    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    pub fn busy_delay(&self) -> Duration {
        self.busy_delay
    }

    /// Reject requests no backend could marshal
    pub fn validate(request: &CommandRequest<'_>) -> Result<()> {
        if request.cdb.is_empty() {
            return Err(TapeCtlError::invalid_request("empty CDB"));
        }
        if request.cdb.len() > MAX_CDB_LEN {
            return Err(TapeCtlError::invalid_request(format!(
                "CDB length {} exceeds maximum of {} bytes",
                request.cdb.len(),
                MAX_CDB_LEN
            )));
        }
        Ok(())
    }

    /// Run one logical command against `handle`
    pub fn execute<B>(
        &self,
        backend: &B,
        handle: &B::Handle,
        request: &mut CommandRequest<'_>,
    ) -> Result<CommandOutcome>
    where
        B: PlatformBackend + ?Sized,
    {
        Self::validate(request)?;

        let opcode = request.cdb[0];
        let mut last_status = 0u8;

        for attempt in 1..=self.retry_budget {
            request.sense.fill(0);

            let completion = backend.submit(handle, request)?;
            last_status = completion.raw_status;

            let status = ScsiStatus::classify(completion.raw_status);
            match status {
                ScsiStatus::Good | ScsiStatus::CheckCondition | ScsiStatus::Unknown(_) => {
                    let sense_len = completion.sense_len.min(request.sense.len());
                    let outcome = CommandOutcome {
                        status,
                        raw_status: completion.raw_status,
                        sense: request.sense[..sense_len].to_vec(),
                        residual: completion.residual,
                        attempts: attempt,
                    };
                    self.log_outcome(opcode, &outcome);
                    return Ok(outcome);
                }
                ScsiStatus::Busy => {
                    debug!(
                        "Opcode 0x{:02X}: device busy (0x{:02X}), attempt {}/{}",
                        opcode, completion.raw_status, attempt, self.retry_budget
                    );
                    if attempt < self.retry_budget && !self.busy_delay.is_zero() {
                        std::thread::sleep(self.busy_delay);
                    }
                }
            }
        }

        warn!(
            "Opcode 0x{:02X}: device still busy after {} attempts",
            opcode, self.retry_budget
        );
        Err(TapeCtlError::RetriesExhausted {
            attempts: self.retry_budget,
            last_status,
        })
    }

    fn log_outcome(&self, opcode: u8, outcome: &CommandOutcome) {
        match outcome.status {
            ScsiStatus::Good => debug!(
                "Opcode 0x{:02X} completed GOOD after {} attempt(s)",
                opcode, outcome.attempts
            ),
            ScsiStatus::CheckCondition => {
                let reason = SenseInfo::parse(&outcome.sense)
                    .map(|info| info.to_string())
                    .unwrap_or_else(|| "no sense data".to_string());
                info!("Opcode 0x{:02X}: CHECK CONDITION - {}", opcode, reason);
            }
            ScsiStatus::Unknown(raw) => warn!(
                "Opcode 0x{:02X}: unrecognized status 0x{:02X} ({}), not retried",
                opcode,
                raw,
                outcome.status.description()
            ),
            ScsiStatus::Busy => {}
        }
    }
}
