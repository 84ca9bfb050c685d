use std::time::Duration;

use nvhost_regs::BusError;
use thiserror::Error;

use crate::hal::Generation;

/// HAL registry misuse. Both variants are configuration errors surfaced at
/// initialization/attach time, never on the submission hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HalError {
    #[error("operation table for generation {0} already registered")]
    DuplicateGeneration(Generation),

    #[error("no operation table registered for generation {0}")]
    UnknownGeneration(Generation),
}

/// Errors surfaced by PVA device operations.
///
/// `Timeout` and `DeviceError` are deliberately distinct: after a `Timeout`
/// the command's execution state is unknown (it may still complete later),
/// so callers must only retry when they can positively confirm
/// non-execution. `DeviceError` means the hardware reported failure for a
/// command it did execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PvaError {
    #[error("command queue full ({depth} commands in flight)")]
    QueueFull { depth: u64 },

    #[error("no completion for sequence {seq} within {timeout:?}")]
    Timeout { seq: u32, timeout: Duration },

    #[error("device reported error {code:#x} for sequence {seq}")]
    DeviceError { seq: u32, code: u32 },

    #[error("mailbox index {index} out of range for {generation} ({count} mailboxes)")]
    BadMailbox {
        generation: Generation,
        index: u32,
        count: u32,
    },

    #[error("device shut down while waiting for completion")]
    Shutdown,

    #[error(transparent)]
    Bus(#[from] BusError),
}
