use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bitflags::bitflags;
use nvhost_regs::RegisterBus;

use crate::ccq::{CcqClient, CcqCommand, SeqNum};
use crate::completion::CompletionStatus;
use crate::error::{HalError, PvaError};

/// Hardware generation tag. Immutable once a device is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    T19x,
    T23x,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::T19x => f.write_str("t19x"),
            Generation::T23x => f.write_str("t23x"),
        }
    }
}

bitflags! {
    /// Bits of the status-interface flag register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        /// A completion record is present in the status registers.
        const VALID = 1 << 0;
        /// The error-code register is meaningful for this completion.
        const ERROR = 1 << 1;
    }
}

/// Snapshot of the status interface taken on an interrupt or poll event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceStatus {
    pub flags: StatusFlags,
    /// Sequence number of the completed command (valid when `VALID` is set).
    pub seq: SeqNum,
    /// Hardware error code (valid when `ERROR` is set).
    pub code: u32,
}

/// Per-generation operation table.
///
/// Exactly one implementation exists per [`Generation`]; tables are
/// stateless, `Send + Sync`, shared by `Arc`, and complete by construction
/// (a generation implements every required slot or does not compile).
///
/// The synchronous submit slots are generation-independent and provided
/// here, layered over the per-generation doorbell push.
pub trait VersionOps: core::fmt::Debug + Send + Sync {
    fn generation(&self) -> Generation;

    /// Number of interrupt lines this generation routes to the host.
    fn irq_count(&self) -> u32;

    /// Capacity of the on-device command queue.
    fn ccq_depth(&self) -> u64;

    fn read_mailbox(&self, bus: &dyn RegisterBus, index: u32) -> Result<u32, PvaError>;

    fn write_mailbox(&self, bus: &dyn RegisterBus, index: u32, value: u32)
        -> Result<(), PvaError>;

    /// Reads the completion status registers. Returns a snapshot whose
    /// `VALID` flag says whether a completion record is present.
    fn read_status_interface(&self, bus: &dyn RegisterBus) -> Result<InterfaceStatus, PvaError>;

    /// Pushes one command into the CCQ and rings the doorbell. The caller
    /// (the [`CcqClient`]) holds the device submission lock.
    fn ccq_send_task(
        &self,
        bus: &dyn RegisterBus,
        seq: SeqNum,
        cmd: &CcqCommand,
    ) -> Result<(), PvaError>;

    /// Submits and waits while continuing to hold the submission lock.
    /// Bring-up paths use this when they need exclusive queue access across
    /// the whole round trip.
    fn submit_cmd_sync_locked(
        &self,
        client: &CcqClient,
        cmd: CcqCommand,
        timeout: Duration,
    ) -> Result<CompletionStatus, PvaError> {
        client.submit_sync_locked(cmd, timeout)
    }

    /// Submits under the lock, then releases it before blocking on the
    /// completion so other submitters are not starved by the hardware round
    /// trip.
    fn submit_cmd_sync(
        &self,
        client: &CcqClient,
        cmd: CcqCommand,
        timeout: Duration,
    ) -> Result<CompletionStatus, PvaError> {
        client.submit_sync(cmd, timeout)
    }
}

/// Process-wide map from [`Generation`] to its operation table.
///
/// Registration happens during bring-up; `resolve` is called concurrently
/// from device-attach paths afterwards and is read-only.
#[derive(Default)]
pub struct HalRegistry {
    tables: RwLock<HashMap<Generation, Arc<dyn VersionOps>>>,
}

impl HalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the in-tree generations.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry
            .register(Arc::new(crate::t19x::T19xOps))
            .expect("empty registry");
        registry
            .register(Arc::new(crate::t23x::T23xOps))
            .expect("empty registry");
        registry
    }

    /// Registers `ops` under its own generation tag. Fails if that
    /// generation already has a table.
    pub fn register(&self, ops: Arc<dyn VersionOps>) -> Result<(), HalError> {
        let generation = ops.generation();
        let mut tables = self.tables.write().unwrap();
        if tables.contains_key(&generation) {
            return Err(HalError::DuplicateGeneration(generation));
        }
        tables.insert(generation, ops);
        Ok(())
    }

    pub fn resolve(&self, generation: Generation) -> Result<Arc<dyn VersionOps>, HalError> {
        self.tables
            .read()
            .unwrap()
            .get(&generation)
            .cloned()
            .ok_or(HalError::UnknownGeneration(generation))
    }
}
