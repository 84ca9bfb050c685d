use std::sync::Arc;
use std::time::Duration;

use nvhost_regs::RegisterBus;
use tracing::debug;

use crate::ccq::{CcqClient, CcqCommand};
use crate::completion::{CompletionStatus, DispatchOutcome};
use crate::error::{HalError, PvaError};
use crate::hal::{Generation, HalRegistry, StatusFlags, VersionOps};

/// One attached PVA instance.
///
/// Resolves its operation table from the registry once at attach and holds
/// it for the device's lifetime; the table outlives the device (registry
/// lifetime is process-wide). The bus capability belongs to exactly one
/// `PvaDevice` per physical instance.
pub struct PvaDevice {
    ops: Arc<dyn VersionOps>,
    bus: Arc<dyn RegisterBus>,
    ccq: CcqClient,
}

impl PvaDevice {
    pub fn attach(
        registry: &HalRegistry,
        generation: Generation,
        bus: Arc<dyn RegisterBus>,
    ) -> Result<Self, HalError> {
        let ops = registry.resolve(generation)?;
        debug!(%generation, irqs = ops.irq_count(), "pva attached");
        let ccq = CcqClient::new(ops.clone(), bus.clone());
        Ok(Self { ops, bus, ccq })
    }

    pub fn generation(&self) -> Generation {
        self.ops.generation()
    }

    pub fn ops(&self) -> &Arc<dyn VersionOps> {
        &self.ops
    }

    pub fn ccq(&self) -> &CcqClient {
        &self.ccq
    }

    pub fn read_mailbox(&self, index: u32) -> Result<u32, PvaError> {
        self.ops.read_mailbox(self.bus.as_ref(), index)
    }

    pub fn write_mailbox(&self, index: u32, value: u32) -> Result<(), PvaError> {
        self.ops.write_mailbox(self.bus.as_ref(), index, value)
    }

    /// Synchronous submission through the generation's operation table.
    pub fn submit_sync(
        &self,
        cmd: CcqCommand,
        timeout: Duration,
    ) -> Result<CompletionStatus, PvaError> {
        self.ops.submit_cmd_sync(&self.ccq, cmd, timeout)
    }

    /// Interrupt service entry point. Poll-only deployments invoke this from
    /// a timer instead; the dispatch path never takes the submission lock.
    /// Returns `None` when the status interface holds no completion record.
    pub fn handle_irq(&self) -> Result<Option<DispatchOutcome>, PvaError> {
        let status = self.ops.read_status_interface(self.bus.as_ref())?;
        if !status.flags.contains(StatusFlags::VALID) {
            return Ok(None);
        }
        let code = if status.flags.contains(StatusFlags::ERROR) {
            status.code
        } else {
            0
        };
        Ok(Some(self.ccq.complete(status.seq, CompletionStatus { code })))
    }

    /// Fails outstanding waiters and detaches. The operation table is shared
    /// and survives; the bus capability is released with the device.
    pub fn detach(self) {
        self.ccq.shutdown();
    }
}
