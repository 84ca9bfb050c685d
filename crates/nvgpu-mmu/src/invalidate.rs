use std::time::Duration;

use nvhost_regs::{BusError, RegisterBus};
use nvhost_time::{HostClock, PollBudget};
use thiserror::Error;
use tracing::debug;

use crate::regs;

/// Where the page-directory base lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aperture {
    VidMem,
    SysMem,
}

impl Aperture {
    fn field(self) -> u32 {
        match self {
            Aperture::VidMem => regs::fb_mmu_invalidate_pdb_aperture_vid_mem_f(),
            Aperture::SysMem => regs::fb_mmu_invalidate_pdb_aperture_sys_mem_f(),
        }
    }
}

/// Page-directory base to invalidate: aperture plus the 4KiB-aligned
/// address, pre-shifted right by 12 as the hardware expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdbTarget {
    pub aperture: Aperture,
    pub addr_4k: u32,
}

/// Scope of the invalidate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateScope {
    /// Drop every VA translation for the PDB.
    AllVa,
    /// Drop the PDB itself as well.
    AllPdb,
}

impl InvalidateScope {
    fn field(self) -> u32 {
        match self {
            InvalidateScope::AllVa => regs::fb_mmu_invalidate_all_va_true_f(),
            InvalidateScope::AllPdb => {
                regs::fb_mmu_invalidate_all_va_true_f() | regs::fb_mmu_invalidate_all_pdb_true_f()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidateError {
    /// The pri fifo never drained within the configured bound. Fatal: the
    /// MMU pipeline is stuck, not a retryable soft error.
    #[error("mmu invalidate timed out after {polls} polls; pri fifo never drained")]
    Timeout { polls: u32 },

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Poll ceiling for the fifo-empty gate.
#[derive(Debug, Clone, Copy)]
pub struct InvalidateConfig {
    pub budget: PollBudget,
}

impl Default for InvalidateConfig {
    fn default() -> Self {
        Self {
            budget: PollBudget::new(200, Duration::from_micros(20)),
        }
    }
}

/// Sequencer states, in order. `Triggered → Complete` is gated purely on the
/// `pri_fifo_empty` status bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateState {
    Idle,
    PdbWritten,
    Triggered,
    Complete,
}

/// TLB invalidate sequencer: write the PDB register, trigger the
/// invalidate, poll until the hardware's priority fifo drains.
pub struct MmuInvalidate<'a> {
    bus: &'a dyn RegisterBus,
    clock: &'a dyn HostClock,
    config: InvalidateConfig,
    state: InvalidateState,
}

impl<'a> MmuInvalidate<'a> {
    pub fn new(
        bus: &'a dyn RegisterBus,
        clock: &'a dyn HostClock,
        config: InvalidateConfig,
    ) -> Self {
        Self {
            bus,
            clock,
            config,
            state: InvalidateState::Idle,
        }
    }

    pub fn state(&self) -> InvalidateState {
        self.state
    }

    /// Runs the full sequence. On success the hardware has accepted and
    /// drained the invalidate request; on [`InvalidateError::Timeout`] the
    /// device must be treated as unhealthy.
    pub fn invalidate(
        &mut self,
        pdb: PdbTarget,
        scope: InvalidateScope,
    ) -> Result<(), InvalidateError> {
        self.write_pdb(pdb)?;
        self.trigger(scope)?;
        self.poll_fifo_empty()
    }

    fn write_pdb(&mut self, pdb: PdbTarget) -> Result<(), InvalidateError> {
        // A full pri fifo means the previous request is stuck; surface it as
        // the same fatal condition instead of dropping the write.
        let ctrl = self.bus.read(regs::fb_mmu_ctrl_r())?;
        if regs::fb_mmu_ctrl_pri_fifo_space_v(ctrl) == 0 {
            return Err(InvalidateError::Timeout { polls: 0 });
        }

        let value = regs::fb_mmu_invalidate_pdb_addr_f(pdb.addr_4k) | pdb.aperture.field();
        self.bus.write(regs::fb_mmu_invalidate_pdb_r(), value)?;
        self.state = InvalidateState::PdbWritten;
        Ok(())
    }

    fn trigger(&mut self, scope: InvalidateScope) -> Result<(), InvalidateError> {
        debug_assert_eq!(self.state, InvalidateState::PdbWritten);
        let value = scope.field() | regs::fb_mmu_invalidate_trigger_true_f();
        self.bus.write(regs::fb_mmu_invalidate_r(), value)?;
        self.state = InvalidateState::Triggered;
        Ok(())
    }

    fn poll_fifo_empty(&mut self) -> Result<(), InvalidateError> {
        debug_assert_eq!(self.state, InvalidateState::Triggered);
        let bus = self.bus;
        let outcome = self.config.budget.poll_until(self.clock, || {
            let ctrl = bus.read(regs::fb_mmu_ctrl_r())?;
            Ok::<bool, BusError>(regs::fb_mmu_ctrl_pri_fifo_empty_v(ctrl) == 1)
        })?;
        match outcome {
            Ok(polls) => {
                debug!(polls, "mmu invalidate complete");
                self.state = InvalidateState::Complete;
                Ok(())
            }
            Err(expired) => Err(InvalidateError::Timeout { polls: expired.polls }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvhost_regs::RegisterFile;
    use nvhost_time::FakeHostClock;

    const FIFO_EMPTY: u32 = 1 << 15;
    const FIFO_SPACE_ONE: u32 = 1 << 16;

    fn config(max_polls: u32) -> InvalidateConfig {
        InvalidateConfig {
            budget: PollBudget::new(max_polls, Duration::from_micros(10)),
        }
    }

    fn pdb() -> PdbTarget {
        PdbTarget { aperture: Aperture::SysMem, addr_4k: 0x0012_3456 }
    }

    #[test]
    fn sequence_writes_pdb_then_trigger() {
        let bus = RegisterFile::new();
        let clock = FakeHostClock::new();
        bus.seed(regs::fb_mmu_ctrl_r(), FIFO_EMPTY | FIFO_SPACE_ONE);

        let mut seq = MmuInvalidate::new(&bus, &clock, config(8));
        seq.invalidate(pdb(), InvalidateScope::AllPdb).unwrap();
        assert_eq!(seq.state(), InvalidateState::Complete);

        let writes = bus.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].offset, regs::fb_mmu_invalidate_pdb_r());
        assert_eq!(
            writes[0].value,
            regs::fb_mmu_invalidate_pdb_addr_f(0x0012_3456)
                | regs::fb_mmu_invalidate_pdb_aperture_sys_mem_f()
        );
        assert_eq!(writes[1].offset, regs::fb_mmu_invalidate_r());
        assert_eq!(
            writes[1].value,
            regs::fb_mmu_invalidate_all_va_true_f()
                | regs::fb_mmu_invalidate_all_pdb_true_f()
                | regs::fb_mmu_invalidate_trigger_true_f()
        );
    }

    #[test]
    fn completes_on_exactly_the_kth_poll() {
        let bus = RegisterFile::new();
        let clock = FakeHostClock::new();
        // One read for the space check, then K-1 not-empty polls, then empty.
        bus.script_reads(
            regs::fb_mmu_ctrl_r(),
            [FIFO_SPACE_ONE, 0, 0, 0, FIFO_EMPTY],
        );
        bus.seed(regs::fb_mmu_ctrl_r(), 0);

        let mut seq = MmuInvalidate::new(&bus, &clock, config(4));
        seq.invalidate(pdb(), InvalidateScope::AllVa).unwrap();
        assert_eq!(seq.state(), InvalidateState::Complete);
        // Three backoffs before the 4th poll succeeded.
        assert_eq!(clock.elapsed(), Duration::from_micros(30));
    }

    #[test]
    fn never_empty_fifo_is_a_fatal_timeout() {
        let bus = RegisterFile::new();
        let clock = FakeHostClock::new();
        bus.seed(regs::fb_mmu_ctrl_r(), FIFO_SPACE_ONE);

        let mut seq = MmuInvalidate::new(&bus, &clock, config(6));
        assert_eq!(
            seq.invalidate(pdb(), InvalidateScope::AllVa).unwrap_err(),
            InvalidateError::Timeout { polls: 6 }
        );
        assert_eq!(seq.state(), InvalidateState::Triggered);
    }

    #[test]
    fn full_pri_fifo_blocks_the_pdb_write() {
        let bus = RegisterFile::new();
        let clock = FakeHostClock::new();
        bus.seed(regs::fb_mmu_ctrl_r(), 0); // no fifo space

        let mut seq = MmuInvalidate::new(&bus, &clock, config(4));
        assert_eq!(
            seq.invalidate(pdb(), InvalidateScope::AllVa).unwrap_err(),
            InvalidateError::Timeout { polls: 0 }
        );
        assert_eq!(seq.state(), InvalidateState::Idle);
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn bus_faults_propagate() {
        let bus = RegisterFile::new();
        let clock = FakeHostClock::new();
        bus.fail_reads(regs::fb_mmu_ctrl_r());

        let mut seq = MmuInvalidate::new(&bus, &clock, config(4));
        assert!(matches!(
            seq.invalidate(pdb(), InvalidateScope::AllVa).unwrap_err(),
            InvalidateError::Bus(BusError::Read { .. })
        ));
    }
}
