//! T23x generation: split mailbox file (two banks), deep CCQ, status
//! interface on the CCQ aperture.

use nvhost_regs::RegisterBus;

use crate::ccq::{CcqCommand, SeqNum};
use crate::error::PvaError;
use crate::hal::{Generation, InterfaceStatus, StatusFlags, VersionOps};

/// Mailboxes 0..=7 live in the first bank, 8..=11 in the second.
pub const PVA_MBOX_BANK0: u32 = 0x0001_0000;
pub const PVA_MBOX_BANK1: u32 = 0x0001_8000;
pub const PVA_MBOX_BANK0_COUNT: u32 = 8;
pub const PVA_MBOX_COUNT: u32 = 12;

/// CCQ entry push: sequence word, then the command's high word, then its
/// low word. The low-word write is the doorbell.
pub const PVA_CCQ_HI: u32 = 0x0002_0000;
pub const PVA_CCQ_LO: u32 = 0x0002_0004;
pub const PVA_CCQ_SEQ: u32 = 0x0002_0008;

pub const PVA_CCQ_STATUS_FLAGS: u32 = 0x0002_4000;
pub const PVA_CCQ_STATUS_SEQ: u32 = 0x0002_4004;
pub const PVA_CCQ_STATUS_CODE: u32 = 0x0002_4008;

pub const PVA_CCQ_DEPTH: u64 = 8;
pub const PVA_IRQ_COUNT: u32 = 9;

const fn mbox_r(index: u32) -> u32 {
    if index < PVA_MBOX_BANK0_COUNT {
        PVA_MBOX_BANK0 + index * 4
    } else {
        PVA_MBOX_BANK1 + (index - PVA_MBOX_BANK0_COUNT) * 4
    }
}

#[derive(Debug)]
pub struct T23xOps;

impl VersionOps for T23xOps {
    fn generation(&self) -> Generation {
        Generation::T23x
    }

    fn irq_count(&self) -> u32 {
        PVA_IRQ_COUNT
    }

    fn ccq_depth(&self) -> u64 {
        PVA_CCQ_DEPTH
    }

    fn read_mailbox(&self, bus: &dyn RegisterBus, index: u32) -> Result<u32, PvaError> {
        if index >= PVA_MBOX_COUNT {
            return Err(PvaError::BadMailbox {
                generation: Generation::T23x,
                index,
                count: PVA_MBOX_COUNT,
            });
        }
        Ok(bus.read(mbox_r(index))?)
    }

    fn write_mailbox(
        &self,
        bus: &dyn RegisterBus,
        index: u32,
        value: u32,
    ) -> Result<(), PvaError> {
        if index >= PVA_MBOX_COUNT {
            return Err(PvaError::BadMailbox {
                generation: Generation::T23x,
                index,
                count: PVA_MBOX_COUNT,
            });
        }
        Ok(bus.write(mbox_r(index), value)?)
    }

    fn read_status_interface(&self, bus: &dyn RegisterBus) -> Result<InterfaceStatus, PvaError> {
        let flags = StatusFlags::from_bits_truncate(bus.read(PVA_CCQ_STATUS_FLAGS)?);
        let seq = bus.read(PVA_CCQ_STATUS_SEQ)? as SeqNum;
        let code = bus.read(PVA_CCQ_STATUS_CODE)?;
        Ok(InterfaceStatus { flags, seq, code })
    }

    fn ccq_send_task(
        &self,
        bus: &dyn RegisterBus,
        seq: SeqNum,
        cmd: &CcqCommand,
    ) -> Result<(), PvaError> {
        let entry = cmd.encode();
        bus.write(PVA_CCQ_SEQ, seq)?;
        bus.write(PVA_CCQ_HI, (entry >> 32) as u32)?;
        bus.write(PVA_CCQ_LO, entry as u32)?;
        Ok(())
    }
}
