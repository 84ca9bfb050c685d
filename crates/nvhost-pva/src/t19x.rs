//! T19x generation: single contiguous mailbox bank, shallow CCQ.

use nvhost_regs::RegisterBus;

use crate::ccq::{CcqCommand, SeqNum};
use crate::error::PvaError;
use crate::hal::{Generation, InterfaceStatus, StatusFlags, VersionOps};

pub const PVA_MBOX_BASE: u32 = 0x0000_2000;
pub const PVA_MBOX_COUNT: u32 = 8;

pub const PVA_CCQ_HI: u32 = 0x0000_3000;
pub const PVA_CCQ_LO: u32 = 0x0000_3004;
pub const PVA_CCQ_SEQ: u32 = 0x0000_3008;

pub const PVA_CCQ_STATUS_FLAGS: u32 = 0x0000_3400;
pub const PVA_CCQ_STATUS_SEQ: u32 = 0x0000_3404;
pub const PVA_CCQ_STATUS_CODE: u32 = 0x0000_3408;

pub const PVA_CCQ_DEPTH: u64 = 4;
pub const PVA_IRQ_COUNT: u32 = 1;

#[derive(Debug)]
pub struct T19xOps;

impl VersionOps for T19xOps {
    fn generation(&self) -> Generation {
        Generation::T19x
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
                generation: Generation::T19x,
                index,
                count: PVA_MBOX_COUNT,
            });
        }
        Ok(bus.read(PVA_MBOX_BASE + index * 4)?)
    }

    fn write_mailbox(
        &self,
        bus: &dyn RegisterBus,
        index: u32,
        value: u32,
    ) -> Result<(), PvaError> {
        if index >= PVA_MBOX_COUNT {
            return Err(PvaError::BadMailbox {
                generation: Generation::T19x,
                index,
                count: PVA_MBOX_COUNT,
            });
        }
        Ok(bus.write(PVA_MBOX_BASE + index * 4, value)?)
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
