//! Register-access seam shared by the Tegra bring-up crates.
//!
//! The only external inputs the coprocessor and sensor cores need are 32-bit
//! register reads/writes at device offsets. Production deployments back
//! [`RegisterBus`] with a real MMIO/I2C transport; tests and simulated
//! hardware generations use the in-memory [`RegisterFile`].

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use thiserror::Error;

/// Transport-level register access failure.
///
/// Carries the offset (and for writes the value) so callers can diagnose
/// which access failed; bus errors are propagated immediately and never
/// retried by this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("register read failed at offset {offset:#010x}")]
    Read { offset: u32 },

    #[error("register write failed at offset {offset:#010x} (value {value:#010x})")]
    Write { offset: u32, value: u32 },
}

/// Read/write capability for one physical device's register space.
///
/// Implementations must tolerate concurrent calls: the submission path and
/// the interrupt/poll dispatch path of a coprocessor device share the same
/// bus capability.
pub trait RegisterBus: Send + Sync {
    fn read(&self, offset: u32) -> Result<u32, BusError>;
    fn write(&self, offset: u32, value: u32) -> Result<(), BusError>;
}

/// One recorded write, in program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub offset: u32,
    pub value: u32,
}

#[derive(Default)]
struct RegisterFileState {
    regs: HashMap<u32, u32>,
    writes: Vec<WriteRecord>,
    /// Per-offset scripted read values, consumed front-to-back before the
    /// stored value is used.
    read_scripts: HashMap<u32, VecDeque<u32>>,
    read_faults: HashMap<u32, bool>,
    write_faults: HashMap<u32, bool>,
}

/// In-memory register file.
///
/// Backs the simulated hardware generations and every test in the workspace.
/// Unwritten registers read as zero. Supports scripted reads (a fixed
/// sequence of values returned for successive reads of one offset, e.g. a
/// status bit that flips after K polls) and per-offset fault injection.
#[derive(Default)]
pub struct RegisterFile {
    state: Mutex<RegisterFileState>,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a register's backing value without recording a write.
    pub fn seed(&self, offset: u32, value: u32) {
        let mut state = self.state.lock().unwrap();
        state.regs.insert(offset, value);
    }

    /// Queues values returned by successive reads of `offset`, ahead of the
    /// stored value.
    pub fn script_reads(&self, offset: u32, values: impl IntoIterator<Item = u32>) {
        let mut state = self.state.lock().unwrap();
        state.read_scripts.entry(offset).or_default().extend(values);
    }

    /// Makes every read of `offset` fail with [`BusError::Read`].
    pub fn fail_reads(&self, offset: u32) {
        let mut state = self.state.lock().unwrap();
        state.read_faults.insert(offset, true);
    }

    /// Makes every write of `offset` fail with [`BusError::Write`].
    pub fn fail_writes(&self, offset: u32) {
        let mut state = self.state.lock().unwrap();
        state.write_faults.insert(offset, true);
    }

    /// All writes observed so far, in order.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Number of writes observed at `offset`.
    pub fn write_count(&self, offset: u32) -> usize {
        self.state
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter(|w| w.offset == offset)
            .count()
    }

    /// Last value written to `offset`, if any write happened.
    pub fn last_write(&self, offset: u32) -> Option<u32> {
        self.state
            .lock()
            .unwrap()
            .writes
            .iter()
            .rev()
            .find(|w| w.offset == offset)
            .map(|w| w.value)
    }
}

impl RegisterBus for RegisterFile {
    fn read(&self, offset: u32) -> Result<u32, BusError> {
        let mut state = self.state.lock().unwrap();
        if state.read_faults.get(&offset).copied().unwrap_or(false) {
            return Err(BusError::Read { offset });
        }
        if let Some(script) = state.read_scripts.get_mut(&offset) {
            if let Some(value) = script.pop_front() {
                return Ok(value);
            }
        }
        Ok(state.regs.get(&offset).copied().unwrap_or(0))
    }

    fn write(&self, offset: u32, value: u32) -> Result<(), BusError> {
        let mut state = self.state.lock().unwrap();
        if state.write_faults.get(&offset).copied().unwrap_or(false) {
            return Err(BusError::Write { offset, value });
        }
        state.regs.insert(offset, value);
        state.writes.push(WriteRecord { offset, value });
        Ok(())
    }
}
