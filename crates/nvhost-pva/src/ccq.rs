use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use nvhost_regs::RegisterBus;
use tracing::debug;

use crate::completion::{CompletionStatus, CompletionWaiter, DispatchOutcome};
use crate::error::PvaError;
use crate::hal::VersionOps;

/// Sequence number assigned to a submitted command.
///
/// Assigned in strict submission order; the ring slot is the sequence number
/// modulo the generation's CCQ depth. The full 32 bits travel in the queue
/// entry's sequence word and come back unchanged through the status
/// interface, so completions match exactly even past 2^8 submissions.
pub type SeqNum = u32;

/// One command for the on-device queue: an opcode plus an opaque payload the
/// firmware interprets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcqCommand {
    pub opcode: u8,
    pub payload: u64,
}

impl CcqCommand {
    pub const fn new(opcode: u8, payload: u64) -> Self {
        Self { opcode, payload }
    }

    /// Wire encoding of the entry's command word: opcode in the top byte,
    /// payload in the low 56 bits. The sequence number is not packed here;
    /// it gets the entry's dedicated sequence word so the hardware echoes
    /// all 32 bits back through the status interface.
    pub fn encode(&self) -> u64 {
        (u64::from(self.opcode) << 56) | (self.payload & 0x00ff_ffff_ffff_ffff)
    }
}

struct SubmitState {
    /// Next sequence number to assign, also the count of submissions so far.
    next_seq: u64,
}

/// Holds the device-wide submission lock.
///
/// All queue-slot allocation and doorbell writes happen while one of these
/// is alive; it is dropped before blocking on a completion (except on the
/// explicitly locked synchronous path).
pub struct SubmissionGuard<'a> {
    state: MutexGuard<'a, SubmitState>,
}

/// Per-device client for the bounded on-device command queue.
///
/// Guards the shared queue with a single submission mutex and correlates
/// completions back to callers through the [`CompletionWaiter`]. In-flight
/// accounting uses a retire counter updated from the interrupt path, so the
/// interrupt handler never needs the submission lock.
pub struct CcqClient {
    ops: Arc<dyn VersionOps>,
    bus: Arc<dyn RegisterBus>,
    waiter: Arc<CompletionWaiter>,
    submit: Mutex<SubmitState>,
    /// Count of submissions whose completion has been dispatched.
    retired: AtomicU64,
}

impl CcqClient {
    pub fn new(ops: Arc<dyn VersionOps>, bus: Arc<dyn RegisterBus>) -> Self {
        Self {
            ops,
            bus,
            waiter: Arc::new(CompletionWaiter::new()),
            submit: Mutex::new(SubmitState { next_seq: 0 }),
            retired: AtomicU64::new(0),
        }
    }

    pub fn waiter(&self) -> &Arc<CompletionWaiter> {
        &self.waiter
    }

    /// Commands submitted and not yet completed.
    pub fn in_flight(&self) -> u64 {
        let submitted = self.submit.lock().unwrap().next_seq;
        submitted.saturating_sub(self.retired.load(Ordering::Acquire))
    }

    /// Acquires the device-wide submission lock.
    pub fn lock(&self) -> SubmissionGuard<'_> {
        SubmissionGuard {
            state: self.submit.lock().unwrap(),
        }
    }

    /// Writes `cmd` into the next free slot and rings the doorbell. The
    /// caller holds the submission lock. Fails with [`PvaError::QueueFull`]
    /// when every slot is in flight; whether to back off, block, or reject
    /// is the caller's decision.
    pub fn submit_locked(
        &self,
        guard: &mut SubmissionGuard<'_>,
        cmd: CcqCommand,
    ) -> Result<SeqNum, PvaError> {
        let depth = self.ops.ccq_depth();
        let in_flight = guard
            .state
            .next_seq
            .saturating_sub(self.retired.load(Ordering::Acquire));
        if in_flight >= depth {
            return Err(PvaError::QueueFull { depth });
        }

        let seq = guard.state.next_seq as SeqNum;
        // Register before the doorbell so a fast completion cannot arrive
        // ahead of its pending entry.
        self.waiter.register(seq);
        if let Err(err) = self.ops.ccq_send_task(self.bus.as_ref(), seq, &cmd) {
            self.waiter.unregister(seq);
            return Err(err);
        }
        guard.state.next_seq += 1;
        debug!(seq, opcode = cmd.opcode, in_flight = in_flight + 1, "ccq command submitted");
        Ok(seq)
    }

    /// Lock, submit, unlock. The returned sequence number can be waited on
    /// via [`CcqClient::waiter`].
    pub fn submit(&self, cmd: CcqCommand) -> Result<SeqNum, PvaError> {
        let mut guard = self.lock();
        self.submit_locked(&mut guard, cmd)
    }

    /// Submits `cmd` and blocks until completion or `timeout`. The
    /// submission lock is released before blocking so other submitters are
    /// not starved by the hardware round trip.
    pub fn submit_sync(
        &self,
        cmd: CcqCommand,
        timeout: Duration,
    ) -> Result<CompletionStatus, PvaError> {
        let seq = self.submit(cmd)?;
        self.wait_mapped(seq, timeout)
    }

    /// Submits `cmd` and blocks with the submission lock held for the whole
    /// round trip. Used by bring-up paths that require exclusive queue
    /// access; regular submitters use [`CcqClient::submit_sync`].
    pub fn submit_sync_locked(
        &self,
        cmd: CcqCommand,
        timeout: Duration,
    ) -> Result<CompletionStatus, PvaError> {
        let mut guard = self.lock();
        let seq = self.submit_locked(&mut guard, cmd)?;
        let result = self.wait_mapped(seq, timeout);
        drop(guard);
        result
    }

    fn wait_mapped(&self, seq: SeqNum, timeout: Duration) -> Result<CompletionStatus, PvaError> {
        let status = self.waiter.wait(seq, timeout)?;
        if status.is_err() {
            return Err(PvaError::DeviceError { seq, code: status.code });
        }
        Ok(status)
    }

    /// Completion entry point, fed by the interrupt notifier or poll timer.
    /// Retires the command's ring slot when the event matches a pending
    /// submission; stale or duplicate events retire nothing.
    pub fn complete(&self, seq: SeqNum, status: CompletionStatus) -> DispatchOutcome {
        let outcome = self.waiter.dispatch(seq, status);
        if outcome == DispatchOutcome::Matched {
            self.retired.fetch_add(1, Ordering::Release);
        }
        outcome
    }

    /// Fails all pending waiters and stops accepting completions. Part of
    /// device teardown.
    pub fn shutdown(&self) {
        self.waiter.drain();
    }
}
