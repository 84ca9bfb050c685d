use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::ccq::SeqNum;
use crate::error::PvaError;

/// Hardware-reported completion result for one command. Code 0 is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionStatus {
    pub code: u32,
}

impl CompletionStatus {
    pub const OK: CompletionStatus = CompletionStatus { code: 0 };

    pub fn is_err(&self) -> bool {
        self.code != 0
    }
}

/// What a dispatched completion event matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Marked a pending submission complete.
    Matched,
    /// The sequence number was already complete; duplicate event discarded.
    AlreadyDone,
    /// No submission with this sequence number is pending; stale or spurious
    /// event, discarded.
    Unknown,
}

#[derive(Default)]
struct PendingTable {
    /// `None` = submitted, not yet completed; `Some` = completed, result not
    /// yet collected by a waiter.
    entries: HashMap<SeqNum, Option<CompletionStatus>>,
    shut_down: bool,
}

/// Demultiplexes the device's single completion signal across any number of
/// concurrently pending submissions.
///
/// The table has its own lock, independent of the submission lock; the
/// interrupt/poll path only ever takes this lock and never blocks beyond it.
#[derive(Default)]
pub struct CompletionWaiter {
    table: Mutex<PendingTable>,
    cond: Condvar,
}

impl CompletionWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `seq` as pending. Called by the submitter before the
    /// doorbell write, so a completion can never race ahead of registration.
    pub fn register(&self, seq: SeqNum) {
        let mut table = self.table.lock().unwrap();
        let prev = table.entries.insert(seq, None);
        debug_assert!(prev.is_none(), "sequence {seq} registered twice");
    }

    /// Removes a registration that never reached the hardware (the doorbell
    /// write failed).
    pub(crate) fn unregister(&self, seq: SeqNum) {
        self.table.lock().unwrap().entries.remove(&seq);
    }

    /// Interrupt/poll entry point: records `status` for `seq` and wakes
    /// matching waiters. Unknown and duplicate events are logged and
    /// discarded, not treated as fatal — hardware status registers may
    /// report stale or repeated completions.
    pub fn dispatch(&self, seq: SeqNum, status: CompletionStatus) -> DispatchOutcome {
        let mut table = self.table.lock().unwrap();
        match table.entries.get_mut(&seq) {
            None => {
                warn!(seq, code = status.code, "completion for unknown sequence discarded");
                DispatchOutcome::Unknown
            }
            Some(Some(_)) => {
                warn!(seq, code = status.code, "duplicate completion discarded");
                DispatchOutcome::AlreadyDone
            }
            Some(slot @ None) => {
                *slot = Some(status);
                self.cond.notify_all();
                DispatchOutcome::Matched
            }
        }
    }

    /// Blocks until `seq` completes or `timeout` elapses.
    ///
    /// A timed-out wait leaves the pending entry in place so a late
    /// completion still has something to match; a fresh `wait` for the same
    /// sequence then observes the recorded result immediately. A collected
    /// result retires the entry.
    pub fn wait(&self, seq: SeqNum, timeout: Duration) -> Result<CompletionStatus, PvaError> {
        let deadline = Instant::now() + timeout;
        let mut table = self.table.lock().unwrap();
        loop {
            if table.shut_down {
                return Err(PvaError::Shutdown);
            }
            if let Some(Some(status)) = table.entries.get(&seq) {
                let status = *status;
                table.entries.remove(&seq);
                return Ok(status);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PvaError::Timeout { seq, timeout });
            }
            let (guard, wait) = self.cond.wait_timeout(table, remaining).unwrap();
            table = guard;
            if wait.timed_out() {
                // Re-check once: the completion may have landed between the
                // timeout and reacquiring the lock.
                if let Some(Some(status)) = table.entries.get(&seq) {
                    let status = *status;
                    table.entries.remove(&seq);
                    return Ok(status);
                }
                if table.shut_down {
                    return Err(PvaError::Shutdown);
                }
                return Err(PvaError::Timeout { seq, timeout });
            }
        }
    }

    /// Device teardown: drops every pending entry and fails all current
    /// waiters with [`PvaError::Shutdown`]. Completions arriving afterwards
    /// are discarded like any other unknown sequence.
    pub fn drain(&self) {
        let mut table = self.table.lock().unwrap();
        table.shut_down = true;
        table.entries.clear();
        self.cond.notify_all();
    }

    /// Number of registered-but-uncollected entries (pending or completed).
    pub fn pending_len(&self) -> usize {
        self.table.lock().unwrap().entries.len()
    }
}
