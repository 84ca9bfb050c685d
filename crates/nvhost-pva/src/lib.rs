//! PVA (programmable vision accelerator) host-side bring-up core.
//!
//! Hardware generations of the PVA differ only in *how* a small set of
//! register-level operations are carried out (mailbox access, status
//! interface layout, CCQ doorbell push), never in what the upper driver
//! logic does. That split is expressed as:
//!
//! - [`VersionOps`]: one operation table per generation, resolved once at
//!   device attach through the [`HalRegistry`] and shared read-only.
//! - [`CcqClient`]: serialized submission into the bounded on-device command
//!   queue, with completions correlated back to callers by sequence number.
//! - [`CompletionWaiter`]: demultiplexes the shared completion signal
//!   (interrupt or poll) across concurrently pending submissions.
//!
//! The only blocking operations are the synchronous submit paths; the
//! interrupt dispatch path never takes the submission lock.

#![forbid(unsafe_code)]

mod ccq;
mod completion;
mod device;
mod error;
mod hal;
pub mod t19x;
pub mod t23x;

pub use ccq::{CcqClient, CcqCommand, SeqNum, SubmissionGuard};
pub use completion::{CompletionStatus, CompletionWaiter, DispatchOutcome};
pub use device::PvaDevice;
pub use error::{HalError, PvaError};
pub use hal::{Generation, HalRegistry, InterfaceStatus, StatusFlags, VersionOps};
