//! GPU MMU invalidate sequencing (gk20a-class framebuffer MMU).
//!
//! TLB invalidation is a three-step register sequence: point the hardware at
//! the page-directory base, trigger the invalidate with the requested scope,
//! then poll the control register until the priority fifo reports empty —
//! the hardware's signal that the request was accepted and drained. A fifo
//! that never drains means the MMU pipeline is stuck, which is fatal for the
//! device, not a retryable error.

#![forbid(unsafe_code)]

mod invalidate;
pub mod regs;

pub use invalidate::{
    Aperture, InvalidateConfig, InvalidateError, InvalidateScope, InvalidateState, MmuInvalidate,
    PdbTarget,
};
