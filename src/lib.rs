//! Host-side bring-up core for NVIDIA Tegra-class coprocessors.
//!
//! The heavy lifting lives in the member crates; this package re-exports
//! them and carries the cross-crate integration tests.
//!
//! - [`nvhost_regs`]: the register-access capability and in-memory model.
//! - [`nvhost_time`]: host clock + bounded polling primitives.
//! - [`nvhost_pva`]: generation-dispatched PVA operation tables, CCQ
//!   submission, completion demux.
//! - [`nvgpu_mmu`]: GPU MMU TLB-invalidate sequencing.
//! - [`nvhost_imx477`]: the image-sensor control façade.

#![forbid(unsafe_code)]

pub use nvgpu_mmu;
pub use nvhost_imx477;
pub use nvhost_pva;
pub use nvhost_regs;
pub use nvhost_time;
