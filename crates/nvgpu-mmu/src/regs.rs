//! gk20a `fb_mmu_*` register offsets and field encodings.
//!
//! Naming follows the hardware manuals: `*_r()` is a register offset,
//! `*_f(v)` shifts a value into its field, `*_v(r)` extracts a field from a
//! full register value.

pub const fn fb_mmu_ctrl_r() -> u32 {
    0x0010_0c80
}

pub const fn fb_mmu_ctrl_pri_fifo_empty_v(r: u32) -> u32 {
    (r >> 15) & 0x1
}

pub const fn fb_mmu_ctrl_pri_fifo_space_v(r: u32) -> u32 {
    (r >> 16) & 0xff
}

pub const fn fb_mmu_invalidate_pdb_r() -> u32 {
    0x0010_0cb8
}

pub const fn fb_mmu_invalidate_pdb_aperture_vid_mem_f() -> u32 {
    0x0
}

pub const fn fb_mmu_invalidate_pdb_aperture_sys_mem_f() -> u32 {
    0x2
}

/// PDB address field: 4KiB-aligned address, stored shifted into bits 4..32.
pub const fn fb_mmu_invalidate_pdb_addr_f(v: u32) -> u32 {
    (v & 0x0fff_ffff) << 4
}

pub const fn fb_mmu_invalidate_r() -> u32 {
    0x0010_0cbc
}

pub const fn fb_mmu_invalidate_all_va_true_f() -> u32 {
    0x1
}

pub const fn fb_mmu_invalidate_all_pdb_true_f() -> u32 {
    0x2
}

pub const fn fb_mmu_invalidate_trigger_true_f() -> u32 {
    0x8000_0000
}

pub const fn fb_mmu_invalidate_trigger_v(r: u32) -> u32 {
    (r >> 31) & 0x1
}
