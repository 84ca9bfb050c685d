//! Register tables for the supported sensor modes.
//!
//! A table is a sequence of register writes with optional inter-write
//! delays, applied in order. The common table always precedes the
//! mode-specific table.

/// One table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegOp {
    Write { addr: u32, val: u32 },
    DelayMs(u32),
}

pub const MODE_SELECT: u32 = 0x0100;
pub const GROUP_HOLD: u32 = 0x0104;
pub const COARSE_INTEG_TIME_MSB: u32 = 0x0202;
pub const COARSE_INTEG_TIME_LSB: u32 = 0x0203;
pub const ANALOG_GAIN_MSB: u32 = 0x0204;
pub const ANALOG_GAIN_LSB: u32 = 0x0205;
pub const FRAME_LENGTH_MSB: u32 = 0x0340;
pub const FRAME_LENGTH_LSB: u32 = 0x0341;

/// Chip ID register, readable once powered; used by the attach probe.
pub const CHIP_ID: u32 = 0x0016;
pub const CHIP_ID_VALUE: u32 = 0x04;

/// Programmed before any mode table: PLL setup, I/O drive, defaults.
pub const MODE_COMMON: &[RegOp] = &[
    RegOp::Write { addr: 0x0136, val: 0x18 }, // external clock, MHz
    RegOp::Write { addr: 0x0137, val: 0x00 },
    RegOp::Write { addr: 0x0303, val: 0x02 }, // system clock dividers
    RegOp::Write { addr: 0x0305, val: 0x04 },
    RegOp::Write { addr: 0x0306, val: 0x00 },
    RegOp::Write { addr: 0x0307, val: 0xaf },
    RegOp::DelayMs(1),
    RegOp::Write { addr: 0x0112, val: 0x0a }, // RAW10
    RegOp::Write { addr: 0x0113, val: 0x0a },
    RegOp::Write { addr: 0x0114, val: 0x01 }, // two-lane CSI
];

/// 3840x2160, cropped, 30fps ceiling.
pub const MODE_3840X2160: &[RegOp] = &[
    RegOp::Write { addr: 0x0344, val: 0x00 }, // x start
    RegOp::Write { addr: 0x0345, val: 0x6c },
    RegOp::Write { addr: 0x0348, val: 0x0f }, // x end
    RegOp::Write { addr: 0x0349, val: 0x6b },
    RegOp::Write { addr: 0x034c, val: 0x0f }, // output width
    RegOp::Write { addr: 0x034d, val: 0x00 },
    RegOp::Write { addr: 0x034e, val: 0x08 }, // output height
    RegOp::Write { addr: 0x034f, val: 0x70 },
];

/// 1920x1080, 2x2 binned, 60fps ceiling.
pub const MODE_1920X1080: &[RegOp] = &[
    RegOp::Write { addr: 0x0383, val: 0x01 }, // x odd increment
    RegOp::Write { addr: 0x0387, val: 0x01 },
    RegOp::Write { addr: 0x0900, val: 0x01 }, // binning enable
    RegOp::Write { addr: 0x0901, val: 0x22 },
    RegOp::Write { addr: 0x034c, val: 0x07 }, // output width
    RegOp::Write { addr: 0x034d, val: 0x80 },
    RegOp::Write { addr: 0x034e, val: 0x04 }, // output height
    RegOp::Write { addr: 0x034f, val: 0x38 },
];

pub const MODE_TABLES: &[&[RegOp]] = &[MODE_3840X2160, MODE_1920X1080];

pub const START_STREAM: &[RegOp] = &[RegOp::Write { addr: MODE_SELECT, val: 0x01 }];

pub const STOP_STREAM: &[RegOp] = &[RegOp::Write { addr: MODE_SELECT, val: 0x00 }];
