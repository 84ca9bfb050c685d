//! IMX477 image-sensor control façade.
//!
//! The example "device operations" instantiation of the HAL-table pattern:
//! abstract control requests (gain, exposure, frame rate, streaming, power)
//! are translated into plain register writes over the [`RegisterBus`]
//! capability — no command queue is involved for this device class.
//!
//! Control-value conversions follow the sensor datasheet formulas, with the
//! request clamped to the mode's advertised range before conversion and the
//! converted value clamped once to the hardware register range.

#![forbid(unsafe_code)]

pub mod mode_tables;

use std::sync::Arc;
use std::time::Duration;

use nvhost_regs::{BusError, RegisterBus};
use nvhost_time::HostClock;
use thiserror::Error;
use tracing::debug;

use mode_tables::RegOp;

/// Sensor pixel clock, Hz.
pub const INTERNAL_CLK_HZ: u64 = 840_000_000;

/// Gain formula constant: `gain = C0 - C0 * gain_factor / request`.
pub const ANALOG_GAIN_C0: i64 = 1024;
pub const GAIN_REG_MIN: i64 = 0;
pub const GAIN_REG_MAX: i64 = 978;

pub const MIN_FRAME_LENGTH: u32 = 256;
pub const MAX_FRAME_LENGTH: u32 = 0xffff;
pub const MIN_COARSE_EXPOSURE: u32 = 4;
/// Coarse integration time must stay this many lines below frame length.
pub const MAX_COARSE_DIFF: u32 = 22;

/// Fixed settle after a stream start/stop; a documented hardware
/// requirement, not a retry.
pub const STREAM_SETTLE: Duration = Duration::from_millis(300);
/// Reset-line settle during the power sequence.
pub const POWER_SETTLE: Duration = Duration::from_millis(300);

/// Mode control properties, normally sourced from board configuration.
#[derive(Debug, Clone, Copy)]
pub struct ControlProperties {
    /// Fixed-point scale of gain requests (request = gain × factor).
    pub gain_factor: i64,
    pub min_gain: i64,
    pub max_gain: i64,
    /// Fixed-point scale of frame-rate requests (request = fps × factor).
    pub framerate_factor: u64,
    /// Fixed-point scale of exposure requests (request = seconds × factor).
    pub exposure_factor: u64,
    /// Line length in pixel-clock cycles.
    pub line_length: u64,
    /// Fine integration time, pixel-clock cycles.
    pub fine_integ_time: u64,
}

impl Default for ControlProperties {
    fn default() -> Self {
        Self {
            gain_factor: 1000,
            min_gain: 1000,
            max_gain: 22260,
            framerate_factor: 1_000_000,
            exposure_factor: 1_000_000,
            line_length: 12_000,
            fine_integ_time: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("mode index {index} out of range ({count} modes)")]
    BadMode { index: usize, count: usize },

    #[error("sensor did not identify (chip id {found:#04x}, expected {expected:#04x})")]
    BadChipId { found: u32, expected: u32 },

    #[error("operation requires the sensor powered on")]
    PoweredOff,

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Reset-line / rail control, board-specific and external to this crate.
pub trait PowerBackend: Send {
    fn assert_reset(&mut self);
    fn deassert_reset(&mut self);
}

/// Backend for boards where the rail sequencing is handled elsewhere.
#[derive(Default)]
pub struct NoopPower;

impl PowerBackend for NoopPower {
    fn assert_reset(&mut self) {}
    fn deassert_reset(&mut self) {}
}

pub struct Imx477 {
    bus: Arc<dyn RegisterBus>,
    clock: Arc<dyn HostClock>,
    power: Box<dyn PowerBackend>,
    props: ControlProperties,
    powered: bool,
    mode: Option<usize>,
    frame_length: u32,
}

impl Imx477 {
    pub fn new(
        bus: Arc<dyn RegisterBus>,
        clock: Arc<dyn HostClock>,
        power: Box<dyn PowerBackend>,
        props: ControlProperties,
    ) -> Self {
        Self {
            bus,
            clock,
            power,
            props,
            powered: false,
            mode: None,
            frame_length: MAX_FRAME_LENGTH,
        }
    }

    /// Powers the sensor and verifies it responds: reads the chip ID once
    /// out of reset. Mirrors the probe-time board setup.
    pub fn probe(&mut self) -> Result<(), SensorError> {
        self.power_on()?;
        let id = self.bus.read(mode_tables::CHIP_ID)?;
        if id != mode_tables::CHIP_ID_VALUE {
            self.power_off()?;
            return Err(SensorError::BadChipId {
                found: id,
                expected: mode_tables::CHIP_ID_VALUE,
            });
        }
        Ok(())
    }

    /// Exit reset (XCLR) with the documented settle on either side.
    pub fn power_on(&mut self) -> Result<(), SensorError> {
        debug!("power on");
        self.power.assert_reset();
        self.clock.sleep(POWER_SETTLE);
        self.power.deassert_reset();
        self.clock.sleep(POWER_SETTLE);
        self.powered = true;
        Ok(())
    }

    pub fn power_off(&mut self) -> Result<(), SensorError> {
        debug!("power off");
        self.clock.sleep(POWER_SETTLE);
        self.power.assert_reset();
        self.powered = false;
        self.mode = None;
        Ok(())
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Programs the common register table, then the mode table. A failure in
    /// the common table aborts before the mode table is touched.
    pub fn set_mode(&mut self, index: usize) -> Result<(), SensorError> {
        self.require_power()?;
        let table = *mode_tables::MODE_TABLES.get(index).ok_or(SensorError::BadMode {
            index,
            count: mode_tables::MODE_TABLES.len(),
        })?;
        debug!(index, "set mode");
        self.write_table(mode_tables::MODE_COMMON)?;
        self.write_table(table)?;
        self.mode = Some(index);
        Ok(())
    }

    pub fn start_streaming(&mut self) -> Result<(), SensorError> {
        self.require_power()?;
        debug!("start streaming");
        self.write_table(mode_tables::START_STREAM)?;
        self.clock.sleep(STREAM_SETTLE);
        Ok(())
    }

    pub fn stop_streaming(&mut self) -> Result<(), SensorError> {
        self.require_power()?;
        debug!("stop streaming");
        self.write_table(mode_tables::STOP_STREAM)?;
        self.clock.sleep(STREAM_SETTLE);
        Ok(())
    }

    pub fn set_group_hold(&mut self, enabled: bool) -> Result<(), SensorError> {
        self.require_power()?;
        debug!(enabled, "group hold");
        self.bus.write(mode_tables::GROUP_HOLD, u32::from(enabled))?;
        Ok(())
    }

    /// Programs analog gain. `request` is in `gain_factor` fixed-point
    /// units; out-of-range requests are clamped to the mode's advertised
    /// `[min_gain, max_gain]` before conversion, and the converted register
    /// value is clamped once to `[GAIN_REG_MIN, GAIN_REG_MAX]`.
    pub fn set_gain(&mut self, request: i64) -> Result<(), SensorError> {
        self.require_power()?;
        let request = request.clamp(self.props.min_gain, self.props.max_gain);
        let gain = (ANALOG_GAIN_C0 - ANALOG_GAIN_C0 * self.props.gain_factor / request)
            .clamp(GAIN_REG_MIN, GAIN_REG_MAX) as u32;
        debug!(request, gain, "set gain");
        self.bus
            .write(mode_tables::ANALOG_GAIN_MSB, (gain >> 8) & 0x3)?;
        self.bus.write(mode_tables::ANALOG_GAIN_LSB, gain & 0xff)?;
        Ok(())
    }

    /// Programs frame length from a frame-rate request in
    /// `framerate_factor` fixed-point units. The resulting frame length caps
    /// subsequent exposure programming.
    pub fn set_frame_rate(&mut self, request: u64) -> Result<(), SensorError> {
        self.require_power()?;
        let nominal = INTERNAL_CLK_HZ * self.props.framerate_factor
            / self.props.line_length
            / request.max(1);
        let frame_length =
            (nominal.min(u64::from(u32::MAX)) as u32).clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH);
        debug!(request, frame_length, "set frame rate");
        self.write_u16_pair(
            mode_tables::FRAME_LENGTH_MSB,
            mode_tables::FRAME_LENGTH_LSB,
            frame_length,
        )?;
        self.frame_length = frame_length;
        Ok(())
    }

    /// Programs coarse integration time from an exposure request in
    /// `exposure_factor` fixed-point units (microseconds at the default
    /// factor). The ceiling follows the current frame length.
    pub fn set_exposure(&mut self, request: u64) -> Result<(), SensorError> {
        self.require_power()?;
        let fine_integ = self.props.fine_integ_time * self.props.exposure_factor / INTERNAL_CLK_HZ;
        let nominal = request.saturating_sub(fine_integ) * INTERNAL_CLK_HZ
            / self.props.exposure_factor
            / self.props.line_length;
        let max_coarse = self.frame_length.saturating_sub(MAX_COARSE_DIFF);
        let coarse = (nominal.min(u64::from(u32::MAX)) as u32)
            .clamp(MIN_COARSE_EXPOSURE, max_coarse.max(MIN_COARSE_EXPOSURE));
        debug!(request, coarse, "set exposure");
        self.write_u16_pair(
            mode_tables::COARSE_INTEG_TIME_MSB,
            mode_tables::COARSE_INTEG_TIME_LSB,
            coarse,
        )?;
        Ok(())
    }

    pub fn frame_length(&self) -> u32 {
        self.frame_length
    }

    fn require_power(&self) -> Result<(), SensorError> {
        if self.powered {
            Ok(())
        } else {
            Err(SensorError::PoweredOff)
        }
    }

    fn write_u16_pair(&self, msb: u32, lsb: u32, value: u32) -> Result<(), SensorError> {
        self.bus.write(msb, (value >> 8) & 0xff)?;
        self.bus.write(lsb, value & 0xff)?;
        Ok(())
    }

    fn write_table(&self, table: &[RegOp]) -> Result<(), SensorError> {
        for op in table {
            match *op {
                RegOp::Write { addr, val } => self.bus.write(addr, val)?,
                RegOp::DelayMs(ms) => self.clock.sleep(Duration::from_millis(u64::from(ms))),
            }
        }
        Ok(())
    }
}
