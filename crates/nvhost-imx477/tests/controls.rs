use std::sync::Arc;
use std::time::Duration;

use nvhost_imx477::mode_tables::{
    self, ANALOG_GAIN_LSB, ANALOG_GAIN_MSB, COARSE_INTEG_TIME_LSB, COARSE_INTEG_TIME_MSB,
    FRAME_LENGTH_LSB, FRAME_LENGTH_MSB, GROUP_HOLD, MODE_SELECT,
};
use nvhost_imx477::{ControlProperties, Imx477, NoopPower, SensorError, STREAM_SETTLE};
use nvhost_regs::RegisterFile;
use nvhost_time::FakeHostClock;

fn powered_sensor() -> (Imx477, Arc<RegisterFile>, Arc<FakeHostClock>) {
    let bus = Arc::new(RegisterFile::new());
    let clock = Arc::new(FakeHostClock::new());
    let mut sensor = Imx477::new(
        bus.clone(),
        clock.clone(),
        Box::new(NoopPower),
        ControlProperties::default(),
    );
    sensor.power_on().unwrap();
    (sensor, bus, clock)
}

#[test]
fn gain_in_range_programs_the_exact_encoding() {
    let (mut sensor, bus, _clock) = powered_sensor();
    // 2.0x at gain_factor 1000: 1024 - 1024*1000/2000 = 512.
    sensor.set_gain(2000).unwrap();
    assert_eq!(bus.last_write(ANALOG_GAIN_MSB), Some(0x02));
    assert_eq!(bus.last_write(ANALOG_GAIN_LSB), Some(0x00));
}

#[test]
fn gain_below_minimum_is_programmed_as_minimum() {
    let (mut sensor, bus, _clock) = powered_sensor();
    sensor.set_gain(500).unwrap();
    // Clamped to min_gain (1.0x), which encodes to register 0.
    assert_eq!(bus.last_write(ANALOG_GAIN_MSB), Some(0x00));
    assert_eq!(bus.last_write(ANALOG_GAIN_LSB), Some(0x00));
}

#[test]
fn gain_above_maximum_is_programmed_as_maximum() {
    let (mut sensor, bus, _clock) = powered_sensor();
    sensor.set_gain(100_000).unwrap();
    // Clamped to max_gain, which encodes to the register ceiling 978.
    assert_eq!(bus.last_write(ANALOG_GAIN_MSB), Some(0x03));
    assert_eq!(bus.last_write(ANALOG_GAIN_LSB), Some(0xd2));
}

#[test]
fn frame_rate_programs_and_caches_frame_length() {
    let (mut sensor, bus, _clock) = powered_sensor();
    // 30fps at the default properties: 840MHz / 12000 / 30 = 2333 lines.
    sensor.set_frame_rate(30_000_000).unwrap();
    assert_eq!(sensor.frame_length(), 2333);
    assert_eq!(bus.last_write(FRAME_LENGTH_MSB), Some(0x09));
    assert_eq!(bus.last_write(FRAME_LENGTH_LSB), Some(0x1d));
}

#[test]
fn frame_length_is_clamped_to_hardware_bounds() {
    let (mut sensor, _bus, _clock) = powered_sensor();
    sensor.set_frame_rate(10_000_000_000_000).unwrap();
    assert_eq!(sensor.frame_length(), nvhost_imx477::MIN_FRAME_LENGTH);
    sensor.set_frame_rate(1).unwrap();
    assert_eq!(sensor.frame_length(), nvhost_imx477::MAX_FRAME_LENGTH);
}

#[test]
fn exposure_converts_microseconds_to_coarse_lines() {
    let (mut sensor, bus, _clock) = powered_sensor();
    sensor.set_frame_rate(30_000_000).unwrap();
    // 10ms: fine-integ correction of 4us, then (9996us * 840MHz) / 12000 = 699.
    sensor.set_exposure(10_000).unwrap();
    assert_eq!(bus.last_write(COARSE_INTEG_TIME_MSB), Some(0x02));
    assert_eq!(bus.last_write(COARSE_INTEG_TIME_LSB), Some(0xbb));
}

#[test]
fn exposure_is_limited_by_frame_length() {
    let (mut sensor, bus, _clock) = powered_sensor();
    sensor.set_frame_rate(30_000_000).unwrap();
    sensor.set_exposure(100_000).unwrap();
    // Ceiling: frame_length 2333 - MAX_COARSE_DIFF 22 = 2311 = 0x0907.
    assert_eq!(bus.last_write(COARSE_INTEG_TIME_MSB), Some(0x09));
    assert_eq!(bus.last_write(COARSE_INTEG_TIME_LSB), Some(0x07));

    sensor.set_exposure(0).unwrap();
    assert_eq!(
        bus.last_write(COARSE_INTEG_TIME_LSB),
        Some(nvhost_imx477::MIN_COARSE_EXPOSURE)
    );
}

#[test]
fn set_mode_writes_common_table_before_mode_table() {
    let (mut sensor, bus, _clock) = powered_sensor();
    sensor.set_mode(0).unwrap();
    let writes = bus.writes();
    // First write of the common table, then eventually the crop registers.
    assert_eq!(writes[0].offset, 0x0136);
    assert!(writes.iter().any(|w| w.offset == 0x0344));
}

#[test]
fn common_table_failure_aborts_before_the_mode_table() {
    let (mut sensor, bus, _clock) = powered_sensor();
    bus.fail_writes(0x0136);
    assert!(matches!(sensor.set_mode(0), Err(SensorError::Bus(_))));
    assert_eq!(bus.write_count(0x0344), 0);
}

#[test]
fn unknown_mode_index_is_rejected() {
    let (mut sensor, _bus, _clock) = powered_sensor();
    assert_eq!(
        sensor.set_mode(9),
        Err(SensorError::BadMode { index: 9, count: mode_tables::MODE_TABLES.len() })
    );
}

#[test]
fn streaming_applies_the_fixed_settle_delay() {
    let (mut sensor, bus, clock) = powered_sensor();
    let before = clock.elapsed();
    sensor.start_streaming().unwrap();
    assert_eq!(bus.last_write(MODE_SELECT), Some(0x01));
    assert_eq!(clock.elapsed() - before, STREAM_SETTLE);

    sensor.stop_streaming().unwrap();
    assert_eq!(bus.last_write(MODE_SELECT), Some(0x00));
}

#[test]
fn group_hold_writes_the_hold_register() {
    let (mut sensor, bus, _clock) = powered_sensor();
    sensor.set_group_hold(true).unwrap();
    assert_eq!(bus.last_write(GROUP_HOLD), Some(1));
    sensor.set_group_hold(false).unwrap();
    assert_eq!(bus.last_write(GROUP_HOLD), Some(0));
}

#[test]
fn controls_require_power() {
    let bus = Arc::new(RegisterFile::new());
    let clock = Arc::new(FakeHostClock::new());
    let mut sensor = Imx477::new(
        bus,
        clock,
        Box::new(NoopPower),
        ControlProperties::default(),
    );
    assert_eq!(sensor.set_gain(2000), Err(SensorError::PoweredOff));
    assert_eq!(sensor.start_streaming(), Err(SensorError::PoweredOff));
}

#[test]
fn probe_verifies_the_chip_id() {
    let bus = Arc::new(RegisterFile::new());
    let clock = Arc::new(FakeHostClock::new());
    bus.seed(mode_tables::CHIP_ID, mode_tables::CHIP_ID_VALUE);
    let mut sensor = Imx477::new(
        bus.clone(),
        clock.clone(),
        Box::new(NoopPower),
        ControlProperties::default(),
    );
    sensor.probe().unwrap();
    assert!(sensor.is_powered());

    bus.seed(mode_tables::CHIP_ID, 0xff);
    let mut rogue = Imx477::new(bus, clock, Box::new(NoopPower), ControlProperties::default());
    assert_eq!(
        rogue.probe(),
        Err(SensorError::BadChipId { found: 0xff, expected: mode_tables::CHIP_ID_VALUE })
    );
    assert!(!rogue.is_powered());
}
