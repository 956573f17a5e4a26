use crate::register::{Access, ParameterDescriptor, Range};

const R: Access = Access::ReadOnly;
const RW: Access = Access::ReadWrite;

const fn p(
    address: u16,
    name: &'static str,
    access: Access,
    unit: &'static str,
    scale: f64,
    valid_range: Option<Range>,
) -> ParameterDescriptor {
    ParameterDescriptor::new(address, name, access, unit, scale, valid_range)
}

/// Sinamics V20 Modbus RTU holding registers, in address order.
///
/// Two-state flags carry a (0, 1) range; control and status words (STW, HSW,
/// ZSW, HIW, WDOG_ACTION) are raw bit fields and carry none. The vendor map
/// lists the inverter version at both 40061 and 40301; the latter is
/// exposed as FIRMWARE_VER so names stay unique.
#[rustfmt::skip]
pub const PARAMETERS: &[ParameterDescriptor] = &[
    p(40001, "WDOG_TIME", RW, "ms", 1.0, Some(Range::new(0.0, 65535.0))),
    p(40002, "WDOG_ACTION", RW, "_", 1.0, None),
    p(40003, "FREQ_REF", RW, "%", 100.0, Some(Range::new(0.0, 100.0))),
    p(40004, "RUN_ENABLE", RW, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40005, "CMD_FWD_REV", RW, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40006, "CMD_START", RW, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40007, "FAULT_ACK", RW, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40008, "PID_SETP_REF", RW, "%", 100.0, Some(Range::new(-200.0, 200.0))),
    p(40009, "ENABLE_PID", RW, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40010, "CURRENT_LMT", RW, "%", 10.0, Some(Range::new(10.0, 400.0))),
    p(40011, "ACCEL_TIME", RW, "s", 100.0, Some(Range::new(0.0, 650.0))),
    p(40012, "DECEL_TIME", RW, "s", 100.0, Some(Range::new(0.0, 650.0))),
    p(40014, "DIGITAL_OUT_1", RW, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40015, "DIGITAL_OUT_2", RW, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40016, "REF_FREQ", RW, "Hz", 100.0, Some(Range::new(1.0, 550.0))),
    p(40017, "PID_UP_LMT", RW, "%", 100.0, Some(Range::new(-200.0, 200.0))),
    p(40018, "PID_LO_LMT", RW, "%", 100.0, Some(Range::new(-200.0, 200.0))),
    p(40019, "P_GAIN", RW, "_", 1000.0, Some(Range::new(0.0, 65.0))),
    p(40020, "I_GAIN", RW, "s", 1.0, Some(Range::new(0.0, 60.0))),
    p(40021, "D_GAIN", RW, "_", 1.0, Some(Range::new(0.0, 60.0))),
    p(40022, "FEEDBK_GAIN", RW, "%", 100.0, Some(Range::new(0.0, 500.0))),
    p(40023, "LOW_PASS", RW, "_", 100.0, Some(Range::new(0.0, 60.0))),
    p(40024, "FREQ_OUTPUT", R, "Hz", 100.0, Some(Range::new(-327.68, 327.67))),
    p(40025, "SPEED", R, "RPM", 1.0, Some(Range::new(-16250.0, 16250.0))),
    p(40026, "CURRENT", R, "A", 100.0, Some(Range::new(0.0, 163.83))),
    p(40027, "TORQUE", R, "Nm", 100.0, Some(Range::new(-325.0, 325.0))),
    p(40028, "ACTUAL_PWR", R, "kW", 100.0, Some(Range::new(0.0, 327.67))),
    p(40029, "TOTAL_KWH", R, "kWh", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40030, "DC_BUS_VOLTS", R, "V", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40031, "REFERENCE", R, "Hz", 100.0, Some(Range::new(-327.68, 327.67))),
    p(40032, "RATED_PWR", R, "kW", 100.0, Some(Range::new(0.0, 327.67))),
    p(40033, "OUTPUT_VOLTS", R, "V", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40034, "FWD_REV", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40035, "STOP_RUN", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40036, "AT_MAX_FREQ", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40037, "CONTROL_MODE", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40038, "ENABLED", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40039, "READY_TO_RUN", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40040, "ANALOG_IN_1", R, "%", 100.0, Some(Range::new(-300.0, 300.0))),
    p(40041, "ANALOG_IN_2", R, "%", 100.0, Some(Range::new(-300.0, 300.0))),
    p(40042, "ANALOG_OUT_1", R, "%", 100.0, Some(Range::new(-100.0, 100.0))),
    p(40044, "FREQ_ACTUAL", R, "%", 100.0, Some(Range::new(-100.0, 100.0))),
    p(40045, "PID_SETP_OUT", R, "%", 100.0, Some(Range::new(-100.0, 100.0))),
    p(40046, "PID_OUTPUT", R, "%", 100.0, Some(Range::new(-100.0, 100.0))),
    p(40047, "PID_FEEDBACK", R, "%", 100.0, Some(Range::new(-100.0, 100.0))),
    p(40048, "DIGITAL_IN_1", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40049, "DIGITAL_IN_2", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40050, "DIGITAL_IN_3", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40051, "DIGITAL_IN_4", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40054, "FAULT", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40055, "LAST_FAULT", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40056, "FAULT_1", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40057, "FAULT_2", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40058, "FAULT_3", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40059, "WARNING", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40060, "LAST_WARNING", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40061, "INVERTER_VER", R, "_", 100.0, Some(Range::new(0.0, 327.67))),
    p(40062, "DRIVE_MODEL", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40100, "STW", RW, "_", 1.0, None),
    p(40101, "HSW", RW, "_", 1.0, None),
    p(40110, "ZSW", R, "_", 1.0, None),
    p(40111, "HIW", R, "_", 1.0, None),
    p(40300, "INVERTER_MODEL", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40301, "FIRMWARE_VER", R, "_", 100.0, Some(Range::new(0.0, 327.67))),
    p(40349, "HAND_AUTO", R, "_", 1.0, Some(Range::new(0.0, 1.0))),
    p(40403, "FAULT_4", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40404, "FAULT_5", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40405, "FAULT_6", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40406, "FAULT_7", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40407, "FAULT_8", R, "_", 1.0, Some(Range::new(0.0, 32767.0))),
    p(40499, "PRM_ERROR_CODE", R, "_", 1.0, Some(Range::new(0.0, 254.0))),
    p(40521, "PI_FEEDBACK", R, "%", 100.0, Some(Range::new(-100.0, 100.0))),
];
