//! Telemetry line codec: ASCII `KEY:VALUE\r\n` in both directions.
//!
//! Outbound groups run on per-group prescalers plus an every-cycle
//! heartbeat. Inbound lines become config commands; anything malformed is
//! dropped silently.

use core::fmt::{self, Write};

use heapless::Vec;

use crate::state::{AnalogData, ConfigUpdate, ControlOutput, CpuStats, ImuSample, RadioFrame};

// ── Inbound commands ──────────────────────────────────────────────────────────

/// Maximum accepted line length; longer lines are discarded wholesale.
pub const LINE_MAX: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Mode(i32),
    ServoRudder(f32),
    ServoTrim(f32),
    ServoTwist(f32),
    ServoExtra(f32),
    KpRoll(f32),
    KiRoll(f32),
    KpYaw(f32),
    KiYaw(f32),
}

impl Command {
    fn from_line(key: &str, value: f32) -> Option<Self> {
        Some(match key {
            // Mode comes over the wire as a float; truncate to the integer.
            "MOD" => Self::Mode(value as i32),
            "SRU" => Self::ServoRudder(value),
            "STR" => Self::ServoTrim(value),
            "STW" => Self::ServoTwist(value),
            "SEX" => Self::ServoExtra(value),
            "KPR" => Self::KpRoll(value),
            "KIR" => Self::KiRoll(value),
            "KPY" => Self::KpYaw(value),
            "KIY" => Self::KiYaw(value),
            _ => return None,
        })
    }

    /// Fold this command into the config the command task keeps current.
    pub fn apply(&self, config: &mut ConfigUpdate) {
        match *self {
            Self::Mode(raw) => config.mode_raw = raw,
            Self::ServoRudder(v) => config.rudder_servo_angle = v,
            Self::ServoTrim(v) => config.trim_servo_angle = v,
            Self::ServoTwist(v) => config.twist_servo_angle = v,
            Self::ServoExtra(v) => config.extra_servo_angle = v,
            Self::KpRoll(v) => config.kp_roll = v,
            Self::KiRoll(v) => config.ki_roll = v,
            Self::KpYaw(v) => config.kp_yaw = v,
            Self::KiYaw(v) => config.ki_yaw = v,
        }
    }
}

/// Incremental `KEY:VALUE\r\n` scanner over a byte stream.
pub struct LineParser {
    buf: Vec<u8, LINE_MAX>,
}

impl LineParser {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed one byte; yields a command when it completes a recognized line.
    /// Overflowing the accumulator before a terminator discards the
    /// partial line.
    pub fn push_byte(&mut self, byte: u8) -> Option<Command> {
        if self.buf.push(byte).is_err() {
            self.buf.clear();
            return None;
        }

        let len = self.buf.len();
        if len < 2 || &self.buf[len - 2..] != b"\r\n" {
            return None;
        }

        let command = Self::parse_line(&self.buf[..len - 2]);
        self.buf.clear();
        command
    }

    pub fn push_bytes(&mut self, data: &[u8]) -> Option<Command> {
        let mut last = None;
        for &b in data {
            if let Some(cmd) = self.push_byte(b) {
                last = Some(cmd);
            }
        }
        last
    }

    fn parse_line(line: &[u8]) -> Option<Command> {
        let line = core::str::from_utf8(line).ok()?;
        // Split at the first colon only; values never contain one.
        let (key, value) = line.split_once(':')?;
        let value: f32 = value.parse().ok()?;
        Command::from_line(key, value)
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

// ── Outbound reporting ────────────────────────────────────────────────────────

// Emission rates relative to the telemetry task period, per group.
const ANALOG_PRESCALER: u32 = 5;
const IMU_PRESCALER: u32 = 1;
const RADIO_PRESCALER: u32 = 2;
const CONTROL_PRESCALER: u32 = 2;
const CPU_PRESCALER: u32 = 5;

fn line<W: Write>(w: &mut W, key: &str, value: f32) -> fmt::Result {
    write!(w, "{key}:{value:.2}\r\n")
}

/// Formats the outbound telemetry stream. Call `poll` once per telemetry
/// cycle with whatever fresh data the task drained; groups without fresh
/// data stay silent even when their prescaler fires.
pub struct TelemetryReporter {
    analog_count: u32,
    imu_count: u32,
    radio_count: u32,
    control_count: u32,
    cpu_count: u32,
}

impl TelemetryReporter {
    pub fn new() -> Self {
        Self {
            analog_count: 0,
            imu_count: 0,
            radio_count: 0,
            control_count: 0,
            cpu_count: 0,
        }
    }

    pub fn poll<W: Write>(
        &mut self,
        w: &mut W,
        analog: Option<&AnalogData>,
        imu: Option<&ImuSample>,
        radio: Option<&RadioFrame>,
        control: Option<&ControlOutput>,
        cpu: Option<&CpuStats>,
    ) -> fmt::Result {
        // Heartbeat goes out every cycle, data or not.
        w.write_str("OK\r\n")?;

        self.analog_count += 1;
        if self.analog_count >= ANALOG_PRESCALER {
            self.analog_count = 0;
            if let Some(a) = analog {
                line(w, "DIR", a.wind_direction)?;
                line(w, "BAT", a.battery_voltage)?;
                line(w, "EX1", a.extra1)?;
                line(w, "EX2", a.extra2)?;
            }
        }

        self.imu_count += 1;
        if self.imu_count >= IMU_PRESCALER {
            self.imu_count = 0;
            if let Some(i) = imu {
                line(w, "ROL", i.roll)?;
                line(w, "PIT", i.pitch)?;
                line(w, "YAW", i.yaw)?;
                line(w, "ACX", i.accel[0])?;
                line(w, "ACY", i.accel[1])?;
                line(w, "ACZ", i.accel[2])?;
                line(w, "GYX", i.gyro[0])?;
                line(w, "GYY", i.gyro[1])?;
                line(w, "GYZ", i.gyro[2])?;
                line(w, "MGX", i.mag[0])?;
                line(w, "MGY", i.mag[1])?;
                line(w, "MGZ", i.mag[2])?;
                line(w, "SPE", i.speed)?;
            }
        }

        self.radio_count += 1;
        if self.radio_count >= RADIO_PRESCALER {
            self.radio_count = 0;
            if let Some(r) = radio {
                line(w, "RW1", r.widths[0] as f32)?;
                line(w, "RW2", r.widths[1] as f32)?;
                line(w, "RW3", r.widths[2] as f32)?;
                line(w, "RW4", r.widths[3] as f32)?;
            }
        }

        self.control_count += 1;
        if self.control_count >= CONTROL_PRESCALER {
            self.control_count = 0;
            if let Some(c) = control {
                line(w, "RUD", c.rudder)?;
                line(w, "TWI", c.twist)?;
                line(w, "TRI", c.trim)?;
            }
        }

        self.cpu_count += 1;
        if self.cpu_count >= CPU_PRESCALER {
            self.cpu_count = 0;
            if let Some(usage) = cpu.and_then(|c| c.usage_percent()) {
                line(w, "CPU", usage)?;
            }
        }

        Ok(())
    }
}

impl Default for TelemetryReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_line_round_trips_exactly() {
        let mut parser = LineParser::new();
        let cmd = parser.push_bytes(b"KPR:2.50\r\n").unwrap();
        assert_eq!(cmd, Command::KpRoll(2.5));

        let mut config = ConfigUpdate::default();
        cmd.apply(&mut config);
        assert_eq!(config.kp_roll, 2.5);
    }

    #[test]
    fn mode_value_truncates_to_integer() {
        let mut parser = LineParser::new();
        assert_eq!(parser.push_bytes(b"MOD:3.00\r\n"), Some(Command::Mode(3)));
        assert_eq!(parser.push_bytes(b"MOD:3.90\r\n"), Some(Command::Mode(3)));
        assert_eq!(parser.push_bytes(b"MOD:-1.00\r\n"), Some(Command::Mode(-1)));
    }

    #[test]
    fn unmatched_keys_are_dropped() {
        let mut parser = LineParser::new();
        assert_eq!(parser.push_bytes(b"XXX:1.00\r\n"), None);
        // And the parser keeps working afterwards.
        assert_eq!(parser.push_bytes(b"KIY:0.25\r\n"), Some(Command::KiYaw(0.25)));
    }

    #[test]
    fn splits_at_the_first_colon_only() {
        let mut parser = LineParser::new();
        // Second colon makes the value unparseable → dropped.
        assert_eq!(parser.push_bytes(b"KPR:1:2\r\n"), None);
    }

    #[test]
    fn malformed_lines_are_dropped_silently() {
        let mut parser = LineParser::new();
        assert_eq!(parser.push_bytes(b"\r\n"), None);
        assert_eq!(parser.push_bytes(b"novalue\r\n"), None);
        assert_eq!(parser.push_bytes(b"KPR:abc\r\n"), None);
        assert_eq!(parser.push_bytes(b"KPY:1.50\r\n"), Some(Command::KpYaw(1.5)));
    }

    #[test]
    fn overflow_resets_the_accumulator() {
        let mut parser = LineParser::new();
        for _ in 0..(LINE_MAX + 10) {
            assert_eq!(parser.push_byte(b'A'), None);
        }
        // The stream resynchronizes on the next complete line.
        parser.push_bytes(b"\r\n");
        assert_eq!(parser.push_bytes(b"KIR:0.10\r\n"), Some(Command::KiRoll(0.1)));
    }

    #[test]
    fn commands_fold_into_config() {
        let mut config = ConfigUpdate::default();
        Command::Mode(-1).apply(&mut config);
        Command::ServoTwist(45.0).apply(&mut config);
        Command::KiYaw(0.7).apply(&mut config);
        assert_eq!(config.mode_raw, -1);
        assert_eq!(config.twist_servo_angle, 45.0);
        assert_eq!(config.ki_yaw, 0.7);
    }

    // ── Reporter ─────────────────────────────────────────────────────────────

    fn poll_all(rep: &mut TelemetryReporter) -> String {
        let mut out = String::new();
        rep.poll(
            &mut out,
            Some(&AnalogData::default()),
            Some(&ImuSample::default()),
            Some(&RadioFrame { widths: [1500; 4] }),
            Some(&ControlOutput::default()),
            Some(&CpuStats {
                idle_time: 75,
                total_time: 100,
            }),
        )
        .unwrap();
        out
    }

    #[test]
    fn heartbeat_on_every_cycle() {
        let mut rep = TelemetryReporter::new();
        for _ in 0..7 {
            let mut out = String::new();
            rep.poll(&mut out, None, None, None, None, None).unwrap();
            assert_eq!(out, "OK\r\n");
        }
    }

    #[test]
    fn groups_fire_on_their_prescalers() {
        let mut rep = TelemetryReporter::new();
        let mut analog_cycles = Vec::<usize, 16>::new();
        let mut radio_cycles = Vec::<usize, 16>::new();
        for cycle in 1..=10 {
            let out = poll_all(&mut rep);
            // IMU group runs every cycle.
            assert!(out.contains("ROL:"));
            if out.contains("BAT:") {
                let _ = analog_cycles.push(cycle);
            }
            if out.contains("RW1:") {
                let _ = radio_cycles.push(cycle);
            }
        }
        assert_eq!(analog_cycles.as_slice(), &[5, 10]);
        assert_eq!(radio_cycles.as_slice(), &[2, 4, 6, 8, 10]);
    }

    #[test]
    fn values_are_formatted_with_two_decimals() {
        let mut rep = TelemetryReporter::new();
        let mut out = String::new();
        let imu = ImuSample {
            roll: -12.345,
            ..ImuSample::default()
        };
        rep.poll(&mut out, None, Some(&imu), None, None, None).unwrap();
        assert!(out.contains("ROL:-12.35\r\n") || out.contains("ROL:-12.34\r\n"));
    }

    #[test]
    fn cpu_usage_derives_from_idle_share() {
        let mut rep = TelemetryReporter::new();
        let mut cpu_line = String::new();
        for _ in 0..CPU_PRESCALER {
            cpu_line = poll_all(&mut rep);
        }
        // 75% idle of 100 total → 25% load.
        assert!(cpu_line.contains("CPU:25.00\r\n"), "got: {cpu_line}");
    }

    #[test]
    fn stale_groups_stay_silent() {
        let mut rep = TelemetryReporter::new();
        let mut out = String::new();
        rep.poll(&mut out, None, None, None, None, None).unwrap();
        rep.poll(&mut out, None, None, None, None, None).unwrap();
        assert!(!out.contains("RW1:"));
        assert!(!out.contains("RUD:"));
    }
}
