//! Task loops. Each runs forever at a fixed period and talks to the others
//! only through single-slot mailboxes; the board glue owns the peripherals,
//! implements the driver seams and spawns these on the executor.

pub mod analog_task;
pub mod command_task;
pub mod control_task;
pub mod imu_task;
pub mod telemetry_task;

// Per-task iteration periods.
pub const CONTROL_PERIOD_MS: u64 = 10;
pub const IMU_PERIOD_MS: u64 = 10;
pub const ANALOG_PERIOD_MS: u64 = 10;
pub const TELEMETRY_PERIOD_MS: u64 = 500;
