#![cfg_attr(not(test), no_std)]

//! Onboard controller for an RC sailboat.
//!
//! Reads radio PWM commands and IMU/analog sensors, runs a mode-dispatched
//! PI control loop and drives the rudder/trim/twist/extra servos, with a
//! key:value telemetry link for monitoring and remote tuning.
//!
//! Hardware access (timer capture, PWM timers, the IMU bus, the UART) stays
//! behind the traits in the driver modules; board glue owns the peripherals
//! and spawns the task loops in `tasks`.

pub mod control;
pub mod drivers;
pub mod state;
pub mod tasks;
pub mod telemetry;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

// ── Inter-task mailboxes ──────────────────────────────────────────────────────
//  Single-slot, latest value wins: a producer signaling a full slot replaces
//  the unread value, so consumers may skip samples but never see stale ones
//  ahead of fresh ones.

pub type Mailbox<T> = Signal<CriticalSectionRawMutex, T>;
