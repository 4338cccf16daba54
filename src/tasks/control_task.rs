//! The control loop, 100 Hz: the only task that touches actuators, mode
//! state and calibration bounds.

use embassy_time::{Duration, Instant, Ticker};

use crate::control::{ControlEngine, CycleOutcome};
use crate::drivers::radio::CalibrationStore;
use crate::drivers::servo::{PwmSink, ServoBank};
use crate::state::{ConfigUpdate, ControlOutput, ImuUpdate, RadioFrame};
use crate::Mailbox;

/// Full restart of the controller, the action behind a remote `MOD:5`.
pub trait SystemReset {
    fn system_reset(&mut self) -> !;
}

/// Per iteration, in fixed order: drain at most one config update (Reset
/// short-circuits), drain the latest radio frame and IMU sample, run the
/// engine, drive the servos, publish the control output for telemetry.
pub async fn control_task<P, S, R>(
    mut servos: ServoBank<P>,
    mut store: S,
    mut reset: R,
    config_rx: &'static Mailbox<ConfigUpdate>,
    radio_rx: &'static Mailbox<RadioFrame>,
    imu_rx: &'static Mailbox<ImuUpdate>,
    control_tx: &'static Mailbox<ControlOutput>,
) where
    P: PwmSink,
    S: CalibrationStore,
    R: SystemReset,
{
    // A blank or unreadable store just means starting uncalibrated.
    let calibration = match store.load() {
        Ok(Some(cal)) => cal,
        _ => Default::default(),
    };
    let mut engine = ControlEngine::with_calibration(calibration);

    let mut ticker = Ticker::every(Duration::from_millis(super::CONTROL_PERIOD_MS));
    loop {
        ticker.next().await;

        let outcome = engine.cycle(
            Instant::now().as_millis(),
            config_rx.try_take(),
            radio_rx.try_take(),
            imu_rx.try_take(),
        );

        match outcome {
            CycleOutcome::Reset => reset.system_reset(),
            CycleOutcome::Calibrate(ovr) => {
                servos.set_servo_rudder(ovr.rudder);
                servos.set_servo_twist(ovr.twist);
                servos.set_servo_trim(ovr.trim);
                servos.set_servo_extra(ovr.extra);
            }
            CycleOutcome::Drive(out) => {
                servos.set_rudder(out.rudder);
                servos.set_twist(out.twist);
                servos.set_trim(out.trim);
                servos.set_extra(out.extra);
                control_tx.signal(out);
            }
            CycleOutcome::Disabled => servos.disable_all(),
        }

        // Persist the calibration once per edit session, on leaving
        // Calibration mode. A failed save keeps the in-RAM bounds.
        if let Some(cal) = engine.take_calibration_to_save() {
            let _ = store.save(&cal);
        }
    }
}
