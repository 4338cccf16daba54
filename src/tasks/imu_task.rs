//! IMU acquisition task, 100 Hz once the sensor is up. Publishes each
//! snapshot to the control loop (with its health flag) and to telemetry.

use embassy_time::{Duration, Instant, Ticker, Timer};

use crate::drivers::imu::{build_sample, ImuSensor, SpeedEstimator};
use crate::state::{ImuSample, ImuUpdate};
use crate::Mailbox;

/// Settle time before (re-)initializing the sensor.
const INIT_BACKOFF_MS: u64 = 1000;

pub async fn imu_task<S: ImuSensor>(
    mut sensor: S,
    ctrl_tx: &'static Mailbox<ImuUpdate>,
    tel_tx: &'static Mailbox<ImuSample>,
) {
    let mut estimator = SpeedEstimator::new();
    let mut initialized = false;

    let mut ticker = Ticker::every(Duration::from_millis(super::IMU_PERIOD_MS));
    loop {
        ticker.next().await;

        if !initialized {
            Timer::after(Duration::from_millis(INIT_BACKOFF_MS)).await;
            initialized = sensor.init().await.is_ok();
            continue;
        }

        match sensor.read().await {
            Ok(reading) => {
                let speed = estimator.update(Instant::now().as_millis(), reading.accel);
                let sample = build_sample(&reading, speed);
                ctrl_tx.signal(ImuUpdate {
                    sample,
                    healthy: true,
                });
                tel_tx.signal(sample);
            }
            Err(_) => {
                // Flag the dropout and fall back to the init path; the
                // control engine keeps its last snapshot meanwhile.
                initialized = false;
                ctrl_tx.signal(ImuUpdate {
                    sample: ImuSample::default(),
                    healthy: false,
                });
            }
        }
    }
}
