//! Telemetry task, 2 Hz: drains the export mailboxes, formats the
//! prescaled key:value groups plus the heartbeat, pushes the batch out
//! over the serial link.

use embassy_time::{Duration, Ticker};
use heapless::String;

use crate::state::{AnalogData, ControlOutput, CpuStats, ImuSample, RadioFrame};
use crate::telemetry::TelemetryReporter;
use crate::Mailbox;

/// Outbound half of the ground-link UART.
pub trait TelemetrySink {
    type Error;

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Upper bound for one cycle's worth of lines (heartbeat + all groups).
const BATCH_CAPACITY: usize = 512;

pub async fn telemetry_task<S: TelemetrySink>(
    mut sink: S,
    analog_rx: &'static Mailbox<AnalogData>,
    imu_rx: &'static Mailbox<ImuSample>,
    radio_rx: &'static Mailbox<RadioFrame>,
    control_rx: &'static Mailbox<ControlOutput>,
    cpu_rx: &'static Mailbox<CpuStats>,
) {
    let mut reporter = TelemetryReporter::new();

    let mut ticker = Ticker::every(Duration::from_millis(super::TELEMETRY_PERIOD_MS));
    loop {
        ticker.next().await;

        let analog = analog_rx.try_take();
        let imu = imu_rx.try_take();
        let radio = radio_rx.try_take();
        let control = control_rx.try_take();
        let cpu = cpu_rx.try_take();

        let mut batch: String<BATCH_CAPACITY> = String::new();
        let _ = reporter.poll(
            &mut batch,
            analog.as_ref(),
            imu.as_ref(),
            radio.as_ref(),
            control.as_ref(),
            cpu.as_ref(),
        );

        // Link errors are absorbed; the ground station notices via the
        // missing heartbeat.
        let _ = sink.write_all(batch.as_bytes()).await;
    }
}
