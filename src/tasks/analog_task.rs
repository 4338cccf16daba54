//! Analog acquisition task, 100 Hz. Feeds telemetry only.

use embassy_time::{Duration, Ticker};

use crate::drivers::analog::{AnalogConditioner, AnalogSource};
use crate::state::AnalogData;
use crate::Mailbox;

pub async fn analog_task<S: AnalogSource>(mut source: S, tel_tx: &'static Mailbox<AnalogData>) {
    let mut conditioner = AnalogConditioner::new();

    let mut ticker = Ticker::every(Duration::from_millis(super::ANALOG_PERIOD_MS));
    loop {
        ticker.next().await;
        // A failed conversion is just a skipped sample.
        if let Ok(raw) = source.read().await {
            tel_tx.signal(conditioner.convert(raw));
        }
    }
}
