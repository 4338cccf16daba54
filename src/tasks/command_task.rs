//! Inbound command task: blocks on the ground-link RX, feeds bytes
//! through the line parser and re-signals the assembled config to the
//! control loop after every batch.

use crate::state::ConfigUpdate;
use crate::telemetry::LineParser;
use crate::Mailbox;

/// Inbound half of the ground-link UART.
pub trait CommandSource {
    type Error;

    /// Read whatever is available, blocking until at least one byte
    /// arrives.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

pub async fn command_task<S: CommandSource>(
    mut source: S,
    config_tx: &'static Mailbox<ConfigUpdate>,
) {
    let mut parser = LineParser::new();
    let mut config = ConfigUpdate::default();
    let mut buf = [0u8; 32];

    loop {
        let n = match source.read(&mut buf).await {
            Ok(n) => n,
            // Read errors (framing noise, overruns) drop the bytes.
            Err(_) => continue,
        };

        for &byte in &buf[..n] {
            if let Some(cmd) = parser.push_byte(byte) {
                cmd.apply(&mut config);
            }
        }

        if n > 0 {
            config_tx.signal(config);
        }
    }
}
