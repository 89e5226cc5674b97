//! Line-Based Hardware Event Source
//!
//! Stands in for the GPIO edge callbacks: each input line is one event.
//!
//! | Line | Event                          |
//! |------|--------------------------------|
//! | `0`  | `ButtonPressed(Sw0)`           |
//! | `1`  | `ButtonPressed(Sw1)`           |
//! | `2`  | `ButtonPressed(Sw2)`           |
//! | `m`  | `MotionDetected { pin: 17 }`   |
//!
//! A GPIO helper can feed the daemon through a pipe with the same protocol.

use panel_core::{Button, HardwareEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// GPIO pin of the PIR motion sensor
pub const MOTION_PIN: u8 = 17;

/// Parse one input line
pub fn parse_event(line: &str) -> Option<HardwareEvent> {
    match line.trim() {
        "0" => Some(HardwareEvent::ButtonPressed(Button::Sw0)),
        "1" => Some(HardwareEvent::ButtonPressed(Button::Sw1)),
        "2" => Some(HardwareEvent::ButtonPressed(Button::Sw2)),
        "m" | "M" => Some(HardwareEvent::MotionDetected { pin: MOTION_PIN }),
        _ => None,
    }
}

/// Forward events read from `reader` until EOF or until the consumer is gone
///
/// Returns the number of events forwarded.
pub async fn read_events<R>(reader: R, events: mpsc::Sender<HardwareEvent>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(event) = parse_event(&line) else {
                    debug!(line = %line.trim(), "Ignoring unknown input");
                    continue;
                };
                if events.send(event).await.is_err() {
                    warn!("Event consumer gone, stopping input");
                    break;
                }
                forwarded += 1;
            }
            Ok(None) => {
                info!(forwarded, "Input closed, buttons unavailable");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read input, buttons unavailable");
                break;
            }
        }
    }

    forwarded
}
