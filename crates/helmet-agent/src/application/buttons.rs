//! Debouncing of the single hardware button.
//!
//! The wearer signals with bursts of clicks; a burst ends after a quiet
//! window with no further press. Only then is the count delivered, once,
//! and the counter starts over.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::state_machine::Trigger;

/// Quiet time that ends a click burst.
pub const CLICK_WINDOW: Duration = Duration::from_secs(2);

pub struct ClickAccumulator {
    window: Duration,
}

impl Default for ClickAccumulator {
    fn default() -> Self {
        Self {
            window: CLICK_WINDOW,
        }
    }
}

impl ClickAccumulator {
    pub fn with_window(window: Duration) -> Self {
        Self { window }
    }

    /// Consumes raw presses and delivers one `Trigger::Clicks(n)` per
    /// burst. Returns when the press channel closes, flushing a pending
    /// burst first.
    pub async fn run(self, mut presses: mpsc::Receiver<()>, triggers: mpsc::Sender<Trigger>) {
        loop {
            // Wait for the first press of a burst.
            if presses.recv().await.is_none() {
                return;
            }
            let mut clicks: u32 = 1;

            loop {
                match tokio::time::timeout(self.window, presses.recv()).await {
                    Ok(Some(())) => {
                        clicks += 1;
                        debug!(clicks, "click");
                    }
                    Ok(None) => {
                        let _ = triggers.send(Trigger::Clicks(clicks)).await;
                        return;
                    }
                    Err(_) => {
                        info!(clicks, "click burst complete");
                        if triggers.send(Trigger::Clicks(clicks)).await.is_err() {
                            return;
                        }
                        break;
                    }
                }
            }
        }
    }
}
