//! Workstation stand-ins for the camera hardware.
//!
//! Frames are synthesized, the card is a directory, the feed is an outbox
//! directory and the buttons are keys. `SimControls` is the shared switch
//! panel the keyboard flips to inject faults while the loop runs.

mod card;
mod display;
mod feed;
mod keyboard;
mod radio;
mod sensor;

pub use card::{DirectoryCard, GifFileSink};
pub use display::{LogDisplay, LogIndicator};
pub use feed::OutboxFeed;
pub use keyboard::KeyboardInput;
pub use radio::SimRadio;
pub use sensor::SimSensor;

use crate::app::Devices;
use crate::config::LapsecamConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Fault switches shared between the keyboard and the simulated devices
#[derive(Debug)]
pub struct SimControls {
    wifi_available: AtomicBool,
    card_present: AtomicBool,
    encoder_fault: AtomicBool,
}

impl Default for SimControls {
    fn default() -> Self {
        Self {
            wifi_available: AtomicBool::new(true),
            card_present: AtomicBool::new(true),
            encoder_fault: AtomicBool::new(false),
        }
    }
}

impl SimControls {
    pub fn wifi_available(&self) -> bool {
        self.wifi_available.load(Ordering::SeqCst)
    }

    pub fn set_wifi_available(&self, available: bool) {
        self.wifi_available.store(available, Ordering::SeqCst);
    }

    pub fn card_present(&self) -> bool {
        self.card_present.load(Ordering::SeqCst)
    }

    pub fn set_card_present(&self, present: bool) {
        self.card_present.store(present, Ordering::SeqCst);
    }

    pub fn encoder_fault(&self) -> bool {
        self.encoder_fault.load(Ordering::SeqCst)
    }

    /// Flip the encoder fault switch, returning the new state
    pub fn toggle_encoder_fault(&self) -> bool {
        !self.encoder_fault.fetch_xor(true, Ordering::SeqCst)
    }
}

/// Build the full simulated device set; the keyboard is returned separately
/// so the caller can start it once the terminal is ready.
pub fn simulated_devices(
    config: &LapsecamConfig,
    token: CancellationToken,
) -> (Devices, Arc<KeyboardInput>) {
    let controls = Arc::new(SimControls::default());
    let radio = Arc::new(SimRadio::new(Arc::clone(&controls)));
    let keyboard = Arc::new(KeyboardInput::new(
        Arc::clone(&controls),
        Arc::clone(&radio),
        token,
    ));

    let devices = Devices {
        sensor: Arc::new(SimSensor::new(config.camera.resolution, Arc::clone(&controls))),
        display: Arc::new(LogDisplay::default()),
        radio,
        feed: Arc::new(OutboxFeed::new(&config.feed.outbox_path, Arc::clone(&controls))),
        card: Arc::new(DirectoryCard::new(&config.storage.card_path, Arc::clone(&controls))),
        input: keyboard.clone(),
        indicator: Arc::new(LogIndicator),
    };

    (devices, keyboard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_fault_toggles() {
        let controls = SimControls::default();
        assert!(!controls.encoder_fault());
        assert!(controls.toggle_encoder_fault());
        assert!(controls.encoder_fault());
        assert!(!controls.toggle_encoder_fault());
    }
}
