use super::{ComponentState, LapsecamOrchestrator};
use crate::connectivity::probe_internet;
use crate::error::Result;
use crate::hardware::Color;
use crate::storage::StorageState;
use tracing::{info, warn};

impl LapsecamOrchestrator {
    /// Bring the link up, check reachability and mount a card already
    /// inserted at boot. Only a configured reconnect watchdog can make
    /// the link step give up, and even then the camera keeps running.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting lapsecam");

        self.set_component_state("link", ComponentState::Starting);
        self.devices.radio.enable(true).await;
        match self.link.ensure_connected().await {
            Ok(()) => {
                let network = &self.config.network;
                if probe_internet(&network.probe_addr, network.probe_timeout()).await {
                    info!("Internet reachable via {}", network.probe_addr);
                    self.set_component_state("link", ComponentState::Running);
                } else {
                    warn!(
                        "Wi-Fi up but {} unreachable; uploads may fail until it recovers",
                        network.probe_addr
                    );
                    self.devices
                        .display
                        .show_message("No Internet", Color::Red)
                        .await;
                    self.set_component_state("link", ComponentState::Degraded);
                }
            }
            Err(e) => {
                warn!("Starting without a network link: {}", e);
                self.set_component_state("link", ComponentState::Degraded);
            }
        }

        self.set_component_state("storage", ComponentState::Starting);
        let storage_state = match self.storage.detect_at_startup().await {
            StorageState::MountFailed => ComponentState::Degraded,
            _ => ComponentState::Running,
        };
        self.set_component_state("storage", storage_state);

        self.devices
            .display
            .set_status(self.modes.mode().label())
            .await;
        self.set_component_state("modes", ComponentState::Running);

        info!("lapsecam started in {:?} mode", self.modes.mode());
        Ok(())
    }
}
