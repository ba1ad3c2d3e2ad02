use super::SimControls;
use crate::error::RadioError;
use crate::hardware::Radio;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const JOIN_TIME: Duration = Duration::from_millis(300);

/// Wi-Fi radio whose access point can be switched off from the keyboard
pub struct SimRadio {
    controls: Arc<SimControls>,
    enabled: AtomicBool,
    joined: AtomicBool,
}

impl SimRadio {
    pub fn new(controls: Arc<SimControls>) -> Self {
        Self {
            controls,
            enabled: AtomicBool::new(true),
            joined: AtomicBool::new(false),
        }
    }

    /// Toggle access point availability; going away drops the association
    pub fn toggle_access_point(&self) -> bool {
        let available = !self.controls.wifi_available();
        self.controls.set_wifi_available(available);
        if !available {
            self.joined.store(false, Ordering::SeqCst);
            warn!("Simulated access point went away");
        } else {
            info!("Simulated access point is back");
        }
        available
    }
}

#[async_trait]
impl Radio for SimRadio {
    async fn connected(&self) -> bool {
        self.joined.load(Ordering::SeqCst) && self.controls.wifi_available()
    }

    async fn connect(&self, ssid: &str, _password: &str) -> Result<(), RadioError> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(RadioError::Disabled);
        }

        sleep(JOIN_TIME).await;
        if !self.controls.wifi_available() {
            return Err(RadioError::ConnectFailed {
                ssid: ssid.to_string(),
                details: "no beacon".to_string(),
            });
        }

        self.joined.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn enable(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.joined.store(false, Ordering::SeqCst);
        }
    }
}
