use super::{ComponentState, LapsecamOrchestrator};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl LapsecamOrchestrator {
    /// Restore automatic exposure and release the card. Returns the exit code.
    pub async fn shutdown(&mut self) -> i32 {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        self.set_component_state("modes", ComponentState::Stopping);
        if timeout(STOP_TIMEOUT, self.modes.shutdown()).await.is_ok() {
            self.set_component_state("modes", ComponentState::Stopped);
        } else {
            error!("modes component stop timeout");
            self.set_component_state("modes", ComponentState::Failed);
            exit_code = 1;
        }

        self.set_component_state("storage", ComponentState::Stopping);
        if timeout(STOP_TIMEOUT, self.storage.release()).await.is_ok() {
            self.set_component_state("storage", ComponentState::Stopped);
        } else {
            error!("storage component stop timeout");
            self.set_component_state("storage", ComponentState::Failed);
            exit_code = 1;
        }

        self.set_component_state("link", ComponentState::Stopped);
        debug!("Component states at exit: {:?}", self.get_all_component_states());

        let stats = self.pipeline.stats();
        info!(
            "Session: {} captures, {} delivered, {} local only, {} failed ({:.0}% delivered), {} reconnect attempts",
            stats.captures,
            stats.delivered,
            stats.local_only,
            stats.failed,
            stats.delivery_success_rate() * 100.0,
            self.link.connect_attempts()
        );

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        exit_code
    }
}
