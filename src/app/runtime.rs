use super::{LapsecamOrchestrator, ShutdownReason};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, trace};

/// Minimum time between diagnostics reports
const DIAGNOSTICS_INTERVAL: Duration = Duration::from_secs(300);

impl LapsecamOrchestrator {
    /// Run the control loop until a signal or the quit key cancels it
    pub async fn run(&mut self) -> Result<ShutdownReason> {
        info!("lapsecam is running");
        self.setup_signal_handlers();

        let token = self.cancellation_token.clone();
        let interval = self.config.ui.loop_interval();

        while !token.is_cancelled() {
            self.step(Instant::now()).await;

            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(interval) => {}
            }
        }

        let reason = self
            .shutdown_reason
            .lock()
            .take()
            .unwrap_or(ShutdownReason::UserRequest);
        info!("Shutdown initiated: {:?}", reason);
        Ok(reason)
    }

    /// One loop iteration: poll input, check the link, render, then act
    pub async fn step(&mut self, now: Instant) {
        let events = self.devices.input.poll().await;
        if events.any() {
            trace!("Input: {:?}", events);
        }

        self.link.poll_health(now).await;
        self.report_diagnostics(now);
        self.modes.render(now).await;
        self.modes.handle_events(events, now).await;
    }

    /// Log buffer and counter usage, at most once per diagnostics interval.
    /// Returns whether a report was written.
    pub fn report_diagnostics(&self, now: Instant) -> bool {
        {
            let mut last = self.last_report.lock();
            if let Some(previous) = *last {
                if now.saturating_duration_since(previous) < DIAGNOSTICS_INTERVAL {
                    return false;
                }
            }
            *last = Some(now);
        }

        let stats = self.pipeline.stats();
        debug!(
            "Diagnostics: retained frame {} bytes, {} reclaim passes, {} captures ({} failed), link {:?}, storage {:?}",
            self.pipeline.retained_bytes(),
            stats.reclaim_passes,
            stats.captures,
            stats.failed,
            self.link.state(),
            self.storage.state()
        );
        true
    }

    fn setup_signal_handlers(&self) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let token = self.cancellation_token.clone();
            let reason = Arc::clone(&self.shutdown_reason);
            tokio::spawn(async move {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        tokio::select! {
                            _ = sigterm.recv() => {
                                info!("Received SIGTERM signal");
                                reason.lock().get_or_insert(ShutdownReason::Signal("SIGTERM".to_string()));
                                token.cancel();
                            }
                            _ = token.cancelled() => {}
                        }
                    }
                    Err(e) => error!("Failed to register SIGTERM handler: {}", e),
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let token = self.cancellation_token.clone();
        let reason = Arc::clone(&self.shutdown_reason);
        tokio::spawn(async move {
            tokio::select! {
                result = signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("Received SIGINT signal (Ctrl+C)");
                        reason.lock().get_or_insert(ShutdownReason::Signal("SIGINT".to_string()));
                        token.cancel();
                    }
                }
                _ = token.cancelled() => {}
            }
        });
    }
}
