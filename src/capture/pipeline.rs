use super::stats::{CaptureCounters, CaptureStats};
use crate::config::{DeliveryConfig, FeedConfig};
use crate::connectivity::ConnectivityMonitor;
use crate::error::DeliveryError;
use crate::frame::Frame;
use crate::hardware::{FeedClient, FeedPayload, FileKind, Sensor};
use crate::recovery::{Backoff, BackoffPolicy};
use crate::storage::StorageGuardian;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Terminal result of one capture event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Uploaded to the primary feed
    Delivered,
    /// Upload failed but a copy is on the SD card
    CapturedLocalOnly,
    /// Nothing usable came out of this capture
    CaptureFailed,
}

impl CaptureOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CaptureOutcome::CaptureFailed)
    }
}

/// In-flight upload of one payload; dropped after success or exhaustion
#[derive(Debug)]
pub struct UploadAttempt {
    pub payload: Bytes,
    backoff: Backoff,
}

impl UploadAttempt {
    fn new(payload: Bytes, policy: BackoffPolicy) -> Self {
        Self {
            payload,
            backoff: policy.start(),
        }
    }

    pub fn retries_used(&self) -> u32 {
        self.backoff.retries_used()
    }

    pub fn next_delay(&self) -> Duration {
        self.backoff.peek()
    }

    fn consume_delay(&mut self) -> Duration {
        self.backoff.next_delay()
    }
}

/// Snap -> encode -> (save) -> deliver -> notify
pub struct CaptureDeliveryPipeline {
    sensor: Arc<dyn Sensor>,
    feed: Arc<dyn FeedClient>,
    link: Arc<ConnectivityMonitor>,
    storage: Arc<StorageGuardian>,
    camera_feed: String,
    trigger_feed: String,
    max_attempts: u32,
    backoff: BackoffPolicy,
    reclaim_every: u64,
    save_local: bool,
    counters: CaptureCounters,
    last_capture: Mutex<Option<Frame>>,
}

impl CaptureDeliveryPipeline {
    pub fn new(
        sensor: Arc<dyn Sensor>,
        feed: Arc<dyn FeedClient>,
        link: Arc<ConnectivityMonitor>,
        storage: Arc<StorageGuardian>,
        feed_config: &FeedConfig,
        config: &DeliveryConfig,
    ) -> Self {
        Self {
            sensor,
            feed,
            link,
            storage,
            camera_feed: feed_config.camera_feed.clone(),
            trigger_feed: feed_config.trigger_feed.clone(),
            max_attempts: config.max_attempts.max(1),
            backoff: BackoffPolicy::new(config.base_delay(), config.max_delay()),
            reclaim_every: config.reclaim_every.max(1),
            save_local: config.save_local,
            counters: CaptureCounters::default(),
            last_capture: Mutex::new(None),
        }
    }

    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    /// Most recently captured frame, kept for onion-skin previews
    pub fn last_capture(&self) -> Option<Frame> {
        self.last_capture.lock().clone()
    }

    /// Bytes held by the retained onion-skin frame
    pub fn retained_bytes(&self) -> usize {
        self.last_capture
            .lock()
            .as_ref()
            .map_or(0, |frame| frame.pixels.len() * std::mem::size_of::<u16>())
    }

    pub fn clear_last_capture(&self) {
        self.last_capture.lock().take();
    }

    pub async fn capture_and_deliver(&self) -> CaptureOutcome {
        let capture_id = Uuid::new_v4();
        let outcome = self
            .run_capture()
            .instrument(info_span!("capture", id = %capture_id))
            .await;

        match outcome {
            CaptureOutcome::Delivered => CaptureCounters::bump(&self.counters.delivered),
            CaptureOutcome::CapturedLocalOnly => CaptureCounters::bump(&self.counters.local_only),
            CaptureOutcome::CaptureFailed => CaptureCounters::bump(&self.counters.failed),
        };

        let captures = CaptureCounters::bump(&self.counters.captures);
        if captures % self.reclaim_every == 0 {
            debug!("Reclaiming encoder buffers after {} captures", captures);
            self.sensor.reclaim_buffers().await;
            CaptureCounters::bump(&self.counters.reclaim_passes);
        }

        info!("Capture {} finished: {:?}", captures, outcome);
        outcome
    }

    async fn run_capture(&self) -> CaptureOutcome {
        // Deliberate stall: a capture taken now should be deliverable
        let link_ready = match self.link.ensure_connected().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Capturing without a link: {}", e);
                false
            }
        };

        let frame = match self.sensor.capture_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                error!("Capture failed: {}", e);
                return CaptureOutcome::CaptureFailed;
            }
        };

        let jpeg = match self.sensor.encode_jpeg(&frame).await {
            Ok(jpeg) => jpeg,
            Err(e) => {
                error!("JPEG encode failed: {}", e);
                return CaptureOutcome::CaptureFailed;
            }
        };
        *self.last_capture.lock() = Some(frame);
        debug!("Encoded capture ({} bytes)", jpeg.len());

        let saved_locally = self.save_locally(&jpeg).await;

        if !link_ready {
            return Self::undelivered(saved_locally);
        }

        let mut attempt = UploadAttempt::new(jpeg, self.backoff);
        match self.deliver(&mut attempt).await {
            Ok(()) => {
                self.notify_trigger().await;
                CaptureOutcome::Delivered
            }
            Err(e) => {
                error!(
                    "Upload abandoned after {} attempts: {}",
                    attempt.retries_used() + 1,
                    e
                );
                Self::undelivered(saved_locally)
            }
        }
    }

    fn undelivered(saved_locally: bool) -> CaptureOutcome {
        if saved_locally {
            CaptureOutcome::CapturedLocalOnly
        } else {
            CaptureOutcome::CaptureFailed
        }
    }

    async fn save_locally(&self, jpeg: &Bytes) -> bool {
        if !self.save_local {
            return false;
        }

        match self.storage.save_sequential(FileKind::Jpeg, jpeg).await {
            Ok(path) => {
                info!("Saved capture to {}", path.display());
                true
            }
            Err(e) => {
                warn!("Local save skipped: {}", e);
                false
            }
        }
    }

    async fn deliver(&self, attempt: &mut UploadAttempt) -> Result<(), DeliveryError> {
        loop {
            if self.link.ensure_connected().await.is_err() {
                return Err(DeliveryError::LinkDown);
            }

            if attempt.retries_used() > 0 {
                info!(
                    "Retrying upload (attempt {}/{})",
                    attempt.retries_used() + 1,
                    self.max_attempts
                );
            }

            CaptureCounters::bump(&self.counters.delivery_attempts);
            let payload = FeedPayload::Jpeg(attempt.payload.clone());
            match self.feed.send(&self.camera_feed, payload).await {
                Ok(()) => {
                    info!("Upload to '{}' succeeded", self.camera_feed);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Upload failed: {}", e);
                    // no backoff after the final attempt
                    if attempt.retries_used() + 1 >= self.max_attempts {
                        return Err(e);
                    }
                    let delay = attempt.consume_delay();
                    debug!("Next upload attempt in {:?}", delay);
                    sleep(delay).await;
                }
            }
        }
    }

    /// Best effort; the image is already on the feed
    async fn notify_trigger(&self) {
        match self.feed.send(&self.trigger_feed, FeedPayload::Value(1)).await {
            Ok(()) => debug!("Trigger sent to '{}'", self.trigger_feed),
            Err(e) => {
                CaptureCounters::bump(&self.counters.trigger_failures);
                warn!("Trigger notification failed: {}", e);
            }
        }
    }
}
