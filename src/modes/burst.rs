use crate::error::{BurstError, StorageError};
use crate::hardware::{DisplayPanel, FileKind, InputSource, Sensor};
use crate::storage::StorageGuardian;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Frame rate spread measured over one burst
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRateStats {
    pub min_fps: f64,
    pub avg_fps: f64,
    pub max_fps: f64,
    pub std_dev: f64,
}

impl FrameRateStats {
    /// Zero-length intervals carry no rate information and are skipped
    pub fn from_intervals(intervals: &[Duration], frames: u32, total: Duration) -> Option<Self> {
        let rates: Vec<f64> = intervals
            .iter()
            .filter(|dt| !dt.is_zero())
            .map(|dt| 1.0 / dt.as_secs_f64())
            .collect();
        if rates.is_empty() {
            return None;
        }

        let mean = rates.iter().sum::<f64>() / rates.len() as f64;
        let variance = rates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / rates.len() as f64;
        let avg_fps = if total.is_zero() {
            mean
        } else {
            frames as f64 / total.as_secs_f64()
        };

        Some(Self {
            min_fps: rates.iter().copied().fold(f64::INFINITY, f64::min),
            avg_fps,
            max_fps: rates.iter().copied().fold(0.0, f64::max),
            std_dev: variance.sqrt(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BurstReport {
    pub frames: u32,
    pub bytes: u64,
    pub elapsed: Duration,
    pub rates: Option<FrameRateStats>,
}

pub(super) struct BurstRecorder<'a> {
    pub sensor: &'a dyn Sensor,
    pub display: &'a dyn DisplayPanel,
    pub input: &'a dyn InputSource,
    pub storage: &'a StorageGuardian,
    pub min_frames: u32,
    pub frame_delay: Duration,
}

impl BurstRecorder<'_> {
    /// Record until the shutter is released, but never fewer than
    /// `min_frames`. The file is closed on every exit path.
    pub async fn record(&self) -> Result<BurstReport, BurstError> {
        let mut sink = self.storage.open_sequential(FileKind::Gif).await?;
        self.display.set_status("RECORDING").await;

        let started = Instant::now();
        let mut last = started;
        let mut intervals = Vec::new();
        let mut frames = 0u32;

        let failure = loop {
            let frame = match self.sensor.capture_frame().await {
                Ok(frame) => frame,
                Err(e) => break Some(BurstError::Sensor(e)),
            };

            let appended = self
                .storage
                .append_frame(sink.as_mut(), &frame, self.frame_delay)
                .await;
            if let Err(e) = appended {
                break Some(BurstError::Storage(e));
            }
            frames += 1;
            self.display.render(&frame).await;

            let now = Instant::now();
            intervals.push(now - last);
            last = now;

            if frames >= self.min_frames && !self.input.shutter_held().await {
                break None;
            }
        };

        let closed = sink.finish().await;
        let elapsed = started.elapsed();

        if let Some(e) = failure {
            warn!("Burst aborted after {} frames: {}", frames, e);
            if let Err(close_err) = closed {
                warn!("Closing partial burst file failed: {}", close_err);
            }
            return Err(e);
        }

        let bytes = closed.map_err(|e| BurstError::Storage(StorageError::IoFailure(e)))?;
        let report = BurstReport {
            frames,
            bytes,
            elapsed,
            rates: FrameRateStats::from_intervals(&intervals, frames, elapsed),
        };
        match &report.rates {
            Some(r) => info!(
                "Burst: {} frames, {} bytes in {:?} ({:.1} fps avg, {:.1}-{:.1}, sd {:.2})",
                frames, bytes, elapsed, r.avg_fps, r.min_fps, r.max_fps, r.std_dev
            ),
            None => info!("Burst: {} frames, {} bytes in {:?}", frames, bytes, elapsed),
        }
        Ok(report)
    }
}
