use super::SimControls;
use crate::error::EncodeError;
use crate::frame::{luma, rgb8_to_rgb565, Frame};
use crate::hardware::{ExposureSettings, Sensor, SensorSettings};
use crate::modes::{EFFECTS, RESOLUTIONS};
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const JPEG_QUALITY: u8 = 85;

/// Synthetic sensor: a drifting colour gradient, JPEG-encoded with `image`
pub struct SimSensor {
    width: u32,
    height: u32,
    controls: Arc<SimControls>,
    frame_counter: AtomicU64,
    settings: Mutex<SensorSettings>,
    locked: Mutex<Option<ExposureSettings>>,
}

impl SimSensor {
    pub fn new((width, height): (u32, u32), controls: Arc<SimControls>) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            controls,
            frame_counter: AtomicU64::new(0),
            settings: Mutex::new(SensorSettings::default()),
            locked: Mutex::new(None),
        }
    }

    fn synthesize(&self, id: u64) -> Frame {
        let effect = EFFECTS.get(self.settings.lock().effect).copied().unwrap_or("Normal");
        let drift = (id % 256) as u32;
        let (w, h) = (self.width, self.height);

        let pixels = (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .map(|(x, y)| {
                let r = ((x * 255 / w + drift) % 256) as u8;
                let g = (y * 255 / h) as u8;
                let b = ((drift * 3) % 256) as u8;
                let px = rgb8_to_rgb565([r, g, b]);
                match effect {
                    "Invert" => !px,
                    "B&W" => {
                        let l = luma(px);
                        rgb8_to_rgb565([l, l, l])
                    }
                    _ => px,
                }
            })
            .collect();

        Frame::new(id, w, h, pixels)
    }
}

#[async_trait]
impl Sensor for SimSensor {
    async fn capture_frame(&self) -> Result<Frame, EncodeError> {
        let id = self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(self.synthesize(id))
    }

    async fn encode_jpeg(&self, frame: &Frame) -> Result<Bytes, EncodeError> {
        if self.controls.encoder_fault() {
            return Err(EncodeError::Hardware {
                details: "simulated encoder fault".to_string(),
            });
        }

        let rgb = RgbImage::from_raw(frame.width, frame.height, frame.to_rgb8()).ok_or_else(|| {
            EncodeError::Hardware {
                details: format!("frame {} has a short pixel buffer", frame.id),
            }
        })?;

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
            .encode_image(&DynamicImage::ImageRgb8(rgb))
            .map_err(|e| EncodeError::Hardware {
                details: e.to_string(),
            })?;

        debug!("Encoded frame {} to {} bytes", frame.id, buf.len());
        Ok(Bytes::from(buf))
    }

    async fn autofocus(&self) -> bool {
        info!("Autofocus cycle");
        true
    }

    async fn auto_settings(&self) -> Result<ExposureSettings, EncodeError> {
        let drift = (self.frame_counter.load(Ordering::Relaxed) % 64) as u32;
        Ok(ExposureSettings {
            exposure: 400 + drift,
            gain: 8,
            white_balance: 5000 + drift * 10,
        })
    }

    async fn lock_exposure(&self, settings: &ExposureSettings) {
        info!(
            "Exposure locked: exposure={} gain={} wb={}",
            settings.exposure, settings.gain, settings.white_balance
        );
        *self.locked.lock() = Some(*settings);
    }

    async fn restore_auto_exposure(&self) {
        info!("Exposure back on automatic control");
        self.locked.lock().take();
    }

    async fn apply_settings(&self, settings: &SensorSettings) {
        info!(
            "Sensor settings: resolution {} effect {}",
            RESOLUTIONS.get(settings.resolution).copied().unwrap_or("?"),
            EFFECTS.get(settings.effect).copied().unwrap_or("?")
        );
        *self.settings.lock() = *settings;
    }

    async fn reclaim_buffers(&self) {
        debug!("Reclaiming encoder buffers");
    }
}
