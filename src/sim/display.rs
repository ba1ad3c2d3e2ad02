use crate::frame::{luma, Frame};
use crate::hardware::{Color, DisplayPanel, Indicator};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, trace};

/// Log one summary line per this many rendered frames
const RENDER_LOG_EVERY: u64 = 50;

#[derive(Debug, Default)]
struct PanelState {
    frames: u64,
    brightness: Option<f32>,
    status: String,
}

/// Display that reports what it would draw through tracing
#[derive(Debug, Default)]
pub struct LogDisplay {
    state: Mutex<PanelState>,
}

impl LogDisplay {
    pub fn frames_rendered(&self) -> u64 {
        self.state.lock().frames
    }
}

fn mean_luma(frame: &Frame) -> u8 {
    if frame.pixels.is_empty() {
        return 0;
    }
    let total: u64 = frame.pixels.iter().map(|px| luma(*px) as u64).sum();
    (total / frame.pixels.len() as u64) as u8
}

#[async_trait]
impl DisplayPanel for LogDisplay {
    async fn render(&self, frame: &Frame) {
        let mut state = self.state.lock();
        state.frames += 1;
        trace!("Render frame {}", frame.id);
        if state.frames % RENDER_LOG_EVERY == 0 {
            debug!(
                "Rendered {} frames (latest {} {}x{}, mean luma {}, status '{}')",
                state.frames,
                frame.id,
                frame.width,
                frame.height,
                mean_luma(frame),
                state.status
            );
        }
    }

    async fn show_message(&self, text: &str, color: Color) {
        info!("[display #{:06X}] {}", color.rgb(), text.replace('\n', " / "));
    }

    async fn set_brightness(&self, level: f32) {
        let mut state = self.state.lock();
        if state.brightness != Some(level) {
            debug!("Backlight {:.0}%", level * 100.0);
            state.brightness = Some(level);
        }
    }

    async fn set_status(&self, text: &str) {
        let mut state = self.state.lock();
        if state.status != text {
            debug!("Status '{}'", text);
            state.status = text.to_string();
        }
    }

    async fn select_setting(&self, name: Option<&str>) {
        info!("Selected setting: {}", name.unwrap_or("none"));
    }
}

/// LED ring and buzzer, logged; tones take their real duration
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator;

#[async_trait]
impl Indicator for LogIndicator {
    async fn set_led(&self, level: u8, color: usize) {
        debug!("LED level {} colour {}", level, color);
    }

    async fn tone(&self, frequency_hz: u32, duration: Duration) {
        trace!("Tone {} Hz for {:?}", frequency_hz, duration);
        sleep(duration).await;
    }
}
