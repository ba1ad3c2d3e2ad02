use super::burst::{BurstRecorder, BurstReport};
use super::settings::{Setting, SettingsTable};
use super::{CaptureMode, TimelapseSubmode};
use crate::capture::{CaptureDeliveryPipeline, CaptureOutcome};
use crate::config::{LapsecamConfig, UiConfig};
use crate::error::{BurstError, StorageError};
use crate::frame::Frame;
use crate::hardware::{Color, DisplayPanel, FileKind, Indicator, InputEvents, InputSource, Sensor};
use crate::storage::StorageGuardian;
use crate::timelapse::TimelapseScheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

const SNAP_LED_LEVEL: u8 = 4;
const SNAP_TONES: [(u32, Duration); 2] = [
    (1200, Duration::from_millis(50)),
    (1600, Duration::from_millis(50)),
];

const MSG_SNAP: &str = "Snap!";
const MSG_FAILED: &str = "Failed";
const MSG_NO_CARD: &str = "Error\nNo SD Card";

/// Owns the active mode, the setting cursor and the timelapse schedule, and
/// routes every per-iteration input edge to the component that acts on it.
pub struct ModeController {
    mode: CaptureMode,
    submode: TimelapseSubmode,
    settings: SettingsTable,
    scheduler: TimelapseScheduler,
    sensor: Arc<dyn Sensor>,
    display: Arc<dyn DisplayPanel>,
    indicator: Arc<dyn Indicator>,
    input: Arc<dyn InputSource>,
    pipeline: Arc<CaptureDeliveryPipeline>,
    storage: Arc<StorageGuardian>,
    rates: Vec<Duration>,
    ui: UiConfig,
    onion_alpha: f32,
    low_power_brightness: f32,
    brightness: Option<f32>,
    last_dithered: Option<Frame>,
    last_burst: Option<BurstReport>,
}

impl ModeController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &LapsecamConfig,
        sensor: Arc<dyn Sensor>,
        display: Arc<dyn DisplayPanel>,
        indicator: Arc<dyn Indicator>,
        input: Arc<dyn InputSource>,
        pipeline: Arc<CaptureDeliveryPipeline>,
        storage: Arc<StorageGuardian>,
    ) -> Self {
        let rates = config.timelapse.rates();
        Self {
            mode: CaptureMode::default(),
            submode: TimelapseSubmode::default(),
            settings: SettingsTable::new(rates.len(), config.timelapse.default_rate_index),
            scheduler: TimelapseScheduler::new(
                Arc::clone(&sensor),
                config.timelapse.settle_margin(),
            ),
            sensor,
            display,
            indicator,
            input,
            pipeline,
            storage,
            rates,
            ui: config.ui.clone(),
            onion_alpha: config.camera.onion_alpha,
            low_power_brightness: config.timelapse.low_power_brightness,
            brightness: None,
            last_dithered: None,
            last_burst: None,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn settings(&self) -> &SettingsTable {
        &self.settings
    }

    pub fn scheduler(&self) -> &TimelapseScheduler {
        &self.scheduler
    }

    pub fn last_burst(&self) -> Option<&BurstReport> {
        self.last_burst.as_ref()
    }

    /// Interval of the currently selected timelapse rate
    pub fn selected_rate(&self) -> Duration {
        self.rates
            .get(self.settings.timelapse_rate())
            .copied()
            .unwrap_or(Duration::from_secs(5))
    }

    /// Switch modes, tearing down whatever the previous mode had running
    pub async fn set_mode(&mut self, mode: CaptureMode) {
        if mode == self.mode {
            return;
        }
        if self.mode.is_timelapse() && !mode.is_timelapse() {
            self.scheduler.disarm().await;
        }
        if let CaptureMode::Timelapse(submode) = mode {
            self.submode = submode;
        }

        info!("Mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        self.set_brightness(1.0).await;
        self.display.set_status(mode.label()).await;
    }

    async fn set_brightness(&mut self, level: f32) {
        if self.brightness != Some(level) {
            self.display.set_brightness(level).await;
            self.brightness = Some(level);
        }
    }

    /// Draw one preview frame for the active mode
    pub async fn render(&mut self, now: Instant) {
        match self.mode {
            CaptureMode::LivePreview | CaptureMode::GifBurst => {
                if let Some(frame) = self.preview_frame().await {
                    self.display.render(&frame).await;
                }
            }
            CaptureMode::OnionSkin => {
                let Some(frame) = self.preview_frame().await else {
                    return;
                };
                let blended = self
                    .pipeline
                    .last_capture()
                    .and_then(|previous| previous.blend_over(&frame, self.onion_alpha));
                self.display.render(blended.as_ref().unwrap_or(&frame)).await;
            }
            CaptureMode::Dithered => {
                if let Some(frame) = self.preview_frame().await {
                    let dithered = frame.dithered();
                    self.display.render(&dithered).await;
                    self.last_dithered = Some(dithered);
                }
            }
            CaptureMode::Timelapse(submode) => self.render_timelapse(submode, now).await,
        }
    }

    async fn render_timelapse(&mut self, submode: TimelapseSubmode, now: Instant) {
        let status = match self.scheduler.remaining(now) {
            Some(left) => format!("{}s", left.as_secs()),
            None => "STOP".to_string(),
        };
        self.display.set_status(&status).await;

        let armed = self.scheduler.is_armed();
        let dimmed = armed && submode == TimelapseSubmode::LowPower;
        if !dimmed {
            if let Some(frame) = self.preview_frame().await {
                self.display.render(&frame).await;
            }
        }

        let level = if dimmed { self.low_power_brightness } else { 1.0 };
        self.set_brightness(level).await;
    }

    async fn preview_frame(&self) -> Option<Frame> {
        match self.sensor.capture_frame().await {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("Preview frame dropped: {}", e);
                None
            }
        }
    }

    /// Act on the edges sampled this iteration: due timelapse capture first,
    /// then shutter, storage presence and navigation.
    pub async fn handle_events(&mut self, events: InputEvents, now: Instant) {
        if self.mode.is_timelapse() {
            self.tick_timelapse(now).await;
        }

        if events.shutter_long {
            let locked = self.sensor.autofocus().await;
            info!("Autofocus {}", if locked { "locked" } else { "failed" });
        }

        if events.shutter_short {
            self.on_shutter().await;
        }

        if events.card_removed {
            self.storage.on_remove_edge().await;
        }
        if events.card_inserted {
            self.storage.on_insert_edge().await;
        }

        if events.up {
            self.adjust_current(1).await;
        }
        if events.down {
            self.adjust_current(-1).await;
        }
        if events.right {
            self.move_cursor(1).await;
        }
        if events.left {
            self.move_cursor(-1).await;
        }

        if events.select {
            if let CaptureMode::Timelapse(submode) = self.mode {
                let toggled = submode.toggled();
                info!("Timelapse power mode {}", toggled.label());
                self.submode = toggled;
                self.mode = CaptureMode::Timelapse(toggled);
            }
        }
        if events.ok && self.mode.is_timelapse() {
            self.toggle_timelapse(now).await;
        }
    }

    async fn tick_timelapse(&mut self, now: Instant) {
        if !self.scheduler.is_due(now) {
            return;
        }

        if let Some(frame) = self.preview_frame().await {
            self.display.render(&frame).await;
        }
        self.display.show_message(MSG_SNAP, Color::Blue).await;

        if let Some(outcome) = self.scheduler.tick(now, &self.pipeline).await {
            if outcome.is_failure() {
                self.show_error(MSG_FAILED).await;
            }
        }
    }

    async fn toggle_timelapse(&mut self, now: Instant) {
        if self.scheduler.is_armed() {
            self.scheduler.disarm().await;
        } else {
            let interval = self.selected_rate();
            self.scheduler.arm(interval, now).await;
        }
    }

    async fn on_shutter(&mut self) {
        match self.mode {
            CaptureMode::Timelapse(_) => debug!("Shutter ignored while in timelapse"),
            CaptureMode::GifBurst => self.run_burst().await,
            CaptureMode::Dithered => {
                self.snap().await;
                self.save_dithered_still().await;
            }
            CaptureMode::LivePreview | CaptureMode::OnionSkin => {
                self.snap().await;
            }
        }
    }

    /// Flash, confirm, capture; the LED is off again on every path
    pub async fn snap(&mut self) -> CaptureOutcome {
        let color = self.settings.led_color();
        self.indicator.set_led(SNAP_LED_LEVEL, color).await;
        self.display.show_message(MSG_SNAP, Color::Green).await;
        for (hz, duration) in SNAP_TONES {
            self.indicator.tone(hz, duration).await;
        }
        sleep(self.ui.flash()).await;

        let outcome = self.pipeline.capture_and_deliver().await;
        if outcome.is_failure() {
            self.show_error(MSG_FAILED).await;
        }

        self.indicator.set_led(0, color).await;
        outcome
    }

    async fn save_dithered_still(&mut self) {
        let Some(frame) = self.last_dithered.clone() else {
            debug!("No dithered frame to record yet");
            return;
        };

        match self.write_still_gif(&frame).await {
            Ok(bytes) => info!("Saved dithered still ({} bytes)", bytes),
            Err(e) => {
                warn!("Dithered still not saved: {}", e);
                self.show_error(MSG_NO_CARD).await;
            }
        }
    }

    async fn write_still_gif(&self, frame: &Frame) -> Result<u64, StorageError> {
        let mut sink = self.storage.open_sequential(FileKind::Gif).await?;
        let appended = self
            .storage
            .append_frame(sink.as_mut(), frame, Duration::from_secs(1))
            .await;
        let closed = sink.finish().await;
        appended?;
        closed.map_err(StorageError::IoFailure)
    }

    async fn run_burst(&mut self) {
        let recorder = BurstRecorder {
            sensor: self.sensor.as_ref(),
            display: self.display.as_ref(),
            input: self.input.as_ref(),
            storage: self.storage.as_ref(),
            min_frames: self.ui.gif_min_frames,
            frame_delay: self.ui.gif_frame_delay(),
        };

        match recorder.record().await {
            Ok(report) => self.last_burst = Some(report),
            Err(BurstError::Storage(_)) => self.show_error(MSG_NO_CARD).await,
            Err(BurstError::Sensor(_)) => self.show_error(MSG_FAILED).await,
        }
        self.display.set_status(self.mode.label()).await;
    }

    async fn show_error(&self, text: &str) {
        self.display.show_message(text, Color::Red).await;
        sleep(self.ui.message_hold()).await;
    }

    async fn move_cursor(&mut self, delta: i32) {
        let selected = self.settings.move_cursor(delta, self.mode.is_timelapse());
        debug!("Setting cursor on {:?}", selected);
        self.display.select_setting(selected.map(|s| s.name())).await;
    }

    async fn adjust_current(&mut self, delta: i32) {
        let Some(setting) = self.settings.current() else {
            return;
        };

        if setting == Setting::Mode {
            let next = self.mode.stepped(delta, self.submode);
            self.set_mode(next).await;
            return;
        }

        let Some(value) = self.settings.apply(setting, delta) else {
            return;
        };
        info!("{} -> {}", setting.name(), self.settings.describe(setting));

        match setting {
            Setting::Resolution | Setting::Effect => {
                self.sensor.apply_settings(&self.settings.sensor_settings()).await;
                // frames from the old resolution no longer blend
                if setting == Setting::Resolution {
                    self.pipeline.clear_last_capture();
                    self.last_dithered = None;
                }
            }
            Setting::LedLevel | Setting::LedColor => {
                self.indicator
                    .set_led(self.settings.led_level(), self.settings.led_color())
                    .await;
            }
            Setting::TimelapseRate => {
                let interval = self.selected_rate();
                debug!("Timelapse rate index {} ({:?})", value, interval);
                self.scheduler.set_interval(interval);
            }
            Setting::Mode => {}
        }
    }

    /// Disarm the timelapse so automatic exposure is restored
    pub async fn shutdown(&mut self) {
        self.scheduler.disarm().await;
    }
}
