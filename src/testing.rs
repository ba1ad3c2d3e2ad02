//! Scripted collaborator doubles shared by the unit tests.

use crate::capture::CaptureDeliveryPipeline;
use crate::config::LapsecamConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{DeliveryError, EncodeError, RadioError};
use crate::frame::{Frame, RGB565_WHITE};
use crate::hardware::{
    CardSlot, Color, DisplayPanel, ExposureSettings, FeedClient, FeedPayload, FileKind,
    Indicator, InputEvents, InputSource, MediaSink, Radio, Sensor, SensorSettings,
};
use crate::storage::StorageGuardian;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Ordered record of collaborator calls across mocks
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

/// Fails the first `n` connects, then stays connected
pub struct MockRadio {
    remaining_failures: AtomicU32,
    connected: AtomicBool,
    connect_calls: AtomicU32,
    connected_calls: AtomicU32,
    log: CallLog,
}

impl MockRadio {
    pub fn failing(n: u32) -> Self {
        Self::with_log(n, CallLog::default())
    }

    pub fn with_log(n: u32, log: CallLog) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
            connected: AtomicBool::new(false),
            connect_calls: AtomicU32::new(0),
            connected_calls: AtomicU32::new(0),
            log,
        }
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn connected_calls(&self) -> u32 {
        self.connected_calls.load(Ordering::SeqCst)
    }

    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn fail_next(&self, n: u32) {
        self.remaining_failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Radio for MockRadio {
    async fn connected(&self) -> bool {
        self.connected_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, ssid: &str, _password: &str) -> Result<(), RadioError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push("connect");
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RadioError::ConnectFailed {
                ssid: ssid.to_string(),
                details: "no beacon".to_string(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn enable(&self, enabled: bool) {
        if !enabled {
            self.drop_link();
        }
    }
}

pub const MOCK_EXPOSURE: ExposureSettings = ExposureSettings {
    exposure: 300,
    gain: 12,
    white_balance: 5200,
};

pub struct MockSensor {
    log: CallLog,
    frame_counter: AtomicU64,
    encode_failures: AtomicU32,
    capture_delay: Mutex<Duration>,
    locked: Mutex<Option<ExposureSettings>>,
    restore_calls: AtomicU32,
    reclaim_calls: AtomicU32,
    autofocus_calls: AtomicU32,
    applied: Mutex<Vec<SensorSettings>>,
}

impl MockSensor {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            frame_counter: AtomicU64::new(0),
            encode_failures: AtomicU32::new(0),
            capture_delay: Mutex::new(Duration::ZERO),
            locked: Mutex::new(None),
            restore_calls: AtomicU32::new(0),
            reclaim_calls: AtomicU32::new(0),
            autofocus_calls: AtomicU32::new(0),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_encodes(&self, n: u32) {
        self.encode_failures.store(n, Ordering::SeqCst);
    }

    /// Simulated sensor readout time per frame
    pub fn set_capture_delay(&self, delay: Duration) {
        *self.capture_delay.lock() = delay;
    }

    pub fn locked(&self) -> Option<ExposureSettings> {
        *self.locked.lock()
    }

    pub fn restore_calls(&self) -> u32 {
        self.restore_calls.load(Ordering::SeqCst)
    }

    pub fn reclaim_calls(&self) -> u32 {
        self.reclaim_calls.load(Ordering::SeqCst)
    }

    pub fn autofocus_calls(&self) -> u32 {
        self.autofocus_calls.load(Ordering::SeqCst)
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_counter.load(Ordering::SeqCst)
    }

    pub fn applied(&self) -> Vec<SensorSettings> {
        self.applied.lock().clone()
    }
}

#[async_trait]
impl Sensor for MockSensor {
    async fn capture_frame(&self) -> Result<Frame, EncodeError> {
        let delay = *self.capture_delay.lock();
        if !delay.is_zero() {
            sleep(delay).await;
        }
        let id = self.frame_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Frame::solid(id, 4, 4, RGB565_WHITE))
    }

    async fn encode_jpeg(&self, frame: &Frame) -> Result<Bytes, EncodeError> {
        self.log.push("encode_jpeg");
        let remaining = self.encode_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.encode_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(EncodeError::Timeout);
        }
        Ok(Bytes::from(format!("jpeg-{}", frame.id)))
    }

    async fn autofocus(&self) -> bool {
        self.autofocus_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn auto_settings(&self) -> Result<ExposureSettings, EncodeError> {
        Ok(MOCK_EXPOSURE)
    }

    async fn lock_exposure(&self, settings: &ExposureSettings) {
        *self.locked.lock() = Some(*settings);
    }

    async fn restore_auto_exposure(&self) {
        self.restore_calls.fetch_add(1, Ordering::SeqCst);
        self.locked.lock().take();
    }

    async fn apply_settings(&self, settings: &SensorSettings) {
        self.applied.lock().push(*settings);
    }

    async fn reclaim_buffers(&self) {
        self.reclaim_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Feed whose primary sends fail a scripted number of times
pub struct MockFeed {
    log: CallLog,
    camera_failures: AtomicU32,
    trigger_fails: AtomicBool,
    send_delay: Mutex<Duration>,
    sent: Mutex<Vec<(String, FeedPayload)>>,
    camera_attempts: AtomicU32,
}

impl MockFeed {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            camera_failures: AtomicU32::new(0),
            trigger_fails: AtomicBool::new(false),
            send_delay: Mutex::new(Duration::ZERO),
            sent: Mutex::new(Vec::new()),
            camera_attempts: AtomicU32::new(0),
        }
    }

    pub fn fail_camera_sends(&self, n: u32) {
        self.camera_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_triggers(&self) {
        self.trigger_fails.store(true, Ordering::SeqCst);
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock() = delay;
    }

    pub fn camera_attempts(&self) -> u32 {
        self.camera_attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<(String, FeedPayload)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl FeedClient for MockFeed {
    async fn send(&self, feed_key: &str, payload: FeedPayload) -> Result<(), DeliveryError> {
        let delay = *self.send_delay.lock();
        if !delay.is_zero() {
            sleep(delay).await;
        }
        self.log.push(format!("send:{}", feed_key));

        let is_trigger = matches!(payload, FeedPayload::Value(_));
        if is_trigger {
            if self.trigger_fails.load(Ordering::SeqCst) {
                return Err(DeliveryError::Transport {
                    details: "trigger dropped".to_string(),
                });
            }
        } else {
            self.camera_attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.camera_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.camera_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(DeliveryError::Rejected {
                    feed: feed_key.to_string(),
                    details: "503".to_string(),
                });
            }
        }

        self.sent.lock().push((feed_key.to_string(), payload));
        Ok(())
    }
}

/// What happened to the sinks a mock card handed out
#[derive(Debug, Default, Clone)]
pub struct SinkRecord {
    pub opened: u32,
    pub frames: u32,
    pub finished: u32,
}

pub struct MockCard {
    present: AtomicBool,
    mount_failures: AtomicU32,
    mount_calls: AtomicU32,
    unmount_calls: AtomicU32,
    saved: Mutex<Vec<(FileKind, usize)>>,
    sink_fail_after: Mutex<Option<u32>>,
    sinks: Arc<Mutex<SinkRecord>>,
}

impl MockCard {
    pub fn new() -> Self {
        Self {
            present: AtomicBool::new(true),
            mount_failures: AtomicU32::new(0),
            mount_calls: AtomicU32::new(0),
            unmount_calls: AtomicU32::new(0),
            saved: Mutex::new(Vec::new()),
            sink_fail_after: Mutex::new(None),
            sinks: Arc::new(Mutex::new(SinkRecord::default())),
        }
    }

    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    pub fn fail_mounts(&self, n: u32) {
        self.mount_failures.store(n, Ordering::SeqCst);
    }

    /// Sinks opened from now on fail writes after `frames` good frames
    pub fn fail_sink_after(&self, frames: u32) {
        *self.sink_fail_after.lock() = Some(frames);
    }

    pub fn mount_calls(&self) -> u32 {
        self.mount_calls.load(Ordering::SeqCst)
    }

    pub fn unmount_calls(&self) -> u32 {
        self.unmount_calls.load(Ordering::SeqCst)
    }

    pub fn saved_files(&self) -> usize {
        self.saved.lock().len()
    }

    pub fn saved_kinds(&self) -> Vec<FileKind> {
        self.saved.lock().iter().map(|(k, _)| *k).collect()
    }

    pub fn sinks(&self) -> SinkRecord {
        self.sinks.lock().clone()
    }
}

#[async_trait]
impl CardSlot for MockCard {
    async fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    async fn mount(&self) -> io::Result<()> {
        self.mount_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.mount_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.mount_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(io::Error::new(io::ErrorKind::Other, "no filesystem"));
        }
        Ok(())
    }

    async fn unmount(&self) {
        self.unmount_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn open_sequential_file(&self, _kind: FileKind) -> io::Result<Box<dyn MediaSink>> {
        self.sinks.lock().opened += 1;
        Ok(Box::new(MockSink {
            record: Arc::clone(&self.sinks),
            written: 0,
            fail_after: *self.sink_fail_after.lock(),
        }))
    }

    async fn save_sequential(&self, kind: FileKind, bytes: &[u8]) -> io::Result<PathBuf> {
        let mut saved = self.saved.lock();
        saved.push((kind, bytes.len()));
        Ok(PathBuf::from(format!("img{:04}.{}", saved.len(), kind.extension())))
    }
}

pub struct MockSink {
    record: Arc<Mutex<SinkRecord>>,
    written: u32,
    fail_after: Option<u32>,
}

#[async_trait]
impl MediaSink for MockSink {
    async fn append(&mut self, _frame: &Frame, _delay: Duration) -> io::Result<()> {
        if let Some(limit) = self.fail_after {
            if self.written >= limit {
                return Err(io::Error::new(io::ErrorKind::NotFound, "card removed"));
            }
        }
        self.written += 1;
        self.record.lock().frames += 1;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> io::Result<u64> {
        self.record.lock().finished += 1;
        Ok(self.written as u64 * 100)
    }
}

#[derive(Default)]
pub struct MockDisplay {
    renders: AtomicU64,
    messages: Mutex<Vec<(String, Color)>>,
    brightness: Mutex<Vec<f32>>,
    statuses: Mutex<Vec<String>>,
    selected: Mutex<Vec<Option<String>>>,
    last_frame: Mutex<Option<Frame>>,
}

impl MockDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<(String, Color)> {
        self.messages.lock().clone()
    }

    pub fn brightness(&self) -> Option<f32> {
        self.brightness.lock().last().copied()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().clone()
    }

    pub fn selected(&self) -> Option<Option<String>> {
        self.selected.lock().last().cloned()
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.last_frame.lock().clone()
    }
}

#[async_trait]
impl DisplayPanel for MockDisplay {
    async fn render(&self, frame: &Frame) {
        self.renders.fetch_add(1, Ordering::SeqCst);
        *self.last_frame.lock() = Some(frame.clone());
    }

    async fn show_message(&self, text: &str, color: Color) {
        self.messages.lock().push((text.to_string(), color));
    }

    async fn set_brightness(&self, level: f32) {
        self.brightness.lock().push(level);
    }

    async fn set_status(&self, text: &str) {
        self.statuses.lock().push(text.to_string());
    }

    async fn select_setting(&self, name: Option<&str>) {
        self.selected.lock().push(name.map(str::to_string));
    }
}

/// Input queue; the shutter reads as held for a scripted number of samples
#[derive(Default)]
pub struct MockInput {
    queue: Mutex<VecDeque<InputEvents>>,
    held_samples: AtomicU32,
}

impl MockInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, events: InputEvents) {
        self.queue.lock().push_back(events);
    }

    pub fn hold_shutter_for(&self, samples: u32) {
        self.held_samples.store(samples, Ordering::SeqCst);
    }
}

#[async_trait]
impl InputSource for MockInput {
    async fn poll(&self) -> InputEvents {
        self.queue.lock().pop_front().unwrap_or_default()
    }

    async fn shutter_held(&self) -> bool {
        let remaining = self.held_samples.load(Ordering::SeqCst);
        if remaining > 0 {
            self.held_samples.store(remaining - 1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

#[derive(Default)]
pub struct MockIndicator {
    leds: Mutex<Vec<(u8, usize)>>,
    tones: AtomicU32,
}

impl MockIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leds(&self) -> Vec<(u8, usize)> {
        self.leds.lock().clone()
    }

    pub fn tones(&self) -> u32 {
        self.tones.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Indicator for MockIndicator {
    async fn set_led(&self, level: u8, color: usize) {
        self.leds.lock().push((level, color));
    }

    async fn tone(&self, _frequency_hz: u32, _duration: Duration) {
        self.tones.fetch_add(1, Ordering::SeqCst);
    }
}

/// Every mock wired into the real components
pub struct TestRig {
    pub config: LapsecamConfig,
    pub log: CallLog,
    pub radio: Arc<MockRadio>,
    pub sensor: Arc<MockSensor>,
    pub feed: Arc<MockFeed>,
    pub card: Arc<MockCard>,
    pub display: Arc<MockDisplay>,
    pub input: Arc<MockInput>,
    pub indicator: Arc<MockIndicator>,
    pub link: Arc<ConnectivityMonitor>,
    pub storage: Arc<StorageGuardian>,
    pub pipeline: Arc<CaptureDeliveryPipeline>,
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_config(LapsecamConfig::default())
    }

    pub fn with_config(config: LapsecamConfig) -> Self {
        let log = CallLog::default();
        let radio = Arc::new(MockRadio::with_log(0, log.clone()));
        let sensor = Arc::new(MockSensor::new(log.clone()));
        let feed = Arc::new(MockFeed::new(log.clone()));
        let card = Arc::new(MockCard::new());
        let display = Arc::new(MockDisplay::new());
        let input = Arc::new(MockInput::new());
        let indicator = Arc::new(MockIndicator::new());

        let link = Arc::new(ConnectivityMonitor::new(radio.clone(), &config.network));
        let storage = Arc::new(StorageGuardian::new(
            card.clone(),
            display.clone(),
            &config.storage,
            config.ui.message_hold(),
        ));
        let pipeline = Arc::new(CaptureDeliveryPipeline::new(
            sensor.clone(),
            feed.clone(),
            Arc::clone(&link),
            Arc::clone(&storage),
            &config.feed,
            &config.delivery,
        ));

        Self {
            config,
            log,
            radio,
            sensor,
            feed,
            card,
            display,
            input,
            indicator,
            link,
            storage,
            pipeline,
        }
    }
}
