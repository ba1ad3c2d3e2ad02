//! Narrow interfaces to the appliance's hardware and remote collaborators.
//!
//! Everything the control loop touches outside its own state goes through one
//! of these traits. Implementations own whatever interior state they need, so
//! the methods take `&self` and the collaborators are shared as `Arc<dyn _>`.

use crate::error::{DeliveryError, EncodeError, RadioError};
use crate::frame::Frame;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Automatic exposure controller readings, captured when a timelapse is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureSettings {
    pub exposure: u32,
    pub gain: u32,
    pub white_balance: u32,
}

/// User-tunable sensor settings, as indices into the sensor's option tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorSettings {
    pub resolution: usize,
    pub effect: usize,
}

/// Message colours used by the on-device UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Green,
    Blue,
    Red,
}

impl Color {
    pub fn rgb(&self) -> u32 {
        match self {
            Color::White => 0xFFFFFF,
            Color::Green => 0x00DD00,
            Color::Blue => 0x0000FF,
            Color::Red => 0xFF0000,
        }
    }
}

/// Kinds of sequentially numbered files on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Jpeg,
    Gif,
}

impl FileKind {
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Jpeg => "jpg",
            FileKind::Gif => "gif",
        }
    }
}

/// Payloads accepted by the remote feed
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPayload {
    /// Encoded JPEG capture
    Jpeg(Bytes),
    /// Plain numeric value, used for trigger notifications
    Value(i64),
}

impl FeedPayload {
    pub fn len(&self) -> usize {
        match self {
            FeedPayload::Jpeg(bytes) => bytes.len(),
            FeedPayload::Value(_) => std::mem::size_of::<i64>(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Debounced input edges sampled once per loop iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputEvents {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub select: bool,
    pub ok: bool,
    pub shutter_short: bool,
    pub shutter_long: bool,
    pub card_inserted: bool,
    pub card_removed: bool,
}

impl InputEvents {
    pub fn any(&self) -> bool {
        *self != InputEvents::default()
    }
}

#[async_trait]
pub trait Sensor: Send + Sync {
    /// Grab the newest frame from the sensor
    async fn capture_frame(&self) -> Result<Frame, EncodeError>;

    /// Encode a frame to JPEG
    async fn encode_jpeg(&self, frame: &Frame) -> Result<Bytes, EncodeError>;

    /// Run one autofocus cycle, returning whether focus locked
    async fn autofocus(&self) -> bool;

    /// Current values chosen by the automatic exposure/gain/WB controller
    async fn auto_settings(&self) -> Result<ExposureSettings, EncodeError>;

    /// Hold exposure, gain and white balance at the given values
    async fn lock_exposure(&self, settings: &ExposureSettings);

    /// Hand exposure, gain and white balance back to the automatic controller
    async fn restore_auto_exposure(&self);

    async fn apply_settings(&self, settings: &SensorSettings);

    /// Release cached encode/frame buffers
    async fn reclaim_buffers(&self) {}
}

#[async_trait]
pub trait DisplayPanel: Send + Sync {
    async fn render(&self, frame: &Frame);

    async fn show_message(&self, text: &str, color: Color);

    async fn set_brightness(&self, level: f32);

    /// Mode/status label drawn over the preview
    async fn set_status(&self, text: &str);

    /// Highlight the setting under the navigation cursor
    async fn select_setting(&self, name: Option<&str>);
}

#[async_trait]
pub trait Radio: Send + Sync {
    async fn connected(&self) -> bool;

    async fn connect(&self, ssid: &str, password: &str) -> Result<(), RadioError>;

    async fn enable(&self, enabled: bool);
}

#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn send(&self, feed_key: &str, payload: FeedPayload) -> Result<(), DeliveryError>;
}

/// An open sequential output file (GIF container encoding lives behind this)
#[async_trait]
pub trait MediaSink: Send {
    async fn append(&mut self, frame: &Frame, delay: Duration) -> io::Result<()>;

    /// Flush and close the file, returning its final size in bytes
    async fn finish(self: Box<Self>) -> io::Result<u64>;
}

#[async_trait]
pub trait CardSlot: Send + Sync {
    /// Card-detect line level
    async fn is_present(&self) -> bool;

    async fn mount(&self) -> io::Result<()>;

    async fn unmount(&self);

    async fn open_sequential_file(&self, kind: FileKind) -> io::Result<Box<dyn MediaSink>>;

    /// Write a complete file under the next sequential name
    async fn save_sequential(&self, kind: FileKind, bytes: &[u8]) -> io::Result<PathBuf>;
}

#[async_trait]
pub trait InputSource: Send + Sync {
    /// Take the edges accumulated since the previous poll
    async fn poll(&self) -> InputEvents;

    /// Live shutter level, used to end a GIF burst on release
    async fn shutter_held(&self) -> bool;
}

/// LED flash and buzzer
#[async_trait]
pub trait Indicator: Send + Sync {
    async fn set_led(&self, level: u8, color: usize);

    async fn tone(&self, frequency_hz: u32, duration: Duration);
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
