mod burst;
mod controller;
mod settings;

pub use burst::{BurstReport, FrameRateStats};
pub use controller::ModeController;
pub use settings::{Setting, SettingsTable, EFFECTS, LED_COLORS, LED_LEVELS, RESOLUTIONS};

/// Power regime while a timelapse waits for its next capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelapseSubmode {
    #[default]
    HighPower,
    LowPower,
}

impl TimelapseSubmode {
    pub fn toggled(&self) -> Self {
        match self {
            TimelapseSubmode::HighPower => TimelapseSubmode::LowPower,
            TimelapseSubmode::LowPower => TimelapseSubmode::HighPower,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimelapseSubmode::HighPower => "HiPwr",
            TimelapseSubmode::LowPower => "LowPwr",
        }
    }
}

/// Visual/behavioural mode of the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    LivePreview,
    OnionSkin,
    Dithered,
    GifBurst,
    Timelapse(TimelapseSubmode),
}

impl Default for CaptureMode {
    fn default() -> Self {
        CaptureMode::LivePreview
    }
}

impl CaptureMode {
    /// Number of entries in the mode cycle
    pub const COUNT: usize = 5;

    pub fn index(&self) -> usize {
        match self {
            CaptureMode::LivePreview => 0,
            CaptureMode::OnionSkin => 1,
            CaptureMode::Dithered => 2,
            CaptureMode::GifBurst => 3,
            CaptureMode::Timelapse(_) => 4,
        }
    }

    pub fn from_index(index: usize, submode: TimelapseSubmode) -> Self {
        match index % Self::COUNT {
            0 => CaptureMode::LivePreview,
            1 => CaptureMode::OnionSkin,
            2 => CaptureMode::Dithered,
            3 => CaptureMode::GifBurst,
            _ => CaptureMode::Timelapse(submode),
        }
    }

    /// Move `delta` places around the mode cycle
    pub fn stepped(&self, delta: i32, submode: TimelapseSubmode) -> Self {
        let next = (self.index() as i64 + delta as i64).rem_euclid(Self::COUNT as i64);
        Self::from_index(next as usize, submode)
    }

    pub fn is_timelapse(&self) -> bool {
        matches!(self, CaptureMode::Timelapse(_))
    }

    /// Short label shown in the mode slot
    pub fn label(&self) -> &'static str {
        match self {
            CaptureMode::LivePreview => "JPEG",
            CaptureMode::OnionSkin => "STOP",
            CaptureMode::Dithered => "GBOY",
            CaptureMode::GifBurst => "GIF",
            CaptureMode::Timelapse(_) => "LAPS",
        }
    }
}
