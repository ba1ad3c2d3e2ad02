use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LapsecamConfig {
    pub camera: CameraConfig,
    pub network: NetworkConfig,
    pub feed: FeedConfig,
    pub delivery: DeliveryConfig,
    pub storage: StorageConfig,
    pub timelapse: TimelapseConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Preview resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Onion-skin blend weight of the previous capture (0.0 - 1.0)
    #[serde(default = "default_onion_alpha")]
    pub onion_alpha: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NetworkConfig {
    /// Wi-Fi network name
    #[serde(default)]
    pub ssid: String,

    /// Wi-Fi passphrase
    #[serde(default)]
    pub password: String,

    /// First reconnect backoff delay in seconds
    #[serde(default = "default_backoff_base")]
    pub reconnect_base_seconds: u64,

    /// Reconnect backoff cap in seconds
    #[serde(default = "default_backoff_cap")]
    pub reconnect_cap_seconds: u64,

    /// Minimum time between link health checks in seconds
    #[serde(default = "default_health_check_interval")]
    pub health_check_seconds: u64,

    /// Give up reconnecting after this many failures (unbounded when unset)
    pub max_reconnect_attempts: Option<u32>,

    /// Address probed once at startup to confirm internet reachability
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,

    /// Reachability probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    /// Key of the feed receiving captured images
    #[serde(default = "default_camera_feed")]
    pub camera_feed: String,

    /// Key of the feed receiving the post-upload trigger notification
    #[serde(default = "default_trigger_feed")]
    pub trigger_feed: String,

    /// Directory the simulator's outbox feed writes into
    #[serde(default = "default_outbox_path")]
    pub outbox_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeliveryConfig {
    /// Maximum number of send attempts per capture
    #[serde(default = "default_delivery_attempts")]
    pub max_attempts: u32,

    /// First delivery backoff delay in seconds
    #[serde(default = "default_backoff_base")]
    pub base_delay_seconds: u64,

    /// Delivery backoff cap in seconds
    #[serde(default = "default_backoff_cap")]
    pub max_delay_seconds: u64,

    /// Run a buffer reclamation pass every N captures
    #[serde(default = "default_reclaim_every")]
    pub reclaim_every: u64,

    /// Also write every capture to the SD card when one is mounted
    #[serde(default)]
    pub save_local: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Directory standing in for the SD card in the simulator
    #[serde(default = "default_card_path")]
    pub card_path: String,

    /// Mount attempts per insert edge
    #[serde(default = "default_mount_attempts")]
    pub mount_attempts: u32,

    /// Pause between mount attempts in milliseconds
    #[serde(default = "default_mount_retry_ms")]
    pub mount_retry_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TimelapseConfig {
    /// Selectable capture intervals in seconds
    #[serde(default = "default_timelapse_rates")]
    pub rates_seconds: Vec<u64>,

    /// Index into `rates_seconds` selected at boot
    #[serde(default)]
    pub default_rate_index: usize,

    /// Settle margin added after every fired capture, in seconds
    #[serde(default = "default_settle_margin")]
    pub settle_margin_seconds: u64,

    /// Display brightness while waiting in low-power submode
    #[serde(default = "default_low_power_brightness")]
    pub low_power_brightness: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UiConfig {
    /// How long terminal messages stay on screen, in milliseconds
    #[serde(default = "default_message_hold_ms")]
    pub message_hold_ms: u64,

    /// LED flash lead time before a snap, in milliseconds
    #[serde(default = "default_flash_ms")]
    pub flash_ms: u64,

    /// Pause at the end of every loop iteration, in milliseconds
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,

    /// Minimum frames recorded per GIF burst
    #[serde(default = "default_gif_min_frames")]
    pub gif_min_frames: u32,

    /// Per-frame delay written into burst GIFs, in milliseconds
    #[serde(default = "default_gif_frame_delay_ms")]
    pub gif_frame_delay_ms: u64,
}

impl NetworkConfig {
    pub fn reconnect_base(&self) -> Duration {
        Duration::from_secs(self.reconnect_base_seconds)
    }

    pub fn reconnect_cap(&self) -> Duration {
        Duration::from_secs(self.reconnect_cap_seconds)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

impl DeliveryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_seconds)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_seconds)
    }
}

impl StorageConfig {
    pub fn mount_retry_pause(&self) -> Duration {
        Duration::from_millis(self.mount_retry_ms)
    }
}

impl TimelapseConfig {
    pub fn rates(&self) -> Vec<Duration> {
        self.rates_seconds.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    pub fn settle_margin(&self) -> Duration {
        Duration::from_secs(self.settle_margin_seconds)
    }
}

impl UiConfig {
    pub fn message_hold(&self) -> Duration {
        Duration::from_millis(self.message_hold_ms)
    }

    pub fn flash(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    pub fn gif_frame_delay(&self) -> Duration {
        Duration::from_millis(self.gif_frame_delay_ms)
    }
}

impl LapsecamConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.onion_alpha", default_onion_alpha() as f64)?
            .set_default("network.ssid", "")?
            .set_default("network.password", "")?
            .set_default("network.reconnect_base_seconds", default_backoff_base())?
            .set_default("network.reconnect_cap_seconds", default_backoff_cap())?
            .set_default("network.health_check_seconds", default_health_check_interval())?
            .set_default("network.probe_addr", default_probe_addr())?
            .set_default("network.probe_timeout_seconds", default_probe_timeout())?
            .set_default("feed.camera_feed", default_camera_feed())?
            .set_default("feed.trigger_feed", default_trigger_feed())?
            .set_default("feed.outbox_path", default_outbox_path())?
            .set_default("delivery.max_attempts", default_delivery_attempts())?
            .set_default("delivery.base_delay_seconds", default_backoff_base())?
            .set_default("delivery.max_delay_seconds", default_backoff_cap())?
            .set_default("delivery.reclaim_every", default_reclaim_every())?
            .set_default("delivery.save_local", false)?
            .set_default("storage.card_path", default_card_path())?
            .set_default("storage.mount_attempts", default_mount_attempts())?
            .set_default("storage.mount_retry_ms", default_mount_retry_ms())?
            .set_default("timelapse.rates_seconds", default_timelapse_rates())?
            .set_default("timelapse.default_rate_index", 0)?
            .set_default("timelapse.settle_margin_seconds", default_settle_margin())?
            .set_default(
                "timelapse.low_power_brightness",
                default_low_power_brightness() as f64,
            )?
            .set_default("ui.message_hold_ms", default_message_hold_ms())?
            .set_default("ui.flash_ms", default_flash_ms())?
            .set_default("ui.loop_interval_ms", default_loop_interval_ms())?
            .set_default("ui.gif_min_frames", default_gif_min_frames())?
            .set_default("ui.gif_frame_delay_ms", default_gif_frame_delay_ms())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // LAPSECAM__NETWORK__SSID=... style overrides
            .add_source(Environment::with_prefix("LAPSECAM").separator("__"))
            .build()?;

        let config: LapsecamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config.redacted());

        Ok(config)
    }

    /// Copy of the configuration that is safe to log
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.network.password.is_empty() {
            copy.network.password = "********".to_string();
        }
        copy
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.camera.onion_alpha) {
            return Err(ConfigError::Message(
                "Camera onion_alpha must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.network.reconnect_base_seconds == 0
            || self.network.reconnect_cap_seconds < self.network.reconnect_base_seconds
        {
            return Err(ConfigError::Message(
                "Network reconnect backoff must start above 0 and not exceed its cap".to_string(),
            ));
        }

        if self.network.max_reconnect_attempts == Some(0) {
            return Err(ConfigError::Message(
                "Network max_reconnect_attempts must be greater than 0 when set".to_string(),
            ));
        }

        if self.feed.camera_feed.is_empty() || self.feed.trigger_feed.is_empty() {
            return Err(ConfigError::Message(
                "Feed keys must not be empty".to_string(),
            ));
        }

        if self.delivery.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Delivery max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.delivery.base_delay_seconds == 0
            || self.delivery.max_delay_seconds < self.delivery.base_delay_seconds
        {
            return Err(ConfigError::Message(
                "Delivery backoff must start above 0 and not exceed its cap".to_string(),
            ));
        }

        if self.delivery.reclaim_every == 0 {
            return Err(ConfigError::Message(
                "Delivery reclaim_every must be greater than 0".to_string(),
            ));
        }

        if self.storage.mount_attempts == 0 {
            return Err(ConfigError::Message(
                "Storage mount_attempts must be greater than 0".to_string(),
            ));
        }

        if self.timelapse.rates_seconds.is_empty()
            || self.timelapse.rates_seconds.iter().any(|r| *r == 0)
        {
            return Err(ConfigError::Message(
                "Timelapse rates must be non-empty and greater than 0".to_string(),
            ));
        }

        if self.timelapse.default_rate_index >= self.timelapse.rates_seconds.len() {
            return Err(ConfigError::Message(
                "Timelapse default_rate_index is out of range".to_string(),
            ));
        }

        if !(self.timelapse.low_power_brightness > 0.0 && self.timelapse.low_power_brightness <= 1.0)
        {
            return Err(ConfigError::Message(
                "Timelapse low_power_brightness must be in (0.0, 1.0]".to_string(),
            ));
        }

        if self.ui.gif_min_frames == 0 {
            return Err(ConfigError::Message(
                "UI gif_min_frames must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for LapsecamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                resolution: default_camera_resolution(),
                onion_alpha: default_onion_alpha(),
            },
            network: NetworkConfig {
                ssid: String::new(),
                password: String::new(),
                reconnect_base_seconds: default_backoff_base(),
                reconnect_cap_seconds: default_backoff_cap(),
                health_check_seconds: default_health_check_interval(),
                max_reconnect_attempts: None,
                probe_addr: default_probe_addr(),
                probe_timeout_seconds: default_probe_timeout(),
            },
            feed: FeedConfig {
                camera_feed: default_camera_feed(),
                trigger_feed: default_trigger_feed(),
                outbox_path: default_outbox_path(),
            },
            delivery: DeliveryConfig {
                max_attempts: default_delivery_attempts(),
                base_delay_seconds: default_backoff_base(),
                max_delay_seconds: default_backoff_cap(),
                reclaim_every: default_reclaim_every(),
                save_local: false,
            },
            storage: StorageConfig {
                card_path: default_card_path(),
                mount_attempts: default_mount_attempts(),
                mount_retry_ms: default_mount_retry_ms(),
            },
            timelapse: TimelapseConfig {
                rates_seconds: default_timelapse_rates(),
                default_rate_index: 0,
                settle_margin_seconds: default_settle_margin(),
                low_power_brightness: default_low_power_brightness(),
            },
            ui: UiConfig {
                message_hold_ms: default_message_hold_ms(),
                flash_ms: default_flash_ms(),
                loop_interval_ms: default_loop_interval_ms(),
                gif_min_frames: default_gif_min_frames(),
                gif_frame_delay_ms: default_gif_frame_delay_ms(),
            },
        }
    }
}

// Default value functions
fn default_camera_resolution() -> (u32, u32) {
    (240, 240)
}
fn default_onion_alpha() -> f32 {
    0.5
}

fn default_backoff_base() -> u64 {
    2
}
fn default_backoff_cap() -> u64 {
    60
}
fn default_health_check_interval() -> u64 {
    60
}
fn default_probe_addr() -> String {
    "8.8.8.8:53".to_string()
}
fn default_probe_timeout() -> u64 {
    3
}

fn default_camera_feed() -> String {
    "camera".to_string()
}
fn default_trigger_feed() -> String {
    "camera-trigger".to_string()
}
fn default_outbox_path() -> String {
    "./outbox".to_string()
}

fn default_delivery_attempts() -> u32 {
    5
}
fn default_reclaim_every() -> u64 {
    5
}

fn default_card_path() -> String {
    "./sdcard".to_string()
}
fn default_mount_attempts() -> u32 {
    3
}
fn default_mount_retry_ms() -> u64 {
    500
}

fn default_timelapse_rates() -> Vec<u64> {
    vec![
        5,
        10,
        20,
        30,
        60,
        90,
        60 * 2,
        60 * 3,
        60 * 4,
        60 * 5,
        60 * 10,
        60 * 15,
        60 * 30,
        60 * 60,
        60 * 120,
        60 * 240,
        60 * 480,
        60 * 960,
        60 * 1440,
    ]
}
fn default_settle_margin() -> u64 {
    1
}
fn default_low_power_brightness() -> f32 {
    0.05
}

fn default_message_hold_ms() -> u64 {
    500
}
fn default_flash_ms() -> u64 {
    500
}
fn default_loop_interval_ms() -> u64 {
    100
}
fn default_gif_min_frames() -> u32 {
    15
}
fn default_gif_frame_delay_ms() -> u64 {
    120
}
