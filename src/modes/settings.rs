use crate::hardware::SensorSettings;

pub const RESOLUTIONS: &[&str] = &[
    "240x240", "320x240", "640x480", "800x600", "1024x768", "1280x720", "1280x1024",
    "1600x1200", "1920x1080", "2048x1536", "2560x1440", "2560x1600", "2560x1920",
];

pub const EFFECTS: &[&str] = &[
    "Normal", "Invert", "B&W", "Reddish", "Greenish", "Bluish", "Sepia", "Solarize",
];

pub const LED_COLORS: &[&str] = &["white", "green", "blue", "red", "amber"];

/// LED flash levels 0 (off) through 4
pub const LED_LEVELS: usize = 5;

/// Settings reachable through the navigation cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Resolution,
    Effect,
    Mode,
    LedLevel,
    LedColor,
    TimelapseRate,
}

impl Setting {
    pub fn name(&self) -> &'static str {
        match self {
            Setting::Resolution => "resolution",
            Setting::Effect => "effect",
            Setting::Mode => "mode",
            Setting::LedLevel => "led_level",
            Setting::LedColor => "led_color",
            Setting::TimelapseRate => "timelapse_rate",
        }
    }
}

/// Cursor slots in navigation order; the leading slot selects nothing
const CURSOR_SLOTS: [Option<Setting>; 7] = [
    None,
    Some(Setting::Resolution),
    Some(Setting::Effect),
    Some(Setting::Mode),
    Some(Setting::LedLevel),
    Some(Setting::LedColor),
    Some(Setting::TimelapseRate),
];

#[derive(Debug, Clone, Copy)]
struct ValueRange {
    len: usize,
    wrap: bool,
}

impl ValueRange {
    fn apply(&self, value: usize, delta: i32) -> usize {
        let len = self.len.max(1) as i64;
        let next = value as i64 + delta as i64;
        if self.wrap {
            next.rem_euclid(len) as usize
        } else {
            next.clamp(0, len - 1) as usize
        }
    }
}

/// Setting values plus the navigation cursor.
///
/// `Mode` is listed for navigation only: its value belongs to the mode
/// controller, so `get`/`apply` report nothing for it.
#[derive(Debug, Clone)]
pub struct SettingsTable {
    cursor: usize,
    resolution: usize,
    effect: usize,
    led_level: usize,
    led_color: usize,
    timelapse_rate: usize,
    timelapse_rates: usize,
}

impl SettingsTable {
    pub fn new(timelapse_rates: usize, default_rate: usize) -> Self {
        Self {
            cursor: 0,
            resolution: 0,
            effect: 0,
            led_level: 0,
            led_color: 0,
            timelapse_rate: default_rate.min(timelapse_rates.saturating_sub(1)),
            timelapse_rates,
        }
    }

    fn range(&self, setting: Setting) -> Option<ValueRange> {
        match setting {
            Setting::Resolution => Some(ValueRange { len: RESOLUTIONS.len(), wrap: false }),
            Setting::Effect => Some(ValueRange { len: EFFECTS.len(), wrap: true }),
            Setting::Mode => None,
            Setting::LedLevel => Some(ValueRange { len: LED_LEVELS, wrap: false }),
            Setting::LedColor => Some(ValueRange { len: LED_COLORS.len(), wrap: true }),
            Setting::TimelapseRate => Some(ValueRange { len: self.timelapse_rates, wrap: false }),
        }
    }

    fn slot(&mut self, setting: Setting) -> Option<&mut usize> {
        match setting {
            Setting::Resolution => Some(&mut self.resolution),
            Setting::Effect => Some(&mut self.effect),
            Setting::Mode => None,
            Setting::LedLevel => Some(&mut self.led_level),
            Setting::LedColor => Some(&mut self.led_color),
            Setting::TimelapseRate => Some(&mut self.timelapse_rate),
        }
    }

    pub fn get(&self, setting: Setting) -> Option<usize> {
        match setting {
            Setting::Resolution => Some(self.resolution),
            Setting::Effect => Some(self.effect),
            Setting::Mode => None,
            Setting::LedLevel => Some(self.led_level),
            Setting::LedColor => Some(self.led_color),
            Setting::TimelapseRate => Some(self.timelapse_rate),
        }
    }

    /// Step a setting by `delta`, returning the new value when it changed
    pub fn apply(&mut self, setting: Setting, delta: i32) -> Option<usize> {
        let range = self.range(setting)?;
        let slot = self.slot(setting)?;
        let next = range.apply(*slot, delta);
        if next == *slot {
            return None;
        }
        *slot = next;
        Some(next)
    }

    pub fn current(&self) -> Option<Setting> {
        CURSOR_SLOTS[self.cursor]
    }

    /// Move the cursor; the timelapse rate slot is skipped outside timelapse mode
    pub fn move_cursor(&mut self, delta: i32, timelapse_active: bool) -> Option<Setting> {
        let len = CURSOR_SLOTS.len() as i64;
        let step = if delta < 0 { -1 } else { 1 };
        let mut next = (self.cursor as i64 + delta as i64).rem_euclid(len);

        if !timelapse_active && CURSOR_SLOTS[next as usize] == Some(Setting::TimelapseRate) {
            next = (next + step).rem_euclid(len);
        }

        self.cursor = next as usize;
        self.current()
    }

    pub fn sensor_settings(&self) -> SensorSettings {
        SensorSettings {
            resolution: self.resolution,
            effect: self.effect,
        }
    }

    pub fn led_level(&self) -> u8 {
        self.led_level as u8
    }

    pub fn led_color(&self) -> usize {
        self.led_color
    }

    pub fn timelapse_rate(&self) -> usize {
        self.timelapse_rate
    }

    /// Human-readable value for the display's setting slot
    pub fn describe(&self, setting: Setting) -> String {
        match setting {
            Setting::Resolution => RESOLUTIONS[self.resolution].to_string(),
            Setting::Effect => EFFECTS[self.effect].to_string(),
            Setting::Mode => String::new(),
            Setting::LedLevel => self.led_level.to_string(),
            Setting::LedColor => LED_COLORS[self.led_color].to_string(),
            Setting::TimelapseRate => format!("#{}", self.timelapse_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visited(table: &mut SettingsTable, delta: i32, timelapse: bool) -> Vec<Option<Setting>> {
        (0..CURSOR_SLOTS.len() * 2)
            .map(|_| table.move_cursor(delta, timelapse))
            .collect()
    }

    #[test]
    fn test_timelapse_rate_reachable_only_in_timelapse() {
        let mut table = SettingsTable::new(19, 0);
        for delta in [1, -1] {
            assert!(!visited(&mut table, delta, false).contains(&Some(Setting::TimelapseRate)));
            assert!(visited(&mut table, delta, true).contains(&Some(Setting::TimelapseRate)));
        }
    }

    #[test]
    fn test_left_skip_continues_leftwards() {
        let mut table = SettingsTable::new(19, 0);
        // from the empty slot, left would land on the rate slot
        assert_eq!(table.move_cursor(-1, false), Some(Setting::LedColor));
        assert_eq!(table.move_cursor(1, false), None);
    }

    #[test]
    fn test_cursor_wraps_full_cycle() {
        let mut table = SettingsTable::new(19, 0);
        for _ in 0..CURSOR_SLOTS.len() {
            table.move_cursor(1, true);
        }
        assert_eq!(table.current(), None);
    }

    #[test]
    fn test_numeric_settings_clamp() {
        let mut table = SettingsTable::new(3, 0);
        assert_eq!(table.apply(Setting::LedLevel, -1), None);
        for _ in 0..10 {
            table.apply(Setting::LedLevel, 1);
        }
        assert_eq!(table.get(Setting::LedLevel), Some(4));

        table.apply(Setting::TimelapseRate, 5);
        assert_eq!(table.timelapse_rate(), 2);
    }

    #[test]
    fn test_enumerated_settings_wrap() {
        let mut table = SettingsTable::new(3, 0);
        assert_eq!(table.apply(Setting::Effect, -1), Some(EFFECTS.len() - 1));
        assert_eq!(table.apply(Setting::Effect, 1), Some(0));
        assert_eq!(table.describe(Setting::Effect), "Normal");
    }

    #[test]
    fn test_mode_is_not_a_table_value() {
        let mut table = SettingsTable::new(3, 0);
        assert_eq!(table.get(Setting::Mode), None);
        assert_eq!(table.apply(Setting::Mode, 1), None);
    }

    #[test]
    fn test_default_rate_is_clamped() {
        let table = SettingsTable::new(3, 10);
        assert_eq!(table.timelapse_rate(), 2);
    }
}
