use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::extensions::ExtensionNumber;
use crate::result::WiimoteResult;

/// User settings of one emulated remote.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WiimoteConfig {
    /// Accessory plugged into the extension port.
    pub extension: ExtensionNumber,
    pub motion_plus: bool,
    /// Remote held horizontally, D-pad on the left.
    pub sideways: bool,
    /// Remote held vertically, pointing up.
    pub upright: bool,
    /// Battery level in percent.
    pub battery: f32,
    /// Speaker pan in percent, negative is left.
    pub speaker_pan: f32,
    pub prime: PrimeHackSettings,
}

impl Default for WiimoteConfig {
    fn default() -> Self {
        Self {
            extension: ExtensionNumber::None,
            motion_plus: false,
            sideways: false,
            upright: false,
            battery: 100.0,
            speaker_pan: 0.0,
            prime: PrimeHackSettings::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PrimeHackSettings {
    pub controller_mode: bool,
    pub invert_x: bool,
    pub invert_y: bool,
    pub camera_sensitivity: f64,
    pub cursor_sensitivity: f64,
    pub field_of_view: f64,
    /// Drive motion puzzles and rotary panels with the movement stick.
    pub improved_motion_controls: bool,
    pub lock_camera_in_motion_puzzles: bool,
}

impl Default for PrimeHackSettings {
    fn default() -> Self {
        Self {
            controller_mode: false,
            invert_x: false,
            invert_y: false,
            camera_sensitivity: 15.0,
            cursor_sensitivity: 15.0,
            field_of_view: 60.0,
            improved_motion_controls: true,
            lock_camera_in_motion_puzzles: true,
        }
    }
}

impl WiimoteConfig {
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_toml_str(text: &str) -> WiimoteResult<Self> {
        let config: Self = toml::from_str(text)?;
        Ok(config.sanitized())
    }

    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn to_toml_string(&self) -> WiimoteResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads the configuration, a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or invalid file contents.
    pub fn load(path: impl AsRef<Path>) -> WiimoteResult<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn save(&self, path: impl AsRef<Path>) -> WiimoteResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Clamps every value into its valid range.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.battery = self.battery.clamp(0.0, 100.0);
        self.speaker_pan = self.speaker_pan.clamp(-100.0, 100.0);
        self.prime.camera_sensitivity = self.prime.camera_sensitivity.clamp(1.0, 100.0);
        self.prime.cursor_sensitivity = self.prime.cursor_sensitivity.clamp(1.0, 100.0);
        self.prime.field_of_view = self.prime.field_of_view.clamp(1.0, 170.0);
        self
    }
}
