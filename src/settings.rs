// ============================================================================
// ENGINE SETTINGS — tunables with a plain key=value settings file
// ============================================================================

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Engine tunables. Hosts either use `Default`, load the settings file, or
/// embed this struct in their own (serde) configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Undo steps kept beyond the reset state.
    pub max_undo_steps: usize,
    /// Zoom is clamped to `1/max_zoom ..= max_zoom`.
    pub max_zoom: f32,
    /// Preview refreshes whose destination area (screen pixels) exceeds this
    /// are split into deferred tiles.
    pub upscale_divide_area: u64,
    /// Edge length, in canvas pixels, of one deferred preview tile.
    pub upscale_tile_size: u32,
    /// Debounce for rebuilding the preview after scroll/zoom.
    pub upscale_refresh_delay_ms: u64,
    /// Debounce for canvas layout reflow after viewport changes.
    pub reflow_delay_ms: u64,
    /// Extra canvas pixels refreshed around every dirty rect.
    pub upscale_buffer: i32,
    /// Grid cell size in canvas pixels.
    pub grid_width: u32,
    pub grid_height: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: 50,
            max_zoom: 16.0,
            upscale_divide_area: 400 * 400,
            upscale_tile_size: 64,
            upscale_refresh_delay_ms: 100,
            reflow_delay_ms: 50,
            upscale_buffer: 1,
            grid_width: 8,
            grid_height: 8,
        }
    }
}

impl EngineSettings {
    /// Settings file location.
    /// On Linux:   ~/.config/rasterpad/rasterpad_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\RasterPad\rasterpad_settings.cfg
    /// On macOS:   ~/Library/Application Support/RasterPad/rasterpad_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("RasterPad").join("rasterpad_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("RasterPad")
                    .join("rasterpad_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("rasterpad").join("rasterpad_settings.cfg"))
        }
    }

    /// Load from the settings file; a missing file yields the defaults.
    pub fn load() -> Result<Self, SettingsError> {
        let Some(path) = Self::settings_path() else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the settings file, creating its directory if needed.
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, self.to_config_string())?;
        Ok(path)
    }

    /// Parse `key=value` lines. Blank lines and `#` comments are skipped,
    /// unknown keys are logged and ignored, missing keys keep their defaults.
    pub fn parse(text: &str) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(SettingsError::Syntax { line: line_no, text: line.to_string() });
            };
            let (key, value) = (key.trim(), value.trim());
            let bad = || SettingsError::InvalidValue {
                line: line_no,
                key: key.to_string(),
                value: value.to_string(),
            };
            match key {
                "max_undo_steps" => settings.max_undo_steps = value.parse().map_err(|_| bad())?,
                "max_zoom" => {
                    let z: f32 = value.parse().map_err(|_| bad())?;
                    if !(z >= 1.0 && z.is_finite()) {
                        return Err(bad());
                    }
                    settings.max_zoom = z;
                }
                "upscale_divide_area" => settings.upscale_divide_area = value.parse().map_err(|_| bad())?,
                "upscale_tile_size" => {
                    let t: u32 = value.parse().map_err(|_| bad())?;
                    if t == 0 {
                        return Err(bad());
                    }
                    settings.upscale_tile_size = t;
                }
                "upscale_refresh_delay_ms" => settings.upscale_refresh_delay_ms = value.parse().map_err(|_| bad())?,
                "reflow_delay_ms" => settings.reflow_delay_ms = value.parse().map_err(|_| bad())?,
                "upscale_buffer" => settings.upscale_buffer = value.parse().map_err(|_| bad())?,
                "grid_width" => settings.grid_width = value.parse().map_err(|_| bad())?,
                "grid_height" => settings.grid_height = value.parse().map_err(|_| bad())?,
                other => log_warn!("settings: ignoring unknown key '{}' on line {}", other, line_no),
            }
        }
        Ok(settings)
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "max_undo_steps={}\nmax_zoom={}\nupscale_divide_area={}\nupscale_tile_size={}\n\
             upscale_refresh_delay_ms={}\nreflow_delay_ms={}\nupscale_buffer={}\n\
             grid_width={}\ngrid_height={}\n",
            self.max_undo_steps,
            self.max_zoom,
            self.upscale_divide_area,
            self.upscale_tile_size,
            self.upscale_refresh_delay_ms,
            self.reflow_delay_ms,
            self.upscale_buffer,
            self.grid_width,
            self.grid_height,
        )
    }
}
