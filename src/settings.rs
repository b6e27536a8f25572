//! Persistent viewer settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::camera::{Units, ViewMode};
use crate::picking::DEFAULT_NOISE_THRESHOLD;
use crate::renderer::RenderMode;
use crate::util::Result;

/// Settings that persist between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Display
    pub render_mode: RenderMode,
    pub view: ViewMode,
    pub show_grid: bool,
    pub background_color: [f32; 4],
    pub ghost_opacity: f32,
    pub selection_color: [f32; 4],

    // Camera
    pub pan_delta: f32,
    pub rotation_delta: f32,
    pub zoom_delta: f32,
    pub units: Units,
    pub fov: f32,
    pub near: f32,
    pub far: f32,

    // Picking
    /// Minimum pixels per color inside a drag box
    pub pick_noise_threshold: u32,

    // Redraw coalescing tick
    pub redraw_interval_ms: u64,

    // Window
    pub window_width: f32,
    pub window_height: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Lighted,
            view: ViewMode::Perspective,
            show_grid: true,
            background_color: [0.1, 0.1, 0.12, 1.0],
            ghost_opacity: 0.35,
            selection_color: [1.0, 0.6, 0.0, 1.0],
            pan_delta: 0.01,
            rotation_delta: 0.01,
            zoom_delta: 0.1,
            units: Units::Meters,
            fov: 45.0,
            near: 0.1,
            far: 1000.0,
            pick_noise_threshold: DEFAULT_NOISE_THRESHOLD,
            redraw_interval_ms: 100,
            window_width: 1280.0,
            window_height: 720.0,
        }
    }
}

impl Settings {
    /// Default settings file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("meshview");
            p.push("settings.json");
            p
        })
    }

    /// Load from the default location; missing or broken files give defaults
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                debug!("using default settings ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save to the default location
    pub fn save(&self) {
        if let Some(path) = Self::path() {
            if let Err(e) = self.save_to(&path) {
                warn!("failed to save settings to {}: {}", path.display(), e);
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&json)?;
        settings.sanitize();
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Replace out-of-range values with defaults
    pub fn sanitize(&mut self) {
        let d = Self::default();
        if self.render_mode == RenderMode::Instance {
            self.render_mode = d.render_mode;
        }
        if !(self.ghost_opacity > 0.0 && self.ghost_opacity < 1.0) {
            self.ghost_opacity = d.ghost_opacity;
        }
        for (value, default) in [
            (&mut self.pan_delta, d.pan_delta),
            (&mut self.rotation_delta, d.rotation_delta),
            (&mut self.zoom_delta, d.zoom_delta),
        ] {
            if !(value.is_finite() && *value > 0.0) {
                *value = default;
            }
        }
        if self.zoom_delta >= 1.0 {
            self.zoom_delta = d.zoom_delta;
        }
        if !(self.fov > 1.0 && self.fov < 179.0) {
            self.fov = d.fov;
        }
        if !(self.near > 0.0 && self.far > self.near) {
            self.near = d.near;
            self.far = d.far;
        }
        if self.redraw_interval_ms == 0 {
            self.redraw_interval_ms = d.redraw_interval_ms;
        }
        if !(self.window_width >= 200.0 && self.window_height >= 150.0) {
            self.window_width = d.window_width;
            self.window_height = d.window_height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            render_mode: RenderMode::Wireframe,
            view: ViewMode::Top,
            units: Units::Millimeters,
            pick_noise_threshold: 5,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "show_grid": false, "render_mode": "Shaded" }"#).unwrap();
        let s = Settings::load_from(&path).unwrap();
        assert!(!s.show_grid);
        assert_eq!(s.render_mode, RenderMode::Shaded);
        assert_eq!(s.pick_noise_threshold, 3);
        assert_eq!(s.redraw_interval_ms, 100);
    }

    #[test]
    fn test_invalid_values_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "render_mode": "Instance", "ghost_opacity": 4.0, "zoom_delta": -1.0, "near": 5.0, "far": 1.0 }"#,
        )
        .unwrap();
        let s = Settings::load_from(&path).unwrap();
        let d = Settings::default();
        assert_eq!(s.render_mode, d.render_mode);
        assert_eq!(s.ghost_opacity, d.ghost_opacity);
        assert_eq!(s.zoom_delta, d.zoom_delta);
        assert_eq!((s.near, s.far), (d.near, d.far));
    }

    #[test]
    fn test_broken_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(crate::Error::Json(_))));
        assert!(matches!(
            Settings::load_from(&dir.path().join("absent.json")),
            Err(crate::Error::Io(_))
        ));
    }
}
