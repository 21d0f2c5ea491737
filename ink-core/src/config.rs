//! Canvas configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::tool::Rgba;

/// Tunable canvas parameters.
///
/// Every field has a default, so a JSON file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// DPI at which document pages are rendered into the page cache.
    pub render_dpi: f64,
    /// DPI of the fast preview pass shown while the full render is pending.
    pub preview_dpi: f64,
    /// Number of rendered pages kept in memory.
    pub page_cache_capacity: usize,
    /// Number of decoded page rasters kept in memory.
    pub raster_cache_capacity: usize,
    /// Cadence of text-selection hit testing, in milliseconds.
    pub text_selection_interval_ms: u64,
    /// Delay before a settled lasso selection is announced, in milliseconds.
    pub selection_ready_delay_ms: u64,
    /// Delay before neighbouring pages are rendered ahead, in milliseconds.
    pub prefetch_delay_ms: u64,
    /// Initial thickness of every tool.
    pub default_thickness: f64,
    /// Spacing of grid and line backgrounds, in logical pixels.
    pub background_density: u32,
    /// Logical width of a page with no background.
    pub blank_page_width: u32,
    /// Logical height of a page with no background.
    pub blank_page_height: u32,
    /// Device pixel ratio of the display.
    pub device_pixel_ratio: f64,
    /// Whether touch gestures drive pan and zoom.
    pub touch_gestures_enabled: bool,
    /// Colour drawn outside the page.
    pub window_color: Rgba,
    /// Fill colour of pattern backgrounds.
    pub page_color: Rgba,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            render_dpi: 288.0,
            preview_dpi: 96.0,
            page_cache_capacity: 10,
            raster_cache_capacity: 15,
            text_selection_interval_ms: 16,
            selection_ready_delay_ms: 500,
            prefetch_delay_ms: 1000,
            default_thickness: 5.0,
            background_density: 40,
            blank_page_width: 1440,
            blank_page_height: 900,
            device_pixel_ratio: 1.0,
            touch_gestures_enabled: false,
            window_color: Rgba::rgb(0x2b, 0x2b, 0x2b),
            page_color: Rgba::WHITE,
        }
    }
}

impl CanvasConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> CoreResult<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(CoreError::InvalidConfig(format!("{name} must be positive, got {v}")))
            }
        };
        positive("render_dpi", self.render_dpi)?;
        positive("preview_dpi", self.preview_dpi)?;
        positive("device_pixel_ratio", self.device_pixel_ratio)?;
        if !self.default_thickness.is_finite() || self.default_thickness < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "default_thickness must be non-negative, got {}",
                self.default_thickness
            )));
        }
        if self.page_cache_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "page_cache_capacity must be at least 1".into(),
            ));
        }
        if self.raster_cache_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "raster_cache_capacity must be at least 1".into(),
            ));
        }
        if self.background_density == 0 {
            return Err(CoreError::InvalidConfig(
                "background_density must be at least 1".into(),
            ));
        }
        if self.blank_page_width == 0 || self.blank_page_height == 0 {
            return Err(CoreError::InvalidConfig(
                "blank page dimensions must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Text-selection cadence.
    #[must_use]
    pub const fn text_selection_interval(&self) -> Duration {
        Duration::from_millis(self.text_selection_interval_ms)
    }

    /// Delay before a settled selection is announced.
    #[must_use]
    pub const fn selection_ready_delay(&self) -> Duration {
        Duration::from_millis(self.selection_ready_delay_ms)
    }

    /// Delay before neighbouring pages are prefetched.
    #[must_use]
    pub const fn prefetch_delay(&self) -> Duration {
        Duration::from_millis(self.prefetch_delay_ms)
    }

    /// Upscale factor applied to preview renders.
    #[must_use]
    pub fn preview_upscale(&self) -> f64 {
        self.render_dpi / self.preview_dpi
    }

    /// Blank page extent in buffer pixels.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn blank_page_pixels(&self) -> (u32, u32) {
        let scale = |v: u32| (f64::from(v) * self.device_pixel_ratio).round().max(1.0) as u32;
        (scale(self.blank_page_width), scale(self.blank_page_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CanvasConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.preview_upscale() - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.blank_page_pixels(), (1440, 900));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            CanvasConfig::from_json(r#"{"render_dpi": 144, "touch_gestures_enabled": true}"#)
                .expect("valid config");
        assert!((config.render_dpi - 144.0).abs() < f64::EPSILON);
        assert!(config.touch_gestures_enabled);
        assert_eq!(config.page_cache_capacity, 10);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = CanvasConfig::from_json(r#"{"page_cache_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = CanvasConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[test]
    fn test_blank_page_scales_with_dpr() {
        let config = CanvasConfig {
            device_pixel_ratio: 2.0,
            ..CanvasConfig::default()
        };
        assert_eq!(config.blank_page_pixels(), (2880, 1800));
    }
}
