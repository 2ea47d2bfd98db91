//! Surface placement computed from a preferences snapshot.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use sbar_core::PreferencesSnapshot;

/// Display density bucket, selects the status bar height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Ldpi,
    #[default]
    Mdpi,
    Hdpi,
    Xhdpi,
}

impl Density {
    /// Height of the system status bar in pixels.
    pub fn status_bar_height(&self) -> u32 {
        match self {
            Density::Ldpi => 19,
            Density::Mdpi => 25,
            Density::Hdpi => 38,
            Density::Xhdpi => 50,
        }
    }
}

bitflags! {
    /// Interaction flags handed to the compositor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WindowFlags: u32 {
        const NOT_FOCUSABLE = 1 << 0;
        const LAYOUT_IN_SCREEN = 1 << 1;
        const SHOW_WHEN_LOCKED = 1 << 2;
        const TOUCHABLE_WHEN_WAKING = 1 << 3;
        const WATCH_OUTSIDE_TOUCH = 1 << 4;
        const NOT_TOUCH_MODAL = 1 << 5;
        const NOT_TOUCHABLE = 1 << 6;
    }
}

impl WindowFlags {
    /// Flags every bar surface carries.
    pub fn base() -> Self {
        Self::NOT_FOCUSABLE
            | Self::LAYOUT_IN_SCREEN
            | Self::SHOW_WHEN_LOCKED
            | Self::TOUCHABLE_WHEN_WAKING
            | Self::WATCH_OUTSIDE_TOUCH
            | Self::NOT_TOUCH_MODAL
    }
}

/// Stacking layer of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceLayer {
    /// Above everything, lock screen included; receives touches
    SystemError,
    /// Above applications; cannot consume touches
    SystemOverlay,
}

/// Gravity of the surface on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    TopFillHorizontal,
}

/// Full placement of the bar surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutParams {
    pub title: String,
    /// `None` means the full display width
    pub width: Option<u32>,
    pub height: u32,
    pub gravity: Gravity,
    pub layer: SurfaceLayer,
    pub flags: WindowFlags,
    pub translucent: bool,
}

impl LayoutParams {
    /// Placement for a bar created with `prefs`.
    ///
    /// With click-to-drop the surface sits on the system-error layer and
    /// takes touches. Without it the surface floats on the overlay layer
    /// and is explicitly not touchable.
    pub fn for_prefs(prefs: &PreferencesSnapshot, density: Density, title: &str) -> Self {
        let (layer, flags) = if prefs.drop_enabled {
            (SurfaceLayer::SystemError, WindowFlags::base())
        } else {
            (
                SurfaceLayer::SystemOverlay,
                WindowFlags::base() | WindowFlags::NOT_TOUCHABLE,
            )
        };

        Self {
            title: title.to_string(),
            width: None,
            height: density.status_bar_height(),
            gravity: Gravity::TopFillHorizontal,
            layer,
            flags,
            translucent: true,
        }
    }

    pub fn is_touchable(&self) -> bool {
        !self.flags.contains(WindowFlags::NOT_TOUCHABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_enabled_placement() {
        let prefs = PreferencesSnapshot::default();
        let params = LayoutParams::for_prefs(&prefs, Density::Hdpi, "bar");

        assert_eq!(params.layer, SurfaceLayer::SystemError);
        assert!(params.is_touchable());
        assert!(params.flags.contains(WindowFlags::WATCH_OUTSIDE_TOUCH));
        assert!(params.flags.contains(WindowFlags::NOT_TOUCH_MODAL));
        assert_eq!(params.height, 38);
        assert_eq!(params.width, None);
    }

    #[test]
    fn test_drop_disabled_placement() {
        let prefs = PreferencesSnapshot {
            drop_enabled: false,
            ..Default::default()
        };
        let params = LayoutParams::for_prefs(&prefs, Density::default(), "bar");

        assert_eq!(params.layer, SurfaceLayer::SystemOverlay);
        assert!(!params.is_touchable());
        assert!(params.flags.contains(WindowFlags::base()));
        assert_eq!(params.height, 25);
    }

    #[test]
    fn test_density_heights() {
        let heights: Vec<u32> = [Density::Ldpi, Density::Mdpi, Density::Hdpi, Density::Xhdpi]
            .iter()
            .map(Density::status_bar_height)
            .collect();
        assert_eq!(heights, vec![19, 25, 38, 50]);
    }

    #[test]
    fn test_density_deserialize() {
        let d: Density = serde_json::from_str("\"xhdpi\"").unwrap();
        assert_eq!(d, Density::Xhdpi);
    }
}
