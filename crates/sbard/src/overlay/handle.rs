//! The attached overlay and its mutable sub-state.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use sbar_core::{Color, IndicatorId, PreferencesSnapshot};

use super::placement::LayoutParams;
use super::SurfaceId;

/// One status glyph hosted in the bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub visible: bool,
    pub color: Color,
}

/// Visual configuration of the bar, fixed before attachment except for
/// the background color and the visibility/expand/drop sub-state.
#[derive(Debug, Clone, PartialEq)]
pub struct BarView {
    pub background: Color,
    pub icon_color: Color,
    pub indicators: BTreeMap<IndicatorId, Indicator>,
    pub expand_enabled: bool,
    pub drop_allowed: bool,
    pub drop_duration: Duration,
    pub visible: bool,
}

impl BarView {
    /// Fully configures the bar from `prefs`.
    pub fn configure(prefs: &PreferencesSnapshot) -> Self {
        let indicators = IndicatorId::ALL
            .iter()
            .map(|&id| {
                (
                    id,
                    Indicator {
                        visible: prefs.indicator_visible(id),
                        color: prefs.icon_color,
                    },
                )
            })
            .collect();

        Self {
            background: prefs.background_color,
            icon_color: prefs.icon_color,
            indicators,
            expand_enabled: prefs.effective_swipe(),
            drop_allowed: prefs.drop_enabled,
            drop_duration: prefs.drop_duration(),
            visible: true,
        }
    }
}

/// Handle to the single attached overlay surface.
#[derive(Debug)]
pub struct OverlayHandle {
    surface: SurfaceId,
    params: LayoutParams,
    view: BarView,
    configured_background: Color,
    dropped_at: Option<Instant>,
}

impl OverlayHandle {
    pub(crate) fn new(surface: SurfaceId, params: LayoutParams, view: BarView) -> Self {
        Self {
            surface,
            configured_background: view.background,
            params,
            view,
            dropped_at: None,
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    pub fn view(&self) -> &BarView {
        &self.view
    }

    pub fn indicator(&self, id: IndicatorId) -> Option<&Indicator> {
        self.view.indicators.get(&id)
    }

    pub fn is_visible(&self) -> bool {
        self.view.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.view.visible != visible {
            debug!(surface = %self.surface, visible, "Overlay visibility changed");
        }
        self.view.visible = visible;
    }

    pub fn expand_enabled(&self) -> bool {
        self.view.expand_enabled
    }

    pub fn set_expand(&mut self, enabled: bool) {
        if self.view.expand_enabled != enabled {
            debug!(surface = %self.surface, enabled, "Overlay expand changed");
        }
        self.view.expand_enabled = enabled;
    }

    /// Drops the indicators for the configured duration.
    ///
    /// Returns false when click-to-drop was disabled at creation.
    pub fn drop_indicators(&mut self) -> bool {
        if !self.view.drop_allowed {
            debug!(surface = %self.surface, "Drop ignored, not allowed");
            return false;
        }
        self.dropped_at = Some(Instant::now());
        debug!(
            surface = %self.surface,
            duration_ms = self.view.drop_duration.as_millis() as u64,
            "Indicators dropped"
        );
        true
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped_at
            .map(|at| at.elapsed() < self.view.drop_duration)
            .unwrap_or(false)
    }

    pub fn icon_color(&self) -> Color {
        self.view.icon_color
    }

    pub fn background_color(&self) -> Color {
        self.view.background
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.view.background = color;
    }

    /// Restores the background color the overlay was created with.
    pub fn restore_background_color(&mut self) {
        self.view.background = self.configured_background;
    }

    pub fn height(&self) -> u32 {
        self.params.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::placement::Density;

    fn handle(prefs: &PreferencesSnapshot) -> OverlayHandle {
        OverlayHandle::new(
            SurfaceId(1),
            LayoutParams::for_prefs(prefs, Density::Mdpi, "bar"),
            BarView::configure(prefs),
        )
    }

    #[test]
    fn test_configure_applies_indicator_visibility() {
        let mut prefs = PreferencesSnapshot::default();
        prefs.indicators.insert(IndicatorId::Roaming, false);
        prefs.icon_color = Color::from_argb(0xFF33_4455);

        let view = BarView::configure(&prefs);
        assert_eq!(view.indicators.len(), IndicatorId::ALL.len());
        assert!(!view.indicators[&IndicatorId::Roaming].visible);
        assert!(view.indicators[&IndicatorId::Wifi].visible);
        assert!(view
            .indicators
            .values()
            .all(|i| i.color == Color::from_argb(0xFF33_4455)));
    }

    #[test]
    fn test_swipe_forced_without_drop() {
        let prefs = PreferencesSnapshot {
            drop_enabled: false,
            swipe_enabled: false,
            ..Default::default()
        };
        assert!(BarView::configure(&prefs).expand_enabled);

        let prefs = PreferencesSnapshot {
            drop_enabled: true,
            swipe_enabled: false,
            ..Default::default()
        };
        assert!(!BarView::configure(&prefs).expand_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_expires() {
        let prefs = PreferencesSnapshot {
            drop_duration_ms: 500,
            ..Default::default()
        };
        let mut h = handle(&prefs);

        assert!(!h.is_dropped());
        assert!(h.drop_indicators());
        assert!(h.is_dropped());

        tokio::time::advance(Duration::from_millis(499)).await;
        assert!(h.is_dropped());

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(!h.is_dropped());
    }

    #[test]
    fn test_drop_ignored_when_not_allowed() {
        let prefs = PreferencesSnapshot {
            drop_enabled: false,
            ..Default::default()
        };
        let mut h = handle(&prefs);
        assert!(!h.drop_indicators());
        assert!(!h.is_dropped());
    }

    #[test]
    fn test_background_restore() {
        let prefs = PreferencesSnapshot::default();
        let mut h = handle(&prefs);

        h.set_background_color(Color::TRANSPARENT);
        assert!(h.background_color().is_transparent());

        h.restore_background_color();
        assert_eq!(h.background_color(), Color::BLACK);
    }
}
