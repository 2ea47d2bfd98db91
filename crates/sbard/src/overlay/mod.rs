//! Overlay Window Manager.
//!
//! Owns the single bar surface. `attach` fully configures the bar from
//! a preferences snapshot and only then hands it to the compositor;
//! `detach` removes it unconditionally.
//!
//! ```text
//! PreferencesSnapshot ──► LayoutParams + BarView ──► Compositor::add_surface
//!                                                        │
//!                              OverlayHandle ◄───────────┘
//! ```

mod handle;
mod placement;

pub use handle::{BarView, Indicator, OverlayHandle};
pub use placement::{Density, Gravity, LayoutParams, SurfaceLayer, WindowFlags};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info, warn};

use sbar_core::PreferencesSnapshot;

/// Compositor-assigned surface identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Errors reported by the display compositor.
#[derive(Debug, Clone, Error)]
pub enum CompositorError {
    #[error("Compositor rejected surface: {0}")]
    Rejected(String),

    #[error("Unknown surface: {0}")]
    UnknownSurface(SurfaceId),
}

/// The shared display compositor.
pub trait Compositor: Send + Sync {
    /// Adds a fully configured surface.
    fn add_surface(&self, params: &LayoutParams, view: &BarView)
        -> Result<SurfaceId, CompositorError>;

    /// Removes a previously added surface.
    fn remove_surface(&self, id: SurfaceId) -> Result<(), CompositorError>;
}

/// A surface as seen by the compositor.
#[derive(Debug, Clone)]
pub struct AttachedSurface {
    pub params: LayoutParams,
    pub view: BarView,
}

/// Compositor without a display. Records attached surfaces.
#[derive(Debug, Default)]
pub struct HeadlessCompositor {
    next_id: AtomicU64,
    surfaces: Mutex<BTreeMap<SurfaceId, AttachedSurface>>,
}

impl HeadlessCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surfaces currently attached.
    pub fn attached(&self) -> Vec<(SurfaceId, AttachedSurface)> {
        self.surfaces
            .lock()
            .map(|s| s.iter().map(|(id, a)| (*id, a.clone())).collect())
            .unwrap_or_default()
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Compositor for HeadlessCompositor {
    fn add_surface(
        &self,
        params: &LayoutParams,
        view: &BarView,
    ) -> Result<SurfaceId, CompositorError> {
        let id = SurfaceId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut surfaces = self
            .surfaces
            .lock()
            .map_err(|_| CompositorError::Rejected("surface table poisoned".to_string()))?;
        surfaces.insert(
            id,
            AttachedSurface {
                params: params.clone(),
                view: view.clone(),
            },
        );
        Ok(id)
    }

    fn remove_surface(&self, id: SurfaceId) -> Result<(), CompositorError> {
        let mut surfaces = self
            .surfaces
            .lock()
            .map_err(|_| CompositorError::Rejected("surface table poisoned".to_string()))?;
        surfaces
            .remove(&id)
            .map(|_| ())
            .ok_or(CompositorError::UnknownSurface(id))
    }
}

/// Owner of the single overlay surface.
pub struct OverlayWindowManager {
    compositor: Arc<dyn Compositor>,
    density: Density,
    title: String,
    current: Option<OverlayHandle>,
}

impl OverlayWindowManager {
    pub fn new(compositor: Arc<dyn Compositor>, density: Density, title: impl Into<String>) -> Self {
        Self {
            compositor,
            density,
            title: title.into(),
            current: None,
        }
    }

    /// Attaches the bar, or returns the existing handle if one is attached.
    pub fn attach(
        &mut self,
        prefs: &PreferencesSnapshot,
    ) -> Result<&mut OverlayHandle, CompositorError> {
        let handle = match self.current.take() {
            Some(existing) => {
                debug!(surface = %existing.surface(), "Overlay already attached");
                existing
            }
            None => {
                let params = LayoutParams::for_prefs(prefs, self.density, &self.title);
                let view = BarView::configure(prefs);
                let surface = self.compositor.add_surface(&params, &view)?;
                info!(
                    surface = %surface,
                    layer = ?params.layer,
                    touchable = params.is_touchable(),
                    height = params.height,
                    "Overlay attached"
                );
                OverlayHandle::new(surface, params, view)
            }
        };

        Ok(self.current.insert(handle))
    }

    /// Removes the bar from the compositor. No-op when nothing is attached.
    pub fn detach(&mut self) {
        let Some(handle) = self.current.take() else {
            debug!("Detach without attached overlay");
            return;
        };

        match self.compositor.remove_surface(handle.surface()) {
            Ok(()) => info!(surface = %handle.surface(), "Overlay detached"),
            Err(e) => warn!(surface = %handle.surface(), error = %e, "Overlay removal failed"),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.current.is_some()
    }

    pub fn handle(&self) -> Option<&OverlayHandle> {
        self.current.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut OverlayHandle> {
        self.current.as_mut()
    }
}
