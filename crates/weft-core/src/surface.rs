//! Shell surface types.
//!
//! One representation for windows of both origins: X11 windows managed
//! through the XWayland bridge and native shell surfaces. No protocol
//! handles leak here; everything is referenced by id.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::state::{DeviceId, Geometry, Point, Serial};
use crate::xdg::ConfigureIntent;

/// Unique, opaque identifier for a shell surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface:{}", self.0)
    }
}

/// A Wayland client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u32);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client:{}", self.0)
    }
}

/// A protocol object created by a client (e.g. an `xdg_surface`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub client: ClientId,
    pub id: u32,
}

impl ObjectRef {
    pub const fn new(client: ClientId, id: u32) -> Self {
        Self { client, id }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.client)
    }
}

/// Compositor handle of a rendering surface (`wl_surface`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderSurfaceId(pub u64);

impl std::fmt::Display for RenderSurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wl_surface:{}", self.0)
    }
}

/// Which protocol a surface came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceOrigin {
    X11 { window: u32, override_redirect: bool },
    Native(ObjectRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    Toplevel,
    Popup {
        parent: SurfaceId,
        /// Input serial the client claimed when creating the popup.
        serial: Serial,
        device: DeviceId,
        offset: Point,
    },
}

/// Window-manager state of a surface.
///
/// Maximized and Fullscreen are variants of one enum, so a surface can never
/// be both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WmState {
    #[default]
    Withdrawn,
    Normal,
    Maximized,
    Fullscreen,
}

bitflags! {
    /// Interactive operations in progress on a surface.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Interaction: u8 {
        const MOVING   = 0b0001;
        const RESIZING = 0b0010;
    }
}

/// Window type hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    #[default]
    Normal,
    Dialog,
    Utility,
    Toolbar,
    Splash,
    Menu,
    DropdownMenu,
    PopupMenu,
    Tooltip,
    Notification,
    Dock,
    Desktop,
}

/// Window size constraints (WM_NORMAL_HINTS).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeHints {
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub base_width: Option<u32>,
    pub base_height: Option<u32>,
    pub width_increment: Option<u32>,
    pub height_increment: Option<u32>,
}

impl SizeHints {
    /// Constrain a size to these hints.
    pub fn constrain(&self, width: u32, height: u32) -> (u32, u32) {
        let mut w = width;
        let mut h = height;

        if let Some(min) = self.min_width {
            w = w.max(min);
        }
        if let Some(max) = self.max_width.filter(|&max| max > 0) {
            w = w.min(max);
        }
        if let Some(min) = self.min_height {
            h = h.max(min);
        }
        if let Some(max) = self.max_height.filter(|&max| max > 0) {
            h = h.min(max);
        }

        if let (Some(base_w), Some(inc_w)) = (self.base_width, self.width_increment) {
            if inc_w > 0 {
                let steps = (w.saturating_sub(base_w)) / inc_w;
                w = base_w + steps * inc_w;
            }
        }
        if let (Some(base_h), Some(inc_h)) = (self.base_height, self.height_increment) {
            if inc_h > 0 {
                let steps = (h.saturating_sub(base_h)) / inc_h;
                h = base_h + steps * inc_h;
            }
        }

        (w, h)
    }
}

/// The subset of `_MOTIF_WM_HINTS` a compositor cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotifHints {
    /// `Some(false)` when the client asked for no decorations.
    pub decorations: Option<bool>,
}

/// A shell surface (origin-agnostic window).
#[derive(Debug, Clone)]
pub struct ShellSurface {
    pub id: SurfaceId,
    pub origin: SurfaceOrigin,
    pub role: SurfaceRole,
    pub geometry: Geometry,
    pub saved_geometry: Option<Geometry>,
    pub wm_state: WmState,
    pub saved_wm_state: Option<WmState>,
    pub pending: BTreeMap<Serial, ConfigureIntent>,
    pub surface_handle: Option<RenderSurfaceId>,
    pub transient_parent: Option<SurfaceId>,
    pub title: String,
    pub app_id: String,
    pub class: String,
    pub instance: String,
    /// Client-declared visible bounds within the surface.
    pub window_geometry: Option<Geometry>,
    pub size_hints: SizeHints,
    pub motif: MotifHints,
    pub window_type: WindowType,
    pub supports_delete: bool,
    pub supports_take_focus: bool,
    pub workspace: Option<u32>,
    pub minimized: bool,
    pub activated: bool,
    pub mapped: bool,
    pub interaction: Interaction,
}

impl ShellSurface {
    fn with_origin(id: SurfaceId, origin: SurfaceOrigin, role: SurfaceRole) -> Self {
        Self {
            id,
            origin,
            role,
            geometry: Geometry::default(),
            saved_geometry: None,
            wm_state: WmState::Withdrawn,
            saved_wm_state: None,
            pending: BTreeMap::new(),
            surface_handle: None,
            transient_parent: None,
            title: String::new(),
            app_id: String::new(),
            class: String::new(),
            instance: String::new(),
            window_geometry: None,
            size_hints: SizeHints::default(),
            motif: MotifHints::default(),
            window_type: WindowType::Normal,
            supports_delete: false,
            supports_take_focus: false,
            workspace: None,
            minimized: false,
            activated: false,
            mapped: false,
            interaction: Interaction::empty(),
        }
    }

    /// A window announced by X11 `CreateNotify`. It has no rendering
    /// surface until paired.
    pub fn new_x11(id: SurfaceId, window: u32, geometry: Geometry, override_redirect: bool) -> Self {
        let mut surface = Self::with_origin(
            id,
            SurfaceOrigin::X11 {
                window,
                override_redirect,
            },
            SurfaceRole::Toplevel,
        );
        surface.geometry = geometry;
        surface
    }

    /// A native shell surface, bound to its rendering surface at creation.
    pub fn new_native(
        id: SurfaceId,
        object: ObjectRef,
        handle: RenderSurfaceId,
        role: SurfaceRole,
    ) -> Self {
        let mut surface = Self::with_origin(id, SurfaceOrigin::Native(object), role);
        surface.surface_handle = Some(handle);
        surface.wm_state = WmState::Normal;
        surface
    }

    pub const fn is_toplevel(&self) -> bool {
        matches!(self.role, SurfaceRole::Toplevel)
    }

    pub const fn is_popup(&self) -> bool {
        matches!(self.role, SurfaceRole::Popup { .. })
    }

    pub const fn x11_window(&self) -> Option<u32> {
        match self.origin {
            SurfaceOrigin::X11 { window, .. } => Some(window),
            SurfaceOrigin::Native(_) => None,
        }
    }

    pub const fn native_object(&self) -> Option<ObjectRef> {
        match self.origin {
            SurfaceOrigin::Native(object) => Some(object),
            SurfaceOrigin::X11 { .. } => None,
        }
    }

    pub const fn client(&self) -> Option<ClientId> {
        match self.origin {
            SurfaceOrigin::Native(object) => Some(object.client),
            SurfaceOrigin::X11 { .. } => None,
        }
    }

    pub const fn is_override_redirect(&self) -> bool {
        matches!(
            self.origin,
            SurfaceOrigin::X11 {
                override_redirect: true,
                ..
            }
        )
    }

    /// The state the surface is heading to: the newest pending state
    /// request, else the committed one.
    pub fn effective_state(&self) -> WmState {
        self.pending
            .values()
            .rev()
            .find_map(|intent| intent.state)
            .unwrap_or(self.wm_state)
    }

    /// Geometry after every pending change is acknowledged.
    pub fn effective_geometry(&self) -> Geometry {
        self.pending.values().fold(self.geometry, |geometry, intent| {
            let origin = intent.position.unwrap_or_else(|| geometry.origin());
            let size = intent.size.unwrap_or_else(|| geometry.size());
            Geometry::from_parts(origin, size)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Size;

    #[test]
    fn size_hints_constrain() {
        let hints = SizeHints {
            min_width: Some(100),
            min_height: Some(50),
            max_width: Some(400),
            max_height: Some(0),
            base_width: Some(2),
            width_increment: Some(7),
            ..SizeHints::default()
        };
        // max_height of 0 means unset; increments snap down from the base.
        assert_eq!(hints.constrain(50, 900), (100, 900));
        assert_eq!(hints.constrain(1000, 10), (394, 50));
    }

    #[test]
    fn effective_state_prefers_newest_pending() {
        let mut surface = ShellSurface::new_x11(SurfaceId(1), 0x20_0001, Geometry::default(), false);
        surface.wm_state = WmState::Normal;
        assert_eq!(surface.effective_state(), WmState::Normal);

        surface.pending.insert(
            Serial(3),
            ConfigureIntent {
                state: Some(WmState::Maximized),
                ..ConfigureIntent::default()
            },
        );
        surface.pending.insert(
            Serial(4),
            ConfigureIntent {
                size: Some(Size::new(10, 10)),
                ..ConfigureIntent::default()
            },
        );
        assert_eq!(surface.effective_state(), WmState::Maximized);
    }

    #[test]
    fn origin_accessors() {
        let object = ObjectRef::new(ClientId(3), 12);
        let native = ShellSurface::new_native(
            SurfaceId(2),
            object,
            RenderSurfaceId(40),
            SurfaceRole::Toplevel,
        );
        assert_eq!(native.client(), Some(ClientId(3)));
        assert_eq!(native.native_object(), Some(object));
        assert_eq!(native.x11_window(), None);
        assert_eq!(native.wm_state, WmState::Normal);

        let x11 = ShellSurface::new_x11(SurfaceId(3), 0x40_0002, Geometry::default(), true);
        assert!(x11.is_override_redirect());
        assert!(x11.surface_handle.is_none());
        assert_eq!(x11.wm_state, WmState::Withdrawn);
    }
}
