//! X11 window registry.
//!
//! Maps X11 windows to shell surfaces, pairs them with the rendering
//! surfaces the proxy server creates, and turns substructure events into
//! surface mutations plus [`X11Request`]s for the dispatcher.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use super::atoms::names;
use super::connection::X11ConnectionContext;
use super::event::{ConfigureRequest, XEvent};
use super::property::{PropertyValue, WatchedProperty};
use super::wire::{
    Atom, EventMask, Window, WindowConfig, WireError, X11Wire, ATOM_ATOM, ATOM_CARDINAL,
    ATOM_NONE, ATOM_WINDOW, CURRENT_TIME,
};
use crate::grab::ResizeEdges;
use crate::state::{Geometry, ShellState};
use crate::surface::{RenderSurfaceId, ShellSurface, SurfaceId, WindowType, WmState};
use crate::xdg::Configure;

// ICCCM WM_STATE values.
const WM_STATE_WITHDRAWN: u32 = 0;
const WM_STATE_NORMAL: u32 = 1;
const WM_STATE_ICONIC: u32 = 3;

// _NET_WM_STATE actions.
const NET_WM_STATE_REMOVE: u32 = 0;
const NET_WM_STATE_ADD: u32 = 1;
const NET_WM_STATE_TOGGLE: u32 = 2;

// _NET_WM_MOVERESIZE directions past the eight edges.
const MOVERESIZE_MOVE: u32 = 8;
const MOVERESIZE_SIZE_KEYBOARD: u32 = 9;
const MOVERESIZE_MOVE_KEYBOARD: u32 = 10;
const MOVERESIZE_CANCEL: u32 = 11;

/// An interactive operation requested through `_NET_WM_MOVERESIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResize {
    Move,
    Resize(ResizeEdges),
    Cancel,
}

/// What the registry asks the rest of the shell to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum X11Request {
    Map(SurfaceId),
    Unmap(SurfaceId),
    /// The window is gone; delete the surface once the batch is routed.
    Destroyed(SurfaceId),
    Moved {
        surface: SurfaceId,
        x: i32,
        y: i32,
    },
    Resized {
        surface: SurfaceId,
        width: u32,
        height: u32,
    },
    MoveResize {
        surface: SurfaceId,
        operation: MoveResize,
    },
    /// Requested window state; `None` leaves that state alone.
    ChangeState {
        surface: SurfaceId,
        fullscreen: Option<bool>,
        maximized: Option<bool>,
    },
    Minimize(SurfaceId),
}

/// Per-window data that is not part of the shell surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachedProperties {
    /// `_NET_WM_STATE` flags set by the client before mapping.
    pub fullscreen: bool,
    pub maximized: bool,
    /// `_NET_WM_NAME` was seen; it wins over `WM_NAME`.
    pub has_net_name: bool,
    pub motif_read: bool,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    surface: SurfaceId,
    cached: CachedProperties,
}

#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: HashMap<Window, Entry>,
    /// `WL_SURFACE_ID` arrived first: protocol id → window.
    unpaired_windows: HashMap<u32, Window>,
    /// Rendering surface arrived first: protocol id → surface.
    unpaired_surfaces: HashMap<u32, RenderSurfaceId>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surface_of(&self, window: Window) -> Option<SurfaceId> {
        self.windows.get(&window).map(|entry| entry.surface)
    }

    pub fn cached(&self, window: Window) -> Option<CachedProperties> {
        self.windows.get(&window).map(|entry| entry.cached)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Every registered window and its surface.
    pub fn entries(&self) -> impl Iterator<Item = (Window, SurfaceId)> + '_ {
        self.windows
            .iter()
            .map(|(&window, entry)| (window, entry.surface))
    }

    pub fn unpaired_window_count(&self) -> usize {
        self.unpaired_windows.len()
    }

    pub fn unpaired_surface_count(&self) -> usize {
        self.unpaired_surfaces.len()
    }

    pub fn handle_event<W: X11Wire>(
        &mut self,
        conn: &mut X11ConnectionContext<W>,
        state: &mut ShellState,
        event: XEvent,
        out: &mut Vec<X11Request>,
    ) -> Result<(), WireError> {
        match event {
            XEvent::CreateNotify {
                window,
                x,
                y,
                width,
                height,
                override_redirect,
                ..
            } => self.create_notify(
                conn,
                state,
                window,
                Geometry::new(x, y, width, height),
                override_redirect,
            )?,
            XEvent::MapRequest { window } => self.map_request(conn, state, window, out)?,
            XEvent::MapNotify { window, .. } => self.map_notify(conn, state, window, out),
            XEvent::UnmapNotify { window, synthetic } => {
                if synthetic {
                    trace!("ignoring synthetic UnmapNotify for {:#x}", window);
                } else {
                    self.unmap_notify(conn, state, window, out)?;
                }
            },
            XEvent::ConfigureRequest(request) => {
                self.configure_request(conn, state, &request, out)?;
            },
            XEvent::ConfigureNotify {
                window,
                x,
                y,
                width,
                height,
                ..
            } => self.configure_notify(state, window, Geometry::new(x, y, width, height), out),
            XEvent::DestroyNotify { window } => self.destroy_notify(conn, window, out),
            XEvent::PropertyNotify {
                window,
                atom,
                deleted,
            } => self.property_notify(conn, state, window, atom, deleted)?,
            XEvent::ClientMessage {
                window,
                type_,
                data,
                ..
            } => self.client_message(conn, state, window, type_, data, out),
            XEvent::SelectionClear { selection, .. } => {
                trace!("SelectionClear for {} reached the registry", selection);
            },
            XEvent::Error { code, resource } => {
                trace!("X11 error {} on resource {:#x}", code, resource);
            },
            XEvent::Other { code } => trace!("unhandled X11 event {}", code),
        }
        Ok(())
    }

    fn create_notify<W: X11Wire>(
        &mut self,
        conn: &mut X11ConnectionContext<W>,
        state: &mut ShellState,
        window: Window,
        geometry: Geometry,
        override_redirect: bool,
    ) -> Result<(), WireError> {
        if conn.is_own_resource(window) {
            return Ok(());
        }
        if self.windows.contains_key(&window) {
            debug!("CreateNotify for known window {:#x}", window);
            return Ok(());
        }

        let id = state.next_surface_id();
        state.insert_surface(ShellSurface::new_x11(id, window, geometry, override_redirect));
        conn.wire().change_event_mask(
            window,
            EventMask::PROPERTY_CHANGE | EventMask::FOCUS_CHANGE,
        )?;
        self.windows.insert(
            window,
            Entry {
                surface: id,
                cached: CachedProperties::default(),
            },
        );
        debug!(
            "X11 window {:#x} created as {} (override-redirect: {})",
            window, id, override_redirect
        );
        Ok(())
    }

    fn map_request<W: X11Wire>(
        &mut self,
        conn: &mut X11ConnectionContext<W>,
        state: &mut ShellState,
        window: Window,
        out: &mut Vec<X11Request>,
    ) -> Result<(), WireError> {
        if conn.is_own_resource(window) {
            return Ok(());
        }
        let Some(entry) = self.windows.get(&window).copied() else {
            trace!("MapRequest for unknown window {:#x}", window);
            return Ok(());
        };
        let surface = entry.surface;

        for kind in WatchedProperty::ALL {
            if kind == WatchedProperty::Motif && entry.cached.motif_read {
                continue;
            }
            self.read_property(conn, state, window, kind)?;
        }

        let workspace = state.config.xwayland.workspace;
        let cached = self.cached(window).unwrap_or_default();
        let Some(s) = state.surface_mut(surface) else {
            return Ok(());
        };
        s.wm_state = WmState::Normal;
        s.mapped = true;
        s.workspace = Some(workspace);

        let net_state = net_wm_state_atoms(
            conn,
            if cached.fullscreen {
                WmState::Fullscreen
            } else if cached.maximized {
                WmState::Maximized
            } else {
                WmState::Normal
            },
        );
        write_net_wm_state(conn, window, &net_state)?;
        write_wm_state(conn, window, WM_STATE_NORMAL)?;
        let desktop = conn.atom(names::NET_WM_DESKTOP);
        if desktop != ATOM_NONE {
            conn.wire()
                .change_property32(window, desktop, ATOM_CARDINAL, &[workspace])?;
        }
        conn.wire().map_window(window)?;

        debug!("Mapped X11 window {:#x} ({})", window, surface);
        out.push(X11Request::Map(surface));
        if cached.fullscreen || cached.maximized {
            out.push(X11Request::ChangeState {
                surface,
                fullscreen: cached.fullscreen.then_some(true),
                maximized: cached.maximized.then_some(true),
            });
        }
        Ok(())
    }

    fn map_notify<W: X11Wire>(
        &mut self,
        conn: &X11ConnectionContext<W>,
        state: &mut ShellState,
        window: Window,
        out: &mut Vec<X11Request>,
    ) {
        if conn.is_own_resource(window) {
            return;
        }
        let Some(surface) = self.surface_of(window) else {
            return;
        };
        if let Some(s) = state.surface_mut(surface) {
            if s.is_override_redirect() && !s.mapped {
                s.mapped = true;
                out.push(X11Request::Map(surface));
            }
        }
    }

    fn unmap_notify<W: X11Wire>(
        &mut self,
        conn: &mut X11ConnectionContext<W>,
        state: &mut ShellState,
        window: Window,
        out: &mut Vec<X11Request>,
    ) -> Result<(), WireError> {
        let Some(surface) = self.surface_of(window) else {
            trace!("UnmapNotify for unknown window {:#x}", window);
            return Ok(());
        };
        self.unpaired_windows.retain(|_, &mut w| w != window);

        let Some(s) = state.surfaces.get_mut(&surface) else {
            return Ok(());
        };
        if let Some(handle) = s.surface_handle.take() {
            state.roles.remove(&handle);
        }
        let override_redirect = s.is_override_redirect();
        s.wm_state = WmState::Withdrawn;
        s.mapped = false;
        s.pending.clear();

        if !override_redirect {
            write_wm_state(conn, window, WM_STATE_WITHDRAWN)?;
        }
        debug!("X11 window {:#x} unmapped", window);
        out.push(X11Request::Unmap(surface));
        Ok(())
    }

    fn configure_request<W: X11Wire>(
        &mut self,
        conn: &mut X11ConnectionContext<W>,
        state: &mut ShellState,
        request: &ConfigureRequest,
        out: &mut Vec<X11Request>,
    ) -> Result<(), WireError> {
        let window = request.window;
        let managed = match self.surface_of(window) {
            Some(surface) => state.surfaces.get_mut(&surface),
            None => None,
        };
        let Some(s) = managed else {
            // Not managed: grant it as asked.
            let (width, height) = request.size_or((request.width, request.height));
            let config = WindowConfig {
                x: Some(request.x),
                y: Some(request.y),
                width: Some(width),
                height: Some(height),
                ..request.stacking()
            };
            return conn.wire().configure_window(window, &config);
        };

        let current = s.geometry;
        if s.wm_state == WmState::Fullscreen {
            // Echoed back unchanged; the window is not touched.
            debug!("Denying ConfigureRequest of fullscreen {:#x}", window);
            return conn.wire().send_configure_notify(
                window,
                request.x,
                request.y,
                request.width,
                request.height,
                request.border_width,
            );
        }

        let (width, height) = request.size_or((current.width, current.height));
        let (width, height) = (width.max(1), height.max(1));
        let config = WindowConfig {
            x: Some(current.x),
            y: Some(current.y),
            width: Some(width),
            height: Some(height),
            ..request.stacking()
        };
        conn.wire().configure_window(window, &config)?;

        if (width, height) != (current.width, current.height) {
            s.geometry.width = width;
            s.geometry.height = height;
            out.push(X11Request::Resized {
                surface: s.id,
                width,
                height,
            });
        }
        Ok(())
    }

    fn configure_notify(
        &mut self,
        state: &mut ShellState,
        window: Window,
        geometry: Geometry,
        out: &mut Vec<X11Request>,
    ) {
        let managed = match self.surface_of(window) {
            Some(surface) => state.surfaces.get_mut(&surface),
            None => None,
        };
        let Some(s) = managed else {
            return;
        };
        if !s.is_override_redirect() {
            return;
        }
        let previous = s.geometry;
        s.geometry = geometry;
        if previous.origin() != geometry.origin() {
            out.push(X11Request::Moved {
                surface: s.id,
                x: geometry.x,
                y: geometry.y,
            });
        }
        if previous.size() != geometry.size() {
            out.push(X11Request::Resized {
                surface: s.id,
                width: geometry.width,
                height: geometry.height,
            });
        }
    }

    fn destroy_notify<W: X11Wire>(
        &mut self,
        conn: &X11ConnectionContext<W>,
        window: Window,
        out: &mut Vec<X11Request>,
    ) {
        if conn.is_own_resource(window) {
            return;
        }
        self.unpaired_windows.retain(|_, &mut w| w != window);
        if let Some(entry) = self.windows.remove(&window) {
            debug!("X11 window {:#x} destroyed", window);
            out.push(X11Request::Destroyed(entry.surface));
        }
    }

    fn property_notify<W: X11Wire>(
        &mut self,
        conn: &mut X11ConnectionContext<W>,
        state: &mut ShellState,
        window: Window,
        atom: Atom,
        deleted: bool,
    ) -> Result<(), WireError> {
        if !self.windows.contains_key(&window) {
            return Ok(());
        }
        let Some(kind) = WatchedProperty::from_atom(conn, atom) else {
            trace!("unwatched property {} changed on {:#x}", atom, window);
            return Ok(());
        };
        if deleted {
            debug!("{:?} deleted on {:#x}", kind, window);
            return Ok(());
        }
        self.read_property(conn, state, window, kind)
    }

    /// Read one property and apply it to the window's surface.
    fn read_property<W: X11Wire>(
        &mut self,
        conn: &mut X11ConnectionContext<W>,
        state: &mut ShellState,
        window: Window,
        kind: WatchedProperty,
    ) -> Result<(), WireError> {
        let atom = kind.atom(conn);
        if atom == ATOM_NONE {
            return Ok(());
        }
        let raw = conn.wire().get_property(window, atom)?;
        let utf8 = conn.atom(names::UTF8_STRING);
        let value = PropertyValue::decode(kind, raw.as_ref(), utf8);
        trace!("{:?} on {:#x}: {:?}", kind, window, value);

        // Atoms compared against below.
        let wm_delete = conn.atom(names::WM_DELETE_WINDOW);
        let wm_take_focus = conn.atom(names::WM_TAKE_FOCUS);
        let fullscreen = conn.atom(names::NET_WM_STATE_FULLSCREEN);
        let max_vert = conn.atom(names::NET_WM_STATE_MAXIMIZED_VERT);
        let max_horz = conn.atom(names::NET_WM_STATE_MAXIMIZED_HORZ);
        let window_type = match (&kind, &value) {
            (WatchedProperty::WindowType, PropertyValue::Atoms(types)) => {
                window_type_of(conn, types)
            },
            _ => None,
        };
        let parent = match &value {
            PropertyValue::Window(Some(parent)) if *parent != window => self.surface_of(*parent),
            _ => None,
        };

        let Some(entry) = self.windows.get_mut(&window) else {
            return Ok(());
        };
        let Some(s) = state.surfaces.get_mut(&entry.surface) else {
            return Ok(());
        };

        match (kind, value) {
            (WatchedProperty::Class, PropertyValue::Class { instance, class }) => {
                s.app_id.clone_from(&class);
                s.instance = instance;
                s.class = class;
            },
            (WatchedProperty::Name, PropertyValue::Text(title)) => {
                if !entry.cached.has_net_name {
                    s.title = title;
                }
            },
            (WatchedProperty::NetName, PropertyValue::Text(title)) => {
                entry.cached.has_net_name = true;
                s.title = title;
            },
            (WatchedProperty::TransientFor, _) => s.transient_parent = parent,
            (WatchedProperty::Protocols, PropertyValue::Atoms(protocols)) => {
                s.supports_delete = wm_delete != ATOM_NONE && protocols.contains(&wm_delete);
                s.supports_take_focus =
                    wm_take_focus != ATOM_NONE && protocols.contains(&wm_take_focus);
            },
            (WatchedProperty::NormalHints, PropertyValue::SizeHints(hints)) => {
                s.size_hints = hints;
            },
            (WatchedProperty::NetState, PropertyValue::Atoms(states)) => {
                // Ours once mapped; only the pre-map value is a request.
                if !s.mapped {
                    let has = |atom: Atom| atom != ATOM_NONE && states.contains(&atom);
                    entry.cached.fullscreen = has(fullscreen);
                    entry.cached.maximized = has(max_vert) || has(max_horz);
                }
            },
            (WatchedProperty::WindowType, _) => {
                if let Some(window_type) = window_type {
                    s.window_type = window_type;
                }
            },
            (WatchedProperty::Motif, PropertyValue::Motif(motif)) => {
                entry.cached.motif_read = true;
                s.motif = motif;
            },
            (WatchedProperty::Motif, PropertyValue::Absent) => {
                entry.cached.motif_read = true;
            },
            (kind, PropertyValue::Absent) => trace!("{:?} not set on {:#x}", kind, window),
            (kind, value) => debug!("unexpected {:?} value {:?}", kind, value),
        }
        Ok(())
    }

    fn client_message<W: X11Wire>(
        &mut self,
        conn: &mut X11ConnectionContext<W>,
        state: &mut ShellState,
        window: Window,
        type_: Atom,
        data: [u32; 5],
        out: &mut Vec<X11Request>,
    ) {
        let Some(surface) = self.surface_of(window) else {
            trace!("ClientMessage for unknown window {:#x}", window);
            return;
        };

        if type_ == conn.atom(names::WL_SURFACE_ID) {
            self.surface_id_message(state, window, surface, data[0]);
        } else if type_ == conn.atom(names::NET_WM_MOVERESIZE) {
            let operation = match data[2] {
                MOVERESIZE_MOVE => MoveResize::Move,
                MOVERESIZE_CANCEL => MoveResize::Cancel,
                MOVERESIZE_SIZE_KEYBOARD | MOVERESIZE_MOVE_KEYBOARD => {
                    debug!("keyboard move/resize of {:#x} unsupported", window);
                    return;
                },
                direction => match ResizeEdges::from_moveresize_direction(direction) {
                    Some(edges) => MoveResize::Resize(edges),
                    None => {
                        debug!("bad _NET_WM_MOVERESIZE direction {}", direction);
                        return;
                    },
                },
            };
            out.push(X11Request::MoveResize { surface, operation });
        } else if type_ == conn.atom(names::NET_WM_STATE) {
            self.net_wm_state_message(conn, state, window, surface, data, out);
        } else if type_ == conn.atom(names::WM_CHANGE_STATE) {
            if data[0] == WM_STATE_ICONIC {
                out.push(X11Request::Minimize(surface));
            }
        } else {
            debug!(
                "unhandled ClientMessage {} on {:#x}",
                conn.atom_name(type_),
                window
            );
        }
    }

    fn net_wm_state_message<W: X11Wire>(
        &mut self,
        conn: &mut X11ConnectionContext<W>,
        state: &ShellState,
        window: Window,
        surface: SurfaceId,
        data: [u32; 5],
        out: &mut Vec<X11Request>,
    ) {
        let action = data[0];
        if !matches!(
            action,
            NET_WM_STATE_REMOVE | NET_WM_STATE_ADD | NET_WM_STATE_TOGGLE
        ) {
            debug!("bad _NET_WM_STATE action {} on {:#x}", action, window);
            return;
        }
        let Some(s) = state.surface(surface) else {
            return;
        };

        let fullscreen_atom = conn.atom(names::NET_WM_STATE_FULLSCREEN);
        let max_vert = conn.atom(names::NET_WM_STATE_MAXIMIZED_VERT);
        let max_horz = conn.atom(names::NET_WM_STATE_MAXIMIZED_HORZ);
        let names_atom = |atom: Atom| atom != ATOM_NONE && (data[1] == atom || data[2] == atom);

        let Some(entry) = self.windows.get_mut(&window) else {
            return;
        };
        // Withdrawn windows only update what they will ask for at map time.
        let withdrawn = s.wm_state == WmState::Withdrawn;
        let (is_fullscreen, is_maximized) = if withdrawn {
            (entry.cached.fullscreen, entry.cached.maximized)
        } else {
            let effective = s.effective_state();
            (
                effective == WmState::Fullscreen,
                effective == WmState::Maximized,
            )
        };
        let apply = |current: bool| match action {
            NET_WM_STATE_REMOVE => false,
            NET_WM_STATE_ADD => true,
            _ => !current,
        };

        let fullscreen = names_atom(fullscreen_atom).then(|| apply(is_fullscreen));
        let maximized =
            (names_atom(max_vert) || names_atom(max_horz)).then(|| apply(is_maximized));
        if fullscreen.is_none() && maximized.is_none() {
            return;
        }

        if withdrawn {
            if let Some(fullscreen) = fullscreen {
                entry.cached.fullscreen = fullscreen;
            }
            if let Some(maximized) = maximized {
                entry.cached.maximized = maximized;
            }
            return;
        }
        out.push(X11Request::ChangeState {
            surface,
            fullscreen,
            maximized,
        });
    }

    fn surface_id_message(
        &mut self,
        state: &mut ShellState,
        window: Window,
        surface: SurfaceId,
        protocol_id: u32,
    ) {
        match self.unpaired_surfaces.remove(&protocol_id) {
            Some(handle) => pair(state, surface, handle),
            None => {
                trace!(
                    "WL_SURFACE_ID {} for {:#x} before its surface",
                    protocol_id,
                    window
                );
                self.unpaired_windows.insert(protocol_id, window);
            },
        }
    }

    /// A rendering surface was created by the proxy server's client.
    pub fn surface_created(
        &mut self,
        state: &mut ShellState,
        protocol_id: u32,
        handle: RenderSurfaceId,
    ) {
        let window = self.unpaired_windows.remove(&protocol_id);
        match window.and_then(|window| self.surface_of(window)) {
            Some(surface) => pair(state, surface, handle),
            None => {
                self.unpaired_surfaces.insert(protocol_id, handle);
            },
        }
    }

    /// A rendering surface went away; detach it from its window.
    pub fn surface_destroyed(&mut self, state: &mut ShellState, handle: RenderSurfaceId) {
        self.unpaired_surfaces.retain(|_, &mut h| h != handle);
        let Some(surface) = state.surface_for_handle(handle) else {
            return;
        };
        if let Some(s) = state.surfaces.get_mut(&surface) {
            if s.x11_window().is_some() {
                s.surface_handle = None;
                state.roles.remove(&handle);
            }
        }
    }

    /// Send a configure from the state machine to the X11 window.
    pub fn apply_configure<W: X11Wire>(
        &self,
        conn: &mut X11ConnectionContext<W>,
        state: &ShellState,
        configure: &Configure,
    ) -> Result<(), WireError> {
        let Some(window) = state
            .surface(configure.surface)
            .and_then(ShellSurface::x11_window)
        else {
            return Ok(());
        };
        let geometry = configure.target_geometry;
        conn.wire().configure_window(
            window,
            &WindowConfig {
                x: Some(geometry.x),
                y: Some(geometry.y),
                width: Some(geometry.width.max(1)),
                height: Some(geometry.height.max(1)),
                ..WindowConfig::default()
            },
        )?;
        let states = net_wm_state_atoms(conn, configure.target_state);
        write_net_wm_state(conn, window, &states)
    }

    /// Tell an X11 window its committed position.
    pub fn sync_position<W: X11Wire>(
        &self,
        conn: &mut X11ConnectionContext<W>,
        state: &ShellState,
        surface: SurfaceId,
    ) -> Result<(), WireError> {
        let Some(s) = state.surface(surface) else {
            return Ok(());
        };
        let Some(window) = s.x11_window() else {
            return Ok(());
        };
        conn.wire().configure_window(
            window,
            &WindowConfig {
                x: Some(s.geometry.x),
                y: Some(s.geometry.y),
                ..WindowConfig::default()
            },
        )
    }

    /// Give X11 input focus to `surface`, or clear the active window.
    pub fn focus<W: X11Wire>(
        &self,
        conn: &mut X11ConnectionContext<W>,
        state: &ShellState,
        surface: Option<SurfaceId>,
    ) -> Result<(), WireError> {
        let target = surface
            .and_then(|id| state.surface(id))
            .and_then(|s| s.x11_window().map(|window| (window, s.supports_take_focus)));
        let root = conn.root_window();

        if let Some((window, take_focus)) = target {
            if take_focus {
                let protocols = conn.atom(names::WM_PROTOCOLS);
                let take_focus = conn.atom(names::WM_TAKE_FOCUS);
                conn.wire().send_client_message(
                    window,
                    window,
                    protocols,
                    [take_focus, CURRENT_TIME, 0, 0, 0],
                    EventMask::empty(),
                )?;
            }
            conn.wire().set_input_focus(window, CURRENT_TIME)?;
        }

        let active = conn.atom(names::NET_ACTIVE_WINDOW);
        if active != ATOM_NONE {
            let window = target.map_or(0, |(window, _)| window);
            conn.wire()
                .change_property32(root, active, ATOM_WINDOW, &[window])?;
        }
        Ok(())
    }

    /// Ask an X11 window to close, killing its client if it cannot be asked.
    pub fn close<W: X11Wire>(
        &self,
        conn: &mut X11ConnectionContext<W>,
        state: &ShellState,
        surface: SurfaceId,
    ) -> Result<(), WireError> {
        let Some(s) = state.surface(surface) else {
            return Ok(());
        };
        let Some(window) = s.x11_window() else {
            return Ok(());
        };
        if s.supports_delete {
            let protocols = conn.atom(names::WM_PROTOCOLS);
            let delete = conn.atom(names::WM_DELETE_WINDOW);
            conn.wire().send_client_message(
                window,
                window,
                protocols,
                [delete, CURRENT_TIME, 0, 0, 0],
                EventMask::empty(),
            )
        } else {
            debug!("{:#x} has no WM_DELETE_WINDOW, killing client", window);
            conn.wire().kill_client(window)
        }
    }
}

fn pair(state: &mut ShellState, surface: SurfaceId, handle: RenderSurfaceId) {
    if let Some(holder) = state.surface_for_handle(handle) {
        if holder != surface {
            warn!("{} already has a role ({}), not pairing", handle, holder);
            return;
        }
    }
    let Some(s) = state.surfaces.get_mut(&surface) else {
        return;
    };
    if let Some(old) = s.surface_handle.replace(handle) {
        state.roles.remove(&old);
    }
    state.roles.insert(handle, surface);
    debug!("{} paired with {}", surface, handle);
}

fn net_wm_state_atoms<W: X11Wire>(conn: &mut X11ConnectionContext<W>, state: WmState) -> Vec<Atom> {
    let atoms = match state {
        WmState::Fullscreen => vec![conn.atom(names::NET_WM_STATE_FULLSCREEN)],
        WmState::Maximized => vec![
            conn.atom(names::NET_WM_STATE_MAXIMIZED_VERT),
            conn.atom(names::NET_WM_STATE_MAXIMIZED_HORZ),
        ],
        WmState::Withdrawn | WmState::Normal => Vec::new(),
    };
    atoms.into_iter().filter(|&atom| atom != ATOM_NONE).collect()
}

fn write_net_wm_state<W: X11Wire>(
    conn: &mut X11ConnectionContext<W>,
    window: Window,
    states: &[Atom],
) -> Result<(), WireError> {
    let property = conn.atom(names::NET_WM_STATE);
    if property == ATOM_NONE {
        return Ok(());
    }
    conn.wire()
        .change_property32(window, property, ATOM_ATOM, states)
}

fn write_wm_state<W: X11Wire>(
    conn: &mut X11ConnectionContext<W>,
    window: Window,
    value: u32,
) -> Result<(), WireError> {
    let wm_state = conn.atom(names::WM_STATE);
    if wm_state == ATOM_NONE {
        return Ok(());
    }
    // [state, icon window]
    conn.wire()
        .change_property32(window, wm_state, wm_state, &[value, 0])
}

fn window_type_of<W: X11Wire>(conn: &mut X11ConnectionContext<W>, types: &[Atom]) -> Option<WindowType> {
    const TYPES: [(&str, WindowType); 12] = [
        (names::NET_WM_WINDOW_TYPE_NORMAL, WindowType::Normal),
        (names::NET_WM_WINDOW_TYPE_DIALOG, WindowType::Dialog),
        (names::NET_WM_WINDOW_TYPE_UTILITY, WindowType::Utility),
        (names::NET_WM_WINDOW_TYPE_TOOLBAR, WindowType::Toolbar),
        (names::NET_WM_WINDOW_TYPE_SPLASH, WindowType::Splash),
        (names::NET_WM_WINDOW_TYPE_MENU, WindowType::Menu),
        (names::NET_WM_WINDOW_TYPE_DROPDOWN_MENU, WindowType::DropdownMenu),
        (names::NET_WM_WINDOW_TYPE_POPUP_MENU, WindowType::PopupMenu),
        (names::NET_WM_WINDOW_TYPE_TOOLTIP, WindowType::Tooltip),
        (names::NET_WM_WINDOW_TYPE_NOTIFICATION, WindowType::Notification),
        (names::NET_WM_WINDOW_TYPE_DOCK, WindowType::Dock),
        (names::NET_WM_WINDOW_TYPE_DESKTOP, WindowType::Desktop),
    ];
    // First recognised type wins; the list is in order of preference.
    types.iter().find_map(|&atom| {
        TYPES
            .iter()
            .find(|(name, _)| conn.atom(name) == atom)
            .map(|&(_, window_type)| window_type)
    })
}
