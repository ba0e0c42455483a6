//! Exclusive per-device pointer grabs.
//!
//! A device holds at most one grab: an interactive move, an interactive
//! resize, or a popup grab covering a stack of nested popups. Starting a
//! grab while one is active is rejected, never queued.

use bitflags::bitflags;
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::event::{ClientEvent, Intent, ShellAction};
use crate::state::{DeviceId, Geometry, Point, Serial, ShellState, Size};
use crate::surface::{ClientId, Interaction, SizeHints, SurfaceId, SurfaceRole, WmState};
use crate::xdg::{ConfigureIntent, XdgStateMachine};

bitflags! {
    /// Edges being dragged. Values match the wire enum.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResizeEdges: u8 {
        const TOP    = 0b0001;
        const BOTTOM = 0b0010;
        const LEFT   = 0b0100;
        const RIGHT  = 0b1000;
    }
}

impl ResizeEdges {
    /// Validate edges from a client request. Rejects none, unknown bits and
    /// opposite edges.
    pub fn from_wire(edges: u32) -> Option<Self> {
        let edges = u8::try_from(edges).ok().and_then(Self::from_bits)?;
        if edges.is_empty()
            || edges.contains(Self::TOP | Self::BOTTOM)
            || edges.contains(Self::LEFT | Self::RIGHT)
        {
            return None;
        }
        Some(edges)
    }

    /// Edges for a `_NET_WM_MOVERESIZE` direction (0 = top-left, clockwise
    /// to 7 = left).
    pub const fn from_moveresize_direction(direction: u32) -> Option<Self> {
        Some(match direction {
            0 => Self::TOP.union(Self::LEFT),
            1 => Self::TOP,
            2 => Self::TOP.union(Self::RIGHT),
            3 => Self::RIGHT,
            4 => Self::BOTTOM.union(Self::RIGHT),
            5 => Self::BOTTOM,
            6 => Self::BOTTOM.union(Self::LEFT),
            7 => Self::LEFT,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GrabKind {
    Move {
        surface: SurfaceId,
        /// Pointer position relative to the surface origin.
        offset: (f64, f64),
    },
    Resize {
        surface: SurfaceId,
        edges: ResizeEdges,
        initial_pointer: (f64, f64),
        initial_geometry: Geometry,
    },
    Popup {
        /// Creation order; dismissed in this order.
        popups: Vec<SurfaceId>,
        /// Whether the button that opened the first popup has been released.
        initial_button_up: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrabSession {
    pub device: DeviceId,
    pub client: Option<ClientId>,
    pub serial: Serial,
    pub started_ms: u32,
    pub kind: GrabKind,
}

impl GrabSession {
    /// Surfaces this grab refers to.
    pub fn surfaces(&self) -> Vec<SurfaceId> {
        match &self.kind {
            GrabKind::Move { surface, .. } | GrabKind::Resize { surface, .. } => vec![*surface],
            GrabKind::Popup { popups, .. } => popups.clone(),
        }
    }
}

/// Outcome of a button event seen by the grab controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonRouting {
    /// No grab on the device; normal delivery.
    Unhandled,
    /// Consumed by the grab.
    Consumed,
}

#[derive(Debug, Default)]
pub struct GrabController {
    sessions: IndexMap<DeviceId, GrabSession>,
}

impl GrabController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, device: DeviceId) -> Option<&GrabSession> {
        self.sessions.get(&device)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &GrabSession> {
        self.sessions.values()
    }

    pub fn is_grabbed(&self, device: DeviceId) -> bool {
        self.sessions.contains_key(&device)
    }

    /// Begin an interactive move of `surface` with `device`'s pointer.
    pub fn start_move(&mut self, state: &mut ShellState, surface: SurfaceId, device: DeviceId) -> bool {
        if self.is_grabbed(device) {
            warn!("Rejecting move of {}: {} already grabbed", surface, device);
            return false;
        }
        let Some(s) = state.surface(surface) else {
            trace!("move of destroyed {}", surface);
            return false;
        };
        if !s.is_toplevel() || s.is_override_redirect() {
            warn!("Rejecting move of unmanaged {}", surface);
            return false;
        }
        if s.effective_state() == WmState::Fullscreen {
            warn!("Rejecting move of fullscreen {}", surface);
            return false;
        }

        let origin = s.geometry.origin();
        let client = state.client_of(surface);
        let dev = state.device_mut(device);
        let session = GrabSession {
            device,
            client,
            serial: dev.pointer_grab_serial,
            started_ms: dev.last_time_ms,
            kind: GrabKind::Move {
                surface,
                offset: (
                    dev.pointer.0 - f64::from(origin.x),
                    dev.pointer.1 - f64::from(origin.y),
                ),
            },
        };
        if let Some(s) = state.surface_mut(surface) {
            s.interaction.insert(Interaction::MOVING);
        }
        debug!("{} grabbed for move by {}", surface, device);
        self.sessions.insert(device, session);
        true
    }

    /// Begin an interactive resize. `edges` must already be validated.
    pub fn start_resize(
        &mut self,
        state: &mut ShellState,
        xdg: &mut XdgStateMachine,
        surface: SurfaceId,
        device: DeviceId,
        edges: ResizeEdges,
    ) -> bool {
        if self.is_grabbed(device) {
            warn!("Rejecting resize of {}: {} already grabbed", surface, device);
            return false;
        }
        let Some(s) = state.surface(surface) else {
            trace!("resize of destroyed {}", surface);
            return false;
        };
        if !s.is_toplevel() || s.is_override_redirect() {
            warn!("Rejecting resize of unmanaged {}", surface);
            return false;
        }
        if matches!(s.effective_state(), WmState::Maximized | WmState::Fullscreen) {
            warn!("Rejecting resize of {} in {:?}", surface, s.effective_state());
            return false;
        }

        let initial_geometry = s.effective_geometry();
        let client = state.client_of(surface);
        let dev = state.device_mut(device);
        let session = GrabSession {
            device,
            client,
            serial: dev.pointer_grab_serial,
            started_ms: dev.last_time_ms,
            kind: GrabKind::Resize {
                surface,
                edges,
                initial_pointer: dev.pointer,
                initial_geometry,
            },
        };
        if let Some(s) = state.surface_mut(surface) {
            s.interaction.insert(Interaction::RESIZING);
        }
        debug!("{} grabbed for resize {:?} by {}", surface, edges, device);
        self.sessions.insert(device, session);

        // Tell the client it is being resized.
        xdg.request_configure(
            state,
            surface,
            ConfigureIntent {
                size: Some(initial_geometry.size()),
                ..ConfigureIntent::default()
            },
        );
        true
    }

    /// Follow the pointer. Returns the surface whose position was committed
    /// directly (moves), so X11 windows can be told.
    pub fn pointer_motion(
        &mut self,
        state: &mut ShellState,
        xdg: &mut XdgStateMachine,
        device: DeviceId,
        under: Option<SurfaceId>,
        out: &mut Vec<ShellAction>,
    ) -> Option<SurfaceId> {
        let (x, y) = state.device(device)?.pointer;
        let session = self.sessions.get(&device)?;
        match session.kind.clone() {
            GrabKind::Move { surface, offset } => {
                let s = state.surface_mut(surface)?;
                let origin = Point::new((x - offset.0) as i32, (y - offset.1) as i32);
                if origin == s.geometry.origin() {
                    return None;
                }
                s.geometry.x = origin.x;
                s.geometry.y = origin.y;
                out.push(ShellAction::Intent(Intent::SetPosition {
                    surface,
                    x: origin.x,
                    y: origin.y,
                }));
                Some(surface)
            },
            GrabKind::Resize {
                surface,
                edges,
                initial_pointer,
                initial_geometry,
            } => {
                let s = state.surface(surface)?;
                let min = (state.config.grab.min_width, state.config.grab.min_height);
                let target = resize_geometry(
                    initial_geometry,
                    edges,
                    ((x - initial_pointer.0) as i32, (y - initial_pointer.1) as i32),
                    min,
                    &s.size_hints,
                );
                if target != s.effective_geometry() {
                    let position = edges
                        .intersects(ResizeEdges::LEFT | ResizeEdges::TOP)
                        .then_some(target.origin());
                    xdg.request_configure(
                        state,
                        surface,
                        ConfigureIntent {
                            position,
                            size: Some(target.size()),
                            ..ConfigureIntent::default()
                        },
                    );
                }
                None
            },
            GrabKind::Popup { .. } => {
                let client = session.client;
                let focus = under.filter(|&surface| client.is_some() && state.client_of(surface) == client);
                let dev = state.device_mut(device);
                if dev.pointer_focus != focus {
                    dev.pointer_focus = focus;
                    out.push(ShellAction::Intent(Intent::PointerFocus {
                        device,
                        surface: focus,
                    }));
                }
                None
            },
        }
    }

    /// Route a button event. Device button state must already reflect it.
    pub fn pointer_button(
        &mut self,
        state: &mut ShellState,
        xdg: &mut XdgStateMachine,
        device: DeviceId,
        button: u32,
        pressed: bool,
        target: Option<SurfaceId>,
        out: &mut Vec<ShellAction>,
    ) -> ButtonRouting {
        let Some(session) = self.sessions.get_mut(&device) else {
            return ButtonRouting::Unhandled;
        };
        let (time_ms, still_pressed) = state
            .device(device)
            .map_or((0, false), |dev| (dev.last_time_ms, dev.button_pressed()));

        let end = match &mut session.kind {
            GrabKind::Move { .. } | GrabKind::Resize { .. } => !pressed && !still_pressed,
            GrabKind::Popup {
                initial_button_up, ..
            } => {
                let client = session.client;
                let inside = target
                    .filter(|&surface| client.is_some() && state.client_of(surface) == client);
                if let Some(surface) = inside {
                    out.push(ShellAction::Intent(Intent::ForwardButton {
                        device,
                        surface,
                        button,
                        pressed,
                        time_ms,
                    }));
                }
                if !pressed {
                    *initial_button_up = true;
                    false
                } else if inside.is_none() {
                    let elapsed = time_ms.wrapping_sub(session.started_ms);
                    let delay = state.config.grab.popup_dismiss_delay_ms;
                    *initial_button_up || elapsed > delay
                } else {
                    false
                }
            },
        };
        if end {
            debug!("Grab on {} released", device);
            self.end(state, xdg, device, out);
        }
        ButtonRouting::Consumed
    }

    /// Add a popup to `device`'s popup grab, starting one if needed.
    ///
    /// A popup whose serial does not match the running session is dismissed
    /// at once. Returns whether the popup joined the grab.
    pub fn add_popup(
        &mut self,
        state: &mut ShellState,
        device: DeviceId,
        popup: SurfaceId,
        out: &mut Vec<ShellAction>,
    ) -> bool {
        let Some(SurfaceRole::Popup { serial, .. }) = state.surface(popup).map(|s| s.role) else {
            return false;
        };
        let client = state.client_of(popup);

        match self.sessions.get_mut(&device) {
            Some(GrabSession {
                serial: session_serial,
                kind: GrabKind::Popup { popups, .. },
                ..
            }) => {
                if serial != *session_serial {
                    trace!(
                        "popup {} with {} outside grab {}, dismissing",
                        popup,
                        serial,
                        session_serial
                    );
                    popup_done(state, popup, out);
                    return false;
                }
                popups.push(popup);
            },
            Some(_) => {
                warn!("Dismissing popup {}: {} holds another grab", popup, device);
                popup_done(state, popup, out);
                return false;
            },
            None => {
                let dev = state.device_mut(device);
                let session = GrabSession {
                    device,
                    client,
                    serial: dev.pointer_grab_serial,
                    started_ms: dev.last_time_ms,
                    kind: GrabKind::Popup {
                        popups: vec![popup],
                        initial_button_up: !dev.button_pressed(),
                    },
                };
                debug!("popup grab on {} for {}", device, popup);
                self.sessions.insert(device, session);
            },
        }
        true
    }

    /// Forget a popup; the grab ends with its last popup.
    pub fn remove_popup(&mut self, popup: SurfaceId, out: &mut Vec<ShellAction>) {
        let mut emptied = Vec::new();
        for session in self.sessions.values_mut() {
            if let GrabKind::Popup { popups, .. } = &mut session.kind {
                popups.retain(|&p| p != popup);
                if popups.is_empty() {
                    emptied.push(session.device);
                }
            }
        }
        for device in emptied {
            self.sessions.shift_remove(&device);
            out.push(ShellAction::Intent(Intent::GrabEnded { device }));
        }
    }

    /// End `device`'s grab, if any.
    pub fn end(
        &mut self,
        state: &mut ShellState,
        xdg: &mut XdgStateMachine,
        device: DeviceId,
        out: &mut Vec<ShellAction>,
    ) {
        let Some(session) = self.sessions.shift_remove(&device) else {
            return;
        };
        match session.kind {
            GrabKind::Move { surface, .. } => {
                if let Some(s) = state.surface_mut(surface) {
                    s.interaction.remove(Interaction::MOVING);
                }
            },
            GrabKind::Resize { surface, .. } => {
                if let Some(s) = state.surface_mut(surface) {
                    s.interaction.remove(Interaction::RESIZING);
                    // Final configure without the resizing state.
                    let size = s.effective_geometry().size();
                    xdg.request_configure(
                        state,
                        surface,
                        ConfigureIntent {
                            size: Some(size),
                            ..ConfigureIntent::default()
                        },
                    );
                }
            },
            GrabKind::Popup { popups, .. } => {
                for popup in popups {
                    popup_done(state, popup, out);
                }
                state.device_mut(device).pointer_focus = None;
            },
        }
        debug!("grab on {} ended", device);
        out.push(ShellAction::Intent(Intent::GrabEnded { device }));
    }

    /// End or shrink every grab referring to `surface`.
    pub fn surface_destroyed(
        &mut self,
        state: &mut ShellState,
        xdg: &mut XdgStateMachine,
        surface: SurfaceId,
        out: &mut Vec<ShellAction>,
    ) {
        let devices: Vec<DeviceId> = self
            .sessions
            .values()
            .filter(|session| {
                matches!(
                    session.kind,
                    GrabKind::Move { surface: s, .. } | GrabKind::Resize { surface: s, .. } if s == surface
                )
            })
            .map(|session| session.device)
            .collect();
        for device in devices {
            self.end(state, xdg, device, out);
        }
        self.remove_popup(surface, out);
    }

    /// End every grab held by `client`.
    pub fn client_gone(
        &mut self,
        state: &mut ShellState,
        xdg: &mut XdgStateMachine,
        client: ClientId,
        out: &mut Vec<ShellAction>,
    ) {
        let devices: Vec<DeviceId> = self
            .sessions
            .values()
            .filter(|session| session.client == Some(client))
            .map(|session| session.device)
            .collect();
        for device in devices {
            self.end(state, xdg, device, out);
        }
    }
}

fn popup_done(state: &ShellState, popup: SurfaceId, out: &mut Vec<ShellAction>) {
    if let Some(object) = state.surface(popup).and_then(|s| s.native_object()) {
        out.push(ShellAction::Client(ClientEvent::PopupDone { object }));
    }
}

/// New geometry for a resize by `delta` from `initial`. Left and top edges
/// move the origin so the opposite edge stays put.
pub fn resize_geometry(
    initial: Geometry,
    edges: ResizeEdges,
    delta: (i32, i32),
    min: (u32, u32),
    hints: &SizeHints,
) -> Geometry {
    let (dx, dy) = delta;
    let mut width = clamp_i32(initial.width);
    let mut height = clamp_i32(initial.height);

    if edges.contains(ResizeEdges::RIGHT) {
        width = width.saturating_add(dx);
    } else if edges.contains(ResizeEdges::LEFT) {
        width = width.saturating_sub(dx);
    }
    if edges.contains(ResizeEdges::BOTTOM) {
        height = height.saturating_add(dy);
    } else if edges.contains(ResizeEdges::TOP) {
        height = height.saturating_sub(dy);
    }

    let width = width.max(clamp_i32(min.0.max(1))).unsigned_abs();
    let height = height.max(clamp_i32(min.1.max(1))).unsigned_abs();
    let (width, height) = hints.constrain(width, height);
    let size = Size::new(width.max(min.0.max(1)), height.max(min.1.max(1)));

    let x = if edges.contains(ResizeEdges::LEFT) {
        initial
            .x
            .saturating_add(clamp_i32(initial.width))
            .saturating_sub(clamp_i32(size.width))
    } else {
        initial.x
    };
    let y = if edges.contains(ResizeEdges::TOP) {
        initial
            .y
            .saturating_add(clamp_i32(initial.height))
            .saturating_sub(clamp_i32(size.height))
    } else {
        initial.y
    };
    Geometry::from_parts(Point::new(x, y), size)
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
