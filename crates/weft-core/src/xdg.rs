//! Configure/acknowledge state machine for shell surfaces.
//!
//! Every geometry or window-state change goes through one ledger: the
//! server allocates a serial, records the [`ConfigureIntent`] under it and
//! sends a configure; the change is committed only when the client
//! acknowledges that serial. X11 windows use the same ledger, except the
//! dispatcher acknowledges on their behalf once the X11 configure is sent.

use tracing::{debug, trace};

use crate::event::{Intent, ShellAction};
use crate::state::{Geometry, OutputId, Point, Serial, ShellState, Size};
use crate::surface::{Interaction, ShellSurface, SurfaceId, WmState};

/// What a pending configure will change once acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigureIntent {
    /// Window state to enter.
    pub state: Option<WmState>,
    /// New top-left corner (the surface is being moved).
    pub position: Option<Point>,
    /// New size (the surface is being resized).
    pub size: Option<Size>,
    /// New activation (keyboard focus) flag.
    pub active: Option<bool>,
}

impl ConfigureIntent {
    /// Enter `state` at `geometry`.
    pub const fn enter(state: WmState, geometry: Geometry) -> Self {
        Self {
            state: Some(state),
            position: Some(geometry.origin()),
            size: Some(geometry.size()),
            active: None,
        }
    }

    pub const fn activation(active: bool) -> Self {
        Self {
            state: None,
            position: None,
            size: None,
            active: Some(active),
        }
    }

    pub const fn is_moving(&self) -> bool {
        self.position.is_some()
    }

    pub const fn is_resizing(&self) -> bool {
        self.size.is_some()
    }
}

/// States carried by a toplevel configure event. Values follow the wire
/// enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum ToplevelState {
    Maximized = 1,
    Fullscreen = 2,
    Resizing = 3,
    Activated = 4,
}

/// A configure queued for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configure {
    pub surface: SurfaceId,
    pub serial: Serial,
    /// Zero when no resize is required.
    pub width: u32,
    pub height: u32,
    pub states: Vec<ToplevelState>,
    /// Target state and geometry, used when applying the configure to an
    /// X11 window.
    pub target_state: WmState,
    pub target_geometry: Geometry,
}

fn toplevel_states(state: WmState, active: bool, resizing: bool) -> Vec<ToplevelState> {
    let mut states = Vec::new();
    match state {
        WmState::Maximized => states.push(ToplevelState::Maximized),
        WmState::Fullscreen => states.push(ToplevelState::Fullscreen),
        WmState::Withdrawn | WmState::Normal => {}
    }
    if resizing {
        states.push(ToplevelState::Resizing);
    }
    if active {
        states.push(ToplevelState::Activated);
    }
    states
}

/// The pending-change ledger driver. Per-surface ledgers live on
/// [`ShellSurface::pending`]; this holds the outgoing configure queue.
#[derive(Debug, Default)]
pub struct XdgStateMachine {
    outgoing: Vec<Configure>,
}

impl XdgStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain configures queued since the last call.
    pub fn take_configures(&mut self) -> Vec<Configure> {
        std::mem::take(&mut self.outgoing)
    }

    /// Allocate a serial, record `intent` under it and queue a configure.
    ///
    /// Returns `None` when the surface is gone or is not a toplevel.
    pub fn request_configure(
        &mut self,
        state: &mut ShellState,
        surface: SurfaceId,
        intent: ConfigureIntent,
    ) -> Option<Serial> {
        let ShellState {
            surfaces, serials, ..
        } = state;
        let Some(s) = surfaces.get_mut(&surface) else {
            trace!("configure for destroyed {}", surface);
            return None;
        };
        if !s.is_toplevel() {
            trace!("ignoring configure for non-toplevel {}", surface);
            return None;
        }

        let serial = serials.next_serial();
        let target_state = intent.state.unwrap_or_else(|| s.effective_state());
        let active = intent.active.unwrap_or_else(|| effective_active(s));
        let resizing = s.interaction.contains(Interaction::RESIZING);
        let (width, height) = intent
            .size
            .map_or((0, 0), |size| (size.width, size.height));
        let target_geometry = Geometry::from_parts(
            intent.position.unwrap_or_else(|| s.geometry.origin()),
            intent.size.unwrap_or_else(|| s.geometry.size()),
        );

        // The entry records the activation this configure advertises.
        s.pending.insert(
            serial,
            ConfigureIntent {
                active: Some(active),
                ..intent
            },
        );
        debug!(
            "configure {} {}: {}x{} {:?} active={}",
            surface, serial, width, height, target_state, active
        );

        self.outgoing.push(Configure {
            surface,
            serial,
            width,
            height,
            states: toplevel_states(target_state, active, resizing),
            target_state,
            target_geometry,
        });
        Some(serial)
    }

    /// Commit the change recorded under `serial`.
    ///
    /// Unknown, duplicate and stale serials are ignored. Only the matching
    /// entry is committed; older entries the client skipped are discarded
    /// uncommitted and newer ones stay pending.
    pub fn ack_configure(
        &mut self,
        state: &mut ShellState,
        surface: SurfaceId,
        serial: Serial,
        out: &mut Vec<ShellAction>,
    ) -> bool {
        let Some(s) = state.surfaces.get_mut(&surface) else {
            trace!("ack {} for destroyed {}", serial, surface);
            return false;
        };
        if !s.pending.contains_key(&serial) {
            trace!("ack for unknown {} on {}", serial, surface);
            return false;
        }

        let newer = s.pending.split_off(&Serial(serial.0 + 1));
        let mut acked = std::mem::replace(&mut s.pending, newer);
        let Some(intent) = acked.remove(&serial) else {
            return false;
        };
        for skipped in acked.keys() {
            trace!("dropping skipped {} on {}", skipped, surface);
        }
        trace!("commit {} on {}", serial, surface);
        commit(s, intent, out);
        true
    }

    pub fn set_maximized(&mut self, state: &mut ShellState, surface: SurfaceId) -> Option<Serial> {
        let s = manageable(state, surface)?;
        if s.effective_state() == WmState::Maximized {
            debug!("{} already maximized", surface);
            return None;
        }
        let Some(area) = state.output(None).map(|output| output.available) else {
            debug!("no output to maximize {} on", surface);
            return None;
        };
        self.request_configure(state, surface, ConfigureIntent::enter(WmState::Maximized, area))
    }

    pub fn unset_maximized(&mut self, state: &mut ShellState, surface: SurfaceId) -> Option<Serial> {
        let s = manageable(state, surface)?;
        if s.effective_state() != WmState::Maximized {
            return None;
        }
        let intent = restore_intent(s);
        self.request_configure(state, surface, intent)
    }

    pub fn set_fullscreen(
        &mut self,
        state: &mut ShellState,
        surface: SurfaceId,
        output: Option<OutputId>,
    ) -> Option<Serial> {
        let s = manageable(state, surface)?;
        if s.effective_state() == WmState::Fullscreen {
            debug!("{} already fullscreen", surface);
            return None;
        }
        let Some(area) = state.output(output).map(|output| output.geometry) else {
            debug!("no output to fullscreen {} on", surface);
            return None;
        };
        self.request_configure(state, surface, ConfigureIntent::enter(WmState::Fullscreen, area))
    }

    pub fn unset_fullscreen(&mut self, state: &mut ShellState, surface: SurfaceId) -> Option<Serial> {
        let s = manageable(state, surface)?;
        if s.effective_state() != WmState::Fullscreen {
            return None;
        }
        let intent = restore_intent(s);
        self.request_configure(state, surface, intent)
    }

    /// Send a pure activation change (0x0 configure).
    pub fn set_activated(
        &mut self,
        state: &mut ShellState,
        surface: SurfaceId,
        active: bool,
    ) -> Option<Serial> {
        let s = state.surface(surface)?;
        if effective_active(s) == active {
            return None;
        }
        self.request_configure(state, surface, ConfigureIntent::activation(active))
    }
}

/// Minimize is a one-way flag outside [`WmState`]; no configure round.
pub fn set_minimized(state: &mut ShellState, surface: SurfaceId, out: &mut Vec<ShellAction>) {
    if let Some(s) = state.surface_mut(surface) {
        if !s.minimized {
            s.minimized = true;
            out.push(ShellAction::Intent(Intent::Minimize(surface)));
        }
    }
}

pub fn set_title(state: &mut ShellState, surface: SurfaceId, title: String) {
    if let Some(s) = state.surface_mut(surface) {
        s.title = title;
    }
}

pub fn set_app_id(state: &mut ShellState, surface: SurfaceId, app_id: String) {
    if let Some(s) = state.surface_mut(surface) {
        s.app_id = app_id;
    }
}

pub fn set_window_geometry(state: &mut ShellState, surface: SurfaceId, geometry: Geometry) {
    if let Some(s) = state.surface_mut(surface) {
        s.window_geometry = Some(geometry);
    }
}

/// Set the transient parent. A parent chain that would loop back to the
/// surface is refused.
pub fn set_parent(state: &mut ShellState, surface: SurfaceId, parent: Option<SurfaceId>) -> bool {
    let mut cursor = parent;
    while let Some(ancestor) = cursor {
        if ancestor == surface {
            debug!("refusing parent loop through {}", surface);
            return false;
        }
        cursor = state.surface(ancestor).and_then(|a| a.transient_parent);
    }
    match state.surface_mut(surface) {
        Some(s) => {
            s.transient_parent = parent;
            true
        }
        None => false,
    }
}

fn manageable(state: &ShellState, surface: SurfaceId) -> Option<&ShellSurface> {
    let s = state.surface(surface)?;
    if !s.is_toplevel() || s.is_override_redirect() || s.wm_state == WmState::Withdrawn {
        trace!("{} is not a managed toplevel", surface);
        return None;
    }
    Some(s)
}

fn effective_active(s: &ShellSurface) -> bool {
    s.pending
        .values()
        .rev()
        .find_map(|intent| intent.active)
        .unwrap_or(s.activated)
}

/// Intent restoring the state and geometry saved before the last transition.
fn restore_intent(s: &ShellSurface) -> ConfigureIntent {
    let state = match s.saved_wm_state {
        Some(WmState::Withdrawn) | None => WmState::Normal,
        Some(saved) => saved,
    };
    ConfigureIntent::enter(state, s.saved_geometry.unwrap_or(s.geometry))
}

fn commit(s: &mut ShellSurface, intent: ConfigureIntent, out: &mut Vec<ShellAction>) {
    if let Some(new_state) = intent.state.filter(|&new_state| new_state != s.wm_state) {
        let previous = s.wm_state;
        s.saved_wm_state = Some(previous);
        s.saved_geometry = Some(s.geometry);
        s.wm_state = new_state;

        if previous == WmState::Fullscreen {
            out.push(ShellAction::Intent(Intent::SetFullscreen {
                surface: s.id,
                fullscreen: false,
            }));
        } else if previous == WmState::Maximized {
            out.push(ShellAction::Intent(Intent::Unmaximize(s.id)));
        }
        match new_state {
            WmState::Maximized => out.push(ShellAction::Intent(Intent::Maximize(s.id))),
            WmState::Fullscreen => out.push(ShellAction::Intent(Intent::SetFullscreen {
                surface: s.id,
                fullscreen: true,
            })),
            WmState::Withdrawn | WmState::Normal => {}
        }
    }

    if let Some(position) = intent.position {
        if position != s.geometry.origin() {
            s.geometry.x = position.x;
            s.geometry.y = position.y;
            out.push(ShellAction::Intent(Intent::SetPosition {
                surface: s.id,
                x: position.x,
                y: position.y,
            }));
        }
    }
    if let Some(size) = intent.size {
        if size != s.geometry.size() {
            s.geometry.width = size.width;
            s.geometry.height = size.height;
            out.push(ShellAction::Intent(Intent::SetSize {
                surface: s.id,
                width: size.width,
                height: size.height,
            }));
        }
    }
    if let Some(active) = intent.active {
        s.activated = active;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Config;
    use crate::state::Output;
    use crate::surface::{ClientId, ObjectRef, RenderSurfaceId, SurfaceRole};

    fn state_with_toplevel() -> (ShellState, SurfaceId) {
        let mut state = ShellState::new(Config::default());
        state.outputs.insert(
            OutputId(1),
            Output {
                id: OutputId(1),
                name: "test-output".into(),
                geometry: Geometry::new(0, 0, 1920, 1080),
                available: Geometry::new(0, 30, 1920, 1050),
            },
        );
        let id = state.next_surface_id();
        let mut surface = ShellSurface::new_native(
            id,
            ObjectRef::new(ClientId(1), 5),
            RenderSurfaceId(9),
            SurfaceRole::Toplevel,
        );
        surface.geometry = Geometry::new(100, 80, 640, 480);
        state.insert_surface(surface);
        (state, id)
    }

    #[test]
    fn activation_configure_carries_no_size() {
        let (mut state, id) = state_with_toplevel();
        let mut xdg = XdgStateMachine::new();

        let serial = xdg.set_activated(&mut state, id, true).unwrap();
        let configures = xdg.take_configures();
        assert_eq!(configures.len(), 1);
        assert_eq!(configures[0].serial, serial);
        assert_eq!((configures[0].width, configures[0].height), (0, 0));
        assert_eq!(configures[0].states, vec![ToplevelState::Activated]);

        // Same activation again is a no-op while still pending.
        assert!(xdg.set_activated(&mut state, id, true).is_none());
    }

    #[test]
    fn maximize_commits_only_on_ack() {
        let (mut state, id) = state_with_toplevel();
        let mut xdg = XdgStateMachine::new();
        let mut out = Vec::new();

        let serial = xdg.set_maximized(&mut state, id).unwrap();
        let configure = xdg.take_configures().remove(0);
        assert_eq!((configure.width, configure.height), (1920, 1050));
        assert_eq!(configure.states, vec![ToplevelState::Maximized]);
        assert_eq!(state.surface(id).unwrap().wm_state, WmState::Normal);

        assert!(xdg.ack_configure(&mut state, id, serial, &mut out));
        let surface = state.surface(id).unwrap();
        assert_eq!(surface.wm_state, WmState::Maximized);
        assert_eq!(surface.geometry, Geometry::new(0, 30, 1920, 1050));
        assert_eq!(surface.saved_wm_state, Some(WmState::Normal));
        assert_eq!(surface.saved_geometry, Some(Geometry::new(100, 80, 640, 480)));
        assert!(out.contains(&ShellAction::Intent(Intent::Maximize(id))));
    }

    #[test]
    fn ack_commits_only_its_own_entry() {
        let (mut state, id) = state_with_toplevel();
        let mut xdg = XdgStateMachine::new();
        let mut out = Vec::new();

        let maximize = xdg.set_maximized(&mut state, id).unwrap();
        let fullscreen = xdg.set_fullscreen(&mut state, id, None).unwrap();
        let activate = xdg.set_activated(&mut state, id, true).unwrap();
        assert!(xdg.ack_configure(&mut state, id, fullscreen, &mut out));

        let surface = state.surface(id).unwrap();
        assert_eq!(surface.wm_state, WmState::Fullscreen);
        assert_eq!(surface.saved_wm_state, Some(WmState::Normal));
        assert_eq!(surface.saved_geometry, Some(Geometry::new(100, 80, 640, 480)));
        assert!(!out.contains(&ShellAction::Intent(Intent::Maximize(id))));
        assert!(!surface.activated);
        assert_eq!(surface.pending.keys().copied().collect::<Vec<_>>(), vec![activate]);

        // The skipped maximize is gone for good.
        assert!(!xdg.ack_configure(&mut state, id, maximize, &mut out));
        assert!(xdg.ack_configure(&mut state, id, activate, &mut out));
        let surface = state.surface(id).unwrap();
        assert!(surface.activated);
        assert_eq!(surface.wm_state, WmState::Fullscreen);
    }

    #[test]
    fn configure_entries_remember_the_advertised_activation() {
        let (mut state, id) = state_with_toplevel();
        let mut xdg = XdgStateMachine::new();
        let mut out = Vec::new();

        xdg.set_activated(&mut state, id, true).unwrap();
        let maximize = xdg.set_maximized(&mut state, id).unwrap();
        let configure = xdg.take_configures().remove(1);
        assert_eq!(
            configure.states,
            vec![ToplevelState::Maximized, ToplevelState::Activated]
        );

        // Acking the newer configure alone still commits what it showed.
        assert!(xdg.ack_configure(&mut state, id, maximize, &mut out));
        let surface = state.surface(id).unwrap();
        assert!(surface.activated);
        assert_eq!(surface.wm_state, WmState::Maximized);
    }

    #[test]
    fn popups_get_no_toplevel_configure() {
        let (mut state, parent) = state_with_toplevel();
        let popup = state.next_surface_id();
        state.insert_surface(ShellSurface::new_native(
            popup,
            ObjectRef::new(ClientId(1), 6),
            RenderSurfaceId(10),
            SurfaceRole::Popup {
                parent,
                serial: Serial(1),
                device: crate::state::DeviceId(0),
                offset: Point::new(5, 5),
            },
        ));
        let mut xdg = XdgStateMachine::new();
        assert!(xdg.set_maximized(&mut state, popup).is_none());
        assert!(xdg.take_configures().is_empty());
    }

    #[test]
    fn parent_loops_are_refused() {
        let (mut state, a) = state_with_toplevel();
        let b = state.next_surface_id();
        state.insert_surface(ShellSurface::new_native(
            b,
            ObjectRef::new(ClientId(1), 7),
            RenderSurfaceId(11),
            SurfaceRole::Toplevel,
        ));
        assert!(set_parent(&mut state, b, Some(a)));
        assert!(!set_parent(&mut state, a, Some(b)));
        assert!(!set_parent(&mut state, a, Some(a)));
        assert_eq!(state.surface(a).unwrap().transient_parent, None);
    }
}
