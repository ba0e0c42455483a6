//! Headless compositor
//!
//! Owns the shell dispatcher and plays the compositor's part without a
//! renderer: intents update a window list kept in stacking order, and
//! client events are logged since no native clients are connected.

use std::collections::VecDeque;

use calloop::PostAction;
use indexmap::IndexMap;
use tracing::{debug, error, info, trace};

use weft_core::config::Config;
use weft_core::state::{DeviceId, Geometry, OutputId};
use weft_core::{ClientEvent, CompositorEvent, Intent, ShellAction, ShellDispatcher, SurfaceId};

#[cfg(feature = "xwayland")]
pub type Wire = weft_xwayland::RustWire;
#[cfg(not(feature = "xwayland"))]
pub type Wire = weft_core::x11::NoX11;

/// The single output of the headless compositor.
pub const HEADLESS_OUTPUT: Geometry = Geometry::new(0, 0, 1920, 1080);
pub const POINTER: DeviceId = DeviceId(1);

/// What the compositor tracks per mapped surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowRecord {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub maximized: bool,
    pub minimized: bool,
}

pub struct Weft {
    pub shell: ShellDispatcher<Wire>,
    /// Mapped windows, bottom to top.
    pub windows: IndexMap<SurfaceId, WindowRecord>,
    pub focused: Option<SurfaceId>,
    pub should_exit: bool,
}

impl Weft {
    pub fn new(config: Config) -> Self {
        let mut weft = Self {
            shell: ShellDispatcher::new(config),
            windows: IndexMap::new(),
            focused: None,
            should_exit: false,
        };
        weft.feed(CompositorEvent::OutputAdded {
            id: OutputId(1),
            name: "headless-1".into(),
            geometry: HEADLESS_OUTPUT,
            available: HEADLESS_OUTPUT,
        });
        weft.feed(CompositorEvent::InputDeviceAdded {
            id: POINTER,
            default: true,
        });
        weft
    }

    /// Pass a compositor event to the shell and apply what comes back.
    pub fn feed(&mut self, event: CompositorEvent) {
        let actions = self.shell.handle_event(event);
        self.apply(actions);
    }

    /// Drain the X11 connection. Used as the socket's readiness callback.
    pub fn dispatch_x11(&mut self) -> PostAction {
        match self.shell.process_ready_events() {
            Ok(actions) => {
                self.apply(actions);
                PostAction::Continue
            },
            Err(err) => {
                error!("Lost the X11 server: {}", err);
                let cleanup = self.shell.drain_actions();
                self.apply(cleanup);
                self.should_exit = true;
                PostAction::Remove
            },
        }
    }

    /// Apply shell actions, including those caused by applying them.
    pub fn apply(&mut self, actions: Vec<ShellAction>) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            let follow_up = match action {
                ShellAction::Intent(intent) => self.apply_intent(intent),
                ShellAction::Client(event) => {
                    log_client_event(&event);
                    Vec::new()
                },
            };
            queue.extend(follow_up);
        }
    }

    fn apply_intent(&mut self, intent: Intent) -> Vec<ShellAction> {
        trace!("applying {:?}", intent);
        match intent {
            Intent::Map(surface) => {
                let geometry = self
                    .shell
                    .state()
                    .surface(surface)
                    .map(|s| s.geometry)
                    .unwrap_or_default();
                let record = self.windows.entry(surface).or_default();
                record.x = geometry.x;
                record.y = geometry.y;
                record.width = geometry.width;
                record.height = geometry.height;
                record.minimized = false;
                self.raise(surface);
                debug!("{} mapped at {:?}", surface, geometry);
            },
            Intent::Unmap(surface) => {
                self.windows.shift_remove(&surface);
                if self.focused == Some(surface) {
                    return self.focus_topmost();
                }
            },
            Intent::SetPosition { surface, x, y } => {
                if let Some(record) = self.windows.get_mut(&surface) {
                    record.x = x;
                    record.y = y;
                }
            },
            Intent::SetSize {
                surface,
                width,
                height,
            } => {
                if let Some(record) = self.windows.get_mut(&surface) {
                    record.width = width;
                    record.height = height;
                }
            },
            Intent::SetFullscreen {
                surface,
                fullscreen,
            } => {
                if let Some(record) = self.windows.get_mut(&surface) {
                    record.fullscreen = fullscreen;
                }
            },
            Intent::Maximize(surface) => {
                if let Some(record) = self.windows.get_mut(&surface) {
                    record.maximized = true;
                }
            },
            Intent::Unmaximize(surface) => {
                if let Some(record) = self.windows.get_mut(&surface) {
                    record.maximized = false;
                }
            },
            Intent::Minimize(surface) => {
                if let Some(record) = self.windows.get_mut(&surface) {
                    record.minimized = true;
                }
                if self.focused == Some(surface) {
                    return self.focus_topmost();
                }
            },
            Intent::TakeFocus(surface) => {
                if self.windows.contains_key(&surface) {
                    self.raise(surface);
                    return self.focus(Some(surface));
                }
            },
            Intent::PointerFocus { device, surface } => {
                debug!("pointer focus of {:?} now {:?}", device, surface);
            },
            Intent::ForwardButton {
                surface, button, ..
            } => {
                debug!("forwarding button {} to {}", button, surface);
            },
            Intent::ShowWindowMenu { surface, x, y, .. } => {
                info!("window menu for {} at {},{}", surface, x, y);
            },
            Intent::GrabEnded { device } => debug!("grab on {:?} ended", device),
        }
        Vec::new()
    }

    fn raise(&mut self, surface: SurfaceId) {
        if let Some(index) = self.windows.get_index_of(&surface) {
            let last = self.windows.len() - 1;
            self.windows.move_index(index, last);
        }
    }

    fn focus(&mut self, surface: Option<SurfaceId>) -> Vec<ShellAction> {
        if self.focused == surface {
            return Vec::new();
        }
        self.focused = surface;
        self.shell
            .handle_event(CompositorEvent::KeyboardFocus { surface })
    }

    fn focus_topmost(&mut self) -> Vec<ShellAction> {
        let next = self
            .windows
            .iter()
            .rev()
            .find(|(_, record)| !record.minimized)
            .map(|(&id, _)| id);
        self.focus(next)
    }
}

fn log_client_event(event: &ClientEvent) {
    match event {
        ClientEvent::ProtocolError {
            client, violation, ..
        } => error!("{} violated the protocol: {}", client, violation),
        event => debug!("client event {:?}", event),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use weft_core::surface::{ClientId, ObjectRef, RenderSurfaceId};
    use weft_core::{ShellRequest, SurfaceRequest};

    use super::*;

    const CLIENT: ClientId = ClientId(1);

    fn toplevel(weft: &mut Weft, id: u32) -> SurfaceId {
        let actions = weft.shell.handle_request(ShellRequest::GetXdgSurface {
            object: ObjectRef::new(CLIENT, id),
            surface: RenderSurfaceId(u64::from(id)),
        });
        weft.apply(actions);
        weft.shell
            .surface_for_object(ObjectRef::new(CLIENT, id))
            .unwrap()
    }

    fn request(weft: &mut Weft, id: u32, request: SurfaceRequest) {
        let actions = weft.shell.handle_request(ShellRequest::Surface {
            object: ObjectRef::new(CLIENT, id),
            request,
        });
        weft.apply(actions);
    }

    fn ack_latest(weft: &mut Weft, id: u32, surface: SurfaceId) {
        let s = weft.shell.state().surface(surface).unwrap();
        let serial = *s.pending.keys().next_back().unwrap();
        request(weft, id, SurfaceRequest::AckConfigure(serial));
    }

    #[test]
    fn new_toplevel_is_mapped_and_focused() {
        let mut weft = Weft::new(Config::default());
        let first = toplevel(&mut weft, 10);
        let second = toplevel(&mut weft, 11);

        let stacking: Vec<_> = weft.windows.keys().copied().collect();
        assert_eq!(stacking, vec![first, second]);
        assert_eq!(weft.focused, Some(second));
        ack_latest(&mut weft, 11, second);
        assert!(weft.shell.state().surface(second).unwrap().activated);
        assert!(!weft.shell.state().surface(first).unwrap().activated);
    }

    #[test]
    fn destroying_the_focused_window_focuses_the_next() {
        let mut weft = Weft::new(Config::default());
        let first = toplevel(&mut weft, 10);
        let second = toplevel(&mut weft, 11);

        request(&mut weft, 11, SurfaceRequest::Destroy);
        assert!(!weft.windows.contains_key(&second));
        assert_eq!(weft.focused, Some(first));
    }

    #[test]
    fn minimized_windows_are_skipped_for_focus() {
        let mut weft = Weft::new(Config::default());
        let first = toplevel(&mut weft, 10);
        toplevel(&mut weft, 11);

        request(&mut weft, 11, SurfaceRequest::SetMinimized);
        assert_eq!(weft.focused, Some(first));
        request(&mut weft, 10, SurfaceRequest::SetMinimized);
        assert_eq!(weft.focused, None);
    }

    #[test]
    fn maximize_is_tracked_after_ack() {
        let mut weft = Weft::new(Config::default());
        let surface = toplevel(&mut weft, 10);
        request(&mut weft, 10, SurfaceRequest::SetMaximized);
        assert!(!weft.windows[&surface].maximized);

        ack_latest(&mut weft, 10, surface);
        let record = &weft.windows[&surface];
        assert!(record.maximized);
        assert_eq!((record.width, record.height), (1920, 1080));
    }

    #[test]
    fn detached_shell_reports_failure() {
        let mut weft = Weft::new(Config::default());
        assert_eq!(weft.dispatch_x11(), PostAction::Remove);
        assert!(weft.should_exit);
    }
}
