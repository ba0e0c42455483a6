//! Shared test support: an in-memory X11 server behind [`X11Wire`].
//!
//! The dispatcher owns the wire, so [`FakeWire`] is a handle onto a shared
//! [`FakeServer`] that tests keep to queue events and inspect requests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use weft_core::config::Config;
use weft_core::state::{DeviceId, Geometry, OutputId};
use weft_core::surface::ClientId;
use weft_core::x11::{
    Atom, EventMask, RawProperty, ScreenInfo, SetupInfo, Window, WindowConfig, WireError,
    X11Wire, XEvent,
};
use weft_core::{CompositorEvent, ShellAction, ShellDispatcher};

pub const ROOT: Window = 0x1e0;
pub const RESOURCE_BASE: u32 = 0x0040_0000;
pub const RESOURCE_MASK: u32 = 0x001f_ffff;
pub const XWAYLAND_CLIENT: ClientId = ClientId(99);
pub const POINTER: DeviceId = DeviceId(1);

/// A request as seen by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Req {
    CreateInputWindow { window: Window, parent: Window },
    DestroyWindow(Window),
    Map(Window),
    Unmap(Window),
    Configure { window: Window, config: WindowConfig },
    EventMask { window: Window, mask: EventMask },
    ConfigureNotify { window: Window, x: i32, y: i32, width: u32, height: u32 },
    ClientMessage { destination: Window, type_: Atom, data: [u32; 5] },
    SelectionOwner { owner: Window, selection: Atom },
    InputFocus(Window),
    KillClient(u32),
    Redirect(Window),
    ChangeProperty { window: Window, property: Atom },
    DeleteProperty { window: Window, property: Atom },
}

#[derive(Debug)]
pub struct FakeServer {
    pub requests: Vec<Req>,
    pub events: VecDeque<XEvent>,
    pub properties: HashMap<(Window, Atom), RawProperty>,
    pub flushes: usize,
    pub composite: bool,
    /// Every request fails with `Closed` once set.
    pub broken: bool,
    /// Names the server refuses to intern.
    pub failing_atoms: HashSet<String>,
    atoms: HashMap<String, Atom>,
    tokens: HashMap<u64, String>,
    next_atom: Atom,
    next_token: u64,
    next_resource: u32,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self {
            requests: Vec::new(),
            events: VecDeque::new(),
            properties: HashMap::new(),
            flushes: 0,
            composite: true,
            broken: false,
            failing_atoms: HashSet::new(),
            atoms: HashMap::new(),
            tokens: HashMap::new(),
            next_atom: 100,
            next_token: 1,
            next_resource: 1,
        }
    }
}

impl FakeServer {
    /// The atom the server assigns to `name`, interning it if needed.
    pub fn atom(&mut self, name: &str) -> Atom {
        if let Some(&atom) = self.atoms.get(name) {
            return atom;
        }
        let atom = self.next_atom;
        self.next_atom += 1;
        self.atoms.insert(name.to_string(), atom);
        atom
    }

    pub fn push(&mut self, event: XEvent) {
        self.events.push_back(event);
    }

    pub fn take_requests(&mut self) -> Vec<Req> {
        std::mem::take(&mut self.requests)
    }

    pub fn set_property(&mut self, window: Window, property: Atom, value: RawProperty) {
        self.properties.insert((window, property), value);
    }

    pub fn property(&self, window: Window, property: Atom) -> Option<&RawProperty> {
        self.properties.get(&(window, property))
    }

    /// 32-bit values of a property, if set in that format.
    pub fn property32(&self, window: Window, property: Atom) -> Option<Vec<u32>> {
        self.property(window, property)
            .and_then(|raw| raw.value32())
            .map(|values| values.collect())
    }

    fn check(&self) -> Result<(), WireError> {
        if self.broken {
            Err(WireError::Closed)
        } else {
            Ok(())
        }
    }

    fn record(&mut self, request: Req) -> Result<(), WireError> {
        self.check()?;
        self.requests.push(request);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeWire(Rc<RefCell<FakeServer>>);

impl FakeWire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(&self) -> Rc<RefCell<FakeServer>> {
        Rc::clone(&self.0)
    }
}

impl X11Wire for FakeWire {
    fn setup(&mut self) -> Result<SetupInfo, WireError> {
        self.0.borrow().check()?;
        Ok(SetupInfo {
            screen: ScreenInfo {
                root: ROOT,
                root_visual: 0x21,
                colormap: 0x20,
                root_depth: 24,
                width: 1920,
                height: 1080,
            },
            resource_id_base: RESOURCE_BASE,
            resource_id_mask: RESOURCE_MASK,
        })
    }

    fn generate_id(&mut self) -> Result<u32, WireError> {
        let mut server = self.0.borrow_mut();
        server.check()?;
        let id = RESOURCE_BASE | server.next_resource;
        server.next_resource += 1;
        Ok(id)
    }

    fn send_intern_atom(&mut self, name: &str) -> Result<u64, WireError> {
        let mut server = self.0.borrow_mut();
        server.check()?;
        let token = server.next_token;
        server.next_token += 1;
        server.tokens.insert(token, name.to_string());
        Ok(token)
    }

    fn intern_atom_reply(&mut self, token: u64) -> Result<Atom, WireError> {
        let mut server = self.0.borrow_mut();
        let name = server
            .tokens
            .remove(&token)
            .ok_or_else(|| WireError::Request(format!("no reply for token {token}")))?;
        if server.failing_atoms.contains(&name) {
            return Err(WireError::Request(format!("cannot intern {name}")));
        }
        Ok(server.atom(&name))
    }

    fn discard_reply(&mut self, token: u64) {
        self.0.borrow_mut().tokens.remove(&token);
    }

    fn atom_name(&mut self, atom: Atom) -> Result<String, WireError> {
        let server = self.0.borrow();
        server
            .atoms
            .iter()
            .find(|(_, &a)| a == atom)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| WireError::Request(format!("bad atom {atom}")))
    }

    fn get_property(
        &mut self,
        window: Window,
        property: Atom,
    ) -> Result<Option<RawProperty>, WireError> {
        let server = self.0.borrow();
        server.check()?;
        Ok(server.property(window, property).cloned())
    }

    fn change_property8(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        data: &[u8],
    ) -> Result<(), WireError> {
        let mut server = self.0.borrow_mut();
        server.record(Req::ChangeProperty { window, property })?;
        server.set_property(window, property, RawProperty::new8(type_, data));
        Ok(())
    }

    fn change_property32(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        data: &[u32],
    ) -> Result<(), WireError> {
        let mut server = self.0.borrow_mut();
        server.record(Req::ChangeProperty { window, property })?;
        server.set_property(window, property, RawProperty::new32(type_, data));
        Ok(())
    }

    fn delete_property(&mut self, window: Window, property: Atom) -> Result<(), WireError> {
        let mut server = self.0.borrow_mut();
        server.record(Req::DeleteProperty { window, property })?;
        server.properties.remove(&(window, property));
        Ok(())
    }

    fn create_input_window(&mut self, window: Window, parent: Window) -> Result<(), WireError> {
        self.0
            .borrow_mut()
            .record(Req::CreateInputWindow { window, parent })
    }

    fn destroy_window(&mut self, window: Window) -> Result<(), WireError> {
        self.0.borrow_mut().record(Req::DestroyWindow(window))
    }

    fn map_window(&mut self, window: Window) -> Result<(), WireError> {
        self.0.borrow_mut().record(Req::Map(window))
    }

    fn unmap_window(&mut self, window: Window) -> Result<(), WireError> {
        self.0.borrow_mut().record(Req::Unmap(window))
    }

    fn configure_window(
        &mut self,
        window: Window,
        config: &WindowConfig,
    ) -> Result<(), WireError> {
        self.0.borrow_mut().record(Req::Configure {
            window,
            config: *config,
        })
    }

    fn change_event_mask(&mut self, window: Window, mask: EventMask) -> Result<(), WireError> {
        self.0.borrow_mut().record(Req::EventMask { window, mask })
    }

    fn send_configure_notify(
        &mut self,
        window: Window,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        _border_width: u32,
    ) -> Result<(), WireError> {
        self.0.borrow_mut().record(Req::ConfigureNotify {
            window,
            x,
            y,
            width,
            height,
        })
    }

    fn send_client_message(
        &mut self,
        destination: Window,
        _window: Window,
        type_: Atom,
        data: [u32; 5],
        _mask: EventMask,
    ) -> Result<(), WireError> {
        self.0.borrow_mut().record(Req::ClientMessage {
            destination,
            type_,
            data,
        })
    }

    fn set_selection_owner(
        &mut self,
        owner: Window,
        selection: Atom,
        _time: u32,
    ) -> Result<(), WireError> {
        self.0
            .borrow_mut()
            .record(Req::SelectionOwner { owner, selection })
    }

    fn set_input_focus(&mut self, window: Window, _time: u32) -> Result<(), WireError> {
        self.0.borrow_mut().record(Req::InputFocus(window))
    }

    fn kill_client(&mut self, resource: u32) -> Result<(), WireError> {
        self.0.borrow_mut().record(Req::KillClient(resource))
    }

    fn composite_available(&mut self) -> bool {
        self.0.borrow().composite
    }

    fn redirect_subwindows(&mut self, window: Window) -> Result<(), WireError> {
        self.0.borrow_mut().record(Req::Redirect(window))
    }

    fn poll_event(&mut self) -> Result<Option<XEvent>, WireError> {
        let mut server = self.0.borrow_mut();
        server.check()?;
        Ok(server.events.pop_front())
    }

    fn flush(&mut self) -> Result<(), WireError> {
        let mut server = self.0.borrow_mut();
        server.check()?;
        server.flushes += 1;
        Ok(())
    }
}

/// A shell with one 1920x1080 output and a default pointer.
pub fn shell<W: X11Wire>() -> ShellDispatcher<W> {
    let mut shell = ShellDispatcher::new(Config::default());
    shell.handle_event(CompositorEvent::OutputAdded {
        id: OutputId(1),
        name: "test-output".into(),
        geometry: Geometry::new(0, 0, 1920, 1080),
        available: Geometry::new(0, 32, 1920, 1048),
    });
    shell.handle_event(CompositorEvent::InputDeviceAdded {
        id: POINTER,
        default: true,
    });
    shell
}

/// A shell managing the fake server's windows. Requests made while
/// attaching are cleared.
pub fn attached_shell() -> (ShellDispatcher<FakeWire>, Rc<RefCell<FakeServer>>) {
    let wire = FakeWire::new();
    let server = wire.server();
    let mut shell = shell();
    shell
        .attach_xwayland(wire, XWAYLAND_CLIENT)
        .expect("attach to fake server");
    server.borrow_mut().take_requests();
    server.borrow_mut().flushes = 0;
    (shell, server)
}

pub fn create_window(window: Window, geometry: Geometry, override_redirect: bool) -> XEvent {
    XEvent::CreateNotify {
        window,
        parent: ROOT,
        x: geometry.x,
        y: geometry.y,
        width: geometry.width,
        height: geometry.height,
        override_redirect,
    }
}

pub fn client_message(
    server: &RefCell<FakeServer>,
    window: Window,
    type_: &str,
    data: [u32; 5],
) -> XEvent {
    XEvent::ClientMessage {
        window,
        type_: server.borrow_mut().atom(type_),
        format: 32,
        data,
    }
}

pub fn has_intent(actions: &[ShellAction], intent: &weft_core::Intent) -> bool {
    actions
        .iter()
        .any(|action| matches!(action, ShellAction::Intent(i) if i == intent))
}
