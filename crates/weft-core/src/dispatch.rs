//! Request and event routing.
//!
//! [`ShellDispatcher`] is the single entry point of the shell: native
//! requests, compositor events and X11 readiness all come through it, and
//! every entry point answers with the [`ShellAction`]s to perform.

use std::collections::HashMap;

use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::error::{ProtocolViolation, ShellError};
use crate::event::{
    ClientEvent, CompositorEvent, Intent, ShellAction, ShellRequest, SurfaceRequest,
};
use crate::grab::{GrabController, ResizeEdges};
use crate::invariants;
use crate::state::{DeviceId, Output, Point, Serial, ShellState};
use crate::surface::{
    ClientId, ObjectRef, RenderSurfaceId, ShellSurface, SurfaceId, SurfaceOrigin, SurfaceRole,
};
use crate::x11::{MoveResize, WireError, X11Request, X11Wire, XWaylandBridge};
use crate::xdg::{self, ConfigureIntent, XdgStateMachine};

/// Per-client protocol bookkeeping.
#[derive(Debug, Default)]
struct ClientRecord {
    /// A protocol error was sent; later requests are ignored.
    failed: bool,
    /// Outstanding ping.
    ping: Option<Serial>,
}

pub struct ShellDispatcher<W: X11Wire> {
    state: ShellState,
    xdg: XdgStateMachine,
    grabs: GrabController,
    bridge: Option<XWaylandBridge<W>>,
    objects: HashMap<ObjectRef, SurfaceId>,
    clients: HashMap<ClientId, ClientRecord>,
    /// Actions not yet returned to the caller.
    outbox: Vec<ShellAction>,
    /// Wire failure seen while handling a non-X11 entry point.
    wire_failure: Option<WireError>,
}

impl<W: X11Wire> ShellDispatcher<W> {
    pub fn new(config: Config) -> Self {
        Self {
            state: ShellState::new(config),
            xdg: XdgStateMachine::new(),
            grabs: GrabController::new(),
            bridge: None,
            objects: HashMap::new(),
            clients: HashMap::new(),
            outbox: Vec::new(),
            wire_failure: None,
        }
    }

    pub const fn state(&self) -> &ShellState {
        &self.state
    }

    pub const fn grabs(&self) -> &GrabController {
        &self.grabs
    }

    pub const fn bridge(&self) -> Option<&XWaylandBridge<W>> {
        self.bridge.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.bridge.is_some()
    }

    /// Surface behind a native protocol object.
    pub fn surface_for_object(&self, object: ObjectRef) -> Option<SurfaceId> {
        self.objects.get(&object).copied()
    }

    /// Actions produced outside an entry point's return, such as the
    /// cleanup after a failed X11 connection.
    pub fn drain_actions(&mut self) -> Vec<ShellAction> {
        std::mem::take(&mut self.outbox)
    }

    // ----------------------------------------------------------------
    // XWayland lifetime
    // ----------------------------------------------------------------

    /// Become the window manager of the proxy server connected through
    /// `wire`, whose Wayland client is `client`.
    pub fn attach_xwayland(&mut self, wire: W, client: ClientId) -> Result<(), ShellError> {
        if self.bridge.is_some() {
            warn!("Replacing attached X11 proxy server");
            self.detach_xwayland();
        }
        let bridge = XWaylandBridge::attach(wire, &self.state.config)?;
        self.state.xwayland_client = Some(client);
        self.bridge = Some(bridge);
        self.wire_failure = None;
        info!("XWayland attached as {}", client);
        Ok(())
    }

    /// Drop the bridge and every X11 surface. Returns the wire when the
    /// bridge was attached.
    pub fn detach_xwayland(&mut self) -> Option<W> {
        let bridge = self.bridge.take()?;
        let x11_surfaces: Vec<SurfaceId> = self
            .state
            .surfaces
            .values()
            .filter(|s| s.x11_window().is_some())
            .map(|s| s.id)
            .collect();
        for surface in x11_surfaces {
            self.destroy_surface(surface);
        }
        self.state.xwayland_client = None;
        info!("XWayland detached");
        Some(bridge.detach())
    }

    /// Handle everything queued on the X11 connection, then flush once.
    ///
    /// On a connection failure the bridge is detached and the error
    /// returned; the cleanup actions are left for [`drain_actions`](Self::drain_actions).
    pub fn process_ready_events(&mut self) -> Result<Vec<ShellAction>, ShellError> {
        let Some(bridge) = self.bridge.as_mut() else {
            // A failure seen by another entry point detached the bridge.
            return Err(self
                .wire_failure
                .take()
                .map_or(ShellError::NotAttached, ShellError::Connection));
        };

        let mut requests = Vec::new();
        match bridge.process_ready_events(&mut self.state, &mut requests) {
            Ok(count) => trace!("processed {} X11 events", count),
            Err(err) => {
                error!("X11 connection failed: {}", err);
                self.detach_xwayland();
                return Err(ShellError::Connection(err));
            },
        }

        self.route_x11_requests(requests);
        self.finish();
        match self.wire_failure.take() {
            Some(err) => Err(ShellError::Connection(err)),
            None => Ok(self.drain_actions()),
        }
    }

    // ----------------------------------------------------------------
    // Native requests
    // ----------------------------------------------------------------

    pub fn handle_request(&mut self, request: ShellRequest) -> Vec<ShellAction> {
        let client = request_client(&request);
        let disconnect = matches!(request, ShellRequest::ClientDisconnected { .. });
        if !disconnect && self.clients.get(&client).is_some_and(|record| record.failed) {
            trace!("ignoring request from failed {}", client);
            return Vec::new();
        }

        if let Err(err) = self.route_request(request) {
            match err {
                ShellError::Protocol(violation) => self.protocol_error(client, None, violation),
                err => debug!("request from {} failed: {}", client, err),
            }
        }
        self.finish();
        self.drain_actions()
    }

    fn route_request(&mut self, request: ShellRequest) -> Result<(), ShellError> {
        match request {
            ShellRequest::UseUnstableVersion { client, version } => {
                let supported = self.state.config.shell.unstable_version;
                if version != supported {
                    return Err(ProtocolViolation::UnsupportedVersion {
                        requested: version,
                        supported,
                    }
                    .into());
                }
                self.clients.entry(client).or_default();
            },
            ShellRequest::GetXdgSurface { object, surface } => {
                self.create_toplevel(object, surface)?;
            },
            ShellRequest::GetXdgPopup {
                object,
                surface,
                parent,
                seat,
                serial,
                x,
                y,
            } => self.create_popup(object, surface, parent, seat, serial, Point::new(x, y))?,
            ShellRequest::Pong { client, serial } => {
                let record = self.clients.entry(client).or_default();
                if record.ping == Some(serial) {
                    record.ping = None;
                } else {
                    trace!("stale pong {} from {}", serial, client);
                }
            },
            ShellRequest::Surface { object, request } => {
                let Some(surface) = self.surface_for_object(object) else {
                    return Err(ProtocolViolation::UnknownObject(object.id).into());
                };
                if let Err(ShellError::Protocol(violation)) =
                    self.surface_request(object, surface, request)
                {
                    self.protocol_error(object.client, Some(object), violation);
                }
            },
            ShellRequest::ClientDisconnected { client } => self.client_disconnected(client),
        }
        Ok(())
    }

    fn check_role(&self, surface: RenderSurfaceId) -> Result<(), ShellError> {
        if self.state.surface_for_handle(surface).is_some() {
            return Err(ProtocolViolation::RoleAlreadyAssigned.into());
        }
        Ok(())
    }

    fn create_toplevel(
        &mut self,
        object: ObjectRef,
        handle: RenderSurfaceId,
    ) -> Result<(), ShellError> {
        self.check_role(handle)?;
        let id = self.state.next_surface_id();
        let mut surface = ShellSurface::new_native(id, object, handle, SurfaceRole::Toplevel);
        surface.mapped = true;
        self.state.insert_surface(surface);
        self.objects.insert(object, id);
        self.clients.entry(object.client).or_default();
        debug!("{} is a toplevel ({})", id, object);

        self.outbox.push(Intent::Map(id).into());
        self.outbox.push(Intent::TakeFocus(id).into());
        self.xdg
            .request_configure(&mut self.state, id, ConfigureIntent::default());
        Ok(())
    }

    fn create_popup(
        &mut self,
        object: ObjectRef,
        handle: RenderSurfaceId,
        parent: RenderSurfaceId,
        seat: DeviceId,
        serial: Serial,
        offset: Point,
    ) -> Result<(), ShellError> {
        self.check_role(handle)?;
        let Some(parent_id) = self.state.surface_for_handle(parent) else {
            return Err(ProtocolViolation::UnknownObject(object.id).into());
        };
        let parent_origin = self
            .state
            .surface(parent_id)
            .map(|p| p.geometry.origin())
            .unwrap_or_default();

        let id = self.state.next_surface_id();
        let mut surface = ShellSurface::new_native(
            id,
            object,
            handle,
            SurfaceRole::Popup {
                parent: parent_id,
                serial,
                device: seat,
                offset,
            },
        );
        surface.geometry.x = parent_origin.x + offset.x;
        surface.geometry.y = parent_origin.y + offset.y;
        surface.transient_parent = Some(parent_id);
        self.state.insert_surface(surface);
        self.objects.insert(object, id);
        debug!("{} is a popup of {} ({})", id, parent_id, object);

        let mut out = Vec::new();
        if self.grabs.add_popup(&mut self.state, seat, id, &mut out) {
            if let Some(s) = self.state.surface_mut(id) {
                s.mapped = true;
            }
            self.outbox.push(Intent::Map(id).into());
        }
        self.outbox.append(&mut out);
        Ok(())
    }

    fn surface_request(
        &mut self,
        object: ObjectRef,
        surface: SurfaceId,
        request: SurfaceRequest,
    ) -> Result<(), ShellError> {
        let state = &mut self.state;
        match request {
            SurfaceRequest::SetTitle(title) => xdg::set_title(state, surface, title),
            SurfaceRequest::SetAppId(app_id) => xdg::set_app_id(state, surface, app_id),
            SurfaceRequest::SetWindowGeometry(geometry) => {
                xdg::set_window_geometry(state, surface, geometry);
            },
            SurfaceRequest::SetParent(parent) => {
                let parent = match parent {
                    Some(id) => match self.objects.get(&ObjectRef::new(object.client, id)) {
                        Some(&parent) => Some(parent),
                        None => return Err(ProtocolViolation::UnknownObject(id).into()),
                    },
                    None => None,
                };
                xdg::set_parent(state, surface, parent);
            },
            SurfaceRequest::Move { seat, serial } => {
                if current_grab_serial(state, seat) == Some(serial) {
                    self.grabs.start_move(state, surface, seat);
                } else {
                    trace!("move of {} with stale {}", surface, serial);
                }
            },
            SurfaceRequest::Resize {
                seat,
                serial,
                edges,
            } => {
                let Some(edges) = ResizeEdges::from_wire(edges) else {
                    return Err(ProtocolViolation::InvalidResizeEdges(edges).into());
                };
                if current_grab_serial(state, seat) == Some(serial) {
                    self.grabs
                        .start_resize(state, &mut self.xdg, surface, seat, edges);
                } else {
                    trace!("resize of {} with stale {}", surface, serial);
                }
            },
            SurfaceRequest::AckConfigure(serial) => {
                self.xdg
                    .ack_configure(state, surface, serial, &mut self.outbox);
            },
            SurfaceRequest::SetMaximized => {
                self.xdg.set_maximized(state, surface);
            },
            SurfaceRequest::UnsetMaximized => {
                self.xdg.unset_maximized(state, surface);
            },
            SurfaceRequest::SetFullscreen { output } => {
                self.xdg.set_fullscreen(state, surface, output);
            },
            SurfaceRequest::UnsetFullscreen => {
                self.xdg.unset_fullscreen(state, surface);
            },
            SurfaceRequest::SetMinimized => xdg::set_minimized(state, surface, &mut self.outbox),
            SurfaceRequest::ShowWindowMenu { seat, serial, x, y } => {
                if current_grab_serial(state, seat) == Some(serial) {
                    self.outbox.push(
                        Intent::ShowWindowMenu {
                            surface,
                            device: seat,
                            x,
                            y,
                        }
                        .into(),
                    );
                }
            },
            SurfaceRequest::Destroy => {
                self.objects.remove(&object);
                self.destroy_surface(surface);
            },
        }
        Ok(())
    }

    fn protocol_error(
        &mut self,
        client: ClientId,
        object: Option<ObjectRef>,
        violation: ProtocolViolation,
    ) {
        warn!("Protocol error from {}: {}", client, violation);
        self.clients.entry(client).or_default().failed = true;
        self.outbox.push(
            ClientEvent::ProtocolError {
                client,
                object,
                violation,
            }
            .into(),
        );
    }

    fn client_disconnected(&mut self, client: ClientId) {
        let owned: Vec<SurfaceId> = self
            .state
            .surfaces
            .values()
            .filter(|s| s.client() == Some(client))
            .map(|s| s.id)
            .collect();
        debug!("{} disconnected with {} surfaces", client, owned.len());
        self.grabs
            .client_gone(&mut self.state, &mut self.xdg, client, &mut self.outbox);
        for surface in owned {
            self.destroy_surface(surface);
        }
        self.objects.retain(|object, _| object.client != client);
        self.clients.remove(&client);
    }

    /// Send a ping to `client`.
    pub fn ping(&mut self, client: ClientId) -> Vec<ShellAction> {
        let serial = self.state.serials.next_serial();
        self.clients.entry(client).or_default().ping = Some(serial);
        self.outbox
            .push(ClientEvent::Ping { client, serial }.into());
        self.drain_actions()
    }

    /// Ask a surface to close: a close request for X11 windows.
    pub fn close(&mut self, surface: SurfaceId) -> Vec<ShellAction> {
        if let Some(bridge) = self.bridge.as_mut() {
            if let Err(err) = bridge.registry.close(&mut bridge.conn, &self.state, surface) {
                self.wire_failure.get_or_insert(err);
            }
        }
        self.finish();
        self.drain_actions()
    }

    // ----------------------------------------------------------------
    // Compositor events
    // ----------------------------------------------------------------

    pub fn handle_event(&mut self, event: CompositorEvent) -> Vec<ShellAction> {
        match event {
            CompositorEvent::RenderSurfaceCreated {
                client,
                surface,
                protocol_id,
            } => {
                if Some(client) == self.state.xwayland_client {
                    if let Some(bridge) = self.bridge.as_mut() {
                        bridge
                            .registry
                            .surface_created(&mut self.state, protocol_id, surface);
                    }
                }
            },
            CompositorEvent::RenderSurfaceDestroyed { surface } => {
                self.render_surface_destroyed(surface);
            },
            CompositorEvent::OutputAdded {
                id,
                name,
                geometry,
                available,
            } => {
                info!("Output {} added: {:?}", name, geometry);
                self.state.outputs.insert(
                    id,
                    Output {
                        id,
                        name,
                        geometry,
                        available,
                    },
                );
                self.state.active_output.get_or_insert(id);
            },
            CompositorEvent::OutputRemoved { id } => {
                self.state.outputs.shift_remove(&id);
                if self.state.active_output == Some(id) {
                    self.state.active_output = self.state.outputs.keys().next().copied();
                }
            },
            CompositorEvent::OutputActivated { id } => {
                if self.state.outputs.contains_key(&id) {
                    self.state.active_output = Some(id);
                }
            },
            CompositorEvent::InputDeviceAdded { id, default } => {
                self.state.device_mut(id);
                if default {
                    self.state.default_device = Some(id);
                }
            },
            CompositorEvent::PointerMotion {
                device,
                x,
                y,
                time_ms,
                under,
            } => {
                let dev = self.state.device_mut(device);
                dev.pointer = (x, y);
                dev.last_time_ms = time_ms;
                let under = under.and_then(|handle| self.state.surface_for_handle(handle));
                let moved = self.grabs.pointer_motion(
                    &mut self.state,
                    &mut self.xdg,
                    device,
                    under,
                    &mut self.outbox,
                );
                if let (Some(surface), Some(bridge)) = (moved, self.bridge.as_mut()) {
                    if let Err(err) =
                        bridge
                            .registry
                            .sync_position(&mut bridge.conn, &self.state, surface)
                    {
                        self.wire_failure.get_or_insert(err);
                    }
                }
            },
            CompositorEvent::PointerButton {
                device,
                button,
                pressed,
                serial,
                time_ms,
                under,
            } => {
                let dev = self.state.device_mut(device);
                dev.last_time_ms = time_ms;
                if pressed {
                    if !dev.pressed_buttons.contains(&button) {
                        dev.pressed_buttons.push(button);
                    }
                    dev.pointer_grab_serial = serial;
                    dev.grab_time_ms = time_ms;
                } else {
                    dev.pressed_buttons.retain(|&b| b != button);
                }
                let target = under.and_then(|handle| self.state.surface_for_handle(handle));
                self.grabs.pointer_button(
                    &mut self.state,
                    &mut self.xdg,
                    device,
                    button,
                    pressed,
                    target,
                    &mut self.outbox,
                );
            },
            CompositorEvent::KeyboardFocus { surface } => self.keyboard_focus(surface),
        }
        self.finish();
        self.drain_actions()
    }

    fn render_surface_destroyed(&mut self, handle: RenderSurfaceId) {
        let holder = self.state.surface_for_handle(handle);
        if let Some(bridge) = self.bridge.as_mut() {
            bridge.registry.surface_destroyed(&mut self.state, handle);
        }
        // X11 surfaces live on until their window is destroyed.
        if let Some(surface) = holder.filter(|&id| {
            self.state
                .surface(id)
                .is_some_and(|s| matches!(s.origin, SurfaceOrigin::Native(_)))
        }) {
            if let Some(object) = self.state.surface(surface).and_then(ShellSurface::native_object) {
                self.objects.remove(&object);
            }
            self.destroy_surface(surface);
        }
    }

    fn keyboard_focus(&mut self, surface: Option<SurfaceId>) {
        let surface = surface.filter(|&id| self.state.surface(id).is_some());
        let previous = std::mem::replace(&mut self.state.keyboard_focus, surface);
        if previous == surface {
            return;
        }
        if let Some(previous) = previous {
            self.xdg.set_activated(&mut self.state, previous, false);
        }
        if let Some(surface) = surface {
            self.xdg.set_activated(&mut self.state, surface, true);
        }
        if let Some(bridge) = self.bridge.as_mut() {
            let x11_target = surface.filter(|&id| {
                self.state
                    .surface(id)
                    .is_some_and(|s| s.x11_window().is_some())
            });
            if let Err(err) = bridge
                .registry
                .focus(&mut bridge.conn, &self.state, x11_target)
            {
                self.wire_failure.get_or_insert(err);
            }
        }
    }

    // ----------------------------------------------------------------
    // X11 request routing
    // ----------------------------------------------------------------

    fn route_x11_requests(&mut self, requests: Vec<X11Request>) {
        let mut destroyed = Vec::new();
        for request in requests {
            match request {
                X11Request::Map(surface) => {
                    self.outbox.push(Intent::Map(surface).into());
                    let managed = self
                        .state
                        .surface(surface)
                        .is_some_and(|s| !s.is_override_redirect());
                    if managed {
                        self.outbox.push(Intent::TakeFocus(surface).into());
                    }
                },
                X11Request::Unmap(surface) => {
                    self.grabs.surface_destroyed(
                        &mut self.state,
                        &mut self.xdg,
                        surface,
                        &mut self.outbox,
                    );
                    self.outbox.push(Intent::Unmap(surface).into());
                },
                X11Request::Destroyed(surface) => destroyed.push(surface),
                X11Request::Moved { surface, x, y } => {
                    self.outbox
                        .push(Intent::SetPosition { surface, x, y }.into());
                },
                X11Request::Resized {
                    surface,
                    width,
                    height,
                } => {
                    self.outbox.push(
                        Intent::SetSize {
                            surface,
                            width,
                            height,
                        }
                        .into(),
                    );
                },
                X11Request::MoveResize { surface, operation } => {
                    self.x11_move_resize(surface, operation);
                },
                X11Request::ChangeState {
                    surface,
                    fullscreen,
                    maximized,
                } => {
                    match fullscreen {
                        Some(true) => {
                            self.xdg.set_fullscreen(&mut self.state, surface, None);
                        },
                        Some(false) => {
                            self.xdg.unset_fullscreen(&mut self.state, surface);
                        },
                        None => {},
                    }
                    match maximized {
                        Some(true) => {
                            self.xdg.set_maximized(&mut self.state, surface);
                        },
                        Some(false) => {
                            self.xdg.unset_maximized(&mut self.state, surface);
                        },
                        None => {},
                    }
                },
                X11Request::Minimize(surface) => {
                    xdg::set_minimized(&mut self.state, surface, &mut self.outbox);
                },
            }
        }
        for surface in destroyed {
            self.destroy_surface(surface);
        }
    }

    fn x11_move_resize(&mut self, surface: SurfaceId, operation: MoveResize) {
        let Some(device) = self.state.default_device() else {
            warn!("No input device for _NET_WM_MOVERESIZE on {}", surface);
            return;
        };
        match operation {
            MoveResize::Move => {
                self.grabs.start_move(&mut self.state, surface, device);
            },
            MoveResize::Resize(edges) => {
                self.grabs
                    .start_resize(&mut self.state, &mut self.xdg, surface, device, edges);
            },
            MoveResize::Cancel => {
                self.grabs
                    .end(&mut self.state, &mut self.xdg, device, &mut self.outbox);
            },
        }
    }

    // ----------------------------------------------------------------
    // Shared
    // ----------------------------------------------------------------

    /// Remove a surface from every map and end grabs referring to it.
    pub fn destroy_surface(&mut self, surface: SurfaceId) {
        self.grabs
            .surface_destroyed(&mut self.state, &mut self.xdg, surface, &mut self.outbox);
        let Some(removed) = self.state.surfaces.shift_remove(&surface) else {
            return;
        };
        if let Some(handle) = removed.surface_handle {
            self.state.roles.remove(&handle);
        }
        for other in self.state.surfaces.values_mut() {
            if other.transient_parent == Some(surface) {
                other.transient_parent = None;
            }
        }
        if self.state.keyboard_focus == Some(surface) {
            self.state.keyboard_focus = None;
        }
        for device in self.state.devices.values_mut() {
            if device.pointer_focus == Some(surface) {
                device.pointer_focus = None;
            }
        }
        if removed.mapped {
            self.outbox.push(Intent::Unmap(surface).into());
        }
        debug!("{} destroyed", surface);
    }

    /// Deliver queued configures, flush the X11 connection once, and check
    /// invariants.
    fn finish(&mut self) {
        self.deliver_configures();

        if let Some(bridge) = self.bridge.as_mut() {
            if let Err(err) = bridge.conn.flush() {
                self.wire_failure.get_or_insert(err);
            }
        }
        if let Some(err) = &self.wire_failure {
            if self.bridge.is_some() {
                error!("X11 connection failed: {}", err);
                self.detach_xwayland();
            }
        }

        if cfg!(debug_assertions) {
            let registry = self.bridge.as_ref().map(|bridge| &bridge.registry);
            if let Err(err) = invariants::validate(&self.state, &self.grabs, registry) {
                warn!("Invariant violated: {}", err);
            }
        }
    }

    fn deliver_configures(&mut self) {
        loop {
            let configures = self.xdg.take_configures();
            if configures.is_empty() {
                break;
            }
            for configure in configures {
                let Some(origin) = self.state.surface(configure.surface).map(|s| s.origin) else {
                    continue;
                };
                match origin {
                    SurfaceOrigin::Native(object) => {
                        self.outbox.push(
                            ClientEvent::Configure {
                                object,
                                width: configure.width,
                                height: configure.height,
                                states: configure.states,
                                serial: configure.serial,
                            }
                            .into(),
                        );
                    },
                    SurfaceOrigin::X11 { .. } => {
                        if let Some(bridge) = self.bridge.as_mut() {
                            if let Err(err) =
                                bridge
                                    .registry
                                    .apply_configure(&mut bridge.conn, &self.state, &configure)
                            {
                                self.wire_failure.get_or_insert(err);
                            }
                        }
                        // X11 has no acknowledgement.
                        self.xdg.ack_configure(
                            &mut self.state,
                            configure.surface,
                            configure.serial,
                            &mut self.outbox,
                        );
                    },
                }
            }
        }
    }
}

fn request_client(request: &ShellRequest) -> ClientId {
    match request {
        ShellRequest::UseUnstableVersion { client, .. }
        | ShellRequest::Pong { client, .. }
        | ShellRequest::ClientDisconnected { client } => *client,
        ShellRequest::GetXdgSurface { object, .. }
        | ShellRequest::GetXdgPopup { object, .. }
        | ShellRequest::Surface { object, .. } => object.client,
    }
}

fn current_grab_serial(state: &ShellState, device: DeviceId) -> Option<Serial> {
    state.device(device).map(|dev| dev.pointer_grab_serial)
}
