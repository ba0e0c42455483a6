//! Typed inputs and outputs of the shell.
//!
//! [`ShellRequest`] is what native clients ask for, [`CompositorEvent`] is
//! what the compositor reports. Every dispatcher entry point answers with
//! [`ShellAction`]s: events for clients and intents for the compositor.

use crate::error::ProtocolViolation;
use crate::state::{DeviceId, Geometry, OutputId, Serial};
use crate::surface::{ClientId, ObjectRef, RenderSurfaceId, SurfaceId};
use crate::xdg::ToplevelState;

/// Requests on the shell global and its objects.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellRequest {
    /// Version negotiation for the unstable protocol.
    UseUnstableVersion { client: ClientId, version: u32 },

    /// Give `surface` the toplevel role through a new object.
    GetXdgSurface {
        object: ObjectRef,
        surface: RenderSurfaceId,
    },

    /// Give `surface` the popup role, positioned relative to `parent`.
    GetXdgPopup {
        object: ObjectRef,
        surface: RenderSurfaceId,
        parent: RenderSurfaceId,
        seat: DeviceId,
        serial: Serial,
        x: i32,
        y: i32,
    },

    Pong { client: ClientId, serial: Serial },

    /// A request on a toplevel or popup object.
    Surface {
        object: ObjectRef,
        request: SurfaceRequest,
    },

    ClientDisconnected { client: ClientId },
}

/// Requests on a shell surface object.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceRequest {
    SetTitle(String),
    SetAppId(String),
    /// Object id of the parent toplevel, `None` to clear.
    SetParent(Option<u32>),
    SetWindowGeometry(Geometry),
    Move {
        seat: DeviceId,
        serial: Serial,
    },
    Resize {
        seat: DeviceId,
        serial: Serial,
        edges: u32,
    },
    AckConfigure(Serial),
    SetMaximized,
    UnsetMaximized,
    SetFullscreen {
        output: Option<OutputId>,
    },
    UnsetFullscreen,
    SetMinimized,
    ShowWindowMenu {
        seat: DeviceId,
        serial: Serial,
        x: i32,
        y: i32,
    },
    Destroy,
}

/// What the compositor reports to the shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositorEvent {
    /// A client created a rendering surface. `protocol_id` is its object id
    /// on the client's connection, which X11 windows refer to when pairing.
    RenderSurfaceCreated {
        client: ClientId,
        surface: RenderSurfaceId,
        protocol_id: u32,
    },

    RenderSurfaceDestroyed { surface: RenderSurfaceId },

    OutputAdded {
        id: OutputId,
        name: String,
        geometry: Geometry,
        available: Geometry,
    },

    OutputRemoved { id: OutputId },

    OutputActivated { id: OutputId },

    InputDeviceAdded { id: DeviceId, default: bool },

    /// Pointer moved to absolute position.
    PointerMotion {
        device: DeviceId,
        x: f64,
        y: f64,
        time_ms: u32,
        under: Option<RenderSurfaceId>,
    },

    /// Pointer button press/release. `button` uses Linux event codes.
    PointerButton {
        device: DeviceId,
        button: u32,
        pressed: bool,
        serial: Serial,
        time_ms: u32,
        under: Option<RenderSurfaceId>,
    },

    KeyboardFocus { surface: Option<SurfaceId> },
}

/// Events sent to native clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Configure {
        object: ObjectRef,
        width: u32,
        height: u32,
        states: Vec<ToplevelState>,
        serial: Serial,
    },
    Ping {
        client: ClientId,
        serial: Serial,
    },
    PopupDone {
        object: ObjectRef,
    },
    ProtocolError {
        client: ClientId,
        object: Option<ObjectRef>,
        violation: ProtocolViolation,
    },
}

/// Things the compositor should do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Map(SurfaceId),
    Unmap(SurfaceId),
    SetPosition {
        surface: SurfaceId,
        x: i32,
        y: i32,
    },
    SetSize {
        surface: SurfaceId,
        width: u32,
        height: u32,
    },
    SetFullscreen {
        surface: SurfaceId,
        fullscreen: bool,
    },
    Maximize(SurfaceId),
    Unmaximize(SurfaceId),
    Minimize(SurfaceId),
    TakeFocus(SurfaceId),
    /// Route pointer focus; `None` while a grab hides every surface.
    PointerFocus {
        device: DeviceId,
        surface: Option<SurfaceId>,
    },
    /// Deliver a button event to `surface` during a popup grab.
    ForwardButton {
        device: DeviceId,
        surface: SurfaceId,
        button: u32,
        pressed: bool,
        time_ms: u32,
    },
    ShowWindowMenu {
        surface: SurfaceId,
        device: DeviceId,
        x: i32,
        y: i32,
    },
    GrabEnded {
        device: DeviceId,
    },
}

/// Output of every dispatcher entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellAction {
    Client(ClientEvent),
    Intent(Intent),
}

impl From<ClientEvent> for ShellAction {
    fn from(event: ClientEvent) -> Self {
        Self::Client(event)
    }
}

impl From<Intent> for ShellAction {
    fn from(intent: Intent) -> Self {
        Self::Intent(intent)
    }
}
