//! The X11 seam: every request the window manager makes on the proxy
//! server's connection goes through [`X11Wire`].

use bitflags::bitflags;

use super::event::XEvent;

pub type Window = u32;
pub type Atom = u32;

/// `None` for atoms; a failed intern resolves to this.
pub const ATOM_NONE: Atom = 0;
/// `CurrentTime` for timestamped requests.
pub const CURRENT_TIME: u32 = 0;

// Predefined atoms (core protocol).
pub const ATOM_ATOM: Atom = 4;
pub const ATOM_CARDINAL: Atom = 6;
pub const ATOM_STRING: Atom = 31;
pub const ATOM_WINDOW: Atom = 33;
pub const ATOM_WM_NAME: Atom = 39;
pub const ATOM_WM_CLASS: Atom = 67;
pub const ATOM_WM_TRANSIENT_FOR: Atom = 68;
pub const ATOM_WM_NORMAL_HINTS: Atom = 40;

/// IO or protocol failure on the X11 connection.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("connection closed")]
    Closed,

    #[error("request failed: {0}")]
    Request(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl WireError {
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(error))
    }
}

bitflags! {
    /// X11 event selection mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventMask: u32 {
        const STRUCTURE_NOTIFY      = 1 << 17;
        const SUBSTRUCTURE_NOTIFY   = 1 << 19;
        const SUBSTRUCTURE_REDIRECT = 1 << 20;
        const FOCUS_CHANGE          = 1 << 21;
        const PROPERTY_CHANGE       = 1 << 22;
    }
}

/// Stacking mode of a configure request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    Above,
    Below,
    TopIf,
    BottomIf,
    Opposite,
}

/// Values for a `ConfigureWindow` request; unset fields are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowConfig {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub sibling: Option<Window>,
    pub stack_mode: Option<StackMode>,
}

/// The root screen the window manager manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenInfo {
    pub root: Window,
    pub root_visual: u32,
    pub colormap: u32,
    pub root_depth: u8,
    pub width: u16,
    pub height: u16,
}

/// Connection setup data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetupInfo {
    pub screen: ScreenInfo,
    pub resource_id_base: u32,
    pub resource_id_mask: u32,
}

/// A property as read from the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawProperty {
    pub type_: Atom,
    pub format: u8,
    pub value: Vec<u8>,
}

impl RawProperty {
    pub fn new8(type_: Atom, value: impl Into<Vec<u8>>) -> Self {
        Self {
            type_,
            format: 8,
            value: value.into(),
        }
    }

    pub fn new32(type_: Atom, values: &[u32]) -> Self {
        Self {
            type_,
            format: 32,
            value: values.iter().flat_map(|v| v.to_ne_bytes()).collect(),
        }
    }

    /// The value as 32-bit items; `None` for any other format.
    pub fn value32(&self) -> Option<impl Iterator<Item = u32> + '_> {
        (self.format == 32).then(|| {
            self.value
                .chunks_exact(4)
                .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        })
    }

    pub fn value8(&self) -> Option<&[u8]> {
        (self.format == 8).then_some(self.value.as_slice())
    }
}

/// Outbound X11 requests and the inbound event queue.
///
/// Request methods only queue; nothing reaches the server before
/// [`flush`](Self::flush). Atom interning is split so that many interns can
/// be in flight before the first reply is needed.
pub trait X11Wire {
    /// Setup data of an established connection. Fails when the connection
    /// is already broken.
    fn setup(&mut self) -> Result<SetupInfo, WireError>;

    fn generate_id(&mut self) -> Result<u32, WireError>;

    /// Send an `InternAtom` request, returning a token for its reply.
    fn send_intern_atom(&mut self, name: &str) -> Result<u64, WireError>;

    /// Wait for the reply to an earlier [`send_intern_atom`](Self::send_intern_atom).
    fn intern_atom_reply(&mut self, token: u64) -> Result<Atom, WireError>;

    /// Drop an intern reply nobody will read.
    fn discard_reply(&mut self, token: u64);

    fn atom_name(&mut self, atom: Atom) -> Result<String, WireError>;

    /// Read a whole property. `Ok(None)` when the window is gone or the
    /// property is not set.
    fn get_property(
        &mut self,
        window: Window,
        property: Atom,
    ) -> Result<Option<RawProperty>, WireError>;

    fn change_property8(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        data: &[u8],
    ) -> Result<(), WireError>;

    fn change_property32(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        data: &[u32],
    ) -> Result<(), WireError>;

    fn delete_property(&mut self, window: Window, property: Atom) -> Result<(), WireError>;

    /// Create an unmapped input-only child of `parent`.
    fn create_input_window(&mut self, window: Window, parent: Window) -> Result<(), WireError>;

    fn destroy_window(&mut self, window: Window) -> Result<(), WireError>;

    fn map_window(&mut self, window: Window) -> Result<(), WireError>;

    fn unmap_window(&mut self, window: Window) -> Result<(), WireError>;

    fn configure_window(&mut self, window: Window, config: &WindowConfig)
        -> Result<(), WireError>;

    fn change_event_mask(&mut self, window: Window, mask: EventMask) -> Result<(), WireError>;

    /// Send a synthetic `ConfigureNotify` telling the client its geometry.
    fn send_configure_notify(
        &mut self,
        window: Window,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        border_width: u32,
    ) -> Result<(), WireError>;

    /// Send a 32-bit format `ClientMessage` to `destination`.
    fn send_client_message(
        &mut self,
        destination: Window,
        window: Window,
        type_: Atom,
        data: [u32; 5],
        mask: EventMask,
    ) -> Result<(), WireError>;

    fn set_selection_owner(
        &mut self,
        owner: Window,
        selection: Atom,
        time: u32,
    ) -> Result<(), WireError>;

    fn set_input_focus(&mut self, window: Window, time: u32) -> Result<(), WireError>;

    fn kill_client(&mut self, resource: u32) -> Result<(), WireError>;

    /// Whether the server offers the Composite extension.
    fn composite_available(&mut self) -> bool;

    /// Redirect the children of `window` offscreen (manual mode).
    fn redirect_subwindows(&mut self, window: Window) -> Result<(), WireError>;

    /// Next already-queued event, without blocking.
    fn poll_event(&mut self) -> Result<Option<XEvent>, WireError>;

    fn flush(&mut self) -> Result<(), WireError>;
}

/// Wire type for a shell that never attaches XWayland. Uninhabited.
#[derive(Debug)]
pub enum NoX11 {}

impl X11Wire for NoX11 {
    fn setup(&mut self) -> Result<SetupInfo, WireError> {
        match *self {}
    }

    fn generate_id(&mut self) -> Result<u32, WireError> {
        match *self {}
    }

    fn send_intern_atom(&mut self, _: &str) -> Result<u64, WireError> {
        match *self {}
    }

    fn intern_atom_reply(&mut self, _: u64) -> Result<Atom, WireError> {
        match *self {}
    }

    fn discard_reply(&mut self, _: u64) {
        match *self {}
    }

    fn atom_name(&mut self, _: Atom) -> Result<String, WireError> {
        match *self {}
    }

    fn get_property(&mut self, _: Window, _: Atom) -> Result<Option<RawProperty>, WireError> {
        match *self {}
    }

    fn change_property8(
        &mut self,
        _: Window,
        _: Atom,
        _: Atom,
        _: &[u8],
    ) -> Result<(), WireError> {
        match *self {}
    }

    fn change_property32(
        &mut self,
        _: Window,
        _: Atom,
        _: Atom,
        _: &[u32],
    ) -> Result<(), WireError> {
        match *self {}
    }

    fn delete_property(&mut self, _: Window, _: Atom) -> Result<(), WireError> {
        match *self {}
    }

    fn create_input_window(&mut self, _: Window, _: Window) -> Result<(), WireError> {
        match *self {}
    }

    fn destroy_window(&mut self, _: Window) -> Result<(), WireError> {
        match *self {}
    }

    fn map_window(&mut self, _: Window) -> Result<(), WireError> {
        match *self {}
    }

    fn unmap_window(&mut self, _: Window) -> Result<(), WireError> {
        match *self {}
    }

    fn configure_window(&mut self, _: Window, _: &WindowConfig) -> Result<(), WireError> {
        match *self {}
    }

    fn change_event_mask(&mut self, _: Window, _: EventMask) -> Result<(), WireError> {
        match *self {}
    }

    fn send_configure_notify(
        &mut self,
        _: Window,
        _: i32,
        _: i32,
        _: u32,
        _: u32,
        _: u32,
    ) -> Result<(), WireError> {
        match *self {}
    }

    fn send_client_message(
        &mut self,
        _: Window,
        _: Window,
        _: Atom,
        _: [u32; 5],
        _: EventMask,
    ) -> Result<(), WireError> {
        match *self {}
    }

    fn set_selection_owner(&mut self, _: Window, _: Atom, _: u32) -> Result<(), WireError> {
        match *self {}
    }

    fn set_input_focus(&mut self, _: Window, _: u32) -> Result<(), WireError> {
        match *self {}
    }

    fn kill_client(&mut self, _: u32) -> Result<(), WireError> {
        match *self {}
    }

    fn composite_available(&mut self) -> bool {
        match *self {}
    }

    fn redirect_subwindows(&mut self, _: Window) -> Result<(), WireError> {
        match *self {}
    }

    fn poll_event(&mut self) -> Result<Option<XEvent>, WireError> {
        match *self {}
    }

    fn flush(&mut self) -> Result<(), WireError> {
        match *self {}
    }
}
