//! [`X11Wire`] on an x11rb [`RustConnection`].

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::os::unix::net::UnixStream;

use tracing::{debug, trace};
use x11rb::connection::{Connection, DiscardMode, RequestConnection, RequestKind};
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::composite::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    self, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConfigureNotifyEvent,
    ConfigureWindowAux, ConnectionExt as _, CreateWindowAux, InputFocus, InternAtomReply,
    PropMode, WindowClass, CONFIGURE_NOTIFY_EVENT,
};
use x11rb::rust_connection::{DefaultStream, RustConnection};
use x11rb::wrapper::ConnectionExt as _;
use x11rb::x11_utils::TryParse;

use weft_core::x11::{
    Atom, EventMask, RawProperty, ScreenInfo, SetupInfo, Window, WindowConfig, WireError,
    X11Wire, XEvent,
};

use crate::event::{to_x11_stack_mode, translate};
use crate::XWaylandError;

/// Longest property read, in 32-bit units.
const PROPERTY_LENGTH: u32 = u32::MAX / 4;

/// Composite version the redirect needs.
const COMPOSITE_VERSION: (u32, u32) = (0, 4);

pub struct RustWire {
    conn: RustConnection,
    screen: usize,
    composite: Option<bool>,
}

impl RustWire {
    pub const fn new(conn: RustConnection, screen: usize) -> Self {
        Self {
            conn,
            screen,
            composite: None,
        }
    }

    /// Connect to a display by name, or `$DISPLAY` when `None`.
    pub fn connect(display: Option<&str>) -> Result<Self, XWaylandError> {
        let (conn, screen) = RustConnection::connect(display)?;
        debug!("Connected to X11 display, screen {}", screen);
        Ok(Self::new(conn, screen))
    }

    /// Take over the window manager socket XWayland was started with.
    pub fn from_fd(fd: OwnedFd) -> Result<Self, XWaylandError> {
        let (stream, _peer) = DefaultStream::from_unix_stream(UnixStream::from(fd))?;
        let conn = RustConnection::connect_to_stream(stream, 0)?;
        Ok(Self::new(conn, 0))
    }

    /// The socket to watch for readability.
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.conn.stream().as_fd()
    }
}

fn connection_error(err: ConnectionError) -> WireError {
    match err {
        ConnectionError::IoError(err) => WireError::Io(err),
        err => WireError::other(err),
    }
}

/// Requests whose errors arrive later as events.
fn queued<T>(result: Result<T, ConnectionError>) -> Result<(), WireError> {
    result.map(drop).map_err(connection_error)
}

impl X11Wire for RustWire {
    fn setup(&mut self) -> Result<SetupInfo, WireError> {
        self.conn.flush().map_err(connection_error)?;
        let setup = self.conn.setup();
        let screen = setup
            .roots
            .get(self.screen)
            .ok_or_else(|| WireError::Request(format!("no screen {}", self.screen)))?;
        Ok(SetupInfo {
            screen: ScreenInfo {
                root: screen.root,
                root_visual: screen.root_visual,
                colormap: screen.default_colormap,
                root_depth: screen.root_depth,
                width: screen.width_in_pixels,
                height: screen.height_in_pixels,
            },
            resource_id_base: setup.resource_id_base,
            resource_id_mask: setup.resource_id_mask,
        })
    }

    fn generate_id(&mut self) -> Result<u32, WireError> {
        self.conn.generate_id().map_err(WireError::other)
    }

    fn send_intern_atom(&mut self, name: &str) -> Result<u64, WireError> {
        let cookie = self
            .conn
            .intern_atom(false, name.as_bytes())
            .map_err(connection_error)?;
        let sequence = cookie.sequence_number();
        // The reply is claimed by sequence number; dropping the cookie would discard it.
        std::mem::forget(cookie);
        Ok(sequence)
    }

    fn intern_atom_reply(&mut self, token: u64) -> Result<Atom, WireError> {
        let buf = self
            .conn
            .wait_for_reply_or_error(token)
            .map_err(|err| match err {
                ReplyError::ConnectionError(err) => connection_error(err),
                ReplyError::X11Error(err) => WireError::Request(format!("{:?}", err.error_kind)),
            })?;
        let (reply, _) = InternAtomReply::try_parse(&buf).map_err(WireError::other)?;
        Ok(reply.atom)
    }

    fn discard_reply(&mut self, token: u64) {
        self.conn.discard_reply(
            token,
            RequestKind::HasResponse,
            DiscardMode::DiscardReplyAndError,
        );
    }

    fn atom_name(&mut self, atom: Atom) -> Result<String, WireError> {
        let reply = self
            .conn
            .get_atom_name(atom)
            .map_err(connection_error)?
            .reply()
            .map_err(WireError::other)?;
        Ok(String::from_utf8_lossy(&reply.name).into_owned())
    }

    fn get_property(
        &mut self,
        window: Window,
        property: Atom,
    ) -> Result<Option<RawProperty>, WireError> {
        let cookie = self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, PROPERTY_LENGTH)
            .map_err(connection_error)?;
        let reply = match cookie.reply() {
            Ok(reply) => reply,
            Err(ReplyError::X11Error(err)) => {
                trace!("GetProperty on {:#x} failed: {:?}", window, err.error_kind);
                return Ok(None);
            },
            Err(ReplyError::ConnectionError(err)) => return Err(connection_error(err)),
        };
        if reply.type_ == x11rb::NONE {
            return Ok(None);
        }
        Ok(Some(RawProperty {
            type_: reply.type_,
            format: reply.format,
            value: reply.value,
        }))
    }

    fn change_property8(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        data: &[u8],
    ) -> Result<(), WireError> {
        queued(
            self.conn
                .change_property8(PropMode::REPLACE, window, property, type_, data),
        )
    }

    fn change_property32(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        data: &[u32],
    ) -> Result<(), WireError> {
        queued(
            self.conn
                .change_property32(PropMode::REPLACE, window, property, type_, data),
        )
    }

    fn delete_property(&mut self, window: Window, property: Atom) -> Result<(), WireError> {
        queued(self.conn.delete_property(window, property))
    }

    fn create_input_window(&mut self, window: Window, parent: Window) -> Result<(), WireError> {
        queued(self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            parent,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new().override_redirect(1),
        ))
    }

    fn destroy_window(&mut self, window: Window) -> Result<(), WireError> {
        queued(self.conn.destroy_window(window))
    }

    fn map_window(&mut self, window: Window) -> Result<(), WireError> {
        queued(self.conn.map_window(window))
    }

    fn unmap_window(&mut self, window: Window) -> Result<(), WireError> {
        queued(self.conn.unmap_window(window))
    }

    fn configure_window(
        &mut self,
        window: Window,
        config: &WindowConfig,
    ) -> Result<(), WireError> {
        let aux = ConfigureWindowAux::new()
            .x(config.x)
            .y(config.y)
            .width(config.width)
            .height(config.height)
            .border_width(config.border_width)
            .sibling(config.sibling)
            .stack_mode(config.stack_mode.map(to_x11_stack_mode));
        queued(self.conn.configure_window(window, &aux))
    }

    fn change_event_mask(&mut self, window: Window, mask: EventMask) -> Result<(), WireError> {
        let aux = ChangeWindowAttributesAux::new().event_mask(xproto::EventMask::from(mask.bits()));
        queued(self.conn.change_window_attributes(window, &aux))
    }

    fn send_configure_notify(
        &mut self,
        window: Window,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        border_width: u32,
    ) -> Result<(), WireError> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: x11rb::NONE,
            x: x as i16,
            y: y as i16,
            width: width as u16,
            height: height as u16,
            border_width: border_width as u16,
            override_redirect: false,
        };
        queued(
            self.conn
                .send_event(false, window, xproto::EventMask::STRUCTURE_NOTIFY, event),
        )
    }

    fn send_client_message(
        &mut self,
        destination: Window,
        window: Window,
        type_: Atom,
        data: [u32; 5],
        mask: EventMask,
    ) -> Result<(), WireError> {
        let event = ClientMessageEvent::new(32, window, type_, data);
        queued(self.conn.send_event(
            false,
            destination,
            xproto::EventMask::from(mask.bits()),
            event,
        ))
    }

    fn set_selection_owner(
        &mut self,
        owner: Window,
        selection: Atom,
        time: u32,
    ) -> Result<(), WireError> {
        queued(self.conn.set_selection_owner(owner, selection, time))
    }

    fn set_input_focus(&mut self, window: Window, time: u32) -> Result<(), WireError> {
        queued(
            self.conn
                .set_input_focus(InputFocus::POINTER_ROOT, window, time),
        )
    }

    fn kill_client(&mut self, resource: u32) -> Result<(), WireError> {
        queued(self.conn.kill_client(resource))
    }

    fn composite_available(&mut self) -> bool {
        if let Some(available) = self.composite {
            return available;
        }
        let present = matches!(
            self.conn.extension_information(composite::X11_EXTENSION_NAME),
            Ok(Some(_))
        );
        // The version must be negotiated before any other Composite request.
        let available = present
            && self
                .conn
                .composite_query_version(COMPOSITE_VERSION.0, COMPOSITE_VERSION.1)
                .ok()
                .and_then(|cookie| cookie.reply().ok())
                .is_some();
        self.composite = Some(available);
        available
    }

    fn redirect_subwindows(&mut self, window: Window) -> Result<(), WireError> {
        queued(
            self.conn
                .composite_redirect_subwindows(window, composite::Redirect::MANUAL),
        )
    }

    fn poll_event(&mut self) -> Result<Option<XEvent>, WireError> {
        Ok(self
            .conn
            .poll_for_event()
            .map_err(connection_error)?
            .map(translate))
    }

    fn flush(&mut self) -> Result<(), WireError> {
        self.conn.flush().map_err(connection_error)
    }
}
