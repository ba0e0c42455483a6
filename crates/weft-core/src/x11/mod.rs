//! XWayland window management.
//!
//! The shell acts as the X11 window manager of the proxy server. One
//! [`XWaylandBridge`] exists per proxy server lifetime; it owns the
//! connection, the window registry and the window-manager selections.

pub mod atoms;
pub mod connection;
pub mod event;
pub mod property;
pub mod registry;
pub mod selection;
pub mod wire;

use tracing::{info, warn};

pub use self::atoms::AtomTable;
pub use self::connection::X11ConnectionContext;
pub use self::event::{ConfigMask, ConfigureRequest, XEvent};
pub use self::property::{PropertyValue, WatchedProperty};
pub use self::registry::{MoveResize, WindowRegistry, X11Request};
pub use self::selection::SelectionOwner;
pub use self::wire::{
    Atom, EventMask, RawProperty, ScreenInfo, SetupInfo, StackMode, Window, WindowConfig,
    NoX11, WireError, X11Wire, ATOM_NONE,
};

use crate::config::Config;
use crate::error::ShellError;
use crate::state::ShellState;

pub struct XWaylandBridge<W: X11Wire> {
    pub conn: X11ConnectionContext<W>,
    pub registry: WindowRegistry,
    pub selection: SelectionOwner,
}

impl<W: X11Wire> XWaylandBridge<W> {
    /// Become the window manager on an established connection.
    pub fn attach(wire: W, config: &Config) -> Result<Self, ShellError> {
        let mut conn = X11ConnectionContext::open(wire)?;
        conn.prefetch_atoms(atoms::names::PREFETCH);

        let root = conn.root_window();
        conn.wire().change_event_mask(
            root,
            EventMask::SUBSTRUCTURE_NOTIFY
                | EventMask::SUBSTRUCTURE_REDIRECT
                | EventMask::PROPERTY_CHANGE,
        )?;
        if config.xwayland.redirect_subwindows {
            if conn.wire().composite_available() {
                conn.wire().redirect_subwindows(root)?;
            } else {
                warn!("Composite extension missing, windows are not redirected");
            }
        }

        let selection = SelectionOwner::acquire(&mut conn, &config.shell.wm_name)?;
        conn.flush()?;
        let (width, height) = conn.screen_size();
        info!(
            "Managing X11 windows on root {:#x} ({}x{}, depth {})",
            root,
            width,
            height,
            conn.root_depth()
        );

        Ok(Self {
            conn,
            registry: WindowRegistry::new(),
            selection,
        })
    }

    /// Drain every queued event. The caller flushes once it has routed the
    /// resulting requests.
    pub fn process_ready_events(
        &mut self,
        state: &mut ShellState,
        out: &mut Vec<X11Request>,
    ) -> Result<usize, WireError> {
        let mut count = 0;
        while let Some(event) = self.conn.wire().poll_event()? {
            count += 1;
            match event {
                XEvent::SelectionClear {
                    owner, selection, ..
                } => {
                    self.selection.selection_cleared(owner, selection);
                },
                event => self
                    .registry
                    .handle_event(&mut self.conn, state, event, out)?,
            }
        }
        Ok(count)
    }

    /// Give up the window manager role and hand the wire back.
    pub fn detach(mut self) -> W {
        self.selection.release(&mut self.conn);
        if let Err(err) = self.conn.flush() {
            warn!("Failed to flush while detaching: {}", err);
        }
        self.conn.close()
    }
}
