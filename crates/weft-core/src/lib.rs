//! Weft Core - window-management core for a Wayland compositor
//!
//! This crate holds the shell state machine for native toplevels and
//! popups, the pointer grab engine, and the X11 window manager that runs
//! against an XWayland proxy server. It has no dependency on a display
//! protocol library: the compositor translates its protocol traffic into
//! [`ShellRequest`]s and [`CompositorEvent`]s, feeds them to
//! [`ShellDispatcher`], and performs the returned [`ShellAction`]s.
//!
//! X11 access goes through the [`X11Wire`](x11::X11Wire) trait; the
//! `weft-xwayland` crate implements it on a real connection.
//!
//! # Quick Start
//! ```
//! use weft_core::config::Config;
//! use weft_core::surface::{ClientId, ObjectRef, RenderSurfaceId};
//! use weft_core::x11::NoX11;
//! use weft_core::{ClientEvent, ShellAction, ShellDispatcher, ShellRequest};
//!
//! let mut shell = ShellDispatcher::<NoX11>::new(Config::default());
//!
//! // A client gives its surface the toplevel role
//! let actions = shell.handle_request(ShellRequest::GetXdgSurface {
//!     object: ObjectRef::new(ClientId(1), 10),
//!     surface: RenderSurfaceId(3),
//! });
//!
//! // ...and is asked to pick its own size
//! assert!(actions.iter().any(|action| matches!(
//!     action,
//!     ShellAction::Client(ClientEvent::Configure { width: 0, height: 0, .. })
//! )));
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod grab;
pub mod invariants;
pub mod state;
pub mod surface;
pub mod x11;
pub mod xdg;

// Re-export primary API types at crate root
pub use dispatch::ShellDispatcher;
pub use error::{ProtocolViolation, ShellError};
pub use event::{ClientEvent, CompositorEvent, Intent, ShellAction, ShellRequest, SurfaceRequest};
pub use state::{Geometry, Serial, ShellState};
pub use surface::SurfaceId;
