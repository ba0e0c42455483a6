//! Weft XWayland - x11rb adapter for `weft-core`.
//!
//! This crate:
//! - Implements [`X11Wire`](weft_core::x11::X11Wire) on an x11rb `RustConnection`.
//! - Translates x11rb events into the core's `XEvent`.
//! - Registers the X11 socket as a `calloop` readiness source.
//!
//! **No x11rb types leak into `weft-core`.**

pub mod event;
pub mod wire;

use std::os::fd::AsFd;

use calloop::generic::Generic;
use calloop::{Interest, LoopHandle, Mode, PostAction, RegistrationToken};

pub use wire::RustWire;

#[derive(Debug, thiserror::Error)]
pub enum XWaylandError {
    #[error("failed to connect to X11 server: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to register X11 socket: {0}")]
    EventLoop(#[from] calloop::Error),
}

/// Watch the wire's socket on `handle`.
///
/// `callback` runs whenever the socket is readable and should drain the
/// dispatcher with `process_ready_events`. The source holds its own
/// duplicate of the socket.
pub fn insert_source<'l, D, F>(
    handle: &LoopHandle<'l, D>,
    wire: &RustWire,
    mut callback: F,
) -> Result<RegistrationToken, XWaylandError>
where
    D: 'l,
    F: FnMut(&mut D) -> PostAction + 'l,
{
    let fd = wire.fd().as_fd().try_clone_to_owned()?;
    let source = Generic::new(fd, Interest::READ, Mode::Level);
    let token = handle
        .insert_source(source, move |_readiness, _fd, data| Ok(callback(data)))
        .map_err(|err| err.error)?;
    tracing::debug!("X11 socket registered with the event loop");
    Ok(token)
}
