//! The window manager's connection to the X11 proxy server.

use tracing::{error, info};

use super::atoms::AtomTable;
use super::wire::{Atom, SetupInfo, Window, WireError, X11Wire};
use crate::error::ShellError;

/// Owns the wire and everything cached about the connection.
pub struct X11ConnectionContext<W: X11Wire> {
    wire: W,
    setup: SetupInfo,
    atoms: AtomTable,
}

impl<W: X11Wire> X11ConnectionContext<W> {
    /// Take over an established connection.
    ///
    /// On failure the connection is unusable and must not be selected on.
    pub fn open(mut wire: W) -> Result<Self, ShellError> {
        let setup = wire.setup().map_err(|err| {
            error!("X11 connection is broken: {}", err);
            ShellError::Connection(err)
        })?;
        info!(
            "X11 connection open: root {:#x}, {}x{}",
            setup.screen.root, setup.screen.width, setup.screen.height
        );
        Ok(Self {
            wire,
            setup,
            atoms: AtomTable::new(),
        })
    }

    /// Drop cached replies and hand the wire back.
    pub fn close(mut self) -> W {
        self.atoms.close(&mut self.wire);
        self.wire
    }

    pub fn wire(&mut self) -> &mut W {
        &mut self.wire
    }

    pub fn atom(&mut self, name: &str) -> Atom {
        self.atoms.resolve(&mut self.wire, name)
    }

    pub fn prefetch_atoms(&mut self, names: &[&str]) {
        self.atoms.prefetch(&mut self.wire, names);
    }

    pub fn atom_name(&mut self, atom: Atom) -> String {
        self.atoms.name_of(&mut self.wire, atom)
    }

    pub const fn root_window(&self) -> Window {
        self.setup.screen.root
    }

    pub const fn root_visual(&self) -> u32 {
        self.setup.screen.root_visual
    }

    pub const fn colormap(&self) -> u32 {
        self.setup.screen.colormap
    }

    pub const fn root_depth(&self) -> u8 {
        self.setup.screen.root_depth
    }

    pub const fn screen_size(&self) -> (u16, u16) {
        (self.setup.screen.width, self.setup.screen.height)
    }

    /// Whether `id` was allocated by this connection.
    pub const fn is_own_resource(&self, id: u32) -> bool {
        id & !self.setup.resource_id_mask == self.setup.resource_id_base
    }

    pub fn generate_id(&mut self) -> Result<u32, WireError> {
        self.wire.generate_id()
    }

    pub fn flush(&mut self) -> Result<(), WireError> {
        self.wire.flush()
    }
}
