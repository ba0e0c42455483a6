//! Window-manager selections and the EWMH supporting-WM check window.

use tracing::{debug, info, warn};

use super::atoms::names;
use super::connection::X11ConnectionContext;
use super::wire::{Atom, Window, WireError, X11Wire, ATOM_ATOM, ATOM_NONE, ATOM_WINDOW, CURRENT_TIME};

/// Hints advertised in `_NET_SUPPORTED`.
const SUPPORTED: [&str; 6] = [
    names::NET_WM_MOVERESIZE,
    names::NET_WM_STATE,
    names::NET_WM_STATE_FULLSCREEN,
    names::NET_WM_STATE_MAXIMIZED_VERT,
    names::NET_WM_STATE_MAXIMIZED_HORZ,
    names::NET_ACTIVE_WINDOW,
];

const SELECTIONS: [&str; 2] = [names::WM_S0, names::NET_WM_CM_S0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OwnedSelection {
    atom: Atom,
    lost: bool,
}

/// Holds `WM_S0` / `_NET_WM_CM_S0` through a dedicated check window.
#[derive(Debug)]
pub struct SelectionOwner {
    window: Window,
    selections: Vec<OwnedSelection>,
}

impl SelectionOwner {
    /// Create the check window, publish the supported hints and take the
    /// window-manager selections.
    pub fn acquire<W: X11Wire>(
        conn: &mut X11ConnectionContext<W>,
        wm_name: &str,
    ) -> Result<Self, WireError> {
        let root = conn.root_window();
        let window = conn.generate_id()?;
        conn.wire().create_input_window(window, root)?;

        let check = conn.atom(names::NET_SUPPORTING_WM_CHECK);
        if check == ATOM_NONE {
            warn!("_NET_SUPPORTING_WM_CHECK unavailable, not advertising WM");
        } else {
            conn.wire().change_property32(window, check, ATOM_WINDOW, &[window])?;
            conn.wire().change_property32(root, check, ATOM_WINDOW, &[window])?;
        }

        let net_wm_name = conn.atom(names::NET_WM_NAME);
        let utf8 = conn.atom(names::UTF8_STRING);
        if net_wm_name != ATOM_NONE && utf8 != ATOM_NONE {
            conn.wire()
                .change_property8(window, net_wm_name, utf8, wm_name.as_bytes())?;
        }

        let supported: Vec<Atom> = SUPPORTED
            .iter()
            .map(|name| conn.atom(name))
            .filter(|&atom| atom != ATOM_NONE)
            .collect();
        let net_supported = conn.atom(names::NET_SUPPORTED);
        if net_supported != ATOM_NONE {
            conn.wire()
                .change_property32(root, net_supported, ATOM_ATOM, &supported)?;
        }

        let mut selections = Vec::new();
        for name in SELECTIONS {
            let atom = conn.atom(name);
            if atom == ATOM_NONE {
                warn!("Selection {} unavailable", name);
                continue;
            }
            conn.wire().set_selection_owner(window, atom, CURRENT_TIME)?;
            selections.push(OwnedSelection { atom, lost: false });
        }

        info!("Window manager selections acquired via {:#x}", window);
        Ok(Self { window, selections })
    }

    pub const fn window(&self) -> Window {
        self.window
    }

    pub fn owns(&self, selection: Atom) -> bool {
        self.selections
            .iter()
            .any(|owned| owned.atom == selection && !owned.lost)
    }

    /// Record a `SelectionClear`. Returns whether it concerned us.
    pub fn selection_cleared(&mut self, owner: Window, selection: Atom) -> bool {
        if owner != self.window {
            debug!("SelectionClear for foreign owner {:#x}", owner);
            return false;
        }
        match self
            .selections
            .iter_mut()
            .find(|owned| owned.atom == selection)
        {
            Some(owned) => {
                warn!("Lost ownership of selection {}", selection);
                owned.lost = true;
                true
            },
            None => false,
        }
    }

    /// Destroy the check window.
    pub fn release<W: X11Wire>(self, conn: &mut X11ConnectionContext<W>) {
        if let Err(err) = conn.wire().destroy_window(self.window) {
            debug!("Failed to destroy check window: {}", err);
        }
    }
}
