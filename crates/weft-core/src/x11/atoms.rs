//! Atom interning.
//!
//! Interning is lazy and idempotent: a name is sent to the server at most
//! once, and its reply is only waited for the first time the atom is read.

use std::collections::HashMap;

use tracing::{trace, warn};

use super::wire::{Atom, X11Wire, ATOM_NONE};

/// X11 atom names used by the window manager
pub mod names {
    pub const UTF8_STRING: &str = "UTF8_STRING";
    pub const WM_PROTOCOLS: &str = "WM_PROTOCOLS";
    pub const WM_DELETE_WINDOW: &str = "WM_DELETE_WINDOW";
    pub const WM_TAKE_FOCUS: &str = "WM_TAKE_FOCUS";
    pub const WM_STATE: &str = "WM_STATE";
    pub const WM_CHANGE_STATE: &str = "WM_CHANGE_STATE";
    pub const WM_S0: &str = "WM_S0";
    pub const WL_SURFACE_ID: &str = "WL_SURFACE_ID";
    pub const MOTIF_WM_HINTS: &str = "_MOTIF_WM_HINTS";

    pub const NET_SUPPORTED: &str = "_NET_SUPPORTED";
    pub const NET_SUPPORTING_WM_CHECK: &str = "_NET_SUPPORTING_WM_CHECK";
    pub const NET_WM_CM_S0: &str = "_NET_WM_CM_S0";
    pub const NET_WM_NAME: &str = "_NET_WM_NAME";
    pub const NET_WM_DESKTOP: &str = "_NET_WM_DESKTOP";
    pub const NET_WM_MOVERESIZE: &str = "_NET_WM_MOVERESIZE";
    pub const NET_WM_STATE: &str = "_NET_WM_STATE";
    pub const NET_WM_STATE_FULLSCREEN: &str = "_NET_WM_STATE_FULLSCREEN";
    pub const NET_WM_STATE_MAXIMIZED_VERT: &str = "_NET_WM_STATE_MAXIMIZED_VERT";
    pub const NET_WM_STATE_MAXIMIZED_HORZ: &str = "_NET_WM_STATE_MAXIMIZED_HORZ";
    pub const NET_WM_STATE_HIDDEN: &str = "_NET_WM_STATE_HIDDEN";
    pub const NET_WM_WINDOW_TYPE: &str = "_NET_WM_WINDOW_TYPE";
    pub const NET_WM_WINDOW_TYPE_NORMAL: &str = "_NET_WM_WINDOW_TYPE_NORMAL";
    pub const NET_WM_WINDOW_TYPE_DIALOG: &str = "_NET_WM_WINDOW_TYPE_DIALOG";
    pub const NET_WM_WINDOW_TYPE_UTILITY: &str = "_NET_WM_WINDOW_TYPE_UTILITY";
    pub const NET_WM_WINDOW_TYPE_TOOLBAR: &str = "_NET_WM_WINDOW_TYPE_TOOLBAR";
    pub const NET_WM_WINDOW_TYPE_SPLASH: &str = "_NET_WM_WINDOW_TYPE_SPLASH";
    pub const NET_WM_WINDOW_TYPE_MENU: &str = "_NET_WM_WINDOW_TYPE_MENU";
    pub const NET_WM_WINDOW_TYPE_DROPDOWN_MENU: &str = "_NET_WM_WINDOW_TYPE_DROPDOWN_MENU";
    pub const NET_WM_WINDOW_TYPE_POPUP_MENU: &str = "_NET_WM_WINDOW_TYPE_POPUP_MENU";
    pub const NET_WM_WINDOW_TYPE_TOOLTIP: &str = "_NET_WM_WINDOW_TYPE_TOOLTIP";
    pub const NET_WM_WINDOW_TYPE_NOTIFICATION: &str = "_NET_WM_WINDOW_TYPE_NOTIFICATION";
    pub const NET_WM_WINDOW_TYPE_DOCK: &str = "_NET_WM_WINDOW_TYPE_DOCK";
    pub const NET_WM_WINDOW_TYPE_DESKTOP: &str = "_NET_WM_WINDOW_TYPE_DESKTOP";
    pub const NET_ACTIVE_WINDOW: &str = "_NET_ACTIVE_WINDOW";

    /// Interned up front when a proxy server attaches.
    pub const PREFETCH: &[&str] = &[
        UTF8_STRING,
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        WM_TAKE_FOCUS,
        WM_STATE,
        WM_CHANGE_STATE,
        WM_S0,
        WL_SURFACE_ID,
        MOTIF_WM_HINTS,
        NET_SUPPORTED,
        NET_SUPPORTING_WM_CHECK,
        NET_WM_CM_S0,
        NET_WM_NAME,
        NET_WM_DESKTOP,
        NET_WM_MOVERESIZE,
        NET_WM_STATE,
        NET_WM_STATE_FULLSCREEN,
        NET_WM_STATE_MAXIMIZED_VERT,
        NET_WM_STATE_MAXIMIZED_HORZ,
        NET_WM_WINDOW_TYPE,
        NET_ACTIVE_WINDOW,
    ];
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    /// Request sent, reply not read yet.
    Pending(u64),
    Resolved(Atom),
}

/// Name → atom cache for one connection.
#[derive(Debug, Default)]
pub struct AtomTable {
    by_name: HashMap<String, Slot>,
    by_atom: HashMap<Atom, String>,
}

impl AtomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send intern requests for every name not yet known, without waiting
    /// for replies.
    pub fn prefetch<W: X11Wire + ?Sized>(&mut self, wire: &mut W, names: &[&str]) {
        for &name in names {
            if self.by_name.contains_key(name) {
                continue;
            }
            match wire.send_intern_atom(name) {
                Ok(token) => {
                    self.by_name.insert(name.to_string(), Slot::Pending(token));
                },
                Err(err) => {
                    warn!("Failed to intern atom {}: {}", name, err);
                    self.by_name
                        .insert(name.to_string(), Slot::Resolved(ATOM_NONE));
                },
            }
        }
    }

    /// The atom for `name`, interning it on first use. Returns
    /// [`ATOM_NONE`] when the server could not intern it.
    pub fn resolve<W: X11Wire + ?Sized>(&mut self, wire: &mut W, name: &str) -> Atom {
        let token = match self.by_name.get(name) {
            Some(Slot::Resolved(atom)) => return *atom,
            Some(Slot::Pending(token)) => *token,
            None => match wire.send_intern_atom(name) {
                Ok(token) => token,
                Err(err) => {
                    warn!("Failed to intern atom {}: {}", name, err);
                    self.by_name
                        .insert(name.to_string(), Slot::Resolved(ATOM_NONE));
                    return ATOM_NONE;
                },
            },
        };

        let atom = wire.intern_atom_reply(token).unwrap_or_else(|err| {
            warn!("Atom {} unavailable: {}", name, err);
            ATOM_NONE
        });
        trace!("atom {} = {}", name, atom);
        self.by_name.insert(name.to_string(), Slot::Resolved(atom));
        if atom != ATOM_NONE {
            self.by_atom.insert(atom, name.to_string());
        }
        atom
    }

    /// Already-resolved atom for `name`, without touching the wire.
    pub fn get(&self, name: &str) -> Option<Atom> {
        match self.by_name.get(name) {
            Some(Slot::Resolved(atom)) if *atom != ATOM_NONE => Some(*atom),
            _ => None,
        }
    }

    /// Name of `atom` for diagnostics.
    pub fn name_of<W: X11Wire + ?Sized>(&mut self, wire: &mut W, atom: Atom) -> String {
        if let Some(name) = self.by_atom.get(&atom) {
            return name.clone();
        }
        match wire.atom_name(atom) {
            Ok(name) => {
                self.by_atom.insert(atom, name.clone());
                name
            },
            Err(_) => format!("atom#{atom}"),
        }
    }

    /// Drop replies that were never read.
    pub fn close<W: X11Wire + ?Sized>(&mut self, wire: &mut W) {
        for slot in self.by_name.values() {
            if let Slot::Pending(token) = slot {
                wire.discard_reply(*token);
            }
        }
        self.by_name.clear();
        self.by_atom.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_names() {
        assert_eq!(names::WM_PROTOCOLS, "WM_PROTOCOLS");
        assert_eq!(names::NET_WM_STATE_FULLSCREEN, "_NET_WM_STATE_FULLSCREEN");
        assert!(names::PREFETCH.contains(&names::WL_SURFACE_ID));
    }
}
