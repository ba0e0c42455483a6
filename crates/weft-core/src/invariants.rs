//! Invariant validation for the shell state.
//!
//! Called after every dispatcher entry point in debug builds.

use std::collections::HashSet;

use crate::grab::{GrabController, GrabKind};
use crate::state::ShellState;
use crate::surface::{Interaction, SurfaceId};
use crate::x11::WindowRegistry;

/// Error indicating which invariant was violated.
#[derive(Debug, thiserror::Error)]
pub enum InvariantError {
    #[error("{surface} has pending serial {serial} not below the next serial {next}")]
    SerialNotIssued {
        surface: SurfaceId,
        serial: u32,
        next: u32,
    },

    #[error("role binding for {0} points to a missing surface")]
    RoleToMissing(String),

    #[error("{0} holds a rendering surface that is not bound to it")]
    RoleMismatch(SurfaceId),

    #[error("grab references missing surface {0}")]
    GrabToMissing(SurfaceId),

    #[error("{0} is the target of more than one move/resize grab")]
    SurfaceGrabbedTwice(SurfaceId),

    #[error("{0} is grabbed without its interaction flag")]
    InteractionFlagMissing(SurfaceId),

    #[error("popup grab holds {0}, which is not a popup")]
    NotAPopup(SurfaceId),

    #[error("X11 window {0:#x} maps to a missing surface")]
    WindowToMissing(u32),

    #[error("keyboard focus on missing surface {0}")]
    FocusToMissing(SurfaceId),
}

/// Validate state-only invariants. Returns the first violation found.
pub fn validate_state(state: &ShellState) -> Result<(), InvariantError> {
    // 1. Pending serials were issued by the display counter
    let next = state.serials.peek();
    for surface in state.surfaces.values() {
        if let Some((&serial, _)) = surface.pending.last_key_value() {
            if serial >= next {
                return Err(InvariantError::SerialNotIssued {
                    surface: surface.id,
                    serial: serial.0,
                    next: next.0,
                });
            }
        }
    }

    // 2. Role bindings and surface handles agree
    for (handle, id) in &state.roles {
        let Some(surface) = state.surface(*id) else {
            return Err(InvariantError::RoleToMissing(handle.to_string()));
        };
        if surface.surface_handle != Some(*handle) {
            return Err(InvariantError::RoleMismatch(*id));
        }
    }
    for surface in state.surfaces.values() {
        if let Some(handle) = surface.surface_handle {
            if state.surface_for_handle(handle) != Some(surface.id) {
                return Err(InvariantError::RoleMismatch(surface.id));
            }
        }
    }

    // 3. Focus points to a live surface
    if let Some(focus) = state.keyboard_focus {
        if state.surface(focus).is_none() {
            return Err(InvariantError::FocusToMissing(focus));
        }
    }

    Ok(())
}

/// Validate all invariants, including grabs and the X11 registry.
pub fn validate(
    state: &ShellState,
    grabs: &GrabController,
    registry: Option<&WindowRegistry>,
) -> Result<(), InvariantError> {
    validate_state(state)?;

    // 4. Grabs reference live surfaces; a surface has at most one
    //    move/resize grab
    let mut grabbed = HashSet::new();
    for session in grabs.sessions() {
        match &session.kind {
            GrabKind::Move { surface, .. } | GrabKind::Resize { surface, .. } => {
                let Some(s) = state.surface(*surface) else {
                    return Err(InvariantError::GrabToMissing(*surface));
                };
                if !grabbed.insert(*surface) {
                    return Err(InvariantError::SurfaceGrabbedTwice(*surface));
                }
                let flag = if matches!(session.kind, GrabKind::Move { .. }) {
                    Interaction::MOVING
                } else {
                    Interaction::RESIZING
                };
                if !s.interaction.contains(flag) {
                    return Err(InvariantError::InteractionFlagMissing(*surface));
                }
            },
            GrabKind::Popup { popups, .. } => {
                for popup in popups {
                    match state.surface(*popup) {
                        None => return Err(InvariantError::GrabToMissing(*popup)),
                        Some(s) if !s.is_popup() => {
                            return Err(InvariantError::NotAPopup(*popup))
                        },
                        Some(_) => {},
                    }
                }
            },
        }
    }

    // 5. Registry entries reference live surfaces
    if let Some(registry) = registry {
        for (window, surface) in registry.entries() {
            if state.surface(surface).is_none() {
                return Err(InvariantError::WindowToMissing(window));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::{Geometry, Serial};
    use crate::surface::{ClientId, ObjectRef, RenderSurfaceId, ShellSurface, SurfaceRole};
    use crate::xdg::ConfigureIntent;

    fn native(state: &mut ShellState, handle: u64) -> SurfaceId {
        let id = state.next_surface_id();
        state.insert_surface(ShellSurface::new_native(
            id,
            ObjectRef::new(ClientId(1), handle as u32),
            RenderSurfaceId(handle),
            SurfaceRole::Toplevel,
        ));
        id
    }

    #[test]
    fn empty_state_is_valid() {
        let state = ShellState::new(Config::default());
        assert!(validate(&state, &GrabController::new(), None).is_ok());
    }

    #[test]
    fn unissued_serial_is_flagged() {
        let mut state = ShellState::new(Config::default());
        let id = native(&mut state, 3);
        state
            .surface_mut(id)
            .unwrap()
            .pending
            .insert(Serial(99), ConfigureIntent::default());
        assert!(matches!(
            validate_state(&state),
            Err(InvariantError::SerialNotIssued { .. })
        ));
    }

    #[test]
    fn dangling_role_is_flagged() {
        let mut state = ShellState::new(Config::default());
        let id = native(&mut state, 4);
        state.surfaces.shift_remove(&id);
        assert!(matches!(
            validate_state(&state),
            Err(InvariantError::RoleToMissing(_))
        ));
    }

    #[test]
    fn x11_surface_without_handle_is_valid() {
        let mut state = ShellState::new(Config::default());
        let id = state.next_surface_id();
        state.insert_surface(ShellSurface::new_x11(id, 0x60_0001, Geometry::default(), false));
        assert!(validate_state(&state).is_ok());
    }
}
