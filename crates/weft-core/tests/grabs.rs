//! Interactive move/resize and popup grabs through the dispatcher.

mod common;

use pretty_assertions::assert_eq;

use common::{Req, POINTER};
use weft_core::error::ProtocolViolation;
use weft_core::grab::{GrabKind, ResizeEdges};
use weft_core::state::{Geometry, Serial};
use weft_core::surface::{ClientId, Interaction, ObjectRef, RenderSurfaceId};
use weft_core::x11::{NoX11, WindowConfig, X11Wire};
use weft_core::{
    ClientEvent, CompositorEvent, Intent, ShellAction, ShellDispatcher, ShellRequest, SurfaceId,
    SurfaceRequest,
};

type Shell = ShellDispatcher<NoX11>;

fn toplevel<W: X11Wire>(
    shell: &mut ShellDispatcher<W>,
    object: ObjectRef,
    handle: u64,
) -> SurfaceId {
    shell.handle_request(ShellRequest::GetXdgSurface {
        object,
        surface: RenderSurfaceId(handle),
    });
    shell.surface_for_object(object).unwrap()
}

fn motion<W: X11Wire>(shell: &mut ShellDispatcher<W>, x: f64, y: f64) -> Vec<ShellAction> {
    shell.handle_event(CompositorEvent::PointerMotion {
        device: POINTER,
        x,
        y,
        time_ms: 0,
        under: None,
    })
}

fn button<W: X11Wire>(
    shell: &mut ShellDispatcher<W>,
    pressed: bool,
    serial: u32,
    time_ms: u32,
    under: Option<u64>,
) -> Vec<ShellAction> {
    shell.handle_event(CompositorEvent::PointerButton {
        device: POINTER,
        button: 0x110,
        pressed,
        serial: Serial(serial),
        time_ms,
        under: under.map(RenderSurfaceId),
    })
}

fn popup_done(actions: &[ShellAction]) -> Vec<ObjectRef> {
    actions
        .iter()
        .filter_map(|action| match action {
            ShellAction::Client(ClientEvent::PopupDone { object }) => Some(*object),
            _ => None,
        })
        .collect()
}

fn popup(
    shell: &mut Shell,
    object: ObjectRef,
    handle: u64,
    parent: u64,
    serial: u32,
) -> Vec<ShellAction> {
    shell.handle_request(ShellRequest::GetXdgPopup {
        object,
        surface: RenderSurfaceId(handle),
        parent: RenderSurfaceId(parent),
        seat: POINTER,
        serial: Serial(serial),
        x: 10,
        y: 20,
    })
}

#[test]
fn invalid_edges_fail_without_grab_or_configure() {
    for edges in [0, 3, 12, 16] {
        let mut shell: Shell = common::shell();
        let object = ObjectRef::new(ClientId(1), 10);
        toplevel(&mut shell, object, 1);
        button(&mut shell, true, 7, 0, Some(1));

        let actions = shell.handle_request(ShellRequest::Surface {
            object,
            request: SurfaceRequest::Resize {
                seat: POINTER,
                serial: Serial(7),
                edges,
            },
        });
        assert_eq!(
            actions,
            vec![ShellAction::Client(ClientEvent::ProtocolError {
                client: ClientId(1),
                object: Some(object),
                violation: ProtocolViolation::InvalidResizeEdges(edges),
            })]
        );
        assert!(!shell.grabs().is_grabbed(POINTER));
    }
}

#[test]
fn move_follows_the_pointer_until_release() {
    let mut shell: Shell = common::shell();
    let object = ObjectRef::new(ClientId(1), 10);
    let surface = toplevel(&mut shell, object, 1);

    motion(&mut shell, 100.0, 100.0);
    button(&mut shell, true, 7, 0, Some(1));
    shell.handle_request(ShellRequest::Surface {
        object,
        request: SurfaceRequest::Move {
            seat: POINTER,
            serial: Serial(7),
        },
    });
    assert!(shell.grabs().is_grabbed(POINTER));
    assert!(shell
        .state()
        .surface(surface)
        .unwrap()
        .interaction
        .contains(Interaction::MOVING));

    let actions = motion(&mut shell, 150.0, 130.0);
    assert!(common::has_intent(
        &actions,
        &Intent::SetPosition {
            surface,
            x: 50,
            y: 30
        }
    ));
    assert_eq!(
        shell.state().surface(surface).unwrap().geometry.origin(),
        weft_core::state::Point::new(50, 30)
    );

    let actions = button(&mut shell, false, 8, 20, Some(1));
    assert!(common::has_intent(&actions, &Intent::GrabEnded { device: POINTER }));
    assert!(!shell.grabs().is_grabbed(POINTER));
    assert!(shell.state().surface(surface).unwrap().interaction.is_empty());
}

#[test]
fn move_with_stale_serial_is_ignored() {
    let mut shell: Shell = common::shell();
    let object = ObjectRef::new(ClientId(1), 10);
    toplevel(&mut shell, object, 1);
    button(&mut shell, true, 7, 0, Some(1));

    let actions = shell.handle_request(ShellRequest::Surface {
        object,
        request: SurfaceRequest::Move {
            seat: POINTER,
            serial: Serial(3),
        },
    });
    assert!(actions.is_empty());
    assert!(!shell.grabs().is_grabbed(POINTER));
}

#[test]
fn second_grab_on_a_device_is_rejected() {
    let mut shell: Shell = common::shell();
    let a = ObjectRef::new(ClientId(1), 10);
    let b = ObjectRef::new(ClientId(1), 11);
    let surface_a = toplevel(&mut shell, a, 1);
    let surface_b = toplevel(&mut shell, b, 2);
    button(&mut shell, true, 7, 0, Some(1));

    for object in [a, b] {
        shell.handle_request(ShellRequest::Surface {
            object,
            request: SurfaceRequest::Move {
                seat: POINTER,
                serial: Serial(7),
            },
        });
    }
    let session = shell.grabs().session(POINTER).unwrap();
    assert!(matches!(session.kind, GrabKind::Move { surface, .. } if surface == surface_a));
    assert!(shell.state().surface(surface_b).unwrap().interaction.is_empty());
}

#[test]
fn destroying_the_grabbed_surface_ends_the_grab() {
    let mut shell: Shell = common::shell();
    let object = ObjectRef::new(ClientId(1), 10);
    toplevel(&mut shell, object, 1);
    button(&mut shell, true, 7, 0, Some(1));
    shell.handle_request(ShellRequest::Surface {
        object,
        request: SurfaceRequest::Move {
            seat: POINTER,
            serial: Serial(7),
        },
    });

    let actions = shell.handle_event(CompositorEvent::RenderSurfaceDestroyed {
        surface: RenderSurfaceId(1),
    });
    assert!(common::has_intent(&actions, &Intent::GrabEnded { device: POINTER }));
    assert!(!shell.grabs().is_grabbed(POINTER));
    assert!(shell.state().surfaces.is_empty());
}

#[test]
fn popups_join_in_creation_order() {
    let mut shell: Shell = common::shell();
    toplevel(&mut shell, ObjectRef::new(ClientId(1), 10), 1);
    button(&mut shell, true, 7, 0, Some(1));

    let first = ObjectRef::new(ClientId(1), 20);
    let second = ObjectRef::new(ClientId(1), 21);
    popup(&mut shell, first, 2, 1, 7);
    popup(&mut shell, second, 3, 2, 7);

    let first_id = shell.surface_for_object(first).unwrap();
    let second_id = shell.surface_for_object(second).unwrap();
    let session = shell.grabs().session(POINTER).unwrap();
    assert_eq!(session.serial, Serial(7));
    assert_eq!(
        session.kind,
        GrabKind::Popup {
            popups: vec![first_id, second_id],
            initial_button_up: false,
        }
    );
    // Nested popups are placed relative to their parent.
    assert_eq!(
        shell.state().surface(second_id).unwrap().geometry.origin(),
        weft_core::state::Point::new(20, 40)
    );
}

#[test]
fn popup_with_stale_serial_is_dismissed() {
    let mut shell: Shell = common::shell();
    toplevel(&mut shell, ObjectRef::new(ClientId(1), 10), 1);
    button(&mut shell, true, 7, 0, Some(1));
    let first = ObjectRef::new(ClientId(1), 20);
    popup(&mut shell, first, 2, 1, 7);

    let stale = ObjectRef::new(ClientId(1), 21);
    let actions = popup(&mut shell, stale, 3, 1, 5);
    assert_eq!(popup_done(&actions), vec![stale]);

    let stale_id = shell.surface_for_object(stale).unwrap();
    let session = shell.grabs().session(POINTER).unwrap();
    assert!(matches!(&session.kind, GrabKind::Popup { popups, .. } if !popups.contains(&stale_id)));
}

#[test]
fn press_outside_after_release_dismisses_every_popup() {
    let mut shell: Shell = common::shell();
    toplevel(&mut shell, ObjectRef::new(ClientId(1), 10), 1);
    button(&mut shell, true, 7, 0, Some(1));
    let first = ObjectRef::new(ClientId(1), 20);
    let second = ObjectRef::new(ClientId(1), 21);
    popup(&mut shell, first, 2, 1, 7);
    popup(&mut shell, second, 3, 2, 7);

    // Release over the popup: forwarded, grab stays.
    let actions = button(&mut shell, false, 8, 50, Some(2));
    let first_id = shell.surface_for_object(first).unwrap();
    assert!(common::has_intent(
        &actions,
        &Intent::ForwardButton {
            device: POINTER,
            surface: first_id,
            button: 0x110,
            pressed: false,
            time_ms: 50,
        }
    ));
    assert!(shell.grabs().is_grabbed(POINTER));

    // Press on another client's surface.
    toplevel(&mut shell, ObjectRef::new(ClientId(2), 10), 9);
    let actions = button(&mut shell, true, 9, 100, Some(9));
    assert_eq!(popup_done(&actions), vec![first, second]);
    assert!(common::has_intent(&actions, &Intent::GrabEnded { device: POINTER }));
    assert!(!shell.grabs().is_grabbed(POINTER));
}

#[test]
fn press_outside_within_delay_keeps_the_grab() {
    let mut shell: Shell = common::shell();
    toplevel(&mut shell, ObjectRef::new(ClientId(1), 10), 1);
    button(&mut shell, true, 7, 1000, Some(1));
    popup(&mut shell, ObjectRef::new(ClientId(1), 20), 2, 1, 7);

    // Still the button that opened the menu and within the delay.
    let actions = button(&mut shell, true, 8, 1200, None);
    assert!(popup_done(&actions).is_empty());
    assert!(shell.grabs().is_grabbed(POINTER));

    let actions = button(&mut shell, true, 9, 1600, None);
    assert_eq!(popup_done(&actions).len(), 1);
    assert!(!shell.grabs().is_grabbed(POINTER));
}

#[test]
fn destroying_the_last_popup_ends_the_grab() {
    let mut shell: Shell = common::shell();
    toplevel(&mut shell, ObjectRef::new(ClientId(1), 10), 1);
    button(&mut shell, true, 7, 0, Some(1));
    let object = ObjectRef::new(ClientId(1), 20);
    popup(&mut shell, object, 2, 1, 7);

    let actions = shell.handle_request(ShellRequest::Surface {
        object,
        request: SurfaceRequest::Destroy,
    });
    assert!(common::has_intent(&actions, &Intent::GrabEnded { device: POINTER }));
    assert!(!shell.grabs().is_grabbed(POINTER));
}

#[test]
fn x11_resize_from_bottom_right() {
    let (mut shell, server) = common::attached_shell();
    let window = 0x60_0001;
    server.borrow_mut().push(common::create_window(
        window,
        Geometry::new(100, 100, 400, 300),
        false,
    ));
    server
        .borrow_mut()
        .push(weft_core::x11::XEvent::MapRequest { window });
    shell.process_ready_events().unwrap();
    let surface = shell.bridge().unwrap().registry.surface_of(window).unwrap();

    motion(&mut shell, 500.0, 400.0);
    let message =
        common::client_message(&server, window, "_NET_WM_MOVERESIZE", [500, 400, 4, 1, 0]);
    server.borrow_mut().push(message);
    shell.process_ready_events().unwrap();
    let session = shell.grabs().session(POINTER).unwrap();
    assert!(matches!(
        session.kind,
        GrabKind::Resize { edges, .. } if edges == ResizeEdges::BOTTOM | ResizeEdges::RIGHT
    ));
    server.borrow_mut().take_requests();

    let actions = motion(&mut shell, 550.0, 420.0);
    assert!(common::has_intent(
        &actions,
        &Intent::SetSize {
            surface,
            width: 450,
            height: 320
        }
    ));
    assert!(server.borrow().requests.contains(&Req::Configure {
        window,
        config: WindowConfig {
            x: Some(100),
            y: Some(100),
            width: Some(450),
            height: Some(320),
            ..WindowConfig::default()
        },
    }));

    button(&mut shell, false, 3, 10, None);
    assert!(!shell.grabs().is_grabbed(POINTER));
    assert!(shell.state().surface(surface).unwrap().interaction.is_empty());
}

#[test]
fn popup_grab_only_focuses_the_grabbing_client() {
    let mut shell: Shell = common::shell();
    let parent = toplevel(&mut shell, ObjectRef::new(ClientId(1), 10), 1);
    toplevel(&mut shell, ObjectRef::new(ClientId(2), 10), 9);
    button(&mut shell, true, 7, 0, Some(1));
    let menu = ObjectRef::new(ClientId(1), 20);
    popup(&mut shell, menu, 2, 1, 7);
    let menu_id = shell.surface_for_object(menu).unwrap();

    let over = |shell: &mut Shell, handle: u64| {
        shell.handle_event(CompositorEvent::PointerMotion {
            device: POINTER,
            x: 15.0,
            y: 25.0,
            time_ms: 5,
            under: Some(RenderSurfaceId(handle)),
        })
    };

    let actions = over(&mut shell, 2);
    assert!(common::has_intent(
        &actions,
        &Intent::PointerFocus {
            device: POINTER,
            surface: Some(menu_id)
        }
    ));

    let actions = over(&mut shell, 9);
    assert!(common::has_intent(
        &actions,
        &Intent::PointerFocus {
            device: POINTER,
            surface: None
        }
    ));
    assert_eq!(shell.state().device(POINTER).unwrap().pointer_focus, None);

    let actions = over(&mut shell, 1);
    assert!(common::has_intent(
        &actions,
        &Intent::PointerFocus {
            device: POINTER,
            surface: Some(parent)
        }
    ));
}

#[test]
fn x11_move_is_cancelled_by_the_client() {
    let (mut shell, server) = common::attached_shell();
    let window = 0x60_0001;
    server.borrow_mut().push(common::create_window(
        window,
        Geometry::new(100, 100, 400, 300),
        false,
    ));
    server
        .borrow_mut()
        .push(weft_core::x11::XEvent::MapRequest { window });
    shell.process_ready_events().unwrap();
    let surface = shell.bridge().unwrap().registry.surface_of(window).unwrap();

    motion(&mut shell, 300.0, 120.0);
    let message =
        common::client_message(&server, window, "_NET_WM_MOVERESIZE", [300, 120, 8, 1, 0]);
    server.borrow_mut().push(message);
    shell.process_ready_events().unwrap();
    assert!(matches!(
        shell.grabs().session(POINTER).unwrap().kind,
        GrabKind::Move { .. }
    ));
    assert!(shell
        .state()
        .surface(surface)
        .unwrap()
        .interaction
        .contains(Interaction::MOVING));

    let cancel =
        common::client_message(&server, window, "_NET_WM_MOVERESIZE", [0, 0, 11, 1, 0]);
    server.borrow_mut().push(cancel);
    let actions = shell.process_ready_events().unwrap();
    assert!(common::has_intent(&actions, &Intent::GrabEnded { device: POINTER }));
    assert!(!shell.grabs().is_grabbed(POINTER));
    assert!(shell.state().surface(surface).unwrap().interaction.is_empty());

    // Motion after the cancel leaves the window where it was.
    let actions = motion(&mut shell, 400.0, 220.0);
    assert!(!actions
        .iter()
        .any(|action| matches!(action, ShellAction::Intent(Intent::SetPosition { .. }))));
}
