//! x11rb events to the core's [`XEvent`].

use tracing::trace;
use x11rb::protocol::xproto::{self, Property};
use x11rb::protocol::Event;

use weft_core::x11::{ConfigMask, ConfigureRequest, StackMode, XEvent};

/// High bit of the response type: the event came from `SendEvent`.
const SEND_EVENT_BIT: u8 = 0x80;

pub fn translate(event: Event) -> XEvent {
    match event {
        Event::CreateNotify(e) => XEvent::CreateNotify {
            window: e.window,
            parent: e.parent,
            x: e.x.into(),
            y: e.y.into(),
            width: e.width.into(),
            height: e.height.into(),
            override_redirect: e.override_redirect,
        },
        Event::DestroyNotify(e) => XEvent::DestroyNotify { window: e.window },
        Event::MapRequest(e) => XEvent::MapRequest { window: e.window },
        Event::MapNotify(e) => XEvent::MapNotify {
            window: e.window,
            override_redirect: e.override_redirect,
        },
        Event::UnmapNotify(e) => XEvent::UnmapNotify {
            window: e.window,
            synthetic: e.response_type & SEND_EVENT_BIT != 0,
        },
        Event::ConfigureRequest(e) => XEvent::ConfigureRequest(ConfigureRequest {
            window: e.window,
            x: e.x.into(),
            y: e.y.into(),
            width: e.width.into(),
            height: e.height.into(),
            border_width: e.border_width.into(),
            sibling: e.sibling,
            stack_mode: stack_mode(e.stack_mode),
            mask: ConfigMask::from_bits_truncate(u16::from(e.value_mask)),
        }),
        Event::ConfigureNotify(e) => XEvent::ConfigureNotify {
            window: e.window,
            x: e.x.into(),
            y: e.y.into(),
            width: e.width.into(),
            height: e.height.into(),
            override_redirect: e.override_redirect,
        },
        Event::PropertyNotify(e) => XEvent::PropertyNotify {
            window: e.window,
            atom: e.atom,
            deleted: e.state == Property::DELETE,
        },
        Event::ClientMessage(e) => XEvent::ClientMessage {
            window: e.window,
            type_: e.type_,
            format: e.format,
            data: e.data.as_data32(),
        },
        Event::SelectionClear(e) => XEvent::SelectionClear {
            owner: e.owner,
            selection: e.selection,
            time: e.time,
        },
        Event::Error(err) => XEvent::Error {
            code: err.error_code,
            resource: err.bad_value,
        },
        other => {
            trace!("passing over {:?}", other);
            XEvent::Other {
                code: other.response_type(),
            }
        },
    }
}

fn stack_mode(mode: xproto::StackMode) -> StackMode {
    match mode {
        xproto::StackMode::BELOW => StackMode::Below,
        xproto::StackMode::TOP_IF => StackMode::TopIf,
        xproto::StackMode::BOTTOM_IF => StackMode::BottomIf,
        xproto::StackMode::OPPOSITE => StackMode::Opposite,
        _ => StackMode::Above,
    }
}

pub(crate) const fn to_x11_stack_mode(mode: StackMode) -> xproto::StackMode {
    match mode {
        StackMode::Above => xproto::StackMode::ABOVE,
        StackMode::Below => xproto::StackMode::BELOW,
        StackMode::TopIf => xproto::StackMode::TOP_IF,
        StackMode::BottomIf => xproto::StackMode::BOTTOM_IF,
        StackMode::Opposite => xproto::StackMode::OPPOSITE,
    }
}
