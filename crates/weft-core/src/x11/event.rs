//! X11 events the window manager reacts to, decoupled from any client
//! library.

use bitflags::bitflags;

use super::wire::{Atom, StackMode, Window, WindowConfig};

bitflags! {
    /// Fields present in a `ConfigureRequest`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConfigMask: u16 {
        const X            = 1 << 0;
        const Y            = 1 << 1;
        const WIDTH        = 1 << 2;
        const HEIGHT       = 1 << 3;
        const BORDER_WIDTH = 1 << 4;
        const SIBLING      = 1 << 5;
        const STACK_MODE   = 1 << 6;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub window: Window,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub border_width: u32,
    pub sibling: Window,
    pub stack_mode: StackMode,
    pub mask: ConfigMask,
}

impl ConfigureRequest {
    /// Requested size with absent fields taken from `current`.
    pub fn size_or(&self, current: (u32, u32)) -> (u32, u32) {
        let width = if self.mask.contains(ConfigMask::WIDTH) {
            self.width
        } else {
            current.0
        };
        let height = if self.mask.contains(ConfigMask::HEIGHT) {
            self.height
        } else {
            current.1
        };
        (width, height)
    }

    /// Sibling and stack mode, only when present in the mask.
    pub fn stacking(&self) -> WindowConfig {
        WindowConfig {
            sibling: self
                .mask
                .contains(ConfigMask::SIBLING)
                .then_some(self.sibling),
            stack_mode: self
                .mask
                .contains(ConfigMask::STACK_MODE)
                .then_some(self.stack_mode),
            ..WindowConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XEvent {
    CreateNotify {
        window: Window,
        parent: Window,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        override_redirect: bool,
    },
    DestroyNotify {
        window: Window,
    },
    MapRequest {
        window: Window,
    },
    MapNotify {
        window: Window,
        override_redirect: bool,
    },
    UnmapNotify {
        window: Window,
        /// Sent with `SendEvent` (high bit of the event code set).
        synthetic: bool,
    },
    ConfigureRequest(ConfigureRequest),
    ConfigureNotify {
        window: Window,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        override_redirect: bool,
    },
    PropertyNotify {
        window: Window,
        atom: Atom,
        deleted: bool,
    },
    ClientMessage {
        window: Window,
        type_: Atom,
        format: u8,
        data: [u32; 5],
    },
    SelectionClear {
        owner: Window,
        selection: Atom,
        time: u32,
    },
    /// Asynchronous error reply for an earlier request.
    Error {
        code: u8,
        resource: u32,
    },
    /// Anything the window manager does not handle; `code` is the response
    /// type.
    Other {
        code: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_fall_back() {
        let request = ConfigureRequest {
            window: 1,
            x: 0,
            y: 0,
            width: 300,
            height: 0,
            border_width: 0,
            sibling: 42,
            stack_mode: StackMode::Below,
            mask: ConfigMask::WIDTH | ConfigMask::STACK_MODE,
        };
        assert_eq!(request.size_or((10, 20)), (300, 20));

        let stacking = request.stacking();
        assert_eq!(stacking.sibling, None);
        assert_eq!(stacking.stack_mode, Some(StackMode::Below));
    }
}
