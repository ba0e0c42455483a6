//! Core shell state: geometry, outputs, input devices, serials and the
//! surface arena.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::config::Config;
use crate::surface::{ClientId, RenderSurfaceId, ShellSurface, SurfaceId};

/// Geometry of a rectangular region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_parts(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub const fn origin(self) -> Point {
        Point::new(self.x, self.y)
    }

    pub const fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    #[allow(clippy::cast_possible_wrap)]
    pub const fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x + self.width as i32
            && y >= self.y
            && y < self.y + self.height as i32
    }
}

/// A position in compositor-global logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A surface size in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A display-wide serial correlating a server event with a client reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Serial(pub u32);

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "serial:{}", self.0)
    }
}

/// Monotonic serial allocator. One per display; serials are never reused.
#[derive(Debug, Clone)]
pub struct SerialCounter {
    next: u32,
}

impl Default for SerialCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl SerialCounter {
    pub fn next_serial(&mut self) -> Serial {
        let serial = Serial(self.next);
        self.next += 1;
        serial
    }

    /// The serial the next call to [`next_serial`](Self::next_serial) returns.
    pub const fn peek(&self) -> Serial {
        Serial(self.next)
    }
}

/// Identifier of an output as reported by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(pub u64);

/// Output (monitor) information.
#[derive(Debug, Clone)]
pub struct Output {
    pub id: OutputId,
    pub name: String,
    /// Full output geometry, used for fullscreen.
    pub geometry: Geometry,
    /// Geometry minus panels/reserved areas, used for maximize.
    pub available: Geometry,
}

/// Identifier of a seat / input device as reported by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "seat:{}", self.0)
    }
}

/// Pointer-side state of one input device, fed by compositor input events.
#[derive(Debug, Clone)]
pub struct InputDevice {
    pub id: DeviceId,
    pub pointer: (f64, f64),
    pub pressed_buttons: Vec<u32>,
    /// Serial of the last button press; popup grabs are scoped to it.
    pub pointer_grab_serial: Serial,
    /// Timestamp (ms) of the last button press.
    pub grab_time_ms: u32,
    /// Timestamp (ms) of the most recent input event.
    pub last_time_ms: u32,
    pub pointer_focus: Option<SurfaceId>,
}

impl InputDevice {
    pub const fn new(id: DeviceId) -> Self {
        Self {
            id,
            pointer: (0.0, 0.0),
            pressed_buttons: Vec::new(),
            pointer_grab_serial: Serial(0),
            grab_time_ms: 0,
            last_time_ms: 0,
            pointer_focus: None,
        }
    }

    pub fn button_pressed(&self) -> bool {
        !self.pressed_buttons.is_empty()
    }
}

/// The central shell state shared by the state machine, the grab
/// controller and the XWayland bridge.
pub struct ShellState {
    pub config: Config,
    pub surfaces: IndexMap<SurfaceId, ShellSurface>,
    pub outputs: IndexMap<OutputId, Output>,
    pub active_output: Option<OutputId>,
    pub devices: IndexMap<DeviceId, InputDevice>,
    pub default_device: Option<DeviceId>,
    /// Rendering surface → shell surface holding its role.
    pub roles: HashMap<RenderSurfaceId, SurfaceId>,
    /// The Wayland client the X11 proxy server connects as.
    pub xwayland_client: Option<ClientId>,
    pub keyboard_focus: Option<SurfaceId>,
    pub serials: SerialCounter,
    next_surface: u64,
}

impl ShellState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            surfaces: IndexMap::new(),
            outputs: IndexMap::new(),
            active_output: None,
            devices: IndexMap::new(),
            default_device: None,
            roles: HashMap::new(),
            xwayland_client: None,
            keyboard_focus: None,
            serials: SerialCounter::default(),
            next_surface: 1,
        }
    }

    /// Generate a fresh, unique `SurfaceId`.
    pub fn next_surface_id(&mut self) -> SurfaceId {
        let id = SurfaceId(self.next_surface);
        self.next_surface += 1;
        id
    }

    pub fn insert_surface(&mut self, surface: ShellSurface) -> SurfaceId {
        let id = surface.id;
        if let Some(handle) = surface.surface_handle {
            self.roles.insert(handle, id);
        }
        self.surfaces.insert(id, surface);
        id
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&ShellSurface> {
        self.surfaces.get(&id)
    }

    pub fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut ShellSurface> {
        self.surfaces.get_mut(&id)
    }

    /// Shell surface currently holding the role of a rendering surface.
    pub fn surface_for_handle(&self, handle: RenderSurfaceId) -> Option<SurfaceId> {
        self.roles.get(&handle).copied()
    }

    /// The Wayland client owning a surface. X11 surfaces belong to the
    /// proxy server's client.
    pub fn client_of(&self, id: SurfaceId) -> Option<ClientId> {
        let surface = self.surfaces.get(&id)?;
        surface.client().or(self.xwayland_client)
    }

    /// Output to place a surface on: the requested one, else the active
    /// one, else the first known.
    pub fn output(&self, requested: Option<OutputId>) -> Option<&Output> {
        requested
            .and_then(|id| self.outputs.get(&id))
            .or_else(|| self.active_output.and_then(|id| self.outputs.get(&id)))
            .or_else(|| self.outputs.values().next())
    }

    pub fn device_mut(&mut self, id: DeviceId) -> &mut InputDevice {
        self.devices.entry(id).or_insert_with(|| InputDevice::new(id))
    }

    pub fn device(&self, id: DeviceId) -> Option<&InputDevice> {
        self.devices.get(&id)
    }

    /// Device used for X11-initiated grabs, which carry no seat.
    pub fn default_device(&self) -> Option<DeviceId> {
        self.default_device
            .or_else(|| self.devices.keys().next().copied())
    }

    /// Validate shell invariants. See `invariants` module.
    pub fn validate_invariants(&self) -> Result<(), crate::invariants::InvariantError> {
        crate::invariants::validate_state(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_are_monotonic() {
        let mut counter = SerialCounter::default();
        let a = counter.next_serial();
        let b = counter.next_serial();
        assert!(b > a);
        assert_eq!(counter.peek(), Serial(b.0 + 1));
    }

    #[test]
    fn output_falls_back_to_active_then_first() {
        let mut state = ShellState::new(Config::default());
        assert!(state.output(None).is_none());

        for (id, x) in [(1, 0), (2, 1920)] {
            state.outputs.insert(
                OutputId(id),
                Output {
                    id: OutputId(id),
                    name: format!("out-{id}"),
                    geometry: Geometry::new(x, 0, 1920, 1080),
                    available: Geometry::new(x, 32, 1920, 1048),
                },
            );
        }
        assert_eq!(state.output(None).map(|o| o.id), Some(OutputId(1)));

        state.active_output = Some(OutputId(2));
        assert_eq!(state.output(None).map(|o| o.id), Some(OutputId(2)));
        assert_eq!(state.output(Some(OutputId(1))).map(|o| o.id), Some(OutputId(1)));
        assert_eq!(state.output(Some(OutputId(9))).map(|o| o.id), Some(OutputId(2)));
    }

    #[test]
    fn geometry_contains() {
        let geo = Geometry::new(10, 10, 100, 50);
        assert!(geo.contains(10, 10));
        assert!(geo.contains(109, 59));
        assert!(!geo.contains(110, 20));
    }
}
