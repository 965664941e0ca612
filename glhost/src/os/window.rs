//! Platform generic windows

use crate::config::GlConfig;
use crate::dispatch::RunState;
use crate::event::{Event, KeyState, Translator};
use crate::os::{NativeEvent, NativeEventKind};
use hashbrown::HashMap;
use log::trace;
use raw_window_handle::HasWindowHandle;
use std::ffi::{CStr, c_void};
use std::fmt;

/// Native side of a window: the OS window plus the OpenGL context bound to its drawable.
///
/// Also requires [`raw_window_handle::HasWindowHandle`] to be implemented.
/// None of these calls may re-enter the [`Host`](crate::Host); backends queue whatever the OS sends
/// back synchronously and hand it out through [`Platform::pump_events`](super::Platform::pump_events).
pub trait NativeWindow: HasWindowHandle {
    fn show(&self) -> anyhow::Result<()>;

    fn hide(&self) -> anyhow::Result<()>;

    fn set_title(&self, title: &str) -> anyhow::Result<()>;

    /// Resize the client area.
    fn set_size(&self, width: u32, height: u32) -> anyhow::Result<()>;

    /// Move the client area origin, in screen coordinates.
    fn set_position(&self, x: i32, y: i32) -> anyhow::Result<()>;

    /// Add or strip the title bar and border.
    fn set_decorated(&self, decorated: bool) -> anyhow::Result<()>;

    fn set_border_width(&self, width: u32) -> anyhow::Result<()>;

    fn set_minimized(&self, minimized: bool) -> anyhow::Result<()>;

    fn set_maximized(&self, maximized: bool) -> anyhow::Result<()>;

    /// Bind this window's context to the calling thread.
    fn make_current(&self) -> anyhow::Result<()>;

    /// Unbind whatever context is current on the calling thread.
    fn make_not_current(&self) -> anyhow::Result<()>;

    fn swap_buffers(&self) -> anyhow::Result<()>;

    fn set_swap_interval(&self, interval: i32) -> anyhow::Result<()>;

    /// Resolve an OpenGL entry point, or null. Only valid while this window's context is current.
    fn get_proc_address(&self, name: &CStr) -> *const c_void;
}

/// Set of attributes that control how a window is created.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowAttributes {
    /// Window title (defaults to `"Window"`)
    pub title: String,

    /// Client area width (defaults to 800)
    pub width: u32,

    /// Client area height (defaults to 600)
    pub height: u32,

    /// Position of the client area (default is platform-dependent)
    pub position: Option<WindowPosition>,

    /// Does the window have a title bar and border? (applied when first shown)
    pub decorated: bool, // = true

    /// Width of the native border in pixels (X11 only)
    pub border_width: u32, // = 0
}

impl Default for WindowAttributes {
    fn default() -> Self {
        Self {
            title: "Window".to_string(),
            width: 800,
            height: 600,
            position: None,
            decorated: true,
            border_width: 0,
        }
    }
}

/// Window position in screen coordinates.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum Visibility {
    Hidden,
    Shown,
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum Decoration {
    Decorated,
    Undecorated,
}

impl Decoration {
    fn from_flag(decorated: bool) -> Self {
        if decorated {
            Decoration::Decorated
        } else {
            Decoration::Undecorated
        }
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum SizeState {
    Normal,
    Minimized,
    Maximized,
}

/// Opaque handle to a window owned by a [`Host`](crate::Host).
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[repr(transparent)]
pub struct WindowId(u32);

impl WindowId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the host knows about a live window.
pub(crate) struct WindowRecord {
    pub native: Box<dyn NativeWindow>,
    pub config: GlConfig,
    pub title: String,
    pub size: (u32, u32),
    pub position: (i32, i32),
    pub visibility: Visibility,
    /// What the application asked for.
    pub decoration: Decoration,
    /// What the native window currently has.
    pub applied_decoration: Decoration,
    pub size_state: SizeState,
    pub keys: KeyState,
    pub run_state: RunState,
}

impl WindowRecord {
    pub fn new(
        native: Box<dyn NativeWindow>,
        attributes: &WindowAttributes,
        config: GlConfig,
    ) -> Self {
        // native windows are always created with chrome, the requested decoration lands on first show
        Self {
            native,
            config,
            title: attributes.title.clone(),
            size: (attributes.width, attributes.height),
            position: attributes.position.map_or((0, 0), |p| (p.x, p.y)),
            visibility: Visibility::Hidden,
            decoration: Decoration::from_flag(attributes.decorated),
            applied_decoration: Decoration::Decorated,
            size_state: SizeState::Normal,
            keys: KeyState::default(),
            run_state: RunState::Idle,
        }
    }

    pub fn request_decoration(&mut self, decorated: bool) {
        self.decoration = Decoration::from_flag(decorated);
    }

    /// Push a pending decoration change to the native window. Called on every show.
    pub fn apply_decoration(&mut self) -> anyhow::Result<()> {
        if self.decoration != self.applied_decoration {
            self.native
                .set_decorated(self.decoration == Decoration::Decorated)?;
            self.applied_decoration = self.decoration;
        }
        Ok(())
    }

    /// Fold OS-reported state into the record.
    fn observe(&mut self, kind: &NativeEventKind) {
        match *kind {
            NativeEventKind::Resized { width, height } => self.size = (width, height),
            NativeEventKind::Moved { x, y } => self.position = (x, y),
            NativeEventKind::SizeStateChanged(state) => self.size_state = state,
            _ => (),
        }
    }
}

pub(crate) struct WindowManager {
    window_id_counter: u32,
    windows: HashMap<WindowId, WindowRecord>,
}

impl WindowManager {
    pub fn new() -> Self {
        Self {
            window_id_counter: 0,
            windows: HashMap::new(),
        }
    }

    /// Ids are never reused, so a stale handle can't alias a newer window.
    pub fn next_id(&mut self) -> WindowId {
        let id = WindowId(self.window_id_counter);
        self.window_id_counter += 1;
        id
    }

    pub fn insert(&mut self, id: WindowId, record: WindowRecord) {
        _ = self.windows.insert(id, record);
    }

    pub fn remove(&mut self, id: WindowId) -> Option<WindowRecord> {
        self.windows.remove(&id)
    }

    pub fn get(&self, id: WindowId) -> Option<&WindowRecord> {
        self.windows.get(&id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowRecord> {
        self.windows.get_mut(&id)
    }

    pub fn is_window_alive(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    pub fn any_pumping(&self) -> bool {
        self.windows
            .values()
            .any(|w| w.run_state == RunState::Pumping)
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (WindowId, WindowRecord)> + '_ {
        self.windows.drain()
    }

    /// Apply one native message: the addressed window's geometry is updated, and a message aimed
    /// at `target` is translated into the event its handler will see.
    ///
    /// The run loop feeds a batch through here one message at a time, between handler calls, so key
    /// polling inside a handler sees exactly the events delivered so far.
    pub fn translate(
        &mut self,
        native: &NativeEvent,
        target: WindowId,
        translator: &mut Translator,
    ) -> Option<Event> {
        let Some(record) = self.windows.get_mut(&native.window) else {
            trace!("Dropping {:?} for unknown window {}", native.kind, native.window);
            return None;
        };

        record.observe(&native.kind);

        if native.window != target {
            return None;
        }

        let event = translator.translate(&native.kind, &mut record.keys);
        if let Some(event) = event {
            trace!("{} -> {:?}", native.window, event);
        }
        event
    }
}
