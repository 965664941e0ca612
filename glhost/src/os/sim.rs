//! Scriptable in-process platform.
//!
//! Windows are plain records, the "driver" accepts every version up to a configurable maximum, and
//! the message queue is fed by hand with [`SimPlatform::push_batch`]. Each call to
//! [`Platform::pump_events`] hands out exactly one pushed batch. Pumping an empty queue is an error
//! instead of blocking forever.

use crate::config::{GlConfig, GlVersion};
use crate::error::Error;
use crate::os::window::{NativeWindow, WindowAttributes, WindowId};
use crate::os::{NativeEvent, NativeEventKind, Platform, PlatformKind, names};
use anyhow::bail;
use hashbrown::HashMap;
use log::debug;
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ffi::{CStr, c_void};
use std::rc::Rc;
use std::sync::Arc;

/// Entry points every simulated context resolves, whatever its version.
const CORE_ENTRY_POINTS: &[&str] = &[
    "glClear",
    "glClearColor",
    "glViewport",
    "glGetString",
    "glGetError",
    "glEnable",
    "glDisable",
    "glDrawArrays",
    "glDrawElements",
    "glGenBuffers",
    "glBindBuffer",
    "glBufferData",
    "glGenVertexArrays",
    "glBindVertexArray",
    "glCreateShader",
    "glShaderSource",
    "glCompileShader",
    "glCreateProgram",
    "glAttachShader",
    "glLinkProgram",
    "glUseProgram",
];

/// Entry points that only exist from a given version on.
const VERSIONED_ENTRY_POINTS: &[(&str, GlVersion)] = &[
    ("glDrawElementsBaseVertex", GlVersion::V3_2),
    ("glVertexAttribDivisor", GlVersion::V3_3),
    ("glPatchParameteri", GlVersion::V4_0),
    ("glDispatchCompute", GlVersion::V4_3),
    ("glCreateBuffers", GlVersion::V4_5),
    ("glSpecializeShader", GlVersion::V4_6),
];

extern "C" fn simulated_entry_point() {}

/// Native state of a simulated window, as the OS would see it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimSurface {
    pub title: String,
    pub size: (u32, u32),
    pub position: (i32, i32),
    pub visible: bool,
    pub decorated: bool,
    pub border_width: u32,
    pub minimized: bool,
    pub maximized: bool,
    pub version: GlVersion,
    pub swap_interval: i32,
    pub frames_presented: u32,
    /// Set once the native window has been released.
    pub destroyed: bool,
}

struct SimState {
    reachable: bool,
    max_version: GlVersion,
    batches: VecDeque<Vec<NativeEvent>>,
    surfaces: HashMap<WindowId, Rc<RefCell<SimSurface>>>,
}

pub struct SimPlatform {
    state: RefCell<SimState>,
    /// Window whose context the simulated driver considers current. Shared with every window.
    current: Rc<Cell<Option<WindowId>>>,
}

impl SimPlatform {
    /// A platform whose driver supports every version up to 4.6.
    pub fn new() -> Arc<Self> {
        Self::with_max_gl_version(GlVersion::V4_6)
    }

    pub fn with_max_gl_version(max_version: GlVersion) -> Arc<Self> {
        Arc::new(Self {
            state: RefCell::new(SimState {
                reachable: true,
                max_version,
                batches: VecDeque::new(),
                surfaces: HashMap::new(),
            }),
            current: Rc::new(Cell::new(None)),
        })
    }

    /// A platform whose windowing system can't be reached: every window creation fails.
    pub fn unreachable() -> Arc<Self> {
        let platform = Self::new();
        platform.state.borrow_mut().reachable = false;
        platform
    }

    /// Queue one batch of native messages, handed out together by the next pump.
    pub fn push_batch(&self, events: impl IntoIterator<Item = NativeEvent>) {
        let batch: Vec<NativeEvent> = events.into_iter().collect();
        self.state.borrow_mut().batches.push_back(batch);
    }

    /// Queue a batch holding a single message.
    pub fn push(&self, window: WindowId, kind: NativeEventKind) {
        self.push_batch([NativeEvent::new(window, kind)]);
    }

    pub fn pending_batches(&self) -> usize {
        self.state.borrow().batches.len()
    }

    /// What the OS currently shows for `window`.
    pub fn surface(&self, window: WindowId) -> Option<SimSurface> {
        self.state
            .borrow()
            .surfaces
            .get(&window)
            .map(|s| s.borrow().clone())
    }

    /// Window whose context the driver considers current, if any.
    pub fn current_context(&self) -> Option<WindowId> {
        self.current.get()
    }
}

impl HasDisplayHandle for SimPlatform {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        Err(HandleError::NotSupported)
    }
}

impl Platform for SimPlatform {
    fn name(&self) -> &'static str {
        names::SIMULATED
    }

    fn kind(&self) -> PlatformKind {
        PlatformKind::Custom(names::SIMULATED)
    }

    fn create_window(
        &self,
        window_attributes: &WindowAttributes,
        config: GlConfig,
        window_id: WindowId,
    ) -> crate::Result<Box<dyn NativeWindow>> {
        let mut state = self.state.borrow_mut();

        if !state.reachable {
            return Err(Error::WindowCreation(
                "simulated display server is unreachable".to_string(),
            ));
        }

        if config.version > state.max_version {
            return Err(Error::ContextCreation {
                version: config.version,
                reason: format!("simulated driver stops at OpenGL {}", state.max_version),
            });
        }

        let surface = Rc::new(RefCell::new(SimSurface {
            title: window_attributes.title.clone(),
            size: (window_attributes.width, window_attributes.height),
            position: window_attributes.position.map_or((0, 0), |p| (p.x, p.y)),
            visible: false,
            decorated: true,
            border_width: window_attributes.border_width,
            minimized: false,
            maximized: false,
            version: config.version,
            swap_interval: 1,
            frames_presented: 0,
            destroyed: false,
        }));

        _ = state.surfaces.insert(window_id, surface.clone());
        debug!("Simulated window {} created", window_id);

        Ok(Box::new(SimWindow {
            id: window_id,
            surface,
            current: self.current.clone(),
        }))
    }

    fn pump_events(&self, events: &mut Vec<NativeEvent>) -> anyhow::Result<()> {
        match self.state.borrow_mut().batches.pop_front() {
            Some(batch) => {
                events.extend(batch);
                Ok(())
            }
            None => bail!("simulated message queue is empty; a native platform would block here forever"),
        }
    }
}

struct SimWindow {
    id: WindowId,
    surface: Rc<RefCell<SimSurface>>,
    current: Rc<Cell<Option<WindowId>>>,
}

impl HasWindowHandle for SimWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        Err(HandleError::NotSupported)
    }
}

impl NativeWindow for SimWindow {
    fn show(&self) -> anyhow::Result<()> {
        self.surface.borrow_mut().visible = true;
        Ok(())
    }

    fn hide(&self) -> anyhow::Result<()> {
        self.surface.borrow_mut().visible = false;
        Ok(())
    }

    fn set_title(&self, title: &str) -> anyhow::Result<()> {
        self.surface.borrow_mut().title = title.to_string();
        Ok(())
    }

    fn set_size(&self, width: u32, height: u32) -> anyhow::Result<()> {
        self.surface.borrow_mut().size = (width, height);
        Ok(())
    }

    fn set_position(&self, x: i32, y: i32) -> anyhow::Result<()> {
        self.surface.borrow_mut().position = (x, y);
        Ok(())
    }

    fn set_decorated(&self, decorated: bool) -> anyhow::Result<()> {
        self.surface.borrow_mut().decorated = decorated;
        Ok(())
    }

    fn set_border_width(&self, width: u32) -> anyhow::Result<()> {
        self.surface.borrow_mut().border_width = width;
        Ok(())
    }

    fn set_minimized(&self, minimized: bool) -> anyhow::Result<()> {
        let mut surface = self.surface.borrow_mut();
        surface.minimized = minimized;
        if minimized {
            surface.maximized = false;
        }
        Ok(())
    }

    fn set_maximized(&self, maximized: bool) -> anyhow::Result<()> {
        let mut surface = self.surface.borrow_mut();
        surface.maximized = maximized;
        if maximized {
            surface.minimized = false;
        }
        Ok(())
    }

    fn make_current(&self) -> anyhow::Result<()> {
        self.current.set(Some(self.id));
        Ok(())
    }

    fn make_not_current(&self) -> anyhow::Result<()> {
        self.current.set(None);
        Ok(())
    }

    fn swap_buffers(&self) -> anyhow::Result<()> {
        if self.current.get() != Some(self.id) {
            bail!("window {} swapped without its context being current", self.id);
        }
        self.surface.borrow_mut().frames_presented += 1;
        Ok(())
    }

    fn set_swap_interval(&self, interval: i32) -> anyhow::Result<()> {
        self.surface.borrow_mut().swap_interval = interval;
        Ok(())
    }

    fn get_proc_address(&self, name: &CStr) -> *const c_void {
        // like wglGetProcAddress, lookups only work through the current context
        if self.current.get() != Some(self.id) {
            return std::ptr::null();
        }

        let Ok(name) = name.to_str() else {
            return std::ptr::null();
        };

        let version = self.surface.borrow().version;
        let supported = CORE_ENTRY_POINTS.contains(&name)
            || VERSIONED_ENTRY_POINTS
                .iter()
                .any(|(n, since)| *n == name && version >= *since);

        if supported {
            simulated_entry_point as extern "C" fn() as *const c_void
        } else {
            std::ptr::null()
        }
    }
}

impl Drop for SimWindow {
    fn drop(&mut self) {
        if self.current.get() == Some(self.id) {
            self.current.set(None);
        }
        self.surface.borrow_mut().destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::window::WindowManager;

    #[test]
    fn test_lookups_need_the_context_current() {
        let sim = SimPlatform::new();
        let mut manager = WindowManager::new();
        let (a, b) = (manager.next_id(), manager.next_id());
        let config = GlConfig::new(GlVersion::V4_6);
        let first = sim.create_window(&WindowAttributes::default(), config, a).unwrap();
        let second = sim.create_window(&WindowAttributes::default(), config, b).unwrap();

        assert!(first.get_proc_address(c"glClear").is_null());

        first.make_current().unwrap();
        assert!(!first.get_proc_address(c"glClear").is_null());
        assert!(second.get_proc_address(c"glClear").is_null());

        second.make_current().unwrap();
        assert!(first.get_proc_address(c"glClear").is_null());
        assert!(!second.get_proc_address(c"glSpecializeShader").is_null());
    }
}
