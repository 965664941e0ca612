//! # glhost
//!
//! Native windows with an OpenGL context of a chosen version, and a run loop that turns the
//! platform's messages into a handful of [`Event`]s.
//!
//! ```no_run
//! use glhost::{Event, GlConfig, GlVersion, Host};
//!
//! fn main() -> anyhow::Result<()> {
//!     let host = Host::new()?;
//!     let window = host.create_window(640, 480, "Hello", GlConfig::new(GlVersion::V3_3))?;
//!     host.make_current(window)?;
//!     let clear = host.get_proc_address(window, "glClear")?;
//!     assert!(!clear.is_null());
//!
//!     host.show_window(window)?;
//!     host.run_window(window, |ctx, event| {
//!         match event {
//!             Event::RedrawRequested => ctx.swap_buffers()?,
//!             Event::CloseRequested => ctx.destroy_window()?,
//!             _ => (),
//!         }
//!         Ok(())
//!     })?;
//!     Ok(())
//! }
//! ```

mod context;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod os;

#[cfg(target_os = "linux")]
pub extern crate x11_dl;

#[cfg(windows)]
pub extern crate windows;

pub use crate::config::{GlConfig, GlVersion};
pub use crate::dispatch::{Handlers, LoopContext, RunState};
pub use crate::error::{Error, Result};
pub use crate::event::{Event, KeyCode};
pub use crate::os::window::{
    Decoration, SizeState, Visibility, WindowAttributes, WindowId, WindowPosition,
};

use crate::context::ContextKey;
use crate::os::window::{WindowManager, WindowRecord};
use crate::os::{Platform, new_platform};
use log::{debug, info};
use raw_window_handle::RawWindowHandle;
use std::cell::RefCell;
use std::ffi::{CString, c_void};
use std::sync::Arc;

/// Owner of a platform connection and every window created through it.
///
/// A `Host` is bound to the thread that created it: the native windows, their message queue and
/// their contexts all live there.
pub struct Host {
    serial: u64,
    platform: Arc<dyn Platform>,
    window_manager: RefCell<WindowManager>,
}

impl Host {
    /// Connect to the native windowing system of this OS.
    pub fn new() -> Result<Self> {
        Ok(Self::with_platform(new_platform()?))
    }

    pub fn with_platform(platform: Arc<dyn Platform>) -> Self {
        debug!("Using platform {:?}", platform.name());
        Self {
            serial: context::next_host_serial(),
            platform,
            window_manager: RefCell::new(WindowManager::new()),
        }
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Create a hidden window whose client area is `width` x `height`, with a context of
    /// `config.version` bound to it.
    pub fn create_window(
        &self,
        width: u32,
        height: u32,
        title: &str,
        config: GlConfig,
    ) -> Result<WindowId> {
        self.create_window_with(
            WindowAttributes {
                title: title.to_string(),
                width,
                height,
                ..Default::default()
            },
            config,
        )
    }

    pub fn create_window_with(
        &self,
        window_attributes: WindowAttributes,
        config: GlConfig,
    ) -> Result<WindowId> {
        if window_attributes.width == 0 || window_attributes.height == 0 {
            return Err(Error::WindowCreation(format!(
                "requested size {}x{} has a zero dimension",
                window_attributes.width, window_attributes.height
            )));
        }

        if window_attributes.title.contains('\0') {
            return Err(Error::WindowCreation(
                "window title contains a NUL byte".to_string(),
            ));
        }

        let id = self.window_manager.borrow_mut().next_id();
        let native = self.platform.create_window(&window_attributes, config, id)?;

        // backends may have to make the new context current while setting it up
        if let Some(previous) = context::current() {
            if previous.host == self.serial {
                if let Some(record) = self.window_manager.borrow().get(previous.window) {
                    record.native.make_current().map_err(Error::platform)?;
                }
            }
        }

        info!(
            "Created window {} ({}x{}, {:?}) with an OpenGL {} context",
            id, window_attributes.width, window_attributes.height, window_attributes.title, config.version
        );

        self.window_manager
            .borrow_mut()
            .insert(id, WindowRecord::new(native, &window_attributes, config));

        Ok(id)
    }

    /// Release the native window and its context. Ends a run loop pumping this window.
    pub fn destroy_window(&self, id: WindowId) -> Result<()> {
        let record = self
            .window_manager
            .borrow_mut()
            .remove(id)
            .ok_or(Error::InvalidWindow(id))?;

        if context::clear_if_current(self.key(id)) {
            record.native.make_not_current().map_err(Error::platform)?;
        }

        info!("Destroyed window {}", id);
        drop(record);
        Ok(())
    }

    pub fn is_window_alive(&self, id: WindowId) -> bool {
        self.window_manager.borrow().is_window_alive(id)
    }

    pub fn show_window(&self, id: WindowId) -> Result<()> {
        self.with_window(id, |w| {
            w.apply_decoration().map_err(Error::platform)?;
            if w.visibility != Visibility::Shown {
                w.native.show().map_err(Error::platform)?;
                w.visibility = Visibility::Shown;
            }
            Ok(())
        })
    }

    pub fn hide_window(&self, id: WindowId) -> Result<()> {
        self.with_window(id, |w| {
            if w.visibility != Visibility::Hidden {
                w.native.hide().map_err(Error::platform)?;
                w.visibility = Visibility::Hidden;
            }
            Ok(())
        })
    }

    pub fn visibility(&self, id: WindowId) -> Result<Visibility> {
        self.with_window(id, |w| Ok(w.visibility))
    }

    pub fn set_title(&self, id: WindowId, title: &str) -> Result<()> {
        self.with_window(id, |w| {
            w.native.set_title(title).map_err(Error::platform)?;
            w.title = title.to_string();
            Ok(())
        })
    }

    pub fn title(&self, id: WindowId) -> Result<String> {
        self.with_window(id, |w| Ok(w.title.clone()))
    }

    pub fn set_size(&self, id: WindowId, width: u32, height: u32) -> Result<()> {
        self.with_window(id, |w| {
            if width == 0 || height == 0 {
                return Err(Error::InvalidGeometry { width, height });
            }
            w.native.set_size(width, height).map_err(Error::platform)?;
            w.size = (width, height);
            Ok(())
        })
    }

    /// Client area size, as last set by the application or reported by the OS.
    pub fn size(&self, id: WindowId) -> Result<(u32, u32)> {
        self.with_window(id, |w| Ok(w.size))
    }

    pub fn set_position(&self, id: WindowId, x: i32, y: i32) -> Result<()> {
        self.with_window(id, |w| {
            w.native.set_position(x, y).map_err(Error::platform)?;
            w.position = (x, y);
            Ok(())
        })
    }

    /// Client area origin, as last set by the application or reported by the OS.
    pub fn position(&self, id: WindowId) -> Result<(i32, i32)> {
        self.with_window(id, |w| Ok(w.position))
    }

    /// Request a window without title bar and border. Takes effect on the next [`Host::show_window`].
    pub fn set_undecorated(&self, id: WindowId, undecorated: bool) -> Result<()> {
        self.with_window(id, |w| {
            debug!("Window {} requests decorated={}", id, !undecorated);
            w.request_decoration(!undecorated);
            Ok(())
        })
    }

    /// Whether the window currently shows without chrome (pending requests not included).
    pub fn is_undecorated(&self, id: WindowId) -> Result<bool> {
        self.with_window(id, |w| Ok(w.applied_decoration == Decoration::Undecorated))
    }

    pub fn set_border_width(&self, id: WindowId, width: u32) -> Result<()> {
        self.with_window(id, |w| w.native.set_border_width(width).map_err(Error::platform))
    }

    /// Ask the OS to minimize (or restore) the window. The request may be ignored.
    pub fn set_minimized(&self, id: WindowId, minimized: bool) -> Result<()> {
        self.with_window(id, |w| {
            w.native.set_minimized(minimized).map_err(Error::platform)?;
            w.size_state = if minimized {
                SizeState::Minimized
            } else {
                SizeState::Normal
            };
            Ok(())
        })
    }

    /// Ask the OS to maximize (or restore) the window. The request may be ignored.
    pub fn set_maximized(&self, id: WindowId, maximized: bool) -> Result<()> {
        self.with_window(id, |w| {
            w.native.set_maximized(maximized).map_err(Error::platform)?;
            w.size_state = if maximized {
                SizeState::Maximized
            } else {
                SizeState::Normal
            };
            Ok(())
        })
    }

    pub fn size_state(&self, id: WindowId) -> Result<SizeState> {
        self.with_window(id, |w| Ok(w.size_state))
    }

    pub fn gl_config(&self, id: WindowId) -> Result<GlConfig> {
        self.with_window(id, |w| Ok(w.config))
    }

    // GL Functions

    /// Bind the window's context to the calling thread, replacing the previously current one.
    pub fn make_current(&self, id: WindowId) -> Result<()> {
        self.with_window(id, |w| w.native.make_current().map_err(Error::platform))?;
        context::set_current(Some(self.key(id)));
        Ok(())
    }

    /// Unbind the window's context if it is current on this thread.
    pub fn release_current(&self, id: WindowId) -> Result<()> {
        let key = self.key(id);
        self.with_window(id, |w| {
            if context::clear_if_current(key) {
                w.native.make_not_current().map_err(Error::platform)?;
            }
            Ok(())
        })
    }

    pub fn is_current(&self, id: WindowId) -> bool {
        self.is_window_alive(id) && context::is_current(self.key(id))
    }

    /// Present the back buffer. The window's context has to be current on this thread.
    pub fn swap_buffers(&self, id: WindowId) -> Result<()> {
        let key = self.key(id);
        self.with_window(id, |w| {
            if !context::is_current(key) {
                return Err(Error::NoCurrentContext(id));
            }
            w.native.swap_buffers().map_err(Error::platform)
        })
    }

    /// Set how many vertical blanks a swap waits for (0 disables vsync). Requires a current context.
    pub fn set_swap_interval(&self, id: WindowId, interval: i32) -> Result<()> {
        let key = self.key(id);
        self.with_window(id, |w| {
            if !context::is_current(key) {
                return Err(Error::NoCurrentContext(id));
            }
            w.native
                .set_swap_interval(interval)
                .map_err(Error::platform)
        })
    }

    /// Resolve an OpenGL entry point of the window's context, which has to be current on this
    /// thread. Unknown names give a null pointer, not an error.
    pub fn get_proc_address(&self, id: WindowId, name: &str) -> Result<*const c_void> {
        let key = self.key(id);
        self.with_window(id, |w| {
            // drivers resolve against whatever context is current
            if !context::is_current(key) {
                return Err(Error::NoCurrentContext(id));
            }
            Ok(match CString::new(name) {
                Ok(name) => w.native.get_proc_address(&name),
                Err(_) => std::ptr::null(),
            })
        })
    }

    // Polling

    pub fn latest_downed_key(&self, id: WindowId) -> Result<Option<KeyCode>> {
        self.with_window(id, |w| Ok(w.keys.latest_down()))
    }

    pub fn latest_upped_key(&self, id: WindowId) -> Result<Option<KeyCode>> {
        self.with_window(id, |w| Ok(w.keys.latest_up()))
    }

    pub fn is_key_held(&self, id: WindowId, key: KeyCode) -> Result<bool> {
        self.with_window(id, |w| Ok(w.keys.is_held(key)))
    }

    pub fn raw_window_handle(&self, id: WindowId) -> Result<RawWindowHandle> {
        self.with_window(id, |w| Ok(w.native.window_handle()?.as_raw()))
    }

    fn key(&self, window: WindowId) -> ContextKey {
        ContextKey {
            host: self.serial,
            window,
        }
    }

    /// Run `f` on a live window. The registry stays borrowed for the duration, so `f` must not call
    /// back into the host.
    fn with_window<T>(
        &self,
        id: WindowId,
        f: impl FnOnce(&mut WindowRecord) -> Result<T>,
    ) -> Result<T> {
        let mut window_manager = self.window_manager.borrow_mut();
        let record = window_manager
            .get_mut(id)
            .ok_or(Error::InvalidWindow(id))?;
        f(record)
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        let serial = self.serial;
        for (id, record) in self.window_manager.get_mut().drain() {
            if context::clear_if_current(ContextKey { host: serial, window: id }) {
                _ = record.native.make_not_current();
            }
            debug!("Releasing window {} on host shutdown", id);
        }
    }
}
