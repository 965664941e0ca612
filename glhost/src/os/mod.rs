//! Platform interface & platform specific code

pub mod sim;
pub mod window;

#[cfg(target_os = "linux")]
mod x11;

#[cfg(windows)]
mod windows;

use crate::config::GlConfig;
use crate::event::KeyCode;
use crate::os::window::{NativeWindow, SizeState, WindowAttributes, WindowId};
use raw_window_handle::HasDisplayHandle;
use std::sync::Arc;

/// Generic access to platform specific functions.
/// Also requires [`raw_window_handle::HasDisplayHandle`] to be implemented.
pub trait Platform: HasDisplayHandle {
    /// Get the name of the current platform
    ///
    /// # Common Names
    /// | OS         | Return Value  | Constant                           |
    /// |------------|---------------|------------------------------------|
    /// | Windows    | `"windows"`   | [`glhost::os::names::WINDOWS`]     |
    /// | Linux/X11  | `"linux-x11"` | [`glhost::os::names::LINUX_X11`]   |
    /// | Simulated  | `"simulated"` | [`glhost::os::names::SIMULATED`]   |
    ///
    fn name(&self) -> &'static str;

    /// Get a more machine-nice identifier for the platform.
    /// Non-standard platforms are required to be [`PlatformKind::Custom`].
    fn kind(&self) -> PlatformKind;

    /// Allocate a hidden native window with the given client size and bind a new OpenGL context of
    /// `config.version` to it.
    ///
    /// Implementations report [`Error::WindowCreation`](crate::Error::WindowCreation) and
    /// [`Error::ContextCreation`](crate::Error::ContextCreation) respectively, and must not leave the
    /// new context current on the calling thread.
    fn create_window(
        &self,
        window_attributes: &WindowAttributes,
        config: GlConfig,
        window_id: WindowId,
    ) -> crate::Result<Box<dyn NativeWindow>>;

    /// Block until at least one native message is available, then drain every queued message,
    /// appending the ones that concern a window of this platform to `events` in arrival order.
    ///
    /// Messages that do not translate to anything are consumed silently, so `events` may be left
    /// empty.
    fn pump_events(&self, events: &mut Vec<NativeEvent>) -> anyhow::Result<()>;
}

/// Identifier for platforms.
///
/// Non-standard platforms **must** use [`PlatformKind::Custom`].
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
#[allow(missing_docs)]
pub enum PlatformKind {
    Windows,
    LinuxX11,
    Custom(&'static str),
}

/// Constants for standard platform names.
#[allow(missing_docs)]
pub mod names {
    pub const WINDOWS: &str = "windows";
    pub const LINUX_X11: &str = "linux-x11";
    pub const SIMULATED: &str = "simulated";
}

/// A native message, already stripped of its platform encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NativeEvent {
    pub window: WindowId,
    pub kind: NativeEventKind,
}

impl NativeEvent {
    pub fn new(window: WindowId, kind: NativeEventKind) -> Self {
        Self { window, kind }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NativeEventKind {
    /// Paint / expose request.
    Expose,
    /// Key press, including auto-repeat presses.
    KeyPress(KeyCode),
    KeyRelease(KeyCode),
    /// The user or the OS asked for the window to close.
    CloseRequest,
    /// New client area size.
    Resized { width: u32, height: u32 },
    /// New client area origin in screen coordinates.
    Moved { x: i32, y: i32 },
    /// The OS minimized, maximized or restored the window.
    SizeStateChanged(SizeState),
}

pub fn new_platform() -> crate::Result<Arc<dyn Platform>> {
    #[cfg(target_os = "windows")]
    {
        let platform: Arc<dyn Platform> = windows::WindowsPlatform::new()
            .map_err(crate::Error::window_creation)?;
        Ok(platform)
    }

    #[cfg(target_os = "linux")]
    {
        let platform: Arc<dyn Platform> =
            x11::X11Platform::new().map_err(crate::Error::window_creation)?;
        Ok(platform)
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        Err(crate::Error::WindowCreation(
            "this operating system has no native backend".to_string(),
        ))
    }
}
