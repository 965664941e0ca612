//! X11 interop

#![cfg(target_os = "linux")]

mod glx;
mod window;

use crate::config::GlConfig;
use crate::event::KeyCode;
use crate::os::window::{NativeWindow, SizeState, WindowAttributes, WindowId};
use crate::os::{NativeEvent, NativeEventKind, Platform, PlatformKind};
use anyhow::{Context, bail};
use hashbrown::HashMap;
use log::{debug, trace};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, RawDisplayHandle, XlibDisplayHandle,
};
use std::cell::RefCell;
use std::ffi::{CStr, c_int, c_uchar, c_ulong, c_void};
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use x11_dl::glx::Glx;
use x11_dl::xlib;
use x11_dl::xlib::Xlib;

pub(super) use window::X11Window;

/// Atoms interned once per display connection.
pub(super) struct Atoms {
    pub wm_protocols: xlib::Atom,
    pub wm_delete_window: xlib::Atom,
    pub motif_wm_hints: xlib::Atom,
    pub net_wm_name: xlib::Atom,
    pub net_wm_state: xlib::Atom,
    pub net_wm_state_maximized_vert: xlib::Atom,
    pub net_wm_state_maximized_horz: xlib::Atom,
    pub net_wm_state_hidden: xlib::Atom,
    pub utf8_string: xlib::Atom,
}

impl Atoms {
    unsafe fn intern(xlib: &Xlib, display: *mut xlib::Display) -> Self {
        let intern = |name: &CStr| unsafe { (xlib.XInternAtom)(display, name.as_ptr(), xlib::False) };

        Self {
            wm_protocols: intern(c"WM_PROTOCOLS"),
            wm_delete_window: intern(c"WM_DELETE_WINDOW"),
            motif_wm_hints: intern(c"_MOTIF_WM_HINTS"),
            net_wm_name: intern(c"_NET_WM_NAME"),
            net_wm_state: intern(c"_NET_WM_STATE"),
            net_wm_state_maximized_vert: intern(c"_NET_WM_STATE_MAXIMIZED_VERT"),
            net_wm_state_maximized_horz: intern(c"_NET_WM_STATE_MAXIMIZED_HORZ"),
            net_wm_state_hidden: intern(c"_NET_WM_STATE_HIDDEN"),
            utf8_string: intern(c"UTF8_STRING"),
        }
    }
}

pub(super) struct X11Platform {
    pub(super) xlib: Xlib,
    pub(super) glx: Glx,
    pub(super) display: *mut xlib::Display,
    pub(super) default_screen: i32,
    pub(super) root_window: xlib::Window,
    pub(super) atoms: Atoms,
    pub(super) extensions: glx::GlxExtensions,
    /// Live windows of this connection, for routing events.
    windows: RefCell<HashMap<xlib::Window, WindowId>>,
    weak: Weak<X11Platform>,
}

static X_ERROR_RAISED: AtomicBool = AtomicBool::new(false);

/// `XEventsQueued` mode that reads whatever the connection has buffered without flushing.
const QUEUED_AFTER_READING: c_int = 1;

unsafe extern "C" fn record_x_error(
    _display: *mut xlib::Display,
    _event: *mut xlib::XErrorEvent,
) -> c_int {
    X_ERROR_RAISED.store(true, Ordering::SeqCst);
    0
}

impl X11Platform {
    pub fn new() -> anyhow::Result<Arc<X11Platform>> {
        let xlib = Xlib::open().context("libX11 is not available")?;
        let glx = Glx::open().context("libGL with GLX is not available")?;

        let display = unsafe { (xlib.XOpenDisplay)(std::ptr::null()) };

        if display.is_null() {
            bail!("Failed to connect to X server.");
        }

        let (default_screen, root_window, atoms, extensions) = unsafe {
            let default_screen = (xlib.XDefaultScreen)(display);
            let root_window = (xlib.XRootWindow)(display, default_screen);
            let atoms = Atoms::intern(&xlib, display);

            let mut supported = xlib::False;
            (xlib.XkbSetDetectableAutoRepeat)(display, xlib::True, &mut supported);
            debug!("Detectable key auto-repeat supported: {}", supported != xlib::False);

            let extensions = glx::GlxExtensions::load(&glx, display, default_screen);
            (default_screen, root_window, atoms, extensions)
        };

        if let Err(e) = glx::check_version(&glx, display) {
            unsafe {
                (xlib.XCloseDisplay)(display);
            }
            return Err(e);
        }

        Ok(Arc::new_cyclic(|weak| X11Platform {
            xlib,
            glx,
            display,
            default_screen,
            root_window,
            atoms,
            extensions,
            windows: RefCell::new(HashMap::new()),
            weak: weak.clone(),
        }))
    }

    pub fn notify_window_created(&self, window: xlib::Window, id: WindowId) {
        _ = self.windows.borrow_mut().insert(window, id);
    }

    pub fn notify_window_destroy(&self, window: xlib::Window) {
        _ = self.windows.borrow_mut().remove(&window);
    }

    /// Run `f` with X errors recorded instead of terminating the process, and report whether any
    /// were raised by the requests it made.
    pub fn with_error_trap<T>(&self, f: impl FnOnce() -> T) -> (T, bool) {
        unsafe {
            (self.xlib.XSync)(self.display, xlib::False);
            X_ERROR_RAISED.store(false, Ordering::SeqCst);
            let previous = (self.xlib.XSetErrorHandler)(Some(record_x_error));

            let value = f();

            (self.xlib.XSync)(self.display, xlib::False);
            (self.xlib.XSetErrorHandler)(previous);
            (value, X_ERROR_RAISED.swap(false, Ordering::SeqCst))
        }
    }

    /// Server-side auto-repeat sends a release immediately followed by a press with the same time
    /// stamp. Such a release is not a real one.
    unsafe fn is_repeat_release(&self, release: &xlib::XKeyEvent) -> bool {
        unsafe {
            if (self.xlib.XEventsQueued)(self.display, QUEUED_AFTER_READING) == 0 {
                return false;
            }

            let mut next: xlib::XEvent = mem::zeroed();
            (self.xlib.XPeekEvent)(self.display, &mut next);

            next.get_type() == xlib::KeyPress
                && next.key.time == release.time
                && next.key.keycode == release.keycode
        }
    }

    /// Read the window's `_NET_WM_STATE` list. `None` when the property is missing.
    unsafe fn read_size_state(&self, window: xlib::Window) -> Option<SizeState> {
        unsafe {
            let mut actual_type: xlib::Atom = 0;
            let mut actual_format: c_int = 0;
            let mut count: c_ulong = 0;
            let mut remaining: c_ulong = 0;
            let mut data: *mut c_uchar = std::ptr::null_mut();

            let status = (self.xlib.XGetWindowProperty)(
                self.display,
                window,
                self.atoms.net_wm_state,
                0,
                1024,
                xlib::False,
                xlib::XA_ATOM,
                &mut actual_type,
                &mut actual_format,
                &mut count,
                &mut remaining,
                &mut data,
            );
            if status != xlib::Success as c_int || data.is_null() {
                return None;
            }

            let state = if actual_type == xlib::XA_ATOM && actual_format == 32 {
                // format 32 data comes back as longs
                let atoms = std::slice::from_raw_parts(data as *const xlib::Atom, count as usize);
                Some(size_state_from_net_wm_state(atoms, &self.atoms))
            } else {
                None
            };
            (self.xlib.XFree)(data as *mut c_void);
            state
        }
    }

    unsafe fn translate(&self, event: &mut xlib::XEvent, events: &mut Vec<NativeEvent>) {
        unsafe {
            let Some(&id) = self.windows.borrow().get(&event.any.window) else {
                return;
            };

            let mut push = |kind| events.push(NativeEvent::new(id, kind));

            match event.get_type() {
                xlib::Expose => push(NativeEventKind::Expose),
                xlib::KeyPress => {
                    let keysym = (self.xlib.XLookupKeysym)(&mut event.key, 0);
                    push(NativeEventKind::KeyPress(keysym_to_key_code(keysym)));
                }
                xlib::KeyRelease => {
                    if self.is_repeat_release(&event.key) {
                        trace!("Folding auto-repeat release of keycode {}", event.key.keycode);
                    } else {
                        let keysym = (self.xlib.XLookupKeysym)(&mut event.key, 0);
                        push(NativeEventKind::KeyRelease(keysym_to_key_code(keysym)));
                    }
                }
                xlib::ClientMessage => {
                    let message = &event.client_message;
                    if message.message_type == self.atoms.wm_protocols
                        && message.data.get_long(0) as xlib::Atom == self.atoms.wm_delete_window
                    {
                        push(NativeEventKind::CloseRequest);
                    }
                }
                xlib::ConfigureNotify => {
                    let configure = &event.configure;
                    push(NativeEventKind::Resized {
                        width: configure.width.max(0) as u32,
                        height: configure.height.max(0) as u32,
                    });

                    // configure coordinates are relative to the window manager's frame
                    let (mut x, mut y) = (0, 0);
                    let mut child: xlib::Window = 0;
                    (self.xlib.XTranslateCoordinates)(
                        self.display,
                        configure.window,
                        self.root_window,
                        0,
                        0,
                        &mut x,
                        &mut y,
                        &mut child,
                    );
                    push(NativeEventKind::Moved { x, y });
                }
                xlib::PropertyNotify if event.property.atom == self.atoms.net_wm_state => {
                    if let Some(state) = self.read_size_state(event.property.window) {
                        push(NativeEventKind::SizeStateChanged(state));
                    }
                }
                _ => (),
            }
        }
    }
}

impl Drop for X11Platform {
    fn drop(&mut self) {
        unsafe {
            (self.xlib.XCloseDisplay)(self.display);
        }
    }
}

impl HasDisplayHandle for X11Platform {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        unsafe {
            Ok(DisplayHandle::borrow_raw(RawDisplayHandle::Xlib(
                XlibDisplayHandle::new(
                    Some(NonNull::new_unchecked(self.display as *mut c_void)),
                    self.default_screen,
                ),
            )))
        }
    }
}

impl Platform for X11Platform {
    fn name(&self) -> &'static str {
        super::names::LINUX_X11
    }

    fn kind(&self) -> PlatformKind {
        PlatformKind::LinuxX11
    }

    fn create_window(
        &self,
        window_attributes: &WindowAttributes,
        config: GlConfig,
        window_id: WindowId,
    ) -> crate::Result<Box<dyn NativeWindow>> {
        let platform = self.weak.upgrade().ok_or_else(|| {
            crate::Error::WindowCreation("X11 platform is shutting down".to_string())
        })?;

        Ok(Box::new(X11Window::new(
            platform,
            window_attributes,
            config,
            window_id,
        )?))
    }

    fn pump_events(&self, events: &mut Vec<NativeEvent>) -> anyhow::Result<()> {
        unsafe {
            let mut event: xlib::XEvent = mem::zeroed();

            // blocks until the server sends something
            (self.xlib.XNextEvent)(self.display, &mut event);
            self.translate(&mut event, events);

            while (self.xlib.XPending)(self.display) > 0 {
                (self.xlib.XNextEvent)(self.display, &mut event);
                self.translate(&mut event, events);
            }
        }

        Ok(())
    }
}

/// Fold the atoms of a `_NET_WM_STATE` list into a size state. Hidden wins over maximized, and
/// maximized needs both axes.
fn size_state_from_net_wm_state(state: &[xlib::Atom], atoms: &Atoms) -> SizeState {
    if state.contains(&atoms.net_wm_state_hidden) {
        SizeState::Minimized
    } else if state.contains(&atoms.net_wm_state_maximized_vert)
        && state.contains(&atoms.net_wm_state_maximized_horz)
    {
        SizeState::Maximized
    } else {
        SizeState::Normal
    }
}

/// Map a keysym (looked up at index 0, so letters are lowercase) to the shared key codes.
fn keysym_to_key_code(keysym: xlib::KeySym) -> KeyCode {
    const RAW_KEYSYM_BASE: u32 = 0x0100_0000;
    const XK_BACKSPACE: xlib::KeySym = 0xff08;
    const XK_TAB: xlib::KeySym = 0xff09;
    const XK_RETURN: xlib::KeySym = 0xff0d;
    const XK_ESCAPE: xlib::KeySym = 0xff1b;
    const XK_LEFT: xlib::KeySym = 0xff51;
    const XK_UP: xlib::KeySym = 0xff52;
    const XK_RIGHT: xlib::KeySym = 0xff53;
    const XK_DOWN: xlib::KeySym = 0xff54;
    const XK_F1: xlib::KeySym = 0xffbe;
    const XK_F12: xlib::KeySym = 0xffc9;
    const XK_SHIFT_L: xlib::KeySym = 0xffe1;
    const XK_SHIFT_R: xlib::KeySym = 0xffe2;
    const XK_CONTROL_L: xlib::KeySym = 0xffe3;
    const XK_CONTROL_R: xlib::KeySym = 0xffe4;

    match keysym {
        0x61..=0x7a => KeyCode((keysym - 0x20) as u32),
        0x20 | 0x30..=0x39 => KeyCode(keysym as u32),
        // punctuation takes the Win32 OEM codes, its keysyms overlap the named ones
        0x3b => KeyCode(0xba),
        0x3d => KeyCode(0xbb),
        0x2c => KeyCode(0xbc),
        0x2d => KeyCode(0xbd),
        0x2e => KeyCode(0xbe),
        0x2f => KeyCode(0xbf),
        0x60 => KeyCode(0xc0),
        0x5b => KeyCode(0xdb),
        0x5c => KeyCode(0xdc),
        0x5d => KeyCode(0xdd),
        0x27 => KeyCode(0xde),
        XK_BACKSPACE => KeyCode::BACKSPACE,
        XK_TAB => KeyCode::TAB,
        XK_RETURN => KeyCode::ENTER,
        XK_ESCAPE => KeyCode::ESCAPE,
        XK_LEFT => KeyCode::LEFT,
        XK_UP => KeyCode::UP,
        XK_RIGHT => KeyCode::RIGHT,
        XK_DOWN => KeyCode::DOWN,
        XK_F1..=XK_F12 => KeyCode(KeyCode::F1.0 + (keysym - XK_F1) as u32),
        XK_SHIFT_L | XK_SHIFT_R => KeyCode::SHIFT,
        XK_CONTROL_L | XK_CONTROL_R => KeyCode::CONTROL,
        other => KeyCode(RAW_KEYSYM_BASE | other as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_normalize_to_uppercase() {
        assert_eq!(keysym_to_key_code(0x61), KeyCode::from_char('A').unwrap());
        assert_eq!(keysym_to_key_code(0x7a), KeyCode::from_char('z').unwrap());
    }

    #[test]
    fn test_named_keys_match_shared_codes() {
        assert_eq!(keysym_to_key_code(0xff1b), KeyCode::ESCAPE);
        assert_eq!(keysym_to_key_code(0xff0d), KeyCode::ENTER);
        assert_eq!(keysym_to_key_code(0xff52), KeyCode::UP);
        assert_eq!(keysym_to_key_code(0xffc9), KeyCode::F12);
        assert_eq!(keysym_to_key_code(0xffe2), KeyCode::SHIFT);
    }

    #[test]
    fn test_punctuation_does_not_alias_named_keys() {
        // apostrophe, ampersand, parenleft
        assert_ne!(keysym_to_key_code(0x27), KeyCode::RIGHT);
        assert_ne!(keysym_to_key_code(0x26), KeyCode::UP);
        assert_ne!(keysym_to_key_code(0x28), KeyCode::DOWN);
        assert_ne!(keysym_to_key_code(0x25), KeyCode::LEFT);

        assert_eq!(keysym_to_key_code(0x27), KeyCode(0xde));
        assert_eq!(keysym_to_key_code(0x2c), KeyCode(0xbc));
        assert_eq!(keysym_to_key_code(0x26), KeyCode(0x0100_0026));
    }

    #[test]
    fn test_unmapped_keysyms_stay_clear_of_shared_codes() {
        for keysym in [0x21, 0x7e, 0xe9, 0xff50, 0xffff] {
            assert!(keysym_to_key_code(keysym).0 >= 0x0100_0000, "keysym {:#x}", keysym);
        }
    }

    fn atoms() -> Atoms {
        Atoms {
            wm_protocols: 1,
            wm_delete_window: 2,
            motif_wm_hints: 3,
            net_wm_name: 4,
            net_wm_state: 5,
            net_wm_state_maximized_vert: 6,
            net_wm_state_maximized_horz: 7,
            net_wm_state_hidden: 8,
            utf8_string: 9,
        }
    }

    #[test]
    fn test_net_wm_state_maps_to_size_state() {
        let atoms = atoms();
        assert_eq!(size_state_from_net_wm_state(&[], &atoms), SizeState::Normal);
        assert_eq!(size_state_from_net_wm_state(&[6, 7], &atoms), SizeState::Maximized);
        assert_eq!(size_state_from_net_wm_state(&[6], &atoms), SizeState::Normal);
        assert_eq!(size_state_from_net_wm_state(&[7, 6, 8], &atoms), SizeState::Minimized);
        assert_eq!(size_state_from_net_wm_state(&[8], &atoms), SizeState::Minimized);
    }
}
